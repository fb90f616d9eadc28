//! Per-endpoint HTTP sessions.
//!
//! Every endpoint gets exactly one [`EndpointSession`]: a pooled client, a
//! cookie jar and a per-route connection ceiling. All sessions share one
//! process-wide connection ceiling.

use crate::constants;
use crate::descriptor::EndpointDescriptor;
use crate::error::Error;
use reqwest::cookie::Jar;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, Once, PoisonError};
use std::time::Duration;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::debug;

/// Configuration for timeout behavior
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeoutConfig {
    pub connect_timeout_ms: u64,
    pub request_timeout_ms: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_timeout_ms: constants::DEFAULT_CONNECT_TIMEOUT_MS,
            request_timeout_ms: constants::DEFAULT_TIMEOUT_SECS * 1000,
        }
    }
}

/// Connection ceilings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionLimits {
    pub max_total: usize,
    pub max_per_route: usize,
}

impl Default for ConnectionLimits {
    fn default() -> Self {
        Self {
            max_total: constants::DEFAULT_MAX_TOTAL_CONNECTIONS,
            max_per_route: constants::DEFAULT_MAX_PER_ROUTE,
        }
    }
}

/// Installs the process-wide rustls crypto provider once.
pub fn install_crypto_provider() {
    static INSTALL: Once = Once::new();
    INSTALL.call_once(|| {
        #[cfg(not(windows))]
        let provider = rustls::crypto::ring::default_provider();
        #[cfg(windows)]
        let provider = rustls::crypto::aws_lc_rs::default_provider();
        // Another component may have installed one already
        let _ = provider.install_default();
    });
}

/// Creates a pooled HTTP client with timeout configuration
///
/// # Errors
/// Returns an error if the HTTP client cannot be created with the specified configuration
pub fn create_pooled_client(
    timeouts: &TimeoutConfig,
    max_idle_per_host: usize,
) -> Result<reqwest::Client, Error> {
    install_crypto_provider();
    reqwest::Client::builder()
        .connect_timeout(Duration::from_millis(timeouts.connect_timeout_ms))
        .timeout(Duration::from_millis(timeouts.request_timeout_ms))
        .pool_max_idle_per_host(max_idle_per_host)
        .build()
        .map_err(|e| Error::RequestFailed {
            reason: format!("Failed to create HTTP client: {e}"),
        })
}

/// Builds the HTTP client of an endpoint session.
pub trait ClientFactory: Send + Sync {
    /// # Errors
    ///
    /// Returns an error if the client cannot be created.
    fn create_client(&self, endpoint: &EndpointDescriptor) -> Result<reqwest::Client, Error>;

    /// Per-route connection ceiling for sessions built by this factory.
    /// `None` uses the manager's default.
    fn max_per_route(&self) -> Option<usize> {
        None
    }
}

/// The factory used when an endpoint declares no client override.
#[derive(Debug, Clone, Default)]
pub struct DefaultClientFactory {
    pub timeouts: TimeoutConfig,
    pub max_per_route: Option<usize>,
}

impl DefaultClientFactory {
    #[must_use]
    pub const fn new(timeouts: TimeoutConfig, max_per_route: Option<usize>) -> Self {
        Self {
            timeouts,
            max_per_route,
        }
    }
}

impl ClientFactory for DefaultClientFactory {
    fn create_client(&self, _endpoint: &EndpointDescriptor) -> Result<reqwest::Client, Error> {
        create_pooled_client(
            &self.timeouts,
            self.max_per_route
                .unwrap_or(constants::DEFAULT_MAX_PER_ROUTE),
        )
    }

    fn max_per_route(&self) -> Option<usize> {
        self.max_per_route
    }
}

/// Permits held for the duration of one exchange.
#[derive(Debug)]
pub struct ConnectionPermit {
    _total: OwnedSemaphorePermit,
    _route: OwnedSemaphorePermit,
}

/// The shared state of one endpoint.
pub struct EndpointSession {
    endpoint: String,
    client: reqwest::Client,
    cookies: Arc<Jar>,
    route_permits: Arc<Semaphore>,
    total_permits: Arc<Semaphore>,
}

impl EndpointSession {
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    #[must_use]
    pub const fn client(&self) -> &reqwest::Client {
        &self.client
    }

    #[must_use]
    pub fn cookies(&self) -> &Arc<Jar> {
        &self.cookies
    }

    /// Connections still available on this route.
    #[must_use]
    pub fn available_route_permits(&self) -> usize {
        self.route_permits.available_permits()
    }

    /// Waits for a slot under both the global and the per-route ceiling.
    ///
    /// # Errors
    ///
    /// Returns an error if the session has been shut down.
    pub async fn acquire(&self) -> Result<ConnectionPermit, Error> {
        let closed = |_| Error::RequestFailed {
            reason: format!("session for '{}' is closed", self.endpoint),
        };
        // Route first: a call queued on a busy route must not hold a global slot.
        let route = Arc::clone(&self.route_permits)
            .acquire_owned()
            .await
            .map_err(closed)?;
        let total = Arc::clone(&self.total_permits)
            .acquire_owned()
            .await
            .map_err(closed)?;
        Ok(ConnectionPermit {
            _total: total,
            _route: route,
        })
    }
}

impl fmt::Debug for EndpointSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EndpointSession")
            .field("endpoint", &self.endpoint)
            .field("route_permits", &self.route_permits.available_permits())
            .finish_non_exhaustive()
    }
}

/// Creates and caches one session per endpoint.
pub struct SessionManager {
    sessions: Mutex<HashMap<String, Arc<EndpointSession>>>,
    default_factory: Arc<dyn ClientFactory>,
    total_permits: Arc<Semaphore>,
    limits: ConnectionLimits,
}

impl Default for SessionManager {
    fn default() -> Self {
        Self::new(ConnectionLimits::default(), TimeoutConfig::default())
    }
}

impl SessionManager {
    #[must_use]
    pub fn new(limits: ConnectionLimits, timeouts: TimeoutConfig) -> Self {
        Self::with_factory(
            limits,
            Arc::new(DefaultClientFactory::new(
                timeouts,
                Some(limits.max_per_route),
            )),
        )
    }

    /// Uses `factory` for every endpoint that declares no override.
    #[must_use]
    pub fn with_factory(limits: ConnectionLimits, factory: Arc<dyn ClientFactory>) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            default_factory: factory,
            total_permits: Arc::new(Semaphore::new(limits.max_total.max(1))),
            limits,
        }
    }

    #[must_use]
    pub const fn limits(&self) -> ConnectionLimits {
        self.limits
    }

    /// Returns the endpoint's session, creating it on first use.
    ///
    /// Concurrent first calls for the same endpoint create exactly one session.
    ///
    /// # Errors
    ///
    /// Returns an error if the client factory fails.
    pub fn get_session(&self, endpoint: &EndpointDescriptor) -> Result<Arc<EndpointSession>, Error> {
        let mut sessions = self.sessions.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(session) = sessions.get(&endpoint.name) {
            return Ok(Arc::clone(session));
        }

        let factory = endpoint.client.as_ref().unwrap_or(&self.default_factory);
        let client = factory.create_client(endpoint)?;
        let per_route = factory
            .max_per_route()
            .unwrap_or(self.limits.max_per_route)
            .max(1);

        let session = Arc::new(EndpointSession {
            endpoint: endpoint.name.clone(),
            client,
            cookies: Arc::new(Jar::default()),
            route_permits: Arc::new(Semaphore::new(per_route)),
            total_permits: Arc::clone(&self.total_permits),
        });
        debug!(
            target: "tether::session",
            endpoint = %endpoint.name,
            max_per_route = per_route,
            custom_client = endpoint.client.is_some(),
            "Created endpoint session"
        );
        sessions.insert(endpoint.name.clone(), Arc::clone(&session));
        Ok(session)
    }

    /// Drops the cached session of `endpoint`. In-flight requests keep theirs.
    pub fn evict(&self, endpoint: &str) -> bool {
        let removed = self
            .sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(endpoint)
            .is_some();
        if removed {
            debug!(target: "tether::session", endpoint, "Evicted endpoint session");
        }
        removed
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionManager")
            .field("sessions", &self.len())
            .field("limits", &self.limits)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_limits_and_timeouts() {
        let limits = ConnectionLimits::default();
        assert_eq!(limits.max_total, 128);
        assert_eq!(limits.max_per_route, 4);

        let timeouts = TimeoutConfig::default();
        assert_eq!(timeouts.connect_timeout_ms, 10_000);
        assert_eq!(timeouts.request_timeout_ms, 30_000);
    }

    #[test]
    fn test_session_is_reused_and_evictable() {
        let manager = SessionManager::default();
        let endpoint = EndpointDescriptor::new("svc", "localhost");

        let first = manager.get_session(&endpoint).unwrap();
        let second = manager.get_session(&endpoint).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.available_route_permits(), 4);

        assert!(manager.evict("svc"));
        assert!(manager.is_empty());
        let third = manager.get_session(&endpoint).unwrap();
        assert!(!Arc::ptr_eq(&first, &third));
    }

    #[tokio::test]
    async fn test_route_ceiling_is_enforced() {
        let manager = SessionManager::new(
            ConnectionLimits {
                max_total: 8,
                max_per_route: 1,
            },
            TimeoutConfig::default(),
        );
        let session = manager
            .get_session(&EndpointDescriptor::new("svc", "localhost"))
            .unwrap();

        let held = session.acquire().await.unwrap();
        assert_eq!(session.available_route_permits(), 0);
        drop(held);
        assert_eq!(session.available_route_permits(), 1);
    }
}
