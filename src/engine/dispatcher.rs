//! The invocation entry point.
//!
//! A [`Dispatcher`] owns the registered endpoints and drives each call
//! through classification, the builder chain, interceptors and execution.

use crate::constants;
use crate::descriptor::{EndpointDescriptor, ValueType};
use crate::engine::builder;
use crate::engine::classifier::{self, ParameterPlan};
use crate::engine::deserializer::DeserializerRegistry;
use crate::engine::executor::{ExecutionStrategy, Executor};
use crate::engine::interceptor;
use crate::engine::metadata::{self, MetadataResolver};
use crate::engine::session::{ConnectionLimits, SessionManager, TimeoutConfig};
use crate::engine::transport::{ReqwestTransport, Transport};
use crate::error::Error;
use crate::invocation::{Argument, InvocationContext, Outcome};
use reqwest::Url;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, error, info};

struct RegisteredEndpoint {
    descriptor: Arc<EndpointDescriptor>,
    base_url: Url,
    plans: HashMap<String, Arc<ParameterPlan>>,
}

/// Registers endpoints and invokes their operations.
pub struct Dispatcher {
    endpoints: RwLock<HashMap<String, Arc<RegisteredEndpoint>>>,
    resolver: MetadataResolver,
    sessions: Arc<SessionManager>,
    deserializers: Arc<DeserializerRegistry>,
    executor: Executor,
}

/// Builder for [`Dispatcher`].
pub struct DispatcherBuilder {
    limits: ConnectionLimits,
    timeouts: TimeoutConfig,
    async_workers: usize,
    sessions: Option<Arc<SessionManager>>,
    deserializers: Option<DeserializerRegistry>,
    transport: Option<Arc<dyn Transport>>,
}

impl Default for DispatcherBuilder {
    fn default() -> Self {
        Self {
            limits: ConnectionLimits::default(),
            timeouts: TimeoutConfig::default(),
            async_workers: constants::DEFAULT_ASYNC_WORKERS,
            sessions: None,
            deserializers: None,
            transport: None,
        }
    }
}

impl DispatcherBuilder {
    #[must_use]
    pub const fn with_limits(mut self, limits: ConnectionLimits) -> Self {
        self.limits = limits;
        self
    }

    #[must_use]
    pub const fn with_timeouts(mut self, timeouts: TimeoutConfig) -> Self {
        self.timeouts = timeouts;
        self
    }

    #[must_use]
    pub const fn with_async_workers(mut self, workers: usize) -> Self {
        self.async_workers = workers;
        self
    }

    /// Uses an existing session manager instead of creating one from the
    /// configured limits and timeouts.
    #[must_use]
    pub fn with_sessions(mut self, sessions: Arc<SessionManager>) -> Self {
        self.sessions = Some(sessions);
        self
    }

    #[must_use]
    pub fn with_deserializers(mut self, registry: DeserializerRegistry) -> Self {
        self.deserializers = Some(registry);
        self
    }

    #[must_use]
    pub fn with_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    #[must_use]
    pub fn build(self) -> Dispatcher {
        let sessions = self
            .sessions
            .unwrap_or_else(|| Arc::new(SessionManager::new(self.limits, self.timeouts)));
        let deserializers = Arc::new(self.deserializers.unwrap_or_default());
        let transport = self
            .transport
            .unwrap_or_else(|| Arc::new(ReqwestTransport));
        Dispatcher {
            endpoints: RwLock::new(HashMap::new()),
            resolver: MetadataResolver::new(),
            executor: Executor::new(transport, Arc::clone(&deserializers), self.async_workers),
            sessions,
            deserializers,
        }
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl Dispatcher {
    #[must_use]
    pub fn builder() -> DispatcherBuilder {
        DispatcherBuilder::default()
    }

    #[must_use]
    pub const fn sessions(&self) -> &Arc<SessionManager> {
        &self.sessions
    }

    #[must_use]
    pub const fn deserializers(&self) -> &Arc<DeserializerRegistry> {
        &self.deserializers
    }

    /// Validates `endpoint` and makes its operations invocable.
    ///
    /// Validation resolves the base URI, classifies every operation's
    /// parameters and resolves the deserializer of every operation that
    /// returns a value. Nothing is registered if any check fails.
    ///
    /// # Errors
    ///
    /// Returns the first metadata or declaration error found,
    /// `DuplicateOperation` if two operations share a name, or
    /// `DuplicateEndpoint` if the endpoint name is taken.
    pub fn register(&self, endpoint: EndpointDescriptor) -> Result<(), Error> {
        if self.read_endpoints().contains_key(&endpoint.name) {
            return Err(Error::DuplicateEndpoint {
                name: endpoint.name,
            });
        }

        let base_url = self.resolver.resolve(&endpoint)?;
        let name = endpoint.name.clone();
        let registered = match self.validate(endpoint, base_url) {
            Ok(registered) => registered,
            Err(err) => {
                self.resolver.forget(&name);
                return Err(err);
            }
        };

        let mut endpoints = self
            .endpoints
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if endpoints.contains_key(&name) {
            return Err(Error::DuplicateEndpoint { name });
        }
        info!(
            target: "tether::dispatcher",
            endpoint = %name,
            base_url = %registered.base_url,
            operations = registered.plans.len(),
            "Registered endpoint"
        );
        endpoints.insert(name, Arc::new(registered));
        Ok(())
    }

    /// Runs the registration checks without registering.
    ///
    /// # Errors
    ///
    /// See [`Dispatcher::register`].
    pub fn check(&self, endpoint: &EndpointDescriptor) -> Result<(), Error> {
        let base_url = metadata::build_base_url(endpoint)?;
        self.validate(endpoint.clone(), base_url).map(|_| ())
    }

    fn validate(
        &self,
        endpoint: EndpointDescriptor,
        base_url: Url,
    ) -> Result<RegisteredEndpoint, Error> {
        let mut plans = HashMap::with_capacity(endpoint.operations.len());
        for operation in &endpoint.operations {
            let plan = classifier::classify(&endpoint, operation)?;
            if operation.returns != ValueType::Unit || endpoint.is_async_for(operation) {
                self.deserializers.resolve(&endpoint, operation)?;
            }
            if plans
                .insert(operation.name.clone(), Arc::new(plan))
                .is_some()
            {
                return Err(Error::DuplicateOperation {
                    endpoint: endpoint.name.clone(),
                    operation: operation.name.clone(),
                });
            }
        }

        Ok(RegisteredEndpoint {
            descriptor: Arc::new(endpoint),
            base_url,
            plans,
        })
    }

    /// Removes an endpoint along with its session and cached metadata.
    pub fn deregister(&self, name: &str) -> bool {
        let removed = self
            .endpoints
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(name)
            .is_some();
        if removed {
            self.sessions.evict(name);
            self.resolver.forget(name);
        }
        removed
    }

    /// Names of the registered endpoints, sorted.
    #[must_use]
    pub fn endpoint_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.read_endpoints().keys().cloned().collect();
        names.sort();
        names
    }

    fn read_endpoints(
        &self,
    ) -> std::sync::RwLockReadGuard<'_, HashMap<String, Arc<RegisteredEndpoint>>> {
        self.endpoints.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Invokes `operation` on `endpoint` with positional `args`.
    ///
    /// Synchronous operations complete before this returns. Asynchronous
    /// operations return [`Outcome::Dispatched`] once the request is built
    /// and queued; build failures are still returned here.
    ///
    /// # Errors
    ///
    /// Returns dispatch errors for unknown names or wrong arity, build errors
    /// wrapped in [`Error::RequestBuild`], interceptor failures, and for
    /// synchronous calls transport and response errors.
    pub async fn invoke(
        &self,
        endpoint: &str,
        operation: &str,
        args: Vec<Argument>,
    ) -> Result<Outcome, Error> {
        let registered = self
            .read_endpoints()
            .get(endpoint)
            .cloned()
            .ok_or_else(|| Error::UnknownEndpoint {
                name: endpoint.to_string(),
            })?;
        let descriptor = Arc::clone(&registered.descriptor);
        let (op, plan) = descriptor
            .operation(operation)
            .zip(registered.plans.get(operation))
            .ok_or_else(|| Error::UnknownOperation {
                endpoint: endpoint.to_string(),
                operation: operation.to_string(),
            })?;
        let op = Arc::clone(op);

        let base_url = self.resolver.resolve(&descriptor)?;
        let bound = classifier::bind(&descriptor, &op, plan, args)?;
        let ctx = InvocationContext {
            endpoint: Arc::clone(&descriptor),
            operation: op,
            base_url,
            bindings: bound.bindings,
            callback: bound.callback,
        };

        let strategy = ExecutionStrategy::for_invocation(&ctx);
        debug!(
            target: "tether::dispatcher",
            strategy = ?strategy,
            "Invoking {}",
            ctx.summary()
        );

        let mut request = match builder::build(&ctx, bound.entities).await {
            Ok(request) => request,
            Err(err) => {
                error!(target: "tether::dispatcher", "{err}");
                return Err(err);
            }
        };
        interceptor::apply(&ctx, &mut request)?;

        let session = self.sessions.get_session(&descriptor)?;
        match strategy {
            ExecutionStrategy::Synchronous => self
                .executor
                .execute_sync(&ctx, request, &session)
                .await
                .map(Outcome::Completed),
            ExecutionStrategy::Asynchronous => {
                self.executor.execute_async(ctx, request, session);
                Ok(Outcome::Dispatched)
            }
        }
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("endpoints", &self.endpoint_names())
            .field("sessions", &self.sessions)
            .field("executor", &self.executor)
            .finish_non_exhaustive()
    }
}
