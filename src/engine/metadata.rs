//! Resolves and caches endpoint base URIs.

use crate::descriptor::EndpointDescriptor;
use crate::error::Error;
use reqwest::Url;
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

/// Computes `scheme://host[:port][/root-path]` for an endpoint.
///
/// Resolution happens at most once per endpoint name; later calls return the
/// cached URI even if the descriptor passed in differs.
#[derive(Debug, Default)]
pub struct MetadataResolver {
    cache: Mutex<HashMap<String, Url>>,
}

impl MetadataResolver {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the base URI for `endpoint`, resolving and caching it on first use.
    ///
    /// # Errors
    ///
    /// Returns `MissingHost` if the endpoint declares no host, `MalformedPort`
    /// if its port is not a number in `0..=65535`, and `InvalidBaseUri` if the
    /// parts do not form a URI.
    pub fn resolve(&self, endpoint: &EndpointDescriptor) -> Result<Url, Error> {
        let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(url) = cache.get(&endpoint.name) {
            return Ok(url.clone());
        }
        let url = build_base_url(endpoint)?;
        cache.insert(endpoint.name.clone(), url.clone());
        Ok(url)
    }

    /// Drops a cached URI so the next `resolve` recomputes it.
    pub fn forget(&self, endpoint: &str) -> bool {
        self.cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(endpoint)
            .is_some()
    }
}

/// Builds the base URI of an endpoint without caching.
///
/// # Errors
///
/// See [`MetadataResolver::resolve`].
pub fn build_base_url(endpoint: &EndpointDescriptor) -> Result<Url, Error> {
    let host = endpoint.host.trim();
    if host.is_empty() {
        return Err(Error::MissingHost {
            endpoint: endpoint.name.clone(),
        });
    }

    let scheme = match endpoint.scheme.trim() {
        "" => "http",
        scheme => scheme,
    };

    let port = match endpoint.port.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(raw) => Some(raw.parse::<u16>().map_err(|_| Error::MalformedPort {
            endpoint: endpoint.name.clone(),
            port: raw.to_string(),
        })?),
    };

    let mut base = format!("{scheme}://{host}");
    if let Some(port) = port {
        base.push_str(&format!(":{port}"));
    }
    let root = endpoint.path.trim().trim_end_matches('/');
    if !root.is_empty() {
        if !root.starts_with('/') {
            base.push('/');
        }
        base.push_str(root);
    }

    Url::parse(&base).map_err(|e| Error::InvalidBaseUri {
        endpoint: endpoint.name.clone(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_with_port_and_root_path() {
        let endpoint = EndpointDescriptor::new("jokes", "api.icndb.com")
            .with_port("8080")
            .with_path("/v1/");
        let url = build_base_url(&endpoint).unwrap();
        assert_eq!(url.as_str(), "http://api.icndb.com:8080/v1");
    }

    #[test]
    fn test_base_url_defaults_scheme_and_accepts_bare_root() {
        let endpoint = EndpointDescriptor::new("svc", "localhost")
            .with_scheme("")
            .with_path("api");
        let url = build_base_url(&endpoint).unwrap();
        assert_eq!(url.as_str(), "http://localhost/api");
    }

    #[test]
    fn test_missing_host_is_rejected() {
        let endpoint = EndpointDescriptor::new("svc", "  ");
        assert!(matches!(
            build_base_url(&endpoint),
            Err(Error::MissingHost { endpoint }) if endpoint == "svc"
        ));
    }

    #[test]
    fn test_non_numeric_port_is_rejected() {
        for port in ["http", "-1", "70000"] {
            let endpoint = EndpointDescriptor::new("svc", "localhost").with_port(port);
            assert!(
                matches!(build_base_url(&endpoint), Err(Error::MalformedPort { .. })),
                "port '{port}' should be rejected"
            );
        }
    }

    #[test]
    fn test_resolution_is_cached_per_endpoint() {
        let resolver = MetadataResolver::new();
        let first = EndpointDescriptor::new("svc", "one.example");
        let second = EndpointDescriptor::new("svc", "two.example");

        let url = resolver.resolve(&first).unwrap();
        assert_eq!(resolver.resolve(&second).unwrap(), url);

        assert!(resolver.forget("svc"));
        assert_eq!(
            resolver.resolve(&second).unwrap().host_str(),
            Some("two.example")
        );
    }
}
