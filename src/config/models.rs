use crate::constants;
use crate::descriptor::{
    EndpointDescriptor, HttpMethod, NameValue, ParamAnnotation, ParamDecl, RequestDescriptor,
    ValueType,
};
use crate::engine::session::{ConnectionLimits, DefaultClientFactory, TimeoutConfig};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct GlobalConfig {
    #[serde(default = "default_timeout_secs_value")]
    pub default_timeout_secs: u64,
    #[serde(default)]
    pub limits: Limits,
    /// Declared endpoints, keyed by name
    #[serde(default)]
    pub endpoints: BTreeMap<String, EndpointConfig>,
}

const fn default_timeout_secs_value() -> u64 {
    constants::DEFAULT_TIMEOUT_SECS
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            default_timeout_secs: constants::DEFAULT_TIMEOUT_SECS,
            limits: Limits::default(),
            endpoints: BTreeMap::new(),
        }
    }
}

impl GlobalConfig {
    #[must_use]
    pub const fn timeouts(&self) -> TimeoutConfig {
        TimeoutConfig {
            connect_timeout_ms: self.limits.connect_timeout_ms,
            request_timeout_ms: self.default_timeout_secs * 1000,
        }
    }

    #[must_use]
    pub const fn connection_limits(&self) -> ConnectionLimits {
        ConnectionLimits {
            max_total: self.limits.max_total_connections,
            max_per_route: self.limits.max_per_route,
        }
    }

    /// Converts the whole catalog into endpoint descriptors, sorted by name.
    #[must_use]
    pub fn endpoint_descriptors(&self) -> Vec<EndpointDescriptor> {
        self.endpoints
            .iter()
            .map(|(name, endpoint)| endpoint.to_descriptor(name, self))
            .collect()
    }
}

/// Connection and worker ceilings
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    #[serde(default = "default_max_total_connections")]
    pub max_total_connections: usize,
    #[serde(default = "default_max_per_route")]
    pub max_per_route: usize,
    #[serde(default = "default_async_workers")]
    pub async_workers: usize,
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
}

const fn default_max_total_connections() -> usize {
    constants::DEFAULT_MAX_TOTAL_CONNECTIONS
}

const fn default_max_per_route() -> usize {
    constants::DEFAULT_MAX_PER_ROUTE
}

const fn default_async_workers() -> usize {
    constants::DEFAULT_ASYNC_WORKERS
}

const fn default_connect_timeout_ms() -> u64 {
    constants::DEFAULT_CONNECT_TIMEOUT_MS
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_total_connections: default_max_total_connections(),
            max_per_route: default_max_per_route(),
            async_workers: default_async_workers(),
            connect_timeout_ms: default_connect_timeout_ms(),
        }
    }
}

fn default_scheme() -> String {
    "http".to_string()
}

/// One endpoint in the catalog
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct EndpointConfig {
    #[serde(default = "default_scheme")]
    pub scheme: String,
    #[serde(default)]
    pub host: String,
    /// Kept as text so that malformed values surface as metadata errors
    pub port: Option<String>,
    #[serde(default)]
    pub path: String,
    pub deserializer: Option<String>,
    #[serde(default)]
    pub stateful: bool,
    #[serde(default)]
    pub asynchronous: bool,
    pub client: Option<ClientOverride>,
    #[serde(default)]
    pub operations: Vec<OperationConfig>,
}

/// Per-endpoint client settings that replace the global defaults
#[derive(Debug, Deserialize, Serialize, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClientOverride {
    pub connect_timeout_ms: Option<u64>,
    pub request_timeout_ms: Option<u64>,
    pub max_per_route: Option<usize>,
}

impl EndpointConfig {
    #[must_use]
    pub fn to_descriptor(&self, name: &str, global: &GlobalConfig) -> EndpointDescriptor {
        let mut endpoint = EndpointDescriptor::new(name, self.host.clone())
            .with_scheme(self.scheme.clone())
            .with_path(self.path.clone());
        endpoint.port.clone_from(&self.port);
        endpoint.deserializer.clone_from(&self.deserializer);
        endpoint.stateful = self.stateful;
        endpoint.asynchronous = self.asynchronous;

        if let Some(client) = self.client {
            let defaults = global.timeouts();
            let timeouts = TimeoutConfig {
                connect_timeout_ms: client
                    .connect_timeout_ms
                    .unwrap_or(defaults.connect_timeout_ms),
                request_timeout_ms: client
                    .request_timeout_ms
                    .unwrap_or(defaults.request_timeout_ms),
            };
            endpoint = endpoint.with_client_factory(Arc::new(DefaultClientFactory::new(
                timeouts,
                client.max_per_route,
            )));
        }

        self.operations
            .iter()
            .fold(endpoint, |endpoint, op| endpoint.with_operation(op.to_descriptor()))
    }
}

/// One operation of a catalog endpoint
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct OperationConfig {
    pub name: String,
    #[serde(default)]
    pub method: HttpMethod,
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub params: Vec<NameValue>,
    #[serde(default)]
    pub headers: Vec<NameValue>,
    #[serde(default)]
    pub parameters: Vec<ParameterConfig>,
    #[serde(default)]
    pub returns: ValueType,
    pub deserializer: Option<String>,
    #[serde(default)]
    pub asynchronous: bool,
    #[serde(default)]
    pub stateful: bool,
}

impl OperationConfig {
    #[must_use]
    pub fn to_descriptor(&self) -> RequestDescriptor {
        let mut operation = RequestDescriptor::new(self.name.clone(), self.method, self.path.clone())
            .returning(self.returns.clone());
        operation.params.clone_from(&self.params);
        operation.headers.clone_from(&self.headers);
        operation.parameters = self.parameters.iter().map(ParameterConfig::to_decl).collect();
        operation.deserializer.clone_from(&self.deserializer);
        operation.asynchronous = self.asynchronous;
        operation.stateful = self.stateful;
        operation
    }
}

/// Role annotations of one positional parameter. Leaving every field unset
/// declares an unannotated parameter.
#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq, Eq)]
pub struct ParameterConfig {
    pub path: Option<String>,
    pub query: Option<String>,
    pub form: Option<String>,
    pub header: Option<String>,
    #[serde(default)]
    pub entity: bool,
}

impl ParameterConfig {
    #[must_use]
    pub fn to_decl(&self) -> ParamDecl {
        let named = [
            self.path.clone().map(ParamAnnotation::Path),
            self.query.clone().map(ParamAnnotation::Query),
            self.form.clone().map(ParamAnnotation::Form),
            self.header.clone().map(ParamAnnotation::Header),
        ];
        let mut decl = named
            .into_iter()
            .flatten()
            .fold(ParamDecl::unused(), ParamDecl::with);
        if self.entity {
            decl = decl.with(ParamAnnotation::Entity);
        }
        decl
    }
}
