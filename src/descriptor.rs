//! Immutable endpoint and operation declarations.
//!
//! Descriptors are produced once, either by hand, by a generated adapter, or
//! from the TOML catalog, and are shared behind `Arc` by every invocation.

use crate::engine::interceptor::Interceptor;
use crate::engine::session::ClientFactory;
use crate::error::Error;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    #[default]
    Get,
    Post,
    Put,
    Delete,
    Head,
    Trace,
    Options,
}

impl HttpMethod {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
            Self::Head => "HEAD",
            Self::Trace => "TRACE",
            Self::Options => "OPTIONS",
        }
    }

    /// POST and PUT carry a body; every other method is query-only.
    #[must_use]
    pub const fn carries_body(&self) -> bool {
        matches!(self, Self::Post | Self::Put)
    }

    #[must_use]
    pub fn to_reqwest(&self) -> reqwest::Method {
        match self {
            Self::Get => reqwest::Method::GET,
            Self::Post => reqwest::Method::POST,
            Self::Put => reqwest::Method::PUT,
            Self::Delete => reqwest::Method::DELETE,
            Self::Head => reqwest::Method::HEAD,
            Self::Trace => reqwest::Method::TRACE,
            Self::Options => reqwest::Method::OPTIONS,
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HttpMethod {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "GET" => Ok(Self::Get),
            "POST" => Ok(Self::Post),
            "PUT" => Ok(Self::Put),
            "DELETE" => Ok(Self::Delete),
            "HEAD" => Ok(Self::Head),
            "TRACE" => Ok(Self::Trace),
            "OPTIONS" => Ok(Self::Options),
            _ => Err(Error::InvalidHttpMethod {
                method: s.to_string(),
            }),
        }
    }
}

/// Role a parameter plays in request construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParamRole {
    Path,
    Query,
    Form,
    Header,
    Entity,
    /// An unannotated parameter carrying an asynchronous result handler.
    Callback,
    Unused,
}

impl ParamRole {
    /// Roles in classification precedence order.
    pub const PRECEDENCE: [Self; 5] = [
        Self::Path,
        Self::Query,
        Self::Form,
        Self::Header,
        Self::Entity,
    ];

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Path => "path",
            Self::Query => "query",
            Self::Form => "form",
            Self::Header => "header",
            Self::Entity => "entity",
            Self::Callback => "callback",
            Self::Unused => "unused",
        }
    }

    #[must_use]
    pub fn precedence(&self) -> usize {
        Self::PRECEDENCE
            .iter()
            .position(|role| role == self)
            .unwrap_or(Self::PRECEDENCE.len())
    }
}

impl fmt::Display for ParamRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single role annotation attached to an operation parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamAnnotation {
    Path(String),
    Query(String),
    Form(String),
    Header(String),
    Entity,
}

impl ParamAnnotation {
    #[must_use]
    pub const fn role(&self) -> ParamRole {
        match self {
            Self::Path(_) => ParamRole::Path,
            Self::Query(_) => ParamRole::Query,
            Self::Form(_) => ParamRole::Form,
            Self::Header(_) => ParamRole::Header,
            Self::Entity => ParamRole::Entity,
        }
    }

    #[must_use]
    pub fn name(&self) -> Option<&str> {
        match self {
            Self::Path(name) | Self::Query(name) | Self::Form(name) | Self::Header(name) => {
                Some(name)
            }
            Self::Entity => None,
        }
    }
}

/// Declared annotations of one operation parameter, in declaration order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParamDecl {
    pub annotations: Vec<ParamAnnotation>,
}

impl ParamDecl {
    #[must_use]
    pub fn path(name: impl Into<String>) -> Self {
        Self::unused().with(ParamAnnotation::Path(name.into()))
    }

    #[must_use]
    pub fn query(name: impl Into<String>) -> Self {
        Self::unused().with(ParamAnnotation::Query(name.into()))
    }

    #[must_use]
    pub fn form(name: impl Into<String>) -> Self {
        Self::unused().with(ParamAnnotation::Form(name.into()))
    }

    #[must_use]
    pub fn header(name: impl Into<String>) -> Self {
        Self::unused().with(ParamAnnotation::Header(name.into()))
    }

    #[must_use]
    pub fn entity() -> Self {
        Self::unused().with(ParamAnnotation::Entity)
    }

    /// A parameter with no annotation. Unused parameters may still carry a
    /// callback or become the implicit entity of a body-carrying request.
    #[must_use]
    pub const fn unused() -> Self {
        Self {
            annotations: Vec::new(),
        }
    }

    #[must_use]
    pub fn with(mut self, annotation: ParamAnnotation) -> Self {
        self.annotations.push(annotation);
        self
    }
}

/// A statically declared name/value pair (request parameter or header).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NameValue {
    pub name: String,
    pub value: String,
}

impl NameValue {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// The declared return type of an operation, or the output type of a
/// deserializer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    /// No value is returned.
    #[default]
    Unit,
    Text,
    Bytes,
    Json,
    /// A type produced by a user-registered deserializer.
    Custom(String),
}

impl ValueType {
    #[must_use]
    pub const fn is_text(&self) -> bool {
        matches!(self, Self::Text)
    }

    /// Whether a deserializer producing `output` may satisfy this declared type.
    #[must_use]
    pub fn is_assignable_from(&self, output: &Self) -> bool {
        *self == Self::Unit || self == output
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unit => f.write_str("unit"),
            Self::Text => f.write_str("text"),
            Self::Bytes => f.write_str("bytes"),
            Self::Json => f.write_str("json"),
            Self::Custom(name) => f.write_str(name),
        }
    }
}

/// One declared operation of an endpoint.
#[derive(Clone)]
pub struct RequestDescriptor {
    pub name: String,
    pub method: HttpMethod,
    /// Sub-path relative to the endpoint root; may contain `:name` placeholders.
    pub path: String,
    /// Static request parameters, applied before bound query/form values.
    pub params: Vec<NameValue>,
    /// Static headers, applied before bound header values.
    pub headers: Vec<NameValue>,
    pub parameters: Vec<ParamDecl>,
    pub returns: ValueType,
    pub deserializer: Option<String>,
    pub asynchronous: bool,
    pub stateful: bool,
    pub interceptors: Vec<Arc<dyn Interceptor>>,
}

impl RequestDescriptor {
    pub fn new(name: impl Into<String>, method: HttpMethod, path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            method,
            path: path.into(),
            params: Vec::new(),
            headers: Vec::new(),
            parameters: Vec::new(),
            returns: ValueType::Unit,
            deserializer: None,
            asynchronous: false,
            stateful: false,
            interceptors: Vec::new(),
        }
    }

    pub fn get(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self::new(name, HttpMethod::Get, path)
    }

    pub fn post(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self::new(name, HttpMethod::Post, path)
    }

    pub fn put(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self::new(name, HttpMethod::Put, path)
    }

    #[must_use]
    pub fn with_param(mut self, decl: ParamDecl) -> Self {
        self.parameters.push(decl);
        self
    }

    #[must_use]
    pub fn with_static_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push(NameValue::new(name, value));
        self
    }

    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push(NameValue::new(name, value));
        self
    }

    #[must_use]
    pub fn returning(mut self, returns: ValueType) -> Self {
        self.returns = returns;
        self
    }

    #[must_use]
    pub fn with_deserializer(mut self, tag: impl Into<String>) -> Self {
        self.deserializer = Some(tag.into());
        self
    }

    #[must_use]
    pub const fn asynchronous(mut self) -> Self {
        self.asynchronous = true;
        self
    }

    #[must_use]
    pub const fn stateful(mut self) -> Self {
        self.stateful = true;
        self
    }

    #[must_use]
    pub fn with_interceptor(mut self, interceptor: Arc<dyn Interceptor>) -> Self {
        self.interceptors.push(interceptor);
        self
    }
}

impl fmt::Debug for RequestDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestDescriptor")
            .field("name", &self.name)
            .field("method", &self.method)
            .field("path", &self.path)
            .field("params", &self.params)
            .field("headers", &self.headers)
            .field("parameters", &self.parameters)
            .field("returns", &self.returns)
            .field("deserializer", &self.deserializer)
            .field("asynchronous", &self.asynchronous)
            .field("stateful", &self.stateful)
            .field("interceptors", &self.interceptors.len())
            .finish()
    }
}

/// A remote service: where it lives and which operations it exposes.
#[derive(Clone)]
pub struct EndpointDescriptor {
    pub name: String,
    pub scheme: String,
    pub host: String,
    /// Kept as declared; validated when the base URI is resolved.
    pub port: Option<String>,
    pub path: String,
    pub deserializer: Option<String>,
    pub client: Option<Arc<dyn ClientFactory>>,
    pub stateful: bool,
    pub asynchronous: bool,
    pub interceptors: Vec<Arc<dyn Interceptor>>,
    pub operations: Vec<Arc<RequestDescriptor>>,
}

impl EndpointDescriptor {
    pub fn new(name: impl Into<String>, host: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            scheme: "http".to_string(),
            host: host.into(),
            port: None,
            path: String::new(),
            deserializer: None,
            client: None,
            stateful: false,
            asynchronous: false,
            interceptors: Vec::new(),
            operations: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_scheme(mut self, scheme: impl Into<String>) -> Self {
        self.scheme = scheme.into();
        self
    }

    #[must_use]
    pub fn with_port(mut self, port: impl Into<String>) -> Self {
        self.port = Some(port.into());
        self
    }

    #[must_use]
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    #[must_use]
    pub fn with_deserializer(mut self, tag: impl Into<String>) -> Self {
        self.deserializer = Some(tag.into());
        self
    }

    #[must_use]
    pub fn with_client_factory(mut self, factory: Arc<dyn ClientFactory>) -> Self {
        self.client = Some(factory);
        self
    }

    #[must_use]
    pub const fn stateful(mut self) -> Self {
        self.stateful = true;
        self
    }

    #[must_use]
    pub const fn asynchronous(mut self) -> Self {
        self.asynchronous = true;
        self
    }

    #[must_use]
    pub fn with_interceptor(mut self, interceptor: Arc<dyn Interceptor>) -> Self {
        self.interceptors.push(interceptor);
        self
    }

    #[must_use]
    pub fn with_operation(mut self, operation: RequestDescriptor) -> Self {
        self.operations.push(Arc::new(operation));
        self
    }

    #[must_use]
    pub fn operation(&self, name: &str) -> Option<&Arc<RequestDescriptor>> {
        self.operations.iter().find(|op| op.name == name)
    }

    /// An operation is stateful if it or its endpoint says so.
    #[must_use]
    pub const fn is_stateful_for(&self, operation: &RequestDescriptor) -> bool {
        self.stateful || operation.stateful
    }

    /// An operation is asynchronous if it or its endpoint says so.
    #[must_use]
    pub const fn is_async_for(&self, operation: &RequestDescriptor) -> bool {
        self.asynchronous || operation.asynchronous
    }
}

impl fmt::Debug for EndpointDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EndpointDescriptor")
            .field("name", &self.name)
            .field("scheme", &self.scheme)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("path", &self.path)
            .field("deserializer", &self.deserializer)
            .field("client", &self.client.is_some())
            .field("stateful", &self.stateful)
            .field("asynchronous", &self.asynchronous)
            .field("interceptors", &self.interceptors.len())
            .field("operations", &self.operations)
            .finish()
    }
}
