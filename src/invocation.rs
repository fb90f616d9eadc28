//! Per-call invocation model.
//!
//! An invocation pairs a registered operation with the positional
//! [`Argument`]s supplied by the caller. The engine classifies those arguments
//! into [`Binding`]s, builds a request from them, and hands back an
//! [`Outcome`]. These types are frontend-agnostic: the CLI builds them from
//! clap matches, library callers build them directly.

use crate::descriptor::{EndpointDescriptor, ParamRole, RequestDescriptor};
use crate::engine::deserializer::Payload;
use crate::engine::request::RequestBody;
use crate::error::{Error, InvocationSummary};
use bytes::Bytes;
use reqwest::header::HeaderMap;
use reqwest::Url;
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use std::sync::{Arc, PoisonError, RwLock};
use tokio::io::AsyncRead;

/// A shared, mutable header cell.
///
/// Bound to a header parameter, its current value is sent with the request.
/// When the response carries a header of the same name, the slot is updated
/// in place so the caller observes the new value.
#[derive(Debug, Clone, Default)]
pub struct HeaderSlot(Arc<RwLock<Option<String>>>);

impl HeaderSlot {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_value(value: impl Into<String>) -> Self {
        Self(Arc::new(RwLock::new(Some(value.into()))))
    }

    #[must_use]
    pub fn get(&self) -> Option<String> {
        self.0
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn set(&self, value: impl Into<String>) {
        *self.0.write().unwrap_or_else(PoisonError::into_inner) = Some(value.into());
    }
}

/// Receives the outcome of an asynchronous invocation.
///
/// Exactly one method is called per request that reaches the transport.
pub trait AsyncHandler: Send + Sync {
    /// The exchange completed with a 2xx status.
    fn on_success(&self, result: InvocationResult);

    /// The exchange completed with a non-2xx status.
    fn on_failure(&self, result: InvocationResult);

    /// The request could not be executed or its response could not be processed.
    fn on_error(&self, error: Error) {
        let _ = error;
    }
}

/// One positional value supplied to an invocation.
pub enum Argument {
    /// No value (an optional parameter left empty).
    Absent,
    Text(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
    Bytes(Bytes),
    /// A file whose contents become the request entity.
    File(PathBuf),
    /// A byte stream whose contents become the request entity.
    Reader(Box<dyn AsyncRead + Send + Sync + Unpin>),
    /// An already-formed request body.
    Body(RequestBody),
    /// A structured value, serialized to a binary entity when sent as a body.
    Serializable(serde_json::Value),
    Header(HeaderSlot),
    Callback(Arc<dyn AsyncHandler>),
}

impl Argument {
    /// Wraps any serializable value.
    ///
    /// # Errors
    ///
    /// Returns an error if the value cannot be represented as JSON.
    pub fn serializable<T: Serialize>(value: &T) -> Result<Self, Error> {
        Ok(Self::Serializable(serde_json::to_value(value)?))
    }

    pub fn reader(reader: impl AsyncRead + Send + Sync + Unpin + 'static) -> Self {
        Self::Reader(Box::new(reader))
    }

    pub fn callback(handler: impl AsyncHandler + 'static) -> Self {
        Self::Callback(Arc::new(handler))
    }

    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Absent => "absent",
            Self::Text(_) => "text",
            Self::Integer(_) => "integer",
            Self::Float(_) => "float",
            Self::Bool(_) => "bool",
            Self::Bytes(_) => "bytes",
            Self::File(_) => "file",
            Self::Reader(_) => "reader",
            Self::Body(_) => "body",
            Self::Serializable(_) => "serializable",
            Self::Header(_) => "header",
            Self::Callback(_) => "callback",
        }
    }

    #[must_use]
    pub const fn is_absent(&self) -> bool {
        matches!(self, Self::Absent)
    }

    /// Text rendering of scalar values, used for path substitution.
    #[must_use]
    pub fn scalar_text(&self) -> Option<String> {
        match self {
            Self::Text(text) => Some(text.clone()),
            Self::Integer(value) => Some(value.to_string()),
            Self::Float(value) => Some(value.to_string()),
            Self::Bool(value) => Some(value.to_string()),
            _ => None,
        }
    }
}

impl fmt::Debug for Argument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(text) => f.debug_tuple("Text").field(text).finish(),
            Self::Integer(value) => f.debug_tuple("Integer").field(value).finish(),
            Self::Float(value) => f.debug_tuple("Float").field(value).finish(),
            Self::Bool(value) => f.debug_tuple("Bool").field(value).finish(),
            Self::Bytes(data) => write!(f, "Bytes({} bytes)", data.len()),
            Self::File(path) => f.debug_tuple("File").field(path).finish(),
            Self::Serializable(value) => f.debug_tuple("Serializable").field(value).finish(),
            Self::Header(slot) => f.debug_tuple("Header").field(&slot.get()).finish(),
            other => f.write_str(other.kind()),
        }
    }
}

impl From<&str> for Argument {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for Argument {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<i64> for Argument {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<f64> for Argument {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<bool> for Argument {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<Vec<u8>> for Argument {
    fn from(value: Vec<u8>) -> Self {
        Self::Bytes(Bytes::from(value))
    }
}

impl From<Bytes> for Argument {
    fn from(value: Bytes) -> Self {
        Self::Bytes(value)
    }
}

impl From<PathBuf> for Argument {
    fn from(value: PathBuf) -> Self {
        Self::File(value)
    }
}

impl From<HeaderSlot> for Argument {
    fn from(value: HeaderSlot) -> Self {
        Self::Header(value)
    }
}

impl From<RequestBody> for Argument {
    fn from(value: RequestBody) -> Self {
        Self::Body(value)
    }
}

impl<T: Into<Self>> From<Option<T>> for Argument {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Absent, Into::into)
    }
}

/// One classified argument.
#[derive(Debug)]
pub struct Binding {
    /// Position of the parameter in the operation's declaration.
    pub index: usize,
    /// The annotation's name; `None` for entity, callback and unused bindings.
    pub name: Option<String>,
    pub role: ParamRole,
    /// Entity values are moved out to the entity stage and left `Absent` here.
    pub value: Argument,
}

/// Everything the build chain and executor need to know about one call.
pub struct InvocationContext {
    pub endpoint: Arc<EndpointDescriptor>,
    pub operation: Arc<RequestDescriptor>,
    pub base_url: Url,
    pub bindings: Vec<Binding>,
    pub callback: Option<Arc<dyn AsyncHandler>>,
}

impl InvocationContext {
    pub fn bindings_with_role(&self, role: ParamRole) -> impl Iterator<Item = &Binding> {
        self.bindings.iter().filter(move |binding| binding.role == role)
    }

    #[must_use]
    pub fn is_async(&self) -> bool {
        self.endpoint.is_async_for(&self.operation)
    }

    #[must_use]
    pub fn is_stateful(&self) -> bool {
        self.endpoint.is_stateful_for(&self.operation)
    }

    #[must_use]
    pub fn summary(&self) -> InvocationSummary {
        InvocationSummary {
            endpoint: self.endpoint.name.clone(),
            operation: self.operation.name.clone(),
            arguments: self
                .bindings
                .iter()
                .map(|binding| match binding.role {
                    ParamRole::Entity => "entity",
                    _ => binding.value.kind(),
                })
                .collect(),
        }
    }
}

impl fmt::Debug for InvocationContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InvocationContext")
            .field("endpoint", &self.endpoint.name)
            .field("operation", &self.operation.name)
            .field("base_url", &self.base_url.as_str())
            .field("bindings", &self.bindings)
            .field("callback", &self.callback.is_some())
            .finish()
    }
}

/// The processed response of a completed exchange.
///
/// A non-2xx status is not an error; the caller inspects `status`.
#[derive(Debug)]
pub struct InvocationResult {
    pub status: u16,
    pub headers: HeaderMap,
    pub payload: Payload,
}

impl InvocationResult {
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }
}

/// What `invoke` hands back.
#[derive(Debug)]
pub enum Outcome {
    /// A synchronous call completed.
    Completed(InvocationResult),
    /// An asynchronous call was handed to the worker pool; its result is
    /// delivered to the callback, if one was supplied.
    Dispatched,
}

impl Outcome {
    #[must_use]
    pub const fn result(&self) -> Option<&InvocationResult> {
        match self {
            Self::Completed(result) => Some(result),
            Self::Dispatched => None,
        }
    }

    #[must_use]
    pub fn into_result(self) -> Option<InvocationResult> {
        match self {
            Self::Completed(result) => Some(result),
            Self::Dispatched => None,
        }
    }
}
