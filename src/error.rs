use crate::constants;
use crate::descriptor::ParamRole;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Classification of every failure the engine can surface.
///
/// Metadata and declaration errors are endpoint/operation invariants and are
/// reported once, at registration. Build, transport and response errors are
/// per call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The endpoint declaration itself is structurally invalid.
    Metadata,
    /// Declared metadata disagrees with how an operation is used.
    Declaration,
    /// Translating one invocation into a request failed.
    Build,
    /// The transport could not complete the exchange.
    Transport,
    /// The response could not be turned into a result.
    Response,
    /// Configuration files or catalog entries are unusable.
    Configuration,
    /// Anything else.
    Internal,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Metadata => "Metadata",
            Self::Declaration => "Declaration",
            Self::Build => "Build",
            Self::Transport => "Transport",
            Self::Response => "Response",
            Self::Configuration => "Configuration",
            Self::Internal => "Internal",
        };
        f.write_str(name)
    }
}

/// Diagnostic snapshot of one invocation.
///
/// Carries argument *kinds* only, never argument values, so it is safe to log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvocationSummary {
    pub endpoint: String,
    pub operation: String,
    pub arguments: Vec<&'static str>,
}

impl fmt::Display for InvocationSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}({})",
            self.endpoint,
            self.operation,
            self.arguments.join(", ")
        )
    }
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Configuration error: {0}")]
    Config(String),

    // Metadata errors
    #[error("Endpoint '{endpoint}' does not declare a host")]
    MissingHost { endpoint: String },
    #[error("Endpoint '{endpoint}' declares a malformed port '{port}'")]
    MalformedPort { endpoint: String, port: String },
    #[error("Endpoint '{endpoint}' does not form a valid base URI: {reason}")]
    InvalidBaseUri { endpoint: String, reason: String },

    // Declaration errors
    #[error(
        "Parameter #{index} of '{endpoint}.{operation}' declares more than one role ({roles})"
    )]
    AmbiguousParameterRole {
        endpoint: String,
        operation: String,
        index: usize,
        roles: String,
    },
    #[error("'{endpoint}.{operation}' declares {count} entity parameters, at most one is allowed")]
    MultipleEntity {
        endpoint: String,
        operation: String,
        count: usize,
    },
    #[error("No deserializer is declared for '{endpoint}.{operation}' returning {return_type}")]
    DeserializerUndefined {
        endpoint: String,
        operation: String,
        return_type: String,
    },
    #[error("Deserializer '{tag}' produces {output}, which is not assignable to {declared}")]
    DeserializerNotAssignable {
        tag: String,
        output: String,
        declared: String,
    },
    #[error("Deserializer '{tag}' is not registered")]
    UnknownDeserializer { tag: String },
    #[error("Endpoint '{name}' is already registered")]
    DuplicateEndpoint { name: String },
    #[error("Endpoint '{endpoint}' declares operation '{operation}' more than once")]
    DuplicateOperation { endpoint: String, operation: String },
    #[error("Invalid HTTP method '{method}'")]
    InvalidHttpMethod { method: String },

    // Build errors
    #[error("Failed to build request for {context}: {source}")]
    RequestBuild {
        context: InvocationSummary,
        #[source]
        source: Box<Error>,
    },
    #[error("Cannot resolve a request entity from a {kind} argument: {reason}")]
    EntityResolution { kind: &'static str, reason: String },
    #[error("Path parameter '{name}' is not text-representable (got {kind})")]
    NonTextualPathParameter { name: String, kind: &'static str },
    #[error("{role} parameter '{name}' is not text-representable (got {kind})")]
    NonTextualParameter {
        role: ParamRole,
        name: String,
        kind: &'static str,
    },
    #[error("Invalid header '{name}': {reason}")]
    InvalidHeader { name: String, reason: String },
    #[error("Interceptor rejected request for {context}: {reason}")]
    Interceptor {
        context: InvocationSummary,
        reason: String,
    },

    // Transport errors
    #[error("Request failed: {reason}")]
    RequestFailed { reason: String },
    #[error("Failed to read response: {reason}")]
    ResponseReadError { reason: String },
    #[error("Transport failed for {context}: {source}")]
    Transport {
        context: InvocationSummary,
        #[source]
        source: Box<Error>,
    },

    // Response errors
    #[error("Deserializer '{tag}' failed: {reason}")]
    Deserialization { tag: String, reason: String },

    // Dispatch errors
    #[error("Endpoint '{name}' is not registered")]
    UnknownEndpoint { name: String },
    #[error("Endpoint '{endpoint}' has no operation named '{operation}'")]
    UnknownOperation { endpoint: String, operation: String },
    #[error("'{endpoint}.{operation}' expects {expected} arguments but received {actual}")]
    ArgumentCount {
        endpoint: String,
        operation: String,
        expected: usize,
        actual: usize,
    },

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

/// JSON representation of an error for structured output
#[derive(Debug, Serialize, Deserialize)]
pub struct JsonError {
    pub error_type: String,
    pub message: String,
    pub context: Option<String>,
}

impl Error {
    /// Classifies the error according to the engine's taxonomy.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::MissingHost { .. } | Self::MalformedPort { .. } | Self::InvalidBaseUri { .. } => {
                ErrorKind::Metadata
            }
            Self::AmbiguousParameterRole { .. }
            | Self::MultipleEntity { .. }
            | Self::DeserializerUndefined { .. }
            | Self::DeserializerNotAssignable { .. }
            | Self::UnknownDeserializer { .. }
            | Self::DuplicateEndpoint { .. }
            | Self::DuplicateOperation { .. }
            | Self::InvalidHttpMethod { .. }
            | Self::UnknownEndpoint { .. }
            | Self::UnknownOperation { .. }
            | Self::ArgumentCount { .. } => ErrorKind::Declaration,
            Self::RequestBuild { .. }
            | Self::EntityResolution { .. }
            | Self::NonTextualPathParameter { .. }
            | Self::NonTextualParameter { .. }
            | Self::InvalidHeader { .. }
            | Self::Interceptor { .. } => ErrorKind::Build,
            Self::Network(_)
            | Self::RequestFailed { .. }
            | Self::ResponseReadError { .. }
            | Self::Transport { .. } => ErrorKind::Transport,
            Self::Deserialization { .. } | Self::Json(_) => ErrorKind::Response,
            Self::Config(_) | Self::Toml(_) | Self::Io(_) => ErrorKind::Configuration,
            Self::Anyhow(_) => ErrorKind::Internal,
        }
    }

    /// Returns the innermost error, looking through build and execution wrappers.
    #[must_use]
    pub fn root_cause(&self) -> &Self {
        match self {
            Self::RequestBuild { source, .. } | Self::Transport { source, .. } => {
                source.root_cause()
            }
            _ => self,
        }
    }

    /// Returns the invocation summary attached to per-call errors.
    #[must_use]
    pub const fn invocation(&self) -> Option<&InvocationSummary> {
        match self {
            Self::RequestBuild { context, .. }
            | Self::Transport { context, .. }
            | Self::Interceptor { context, .. } => Some(context),
            _ => None,
        }
    }

    /// Convert error to JSON representation for structured output
    #[must_use]
    pub fn to_json(&self) -> JsonError {
        let context = match self.root_cause() {
            Self::Network(req_err) if req_err.is_connect() => {
                Some(constants::ERR_CONNECTION)
            }
            Self::Network(req_err) if req_err.is_timeout() => {
                Some(constants::ERR_TIMEOUT)
            }
            Self::MissingHost { .. } | Self::MalformedPort { .. } => {
                Some(constants::ERR_ENDPOINT_METADATA)
            }
            Self::DeserializerUndefined { .. } => {
                Some(constants::ERR_DESERIALIZER)
            }
            Self::UnknownEndpoint { .. } | Self::UnknownOperation { .. } => {
                Some(constants::ERR_UNKNOWN_ENDPOINT)
            }
            Self::Toml(_) => Some(constants::ERR_TOML_SYNTAX),
            _ => None,
        };

        JsonError {
            error_type: self.kind().to_string(),
            message: self.to_string(),
            context: context.map(str::to_string),
        }
    }
}
