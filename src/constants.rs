//! Centralized string constants for the tether engine and CLI

// Header name fragments that mark a header as sensitive
pub const HEADER_PREFIX_X_AUTH: &str = "x-auth-";
pub const HEADER_PREFIX_X_API: &str = "x-api-";

// Content Types
pub const CONTENT_TYPE_JSON: &str = "application/json";
pub const CONTENT_TYPE_FORM: &str = "application/x-www-form-urlencoded";
pub const CONTENT_TYPE_TEXT: &str = "text/plain; charset=utf-8";
pub const CONTENT_TYPE_OCTET_STREAM: &str = "application/octet-stream";

// Built-in deserializer tags
pub const DESERIALIZER_PLAIN: &str = "plain";
pub const DESERIALIZER_JSON: &str = "json";
pub const DESERIALIZER_RAW: &str = "raw";

// Connection and worker defaults
pub const DEFAULT_MAX_TOTAL_CONNECTIONS: usize = 128;
pub const DEFAULT_MAX_PER_ROUTE: usize = 4;
pub const DEFAULT_ASYNC_WORKERS: usize = 16;
pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 10_000;
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

// Environment Variables
pub const ENV_TETHER_CONFIG_DIR: &str = "TETHER_CONFIG_DIR";
pub const ENV_TETHER_LOG: &str = "TETHER_LOG";
pub const ENV_TETHER_LOG_FORMAT: &str = "TETHER_LOG_FORMAT";
pub const ENV_TETHER_LOG_FILE: &str = "TETHER_LOG_FILE";
pub const ENV_TETHER_LOG_MAX_BODY: &str = "TETHER_LOG_MAX_BODY";

// Configuration layout
pub const CONFIG_DIR_NAME: &str = "tether";
pub const CONFIG_FILE_NAME: &str = "config.toml";

// Error Context Messages
pub const ERR_CONNECTION: &str = "Check that the API server is running and accessible.";
pub const ERR_TIMEOUT: &str = "The API server may be slow or unresponsive. Try again later.";
pub const ERR_ENDPOINT_METADATA: &str = "Check the endpoint's host and port declarations.";
pub const ERR_DESERIALIZER: &str = "Declare a deserializer on the operation or its endpoint.";
pub const ERR_UNKNOWN_ENDPOINT: &str = "Use 'tether endpoints' to list the declared endpoints.";
pub const ERR_TOML_SYNTAX: &str = "Check that your configuration file is valid TOML syntax.";
