//! Wire-level logging for requests and responses.
//!
//! Everything here logs under the `tether::executor` target. Headers that
//! carry credentials or session state are redacted before they are written.

use crate::constants;
use crate::engine::request::RequestBody;
use reqwest::header::HeaderMap;
use tracing::{debug, info, trace};

const REDACTED: &str = "[REDACTED]";

/// Checks if a header name should be redacted
#[must_use]
pub fn should_redact_header(header_name: &str) -> bool {
    let lower = header_name.to_lowercase();
    if lower.starts_with(constants::HEADER_PREFIX_X_AUTH)
        || lower.starts_with(constants::HEADER_PREFIX_X_API)
    {
        return true;
    }
    matches!(
        lower.as_str(),
        "authorization"
            | "proxy-authorization"
            | "cookie"
            | "set-cookie"
            | "x-access-token"
            | "api-key"
            | "api_key"
            | "token"
            | "secret"
            | "password"
    )
}

fn log_headers(direction: &str, headers: &HeaderMap) {
    if headers.is_empty() {
        return;
    }
    debug!(target: "tether::executor", "{direction} headers:");
    for (name, value) in headers {
        let header_str = name.as_str();
        let display_value = if should_redact_header(header_str) {
            REDACTED.to_string()
        } else {
            String::from_utf8_lossy(value.as_bytes()).to_string()
        };
        debug!(target: "tether::executor", "  {}: {}", header_str, display_value);
    }
}

/// Logs an outgoing request: the request line at info, headers at debug and
/// the body (when it is in memory) at trace.
pub fn log_request(method: &str, url: &str, headers: &HeaderMap, body: Option<&RequestBody>) {
    info!(target: "tether::executor", "→ {} {}", method, url);
    log_headers("Request", headers);

    let Some(body) = body else {
        return;
    };
    match body.in_memory() {
        Some(bytes) => trace!(
            target: "tether::executor",
            "Request body ({}): {}",
            body.content_type(),
            truncate(&String::from_utf8_lossy(bytes), get_max_body_len())
        ),
        None => trace!(
            target: "tether::executor",
            "Request body ({}): <{} stream>",
            body.content_type(),
            body.kind()
        ),
    }
}

/// Logs a received response: status and duration at info, headers at debug
/// and a truncated body at trace.
pub fn log_response(status: u16, duration_ms: u128, headers: &HeaderMap, body: Option<&[u8]>) {
    info!(target: "tether::executor", "← {} ({}ms)", status, duration_ms);
    log_headers("Response", headers);

    match body {
        Some(bytes) => trace!(
            target: "tether::executor",
            "Response body: {}",
            truncate(&String::from_utf8_lossy(bytes), get_max_body_len())
        ),
        None => trace!(target: "tether::executor", "Response carries no body"),
    }
}

/// Cuts `text` to at most `max_len` bytes on a character boundary.
#[must_use]
pub fn truncate(text: &str, max_len: usize) -> String {
    if text.len() <= max_len {
        return text.to_string();
    }
    let mut end = max_len;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{} (truncated at {} bytes)", &text[..end], max_len)
}

/// Gets the maximum logged body length from `TETHER_LOG_MAX_BODY`
#[must_use]
pub fn get_max_body_len() -> usize {
    std::env::var(constants::ENV_TETHER_LOG_MAX_BODY)
        .ok()
        .and_then(|s| s.parse::<usize>().ok())
        .unwrap_or(1000)
}
