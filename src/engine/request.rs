//! The partially built HTTP request that flows through the build chain.

use crate::constants;
use crate::descriptor::HttpMethod;
use bytes::Bytes;
use reqwest::header::HeaderMap;
use reqwest::Url;
use std::fmt;
use tokio::io::AsyncRead;
use tokio_util::io::ReaderStream;

/// A request entity with its wire representation decided.
pub enum RequestBody {
    /// UTF-8 text, sent as `text/plain`.
    Text(String),
    /// A url-encoded form, sent as `application/x-www-form-urlencoded`.
    Form(String),
    /// In-memory bytes with an explicit content type.
    Bytes { data: Bytes, content_type: String },
    /// An open file, streamed as `application/octet-stream`.
    File { file: tokio::fs::File, len: u64 },
    /// An arbitrary byte stream, sent as `application/octet-stream`.
    Stream(Box<dyn AsyncRead + Send + Sync + Unpin>),
}

impl RequestBody {
    /// Binary data sent as `application/octet-stream`.
    pub fn binary(data: impl Into<Bytes>) -> Self {
        Self::Bytes {
            data: data.into(),
            content_type: constants::CONTENT_TYPE_OCTET_STREAM.to_string(),
        }
    }

    /// Serializes `value` as a JSON entity.
    ///
    /// # Errors
    ///
    /// Returns an error if the value cannot be serialized.
    pub fn json<T: serde::Serialize>(value: &T) -> Result<Self, serde_json::Error> {
        Ok(Self::Bytes {
            data: Bytes::from(serde_json::to_vec(value)?),
            content_type: constants::CONTENT_TYPE_JSON.to_string(),
        })
    }

    #[must_use]
    pub fn content_type(&self) -> &str {
        match self {
            Self::Text(_) => constants::CONTENT_TYPE_TEXT,
            Self::Form(_) => constants::CONTENT_TYPE_FORM,
            Self::Bytes { content_type, .. } => content_type,
            Self::File { .. } | Self::Stream(_) => constants::CONTENT_TYPE_OCTET_STREAM,
        }
    }

    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Text(_) => "text",
            Self::Form(_) => "form",
            Self::Bytes { .. } => "bytes",
            Self::File { .. } => "file",
            Self::Stream(_) => "stream",
        }
    }

    /// The body's bytes, if it is held in memory.
    #[must_use]
    pub fn in_memory(&self) -> Option<&[u8]> {
        match self {
            Self::Text(text) | Self::Form(text) => Some(text.as_bytes()),
            Self::Bytes { data, .. } => Some(data.as_ref()),
            Self::File { .. } | Self::Stream(_) => None,
        }
    }

    #[must_use]
    pub fn into_body(self) -> reqwest::Body {
        match self {
            Self::Text(text) | Self::Form(text) => reqwest::Body::from(text),
            Self::Bytes { data, .. } => reqwest::Body::from(data),
            Self::File { file, .. } => reqwest::Body::from(file),
            Self::Stream(reader) => reqwest::Body::wrap_stream(ReaderStream::new(reader)),
        }
    }
}

impl fmt::Debug for RequestBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(text) => f.debug_tuple("Text").field(text).finish(),
            Self::Form(form) => f.debug_tuple("Form").field(form).finish(),
            Self::Bytes { data, content_type } => f
                .debug_struct("Bytes")
                .field("len", &data.len())
                .field("content_type", content_type)
                .finish(),
            Self::File { len, .. } => f.debug_struct("File").field("len", len).finish(),
            Self::Stream(_) => f.write_str("Stream"),
        }
    }
}

/// A request under construction.
///
/// The build chain starts from the endpoint's base URL and each stage refines
/// the URL, headers and body in turn.
#[derive(Debug)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Option<RequestBody>,
}

impl HttpRequest {
    #[must_use]
    pub fn new(method: HttpMethod, url: Url) -> Self {
        Self {
            method,
            url,
            headers: HeaderMap::new(),
            body: None,
        }
    }

    /// The body as UTF-8 text, if it is held in memory and valid UTF-8.
    #[must_use]
    pub fn body_text(&self) -> Option<&str> {
        self.body
            .as_ref()
            .and_then(RequestBody::in_memory)
            .and_then(|bytes| std::str::from_utf8(bytes).ok())
    }

    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|value| value.to_str().ok())
    }
}

/// Encodes name/value pairs as `application/x-www-form-urlencoded`.
#[must_use]
pub fn encode_pairs(pairs: &[(String, String)]) -> String {
    url::form_urlencoded::Serializer::new(String::new())
        .extend_pairs(pairs)
        .finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_pairs_preserves_order_and_escapes() {
        let pairs = vec![
            ("q".to_string(), "a b".to_string()),
            ("lang".to_string(), "en&fr".to_string()),
        ];
        assert_eq!(encode_pairs(&pairs), "q=a+b&lang=en%26fr");
    }

    #[test]
    fn test_body_content_types() {
        assert_eq!(
            RequestBody::Text("x".into()).content_type(),
            constants::CONTENT_TYPE_TEXT
        );
        assert_eq!(
            RequestBody::Form("a=b".into()).content_type(),
            constants::CONTENT_TYPE_FORM
        );
        assert_eq!(
            RequestBody::binary(vec![1_u8]).content_type(),
            constants::CONTENT_TYPE_OCTET_STREAM
        );
        let json = RequestBody::json(&serde_json::json!({"a": 1})).unwrap();
        assert_eq!(json.content_type(), constants::CONTENT_TYPE_JSON);
        assert_eq!(json.in_memory(), Some(&b"{\"a\":1}"[..]));
    }
}
