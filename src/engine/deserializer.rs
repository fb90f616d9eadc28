//! Response deserializers and their registry.
//!
//! A deserializer is looked up by tag. The operation's tag wins over the
//! endpoint's; with neither, text-returning and asynchronous operations fall
//! back to `plain`. The chosen deserializer's output type must be assignable
//! to the operation's declared return type.

use crate::constants;
use crate::descriptor::{EndpointDescriptor, RequestDescriptor, ValueType};
use crate::error::Error;
use bytes::Bytes;
use reqwest::header::HeaderMap;
use serde::de::DeserializeOwned;
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// A deserialized response body.
pub enum Payload {
    Unit,
    Text(String),
    Bytes(Bytes),
    Json(serde_json::Value),
    Custom(Box<dyn Any + Send + Sync>),
}

impl Payload {
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_json(&self) -> Option<&serde_json::Value> {
        match self {
            Self::Json(value) => Some(value),
            _ => None,
        }
    }

    #[must_use]
    pub const fn is_unit(&self) -> bool {
        matches!(self, Self::Unit)
    }

    /// Converts a JSON payload into `T`.
    ///
    /// # Errors
    ///
    /// Returns an error if the payload is not JSON or does not match `T`.
    pub fn into_json<T: DeserializeOwned>(self) -> Result<T, Error> {
        match self {
            Self::Json(value) => Ok(serde_json::from_value(value)?),
            other => Err(Error::Deserialization {
                tag: constants::DESERIALIZER_JSON.to_string(),
                reason: format!("payload is {}, not json", other.kind()),
            }),
        }
    }

    /// Takes a custom payload as `T`, returning the payload unchanged on mismatch.
    ///
    /// # Errors
    ///
    /// Returns `self` if the payload is not a `T`.
    pub fn downcast<T: Any>(self) -> Result<T, Self> {
        match self {
            Self::Custom(value) => value.downcast::<T>().map(|boxed| *boxed).map_err(Self::Custom),
            other => Err(other),
        }
    }

    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Unit => "unit",
            Self::Text(_) => "text",
            Self::Bytes(_) => "bytes",
            Self::Json(_) => "json",
            Self::Custom(_) => "custom",
        }
    }

    /// Best-effort text rendering, used by the CLI.
    #[must_use]
    pub fn render(&self) -> Option<String> {
        match self {
            Self::Unit | Self::Custom(_) => None,
            Self::Text(text) => Some(text.clone()),
            Self::Bytes(data) => Some(String::from_utf8_lossy(data).into_owned()),
            Self::Json(value) => {
                Some(serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string()))
            }
        }
    }
}

impl fmt::Debug for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unit => f.write_str("Unit"),
            Self::Text(text) => f.debug_tuple("Text").field(text).finish(),
            Self::Bytes(data) => write!(f, "Bytes({} bytes)", data.len()),
            Self::Json(value) => f.debug_tuple("Json").field(value).finish(),
            Self::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// Converts a raw response body into a [`Payload`].
pub trait Deserializer: Send + Sync {
    /// The type of payload this deserializer produces.
    fn output_type(&self) -> ValueType;

    /// # Errors
    ///
    /// Returns an error if `body` cannot be converted.
    fn deserialize(&self, body: &Bytes, headers: &HeaderMap) -> Result<Payload, Error>;
}

/// `plain`: UTF-8 text, with invalid sequences replaced.
#[derive(Debug, Default, Clone, Copy)]
pub struct PlainTextDeserializer;

impl Deserializer for PlainTextDeserializer {
    fn output_type(&self) -> ValueType {
        ValueType::Text
    }

    fn deserialize(&self, body: &Bytes, _headers: &HeaderMap) -> Result<Payload, Error> {
        Ok(Payload::Text(String::from_utf8_lossy(body).into_owned()))
    }
}

/// `json`: any JSON document. An empty body is `null`.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonDeserializer;

impl Deserializer for JsonDeserializer {
    fn output_type(&self) -> ValueType {
        ValueType::Json
    }

    fn deserialize(&self, body: &Bytes, _headers: &HeaderMap) -> Result<Payload, Error> {
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Payload::Json(serde_json::Value::Null));
        }
        serde_json::from_slice(body)
            .map(Payload::Json)
            .map_err(|e| Error::Deserialization {
                tag: constants::DESERIALIZER_JSON.to_string(),
                reason: e.to_string(),
            })
    }
}

/// `raw`: the body bytes, untouched.
#[derive(Debug, Default, Clone, Copy)]
pub struct RawDeserializer;

impl Deserializer for RawDeserializer {
    fn output_type(&self) -> ValueType {
        ValueType::Bytes
    }

    fn deserialize(&self, body: &Bytes, _headers: &HeaderMap) -> Result<Payload, Error> {
        Ok(Payload::Bytes(body.clone()))
    }
}

/// A deserializer chosen for one operation.
#[derive(Clone)]
pub struct ResolvedDeserializer {
    pub tag: String,
    pub deserializer: Arc<dyn Deserializer>,
}

impl fmt::Debug for ResolvedDeserializer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedDeserializer")
            .field("tag", &self.tag)
            .field("output", &self.deserializer.output_type())
            .finish()
    }
}

/// Tag-keyed deserializers. Immutable once built.
pub struct DeserializerRegistry {
    entries: HashMap<String, Arc<dyn Deserializer>>,
}

impl Default for DeserializerRegistry {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl fmt::Debug for DeserializerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut tags: Vec<_> = self.entries.keys().collect();
        tags.sort();
        f.debug_struct("DeserializerRegistry")
            .field("tags", &tags)
            .finish()
    }
}

impl DeserializerRegistry {
    /// A builder pre-populated with `plain`, `json` and `raw`.
    #[must_use]
    pub fn builder() -> DeserializerRegistryBuilder {
        DeserializerRegistryBuilder::default()
            .register(constants::DESERIALIZER_PLAIN, PlainTextDeserializer)
            .register(constants::DESERIALIZER_JSON, JsonDeserializer)
            .register(constants::DESERIALIZER_RAW, RawDeserializer)
    }

    #[must_use]
    pub fn get(&self, tag: &str) -> Option<Arc<dyn Deserializer>> {
        self.entries.get(tag).cloned()
    }

    /// Chooses the deserializer for `operation` and checks assignability.
    ///
    /// # Errors
    ///
    /// Returns `DeserializerUndefined` if no tag applies, `UnknownDeserializer`
    /// if the tag is not registered and `DeserializerNotAssignable` if the
    /// output type does not fit the declared return type.
    pub fn resolve(
        &self,
        endpoint: &EndpointDescriptor,
        operation: &RequestDescriptor,
    ) -> Result<ResolvedDeserializer, Error> {
        let declared = operation
            .deserializer
            .as_deref()
            .or(endpoint.deserializer.as_deref());

        let tag = match declared {
            Some(tag) => tag,
            None if operation.returns.is_text() || endpoint.is_async_for(operation) => {
                constants::DESERIALIZER_PLAIN
            }
            None => {
                return Err(Error::DeserializerUndefined {
                    endpoint: endpoint.name.clone(),
                    operation: operation.name.clone(),
                    return_type: operation.returns.to_string(),
                })
            }
        };

        let deserializer = self.get(tag).ok_or_else(|| Error::UnknownDeserializer {
            tag: tag.to_string(),
        })?;

        let output = deserializer.output_type();
        if !operation.returns.is_assignable_from(&output) {
            return Err(Error::DeserializerNotAssignable {
                tag: tag.to_string(),
                output: output.to_string(),
                declared: operation.returns.to_string(),
            });
        }

        Ok(ResolvedDeserializer {
            tag: tag.to_string(),
            deserializer,
        })
    }
}

#[derive(Default)]
pub struct DeserializerRegistryBuilder {
    entries: HashMap<String, Arc<dyn Deserializer>>,
}

impl DeserializerRegistryBuilder {
    /// Registers `deserializer` under `tag`, replacing any previous entry.
    #[must_use]
    pub fn register(mut self, tag: impl Into<String>, deserializer: impl Deserializer + 'static) -> Self {
        self.entries.insert(tag.into(), Arc::new(deserializer));
        self
    }

    #[must_use]
    pub fn build(self) -> DeserializerRegistry {
        DeserializerRegistry {
            entries: self.entries,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bytes(text: &str) -> Bytes {
        Bytes::copy_from_slice(text.as_bytes())
    }

    #[test]
    fn test_plain_is_lossy_utf8() {
        let payload = PlainTextDeserializer
            .deserialize(&Bytes::from_static(b"ok\xff"), &HeaderMap::new())
            .unwrap();
        assert_eq!(payload.as_text(), Some("ok\u{fffd}"));
    }

    #[test]
    fn test_json_accepts_empty_body_as_null() {
        let payload = JsonDeserializer
            .deserialize(&bytes("  "), &HeaderMap::new())
            .unwrap();
        assert_eq!(payload.as_json(), Some(&serde_json::Value::Null));
    }

    #[test]
    fn test_json_rejects_malformed_body() {
        let err = JsonDeserializer
            .deserialize(&bytes("{not json"), &HeaderMap::new())
            .unwrap_err();
        assert!(matches!(err, Error::Deserialization { tag, .. } if tag == "json"));
    }

    #[test]
    fn test_into_json_converts_to_typed_value() {
        let payload = Payload::Json(serde_json::json!([1, 2, 3]));
        let numbers: Vec<u32> = payload.into_json().unwrap();
        assert_eq!(numbers, vec![1, 2, 3]);
    }

    #[test]
    fn test_downcast_custom_payload() {
        let payload = Payload::Custom(Box::new(42_u64));
        assert_eq!(payload.downcast::<u64>().ok(), Some(42));
        assert!(Payload::Unit.downcast::<u64>().is_err());
    }
}
