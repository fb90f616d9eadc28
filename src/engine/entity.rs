//! Turns an entity argument into a request body.
//!
//! Argument kinds are checked in a fixed order and the first match wins:
//! an already-formed body, raw bytes, a file, a reader, text, and finally
//! any serializable value, which is encoded with postcard and sent as
//! `application/octet-stream`.

use crate::engine::request::RequestBody;
use crate::error::Error;
use crate::invocation::Argument;
use bytes::Bytes;

/// Resolves `argument` into a [`RequestBody`].
///
/// # Errors
///
/// Returns `EntityResolution` if the argument has no wire representation or
/// if a file cannot be opened or a value cannot be serialized.
pub async fn resolve(argument: Argument) -> Result<RequestBody, Error> {
    let kind = argument.kind();
    match argument {
        Argument::Body(body) => Ok(body),
        Argument::Bytes(data) => Ok(RequestBody::binary(data)),
        Argument::File(path) => {
            let file = tokio::fs::File::open(&path)
                .await
                .map_err(|e| Error::EntityResolution {
                    kind,
                    reason: format!("cannot open '{}': {e}", path.display()),
                })?;
            let len = file
                .metadata()
                .await
                .map_err(|e| Error::EntityResolution {
                    kind,
                    reason: format!("cannot stat '{}': {e}", path.display()),
                })?
                .len();
            Ok(RequestBody::File { file, len })
        }
        Argument::Reader(reader) => Ok(RequestBody::Stream(reader)),
        Argument::Text(text) => Ok(RequestBody::Text(text)),
        Argument::Integer(value) => serialize(kind, &value),
        Argument::Float(value) => serialize(kind, &value),
        Argument::Bool(value) => serialize(kind, &value),
        Argument::Serializable(value) => serialize(kind, &value),
        Argument::Absent | Argument::Header(_) | Argument::Callback(_) => {
            Err(Error::EntityResolution {
                kind,
                reason: "value has no wire representation".to_string(),
            })
        }
    }
}

fn serialize<T: serde::Serialize + ?Sized>(
    kind: &'static str,
    value: &T,
) -> Result<RequestBody, Error> {
    postcard::to_allocvec(value)
        .map(|encoded| RequestBody::binary(Bytes::from(encoded)))
        .map_err(|e| Error::EntityResolution {
            kind,
            reason: e.to_string(),
        })
}
