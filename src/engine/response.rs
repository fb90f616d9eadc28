//! Turns a response envelope into an invocation result.

use crate::descriptor::{ParamRole, ValueType};
use crate::engine::deserializer::{DeserializerRegistry, Payload};
use crate::engine::transport::ResponseEnvelope;
use crate::error::Error;
use crate::invocation::{Argument, InvocationContext, InvocationResult};
use reqwest::header::HeaderMap;
use tracing::debug;

/// Processes responses for one registry of deserializers.
#[derive(Debug, Clone, Copy)]
pub struct ResponseProcessor<'a> {
    registry: &'a DeserializerRegistry,
}

impl<'a> ResponseProcessor<'a> {
    #[must_use]
    pub const fn new(registry: &'a DeserializerRegistry) -> Self {
        Self { registry }
    }

    /// Writes response headers back into header slots and deserializes the body.
    ///
    /// Header slots are only updated when the response carries a body. The
    /// body is deserialized when the operation declares a return value or is
    /// asynchronous; otherwise it is discarded.
    ///
    /// # Errors
    ///
    /// Returns an error if no deserializer applies or the body cannot be
    /// converted. A non-2xx status is not an error.
    pub fn process(
        &self,
        ctx: &InvocationContext,
        envelope: ResponseEnvelope,
    ) -> Result<InvocationResult, Error> {
        let ResponseEnvelope {
            status,
            headers,
            body,
        } = envelope;

        if body.is_some() {
            write_header_slots(ctx, &headers);
        }

        let expects_result = ctx.operation.returns != ValueType::Unit || ctx.is_async();
        let payload = match body {
            Some(bytes) if expects_result => {
                let resolved = self.registry.resolve(&ctx.endpoint, &ctx.operation)?;
                debug!(
                    target: "tether::executor",
                    deserializer = %resolved.tag,
                    status,
                    "Deserializing {} byte response body",
                    bytes.len()
                );
                resolved.deserializer.deserialize(&bytes, &headers)?
            }
            _ => Payload::Unit,
        };

        Ok(InvocationResult {
            status,
            headers,
            payload,
        })
    }
}

/// Copies response headers into the header slots bound to the invocation.
/// Headers missing from the response leave their slot untouched.
pub fn write_header_slots(ctx: &InvocationContext, headers: &HeaderMap) {
    for binding in ctx.bindings_with_role(ParamRole::Header) {
        let (Some(name), Argument::Header(slot)) = (binding.name.as_deref(), &binding.value) else {
            continue;
        };
        if let Some(value) = headers.get(name).and_then(|value| value.to_str().ok()) {
            slot.set(value);
        }
    }
}
