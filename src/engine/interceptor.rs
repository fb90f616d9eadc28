//! Request interceptors.
//!
//! Interceptors see the fully built request just before it is sent and may
//! amend it or veto the call. Endpoint-level interceptors run before
//! operation-level ones, each group in declaration order.

use crate::engine::request::HttpRequest;
use crate::error::Error;
use crate::invocation::InvocationContext;

pub trait Interceptor: Send + Sync {
    /// # Errors
    ///
    /// Returning an error aborts the invocation.
    fn intercept(&self, ctx: &InvocationContext, request: &mut HttpRequest) -> Result<(), Error>;
}

impl<F> Interceptor for F
where
    F: Fn(&InvocationContext, &mut HttpRequest) -> Result<(), Error> + Send + Sync,
{
    fn intercept(&self, ctx: &InvocationContext, request: &mut HttpRequest) -> Result<(), Error> {
        self(ctx, request)
    }
}

/// Runs every interceptor that applies to `ctx`.
///
/// # Errors
///
/// Returns [`Error::Interceptor`] carrying the first failure.
pub fn apply(ctx: &InvocationContext, request: &mut HttpRequest) -> Result<(), Error> {
    let interceptors = ctx
        .endpoint
        .interceptors
        .iter()
        .chain(ctx.operation.interceptors.iter());
    for interceptor in interceptors {
        interceptor
            .intercept(ctx, request)
            .map_err(|e| Error::Interceptor {
                context: ctx.summary(),
                reason: e.to_string(),
            })?;
    }
    Ok(())
}
