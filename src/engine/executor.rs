//! Request execution strategies.
//!
//! Synchronous invocations are awaited inline and return their result.
//! Asynchronous invocations are handed to a bounded worker pool; the caller
//! gets control back immediately and the result goes to the invocation's
//! callback, if it has one.

use crate::constants;
use crate::engine::deserializer::DeserializerRegistry;
use crate::engine::request::HttpRequest;
use crate::engine::response::ResponseProcessor;
use crate::engine::session::EndpointSession;
use crate::engine::transport::Transport;
use crate::error::Error;
use crate::invocation::{InvocationContext, InvocationResult};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{debug, error};

/// How an invocation is executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionStrategy {
    Synchronous,
    Asynchronous,
}

impl ExecutionStrategy {
    #[must_use]
    pub fn for_invocation(ctx: &InvocationContext) -> Self {
        if ctx.is_async() {
            Self::Asynchronous
        } else {
            Self::Synchronous
        }
    }
}

/// Runs built requests through a transport and processes their responses.
pub struct Executor {
    transport: Arc<dyn Transport>,
    deserializers: Arc<DeserializerRegistry>,
    workers: Arc<Semaphore>,
}

impl Executor {
    #[must_use]
    pub fn new(
        transport: Arc<dyn Transport>,
        deserializers: Arc<DeserializerRegistry>,
        async_workers: usize,
    ) -> Self {
        Self {
            transport,
            deserializers,
            workers: Arc::new(Semaphore::new(async_workers.max(1))),
        }
    }

    /// Executes `request` and waits for its result.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Transport`] if the exchange fails, or the response
    /// processor's error if the body cannot be deserialized.
    pub async fn execute_sync(
        &self,
        ctx: &InvocationContext,
        request: HttpRequest,
        session: &EndpointSession,
    ) -> Result<InvocationResult, Error> {
        let envelope = self
            .transport
            .execute(request, session, ctx.is_stateful())
            .await
            .map_err(|source| Error::Transport {
                context: ctx.summary(),
                source: Box::new(source),
            })?;
        ResponseProcessor::new(&self.deserializers).process(ctx, envelope)
    }

    /// Queues `request` on the worker pool and returns at once.
    ///
    /// Failures are logged and reported to the callback's `on_error`. Without
    /// a callback the response is read and discarded.
    pub fn execute_async(
        &self,
        ctx: InvocationContext,
        request: HttpRequest,
        session: Arc<EndpointSession>,
    ) -> JoinHandle<()> {
        let transport = Arc::clone(&self.transport);
        let deserializers = Arc::clone(&self.deserializers);
        let workers = Arc::clone(&self.workers);

        tokio::spawn(async move {
            let Ok(_worker) = workers.acquire_owned().await else {
                error!(
                    target: "tether::executor",
                    "Asynchronous worker pool is closed; dropping {}",
                    ctx.summary()
                );
                return;
            };

            let envelope = match transport
                .execute(request, &session, ctx.is_stateful())
                .await
            {
                Ok(envelope) => envelope,
                Err(source) => {
                    let err = Error::Transport {
                        context: ctx.summary(),
                        source: Box::new(source),
                    };
                    error!(target: "tether::executor", "Asynchronous request execution failed: {err}");
                    if let Some(handler) = &ctx.callback {
                        handler.on_error(err);
                    }
                    return;
                }
            };

            let Some(handler) = ctx.callback.clone() else {
                debug!(
                    target: "tether::executor",
                    status = envelope.status,
                    "No callback for {}; response discarded",
                    ctx.summary()
                );
                return;
            };

            match ResponseProcessor::new(&deserializers).process(&ctx, envelope) {
                Ok(result) if result.is_success() => handler.on_success(result),
                Ok(result) => handler.on_failure(result),
                Err(err) => {
                    error!(
                        target: "tether::executor",
                        "Failed to process asynchronous response for {}: {err}",
                        ctx.summary()
                    );
                    handler.on_error(err);
                }
            }
        })
    }
}

impl std::fmt::Debug for Executor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Executor")
            .field("deserializers", &self.deserializers)
            .field("idle_workers", &self.workers.available_permits())
            .finish_non_exhaustive()
    }
}

impl Default for Executor {
    fn default() -> Self {
        Self::new(
            Arc::new(crate::engine::transport::ReqwestTransport),
            Arc::new(DeserializerRegistry::default()),
            constants::DEFAULT_ASYNC_WORKERS,
        )
    }
}
