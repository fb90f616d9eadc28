//! Handler for `tether call`.

use crate::cli::commands::dispatcher_for;
use crate::config::models::GlobalConfig;
use crate::descriptor::{ParamAnnotation, RequestDescriptor};
use crate::error::Error;
use crate::invocation::{Argument, AsyncHandler, InvocationResult, Outcome};
use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::oneshot;

/// Command-line values for one invocation.
#[derive(Debug, Default)]
pub struct CallRequest {
    pub endpoint: String,
    pub operation: String,
    pub args: Vec<String>,
    pub body: Option<String>,
    pub body_file: Option<PathBuf>,
}

type Reply = Result<InvocationResult, Error>;

/// Forwards the single asynchronous reply to the waiting command.
struct ReplyHandler {
    tx: Mutex<Option<oneshot::Sender<Reply>>>,
}

impl ReplyHandler {
    fn channel() -> (Self, oneshot::Receiver<Reply>) {
        let (tx, rx) = oneshot::channel();
        (
            Self {
                tx: Mutex::new(Some(tx)),
            },
            rx,
        )
    }

    fn send(&self, reply: Reply) {
        let sender = self
            .tx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(tx) = sender {
            let _ = tx.send(reply);
        }
    }
}

impl AsyncHandler for ReplyHandler {
    fn on_success(&self, result: InvocationResult) {
        self.send(Ok(result));
    }

    fn on_failure(&self, result: InvocationResult) {
        self.send(Ok(result));
    }

    fn on_error(&self, error: Error) {
        self.send(Err(error));
    }
}

fn is_unannotated(operation: &RequestDescriptor, index: usize) -> bool {
    operation
        .parameters
        .get(index)
        .is_some_and(|decl| decl.annotations.is_empty())
}

/// Lays command-line values onto the operation's positional parameters.
///
/// The body goes to the declared entity parameter, or to the last
/// unannotated one when none is declared. `--arg` values fill the remaining
/// slots in order. A callback, if given, takes the first unannotated slot
/// still empty.
///
/// # Errors
///
/// Returns `ArgumentCount` if more values are supplied than there are slots.
pub fn place_arguments(
    endpoint: &str,
    operation: &RequestDescriptor,
    args: Vec<String>,
    body: Option<Argument>,
    callback: Option<Argument>,
) -> Result<Vec<Argument>, Error> {
    let arity = operation.parameters.len();
    let mut slots: Vec<Argument> = (0..arity).map(|_| Argument::Absent).collect();
    let too_many = |actual: usize| Error::ArgumentCount {
        endpoint: endpoint.to_string(),
        operation: operation.name.clone(),
        expected: arity,
        actual,
    };

    let entity_slot = body.as_ref().and(
        operation
            .parameters
            .iter()
            .position(|decl| decl.annotations.contains(&ParamAnnotation::Entity))
            .or_else(|| (0..arity).rev().find(|&i| is_unannotated(operation, i))),
    );
    let supplied = args.len() + usize::from(body.is_some());
    match (entity_slot, body) {
        (Some(index), Some(body)) => slots[index] = body,
        (None, Some(_)) => return Err(too_many(supplied)),
        _ => {}
    }

    let mut values = args.into_iter();
    for (index, slot) in slots.iter_mut().enumerate() {
        if Some(index) == entity_slot {
            continue;
        }
        match values.next() {
            Some(value) => *slot = Argument::Text(value),
            None => break,
        }
    }
    if values.next().is_some() {
        return Err(too_many(supplied));
    }

    if let Some(callback) = callback {
        if let Some(index) =
            (0..arity).find(|&i| is_unannotated(operation, i) && slots[i].is_absent())
        {
            slots[index] = callback;
        }
    }
    Ok(slots)
}

fn print_result(result: &InvocationResult) -> bool {
    if !result.is_success() {
        eprintln!("HTTP {}", result.status);
    }
    if let Some(body) = result.payload.render() {
        println!("{body}");
    }
    result.is_success()
}

/// Registers the named endpoint and invokes one of its operations.
///
/// Asynchronous operations with a free unannotated parameter are awaited
/// through a callback so the reply can be printed.
///
/// # Errors
///
/// Returns registration, build, transport or response errors.
pub async fn run_call(config: &GlobalConfig, request: CallRequest) -> Result<bool, Error> {
    let endpoint = config
        .endpoint_descriptors()
        .into_iter()
        .find(|endpoint| endpoint.name == request.endpoint)
        .ok_or_else(|| Error::UnknownEndpoint {
            name: request.endpoint.clone(),
        })?;
    let operation = endpoint
        .operation(&request.operation)
        .cloned()
        .ok_or_else(|| Error::UnknownOperation {
            endpoint: request.endpoint.clone(),
            operation: request.operation.clone(),
        })?;
    let is_async = endpoint.is_async_for(&operation);

    let dispatcher = dispatcher_for(config);
    dispatcher.register(endpoint)?;

    let body = request
        .body
        .map(Argument::Text)
        .or_else(|| request.body_file.map(Argument::File));
    let (callback, reply) = if is_async {
        let (handler, rx) = ReplyHandler::channel();
        (Some(Argument::callback(handler)), Some(rx))
    } else {
        (None, None)
    };

    let arguments = place_arguments(
        &request.endpoint,
        &operation,
        request.args,
        body,
        callback,
    )?;
    let has_callback = arguments
        .iter()
        .any(|argument| matches!(argument, Argument::Callback(_)));

    match dispatcher
        .invoke(&request.endpoint, &request.operation, arguments)
        .await?
    {
        Outcome::Completed(result) => Ok(print_result(&result)),
        Outcome::Dispatched => {
            let Some(rx) = reply.filter(|_| has_callback) else {
                println!("Dispatched {}.{}", request.endpoint, request.operation);
                return Ok(true);
            };
            let wait = Duration::from_millis(config.timeouts().request_timeout_ms)
                + Duration::from_millis(config.limits.connect_timeout_ms);
            match tokio::time::timeout(wait, rx).await {
                Ok(Ok(reply)) => reply.map(|result| print_result(&result)),
                Ok(Err(_)) => Err(Error::Config(
                    "Asynchronous handler was dropped before replying".to_string(),
                )),
                Err(_) => Err(Error::Config(format!(
                    "No asynchronous reply within {}s",
                    wait.as_secs()
                ))),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::ParamDecl;

    fn put_operation() -> RequestDescriptor {
        RequestDescriptor::put("store", "/items/:id")
            .with_param(ParamDecl::path("id"))
            .with_param(ParamDecl::unused())
            .with_param(ParamDecl::entity())
    }

    #[test]
    fn test_body_goes_to_entity_slot() {
        let slots = place_arguments(
            "svc",
            &put_operation(),
            vec!["7".to_string()],
            Some(Argument::Text("hello".to_string())),
            None,
        )
        .unwrap();
        assert!(matches!(&slots[0], Argument::Text(v) if v == "7"));
        assert!(slots[1].is_absent());
        assert!(matches!(&slots[2], Argument::Text(v) if v == "hello"));
    }

    #[test]
    fn test_callback_takes_first_free_unannotated_slot() {
        let (handler, _rx) = ReplyHandler::channel();
        let slots = place_arguments(
            "svc",
            &put_operation(),
            vec!["7".to_string()],
            None,
            Some(Argument::callback(handler)),
        )
        .unwrap();
        assert!(matches!(slots[1], Argument::Callback(_)));
    }

    #[test]
    fn test_too_many_values_is_rejected() {
        let err = place_arguments(
            "svc",
            &RequestDescriptor::get("feed", "/feed"),
            vec!["extra".to_string()],
            None,
            None,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            Error::ArgumentCount {
                expected: 0,
                actual: 1,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_reply_handler_forwards_once() {
        let (handler, rx) = ReplyHandler::channel();
        handler.on_error(Error::Config("first".to_string()));
        handler.on_error(Error::Config("second".to_string()));
        let reply = rx.await.unwrap();
        assert!(matches!(reply, Err(Error::Config(msg)) if msg == "first"));
    }
}
