//! Handlers for catalog inspection.

use crate::config::models::GlobalConfig;
use crate::descriptor::{EndpointDescriptor, RequestDescriptor};
use crate::engine::dispatcher::Dispatcher;
use crate::error::Error;

fn describe_operation(endpoint: &EndpointDescriptor, operation: &RequestDescriptor) -> String {
    let mut flags = Vec::new();
    if endpoint.is_async_for(operation) {
        flags.push("async");
    }
    if endpoint.is_stateful_for(operation) {
        flags.push("stateful");
    }
    let suffix = if flags.is_empty() {
        String::new()
    } else {
        format!(" [{}]", flags.join(", "))
    };
    format!(
        "  {:<20} {:<6} {} ({} params){suffix}",
        operation.name,
        operation.method.as_str(),
        operation.path,
        operation.parameters.len()
    )
}

/// Prints every catalog endpoint with its operations.
pub fn list_endpoints(config: &GlobalConfig) {
    let descriptors = config.endpoint_descriptors();
    if descriptors.is_empty() {
        println!("No endpoints configured.");
        return;
    }
    for endpoint in &descriptors {
        let port = endpoint
            .port
            .as_deref()
            .map(|port| format!(":{port}"))
            .unwrap_or_default();
        println!(
            "{} -> {}://{}{port}{}",
            endpoint.name, endpoint.scheme, endpoint.host, endpoint.path
        );
        for operation in &endpoint.operations {
            println!("{}", describe_operation(endpoint, operation));
        }
    }
}

/// Checks every catalog endpoint and prints one line per endpoint.
///
/// # Errors
///
/// Returns an error only if the catalog cannot be read; validation
/// failures are reported and turn the result into `false`.
pub fn validate_endpoints(config: &GlobalConfig) -> Result<bool, Error> {
    let dispatcher = Dispatcher::default();
    let mut all_valid = true;
    for endpoint in config.endpoint_descriptors() {
        match dispatcher.check(&endpoint) {
            Ok(()) => println!("ok      {}", endpoint.name),
            Err(err) => {
                all_valid = false;
                println!("invalid {}: {err}", endpoint.name);
            }
        }
    }
    Ok(all_valid)
}
