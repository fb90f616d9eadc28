//! Handlers for the tether subcommands.

pub mod call;
pub mod endpoints;

use crate::cli::{Cli, Commands};
use crate::config::manager::ConfigManager;
use crate::config::models::GlobalConfig;
use crate::engine::dispatcher::Dispatcher;
use crate::error::Error;
use crate::fs::FileSystem;

/// Builds a dispatcher sized by the global configuration.
#[must_use]
pub fn dispatcher_for(config: &GlobalConfig) -> Dispatcher {
    Dispatcher::builder()
        .with_limits(config.connection_limits())
        .with_timeouts(config.timeouts())
        .with_async_workers(config.limits.async_workers)
        .build()
}

/// Runs the parsed command line. Returns `false` when the command completed
/// but should exit non-zero, e.g. a call answered with a non-2xx status.
///
/// # Errors
///
/// Returns the first configuration, validation or invocation error.
pub async fn run<F: FileSystem>(cli: Cli, manager: &ConfigManager<F>) -> Result<bool, Error> {
    let config = manager.load_global_config()?;
    match cli.command {
        Commands::Endpoints => {
            endpoints::list_endpoints(&config);
            Ok(true)
        }
        Commands::Validate => endpoints::validate_endpoints(&config),
        Commands::Call {
            endpoint,
            operation,
            args,
            body,
            body_file,
        } => {
            let request = call::CallRequest {
                endpoint,
                operation,
                args,
                body,
                body_file,
            };
            call::run_call(&config, request).await
        }
    }
}
