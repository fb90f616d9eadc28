use clap::Parser;
use tether::cli::errors::print_error_with_json;
use tether::cli::tracing_init::init_tracing;
use tether::cli::{commands, Cli};
use tether::config::manager::ConfigManager;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let json_errors = cli.json_errors;
    init_tracing(cli.verbosity);

    let manager = match ConfigManager::new() {
        Ok(manager) => manager,
        Err(e) => {
            print_error_with_json(&e, json_errors);
            std::process::exit(1);
        }
    };

    match commands::run(cli, &manager).await {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            print_error_with_json(&e, json_errors);
            std::process::exit(1);
        }
    }
}
