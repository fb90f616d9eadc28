pub mod commands;
pub mod errors;
pub mod tracing_init;

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Tether: invoke declared HTTP endpoints",
    long_about = "Tether turns declared endpoint operations into HTTP requests.\n\
                  Endpoints are read from the TOML catalog in the configuration directory.\n\n\
                  Examples:\n  \
                  tether endpoints\n  \
                  tether validate\n  \
                  tether call jokes random --arg 4\n  \
                  tether call store put --body-file payload.bin"
)]
pub struct Cli {
    /// Output all errors as structured JSON to stderr
    #[arg(long, global = true, help = "Output errors in JSON format")]
    pub json_errors: bool,

    /// Increase logging verbosity
    #[arg(
        short = 'v',
        global = true,
        action = ArgAction::Count,
        help = "Increase logging verbosity (-v for debug, -vv for trace)"
    )]
    pub verbosity: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List the catalog's endpoints and their operations
    Endpoints,
    /// Check every catalog endpoint as registration would
    Validate,
    /// Invoke one operation
    Call {
        /// Endpoint name
        endpoint: String,
        /// Operation name
        operation: String,
        /// Positional argument values, bound to the operation's parameters in order
        #[arg(long = "arg", value_name = "VALUE")]
        args: Vec<String>,
        /// Text entity for the request body
        #[arg(long, conflicts_with = "body_file")]
        body: Option<String>,
        /// File whose contents become the request body
        #[arg(long, value_name = "PATH")]
        body_file: Option<PathBuf>,
    },
}
