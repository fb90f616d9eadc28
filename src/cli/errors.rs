//! Error display formatting for the CLI.

use crate::constants;
use crate::error::{Error, ErrorKind};

/// Prints an error message, either as JSON or user-friendly format.
pub fn print_error_with_json(error: &Error, json_format: bool) {
    if !json_format {
        print_error(error);
        return;
    }
    let json_error = error.to_json();
    let Ok(json_output) = serde_json::to_string_pretty(&json_error) else {
        print_error(error);
        return;
    };
    eprintln!("{json_output}");
}

fn title(kind: ErrorKind) -> &'static str {
    match kind {
        ErrorKind::Metadata => "Endpoint Metadata Error",
        ErrorKind::Declaration => "Declaration Error",
        ErrorKind::Build => "Request Build Error",
        ErrorKind::Transport => "Transport Error",
        ErrorKind::Response => "Response Error",
        ErrorKind::Configuration => "Configuration Error",
        ErrorKind::Internal => "Error",
    }
}

/// Prints a user-friendly error message with a hint where one applies.
pub fn print_error(error: &Error) {
    match error.root_cause() {
        Error::Network(req_err) if req_err.is_connect() => {
            eprintln!("Connection Error\n{error}\n\nHint: {}", constants::ERR_CONNECTION);
        }
        Error::Network(req_err) if req_err.is_timeout() => {
            eprintln!("Timeout Error\n{error}\n\nHint: {}", constants::ERR_TIMEOUT);
        }
        Error::Io(io_err) if io_err.kind() == std::io::ErrorKind::NotFound => {
            eprintln!("File Not Found\n{error}");
        }
        _ => {
            eprintln!("{}\n{error}", title(error.kind()));
            if let Some(hint) = error.to_json().context {
                eprintln!("\nHint: {hint}");
            }
        }
    }
}
