//! Tracing/logging initialization for the CLI.

use crate::constants;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::sync::{Arc, Mutex, PoisonError};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Output format selected by `TETHER_LOG_FORMAT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LogFormat {
    Text,
    Json,
}

impl LogFormat {
    fn parse(raw: Option<&str>) -> Result<Self, String> {
        match raw.map(str::to_ascii_lowercase).as_deref() {
            None | Some("" | "text") => Ok(Self::Text),
            Some("json") => Ok(Self::Json),
            Some(other) => Err(other.to_string()),
        }
    }
}

/// Destination shared by every log line: the `TETHER_LOG_FILE` file or stderr.
#[derive(Clone, Default)]
struct LogSink {
    file: Option<Arc<Mutex<File>>>,
}

enum SinkWriter<'a> {
    File(std::sync::MutexGuard<'a, File>),
    Stderr(io::Stderr),
}

impl Write for SinkWriter<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Self::File(file) => file.write(buf),
            Self::Stderr(stderr) => stderr.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Self::File(file) => file.flush(),
            Self::Stderr(stderr) => stderr.flush(),
        }
    }
}

impl<'a> MakeWriter<'a> for LogSink {
    type Writer = SinkWriter<'a>;

    fn make_writer(&'a self) -> Self::Writer {
        self.file.as_ref().map_or_else(
            || SinkWriter::Stderr(io::stderr()),
            |file| SinkWriter::File(file.lock().unwrap_or_else(PoisonError::into_inner)),
        )
    }
}

impl LogSink {
    fn from_env() -> Self {
        let Ok(path) = std::env::var(constants::ENV_TETHER_LOG_FILE) else {
            return Self::default();
        };
        match OpenOptions::new().create(true).append(true).open(&path) {
            Ok(file) => Self {
                file: Some(Arc::new(Mutex::new(file))),
            },
            Err(e) => {
                eprintln!("Warning: Could not open log file '{path}': {e}. Using stderr.");
                Self::default()
            }
        }
    }
}

/// Filter directive for a `-v` count, falling back to `TETHER_LOG`.
fn filter_directive(verbosity: u8) -> String {
    match verbosity {
        0 => std::env::var(constants::ENV_TETHER_LOG).unwrap_or_else(|_| "error".to_string()),
        1 => "tether=debug".to_string(),
        _ => "tether=trace".to_string(),
    }
}

/// Installs the global subscriber. Engine events are emitted under the
/// `tether::dispatcher`, `tether::session` and `tether::executor` targets.
pub fn init_tracing(verbosity: u8) {
    let filter = EnvFilter::try_new(filter_directive(verbosity))
        .unwrap_or_else(|_| EnvFilter::new("error"));

    let raw_format = std::env::var(constants::ENV_TETHER_LOG_FORMAT).ok();
    let format = LogFormat::parse(raw_format.as_deref()).unwrap_or_else(|other| {
        // The subscriber is not installed yet.
        eprintln!(
            "Warning: Unrecognized {} '{other}'. Valid values: 'json', 'text'. Using 'text'.",
            constants::ENV_TETHER_LOG_FORMAT
        );
        LogFormat::Text
    });
    let sink = LogSink::from_env();

    let text = (format == LogFormat::Text).then(|| {
        tracing_subscriber::fmt::layer()
            .compact()
            .with_target(true)
            .with_level(true)
            .without_time()
            .with_ansi(sink.file.is_none())
            .with_writer(sink.clone())
    });
    let json = (format == LogFormat::Json).then(|| {
        tracing_subscriber::fmt::layer()
            .json()
            .flatten_event(true)
            .with_current_span(false)
            .with_span_list(false)
            .with_target(true)
            .with_writer(sink.clone())
    });

    // A subscriber installed by an embedding application wins.
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(text)
        .with(json)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbosity_overrides_environment() {
        assert_eq!(filter_directive(1), "tether=debug");
        assert_eq!(filter_directive(3), "tether=trace");
    }

    #[test]
    fn test_log_format_parsing() {
        assert_eq!(LogFormat::parse(None), Ok(LogFormat::Text));
        assert_eq!(LogFormat::parse(Some("JSON")), Ok(LogFormat::Json));
        assert_eq!(LogFormat::parse(Some("yaml")), Err("yaml".to_string()));
    }
}
