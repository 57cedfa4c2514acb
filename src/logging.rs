use crate::error::{MutationError, Result};
use slog::{o, Discard, Logger};
use sloggers::terminal::{Destination, TerminalLoggerBuilder};
use sloggers::types::Severity;
use sloggers::Build;

/// Terminal logger writing to stderr.
pub fn terminal_logger(verbose: bool) -> Result<Logger> {
    let mut builder = TerminalLoggerBuilder::new();
    builder.level(if verbose {
        Severity::Debug
    } else {
        Severity::Info
    });
    builder.destination(Destination::Stderr);
    builder
        .build()
        .map_err(|e| MutationError::Logger(e.to_string()))
}

pub fn discard_logger() -> Logger {
    Logger::root(Discard, o!())
}
