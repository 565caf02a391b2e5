//! Tracing subscriber setup for the two subcommands.

use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use tracing_error::ErrorLayer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use crate::domain::UDError;

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Log to stdout. Used by the server.
pub fn init_stdout_logging() -> Result<(), UDError> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stdout)
                .with_filter(env_filter()),
        )
        .with(ErrorLayer::default())
        .try_init()
        .map_err(|e| UDError::Logging(e.to_string()))
}

/// Log to a file. The terminal belongs to the viewer, so nothing may go to stdout.
pub fn init_file_logging(path: &Path) -> Result<(), UDError> {
    let file = File::create(path)?;
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(Arc::new(file))
                .with_ansi(false)
                .with_filter(env_filter()),
        )
        .with(ErrorLayer::default())
        .try_init()
        .map_err(|e| UDError::Logging(e.to_string()))
}
