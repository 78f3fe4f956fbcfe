pub mod cli;
pub mod config;

use std::fs::File;
use std::sync::Mutex;

use anyhow::Context;
use tracing_subscriber::{prelude::*, EnvFilter};

use crate::config::LoggingConfig;

/// Install the global tracing subscriber.
///
/// Logs go to stderr (stdout carries JSON results) and, when enabled, to a
/// file as well. `RUST_LOG` overrides the configured level.
pub fn init_logging(config: &LoggingConfig) -> anyhow::Result<()> {
    let filter = || {
        EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(&config.level))
    };

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_file(true)
        .with_line_number(true)
        .with_writer(std::io::stderr)
        .with_filter(filter()?);

    if config.log_to_file {
        let file = File::create(&config.log_file_path)
            .with_context(|| format!("cannot create log file {}", config.log_file_path))?;
        let file_layer = tracing_subscriber::fmt::layer()
            .with_file(true)
            .with_line_number(true)
            .with_ansi(false)
            .with_writer(Mutex::new(file))
            .with_filter(filter()?);

        tracing_subscriber::registry()
            .with(stderr_layer)
            .with(file_layer)
            .try_init()
            .context("failed to initialize logging")?;
    } else {
        tracing_subscriber::registry()
            .with(stderr_layer)
            .try_init()
            .context("failed to initialize logging")?;
    }
    Ok(())
}
