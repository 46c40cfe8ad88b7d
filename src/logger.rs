use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;

use tracing::info;
use tracing_subscriber::{filter::LevelFilter, fmt, prelude::*};

use crate::{Error, Result};

/// Console output at INFO and above and, when a path is given, an append-only error log
/// with one line per failure.
pub fn init(error_log: Option<&Path>) -> Result<()> {
    let errors = match error_log {
        Some(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            Some(
                fmt::layer()
                    .with_ansi(false)
                    .with_target(false)
                    .with_writer(Mutex::new(file))
                    .with_filter(LevelFilter::ERROR),
            )
        }
        None => None,
    };
    let console = fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_filter(LevelFilter::INFO);

    tracing_subscriber::registry()
        .with(console)
        .with(errors)
        .try_init()
        .map_err(|e| Error::Logging(e.to_string()))?;

    match error_log {
        Some(path) => info!("Logger initialized, errors go to {}", path.display()),
        None => info!("Logger initialized."),
    }
    Ok(())
}
