//! Logging setup.

use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Setup logging with the given level.
///
/// `RUST_LOG` takes precedence over `level`. With `file` set, logs are
/// written there instead of stderr; keep the returned guard alive until
/// exit so buffered lines are flushed.
pub fn setup_logging(level: &str, json: bool, file: Option<&Path>) -> WorkerGuard {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let (writer, guard) = match file {
        Some(path) => {
            let dir = path.parent().filter(|p| !p.as_os_str().is_empty());
            let name = path.file_name().unwrap_or(path.as_os_str());
            tracing_appender::non_blocking(tracing_appender::rolling::never(
                dir.unwrap_or(Path::new(".")),
                name,
            ))
        }
        None => tracing_appender::non_blocking(std::io::stderr()),
    };

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(writer))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().pretty().with_ansi(file.is_none()).with_writer(writer))
            .init();
    }

    guard
}
