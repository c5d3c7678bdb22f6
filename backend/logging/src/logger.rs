//! Structured Logger
//!
//! Wraps `tracing` with a console layer (plain or JSON), an optional rolling
//! NDJSON file, and environment-based level control.

use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const LOG_FILE_PREFIX: &str = "devauth";
const FALLBACK_LEVEL: &str = "info";

#[derive(Debug, Clone)]
pub struct LoggingOptions {
    /// `EnvFilter` directive; `RUST_LOG` wins when set.
    pub level: String,
    /// Directory for daily-rolling NDJSON files. Console only when unset.
    pub dir: Option<PathBuf>,
    /// Emit console lines as JSON.
    pub json: bool,
}

impl Default for LoggingOptions {
    fn default() -> Self {
        Self { level: FALLBACK_LEVEL.to_string(), dir: None, json: false }
    }
}

fn env_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new(FALLBACK_LEVEL))
}

/// Initialize the global structured logger.
///
/// A second call leaves the first subscriber in place.
pub fn init_logger(options: &LoggingOptions) -> Result<()> {
    // Rolling file appender: writes NDJSON to `<dir>/devauth.YYYY-MM-DD.log`
    let file_layer = match &options.dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create log directory {}", dir.display()))?;
            let appender = RollingFileAppender::builder()
                .rotation(Rotation::DAILY)
                .filename_prefix(LOG_FILE_PREFIX)
                .filename_suffix("log")
                .build(dir)
                .with_context(|| format!("Failed to open log directory {}", dir.display()))?;
            Some(fmt::layer().json().with_writer(appender).with_ansi(false))
        }
        None => None,
    };

    let (plain_console, json_console) = if options.json {
        (None, Some(fmt::layer().json().with_writer(std::io::stdout)))
    } else {
        let layer = fmt::layer()
            .with_writer(std::io::stdout)
            .with_target(false)
            .with_ansi(true);
        (Some(layer), None)
    };

    let _ = tracing_subscriber::registry()
        .with(env_filter(&options.level))
        .with(plain_console)
        .with(json_console)
        .with(file_layer)
        .try_init();
    Ok(())
}
