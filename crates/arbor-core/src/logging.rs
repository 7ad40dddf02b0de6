#![forbid(unsafe_code)]

//! Logging and tracing support.
//!
//! All crates log through `tracing` with structured fields (`node_id`,
//! `parent_id`, `generation`). Applications usually install their own
//! subscriber; with the `tracing-json` feature, [`install_subscriber`]
//! provides a ready-made one filtered by the `ARBOR_LOG` variable
//! (`EnvFilter` syntax, default `warn`).

pub use tracing::{debug, debug_span, error, info, info_span, trace, trace_span, warn};

/// Environment variable holding the log filter directives.
pub const LOG_ENV: &str = "ARBOR_LOG";

/// Output format of [`install_subscriber`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Plain,
    /// One JSON object per event.
    Json,
}

/// Subscriber installation failure.
#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    #[error("invalid {LOG_ENV} directives: {0}")]
    Filter(String),
    #[error("a global tracing subscriber is already installed")]
    AlreadyInstalled,
}

/// Install a global fmt subscriber writing to stderr.
#[cfg(feature = "tracing-json")]
pub fn install_subscriber(format: LogFormat) -> Result<(), LoggingError> {
    use tracing_subscriber::EnvFilter;

    let filter = match std::env::var(LOG_ENV) {
        Ok(directives) => {
            EnvFilter::try_new(directives).map_err(|e| LoggingError::Filter(e.to_string()))?
        }
        Err(_) => EnvFilter::new("warn"),
    };
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true);
    let result = match format {
        LogFormat::Plain => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
    result.map_err(|_| LoggingError::AlreadyInstalled)
}
