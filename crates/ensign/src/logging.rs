//! Tracing setup for the `ensign` binary.
//!
//! Three targets are filtered independently: the crate itself, the storage
//! backends (which log every flag read at `debug`) and `tower_http`'s request
//! spans. `RUST_LOG` replaces the computed filter entirely.

use serde::{Deserialize, Serialize};
use tracing::Level;
use tracing_subscriber::{fmt, prelude::*, EnvFilter, Layer, Registry};

/// How much the command line asked to see.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Verbosity {
    /// Errors only.
    Quiet,
    /// Info and above.
    #[default]
    Normal,
    /// Debug and above, storage excepted.
    Verbose,
    /// Everything, storage included.
    Trace,
}

impl Verbosity {
    /// The level applied to the crate's own targets.
    #[must_use]
    pub fn level(self) -> Level {
        match self {
            Self::Quiet => Level::ERROR,
            Self::Normal => Level::INFO,
            Self::Verbose => Level::DEBUG,
            Self::Trace => Level::TRACE,
        }
    }

    /// The level for `ensign::storage`.
    ///
    /// Per-read storage lines drown a busy server, so a single `-v` stops at
    /// info unless `storage_queries` is on.
    #[must_use]
    pub fn storage_level(self, storage_queries: bool) -> Level {
        match self {
            Self::Verbose if !storage_queries => Level::INFO,
            other => other.level(),
        }
    }
}

/// Output format of log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Multi-field human-readable lines.
    #[default]
    Full,
    /// Single-line abbreviated output.
    Compact,
    /// Newline-delimited JSON, for log shippers.
    Json,
}

/// The `[logging]` configuration section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Line format.
    pub format: LogFormat,
    /// Emit a span per HTTP request.
    pub http_requests: bool,
    /// Show per-operation storage logs at `-v`.
    pub storage_queries: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::Full,
            http_requests: true,
            storage_queries: false,
        }
    }
}

/// The filter used when `RUST_LOG` is unset.
#[must_use]
pub fn filter_directives(verbosity: Verbosity, config: &LoggingConfig) -> String {
    let level = verbosity.level();
    let storage = verbosity.storage_level(config.storage_queries);
    let http = if config.http_requests {
        level.to_string()
    } else {
        "off".to_string()
    };
    format!("ensign={level},ensign::storage={storage},tower_http={http}")
}

fn format_layer(format: LogFormat) -> Box<dyn Layer<Registry> + Send + Sync> {
    match format {
        LogFormat::Full => fmt::layer().with_target(true).boxed(),
        LogFormat::Compact => fmt::layer().compact().with_target(false).boxed(),
        LogFormat::Json => fmt::layer().json().with_current_span(true).boxed(),
    }
}

/// Install the global subscriber.
///
/// Call once, after configuration is loaded. A second call is a no-op.
///
/// ```no_run
/// use ensign::logging::{init_logging, LoggingConfig, Verbosity};
///
/// init_logging(Verbosity::Verbose, &LoggingConfig::default());
/// ```
pub fn init_logging(verbosity: Verbosity, config: &LoggingConfig) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter_directives(verbosity, config)));

    let _ = tracing_subscriber::registry()
        .with(format_layer(config.format))
        .with(env_filter)
        .try_init();
}
