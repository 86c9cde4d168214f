//! Tracing setup.

use tracing::Level;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Logging configuration.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Default level; `RUST_LOG` directives take precedence.
    pub level: Level,

    /// Log format.
    pub format: LogFormat,
}

/// Log format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable text format.
    Text,

    /// JSON format.
    Json,
}

impl LogFormat {
    /// Parses a configured format name; anything but `json` is text.
    pub fn from_name(name: &str) -> Self {
        if name.eq_ignore_ascii_case("json") {
            Self::Json
        } else {
            Self::Text
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            format: LogFormat::Text,
        }
    }
}

/// Parses a log level name, falling back to `INFO`.
pub fn parse_log_level(level: &str) -> Level {
    match level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" | "warning" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    }
}

/// Initializes the tracing subscriber. Logs go to stderr so that query
/// output on stdout stays machine-readable.
pub fn init_tracing(config: &LogConfig) {
    let filter = EnvFilter::builder()
        .with_default_directive(config.level.into())
        .from_env_lossy();

    match config.format {
        LogFormat::Text => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
                .init();
        }
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    fmt::layer()
                        .json()
                        .with_target(true)
                        .with_writer(std::io::stderr),
                )
                .init();
        }
    }
}
