//! Logging setup.
//!
//! Thin wrapper over `tracing-subscriber` so the hosting process can pick
//! between a human-readable development format and structured JSON for log
//! aggregation. `RUST_LOG` takes precedence over the configured level.

use serde::{Deserialize, Serialize};

/// Log level.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Trace level (most verbose).
    Trace,
    /// Debug level.
    Debug,
    /// Info level.
    #[default]
    Info,
    /// Warning level.
    Warn,
    /// Error level.
    Error,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Trace => write!(f, "trace"),
            Self::Debug => write!(f, "debug"),
            Self::Info => write!(f, "info"),
            Self::Warn => write!(f, "warn"),
            Self::Error => write!(f, "error"),
        }
    }
}

impl std::str::FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "trace" => Ok(Self::Trace),
            "debug" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            "warn" | "warning" => Ok(Self::Warn),
            "error" => Ok(Self::Error),
            other => Err(format!("invalid log level: {other}")),
        }
    }
}

impl From<LogLevel> for tracing::Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => tracing::Level::TRACE,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Error => tracing::Level::ERROR,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Default log level.
    pub level: LogLevel,
    /// Emit structured JSON output.
    pub structured: bool,
    /// Include caller location.
    pub include_location: bool,
    /// Include thread IDs.
    pub include_thread_ids: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            structured: false,
            include_location: false,
            include_thread_ids: false,
        }
    }
}

impl LogConfig {
    /// Development configuration: verbose, human-readable.
    #[must_use]
    pub fn development() -> Self {
        Self {
            level: LogLevel::Debug,
            include_location: true,
            ..Default::default()
        }
    }

    /// Production configuration: structured JSON with thread IDs.
    #[must_use]
    pub fn production() -> Self {
        Self {
            level: LogLevel::Info,
            structured: true,
            include_thread_ids: true,
            ..Default::default()
        }
    }

    /// Install the global subscriber. Safe to call more than once; later
    /// calls are no-ops.
    pub fn init(&self) {
        use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(self.level.to_string()));

        let subscriber = tracing_subscriber::registry().with(filter);

        if self.structured {
            let layer = fmt::layer()
                .json()
                .with_thread_ids(self.include_thread_ids)
                .with_file(self.include_location)
                .with_line_number(self.include_location);
            subscriber.with(layer).try_init().ok();
        } else {
            let layer = fmt::layer()
                .with_thread_ids(self.include_thread_ids)
                .with_file(self.include_location)
                .with_line_number(self.include_location);
            subscriber.with(layer).try_init().ok();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_parsing() {
        assert_eq!("debug".parse::<LogLevel>().unwrap(), LogLevel::Debug);
        assert_eq!("INFO".parse::<LogLevel>().unwrap(), LogLevel::Info);
        assert_eq!("warning".parse::<LogLevel>().unwrap(), LogLevel::Warn);
        assert!("verbose".parse::<LogLevel>().is_err());
    }

    #[test]
    fn test_presets() {
        let dev = LogConfig::development();
        assert_eq!(dev.level, LogLevel::Debug);
        assert!(!dev.structured);

        let prod = LogConfig::production();
        assert!(prod.structured);
        assert!(prod.include_thread_ids);
    }

    #[test]
    fn test_init_is_idempotent() {
        let config = LogConfig::default();
        config.init();
        config.init();
    }
}
