//! Configurable logging setup built on `tracing-subscriber`.

use tracing_subscriber::EnvFilter;

use crate::error::{TelemetryError, TelemetryResult};

/// Output format for log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable, colorized, for interactive terminals.
    Pretty,
    /// One JSON object per line, for production log aggregation.
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = TelemetryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(TelemetryError::InvalidDirective(other.to_string())),
        }
    }
}

/// Logging configuration: base level, format, and per-target overrides.
#[derive(Debug, Clone)]
pub struct LogConfig {
    level: String,
    format: LogFormat,
    directives: Vec<String>,
}

impl LogConfig {
    /// Start a config with the given base level (`"trace"`, `"debug"`,
    /// `"info"`, `"warn"`, `"error"`, or an `EnvFilter`-compatible string).
    #[must_use]
    pub fn new(level: impl Into<String>) -> Self {
        Self {
            level: level.into(),
            format: LogFormat::Pretty,
            directives: Vec::new(),
        }
    }

    /// Set the output format.
    #[must_use]
    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    /// Add a per-target directive (e.g. `"relay_sandbox=debug"`).
    #[must_use]
    pub fn with_directive(mut self, directive: impl Into<String>) -> Self {
        self.directives.push(directive.into());
        self
    }

    fn env_filter(&self) -> TelemetryResult<EnvFilter> {
        let mut filter = EnvFilter::try_new(&self.level)
            .map_err(|_| TelemetryError::InvalidDirective(self.level.clone()))?;
        for directive in &self.directives {
            let parsed = directive
                .parse()
                .map_err(|_| TelemetryError::InvalidDirective(directive.clone()))?;
            filter = filter.add_directive(parsed);
        }
        Ok(filter)
    }
}

/// Install the global `tracing` subscriber per `config`.
///
/// # Errors
///
/// Returns [`TelemetryError::InvalidDirective`] if the level or any
/// directive fails to parse, or [`TelemetryError::AlreadyInitialized`] if a
/// global subscriber is already installed.
pub fn setup_logging(config: &LogConfig) -> TelemetryResult<()> {
    let filter = config.env_filter()?;
    let subscriber = tracing_subscriber::fmt().with_env_filter(filter);

    let result = match config.format {
        LogFormat::Pretty => subscriber.pretty().try_init(),
        LogFormat::Json => subscriber.json().try_init(),
    };

    result.map_err(|_| TelemetryError::AlreadyInitialized)
}

/// Install logging with sensible interactive defaults (`info`, pretty).
///
/// # Errors
///
/// See [`setup_logging`].
pub fn setup_default_logging() -> TelemetryResult<()> {
    setup_logging(&LogConfig::new("info"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_parses_from_str() {
        assert_eq!("pretty".parse::<LogFormat>().unwrap(), LogFormat::Pretty);
        assert_eq!("json".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert!("xml".parse::<LogFormat>().is_err());
    }

    #[test]
    fn bad_directive_is_rejected_before_install() {
        let config = LogConfig::new("info").with_directive("not a directive!!");
        assert!(config.env_filter().is_err());
    }
}
