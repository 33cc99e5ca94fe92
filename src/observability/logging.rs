//! Structured logging configuration.

use crate::config::LoggingSettings;
use std::path::PathBuf;

/// Default filter when neither config nor environment sets one.
const DEFAULT_DIRECTIVE: &str = "info";

/// Verbose filter for `--verbose`.
const VERBOSE_DIRECTIVE: &str = "haven=debug,info";

/// Log line format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable multi-line output.
    #[default]
    Pretty,
    /// One JSON object per line.
    Json,
}

impl LogFormat {
    /// Parses a format name. Unknown names fall back to pretty.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "json" => Self::Json,
            _ => Self::Pretty,
        }
    }
}

/// Resolved logging configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    /// Output format.
    pub format: LogFormat,
    /// `EnvFilter` directive.
    pub directive: String,
    /// Log file; stderr when `None`.
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::Pretty,
            directive: DEFAULT_DIRECTIVE.to_string(),
            file: None,
        }
    }
}

impl LoggingConfig {
    /// Builds logging configuration from config settings with env overrides.
    ///
    /// Precedence for the filter: `HAVEN_LOG`, `RUST_LOG`, `--verbose`, the
    /// config file, then `info`. `HAVEN_LOG_FORMAT` and `HAVEN_LOG_FILE`
    /// override the format and file.
    #[must_use]
    pub fn from_settings(settings: Option<&LoggingSettings>, verbose: bool) -> Self {
        let mut config = Self::default();

        if let Some(settings) = settings {
            if let Some(level) = settings.level.as_deref() {
                config.directive = level.to_string();
            }
            if let Some(format) = settings.format.as_deref() {
                config.format = LogFormat::parse(format);
            }
            config.file = settings.file.as_ref().map(PathBuf::from);
        }

        if verbose {
            config.directive = VERBOSE_DIRECTIVE.to_string();
        }
        if let Some(directive) = env_value("HAVEN_LOG").or_else(|| env_value("RUST_LOG")) {
            config.directive = directive;
        }
        if let Some(format) = env_value("HAVEN_LOG_FORMAT") {
            config.format = LogFormat::parse(&format);
        }
        if let Some(file) = env_value("HAVEN_LOG_FILE") {
            config.file = Some(PathBuf::from(file));
        }

        config
    }
}

fn env_value(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_format() {
        assert_eq!(LogFormat::parse("JSON"), LogFormat::Json);
        assert_eq!(LogFormat::parse("pretty"), LogFormat::Pretty);
        assert_eq!(LogFormat::parse("other"), LogFormat::Pretty);
    }

    #[test]
    fn test_settings_are_applied() {
        let settings = LoggingSettings {
            level: Some("warn".to_string()),
            format: Some("json".to_string()),
            file: Some("/tmp/haven.log".to_string()),
        };
        let config = LoggingConfig::from_settings(Some(&settings), false);
        assert_eq!(config.format, LogFormat::Json);
        assert_eq!(config.file, Some(PathBuf::from("/tmp/haven.log")));
        if std::env::var("HAVEN_LOG").is_err() && std::env::var("RUST_LOG").is_err() {
            assert_eq!(config.directive, "warn");
        }
    }
}
