//! Engine configuration management

use std::env;

use anyhow::{Context, Result, ensure};

/// Upper bound for `first`/`last` when nothing else is configured
pub const DEFAULT_MAX_PAGE_SIZE: i64 = 100;

/// Page size applied when a query supplies neither `first` nor `last`
pub const DEFAULT_PAGE_SIZE: i64 = 25;

/// Output format of the tracing subscriber
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Human readable, multi-line output
    #[default]
    Pretty,
    /// One JSON object per event
    Json,
}

impl LogFormat {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "pretty" | "text" => Some(LogFormat::Pretty),
            "json" => Some(LogFormat::Json),
            _ => None,
        }
    }
}

/// Engine configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// Maximum accepted value for `first`/`last`
    pub max_page_size: i64,

    /// Page size used when neither `first` nor `last` is given
    pub default_page_size: i64,

    /// Tracing output format
    pub log_format: LogFormat,

    /// Tracing env-filter directive (e.g. `filterql=debug`)
    pub log_filter: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_page_size: DEFAULT_MAX_PAGE_SIZE,
            default_page_size: DEFAULT_PAGE_SIZE,
            log_format: LogFormat::default(),
            log_filter: "filterql=info".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables (and `.env`, if present)
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let max_page_size = match lookup("FILTERQL_MAX_PAGE_SIZE") {
            Some(value) => value
                .trim()
                .parse()
                .context("Invalid FILTERQL_MAX_PAGE_SIZE")?,
            None => defaults.max_page_size,
        };

        let default_page_size = match lookup("FILTERQL_DEFAULT_PAGE_SIZE") {
            Some(value) => value
                .trim()
                .parse()
                .context("Invalid FILTERQL_DEFAULT_PAGE_SIZE")?,
            None => defaults.default_page_size.min(max_page_size),
        };

        let log_format = match lookup("FILTERQL_LOG_FORMAT") {
            Some(value) => LogFormat::parse(&value)
                .with_context(|| format!("Invalid FILTERQL_LOG_FORMAT '{}'", value))?,
            None => defaults.log_format,
        };

        let log_filter = lookup("FILTERQL_LOG")
            .or_else(|| lookup("RUST_LOG"))
            .unwrap_or(defaults.log_filter);

        ensure!(max_page_size >= 0, "FILTERQL_MAX_PAGE_SIZE must not be negative");
        ensure!(
            (0..=max_page_size).contains(&default_page_size),
            "FILTERQL_DEFAULT_PAGE_SIZE must be between 0 and {}",
            max_page_size
        );

        Ok(Self {
            max_page_size,
            default_page_size,
            log_format,
            log_filter,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_config_defaults() {
        let config = Config::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(config.max_page_size, 100);
        assert_eq!(config.default_page_size, 25);
        assert_eq!(config.log_format, LogFormat::Pretty);
        assert_eq!(config.log_filter, "filterql=info");
    }

    #[test]
    fn test_config_overrides() {
        let config = Config::from_lookup(lookup_from(&[
            ("FILTERQL_MAX_PAGE_SIZE", "500"),
            ("FILTERQL_DEFAULT_PAGE_SIZE", "50"),
            ("FILTERQL_LOG_FORMAT", "JSON"),
            ("RUST_LOG", "filterql=debug"),
        ]))
        .unwrap();

        assert_eq!(config.max_page_size, 500);
        assert_eq!(config.default_page_size, 50);
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(config.log_filter, "filterql=debug");
    }

    #[test]
    fn test_small_max_page_size_clamps_default() {
        let config = Config::from_lookup(lookup_from(&[("FILTERQL_MAX_PAGE_SIZE", "10")])).unwrap();
        assert_eq!(config.default_page_size, 10);
    }

    #[test]
    fn test_config_rejects_invalid_values() {
        assert!(Config::from_lookup(lookup_from(&[("FILTERQL_MAX_PAGE_SIZE", "lots")])).is_err());
        assert!(Config::from_lookup(lookup_from(&[("FILTERQL_LOG_FORMAT", "xml")])).is_err());
        assert!(
            Config::from_lookup(lookup_from(&[
                ("FILTERQL_MAX_PAGE_SIZE", "10"),
                ("FILTERQL_DEFAULT_PAGE_SIZE", "20"),
            ]))
            .is_err()
        );
    }
}
