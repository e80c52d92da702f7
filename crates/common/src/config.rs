use std::time::Duration;

use crate::{Error, Result};

/// How log lines are rendered by the binary's subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Process configuration loaded from environment variables at startup.
/// Every variable has a default; malformed values are rejected.
#[derive(Debug, Clone)]
pub struct Config {
    // Price feed
    pub binance_base_url: String,
    pub http_timeout: Duration,
    pub http_retries: u32,

    // Accounts file path
    pub accounts_config_path: String,

    // Logging
    pub log_format: LogFormat,
}

impl Config {
    /// Load configuration from the process environment.
    /// Loads `.env` if present.
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv(); // ignore error if .env not present
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let log_format = match lookup("LOG_FORMAT")
            .map(|v| v.to_lowercase())
            .as_deref()
        {
            None | Some("pretty") => LogFormat::Pretty,
            Some("json") => LogFormat::Json,
            Some(other) => {
                return Err(Error::Config(format!(
                    "LOG_FORMAT must be 'pretty' or 'json', got: '{other}'"
                )))
            }
        };

        let timeout_ms: u64 = parse_or(&lookup, "HTTP_TIMEOUT_MS", 9000)?;
        if timeout_ms == 0 {
            return Err(Error::Config("HTTP_TIMEOUT_MS must be positive".into()));
        }

        Ok(Config {
            binance_base_url: lookup("BINANCE_BASE_URL")
                .unwrap_or_else(|| "https://api.binance.com/api".to_string()),
            http_timeout: Duration::from_millis(timeout_ms),
            http_retries: parse_or(&lookup, "HTTP_RETRIES", 1)?,
            accounts_config_path: lookup("ACCOUNTS_CONFIG_PATH")
                .unwrap_or_else(|| "config/accounts.toml".to_string()),
            log_format,
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|_| {
            Error::Config(format!("{key} has an unparseable value: '{raw}'"))
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_unset() {
        let cfg = Config::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(cfg.binance_base_url, "https://api.binance.com/api");
        assert_eq!(cfg.http_timeout, Duration::from_millis(9000));
        assert_eq!(cfg.http_retries, 1);
        assert_eq!(cfg.accounts_config_path, "config/accounts.toml");
        assert_eq!(cfg.log_format, LogFormat::Pretty);
    }

    #[test]
    fn overrides_are_parsed() {
        let cfg = Config::from_lookup(lookup_from(&[
            ("HTTP_TIMEOUT_MS", "2500"),
            ("HTTP_RETRIES", "3"),
            ("LOG_FORMAT", "JSON"),
        ]))
        .unwrap();
        assert_eq!(cfg.http_timeout, Duration::from_millis(2500));
        assert_eq!(cfg.http_retries, 3);
        assert_eq!(cfg.log_format, LogFormat::Json);
    }

    #[test]
    fn malformed_values_are_rejected() {
        let err = Config::from_lookup(lookup_from(&[("HTTP_RETRIES", "many")])).unwrap_err();
        assert!(matches!(err, Error::Config(_)));

        let err = Config::from_lookup(lookup_from(&[("LOG_FORMAT", "xml")])).unwrap_err();
        assert!(matches!(err, Error::Config(_)));

        let err = Config::from_lookup(lookup_from(&[("HTTP_TIMEOUT_MS", "0")])).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
