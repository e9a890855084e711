use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};

/// Page configuration loaded from environment variables.
/// Fails at startup if `PAGEKIT_BASE_URL` is missing or a number does not parse.
#[derive(Debug, Clone)]
pub struct Config {
    pub base_url: String,
    pub storage_path: PathBuf,
    pub notify_dismiss_ms: u64,
    pub debounce_ms: u64,
    pub request_timeout_secs: u64,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            base_url: require_env("PAGEKIT_BASE_URL")?
                .trim_end_matches('/')
                .to_string(),
            storage_path: std::env::var("PAGEKIT_STORAGE_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("pagekit-storage.json")),
            notify_dismiss_ms: env_or("NOTIFY_DISMISS_MS", 5000)?,
            debounce_ms: env_or("SEARCH_DEBOUNCE_MS", 300)?,
            request_timeout_secs: env_or("REQUEST_TIMEOUT_SECS", 30)?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        })
    }

    pub fn notify_dismiss(&self) -> Duration {
        Duration::from_millis(self.notify_dismiss_ms)
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Resolves an endpoint path against the configured base URL.
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn env_or<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    parse_or(key, std::env::var(key).ok().as_deref(), default)
}

fn parse_or<T>(key: &str, raw: Option<&str>, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match raw {
        Some(value) => value
            .trim()
            .parse::<T>()
            .with_context(|| format!("{key} must be a valid number, got '{value}'")),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Config {
        Config {
            base_url: "http://localhost:8080".into(),
            storage_path: PathBuf::from("prefs.json"),
            notify_dismiss_ms: 5000,
            debounce_ms: 300,
            request_timeout_secs: 30,
            rust_log: "info".into(),
        }
    }

    #[test]
    fn test_parse_or_uses_default_when_absent() {
        assert_eq!(parse_or::<u64>("X", None, 42).unwrap(), 42);
    }

    #[test]
    fn test_parse_or_parses_value() {
        assert_eq!(parse_or::<u64>("X", Some(" 250 "), 42).unwrap(), 250);
    }

    #[test]
    fn test_parse_or_rejects_garbage() {
        let err = parse_or::<u64>("NOTIFY_DISMISS_MS", Some("soon"), 1).unwrap_err();
        assert!(err.to_string().contains("NOTIFY_DISMISS_MS"));
    }

    #[test]
    fn test_endpoint_joins_with_single_slash() {
        let config = sample();
        assert_eq!(config.endpoint("/health"), "http://localhost:8080/health");
        assert_eq!(config.endpoint("upload"), "http://localhost:8080/upload");
    }

    #[test]
    fn test_durations() {
        let config = sample();
        assert_eq!(config.debounce(), Duration::from_millis(300));
        assert_eq!(config.notify_dismiss(), Duration::from_secs(5));
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
    }
}
