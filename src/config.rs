//! Configuration file parser for ~/.config/apod-reader/config.toml.
//!
//! The config file is optional: a missing file yields `Config::default()`.
//! Unknown keys are ignored by serde, though we log a warning when the file
//! contains potential typos.
use crate::feed::{RetryPolicy, DEFAULT_BASE_URL};
use crate::util::{validate_base_url, UrlValidationError};
use secrecy::SecretString;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Environment variable that overrides `api_key` from the file.
pub const API_KEY_ENV: &str = "APOD_API_KEY";

/// Key accepted by the API at a low rate limit.
pub const DEMO_API_KEY: &str = "DEMO_KEY";

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Config file too large: {0}")]
    TooLarge(String),

    #[error("Invalid base_url: {0}")]
    BaseUrl(#[from] UrlValidationError),
}

// ============================================================================
// Configuration Structs
// ============================================================================

/// Top-level application configuration.
///
/// All fields use `#[serde(default)]` so any subset of keys can be specified.
/// `Debug` masks `api_key`.
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// API key (alternative to the APOD_API_KEY env var).
    /// Env var takes precedence over config file.
    pub api_key: Option<String>,

    /// Endpoint queried for the feed.
    pub base_url: String,

    /// Bound on one exchange (connect + read), in seconds.
    pub timeout_secs: u64,

    /// Total transport attempts per fetch, including the first.
    pub max_attempts: u32,

    /// Delay before the first retry; doubles for each later retry.
    pub backoff_base_ms: u64,

    /// First day to show (YYYY-MM-DD). Defaults to six days before today.
    pub start_date: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_secs: 10,
            max_attempts: 3,
            backoff_base_ms: 200,
            start_date: None,
        }
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("base_url", &self.base_url)
            .field("timeout_secs", &self.timeout_secs)
            .field("max_attempts", &self.max_attempts)
            .field("backoff_base_ms", &self.backoff_base_ms)
            .field("start_date", &self.start_date)
            .finish()
    }
}

impl Config {
    const MAX_FILE_SIZE: u64 = 1_048_576;

    const KNOWN_KEYS: [&'static str; 6] = [
        "api_key",
        "base_url",
        "timeout_secs",
        "max_attempts",
        "backoff_base_ms",
        "start_date",
    ];

    /// Load configuration from a TOML file.
    ///
    /// - Missing file → `Ok(Config::default())`
    /// - Empty file → `Ok(Config::default())`
    /// - Invalid TOML → `Err(ConfigError::Parse)` with line number info
    /// - Unknown keys → accepted, logged as warning
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::metadata(path) {
            Ok(meta) if meta.len() > Self::MAX_FILE_SIZE => {
                return Err(ConfigError::TooLarge(format!(
                    "Config file is {} bytes (max {} bytes)",
                    meta.len(),
                    Self::MAX_FILE_SIZE
                )));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
            Ok(_) => {}
        }

        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "Config file disappeared, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
        };

        if content.trim().is_empty() {
            tracing::debug!(path = %path.display(), "Config file is empty, using defaults");
            return Ok(Self::default());
        }

        if let Ok(raw) = content.parse::<toml::Table>() {
            for key in raw.keys() {
                if !Self::KNOWN_KEYS.contains(&key.as_str()) {
                    tracing::warn!(key = %key, "Unknown key in config file, ignoring");
                }
            }
        }

        let config: Config = toml::from_str(&content)?;
        tracing::info!(path = %path.display(), base_url = %config.base_url, "Loaded configuration");
        Ok(config)
    }

    /// Resolves the API key: env var, then config file, then `DEMO_KEY`.
    pub fn api_key(&self) -> SecretString {
        self.api_key_from(std::env::var(API_KEY_ENV).ok())
    }

    fn api_key_from(&self, env_value: Option<String>) -> SecretString {
        let key = env_value
            .filter(|k| !k.trim().is_empty())
            .or_else(|| self.api_key.clone().filter(|k| !k.trim().is_empty()))
            .unwrap_or_else(|| {
                tracing::info!("No API key configured, using {}", DEMO_API_KEY);
                DEMO_API_KEY.to_string()
            });
        SecretString::from(key)
    }

    /// Parses and checks `base_url` (HTTPS unless loopback).
    pub fn base_url(&self) -> Result<Url, ConfigError> {
        Ok(validate_base_url(&self.base_url)?)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts.max(1),
            base_delay: Duration::from_millis(self.backoff_base_ms),
        }
    }

    /// Configured start date, or six days before `today` so a week of
    /// pictures is shown.
    pub fn start_date_or(&self, today: chrono::NaiveDate) -> String {
        match &self.start_date {
            Some(date) => date.clone(),
            None => (today - chrono::Days::new(6)).format("%Y-%m-%d").to_string(),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    fn write_config(name: &str, content: &str) -> (std::path::PathBuf, std::path::PathBuf) {
        let dir = std::env::temp_dir().join(format!("apod_config_test_{name}"));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");
        std::fs::write(&path, content).unwrap();
        (dir, path)
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.api_key.is_none());
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.timeout(), Duration::from_secs(10));
        assert_eq!(config.retry_policy(), RetryPolicy::default());
        assert!(config.start_date.is_none());
    }

    #[test]
    fn test_missing_file_returns_default() {
        let path = Path::new("/tmp/apod_test_nonexistent_config.toml");
        let config = Config::load(path).unwrap();
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
    }

    #[test]
    fn test_whitespace_only_file_returns_default() {
        let (dir, path) = write_config("whitespace", "   \n  \n  ");
        let config = Config::load(&path).unwrap();
        assert_eq!(config.max_attempts, 3);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_partial_config_uses_defaults_for_missing() {
        let (dir, path) = write_config("partial", "timeout_secs = 3\n");
        let config = Config::load(&path).unwrap();
        assert_eq!(config.timeout(), Duration::from_secs(3));
        assert_eq!(config.max_attempts, 3);
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_full_config() {
        let content = r#"
api_key = "file-key"
base_url = "http://127.0.0.1:9999/apod"
timeout_secs = 5
max_attempts = 4
backoff_base_ms = 50
start_date = "2023-09-08"
"#;
        let (dir, path) = write_config("full", content);
        let config = Config::load(&path).unwrap();

        assert_eq!(config.api_key.as_deref(), Some("file-key"));
        assert_eq!(config.base_url().unwrap().port(), Some(9999));
        assert_eq!(
            config.retry_policy(),
            RetryPolicy {
                max_attempts: 4,
                base_delay: Duration::from_millis(50),
            }
        );
        assert_eq!(config.start_date.as_deref(), Some("2023-09-08"));
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_invalid_toml_returns_error() {
        let (dir, path) = write_config("invalid", "this is not [valid toml");
        let err = Config::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
        assert!(err.to_string().contains("Invalid TOML"));
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_wrong_type_returns_error() {
        let (dir, path) = write_config("wrongtype", "max_attempts = \"three\"\n");
        assert!(Config::load(&path).is_err());
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_unknown_keys_accepted() {
        let (dir, path) = write_config("unknown", "theme = \"dark\"\ntimeout_secs = 7\n");
        let config = Config::load(&path).unwrap();
        assert_eq!(config.timeout_secs, 7);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_too_large_file_rejected() {
        let (dir, path) = write_config("too_large", &"a".repeat(1_048_577));
        let err = Config::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::TooLarge(_)));
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_insecure_base_url_rejected() {
        let config = Config {
            base_url: "http://api.nasa.gov/planetary/apod".into(),
            ..Config::default()
        };
        assert!(matches!(config.base_url(), Err(ConfigError::BaseUrl(_))));
    }

    #[test]
    fn test_zero_values_clamped() {
        let config = Config {
            timeout_secs: 0,
            max_attempts: 0,
            ..Config::default()
        };
        assert_eq!(config.timeout(), Duration::from_secs(1));
        assert_eq!(config.retry_policy().max_attempts, 1);
    }

    #[test]
    fn test_api_key_precedence() {
        let config = Config {
            api_key: Some("file-key".into()),
            ..Config::default()
        };
        assert_eq!(
            config.api_key_from(Some("env-key".into())).expose_secret(),
            "env-key"
        );
        assert_eq!(config.api_key_from(None).expose_secret(), "file-key");
        assert_eq!(
            config.api_key_from(Some("  ".into())).expose_secret(),
            "file-key"
        );
        assert_eq!(
            Config::default().api_key_from(None).expose_secret(),
            DEMO_API_KEY
        );
    }

    #[test]
    fn test_default_start_date_is_week_window() {
        let today = chrono::NaiveDate::from_ymd_opt(2023, 9, 14).unwrap();
        assert_eq!(Config::default().start_date_or(today), "2023-09-08");

        let config = Config {
            start_date: Some("2023-01-01".into()),
            ..Config::default()
        };
        assert_eq!(config.start_date_or(today), "2023-01-01");
    }

    #[test]
    fn test_debug_masks_api_key() {
        let config = Config {
            api_key: Some("super-secret-key-12345".into()),
            ..Config::default()
        };
        let debug_output = format!("{:?}", config);
        assert!(!debug_output.contains("super-secret-key-12345"));
        assert!(debug_output.contains("[REDACTED]"));
    }
}
