//! Configuration management for the client.

use crate::{CoreError, CoreResult, Paths};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use url::Url;

/// Default API base URL (can be overridden at compile time via PAPERDESK_API_URL env var).
pub const DEFAULT_API_BASE_URL: &str = match option_env!("PAPERDESK_API_URL") {
    Some(url) => url,
    None => "http://127.0.0.1:5000",
};

/// Default log level.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Default per-request timeout in seconds.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

const ENV_LOG_LEVEL: &str = "PAPERDESK_LOG_LEVEL";
const ENV_API_URL: &str = "PAPERDESK_API_URL";
const ENV_REQUEST_TIMEOUT: &str = "PAPERDESK_REQUEST_TIMEOUT_SECS";

/// Main client configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Base URL of the paper service REST API.
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    /// Timeout applied to every HTTP request.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_api_base_url() -> String {
    DEFAULT_API_BASE_URL.to_string()
}

fn default_request_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            api_base_url: default_api_base_url(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl Config {
    /// Create a new Config with default values, then override from environment.
    pub fn new() -> Self {
        let mut config = Self::default();
        config.load_from_env();
        config
    }

    /// Load configuration from the config file if present, falling back to
    /// defaults, then apply environment overrides.
    pub fn load(paths: &Paths) -> CoreResult<Self> {
        let config_path = paths.config_file();

        let mut config = if config_path.exists() {
            Self::load_from_file(&config_path)?
        } else {
            Self::default()
        };

        config.load_from_env();
        config.validate()?;

        Ok(config)
    }

    /// Load configuration from a specific file.
    pub fn load_from_file(path: &Path) -> CoreResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a file.
    pub fn save(&self, paths: &Paths) -> CoreResult<()> {
        paths.ensure_dirs()?;
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(paths.config_file(), content)?;
        Ok(())
    }

    fn load_from_env(&mut self) {
        self.apply_overrides(|name| std::env::var(name).ok());
    }

    /// Apply overrides from a variable lookup. Empty values are ignored, as are
    /// timeouts that don't parse as a positive integer.
    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let lookup = |name: &str| {
            lookup(name)
                .map(|raw| raw.trim().to_string())
                .filter(|raw| !raw.is_empty())
        };

        if let Some(level) = lookup(ENV_LOG_LEVEL) {
            self.log_level = level;
        }
        if let Some(url) = lookup(ENV_API_URL) {
            self.api_base_url = url;
        }
        if let Some(secs) = lookup(ENV_REQUEST_TIMEOUT).and_then(|raw| raw.parse::<u64>().ok()) {
            if secs > 0 {
                self.request_timeout_secs = secs;
            }
        }
    }

    /// Check that the configuration is usable.
    pub fn validate(&self) -> CoreResult<()> {
        let url = self.api_base_url()?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(CoreError::Config(format!(
                "unsupported API scheme: {}",
                url.scheme()
            )));
        }
        if self.request_timeout_secs == 0 {
            return Err(CoreError::Config(
                "request_timeout_secs must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Get the API base URL as a parsed URL.
    pub fn api_base_url(&self) -> CoreResult<Url> {
        Url::parse(&self.api_base_url).map_err(CoreError::from)
    }

    /// Get the request timeout.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::tempdir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.log_level, DEFAULT_LOG_LEVEL);
        assert_eq!(config.api_base_url, DEFAULT_API_BASE_URL);
        assert_eq!(config.request_timeout_secs, DEFAULT_REQUEST_TIMEOUT_SECS);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_load_from_file_fills_missing_fields() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("config.json");

        std::fs::write(&config_path, r#"{ "log_level": "debug" }"#).unwrap();

        let config = Config::load_from_file(&config_path).unwrap();
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.api_base_url, DEFAULT_API_BASE_URL);
        assert_eq!(config.request_timeout_secs, DEFAULT_REQUEST_TIMEOUT_SECS);
    }

    #[test]
    fn test_config_save_and_load_roundtrip() {
        let dir = tempdir().unwrap();
        let paths = Paths::with_base_dir(dir.path().to_path_buf());

        let config = Config {
            log_level: "trace".to_string(),
            api_base_url: "https://papers.example.org".to_string(),
            request_timeout_secs: 5,
        };
        config.save(&paths).unwrap();

        let loaded = Config::load_from_file(&paths.config_file()).unwrap();
        assert_eq!(loaded.log_level, "trace");
        assert_eq!(loaded.api_base_url, "https://papers.example.org");
        assert_eq!(loaded.request_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn test_config_load_nonexistent_uses_defaults() {
        let dir = tempdir().unwrap();
        let paths = Paths::with_base_dir(dir.path().to_path_buf());

        let config = Config::load(&paths).unwrap();
        assert_eq!(config.request_timeout_secs, DEFAULT_REQUEST_TIMEOUT_SECS);
    }

    #[test]
    fn test_overrides_apply_and_skip_blank_values() {
        let vars: HashMap<&str, &str> = [
            (ENV_LOG_LEVEL, "warn"),
            (ENV_API_URL, "   "),
            (ENV_REQUEST_TIMEOUT, "12"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config.apply_overrides(|name| vars.get(name).map(|v| v.to_string()));

        assert_eq!(config.log_level, "warn");
        assert_eq!(config.api_base_url, DEFAULT_API_BASE_URL);
        assert_eq!(config.request_timeout_secs, 12);
    }

    #[test]
    fn test_overrides_ignore_bad_timeout() {
        let mut config = Config::default();
        config.apply_overrides(|name| (name == ENV_REQUEST_TIMEOUT).then(|| "zero".to_string()));
        assert_eq!(config.request_timeout_secs, DEFAULT_REQUEST_TIMEOUT_SECS);

        config.apply_overrides(|name| (name == ENV_REQUEST_TIMEOUT).then(|| "0".to_string()));
        assert_eq!(config.request_timeout_secs, DEFAULT_REQUEST_TIMEOUT_SECS);
    }

    #[test]
    fn test_config_invalid_url() {
        let mut config = Config::default();
        config.api_base_url = "not a valid url".to_string();
        assert!(config.api_base_url().is_err());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_rejects_non_http_scheme() {
        let mut config = Config::default();
        config.api_base_url = "ftp://papers.example.org".to_string();
        assert!(matches!(config.validate(), Err(CoreError::Config(_))));
    }
}
