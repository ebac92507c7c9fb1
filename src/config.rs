use reqwest::Url;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable that overrides `server.base_url`
pub const BASE_URL_ENV: &str = "NGXDASH_URL";

/// Client configuration
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    /// Backend connection settings
    #[serde(default)]
    pub server: ServerConfig,

    /// Status push channel settings
    #[serde(default)]
    pub push: PushConfig,

    /// Logging settings
    #[serde(default)]
    pub log: LogConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    /// Backend origin, e.g. "http://127.0.0.1:8080"
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Prefix for every REST path (default: /api)
    #[serde(default = "default_api_prefix")]
    pub api_prefix: String,

    /// Per-request timeout in seconds (default: 10)
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_prefix: default_api_prefix(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl ServerConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Base URL joined with the API prefix, without a trailing slash
    pub fn api_root(&self) -> String {
        format!(
            "{}{}",
            self.base_url.trim_end_matches('/'),
            self.api_prefix.trim_end_matches('/')
        )
    }

    pub fn validate(&self) -> Result<(), String> {
        let url = Url::parse(&self.base_url)
            .map_err(|e| format!("server.base_url '{}' is not a valid URL: {}", self.base_url, e))?;

        if !matches!(url.scheme(), "http" | "https") {
            return Err(format!(
                "server.base_url '{}' must use http or https",
                self.base_url
            ));
        }

        if !self.api_prefix.is_empty() && !self.api_prefix.starts_with('/') {
            return Err(format!(
                "server.api_prefix '{}' must start with '/'",
                self.api_prefix
            ));
        }

        if self.request_timeout_secs == 0 {
            return Err("server.request_timeout_secs must be greater than 0".to_string());
        }

        Ok(())
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct PushConfig {
    /// Open the status push channel at all (default: true)
    #[serde(default = "default_push_enabled")]
    pub enabled: bool,

    /// Path of the status channel on the backend (default: /ws/status)
    #[serde(default = "default_push_path")]
    pub path: String,

    /// Delay before reconnecting after the channel closes, in milliseconds
    #[serde(default = "default_reconnect_delay")]
    pub reconnect_delay_ms: u64,
}

impl Default for PushConfig {
    fn default() -> Self {
        Self {
            enabled: default_push_enabled(),
            path: default_push_path(),
            reconnect_delay_ms: default_reconnect_delay(),
        }
    }
}

impl PushConfig {
    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }

    pub fn validate(&self) -> Result<(), String> {
        if !self.path.starts_with('/') {
            return Err(format!("push.path '{}' must start with '/'", self.path));
        }
        if self.reconnect_delay_ms == 0 {
            return Err("push.reconnect_delay_ms must be greater than 0".to_string());
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct LogConfig {
    /// Fallback filter directive when RUST_LOG is unset
    #[serde(default = "default_log_filter")]
    pub filter: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
        }
    }
}

// Default value functions
fn default_base_url() -> String {
    "http://127.0.0.1:8080".to_string()
}

fn default_api_prefix() -> String {
    "/api".to_string()
}

fn default_request_timeout() -> u64 {
    10
}

fn default_push_enabled() -> bool {
    true
}

fn default_push_path() -> String {
    "/ws/status".to_string()
}

fn default_reconnect_delay() -> u64 {
    5000
}

fn default_log_filter() -> String {
    "ngxdash=info".to_string()
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from an explicit path, or from the default location if it exists
    pub fn load_or_default(path: Option<&Path>) -> anyhow::Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => match default_config_path() {
                Some(path) if path.exists() => Self::load(path),
                _ => Ok(Self::default()),
            },
        }
    }

    /// Apply the environment override for the base URL
    pub fn apply_env(&mut self) {
        if let Ok(url) = std::env::var(BASE_URL_ENV) {
            if !url.trim().is_empty() {
                self.server.base_url = url.trim().to_string();
            }
        }
    }

    /// Validate all configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        let mut errors = Vec::new();

        if let Err(e) = self.server.validate() {
            errors.push(e);
        }
        if let Err(e) = self.push.validate() {
            errors.push(e);
        }

        if !errors.is_empty() {
            anyhow::bail!("Configuration errors:\n  - {}", errors.join("\n  - "));
        }

        Ok(())
    }
}

/// `<config dir>/ngxdash/config.toml`
pub fn default_config_path() -> Option<PathBuf> {
    dirs_next::config_dir().map(|dir| dir.join("ngxdash").join("config.toml"))
}
