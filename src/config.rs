//! Configuration System
//!
//! Handles loading configuration from files and environment variables.
//! Supports TOML config files and environment variable overrides.

use serde::Deserialize;
use std::path::{Path, PathBuf};

/// File name used for the persisted bearer token
pub const TOKEN_FILE_NAME: &str = "gluco_meter_token";

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,

    #[serde(default)]
    pub session: SessionConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Backend API configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    /// Explicit API base URL. Takes precedence over `origin`.
    #[serde(default)]
    pub base_url: Option<String>,

    /// Origin the API is served from; the base URL becomes `{origin}/api`.
    #[serde(default = "default_origin")]
    pub origin: String,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

fn default_origin() -> String {
    "http://localhost:8000".to_string()
}

fn default_request_timeout() -> u64 {
    30
}

fn default_page_size() -> u32 {
    10
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            origin: default_origin(),
            request_timeout_secs: default_request_timeout(),
            page_size: default_page_size(),
        }
    }
}

impl ApiConfig {
    /// Base URL every request path is appended to, without a trailing slash.
    pub fn resolved_base_url(&self) -> String {
        resolve_base_url(self.base_url.as_deref(), &self.origin)
    }
}

/// Pick the explicit override when present, otherwise derive `{origin}/api`.
pub fn resolve_base_url(override_url: Option<&str>, origin: &str) -> String {
    match override_url.map(str::trim).filter(|url| !url.is_empty()) {
        Some(url) => url.trim_end_matches('/').to_string(),
        None => {
            let origin = origin.trim().trim_end_matches('/');
            if origin.is_empty() {
                "/api".to_string()
            } else {
                format!("{}/api", origin)
            }
        }
    }
}

/// Session persistence configuration
#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    #[serde(default = "default_token_path")]
    pub token_path: String,
}

fn default_token_path() -> String {
    dirs::data_local_dir()
        .map(|p| p.join("gluco").join(TOKEN_FILE_NAME).to_string_lossy().to_string())
        .unwrap_or_else(|| format!("./.{}", TOKEN_FILE_NAME))
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            token_path: default_token_path(),
        }
    }
}

impl SessionConfig {
    /// Token path with a leading `~/` expanded to the home directory
    pub fn resolved_token_path(&self) -> PathBuf {
        match (self.token_path.strip_prefix("~/"), dirs::home_dir()) {
            (Some(rest), Some(home)) => home.join(rest),
            _ => PathBuf::from(&self.token_path),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_log_format")]
    pub format: String,

    pub file: Option<String>,
}

fn default_log_level() -> String {
    "warn".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            file: None,
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        let config: Config = toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        Ok(config)
    }

    /// Load configuration from environment variables only
    pub fn from_env() -> Self {
        let mut config = Config::default();
        config.apply_env_overrides();
        config
    }

    /// Load configuration with environment variable overrides
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Config files searched by [`Config::load_default`], in order
    pub fn search_paths() -> Vec<PathBuf> {
        [
            dirs::config_dir().map(|p| p.join("gluco").join("config.toml")),
            Some(PathBuf::from("/etc/gluco/config.toml")),
            Some(PathBuf::from("./config.toml")),
        ]
        .into_iter()
        .flatten()
        .collect()
    }

    /// Load the first existing file in `paths` that parses, else defaults.
    ///
    /// Files that exist but fail to load are returned alongside the config,
    /// since this usually runs before logging is set up.
    pub fn load_first(paths: &[PathBuf]) -> (Self, Vec<ConfigError>) {
        let mut failures = Vec::new();

        for path in paths.iter().filter(|p| p.exists()) {
            match Self::load_with_env(path) {
                Ok(config) => {
                    tracing::debug!("Loaded config from {:?}", path);
                    return (config, failures);
                }
                Err(e) => failures.push(e),
            }
        }

        tracing::debug!("Using default config with environment overrides");
        (Self::from_env(), failures)
    }

    /// Load from default locations or environment
    pub fn load_default() -> Self {
        let (config, failures) = Self::load_first(&Self::search_paths());
        for e in failures {
            tracing::warn!("{}", e);
        }
        config
    }

    /// Apply environment variable overrides to an existing config
    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        // API overrides
        if let Some(url) = lookup("GLUCO_API_BASE_URL") {
            self.api.base_url = Some(url);
        }
        if let Some(origin) = lookup("GLUCO_APP_ORIGIN") {
            self.api.origin = origin;
        }
        if let Some(size) = lookup("GLUCO_PAGE_SIZE") {
            match size.parse::<u32>() {
                Ok(s) if s > 0 => self.api.page_size = s,
                _ => tracing::warn!("Ignoring invalid GLUCO_PAGE_SIZE: {}", size),
            }
        }
        if let Some(timeout) = lookup("GLUCO_REQUEST_TIMEOUT_SECS") {
            if let Ok(t) = timeout.parse() {
                self.api.request_timeout_secs = t;
            }
        }

        // Session overrides
        if let Some(path) = lookup("GLUCO_TOKEN_PATH") {
            self.session.token_path = path;
        }

        // Logging overrides
        if let Some(level) = lookup("GLUCO_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(format) = lookup("GLUCO_LOG_FORMAT") {
            self.logging.format = format;
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {error}")]
    Io { path: PathBuf, error: String },

    #[error("Failed to parse config file {path:?}: {error}")]
    Parse { path: PathBuf, error: String },
}

/// Generate a default config file content
pub fn generate_default_config() -> String {
    r#"# Gluco Configuration
#
# Environment variables override these settings:
# - GLUCO_API_BASE_URL
# - GLUCO_APP_ORIGIN
# - GLUCO_PAGE_SIZE
# - GLUCO_REQUEST_TIMEOUT_SECS
# - GLUCO_TOKEN_PATH
# - GLUCO_LOG_LEVEL
# - GLUCO_LOG_FORMAT

[api]
# Full API base URL. When unset, "{origin}/api" is used.
# base_url = "https://gluco.example.com/api"

# Origin the gluco-meter app is served from
origin = "http://localhost:8000"

# Request timeout in seconds
request_timeout_secs = 30

# Readings per page
page_size = 10

[session]
# Where the bearer token is persisted between runs
token_path = "~/.local/share/gluco/gluco_meter_token"

[logging]
# Log level: trace, debug, info, warn, error
level = "warn"

# Log format: pretty (for development) or json (for production)
format = "pretty"

# Optional log file path
# file = "/var/log/gluco/gluco.log"
"#
    .to_string()
}
