//! Configuration System
//!
//! Handles loading configuration from files and environment variables.
//! Supports TOML config files and environment variable overrides.

use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub auth: AuthConfig,

    #[serde(default)]
    pub email: EmailConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Allowed CORS origins; empty means any origin
    #[serde(default)]
    pub cors_origins: Vec<String>,

    #[serde(default = "default_max_body_size")]
    pub max_body_size: usize,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8787
}

fn default_max_body_size() -> usize {
    256 * 1024 // 256 KB
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origins: Vec::new(),
            max_body_size: default_max_body_size(),
        }
    }
}

/// Database configuration
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_database_path")]
    pub path: String,
}

fn default_database_path() -> String {
    dirs::data_local_dir()
        .map(|p| p.join("wm-funnel").join("funnel.db").to_string_lossy().to_string())
        .unwrap_or_else(|| "./wm_funnel_data/funnel.db".to_string())
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
        }
    }
}

/// Bearer-token authentication for admin endpoints
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// Hosted auth service base URL; when unset, only static tokens work
    #[serde(default)]
    pub supabase_url: Option<String>,

    #[serde(default)]
    pub supabase_anon_key: Option<String>,

    /// token → user id, for local development
    #[serde(default)]
    pub static_tokens: HashMap<String, String>,

    #[serde(default = "default_auth_timeout")]
    pub timeout_secs: u64,
}

fn default_auth_timeout() -> u64 {
    10
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            supabase_url: None,
            supabase_anon_key: None,
            static_tokens: HashMap::new(),
            timeout_secs: default_auth_timeout(),
        }
    }
}

/// Transactional email configuration
#[derive(Debug, Clone, Deserialize)]
pub struct EmailConfig {
    /// Resend API key; when unset, emails are only logged
    #[serde(default)]
    pub resend_api_key: Option<String>,

    #[serde(default = "default_email_api_base")]
    pub api_base: String,

    #[serde(default = "default_email_from")]
    pub from: String,

    #[serde(default)]
    pub reply_to: Option<String>,

    /// Inbox that receives an alert for every new lead
    #[serde(default)]
    pub notify_address: Option<String>,

    #[serde(default = "default_email_timeout")]
    pub timeout_secs: u64,
}

fn default_email_api_base() -> String {
    "https://api.resend.com".to_string()
}

fn default_email_from() -> String {
    "Window Man <notifications@windowman.example>".to_string()
}

fn default_email_timeout() -> u64 {
    15
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            resend_api_key: None,
            api_base: default_email_api_base(),
            from: default_email_from(),
            reply_to: None,
            notify_address: None,
            timeout_secs: default_email_timeout(),
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
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
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

    /// Load from an explicit path, or from default locations, or environment
    pub fn resolve(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        match explicit {
            Some(path) => Self::load_with_env(path),
            None => Ok(Self::load_default()),
        }
    }

    /// Load from default locations or environment
    pub fn load_default() -> Self {
        let config_paths = [
            dirs::config_dir().map(|p| p.join("wm-funnel").join("config.toml")),
            Some(PathBuf::from("/etc/wm-funnel/config.toml")),
            Some(PathBuf::from("./config.toml")),
        ];

        for path_opt in config_paths.iter().flatten() {
            if path_opt.exists() {
                match Self::load_with_env(path_opt) {
                    Ok(config) => {
                        tracing::info!("Loaded config from {:?}", path_opt);
                        return config;
                    }
                    Err(e) => {
                        tracing::warn!("Failed to load config from {:?}: {}", path_opt, e);
                    }
                }
            }
        }

        tracing::info!("Using default config with environment overrides");
        Self::from_env()
    }

    /// Apply environment variable overrides to an existing config
    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides<F>(&mut self, var: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        // Server overrides
        if let Some(host) = var("WM_HOST") {
            self.server.host = host;
        }
        if let Some(port) = var("WM_PORT") {
            if let Ok(p) = port.parse() {
                self.server.port = p;
            }
        }

        // Database overrides
        if let Some(path) = var("WM_DATABASE_PATH") {
            self.database.path = path;
        }

        // Auth overrides
        if let Some(url) = var("SUPABASE_URL") {
            self.auth.supabase_url = Some(url);
        }
        if let Some(key) = var("SUPABASE_ANON_KEY") {
            self.auth.supabase_anon_key = Some(key);
        }

        // Email overrides
        if let Some(key) = var("RESEND_API_KEY") {
            self.email.resend_api_key = Some(key);
        }
        if let Some(from) = var("WM_EMAIL_FROM") {
            self.email.from = from;
        }
        if let Some(notify) = var("WM_NOTIFY_EMAIL") {
            self.email.notify_address = Some(notify);
        }

        // Logging overrides
        if let Some(level) = var("WM_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(format) = var("WM_LOG_FORMAT") {
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
    r#"# WM Funnel Configuration
#
# Environment variables override these settings:
# - WM_HOST, WM_PORT
# - WM_DATABASE_PATH
# - SUPABASE_URL, SUPABASE_ANON_KEY
# - RESEND_API_KEY, WM_EMAIL_FROM, WM_NOTIFY_EMAIL
# - WM_LOG_LEVEL, WM_LOG_FORMAT

[server]
host = "0.0.0.0"
port = 8787

# Allowed CORS origins (empty = any origin)
cors_origins = []

# Maximum request body size (bytes)
max_body_size = 262144

[database]
# SQLite file (default: platform data dir, e.g. ~/.local/share/wm-funnel/funnel.db)
# path = "/var/lib/wm-funnel/funnel.db"

[auth]
# Hosted auth service used to verify admin bearer tokens
# supabase_url = "https://your-project.supabase.co"
# supabase_anon_key = ""

# Request timeout in seconds
timeout_secs = 10

# Static tokens for local development: token = "user-id"
[auth.static_tokens]

[email]
# Leave unset to run in simulation mode (emails are logged, not sent)
# resend_api_key = ""
api_base = "https://api.resend.com"
from = "Window Man <notifications@windowman.example>"
# reply_to = "sales@windowman.example"

# Inbox that receives an alert for every new lead
# notify_address = "sales@windowman.example"

timeout_secs = 15

[logging]
# Log level: trace, debug, info, warn, error
level = "info"

# Log format: pretty (for development) or json (for production)
format = "pretty"
"#
    .to_string()
}
