//! TOML-based configuration for Mnemo
//!
//! Everything is read from `mnemo.toml`. Every section and every key is
//! optional; a missing file means the built-in defaults. Secrets are never
//! stored in the file itself, only the names of the environment variables
//! that hold them.

use crate::chat::UploadLimits;
use crate::memory::{MemoryPolicy, HISTORY_WINDOW, SUMMARY_MAX_CHARS, SUMMARY_UPDATE_EVERY};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// Root configuration structure loaded from mnemo.toml
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub auth: AuthConfig,
    pub database: DatabaseConfig,
    pub llm: LlmConfig,
    pub memory: MemoryConfig,
    pub uploads: UploadsConfig,
}

// ============= Server Configuration =============

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Default filter when `RUST_LOG` is not set
    pub log_level: String,
    /// `pretty` or `json`
    pub log_format: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
        }
    }
}

// ============= Authentication Configuration =============

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Environment variable name containing the JWT secret
    pub jwt_secret_env: String,
    /// Token validity in seconds
    pub jwt_access_expiry: i64,
    /// Let requests without a token act as `default_user_id`
    pub allow_anonymous: bool,
    pub default_user_id: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret_env: "JWT_SECRET".to_string(),
            jwt_access_expiry: 7 * 24 * 60 * 60,
            allow_anonymous: false,
            default_user_id: "local_user".to_string(),
        }
    }
}

// ============= Database Configuration =============

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// SQLite file path, or `:memory:`
    pub url: String,
    /// Environment variable holding a remote Turso URL
    #[serde(skip_serializing_if = "Option::is_none")]
    pub turso_url_env: Option<String>,
    /// Environment variable holding the Turso auth token
    #[serde(skip_serializing_if = "Option::is_none")]
    pub turso_token_env: Option<String>,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "./data/mnemo.db".to_string(),
            turso_url_env: None,
            turso_token_env: None,
        }
    }
}

// ============= LLM Configuration =============

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub api_base: String,
    /// Environment variable name containing the API key
    pub api_key_env: String,
    pub request_timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_base: "https://api.openai.com/v1".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            request_timeout_secs: 120,
        }
    }
}

// ============= Memory Configuration =============

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    pub history_window: usize,
    pub summary_update_every: u64,
    pub summary_max_chars: usize,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            history_window: HISTORY_WINDOW,
            summary_update_every: SUMMARY_UPDATE_EVERY,
            summary_max_chars: SUMMARY_MAX_CHARS,
        }
    }
}

impl From<&MemoryConfig> for MemoryPolicy {
    fn from(c: &MemoryConfig) -> Self {
        MemoryPolicy {
            history_window: c.history_window,
            summary_update_every: c.summary_update_every,
            summary_max_chars: c.summary_max_chars,
        }
    }
}

// ============= Upload Configuration =============

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadsConfig {
    pub max_image_bytes: usize,
    pub allowed_mime_types: Vec<String>,
}

impl Default for UploadsConfig {
    fn default() -> Self {
        let limits = UploadLimits::default();
        Self {
            max_image_bytes: limits.max_image_bytes,
            allowed_mime_types: limits.allowed_mime_types,
        }
    }
}

impl From<&UploadsConfig> for UploadLimits {
    fn from(c: &UploadsConfig) -> Self {
        UploadLimits {
            max_image_bytes: c.max_image_bytes,
            allowed_mime_types: c
                .allowed_mime_types
                .iter()
                .map(|m| m.trim().to_ascii_lowercase())
                .collect(),
        }
    }
}

// ============= Configuration Loading & Validation =============

/// Errors that can occur during configuration loading
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read configuration file {0}: {1}")]
    ReadError(PathBuf, #[source] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Environment variable '{0}' referenced in config is not set")]
    MissingEnvVar(String),
}

/// Non-fatal findings reported by [`AppConfig::warnings`].
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigWarning {
    pub message: String,
}

impl std::fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl AppConfig {
    /// Load and validate configuration from a TOML file.
    ///
    /// A missing file yields the defaults.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        let config = if path.exists() {
            let content = fs::read_to_string(path)
                .map_err(|e| ConfigError::ReadError(path.to_path_buf(), e))?;
            toml::from_str(&content)?
        } else {
            info!(path = %path.display(), "No config file found, using defaults");
            AppConfig::default()
        };

        config.validate()?;
        Ok(config)
    }

    /// Parse and validate configuration from TOML text.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: AppConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Render the configuration as TOML.
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::ValidationError(e.to_string()))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.memory.history_window == 0 {
            return Err(ConfigError::ValidationError(
                "memory.history_window must be at least 1".to_string(),
            ));
        }
        if self.memory.summary_update_every == 0 {
            return Err(ConfigError::ValidationError(
                "memory.summary_update_every must be at least 1".to_string(),
            ));
        }
        if self.memory.summary_max_chars == 0 {
            return Err(ConfigError::ValidationError(
                "memory.summary_max_chars must be at least 1".to_string(),
            ));
        }
        if self.uploads.max_image_bytes == 0 {
            return Err(ConfigError::ValidationError(
                "uploads.max_image_bytes must be at least 1".to_string(),
            ));
        }
        if self.uploads.allowed_mime_types.is_empty() {
            return Err(ConfigError::ValidationError(
                "uploads.allowed_mime_types must not be empty".to_string(),
            ));
        }
        if !matches!(self.server.log_format.as_str(), "pretty" | "json") {
            return Err(ConfigError::ValidationError(format!(
                "server.log_format must be 'pretty' or 'json', got '{}'",
                self.server.log_format
            )));
        }
        if self.auth.allow_anonymous && self.auth.default_user_id.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "auth.default_user_id must be set when anonymous access is allowed".to_string(),
            ));
        }

        if !self.auth.allow_anonymous {
            self.validate_env_var(&self.auth.jwt_secret_env)?;
        }
        if let Some(ref env) = self.database.turso_url_env {
            self.validate_env_var(env)?;
        }
        if let Some(ref env) = self.database.turso_token_env {
            self.validate_env_var(env)?;
        }

        Ok(())
    }

    /// Problems that do not stop the server from starting.
    pub fn warnings(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();

        if self.resolve_env(&self.llm.api_key_env).is_none() {
            warnings.push(ConfigWarning {
                message: format!(
                    "Environment variable '{}' is not set; chat requests will fail",
                    self.llm.api_key_env
                ),
            });
        }
        if self.auth.allow_anonymous {
            warnings.push(ConfigWarning {
                message: format!(
                    "Anonymous access is enabled; requests without a token act as '{}'",
                    self.auth.default_user_id
                ),
            });
        }
        if self.database.url == ":memory:" && self.database.turso_url_env.is_none() {
            warnings.push(ConfigWarning {
                message: "In-memory database: all data is lost on restart".to_string(),
            });
        }

        warnings
    }

    fn validate_env_var(&self, name: &str) -> Result<(), ConfigError> {
        self.resolve_env(name)
            .map(|_| ())
            .ok_or_else(|| ConfigError::MissingEnvVar(name.to_string()))
    }

    /// Get a resolved, non-empty value from an env var reference
    pub fn resolve_env(&self, env_name: &str) -> Option<String> {
        std::env::var(env_name).ok().filter(|v| !v.is_empty())
    }

    pub fn jwt_secret(&self) -> Option<String> {
        self.resolve_env(&self.auth.jwt_secret_env)
    }

    pub fn llm_api_key(&self) -> Option<String> {
        self.resolve_env(&self.llm.api_key_env)
    }

    pub fn anonymous_user(&self) -> Option<String> {
        self.auth
            .allow_anonymous
            .then(|| self.auth.default_user_id.clone())
    }

    pub fn memory_policy(&self) -> MemoryPolicy {
        MemoryPolicy::from(&self.memory)
    }

    pub fn upload_limits(&self) -> UploadLimits {
        UploadLimits::from(&self.uploads)
    }
}
