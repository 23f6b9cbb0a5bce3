//! Intake configuration system.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::Result;

/// Root configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntakeConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
}

impl Default for IntakeConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            database: DatabaseConfig::default(),
            auth: AuthConfig::default(),
            scheduler: SchedulerConfig::default(),
        }
    }
}

impl IntakeConfig {
    /// Load config from the default path (~/.intake/config.toml).
    pub fn load() -> Result<Self> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load config from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| crate::error::IntakeError::Config(format!("Failed to read config: {e}")))?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| crate::error::IntakeError::Config(format!("Failed to parse config: {e}")))?;
        Ok(config)
    }

    /// Get the default config path.
    pub fn default_path() -> PathBuf {
        Self::home_dir().join("config.toml")
    }

    /// Get the Intake home directory (~/.intake).
    pub fn home_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".intake")
    }
}

/// HTTP server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Allowed CORS origins. Empty = allow any (development).
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

fn default_host() -> String {
    "0.0.0.0".into()
}
fn default_port() -> u16 {
    8080
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origins: Vec::new(),
        }
    }
}

/// Database configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file. Empty = ~/.intake/intake.db.
    #[serde(default)]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self { path: String::new() }
    }
}

impl DatabaseConfig {
    /// Resolve the database path, falling back to the default location.
    pub fn resolved_path(&self) -> PathBuf {
        if self.path.is_empty() {
            IntakeConfig::home_dir().join("intake.db")
        } else {
            PathBuf::from(&self.path)
        }
    }
}

/// Authentication configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// JWT signing secret. INTAKE_JWT_SECRET env var takes precedence.
    #[serde(default)]
    pub jwt_secret: String,
    #[serde(default = "default_token_ttl_hours")]
    pub token_ttl_hours: u64,
}

fn default_token_ttl_hours() -> u64 {
    3
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: String::new(),
            token_ttl_hours: default_token_ttl_hours(),
        }
    }
}

impl AuthConfig {
    /// Effective JWT secret: env var wins over the config file.
    pub fn effective_secret(&self) -> String {
        std::env::var("INTAKE_JWT_SECRET").unwrap_or_else(|_| self.jwt_secret.clone())
    }
}

/// Status scheduler configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// How long a submitted application stays pending before auto-completion.
    #[serde(default = "default_pending_secs")]
    pub pending_secs: u64,
    /// Poll interval for the background loop.
    #[serde(default = "default_check_interval_secs")]
    pub check_interval_secs: u64,
    /// Reschedule delay after a failed transition attempt.
    #[serde(default = "default_retry_secs")]
    pub retry_secs: u64,
    /// Due-time offset applied to entries recovered at startup.
    #[serde(default = "default_recovery_offset_secs")]
    pub recovery_offset_secs: u64,
}

fn default_pending_secs() -> u64 {
    60
}
fn default_check_interval_secs() -> u64 {
    10
}
fn default_retry_secs() -> u64 {
    30
}
fn default_recovery_offset_secs() -> u64 {
    10
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            pending_secs: default_pending_secs(),
            check_interval_secs: default_check_interval_secs(),
            retry_secs: default_retry_secs(),
            recovery_offset_secs: default_recovery_offset_secs(),
        }
    }
}
