use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::{ConfigError, asset_dir};

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_ACCESS_TOKEN_TTL_SECS: i64 = 3600;
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 5 * 1024 * 1024;
const DEV_JWT_SECRET: &str = "change-me-in-production";

fn default_host() -> String {
    DEFAULT_HOST.to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_jwt_secret() -> String {
    DEV_JWT_SECRET.to_string()
}

fn default_access_token_ttl_secs() -> i64 {
    DEFAULT_ACCESS_TOKEN_TTL_SECS
}

fn default_max_upload_bytes() -> u64 {
    DEFAULT_MAX_UPLOAD_BYTES
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Falls back to a SQLite file inside the asset directory.
    pub database_url: Option<String>,
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_jwt_secret")]
    pub jwt_secret: String,
    #[serde(default = "default_access_token_ttl_secs")]
    pub access_token_ttl_secs: i64,
    /// Where uploaded task images are written.
    pub upload_dir: Option<PathBuf>,
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: None,
            host: default_host(),
            port: default_port(),
            jwt_secret: default_jwt_secret(),
            access_token_ttl_secs: default_access_token_ttl_secs(),
            upload_dir: None,
            max_upload_bytes: default_max_upload_bytes(),
        }
    }
}

impl Config {
    /// Parses a raw JSON config, falling back to defaults when it is invalid.
    pub fn from_raw(raw: &str) -> Self {
        match serde_json::from_str::<Config>(raw) {
            Ok(config) => config,
            Err(err) => {
                tracing::warn!(error = %err, "Invalid config file; using defaults");
                Config::default()
            }
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.jwt_secret.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "jwt_secret must not be empty".to_string(),
            ));
        }
        if self.access_token_ttl_secs <= 0 {
            return Err(ConfigError::ValidationError(
                "access_token_ttl_secs must be positive".to_string(),
            ));
        }
        if self.max_upload_bytes == 0 {
            return Err(ConfigError::ValidationError(
                "max_upload_bytes must be positive".to_string(),
            ));
        }
        Ok(())
    }

    pub fn uses_dev_secret(&self) -> bool {
        self.jwt_secret == DEV_JWT_SECRET
    }

    pub fn database_url(&self) -> Result<String, ConfigError> {
        if let Some(url) = self.database_url.as_deref().filter(|url| !url.trim().is_empty()) {
            return Ok(url.to_string());
        }
        let path = asset_dir()?.join("sprintboard.sqlite");
        Ok(format!("sqlite://{}?mode=rwc", path.to_string_lossy()))
    }

    pub fn upload_dir(&self) -> Result<PathBuf, ConfigError> {
        match &self.upload_dir {
            Some(dir) => Ok(dir.clone()),
            None => Ok(asset_dir()?.join("storage")),
        }
    }
}
