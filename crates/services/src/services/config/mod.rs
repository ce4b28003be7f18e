use std::path::{Path, PathBuf};

use thiserror::Error;

mod schema;

pub use schema::{
    Config, DEFAULT_ACCESS_TOKEN_TTL_SECS, DEFAULT_HOST, DEFAULT_MAX_UPLOAD_BYTES, DEFAULT_PORT,
};

pub const ASSET_DIR_ENV: &str = "SPRINTBOARD_ASSET_DIR";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error("Validation error: {0}")]
    ValidationError(String),
}

/// Directory holding the config file, the default SQLite database and uploads.
pub fn asset_dir() -> Result<PathBuf, ConfigError> {
    let path = match std::env::var(ASSET_DIR_ENV) {
        Ok(dir) if !dir.trim().is_empty() => PathBuf::from(dir.trim()),
        _ if cfg!(debug_assertions) => PathBuf::from("dev_assets"),
        _ => dirs::data_dir()
            .map(|dir| dir.join("sprintboard"))
            .ok_or_else(|| {
                ConfigError::ValidationError("no data directory available".to_string())
            })?,
    };
    if !path.exists() {
        std::fs::create_dir_all(&path)?;
    }
    Ok(path)
}

pub fn config_path() -> Result<PathBuf, ConfigError> {
    Ok(asset_dir()?.join("config.json"))
}

/// Will always return config, falling back to defaults on missing/invalid files.
pub async fn load_config_from_file(config_path: &Path) -> Config {
    match tokio::fs::read_to_string(config_path).await {
        Ok(raw_config) => Config::from_raw(&raw_config),
        Err(err) => {
            if err.kind() == std::io::ErrorKind::NotFound {
                tracing::info!(path = %config_path.display(), "No config file found, using defaults");
            } else {
                tracing::warn!("Failed to read config file: {}", err);
            }
            Config::default()
        }
    }
}

pub async fn save_config_to_file(config: &Config, config_path: &Path) -> Result<(), ConfigError> {
    let raw_config = serde_json::to_string_pretty(config)?;
    tokio::fs::write(config_path, raw_config).await?;
    Ok(())
}

/// Applies environment overrides on top of file values.
pub fn apply_env_overrides(config: &mut Config) {
    if let Some(url) = read_env("DATABASE_URL") {
        config.database_url = Some(url);
    }
    if let Some(host) = read_env("HOST") {
        config.host = host;
    }
    if let Some(port) = read_env_parsed::<u16>("BACKEND_PORT").or_else(|| read_env_parsed("PORT")) {
        config.port = port;
    }
    if let Some(secret) = read_env("JWT_SECRET") {
        config.jwt_secret = secret;
    }
    if let Some(ttl) = read_env_parsed::<i64>("ACCESS_TOKEN_TTL_SECS") {
        config.access_token_ttl_secs = ttl;
    }
    if let Some(dir) = read_env("UPLOAD_DIR") {
        config.upload_dir = Some(PathBuf::from(dir));
    }
}

/// Loads the config file, applies env overrides and validates the result.
pub async fn load() -> Result<Config, ConfigError> {
    let mut config = load_config_from_file(&config_path()?).await;
    apply_env_overrides(&mut config);
    config.validate()?;
    if config.uses_dev_secret() {
        tracing::warn!("JWT_SECRET is not set; using the built-in development secret");
    }
    Ok(config)
}

fn read_env(name: &str) -> Option<String> {
    match std::env::var(name) {
        Ok(value) => {
            let trimmed = value.trim();
            if trimmed.is_empty() {
                tracing::warn!("{name} is set but empty; ignoring");
                None
            } else {
                Some(trimmed.to_string())
            }
        }
        Err(std::env::VarError::NotPresent) => None,
        Err(err) => {
            tracing::warn!(error = %err, "Failed to read {name}; ignoring");
            None
        }
    }
}

fn read_env_parsed<T: std::str::FromStr>(name: &str) -> Option<T> {
    let raw = read_env(name)?;
    match raw.parse::<T>() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!("{name} has invalid value '{raw}'; ignoring");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_keeps_defaults_for_missing_keys() {
        let config = Config::from_raw(r#"{ "port": 9000, "jwt_secret": "s3cret" }"#);
        assert_eq!(config.port, 9000);
        assert_eq!(config.jwt_secret, "s3cret");
        assert_eq!(config.host, DEFAULT_HOST);
        assert_eq!(config.access_token_ttl_secs, DEFAULT_ACCESS_TOKEN_TTL_SECS);
        assert_eq!(config.max_upload_bytes, DEFAULT_MAX_UPLOAD_BYTES);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn invalid_file_falls_back_to_defaults() {
        let config = Config::from_raw("{ not json");
        assert_eq!(config.port, DEFAULT_PORT);
        assert!(config.uses_dev_secret());
    }

    #[test]
    fn validation_rejects_empty_secret_and_bad_ttl() {
        let config = Config {
            jwt_secret: "  ".to_string(),
            ..Config::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::ValidationError(_))));

        let config = Config {
            access_token_ttl_secs: 0,
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn explicit_database_url_wins() {
        let config = Config {
            database_url: Some("sqlite::memory:".to_string()),
            ..Config::default()
        };
        assert_eq!(config.database_url().unwrap(), "sqlite::memory:");
    }

    #[tokio::test]
    async fn missing_file_yields_defaults_and_save_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let config = load_config_from_file(&path).await;
        assert_eq!(config.port, DEFAULT_PORT);

        let custom = Config {
            port: 4321,
            ..Config::default()
        };
        save_config_to_file(&custom, &path).await.unwrap();
        assert_eq!(load_config_from_file(&path).await.port, 4321);
    }
}
