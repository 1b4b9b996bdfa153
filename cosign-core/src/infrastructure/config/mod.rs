mod loader;
mod types;
pub mod validation;

pub use loader::{load_config, load_config_from_file, load_config_from_file_with_profile, load_config_with_profile, CONFIG_FILE_NAME};
pub use types::*;

use crate::foundation::{CosignError, Result};
use std::path::{Path, PathBuf};

pub const CONFIG_PATH_ENV: &str = "COSIGN_CONFIG_PATH";
pub const DATA_DIR_ENV: &str = "COSIGN_DATA_DIR";

/// Loads from the resolved data dir and config path, then validates.
pub fn load_app_config() -> Result<AppConfig> {
    let data_dir = resolve_data_dir()?;
    let config_path = resolve_config_path(&data_dir);
    let config = load_config_from_file(&config_path, &data_dir)?;
    validated(config)
}

pub fn load_app_config_from_path(path: &Path) -> Result<AppConfig> {
    let data_dir = resolve_data_dir()?;
    validated(load_config_from_file(path, &data_dir)?)
}

pub fn load_app_config_from_profile_path(path: &Path, profile: &str) -> Result<AppConfig> {
    let data_dir = resolve_data_dir()?;
    validated(load_config_from_file_with_profile(path, &data_dir, profile)?)
}

fn validated(config: AppConfig) -> Result<AppConfig> {
    config.validate().map_err(|errors| CosignError::ConfigError(format!("validation failed: {}", errors.join("; "))))?;
    Ok(config)
}

fn env_value(name: &str) -> Option<String> {
    std::env::var(name).ok().map(|value| value.trim().to_string()).filter(|value| !value.is_empty())
}

pub fn resolve_config_path(data_dir: &Path) -> PathBuf {
    env_value(CONFIG_PATH_ENV).map(PathBuf::from).unwrap_or_else(|| data_dir.join(CONFIG_FILE_NAME))
}

pub fn resolve_data_dir() -> Result<PathBuf> {
    if let Some(dir) = env_value(DATA_DIR_ENV) {
        return Ok(PathBuf::from(dir));
    }
    let cwd = std::env::current_dir().map_err(|err| crate::storage_err!("env::current_dir", err))?;
    Ok(cwd.join(".cosign"))
}
