//! Layered configuration loading with Figment.
//!
//! Precedence (lowest to highest):
//! 1. Compiled defaults
//! 2. TOML config file
//! 3. Profile overrides from `[profiles.<name>]`
//! 4. Environment variables (`COSIGN_*`, `__` separates nested keys)

use crate::foundation::{CosignError, Result};
use crate::infrastructure::config::types::AppConfig;
use figment::providers::{Env, Format, Serialized, Toml};
use figment::value::Dict;
use figment::{Figment, Profile};
use log::{debug, info};
use std::path::Path;

pub const CONFIG_FILE_NAME: &str = "cosign.toml";

/// Example: `COSIGN_LOCK__BACKEND=remote` -> `lock.backend`
const ENV_PREFIX: &str = "COSIGN_";

pub fn load_config(data_dir: &Path) -> Result<AppConfig> {
    load_config_from_file(&data_dir.join(CONFIG_FILE_NAME), data_dir)
}

pub fn load_config_with_profile(data_dir: &Path, profile: &str) -> Result<AppConfig> {
    load_config_from_file_with_profile(&data_dir.join(CONFIG_FILE_NAME), data_dir, profile)
}

pub fn load_config_from_file(path: &Path, data_dir: &Path) -> Result<AppConfig> {
    info!("loading configuration path={} data_dir={}", path.display(), data_dir.display());
    let mut config: AppConfig = figment_base(path).merge(Env::prefixed(ENV_PREFIX).split("__")).extract()?;
    postprocess(&mut config, data_dir);
    debug!(
        "configuration loaded network={} storage={:?} lock_backend={:?} messaging_backend={:?}",
        config.chain.network, config.service.storage, config.lock.backend, config.messaging.backend
    );
    Ok(config)
}

pub fn load_config_from_file_with_profile(path: &Path, data_dir: &Path, profile: &str) -> Result<AppConfig> {
    info!("loading configuration path={} data_dir={} profile={}", path.display(), data_dir.display(), profile);
    let base: AppConfig = figment_base(path).extract()?;
    let overrides = profile_overrides(&base, profile)?;

    let figment =
        figment_base(path).merge(Serialized::from(overrides, Profile::Default)).merge(Env::prefixed(ENV_PREFIX).split("__"));
    let mut config: AppConfig = figment
        .extract()
        .map_err(|err| CosignError::ConfigError(format!("config extraction failed for profile '{}': {}", profile, err)))?;
    postprocess(&mut config, data_dir);
    Ok(config)
}

fn figment_base(path: &Path) -> Figment {
    let figment = Figment::new().merge(Serialized::defaults(AppConfig::default()));
    if path.exists() {
        figment.merge(Toml::file(path))
    } else {
        debug!("configuration file missing, using defaults and env only path={}", path.display());
        figment
    }
}

fn profile_overrides(config: &AppConfig, profile: &str) -> Result<Dict> {
    let profiles = config.profiles.as_ref().ok_or_else(|| CosignError::ConfigError("no profiles section in config".to_string()))?;
    profiles.get(profile).cloned().ok_or_else(|| CosignError::ConfigError(format!("profile '{}' not found in config", profile)))
}

fn postprocess(config: &mut AppConfig, data_dir: &Path) {
    if config.service.data_dir.trim().is_empty() {
        config.service.data_dir = data_dir.to_string_lossy().to_string();
    }
    config.profiles = None;
}
