//! Configuration loading

use std::path::Path;

use super::{
    ConfigError,
    DirectusSettings,
    StaticToken,
};

/// Name of the configuration file looked up in the project root.
pub const CONFIG_FILE_NAME: &str = ".directus.json";

/// Environment variables overriding the configuration file.
pub const ENV_URL: &str = "DIRECTUS_URL";
pub const ENV_TOKEN: &str = "DIRECTUS_TOKEN";
pub const ENV_UPLOAD_FOLDER: &str = "DIRECTUS_UPLOAD_FOLDER";

/// Reads `.directus.json` from the project root.
///
/// # Returns
/// - `Ok(Some(settings))`: the file exists and parses
/// - `Ok(None)`: no configuration file
/// - `Err(ConfigError)`: read or parse failure
pub(super) fn load_from_dir(root: &Path) -> Result<Option<DirectusSettings>, ConfigError> {
    let config_path = root.join(CONFIG_FILE_NAME);

    if !config_path.exists() {
        tracing::debug!("Configuration file not found: {:?}", config_path);
        return Ok(None);
    }

    tracing::debug!("Loading configuration from: {:?}", config_path);

    let content = std::fs::read_to_string(&config_path)?;
    let settings: DirectusSettings = serde_json::from_str(&content)?;

    Ok(Some(settings))
}

/// Applies environment overrides, `lookup` returns the value of a variable.
pub(super) fn apply_env(
    mut settings: DirectusSettings,
    lookup: impl Fn(&str) -> Option<String>,
) -> DirectusSettings {
    let non_empty = |name: &str| lookup(name).filter(|value| !value.is_empty());

    if let Some(url) = non_empty(ENV_URL) {
        tracing::debug!(%url, "Directus URL taken from {}", ENV_URL);
        settings.url = url;
    }
    if let Some(token) = non_empty(ENV_TOKEN) {
        settings.token = Some(StaticToken::new(token));
    }
    if let Some(folder) = non_empty(ENV_UPLOAD_FOLDER) {
        settings.upload_folder = Some(folder);
    }

    settings
}

/// Loads, overrides and validates the settings of a project.
///
/// Missing configuration files fall back to the defaults.
pub fn load_settings(
    root: &Path,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<DirectusSettings, ConfigError> {
    let settings = load_from_dir(root)?.unwrap_or_default();
    let settings = apply_env(settings, lookup);

    settings.validate().map_err(ConfigError::ValidationErrors)?;
    tracing::debug!("Settings loaded successfully: {:?}", settings);

    Ok(settings)
}

/// [`load_settings`] reading the process environment.
pub fn load_settings_from_env(root: &Path) -> Result<DirectusSettings, ConfigError> {
    load_settings(root, |name| std::env::var(name).ok())
}
