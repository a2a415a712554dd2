//! Directus source configuration
/// Config file and environment loader
mod loader;
/// Configuration types and settings
mod types;

pub use loader::{
    CONFIG_FILE_NAME,
    ENV_TOKEN,
    ENV_UPLOAD_FOLDER,
    ENV_URL,
    load_settings,
    load_settings_from_env,
};
pub use types::{
    AuthMode,
    AuthSettings,
    ConfigError,
    Credentials,
    DirectusSettings,
    StaticToken,
    ValidationError,
};
