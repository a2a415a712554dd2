use serde::{
    Deserialize,
    Deserializer,
};
use thiserror::Error;

use crate::translate::TranslationField;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Configuration error in '{field_path}': {message}")]
pub struct ValidationError {
    /// JSON path to the field (e.g., "login.email")
    pub field_path: String,
    pub message: String,
}

impl ValidationError {
    #[must_use]
    pub fn new(field_path: impl Into<String>, message: impl Into<String>) -> Self {
        Self { field_path: field_path.into(), message: message.into() }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration validation failed:\n{}", format_validation_errors(.0))]
    ValidationErrors(Vec<ValidationError>),

    #[error("Failed to load configuration file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse configuration: {0}")]
    ParseError(#[from] serde_json::Error),
}

fn format_validation_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .enumerate()
        .map(|(i, err)| format!("  {}. {} - {}", i + 1, err.field_path, err.message))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Options recognized by the Directus source.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DirectusSettings {
    /// Base URL of the Directus instance.
    pub url: String,
    /// Name of the global value and prefix of the template filters.
    pub name: String,
    /// Keep collections hidden from the Directus UI.
    pub allow_hidden: bool,
    /// Keep Directus system collections.
    pub allow_system: bool,

    pub login: Option<Credentials>,
    pub token: Option<StaticToken>,
    pub auth: AuthSettings,

    /// Fetch collections one after another instead of all at once.
    ///
    /// The spelling matches the option name existing configurations use.
    pub sequencial: bool,
    /// Relation expansion depth, also bounds nested module expansion.
    pub recursions: usize,
    /// Include `draft` items next to `published` ones.
    pub show_draft: bool,

    /// Collection listing the languages to build, one item per language code.
    pub language_collection: Option<String>,
    /// Field holding translation rows.
    ///
    /// - `None`: `<collection>_translations`
    /// - `Some(name)`: the same field for every collection
    #[serde(deserialize_with = "deserialize_translation_field")]
    pub translation_field: TranslationField,

    /// Local directory serving uploaded files, replaces the `/assets` URL.
    pub upload_folder: Option<String>,
}

fn deserialize_translation_field<'de, D>(deserializer: D) -> Result<TranslationField, D::Error>
where
    D: Deserializer<'de>,
{
    let name = Option::<String>::deserialize(deserializer)?;
    Ok(name.map_or_else(TranslationField::default, TranslationField::Name))
}

#[derive(Clone, Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Static access token configured in Directus for a user.
#[derive(Clone, Deserialize)]
#[serde(transparent)]
pub struct StaticToken(String);

impl StaticToken {
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for StaticToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("StaticToken(<redacted>)")
    }
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AuthSettings {
    /// How `/auth/login` hands out the refresh token.
    pub mode: AuthMode,
}

/// Login modes whose response body carries the access token.
///
/// Directus `session` mode only sets a cookie and is not accepted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthMode {
    #[default]
    Json,
    Cookie,
}

impl AuthMode {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Cookie => "cookie",
        }
    }
}

impl DirectusSettings {
    /// # Errors
    /// - Empty or malformed URL
    /// - Name unusable as a template identifier
    /// - Zero recursion depth
    /// - Incomplete login credentials
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        if self.url.is_empty() {
            errors.push(ValidationError::new(
                "url",
                "The URL cannot be empty. Example: \"http://localhost:8055\"",
            ));
        } else if let Err(e) = reqwest::Url::parse(&self.url) {
            errors.push(ValidationError::new("url", format!("Invalid URL '{}': {e}", self.url)));
        }

        if self.name.is_empty() {
            errors.push(ValidationError::new(
                "name",
                "The name cannot be empty. Example: \"directus\"",
            ));
        } else if !self.name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            errors.push(ValidationError::new(
                "name",
                format!(
                    "Invalid name '{}': only ASCII letters, digits and '_' can be used in filter names",
                    self.name
                ),
            ));
        }

        if self.recursions == 0 {
            errors.push(ValidationError::new(
                "recursions",
                "At least one level is required to read item fields",
            ));
        }

        if let Some(login) = &self.login {
            if login.email.is_empty() {
                errors.push(ValidationError::new("login.email", "The email cannot be empty"));
            }
            if login.password.is_empty() {
                errors.push(ValidationError::new("login.password", "The password cannot be empty"));
            }
        }

        if let Some(token) = &self.token
            && token.expose().is_empty()
        {
            errors.push(ValidationError::new(
                "token",
                "The token cannot be empty. Please remove this field to read anonymously",
            ));
        }

        if let Some(collection) = &self.language_collection
            && collection.is_empty()
        {
            errors.push(ValidationError::new(
                "languageCollection",
                "The collection name cannot be empty. Example: \"languages\"",
            ));
        }

        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }
}

impl Default for DirectusSettings {
    fn default() -> Self {
        Self {
            url: "http://localhost:8055".to_string(),
            name: "directus".to_string(),
            allow_hidden: true,
            allow_system: false,
            login: None,
            token: None,
            auth: AuthSettings::default(),
            sequencial: false,
            recursions: 7,
            show_draft: false,
            language_collection: None,
            translation_field: TranslationField::default(),
            upload_folder: None,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing, clippy::expect_used, clippy::panic)]
mod tests {
    use googletest::prelude::*;
    use rstest::*;

    use super::*;

    #[rstest]
    fn validate_valid_settings() {
        let settings = DirectusSettings::default();

        assert_that!(settings.validate(), ok(anything()));
    }

    #[rstest]
    fn deserialize_empty_settings() {
        let settings: DirectusSettings = serde_json::from_str("{}").unwrap();

        assert_that!(settings.url, eq("http://localhost:8055"));
        assert_that!(settings.name, eq("directus"));
        assert_that!(settings.allow_hidden, eq(true));
        assert_that!(settings.allow_system, eq(false));
        assert_that!(settings.sequencial, eq(false));
        assert_that!(settings.recursions, eq(7));
        assert_that!(settings.auth.mode, eq(AuthMode::Json));
        assert_that!(settings.translation_field.resolve_for("page"), eq("page_translations"));
    }

    #[rstest]
    fn deserialize_full_settings() {
        let json = r#"{
            "url": "https://cms.example.com",
            "name": "cms",
            "allowHidden": false,
            "allowSystem": true,
            "login": {"email": "admin@example.com", "password": "pw"},
            "token": "static-token",
            "auth": {"mode": "cookie"},
            "sequencial": true,
            "recursions": 2,
            "showDraft": true,
            "languageCollection": "languages",
            "translationField": "translations"
        }"#;

        let settings: DirectusSettings = serde_json::from_str(json).unwrap();

        assert_that!(settings.name, eq("cms"));
        assert_that!(settings.allow_hidden, eq(false));
        assert_that!(settings.allow_system, eq(true));
        assert_that!(settings.login.as_ref().map(|l| l.email.as_str()), some(eq("admin@example.com")));
        assert_that!(settings.token.as_ref().map(StaticToken::expose), some(eq("static-token")));
        assert_that!(settings.auth.mode, eq(AuthMode::Cookie));
        assert_that!(settings.sequencial, eq(true));
        assert_that!(settings.recursions, eq(2));
        assert_that!(settings.show_draft, eq(true));
        assert_that!(settings.language_collection, some(eq("languages")));
        assert_that!(settings.translation_field.resolve_for("page"), eq("translations"));
    }

    #[rstest]
    #[case("session")]
    #[case("token")]
    fn deserialize_rejects_unsupported_auth_mode(#[case] mode: &str) {
        let json = format!(r#"{{"auth": {{"mode": "{mode}"}}}}"#);

        let result = serde_json::from_str::<DirectusSettings>(&json);

        assert_that!(result, err(displays_as(contains_substring("unknown variant"))));
    }

    #[rstest]
    fn deserialize_null_translation_field_uses_default() {
        let settings: DirectusSettings =
            serde_json::from_str(r#"{"translationField": null}"#).unwrap();

        assert_that!(settings.translation_field.resolve_for("post"), eq("post_translations"));
    }

    #[rstest]
    fn debug_redacts_secrets() {
        let settings: DirectusSettings = serde_json::from_str(
            r#"{"login": {"email": "a@b.c", "password": "hunter2"}, "token": "tok-123"}"#,
        )
        .unwrap();

        let debug_str = format!("{settings:?}");

        assert_that!(debug_str, not(contains_substring("hunter2")));
        assert_that!(debug_str, not(contains_substring("tok-123")));
        assert_that!(debug_str, contains_substring("a@b.c"));
    }

    #[rstest]
    #[case("", "cannot be empty")]
    #[case("not a url", "Invalid URL")]
    fn validate_invalid_url(#[case] url: &str, #[case] message: &str) {
        let settings = DirectusSettings { url: url.to_string(), ..DirectusSettings::default() };

        assert_that!(
            settings.validate(),
            err(elements_are![all![
                field!(ValidationError.field_path, eq("url")),
                field!(ValidationError.message, contains_substring(message))
            ]])
        );
    }

    #[rstest]
    fn validate_invalid_name() {
        let settings = DirectusSettings { name: "my-cms".to_string(), ..DirectusSettings::default() };

        assert_that!(
            settings.validate(),
            err(elements_are![all![
                field!(ValidationError.field_path, eq("name")),
                field!(ValidationError.message, contains_substring("my-cms"))
            ]])
        );
    }

    #[rstest]
    fn validate_incomplete_login() {
        let settings = DirectusSettings {
            login: Some(Credentials { email: String::new(), password: String::new() }),
            ..DirectusSettings::default()
        };

        assert_that!(
            settings.validate(),
            err(elements_are![
                field!(ValidationError.field_path, eq("login.email")),
                field!(ValidationError.field_path, eq("login.password"))
            ])
        );
    }

    #[rstest]
    fn config_error_validation_errors_format() {
        let settings = DirectusSettings {
            recursions: 0,
            language_collection: Some(String::new()),
            ..DirectusSettings::default()
        };

        let errors = settings.validate().unwrap_err();
        let error_message = format!("{}", ConfigError::ValidationErrors(errors));

        assert_that!(error_message, contains_substring("Configuration validation failed"));
        assert_that!(error_message, contains_substring("1. recursions"));
        assert_that!(error_message, contains_substring("2. languageCollection"));
    }
}
