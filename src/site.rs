//! Static-site generator integration
//!
//! A generator gets one global value named after the configured `name`, plus
//! two filters: `<name>_asseturl` and `<name>_translate`.

use std::sync::Arc;
use std::sync::atomic::{
    AtomicBool,
    Ordering,
};

use serde_json::Value;
use thiserror::Error;

use crate::client::{
    Client,
    ClientError,
};
use crate::transport::{
    HttpTransport,
    Transport,
};
use crate::translate::{
    TranslateError,
    TranslationField,
};

/// Suffix of the asset URL filter.
const ASSET_URL_FILTER: &str = "asseturl";
/// Suffix of the translation filter.
const TRANSLATE_FILTER: &str = "translate";

#[derive(Error, Debug)]
pub enum SiteError {
    #[error(transparent)]
    Client(#[from] ClientError),

    #[error(transparent)]
    Translate(#[from] TranslateError),

    #[error("Unknown filter '{0}'")]
    UnknownFilter(String),

    #[error("Invalid argument {index} for filter '{filter}': {message}")]
    InvalidArgument { filter: String, index: usize, message: String },
}

/// Template-callable filters registered by the plugin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Filter {
    /// `(image, context?) -> string`
    AssetUrl,
    /// `(item, field?, lang?) -> item`
    Translate,
}

/// Registers a Directus client with a site generator.
#[derive(Debug)]
pub struct SitePlugin<T = HttpTransport> {
    /// Shared client, also handed to the generator as global data
    client: Arc<Client<T>>,
    /// Set once the CMS answered a health check
    health_ok: AtomicBool,
}

impl<T: Transport> SitePlugin<T> {
    #[must_use]
    pub fn new(client: Client<T>) -> Self {
        Self { client: Arc::new(client), health_ok: AtomicBool::new(false) }
    }

    #[must_use]
    pub fn client(&self) -> &Arc<Client<T>> {
        &self.client
    }

    /// Name of the global value.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.client.settings().name
    }

    /// Filter names as registered with the generator.
    #[must_use]
    pub fn filter_names(&self) -> [String; 2] {
        [
            format!("{}_{ASSET_URL_FILTER}", self.name()),
            format!("{}_{TRANSLATE_FILTER}", self.name()),
        ]
    }

    /// Filter registered under `name`, if any.
    #[must_use]
    pub fn filter(&self, name: &str) -> Option<Filter> {
        let suffix = name.strip_prefix(self.name())?.strip_prefix('_')?;
        match suffix {
            ASSET_URL_FILTER => Some(Filter::AssetUrl),
            TRANSLATE_FILTER => Some(Filter::Translate),
            _ => None,
        }
    }

    /// Global data: initializes the client and returns the snapshot as JSON.
    ///
    /// Warns when the CMS does not answer; once a health check passed it is
    /// not repeated.
    pub async fn global_data(&self) -> Result<Value, SiteError> {
        let snapshot = self.client.init().await?;

        if !self.health_ok.load(Ordering::Acquire) {
            if self.client.health_check().await {
                self.health_ok.store(true, Ordering::Release);
            } else {
                tracing::warn!(
                    "Could not connect to Directus. Is Directus running? Do we have access to \"Directus Collections\"?"
                );
            }
        }

        Ok(snapshot.to_value())
    }

    /// Calls the filter registered under `name`.
    pub fn call_filter(&self, name: &str, args: &[Value]) -> Result<Value, SiteError> {
        match self.filter(name) {
            Some(Filter::AssetUrl) => Ok(self.asset_url(args)),
            Some(Filter::Translate) => self.translate(name, args),
            None => Err(SiteError::UnknownFilter(name.to_string())),
        }
    }

    fn asset_url(&self, args: &[Value]) -> Value {
        let image = args.first().filter(|image| !image.is_null());
        let context = args.get(1).and_then(Value::as_str).unwrap_or("template");

        Value::String(self.client.asset_url(image, context))
    }

    fn translate(&self, name: &str, args: &[Value]) -> Result<Value, SiteError> {
        let item = args.first().unwrap_or(&Value::Null);
        let field = optional_string(name, args, 1)?.map(TranslationField::Name);
        let lang = optional_string(name, args, 2)?;

        Ok(self.client.translate(item, field.as_ref(), lang.as_deref())?)
    }
}

/// String argument at `index`; missing and `null` arguments are `None`.
fn optional_string(filter: &str, args: &[Value], index: usize) -> Result<Option<String>, SiteError> {
    match args.get(index) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(value)) => Ok(Some(value.clone())),
        Some(other) => Err(SiteError::InvalidArgument {
            filter: filter.to_string(),
            index,
            message: format!("expected a string, got {other}"),
        }),
    }
}
