//! Translation merging
//!
//! A multilingual Directus item carries its translations as an array of rows,
//! each row pointing at a language through `languages_code` (either the code
//! itself or the expanded language object). Merging picks the row for one
//! language and spreads its fields into a copy of the item.

use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;

use crate::types::{
    COLLECTION_FIELD,
    Item,
    LANG_FIELD,
};

/// Field of a translation row referencing its language.
pub const LANGUAGE_REFERENCE_FIELD: &str = "languages_code";

/// Translation row fields never merged into the item.
const BOOKKEEPING_FIELDS: [&str; 2] = ["id", LANGUAGE_REFERENCE_FIELD];

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TranslateError {
    /// The item is missing (`null`)
    #[error("Cannot translate a missing item")]
    MissingItem,
    /// The item is not a JSON object
    #[error("Cannot translate {0}, expected an object")]
    NotAnObject(String),
    /// The translation field depends on a collection the item does not name
    #[error("Cannot resolve the translation field: the item has no `collection` field")]
    UnknownCollection,
}

/// Where the translation rows of a collection live.
#[derive(Clone)]
pub enum TranslationField {
    /// Same field name for every collection.
    Name(String),
    /// Field name computed from the collection name.
    Resolver(Arc<dyn Fn(&str) -> String + Send + Sync>),
}

impl TranslationField {
    /// Resolver variant from a function of the collection name.
    pub fn resolver(f: impl Fn(&str) -> String + Send + Sync + 'static) -> Self {
        Self::Resolver(Arc::new(f))
    }

    /// Field name for a known collection.
    #[must_use]
    pub fn resolve_for(&self, collection: &str) -> String {
        match self {
            Self::Name(name) => name.clone(),
            Self::Resolver(resolve) => resolve(collection),
        }
    }

    /// Field name for a collection that may be unknown.
    ///
    /// # Errors
    /// [`TranslateError::UnknownCollection`] when a resolver has no collection to work on.
    pub fn resolve(&self, collection: Option<&str>) -> Result<String, TranslateError> {
        match (self, collection) {
            (Self::Name(name), _) => Ok(name.clone()),
            (Self::Resolver(resolve), Some(collection)) => Ok(resolve(collection)),
            (Self::Resolver(_), None) => Err(TranslateError::UnknownCollection),
        }
    }
}

impl Default for TranslationField {
    /// `<collection>_translations`
    fn default() -> Self {
        Self::resolver(|collection| format!("{collection}_translations"))
    }
}

impl std::fmt::Debug for TranslationField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Name(name) => f.debug_tuple("Name").field(name).finish(),
            Self::Resolver(_) => f.write_str("Resolver(<fn>)"),
        }
    }
}

impl From<&str> for TranslationField {
    fn from(name: &str) -> Self {
        Self::Name(name.to_string())
    }
}

/// Translates `item` into `lang`.
///
/// Items without the translation field, or calls without a language, are
/// returned unchanged. Otherwise the first row whose language matches is
/// merged and `lang` is set; without a matching row only `lang` is set.
///
/// # Errors
/// - the item is `null` or not an object
/// - `field` is a resolver and the item has no `collection`
pub fn translate(
    item: &Value,
    field: &TranslationField,
    lang: Option<&str>,
) -> Result<Value, TranslateError> {
    let object = as_item(item)?;
    let collection = object.get(COLLECTION_FIELD).and_then(Value::as_str);
    let field_name = field.resolve(collection)?;

    Ok(lang.map_or_else(
        || item.clone(),
        |lang| Value::Object(merge_translation(object, &field_name, lang)),
    ))
}

/// Merges the translation row of `lang` found under `field_name`.
///
/// The input item and its rows are left untouched.
#[must_use]
pub fn merge_translation(item: &Item, field_name: &str, lang: &str) -> Item {
    let Some(Value::Array(rows)) = item.get(field_name) else {
        // not multilingual
        return item.clone();
    };

    let mut merged = item.clone();
    if let Some(row) = rows.iter().filter_map(Value::as_object).find(|row| row_matches(row, lang)) {
        for (key, value) in row {
            if !BOOKKEEPING_FIELDS.contains(&key.as_str()) {
                merged.insert(key.clone(), value.clone());
            }
        }
    } else {
        tracing::debug!(field_name, lang, "No translation row for language");
    }
    merged.insert(LANG_FIELD.to_string(), Value::String(lang.to_string()));

    merged
}

/// Language code a translation row points at.
#[must_use]
pub fn row_language(row: &Item) -> Option<&str> {
    match row.get(LANGUAGE_REFERENCE_FIELD)? {
        Value::String(code) => Some(code),
        Value::Object(language) => language.get("code").and_then(Value::as_str),
        _ => None,
    }
}

fn row_matches(row: &Item, lang: &str) -> bool {
    row_language(row) == Some(lang)
}

fn as_item(item: &Value) -> Result<&Item, TranslateError> {
    match item {
        Value::Object(object) => Ok(object),
        Value::Null => Err(TranslateError::MissingItem),
        other => Err(TranslateError::NotAnObject(other.to_string())),
    }
}
