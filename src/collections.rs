//! Collection introspection

use serde_json::Value;

use crate::client::ClientError;
use crate::config::DirectusSettings;
use crate::transport::{
    COLLECTIONS_COLLECTION,
    Query,
    Transport,
};
use crate::types::CollectionDescriptor;

/// What a collection filter gets to see about a collection.
#[derive(Debug, Clone, Copy)]
pub struct CollectionInfo<'a> {
    /// Collection name
    pub collection: &'a str,
    /// Directus `meta` block, `null` for collections without one
    pub meta: &'a Value,
}

/// Lists the schema-backed collections the build should expand.
///
/// Folders (entries without a `schema`) are skipped, hidden and system
/// collections are dropped unless the settings allow them, and `filter` gets
/// the final say.
///
/// # Errors
/// [`ClientError::Introspection`] when the schema list cannot be read.
pub async fn list_collections(
    transport: &dyn Transport,
    settings: &DirectusSettings,
    filter: &(dyn Fn(&CollectionInfo<'_>) -> bool + Send + Sync),
) -> Result<Vec<CollectionDescriptor>, ClientError> {
    let query = Query::unbounded(settings.recursions);
    let raw = transport
        .read_items(COLLECTIONS_COLLECTION, &query)
        .await
        .map_err(ClientError::Introspection)?;

    let Value::Array(entries) = raw else {
        tracing::warn!("Directus returned no collection list");
        return Ok(Vec::new());
    };

    let descriptors: Vec<CollectionDescriptor> = entries
        .iter()
        .filter_map(|entry| describe(entry, settings, filter))
        .collect();
    tracing::debug!(count = descriptors.len(), "Collections found");

    Ok(descriptors)
}

/// Descriptor of one schema entry, `None` when the entry is filtered out.
fn describe(
    entry: &Value,
    settings: &DirectusSettings,
    filter: &(dyn Fn(&CollectionInfo<'_>) -> bool + Send + Sync),
) -> Option<CollectionDescriptor> {
    let collection = entry.get("collection").and_then(Value::as_str)?;

    // folders in the data model have no schema
    if entry.get("schema").is_none_or(Value::is_null) {
        return None;
    }

    let meta = entry.get("meta").unwrap_or(&Value::Null);
    let is_system = meta.get("system").and_then(Value::as_bool) == Some(true);
    let is_visible = meta.get("hidden").and_then(Value::as_bool) == Some(false);

    if !settings.allow_system && is_system {
        return None;
    }
    if !settings.allow_hidden && !is_visible {
        return None;
    }
    if !filter(&CollectionInfo { collection, meta }) {
        return None;
    }

    let singleton = meta.get("singleton").and_then(Value::as_bool).unwrap_or(false);
    Some(CollectionDescriptor::new(collection, singleton))
}
