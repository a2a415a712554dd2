//! Collection expansion
//!
//! Turns the raw rows of one collection into the items templates consume:
//! drafts are filtered out, every row is stamped with its collection and
//! translated once per language, and embedded modules get the same treatment.

use serde_json::Value;

use crate::config::DirectusSettings;
use crate::transport::{
    Query,
    Transport,
};
use crate::translate::merge_translation;
use crate::types::{
    COLLECTION_FIELD,
    CollectionData,
    CollectionDescriptor,
    Item,
    LANG_FIELD,
};

/// Publication status field.
pub const STATUS_FIELD: &str = "status";
/// Field marking the role of a page.
pub const PAGE_TYPE_FIELD: &str = "page_type";
/// `page_type` of the not-found page.
pub const NOT_FOUND_PAGE_TYPE: &str = "404";
/// Field holding embedded `{collection, item}` modules.
pub const MODULES_FIELD: &str = "modules";

/// Transform applied to every expanded item before it is stored.
pub type ItemHook = dyn Fn(Value) -> Value + Send + Sync;

/// Expands collections for one build.
#[derive(Clone, Copy)]
pub struct Expander<'a> {
    /// Where rows are read from
    transport: &'a dyn Transport,
    /// Draft, translation and depth options
    settings: &'a DirectusSettings,
    /// Language codes, `None` when no language collection is configured
    languages: Option<&'a [String]>,
    /// Optional per-item transform
    item_hook: Option<&'a ItemHook>,
}

impl std::fmt::Debug for Expander<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Expander")
            .field("languages", &self.languages)
            .field("item_hook", &self.item_hook.map(|_| "<fn>"))
            .finish_non_exhaustive()
    }
}

impl<'a> Expander<'a> {
    #[must_use]
    pub const fn new(
        transport: &'a dyn Transport,
        settings: &'a DirectusSettings,
        languages: Option<&'a [String]>,
    ) -> Self {
        Self { transport, settings, languages, item_hook: None }
    }

    #[must_use]
    pub fn with_item_hook(mut self, item_hook: Option<&'a ItemHook>) -> Self {
        self.item_hook = item_hook;
        self
    }

    /// Expands one collection.
    ///
    /// Returns `None` when the collection cannot be read; the failure is
    /// logged and the rest of the build goes on without it.
    pub async fn expand(&self, descriptor: &CollectionDescriptor) -> Option<CollectionData> {
        let name = descriptor.name.as_str();
        let query = Query::unbounded(self.settings.recursions);

        let data = match self.transport.read_items(name, &query).await {
            Ok(data) => data,
            Err(error) => {
                tracing::error!(collection = name, %error, "Could not get directus collection");
                return None;
            }
        };

        match (data, descriptor.singleton) {
            (Value::Null, _) => {
                tracing::error!(collection = name, "Directus returned null as the collection items");
                None
            }
            (Value::Array(rows), false) => Some(CollectionData::Items(self.expand_rows(name, &rows))),
            (Value::Array(rows), true) => {
                tracing::warn!(collection = name, "Singleton collection returned a list, keeping the first row");
                let row = rows.into_iter().next().unwrap_or_else(|| Value::Object(Item::new()));
                Some(self.expand_singleton(name, row))
            }
            (object, _) => Some(self.expand_singleton(name, object)),
        }
    }

    /// Stamps the singleton object with its collection.
    fn expand_singleton(&self, name: &str, mut object: Value) -> CollectionData {
        if let Value::Object(fields) = &mut object {
            fields.insert(COLLECTION_FIELD.to_string(), Value::String(name.to_string()));
        }
        CollectionData::Singleton(self.finish(object))
    }

    /// Visible rows, once per language.
    fn expand_rows(&self, name: &str, rows: &[Value]) -> Vec<Value> {
        let field_name = self.settings.translation_field.resolve_for(name);
        let languages: Vec<Option<&str>> = self.languages.map_or_else(
            || vec![None],
            |languages| languages.iter().map(|lang| Some(lang.as_str())).collect(),
        );

        let mut items = Vec::new();
        for row in rows.iter().filter(|row| is_visible(row, self.settings.show_draft)) {
            let Some(fields) = row.as_object() else {
                tracing::warn!(collection = name, "Skipping a row that is not an object");
                continue;
            };
            for lang in &languages {
                let item =
                    self.process_item(name, &field_name, fields, *lang, self.settings.recursions);
                items.push(self.finish(Value::Object(item)));
            }
        }

        retain_first_not_found(&mut items);
        items
    }

    /// Stamps, translates and expands the modules of one item.
    ///
    /// `depth` bounds how many levels of nested modules are processed.
    fn process_item(
        &self,
        collection: &str,
        field_name: &str,
        fields: &Item,
        lang: Option<&str>,
        depth: usize,
    ) -> Item {
        let mut stamped = fields.clone();
        stamped.insert(COLLECTION_FIELD.to_string(), Value::String(collection.to_string()));

        // every language variant carries its code, translated or not
        let mut item = match lang {
            Some(lang) => {
                let mut merged = merge_translation(&stamped, field_name, lang);
                merged.insert(LANG_FIELD.to_string(), Value::String(lang.to_string()));
                merged
            }
            None => stamped,
        };

        if depth > 0
            && let Some(Value::Array(modules)) = item.get_mut(MODULES_FIELD)
        {
            for module in modules.iter_mut() {
                if let Some(expanded) = self.process_module(module, lang, depth - 1) {
                    *module = Value::Object(expanded);
                }
            }
        }

        item
    }

    /// Replaces a `{collection, item}` module entry by its processed item.
    ///
    /// Entries without both members (e.g. bare ids past the fetch depth) are left alone.
    fn process_module(&self, module: &Value, lang: Option<&str>, depth: usize) -> Option<Item> {
        let collection = module.get(COLLECTION_FIELD)?.as_str()?;
        let fields = module.get("item")?.as_object()?;
        let field_name = self.settings.translation_field.resolve_for(collection);

        Some(self.process_item(collection, &field_name, fields, lang, depth))
    }

    fn finish(&self, item: Value) -> Value {
        match self.item_hook {
            Some(hook) => hook(item),
            None => item,
        }
    }
}

/// Whether a row is part of the build.
///
/// Rows without a status are always kept.
#[must_use]
pub fn is_visible(row: &Value, show_draft: bool) -> bool {
    match row.get(STATUS_FIELD) {
        None | Some(Value::Null) => true,
        Some(Value::String(status)) => {
            status.is_empty() || status == "published" || (show_draft && status == "draft")
        }
        Some(_) => false,
    }
}

/// Keeps only the first not-found page.
///
/// Every language variant of the 404 page carries the marker, but a site has
/// one not-found page; later variants are dropped.
pub fn retain_first_not_found(items: &mut Vec<Value>) {
    let mut seen = false;
    items.retain(|item| {
        let is_not_found =
            item.get(PAGE_TYPE_FIELD).and_then(Value::as_str) == Some(NOT_FOUND_PAGE_TYPE);
        if !is_not_found {
            return true;
        }
        !std::mem::replace(&mut seen, true)
    });
}
