//! Core types used throughout the project.

use serde::Serialize;
use serde_json::{
    Map,
    Value,
};

/// A content item: field name → value.
pub type Item = Map<String, Value>;

/// Field stamped with the name of the collection an item comes from.
pub const COLLECTION_FIELD: &str = "collection";
/// Field stamped with the language code of a translated item.
pub const LANG_FIELD: &str = "lang";

/// A schema-backed collection, as found by introspection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CollectionDescriptor {
    pub name: String,
    /// Singleton collections hold one settings-like object instead of rows.
    pub singleton: bool,
}

impl CollectionDescriptor {
    #[must_use]
    pub fn new(name: impl Into<String>, singleton: bool) -> Self {
        Self { name: name.into(), singleton }
    }
}

/// Expanded content of one collection.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum CollectionData {
    /// Rows of a regular collection, one per row and language.
    Items(Vec<Value>),
    /// The object of a singleton collection.
    Singleton(Value),
}

impl CollectionData {
    /// Items of a regular collection, `None` for a singleton.
    #[must_use]
    pub fn items(&self) -> Option<&[Value]> {
        match self {
            Self::Items(items) => Some(items),
            Self::Singleton(_) => None,
        }
    }

    /// Object of a singleton collection, `None` for a regular one.
    #[must_use]
    pub const fn singleton(&self) -> Option<&Value> {
        match self {
            Self::Singleton(object) => Some(object),
            Self::Items(_) => None,
        }
    }

    /// Number of items, 1 for a singleton.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Items(items) => items.len(),
            Self::Singleton(_) => 1,
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Appends the content to a flat list of items.
    pub(crate) fn flatten_into(&self, all: &mut Vec<Value>) {
        match self {
            Self::Items(items) => all.extend(items.iter().cloned()),
            Self::Singleton(object) => all.push(object.clone()),
        }
    }
}
