//! In-memory transport
//!
//! Serves collection payloads from a JSON document shaped like
//! `{"<collection>": <data>, ...}`, and counts every read so callers can check
//! how often the CMS would have been hit.

use std::collections::{
    HashMap,
    HashSet,
};
use std::sync::atomic::{
    AtomicUsize,
    Ordering,
};
use std::sync::{
    Mutex,
    PoisonError,
};

use async_trait::async_trait;
use serde_json::{
    Map,
    Value,
};

use super::{
    Query,
    Transport,
    TransportError,
};

/// Transport answering from an in-memory document.
///
/// A test fixture: it stands in for a Directus instance in unit and
/// integration tests and is not meant for production builds.
#[derive(Debug, Default)]
pub struct MemoryTransport {
    /// Collection name → `data` payload
    collections: HashMap<String, Value>,
    /// Collections whose reads fail as if the CMS were down
    failing: HashSet<String>,
    /// Every request fails as unreachable when set
    offline: bool,
    /// Pings fail while reads still succeed
    unhealthy: bool,
    /// Reads per collection
    reads: Mutex<HashMap<String, usize>>,
    /// Number of pings
    pings: AtomicUsize,
}

impl MemoryTransport {
    /// Creates an empty transport.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a transport from a `{"<collection>": <data>}` document.
    #[must_use]
    pub fn from_document(document: Map<String, Value>) -> Self {
        Self { collections: document.into_iter().collect(), ..Self::default() }
    }

    /// Adds or replaces the payload of one collection.
    #[must_use]
    pub fn with_collection(mut self, name: impl Into<String>, data: Value) -> Self {
        self.collections.insert(name.into(), data);
        self
    }

    /// Makes reads of `name` fail as unreachable.
    #[must_use]
    pub fn with_failure(mut self, name: impl Into<String>) -> Self {
        self.failing.insert(name.into());
        self
    }

    /// Makes every request fail as unreachable.
    #[must_use]
    pub const fn offline(mut self) -> Self {
        self.offline = true;
        self
    }

    /// Makes pings fail while reads keep working.
    #[must_use]
    pub const fn unhealthy(mut self) -> Self {
        self.unhealthy = true;
        self
    }

    /// Number of reads issued for `collection`.
    #[must_use]
    pub fn read_count(&self, collection: &str) -> usize {
        self.reads.lock().unwrap_or_else(PoisonError::into_inner).get(collection).copied().unwrap_or(0)
    }

    /// Number of reads issued across all collections.
    #[must_use]
    pub fn total_reads(&self) -> usize {
        self.reads.lock().unwrap_or_else(PoisonError::into_inner).values().sum()
    }

    /// Number of pings received.
    #[must_use]
    pub fn ping_count(&self) -> usize {
        self.pings.load(Ordering::SeqCst)
    }

    /// URL-like label used in error messages.
    fn url(collection: &str) -> String {
        format!("memory://items/{collection}")
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn read_items(&self, collection: &str, _query: &Query) -> Result<Value, TransportError> {
        *self
            .reads
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(collection.to_string())
            .or_insert(0) += 1;

        if self.offline || self.failing.contains(collection) {
            return Err(TransportError::Unreachable {
                url: Self::url(collection),
                source: "simulated outage".into(),
            });
        }

        // Directus answers 403 for collections it does not know about
        self.collections
            .get(collection)
            .cloned()
            .ok_or(TransportError::Forbidden { url: Self::url(collection), status: 403 })
    }

    async fn ping(&self) -> Result<String, TransportError> {
        self.pings.fetch_add(1, Ordering::SeqCst);

        if self.offline || self.unhealthy {
            return Err(TransportError::Unreachable {
                url: "memory://server/ping".to_string(),
                source: "simulated outage".into(),
            });
        }
        Ok("pong".to_string())
    }
}
