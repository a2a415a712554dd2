//! Transport seam between the client and a Directus instance.
//!
//! Everything above this module only sees JSON payloads; how they are fetched
//! (REST over HTTP, or an in-memory fixture) is decided by the [`Transport`]
//! implementation handed to the client.

/// Directus REST transport built on `reqwest`
pub mod http;
/// In-memory transport serving test fixtures
pub mod memory;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

pub use http::HttpTransport;
pub use memory::MemoryTransport;

/// System collection holding the schema of every collection.
pub const COLLECTIONS_COLLECTION: &str = "directus_collections";

/// Errors raised while talking to the CMS.
#[derive(Error, Debug)]
pub enum TransportError {
    /// The CMS could not be reached at all (DNS, refused connection, outage)
    #[error("Could not reach Directus at {url}: {source}")]
    Unreachable {
        /// Requested URL
        url: String,
        /// Underlying failure
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// The CMS answered but refused access to the resource
    #[error("Access to {url} is forbidden (HTTP {status})")]
    Forbidden {
        /// Requested URL
        url: String,
        /// HTTP status code (401 or 403)
        status: u16,
    },
    /// Any other non-success response
    #[error("Directus returned HTTP {status} for {url}: {body}")]
    Status {
        /// Requested URL
        url: String,
        /// HTTP status code
        status: u16,
        /// Truncated response body
        body: String,
    },
    /// The response body was not the JSON envelope Directus sends
    #[error("Unexpected response from {url}: {message}")]
    InvalidResponse {
        /// Requested URL
        url: String,
        /// What was wrong with the payload
        message: String,
    },
}

impl TransportError {
    /// Whether the failure means the CMS refused access rather than being unreachable.
    #[must_use]
    pub const fn is_forbidden(&self) -> bool {
        matches!(self, Self::Forbidden { .. })
    }
}

/// Read query sent with every item request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    /// Maximum number of rows, `-1` for no limit
    pub limit: i64,
    /// Field selectors, e.g. `*.*.*` to expand three levels of relations
    pub fields: Vec<String>,
}

impl Query {
    /// Unbounded query expanding relations `depth` levels deep.
    ///
    /// A depth of 0 still selects the top-level fields.
    #[must_use]
    pub fn unbounded(depth: usize) -> Self {
        let wildcard = vec!["*"; depth.max(1)].join(".");
        Self { limit: -1, fields: vec![wildcard] }
    }

    /// Query string pairs in the form the Directus REST API expects.
    #[must_use]
    pub fn to_pairs(&self) -> Vec<(&'static str, String)> {
        vec![("limit", self.limit.to_string()), ("fields", self.fields.join(","))]
    }
}

/// Read-only access to a Directus instance.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Reads the `data` payload of a collection: an array of rows, a singleton
    /// object, or `null`.
    async fn read_items(&self, collection: &str, query: &Query) -> Result<Value, TransportError>;

    /// Pings the server, a healthy instance answers `pong`.
    async fn ping(&self) -> Result<String, TransportError>;
}
