//! テスト用ユーティリティ関数
//!
//! Unit tests share the CMS fixture that the integration tests load from
//! `tests/fixtures/cms.json`.
#![cfg(test)]

use serde_json::{
    Map,
    Value,
};

use crate::client::Client;
use crate::config::DirectusSettings;
use crate::transport::MemoryTransport;

/// Fixture content: page, post, settings (singleton), multilingual,
/// its hidden translation table, languages, and a system collection.
const CMS_FIXTURE: &str = include_str!("../tests/fixtures/cms.json");

/// Transport serving the fixture content.
pub(crate) fn fixture_transport() -> MemoryTransport {
    let document: Map<String, Value> = serde_json::from_str(CMS_FIXTURE).unwrap_or_default();
    MemoryTransport::from_document(document)
}

/// Client reading the fixture content.
pub(crate) fn fixture_client(settings: DirectusSettings) -> Client<MemoryTransport> {
    Client::new(settings, fixture_transport())
}
