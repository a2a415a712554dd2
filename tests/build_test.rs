//! フィクスチャ CMS に対するビルド全体のテスト

#![allow(clippy::unwrap_used)]
#![allow(clippy::indexing_slicing)]
#![allow(missing_docs)]

use std::sync::Arc;

use directus_site_data::config::DirectusSettings;
use directus_site_data::transport::MemoryTransport;
use directus_site_data::{
    Client,
    CollectionData,
    SitePlugin,
};
use googletest::prelude::*;
use pretty_assertions::assert_eq;
use rstest::rstest;
use serde_json::{
    Map,
    Value,
    json,
};

const CMS_FIXTURE: &str = include_str!("fixtures/cms.json");

fn fixture_transport() -> MemoryTransport {
    let document: Map<String, Value> = serde_json::from_str(CMS_FIXTURE).unwrap();
    MemoryTransport::from_document(document)
}

fn client(settings: DirectusSettings) -> Client<MemoryTransport> {
    Client::new(settings, fixture_transport())
}

fn multilingual_settings() -> DirectusSettings {
    DirectusSettings { language_collection: Some("languages".to_string()), ..DirectusSettings::default() }
}

#[tokio::test]
async fn drafts_are_excluded() {
    let client = client(DirectusSettings::default());

    let snapshot = client.init().await.unwrap();
    let page = snapshot.get("page").and_then(CollectionData::items).unwrap();

    assert_eq!(page.len(), 1);
    assert_eq!(page[0]["title"], json!("Home"));
    assert_eq!(page[0]["collection"], json!("page"));
}

#[tokio::test]
async fn drafts_are_kept_when_requested() {
    let client = client(DirectusSettings { show_draft: true, ..DirectusSettings::default() });

    let snapshot = client.init().await.unwrap();

    assert_eq!(snapshot.get("page").map(CollectionData::len), Some(2));
}

#[tokio::test]
async fn multilingual_items_are_expanded_per_language() {
    let client = client(multilingual_settings());

    let snapshot = client.init().await.unwrap();
    let items = snapshot.get("multilingual").and_then(CollectionData::items).unwrap();

    assert_eq!(items.len(), 2);
    assert_eq!(items[0]["lang"], json!("en-US"));
    assert_eq!(items[0]["text"], json!("text en"));
    assert_eq!(items[1]["lang"], json!("fr-FR"));
    assert_eq!(items[1]["text"], json!("text fr"));
}

#[tokio::test]
async fn untranslated_collections_get_one_item_per_language() {
    let client = client(multilingual_settings());

    let snapshot = client.init().await.unwrap();
    let page = snapshot.get("page").and_then(CollectionData::items).unwrap();
    let langs: Vec<&Value> = page.iter().map(|item| &item["lang"]).collect();

    assert_eq!(langs, vec![&json!("en-US"), &json!("fr-FR")]);
    assert!(page.iter().all(|item| item["title"] == json!("Home")));
}

#[tokio::test]
async fn without_language_collection_items_are_not_translated() {
    let client = client(DirectusSettings::default());

    let snapshot = client.init().await.unwrap();
    let items = snapshot.get("multilingual").and_then(CollectionData::items).unwrap();

    assert_eq!(items.len(), 1);
    assert!(items[0].get("lang").is_none());
    assert!(items[0].get("text").is_none());
}

#[tokio::test]
async fn singleton_is_an_object() {
    let client = client(DirectusSettings::default());

    let snapshot = client.init().await.unwrap();

    assert_that!(
        snapshot.get("settings").and_then(CollectionData::singleton),
        some(eq(&json!({"id": 1, "test_property": "test value", "collection": "settings"})))
    );
}

#[rstest]
#[case(true, 6)]
#[case(false, 5)]
#[tokio::test]
async fn introspection_respects_hidden_toggle(#[case] allow_hidden: bool, #[case] expected: usize) {
    let client = client(DirectusSettings { allow_hidden, ..DirectusSettings::default() });

    let descriptors = client.list_collections().await.unwrap();

    assert_eq!(descriptors.len(), expected);
    assert!(descriptors.iter().all(|d| d.name != "content" && d.name != "directus_users"));
}

#[tokio::test]
async fn init_reads_each_collection_once() {
    let client = client(multilingual_settings());

    let first = client.init().await.unwrap();
    let reads = client.transport().total_reads();
    let second = client.init().await.unwrap();

    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(client.transport().total_reads(), reads);
    assert_eq!(client.transport().read_count("languages"), 2);
    assert_eq!(client.transport().read_count("page"), 1);
}

#[tokio::test]
async fn global_data_and_filters() {
    let plugin = SitePlugin::new(client(multilingual_settings()));

    let data = plugin.global_data().await.unwrap();
    let translated = plugin
        .call_filter("directus_translate", &[data["multilingual"][0].clone(), Value::Null, json!("fr-FR")])
        .unwrap();
    let missing = plugin.call_filter("directus_asseturl", &[Value::Null]).unwrap();

    assert_eq!(data["settings"]["test_property"], json!("test value"));
    assert_eq!(translated["text"], json!("text fr"));
    assert_eq!(missing, json!(""));
}

#[test]
fn asset_url_of_missing_image_is_empty() {
    let client = client(DirectusSettings::default());

    assert_eq!(client.asset_url(None, "test"), "");
}
