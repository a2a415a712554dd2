//! Memoized Directus client
//!
//! [`Client::init`] reads every collection once and freezes the result into a
//! [`Snapshot`]. Later calls hand out the same snapshot; nothing is refetched
//! for the lifetime of the client.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::{
    Map,
    Value,
};
use thiserror::Error;
use tokio::sync::OnceCell;

use crate::collections::{
    CollectionInfo,
    list_collections,
};
use crate::config::DirectusSettings;
use crate::expand::{
    Expander,
    ItemHook,
};
use crate::transport::{
    HttpTransport,
    Query,
    Transport,
    TransportError,
};
use crate::translate::{
    TranslateError,
    TranslationField,
    translate,
};
use crate::types::{
    CollectionData,
    CollectionDescriptor,
};

/// Key of the flat list of every item in the global data.
pub const ALL_KEY: &str = "all";
/// Field of a language row holding its code.
const LANGUAGE_CODE_FIELD: &str = "code";

/// Predicate deciding which introspected collections are expanded.
pub type CollectionFilter = dyn Fn(&CollectionInfo<'_>) -> bool + Send + Sync;

#[derive(Error, Debug)]
pub enum ClientError {
    /// The schema list could not be read
    #[error(
        "Could not get collections from directus, did you allow public read on \"Collections\"? Error: {0}"
    )]
    Introspection(#[source] TransportError),
    /// The language collection could not be read
    #[error("Could not get languages from collection '{collection}': {source}")]
    Languages {
        collection: String,
        #[source]
        source: TransportError,
    },
    /// Data was requested before `init` completed
    #[error("The directus client is not initialized, call `init` first")]
    NotInitialized,
}

/// Content of every collection, computed once.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    /// Introspected collections, in schema order
    descriptors: Vec<CollectionDescriptor>,
    /// Expanded data by collection name; unreadable collections are absent
    collections: HashMap<String, CollectionData>,
    /// Every item of every collection, singletons included
    all: Vec<Value>,
}

impl Snapshot {
    /// Builds a snapshot from expansion results in descriptor order.
    #[must_use]
    pub fn new(entries: Vec<(CollectionDescriptor, Option<CollectionData>)>) -> Self {
        let mut descriptors = Vec::with_capacity(entries.len());
        let mut collections = HashMap::with_capacity(entries.len());
        let mut all = Vec::new();

        for (descriptor, data) in entries {
            if let Some(data) = data {
                data.flatten_into(&mut all);
                collections.insert(descriptor.name.clone(), data);
            }
            descriptors.push(descriptor);
        }

        Self { descriptors, collections, all }
    }

    #[must_use]
    pub fn descriptors(&self) -> &[CollectionDescriptor] {
        &self.descriptors
    }

    /// Data of one collection, `None` when unknown or unreadable.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&CollectionData> {
        self.collections.get(name)
    }

    #[must_use]
    pub fn all(&self) -> &[Value] {
        &self.all
    }

    /// The snapshot as template data: one member per collection (`null` for
    /// unreadable ones) followed by [`ALL_KEY`].
    #[must_use]
    pub fn to_value(&self) -> Value {
        let mut data = Map::new();
        for descriptor in &self.descriptors {
            let value = self
                .collections
                .get(&descriptor.name)
                .map_or(Value::Null, |collection| match collection {
                    CollectionData::Items(items) => Value::Array(items.clone()),
                    CollectionData::Singleton(object) => object.clone(),
                });
            data.insert(descriptor.name.clone(), value);
        }
        if data.contains_key(ALL_KEY) {
            tracing::warn!("A collection named '{ALL_KEY}' is shadowed by the list of all items");
        }
        data.insert(ALL_KEY.to_string(), Value::Array(self.all.clone()));

        Value::Object(data)
    }
}

fn accept_all(_: &CollectionInfo<'_>) -> bool {
    true
}

/// Reads and shapes Directus content for a site build.
pub struct Client<T = HttpTransport> {
    settings: DirectusSettings,
    transport: T,
    collection_filter: Arc<CollectionFilter>,
    item_hook: Option<Arc<ItemHook>>,
    /// Language codes, read once
    languages: OnceCell<Option<Vec<String>>>,
    snapshot: OnceCell<Arc<Snapshot>>,
}

impl<T> std::fmt::Debug for Client<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("settings", &self.settings)
            .field("collection_filter", &"<fn>")
            .field("item_hook", &self.item_hook.as_ref().map(|_| "<fn>"))
            .field("languages", &self.languages.get())
            .field("initialized", &self.snapshot.initialized())
            .finish_non_exhaustive()
    }
}

impl<T: Transport> Client<T> {
    pub fn new(settings: DirectusSettings, transport: T) -> Self {
        Self {
            settings,
            transport,
            collection_filter: Arc::new(accept_all),
            item_hook: None,
            languages: OnceCell::new(),
            snapshot: OnceCell::new(),
        }
    }

    /// Restricts the expanded collections further than the hidden/system toggles.
    #[must_use]
    pub fn with_collection_filter(
        mut self,
        filter: impl Fn(&CollectionInfo<'_>) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.collection_filter = Arc::new(filter);
        self
    }

    /// Transforms every expanded item before it enters the snapshot.
    #[must_use]
    pub fn with_item_hook(mut self, hook: impl Fn(Value) -> Value + Send + Sync + 'static) -> Self {
        self.item_hook = Some(Arc::new(hook));
        self
    }

    #[must_use]
    pub const fn settings(&self) -> &DirectusSettings {
        &self.settings
    }

    #[must_use]
    pub const fn transport(&self) -> &T {
        &self.transport
    }

    /// Builds the snapshot, or returns it if it was already built.
    ///
    /// Concurrent calls wait for the first one; the CMS is read at most once.
    /// A failed build is not cached and can be retried.
    pub async fn init(&self) -> Result<Arc<Snapshot>, ClientError> {
        self.snapshot.get_or_try_init(|| self.build_snapshot()).await.map(Arc::clone)
    }

    async fn build_snapshot(&self) -> Result<Arc<Snapshot>, ClientError> {
        let descriptors = self.list_collections().await?;
        tracing::info!(count = descriptors.len(), "Expanding directus collections");

        let entries = if self.settings.sequencial {
            let mut entries = Vec::with_capacity(descriptors.len());
            for descriptor in descriptors {
                let data = self.expand(&descriptor).await?;
                entries.push((descriptor, data));
            }
            entries
        } else {
            let expanded = futures::future::try_join_all(
                descriptors.iter().map(|descriptor| self.expand(descriptor)),
            )
            .await?;
            descriptors.into_iter().zip(expanded).collect()
        };

        Ok(Arc::new(Snapshot::new(entries)))
    }

    /// Schema-backed collections passing the settings and the collection filter.
    pub async fn list_collections(&self) -> Result<Vec<CollectionDescriptor>, ClientError> {
        list_collections(&self.transport, &self.settings, self.collection_filter.as_ref()).await
    }

    /// Language codes of the configured language collection.
    ///
    /// `None` when no language collection is configured.
    pub async fn languages(&self) -> Result<Option<&[String]>, ClientError> {
        let languages = self.languages.get_or_try_init(|| self.fetch_languages()).await?;
        Ok(languages.as_deref())
    }

    async fn fetch_languages(&self) -> Result<Option<Vec<String>>, ClientError> {
        let Some(collection) = &self.settings.language_collection else {
            return Ok(None);
        };

        let rows = self
            .transport
            .read_items(collection, &Query::unbounded(1))
            .await
            .map_err(|source| ClientError::Languages { collection: collection.clone(), source })?;

        let codes: Vec<String> = rows
            .as_array()
            .map(|rows| {
                rows.iter()
                    .filter_map(|row| row.get(LANGUAGE_CODE_FIELD).and_then(Value::as_str))
                    .map(ToString::to_string)
                    .collect()
            })
            .unwrap_or_default();
        tracing::debug!(collection = %collection, ?codes, "Languages found");

        Ok(Some(codes))
    }

    /// Expands one collection, one item per row and language.
    ///
    /// `Ok(None)` when the collection itself could not be read.
    pub async fn expand(
        &self,
        descriptor: &CollectionDescriptor,
    ) -> Result<Option<CollectionData>, ClientError> {
        let languages = self.languages().await?;
        let expander = Expander::new(&self.transport, &self.settings, languages)
            .with_item_hook(self.item_hook.as_deref());

        Ok(expander.expand(descriptor).await)
    }

    /// Whether the CMS answers its ping; never fails.
    pub async fn health_check(&self) -> bool {
        match self.transport.ping().await {
            Ok(pong) => pong.trim() == "pong",
            Err(error) => {
                tracing::debug!(%error, "Directus health check failed");
                false
            }
        }
    }

    /// The snapshot built by [`Client::init`].
    pub fn snapshot(&self) -> Result<&Arc<Snapshot>, ClientError> {
        self.snapshot.get().ok_or(ClientError::NotInitialized)
    }

    /// Data of one collection; `Ok(None)` when it is unknown or was unreadable.
    pub fn collection(&self, name: &str) -> Result<Option<&CollectionData>, ClientError> {
        Ok(self.snapshot()?.get(name))
    }

    /// Every item of every collection.
    pub fn all(&self) -> Result<&[Value], ClientError> {
        Ok(self.snapshot()?.all())
    }

    /// Translates an item, defaulting to the configured translation field.
    pub fn translate(
        &self,
        item: &Value,
        field: Option<&TranslationField>,
        lang: Option<&str>,
    ) -> Result<Value, TranslateError> {
        translate(item, field.unwrap_or(&self.settings.translation_field), lang)
    }

    /// URL, or local path when an upload folder is configured, of a Directus file.
    ///
    /// Missing files yield an empty string; `context` names the caller in the log.
    #[must_use]
    pub fn asset_url(&self, image: Option<&Value>, context: &str) -> String {
        let Some(filename) =
            image.and_then(|image| image.get("filename_disk")).and_then(Value::as_str)
        else {
            tracing::error!(context, ?image, "This image does not exist");
            return String::new();
        };

        match &self.settings.upload_folder {
            Some(folder) => format!("{}/{filename}", folder.trim_end_matches('/')),
            None => format!("{}/assets/{filename}", self.settings.url.trim_end_matches('/')),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use std::sync::atomic::{
        AtomicUsize,
        Ordering,
    };
    use std::time::Duration;

    use async_trait::async_trait;
    use googletest::prelude::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use serde_json::json;

    use super::*;
    use crate::test_utils::{
        fixture_client,
        fixture_transport,
    };
    use crate::transport::{
        COLLECTIONS_COLLECTION,
        MemoryTransport,
    };

    #[tokio::test]
    async fn data_access_before_init_fails() {
        let client = fixture_client(DirectusSettings::default());

        assert!(matches!(client.snapshot(), Err(ClientError::NotInitialized)));
        assert!(matches!(client.collection("page"), Err(ClientError::NotInitialized)));
        assert!(matches!(client.all(), Err(ClientError::NotInitialized)));
    }

    #[tokio::test]
    async fn init_twice_does_not_refetch() {
        let client = fixture_client(DirectusSettings::default());

        let first = client.init().await.unwrap();
        let reads = client.transport().total_reads();
        let second = client.init().await.unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(client.transport().total_reads(), reads);
        assert_eq!(client.transport().read_count(COLLECTIONS_COLLECTION), 1);
        assert_eq!(client.transport().read_count("page"), 1);
    }

    #[tokio::test]
    async fn concurrent_init_reads_once() {
        let client = fixture_client(DirectusSettings::default());

        let (first, second) = tokio::join!(client.init(), client.init());

        assert!(Arc::ptr_eq(&first.unwrap(), &second.unwrap()));
        assert_eq!(client.transport().read_count(COLLECTIONS_COLLECTION), 1);
    }

    #[tokio::test]
    async fn failed_init_is_not_cached() {
        let client = Client::new(DirectusSettings::default(), MemoryTransport::new());

        let result = client.init().await;

        assert!(matches!(result, Err(ClientError::Introspection(_))));
        assert!(matches!(client.snapshot(), Err(ClientError::NotInitialized)));
    }

    #[tokio::test]
    async fn snapshot_indexes_collections() {
        let client = fixture_client(DirectusSettings::default());

        client.init().await.unwrap();

        let page = client.collection("page").unwrap().unwrap();
        assert_eq!(
            page,
            &CollectionData::Items(vec![json!({
                "id": 1,
                "title": "Home",
                "text": "Home page",
                "status": "published",
                "collection": "page"
            })])
        );
        let settings = client.collection("settings").unwrap().unwrap();
        assert_eq!(settings.singleton().unwrap()["test_property"], json!("test value"));
        assert!(client.collection("unknown").unwrap().is_none());
    }

    #[tokio::test]
    async fn all_flattens_every_collection() {
        let client = fixture_client(DirectusSettings::default());

        let snapshot = client.init().await.unwrap();
        let expected: usize = snapshot
            .descriptors()
            .iter()
            .filter_map(|d| snapshot.get(&d.name))
            .map(CollectionData::len)
            .sum();

        assert_eq!(client.all().unwrap().len(), expected);
        assert!(client.all().unwrap().iter().any(|item| item["collection"] == json!("settings")));
    }

    /// Fixture transport recording how many reads overlap.
    #[derive(Debug, Default)]
    struct OverlapTransport {
        inner: MemoryTransport,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
    }

    #[async_trait]
    impl Transport for OverlapTransport {
        async fn read_items(&self, collection: &str, query: &Query) -> Result<Value, TransportError> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(5)).await;
            let result = self.inner.read_items(collection, query).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            result
        }

        async fn ping(&self) -> Result<String, TransportError> {
            self.inner.ping().await
        }
    }

    #[rstest]
    #[case(true, 1)]
    #[case(false, 6)]
    #[tokio::test]
    async fn sequencial_setting_controls_overlap(#[case] sequencial: bool, #[case] expected: usize) {
        let transport = OverlapTransport { inner: fixture_transport(), ..OverlapTransport::default() };
        let client =
            Client::new(DirectusSettings { sequencial, ..DirectusSettings::default() }, transport);

        client.init().await.unwrap();

        // introspection runs alone, then the six collections are read
        assert_eq!(client.transport().max_in_flight.load(Ordering::SeqCst), expected);
    }

    #[tokio::test]
    async fn sequential_and_concurrent_builds_agree() {
        let concurrent = fixture_client(DirectusSettings::default());
        let sequential =
            fixture_client(DirectusSettings { sequencial: true, ..DirectusSettings::default() });

        let a = concurrent.init().await.unwrap();
        let b = sequential.init().await.unwrap();

        assert_eq!(a.to_value(), b.to_value());
    }

    #[tokio::test]
    async fn unreadable_collection_leaves_a_hole() {
        let client =
            Client::new(DirectusSettings::default(), fixture_transport().with_failure("post"));

        let snapshot = client.init().await.unwrap();

        assert!(snapshot.get("post").is_none());
        assert!(snapshot.get("page").is_some());
        assert_eq!(snapshot.to_value()["post"], Value::Null);
    }

    #[tokio::test]
    async fn unreadable_language_collection_fails_init() {
        let settings = DirectusSettings {
            language_collection: Some("missing_languages".to_string()),
            ..DirectusSettings::default()
        };
        let client = fixture_client(settings);

        let result = client.init().await;

        assert!(matches!(
            result,
            Err(ClientError::Languages { collection, .. }) if collection == "missing_languages"
        ));
    }

    #[tokio::test]
    async fn languages_are_read_once() {
        let settings = DirectusSettings {
            language_collection: Some("languages".to_string()),
            ..DirectusSettings::default()
        };
        let client = fixture_client(settings);

        client.init().await.unwrap();
        let reads = client.transport().read_count("languages");
        let languages = client.languages().await.unwrap().unwrap().to_vec();

        assert_eq!(languages, vec!["en-US".to_string(), "fr-FR".to_string()]);
        assert_eq!(client.transport().read_count("languages"), reads);
    }

    #[tokio::test]
    async fn collection_filter_and_item_hook_apply() {
        let client = fixture_client(DirectusSettings::default())
            .with_collection_filter(|info| info.collection != "post")
            .with_item_hook(|mut item| {
                if let Value::Object(fields) = &mut item {
                    fields.insert("site".to_string(), json!("example"));
                }
                item
            });

        let snapshot = client.init().await.unwrap();

        assert!(snapshot.descriptors().iter().all(|d| d.name != "post"));
        assert!(snapshot.all().iter().all(|item| item["site"] == json!("example")));
    }

    #[tokio::test]
    async fn health_check_never_fails() {
        let online = fixture_client(DirectusSettings::default());
        let offline = Client::new(DirectusSettings::default(), MemoryTransport::new().offline());

        assert!(online.health_check().await);
        assert!(!offline.health_check().await);
    }

    #[googletest::test]
    fn asset_url_points_at_assets_endpoint() {
        let client = fixture_client(DirectusSettings {
            url: "http://localhost:8055/".to_string(),
            ..DirectusSettings::default()
        });
        let image = json!({"id": "8d6e", "filename_disk": "8d6e.png"});

        expect_that!(
            client.asset_url(Some(&image), "index"),
            eq("http://localhost:8055/assets/8d6e.png")
        );
    }

    #[rstest]
    #[case("/srv/uploads/")]
    #[case("/srv/uploads")]
    fn asset_url_joins_upload_folder_with_one_slash(#[case] folder: &str) {
        let client = fixture_client(DirectusSettings {
            upload_folder: Some(folder.to_string()),
            ..DirectusSettings::default()
        });
        let image = json!({"filename_disk": "8d6e.png"});

        assert_that!(client.asset_url(Some(&image), "index"), eq("/srv/uploads/8d6e.png"));
    }

    #[googletest::test]
    fn asset_url_of_missing_image_is_empty() {
        let client = fixture_client(DirectusSettings::default());

        expect_that!(client.asset_url(None, "index"), eq(""));
        expect_that!(client.asset_url(Some(&Value::Null), "index"), eq(""));
        expect_that!(client.asset_url(Some(&json!({"id": 1})), "index"), eq(""));
    }

    #[googletest::test]
    fn translate_defaults_to_configured_field() {
        let client = fixture_client(DirectusSettings {
            translation_field: "translations".into(),
            ..DirectusSettings::default()
        });
        let item = json!({"translations": [{"languages_code": "en-US", "title": "Hi"}]});

        let translated = client.translate(&item, None, Some("en-US")).unwrap();

        expect_that!(translated["title"], eq(&json!("Hi")));
    }
}
