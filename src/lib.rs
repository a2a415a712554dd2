//! directus-site-data
//!
//! Directus ヘッドレス CMS の全コレクションをビルド時に一度だけ読み込み、
//! 静的サイトジェネレーター向けのグローバルデータとして提供する。

pub mod client;
pub mod collections;
pub mod config;
pub mod expand;
pub mod site;
pub mod translate;
pub mod transport;
pub mod types;

mod test_utils;

// よく使う型を再エクスポート
pub use client::{
    Client,
    ClientError,
    Snapshot,
};
pub use config::DirectusSettings;
pub use site::{
    SiteError,
    SitePlugin,
};
pub use translate::TranslationField;
pub use transport::{
    HttpTransport,
    Transport,
};
pub use types::{
    CollectionData,
    CollectionDescriptor,
};
