//! Blob storage trait for attachment and emoji files.

use async_trait::async_trait;
use bytes::Bytes;

use crate::result::AppResult;

/// Key/value blob store holding original media files and thumbnails.
///
/// Keys are slash-separated relative paths such as
/// `{account}/attachment/original/{id}.png`. The trait is defined here and
/// implemented in `mediahub-storage`.
#[async_trait]
pub trait StorageProvider: Send + Sync + std::fmt::Debug + 'static {
    /// Return the provider type name (e.g., "local").
    fn provider_type(&self) -> &str;

    /// Check whether the provider is healthy and reachable.
    async fn health_check(&self) -> AppResult<bool>;

    /// Read a blob into memory.
    async fn read_bytes(&self, path: &str) -> AppResult<Bytes>;

    /// Write a blob, replacing any existing one at the same key.
    async fn write(&self, path: &str, data: Bytes) -> AppResult<()>;

    /// Delete a blob. Deleting a missing key is not an error.
    async fn delete(&self, path: &str) -> AppResult<()>;

    /// Check whether a blob exists.
    async fn exists(&self, path: &str) -> AppResult<bool>;
}
