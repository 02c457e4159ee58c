use async_trait::async_trait;
use bytes::Bytes;

use crate::error::Result;

/// Object storage for uploaded media and attachments
#[async_trait]
pub trait StorageProvider: Send + Sync {
    /// Store `data` under `path`, replacing any existing object
    async fn put(&self, path: &str, data: Bytes) -> Result<()>;

    /// Read an object back
    async fn get(&self, path: &str) -> Result<Bytes>;

    /// Remove an object; a missing object is not an error
    async fn delete(&self, path: &str) -> Result<()>;

    async fn exists(&self, path: &str) -> Result<bool>;

    /// URL under which clients can fetch the object
    fn public_url(&self, path: &str) -> String;

    /// Get the storage type name
    fn storage_type(&self) -> &'static str;
}
