use async_trait::async_trait;

use super::error::StorageError;
use super::hash::ContentHash;

/// Content-addressed storage for files uploaded with challenge bundles.
///
/// Storing the same bytes twice yields the same hash and a single copy.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store bytes and return their content hash.
    async fn put(&self, data: &[u8]) -> Result<ContentHash, StorageError>;

    /// Retrieve the bytes stored under `hash`.
    async fn get(&self, hash: &ContentHash) -> Result<Vec<u8>, StorageError>;
}
