//! Storage targets for dump containers.
//!
//! - [`LocalStorage`] writes under a base directory on the local filesystem.
//! - [`S3Storage`] writes to an S3-compatible bucket.
//!
//! Both are built from an opaque [`StorageConfig`] by [`build_storage`].

pub mod config;
pub mod error;
pub mod local;
pub mod s3;

use std::sync::Arc;

use async_trait::async_trait;

pub use config::{StorageConfig, StorageKind};
pub use error::StorageError;
pub use local::LocalStorage;
pub use s3::S3Storage;

/// Byte-level access to an artifact store.
///
/// Paths are `/`-separated keys relative to the target's root.
#[async_trait]
pub trait StorageTarget: Send + Sync {
    async fn read(&self, path: &str) -> Result<Vec<u8>, StorageError>;

    async fn write(&self, path: &str, bytes: Vec<u8>) -> Result<(), StorageError>;

    /// Keys starting with `prefix`, sorted.
    async fn list(&self, prefix: &str) -> Result<Vec<String>, StorageError>;

    async fn delete(&self, path: &str) -> Result<(), StorageError>;
}

/// Build the target described by `config` after validating it.
pub async fn build_storage(config: &StorageConfig) -> Result<Arc<dyn StorageTarget>, StorageError> {
    match config.validate()? {
        StorageKind::Local => {
            let base = config.require("base_path")?;
            Ok(Arc::new(LocalStorage::new(base)))
        }
        StorageKind::S3 => Ok(Arc::new(S3Storage::from_config(config).await?)),
    }
}

/// Reject absolute keys and parent-directory components.
pub(crate) fn validate_key(path: &str) -> Result<(), StorageError> {
    let invalid = path.is_empty()
        || path.starts_with('/')
        || path.contains('\\')
        || path.split('/').any(|part| part == ".." || part == ".");
    if invalid {
        Err(StorageError::InvalidPath(path.to_string()))
    } else {
        Ok(())
    }
}
