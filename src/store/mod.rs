//! Object store clients.
//!
//! The [`ObjectStore`] trait abstracts the backing storage service one
//! store entry talks to.  A client is shared by every bucket that
//! references the same store; the target bucket identifier is passed
//! per call, mirroring how one set of credentials serves many buckets.

use bytes::Bytes;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::config::StoreConfig;
use crate::errors::StorageError;

pub mod memory;
pub mod s3;

/// Error signal from a store client, classified just far enough for
/// the operation layer to map it into the caller-facing taxonomy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The object does not exist.
    NotFound,
    /// The store denied access.
    AccessDenied,
    /// The call exceeded its deadline.
    Timeout,
    /// Anything else, with the original error text preserved.
    Other(String),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::NotFound => write!(f, "object not found"),
            StoreError::AccessDenied => write!(f, "access denied"),
            StoreError::Timeout => write!(f, "request timed out"),
            StoreError::Other(message) => write!(f, "{message}"),
        }
    }
}

impl std::error::Error for StoreError {}

impl StoreError {
    /// Map this store-level error into the caller-facing taxonomy.
    pub fn classify(self, operation: &str, pathname: &str) -> StorageError {
        match self {
            StoreError::NotFound => StorageError::FileNotFound {
                pathname: pathname.to_string(),
            },
            StoreError::AccessDenied => StorageError::PermissionDenied {
                operation: operation.to_string(),
            },
            StoreError::Timeout => StorageError::OperationTimeout {
                operation: operation.to_string(),
            },
            StoreError::Other(message) => StorageError::OperationFailed {
                operation: operation.to_string(),
                message,
            },
        }
    }
}

/// Input to a store write.
#[derive(Debug, Clone)]
pub struct PutInput {
    /// Storage key (already namespaced through the bucket prefix).
    pub key: String,
    /// Object payload.
    pub content: Bytes,
    /// Content type to record with the object.
    pub content_type: String,
    /// Canned ACL (`public-read` or `private`).
    pub acl: String,
    /// Caller-supplied object metadata.
    pub metadata: HashMap<String, String>,
    /// Multipart threshold and part size in bytes.
    pub part_size: u64,
    /// Parallel part uploads for multipart transfers.
    pub part_concurrency: usize,
}

/// Object metadata as reported by the store.
#[derive(Debug, Clone)]
pub struct ObjectHead {
    pub size: i64,
    pub mime_type: String,
    /// Unix seconds.
    pub last_modified: i64,
    pub etag: String,
}

/// A fetched object.
#[derive(Debug, Clone)]
pub struct RemoteObject {
    pub content: Bytes,
    pub size: i64,
    pub mime_type: String,
    /// Unix seconds.
    pub last_modified: i64,
}

/// Parameters for a list call.
#[derive(Debug, Clone, Default)]
pub struct ListParams {
    pub prefix: Option<String>,
    pub delimiter: Option<String>,
    pub max_keys: i32,
    pub continuation_token: Option<String>,
}

/// One entry in a list result.
#[derive(Debug, Clone)]
pub struct ListEntry {
    pub key: String,
    pub size: i64,
    /// Unix seconds.
    pub last_modified: i64,
    pub etag: String,
    pub storage_class: String,
}

/// One page of a list result.
#[derive(Debug, Clone, Default)]
pub struct ListChunk {
    pub objects: Vec<ListEntry>,
    pub common_prefixes: Vec<String>,
    pub is_truncated: bool,
    pub next_continuation_token: Option<String>,
    pub key_count: i32,
}

/// Async object store contract.
pub trait ObjectStore: std::fmt::Debug + Send + Sync + 'static {
    /// Write an object, using a multipart transfer when the payload
    /// exceeds the configured part size.
    fn put(
        &self,
        bucket: &str,
        input: PutInput,
    ) -> Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + '_>>;

    /// Read the full object at `key`.
    fn get(
        &self,
        bucket: &str,
        key: &str,
    ) -> Pin<Box<dyn Future<Output = Result<RemoteObject, StoreError>> + Send + '_>>;

    /// Fetch object metadata without the payload.
    fn head(
        &self,
        bucket: &str,
        key: &str,
    ) -> Pin<Box<dyn Future<Output = Result<ObjectHead, StoreError>> + Send + '_>>;

    /// Delete the object at `key`.  Idempotent at the store.
    fn delete(
        &self,
        bucket: &str,
        key: &str,
    ) -> Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + '_>>;

    /// Server-side copy, executed by this (destination) client.
    fn copy(
        &self,
        source_bucket: &str,
        source_key: &str,
        dest_bucket: &str,
        dest_key: &str,
        acl: &str,
    ) -> Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + '_>>;

    /// Set the canned ACL on an existing object.
    fn set_acl(
        &self,
        bucket: &str,
        key: &str,
        acl: &str,
    ) -> Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + '_>>;

    /// Generate a signed, time-limited GET URL.
    fn presign_get(
        &self,
        bucket: &str,
        key: &str,
        expires_in: u64,
    ) -> Pin<Box<dyn Future<Output = Result<String, StoreError>> + Send + '_>>;

    /// Compose the permanent URL for an object.  No I/O.
    fn url_for(&self, bucket: &str, key: &str) -> String;

    /// List one page of objects.
    fn list(
        &self,
        bucket: &str,
        params: ListParams,
    ) -> Pin<Box<dyn Future<Output = Result<ListChunk, StoreError>> + Send + '_>>;
}

/// Build a store client from its configuration.
pub async fn build(name: &str, cfg: &StoreConfig) -> anyhow::Result<Arc<dyn ObjectStore>> {
    match cfg.kind.as_str() {
        "memory" => Ok(Arc::new(memory::MemoryStore::new())),
        "s3" => Ok(Arc::new(s3::S3ObjectStore::new(cfg).await?)),
        other => anyhow::bail!("unknown store kind '{other}' for store '{name}'"),
    }
}

// -- Tests --------------------------------------------------------------------
