//! Bucket registry.
//!
//! Holds every registered bucket together with its store client and
//! admission gate.  Registration is atomic under a single write lock,
//! so duplicate names lose cleanly.  Store clients are built once per
//! named store entry and shared by every bucket referencing it.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};

use crate::admission::AdmissionGate;
use crate::config::{BucketConfig, BucketSettings, StoreConfig};
use crate::errors::StorageError;
use crate::store::{self, ObjectStore};
use crate::validate::validate_bucket_name;

/// A registered bucket.  Settings are immutable after registration;
/// changing them requires remove and re-register.
#[derive(Debug)]
pub struct Bucket {
    pub name: String,
    pub settings: BucketSettings,
    pub store: Arc<dyn ObjectStore>,
    pub gate: AdmissionGate,
}

impl Bucket {
    /// Build the full storage key for a caller-supplied pathname.  The
    /// configured prefix is prepended verbatim.
    pub fn full_key(&self, pathname: &str) -> String {
        format!("{}{}", self.settings.prefix, pathname)
    }

    /// Strip the configured prefix from a storage key, for listing
    /// results returned to the caller.
    pub fn strip_prefix<'a>(&self, key: &'a str) -> &'a str {
        key.strip_prefix(&self.settings.prefix).unwrap_or(key)
    }

    /// Resolve the visibility for a write: the requested value if
    /// present, otherwise the bucket default.
    pub fn effective_visibility(&self, requested: &str) -> String {
        if requested.is_empty() {
            self.settings.visibility.clone()
        } else {
            requested.to_string()
        }
    }
}

#[derive(Debug, Default)]
struct RegistryState {
    buckets: HashMap<String, Arc<Bucket>>,
    default: Option<String>,
}

/// Registry of buckets and their shared store clients.
#[derive(Debug)]
pub struct BucketRegistry {
    /// Named store configurations available for bucket registration.
    stores: HashMap<String, StoreConfig>,
    /// One built client per store name, created lazily.
    clients: Mutex<HashMap<String, Arc<dyn ObjectStore>>>,
    inner: RwLock<RegistryState>,
}

impl BucketRegistry {
    pub fn new(stores: HashMap<String, StoreConfig>) -> Self {
        Self {
            stores,
            clients: Mutex::new(HashMap::new()),
            inner: RwLock::new(RegistryState::default()),
        }
    }

    /// Get or build the client for a named store entry.
    async fn client_for(&self, store_name: &str) -> Result<Arc<dyn ObjectStore>, StorageError> {
        let mut clients = self.clients.lock().await;
        if let Some(client) = clients.get(store_name) {
            return Ok(Arc::clone(client));
        }

        let cfg = self
            .stores
            .get(store_name)
            .ok_or_else(|| StorageError::InvalidConfig {
                reason: format!("store '{store_name}' is not configured"),
            })?;
        cfg.validate(store_name)?;

        let client =
            store::build(store_name, cfg)
                .await
                .map_err(|e| StorageError::InvalidConfig {
                    reason: format!("store '{store_name}': {e}"),
                })?;
        clients.insert(store_name.to_string(), Arc::clone(&client));
        Ok(client)
    }

    /// Register a bucket under `name`.  Fails if the name is taken or
    /// the configuration does not validate.
    pub async fn register(&self, name: &str, config: &BucketConfig) -> Result<(), StorageError> {
        validate_bucket_name(name)?;
        let settings = config.into_settings()?;

        {
            let state = self.inner.read().await;
            if state.buckets.contains_key(name) {
                return Err(StorageError::BucketAlreadyExists {
                    bucket: name.to_string(),
                });
            }
        }

        let client = self.client_for(&settings.store).await?;
        self.insert(name, settings, client).await
    }

    /// Register a bucket with an externally supplied store client,
    /// bypassing the named-store lookup.
    pub async fn register_with_client(
        &self,
        name: &str,
        settings: BucketSettings,
        client: Arc<dyn ObjectStore>,
    ) -> Result<(), StorageError> {
        validate_bucket_name(name)?;
        self.insert(name, settings, client).await
    }

    async fn insert(
        &self,
        name: &str,
        settings: BucketSettings,
        client: Arc<dyn ObjectStore>,
    ) -> Result<(), StorageError> {
        let mut state = self.inner.write().await;
        if state.buckets.contains_key(name) {
            return Err(StorageError::BucketAlreadyExists {
                bucket: name.to_string(),
            });
        }

        let gate = AdmissionGate::new(settings.max_concurrent_operations);
        info!(
            bucket = name,
            store = %settings.store,
            capacity = settings.max_concurrent_operations,
            "bucket registered"
        );

        state.buckets.insert(
            name.to_string(),
            Arc::new(Bucket {
                name: name.to_string(),
                settings,
                store: client,
                gate,
            }),
        );
        Ok(())
    }

    /// Look up a bucket by name.
    pub async fn get(&self, name: &str) -> Result<Arc<Bucket>, StorageError> {
        let state = self.inner.read().await;
        state
            .buckets
            .get(name)
            .cloned()
            .ok_or_else(|| StorageError::BucketNotFound {
                bucket: name.to_string(),
            })
    }

    /// Resolve a caller-supplied bucket name: empty means the default
    /// bucket.
    pub async fn resolve(&self, name: &str) -> Result<Arc<Bucket>, StorageError> {
        if name.is_empty() {
            self.get_default().await
        } else {
            self.get(name).await
        }
    }

    /// The default bucket, if one is configured and still registered.
    pub async fn get_default(&self) -> Result<Arc<Bucket>, StorageError> {
        let state = self.inner.read().await;
        let name = state
            .default
            .as_deref()
            .ok_or_else(|| StorageError::InvalidConfig {
                reason: "no default bucket configured".to_string(),
            })?;
        state
            .buckets
            .get(name)
            .cloned()
            .ok_or_else(|| StorageError::BucketNotFound {
                bucket: name.to_string(),
            })
    }

    /// Set the default bucket.  The bucket must already be registered.
    pub async fn set_default(&self, name: &str) -> Result<(), StorageError> {
        let mut state = self.inner.write().await;
        if !state.buckets.contains_key(name) {
            return Err(StorageError::BucketNotFound {
                bucket: name.to_string(),
            });
        }
        state.default = Some(name.to_string());
        Ok(())
    }

    /// Name of the current default bucket, if any.
    pub async fn default_name(&self) -> Option<String> {
        self.inner.read().await.default.clone()
    }

    /// Names of all registered buckets, sorted.
    pub async fn list(&self) -> Vec<String> {
        let state = self.inner.read().await;
        let mut names: Vec<String> = state.buckets.keys().cloned().collect();
        names.sort();
        names
    }

    /// Remove a bucket.  The default bucket cannot be removed; point
    /// the default elsewhere first.  In-flight operations holding the
    /// bucket handle run to completion.
    pub async fn remove(&self, name: &str) -> Result<(), StorageError> {
        let mut state = self.inner.write().await;
        if state.default.as_deref() == Some(name) {
            return Err(StorageError::InvalidConfig {
                reason: format!("cannot remove default bucket '{name}'"),
            });
        }
        if state.buckets.remove(name).is_none() {
            return Err(StorageError::BucketNotFound {
                bucket: name.to_string(),
            });
        }
        debug!(bucket = name, "bucket removed");
        Ok(())
    }

    /// Tear down the registry: close every admission gate (waking
    /// queued waiters with an error) and drop all buckets and clients.
    pub async fn close_all(&self) {
        let mut state = self.inner.write().await;
        for bucket in state.buckets.values() {
            bucket.gate.close();
        }
        state.buckets.clear();
        state.default = None;
        self.clients.lock().await.clear();
        info!("bucket registry closed");
    }
}

// -- Tests --------------------------------------------------------------------
