//! Gateway lifecycle.
//!
//! Ties the registry, coordinator, and operation surface together.
//! Construction registers every configured bucket; shutdown drains
//! in-flight operations (or forces stop at the deadline) and then
//! tears the registry down.

use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::api::{ListBucketsResponse, RegisterBucketRequest, RegisterBucketResponse};
use crate::config::{BucketConfig, Config};
use crate::coordinator::OperationCoordinator;
use crate::errors::StorageError;
use crate::operations::Operations;
use crate::registry::BucketRegistry;

/// The object-storage gateway.
#[derive(Debug)]
pub struct Gateway {
    registry: Arc<BucketRegistry>,
    coordinator: Arc<OperationCoordinator>,
    operations: Operations,
}

impl Gateway {
    /// Build a gateway from configuration.
    ///
    /// Every configured bucket is registered; a bucket that fails to
    /// register is logged and skipped so the remaining buckets still
    /// come up.  A default bucket that fails to apply is a warning,
    /// not a fatal error.
    pub async fn from_config(config: Config) -> Result<Self, StorageError> {
        config.validate()?;

        let registry = Arc::new(BucketRegistry::new(config.stores.clone()));

        let mut registered = 0usize;
        for (name, bucket_config) in &config.buckets {
            match registry.register(name, bucket_config).await {
                Ok(()) => registered += 1,
                Err(e) => error!(bucket = %name, error = %e, "failed to register bucket"),
            }
        }

        if !config.default.is_empty() {
            if let Err(e) = registry.set_default(&config.default).await {
                warn!(bucket = %config.default, error = %e, "failed to set default bucket");
            }
        }

        info!(
            buckets = registered,
            default = %config.default,
            "gateway initialized"
        );

        let coordinator = Arc::new(OperationCoordinator::new());
        let operations = Operations::new(Arc::clone(&registry), Arc::clone(&coordinator));

        Ok(Self {
            registry,
            coordinator,
            operations,
        })
    }

    /// Register a bucket at runtime against a configured store entry.
    pub async fn register_bucket(
        &self,
        req: RegisterBucketRequest,
    ) -> Result<RegisterBucketResponse, StorageError> {
        let config = BucketConfig {
            store: req.store,
            bucket: req.bucket,
            prefix: req.prefix,
            visibility: req.visibility,
            max_concurrent_operations: req.max_concurrent_operations,
            part_size: req.part_size,
            part_concurrency: req.part_concurrency,
        };

        self.registry.register(&req.name, &config).await?;
        Ok(RegisterBucketResponse {
            success: true,
            message: format!("bucket '{}' registered", req.name),
        })
    }

    /// All registered bucket names and the current default.
    pub async fn list_buckets(&self) -> ListBucketsResponse {
        ListBucketsResponse {
            buckets: self.registry.list().await,
            default: self.registry.default_name().await.unwrap_or_default(),
        }
    }

    /// The operation surface.
    pub fn operations(&self) -> &Operations {
        &self.operations
    }

    /// The bucket registry.
    pub fn registry(&self) -> &Arc<BucketRegistry> {
        &self.registry
    }

    /// Shut the gateway down: stop admitting new operations, wait for
    /// in-flight ones to drain (up to `deadline`), then close every
    /// bucket.  Returns whether the drain completed cleanly.
    pub async fn shutdown(&self, deadline: Duration) -> bool {
        info!(in_flight = self.coordinator.in_flight(), "gateway shutting down");
        let clean = self.coordinator.shutdown(deadline).await;
        self.registry.close_all().await;
        clean
    }
}

// -- Tests --------------------------------------------------------------------
