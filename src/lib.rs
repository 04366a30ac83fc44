//! StoreGate — embeddable object-storage gateway.
//!
//! This crate provides the components for fronting S3-compatible
//! object stores behind a typed operation surface: a bucket registry
//! with per-bucket admission control, an operation coordinator for
//! graceful drain-to-shutdown, and a composite move operation with
//! explicit partial-failure semantics.

pub mod admission;
pub mod api;
pub mod config;
pub mod coordinator;
pub mod errors;
pub mod gateway;
pub mod metrics;
pub mod operations;
pub mod registry;
pub mod store;
pub mod validate;

pub use admission::{AdmissionGate, AdmissionPermit};
pub use config::{load_config, Config};
pub use coordinator::{OperationCoordinator, OperationGuard};
pub use errors::{ErrorPayload, StorageError};
pub use gateway::Gateway;
pub use operations::Operations;
pub use registry::{Bucket, BucketRegistry};
pub use store::ObjectStore;
