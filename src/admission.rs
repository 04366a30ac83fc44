//! Per-bucket admission gate.
//!
//! A bounded concurrency limiter over [`tokio::sync::Semaphore`]: at
//! most `capacity` operations hold a permit at once, everyone else
//! waits.  No fairness guarantee; waiters may be admitted in any
//! order.  Closing the gate wakes all waiters with an error, which is
//! how registry teardown unblocks queued operations.

use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::errors::StorageError;

/// Bounded concurrency limiter for one bucket.
#[derive(Debug, Clone)]
pub struct AdmissionGate {
    sem: Arc<Semaphore>,
    capacity: usize,
}

/// An admitted slot.  The slot is returned when the permit is dropped,
/// on every exit path.
#[derive(Debug)]
pub struct AdmissionPermit {
    _permit: OwnedSemaphorePermit,
}

impl AdmissionGate {
    /// Create a gate with a fixed capacity.  Capacity cannot be resized
    /// without re-registering the bucket.
    pub fn new(capacity: usize) -> Self {
        Self {
            sem: Arc::new(Semaphore::new(capacity)),
            capacity,
        }
    }

    /// Wait for a slot.  Fails only if the gate has been closed.
    pub async fn acquire(&self) -> Result<AdmissionPermit, StorageError> {
        let permit = Arc::clone(&self.sem).acquire_owned().await.map_err(|_| {
            StorageError::OperationFailed {
                operation: "acquire".to_string(),
                message: "admission gate closed".to_string(),
            }
        })?;
        Ok(AdmissionPermit { _permit: permit })
    }

    /// Close the gate, waking all waiters with an error.  Outstanding
    /// permits remain valid until dropped.
    pub fn close(&self) {
        self.sem.close();
    }

    /// Slots currently free.
    pub fn available(&self) -> usize {
        self.sem.available_permits()
    }

    /// Configured capacity.
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

// -- Tests --------------------------------------------------------------------
