//! Operation coordinator: in-flight tracking and graceful shutdown.
//!
//! Every caller-visible operation is bracketed by an [`OperationGuard`]
//! obtained from [`OperationCoordinator::begin`].  At shutdown the
//! coordinator raises its cancellation token, then waits for the
//! in-flight count to drain to zero or a deadline to pass, whichever
//! comes first.  The coordinator is not reusable after shutdown.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};
use tracing::{debug, warn};

use crate::errors::StorageError;

/// Tracks in-flight operations and carries the shutdown signal.
#[derive(Debug)]
pub struct OperationCoordinator {
    in_flight: AtomicU64,
    cancel: CancellationToken,
    drained: Notify,
}

/// RAII bracket for one in-flight operation.  Dropping the guard
/// decrements the counter and, at zero, wakes the drain waiter.
#[derive(Debug)]
pub struct OperationGuard {
    coordinator: Arc<OperationCoordinator>,
}

impl OperationCoordinator {
    pub fn new() -> Self {
        Self {
            in_flight: AtomicU64::new(0),
            cancel: CancellationToken::new(),
            drained: Notify::new(),
        }
    }

    /// Mark an operation in-flight.  Fails once shutdown has been
    /// signalled so callers abandon work they have not started.
    pub fn begin(self: &Arc<Self>, operation: &str) -> Result<OperationGuard, StorageError> {
        if self.cancel.is_cancelled() {
            return Err(StorageError::OperationFailed {
                operation: operation.to_string(),
                message: "gateway is shutting down".to_string(),
            });
        }

        self.in_flight.fetch_add(1, Ordering::AcqRel);
        Ok(OperationGuard {
            coordinator: Arc::clone(self),
        })
    }

    /// A future that resolves when shutdown has been signalled; used to
    /// race admission waits against cancellation.
    pub fn cancelled(&self) -> WaitForCancellationFuture<'_> {
        self.cancel.cancelled()
    }

    /// Whether shutdown has been signalled.
    pub fn is_shutting_down(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Current number of in-flight operations.
    pub fn in_flight(&self) -> u64 {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Signal cancellation, then wait for in-flight operations to
    /// drain or for `deadline` to pass.  Returns `true` on a clean
    /// drain; on deadline expiry logs a forced stop and returns
    /// `false` so the caller can tear down resources anyway.
    pub async fn shutdown(&self, deadline: Duration) -> bool {
        self.cancel.cancel();

        match tokio::time::timeout(deadline, self.drained()).await {
            Ok(()) => {
                debug!("all in-flight operations completed");
                true
            }
            Err(_) => {
                warn!(
                    in_flight = self.in_flight(),
                    "shutdown deadline reached, forcing stop"
                );
                false
            }
        }
    }

    async fn drained(&self) {
        loop {
            // Register before checking so a decrement between the check
            // and the await cannot be missed.
            let notified = self.drained.notified();
            if self.in_flight.load(Ordering::Acquire) == 0 {
                return;
            }
            notified.await;
        }
    }
}

impl Default for OperationCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for OperationGuard {
    fn drop(&mut self) {
        if self.coordinator.in_flight.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.coordinator.drained.notify_waiters();
        }
    }
}

// -- Tests --------------------------------------------------------------------
