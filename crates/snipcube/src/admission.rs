//! Admission control for sandboxed executions
//!
//! Bounds how many sandboxes may run at once. Acquisition never waits: a
//! caller either gets a permit immediately or is told the engine is busy.

use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore, TryAcquireError};
use tracing::{debug, instrument};

/// Slot budget shared by every request routed through it
///
/// Wrap in an [`Arc`] and hand the same instance to several engines to give
/// them a shared budget, or give each engine its own.
#[derive(Debug)]
pub struct Admission {
    /// Number of slots
    capacity: usize,

    /// Semaphore holding the free slots
    semaphore: Arc<Semaphore>,
}

/// An occupied admission slot
///
/// The slot is released when the permit is dropped, whichever way the
/// owning scope exits.
#[derive(Debug)]
#[must_use = "dropping the permit releases the slot immediately"]
pub struct AdmissionPermit {
    _permit: OwnedSemaphorePermit,
}

impl Admission {
    /// Create an admission controller with `capacity` slots
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            semaphore: Arc::new(Semaphore::new(capacity)),
        }
    }

    /// Take a slot without waiting
    ///
    /// Returns `None` when every slot is in use.
    #[instrument(skip(self))]
    pub fn try_acquire(&self) -> Option<AdmissionPermit> {
        match self.semaphore.clone().try_acquire_owned() {
            Ok(permit) => {
                debug!(available = self.available(), "admitted execution");
                Some(AdmissionPermit { _permit: permit })
            }
            Err(TryAcquireError::NoPermits) => {
                debug!(capacity = self.capacity, "no admission slots left");
                None
            }
            Err(TryAcquireError::Closed) => None,
        }
    }

    /// Get the number of free slots
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Get the total number of slots
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for Admission {
    fn default() -> Self {
        Self::new(1)
    }
}
