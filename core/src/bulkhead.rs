//! Bulkhead isolation.
//!
//! Bounds concurrent executions so one failing or slow dependency cannot
//! exhaust shared resources. Each command owns two fully independent pools:
//! one for primary executions and one for fallbacks, so a saturated primary
//! path never starves the fallback path.
//!
//! Acquisition is strictly non-blocking: there is no queue and no waiting.
//! A saturated pool rejects immediately and the caller routes the request
//! to its fallback.

use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// A bounded, non-queueing concurrency pool.
#[derive(Debug, Clone)]
pub struct Bulkhead {
    name: String,
    semaphore: Arc<Semaphore>,
    max_concurrent: usize,
}

/// A held concurrency slot.
///
/// Dropping the permit releases the slot; every acquisition path (success,
/// failure, timeout, cancellation) releases exactly once via this scope.
#[derive(Debug)]
pub struct BulkheadPermit {
    _permit: OwnedSemaphorePermit,
}

impl Bulkhead {
    /// Create a pool allowing at most `max_concurrent` simultaneous holders.
    #[must_use]
    pub fn new(name: impl Into<String>, max_concurrent: usize) -> Self {
        Self {
            name: name.into(),
            semaphore: Arc::new(Semaphore::new(max_concurrent)),
            max_concurrent,
        }
    }

    /// Try to take a slot without waiting.
    ///
    /// Returns `None` immediately when the pool is saturated.
    #[must_use]
    pub fn try_acquire(&self) -> Option<BulkheadPermit> {
        match Arc::clone(&self.semaphore).try_acquire_owned() {
            Ok(permit) => Some(BulkheadPermit { _permit: permit }),
            Err(_) => {
                tracing::debug!(bulkhead = %self.name, "bulkhead saturated, rejecting");
                None
            }
        }
    }

    /// Slots currently free.
    #[must_use]
    pub fn available_permits(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Configured concurrency bound.
    #[must_use]
    pub const fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    /// Pool name, used in log fields.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn rejects_when_saturated_and_releases_on_drop() {
        let bulkhead = Bulkhead::new("execution", 2);

        let first = bulkhead.try_acquire().unwrap();
        let second = bulkhead.try_acquire().unwrap();
        assert!(bulkhead.try_acquire().is_none());
        assert_eq!(bulkhead.available_permits(), 0);

        drop(first);
        assert_eq!(bulkhead.available_permits(), 1);
        assert!(bulkhead.try_acquire().is_some());

        drop(second);
    }

    #[test]
    fn pools_are_independent() {
        let execution = Bulkhead::new("execution", 1);
        let fallback = Bulkhead::new("fallback", 1);

        let _held = execution.try_acquire().unwrap();
        assert!(execution.try_acquire().is_none());

        // Saturating the execution pool never affects the fallback pool.
        assert!(fallback.try_acquire().is_some());
    }

    #[test]
    fn reports_configuration() {
        let bulkhead = Bulkhead::new("fallback", 7);
        assert_eq!(bulkhead.max_concurrent(), 7);
        assert_eq!(bulkhead.available_permits(), 7);
        assert_eq!(bulkhead.name(), "fallback");
    }
}
