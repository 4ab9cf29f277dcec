//! Rolling metrics window.
//!
//! A fixed-duration, fixed-bucket-count ring of outcome counters. Each
//! bucket covers one slice of the window; buckets older than the window are
//! overwritten in place as time advances, so memory use is constant.
//!
//! The window answers one question for the circuit breaker: over the recent
//! past, how many requests ran and what fraction of them errored.

use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

/// The recorded result of one execution attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Primary call completed with a value
    Success,
    /// Primary call completed with an error
    Failure,
    /// Deadline fired before the primary call completed
    Timeout,
    /// Rejected without attempting the call (breaker open)
    ShortCircuited,
    /// Rejected because the execution bulkhead was saturated
    Rejected,
}

impl Outcome {
    /// Whether this outcome counts toward the error percentage.
    ///
    /// Short-circuited requests never reached the downstream, so they are
    /// reported separately and excluded from both the error count and the
    /// request volume.
    #[must_use]
    pub const fn is_error(self) -> bool {
        matches!(self, Self::Failure | Self::Timeout | Self::Rejected)
    }

    /// Stable label for logs and metric dimensions.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failure => "failure",
            Self::Timeout => "timeout",
            Self::ShortCircuited => "short_circuited",
            Self::Rejected => "rejected",
        }
    }
}

/// One time slice of counters.
///
/// `slot` stamps which window slice the counters belong to; a bucket whose
/// slot has fallen out of the window is zeroed on next touch.
#[derive(Debug, Clone, Copy, Default)]
struct Bucket {
    slot: u64,
    success: u64,
    failure: u64,
    timeout: u64,
    short_circuited: u64,
    rejected: u64,
}

impl Bucket {
    const fn fresh(slot: u64) -> Self {
        Self {
            slot,
            success: 0,
            failure: 0,
            timeout: 0,
            short_circuited: 0,
            rejected: 0,
        }
    }

    const fn total(&self) -> u64 {
        self.success + self.failure + self.timeout + self.rejected
    }

    const fn errors(&self) -> u64 {
        self.failure + self.timeout + self.rejected
    }
}

/// Aggregated view over the live buckets of a window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HealthSnapshot {
    /// Requests that reached the execution path (success + failure + timeout + rejected)
    pub total: u64,
    /// Requests that counted as errors (failure + timeout + rejected)
    pub error_count: u64,
    /// `error_count` as a whole percentage of `total`; 0 when the window is empty
    pub error_percentage: u32,
    /// Short-circuited requests, reported separately from the volume gate
    pub short_circuited: u64,
}

/// Fixed-duration ring buffer of outcome counters.
#[derive(Debug)]
pub struct RollingWindow {
    origin: Instant,
    bucket_len: Duration,
    num_buckets: usize,
    buckets: Mutex<Vec<Bucket>>,
}

impl RollingWindow {
    /// Create a window covering `window` split into `num_buckets` slices.
    ///
    /// `num_buckets` must be non-zero and `window` non-empty; both are
    /// enforced by configuration validation before a window is built.
    #[must_use]
    pub fn new(window: Duration, num_buckets: usize) -> Self {
        let buckets = num_buckets.max(1);
        Self {
            origin: Instant::now(),
            bucket_len: window.max(Duration::from_millis(1)) / u32::try_from(buckets).unwrap_or(u32::MAX),
            num_buckets: buckets,
            buckets: Mutex::new(vec![Bucket::default(); buckets]),
        }
    }

    /// Append one event to the bucket covering the current instant.
    pub fn record(&self, outcome: Outcome) {
        let slot = self.current_slot();
        let mut buckets = self.lock();
        let index = usize::try_from(slot).unwrap_or(usize::MAX) % self.num_buckets;
        let bucket = &mut buckets[index];
        if bucket.slot != slot {
            *bucket = Bucket::fresh(slot);
        }
        match outcome {
            Outcome::Success => bucket.success += 1,
            Outcome::Failure => bucket.failure += 1,
            Outcome::Timeout => bucket.timeout += 1,
            Outcome::ShortCircuited => bucket.short_circuited += 1,
            Outcome::Rejected => bucket.rejected += 1,
        }
    }

    /// Aggregate the buckets still inside the window.
    #[must_use]
    pub fn snapshot(&self) -> HealthSnapshot {
        let slot = self.current_slot();
        let oldest_live = slot.saturating_sub(self.num_buckets as u64 - 1);
        let buckets = self.lock();

        let mut total = 0;
        let mut error_count = 0;
        let mut short_circuited = 0;
        for bucket in buckets.iter() {
            if bucket.slot >= oldest_live && bucket.slot <= slot {
                total += bucket.total();
                error_count += bucket.errors();
                short_circuited += bucket.short_circuited;
            }
        }

        let error_percentage = if total == 0 {
            0
        } else {
            u32::try_from(error_count * 100 / total).unwrap_or(100)
        };

        HealthSnapshot {
            total,
            error_count,
            error_percentage,
            short_circuited,
        }
    }

    /// Discard all recorded history.
    ///
    /// Used when the breaker closes after a successful probe so the next
    /// trip decision starts from clean statistics.
    pub fn reset(&self) {
        let mut buckets = self.lock();
        for bucket in buckets.iter_mut() {
            *bucket = Bucket::default();
        }
    }

    fn current_slot(&self) -> u64 {
        let elapsed = self.origin.elapsed().as_nanos() / self.bucket_len.as_nanos().max(1);
        u64::try_from(elapsed).unwrap_or(u64::MAX)
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Bucket>> {
        // A poisoned counter ring is still usable; recover the guard.
        match self.buckets.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}
