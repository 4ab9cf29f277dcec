//! Failure taxonomy.
//!
//! Every way the primary path can fail ([`PrimaryFailure`]) routes into the
//! fallback; the caller only sees an error ([`CommandError`]) when the
//! fallback itself fails or is bulkhead-rejected. There is no
//! fallback-of-fallback and no automatic retry; retries, if desired, are the
//! caller's responsibility.
//!
//! Configuration problems surface as [`ConfigError`] at command
//! construction, never at invocation time.

use std::time::Duration;
use thiserror::Error;

/// Rejected configuration, raised when a command is constructed.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// Execution concurrency bound was zero
    #[error("execution concurrency bound must be at least 1")]
    ExecutionBound,
    /// Fallback concurrency bound was zero
    #[error("fallback concurrency bound must be at least 1")]
    FallbackBound,
    /// Error threshold outside 0-100
    #[error("error threshold percentage must be within 0-100, got {0}")]
    Threshold(u32),
    /// Rolling window configured with zero buckets
    #[error("rolling window must have at least one bucket")]
    NoBuckets,
    /// Rolling window configured with zero duration
    #[error("rolling window duration must be non-zero")]
    EmptyWindow,
}

/// Why the primary path produced no value.
///
/// All variants feed identically into the fallback; the variant is carried
/// as context on the terminal [`CommandError`] when the fallback also fails.
#[derive(Error, Debug)]
pub enum PrimaryFailure<E> {
    /// The supplied downstream call completed with an error
    #[error("downstream call failed: {0}")]
    Call(E),
    /// The deadline fired before the downstream call completed
    #[error("execution timed out after {0:?}")]
    Timeout(Duration),
    /// The circuit breaker was open (or a half-open probe was in flight)
    #[error("short-circuited: circuit breaker is open")]
    ShortCircuited,
    /// The execution bulkhead was saturated
    #[error("execution bulkhead saturated")]
    Rejected,
}

impl<E> PrimaryFailure<E> {
    /// Whether this failure is a breaker short-circuit.
    #[must_use]
    pub const fn is_short_circuit(&self) -> bool {
        matches!(self, Self::ShortCircuited)
    }

    /// Whether this failure is a timeout.
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }

    /// Whether this failure is an execution bulkhead rejection.
    #[must_use]
    pub const fn is_rejection(&self) -> bool {
        matches!(self, Self::Rejected)
    }
}

/// Terminal, caller-visible failure of one invocation.
///
/// Only produced when the fallback path could not deliver a value; a
/// successful fallback converts any [`PrimaryFailure`] into an `Ok`.
#[derive(Error, Debug)]
pub enum CommandError<E> {
    /// The fallback call itself completed with an error
    #[error("fallback failed after primary failure ({trigger}): {error}")]
    FallbackFailed {
        /// What sent the invocation down the fallback path
        trigger: PrimaryFailure<E>,
        /// The fallback's own error
        error: E,
    },
    /// The fallback bulkhead was saturated
    #[error("fallback bulkhead saturated after primary failure ({trigger})")]
    FallbackRejected {
        /// What sent the invocation down the fallback path
        trigger: PrimaryFailure<E>,
    },
}

impl<E> CommandError<E> {
    /// The primary-path failure that sent this invocation to the fallback.
    #[must_use]
    pub const fn trigger(&self) -> &PrimaryFailure<E> {
        match self {
            Self::FallbackFailed { trigger, .. } | Self::FallbackRejected { trigger } => trigger,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_carry_the_trigger() {
        let error: CommandError<String> = CommandError::FallbackRejected {
            trigger: PrimaryFailure::Timeout(Duration::from_millis(200)),
        };
        let message = error.to_string();
        assert!(message.contains("fallback bulkhead saturated"));
        assert!(message.contains("timed out"));
        assert!(error.trigger().is_timeout());
    }

    #[test]
    fn fallback_failures_keep_both_errors() {
        let error: CommandError<String> = CommandError::FallbackFailed {
            trigger: PrimaryFailure::Call("boom".to_owned()),
            error: "fallback boom".to_owned(),
        };
        let message = error.to_string();
        assert!(message.contains("boom"));
        assert!(message.contains("fallback boom"));
        assert!(!error.trigger().is_short_circuit());
    }
}
