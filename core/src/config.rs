//! Command configuration.
//!
//! [`ConfigProperties`] is an immutable snapshot taken once per call site.
//! It is validated when a command is constructed, never at invocation time,
//! and never mutated while a command is in flight.
//!
//! # Default Values
//!
//! The defaults mirror Hystrix:
//!
//! - `execution_max_concurrent`: 10
//! - `fallback_max_concurrent`: 10
//! - `execution_timeout`: 1000ms (zero disables the timeout)
//! - `sleep_window`: 5000ms
//! - `error_threshold_percentage`: 50
//! - `minimum_request_volume`: 20
//! - `rolling_window`: 10 seconds split into 10 buckets

use crate::error::ConfigError;
use std::time::Duration;

/// Immutable per-command configuration snapshot.
#[derive(Debug, Clone)]
pub struct ConfigProperties {
    /// Maximum concurrent primary executions (bulkhead bound, >= 1)
    pub execution_max_concurrent: usize,
    /// Maximum concurrent fallback executions (independent pool, >= 1)
    pub fallback_max_concurrent: usize,
    /// Deadline for the primary call; `Duration::ZERO` disables the timeout
    pub execution_timeout: Duration,
    /// How long an open breaker sleeps before admitting a single probe
    pub sleep_window: Duration,
    /// Error percentage (0-100) at which the breaker trips
    pub error_threshold_percentage: u32,
    /// Minimum request volume in the rolling window before the breaker may trip
    pub minimum_request_volume: u64,
    /// Total duration covered by the rolling metrics window
    pub rolling_window: Duration,
    /// Number of buckets the rolling window is sliced into
    pub rolling_window_buckets: usize,
}

impl Default for ConfigProperties {
    fn default() -> Self {
        Self {
            execution_max_concurrent: 10,
            fallback_max_concurrent: 10,
            execution_timeout: Duration::from_millis(1000),
            sleep_window: Duration::from_millis(5000),
            error_threshold_percentage: 50,
            minimum_request_volume: 20,
            rolling_window: Duration::from_secs(10),
            rolling_window_buckets: 10,
        }
    }
}

impl ConfigProperties {
    /// Create a new configuration builder.
    #[must_use]
    pub const fn builder() -> ConfigPropertiesBuilder {
        ConfigPropertiesBuilder {
            execution_max_concurrent: None,
            fallback_max_concurrent: None,
            execution_timeout: None,
            sleep_window: None,
            error_threshold_percentage: None,
            minimum_request_volume: None,
            rolling_window: None,
            rolling_window_buckets: None,
        }
    }

    /// Check the snapshot for nonsensical values.
    ///
    /// Called at command construction so a bad configuration fails fast,
    /// before any invocation runs.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if a concurrency bound is zero, the error
    /// threshold exceeds 100, or the rolling window is degenerate.
    pub const fn validate(&self) -> Result<(), ConfigError> {
        if self.execution_max_concurrent == 0 {
            return Err(ConfigError::ExecutionBound);
        }
        if self.fallback_max_concurrent == 0 {
            return Err(ConfigError::FallbackBound);
        }
        if self.error_threshold_percentage > 100 {
            return Err(ConfigError::Threshold(self.error_threshold_percentage));
        }
        if self.rolling_window_buckets == 0 {
            return Err(ConfigError::NoBuckets);
        }
        if self.rolling_window.is_zero() {
            return Err(ConfigError::EmptyWindow);
        }
        Ok(())
    }
}

/// Builder for [`ConfigProperties`].
#[derive(Debug, Clone)]
pub struct ConfigPropertiesBuilder {
    execution_max_concurrent: Option<usize>,
    fallback_max_concurrent: Option<usize>,
    execution_timeout: Option<Duration>,
    sleep_window: Option<Duration>,
    error_threshold_percentage: Option<u32>,
    minimum_request_volume: Option<u64>,
    rolling_window: Option<Duration>,
    rolling_window_buckets: Option<usize>,
}

impl ConfigPropertiesBuilder {
    /// Set the execution bulkhead bound.
    #[must_use]
    pub const fn execution_max_concurrent(mut self, bound: usize) -> Self {
        self.execution_max_concurrent = Some(bound);
        self
    }

    /// Set the fallback bulkhead bound.
    #[must_use]
    pub const fn fallback_max_concurrent(mut self, bound: usize) -> Self {
        self.fallback_max_concurrent = Some(bound);
        self
    }

    /// Set the primary-call deadline. `Duration::ZERO` disables it.
    #[must_use]
    pub const fn execution_timeout(mut self, deadline: Duration) -> Self {
        self.execution_timeout = Some(deadline);
        self
    }

    /// Set how long an open breaker sleeps before probing.
    #[must_use]
    pub const fn sleep_window(mut self, window: Duration) -> Self {
        self.sleep_window = Some(window);
        self
    }

    /// Set the error percentage (0-100) at which the breaker trips.
    #[must_use]
    pub const fn error_threshold_percentage(mut self, percentage: u32) -> Self {
        self.error_threshold_percentage = Some(percentage);
        self
    }

    /// Set the request volume required before the breaker may trip.
    #[must_use]
    pub const fn minimum_request_volume(mut self, volume: u64) -> Self {
        self.minimum_request_volume = Some(volume);
        self
    }

    /// Set the rolling metrics window duration.
    #[must_use]
    pub const fn rolling_window(mut self, window: Duration) -> Self {
        self.rolling_window = Some(window);
        self
    }

    /// Set the number of buckets in the rolling window.
    #[must_use]
    pub const fn rolling_window_buckets(mut self, buckets: usize) -> Self {
        self.rolling_window_buckets = Some(buckets);
        self
    }

    /// Build the configuration, filling unset fields with defaults.
    #[must_use]
    pub fn build(self) -> ConfigProperties {
        let defaults = ConfigProperties::default();
        ConfigProperties {
            execution_max_concurrent: self
                .execution_max_concurrent
                .unwrap_or(defaults.execution_max_concurrent),
            fallback_max_concurrent: self
                .fallback_max_concurrent
                .unwrap_or(defaults.fallback_max_concurrent),
            execution_timeout: self.execution_timeout.unwrap_or(defaults.execution_timeout),
            sleep_window: self.sleep_window.unwrap_or(defaults.sleep_window),
            error_threshold_percentage: self
                .error_threshold_percentage
                .unwrap_or(defaults.error_threshold_percentage),
            minimum_request_volume: self
                .minimum_request_volume
                .unwrap_or(defaults.minimum_request_volume),
            rolling_window: self.rolling_window.unwrap_or(defaults.rolling_window),
            rolling_window_buckets: self
                .rolling_window_buckets
                .unwrap_or(defaults.rolling_window_buckets),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_fills_defaults() {
        let config = ConfigProperties::builder()
            .execution_timeout(Duration::from_millis(200))
            .build();

        assert_eq!(config.execution_timeout, Duration::from_millis(200));
        assert_eq!(config.execution_max_concurrent, 10);
        assert_eq!(config.error_threshold_percentage, 50);
        assert_eq!(config.minimum_request_volume, 20);
        assert_eq!(config.rolling_window_buckets, 10);
    }

    #[test]
    fn defaults_are_valid() {
        assert!(ConfigProperties::default().validate().is_ok());
    }

    #[test]
    fn zero_concurrency_is_rejected() {
        let config = ConfigProperties::builder()
            .execution_max_concurrent(0)
            .build();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ExecutionBound)
        ));

        let config = ConfigProperties::builder()
            .fallback_max_concurrent(0)
            .build();
        assert!(matches!(config.validate(), Err(ConfigError::FallbackBound)));
    }

    #[test]
    fn threshold_above_100_is_rejected() {
        let config = ConfigProperties::builder()
            .error_threshold_percentage(101)
            .build();
        assert!(matches!(config.validate(), Err(ConfigError::Threshold(101))));
    }

    #[test]
    fn degenerate_window_is_rejected() {
        let config = ConfigProperties::builder().rolling_window_buckets(0).build();
        assert!(matches!(config.validate(), Err(ConfigError::NoBuckets)));

        let config = ConfigProperties::builder()
            .rolling_window(Duration::ZERO)
            .build();
        assert!(matches!(config.validate(), Err(ConfigError::EmptyWindow)));
    }

    #[test]
    fn zero_timeout_means_disabled_and_is_valid() {
        let config = ConfigProperties::builder()
            .execution_timeout(Duration::ZERO)
            .build();
        assert!(config.validate().is_ok());
        assert!(config.execution_timeout.is_zero());
    }
}
