//! # Failguard Core
//!
//! A resilience wrapper that protects a caller from a failing or slow
//! downstream async call by combining four mechanisms:
//!
//! - **Bulkhead isolation**: bounded concurrent executions, with separate
//!   pools for the primary and fallback paths
//! - **Execution timeout**: the primary call races a deadline and the loser
//!   is dropped
//! - **Rolling-window circuit breaker**: per-command error rates over a
//!   fixed sliding window drive a Closed / Open / HalfOpen state machine
//! - **Fallback**: an alternate call invoked on any primary failure mode
//!
//! ## Control flow
//!
//! ```text
//! caller ──> Command::execute
//!              │ breaker admission ──rejected──────────────┐
//!              │ execution permit ──saturated──────────────┤
//!              │ raw call vs. deadline ──timeout/failure───┤
//!              │                                           ▼
//!              └──success──> value            fallback (own pool) ──> value
//!                                                           │
//!                                                           └─failure──> error
//! ```
//!
//! ## Example
//!
//! ```rust
//! use failguard_core::{Command, CommandRegistry};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let registry = CommandRegistry::new();
//!
//! let quote = Command::keyed(
//!     &registry,
//!     "quote-service",
//!     |symbol: String| async move { Ok::<_, String>(format!("{symbol}: 101.25")) },
//!     |symbol: String| async move { Ok(format!("{symbol}: last known 99.80")) },
//! )?;
//!
//! let price = quote.execute("ACME".to_owned()).await?;
//! assert_eq!(price, "ACME: 101.25");
//! # Ok(())
//! # }
//! ```
//!
//! Observability is ambient: state transitions and outcomes are logged via
//! `tracing` and counted through the `metrics` facade; installing an
//! exporter is the embedder's choice.

/// Circuit breaker state machine
pub mod breaker;

/// Bulkhead isolation pools
pub mod bulkhead;

/// Command execution and registry
pub mod command;

/// Per-command configuration
pub mod config;

/// Failure taxonomy
pub mod error;

/// Command and group identity
pub mod key;

/// Rolling metrics window
pub mod window;

pub use breaker::{Admission, CircuitBreaker, State};
pub use bulkhead::{Bulkhead, BulkheadPermit};
pub use command::{Command, CommandRegistry};
pub use config::{ConfigProperties, ConfigPropertiesBuilder};
pub use error::{CommandError, ConfigError, PrimaryFailure};
pub use key::{CommandKey, GroupKey};
pub use window::{HealthSnapshot, Outcome, RollingWindow};
