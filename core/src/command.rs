//! Command execution.
//!
//! A [`Command`] wraps one downstream async call and its fallback with the
//! full protection stack: breaker admission, execution bulkhead, timeout
//! supervision, outcome recording, and fallback routing.
//!
//! Per invocation:
//!
//! 1. Ask the breaker for admission. Short-circuited requests skip straight
//!    to the fallback without touching a semaphore or the downstream.
//! 2. Take an execution permit without waiting; a saturated pool also routes
//!    to the fallback.
//! 3. Race the raw call against the deadline. The permit is released when
//!    the race settles, on every path.
//! 4. Success returns the value; the fallback is never invoked.
//! 5. Any non-success acquires a fallback permit (its own pool, no breaker,
//!    no timeout) and returns the fallback's value, or a terminal error.
//!
//! Exactly one outcome is recorded into the rolling window per attempt, and
//! fallback results never feed the breaker.
//!
//! # Example
//!
//! ```rust
//! use failguard_core::{Command, CommandRegistry, ConfigProperties};
//! use std::time::Duration;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let registry = CommandRegistry::new();
//! let config = ConfigProperties::builder()
//!     .execution_timeout(Duration::from_millis(200))
//!     .build();
//!
//! let command = Command::new(
//!     &registry,
//!     "inventory",
//!     "storefront",
//!     |sku: u32| async move { Ok::<_, String>(format!("stock for {sku}")) },
//!     |sku: u32| async move { Ok::<_, String>(format!("cached stock for {sku}")) },
//!     config,
//! )?;
//!
//! let value = command.execute(42).await?;
//! assert_eq!(value, "stock for 42");
//! # Ok(())
//! # }
//! ```

use crate::breaker::{Admission, CircuitBreaker, State};
use crate::bulkhead::Bulkhead;
use crate::config::ConfigProperties;
use crate::error::{CommandError, ConfigError, PrimaryFailure};
use crate::key::{CommandKey, GroupKey};
use crate::window::{HealthSnapshot, Outcome};
use futures::future::BoxFuture;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};

/// Type-erased caller-supplied async call.
type CallFn<I, O, E> = Arc<dyn Fn(I) -> BoxFuture<'static, Result<O, E>> + Send + Sync>;

/// Per-key shared state: the breaker (owning its window) and the two pools.
#[derive(Debug)]
struct CommandShared {
    breaker: CircuitBreaker,
    execution: Bulkhead,
    fallback: Bulkhead,
}

/// Explicit registry mapping each [`CommandKey`] to its shared state.
///
/// Cheap to clone; clones share the same map. Commands built from the same
/// registry and key share one breaker, one rolling window, and one pair of
/// bulkheads, regardless of where they were constructed.
///
/// Shared state is created lazily from the first configuration seen for a
/// key; later constructions with a different configuration reuse the
/// existing state (dynamic reconfiguration is out of scope).
#[derive(Debug, Clone, Default)]
pub struct CommandRegistry {
    inner: Arc<Mutex<HashMap<CommandKey, Arc<CommandShared>>>>,
}

impl CommandRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Breaker state for `key`, if any command has used it.
    #[must_use]
    pub fn breaker_state(&self, key: &CommandKey) -> Option<State> {
        self.lock().get(key).map(|shared| shared.breaker.state())
    }

    /// Rolling-window health for `key`, if any command has used it.
    #[must_use]
    pub fn health(&self, key: &CommandKey) -> Option<HealthSnapshot> {
        self.lock().get(key).map(|shared| shared.breaker.health())
    }

    fn shared(&self, key: &CommandKey, config: &ConfigProperties) -> Arc<CommandShared> {
        let mut map = self.lock();
        if let Some(existing) = map.get(key) {
            return Arc::clone(existing);
        }
        let shared = Arc::new(CommandShared {
            breaker: CircuitBreaker::new(key.clone(), config),
            execution: Bulkhead::new(
                format!("{key}:execution"),
                config.execution_max_concurrent,
            ),
            fallback: Bulkhead::new(format!("{key}:fallback"), config.fallback_max_concurrent),
        });
        map.insert(key.clone(), Arc::clone(&shared));
        shared
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<CommandKey, Arc<CommandShared>>> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

/// A protected downstream call.
///
/// Construction validates the configuration and binds the command to its
/// per-key shared state; [`Command::execute`] is the invocation surface.
/// Cloning is cheap and clones share everything.
pub struct Command<I, O, E> {
    command_key: CommandKey,
    group_key: GroupKey,
    config: ConfigProperties,
    shared: Arc<CommandShared>,
    raw: CallFn<I, O, E>,
    fallback: CallFn<I, O, E>,
}

impl<I, O, E> Clone for Command<I, O, E> {
    fn clone(&self) -> Self {
        Self {
            command_key: self.command_key.clone(),
            group_key: self.group_key.clone(),
            config: self.config.clone(),
            shared: Arc::clone(&self.shared),
            raw: Arc::clone(&self.raw),
            fallback: Arc::clone(&self.fallback),
        }
    }
}

impl<I, O, E> fmt::Debug for Command<I, O, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Command")
            .field("command_key", &self.command_key)
            .field("group_key", &self.group_key)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl<I, O, E> Command<I, O, E>
where
    I: Clone,
    E: fmt::Display,
{
    /// Wrap `raw` and `fallback` with the full protection stack.
    ///
    /// Commands sharing a registry and command key share breaker, window,
    /// and bulkheads; the group key is reporting-only.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the configuration is invalid. This is
    /// the only point at which configuration is checked; invocations never
    /// re-validate.
    pub fn new<R, RFut, F, FFut>(
        registry: &CommandRegistry,
        command_key: impl Into<CommandKey>,
        group_key: impl Into<GroupKey>,
        raw: R,
        fallback: F,
        config: ConfigProperties,
    ) -> Result<Self, ConfigError>
    where
        R: Fn(I) -> RFut + Send + Sync + 'static,
        RFut: Future<Output = Result<O, E>> + Send + 'static,
        F: Fn(I) -> FFut + Send + Sync + 'static,
        FFut: Future<Output = Result<O, E>> + Send + 'static,
    {
        config.validate()?;
        let command_key = command_key.into();
        let shared = registry.shared(&command_key, &config);
        Ok(Self {
            command_key,
            group_key: group_key.into(),
            config,
            shared,
            raw: Arc::new(move |input| -> BoxFuture<'static, Result<O, E>> {
                Box::pin(raw(input))
            }),
            fallback: Arc::new(move |input| -> BoxFuture<'static, Result<O, E>> {
                Box::pin(fallback(input))
            }),
        })
    }

    /// [`Command::new`] with the default configuration.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the configuration is invalid; the
    /// defaults themselves always validate.
    pub fn with_defaults<R, RFut, F, FFut>(
        registry: &CommandRegistry,
        command_key: impl Into<CommandKey>,
        group_key: impl Into<GroupKey>,
        raw: R,
        fallback: F,
    ) -> Result<Self, ConfigError>
    where
        R: Fn(I) -> RFut + Send + Sync + 'static,
        RFut: Future<Output = Result<O, E>> + Send + 'static,
        F: Fn(I) -> FFut + Send + Sync + 'static,
        FFut: Future<Output = Result<O, E>> + Send + 'static,
    {
        Self::new(
            registry,
            command_key,
            group_key,
            raw,
            fallback,
            ConfigProperties::default(),
        )
    }

    /// [`Command::with_defaults`] with the group key defaulting to the
    /// command key.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the configuration is invalid; the
    /// defaults themselves always validate.
    pub fn keyed<R, RFut, F, FFut>(
        registry: &CommandRegistry,
        command_key: impl Into<CommandKey>,
        raw: R,
        fallback: F,
    ) -> Result<Self, ConfigError>
    where
        R: Fn(I) -> RFut + Send + Sync + 'static,
        RFut: Future<Output = Result<O, E>> + Send + 'static,
        F: Fn(I) -> FFut + Send + Sync + 'static,
        FFut: Future<Output = Result<O, E>> + Send + 'static,
    {
        let command_key = command_key.into();
        let group_key = GroupKey::from(command_key.clone());
        Self::with_defaults(registry, command_key, group_key, raw, fallback)
    }

    /// The key this command's shared state is registered under.
    #[must_use]
    pub const fn command_key(&self) -> &CommandKey {
        &self.command_key
    }

    /// The reporting group this command belongs to.
    #[must_use]
    pub const fn group_key(&self) -> &GroupKey {
        &self.group_key
    }

    /// Current breaker state, for observability.
    #[must_use]
    pub fn breaker_state(&self) -> State {
        self.shared.breaker.state()
    }

    /// Execute one invocation.
    ///
    /// The returned future is the deferred-result handle: it resolves to the
    /// raw call's value, the fallback's value when the primary path failed,
    /// or a terminal [`CommandError`] when the fallback failed too.
    ///
    /// # Errors
    ///
    /// Returns [`CommandError::FallbackFailed`] or
    /// [`CommandError::FallbackRejected`]; every primary-path failure mode
    /// is absorbed by a successful fallback.
    pub async fn execute(&self, input: I) -> Result<O, CommandError<E>> {
        let admission = self.shared.breaker.admit();
        let trigger = match admission {
            Admission::Rejected => {
                self.note(Outcome::ShortCircuited);
                PrimaryFailure::ShortCircuited
            }
            Admission::Admitted | Admission::Probe => {
                let probe = matches!(admission, Admission::Probe);
                match self.primary(input.clone(), probe).await {
                    Ok(value) => return Ok(value),
                    Err(trigger) => trigger,
                }
            }
        };
        self.run_fallback(input, trigger).await
    }

    /// Run the admitted primary path: permit, deadline race, recording.
    async fn primary(&self, input: I, probe: bool) -> Result<O, PrimaryFailure<E>> {
        let Some(permit) = self.shared.execution.try_acquire() else {
            // A probe that lost the permit race never reached the
            // downstream; it carries no verdict about recovery.
            if probe {
                self.shared.breaker.abort_probe();
            }
            self.note(Outcome::Rejected);
            return Err(PrimaryFailure::Rejected);
        };

        let settled = self.supervised(input).await;
        drop(permit);

        match settled {
            Some(Ok(value)) => {
                self.note(Outcome::Success);
                if probe {
                    self.shared.breaker.on_probe_success();
                }
                Ok(value)
            }
            Some(Err(error)) => {
                self.note(Outcome::Failure);
                if probe {
                    self.shared.breaker.on_probe_failure();
                }
                Err(PrimaryFailure::Call(error))
            }
            None => {
                self.note(Outcome::Timeout);
                if probe {
                    self.shared.breaker.on_probe_failure();
                }
                Err(PrimaryFailure::Timeout(self.config.execution_timeout))
            }
        }
    }

    /// Race the raw call against the deadline; `None` means the deadline
    /// fired first and the in-flight call was dropped (cooperative
    /// cancellation, never awaited).
    async fn supervised(&self, input: I) -> Option<Result<O, E>> {
        let call = (self.raw)(input);
        if self.config.execution_timeout.is_zero() {
            return Some(call.await);
        }
        tokio::time::timeout(self.config.execution_timeout, call)
            .await
            .ok()
    }

    /// The fallback path: its own pool, no breaker, no timeout.
    async fn run_fallback(
        &self,
        input: I,
        trigger: PrimaryFailure<E>,
    ) -> Result<O, CommandError<E>> {
        tracing::warn!(
            command = %self.command_key,
            group = %self.group_key,
            trigger = %trigger,
            "primary path failed, invoking fallback"
        );

        let Some(permit) = self.shared.fallback.try_acquire() else {
            self.note_fallback("rejected");
            return Err(CommandError::FallbackRejected { trigger });
        };

        let result = (self.fallback)(input).await;
        drop(permit);

        match result {
            Ok(value) => {
                self.note_fallback("success");
                Ok(value)
            }
            Err(error) => {
                self.note_fallback("failure");
                Err(CommandError::FallbackFailed { trigger, error })
            }
        }
    }

    /// One record per execution attempt: rolling window plus facade counter.
    fn note(&self, outcome: Outcome) {
        self.shared.breaker.record(outcome);
        metrics::counter!(
            "failguard.command.outcome",
            "command" => self.command_key.as_str().to_owned(),
            "group" => self.group_key.as_str().to_owned(),
            "outcome" => outcome.as_str(),
        )
        .increment(1);
    }

    fn note_fallback(&self, result: &'static str) {
        metrics::counter!(
            "failguard.fallback.result",
            "command" => self.command_key.as_str().to_owned(),
            "group" => self.group_key.as_str().to_owned(),
            "result" => result,
        )
        .increment(1);
    }
}
