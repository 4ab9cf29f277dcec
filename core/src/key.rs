//! Command and group identity.
//!
//! A [`CommandKey`] names one logical downstream operation; every invocation
//! carrying the same key shares one circuit breaker, one rolling metrics
//! window, and one pair of isolation pools for the lifetime of the process.
//!
//! A [`GroupKey`] only groups commands for reporting (log fields and metric
//! labels). It never affects breaker state, which is always per command key.

use std::fmt;
use std::sync::Arc;

/// Identity of a logical downstream operation.
///
/// Cheap to clone (`Arc<str>` internally); many invocations share one key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CommandKey(Arc<str>);

impl CommandKey {
    /// View the key as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for CommandKey {
    fn from(value: &str) -> Self {
        Self(Arc::from(value))
    }
}

impl From<String> for CommandKey {
    fn from(value: String) -> Self {
        Self(Arc::from(value.as_str()))
    }
}

impl fmt::Display for CommandKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Reporting group shared by related commands.
///
/// Purely observational: it shows up in log fields and metric labels but has
/// no influence on breaker or bulkhead behavior.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GroupKey(Arc<str>);

impl GroupKey {
    /// View the key as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for GroupKey {
    fn from(value: &str) -> Self {
        Self(Arc::from(value))
    }
}

impl From<String> for GroupKey {
    fn from(value: String) -> Self {
        Self(Arc::from(value.as_str()))
    }
}

impl From<CommandKey> for GroupKey {
    /// Default the group to the command itself (single-command groups).
    fn from(value: CommandKey) -> Self {
        Self(value.0)
    }
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
