//! Error types used by cancelvisor.
//!
//! This module defines three error enums:
//!
//! - [`TransitionError`]: a task control method called from an illegal state.
//! - [`RegistryError`]: a registration refused by the operation registry.
//! - [`ConfigError`]: invalid construction options.
//!
//! Cancellation is never one of these: it is reported as
//! [`Outcome::Aborted`](crate::Outcome::Aborted) or
//! [`Outcome::Dismissed`](crate::Outcome::Dismissed).
//!
//! All types provide helper methods (`as_label`, `as_message`) for logging.

use thiserror::Error;

use crate::signal::Strategy;
use crate::task::TaskState;

/// # Illegal task state transition.
///
/// Calling a task control method from a state that does not allow it is a
/// programmer error. It is reported to the caller, never silently ignored.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransitionError {
    /// `op` is not legal while the task is in `from`.
    #[error("cannot {op} a task in state {from}")]
    Illegal {
        /// The rejected operation (`start`, `pause`, `next`, ...).
        op: &'static str,
        /// The state the task was in.
        from: TaskState,
    },
}

impl TransitionError {
    pub(crate) fn illegal(op: &'static str, from: TaskState) -> Self {
        TransitionError::Illegal { op, from }
    }

    /// Returns a short stable label (snake_case) for use in logs.
    ///
    /// # Example
    /// ```
    /// use cancelvisor::{TaskState, TransitionError};
    ///
    /// let err = TransitionError::Illegal { op: "pause", from: TaskState::Await };
    /// assert_eq!(err.as_label(), "task_illegal_transition");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            TransitionError::Illegal { .. } => "task_illegal_transition",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            TransitionError::Illegal { op, from } => format!("illegal {op} from {from}"),
        }
    }
}

/// # Registration refused by the operation registry.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// The key already has a live entry and the mode was `Throw`.
    #[error("key {key} already has a live operation")]
    Occupied {
        /// Debug rendering of the colliding key.
        key: String,
    },
}

impl RegistryError {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            RegistryError::Occupied { .. } => "registry_key_occupied",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            RegistryError::Occupied { key } => format!("occupied: {key}"),
        }
    }
}

/// # Invalid construction options.
///
/// Reported synchronously by constructors, never deferred into a future.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// The strategy would leave cancelled work pending forever.
    #[error("strategy {strategy:?} is not allowed here: {why}")]
    UnsupportedStrategy {
        /// The rejected strategy.
        strategy: Strategy,
        /// Why it is rejected.
        why: &'static str,
    },
}

impl ConfigError {
    /// Returns a short stable label (snake_case) for use in logs.
    ///
    /// # Example
    /// ```
    /// use cancelvisor::{ConfigError, Strategy};
    ///
    /// let err = ConfigError::UnsupportedStrategy { strategy: Strategy::Never, why: "x" };
    /// assert_eq!(err.as_label(), "config_unsupported_strategy");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            ConfigError::UnsupportedStrategy { .. } => "config_unsupported_strategy",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            ConfigError::UnsupportedStrategy { strategy, why } => {
                format!("unsupported strategy {}: {why}", strategy.as_label())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_labels_are_stable() {
        let t = TransitionError::illegal("start", TaskState::Run);
        assert_eq!(t.as_label(), "task_illegal_transition");
        assert_eq!(t.to_string(), "cannot start a task in state run");
        assert_eq!(t.as_message(), "illegal start from run");

        let r = RegistryError::Occupied { key: "\"k\"".into() };
        assert_eq!(r.as_label(), "registry_key_occupied");

        let c = ConfigError::UnsupportedStrategy {
            strategy: Strategy::Never,
            why: "entries must settle",
        };
        assert_eq!(c.as_message(), "unsupported strategy never: entries must settle");
    }
}
