//! # Collision policy
//!
//! The registry keeps **one** live operation per key. When a registration
//! arrives for a key that is already live, the [`RegisterMode`] decides what
//! happens.
//!
//! ## Variants
//! - `Skip`: return the live operation; the new factory is never called.
//! - `Warn`: like `Skip`, and log the collision.
//! - `Throw`: refuse with [`RegistryError::Occupied`](crate::RegistryError::Occupied).
//! - `Replace`: cancel the live operation, then run the new factory once it settled.
//! - `Queue`: run the new factory once the live operation settled, whatever its outcome.
//!
//! ## Invariants
//! - Operations under the same key never run their bodies concurrently.
//! - The map holds at most one entry per key at any time.

/// Policy applied when a key already has a live operation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum RegisterMode {
    /// Return the live operation.
    ///
    /// Use when:
    /// - Concurrent callers ask for the same result
    /// - Example: de-duplicating identical fetches
    #[default]
    Skip,

    /// Return the live operation and log a warning.
    ///
    /// Use when a collision is legal but hints at an integration bug.
    Warn,

    /// Refuse the registration.
    ///
    /// Use when a collision is always a bug.
    Throw,

    /// Cancel the live operation and run the new one after it settled.
    ///
    /// Use when:
    /// - A new request invalidates the old one
    /// - Example: search-as-you-type
    Replace,

    /// Run the new operation after the live one settled.
    ///
    /// Use when every registration must run, in order.
    Queue,
}

impl RegisterMode {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            RegisterMode::Skip => "skip",
            RegisterMode::Warn => "warn",
            RegisterMode::Throw => "throw",
            RegisterMode::Replace => "replace",
            RegisterMode::Queue => "queue",
        }
    }
}
