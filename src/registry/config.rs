//! # Registry configuration.
//!
//! [`RegistryConfig`] is validated once, when the registry is built.
//!
//! ## Rules
//! - `strategy` must settle on cancellation (`Resolve` or `Reject`): entries
//!   are removed when their operation settles, so `Never` would leak them.

use crate::error::ConfigError;
use crate::signal::{CancelReason, Strategy};

use super::RegisterMode;

/// Configuration for [`OperationRegistry`](super::OperationRegistry).
///
/// ## Field semantics
/// - `default_mode`: collision policy used by `register`
/// - `strategy`: how a cancelled operation settles
/// - `replace_reason`: reason given to operations cancelled by `Replace`
/// - `clear_reason`: reason used by `clear` and `clear_all`
#[derive(Clone, Debug)]
pub struct RegistryConfig {
    /// Collision policy used when none is given.
    pub default_mode: RegisterMode,

    /// Settlement of cancelled operations.
    pub strategy: Strategy,

    /// Reason passed to an operation cancelled by [`RegisterMode::Replace`].
    pub replace_reason: CancelReason,

    /// Reason passed by `clear` and `clear_all`.
    pub clear_reason: CancelReason,
}

impl RegistryConfig {
    /// Checks the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.strategy == Strategy::Never {
            return Err(ConfigError::UnsupportedStrategy {
                strategy: self.strategy,
                why: "registry entries must settle when cancelled",
            });
        }
        Ok(())
    }
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            default_mode: RegisterMode::default(),
            strategy: Strategy::default(),
            replace_reason: CancelReason::replaced(),
            clear_reason: CancelReason::default(),
        }
    }
}
