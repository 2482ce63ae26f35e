//! # Keyed registry of cancellable operations.
//!
//! - [`OperationRegistry`] - single-flight operations per key
//! - [`Operation`] - shared handle to a registered operation
//! - [`RegisterMode`] - collision policy
//! - [`RegistryConfig`] - defaults and reasons
//! - [`Activable`], [`Activation`] - activation-lifecycle resources

mod activable;
mod config;
mod mode;
mod operation;
#[allow(clippy::module_inception)]
mod registry;

pub use activable::{Activable, Activation, HookResult};
pub use config::RegistryConfig;
pub use mode::RegisterMode;
pub use operation::Operation;
pub use registry::OperationRegistry;
