//! # Settlement of cancellable work.
//!
//! A wrapped future settles into an [`Outcome`]. When cancellation wins and no
//! explicit handler exists, the [`Strategy`] decides the shape of that outcome:
//!
//! ```text
//!   Strategy::Resolve ──► Outcome::Dismissed          (settled, no value)
//!   Strategy::Reject  ──► Outcome::Aborted(reason)    (settled with the reason)
//!   Strategy::Never   ──► (stays pending forever)
//! ```

use super::CancelReason;

/// How a cancellable future settles when its signal wins the race.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Strategy {
    /// Settle without a value ([`Outcome::Dismissed`]).
    Resolve,
    /// Settle with the cancellation reason ([`Outcome::Aborted`]).
    #[default]
    Reject,
    /// Never settle.
    Never,
}

impl Strategy {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            Strategy::Resolve => "resolve",
            Strategy::Reject => "reject",
            Strategy::Never => "never",
        }
    }

    /// Outcome produced for a cancellation, or `None` for [`Strategy::Never`].
    pub fn settle<T, E>(self, reason: CancelReason) -> Option<Outcome<T, E>> {
        match self {
            Strategy::Resolve => Some(Outcome::Dismissed),
            Strategy::Reject => Some(Outcome::Aborted(reason)),
            Strategy::Never => None,
        }
    }
}

/// Final state of a cancellable future.
///
/// `Value`/`Error` come from the wrapped future; `Dismissed`/`Aborted` come
/// from cancellation. Cancellation is never reported as `Error`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outcome<T, E> {
    /// Inner future fulfilled.
    Value(T),
    /// Inner future rejected.
    Error(E),
    /// Cancelled under [`Strategy::Resolve`].
    Dismissed,
    /// Cancelled under [`Strategy::Reject`].
    Aborted(CancelReason),
}

impl<T, E> Outcome<T, E> {
    /// `true` for `Value`.
    pub fn is_value(&self) -> bool {
        matches!(self, Outcome::Value(_))
    }

    /// `true` for `Error`.
    pub fn is_error(&self) -> bool {
        matches!(self, Outcome::Error(_))
    }

    /// `true` when settled by cancellation (`Dismissed` or `Aborted`).
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Outcome::Dismissed | Outcome::Aborted(_))
    }

    /// Fulfillment value, if any.
    pub fn value(self) -> Option<T> {
        match self {
            Outcome::Value(v) => Some(v),
            _ => None,
        }
    }

    /// Rejection error, if any.
    pub fn error(self) -> Option<E> {
        match self {
            Outcome::Error(e) => Some(e),
            _ => None,
        }
    }

    /// Cancellation reason, if settled under [`Strategy::Reject`].
    pub fn reason(&self) -> Option<&CancelReason> {
        match self {
            Outcome::Aborted(r) => Some(r),
            _ => None,
        }
    }

    /// Maps the fulfillment value.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U, E> {
        match self {
            Outcome::Value(v) => Outcome::Value(f(v)),
            Outcome::Error(e) => Outcome::Error(e),
            Outcome::Dismissed => Outcome::Dismissed,
            Outcome::Aborted(r) => Outcome::Aborted(r),
        }
    }

    /// Maps the rejection error.
    pub fn map_err<E2>(self, f: impl FnOnce(E) -> E2) -> Outcome<T, E2> {
        match self {
            Outcome::Value(v) => Outcome::Value(v),
            Outcome::Error(e) => Outcome::Error(f(e)),
            Outcome::Dismissed => Outcome::Dismissed,
            Outcome::Aborted(r) => Outcome::Aborted(r),
        }
    }

    /// Splits into `Ok(value)` or `Err(rest)` where `rest` carries no value.
    pub(crate) fn split(self) -> Result<T, Outcome<std::convert::Infallible, E>> {
        match self {
            Outcome::Value(v) => Ok(v),
            Outcome::Error(e) => Err(Outcome::Error(e)),
            Outcome::Dismissed => Err(Outcome::Dismissed),
            Outcome::Aborted(r) => Err(Outcome::Aborted(r)),
        }
    }
}

impl<E> Outcome<std::convert::Infallible, E> {
    /// Re-types a value-less outcome.
    pub(crate) fn widen<T>(self) -> Outcome<T, E> {
        match self {
            Outcome::Value(never) => match never {},
            Outcome::Error(e) => Outcome::Error(e),
            Outcome::Dismissed => Outcome::Dismissed,
            Outcome::Aborted(r) => Outcome::Aborted(r),
        }
    }
}

impl<T, E> From<Result<T, E>> for Outcome<T, E> {
    fn from(r: Result<T, E>) -> Self {
        match r {
            Ok(v) => Outcome::Value(v),
            Err(e) => Outcome::Error(e),
        }
    }
}
