use std::fmt;
use std::sync::Arc;

/// Why a [`Signal`](super::Signal) was cancelled.
///
/// Cheap to clone; compares equal to string slices carrying the same text.
///
/// # Example
/// ```
/// use cancelvisor::CancelReason;
///
/// let r = CancelReason::from("shutdown");
/// assert_eq!(r, "shutdown");
/// assert_eq!(CancelReason::default().as_str(), "Cancelled");
/// ```
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct CancelReason(Arc<str>);

impl CancelReason {
    /// Creates a reason from any string-like message.
    pub fn new(message: impl Into<Arc<str>>) -> Self {
        Self(message.into())
    }

    /// Reason used when a registry entry is superseded by a newer registration.
    pub fn replaced() -> Self {
        Self::new("Replaced")
    }

    /// Reason used by timeout helpers when the timer wins.
    pub fn timeout() -> Self {
        Self::new("Timeout")
    }

    /// Message text.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for CancelReason {
    fn default() -> Self {
        Self::new("Cancelled")
    }
}

impl fmt::Display for CancelReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for CancelReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CancelReason({:?})", &*self.0)
    }
}

impl From<&str> for CancelReason {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for CancelReason {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<&CancelReason> for CancelReason {
    fn from(r: &CancelReason) -> Self {
        r.clone()
    }
}

impl PartialEq<str> for CancelReason {
    fn eq(&self, other: &str) -> bool {
        &*self.0 == other
    }
}

impl PartialEq<&str> for CancelReason {
    fn eq(&self, other: &&str) -> bool {
        &*self.0 == *other
    }
}
