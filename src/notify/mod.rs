//! # Named notification channels
//!
//! [`NotificationChannel`] adds a *name* dimension on top of the
//! [kernel](crate::kernel): each dispatched value travels as a
//! [`Notification`] `{name, value}` and listeners subscribe per name.
//!
//! ## Architecture
//! ```text
//! dispatch(name, value)
//!      │  Arc<Notification> allocated once
//!      ▼
//!  [channel FIFO] ──► buckets[name] : Emitter ──► named listeners  (receive &value)
//!                 └─► raw          : Emitter ──► raw listeners    (receive &Notification)
//! ```
//!
//! ## Rules
//! - Named listeners run before raw listeners for the same notification.
//! - A dispatch issued while the channel is delivering is queued behind it.
//! - Empty name buckets are dropped by the kernel's last-detach hook.

mod channel;
mod notification;

pub use channel::{Listener, NotificationChannel};
pub use notification::Notification;
