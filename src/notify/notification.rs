use std::sync::Arc;

/// Immutable `{name, value}` pair carried through a [`NotificationChannel`](super::NotificationChannel).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification<V> {
    name: Arc<str>,
    value: V,
}

impl<V> Notification<V> {
    /// Creates a notification.
    pub fn new(name: impl Into<Arc<str>>, value: V) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }

    /// Channel name this notification was dispatched under.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Payload.
    pub fn value(&self) -> &V {
        &self.value
    }

    /// Consumes the notification and returns its payload.
    pub fn into_value(self) -> V {
        self.value
    }
}
