use tokio::sync::oneshot;

/// Settles the future created by [`CancellableFuture::from_producer`](super::CancellableFuture::from_producer).
///
/// Dropping the resolver without settling leaves that future pending.
#[derive(Debug)]
pub struct Resolver<T, E> {
    tx: oneshot::Sender<Result<T, E>>,
}

impl<T, E> Resolver<T, E> {
    pub(super) fn new(tx: oneshot::Sender<Result<T, E>>) -> Self {
        Self { tx }
    }

    /// Fulfills with `value`.
    pub fn resolve(self, value: T) {
        self.settle(Ok(value));
    }

    /// Rejects with `error`.
    pub fn reject(self, error: E) {
        self.settle(Err(error));
    }

    /// Settles with either branch.
    pub fn settle(self, result: Result<T, E>) {
        // the receiving future may already be gone
        let _ = self.tx.send(result);
    }

    /// Returns `true` once nobody awaits the result any more.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}
