use std::sync::Arc;

use tokio::sync::{broadcast, oneshot};

/// A cancellation pair used for graceful shutdown.
///
/// Tasks hold a cheaply cloneable [`Context`] and await [`Context::done`].
/// The owning [`Handler`] cancels all of them at once and can wait until
/// every clone has been dropped before letting the process exit.
struct RawContext {
    _alive: oneshot::Sender<()>,
    cancelled: broadcast::Receiver<()>,
}

#[derive(Clone)]
pub struct Context(Arc<RawContext>);

pub struct Handler {
    drained: oneshot::Receiver<()>,
    cancel: broadcast::Sender<()>,
}

impl Context {
    #[must_use]
    pub fn new() -> (Self, Handler) {
        let (alive, drained) = oneshot::channel();
        let (cancel, cancelled) = broadcast::channel(1);

        (
            Self(Arc::new(RawContext {
                _alive: alive,
                cancelled,
            })),
            Handler { drained, cancel },
        )
    }

    /// Resolves once the handler has been cancelled.
    pub async fn done(&self) {
        let mut cancelled = self.0.cancelled.resubscribe();

        // The sender being dropped is the cancellation signal.
        let _ = cancelled.recv().await;
    }
}

impl Handler {
    /// Resolves once every `Context` clone has been dropped.
    pub async fn done(&mut self) {
        let _ = (&mut self.drained).await;
    }

    /// Cancels all contexts and waits for their holders to drop them.
    pub async fn cancel(self) {
        drop(self.cancel);

        let _ = self.drained.await;
    }
}

#[cfg(test)]
mod tests;
