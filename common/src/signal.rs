use std::future::poll_fn;
use std::task::Poll;

use tokio::signal::unix::{signal, Signal, SignalKind};

/// Multiplexes any number of unix signals into a single awaitable source.
#[derive(Default)]
pub struct SignalHandler {
    signals: Vec<(SignalKind, Signal)>,
}

impl SignalHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_signal(mut self, kind: SignalKind) -> Self {
        let signal = signal(kind).expect("failed to register signal handler");
        self.signals.push((kind, signal));
        self
    }

    /// Waits for the next registered signal to arrive. Pends forever when
    /// nothing is registered.
    pub async fn recv(&mut self) -> SignalKind {
        poll_fn(|cx| {
            for (kind, signal) in self.signals.iter_mut() {
                if signal.poll_recv(cx).is_ready() {
                    return Poll::Ready(*kind);
                }
            }

            Poll::Pending
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn test_signal_handler() {
        let mut handler = SignalHandler::new()
            .with_signal(SignalKind::user_defined1())
            .with_signal(SignalKind::user_defined2());

        raise("USR1");

        let kind = tokio::time::timeout(Duration::from_secs(1), handler.recv())
            .await
            .expect("timed out waiting for signal");
        assert_eq!(kind, SignalKind::user_defined1());

        raise("USR2");

        let kind = tokio::time::timeout(Duration::from_secs(1), handler.recv())
            .await
            .expect("timed out waiting for signal");
        assert_eq!(kind, SignalKind::user_defined2());
    }

    #[tokio::test]
    async fn test_empty_handler_pends() {
        let mut handler = SignalHandler::new();

        tokio::time::timeout(Duration::from_millis(100), handler.recv())
            .await
            .expect_err("recv should pend with no registered signals");
    }

    fn raise(name: &str) {
        let status = std::process::Command::new("kill")
            .arg("-s")
            .arg(name)
            .arg(std::process::id().to_string())
            .status()
            .expect("failed to run kill");
        assert!(status.success());
    }
}
