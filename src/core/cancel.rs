//! Cooperative cancellation shared between the loop and the signal listener.
//!
//! A thin wrapper over `CancellationToken` that adds `run()`, which races an
//! operation against cancellation so a hung network call is dropped instead
//! of awaited.

use std::future::Future;

use tokio_util::sync::CancellationToken;

/// Cloneable cancellation handle
#[derive(Clone, Debug, Default)]
pub struct Cancellation {
    token: CancellationToken,
}

impl Cancellation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Signal cancellation to every clone
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolves once cancellation has been signalled
    pub async fn cancelled(&self) {
        self.token.cancelled().await
    }

    /// Run `fut` unless cancelled first. Returns `None` on cancellation.
    pub async fn run<F>(&self, fut: F) -> Option<F::Output>
    where
        F: Future,
    {
        if self.is_cancelled() {
            return None;
        }

        tokio::select! {
            biased;
            _ = self.token.cancelled() => None,
            out = fut => Some(out),
        }
    }
}
