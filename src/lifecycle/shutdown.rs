//! Shutdown coordination for the service.

use tokio_util::sync::CancellationToken;

/// Coordinator for graceful shutdown.
///
/// Wraps a root cancellation token; long-running tasks subscribe to child
/// tokens so they can also be stopped on their own.
#[derive(Debug, Clone, Default)]
pub struct Shutdown {
    token: CancellationToken,
}

impl Shutdown {
    /// Create a new shutdown coordinator.
    pub fn new() -> Self {
        Self::default()
    }

    /// A token cancelled when shutdown is triggered.
    pub fn subscribe(&self) -> CancellationToken {
        self.token.child_token()
    }

    /// Trigger the shutdown signal. Idempotent.
    pub fn trigger(&self) {
        self.token.cancel();
    }

    pub fn is_triggered(&self) -> bool {
        self.token.is_cancelled()
    }
}
