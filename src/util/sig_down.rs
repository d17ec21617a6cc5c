use tokio::signal::unix::{SignalKind, signal};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

/// Cancels a token on the first SIGTERM or SIGINT.
///
/// Long-running commands (blocking lookups, confirmation waits) select on the token and
/// return `Cancelled` instead of being killed mid-request.
pub struct SigDown {
    tracker: TaskTracker,
    token: CancellationToken,
}

impl SigDown {
    pub fn try_new() -> Result<Self, std::io::Error> {
        let mut sigterm = signal(SignalKind::terminate())?;
        let mut sigint = signal(SignalKind::interrupt())?;
        let token = CancellationToken::new();
        let tracker = TaskTracker::new();
        let cancel = token.clone();
        tracker.spawn(async move {
            let name = tokio::select! {
                _ = sigterm.recv() => "SIGTERM",
                _ = sigint.recv() => "SIGINT",
                _ = cancel.cancelled() => return,
            };
            tracing::info!(signal = name, "Shutting down");
            cancel.cancel();
        });
        tracker.close();
        Ok(Self { tracker, token })
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Stops listening for signals and waits for the listener to exit.
    pub async fn shutdown(self) {
        self.token.cancel();
        self.tracker.wait().await;
    }
}
