//! The run's shutdown controller (§4.9): one SIGINT/SIGTERM requests a
//! graceful stop at the next batch boundary and starts a deadline timer; a
//! second signal (or the deadline firing) cancels the token every in-flight
//! trial races against, hard-aborting in-flight I/O.
//!
//! `CancellationToken` threads through every in-flight call via a
//! select-against-cancellation shape, adapted from a per-tool-call token to
//! one shared per-run token with a deadline escalation.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

pub const DEFAULT_DEADLINE_MS: u64 = 30_000;

pub struct ShutdownController {
    requested: AtomicBool,
    token: CancellationToken,
    deadline_ms: u64,
}

impl ShutdownController {
    pub fn new(deadline_ms: u64) -> Arc<Self> {
        Arc::new(Self {
            requested: AtomicBool::new(false),
            token: CancellationToken::new(),
            deadline_ms,
        })
    }

    pub fn is_requested(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }

    /// A clone of the shared token; every in-flight trial races it.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Records a SIGINT/SIGTERM. The first call starts the deadline timer;
    /// any later call (the "second signal") cancels the token immediately,
    /// treating the deadline as already expired.
    pub fn request(self: &Arc<Self>) {
        let already_requested = self.requested.swap(true, Ordering::SeqCst);
        if already_requested {
            self.token.cancel();
            return;
        }
        let this = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(this.deadline_ms)).await;
            this.token.cancel();
        });
    }

    /// Listens for SIGINT/SIGTERM for the run's lifetime, forwarding each to
    /// `request`. Intended to run as a background task alongside the batch
    /// loop; the caller aborts it once the run finishes.
    pub async fn listen(self: Arc<Self>) {
        #[cfg(unix)]
        {
            let mut sigterm = match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(signal) => signal,
                Err(err) => {
                    tracing::warn!(target: "arbiter.orchestrator", %err, "failed to install SIGTERM handler, falling back to SIGINT only");
                    loop {
                        if tokio::signal::ctrl_c().await.is_ok() {
                            self.request();
                        }
                    }
                }
            };
            loop {
                tokio::select! {
                    result = tokio::signal::ctrl_c() => {
                        if result.is_ok() {
                            self.request();
                        }
                    }
                    _ = sigterm.recv() => {
                        self.request();
                    }
                }
            }
        }
        #[cfg(not(unix))]
        {
            loop {
                if tokio::signal::ctrl_c().await.is_ok() {
                    self.request();
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn second_request_cancels_immediately_without_waiting_for_deadline() {
        let shutdown = ShutdownController::new(60_000);
        shutdown.request();
        assert!(!shutdown.token().is_cancelled());
        shutdown.request();
        assert!(shutdown.token().is_cancelled());
        assert!(shutdown.is_requested());
    }

    #[tokio::test]
    async fn deadline_cancels_the_token_on_its_own() {
        let shutdown = ShutdownController::new(10);
        shutdown.request();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(shutdown.token().is_cancelled());
    }
}
