//! Graceful shutdown for the RelayNet node.
//!
//! One broadcast channel fans the stop signal out to the RPC server, the
//! push server, and every background loop; `drain_tasks` then bounds how
//! long the node waits for them to wind down.

use std::time::Duration;

use tokio::signal;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

/// Owns the stop signal.
///
/// Subsystems call [`subscribe`](ShutdownController::subscribe) to get a
/// receiver, then `select!` on it alongside their main loop. When shutdown
/// is triggered (by OS signal or programmatically), every receiver is
/// notified.
pub struct ShutdownController {
    tx: broadcast::Sender<()>,
}

impl ShutdownController {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self { tx }
    }

    /// Get a receiver that will be notified on shutdown.
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }

    /// Trigger shutdown programmatically.
    pub fn shutdown(&self) {
        let _ = self.tx.send(());
    }

    /// Wait for SIGTERM or SIGINT, then trigger shutdown.
    pub async fn wait_for_signal(&self) {
        let ctrl_c = signal::ctrl_c();

        #[cfg(unix)]
        let terminate = async {
            signal::unix::signal(signal::unix::SignalKind::terminate())
                .expect("failed to install SIGTERM handler")
                .recv()
                .await;
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => { tracing::info!("received SIGINT, shutting down"); }
            _ = terminate => { tracing::info!("received SIGTERM, shutting down"); }
        }

        self.shutdown();
    }
}

impl Default for ShutdownController {
    fn default() -> Self {
        Self::new()
    }
}

/// Await every spawned task, giving up after `timeout`.
///
/// Returns `false` when the cap was hit with tasks still running. Tasks
/// are awaited in order; the timeout covers the whole batch, not each one.
pub async fn drain_tasks(handles: Vec<JoinHandle<()>>, timeout: Duration) -> bool {
    let wait_all = async {
        for handle in handles {
            let _ = handle.await;
        }
    };
    tokio::time::timeout(timeout, wait_all).await.is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn programmatic_shutdown_notifies_subscribers() {
        let controller = ShutdownController::new();
        let mut rx = controller.subscribe();
        controller.shutdown();
        assert!(rx.recv().await.is_ok());
    }

    #[tokio::test]
    async fn multiple_subscribers_all_notified() {
        let controller = ShutdownController::new();
        let mut rx1 = controller.subscribe();
        let mut rx2 = controller.subscribe();
        controller.shutdown();
        assert!(rx1.recv().await.is_ok());
        assert!(rx2.recv().await.is_ok());
    }

    #[tokio::test]
    async fn drain_waits_for_finished_tasks() {
        let handles = vec![tokio::spawn(async {}), tokio::spawn(async {})];
        assert!(drain_tasks(handles, Duration::from_secs(1)).await);
    }

    #[tokio::test]
    async fn drain_gives_up_on_stuck_tasks() {
        let handles = vec![tokio::spawn(std::future::pending::<()>())];
        assert!(!drain_tasks(handles, Duration::from_millis(20)).await);
    }
}
