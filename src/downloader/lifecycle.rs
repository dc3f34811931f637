//! Shutdown coordination.

use std::sync::atomic::Ordering;
use std::time::Duration;

use crate::error::Result;

use super::RankDownloader;

/// How long shutdown waits for in-flight execute units of work
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

impl RankDownloader {
    /// Gracefully shut down the orchestrator
    ///
    /// This method performs a graceful shutdown sequence:
    /// 1. Stops accepting new tasks, retries and subscription runs
    /// 2. Cancels the background loops (scheduler, housekeeping, progress poller)
    /// 3. Waits up to 30 seconds for in-flight execute units of work; their
    ///    network calls are bounded by the indexer and backend timeouts
    /// 4. Closes the database pool
    pub async fn shutdown(&self) -> Result<()> {
        tracing::info!("Initiating graceful shutdown");

        self.runtime.accepting_new.store(false, Ordering::SeqCst);
        self.runtime.shutdown.cancel();
        tracing::info!("Stopped accepting new work");

        match tokio::time::timeout(SHUTDOWN_TIMEOUT, self.wait_for_active_tasks()).await {
            Ok(()) => tracing::info!("All in-flight tasks finished"),
            Err(_) => tracing::warn!(
                "Timeout waiting for in-flight tasks, proceeding with shutdown"
            ),
        }

        self.db.close().await;

        tracing::info!("Graceful shutdown complete");
        Ok(())
    }

    /// Number of execute units of work currently running
    pub async fn active_task_count(&self) -> usize {
        self.runtime.active_tasks.lock().await.len()
    }

    async fn wait_for_active_tasks(&self) {
        loop {
            let active_count = self.active_task_count().await;
            if active_count == 0 {
                return;
            }

            tracing::debug!(active_count, "Waiting for in-flight tasks to finish");
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }
}
