//! Background service starters: subscription scheduler, housekeeping and
//! backend progress polling.

use std::sync::Arc;
use std::time::Duration;

use crate::error::Result;
use crate::subscription_scheduler::SubscriptionScheduler;
use crate::types::{TaskId, TaskStatus};

use super::RankDownloader;

impl RankDownloader {
    /// Start every background service the configuration enables
    pub fn start_background_services(&self) -> Vec<tokio::task::JoinHandle<()>> {
        vec![
            self.start_subscription_scheduler(),
            self.start_housekeeping(),
            self.start_progress_poller(),
        ]
    }

    /// Start the scheduler that runs due subscriptions
    pub fn start_subscription_scheduler(&self) -> tokio::task::JoinHandle<()> {
        if !self.config.subscriptions.enabled {
            tracing::info!("Subscription scheduler disabled, skipping");
            return tokio::spawn(async {});
        }

        let scheduler = SubscriptionScheduler::new(Arc::new(self.clone()));
        let handle = tokio::spawn(async move {
            scheduler.run().await;
        });

        tracing::info!(
            check_interval_secs = self.config.subscriptions.check_interval.as_secs(),
            "Subscription scheduler background task started"
        );

        handle
    }

    /// Start the periodic cleanup of old tasks and expired quota windows
    pub fn start_housekeeping(&self) -> tokio::task::JoinHandle<()> {
        let downloader = self.clone();
        let interval = self.config.housekeeping.cleanup_interval;

        tokio::spawn(async move {
            tracing::info!(interval_secs = interval.as_secs(), "Housekeeping started");
            loop {
                if let Err(e) = downloader.run_housekeeping().await {
                    tracing::error!(error = %e, "Housekeeping pass failed");
                }

                if !downloader.pause_or_stop(interval).await {
                    break;
                }
            }
            tracing::info!("Housekeeping shutting down");
        })
    }

    /// Start polling the backend for progress of started tasks
    pub fn start_progress_poller(&self) -> tokio::task::JoinHandle<()> {
        let Some(interval) = self.config.housekeeping.progress_poll_interval else {
            tracing::info!("No progress poll interval configured, skipping progress poller");
            return tokio::spawn(async {});
        };

        let downloader = self.clone();
        tokio::spawn(async move {
            tracing::info!(interval_secs = interval.as_secs(), "Progress poller started");
            loop {
                if !downloader.pause_or_stop(interval).await {
                    break;
                }

                if let Err(e) = downloader.poll_backend_progress().await {
                    if e.is_store_unavailable() {
                        tracing::error!(error = %e, "Progress poll failed");
                    } else {
                        tracing::warn!(error = %e, "Progress poll failed");
                    }
                }
            }
            tracing::info!("Progress poller shutting down");
        })
    }

    /// One housekeeping pass
    ///
    /// Returns `(tasks removed, windows removed)`.
    pub async fn run_housekeeping(&self) -> Result<(u64, u64)> {
        let tasks_removed = match self.config.housekeeping.cleanup_after {
            Some(age) => self.cleanup_old_tasks(age).await?,
            None => 0,
        };

        let windows_removed = self
            .db
            .reset_expired_windows(chrono::Utc::now().timestamp())
            .await?;
        if windows_removed > 0 {
            tracing::debug!(windows_removed, "Expired quota windows removed");
        }

        Ok((tasks_removed, windows_removed))
    }

    /// Feed backend progress into [`update_progress`](Self::update_progress)
    ///
    /// Only `started`/`progress` tasks with a known info-hash are matched.
    /// Returns the number of tasks updated. A task whose update is rejected
    /// (e.g. cancelled in between) is logged and skipped.
    pub async fn poll_backend_progress(&self) -> Result<usize> {
        let tasks = self
            .db
            .list_tasks_in(&[TaskStatus::Started, TaskStatus::Progress])
            .await?;
        if tasks.is_empty() {
            return Ok(0);
        }

        let progress = self.collaborators.backend.torrent_progress().await?;

        let mut updated = 0;
        for task in tasks {
            let Some(hash) = task.torrent_hash.as_deref() else {
                continue;
            };
            let Some(&fraction) = progress.get(&hash.to_lowercase()) else {
                continue;
            };
            if fraction <= task.progress && fraction < 1.0 {
                continue;
            }

            match self.update_progress(&task.code, fraction).await {
                Ok(_) => updated += 1,
                Err(e) if e.is_store_unavailable() => return Err(e),
                Err(e) => {
                    tracing::debug!(task_id = %TaskId(task.id), code = %task.code, error = %e, "progress update skipped");
                }
            }
        }

        Ok(updated)
    }

    /// Sleep for `interval` unless shutdown comes first; false means stop
    pub(crate) async fn pause_or_stop(&self, interval: Duration) -> bool {
        tokio::select! {
            _ = self.runtime.shutdown.cancelled() => false,
            _ = tokio::time::sleep(interval) => true,
        }
    }
}
