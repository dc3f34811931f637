//! Fire-and-forget notifier dispatch.
//!
//! Each call is spawned so a slow or broken notifier cannot delay a state
//! transition, and its result is only logged.

use crate::types::{DownloadTask, RunSummary};

use super::RankDownloader;

impl RankDownloader {
    pub(crate) fn notify_started(&self, task: DownloadTask) {
        let notifier = self.collaborators.notifier.clone();
        tokio::spawn(async move {
            if let Err(e) = notifier.notify_start(&task).await {
                tracing::warn!(task_id = %task.id, code = %task.code, error = %e, "start notification failed");
            }
        });
    }

    pub(crate) fn notify_completed(&self, task: DownloadTask) {
        let notifier = self.collaborators.notifier.clone();
        tokio::spawn(async move {
            if let Err(e) = notifier.notify_complete(&task).await {
                tracing::warn!(task_id = %task.id, code = %task.code, error = %e, "completion notification failed");
            }
        });
    }

    pub(crate) fn notify_failed(&self, task: DownloadTask, reason: String) {
        let notifier = self.collaborators.notifier.clone();
        tokio::spawn(async move {
            if let Err(e) = notifier.notify_fail(&task, &reason).await {
                tracing::warn!(task_id = %task.id, code = %task.code, error = %e, "failure notification failed");
            }
        });
    }

    pub(crate) fn notify_summary(&self, summary: RunSummary) {
        let notifier = self.collaborators.notifier.clone();
        tokio::spawn(async move {
            if let Err(e) = notifier.notify_subscription_summary(&summary).await {
                tracing::warn!(category = %summary.category, error = %e, "summary notification failed");
            }
        });
    }
}
