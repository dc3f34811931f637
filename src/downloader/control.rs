//! Task control: cancel, retry, progress, deletion and reads.

use std::sync::atomic::Ordering;
use std::time::Duration;

use crate::db::TaskRow;
use crate::error::{Error, Result, TaskError};
use crate::types::{
    DownloadTask, Event, TaskFilter, TaskId, TaskSource, TaskStats, TaskStatus,
};

use super::RankDownloader;

fn invalid_transition(id: TaskId, operation: &str, current: TaskStatus) -> Error {
    TaskError::InvalidTransition {
        id,
        operation: operation.to_string(),
        current_state: current.to_string(),
    }
    .into()
}

impl RankDownloader {
    async fn require_task(&self, id: TaskId) -> Result<TaskRow> {
        self.db
            .get_task(id)
            .await?
            .ok_or_else(|| TaskError::not_found_id(id).into())
    }

    /// Reload a task after a transition; the row vanishing is reported as not found
    async fn reload(&self, id: TaskId) -> Result<DownloadTask> {
        Ok(self.require_task(id).await?.into())
    }

    /// Transition that lost a race: report the status the task actually has
    async fn lost_race(&self, id: TaskId, operation: &str) -> Error {
        match self.db.get_task(id).await {
            Ok(Some(row)) => invalid_transition(id, operation, row.status()),
            Ok(None) => TaskError::not_found_id(id).into(),
            Err(e) => e,
        }
    }

    /// Cancel an active task
    ///
    /// Cooperative: a search or submit already in flight finishes, but every
    /// later transition of the task is rejected.
    ///
    /// # Errors
    ///
    /// [`TaskError::InvalidTransition`] if the task is already terminal.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// # use rank_dl::*;
    /// # async fn example(downloader: RankDownloader, id: TaskId) -> Result<()> {
    /// let task = downloader.cancel_task(id).await?;
    /// assert_eq!(task.status, TaskStatus::Cancelled);
    /// # Ok(())
    /// # }
    /// ```
    pub async fn cancel_task(&self, id: TaskId) -> Result<DownloadTask> {
        let row = self.require_task(id).await?;
        let current = row.status();
        if !current.is_active() {
            return Err(invalid_transition(id, "cancel", current));
        }

        if !self.db.mark_task_cancelled(id).await? {
            return Err(self.lost_race(id, "cancel").await);
        }

        tracing::info!(task_id = %id, code = %row.code, previous = %current, "task cancelled");
        self.status_changed(id, &row.code, TaskStatus::Cancelled);

        self.reload(id).await
    }

    /// Reset a failed task to `pending` and execute it again
    ///
    /// The previously chosen candidate is kept on the record until the new
    /// search replaces it.
    ///
    /// # Errors
    ///
    /// [`TaskError::InvalidTransition`] unless the task is `failed`.
    pub async fn retry_task(&self, id: TaskId) -> Result<DownloadTask> {
        if !self.runtime.accepting_new.load(Ordering::SeqCst) {
            return Err(Error::ShuttingDown);
        }

        let row = self.require_task(id).await?;
        let current = row.status();
        if current != TaskStatus::Failed {
            return Err(invalid_transition(id, "retry", current));
        }

        if !self.db.reset_task_for_retry(id).await? {
            return Err(self.lost_race(id, "retry").await);
        }

        tracing::info!(task_id = %id, code = %row.code, "task reset for retry");
        self.status_changed(id, &row.code, TaskStatus::Pending);

        let task = self.reload(id).await?;
        self.spawn_execute(task.clone()).await;
        Ok(task)
    }

    /// Report download progress for the task holding `code`
    ///
    /// `fraction` is clamped to `[0, 1]`. `1.0` completes the task, anything
    /// above zero moves it to `progress`, and zero changes nothing.
    ///
    /// # Errors
    ///
    /// - [`TaskError::NotFound`] if no task has this code
    /// - [`TaskError::InvalidTransition`] if the task is not `started`/`progress`
    pub async fn update_progress(&self, code: &str, fraction: f64) -> Result<DownloadTask> {
        let fraction = if fraction.is_nan() {
            0.0
        } else {
            fraction.clamp(0.0, 1.0)
        };

        let row = self
            .db
            .get_task_by_code(code)
            .await?
            .ok_or_else(|| TaskError::not_found_code(code))?;
        let id = TaskId(row.id);
        let previous = row.status();

        if fraction >= 1.0 {
            if !self.db.mark_task_completed(id).await? {
                return Err(self.lost_race(id, "complete").await);
            }

            tracing::info!(task_id = %id, code = %code, "task completed");
            self.status_changed(id, code, TaskStatus::Completed);

            let task = self.reload(id).await?;
            if task.source == TaskSource::Subscription && !task.category.is_empty() {
                self.db.increment_subscription_success(&task.category).await?;
            }
            self.notify_completed(task.clone());
            return Ok(task);
        }

        if fraction > 0.0 {
            if !self.db.set_task_progress(id, fraction).await? {
                return Err(self.lost_race(id, "update progress of").await);
            }

            tracing::debug!(task_id = %id, code = %code, progress = fraction, "progress updated");
            if previous != TaskStatus::Progress {
                self.status_changed(id, code, TaskStatus::Progress);
            }
            self.emit_event(Event::TaskProgress {
                id,
                code: code.to_string(),
                progress: fraction,
            });
        }

        self.reload(id).await
    }

    /// Remove a terminal task
    ///
    /// Hard delete, or soft delete when `persistence.keep_failed_history` is set.
    ///
    /// # Errors
    ///
    /// [`TaskError::InvalidTransition`] for active tasks; cancel them first.
    pub async fn delete_task(&self, id: TaskId) -> Result<()> {
        let row = self.require_task(id).await?;
        let current = row.status();
        if current.is_active() {
            return Err(invalid_transition(id, "delete", current));
        }

        let soft = self.config.persistence.keep_failed_history;
        if !self.db.purge_task(id, soft).await? {
            return Err(self.lost_race(id, "delete").await);
        }

        tracing::info!(task_id = %id, code = %row.code, soft, "task deleted");
        Ok(())
    }

    /// Hard-delete completed and failed tasks not touched for `age`
    ///
    /// Returns the number of tasks removed.
    pub async fn cleanup_old_tasks(&self, age: Duration) -> Result<u64> {
        let cutoff = chrono::Duration::from_std(age)
            .ok()
            .and_then(|age| chrono::Utc::now().checked_sub_signed(age))
            .map(|t| t.timestamp())
            .unwrap_or(i64::MIN);

        let removed = self.db.delete_tasks_older_than(cutoff).await?;
        if removed > 0 {
            tracing::info!(removed, "cleaned up old tasks");
        }
        Ok(removed)
    }

    /// Get a task by ID
    pub async fn get_task(&self, id: TaskId) -> Result<DownloadTask> {
        self.reload(id).await
    }

    /// Get the live task for a code
    pub async fn get_task_by_code(&self, code: &str) -> Result<DownloadTask> {
        self.db
            .get_task_by_code(code)
            .await?
            .map(DownloadTask::from)
            .ok_or_else(|| TaskError::not_found_code(code).into())
    }

    /// One page of tasks matching `filter`, newest first, plus the total match count
    pub async fn list_tasks(&self, filter: &TaskFilter) -> Result<(Vec<DownloadTask>, i64)> {
        let (rows, total) = self.db.list_tasks(filter).await?;
        Ok((rows.into_iter().map(DownloadTask::from).collect(), total))
    }

    /// Task counts per status and per source
    pub async fn get_task_stats(&self) -> Result<TaskStats> {
        self.db.task_stats().await
    }
}
