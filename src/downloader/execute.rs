//! The asynchronous unit of work behind every task.
//!
//! `pending -> searching -> found -> started`, or `failed` at the first step
//! that does not work out. Every step is a compare-and-set on the stored
//! status, so a task cancelled while a network call was in flight simply
//! stops advancing once that call returns.

use std::time::Duration;

use crate::db::CandidateFields;
use crate::error::{Error, Result, TaskError};
use crate::retry::with_retry;
use crate::selector;
use crate::types::{Candidate, DownloadTask, Event, TaskId, TaskStatus};

use super::RankDownloader;

impl RankDownloader {
    /// Drive `task` from `pending` to `started` (or `failed`)
    ///
    /// Only store failures are returned; everything else is recorded on the task.
    pub(crate) async fn execute(&self, task: DownloadTask) -> Result<()> {
        let id = task.id;
        let code = task.code.as_str();

        if !self.db.mark_task_searching(id).await? {
            tracing::debug!(task_id = %id, code = %code, "task left pending before execute, skipping");
            return Ok(());
        }
        self.status_changed(id, code, TaskStatus::Searching);

        let candidates = match self.search_candidates(code).await {
            Ok(candidates) => candidates,
            Err(e) => {
                return self.fail_task(id, &format!("search failed: {}", e)).await;
            }
        };

        let min_seeders = self.config.selection.min_seeders;
        let Some(chosen) = selector::select(&candidates, min_seeders) else {
            tracing::info!(
                task_id = %id,
                code = %code,
                results = candidates.len(),
                min_seeders,
                "no usable candidate"
            );
            let reason = TaskError::NoCandidates {
                code: code.to_string(),
            };
            return self.fail_task(id, &reason.to_string()).await;
        };

        let fields = CandidateFields {
            link: &chosen.link,
            hash: chosen.info_hash.as_deref(),
            size: chosen.size_bytes,
        };
        if !self.db.mark_task_found(id, fields).await? {
            tracing::info!(task_id = %id, code = %code, "task cancelled during search");
            return Ok(());
        }
        tracing::info!(
            task_id = %id,
            code = %code,
            title = %chosen.title,
            size = chosen.size_bytes,
            seeders = chosen.seeders,
            tracker = %chosen.tracker,
            "candidate selected"
        );
        self.status_changed(id, code, TaskStatus::Found);

        if let Err(e) = self.submit_link(chosen).await {
            let reason = TaskError::BackendSubmitFailed {
                reason: e.to_string(),
            };
            return self.fail_task(id, &reason.to_string()).await;
        }

        if !self.db.mark_task_started(id).await? {
            tracing::info!(task_id = %id, code = %code, "task cancelled during submit");
            return Ok(());
        }
        tracing::info!(task_id = %id, code = %code, "download started");
        self.status_changed(id, code, TaskStatus::Started);

        if let Some(started) = self.db.get_task(id).await? {
            self.notify_started(started.into());
        }

        Ok(())
    }

    /// Search the indexer, retrying transient failures, each attempt bounded
    async fn search_candidates(&self, code: &str) -> Result<Vec<Candidate>> {
        let indexer = &self.collaborators.indexer;
        let timeout = self.config.indexer.timeout;

        with_retry(&self.config.retry, || async move {
            bounded("indexer search", timeout, indexer.search(code)).await
        })
        .await
    }

    async fn submit_link(&self, candidate: &Candidate) -> Result<()> {
        bounded(
            "backend submit",
            self.config.backend.timeout,
            self.collaborators.backend.submit(&candidate.link),
        )
        .await
    }

    /// Record a failure; a task that is no longer failable is left alone
    pub(crate) async fn fail_task(&self, id: TaskId, reason: &str) -> Result<()> {
        if !self.db.mark_task_failed(id, reason).await? {
            tracing::info!(task_id = %id, error = %reason, "task no longer active, failure not recorded");
            return Ok(());
        }

        let Some(row) = self.db.get_task(id).await? else {
            return Ok(());
        };
        let task: DownloadTask = row.into();

        tracing::warn!(task_id = %id, code = %task.code, error = %reason, "task failed");
        self.emit_event(Event::TaskFailed {
            id,
            code: task.code.clone(),
            error: reason.to_string(),
        });
        self.status_changed(id, &task.code, TaskStatus::Failed);
        self.notify_failed(task, reason.to_string());

        Ok(())
    }

    pub(crate) fn status_changed(&self, id: TaskId, code: &str, status: TaskStatus) {
        self.emit_event(Event::TaskStatusChanged {
            id,
            code: code.to_string(),
            status,
        });
    }
}

/// Run `fut`, turning an elapsed `after` into [`Error::Timeout`]
async fn bounded<T>(
    operation: &str,
    after: Duration,
    fut: impl std::future::Future<Output = Result<T>>,
) -> Result<T> {
    match tokio::time::timeout(after, fut).await {
        Ok(result) => result,
        Err(_) => Err(Error::Timeout {
            operation: operation.to_string(),
            after,
        }),
    }
}
