//! Task creation and execute dispatch.

use std::sync::atomic::Ordering;

use crate::db::NewTask;
use crate::error::{DatabaseError, Error, Result, TaskError};
use crate::types::{DownloadTask, Event, StartTaskRequest, TaskStatus};

use super::RankDownloader;

impl RankDownloader {
    /// Ask for a catalogue item to be acquired
    ///
    /// Returns as soon as the `pending` record is persisted; the search and
    /// submit happen in a spawned unit of work. Calling this again for a code
    /// with an active task returns that task unchanged.
    ///
    /// # Errors
    ///
    /// - [`TaskError::AlreadyOwned`] if the library has the item or a completed task exists
    /// - [`Error::Config`] if `code` is blank
    /// - [`Error::ShuttingDown`] once shutdown has begun
    pub async fn start_task(&self, request: StartTaskRequest) -> Result<DownloadTask> {
        if !self.runtime.accepting_new.load(Ordering::SeqCst) {
            return Err(Error::ShuttingDown);
        }

        let code = request.code.trim().to_string();
        if code.is_empty() {
            return Err(Error::Config {
                message: "code must not be empty".to_string(),
                key: Some("code".to_string()),
            });
        }

        if self.collaborators.ownership.exists(&code).await? {
            tracing::debug!(code = %code, "item already in library");
            return Err(TaskError::AlreadyOwned { code }.into());
        }

        if let Some(existing) = self.db.get_task_by_code(&code).await? {
            match existing.status() {
                status if status.is_active() => {
                    tracing::debug!(code = %code, task_id = existing.id, status = %status, "task already active");
                    return Ok(existing.into());
                }
                TaskStatus::Completed => {
                    return Err(TaskError::AlreadyOwned { code }.into());
                }
                status => {
                    let soft = self.config.persistence.keep_failed_history;
                    self.db.purge_task(existing.id.into(), soft).await?;
                    tracing::info!(
                        code = %code,
                        task_id = existing.id,
                        status = %status,
                        soft,
                        "purged previous task to start a new attempt"
                    );
                }
            }
        }

        let new_task = NewTask {
            code: code.clone(),
            title: request.title,
            cover_url: request.cover_url,
            source: request.source,
            category: request.category,
        };

        let id = match self.db.insert_task(&new_task).await {
            Ok(id) => id,
            Err(Error::Database(DatabaseError::ConstraintViolation(_))) => {
                // A concurrent start for the same code won the insert
                let winner = self
                    .db
                    .get_task_by_code(&code)
                    .await?
                    .ok_or_else(|| TaskError::not_found_code(&code))?;
                tracing::debug!(code = %code, task_id = winner.id, "concurrent start, returning winner");
                return Ok(winner.into());
            }
            Err(e) => return Err(e),
        };

        let task: DownloadTask = self
            .db
            .get_task(id)
            .await?
            .ok_or_else(|| TaskError::not_found_id(id))?
            .into();

        tracing::info!(
            task_id = %task.id,
            code = %task.code,
            source = %task.source,
            category = %task.category,
            "task created"
        );
        self.emit_event(Event::TaskCreated {
            id: task.id,
            code: task.code.clone(),
            source: task.source,
        });

        self.spawn_execute(task.clone()).await;

        Ok(task)
    }

    /// Run [`execute`](Self::execute) for `task` in its own tokio task
    ///
    /// The id stays in `active_tasks` until the unit of work returns, which is
    /// what shutdown waits on.
    pub(crate) async fn spawn_execute(&self, task: DownloadTask) {
        self.runtime.active_tasks.lock().await.insert(task.id);

        let downloader = self.clone();
        tokio::spawn(async move {
            let id = task.id;
            let code = task.code.clone();

            if let Err(e) = downloader.execute(task).await {
                tracing::error!(task_id = %id, code = %code, error = %e, "execute aborted");
            }

            downloader.runtime.active_tasks.lock().await.remove(&id);
        });
    }
}
