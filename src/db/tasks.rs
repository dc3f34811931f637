//! Task store: creation, compare-and-set transitions, listing and purge.
//!
//! Every transition is a single `UPDATE ... WHERE id = ? AND status IN (...)`
//! whose `IN` list is the target status's legal predecessors. A `false` return
//! means the row moved on (or vanished) underneath the caller.

use sqlx::{QueryBuilder, Sqlite};

use crate::error::DatabaseError;
use crate::types::{TaskFilter, TaskId, TaskStats, TaskStatus};
use crate::{Error, Result};

use super::{CandidateFields, Database, NewTask, TaskRow};

const TASK_COLUMNS: &str = "id, code, title, cover_url, status, torrent_link, torrent_hash, \
     file_size, progress, error_message, source, category, created_at, updated_at, \
     started_at, completed_at";

fn query_failed(action: &'static str) -> impl Fn(sqlx::Error) -> Error {
    move |e| Error::Database(DatabaseError::QueryFailed(format!("Failed to {}: {}", action, e)))
}

/// SQL list of status codes, e.g. `(0,1,2)`
fn status_list(statuses: &[TaskStatus]) -> String {
    let codes: Vec<String> = statuses.iter().map(|s| s.to_i32().to_string()).collect();
    format!("({})", codes.join(","))
}

impl Database {
    /// Insert a new task in `pending`
    ///
    /// Fails with [`DatabaseError::ConstraintViolation`] when a live task for the
    /// same code already exists.
    pub async fn insert_task(&self, task: &NewTask) -> Result<TaskId> {
        let now = chrono::Utc::now().timestamp();

        let result = sqlx::query(
            r#"
            INSERT INTO download_tasks (
                code, title, cover_url, status, source, category, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&task.code)
        .bind(&task.title)
        .bind(&task.cover_url)
        .bind(TaskStatus::Pending.to_i32())
        .bind(task.source.as_str())
        .bind(&task.category)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            let duplicate = matches!(&e, sqlx::Error::Database(db_err) if db_err.is_unique_violation());
            if duplicate {
                Error::Database(DatabaseError::ConstraintViolation(format!(
                    "task for {} already exists",
                    task.code
                )))
            } else {
                query_failed("insert task")(e)
            }
        })?;

        Ok(TaskId(result.last_insert_rowid()))
    }

    /// Get a live task by ID
    pub async fn get_task(&self, id: TaskId) -> Result<Option<TaskRow>> {
        let sql = format!(
            "SELECT {} FROM download_tasks WHERE id = ? AND deleted_at IS NULL",
            TASK_COLUMNS
        );
        sqlx::query_as::<_, TaskRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(query_failed("get task"))
    }

    /// Get the live task for a catalogue code
    pub async fn get_task_by_code(&self, code: &str) -> Result<Option<TaskRow>> {
        let sql = format!(
            "SELECT {} FROM download_tasks WHERE code = ? AND deleted_at IS NULL",
            TASK_COLUMNS
        );
        sqlx::query_as::<_, TaskRow>(&sql)
            .bind(code)
            .fetch_optional(&self.pool)
            .await
            .map_err(query_failed("get task by code"))
    }

    /// All live tasks in one of the given statuses, oldest first
    pub async fn list_tasks_in(&self, statuses: &[TaskStatus]) -> Result<Vec<TaskRow>> {
        let sql = format!(
            "SELECT {} FROM download_tasks WHERE deleted_at IS NULL AND status IN {} \
             ORDER BY created_at ASC, id ASC",
            TASK_COLUMNS,
            status_list(statuses)
        );
        sqlx::query_as::<_, TaskRow>(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(query_failed("list tasks by status"))
    }

    /// Page through live tasks, newest first
    ///
    /// Returns the page and the total number of rows matching the filter.
    pub async fn list_tasks(&self, filter: &TaskFilter) -> Result<(Vec<TaskRow>, i64)> {
        fn push_filters<'a>(qb: &mut QueryBuilder<'a, Sqlite>, filter: &'a TaskFilter) {
            qb.push(" WHERE deleted_at IS NULL");
            if let Some(status) = filter.status {
                qb.push(" AND status = ").push_bind(status.to_i32());
            }
            if let Some(source) = filter.source {
                qb.push(" AND source = ").push_bind(source.as_str());
            }
            if let Some(category) = &filter.category {
                qb.push(" AND category = ").push_bind(category.as_str());
            }
        }

        let mut count_query = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM download_tasks");
        push_filters(&mut count_query, filter);
        let total: i64 = count_query
            .build_query_scalar::<i64>()
            .fetch_one(&self.pool)
            .await
            .map_err(query_failed("count tasks"))?;

        let mut page_query = QueryBuilder::<Sqlite>::new(format!(
            "SELECT {} FROM download_tasks",
            TASK_COLUMNS
        ));
        push_filters(&mut page_query, filter);
        page_query
            .push(" ORDER BY created_at DESC, id DESC LIMIT ")
            .push_bind(filter.limit)
            .push(" OFFSET ")
            .push_bind(filter.offset);

        let rows = page_query
            .build_query_as::<TaskRow>()
            .fetch_all(&self.pool)
            .await
            .map_err(query_failed("list tasks"))?;

        Ok((rows, total))
    }

    /// Count live tasks per status and per source
    pub async fn task_stats(&self) -> Result<TaskStats> {
        let rows: Vec<(i32, String, i64)> = sqlx::query_as(
            r#"
            SELECT status, source, COUNT(*)
            FROM download_tasks
            WHERE deleted_at IS NULL
            GROUP BY status, source
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(query_failed("compute task stats"))?;

        let mut stats = TaskStats::default();
        for (status, source, count) in rows {
            stats.total += count;
            match TaskStatus::from_i32(status) {
                TaskStatus::Pending => stats.pending += count,
                TaskStatus::Searching => stats.searching += count,
                TaskStatus::Found => stats.found += count,
                TaskStatus::Started => stats.started += count,
                TaskStatus::Progress => stats.progress += count,
                TaskStatus::Completed => stats.completed += count,
                TaskStatus::Failed => stats.failed += count,
                TaskStatus::Cancelled => stats.cancelled += count,
            }
            match source.as_str() {
                "subscription" => stats.subscription += count,
                _ => stats.manual += count,
            }
        }

        Ok(stats)
    }

    /// pending -> searching, stamping `started_at`
    pub async fn mark_task_searching(&self, id: TaskId) -> Result<bool> {
        let now = chrono::Utc::now().timestamp();
        let sql = format!(
            "UPDATE download_tasks SET status = ?, started_at = ?, updated_at = ? \
             WHERE id = ? AND deleted_at IS NULL AND status IN {}",
            status_list(TaskStatus::Searching.predecessors())
        );
        let result = sqlx::query(&sql)
            .bind(TaskStatus::Searching.to_i32())
            .bind(now)
            .bind(now)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(query_failed("mark task searching"))?;

        Ok(result.rows_affected() > 0)
    }

    /// searching -> found, storing the chosen candidate
    pub async fn mark_task_found(&self, id: TaskId, candidate: CandidateFields<'_>) -> Result<bool> {
        let now = chrono::Utc::now().timestamp();
        let sql = format!(
            "UPDATE download_tasks SET status = ?, torrent_link = ?, torrent_hash = ?, \
             file_size = ?, updated_at = ? \
             WHERE id = ? AND deleted_at IS NULL AND status IN {}",
            status_list(TaskStatus::Found.predecessors())
        );
        let result = sqlx::query(&sql)
            .bind(TaskStatus::Found.to_i32())
            .bind(candidate.link)
            .bind(candidate.hash)
            .bind(candidate.size)
            .bind(now)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(query_failed("mark task found"))?;

        Ok(result.rows_affected() > 0)
    }

    /// found -> started
    pub async fn mark_task_started(&self, id: TaskId) -> Result<bool> {
        self.simple_transition(id, TaskStatus::Started).await
    }

    /// started/progress -> progress with a new fraction
    pub async fn set_task_progress(&self, id: TaskId, progress: f64) -> Result<bool> {
        let now = chrono::Utc::now().timestamp();
        let sql = format!(
            "UPDATE download_tasks SET status = ?, progress = ?, updated_at = ? \
             WHERE id = ? AND deleted_at IS NULL AND status IN {}",
            status_list(TaskStatus::Progress.predecessors())
        );
        let result = sqlx::query(&sql)
            .bind(TaskStatus::Progress.to_i32())
            .bind(progress)
            .bind(now)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(query_failed("update task progress"))?;

        Ok(result.rows_affected() > 0)
    }

    /// started/progress -> completed, stamping `completed_at`
    pub async fn mark_task_completed(&self, id: TaskId) -> Result<bool> {
        let now = chrono::Utc::now().timestamp();
        let sql = format!(
            "UPDATE download_tasks SET status = ?, progress = 1.0, completed_at = ?, updated_at = ? \
             WHERE id = ? AND deleted_at IS NULL AND status IN {}",
            status_list(TaskStatus::Completed.predecessors())
        );
        let result = sqlx::query(&sql)
            .bind(TaskStatus::Completed.to_i32())
            .bind(now)
            .bind(now)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(query_failed("mark task completed"))?;

        Ok(result.rows_affected() > 0)
    }

    /// searching/found/started/progress -> failed with a reason
    pub async fn mark_task_failed(&self, id: TaskId, error: &str) -> Result<bool> {
        let now = chrono::Utc::now().timestamp();
        let sql = format!(
            "UPDATE download_tasks SET status = ?, error_message = ?, completed_at = ?, updated_at = ? \
             WHERE id = ? AND deleted_at IS NULL AND status IN {}",
            status_list(TaskStatus::Failed.predecessors())
        );
        let result = sqlx::query(&sql)
            .bind(TaskStatus::Failed.to_i32())
            .bind(error)
            .bind(now)
            .bind(now)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(query_failed("mark task failed"))?;

        Ok(result.rows_affected() > 0)
    }

    /// any active status -> cancelled, stamping `completed_at`
    pub async fn mark_task_cancelled(&self, id: TaskId) -> Result<bool> {
        let now = chrono::Utc::now().timestamp();
        let sql = format!(
            "UPDATE download_tasks SET status = ?, completed_at = ?, updated_at = ? \
             WHERE id = ? AND deleted_at IS NULL AND status IN {}",
            status_list(TaskStatus::Cancelled.predecessors())
        );
        let result = sqlx::query(&sql)
            .bind(TaskStatus::Cancelled.to_i32())
            .bind(now)
            .bind(now)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(query_failed("cancel task"))?;

        Ok(result.rows_affected() > 0)
    }

    /// failed -> pending, clearing the error, progress and timestamps
    pub async fn reset_task_for_retry(&self, id: TaskId) -> Result<bool> {
        let now = chrono::Utc::now().timestamp();
        let sql = format!(
            "UPDATE download_tasks SET status = ?, error_message = NULL, progress = 0.0, \
             started_at = NULL, completed_at = NULL, updated_at = ? \
             WHERE id = ? AND deleted_at IS NULL AND status IN {}",
            status_list(TaskStatus::Pending.predecessors())
        );
        let result = sqlx::query(&sql)
            .bind(TaskStatus::Pending.to_i32())
            .bind(now)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(query_failed("reset task for retry"))?;

        Ok(result.rows_affected() > 0)
    }

    async fn simple_transition(&self, id: TaskId, to: TaskStatus) -> Result<bool> {
        let now = chrono::Utc::now().timestamp();
        let sql = format!(
            "UPDATE download_tasks SET status = ?, updated_at = ? \
             WHERE id = ? AND deleted_at IS NULL AND status IN {}",
            status_list(to.predecessors())
        );
        let result = sqlx::query(&sql)
            .bind(to.to_i32())
            .bind(now)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(query_failed("transition task"))?;

        Ok(result.rows_affected() > 0)
    }

    /// Remove a terminal task, freeing its code
    ///
    /// With `soft` the row is kept and stamped with `deleted_at`. Active tasks
    /// are never touched; the return value tells whether a row was removed.
    pub async fn purge_task(&self, id: TaskId, soft: bool) -> Result<bool> {
        let terminal = status_list(&[
            TaskStatus::Completed,
            TaskStatus::Failed,
            TaskStatus::Cancelled,
        ]);
        let outcome = if soft {
            let now = chrono::Utc::now().timestamp();
            let sql = format!(
                "UPDATE download_tasks SET deleted_at = ?, updated_at = ? \
                 WHERE id = ? AND deleted_at IS NULL AND status IN {}",
                terminal
            );
            sqlx::query(&sql)
                .bind(now)
                .bind(now)
                .bind(id)
                .execute(&self.pool)
                .await
        } else {
            let sql = format!(
                "DELETE FROM download_tasks WHERE id = ? AND status IN {}",
                terminal
            );
            sqlx::query(&sql).bind(id).execute(&self.pool).await
        };
        let result = outcome.map_err(query_failed("purge task"))?;

        Ok(result.rows_affected() > 0)
    }

    /// Hard-delete completed and failed tasks last touched before `cutoff`
    pub async fn delete_tasks_older_than(&self, cutoff: i64) -> Result<u64> {
        let sql = format!(
            "DELETE FROM download_tasks WHERE updated_at < ? AND status IN {}",
            status_list(&[TaskStatus::Completed, TaskStatus::Failed])
        );
        let result = sqlx::query(&sql)
            .bind(cutoff)
            .execute(&self.pool)
            .await
            .map_err(query_failed("delete old tasks"))?;

        Ok(result.rows_affected())
    }
}
