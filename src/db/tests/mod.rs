use crate::db::*;
use crate::types::{TaskSource, TaskStatus};
use tempfile::NamedTempFile;


/// Helper: create a fresh database with migrations applied
async fn setup_db() -> (Database, NamedTempFile) {
    let temp_file = NamedTempFile::new().unwrap();
    let db = Database::new(temp_file.path()).await.unwrap();
    (db, temp_file)
}

/// Helper: a manual task for `code`
fn new_task(code: &str) -> NewTask {
    NewTask {
        code: code.to_string(),
        title: format!("{code} title"),
        cover_url: None,
        source: TaskSource::Manual,
        category: String::new(),
    }
}

/// Helper: insert a task and walk it to `status` through legal transitions
async fn task_in(db: &Database, code: &str, status: TaskStatus) -> crate::types::TaskId {
    let id = db.insert_task(&new_task(code)).await.unwrap();
    let path = match status {
        TaskStatus::Pending => vec![],
        TaskStatus::Searching => vec![TaskStatus::Searching],
        TaskStatus::Found => vec![TaskStatus::Searching, TaskStatus::Found],
        TaskStatus::Started => vec![TaskStatus::Searching, TaskStatus::Found, TaskStatus::Started],
        TaskStatus::Progress => vec![
            TaskStatus::Searching,
            TaskStatus::Found,
            TaskStatus::Started,
            TaskStatus::Progress,
        ],
        TaskStatus::Completed => vec![
            TaskStatus::Searching,
            TaskStatus::Found,
            TaskStatus::Started,
            TaskStatus::Completed,
        ],
        TaskStatus::Failed => vec![TaskStatus::Searching, TaskStatus::Failed],
        TaskStatus::Cancelled => vec![TaskStatus::Cancelled],
    };
    for step in path {
        let moved = match step {
            TaskStatus::Searching => db.mark_task_searching(id).await,
            TaskStatus::Found => {
                db.mark_task_found(
                    id,
                    CandidateFields {
                        link: "magnet:?xt=urn:btih:abc",
                        hash: Some("abc"),
                        size: 1000,
                    },
                )
                .await
            }
            TaskStatus::Started => db.mark_task_started(id).await,
            TaskStatus::Progress => db.set_task_progress(id, 0.5).await,
            TaskStatus::Completed => db.mark_task_completed(id).await,
            TaskStatus::Failed => db.mark_task_failed(id, "boom").await,
            TaskStatus::Cancelled => db.mark_task_cancelled(id).await,
            TaskStatus::Pending => db.reset_task_for_retry(id).await,
        }
        .unwrap();
        assert!(moved, "setup transition to {step} failed");
    }
    id
}
