use super::test_helpers::*;
use crate::error::{Error, SubscriptionError, TaskError};
use crate::types::{
    DownloadTask, Event, StartTaskRequest, TaskFilter, TaskId, TaskSource, TaskStatus,
};

mod subscriptions;

fn manual(code: &str) -> StartTaskRequest {
    StartTaskRequest {
        code: code.to_string(),
        title: format!("title {code}"),
        ..Default::default()
    }
}

/// Start `code` with a single good candidate and wait until it is `started`
async fn started_task(ctx: &TestContext, code: &str, hash: &str) -> DownloadTask {
    ctx.indexer.respond(code, vec![candidate(hash, 1_000, 10)]);
    let task = ctx.downloader.start_task(manual(code)).await.unwrap();
    let task = wait_for_status(&ctx.downloader, task.id, TaskStatus::Started).await;
    wait_idle(&ctx.downloader).await;
    task
}

/// Start `code` with no candidates and wait until it is `failed`
async fn failed_task(ctx: &TestContext, code: &str) -> DownloadTask {
    let task = ctx.downloader.start_task(manual(code)).await.unwrap();
    let task = wait_for_status(&ctx.downloader, task.id, TaskStatus::Failed).await;
    wait_idle(&ctx.downloader).await;
    task
}
