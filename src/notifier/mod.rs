//! Best-effort side-channel notifications
//!
//! The orchestrator calls a [`Notifier`] from spawned tasks and only logs what
//! it returns, so a broken webhook can never change a task's outcome.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{DownloadTask, RunSummary};

mod webhook;

pub use webhook::{WebhookNotifier, WebhookPayload};

/// Receives task lifecycle and subscription-run notifications
#[async_trait]
pub trait Notifier: Send + Sync {
    /// The backend accepted the task's link
    async fn notify_start(&self, task: &DownloadTask) -> Result<()>;

    /// The task reached `completed`
    async fn notify_complete(&self, task: &DownloadTask) -> Result<()>;

    /// The task reached `failed`
    async fn notify_fail(&self, task: &DownloadTask, error: &str) -> Result<()>;

    /// A subscription run finished
    async fn notify_subscription_summary(&self, summary: &RunSummary) -> Result<()>;
}

/// Notifier that drops everything
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopNotifier;

#[async_trait]
impl Notifier for NoopNotifier {
    async fn notify_start(&self, _task: &DownloadTask) -> Result<()> {
        Ok(())
    }

    async fn notify_complete(&self, _task: &DownloadTask) -> Result<()> {
        Ok(())
    }

    async fn notify_fail(&self, _task: &DownloadTask, _error: &str) -> Result<()> {
        Ok(())
    }

    async fn notify_subscription_summary(&self, _summary: &RunSummary) -> Result<()> {
        Ok(())
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;
