//! Webhook delivery.

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use utoipa::ToSchema;

use super::Notifier;
use crate::config::{WebhookConfig, WebhookEvent};
use crate::error::{Error, Result};
use crate::types::{DownloadTask, Event, RunSummary, TaskId};

/// Webhooks posted at once for a single notification
const MAX_CONCURRENT_DELIVERIES: usize = 4;

/// JSON body POSTed to webhooks
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct WebhookPayload {
    /// "start", "complete", "failed" or "subscription_summary"
    pub event: String,
    /// Task ID, absent for subscription summaries
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_id: Option<TaskId>,
    /// Catalogue code, absent for subscription summaries
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    /// Display title
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Ranking bucket
    pub category: String,
    /// Failure reason
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Codes started by a subscription run
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started: Option<Vec<String>>,
    /// Unix timestamp of the notification
    pub timestamp: i64,
}

impl WebhookPayload {
    fn for_task(event: &str, task: &DownloadTask, error: Option<&str>) -> Self {
        Self {
            event: event.to_string(),
            task_id: Some(task.id),
            code: Some(task.code.clone()),
            title: Some(task.title.clone()),
            category: task.category.clone(),
            error: error.map(str::to_string),
            started: None,
            timestamp: chrono::Utc::now().timestamp(),
        }
    }
}

/// POSTs JSON payloads to every webhook subscribed to an event
#[derive(Clone)]
pub struct WebhookNotifier {
    webhooks: Vec<WebhookConfig>,
    http_client: reqwest::Client,
    event_tx: Option<broadcast::Sender<Event>>,
}

impl WebhookNotifier {
    /// Create a notifier for `webhooks`
    pub fn new(webhooks: Vec<WebhookConfig>) -> Self {
        Self {
            webhooks,
            http_client: reqwest::Client::new(),
            event_tx: None,
        }
    }

    /// Also report delivery failures as [`Event::WebhookFailed`]
    pub fn with_events(mut self, event_tx: broadcast::Sender<Event>) -> Self {
        self.event_tx = Some(event_tx);
        self
    }

    /// Deliver `payload` to every webhook subscribed to `event`
    ///
    /// Webhooks are posted concurrently and all are attempted; the first
    /// failure in configuration order is returned.
    async fn deliver(&self, event: WebhookEvent, payload: &WebhookPayload) -> Result<()> {
        let deliveries: Vec<_> = self
            .webhooks
            .iter()
            .filter(|w| w.events.contains(&event))
            .map(|webhook| self.post(webhook, payload))
            .collect();

        let outcomes: Vec<std::result::Result<(), String>> = stream::iter(deliveries)
            .buffered(MAX_CONCURRENT_DELIVERIES)
            .collect()
            .await;

        match outcomes.into_iter().find_map(std::result::Result::err) {
            Some(error_msg) => Err(Error::Other(error_msg)),
            None => Ok(()),
        }
    }

    async fn post(
        &self,
        webhook: &WebhookConfig,
        payload: &WebhookPayload,
    ) -> std::result::Result<(), String> {
        let mut request = self.http_client.post(&webhook.url).json(payload);
        if let Some(auth) = &webhook.auth_header {
            request = request.header("Authorization", auth);
        }

        let outcome = match tokio::time::timeout(webhook.timeout, request.send()).await {
            Ok(Ok(response)) if response.status().is_success() => Ok(()),
            Ok(Ok(response)) => Err(format!(
                "Webhook returned status {}: {}",
                response.status(),
                response.text().await.unwrap_or_default()
            )),
            Ok(Err(e)) => Err(format!("Failed to send webhook: {}", e)),
            Err(_) => Err(format!("Webhook timed out after {:?}", webhook.timeout)),
        };

        match &outcome {
            Ok(()) => tracing::debug!(url = %webhook.url, "webhook sent successfully"),
            Err(error_msg) => {
                tracing::warn!(url = %webhook.url, error = %error_msg, "webhook failed");
                if let Some(tx) = &self.event_tx {
                    tx.send(Event::WebhookFailed {
                        url: webhook.url.clone(),
                        error: error_msg.clone(),
                    })
                    .ok();
                }
            }
        }

        outcome
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify_start(&self, task: &DownloadTask) -> Result<()> {
        let payload = WebhookPayload::for_task("start", task, None);
        self.deliver(WebhookEvent::OnStart, &payload).await
    }

    async fn notify_complete(&self, task: &DownloadTask) -> Result<()> {
        let payload = WebhookPayload::for_task("complete", task, None);
        self.deliver(WebhookEvent::OnComplete, &payload).await
    }

    async fn notify_fail(&self, task: &DownloadTask, error: &str) -> Result<()> {
        let payload = WebhookPayload::for_task("failed", task, Some(error));
        self.deliver(WebhookEvent::OnFailed, &payload).await
    }

    async fn notify_subscription_summary(&self, summary: &RunSummary) -> Result<()> {
        let payload = WebhookPayload {
            event: "subscription_summary".to_string(),
            task_id: None,
            code: None,
            title: None,
            category: summary.category.clone(),
            error: None,
            started: Some(summary.started.clone()),
            timestamp: chrono::Utc::now().timestamp(),
        };
        self.deliver(WebhookEvent::OnSubscriptionSummary, &payload)
            .await
    }
}
