use super::*;
use crate::config::{WebhookConfig, WebhookEvent};
use crate::types::{Event, TaskId, TaskSource, TaskStatus};
use std::time::Duration;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn sample_task() -> DownloadTask {
    let now = chrono::Utc::now();
    DownloadTask {
        id: TaskId(7),
        code: "ABC-123".into(),
        title: "Some title".into(),
        cover_url: None,
        status: TaskStatus::Started,
        torrent_link: Some("magnet:?xt=urn:btih:abc".into()),
        torrent_hash: Some("abc".into()),
        file_size: Some(1),
        progress: 0.0,
        error_message: None,
        source: TaskSource::Subscription,
        category: "daily".into(),
        created_at: now,
        updated_at: now,
        started_at: Some(now),
        completed_at: None,
    }
}

fn webhook(url: String, events: Vec<WebhookEvent>) -> WebhookConfig {
    WebhookConfig {
        url,
        events,
        auth_header: Some("Bearer token".into()),
        timeout: Duration::from_secs(2),
    }
}

#[tokio::test]
async fn test_start_notification_posts_payload_with_auth() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/hook"))
        .and(header("authorization", "Bearer token"))
        .and(body_partial_json(serde_json::json!({
            "event": "start",
            "task_id": 7,
            "code": "ABC-123",
            "category": "daily"
        })))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let notifier = WebhookNotifier::new(vec![webhook(
        format!("{}/hook", server.uri()),
        vec![WebhookEvent::OnStart],
    )]);

    notifier.notify_start(&sample_task()).await.unwrap();
}

#[tokio::test]
async fn test_unsubscribed_events_are_not_sent() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let notifier = WebhookNotifier::new(vec![webhook(
        server.uri(),
        vec![WebhookEvent::OnComplete],
    )]);

    notifier.notify_fail(&sample_task(), "boom").await.unwrap();
}

#[tokio::test]
async fn test_failed_delivery_returns_error_and_emits_event() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500).set_body_string("down"))
        .mount(&server)
        .await;

    let (tx, mut rx) = tokio::sync::broadcast::channel(8);
    let notifier = WebhookNotifier::new(vec![webhook(
        server.uri(),
        vec![WebhookEvent::OnFailed],
    )])
    .with_events(tx);

    let result = notifier.notify_fail(&sample_task(), "no seeders").await;
    assert!(result.is_err());

    match rx.recv().await.unwrap() {
        Event::WebhookFailed { url, error } => {
            assert_eq!(url, server.uri());
            assert!(error.contains("500"), "{error}");
        }
        other => panic!("unexpected event {other:?}"),
    }
}

#[tokio::test]
async fn test_slow_webhook_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
        .mount(&server)
        .await;

    let mut hook = webhook(server.uri(), vec![WebhookEvent::OnComplete]);
    hook.timeout = Duration::from_millis(100);
    let notifier = WebhookNotifier::new(vec![hook]);

    let err = notifier.notify_complete(&sample_task()).await.unwrap_err();
    assert!(err.to_string().contains("timed out"), "{err}");
}

#[tokio::test]
async fn test_summary_lists_started_codes() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_partial_json(serde_json::json!({
            "event": "subscription_summary",
            "category": "weekly",
            "started": ["A-1", "B-2"]
        })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let notifier = WebhookNotifier::new(vec![webhook(
        server.uri(),
        vec![WebhookEvent::OnSubscriptionSummary],
    )]);
    let summary = RunSummary {
        category: "weekly".into(),
        started: vec!["A-1".into(), "B-2".into()],
        ..Default::default()
    };

    notifier.notify_subscription_summary(&summary).await.unwrap();
}

#[tokio::test]
async fn test_noop_notifier_accepts_everything() {
    let notifier = NoopNotifier;
    notifier.notify_start(&sample_task()).await.unwrap();
    notifier
        .notify_subscription_summary(&RunSummary::default())
        .await
        .unwrap();
}

#[tokio::test]
async fn test_every_subscribed_webhook_is_attempted_from_spawned_task() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/down"))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&server)
        .await;
    for hook in ["/a", "/b", "/c", "/d", "/e"] {
        Mock::given(method("POST"))
            .and(path(hook))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;
    }

    let hooks = ["/a", "/down", "/b", "/c", "/d", "/e"]
        .iter()
        .map(|hook| webhook(format!("{}{}", server.uri(), hook), vec![WebhookEvent::OnComplete]))
        .collect();
    let notifier: std::sync::Arc<dyn Notifier> = std::sync::Arc::new(WebhookNotifier::new(hooks));

    let result = tokio::spawn(async move { notifier.notify_complete(&sample_task()).await })
        .await
        .unwrap();

    let err = result.unwrap_err();
    assert!(err.to_string().contains("503"), "{err}");
}
