use super::*;
use crate::downloader::test_helpers::{
    TestContext, create_test_downloader, create_test_downloader_with, wait_for_status, wait_idle,
};
use crate::types::{TaskStatus, TaskId};
use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use serde_json::Value;
use std::time::Duration;
use tower::ServiceExt;


/// Router plus the fakes behind it
struct TestApp {
    app: Router,
    ctx: TestContext,
    downloader: Arc<RankDownloader>,
}

impl TestApp {
    async fn new() -> Self {
        Self::from_context(create_test_downloader().await)
    }

    async fn with(adjust: impl FnOnce(&mut Config)) -> Self {
        Self::from_context(create_test_downloader_with(adjust).await)
    }

    fn from_context(ctx: TestContext) -> Self {
        let downloader = Arc::new(ctx.downloader.clone());
        let app = create_router(downloader.clone(), downloader.get_config());
        Self {
            app,
            ctx,
            downloader,
        }
    }

    async fn send(&self, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(json) => {
                builder = builder.header("content-type", "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };

        let response = self
            .app
            .clone()
            .oneshot(builder.body(body).unwrap())
            .await
            .unwrap();

        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }

    async fn get(&self, uri: &str) -> (StatusCode, Value) {
        self.send(Method::GET, uri, None).await
    }
}

#[tokio::test]
async fn server_stops_when_downloader_shuts_down() {
    let ctx = create_test_downloader_with(|config| {
        config.api.bind_address = "127.0.0.1:0".parse().unwrap();
    })
    .await;
    let downloader = Arc::new(ctx.downloader.clone());

    let server = downloader.spawn_api_server();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(!server.is_finished());

    downloader.shutdown().await.unwrap();

    let result = tokio::time::timeout(Duration::from_secs(5), server)
        .await
        .expect("server did not stop")
        .unwrap();
    assert!(result.is_ok());
}

#[tokio::test]
async fn routes_live_under_api_prefix() {
    let app = TestApp::new().await;

    let (status, _) = app.get("/api/v1/health").await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app.get("/health").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn api_key_guards_every_route() {
    let app = TestApp::with(|config| config.api.api_key = Some("s3cret".into())).await;

    let (status, body) = app.get("/api/v1/tasks").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "unauthorized");

    let request = Request::builder()
        .uri("/api/v1/tasks")
        .header("X-Api-Key", "s3cret")
        .body(Body::empty())
        .unwrap();
    let response = app.app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn cors_headers_follow_configured_origins() {
    let app = TestApp::with(|config| {
        config.api.cors_origins = vec!["http://dashboard.local".into()];
    })
    .await;

    let request = Request::builder()
        .uri("/api/v1/health")
        .header("Origin", "http://dashboard.local")
        .body(Body::empty())
        .unwrap();
    let response = app.app.clone().oneshot(request).await.unwrap();

    assert_eq!(
        response
            .headers()
            .get("access-control-allow-origin")
            .and_then(|v| v.to_str().ok()),
        Some("http://dashboard.local")
    );
}

#[tokio::test]
async fn cors_disabled_sends_no_headers() {
    let app = TestApp::with(|config| config.api.cors_enabled = false).await;

    let request = Request::builder()
        .uri("/api/v1/health")
        .header("Origin", "http://dashboard.local")
        .body(Body::empty())
        .unwrap();
    let response = app.app.clone().oneshot(request).await.unwrap();

    assert!(response.headers().get("access-control-allow-origin").is_none());
}

#[tokio::test]
async fn swagger_ui_can_be_disabled() {
    let enabled = TestApp::new().await;
    let request = Request::builder()
        .uri("/swagger-ui/")
        .body(Body::empty())
        .unwrap();
    let response = enabled.app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let disabled = TestApp::with(|config| config.api.swagger_ui = false).await;
    let request = Request::builder()
        .uri("/swagger-ui/")
        .body(Body::empty())
        .unwrap();
    let response = disabled.app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
