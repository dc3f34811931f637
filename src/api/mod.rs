//! REST API server module
//!
//! Provides an OpenAPI 3.1 compliant REST API for starting and inspecting
//! download tasks, managing ranking subscriptions, and following events.

use crate::{Config, RankDownloader, Result};
use axum::{
    Router,
    http::HeaderValue,
    middleware,
    routing::{get, post, put},
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

pub mod auth;
pub mod error_response;
pub mod openapi;
pub mod routes;
pub mod state;

pub use openapi::ApiDoc;
pub use state::AppState;

/// Prefix every route is served under
pub const API_PREFIX: &str = "/api/v1";

/// Create the API router with all route definitions
///
/// All routes live under [`API_PREFIX`].
///
/// # Routes
///
/// ## Tasks
/// - `POST /tasks` - Start a task for a catalogue item
/// - `GET /tasks` - List tasks (filter by status, source, category; paginated)
/// - `GET /tasks/stats` - Per-status and per-source counts
/// - `GET /tasks/by-code/:code` - Current task for an item
/// - `PUT /tasks/by-code/:code/progress` - Report backend progress
/// - `GET /tasks/:id` - Get single task
/// - `POST /tasks/:id/cancel` - Cancel an active task
/// - `POST /tasks/:id/retry` - Retry a failed task
/// - `DELETE /tasks/:id` - Remove a finished task
///
/// ## Subscriptions
/// - `GET /subscriptions` - List subscriptions
/// - `GET /subscriptions/:category` - Settings plus current quota usage
/// - `PUT /subscriptions/:category` - Create/update settings
/// - `DELETE /subscriptions/:category` - Delete a subscription
/// - `POST /subscriptions/:category/run` - Run now
///
/// ## System
/// - `GET /health` - Health check
/// - `GET /openapi.json` - OpenAPI specification
/// - `GET /swagger-ui` - Interactive Swagger UI documentation (if enabled)
/// - `GET /events` - Server-sent events stream
pub fn create_router(downloader: Arc<RankDownloader>, config: Arc<Config>) -> Router {
    let state = AppState::new(downloader, config.clone());

    let api = Router::new()
        // Tasks
        .route("/tasks", post(routes::start_task).get(routes::list_tasks))
        .route("/tasks/stats", get(routes::task_stats))
        .route("/tasks/by-code/:code", get(routes::get_task_by_code))
        .route(
            "/tasks/by-code/:code/progress",
            put(routes::update_progress),
        )
        .route(
            "/tasks/:id",
            get(routes::get_task).delete(routes::delete_task),
        )
        .route("/tasks/:id/cancel", post(routes::cancel_task))
        .route("/tasks/:id/retry", post(routes::retry_task))
        // Subscriptions
        .route("/subscriptions", get(routes::list_subscriptions))
        .route(
            "/subscriptions/:category",
            get(routes::get_subscription)
                .put(routes::update_subscription)
                .delete(routes::delete_subscription),
        )
        .route(
            "/subscriptions/:category/run",
            post(routes::run_subscription),
        )
        // System
        .route("/health", get(routes::health_check))
        .route("/openapi.json", get(routes::openapi_spec))
        .route("/events", get(routes::event_stream));

    let router = Router::new().nest(API_PREFIX, api);

    // SwaggerUi serves its own copy of the document; it cannot share the
    // path of the /openapi.json route without a routing conflict.
    let router = if config.api.swagger_ui {
        router.merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
    } else {
        router
    };

    let router = router.with_state(state);

    // The last layer applied is the outermost: CORS answers preflights
    // before auth runs, and the trace span wraps everything.
    let router = if config.api.api_key.is_some() {
        router.layer(middleware::from_fn_with_state(
            config.api.api_key.clone(),
            auth::require_api_key,
        ))
    } else {
        router
    };

    let router = if config.api.cors_enabled {
        router.layer(build_cors_layer(&config.api.cors_origins))
    } else {
        router
    };

    router.layer(TraceLayer::new_for_http())
}

/// Build a CORS layer based on configured origins
///
/// `"*"` or an empty list allows any origin; otherwise only the listed
/// origins are allowed. Methods and headers are always unrestricted.
fn build_cors_layer(origins: &[String]) -> CorsLayer {
    let allow_any = origins.iter().any(|o| o == "*");

    if allow_any || origins.is_empty() {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let allowed: Vec<HeaderValue> = origins.iter().filter_map(|o| o.parse().ok()).collect();

        CorsLayer::new()
            .allow_origin(AllowOrigin::list(allowed))
            .allow_methods(Any)
            .allow_headers(Any)
    }
}

/// Start the API server on the configured bind address.
///
/// Runs until the listener fails or the downloader shuts down.
///
/// # Example
///
/// ```no_run
/// use rank_dl::{RankDownloader, Config};
/// use std::sync::Arc;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = Arc::new(Config::default());
/// let downloader = Arc::new(RankDownloader::new((*config).clone()).await?);
///
/// // Start API server (blocks until shutdown)
/// rank_dl::api::start_api_server(downloader, config).await?;
/// # Ok(())
/// # }
/// ```
pub async fn start_api_server(downloader: Arc<RankDownloader>, config: Arc<Config>) -> Result<()> {
    let bind_address = config.api.bind_address;
    let shutdown = downloader.runtime.shutdown.clone();

    tracing::info!(address = %bind_address, "Starting API server");

    let app = create_router(downloader, config);

    let listener = TcpListener::bind(bind_address)
        .await
        .map_err(crate::error::Error::Io)?;

    tracing::info!(address = %bind_address, "API server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .map_err(|e| crate::error::Error::ApiServerError(e.to_string()))?;

    tracing::info!("API server stopped");
    Ok(())
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;
