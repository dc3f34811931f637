//! OpenAPI documentation and schema generation
//!
//! This module defines the OpenAPI specification for the rank-dl REST API
//! using utoipa for compile-time spec generation.

use utoipa::OpenApi;

/// OpenAPI documentation for the rank-dl REST API
///
/// The spec can be accessed via:
/// - `/api/v1/openapi.json` - JSON format OpenAPI specification
/// - `/swagger-ui` - Interactive Swagger UI documentation
#[derive(OpenApi)]
#[openapi(
    info(
        title = "rank-dl REST API",
        version = "0.1.0",
        description = "Start ranking-driven torrent downloads, follow their lifecycle, and manage per-category subscriptions with hourly and daily quotas",
        license(
            name = "MIT OR Apache-2.0"
        )
    ),
    servers(
        (url = "http://localhost:6790/api/v1", description = "Local development server")
    ),
    paths(
        // Tasks
        crate::api::routes::start_task,
        crate::api::routes::list_tasks,
        crate::api::routes::task_stats,
        crate::api::routes::get_task,
        crate::api::routes::get_task_by_code,
        crate::api::routes::update_progress,
        crate::api::routes::cancel_task,
        crate::api::routes::retry_task,
        crate::api::routes::delete_task,

        // Subscriptions
        crate::api::routes::list_subscriptions,
        crate::api::routes::get_subscription,
        crate::api::routes::update_subscription,
        crate::api::routes::delete_subscription,
        crate::api::routes::run_subscription,

        // System
        crate::api::routes::health_check,
        crate::api::routes::openapi_spec,
        crate::api::routes::event_stream,
    ),
    components(schemas(
        // Core types from types.rs
        crate::types::TaskId,
        crate::types::TaskStatus,
        crate::types::TaskSource,
        crate::types::WindowKind,
        crate::types::DownloadTask,
        crate::types::StartTaskRequest,
        crate::types::TaskStats,
        crate::types::Subscription,
        crate::types::LimitStatus,
        crate::types::SubscriptionStatus,
        crate::types::RunSummary,
        crate::types::Candidate,
        crate::types::FeedItem,
        crate::types::Event,

        // Webhook body
        crate::notifier::WebhookPayload,

        // API request/response types from routes
        crate::api::routes::ListTasksQuery,
        crate::api::routes::TaskListResponse,
        crate::api::routes::ProgressRequest,
        crate::api::routes::UpdateSubscriptionRequest,

        // Error types from error.rs
        crate::error::ApiError,
        crate::error::ErrorDetail,
    )),
    tags(
        (name = "tasks", description = "Download tasks - Start, list, cancel, retry and report progress"),
        (name = "subscriptions", description = "Subscriptions - Per-category ranking subscriptions and quotas"),
        (name = "system", description = "System endpoints - Health checks, OpenAPI spec, events"),
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

/// Security addon to add API key authentication scheme to OpenAPI spec
struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = &mut openapi.components {
            components.add_security_scheme(
                "api_key",
                utoipa::openapi::security::SecurityScheme::ApiKey(
                    utoipa::openapi::security::ApiKey::Header(
                        utoipa::openapi::security::ApiKeyValue::new("X-Api-Key"),
                    ),
                ),
            );
        }
    }
}
