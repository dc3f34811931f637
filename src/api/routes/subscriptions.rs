//! Subscription handlers.

use super::UpdateSubscriptionRequest;
use crate::api::AppState;
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};

/// GET /subscriptions - List subscriptions
#[utoipa::path(
    get,
    path = "/api/v1/subscriptions",
    tag = "subscriptions",
    responses(
        (status = 200, description = "All subscriptions, by category", body = Vec<crate::types::Subscription>)
    )
)]
pub async fn list_subscriptions(State(state): State<AppState>) -> Response {
    match state.downloader.get_subscriptions().await {
        Ok(subscriptions) => Json(subscriptions).into_response(),
        Err(e) => e.into_response(),
    }
}

/// GET /subscriptions/:category - Settings plus current quota usage
///
/// An unknown category is provisioned disabled with the default limits.
#[utoipa::path(
    get,
    path = "/api/v1/subscriptions/{category}",
    tag = "subscriptions",
    params(("category" = String, Path, description = "Ranking category")),
    responses(
        (status = 200, description = "Subscription and window usage", body = crate::types::SubscriptionStatus)
    )
)]
pub async fn get_subscription(
    State(state): State<AppState>,
    Path(category): Path<String>,
) -> Response {
    match state.downloader.get_subscription_status(&category).await {
        Ok(status) => Json(status).into_response(),
        Err(e) => e.into_response(),
    }
}

/// PUT /subscriptions/:category - Create or update settings
#[utoipa::path(
    put,
    path = "/api/v1/subscriptions/{category}",
    tag = "subscriptions",
    params(("category" = String, Path, description = "Ranking category")),
    request_body = UpdateSubscriptionRequest,
    responses(
        (status = 200, description = "Stored subscription", body = crate::types::Subscription),
        (status = 400, description = "Limit is not positive", body = crate::error::ApiError)
    )
)]
pub async fn update_subscription(
    State(state): State<AppState>,
    Path(category): Path<String>,
    Json(request): Json<UpdateSubscriptionRequest>,
) -> Response {
    match state
        .downloader
        .update_subscription(
            &category,
            request.enabled,
            request.hourly_limit,
            request.daily_limit,
        )
        .await
    {
        Ok(subscription) => Json(subscription).into_response(),
        Err(e) => e.into_response(),
    }
}

/// DELETE /subscriptions/:category - Delete a subscription
#[utoipa::path(
    delete,
    path = "/api/v1/subscriptions/{category}",
    tag = "subscriptions",
    params(("category" = String, Path, description = "Ranking category")),
    responses(
        (status = 204, description = "Subscription deleted"),
        (status = 404, description = "Subscription not found", body = crate::error::ApiError)
    )
)]
pub async fn delete_subscription(
    State(state): State<AppState>,
    Path(category): Path<String>,
) -> Response {
    match state.downloader.delete_subscription(&category).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => e.into_response(),
    }
}

/// POST /subscriptions/:category/run - Run a subscription now
#[utoipa::path(
    post,
    path = "/api/v1/subscriptions/{category}/run",
    tag = "subscriptions",
    params(("category" = String, Path, description = "Ranking category")),
    responses(
        (status = 200, description = "Run outcome", body = crate::types::RunSummary),
        (status = 404, description = "Subscription not found", body = crate::error::ApiError),
        (status = 409, description = "Subscription disabled", body = crate::error::ApiError),
        (status = 429, description = "Hourly or daily quota used up", body = crate::error::ApiError)
    )
)]
pub async fn run_subscription(
    State(state): State<AppState>,
    Path(category): Path<String>,
) -> Response {
    match state.downloader.run_subscription(&category).await {
        Ok(summary) => Json(summary).into_response(),
        Err(e) => e.into_response(),
    }
}
