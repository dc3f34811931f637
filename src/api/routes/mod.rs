//! Route handlers for the REST API
//!
//! Handlers are organized by domain:
//! - [`tasks`] — Starting, inspecting and controlling download tasks
//! - [`subscriptions`] — Ranking subscriptions and their quotas
//! - [`system`] — Health, events, OpenAPI

use crate::types::{DownloadTask, TaskFilter, TaskSource, TaskStatus};
use serde::{Deserialize, Serialize};

mod subscriptions;
mod system;
mod tasks;

// Re-export all handlers so `routes::function_name` works from the router
pub use subscriptions::*;
pub use system::*;
pub use tasks::*;

// ============================================================================
// Query/Request Types (shared across handlers)
// ============================================================================

/// Query parameters for GET /tasks
#[derive(Debug, Default, Deserialize, Serialize, utoipa::IntoParams, utoipa::ToSchema)]
#[into_params(parameter_in = Query)]
pub struct ListTasksQuery {
    /// Only tasks in this status (e.g. "failed")
    pub status: Option<String>,
    /// Only tasks from this source: "manual" or "subscription"
    pub source: Option<TaskSource>,
    /// Only tasks of this ranking category
    pub category: Option<String>,
    /// Maximum number of tasks to return (default: 20)
    pub limit: Option<i64>,
    /// Number of tasks to skip (default: 0)
    pub offset: Option<i64>,
}

impl ListTasksQuery {
    /// Default page size
    pub const DEFAULT_LIMIT: i64 = 20;

    /// Convert into a store filter, rejecting unknown statuses
    pub fn into_filter(self) -> Result<TaskFilter, String> {
        let status = self
            .status
            .as_deref()
            .map(str::parse::<TaskStatus>)
            .transpose()?;

        Ok(TaskFilter {
            status,
            source: self.source,
            category: self.category.filter(|c| !c.is_empty()),
            limit: self.limit.unwrap_or(Self::DEFAULT_LIMIT).max(1),
            offset: self.offset.unwrap_or(0).max(0),
        })
    }
}

/// Response for GET /tasks
#[derive(Debug, Deserialize, Serialize, utoipa::ToSchema)]
pub struct TaskListResponse {
    /// One page of tasks, newest first
    pub tasks: Vec<DownloadTask>,
    /// Number of tasks matching the filter across all pages
    pub total: i64,
}

/// Request body for PUT /tasks/by-code/:code/progress
#[derive(Debug, Deserialize, Serialize, utoipa::ToSchema)]
pub struct ProgressRequest {
    /// Completed fraction; values are clamped to 0.0..=1.0
    pub progress: f64,
}

/// Request body for PUT /subscriptions/:category
#[derive(Debug, Deserialize, Serialize, utoipa::ToSchema)]
pub struct UpdateSubscriptionRequest {
    /// Whether the scheduler should run it
    pub enabled: bool,
    /// Max task starts per hour (must be positive)
    pub hourly_limit: i64,
    /// Max task starts per day (must be positive)
    pub daily_limit: i64,
}
