//! Error types for rank-dl
//!
//! This module provides the error taxonomy for the orchestrator:
//! - Task errors (already owned, not found, illegal transitions, no candidates, backend rejection)
//! - Subscription errors (missing, disabled, quota exceeded)
//! - Store errors, which are always fatal to the current operation
//! - HTTP status mapping and structured error bodies for the REST API

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use utoipa::ToSchema;

use crate::types::TaskId;

/// Result type alias for rank-dl operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for rank-dl
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration or input validation error
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the problem
        message: String,
        /// The setting or field that caused the error (e.g., "hourly_limit")
        key: Option<String>,
    },

    /// Database operation failed
    #[error("database error: {0}")]
    Database(#[from] DatabaseError),

    /// SQLx database error
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    /// Task lifecycle error
    #[error("task error: {0}")]
    Task(#[from] TaskError),

    /// Subscription error
    #[error("subscription error: {0}")]
    Subscription(#[from] SubscriptionError),

    /// The indexer answered with an error
    #[error("indexer error: {0}")]
    Indexer(String),

    /// The download backend answered with an error
    #[error("download backend error: {0}")]
    Backend(String),

    /// A call to an external service did not finish in time
    #[error("{operation} timed out after {after:?}")]
    Timeout {
        /// What was being attempted (e.g., "indexer search")
        operation: String,
        /// The configured bound that elapsed
        after: Duration,
    },

    /// Network error (HTTP requests to the indexer, backend or webhooks)
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// API server failed to start or bind
    #[error("API server error: {0}")]
    ApiServerError(String),

    /// Shutdown in progress - not accepting new tasks
    #[error("shutdown in progress: not accepting new tasks")]
    ShuttingDown,

    /// Generic error for other cases
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Whether this error means the durable store could not complete the operation
    pub fn is_store_unavailable(&self) -> bool {
        matches!(self, Error::Database(_) | Error::Sqlx(_))
    }
}

/// Database-specific errors
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Failed to connect to database
    #[error("failed to connect to database: {0}")]
    ConnectionFailed(String),

    /// Failed to run database migration
    #[error("failed to run migration: {0}")]
    MigrationFailed(String),

    /// Query execution failed
    #[error("query failed: {0}")]
    QueryFailed(String),

    /// Database constraint violation
    #[error("constraint violation: {0}")]
    ConstraintViolation(String),
}

/// Errors raised by task lifecycle operations
#[derive(Debug, Error)]
pub enum TaskError {
    /// The item is already in the local library, or a completed task exists for it
    #[error("{code} is already owned")]
    AlreadyOwned {
        /// The catalogue item identifier
        code: String,
    },

    /// No task matches the given id or code
    #[error("task {key} not found")]
    NotFound {
        /// The id or code that was looked up
        key: String,
    },

    /// The requested operation is illegal from the task's current status
    #[error("cannot {operation} task {id}: current status is {current_state}")]
    InvalidTransition {
        /// The task ID
        id: TaskId,
        /// The operation that was attempted (e.g., "cancel", "retry")
        operation: String,
        /// The status the task was in
        current_state: String,
    },

    /// The indexer returned nothing usable for the code
    #[error("no available torrent for {code}")]
    NoCandidates {
        /// The search key
        code: String,
    },

    /// The download backend rejected the transport link
    #[error("add to downloader failed: {reason}")]
    BackendSubmitFailed {
        /// Error text reported by the backend
        reason: String,
    },
}

impl TaskError {
    /// Build a not-found error for a numeric task id
    pub fn not_found_id(id: TaskId) -> Self {
        TaskError::NotFound {
            key: id.to_string(),
        }
    }

    /// Build a not-found error for a catalogue code
    pub fn not_found_code(code: impl Into<String>) -> Self {
        TaskError::NotFound { key: code.into() }
    }
}

/// Errors raised by subscription operations
#[derive(Debug, Error)]
pub enum SubscriptionError {
    /// No subscription exists for the category
    #[error("subscription {category} not found")]
    NotFound {
        /// The rank category
        category: String,
    },

    /// The subscription exists but is switched off
    #[error("subscription {category} is disabled")]
    Disabled {
        /// The rank category
        category: String,
    },

    /// The hourly or daily window is exhausted
    #[error(
        "download quota exceeded (hourly {hourly_used}/{hourly_limit}, daily {daily_used}/{daily_limit})"
    )]
    QuotaExceeded {
        /// Tasks started in the current hourly window
        hourly_used: i64,
        /// Hourly limit
        hourly_limit: i64,
        /// Tasks started in the current daily window
        daily_used: i64,
        /// Daily limit
        daily_limit: i64,
    },
}

/// API error response format
///
/// Returned as the JSON body of every failed REST request.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ApiError {
    /// Error details
    pub error: ErrorDetail,
}

/// Detailed error information for API responses
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorDetail {
    /// Machine-readable error code (e.g., "task_not_found")
    pub code: String,

    /// Human-readable error message
    pub message: String,

    /// Additional context (optional)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    /// Create a new API error with code and message
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: ErrorDetail {
                code: code.into(),
                message: message.into(),
                details: None,
            },
        }
    }

    /// Create an API error with additional details
    pub fn with_details(
        code: impl Into<String>,
        message: impl Into<String>,
        details: serde_json::Value,
    ) -> Self {
        Self {
            error: ErrorDetail {
                code: code.into(),
                message: message.into(),
                details: Some(details),
            },
        }
    }

    /// Create a "validation error" error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new("validation_error", message)
    }

    /// Create an "unauthorized" error
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new("unauthorized", message)
    }
}

/// Trait for converting errors to HTTP status codes
pub trait ToHttpStatus {
    /// Get the HTTP status code for this error
    fn status_code(&self) -> u16;

    /// Get the machine-readable error code
    fn error_code(&self) -> &str;
}

impl ToHttpStatus for Error {
    fn status_code(&self) -> u16 {
        match self {
            Error::Config { .. } => 400,

            Error::Task(TaskError::NotFound { .. }) => 404,
            Error::Subscription(SubscriptionError::NotFound { .. }) => 404,

            Error::Task(TaskError::AlreadyOwned { .. }) => 409,
            Error::Task(TaskError::InvalidTransition { .. }) => 409,
            Error::Subscription(SubscriptionError::Disabled { .. }) => 409,

            Error::Task(TaskError::NoCandidates { .. }) => 422,

            Error::Subscription(SubscriptionError::QuotaExceeded { .. }) => 429,

            Error::Database(_) | Error::Sqlx(_) => 503,
            Error::ShuttingDown => 503,

            Error::Task(TaskError::BackendSubmitFailed { .. }) => 502,
            Error::Indexer(_) | Error::Backend(_) | Error::Network(_) => 502,
            Error::Timeout { .. } => 504,

            Error::Io(_) | Error::Serialization(_) | Error::ApiServerError(_) | Error::Other(_) => {
                500
            }
        }
    }

    fn error_code(&self) -> &str {
        match self {
            Error::Config { .. } => "validation_error",
            Error::Database(_) | Error::Sqlx(_) => "store_unavailable",
            Error::Task(e) => match e {
                TaskError::AlreadyOwned { .. } => "already_owned",
                TaskError::NotFound { .. } => "task_not_found",
                TaskError::InvalidTransition { .. } => "invalid_transition",
                TaskError::NoCandidates { .. } => "no_candidates",
                TaskError::BackendSubmitFailed { .. } => "backend_submit_failed",
            },
            Error::Subscription(e) => match e {
                SubscriptionError::NotFound { .. } => "subscription_not_found",
                SubscriptionError::Disabled { .. } => "subscription_disabled",
                SubscriptionError::QuotaExceeded { .. } => "quota_exceeded",
            },
            Error::Indexer(_) => "indexer_error",
            Error::Backend(_) => "backend_error",
            Error::Timeout { .. } => "timeout",
            Error::Network(_) => "network_error",
            Error::Io(_) => "io_error",
            Error::Serialization(_) => "serialization_error",
            Error::ApiServerError(_) => "api_server_error",
            Error::ShuttingDown => "shutting_down",
            Error::Other(_) => "internal_error",
        }
    }
}

impl From<Error> for ApiError {
    fn from(error: Error) -> Self {
        let code = error.error_code().to_string();
        // Domain errors are already classified by `code`; drop the wrapper prefix
        let message = match &error {
            Error::Task(e) => e.to_string(),
            Error::Subscription(e) => e.to_string(),
            other => other.to_string(),
        };

        let details = match &error {
            Error::Config { key: Some(key), .. } => Some(serde_json::json!({ "key": key })),
            Error::Task(TaskError::AlreadyOwned { code }) => {
                Some(serde_json::json!({ "code": code }))
            }
            Error::Task(TaskError::InvalidTransition {
                id,
                operation,
                current_state,
            }) => Some(serde_json::json!({
                "task_id": id,
                "operation": operation,
                "current_state": current_state,
            })),
            Error::Subscription(SubscriptionError::QuotaExceeded {
                hourly_used,
                hourly_limit,
                daily_used,
                daily_limit,
            }) => Some(serde_json::json!({
                "hourly_used": hourly_used,
                "hourly_limit": hourly_limit,
                "daily_used": daily_used,
                "daily_limit": daily_limit,
            })),
            _ => None,
        };

        match details {
            Some(details) => ApiError::with_details(code, message, details),
            None => ApiError::new(code, message),
        }
    }
}
