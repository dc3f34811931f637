//! # rank-dl
//!
//! Ranking-driven download orchestrator.
//!
//! rank-dl turns "I want item ABC-123" into a torrent running in a download
//! client. For every request it checks the local library, searches a
//! Torznab indexer, picks the best candidate, hands its link to the download
//! client and tracks the task until it completes. Per-category subscriptions
//! walk a ranking feed on a schedule and start tasks for the top items,
//! bounded by hourly and daily quotas.
//!
//! ## Design
//!
//! - **One task per item** - A unique index keeps at most one live task per
//!   catalogue code, even under concurrent requests
//! - **Explicit state machine** - Every status change is a compare-and-set
//!   against the allowed predecessor statuses
//! - **Pluggable collaborators** - Indexer, download client, library and
//!   notifier sit behind traits
//! - **Event-driven** - Consumers subscribe to events, no polling required
//!
//! ## Quick Start
//!
//! ```no_run
//! use rank_dl::{Config, RankDownloader, StartTaskRequest};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut config = Config::default();
//!     config.indexer.url = "http://localhost:9117".to_string();
//!     config.indexer.api_key = "jackett-key".to_string();
//!     config.backend.url = "http://localhost:8080".to_string();
//!
//!     let downloader = RankDownloader::new(config).await?;
//!
//!     // Subscribe to events
//!     let mut events = downloader.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("{}: {:?}", event.name(), event);
//!         }
//!     });
//!
//!     let task = downloader
//!         .start_task(StartTaskRequest {
//!             code: "ABC-123".to_string(),
//!             ..Default::default()
//!         })
//!         .await?;
//!     println!("task {} is {}", task.id, task.status);
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// REST API module
pub mod api;
/// Download client integration
pub mod backend;
/// Configuration types
pub mod config;
/// Database persistence layer
pub mod db;
/// Core orchestrator implementation (decomposed into focused submodules)
pub mod downloader;
/// Error types
pub mod error;
/// Torrent indexer integration
pub mod indexer;
/// Local library ownership and ranking feed
pub mod library;
/// Task and subscription notifications
pub mod notifier;
/// Hourly and daily quota windows
pub mod rate_limit;
/// Retry logic with exponential backoff
pub mod retry;
/// Candidate selection
pub mod selector;
/// Periodic subscription runs
pub mod subscription_scheduler;
/// Core types and events
pub mod types;

// Re-export commonly used types
pub use backend::{DownloadBackendClient, QbittorrentClient};
pub use config::Config;
pub use db::Database;
pub use downloader::{Collaborators, RankDownloader};
pub use error::{
    ApiError, DatabaseError, Error, ErrorDetail, Result, SubscriptionError, TaskError,
    ToHttpStatus,
};
pub use indexer::{IndexerClient, JackettClient};
pub use library::{CandidateFeed, OwnershipCheck};
pub use notifier::{NoopNotifier, Notifier, WebhookNotifier};
pub use types::{
    Candidate, DownloadTask, Event, FeedItem, LimitStatus, RunSummary, StartTaskRequest,
    Subscription, SubscriptionStatus, TaskFilter, TaskId, TaskSource, TaskStats, TaskStatus,
};

/// Helper function to run the downloader with graceful signal handling.
///
/// Waits for a termination signal and then calls the downloader's `shutdown()` method.
///
/// - **Unix:** listens for SIGTERM and SIGINT, with fallbacks if signal registration fails.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
///
/// # Example
///
/// ```no_run
/// use rank_dl::{RankDownloader, Config, run_with_shutdown};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let config = Config::default();
///     let downloader = RankDownloader::new(config).await?;
///     downloader.start_background_services();
///
///     // Run with automatic signal handling
///     run_with_shutdown(downloader).await?;
///
///     Ok(())
/// }
/// ```
pub async fn run_with_shutdown(downloader: RankDownloader) -> Result<()> {
    wait_for_signal().await;
    downloader.shutdown().await
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // Set up signal handlers - these may fail in restricted environments (containers, tests)
    let sigterm_result = signal(SignalKind::terminate());
    let sigint_result = signal(SignalKind::interrupt());

    match (sigterm_result, sigint_result) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => {
                    tracing::info!("Received SIGTERM signal");
                }
                _ = sigint.recv() => {
                    tracing::info!("Received SIGINT signal (Ctrl+C)");
                }
            }
        }
        (Err(e), _) => {
            tracing::warn!(error = %e, "Could not register SIGTERM handler, waiting for SIGINT only");
            if let Ok(mut sigint) = signal(SignalKind::interrupt()) {
                sigint.recv().await;
                tracing::info!("Received SIGINT signal (Ctrl+C)");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
        (_, Err(e)) => {
            tracing::warn!(error = %e, "Could not register SIGINT handler, waiting for SIGTERM only");
            if let Ok(mut sigterm) = signal(SignalKind::terminate()) {
                sigterm.recv().await;
                tracing::info!("Received SIGTERM signal");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::info!("Received Ctrl+C signal");
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C signal");
        }
    }
}
