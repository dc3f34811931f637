//! Task orchestrator split into focused submodules.
//!
//! The `RankDownloader` struct and its methods are organized by domain:
//! - [`tasks`] - StartTask idempotency and execute dispatch
//! - [`execute`] - The asynchronous search/select/submit unit of work
//! - [`control`] - Cancel, retry, progress updates, reads and cleanup
//! - [`subscriptions`] - Subscription settings, quota status and runs
//! - [`notifications`] - Fire-and-forget notifier dispatch
//! - [`services`] - Background service starters
//! - [`lifecycle`] - Shutdown coordination

mod control;
mod execute;
mod lifecycle;
mod notifications;
mod services;
mod subscriptions;
mod tasks;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_helpers;
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use tokio::sync::{Mutex, broadcast};
use tokio_util::sync::CancellationToken;

use crate::backend::{DownloadBackendClient, QbittorrentClient};
use crate::config::Config;
use crate::db::Database;
use crate::error::Result;
use crate::indexer::{IndexerClient, JackettClient};
use crate::library::{CandidateFeed, OwnershipCheck};
use crate::notifier::{NoopNotifier, Notifier, WebhookNotifier};
use crate::types::{Event, TaskId};

/// The external services the orchestrator drives
///
/// Every field is a trait object so embedders (and tests) can swap any of
/// them without touching the orchestrator.
#[derive(Clone)]
pub struct Collaborators {
    /// Local-library lookup
    pub ownership: Arc<dyn OwnershipCheck>,
    /// Torrent search
    pub indexer: Arc<dyn IndexerClient>,
    /// Download daemon
    pub backend: Arc<dyn DownloadBackendClient>,
    /// Ranked items per category
    pub feed: Arc<dyn CandidateFeed>,
    /// Side-channel notifications
    pub notifier: Arc<dyn Notifier>,
}

/// In-process bookkeeping shared by every clone
#[derive(Clone)]
pub(crate) struct RuntimeState {
    /// Tasks whose execute unit of work is currently running
    pub(crate) active_tasks: Arc<Mutex<HashSet<TaskId>>>,
    /// Flag to indicate whether new work is accepted (set to false during shutdown)
    pub(crate) accepting_new: Arc<AtomicBool>,
    /// Cancelled on shutdown to stop the background loops
    pub(crate) shutdown: CancellationToken,
    /// Serializes subscription runs so concurrent runs cannot overspend a budget
    pub(crate) subscription_runs: Arc<Mutex<()>>,
}

/// Ranking-driven download orchestrator (cloneable - all fields are Arc-wrapped)
#[derive(Clone)]
pub struct RankDownloader {
    /// Database instance for persistence
    /// Public for integration tests to query task status
    pub db: Arc<Database>,
    /// Event broadcast channel sender (multiple subscribers supported)
    pub(crate) event_tx: broadcast::Sender<Event>,
    /// Configuration (wrapped in Arc for sharing across tasks)
    pub(crate) config: Arc<Config>,
    /// Indexer, backend, library and notifier
    pub(crate) collaborators: Collaborators,
    /// Shutdown and in-flight tracking
    pub(crate) runtime: RuntimeState,
}

impl RankDownloader {
    /// Create a new RankDownloader wired to Jackett and qBittorrent
    ///
    /// This initializes all core components:
    /// - Validates the configuration
    /// - Opens/creates the SQLite database and runs migrations
    /// - Builds the indexer and backend HTTP clients
    /// - Sets up the event broadcast channel and webhook notifier
    pub async fn new(config: Config) -> Result<Self> {
        config.validate()?;

        let db = Arc::new(Database::new(&config.persistence.database_path).await?);

        // Create broadcast channel with buffer size of 1000 events
        let (event_tx, _rx) = broadcast::channel(1000);

        let notifier: Arc<dyn Notifier> = if config.notifications.webhooks.is_empty() {
            Arc::new(NoopNotifier)
        } else {
            Arc::new(
                WebhookNotifier::new(config.notifications.webhooks.clone())
                    .with_events(event_tx.clone()),
            )
        };

        let collaborators = Collaborators {
            ownership: db.clone(),
            indexer: Arc::new(JackettClient::new(config.indexer.clone())?),
            backend: Arc::new(QbittorrentClient::new(config.backend.clone())?),
            feed: db.clone(),
            notifier,
        };

        tracing::info!(
            indexer = %config.indexer.url,
            backend = %config.backend.url,
            webhooks = config.notifications.webhooks.len(),
            "rank downloader initialized"
        );

        Ok(Self::assemble(config, db, event_tx, collaborators))
    }

    /// Create a RankDownloader over an open database and custom collaborators
    pub fn with_collaborators(config: Config, db: Database, collaborators: Collaborators) -> Self {
        let (event_tx, _rx) = broadcast::channel(1000);
        Self::assemble(config, Arc::new(db), event_tx, collaborators)
    }

    fn assemble(
        config: Config,
        db: Arc<Database>,
        event_tx: broadcast::Sender<Event>,
        collaborators: Collaborators,
    ) -> Self {
        Self {
            db,
            event_tx,
            config: Arc::new(config),
            collaborators,
            runtime: RuntimeState {
                active_tasks: Arc::new(Mutex::new(HashSet::new())),
                accepting_new: Arc::new(AtomicBool::new(true)),
                shutdown: CancellationToken::new(),
                subscription_runs: Arc::new(Mutex::new(())),
            },
        }
    }

    /// Subscribe to task and subscription events
    ///
    /// Multiple subscribers are supported. Each subscriber receives all events independently.
    /// A subscriber that falls behind by more than 1000 events receives `RecvError::Lagged`.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use rank_dl::{RankDownloader, Config};
    ///
    /// #[tokio::main]
    /// async fn main() -> Result<(), Box<dyn std::error::Error>> {
    ///     let downloader = RankDownloader::new(Config::default()).await?;
    ///
    ///     let mut events = downloader.subscribe();
    ///     tokio::spawn(async move {
    ///         while let Ok(event) = events.recv().await {
    ///             tracing::info!(event = event.name(), "task event");
    ///         }
    ///     });
    ///
    ///     Ok(())
    /// }
    /// ```
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// Get the current configuration
    pub fn get_config(&self) -> Arc<Config> {
        Arc::clone(&self.config)
    }

    /// Whether new tasks and subscription runs are accepted
    pub fn is_accepting(&self) -> bool {
        self.runtime
            .accepting_new
            .load(std::sync::atomic::Ordering::SeqCst)
    }

    /// Emit an event to all subscribers
    ///
    /// If there are no active subscribers the event is dropped.
    pub(crate) fn emit_event(&self, event: Event) {
        self.event_tx.send(event).ok();
    }

    /// Spawn the REST API server in a background task
    pub fn spawn_api_server(self: &Arc<Self>) -> tokio::task::JoinHandle<Result<()>> {
        let downloader = self.clone();
        let config = self.config.clone();

        tokio::spawn(async move { crate::api::start_api_server(downloader, config).await })
    }
}
