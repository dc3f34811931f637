//! Subscription scheduling and periodic runs
//!
//! The scheduler wakes up every tick, reloads the subscriptions from the
//! database (so API changes are picked up without a restart) and runs every
//! enabled one whose `check_interval` has elapsed since its last run.
//!
//! # Example
//!
//! ```no_run
//! use rank_dl::{RankDownloader, config::Config};
//! use rank_dl::subscription_scheduler::SubscriptionScheduler;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let downloader = Arc::new(RankDownloader::new(Config::default()).await?);
//! let scheduler = SubscriptionScheduler::new(downloader.clone());
//!
//! // Runs until downloader.shutdown() is called
//! tokio::spawn(async move {
//!     scheduler.run().await;
//! });
//! # Ok(())
//! # }
//! ```

use crate::RankDownloader;
use crate::error::{Error, SubscriptionError};
use crate::types::Subscription;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::time::Duration;
use tracing::{debug, error, info, warn};

/// How often the scheduler looks for due subscriptions
const TICK: Duration = Duration::from_secs(30);

/// Periodically runs enabled subscriptions
pub struct SubscriptionScheduler {
    /// Orchestrator the runs go through; also carries config and shutdown state
    downloader: Arc<RankDownloader>,
}

impl SubscriptionScheduler {
    /// Creates a new subscription scheduler
    pub fn new(downloader: Arc<RankDownloader>) -> Self {
        Self { downloader }
    }

    /// Run the scheduling loop until shutdown
    pub async fn run(self) {
        info!("Subscription scheduler started");

        loop {
            if !self.downloader.is_accepting() {
                break;
            }

            let ran = self.run_due().await;
            if ran > 0 {
                debug!(ran, "Subscription scheduler tick finished");
            }

            if !self.downloader.pause_or_stop(TICK).await {
                break;
            }
        }

        info!("Subscription scheduler shutting down");
    }

    /// Run every due subscription once; returns how many were attempted
    pub async fn run_due(&self) -> usize {
        let subscriptions = match self.downloader.get_subscriptions().await {
            Ok(subscriptions) => subscriptions,
            Err(e) => {
                error!(error = %e, "Failed to load subscriptions");
                return 0;
            }
        };

        let now = Utc::now();
        let check_interval = self.downloader.get_config().subscriptions.check_interval;
        let mut attempted = 0;

        for subscription in subscriptions {
            if !subscription.enabled {
                debug!(category = %subscription.category, "Subscription disabled, skipping");
                continue;
            }
            if !is_due(&subscription, now, check_interval) {
                continue;
            }
            if !self.downloader.is_accepting() {
                break;
            }

            attempted += 1;
            match self.downloader.run_subscription(&subscription.category).await {
                Ok(summary) => info!(
                    category = %subscription.category,
                    started = summary.started.len(),
                    "Scheduled subscription run complete"
                ),
                Err(Error::Subscription(SubscriptionError::QuotaExceeded { .. })) => {
                    debug!(category = %subscription.category, "Subscription quota exhausted");
                }
                Err(e) => {
                    warn!(category = %subscription.category, error = %e, "Scheduled subscription run failed");
                }
            }
        }

        attempted
    }
}

/// Whether `check_interval` has elapsed since the subscription last ran
pub(crate) fn is_due(subscription: &Subscription, now: DateTime<Utc>, check_interval: Duration) -> bool {
    let Some(last_run) = subscription.last_run_at else {
        return true;
    };
    let interval = chrono::Duration::from_std(check_interval).unwrap_or(chrono::Duration::zero());
    last_run + interval <= now
}
