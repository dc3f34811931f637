//! Subscription settings, quota status and runs.

use std::sync::atomic::Ordering;

use chrono::Local;

use crate::db::UpsertSubscriptionParams;
use crate::error::{Error, Result, SubscriptionError, TaskError};
use crate::rate_limit::{limit_status, remaining_budget};
use crate::types::{
    Event, LimitStatus, RunSummary, StartTaskRequest, Subscription, SubscriptionStatus,
    TaskSource, WindowKind,
};

use super::RankDownloader;

fn validate_limits(hourly_limit: i64, daily_limit: i64) -> Result<()> {
    for (key, value) in [("hourly_limit", hourly_limit), ("daily_limit", daily_limit)] {
        if value <= 0 {
            return Err(Error::Config {
                message: format!("{} must be greater than 0, got {}", key, value),
                key: Some(key.to_string()),
            });
        }
    }
    Ok(())
}

impl RankDownloader {
    /// All subscriptions, ordered by category
    pub async fn get_subscriptions(&self) -> Result<Vec<Subscription>> {
        let rows = self.db.list_subscriptions().await?;
        Ok(rows.into_iter().map(Subscription::from).collect())
    }

    /// A subscription and its current quota usage
    ///
    /// A category seen for the first time is provisioned as a disabled
    /// subscription with the configured default limits.
    pub async fn get_subscription_status(&self, category: &str) -> Result<SubscriptionStatus> {
        let defaults = &self.config.subscriptions;
        let row = self
            .db
            .ensure_subscription(UpsertSubscriptionParams {
                category,
                enabled: false,
                hourly_limit: defaults.default_hourly_limit,
                daily_limit: defaults.default_daily_limit,
            })
            .await?;

        let limits = self
            .current_limits(category, row.hourly_limit, row.daily_limit)
            .await?;

        Ok(SubscriptionStatus {
            subscription: row.into(),
            limits,
        })
    }

    /// Create or update a subscription's settings
    ///
    /// # Errors
    ///
    /// [`Error::Config`] if either limit is not positive or the category is blank.
    pub async fn update_subscription(
        &self,
        category: &str,
        enabled: bool,
        hourly_limit: i64,
        daily_limit: i64,
    ) -> Result<Subscription> {
        if category.trim().is_empty() {
            return Err(Error::Config {
                message: "category must not be empty".to_string(),
                key: Some("category".to_string()),
            });
        }
        validate_limits(hourly_limit, daily_limit)?;

        self.db
            .upsert_subscription(UpsertSubscriptionParams {
                category,
                enabled,
                hourly_limit,
                daily_limit,
            })
            .await?;

        tracing::info!(category, enabled, hourly_limit, daily_limit, "subscription updated");

        self.db
            .get_subscription(category)
            .await?
            .map(Subscription::from)
            .ok_or_else(|| {
                SubscriptionError::NotFound {
                    category: category.to_string(),
                }
                .into()
            })
    }

    /// Delete a subscription; its quota windows expire on their own
    pub async fn delete_subscription(&self, category: &str) -> Result<()> {
        if !self.db.delete_subscription(category).await? {
            return Err(SubscriptionError::NotFound {
                category: category.to_string(),
            }
            .into());
        }
        tracing::info!(category, "subscription deleted");
        Ok(())
    }

    /// Usage of the hourly and daily windows covering now
    pub(crate) async fn current_limits(
        &self,
        category: &str,
        hourly_limit: i64,
        daily_limit: i64,
    ) -> Result<LimitStatus> {
        let now = Local::now();
        let hourly = self
            .db
            .get_or_create_window(category, WindowKind::Hourly, &now)
            .await?;
        let daily = self
            .db
            .get_or_create_window(category, WindowKind::Daily, &now)
            .await?;

        Ok(limit_status(hourly.count, hourly_limit, daily.count, daily_limit))
    }

    /// Start tasks for the category's top-ranked items, within quota
    ///
    /// Items already owned or with an active task are skipped. Each started
    /// task counts against both windows. Per-item failures are logged and
    /// counted; the run carries on.
    ///
    /// # Errors
    ///
    /// - [`SubscriptionError::NotFound`] / [`SubscriptionError::Disabled`]
    /// - [`SubscriptionError::QuotaExceeded`] when the budget is zero; `last_run_at` is still updated
    /// - store failures, including failing to count a started task
    pub async fn run_subscription(&self, category: &str) -> Result<RunSummary> {
        if !self.runtime.accepting_new.load(Ordering::SeqCst) {
            return Err(Error::ShuttingDown);
        }

        let _guard = self.runtime.subscription_runs.lock().await;

        let subscription: Subscription = self
            .db
            .get_subscription(category)
            .await?
            .ok_or_else(|| SubscriptionError::NotFound {
                category: category.to_string(),
            })?
            .into();
        if !subscription.enabled {
            return Err(SubscriptionError::Disabled {
                category: category.to_string(),
            }
            .into());
        }

        let limits = self
            .current_limits(category, subscription.hourly_limit, subscription.daily_limit)
            .await?;
        let budget = remaining_budget(&limits);
        if budget == 0 {
            self.db.record_subscription_run(category, 0).await?;
            tracing::info!(
                category,
                hourly_used = limits.hourly_used,
                daily_used = limits.daily_used,
                "subscription quota exhausted"
            );
            return Err(SubscriptionError::QuotaExceeded {
                hourly_used: limits.hourly_used,
                hourly_limit: limits.hourly_limit,
                daily_used: limits.daily_used,
                daily_limit: limits.daily_limit,
            }
            .into());
        }

        let items = self
            .collaborators
            .feed
            .list_by_category(category, self.config.subscriptions.feed_limit)
            .await?;

        tracing::info!(category, budget, items = items.len(), "subscription run started");

        let mut summary = RunSummary {
            category: category.to_string(),
            budget,
            ..Default::default()
        };
        let mut attempted = 0usize;

        for item in items {
            if summary.started.len() as i64 >= budget {
                break;
            }

            if item.locally_owned {
                tracing::debug!(category, code = %item.code, "already owned, skipping");
                summary.skipped += 1;
                continue;
            }
            if let Some(existing) = self.db.get_task_by_code(&item.code).await? {
                if existing.status().is_active() {
                    tracing::debug!(category, code = %item.code, "task already active, skipping");
                    summary.skipped += 1;
                    continue;
                }
            }

            if attempted > 0 {
                tokio::time::sleep(self.config.subscriptions.item_delay).await;
            }
            attempted += 1;

            let request = StartTaskRequest {
                code: item.code.clone(),
                title: item.title,
                cover_url: item.cover_url,
                source: TaskSource::Subscription,
                category: category.to_string(),
            };

            match self.start_task(request).await {
                Ok(task) => {
                    self.db.increment_windows(category, &Local::now()).await?;
                    tracing::debug!(category, code = %task.code, task_id = %task.id, "subscription task started");
                    summary.started.push(task.code);
                }
                Err(Error::Task(TaskError::AlreadyOwned { .. })) => {
                    tracing::debug!(category, code = %item.code, "already owned, skipping");
                    summary.skipped += 1;
                }
                Err(Error::ShuttingDown) => {
                    tracing::info!(category, "shutdown during subscription run");
                    break;
                }
                Err(e) if e.is_store_unavailable() => return Err(e),
                Err(e) => {
                    tracing::warn!(category, code = %item.code, error = %e, "subscription item failed");
                    summary.failed += 1;
                }
            }
        }

        self.db
            .record_subscription_run(category, summary.started.len() as i64)
            .await?;
        summary.limits = self
            .current_limits(category, subscription.hourly_limit, subscription.daily_limit)
            .await?;

        tracing::info!(
            category,
            started = summary.started.len(),
            skipped = summary.skipped,
            failed = summary.failed,
            "subscription run finished"
        );

        self.emit_event(Event::SubscriptionRun {
            summary: summary.clone(),
        });
        self.notify_summary(summary.clone());

        Ok(summary)
    }
}
