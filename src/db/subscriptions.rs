//! Subscription settings and run counters.

use crate::error::DatabaseError;
use crate::{Error, Result};

use super::{Database, SubscriptionRow, UpsertSubscriptionParams};

const SUBSCRIPTION_COLUMNS: &str = "category, enabled, hourly_limit, daily_limit, last_run_at, \
     total_downloads, success_downloads, created_at, updated_at";

impl Database {
    /// Get the subscription for a category
    pub async fn get_subscription(&self, category: &str) -> Result<Option<SubscriptionRow>> {
        let sql = format!(
            "SELECT {} FROM subscriptions WHERE category = ?",
            SUBSCRIPTION_COLUMNS
        );
        sqlx::query_as::<_, SubscriptionRow>(&sql)
            .bind(category)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::QueryFailed(format!(
                    "Failed to get subscription: {}",
                    e
                )))
            })
    }

    /// Get all subscriptions ordered by category
    pub async fn list_subscriptions(&self) -> Result<Vec<SubscriptionRow>> {
        let sql = format!(
            "SELECT {} FROM subscriptions ORDER BY category ASC",
            SUBSCRIPTION_COLUMNS
        );
        sqlx::query_as::<_, SubscriptionRow>(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::QueryFailed(format!(
                    "Failed to list subscriptions: {}",
                    e
                )))
            })
    }

    /// Create or update a subscription's settings
    ///
    /// Run history (`last_run_at`, counters) is preserved on update.
    pub async fn upsert_subscription(&self, params: UpsertSubscriptionParams<'_>) -> Result<()> {
        let now = chrono::Utc::now().timestamp();

        sqlx::query(
            r#"
            INSERT INTO subscriptions (
                category, enabled, hourly_limit, daily_limit, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(category) DO UPDATE SET
                enabled = excluded.enabled,
                hourly_limit = excluded.hourly_limit,
                daily_limit = excluded.daily_limit,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(params.category)
        .bind(params.enabled as i32)
        .bind(params.hourly_limit)
        .bind(params.daily_limit)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to upsert subscription: {}",
                e
            )))
        })?;

        Ok(())
    }

    /// Insert a subscription only if the category has none yet
    ///
    /// Returns the stored row either way.
    pub async fn ensure_subscription(
        &self,
        params: UpsertSubscriptionParams<'_>,
    ) -> Result<SubscriptionRow> {
        let now = chrono::Utc::now().timestamp();

        sqlx::query(
            r#"
            INSERT INTO subscriptions (
                category, enabled, hourly_limit, daily_limit, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(category) DO NOTHING
            "#,
        )
        .bind(params.category)
        .bind(params.enabled as i32)
        .bind(params.hourly_limit)
        .bind(params.daily_limit)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to create subscription: {}",
                e
            )))
        })?;

        self.get_subscription(params.category).await?.ok_or_else(|| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "subscription {} vanished after insert",
                params.category
            )))
        })
    }

    /// Delete a subscription; its quota windows are left to expire
    pub async fn delete_subscription(&self, category: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM subscriptions WHERE category = ?")
            .bind(category)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::QueryFailed(format!(
                    "Failed to delete subscription: {}",
                    e
                )))
            })?;

        Ok(result.rows_affected() > 0)
    }

    /// Stamp the end of a run and add its started count to the total
    pub async fn record_subscription_run(&self, category: &str, started: i64) -> Result<()> {
        let now = chrono::Utc::now().timestamp();

        sqlx::query(
            r#"
            UPDATE subscriptions
            SET last_run_at = ?, total_downloads = total_downloads + ?, updated_at = ?
            WHERE category = ?
            "#,
        )
        .bind(now)
        .bind(started)
        .bind(now)
        .bind(category)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to record subscription run: {}",
                e
            )))
        })?;

        Ok(())
    }

    /// Count one completed subscription task
    pub async fn increment_subscription_success(&self, category: &str) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE subscriptions
            SET success_downloads = success_downloads + 1, updated_at = ?
            WHERE category = ?
            "#,
        )
        .bind(chrono::Utc::now().timestamp())
        .bind(category)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to count subscription success: {}",
                e
            )))
        })?;

        Ok(())
    }
}
