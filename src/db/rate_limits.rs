//! Windowed quota counters.
//!
//! Rows are keyed by `(category, kind, period_start)`. Looking up or bumping
//! the window for a moment that no row covers creates a fresh row for the
//! aligned period, so an expired window is never reused.

use crate::error::DatabaseError;
use crate::rate_limit::window_bounds;
use crate::types::WindowKind;
use crate::{Error, Result};
use chrono::{DateTime, TimeZone};

use super::{Database, WindowRow};

impl Database {
    /// Return the window covering `now`, creating it with `count = 0` if needed
    pub async fn get_or_create_window<Tz: TimeZone>(
        &self,
        category: &str,
        kind: WindowKind,
        now: &DateTime<Tz>,
    ) -> Result<WindowRow> {
        let (period_start, period_end) = window_bounds(kind, now);

        sqlx::query(
            r#"
            INSERT INTO rate_limit_windows (category, kind, count, period_start, period_end)
            VALUES (?, ?, 0, ?, ?)
            ON CONFLICT(category, kind, period_start) DO NOTHING
            "#,
        )
        .bind(category)
        .bind(kind.as_str())
        .bind(period_start)
        .bind(period_end)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to create rate limit window: {}",
                e
            )))
        })?;

        sqlx::query_as::<_, WindowRow>(
            r#"
            SELECT id, category, kind, count, period_start, period_end
            FROM rate_limit_windows
            WHERE category = ? AND kind = ? AND period_start = ?
            "#,
        )
        .bind(category)
        .bind(kind.as_str())
        .bind(period_start)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to get rate limit window: {}",
                e
            )))
        })
    }

    /// Add one to the hourly and daily windows covering `now`, atomically
    ///
    /// Both upserts run in one transaction, so concurrent callers never lose
    /// an increment and never bump only one of the two windows.
    pub async fn increment_windows<Tz: TimeZone>(
        &self,
        category: &str,
        now: &DateTime<Tz>,
    ) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to begin transaction: {}",
                e
            )))
        })?;

        for kind in [WindowKind::Hourly, WindowKind::Daily] {
            let (period_start, period_end) = window_bounds(kind, now);
            sqlx::query(
                r#"
                INSERT INTO rate_limit_windows (category, kind, count, period_start, period_end)
                VALUES (?, ?, 1, ?, ?)
                ON CONFLICT(category, kind, period_start) DO UPDATE SET count = count + 1
                "#,
            )
            .bind(category)
            .bind(kind.as_str())
            .bind(period_start)
            .bind(period_end)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::QueryFailed(format!(
                    "Failed to increment {} window: {}",
                    kind.as_str(),
                    e
                )))
            })?;
        }

        tx.commit().await.map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to commit window increment: {}",
                e
            )))
        })?;

        Ok(())
    }

    /// Delete windows whose period ended at or before `now`
    pub async fn reset_expired_windows(&self, now: i64) -> Result<u64> {
        let result = sqlx::query("DELETE FROM rate_limit_windows WHERE period_end <= ?")
            .bind(now)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::QueryFailed(format!(
                    "Failed to reset expired windows: {}",
                    e
                )))
            })?;

        Ok(result.rows_affected())
    }
}
