//! Database layer for rank-dl
//!
//! Handles SQLite persistence for download tasks, subscriptions, quota windows,
//! and the library/ranking tables shared with neighboring services.
//!
//! ## Submodules
//!
//! Methods on [`Database`] are organized by domain:
//! - [`migrations`] — Database lifecycle, schema migrations
//! - [`tasks`] — Task store: creation, compare-and-set transitions, listing, purge
//! - [`subscriptions`] — Subscription settings and run counters
//! - [`rate_limits`] — Windowed quota counters
//! - [`library`] — Local-ownership index and ranking feed

use chrono::{DateTime, Utc};
use sqlx::{FromRow, sqlite::SqlitePool};

use crate::types::{DownloadTask, Subscription, TaskId, TaskSource, TaskStatus, WindowKind};

mod library;
mod migrations;
mod rate_limits;
mod subscriptions;
mod tasks;

/// New task to be inserted into the database
#[derive(Debug, Clone)]
pub struct NewTask {
    /// Catalogue item identifier
    pub code: String,
    /// Display title
    pub title: String,
    /// Cover image reference
    pub cover_url: Option<String>,
    /// Who asked for the task
    pub source: TaskSource,
    /// Ranking bucket, empty for ad-hoc tasks
    pub category: String,
}

/// Download task record from database
#[derive(Debug, Clone, FromRow)]
pub struct TaskRow {
    /// Unique database ID
    pub id: i64,
    /// Catalogue item identifier
    pub code: String,
    /// Display title
    pub title: String,
    /// Cover image reference
    pub cover_url: Option<String>,
    /// Status code (see [`TaskStatus::to_i32`])
    pub status: i32,
    /// Chosen transport link
    pub torrent_link: Option<String>,
    /// Info-hash of the chosen candidate
    pub torrent_hash: Option<String>,
    /// Size of the chosen candidate in bytes
    pub file_size: Option<i64>,
    /// Completed fraction
    pub progress: f64,
    /// Failure reason
    pub error_message: Option<String>,
    /// "manual" or "subscription"
    pub source: String,
    /// Ranking bucket
    pub category: String,
    /// Unix timestamp of creation
    pub created_at: i64,
    /// Unix timestamp of last modification
    pub updated_at: i64,
    /// Unix timestamp when execution began
    pub started_at: Option<i64>,
    /// Unix timestamp when a terminal status was reached
    pub completed_at: Option<i64>,
}

impl TaskRow {
    /// Decoded status
    pub fn status(&self) -> TaskStatus {
        TaskStatus::from_i32(self.status)
    }
}

impl From<TaskRow> for DownloadTask {
    fn from(row: TaskRow) -> Self {
        DownloadTask {
            id: TaskId(row.id),
            status: TaskStatus::from_i32(row.status),
            source: TaskSource::from_db(&row.source),
            code: row.code,
            title: row.title,
            cover_url: row.cover_url,
            torrent_link: row.torrent_link,
            torrent_hash: row.torrent_hash,
            file_size: row.file_size,
            progress: row.progress,
            error_message: row.error_message,
            category: row.category,
            created_at: timestamp(row.created_at),
            updated_at: timestamp(row.updated_at),
            started_at: row.started_at.map(timestamp),
            completed_at: row.completed_at.map(timestamp),
        }
    }
}

/// Fields written when a candidate is chosen
#[derive(Debug, Clone, Copy)]
pub struct CandidateFields<'a> {
    /// Transport link
    pub link: &'a str,
    /// Info-hash, when known
    pub hash: Option<&'a str>,
    /// Size in bytes
    pub size: i64,
}

/// Subscription record from database
#[derive(Debug, Clone, FromRow)]
pub struct SubscriptionRow {
    /// Ranking bucket
    pub category: String,
    /// 1 when the scheduler should run it
    pub enabled: i32,
    /// Max starts per hour
    pub hourly_limit: i64,
    /// Max starts per day
    pub daily_limit: i64,
    /// Unix timestamp of the last finished run
    pub last_run_at: Option<i64>,
    /// Tasks started by all runs
    pub total_downloads: i64,
    /// Subscription tasks that completed
    pub success_downloads: i64,
    /// Unix timestamp of creation
    pub created_at: i64,
    /// Unix timestamp of last modification
    pub updated_at: i64,
}

impl From<SubscriptionRow> for Subscription {
    fn from(row: SubscriptionRow) -> Self {
        Subscription {
            category: row.category,
            enabled: row.enabled != 0,
            hourly_limit: row.hourly_limit,
            daily_limit: row.daily_limit,
            last_run_at: row.last_run_at.map(timestamp),
            total_downloads: row.total_downloads,
            success_downloads: row.success_downloads,
            created_at: timestamp(row.created_at),
            updated_at: timestamp(row.updated_at),
        }
    }
}

/// Settings written by a subscription upsert
#[derive(Debug, Clone, Copy)]
pub struct UpsertSubscriptionParams<'a> {
    /// Ranking bucket
    pub category: &'a str,
    /// Whether the scheduler runs it
    pub enabled: bool,
    /// Max starts per hour
    pub hourly_limit: i64,
    /// Max starts per day
    pub daily_limit: i64,
}

/// Rate-limit window record from database
#[derive(Debug, Clone, FromRow)]
pub struct WindowRow {
    /// Unique database ID
    pub id: i64,
    /// Ranking bucket
    pub category: String,
    /// "hourly" or "daily"
    pub kind: String,
    /// Tasks counted in this window
    pub count: i64,
    /// Unix timestamp, inclusive
    pub period_start: i64,
    /// Unix timestamp, exclusive
    pub period_end: i64,
}

impl WindowRow {
    /// Whether `now` falls inside `[period_start, period_end)`
    pub fn covers(&self, now: i64) -> bool {
        self.period_start <= now && now < self.period_end
    }

    /// Decoded window kind
    pub fn window_kind(&self) -> WindowKind {
        match self.kind.as_str() {
            "daily" => WindowKind::Daily,
            _ => WindowKind::Hourly,
        }
    }
}

/// A ranked item as written by the crawler
#[derive(Debug, Clone)]
pub struct RankingEntry {
    /// Catalogue item identifier
    pub code: String,
    /// Display title
    pub title: String,
    /// Cover image reference
    pub cover_url: Option<String>,
    /// 1-based rank within the category
    pub position: i64,
}

/// Database handle for rank-dl
pub struct Database {
    pool: SqlitePool,
}

fn timestamp(secs: i64) -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp(secs, 0).unwrap_or_default()
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;
