//! Core types for rank-dl

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Unique identifier for a download task
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema,
)]
#[serde(transparent)]
pub struct TaskId(pub i64);

impl TaskId {
    /// Get the inner i64 value
    pub fn get(&self) -> i64 {
        self.0
    }
}

impl From<i64> for TaskId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

impl From<TaskId> for i64 {
    fn from(id: TaskId) -> Self {
        id.0
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for TaskId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.parse()?))
    }
}

impl sqlx::Type<sqlx::Sqlite> for TaskId {
    fn type_info() -> sqlx::sqlite::SqliteTypeInfo {
        <i64 as sqlx::Type<sqlx::Sqlite>>::type_info()
    }

    fn compatible(ty: &sqlx::sqlite::SqliteTypeInfo) -> bool {
        <i64 as sqlx::Type<sqlx::Sqlite>>::compatible(ty)
    }
}

impl<'q> sqlx::Encode<'q, sqlx::Sqlite> for TaskId {
    fn encode_by_ref(
        &self,
        buf: &mut Vec<sqlx::sqlite::SqliteArgumentValue<'q>>,
    ) -> Result<sqlx::encode::IsNull, Box<dyn std::error::Error + Send + Sync>> {
        sqlx::Encode::<sqlx::Sqlite>::encode_by_ref(&self.0, buf)
    }
}

impl<'r> sqlx::Decode<'r, sqlx::Sqlite> for TaskId {
    fn decode(value: sqlx::sqlite::SqliteValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let id = <i64 as sqlx::Decode<sqlx::Sqlite>>::decode(value)?;
        Ok(Self(id))
    }
}

/// Lifecycle status of a download task
///
/// ```text
/// pending -> searching -> found -> started -> progress -> completed
///               |           |         |          |
///               +-----------+---------+----------+--> failed
/// any active status --> cancelled
/// failed --(retry)--> pending
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    /// Created, waiting for its execute run
    Pending,
    /// Querying the indexer
    Searching,
    /// A candidate was chosen
    Found,
    /// The backend accepted the transport link
    Started,
    /// The backend reported partial progress
    Progress,
    /// Fully downloaded
    Completed,
    /// Gave up; see the task's error message
    Failed,
    /// Cancelled by a caller
    Cancelled,
}

impl TaskStatus {
    /// Statuses that still hold the item's unique slot
    pub const ACTIVE: [TaskStatus; 5] = [
        TaskStatus::Pending,
        TaskStatus::Searching,
        TaskStatus::Found,
        TaskStatus::Started,
        TaskStatus::Progress,
    ];

    /// Every status, in lifecycle order
    pub const ALL: [TaskStatus; 8] = [
        TaskStatus::Pending,
        TaskStatus::Searching,
        TaskStatus::Found,
        TaskStatus::Started,
        TaskStatus::Progress,
        TaskStatus::Completed,
        TaskStatus::Failed,
        TaskStatus::Cancelled,
    ];

    /// Convert integer status code to TaskStatus
    pub fn from_i32(status: i32) -> Self {
        match status {
            0 => TaskStatus::Pending,
            1 => TaskStatus::Searching,
            2 => TaskStatus::Found,
            3 => TaskStatus::Started,
            4 => TaskStatus::Progress,
            5 => TaskStatus::Completed,
            7 => TaskStatus::Cancelled,
            _ => TaskStatus::Failed,
        }
    }

    /// Convert TaskStatus to integer status code
    pub fn to_i32(&self) -> i32 {
        match self {
            TaskStatus::Pending => 0,
            TaskStatus::Searching => 1,
            TaskStatus::Found => 2,
            TaskStatus::Started => 3,
            TaskStatus::Progress => 4,
            TaskStatus::Completed => 5,
            TaskStatus::Failed => 6,
            TaskStatus::Cancelled => 7,
        }
    }

    /// Lowercase name, as used in the API
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Searching => "searching",
            TaskStatus::Found => "found",
            TaskStatus::Started => "started",
            TaskStatus::Progress => "progress",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
            TaskStatus::Cancelled => "cancelled",
        }
    }

    /// Whether the task is still in flight
    pub fn is_active(&self) -> bool {
        Self::ACTIVE.contains(self)
    }

    /// Whether the task reached completed, failed or cancelled
    pub fn is_terminal(&self) -> bool {
        !self.is_active()
    }

    /// Statuses from which a move to `self` is legal
    pub fn predecessors(&self) -> &'static [TaskStatus] {
        use TaskStatus::*;
        match self {
            Pending => &[Failed],
            Searching => &[Pending],
            Found => &[Searching],
            Started => &[Found],
            Progress => &[Started, Progress],
            Completed => &[Started, Progress],
            Failed => &[Searching, Found, Started, Progress],
            Cancelled => &[Pending, Searching, Found, Started, Progress],
        }
    }

    /// Whether `self -> next` is an edge of the state machine
    pub fn can_transition_to(&self, next: TaskStatus) -> bool {
        next.predecessors().contains(self)
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| format!("unknown task status: {s}"))
    }
}

/// Who asked for a task
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum TaskSource {
    /// Ad-hoc request from a user
    #[default]
    Manual,
    /// Started by a subscription run
    Subscription,
}

impl TaskSource {
    /// Lowercase name, as stored and exposed
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskSource::Manual => "manual",
            TaskSource::Subscription => "subscription",
        }
    }

    /// Parse a stored source, treating unknown values as manual
    pub fn from_db(value: &str) -> Self {
        match value {
            "subscription" => TaskSource::Subscription,
            _ => TaskSource::Manual,
        }
    }
}

impl std::fmt::Display for TaskSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Length of a rate-limit window
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum WindowKind {
    /// Aligned to the top of the hour
    Hourly,
    /// Aligned to local midnight
    Daily,
}

impl WindowKind {
    /// Lowercase name, as stored
    pub fn as_str(&self) -> &'static str {
        match self {
            WindowKind::Hourly => "hourly",
            WindowKind::Daily => "daily",
        }
    }
}

/// A download task as seen by callers
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct DownloadTask {
    /// Unique task identifier
    pub id: TaskId,
    /// Catalogue item identifier
    pub code: String,
    /// Display title
    pub title: String,
    /// Cover image reference
    pub cover_url: Option<String>,
    /// Current status
    pub status: TaskStatus,
    /// Chosen transport link (magnet or .torrent URL)
    pub torrent_link: Option<String>,
    /// Info-hash of the chosen candidate, when known
    pub torrent_hash: Option<String>,
    /// Size of the chosen candidate in bytes
    pub file_size: Option<i64>,
    /// Completed fraction in [0.0, 1.0]
    pub progress: f64,
    /// Why the task failed
    pub error_message: Option<String>,
    /// Who asked for the task
    pub source: TaskSource,
    /// Ranking bucket that produced the task (empty for ad-hoc tasks)
    pub category: String,
    /// When the task was created
    pub created_at: DateTime<Utc>,
    /// Last modification time
    pub updated_at: DateTime<Utc>,
    /// When the execute run began
    pub started_at: Option<DateTime<Utc>>,
    /// When the task reached a terminal status
    pub completed_at: Option<DateTime<Utc>>,
}

/// Request to acquire a catalogue item
#[derive(Clone, Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct StartTaskRequest {
    /// Catalogue item identifier, also used as the search key
    pub code: String,
    /// Display title
    #[serde(default)]
    pub title: String,
    /// Cover image reference
    #[serde(default)]
    pub cover_url: Option<String>,
    /// Who is asking
    #[serde(default)]
    pub source: TaskSource,
    /// Ranking bucket, empty for ad-hoc requests
    #[serde(default)]
    pub category: String,
}

/// Filter for listing tasks
#[derive(Clone, Debug, Default)]
pub struct TaskFilter {
    /// Only tasks in this status
    pub status: Option<TaskStatus>,
    /// Only tasks from this source
    pub source: Option<TaskSource>,
    /// Only tasks from this ranking bucket
    pub category: Option<String>,
    /// Page size
    pub limit: i64,
    /// Rows to skip
    pub offset: i64,
}

/// Task counts per status and per source
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct TaskStats {
    /// All non-deleted tasks
    pub total: i64,
    /// Tasks in pending
    pub pending: i64,
    /// Tasks in searching
    pub searching: i64,
    /// Tasks in found
    pub found: i64,
    /// Tasks in started
    pub started: i64,
    /// Tasks in progress
    pub progress: i64,
    /// Tasks in completed
    pub completed: i64,
    /// Tasks in failed
    pub failed: i64,
    /// Tasks in cancelled
    pub cancelled: i64,
    /// Tasks requested manually
    pub manual: i64,
    /// Tasks started by subscriptions
    pub subscription: i64,
}

/// Per-category autonomous download settings
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct Subscription {
    /// Ranking bucket (e.g. "daily", "weekly", "monthly")
    pub category: String,
    /// Whether the scheduler runs this subscription
    pub enabled: bool,
    /// Max tasks started per clock hour
    pub hourly_limit: i64,
    /// Max tasks started per local day
    pub daily_limit: i64,
    /// When the last run finished
    pub last_run_at: Option<DateTime<Utc>>,
    /// Tasks started by all runs
    pub total_downloads: i64,
    /// Subscription tasks that completed
    pub success_downloads: i64,
    /// When the subscription was created
    pub created_at: DateTime<Utc>,
    /// Last modification time
    pub updated_at: DateTime<Utc>,
}

/// Quota usage of one category
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct LimitStatus {
    /// Tasks started in the current hourly window
    pub hourly_used: i64,
    /// Hourly limit
    pub hourly_limit: i64,
    /// Tasks started in the current daily window
    pub daily_used: i64,
    /// Daily limit
    pub daily_limit: i64,
    /// Both windows are below their limits
    pub can_download: bool,
}

/// A subscription together with its current quota usage
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct SubscriptionStatus {
    /// Stored settings
    pub subscription: Subscription,
    /// Current window usage
    pub limits: LimitStatus,
}

/// Outcome of one subscription run
#[derive(Clone, Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct RunSummary {
    /// Ranking bucket that was processed
    pub category: String,
    /// Number of tasks the run was allowed to start
    pub budget: i64,
    /// Tasks started
    pub started: Vec<String>,
    /// Items skipped because they are owned or already in flight
    pub skipped: usize,
    /// Items whose start failed
    pub failed: usize,
    /// Quota usage after the run
    pub limits: LimitStatus,
}

/// An acquirable result returned by the indexer for a search key
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Candidate {
    /// Release title
    pub title: String,
    /// Transport link (magnet preferred)
    pub link: String,
    /// Payload size in bytes
    pub size_bytes: i64,
    /// Seeder count
    pub seeders: i64,
    /// Peer count
    pub peers: i64,
    /// Tracker that reported the candidate
    pub tracker: String,
    /// Info-hash, when the indexer reports one
    pub info_hash: Option<String>,
}

/// One entry of a ranking feed
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct FeedItem {
    /// Catalogue item identifier
    pub code: String,
    /// Display title
    pub title: String,
    /// Cover image reference
    pub cover_url: Option<String>,
    /// Already present in the local library
    pub locally_owned: bool,
}

/// Event emitted during the task lifecycle
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// A task record was created
    TaskCreated {
        /// Task ID
        id: TaskId,
        /// Catalogue item identifier
        code: String,
        /// Who asked for it
        source: TaskSource,
    },

    /// A task moved to a new status
    TaskStatusChanged {
        /// Task ID
        id: TaskId,
        /// Catalogue item identifier
        code: String,
        /// New status
        status: TaskStatus,
    },

    /// The backend reported partial progress
    TaskProgress {
        /// Task ID
        id: TaskId,
        /// Catalogue item identifier
        code: String,
        /// Completed fraction
        progress: f64,
    },

    /// A task failed
    TaskFailed {
        /// Task ID
        id: TaskId,
        /// Catalogue item identifier
        code: String,
        /// Error message recorded on the task
        error: String,
    },

    /// A subscription run finished
    SubscriptionRun {
        /// The run's outcome
        summary: RunSummary,
    },

    /// Webhook delivery failed
    WebhookFailed {
        /// Webhook URL
        url: String,
        /// Error message
        error: String,
    },
}

impl Event {
    /// Short name used as the SSE event type
    pub fn name(&self) -> &'static str {
        match self {
            Event::TaskCreated { .. } => "task_created",
            Event::TaskStatusChanged { .. } => "task_status_changed",
            Event::TaskProgress { .. } => "task_progress",
            Event::TaskFailed { .. } => "task_failed",
            Event::SubscriptionRun { .. } => "subscription_run",
            Event::WebhookFailed { .. } => "webhook_failed",
        }
    }
}
