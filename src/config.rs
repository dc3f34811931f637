//! Configuration types for rank-dl

use serde::{Deserialize, Serialize};
use std::{net::SocketAddr, path::PathBuf, time::Duration};

use crate::error::{Error, Result};

/// Main configuration for [`RankDownloader`](crate::RankDownloader)
///
/// Every section has serde defaults, so an empty JSON object is a valid
/// configuration pointing at local Jackett and qBittorrent instances.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Torrent indexer (Jackett) connection
    #[serde(default)]
    pub indexer: IndexerConfig,

    /// Download daemon (qBittorrent) connection
    #[serde(default)]
    pub backend: BackendConfig,

    /// Candidate selection policy
    #[serde(default)]
    pub selection: SelectionConfig,

    /// Subscription scheduler behavior
    #[serde(default)]
    pub subscriptions: SubscriptionSchedulerConfig,

    /// Periodic cleanup and progress polling
    #[serde(default)]
    pub housekeeping: HousekeepingConfig,

    /// Outbound notifications
    #[serde(default)]
    pub notifications: NotificationConfig,

    /// Data storage
    #[serde(default)]
    pub persistence: PersistenceConfig,

    /// Retry policy for indexer searches
    #[serde(default)]
    pub retry: RetryConfig,

    /// REST API server
    #[serde(default)]
    pub api: ApiConfig,
}

impl Config {
    /// Check settings that serde cannot express
    pub fn validate(&self) -> Result<()> {
        if self.subscriptions.feed_limit == 0 {
            return Err(Error::Config {
                message: "feed_limit must be greater than zero".into(),
                key: Some("subscriptions.feed_limit".into()),
            });
        }
        if self.subscriptions.default_hourly_limit <= 0 || self.subscriptions.default_daily_limit <= 0
        {
            return Err(Error::Config {
                message: "default subscription limits must be greater than zero".into(),
                key: Some("subscriptions.default_hourly_limit".into()),
            });
        }
        url::Url::parse(&self.indexer.url).map_err(|e| Error::Config {
            message: format!("invalid indexer url: {}", e),
            key: Some("indexer.url".into()),
        })?;
        url::Url::parse(&self.backend.url).map_err(|e| Error::Config {
            message: format!("invalid backend url: {}", e),
            key: Some("backend.url".into()),
        })?;
        Ok(())
    }
}

/// Jackett indexer settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct IndexerConfig {
    /// Base URL (default: "http://localhost:9117")
    #[serde(default = "default_indexer_url")]
    pub url: String,

    /// Jackett API key
    #[serde(default)]
    pub api_key: String,

    /// Torznab category filter (empty = all categories)
    #[serde(default)]
    pub categories: Vec<u32>,

    /// Timeout for one search request (default: 30 seconds)
    #[serde(default = "default_http_timeout", with = "duration_serde")]
    pub timeout: Duration,
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            url: default_indexer_url(),
            api_key: String::new(),
            categories: Vec::new(),
            timeout: default_http_timeout(),
        }
    }
}

/// qBittorrent Web API settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Base URL (default: "http://localhost:8080")
    #[serde(default = "default_backend_url")]
    pub url: String,

    /// Web UI username
    #[serde(default)]
    pub username: String,

    /// Web UI password
    #[serde(default)]
    pub password: String,

    /// Save path passed with every submission
    #[serde(default)]
    pub save_path: Option<String>,

    /// qBittorrent category passed with every submission
    #[serde(default)]
    pub category: Option<String>,

    /// Comma-separated tags passed with every submission
    #[serde(default)]
    pub tags: Option<String>,

    /// Timeout for one backend request (default: 30 seconds)
    #[serde(default = "default_http_timeout", with = "duration_serde")]
    pub timeout: Duration,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            url: default_backend_url(),
            username: String::new(),
            password: String::new(),
            save_path: None,
            category: None,
            tags: None,
            timeout: default_http_timeout(),
        }
    }
}

/// Candidate selection policy
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SelectionConfig {
    /// Candidates with fewer seeders are never chosen (default: 1)
    #[serde(default = "default_min_seeders")]
    pub min_seeders: i64,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            min_seeders: default_min_seeders(),
        }
    }
}

/// Subscription scheduler settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SubscriptionSchedulerConfig {
    /// Run the background scheduler (default: true)
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Minimum time between runs of one subscription (default: 1 hour)
    #[serde(default = "default_check_interval", with = "duration_serde")]
    pub check_interval: Duration,

    /// Pause between two starts within one run (default: 2 seconds)
    #[serde(default = "default_item_delay", with = "duration_millis_serde")]
    pub item_delay: Duration,

    /// Number of ranked items read per run (default: 50)
    #[serde(default = "default_feed_limit")]
    pub feed_limit: i64,

    /// Hourly limit for lazily created subscriptions (default: 10)
    #[serde(default = "default_hourly_limit")]
    pub default_hourly_limit: i64,

    /// Daily limit for lazily created subscriptions (default: 50)
    #[serde(default = "default_daily_limit")]
    pub default_daily_limit: i64,
}

impl Default for SubscriptionSchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            check_interval: default_check_interval(),
            item_delay: default_item_delay(),
            feed_limit: default_feed_limit(),
            default_hourly_limit: default_hourly_limit(),
            default_daily_limit: default_daily_limit(),
        }
    }
}

/// Periodic maintenance settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HousekeepingConfig {
    /// Remove completed/failed tasks older than this (default: 30 days, None = keep forever)
    #[serde(default = "default_cleanup_after", with = "optional_duration_serde")]
    pub cleanup_after: Option<Duration>,

    /// How often cleanup runs (default: 24 hours)
    #[serde(default = "default_cleanup_interval", with = "duration_serde")]
    pub cleanup_interval: Duration,

    /// How often the backend is polled for progress (default: 60 seconds, None = disabled)
    #[serde(default = "default_progress_poll_interval", with = "optional_duration_serde")]
    pub progress_poll_interval: Option<Duration>,
}

impl Default for HousekeepingConfig {
    fn default() -> Self {
        Self {
            cleanup_after: default_cleanup_after(),
            cleanup_interval: default_cleanup_interval(),
            progress_poll_interval: default_progress_poll_interval(),
        }
    }
}

/// Notification settings
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct NotificationConfig {
    /// Webhooks that receive task events
    #[serde(default)]
    pub webhooks: Vec<WebhookConfig>,
}

/// Webhook configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WebhookConfig {
    /// URL to POST to
    pub url: String,

    /// Events that trigger this webhook
    pub events: Vec<WebhookEvent>,

    /// Optional authentication header value
    #[serde(default)]
    pub auth_header: Option<String>,

    /// Timeout for webhook requests (default: 30 seconds)
    #[serde(default = "default_http_timeout", with = "duration_serde")]
    pub timeout: Duration,
}

/// Webhook trigger event
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WebhookEvent {
    /// The backend accepted a task's link
    OnStart,
    /// A task completed
    OnComplete,
    /// A task failed
    OnFailed,
    /// A subscription run finished
    OnSubscriptionSummary,
}

/// Data storage settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PersistenceConfig {
    /// SQLite database path (default: "./rank-dl.db")
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,

    /// Soft-delete purged tasks instead of removing them (default: false)
    ///
    /// Soft-deleted rows are hidden from every query but stay in the database
    /// for auditing.
    #[serde(default)]
    pub keep_failed_history: bool,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            keep_failed_history: false,
        }
    }
}

/// Retry configuration for transient failures
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the first (default: 3)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay before the first retry (default: 1 second)
    #[serde(default = "default_initial_delay", with = "duration_serde")]
    pub initial_delay: Duration,

    /// Maximum delay between retries (default: 30 seconds)
    #[serde(default = "default_max_delay", with = "duration_serde")]
    pub max_delay: Duration,

    /// Multiplier for exponential backoff (default: 2.0)
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Add random jitter to delays (default: true)
    #[serde(default = "default_true")]
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay: default_initial_delay(),
            max_delay: default_max_delay(),
            backoff_multiplier: default_backoff_multiplier(),
            jitter: true,
        }
    }
}

/// REST API configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Address to bind to (default: 127.0.0.1:6790)
    #[serde(default = "default_bind_address")]
    pub bind_address: SocketAddr,

    /// Optional API key for authentication
    #[serde(default)]
    pub api_key: Option<String>,

    /// Enable CORS for browser access (default: true)
    #[serde(default = "default_true")]
    pub cors_enabled: bool,

    /// Allowed CORS origins (default: ["*"])
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,

    /// Enable Swagger UI at /swagger-ui (default: true)
    #[serde(default = "default_true")]
    pub swagger_ui: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            api_key: None,
            cors_enabled: true,
            cors_origins: default_cors_origins(),
            swagger_ui: true,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_indexer_url() -> String {
    "http://localhost:9117".into()
}

fn default_backend_url() -> String {
    "http://localhost:8080".into()
}

fn default_http_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_min_seeders() -> i64 {
    1
}

fn default_check_interval() -> Duration {
    Duration::from_secs(3600)
}

fn default_item_delay() -> Duration {
    Duration::from_secs(2)
}

fn default_feed_limit() -> i64 {
    50
}

fn default_hourly_limit() -> i64 {
    10
}

fn default_daily_limit() -> i64 {
    50
}

fn default_cleanup_after() -> Option<Duration> {
    Some(Duration::from_secs(30 * 24 * 3600))
}

fn default_cleanup_interval() -> Duration {
    Duration::from_secs(24 * 3600)
}

fn default_progress_poll_interval() -> Option<Duration> {
    Some(Duration::from_secs(60))
}

fn default_database_path() -> PathBuf {
    PathBuf::from("./rank-dl.db")
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_delay() -> Duration {
    Duration::from_secs(1)
}

fn default_max_delay() -> Duration {
    Duration::from_secs(30)
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_bind_address() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 6790))
}

fn default_cors_origins() -> Vec<String> {
    vec!["*".into()]
}

// Duration serialization helper (seconds)
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

// Sub-second delays are useful in tests, so the item delay is stored in milliseconds
mod duration_millis_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

// Optional Duration serialization helper
mod optional_duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match duration {
            Some(d) => serializer.serialize_some(&d.as_secs()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = Option::<u64>::deserialize(deserializer)?;
        Ok(secs.map(Duration::from_secs))
    }
}
