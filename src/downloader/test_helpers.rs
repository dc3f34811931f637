//! Fake collaborators and a ready-made RankDownloader for tests.

use crate::backend::DownloadBackendClient;
use crate::config::Config;
use crate::db::Database;
use crate::downloader::{Collaborators, RankDownloader};
use crate::error::{Error, Result};
use crate::indexer::IndexerClient;
use crate::library::{CandidateFeed, OwnershipCheck};
use crate::notifier::Notifier;
use crate::types::{Candidate, DownloadTask, FeedItem, RunSummary, TaskId, TaskStatus};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tempfile::tempdir;

/// Indexer answering from a per-code script
#[derive(Default)]
pub(crate) struct ScriptedIndexer {
    results: Mutex<HashMap<String, Vec<Candidate>>>,
    failures: Mutex<HashMap<String, String>>,
    delay: Mutex<Option<Duration>>,
    pub(crate) calls: AtomicUsize,
}

impl ScriptedIndexer {
    pub(crate) fn respond(&self, code: &str, candidates: Vec<Candidate>) {
        self.results
            .lock()
            .unwrap()
            .insert(code.to_string(), candidates);
    }

    pub(crate) fn fail(&self, code: &str, message: &str) {
        self.failures
            .lock()
            .unwrap()
            .insert(code.to_string(), message.to_string());
    }

    pub(crate) fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = Some(delay);
    }
}

#[async_trait]
impl IndexerClient for ScriptedIndexer {
    async fn search(&self, key: &str) -> Result<Vec<Candidate>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(message) = self.failures.lock().unwrap().get(key) {
            return Err(Error::Indexer(message.clone()));
        }
        Ok(self
            .results
            .lock()
            .unwrap()
            .get(key)
            .cloned()
            .unwrap_or_default())
    }
}

/// Backend that records submitted links
#[derive(Default)]
pub(crate) struct RecordingBackend {
    pub(crate) submitted: Mutex<Vec<String>>,
    reject_with: Mutex<Option<String>>,
    progress: Mutex<HashMap<String, f64>>,
}

impl RecordingBackend {
    pub(crate) fn reject(&self, message: &str) {
        *self.reject_with.lock().unwrap() = Some(message.to_string());
    }

    pub(crate) fn set_progress(&self, hash: &str, fraction: f64) {
        self.progress
            .lock()
            .unwrap()
            .insert(hash.to_string(), fraction);
    }

    pub(crate) fn submitted(&self) -> Vec<String> {
        self.submitted.lock().unwrap().clone()
    }
}

#[async_trait]
impl DownloadBackendClient for RecordingBackend {
    async fn submit(&self, link: &str) -> Result<()> {
        if let Some(message) = self.reject_with.lock().unwrap().clone() {
            return Err(Error::Backend(message));
        }
        self.submitted.lock().unwrap().push(link.to_string());
        Ok(())
    }

    async fn torrent_progress(&self) -> Result<HashMap<String, f64>> {
        Ok(self.progress.lock().unwrap().clone())
    }
}

/// Notifier that records what it was told, optionally failing every call
#[derive(Default)]
pub(crate) struct RecordingNotifier {
    pub(crate) events: Mutex<Vec<String>>,
    pub(crate) failing: std::sync::atomic::AtomicBool,
}

impl RecordingNotifier {
    fn record(&self, entry: String) -> Result<()> {
        self.events.lock().unwrap().push(entry);
        if self.failing.load(Ordering::SeqCst) {
            return Err(Error::Other("notifier down".into()));
        }
        Ok(())
    }

    pub(crate) fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify_start(&self, task: &DownloadTask) -> Result<()> {
        self.record(format!("start:{}", task.code))
    }

    async fn notify_complete(&self, task: &DownloadTask) -> Result<()> {
        self.record(format!("complete:{}", task.code))
    }

    async fn notify_fail(&self, task: &DownloadTask, error: &str) -> Result<()> {
        self.record(format!("fail:{}:{}", task.code, error))
    }

    async fn notify_subscription_summary(&self, summary: &RunSummary) -> Result<()> {
        self.record(format!(
            "summary:{}:{}",
            summary.category,
            summary.started.join(",")
        ))
    }
}

/// In-memory library and ranking feed
#[derive(Default)]
pub(crate) struct MemoryLibrary {
    owned: Mutex<HashSet<String>>,
    feeds: Mutex<HashMap<String, Vec<FeedItem>>>,
}

impl MemoryLibrary {
    pub(crate) fn own(&self, code: &str) {
        self.owned.lock().unwrap().insert(code.to_string());
    }

    pub(crate) fn set_feed(&self, category: &str, items: Vec<FeedItem>) {
        self.feeds
            .lock()
            .unwrap()
            .insert(category.to_string(), items);
    }
}

#[async_trait]
impl OwnershipCheck for MemoryLibrary {
    async fn exists(&self, code: &str) -> Result<bool> {
        Ok(self.owned.lock().unwrap().contains(code))
    }
}

#[async_trait]
impl CandidateFeed for MemoryLibrary {
    async fn list_by_category(&self, category: &str, limit: i64) -> Result<Vec<FeedItem>> {
        let feeds = self.feeds.lock().unwrap();
        let items = feeds.get(category).cloned().unwrap_or_default();
        Ok(items.into_iter().take(limit.max(0) as usize).collect())
    }
}

/// A downloader plus handles on its fakes
pub(crate) struct TestContext {
    pub(crate) downloader: RankDownloader,
    pub(crate) indexer: Arc<ScriptedIndexer>,
    pub(crate) backend: Arc<RecordingBackend>,
    pub(crate) notifier: Arc<RecordingNotifier>,
    pub(crate) library: Arc<MemoryLibrary>,
    // Must outlive the database
    pub(crate) _temp_dir: tempfile::TempDir,
}

/// Config with fast timeouts and no inter-item delay
pub(crate) fn test_config(db_path: std::path::PathBuf) -> Config {
    let mut config = Config::default();
    config.persistence.database_path = db_path;
    config.subscriptions.item_delay = Duration::ZERO;
    config.indexer.timeout = Duration::from_secs(2);
    config.backend.timeout = Duration::from_secs(2);
    config.retry.max_attempts = 0;
    config.retry.initial_delay = Duration::from_millis(10);
    config
}

/// Helper to create a test RankDownloader over fakes, with a persistent database.
pub(crate) async fn create_test_downloader() -> TestContext {
    create_test_downloader_with(|_| {}).await
}

/// Like [`create_test_downloader`], letting the test adjust the config first
pub(crate) async fn create_test_downloader_with(adjust: impl FnOnce(&mut Config)) -> TestContext {
    let temp_dir = tempdir().unwrap();
    let mut config = test_config(temp_dir.path().join("test.db"));
    adjust(&mut config);

    let db = Database::new(&config.persistence.database_path)
        .await
        .unwrap();

    let indexer = Arc::new(ScriptedIndexer::default());
    let backend = Arc::new(RecordingBackend::default());
    let notifier = Arc::new(RecordingNotifier::default());
    let library = Arc::new(MemoryLibrary::default());

    let collaborators = Collaborators {
        ownership: library.clone(),
        indexer: indexer.clone(),
        backend: backend.clone(),
        feed: library.clone(),
        notifier: notifier.clone(),
    };

    TestContext {
        downloader: RankDownloader::with_collaborators(config, db, collaborators),
        indexer,
        backend,
        notifier,
        library,
        _temp_dir: temp_dir,
    }
}

/// A candidate whose magnet link carries `hash`
pub(crate) fn candidate(hash: &str, size_bytes: i64, seeders: i64) -> Candidate {
    Candidate {
        title: format!("release {hash}"),
        link: format!("magnet:?xt=urn:btih:{hash}"),
        size_bytes,
        seeders,
        peers: seeders,
        tracker: "tracker".into(),
        info_hash: Some(hash.to_string()),
    }
}

/// A feed item that is not owned locally
pub(crate) fn feed_item(code: &str) -> FeedItem {
    FeedItem {
        code: code.to_string(),
        title: format!("title {code}"),
        cover_url: None,
        locally_owned: false,
    }
}

/// Poll until the task reaches `status`, panicking after 5 seconds
pub(crate) async fn wait_for_status(
    downloader: &RankDownloader,
    id: TaskId,
    status: TaskStatus,
) -> DownloadTask {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        let task = downloader.get_task(id).await.unwrap();
        if task.status == status {
            return task;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "task {} stuck in {} waiting for {}",
            id,
            task.status,
            status
        );
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

/// Wait until no execute unit of work is in flight
pub(crate) async fn wait_idle(downloader: &RankDownloader) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while downloader.active_task_count().await > 0 {
        assert!(tokio::time::Instant::now() < deadline, "execute never finished");
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

/// Wait until the notifier has recorded `count` entries
pub(crate) async fn wait_for_notifications(notifier: &RecordingNotifier, count: usize) -> Vec<String> {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        let events = notifier.events();
        if events.len() >= count {
            return events;
        }
        assert!(tokio::time::Instant::now() < deadline, "only saw {:?}", events);
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}
