//! Shared fixtures for rank-dl integration tests
//!
//! Jackett and qBittorrent are replaced by wiremock servers; the database,
//! orchestrator and selection logic are the real thing.

#![allow(dead_code)]

use rank_dl::{Config, DownloadTask, RankDownloader, TaskId, TaskStatus};
use std::time::Duration;
use tempfile::TempDir;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Mock indexer and download client plus a downloader wired to them
pub struct Harness {
    pub downloader: RankDownloader,
    pub jackett: MockServer,
    pub qbittorrent: MockServer,
    // Must outlive the database
    _temp_dir: TempDir,
}

impl Harness {
    /// Start both mock servers and build a downloader pointing at them
    pub async fn start() -> Self {
        let jackett = MockServer::start().await;
        let qbittorrent = MockServer::start().await;
        mount_qbittorrent(&qbittorrent).await;

        let temp_dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.persistence.database_path = temp_dir.path().join("rank-dl.db");
        config.indexer.url = jackett.uri();
        config.indexer.api_key = "jackett-key".into();
        config.indexer.timeout = Duration::from_secs(5);
        config.backend.url = qbittorrent.uri();
        config.backend.username = "admin".into();
        config.backend.password = "adminadmin".into();
        config.backend.timeout = Duration::from_secs(5);
        config.subscriptions.item_delay = Duration::ZERO;
        config.retry.max_attempts = 0;

        let downloader = RankDownloader::new(config).await.unwrap();

        Self {
            downloader,
            jackett,
            qbittorrent,
            _temp_dir: temp_dir,
        }
    }

    /// Answer searches for `code` with one magnet per `(hash, size, seeders)`
    pub async fn index(&self, code: &str, releases: &[(&str, i64, i64)]) {
        let results: Vec<serde_json::Value> = releases
            .iter()
            .map(|(hash, size, seeders)| {
                serde_json::json!({
                    "Title": format!("{code} {hash}"),
                    "Tracker": "mock",
                    "Size": size,
                    "Link": format!("http://jackett/dl/{hash}.torrent"),
                    "MagnetUri": format!("magnet:?xt=urn:btih:{hash}"),
                    "Seeders": seeders,
                    "Peers": seeders
                })
            })
            .collect();

        Mock::given(method("GET"))
            .and(path("/api/v2.0/indexers/all/results"))
            .and(query_param("Query", code))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({ "Results": results })),
            )
            .mount(&self.jackett)
            .await;
    }

    /// Report torrent progress from the mock download client
    pub async fn report_progress(&self, torrents: &[(&str, f64)]) {
        let body: Vec<serde_json::Value> = torrents
            .iter()
            .map(|(hash, progress)| {
                serde_json::json!({ "hash": hash, "progress": progress, "name": hash })
            })
            .collect();

        self.qbittorrent.reset().await;
        mount_qbittorrent(&self.qbittorrent).await;
        Mock::given(method("GET"))
            .and(path("/api/v2/torrents/info"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&self.qbittorrent)
            .await;
    }

    /// Bodies of the add requests the mock download client received
    pub async fn submitted(&self) -> Vec<String> {
        self.qbittorrent
            .received_requests()
            .await
            .unwrap_or_default()
            .into_iter()
            .filter(|r| r.url.path() == "/api/v2/torrents/add")
            .map(|r| String::from_utf8_lossy(&r.body).into_owned())
            .collect()
    }
}

async fn mount_qbittorrent(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/api/v2/auth/login"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("set-cookie", "SID=integration; HttpOnly; path=/")
                .set_body_string("Ok."),
        )
        .mount(server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/v2/torrents/add"))
        .respond_with(ResponseTemplate::new(200).set_body_string("Ok."))
        .mount(server)
        .await;
}

/// Poll until the task reaches `status`, panicking after 10 seconds
pub async fn wait_for_status(
    downloader: &RankDownloader,
    id: TaskId,
    status: TaskStatus,
) -> DownloadTask {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
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
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
}
