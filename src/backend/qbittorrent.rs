//! qBittorrent Web API client.

use async_trait::async_trait;
use reqwest::header::{COOKIE, REFERER, SET_COOKIE};
use serde::Deserialize;
use std::collections::HashMap;
use tracing::debug;

use super::DownloadBackendClient;
use crate::config::BackendConfig;
use crate::error::{Error, Result};

#[derive(Debug, Deserialize)]
struct TorrentInfo {
    hash: String,
    progress: f64,
}

/// Client for qBittorrent's `/api/v2` endpoints
///
/// Each operation logs in first and reuses the returned `SID` cookie for the
/// follow-up request.
#[derive(Clone)]
pub struct QbittorrentClient {
    http_client: reqwest::Client,
    config: BackendConfig,
}

impl QbittorrentClient {
    /// Create a client; every request is bounded by `config.timeout`
    pub fn new(config: BackendConfig) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!("rank-dl/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::Other(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            config,
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.config.url.trim_end_matches('/'), path)
    }

    /// Log in and return the session cookie (`SID=...`)
    async fn login(&self) -> Result<String> {
        let response = self
            .http_client
            .post(self.endpoint("/api/v2/auth/login"))
            .header(REFERER, self.config.url.as_str())
            .form(&[
                ("username", self.config.username.as_str()),
                ("password", self.config.password.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Backend(format!(
                "login returned HTTP {}",
                status.as_u16()
            )));
        }

        let session = response
            .headers()
            .get_all(SET_COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .filter_map(|cookie| cookie.split(';').next())
            .find(|pair| pair.trim_start().starts_with("SID="))
            .map(|pair| pair.trim().to_string());

        let body = response.text().await.unwrap_or_default();
        if body.trim() == "Fails." {
            return Err(Error::Backend("login rejected: bad credentials".into()));
        }

        session.ok_or_else(|| Error::Backend("login returned no session cookie".into()))
    }
}

#[async_trait]
impl DownloadBackendClient for QbittorrentClient {
    async fn submit(&self, link: &str) -> Result<()> {
        if link.is_empty() {
            return Err(Error::Backend("transport link is empty".into()));
        }

        let session = self.login().await?;

        let mut form: Vec<(&str, &str)> = vec![("urls", link), ("paused", "false")];
        if let Some(save_path) = &self.config.save_path {
            form.push(("savepath", save_path.as_str()));
        }
        if let Some(category) = &self.config.category {
            form.push(("category", category.as_str()));
        }
        if let Some(tags) = &self.config.tags {
            form.push(("tags", tags.as_str()));
        }

        let response = self
            .http_client
            .post(self.endpoint("/api/v2/torrents/add"))
            .header(COOKIE, session)
            .header(REFERER, self.config.url.as_str())
            .form(&form)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(Error::Backend(format!(
                "add returned HTTP {}: {}",
                status.as_u16(),
                body.trim()
            )));
        }
        if body.trim() == "Fails." {
            return Err(Error::Backend(
                "torrent rejected (already present or invalid)".into(),
            ));
        }

        debug!(link = %link, "Torrent submitted to qBittorrent");
        Ok(())
    }

    async fn torrent_progress(&self) -> Result<HashMap<String, f64>> {
        let session = self.login().await?;

        let mut request = self
            .http_client
            .get(self.endpoint("/api/v2/torrents/info"))
            .header(COOKIE, session);
        if let Some(category) = &self.config.category {
            request = request.query(&[("category", category.as_str())]);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::Backend(format!(
                "torrent list returned HTTP {}",
                status.as_u16()
            )));
        }

        let torrents: Vec<TorrentInfo> = response
            .json()
            .await
            .map_err(|e| Error::Backend(format!("Failed to parse torrent list: {}", e)))?;

        Ok(torrents
            .into_iter()
            .map(|t| (t.hash.to_lowercase(), t.progress))
            .collect())
    }
}
