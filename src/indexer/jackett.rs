//! Jackett aggregate search client.

use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;
use std::sync::LazyLock;
use tracing::debug;

use super::IndexerClient;
use crate::config::IndexerConfig;
use crate::error::{Error, Result};
use crate::types::Candidate;

static BTIH: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?i)xt=urn:btih:([0-9a-z]+)").ok());

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchResult>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct SearchResult {
    #[serde(default)]
    title: String,
    #[serde(default)]
    tracker: String,
    #[serde(default)]
    size: i64,
    link: Option<String>,
    magnet_uri: Option<String>,
    seeders: Option<i64>,
    peers: Option<i64>,
    info_hash: Option<String>,
}

impl SearchResult {
    fn into_candidate(self) -> Option<Candidate> {
        let magnet = self.magnet_uri.filter(|m| !m.is_empty());
        let info_hash = self
            .info_hash
            .filter(|h| !h.is_empty())
            .or_else(|| magnet.as_deref().and_then(info_hash_from_magnet));
        let link = magnet.or(self.link.filter(|l| !l.is_empty()))?;

        Some(Candidate {
            title: self.title,
            link,
            size_bytes: self.size,
            seeders: self.seeders.unwrap_or(0),
            peers: self.peers.unwrap_or(0),
            tracker: self.tracker,
            info_hash: info_hash.map(|h| h.to_lowercase()),
        })
    }
}

/// Extract the `btih` info-hash from a magnet link
pub(crate) fn info_hash_from_magnet(magnet: &str) -> Option<String> {
    let re = BTIH.as_ref()?;
    re.captures(magnet)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Client for Jackett's `/api/v2.0/indexers/all/results` endpoint
#[derive(Clone)]
pub struct JackettClient {
    http_client: reqwest::Client,
    config: IndexerConfig,
}

impl JackettClient {
    /// Create a client; every request is bounded by `config.timeout`
    pub fn new(config: IndexerConfig) -> Result<Self> {
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

    /// Search endpoint below `config.url`, keeping any reverse-proxy path prefix
    fn search_url(&self) -> Result<url::Url> {
        let endpoint = format!(
            "{}/api/v2.0/indexers/all/results",
            self.config.url.trim_end_matches('/')
        );
        url::Url::parse(&endpoint).map_err(|e| Error::Config {
            message: format!("invalid indexer url: {}", e),
            key: Some("indexer.url".into()),
        })
    }
}

#[async_trait]
impl IndexerClient for JackettClient {
    async fn search(&self, key: &str) -> Result<Vec<Candidate>> {
        let mut url = self.search_url()?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("apikey", &self.config.api_key);
            query.append_pair("Query", key);
            for category in &self.config.categories {
                query.append_pair("Category[]", &category.to_string());
            }
        }

        debug!(key = %key, "Searching indexer");

        let response = self.http_client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::Indexer(format!(
                "search returned HTTP {}",
                status.as_u16()
            )));
        }

        let body: SearchResponse = response
            .json()
            .await
            .map_err(|e| Error::Indexer(format!("Failed to parse search response: {}", e)))?;

        // Every result goes to selection; the best release may be listed last
        let candidates: Vec<Candidate> = body
            .results
            .into_iter()
            .filter_map(SearchResult::into_candidate)
            .collect();

        debug!(key = %key, results = candidates.len(), "Indexer search finished");
        Ok(candidates)
    }
}
