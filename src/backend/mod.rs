//! Download daemon access
//!
//! [`DownloadBackendClient`] is the seam the orchestrator submits transport
//! links through; [`QbittorrentClient`] implements it against the qBittorrent
//! Web API. The backend knows nothing about task ids: progress is matched
//! back to tasks by info-hash.

use async_trait::async_trait;
use std::collections::HashMap;

use crate::error::Result;

mod qbittorrent;

pub use qbittorrent::QbittorrentClient;

/// Accepts transport links and starts fetching them
#[async_trait]
pub trait DownloadBackendClient: Send + Sync {
    /// Hand a magnet or .torrent link to the backend
    async fn submit(&self, link: &str) -> Result<()>;

    /// Completed fraction of every known torrent, keyed by lowercase info-hash
    ///
    /// Backends that cannot report progress return an empty map.
    async fn torrent_progress(&self) -> Result<HashMap<String, f64>> {
        Ok(HashMap::new())
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;
