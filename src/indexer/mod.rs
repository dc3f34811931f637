//! Torrent indexer access
//!
//! [`IndexerClient`] is the seam the orchestrator searches through;
//! [`JackettClient`] implements it against Jackett's aggregate search API.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::Candidate;

mod jackett;

pub use jackett::JackettClient;

/// Search for acquirable candidates
///
/// An empty result is a normal outcome, not an error.
#[async_trait]
pub trait IndexerClient: Send + Sync {
    /// Candidates matching `key`, in the indexer's order
    async fn search(&self, key: &str) -> Result<Vec<Candidate>>;
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;
