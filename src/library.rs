//! Read-only views of the local library and the ranking feed
//!
//! The filesystem scanner and the ranking crawler own this data. The
//! orchestrator only needs a point lookup and an ordered listing, so those
//! are the two traits defined here. [`Database`] implements both over the
//! `library_items` and `rankings` tables the neighbors write into.

use async_trait::async_trait;

use crate::db::Database;
use crate::error::Result;
use crate::types::FeedItem;

/// Point lookup into the local-ownership index
#[async_trait]
pub trait OwnershipCheck: Send + Sync {
    /// Whether `code` already exists in the local library
    async fn exists(&self, code: &str) -> Result<bool>;
}

/// Ranked items of a category, in rank order
#[async_trait]
pub trait CandidateFeed: Send + Sync {
    /// Up to `limit` items of `category`, best rank first
    async fn list_by_category(&self, category: &str, limit: i64) -> Result<Vec<FeedItem>>;
}

#[async_trait]
impl OwnershipCheck for Database {
    async fn exists(&self, code: &str) -> Result<bool> {
        self.library_contains(code).await
    }
}

#[async_trait]
impl CandidateFeed for Database {
    async fn list_by_category(&self, category: &str, limit: i64) -> Result<Vec<FeedItem>> {
        self.list_rankings(category, limit).await
    }
}
