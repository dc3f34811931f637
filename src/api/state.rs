//! Application state for the API server

use crate::{Config, RankDownloader};
use std::sync::Arc;

/// Shared application state accessible to all route handlers
///
/// Cloned for each request (cheap Arc clone).
#[derive(Clone)]
pub struct AppState {
    /// The orchestrator every handler delegates to
    pub downloader: Arc<RankDownloader>,

    /// Configuration the router was built with
    pub config: Arc<Config>,
}

impl AppState {
    /// Create a new AppState
    pub fn new(downloader: Arc<RankDownloader>, config: Arc<Config>) -> Self {
        Self { downloader, config }
    }
}
