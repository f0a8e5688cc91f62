use super::Repository;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Crawl bookkeeping attached to every crawled entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrawlerMeta {
    discovered_at: DateTime<Utc>,
    last_indexed_at: DateTime<Utc>,
    data_source: Arc<Repository>,
}

impl CrawlerMeta {
    /// Metadata for an entity discovered and indexed at `timestamp`.
    #[must_use]
    pub fn new(timestamp: DateTime<Utc>, data_source: Arc<Repository>) -> Self {
        Self {
            discovered_at: timestamp,
            last_indexed_at: timestamp,
            data_source,
        }
    }

    #[must_use]
    pub const fn discovered_at(&self) -> DateTime<Utc> {
        self.discovered_at
    }

    #[must_use]
    pub const fn last_indexed_at(&self) -> DateTime<Utc> {
        self.last_indexed_at
    }

    #[must_use]
    pub fn data_source(&self) -> &Arc<Repository> {
        &self.data_source
    }
}
