//! Crawl orchestration.
//!
//! A [`Crawler`] takes products through the pipeline
//! `fetch minimal -> validate mandatory -> fetch full -> normalize -> validate product -> persist`,
//! either one at a time, as a bounded-concurrency batch, or by walking the
//! platform's project listing with [`Crawler::discover`]. Persistence goes
//! through a [`ProductStore`].

mod discovery;
mod error;
mod pipeline;
mod store;

pub use discovery::{DISCOVERY_BATCH_SIZE, DiscoveryState};
pub use error::{CrawlError, CrawlStage};
pub use pipeline::{BatchReport, Crawler};
pub use store::{JsonFileStore, MemoryStore, ProductStore};
