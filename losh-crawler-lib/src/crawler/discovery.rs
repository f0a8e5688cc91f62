use super::pipeline::StageTracker;
use super::{CrawlError, Crawler};
use crate::Result;
use crate::models::ProductId;
use crate::net::CallContext;
use crate::platforms::wikifactory::{MinimalProject, WIKIFACTORY_DOMAIN};
use camino::Utf8Path;
use chrono::{DateTime, Utc};
use core::time::Duration;
use ohno::IntoAppError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::time::Instant;

const LOG_TARGET: &str = " discovery";

/// Number of projects requested per listing page.
pub const DISCOVERY_BATCH_SIZE: u32 = 10;

/// Progress of a discovery run, persisted after every page so an interrupted
/// run resumes where it stopped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveryState {
    pub start_time: DateTime<Utc>,
    #[serde(with = "humantime_serde")]
    pub elapsed_time: Duration,
    pub num_crawled: u64,
    pub num_indexed: u64,
    pub cursor: String,
    pub page: u64,
}

impl DiscoveryState {
    #[must_use]
    pub fn new(start_time: DateTime<Utc>) -> Self {
        Self {
            start_time,
            elapsed_time: Duration::ZERO,
            num_crawled: 0,
            num_indexed: 0,
            cursor: String::new(),
            page: 1,
        }
    }

    /// Read the state file, starting fresh if there is none.
    pub fn load(path: &Utf8Path) -> Result<Self> {
        match fs::read_to_string(path) {
            Ok(text) => serde_json::from_str(&text).into_app_err_with(|| format!("parsing discovery state '{path}'")),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Self::new(Utc::now())),
            Err(e) => Err(e).into_app_err_with(|| format!("reading discovery state '{path}'")),
        }
    }

    pub fn save(&self, path: &Utf8Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).into_app_err("serializing discovery state")?;
        fs::write(path, json).into_app_err_with(|| format!("writing discovery state '{path}'"))
    }
}

impl Crawler {
    /// Walk the whole project listing and crawl every project that passes the
    /// mandatory field check.
    ///
    /// Projects failing validation or normalization are skipped. Request and
    /// store failures end the run; the state file then still points at the page
    /// that was being processed, so the next run retries it.
    pub async fn discover(&self, ctx: &CallContext, state_path: &Utf8Path) -> Result<DiscoveryState> {
        let mut state = DiscoveryState::load(state_path)?;
        log::info!(target: LOG_TARGET, "discovering products on {WIKIFACTORY_DOMAIN}, starting at page {}", state.page);

        self.register_hosts(ctx).await?;

        let run_started = Instant::now();
        let previously_elapsed = state.elapsed_time;

        loop {
            log::debug!(target: LOG_TARGET, "getting {DISCOVERY_BATCH_SIZE} results from page {} (cursor '{}')", state.page, state.cursor);
            let page = self
                .client()
                .query_projects(ctx, DISCOVERY_BATCH_SIZE, &state.cursor)
                .await
                .into_app_err_with(|| format!("listing projects on page {}", state.page))?;

            for project in &page.projects {
                if self.index_listed(ctx, project).await? {
                    state.num_indexed += 1;
                }
            }

            state.page += 1;
            state.num_crawled += page.projects.len() as u64;
            state.cursor = page.end_cursor.clone().unwrap_or_default();
            state.elapsed_time = previously_elapsed + run_started.elapsed();
            state.save(state_path)?;

            log::debug!(target: LOG_TARGET, "indexed {} of {} products so far", state.num_indexed, state.num_crawled);

            if !page.has_next_page || page.end_cursor.is_none() {
                break;
            }
        }

        log::info!(target: LOG_TARGET, "discovery done: indexed {} of {} products", state.num_indexed, state.num_crawled);
        Ok(state)
    }

    /// Crawl one project from the listing; `Ok(false)` if it was skipped.
    async fn index_listed(&self, ctx: &CallContext, project: &MinimalProject) -> Result<bool> {
        let (Some(owner), Some(slug)) = (project.parent_slug.as_deref(), project.slug.as_deref()) else {
            log::debug!(target: LOG_TARGET, "skipping project without owner or slug");
            return Ok(false);
        };
        let id = ProductId::new(WIKIFACTORY_DOMAIN, owner, slug, "");

        let mut tracker = StageTracker::new(&id);
        let result = async {
            let product = self.complete(ctx, &id, project, &mut tracker).await?;
            self.persist(ctx, product, &mut tracker).await
        }
        .await;

        match tracker.finish(result) {
            Ok(_) => Ok(true),
            Err(e @ (CrawlError::Validation { .. } | CrawlError::NotFound { .. } | CrawlError::Normalize(_))) => {
                log::debug!(target: LOG_TARGET, "skipping {id}: {e}");
                Ok(false)
            }
            Err(e) => Err(e).into_app_err_with(|| format!("indexing {id}")),
        }
    }
}
