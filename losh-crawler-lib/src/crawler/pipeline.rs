use super::{CrawlError, CrawlStage, ProductStore};
use crate::licenses::LicenseCache;
use crate::models::{Host, Product, ProductId};
use crate::net::CallContext;
use crate::platforms::wikifactory::{FullProject, GroupInfo, MinimalProject, Normalizer, WIKIFACTORY_DOMAIN, WikifactoryClient};
use crate::validator::Validator;
use chrono::Utc;
use futures_util::future::join_all;
use std::sync::Arc;
use tokio::sync::Semaphore;

const LOG_TARGET: &str = "   crawler";

/// Follows one product through the pipeline, logging every transition.
#[derive(Debug)]
pub(super) struct StageTracker<'a> {
    id: &'a ProductId,
    stage: CrawlStage,
}

impl<'a> StageTracker<'a> {
    pub(super) const fn new(id: &'a ProductId) -> Self {
        Self { id, stage: CrawlStage::Idle }
    }

    pub(super) fn enter(&mut self, stage: CrawlStage) {
        log::debug!(target: LOG_TARGET, "{}: {} -> {stage}", self.id, self.stage);
        self.stage = stage;
    }

    pub(super) fn finish<T>(mut self, result: Result<T, CrawlError>) -> Result<T, CrawlError> {
        match &result {
            Ok(_) => self.enter(CrawlStage::Done),
            Err(e) => log::debug!(target: LOG_TARGET, "{}: {} -> failed: {e}", self.id, self.stage),
        }
        result
    }
}

/// Outcome of crawling a list of products.
#[derive(Debug, Default)]
pub struct BatchReport {
    /// One entry per requested id, in request order, holding the saved xid on success.
    pub outcomes: Vec<(ProductId, Result<String, CrawlError>)>,
}

impl BatchReport {
    #[must_use]
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|(_, r)| r.is_ok()).count()
    }

    #[must_use]
    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }
}

/// Runs products through fetch, validation, normalization and persistence.
#[derive(Debug, Clone)]
pub struct Crawler {
    client: WikifactoryClient,
    validator: Validator,
    normalizer: Normalizer,
    store: Arc<dyn ProductStore>,
}

impl Crawler {
    #[must_use]
    pub fn new(client: WikifactoryClient, licenses: Arc<LicenseCache>, store: Arc<dyn ProductStore>) -> Self {
        Self {
            client,
            validator: Validator::new(Arc::clone(&licenses)),
            normalizer: Normalizer::new(licenses),
            store,
        }
    }

    pub(super) const fn client(&self) -> &WikifactoryClient {
        &self.client
    }

    /// Crawl a product and hand it to the store, returning its xid.
    pub async fn crawl_product(&self, ctx: &CallContext, id: &ProductId) -> Result<String, CrawlError> {
        let mut tracker = StageTracker::new(id);
        let result = async {
            let product = self.fetch_with(ctx, id, &mut tracker).await?;
            self.persist(ctx, product, &mut tracker).await
        }
        .await;
        tracker.finish(result)
    }

    /// Crawl a product without persisting it.
    pub async fn fetch_product(&self, ctx: &CallContext, id: &ProductId) -> Result<Product, CrawlError> {
        let mut tracker = StageTracker::new(id);
        let result = self.fetch_with(ctx, id, &mut tracker).await;
        tracker.finish(result)
    }

    /// Crawl many products, at most `concurrency` at a time.
    ///
    /// A failing product never stops the others; every id gets an entry in the report.
    pub async fn crawl_batch(&self, ctx: &CallContext, ids: &[ProductId], concurrency: usize) -> BatchReport {
        if let Err(e) = self.register_hosts(ctx).await {
            log::warn!(target: LOG_TARGET, "could not save hosts: {e:#}");
        }

        let semaphore = Semaphore::new(concurrency.max(1));
        let tasks = ids.iter().map(|id| {
            let semaphore = &semaphore;
            async move {
                let _permit = semaphore.acquire().await.expect("semaphore is never closed");
                (id.clone(), self.crawl_product(ctx, id).await)
            }
        });

        let report = BatchReport {
            outcomes: join_all(tasks).await,
        };
        log::info!(target: LOG_TARGET, "crawled {} products: {} succeeded, {} failed", ids.len(), report.succeeded(), report.failed());
        report
    }

    /// Save the hosts this crawler reads from.
    pub(super) async fn register_hosts(&self, ctx: &CallContext) -> crate::Result<()> {
        let hosts = vec![Host::new(WIKIFACTORY_DOMAIN, "Wikifactory")];
        self.store.save_hosts(ctx, hosts).await
    }

    async fn fetch_with(&self, ctx: &CallContext, id: &ProductId, tracker: &mut StageTracker<'_>) -> Result<Product, CrawlError> {
        if id.platform() != WIKIFACTORY_DOMAIN {
            return Err(CrawlError::UnsupportedPlatform(id.platform().to_owned()));
        }

        tracker.enter(CrawlStage::FetchMinimal);
        let minimal = self
            .client
            .get_minimal_project(ctx, id.owner(), id.repo())
            .await
            .map_err(|source| CrawlError::Request {
                stage: CrawlStage::FetchMinimal,
                source,
            })?
            .ok_or_else(|| CrawlError::NotFound {
                stage: CrawlStage::FetchMinimal,
                what: format!("project {}/{}", id.owner(), id.repo()),
            })?;

        self.complete(ctx, id, &minimal, tracker).await
    }

    /// Everything after the minimal project is known: validate it, then fetch,
    /// normalize and validate the full product.
    pub(super) async fn complete(
        &self,
        ctx: &CallContext,
        id: &ProductId,
        minimal: &MinimalProject,
        tracker: &mut StageTracker<'_>,
    ) -> Result<Product, CrawlError> {
        let discovered_at = Utc::now();

        tracker.enter(CrawlStage::ValidateMandatory);
        self.validator
            .validate_mandatory(&self.normalizer.mandatory_fields(minimal))
            .map_err(|source| CrawlError::Validation {
                stage: CrawlStage::ValidateMandatory,
                source,
            })?;

        tracker.enter(CrawlStage::FetchFull);
        let project = self
            .client
            .get_full_project(ctx, id.owner(), id.repo())
            .await
            .map_err(|source| CrawlError::Request {
                stage: CrawlStage::FetchFull,
                source,
            })?
            .ok_or_else(|| CrawlError::NotFound {
                stage: CrawlStage::FetchFull,
                what: format!("project {}/{}", id.owner(), id.repo()),
            })?;
        let group = self.fetch_group(ctx, &project).await?;

        tracker.enter(CrawlStage::Normalize);
        let product = self
            .normalizer
            .normalize(&project, group.as_ref(), discovered_at)
            .map_err(CrawlError::Normalize)?;

        tracker.enter(CrawlStage::ValidateProduct);
        self.validator.validate_product(&product).map_err(|source| CrawlError::Validation {
            stage: CrawlStage::ValidateProduct,
            source,
        })?;

        Ok(product)
    }

    pub(super) async fn persist(&self, ctx: &CallContext, product: Product, tracker: &mut StageTracker<'_>) -> Result<String, CrawlError> {
        tracker.enter(CrawlStage::Persist);
        let xid = product.xid.clone();
        self.store.save_product(ctx, product).await.map_err(CrawlError::Persist)?;
        log::info!(target: LOG_TARGET, "saved product {xid}");
        Ok(xid)
    }

    async fn fetch_group(&self, ctx: &CallContext, project: &FullProject) -> Result<Option<GroupInfo>, CrawlError> {
        if !project.is_owned_by_group() {
            return Ok(None);
        }

        let slug = project
            .parent_content
            .as_ref()
            .and_then(|p| p.slug.as_deref())
            .or(project.parent_slug.as_deref())
            .unwrap_or_default();

        let group = self
            .client
            .get_group(ctx, slug)
            .await
            .map_err(|source| CrawlError::Request {
                stage: CrawlStage::FetchFull,
                source,
            })?
            .ok_or_else(|| CrawlError::NotFound {
                stage: CrawlStage::FetchFull,
                what: format!("group {slug}"),
            })?;
        Ok(Some(group))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_counts() {
        let id = ProductId::new(WIKIFACTORY_DOMAIN, "jdoe", "spinner", "");
        let report = BatchReport {
            outcomes: vec![
                (id.clone(), Ok("wikifactory.com/jdoe/spinner/-".into())),
                (id.clone(), Err(CrawlError::UnsupportedPlatform("github.com".into()))),
                (id, Err(CrawlError::Normalize(ohno::app_err!("broken")))),
            ],
        };
        assert_eq!(report.succeeded(), 1);
        assert_eq!(report.failed(), 2);
    }
}
