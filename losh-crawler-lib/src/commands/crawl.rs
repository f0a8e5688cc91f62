use super::Host;
use super::common::{Common, CommonArgs};
use crate::Result;
use crate::crawler::MemoryStore;
use crate::models::ProductId;
use crate::net::CallContext;
use camino::Utf8PathBuf;
use clap::Parser;
use ohno::{IntoAppError, bail};
use std::io::Write;
use std::sync::Arc;

#[derive(Parser, Debug)]
pub struct CrawlArgs {
    /// URLs of the products to crawl
    #[arg(value_name = "URL", required = true)]
    pub urls: Vec<String>,

    /// Write the products to this file as JSON instead of saving them to the store
    #[arg(long, value_name = "PATH")]
    pub output: Option<Utf8PathBuf>,

    #[command(flatten)]
    pub common: CommonArgs,
}

/// Crawl the products behind the given URLs
///
/// # Errors
///
/// Returns an error if a URL is not a product URL, the license catalog cannot be
/// loaded, or any product fails to crawl
pub async fn crawl_products<H: Host>(host: &mut H, args: &CrawlArgs) -> Result<()> {
    let ids = args
        .urls
        .iter()
        .map(|url| ProductId::from_url(url))
        .collect::<Result<Vec<_>>>()?;

    let mut common = Common::new(host, &args.common)?;
    let ctx = CallContext::new();

    let failed = if let Some(output) = &args.output {
        let crawler = common.crawler(&ctx, Arc::new(MemoryStore::new())).await?;
        let stats = Arc::clone(&common.stats);
        common.progress.set_phase("Crawling", move || stats.summary());

        let mut products = Vec::with_capacity(ids.len());
        let mut failed = 0;
        for id in &ids {
            match crawler.fetch_product(&ctx, id).await {
                Ok(product) => {
                    common.print_outcome(id, &Ok(product.xid.clone()));
                    products.push(product);
                }
                Err(e) => {
                    common.print_outcome(id, &Err(e));
                    failed += 1;
                }
            }
        }
        common.progress.done();

        let json = serde_json::to_string_pretty(&products).into_app_err("serializing products")?;
        std::fs::write(output, json).into_app_err_with(|| format!("writing products to '{output}'"))?;
        let _ = writeln!(common.host.output(), "Wrote {} product(s) to {output}", products.len());
        failed
    } else {
        let store = common.reachable_store(&ctx).await?;
        let crawler = common.crawler(&ctx, Arc::new(store)).await?;
        let stats = Arc::clone(&common.stats);
        common.progress.set_phase("Crawling", move || stats.summary());

        let report = crawler.crawl_batch(&ctx, &ids, common.config.concurrency).await;
        common.progress.done();

        for (id, outcome) in &report.outcomes {
            common.print_outcome(id, outcome);
        }
        let _ = writeln!(
            common.host.output(),
            "Crawled {} product(s): {} succeeded, {} failed",
            report.outcomes.len(),
            report.succeeded(),
            report.failed()
        );
        report.failed()
    };

    if failed > 0 {
        common.host.exit(1);
        bail!("{failed} product(s) could not be crawled");
    }

    Ok(())
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::commands::host::TestHost;

    #[tokio::test]
    async fn rejects_unsupported_urls_before_crawling() {
        let mut host = TestHost::new();
        let args = CrawlArgs::parse_from(["crawl", "https://example.com/foo/bar"]);

        let result = crawl_products(&mut host, &args).await;
        assert!(result.is_err());
        assert!(host.output_str().is_empty());
    }

    #[test]
    fn parses_arguments() {
        let args = CrawlArgs::parse_from([
            "crawl",
            "https://wikifactory.com/@jdoe/spinner",
            "--output",
            "out.json",
            "--store-dir",
            "data",
        ]);
        assert_eq!(args.urls, ["https://wikifactory.com/@jdoe/spinner"]);
        assert_eq!(args.output, Some(Utf8PathBuf::from("out.json")));
        assert_eq!(args.common.store_dir, "data");
    }
}
