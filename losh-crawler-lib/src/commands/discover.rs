use super::Host;
use super::common::{Common, CommonArgs};
use crate::Result;
use crate::net::CallContext;
use camino::Utf8PathBuf;
use clap::Parser;
use std::io::Write;
use std::sync::Arc;

#[derive(Parser, Debug)]
pub struct DiscoverArgs {
    /// File recording how far discovery got, used to resume an interrupted run
    #[arg(long, value_name = "PATH", default_value = "crawler-state.json")]
    pub state: Utf8PathBuf,

    #[command(flatten)]
    pub common: CommonArgs,
}

/// Crawl every product listed on the platform
///
/// # Errors
///
/// Returns an error if the listing cannot be paged through or the store rejects a product
pub async fn discover_products<H: Host>(host: &mut H, args: &DiscoverArgs) -> Result<()> {
    let mut common = Common::new(host, &args.common)?;
    let ctx = CallContext::new();

    let store = common.reachable_store(&ctx).await?;
    let crawler = common.crawler(&ctx, Arc::new(store)).await?;

    let stats = Arc::clone(&common.stats);
    common.progress.set_phase("Discovering", move || stats.summary());
    let result = crawler.discover(&ctx, &args.state).await;
    common.progress.done();

    match result {
        Ok(state) => {
            let _ = writeln!(
                common.host.output(),
                "Indexed {} of {} product(s) in {}",
                state.num_indexed,
                state.num_crawled,
                humantime_serde::re::humantime::format_duration(state.elapsed_time)
            );
            Ok(())
        }
        Err(e) => {
            let _ = writeln!(common.host.error(), "Discovery stopped, resume with the state in '{}': {e:#}", args.state);
            common.host.exit(1);
            Err(e)
        }
    }
}
