use super::Host;
use super::common::{Common, CommonArgs};
use crate::Result;
use crate::crawler::ProductStore;
use crate::licenses::fetch_licenses_with_text;
use crate::models::License;
use crate::net::CallContext;
use camino::Utf8PathBuf;
use clap::Parser;
use ohno::IntoAppError;
use std::io::Write;
use std::sync::Arc;

#[derive(Parser, Debug)]
pub struct UpdateLicensesArgs {
    #[command(flatten)]
    pub common: CommonArgs,
}

#[derive(Parser, Debug)]
pub struct DownloadLicensesArgs {
    /// File receiving the licenses as JSON
    #[arg(long, value_name = "PATH")]
    pub output: Utf8PathBuf,

    #[command(flatten)]
    pub common: CommonArgs,
}

async fn download<H: Host>(common: &Common<'_, H>, ctx: &CallContext) -> Result<Vec<License>> {
    let provider = common.license_provider()?;
    let stats = Arc::clone(&common.stats);
    common.progress.set_phase("Downloading", move || format!("licenses, {}", stats.summary()));
    let result = fetch_licenses_with_text(&provider, ctx).await;
    common.progress.done();
    result
}

/// Download the license catalog including license texts and save it to the store
///
/// # Errors
///
/// Returns an error if the catalog cannot be downloaded or saved
pub async fn update_licenses<H: Host>(host: &mut H, args: &UpdateLicensesArgs) -> Result<()> {
    let mut common = Common::new(host, &args.common)?;
    let ctx = CallContext::new();

    let store = common.reachable_store(&ctx).await?;
    let licenses = download(&common, &ctx).await?;
    let count = licenses.len();
    store.save_licenses(&ctx, licenses).await?;

    let _ = writeln!(common.host.output(), "Saved {count} license(s) to {}", store.root());
    Ok(())
}

/// Download the license catalog including license texts into a JSON file
///
/// # Errors
///
/// Returns an error if the catalog cannot be downloaded or the file cannot be written
pub async fn download_licenses<H: Host>(host: &mut H, args: &DownloadLicensesArgs) -> Result<()> {
    let mut common = Common::new(host, &args.common)?;
    let ctx = CallContext::new();

    let licenses = download(&common, &ctx).await?;
    let json = serde_json::to_string_pretty(&licenses).into_app_err("serializing licenses")?;
    std::fs::write(&args.output, json).into_app_err_with(|| format!("writing licenses to '{}'", args.output))?;

    let _ = writeln!(common.host.output(), "Wrote {} license(s) to {}", licenses.len(), args.output);
    Ok(())
}
