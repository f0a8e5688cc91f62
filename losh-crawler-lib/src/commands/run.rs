//! Command dispatch logic for losh-crawler

use super::{
    CrawlArgs, DiscoverArgs, DownloadLicensesArgs, InitArgs, UpdateLicensesArgs, ValidateArgs, crawl_products, discover_products,
    download_licenses, init_config, update_licenses, validate_config,
};
use crate::{Host, Result};
use clap::builder::Styles;
use clap::builder::styling::{AnsiColor, Effects};
use clap::{Parser, Subcommand};

const CLAP_STYLES: Styles = Styles::styled()
    .header(AnsiColor::Green.on_default().effects(Effects::BOLD))
    .usage(AnsiColor::Green.on_default().effects(Effects::BOLD))
    .literal(AnsiColor::Cyan.on_default().effects(Effects::BOLD))
    .placeholder(AnsiColor::Cyan.on_default());

#[derive(Parser, Debug)]
#[command(name = "losh-crawler", author, version, long_about = None)]
#[command(about = "Crawl open-source hardware projects into the LOSH data model")]
#[command(styles = CLAP_STYLES)]
struct Cli {
    #[command(subcommand)]
    command: LoshSubcommand,
}

#[derive(Subcommand, Debug)]
enum LoshSubcommand {
    /// Crawl specific products by URL
    Crawl(Box<CrawlArgs>),
    /// Crawl every product listed on the platform, resuming an interrupted run
    Discover(Box<DiscoverArgs>),
    /// Download the license catalog and save it to the store
    UpdateLicenses(Box<UpdateLicensesArgs>),
    /// Download the license catalog into a JSON file
    DownloadLicenses(Box<DownloadLicensesArgs>),
    /// Generate a default configuration file
    Init(InitArgs),
    /// Validate a configuration file
    ValidateConfig(ValidateArgs),
}

/// Parse `args` (program name first) and run the selected subcommand against `host`
///
/// # Errors
///
/// Returns an error if the arguments do not parse or the subcommand fails
pub async fn run<I, T, H>(host: &mut H, args: I) -> Result<()>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
    H: Host,
{
    match &Cli::parse_from(args).command {
        LoshSubcommand::Crawl(crawl_args) => crawl_products(host, crawl_args).await,
        LoshSubcommand::Discover(discover_args) => discover_products(host, discover_args).await,
        LoshSubcommand::UpdateLicenses(license_args) => update_licenses(host, license_args).await,
        LoshSubcommand::DownloadLicenses(license_args) => download_licenses(host, license_args).await,
        LoshSubcommand::Init(init_args) => init_config(host, init_args),
        LoshSubcommand::ValidateConfig(validate_args) => validate_config(host, validate_args),
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn subcommands_use_kebab_case() {
        let cli = Cli::try_parse_from(["losh-crawler", "validate-config", "--config", "x.toml"]).unwrap();
        assert!(matches!(cli.command, LoshSubcommand::ValidateConfig(_)));

        let cli = Cli::try_parse_from(["losh-crawler", "download-licenses", "--output", "l.json"]).unwrap();
        assert!(matches!(cli.command, LoshSubcommand::DownloadLicenses(_)));
    }

    #[test]
    fn crawl_requires_a_url() {
        assert!(Cli::try_parse_from(["losh-crawler", "crawl"]).is_err());
    }

    #[tokio::test]
    async fn init_writes_config() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("losh.toml");
        let mut host = crate::commands::host::TestHost::new();

        run(&mut host, ["losh-crawler", "init", "--output", path.to_str().unwrap()]).await.unwrap();
        assert!(path.exists());
    }
}
