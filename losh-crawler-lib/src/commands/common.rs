//! Wiring shared by the commands: arguments, logging, and construction of the
//! requesters, license cache, store and crawler from the configuration.

use super::config::Config;
use super::progress_reporter::{ProgressReporter, RequestStats};
use super::Host;
use crate::Result;
use crate::crawler::{CrawlError, Crawler, JsonFileStore, ProductStore};
use crate::licenses::{LicenseCache, SpdxProvider};
use crate::models::ProductId;
use crate::net::{CallContext, Downloader, GraphQlRequester, HttpRequester, RateLimiter};
use crate::platforms::wikifactory::WikifactoryClient;
use camino::{Utf8Path, Utf8PathBuf};
use clap::{Args, ValueEnum};
use core::num::NonZeroU32;
use core::time::Duration;
use ohno::{IntoAppError, app_err};
use owo_colors::OwoColorize;
use std::io::Write;
use std::sync::Arc;
use url::Url;

/// When result lines and the spinner are colored
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ColorMode {
    Always,
    Never,

    /// Only when stderr is a terminal
    Auto,
}

/// Verbosity of the diagnostic log on stderr
///
/// `none` keeps stderr free for the spinner; any other level disables the spinner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    None,
    Error,
    Warn,
    Info,

    /// Includes every request attempt and pipeline transition
    Debug,
    Trace,
}

/// Arguments shared by the commands that talk to the network or the store
#[derive(Args, Debug, Clone)]
pub struct CommonArgs {
    /// Path to configuration file (default is `losh.toml`)
    #[arg(long, short = 'c', value_name = "PATH")]
    pub config: Option<Utf8PathBuf>,

    /// Directory receiving the crawled products, licenses and hosts
    #[arg(long, value_name = "PATH", default_value = "losh-data")]
    pub store_dir: Utf8PathBuf,

    /// Color the output
    #[arg(long, value_name = "WHEN", default_value = "auto")]
    pub color: ColorMode,

    /// Diagnostic log level, refined by `RUST_LOG` when not `none`
    #[arg(long, value_name = "LEVEL", default_value = "none", global = true)]
    pub log_level: LogLevel,
}

pub struct Common<'a, H: Host> {
    pub config: Config,
    pub host: &'a mut H,
    pub progress: ProgressReporter,
    pub stats: Arc<RequestStats>,
    store_dir: Utf8PathBuf,
    use_colors: bool,
}

impl<'a, H: Host> Common<'a, H> {
    /// Set up logging and load the configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration cannot be loaded
    pub fn new(host: &'a mut H, args: &CommonArgs) -> Result<Self> {
        init_logging(args.log_level);

        let config = Config::load(Utf8Path::new("."), args.config.as_ref())?;

        // a spinner would garble the log output
        let delay = if args.log_level == LogLevel::None {
            Duration::from_millis(300)
        } else {
            Duration::from_hours(365 * 24)
        };

        let use_colors = match args.color {
            ColorMode::Always => true,
            ColorMode::Never => false,
            ColorMode::Auto => {
                use std::io::{IsTerminal, stderr};
                stderr().is_terminal()
            }
        };

        Ok(Self {
            config,
            host,
            progress: ProgressReporter::new(delay, use_colors),
            stats: Arc::new(RequestStats::default()),
            store_dir: args.store_dir.clone(),
            use_colors,
        })
    }

    fn requester(&self, name: &str, limit: &super::config::RateLimitConfig) -> Result<HttpRequester> {
        let max_requests = NonZeroU32::new(limit.max_requests).ok_or_else(|| app_err!("rate limit of '{name}' must allow at least one request"))?;

        HttpRequester::builder()
            .name(name)
            .user_agent(self.config.user_agent.clone())
            .timeout(self.config.request_timeout)
            .max_redirects(self.config.max_redirects)
            .retry_count(self.config.retry_count)
            .base_delay(self.config.retry_base_delay)
            .max_wait(self.config.max_wait)
            .rate_limiter(RateLimiter::new(max_requests, limit.window))
            .observer(self.stats.observer())
            .build()
    }

    /// The downloader for plain files, limited by `file_rate_limit`.
    pub fn file_downloader(&self) -> Result<Downloader> {
        Ok(Downloader::new(self.requester("files", &self.config.file_rate_limit)?))
    }

    pub fn license_provider(&self) -> Result<SpdxProvider> {
        Ok(SpdxProvider::with_list_url(self.file_downloader()?, &self.config.spdx_license_list_url)?
            .with_max_details_size(self.config.max_manifest_size))
    }

    pub fn store(&self) -> JsonFileStore {
        JsonFileStore::new(self.store_dir.clone())
    }

    /// A store that is known to accept writes.
    pub async fn reachable_store(&self, ctx: &CallContext) -> Result<JsonFileStore> {
        let store = self.store();
        if !store.is_reachable(ctx).await {
            return Err(app_err!("store directory '{}' is not usable", store.root()));
        }
        Ok(store)
    }

    /// Build a crawler writing to `store`, with the license catalog loaded.
    pub async fn crawler(&self, ctx: &CallContext, store: Arc<dyn ProductStore>) -> Result<Crawler> {
        let endpoint = Url::parse(&self.config.graphql_endpoint)
            .into_app_err_with(|| format!("parsing GraphQL endpoint '{}'", self.config.graphql_endpoint))?;
        let graphql = GraphQlRequester::new(self.requester("wikifactory", &self.config.graphql_rate_limit)?, endpoint);

        let licenses = Arc::new(LicenseCache::new(Arc::new(self.license_provider()?)));
        self.progress.set_phase("Loading", || "license catalog".to_string());
        let count = licenses.reload(ctx).await?;
        self.progress.println(&format!("Loaded {count} licenses"));

        Ok(Crawler::new(WikifactoryClient::new(graphql), licenses, store))
    }

    /// Print one line per crawled id.
    pub fn print_outcome(&mut self, id: &ProductId, outcome: &core::result::Result<String, CrawlError>) {
        let line = match outcome {
            Ok(xid) if self.use_colors => format!("{} {id} -> {xid}", "ok".green().bold()),
            Ok(xid) => format!("ok {id} -> {xid}"),
            Err(e) if self.use_colors => format!("{} {id}: {e}", "failed".red().bold()),
            Err(e) => format!("failed {id}: {e}"),
        };
        let _ = writeln!(self.host.output(), "{line}");
    }
}

/// Initialize logger based on log level
fn init_logging(log_level: LogLevel) {
    let level = match log_level {
        LogLevel::None => return,
        LogLevel::Error => "error",
        LogLevel::Warn => "warn",
        LogLevel::Info => "info",
        LogLevel::Debug => "debug",
        LogLevel::Trace => "trace",
    };

    let env = env_logger::Env::default().filter_or("RUST_LOG", level);

    // commands may run more than once per process in tests
    let _ = env_logger::Builder::from_env(env)
        .format_timestamp(None)
        .format_module_path(false)
        .format_target(matches!(log_level, LogLevel::Debug | LogLevel::Trace))
        .try_init();
}
