//! Command-line interface for losh-crawler
//!
//! This module wires the crawler library into a command-line tool. It handles
//! argument parsing, configuration loading, logging setup and progress output;
//! the actual work is done by the [`crate::crawler`] and [`crate::licenses`] modules.
//!
//! ## Commands
//!
//! - **crawl**: Crawl specific products by URL and save them to the store, or
//!   write them to a JSON file with `--output`
//! - **discover**: Page through the whole platform listing and crawl every
//!   product that carries the mandatory fields; progress is kept in a state
//!   file so an interrupted run picks up where it stopped
//! - **update-licenses** / **download-licenses**: Fetch the SPDX license catalog,
//!   including license texts, into the store or a file
//! - **init**: Generate a default configuration file
//! - **validate-config**: Check a configuration file
//!
//! The `common` module turns the configuration into rate-limited requesters,
//! the license cache, the store and the crawler. The store used by the tool is a
//! directory of JSON documents (`--store-dir`).

mod common;
mod config;
mod crawl;
mod discover;
mod host;
mod init;
mod licenses;
mod progress_reporter;
mod run;
mod validate;

#[cfg(debug_assertions)]
pub use config::Config;

pub use common::{ColorMode, CommonArgs, LogLevel};
pub use crawl::{CrawlArgs, crawl_products};
pub use discover::{DiscoverArgs, discover_products};
pub use host::Host;
pub use init::{InitArgs, init_config};
pub use licenses::{DownloadLicensesArgs, UpdateLicensesArgs, download_licenses, update_licenses};
pub use progress_reporter::{ProgressReporter, RequestStats};
pub use run::run;
pub use validate::{ValidateArgs, validate_config};
