#![doc(hidden)]
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! Core library for losh-crawler
//!
//! This library consolidates all functionality of the losh-crawler tool, which
//! collects open-source hardware projects from hosting platforms and normalizes
//! them into the LOSH open hardware data model.
//!
//! # Module Organization
//!
//! - [`commands`]: Command-line interface and orchestration
//! - [`net`]: Rate-limited, retrying HTTP and GraphQL requesters and a streaming downloader
//! - [`licenses`]: The license catalog and its cache
//! - [`models`]: The open hardware data model
//! - [`normalize`]: Platform independent normalization helpers
//! - [`platforms`]: Platform adapters (API clients and normalizers)
//! - [`validator`]: Structural checks on crawled data
//! - [`crawler`]: The per-product pipeline, batch crawling and discovery

pub type Result<T, E = ohno::AppError> = core::result::Result<T, E>;

#[cfg(any(debug_assertions, test))]
pub mod commands;
#[cfg(not(any(debug_assertions, test)))]
mod commands;

#[cfg(any(debug_assertions, test))]
pub mod crawler;
#[cfg(not(any(debug_assertions, test)))]
mod crawler;

#[cfg(any(debug_assertions, test))]
pub mod licenses;
#[cfg(not(any(debug_assertions, test)))]
mod licenses;

#[cfg(any(debug_assertions, test))]
pub mod models;
#[cfg(not(any(debug_assertions, test)))]
mod models;

#[cfg(any(debug_assertions, test))]
pub mod net;
#[cfg(not(any(debug_assertions, test)))]
mod net;

#[cfg(any(debug_assertions, test))]
pub mod normalize;
#[cfg(not(any(debug_assertions, test)))]
mod normalize;

#[cfg(any(debug_assertions, test))]
pub mod platforms;
#[cfg(not(any(debug_assertions, test)))]
mod platforms;

#[cfg(any(debug_assertions, test))]
pub mod validator;
#[cfg(not(any(debug_assertions, test)))]
mod validator;

pub use crate::commands::{Host, run};
