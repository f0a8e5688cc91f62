//! Resilient network access.
//!
//! Every outbound call made by the crawler goes through this module. The
//! building blocks are layered from the bottom up:
//!
//! - [`CallContext`] carries the caller's cancellation token and deadline.
//! - [`RateLimiter`] bounds the number of calls in a rolling window.
//! - [`HttpRequester`] adds rate limiting, retries with exponential backoff
//!   and redirect limits to a single logical request.
//! - [`GraphQlRequester`] speaks GraphQL over the HTTP requester.
//! - [`Downloader`] streams response bodies with size limits and transparent
//!   gzip decoding.
//!
//! All suspension points (limiter waits, backoff sleeps, network I/O and body
//! streaming) are raced against the [`CallContext`], so a cancelled crawl never
//! blocks mid-wait.

mod context;
mod download;
mod error;
mod graphql;
mod rate_limiter;
mod resilient_http;

pub use context::CallContext;
pub use download::Downloader;
pub use error::RequestError;
pub use graphql::GraphQlRequester;
pub use rate_limiter::RateLimiter;
pub use resilient_http::{Attempt, AttemptObserver, AttemptOutcome, HttpRequester, HttpRequesterBuilder, RetryPolicy};
