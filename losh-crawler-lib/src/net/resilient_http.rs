//! Resilient HTTP requests with rate limiting, retries and cancellation.
//!
//! [`HttpRequester`] wraps a [`reqwest::Client`] and runs each request in an
//! explicit retry loop: all rate limiters are acquired, the request is sent, the
//! result is classified and, for transient failures, the loop sleeps for an
//! exponentially growing delay before trying again. Every wait in that loop is
//! raced against the caller's [`CallContext`].

use super::error::is_retryable_status;
use super::{CallContext, RateLimiter, RequestError};
use chrono::{DateTime, Utc};
use core::fmt::{Debug, Formatter};
use core::time::Duration;
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{Request, Response, StatusCode};
use std::sync::Arc;

const LOG_TARGET: &str = "      http";

/// Default per-attempt timeout.
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Default number of retries on top of the original request.
const DEFAULT_RETRY_COUNT: u32 = 5;

/// Default base delay for exponential backoff between retries.
const DEFAULT_RETRY_BASE_DELAY: Duration = Duration::from_secs(1);

/// Default cap for any single backoff delay.
const DEFAULT_MAX_WAIT: Duration = Duration::from_mins(5);

const DEFAULT_MAX_REDIRECTS: usize = 5;

const DEFAULT_USER_AGENT: &str = "LOSH Bot (github.com/aisbergg/losh)";

/// Retry parameters for an [`HttpRequester`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries on top of the original attempt.
    pub retry_count: u32,

    /// Delay before the first retry; doubled for each following retry.
    pub base_delay: Duration,

    /// Upper bound for any single delay, including server-requested ones.
    pub max_wait: Duration,
}

impl RetryPolicy {
    /// Delay before retry number `retry` (zero-based), before any server override.
    #[must_use]
    pub fn backoff(&self, retry: u32) -> Duration {
        let factor = 2u32.saturating_pow(retry);
        self.base_delay.saturating_mul(factor).min(self.max_wait)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retry_count: DEFAULT_RETRY_COUNT,
            base_delay: DEFAULT_RETRY_BASE_DELAY,
            max_wait: DEFAULT_MAX_WAIT,
        }
    }
}

/// What happened during one attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    /// A response was received and handed to the caller.
    Response(StatusCode),

    /// A response with a transient status was received.
    RetryableStatus(StatusCode),

    /// The request failed before a response arrived.
    TransportError(String),

    /// The redirect chain was too long.
    RedirectLoop,

    /// The caller's context ended during the attempt or the delay before it.
    Cancelled,
}

/// Diagnostic record of a single attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attempt {
    /// Zero for the original request, then one per retry.
    pub index: u32,

    /// Backoff applied before this attempt.
    pub delay: Duration,

    pub outcome: AttemptOutcome,
}

/// Callback invoked after every attempt.
pub type AttemptObserver = Arc<dyn Fn(&Attempt) + Send + Sync>;

/// Classified result of sending one request.
enum Sent {
    Done(Response),
    Retry { error: RequestError, retry_after: Option<Duration> },
}

/// HTTP client that rate limits, retries and honors cancellation.
#[derive(Clone)]
pub struct HttpRequester {
    client: reqwest::Client,
    name: Arc<str>,
    limiters: Vec<Arc<RateLimiter>>,
    retry: RetryPolicy,
    max_redirects: usize,
    observer: Option<AttemptObserver>,
}

impl Debug for HttpRequester {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("HttpRequester")
            .field("name", &self.name)
            .field("limiters", &self.limiters)
            .field("retry", &self.retry)
            .field("max_redirects", &self.max_redirects)
            .field("observer", &self.observer.as_ref().map(|_| "<callback>"))
            .finish_non_exhaustive()
    }
}

impl HttpRequester {
    #[must_use]
    pub fn builder() -> HttpRequesterBuilder {
        HttpRequesterBuilder::default()
    }

    /// The underlying client, for building requests to pass to [`Self::execute`].
    #[must_use]
    pub const fn client(&self) -> &reqwest::Client {
        &self.client
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub const fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    /// Send a GET request for `url`.
    pub async fn get(&self, ctx: &CallContext, url: &str) -> Result<Response, RequestError> {
        let request = self.client.get(url).build().map_err(RequestError::Transport)?;
        self.execute(ctx, request).await
    }

    /// Send `request`, retrying transient failures.
    ///
    /// Responses with non-retryable statuses (including 4xx) are returned as `Ok` so
    /// callers can inspect them. When retries are exhausted the last transient
    /// failure is returned as an error. Requests whose body cannot be cloned are
    /// sent exactly once.
    pub async fn execute(&self, ctx: &CallContext, request: Request) -> Result<Response, RequestError> {
        let mut index = 0;
        let mut delay = Duration::ZERO;

        loop {
            let Some(this_try) = request.try_clone() else {
                return self.attempt(ctx, request, index, delay).await.and_then(|sent| match sent {
                    Sent::Done(response) => Ok(response),
                    Sent::Retry { error, .. } => Err(error),
                });
            };

            let (error, retry_after) = match self.attempt(ctx, this_try, index, delay).await? {
                Sent::Done(response) => return Ok(response),
                Sent::Retry { error, retry_after } => (error, retry_after),
            };

            if index >= self.retry.retry_count {
                log::debug!(
                    target: LOG_TARGET,
                    "{}: giving up on {} {} after {} attempt(s): {error}",
                    self.name,
                    request.method(),
                    request.url(),
                    index + 1
                );
                return Err(error);
            }

            delay = retry_after.map_or_else(|| self.retry.backoff(index), |d| d.min(self.retry.max_wait));
            index += 1;

            log::debug!(
                target: LOG_TARGET,
                "{}: retrying {} {} (attempt {}, delay {}ms): {error}",
                self.name,
                request.method(),
                request.url(),
                index + 1,
                delay.as_millis(),
            );

            if let Err(e) = ctx.sleep(delay).await {
                self.observe(index, delay, AttemptOutcome::Cancelled);
                return Err(e);
            }
        }
    }

    /// Acquire the limiters, send once and classify the result.
    async fn attempt(&self, ctx: &CallContext, request: Request, index: u32, delay: Duration) -> Result<Sent, RequestError> {
        let sent = async {
            for limiter in &self.limiters {
                limiter.acquire(ctx).await?;
            }
            ctx.run(self.client.execute(request)).await
        }
        .await;

        let result = match sent {
            Ok(result) => result,
            Err(e) => {
                self.observe(index, delay, AttemptOutcome::Cancelled);
                return Err(e);
            }
        };

        match result {
            Ok(response) => {
                let status = response.status();
                if is_retryable_status(status) {
                    self.observe(index, delay, AttemptOutcome::RetryableStatus(status));
                    let retry_after = if status == StatusCode::TOO_MANY_REQUESTS {
                        parse_retry_after(response.headers())
                    } else {
                        None
                    };
                    Ok(Sent::Retry {
                        error: RequestError::from_status(status),
                        retry_after,
                    })
                } else {
                    self.observe(index, delay, AttemptOutcome::Response(status));
                    Ok(Sent::Done(response))
                }
            }

            Err(e) if e.is_redirect() => {
                self.observe(index, delay, AttemptOutcome::RedirectLoop);
                Err(RequestError::RedirectLoop {
                    max_redirects: self.max_redirects,
                })
            }

            // a request that cannot be built will not build on the next attempt either
            Err(e) if e.is_builder() => {
                self.observe(index, delay, AttemptOutcome::TransportError(e.to_string()));
                Err(RequestError::Transport(e))
            }

            Err(e) => {
                self.observe(index, delay, AttemptOutcome::TransportError(e.to_string()));
                Ok(Sent::Retry {
                    error: RequestError::Transport(e),
                    retry_after: None,
                })
            }
        }
    }

    fn observe(&self, index: u32, delay: Duration, outcome: AttemptOutcome) {
        log::trace!(target: LOG_TARGET, "{}: attempt {index} after {}ms: {outcome:?}", self.name, delay.as_millis());

        if let Some(observer) = &self.observer {
            observer(&Attempt { index, delay, outcome });
        }
    }
}

/// Parse a `Retry-After` header given either as seconds or as an HTTP date.
fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    let value = headers.get(reqwest::header::RETRY_AFTER)?.to_str().ok()?.trim();

    if let Ok(seconds) = value.parse::<u64>() {
        return Some(Duration::from_secs(seconds));
    }

    let at = DateTime::parse_from_rfc2822(value).ok()?.with_timezone(&Utc);
    Some((at - Utc::now()).to_std().unwrap_or(Duration::ZERO))
}

/// Error handed to reqwest's redirect policy when the chain gets too long.
#[derive(Debug)]
struct TooManyRedirects(usize);

impl core::fmt::Display for TooManyRedirects {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        write!(f, "stopped after {} redirects", self.0)
    }
}

impl core::error::Error for TooManyRedirects {}

/// Builder for [`HttpRequester`].
#[derive(Clone)]
pub struct HttpRequesterBuilder {
    name: String,
    user_agent: String,
    timeout: Duration,
    max_redirects: usize,
    retry: RetryPolicy,
    limiters: Vec<Arc<RateLimiter>>,
    headers: HeaderMap,
    observer: Option<AttemptObserver>,
}

impl Debug for HttpRequesterBuilder {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("HttpRequesterBuilder")
            .field("name", &self.name)
            .field("user_agent", &self.user_agent)
            .field("timeout", &self.timeout)
            .field("max_redirects", &self.max_redirects)
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

impl Default for HttpRequesterBuilder {
    fn default() -> Self {
        Self {
            name: "http".to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout: DEFAULT_REQUEST_TIMEOUT,
            max_redirects: DEFAULT_MAX_REDIRECTS,
            retry: RetryPolicy::default(),
            limiters: Vec::new(),
            headers: HeaderMap::new(),
            observer: None,
        }
    }
}

impl HttpRequesterBuilder {
    /// Name shown in diagnostics for this requester.
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    #[must_use]
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Timeout for a single attempt, not for the whole retry sequence.
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub const fn max_redirects(mut self, max_redirects: usize) -> Self {
        self.max_redirects = max_redirects;
        self
    }

    #[must_use]
    pub const fn retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    #[must_use]
    pub const fn retry_count(mut self, retry_count: u32) -> Self {
        self.retry.retry_count = retry_count;
        self
    }

    #[must_use]
    pub const fn base_delay(mut self, base_delay: Duration) -> Self {
        self.retry.base_delay = base_delay;
        self
    }

    #[must_use]
    pub const fn max_wait(mut self, max_wait: Duration) -> Self {
        self.retry.max_wait = max_wait;
        self
    }

    /// Add a limiter that must grant before every attempt.
    #[must_use]
    pub fn rate_limiter(mut self, limiter: Arc<RateLimiter>) -> Self {
        self.limiters.push(limiter);
        self
    }

    /// Add a header sent with every request.
    #[must_use]
    pub fn header(mut self, name: reqwest::header::HeaderName, value: HeaderValue) -> Self {
        let _ = self.headers.insert(name, value);
        self
    }

    #[must_use]
    pub fn observer(mut self, observer: AttemptObserver) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn build(self) -> crate::Result<HttpRequester> {
        let max_redirects = self.max_redirects;
        let policy = reqwest::redirect::Policy::custom(move |attempt| {
            if attempt.previous().len() > max_redirects {
                attempt.error(TooManyRedirects(max_redirects))
            } else {
                attempt.follow()
            }
        });

        let client = reqwest::Client::builder()
            .user_agent(self.user_agent)
            .timeout(self.timeout)
            .redirect(policy)
            .default_headers(self.headers)
            .build()?;

        Ok(HttpRequester {
            client,
            name: Arc::from(self.name),
            limiters: self.limiters,
            retry: self.retry,
            max_redirects,
            observer: self.observer,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::RETRY_AFTER;

    #[test]
    fn backoff_doubles_and_caps() {
        let policy = RetryPolicy {
            retry_count: 10,
            base_delay: Duration::from_secs(1),
            max_wait: Duration::from_secs(10),
        };

        assert_eq!(policy.backoff(0), Duration::from_secs(1));
        assert_eq!(policy.backoff(1), Duration::from_secs(2));
        assert_eq!(policy.backoff(2), Duration::from_secs(4));
        assert_eq!(policy.backoff(3), Duration::from_secs(8));
        assert_eq!(policy.backoff(4), Duration::from_secs(10));
        assert_eq!(policy.backoff(40), Duration::from_secs(10));
    }

    #[test]
    fn retry_after_seconds() {
        let mut headers = HeaderMap::new();
        let _ = headers.insert(RETRY_AFTER, HeaderValue::from_static("7"));
        assert_eq!(parse_retry_after(&headers), Some(Duration::from_secs(7)));
    }

    #[test]
    fn retry_after_date_in_the_past() {
        let mut headers = HeaderMap::new();
        let _ = headers.insert(RETRY_AFTER, HeaderValue::from_static("Wed, 21 Oct 2015 07:28:00 GMT"));
        assert_eq!(parse_retry_after(&headers), Some(Duration::ZERO));
    }

    #[test]
    fn retry_after_garbage() {
        let mut headers = HeaderMap::new();
        let _ = headers.insert(RETRY_AFTER, HeaderValue::from_static("soon"));
        assert_eq!(parse_retry_after(&headers), None);
        assert_eq!(parse_retry_after(&HeaderMap::new()), None);
    }

    #[test]
    fn default_policy() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.retry_count, 5);
        assert_eq!(policy.base_delay, Duration::from_secs(1));
        assert_eq!(policy.max_wait, Duration::from_mins(5));
    }
}
