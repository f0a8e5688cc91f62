use super::{CallContext, RequestError};
use core::num::NonZeroU32;
use core::time::Duration;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tokio::time::Instant;

/// Grants at most `max_grants` calls in any rolling window of `window`.
///
/// Wrap in an `Arc` via [`RateLimiter::new`] and share one instance between all
/// requesters talking to the same host. Callers that find the window full sleep
/// until the oldest grant leaves the window. A full burst of `max_grants` calls is
/// allowed at the start of a window; there is no fairness guarantee beyond that.
#[derive(Debug)]
pub struct RateLimiter {
    max_grants: usize,
    window: Duration,
    grants: Mutex<VecDeque<Instant>>,
}

impl RateLimiter {
    /// Create a limiter that allows `max_grants` calls per `window`.
    #[must_use]
    pub fn new(max_grants: NonZeroU32, window: Duration) -> Arc<Self> {
        let max_grants = max_grants.get() as usize;
        Arc::new(Self {
            max_grants,
            window,
            grants: Mutex::new(VecDeque::with_capacity(max_grants)),
        })
    }

    #[must_use]
    pub const fn max_grants(&self) -> usize {
        self.max_grants
    }

    #[must_use]
    pub const fn window(&self) -> Duration {
        self.window
    }

    /// Wait until a call may proceed.
    ///
    /// Returns [`RequestError::Cancelled`] or [`RequestError::DeadlineExceeded`] if the
    /// context ends while waiting; no grant is consumed in that case.
    pub async fn acquire(&self, ctx: &CallContext) -> Result<(), RequestError> {
        loop {
            ctx.check()?;

            let retry_at = {
                let mut grants = self.grants.lock().expect("lock not poisoned");
                let now = Instant::now();

                while grants.front().is_some_and(|&granted| now.duration_since(granted) >= self.window) {
                    let _ = grants.pop_front();
                }

                if grants.len() < self.max_grants {
                    grants.push_back(now);
                    None
                } else {
                    grants.front().map(|&oldest| oldest + self.window)
                }
            };

            match retry_at {
                None => return Ok(()),
                Some(at) => ctx.run(tokio::time::sleep_until(at)).await?,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::sync::atomic::{AtomicUsize, Ordering};

    fn limiter(n: u32, window: Duration) -> Arc<RateLimiter> {
        RateLimiter::new(NonZeroU32::new(n).unwrap(), window)
    }

    #[tokio::test]
    async fn first_n_calls_are_not_delayed() {
        let limiter = limiter(3, Duration::from_secs(10));
        let ctx = CallContext::new();

        let start = Instant::now();
        for _ in 0..3 {
            limiter.acquire(&ctx).await.unwrap();
        }

        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn extra_call_waits_for_window() {
        let window = Duration::from_millis(200);
        let limiter = limiter(3, window);
        let ctx = CallContext::new();

        let start = Instant::now();
        for _ in 0..3 {
            limiter.acquire(&ctx).await.unwrap();
        }
        let burst = start.elapsed();

        limiter.acquire(&ctx).await.unwrap();
        let total = start.elapsed();

        assert!(burst < window);
        assert!(total >= window, "fourth call returned after {total:?}");
    }

    #[tokio::test]
    async fn never_exceeds_rate_under_concurrency() {
        let window = Duration::from_millis(100);
        let limiter = limiter(2, window);
        let granted = Arc::new(AtomicUsize::new(0));
        let start = Instant::now();

        let tasks: Vec<_> = (0..6)
            .map(|_| {
                let limiter = Arc::clone(&limiter);
                let granted = Arc::clone(&granted);
                tokio::spawn(async move {
                    limiter.acquire(&CallContext::new()).await.unwrap();
                    let _ = granted.fetch_add(1, Ordering::SeqCst);
                })
            })
            .collect();

        _ = futures_util::future::join_all(tasks).await;

        assert_eq!(granted.load(Ordering::SeqCst), 6);

        // 6 grants at 2 per window need at least two full windows
        assert!(start.elapsed() >= window * 2);
    }

    #[tokio::test]
    async fn cancellation_while_waiting() {
        let limiter = limiter(1, Duration::from_secs(60));
        let ctx = CallContext::new();
        limiter.acquire(&ctx).await.unwrap();

        let canceller = ctx.clone();
        drop(tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            canceller.cancel();
        }));

        let start = Instant::now();
        let result = limiter.acquire(&ctx).await;

        assert!(matches!(result, Err(RequestError::Cancelled)));
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn deadline_while_waiting() {
        let limiter = limiter(1, Duration::from_secs(60));
        let ctx = CallContext::new();
        limiter.acquire(&ctx).await.unwrap();

        let result = limiter.acquire(&ctx.with_timeout(Duration::from_millis(20))).await;
        assert!(matches!(result, Err(RequestError::DeadlineExceeded)));
    }
}
