use super::RequestError;
use core::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Cancellation token plus optional deadline, threaded through every network call.
///
/// Cloning a context is cheap and clones share the same token, so cancelling
/// any clone cancels them all. Use [`CallContext::child`] to derive a context
/// that can be cancelled independently of its parent.
#[derive(Debug, Clone, Default)]
pub struct CallContext {
    cancel: CancellationToken,
    deadline: Option<Instant>,
}

impl CallContext {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap an existing cancellation token.
    #[must_use]
    pub const fn with_token(cancel: CancellationToken) -> Self {
        Self { cancel, deadline: None }
    }

    /// Derive a context whose deadline is at most `timeout` from now.
    ///
    /// An earlier deadline inherited from `self` is kept.
    #[must_use]
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        let candidate = Instant::now() + timeout;
        let deadline = match self.deadline {
            Some(existing) if existing < candidate => existing,
            _ => candidate,
        };

        Self {
            cancel: self.cancel.clone(),
            deadline: Some(deadline),
        }
    }

    /// Derive a context that is cancelled with its parent but can also be cancelled on its own.
    #[must_use]
    pub fn child(&self) -> Self {
        Self {
            cancel: self.cancel.child_token(),
            deadline: self.deadline,
        }
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    #[must_use]
    pub const fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    #[must_use]
    pub const fn token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Fail if the context has already been cancelled or its deadline has passed.
    pub fn check(&self) -> Result<(), RequestError> {
        if self.cancel.is_cancelled() {
            return Err(RequestError::Cancelled);
        }

        if self.deadline.is_some_and(|deadline| Instant::now() >= deadline) {
            return Err(RequestError::DeadlineExceeded);
        }

        Ok(())
    }

    /// Sleep for `duration` unless the context is cancelled or expires first.
    pub async fn sleep(&self, duration: Duration) -> Result<(), RequestError> {
        if duration.is_zero() {
            return self.check();
        }

        self.run(tokio::time::sleep(duration)).await
    }

    /// Drive `fut` to completion unless the context is cancelled or expires first.
    ///
    /// On cancellation the future is dropped, which aborts any I/O it was performing.
    pub async fn run<F: Future>(&self, fut: F) -> Result<F::Output, RequestError> {
        self.check()?;

        let deadline = async {
            match self.deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => core::future::pending::<()>().await,
            }
        };

        tokio::select! {
            biased;
            () = self.cancel.cancelled() => Err(RequestError::Cancelled),
            () = deadline => Err(RequestError::DeadlineExceeded),
            output = fut => Ok(output),
        }
    }
}
