use core::fmt::{Display, Formatter};
use reqwest::StatusCode;

/// Failure of a single logical network operation.
#[derive(Debug)]
pub enum RequestError {
    /// The request never produced a response (DNS, connect, TLS, reset...).
    Transport(reqwest::Error),

    /// The server answered with a status code the caller did not accept.
    HttpStatus { status: StatusCode, retryable: bool },

    /// The redirect chain exceeded the configured maximum.
    RedirectLoop { max_redirects: usize },

    /// The response body is larger than the caller allowed.
    ///
    /// `size` is the declared length when the check failed up front, `None` when the
    /// limit was hit while streaming a body of unknown length.
    ContentTooLarge { size: Option<u64>, limit: u64 },

    /// The caller's context was cancelled.
    Cancelled,

    /// The caller's deadline passed.
    DeadlineExceeded,

    /// A GraphQL endpoint answered with a non-empty `errors` array.
    GraphQl(Vec<String>),

    /// The response body could not be decoded.
    Decode(serde_json::Error),

    /// Local I/O failed while writing or decompressing a body.
    Io(std::io::Error),
}

impl RequestError {
    /// Whether retrying the same request could succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(_) => true,
            Self::HttpStatus { retryable, .. } => *retryable,
            _ => false,
        }
    }

    /// Whether the operation was stopped by its caller rather than failing on its own.
    #[must_use]
    pub const fn is_cancellation(&self) -> bool {
        matches!(self, Self::Cancelled | Self::DeadlineExceeded)
    }

    #[must_use]
    pub const fn status(&self) -> Option<StatusCode> {
        match self {
            Self::HttpStatus { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Build an `HttpStatus` error, classifying the status for retries.
    #[must_use]
    pub fn from_status(status: StatusCode) -> Self {
        Self::HttpStatus {
            status,
            retryable: is_retryable_status(status),
        }
    }
}

/// Server errors and rate limiting are transient; every other status is final.
#[must_use]
pub fn is_retryable_status(status: StatusCode) -> bool {
    status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS
}

impl Display for RequestError {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Transport(e) => write!(f, "transport error: {e}"),
            Self::HttpStatus { status, .. } => write!(f, "unexpected HTTP status {status}"),
            Self::RedirectLoop { max_redirects } => write!(f, "redirect loop: more than {max_redirects} redirects"),
            Self::ContentTooLarge { size: Some(size), limit } => {
                write!(f, "content too large: declared {size} bytes exceeds the limit of {limit} bytes")
            }
            Self::ContentTooLarge { size: None, limit } => write!(f, "content too large: body exceeds the limit of {limit} bytes"),
            Self::Cancelled => write!(f, "operation cancelled"),
            Self::DeadlineExceeded => write!(f, "deadline exceeded"),
            Self::GraphQl(messages) => write!(f, "GraphQL error: {}", messages.join("; ")),
            Self::Decode(e) => write!(f, "unable to decode response: {e}"),
            Self::Io(e) => write!(f, "I/O error: {e}"),
        }
    }
}

impl core::error::Error for RequestError {
    fn source(&self) -> Option<&(dyn core::error::Error + 'static)> {
        match self {
            Self::Transport(e) => Some(e),
            Self::Decode(e) => Some(e),
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for RequestError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_classification() {
        assert!(RequestError::from_status(StatusCode::SERVICE_UNAVAILABLE).is_retryable());
        assert!(RequestError::from_status(StatusCode::TOO_MANY_REQUESTS).is_retryable());
        assert!(!RequestError::from_status(StatusCode::NOT_FOUND).is_retryable());
        assert!(!RequestError::from_status(StatusCode::FORBIDDEN).is_retryable());
    }

    #[test]
    fn terminal_errors_are_not_retryable() {
        assert!(!RequestError::RedirectLoop { max_redirects: 5 }.is_retryable());
        assert!(!RequestError::ContentTooLarge { size: Some(10), limit: 5 }.is_retryable());
        assert!(!RequestError::Cancelled.is_retryable());
        assert!(RequestError::Cancelled.is_cancellation());
        assert!(RequestError::DeadlineExceeded.is_cancellation());
    }

    #[test]
    fn display_messages() {
        assert_eq!(
            RequestError::ContentTooLarge { size: Some(100), limit: 10 }.to_string(),
            "content too large: declared 100 bytes exceeds the limit of 10 bytes"
        );
        assert_eq!(
            RequestError::GraphQl(vec!["a".into(), "b".into()]).to_string(),
            "GraphQL error: a; b"
        );
        assert_eq!(RequestError::RedirectLoop { max_redirects: 5 }.to_string(), "redirect loop: more than 5 redirects");
    }
}
