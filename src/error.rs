//! Error types for the StudyHub gateway.

use std::time::Duration;

use thiserror::Error;

/// Main error type for gateway operations.
#[derive(Error, Debug)]
pub enum StudyhubError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Errors raised while layering configuration sources
    #[error("Configuration source error: {0}")]
    ConfigSource(#[from] config::ConfigError),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for gateway operations.
pub type Result<T> = std::result::Result<T, StudyhubError>;

/// The only admission outcome a caller ever observes as an error.
///
/// The display text is part of the external contract and is sent verbatim
/// as the `detail` field of the 429 body.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("Rate limit exceeded. Please try again later.")]
pub struct RateLimitExceeded {
    /// Time until the oldest request in the window ages out
    pub retry_after: Duration,
}

impl RateLimitExceeded {
    /// Whole seconds for the `Retry-After` header, rounded up and never zero.
    pub fn retry_after_secs(&self) -> u64 {
        let secs = self.retry_after.as_secs();
        let secs = if self.retry_after.subsec_nanos() > 0 { secs.saturating_add(1) } else { secs };
        secs.max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejection_message_is_stable() {
        let err = RateLimitExceeded { retry_after: Duration::from_secs(5) };
        assert_eq!(err.to_string(), "Rate limit exceeded. Please try again later.");
    }

    #[test]
    fn test_retry_after_rounds_up() {
        let err = RateLimitExceeded { retry_after: Duration::from_millis(2_100) };
        assert_eq!(err.retry_after_secs(), 3);

        let err = RateLimitExceeded { retry_after: Duration::from_secs(4) };
        assert_eq!(err.retry_after_secs(), 4);
    }

    #[test]
    fn test_retry_after_saturates() {
        let err = RateLimitExceeded { retry_after: Duration::new(u64::MAX, 1) };
        assert_eq!(err.retry_after_secs(), u64::MAX);
    }

    #[test]
    fn test_retry_after_never_zero() {
        let err = RateLimitExceeded { retry_after: Duration::ZERO };
        assert_eq!(err.retry_after_secs(), 1);
    }
}
