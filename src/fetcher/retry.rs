use super::FetchOutcome;
use std::time::Duration;

/// Retry policy for transient fetch failures: timeouts and connection
/// errors get exponential backoff; everything else (4xx/5xx HTTP
/// responses, redirect errors, successful fetches) returns immediately.
/// Remote HTTP errors are recorded as visit outcomes and left for the
/// next natural frontier pass rather than retried here.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    /// delay = base_delay * 2^attempt
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        self.base_delay * 2u32.pow(attempt)
    }

    pub fn is_retryable(outcome: &FetchOutcome) -> bool {
        matches!(outcome, FetchOutcome::Timeout { .. } | FetchOutcome::ConnectionError { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_retries, 3);
        assert_eq!(policy.base_delay, Duration::from_secs(5));
    }

    #[test]
    fn test_delay_for_attempt_doubles() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for_attempt(0), Duration::from_secs(5));
        assert_eq!(policy.delay_for_attempt(1), Duration::from_secs(10));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_secs(20));
    }

    #[test]
    fn test_retryable_timeout_and_connection() {
        let timing = Default::default();
        assert!(RetryPolicy::is_retryable(&FetchOutcome::Timeout { timing }));
        assert!(RetryPolicy::is_retryable(&FetchOutcome::ConnectionError {
            message: "x".to_string(),
            timing,
        }));
    }

    #[test]
    fn test_http_errors_never_retryable() {
        let timing = Default::default();
        assert!(!RetryPolicy::is_retryable(&FetchOutcome::HttpError {
            status_code: 503,
            timing,
        }));
        assert!(!RetryPolicy::is_retryable(&FetchOutcome::HttpError {
            status_code: 404,
            timing,
        }));
    }

    #[test]
    fn test_redirect_error_not_retryable() {
        let timing = Default::default();
        assert!(!RetryPolicy::is_retryable(&FetchOutcome::RedirectError {
            message: "loop".to_string(),
            timing,
        }));
    }
}
