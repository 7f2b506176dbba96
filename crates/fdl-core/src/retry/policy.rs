use std::time::Duration;

/// High-level classification of a fragment error.
///
/// Every kind is retried the same way; the kind only feeds logs and the
/// run summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Operation timed out (connect/transfer).
    Timeout,
    /// Server asked us to slow down (429, 503).
    Throttled,
    /// Network-level failure (connection reset, DNS, etc.).
    Connection,
    /// Server error other than throttling.
    Http5xx(u16),
    /// Local fragment file failure.
    Storage,
    /// Anything else (4xx, ignored range, short body, ...).
    Other,
}

/// Decision returned by the retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Give up on this fragment; the download fails.
    NoRetry,
    /// Requeue after the given delay.
    RetryAfter(Duration),
}

/// Per-fragment retry rule.
///
/// The default requeues a failed fragment immediately and forever. A budget with
/// exponential backoff is opt-in via [`RetryPolicy::bounded`] or config `[retry]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum number of attempts per fragment, including the first. 0 = unlimited.
    pub max_attempts: u32,
    /// Base delay for backoff.
    pub base_delay: Duration,
    /// Upper bound on backoff delay.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::unbounded()
    }
}

impl RetryPolicy {
    /// Requeue immediately, forever.
    pub fn unbounded() -> Self {
        Self {
            max_attempts: 0,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }

    /// `max_attempts` tries with backoff 250ms, 500ms, 1s, ... capped at 30s.
    pub fn bounded(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            base_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(30),
        }
    }

    /// Decide what to do after `attempt` failed (1-based: 1 = first attempt).
    pub fn decide(&self, attempt: u32) -> RetryDecision {
        if self.max_attempts != 0 && attempt >= self.max_attempts {
            return RetryDecision::NoRetry;
        }
        // base * 2^(attempt-1), capped.
        let exp = 1u32 << attempt.saturating_sub(1).min(8);
        let delay = self.base_delay.saturating_mul(exp).min(self.max_delay);
        RetryDecision::RetryAfter(delay)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn delay(p: &RetryPolicy, attempt: u32) -> Duration {
        match p.decide(attempt) {
            RetryDecision::RetryAfter(d) => d,
            RetryDecision::NoRetry => panic!("expected retry at attempt {attempt}"),
        }
    }

    #[test]
    fn exponential_backoff_grows_and_is_capped() {
        let p = RetryPolicy::bounded(20);
        assert_eq!(delay(&p, 1), Duration::from_millis(250));
        assert_eq!(delay(&p, 2), Duration::from_millis(500));
        assert_eq!(delay(&p, 3), Duration::from_secs(1));
        assert_eq!(delay(&p, 15), p.max_delay);
    }

    #[test]
    fn respects_max_attempts() {
        let p = RetryPolicy::bounded(3);
        assert!(matches!(p.decide(1), RetryDecision::RetryAfter(_)));
        assert!(matches!(p.decide(2), RetryDecision::RetryAfter(_)));
        assert_eq!(p.decide(3), RetryDecision::NoRetry);
    }

    #[test]
    fn default_is_unbounded_without_delay() {
        let p = RetryPolicy::default();
        assert_eq!(p, RetryPolicy::unbounded());
        assert_eq!(p.decide(1), RetryDecision::RetryAfter(Duration::ZERO));
        assert_eq!(p.decide(500), RetryDecision::RetryAfter(Duration::ZERO));
    }

    #[test]
    fn unbounded_never_gives_up() {
        let p = RetryPolicy::unbounded();
        assert_eq!(p.decide(1_000_000), RetryDecision::RetryAfter(Duration::ZERO));
    }
}
