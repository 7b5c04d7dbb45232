//! Exponential backoff with jitter.
//!
//! Delay for the 0-indexed attempt `i` is `base * 2^i + uniform(0, jitter)`.
//! The policy stops once `i` reaches `max_retries`, so a run of retryable
//! failures makes exactly `max_retries + 1` attempts.

use std::time::Duration;

use rand::Rng;

use crate::errors::RefreshError;

/// Default base delay.
const DEFAULT_BASE: Duration = Duration::from_secs(2);

/// Default number of retries after the first attempt.
const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default jitter width.
const DEFAULT_JITTER: Duration = Duration::from_secs(1);

/// Decision returned by [`BackoffPolicy::next_delay`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Backoff {
    /// Sleep for the given delay, then try again.
    Retry(Duration),
    /// Give up and return the last error.
    Stop,
}

/// Backoff configuration shared by the invocations of one fetch task.
#[derive(Clone, Debug, PartialEq)]
pub struct BackoffPolicy {
    /// Delay before the first retry (before jitter).
    pub base: Duration,
    /// Retries allowed after the first attempt.
    pub max_retries: u32,
    /// Upper bound of the uniformly distributed jitter. Zero disables it.
    pub jitter: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base: DEFAULT_BASE,
            max_retries: DEFAULT_MAX_RETRIES,
            jitter: DEFAULT_JITTER,
        }
    }
}

impl BackoffPolicy {
    pub fn new(base: Duration, max_retries: u32) -> Self {
        Self {
            base,
            max_retries,
            ..Self::default()
        }
    }

    pub fn with_jitter(mut self, jitter: Duration) -> Self {
        self.jitter = jitter;
        self
    }

    /// Decide what to do after `attempt` (0-indexed) failed with `error`.
    pub fn next_delay(&self, attempt: u32, error: &RefreshError) -> Backoff {
        if attempt >= self.max_retries || !error.retry_class().is_retryable() {
            return Backoff::Stop;
        }
        Backoff::Retry(self.base_delay(attempt).saturating_add(self.sample_jitter()))
    }

    /// `base * 2^attempt`, saturating.
    pub fn base_delay(&self, attempt: u32) -> Duration {
        let factor = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
        self.base.saturating_mul(factor)
    }

    fn sample_jitter(&self) -> Duration {
        let width = self.jitter.as_millis() as u64;
        if width == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rand::thread_rng().gen_range(0..=width))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn retryable() -> RefreshError {
        RefreshError::Transport {
            provider: "RANKING".to_string(),
            message: "connection refused".to_string(),
        }
    }

    #[test]
    fn test_delay_doubles_without_jitter() {
        let policy = BackoffPolicy::new(Duration::from_millis(100), 5).with_jitter(Duration::ZERO);
        assert_eq!(
            policy.next_delay(0, &retryable()),
            Backoff::Retry(Duration::from_millis(100))
        );
        assert_eq!(
            policy.next_delay(1, &retryable()),
            Backoff::Retry(Duration::from_millis(200))
        );
        assert_eq!(
            policy.next_delay(3, &retryable()),
            Backoff::Retry(Duration::from_millis(800))
        );
    }

    #[test]
    fn test_stops_at_max_retries() {
        let policy = BackoffPolicy::new(Duration::from_millis(10), 2);
        assert!(matches!(policy.next_delay(1, &retryable()), Backoff::Retry(_)));
        assert_eq!(policy.next_delay(2, &retryable()), Backoff::Stop);
        assert_eq!(policy.next_delay(7, &retryable()), Backoff::Stop);
    }

    #[test]
    fn test_stops_on_non_retryable() {
        let policy = BackoffPolicy::default();
        let error = RefreshError::CredentialInvalid {
            provider: "RANKING".to_string(),
            message: "expired".to_string(),
        };
        assert_eq!(policy.next_delay(0, &error), Backoff::Stop);
        assert_eq!(
            policy.next_delay(0, &RefreshError::Canceled("shutdown".to_string())),
            Backoff::Stop
        );
    }

    #[test]
    fn test_zero_retries_never_retries() {
        let policy = BackoffPolicy::new(Duration::from_millis(10), 0);
        assert_eq!(policy.next_delay(0, &retryable()), Backoff::Stop);
    }

    #[test]
    fn test_base_delay_saturates() {
        let policy = BackoffPolicy::new(Duration::from_secs(1), u32::MAX);
        assert!(policy.base_delay(64) >= policy.base_delay(31));
    }

    proptest! {
        #[test]
        fn prop_delay_is_monotonic_and_jitter_bounded(
            base_ms in 1u64..5_000,
            attempt in 0u32..16,
            jitter_ms in 0u64..2_000,
        ) {
            let policy = BackoffPolicy::new(Duration::from_millis(base_ms), 32)
                .with_jitter(Duration::from_millis(jitter_ms));
            let floor = policy.base_delay(attempt);

            match policy.next_delay(attempt + 1, &retryable()) {
                Backoff::Retry(next) => prop_assert!(next >= floor),
                Backoff::Stop => prop_assert!(false, "unexpected stop"),
            }
            match policy.next_delay(attempt, &retryable()) {
                Backoff::Retry(delay) => {
                    prop_assert!(delay >= floor);
                    prop_assert!(delay <= floor + Duration::from_millis(jitter_ms));
                }
                Backoff::Stop => prop_assert!(false, "unexpected stop"),
            }
        }
    }
}
