//! Retry driver.
//!
//! Calls a task's fetcher until it succeeds, fails with a non-retryable
//! error, runs out of retries, or is canceled. The whole invocation,
//! including backoff sleeps, is bounded by the task deadline.

use log::{debug, info, warn};
use tokio_util::sync::CancellationToken;

use crate::errors::RefreshError;
use crate::policy::Backoff;
use crate::provider::FetchOutcome;
use crate::scheduler::FetchTask;
use crate::store::SnapshotStore;

/// Run one bounded invocation of `task`.
///
/// Deadline expiry and cancellation both surface as [`RefreshError::Canceled`].
pub async fn run_with_retry(
    task: &FetchTask,
    store: &SnapshotStore,
    cancel: &CancellationToken,
) -> Result<FetchOutcome, RefreshError> {
    let deadline = task.deadline();
    match tokio::time::timeout(deadline, attempt_until_done(task, store, cancel)).await {
        Ok(result) => result,
        Err(_) => Err(RefreshError::Canceled(format!(
            "{} exceeded its {:?} deadline",
            task.name(),
            deadline
        ))),
    }
}

async fn attempt_until_done(
    task: &FetchTask,
    store: &SnapshotStore,
    cancel: &CancellationToken,
) -> Result<FetchOutcome, RefreshError> {
    let mut attempt: u32 = 0;
    loop {
        let error = match task.fetcher().fetch(store, cancel).await {
            Ok(outcome) => {
                if attempt > 0 {
                    info!("[{}] succeeded after {} retries", task.name(), attempt);
                }
                return Ok(outcome);
            }
            Err(e) => e,
        };

        if error.is_canceled() {
            return Err(error);
        }

        match task.policy().next_delay(attempt, &error) {
            Backoff::Stop => {
                debug!(
                    "[{}] giving up after attempt {}: {}",
                    task.name(),
                    attempt + 1,
                    error
                );
                return Err(error);
            }
            Backoff::Retry(delay) => {
                warn!(
                    "[{}] attempt {} failed: {}. Retrying in {:?}",
                    task.name(),
                    attempt + 1,
                    error,
                    delay
                );
                tokio::select! {
                    _ = cancel.cancelled() => {
                        return Err(RefreshError::Canceled(format!("{} retry backoff", task.name())));
                    }
                    _ = tokio::time::sleep(delay) => {}
                }
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TaskSchedule;
    use crate::policy::BackoffPolicy;
    use crate::provider::Fetcher;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    /// Fails `failures` times with `error`, then succeeds.
    struct FlakyFetcher {
        failures: usize,
        error: RefreshError,
        calls: AtomicUsize,
    }

    impl FlakyFetcher {
        fn new(failures: usize, error: RefreshError) -> Arc<Self> {
            Arc::new(Self {
                failures,
                error,
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Fetcher for FlakyFetcher {
        fn name(&self) -> &'static str {
            "FLAKY"
        }

        async fn fetch(
            &self,
            _store: &SnapshotStore,
            _cancel: &CancellationToken,
        ) -> Result<FetchOutcome, RefreshError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures {
                Err(self.error.clone())
            } else {
                Ok(FetchOutcome::Committed)
            }
        }
    }

    /// Never completes.
    struct HangingFetcher;

    #[async_trait]
    impl Fetcher for HangingFetcher {
        fn name(&self) -> &'static str {
            "HANGING"
        }

        async fn fetch(
            &self,
            _store: &SnapshotStore,
            _cancel: &CancellationToken,
        ) -> Result<FetchOutcome, RefreshError> {
            std::future::pending().await
        }
    }

    fn transport() -> RefreshError {
        RefreshError::Transport {
            provider: "FLAKY".to_string(),
            message: "connection reset".to_string(),
        }
    }

    fn task(fetcher: Arc<dyn Fetcher>, max_retries: u32) -> FetchTask {
        let policy = BackoffPolicy::new(Duration::from_millis(100), max_retries)
            .with_jitter(Duration::ZERO);
        FetchTask::new(
            fetcher,
            TaskSchedule::every(Duration::from_secs(60)),
            Arc::new(policy),
        )
    }

    fn store() -> SnapshotStore {
        SnapshotStore::new(Duration::from_secs(60))
    }

    #[tokio::test(start_paused = true)]
    async fn test_retryable_failure_makes_max_retries_plus_one_attempts() {
        let fetcher = FlakyFetcher::new(usize::MAX, transport());
        let err = run_with_retry(&task(fetcher.clone(), 3), &store(), &CancellationToken::new())
            .await
            .unwrap_err();

        assert_eq!(err, transport());
        assert_eq!(fetcher.calls(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_delays_are_exponential() {
        let fetcher = FlakyFetcher::new(usize::MAX, transport());
        let started = tokio::time::Instant::now();
        let _ = run_with_retry(&task(fetcher, 3), &store(), &CancellationToken::new()).await;

        // 100ms + 200ms + 400ms of backoff between four attempts
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(700));
        assert!(elapsed < Duration::from_millis(710));
    }

    #[tokio::test(start_paused = true)]
    async fn test_recovers_after_transient_failures() {
        let fetcher = FlakyFetcher::new(2, transport());
        let outcome = run_with_retry(&task(fetcher.clone(), 3), &store(), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(outcome, FetchOutcome::Committed);
        assert_eq!(fetcher.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_retryable_failure_stops_immediately() {
        let invalid = RefreshError::CredentialInvalid {
            provider: "FLAKY".to_string(),
            message: "401".to_string(),
        };
        let fetcher = FlakyFetcher::new(usize::MAX, invalid.clone());
        let err = run_with_retry(&task(fetcher.clone(), 3), &store(), &CancellationToken::new())
            .await
            .unwrap_err();

        assert_eq!(err, invalid);
        assert_eq!(fetcher.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_interrupts_backoff_sleep() {
        let fetcher = FlakyFetcher::new(usize::MAX, transport());
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = run_with_retry(&task(fetcher.clone(), 3), &store(), &cancel)
            .await
            .unwrap_err();

        assert!(err.is_canceled());
        assert_eq!(fetcher.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_bounds_invocation() {
        let mut schedule = TaskSchedule::every(Duration::from_secs(60));
        schedule.deadline = Some(Duration::from_secs(5));
        let task = FetchTask::new(
            Arc::new(HangingFetcher),
            schedule,
            Arc::new(BackoffPolicy::default()),
        );

        let started = tokio::time::Instant::now();
        let err = run_with_retry(&task, &store(), &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(err.is_canceled());
        assert!(err.to_string().contains("HANGING"));
        assert!(started.elapsed() >= Duration::from_secs(5));
        assert!(started.elapsed() < Duration::from_secs(6));
    }
}
