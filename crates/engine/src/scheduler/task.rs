//! Fetch task definition.

use std::sync::Arc;
use std::time::Duration;

use crate::config::TaskSchedule;
use crate::policy::BackoffPolicy;
use crate::provider::Fetcher;

/// One periodically refreshed provider. Immutable after construction.
#[derive(Clone)]
pub struct FetchTask {
    fetcher: Arc<dyn Fetcher>,
    schedule: TaskSchedule,
    policy: Arc<BackoffPolicy>,
}

impl FetchTask {
    pub fn new(fetcher: Arc<dyn Fetcher>, schedule: TaskSchedule, policy: Arc<BackoffPolicy>) -> Self {
        Self {
            fetcher,
            schedule,
            policy,
        }
    }

    /// Task name, taken from the fetcher.
    pub fn name(&self) -> &'static str {
        self.fetcher.name()
    }

    pub fn interval(&self) -> Duration {
        self.schedule.interval
    }

    pub fn deadline(&self) -> Duration {
        self.schedule.deadline()
    }

    pub fn fetcher(&self) -> &dyn Fetcher {
        self.fetcher.as_ref()
    }

    pub fn policy(&self) -> &BackoffPolicy {
        &self.policy
    }
}

impl std::fmt::Debug for FetchTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FetchTask")
            .field("name", &self.name())
            .field("schedule", &self.schedule)
            .field("policy", &self.policy)
            .finish()
    }
}
