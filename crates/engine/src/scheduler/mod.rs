//! Task scheduling.
//!
//! - [`FetchTask`]: one provider's fetcher, schedule and backoff policy
//! - [`run_with_retry`]: one bounded, retried invocation of a task
//! - [`RefreshEngine`]: warm-up, per-task timers and shutdown

mod engine;
mod retry;
mod task;

pub use engine::{Providers, RefreshEngine};
pub use retry::run_with_retry;
pub use task::FetchTask;
