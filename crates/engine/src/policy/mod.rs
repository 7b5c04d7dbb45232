//! Admission and retry policy.
//!
//! - [`RateLimiter`]: token bucket gating outbound calls to one provider
//! - [`BackoffPolicy`]: exponential backoff with jitter between attempts

mod backoff;
mod rate_limiter;

pub use backoff::{Backoff, BackoffPolicy};
pub use rate_limiter::{RateLimitConfig, RateLimiter};
