//! Token bucket rate limiter for outbound provider calls.
//!
//! One limiter is shared by every request to a rate-limited provider. The
//! bucket starts full, refills continuously, and waiters observe the
//! engine's cancellation token.

use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use log::{debug, warn};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::errors::RefreshError;

/// Default refill rate: one request per second.
const DEFAULT_TOKENS_PER_SECOND: f64 = 1.0;

/// Default bucket capacity (allows bursting).
const DEFAULT_BUCKET_CAPACITY: f64 = 5.0;

/// Token bucket state.
#[derive(Debug)]
struct TokenBucket {
    /// Current number of available tokens.
    tokens: f64,
    /// Last time the bucket was updated.
    last_update: Instant,
    /// Token refill rate (tokens per second).
    rate: f64,
    /// Maximum bucket capacity.
    capacity: f64,
}

impl TokenBucket {
    fn with_config(config: &RateLimitConfig) -> Self {
        Self {
            tokens: config.burst_capacity,
            last_update: Instant::now(),
            rate: config.tokens_per_second,
            capacity: config.burst_capacity,
        }
    }

    /// Refill tokens based on elapsed time.
    fn refill(&mut self) {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_update).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.rate).min(self.capacity);
        self.last_update = now;
    }

    fn try_acquire(&mut self) -> bool {
        self.refill();

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    /// Calculate the wait time until a token becomes available.
    fn time_until_available(&mut self) -> Duration {
        self.refill();

        if self.tokens >= 1.0 {
            Duration::ZERO
        } else {
            let tokens_needed = 1.0 - self.tokens;
            Duration::from_secs_f64(tokens_needed / self.rate)
        }
    }
}

/// Rate limiter configuration.
#[derive(Clone, Debug, PartialEq)]
pub struct RateLimitConfig {
    /// Refill rate in tokens per second.
    pub tokens_per_second: f64,
    /// Maximum burst capacity.
    pub burst_capacity: f64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            tokens_per_second: DEFAULT_TOKENS_PER_SECOND,
            burst_capacity: DEFAULT_BUCKET_CAPACITY,
        }
    }
}

impl RateLimitConfig {
    pub fn validate(&self) -> Result<(), RefreshError> {
        if !(self.tokens_per_second.is_finite() && self.tokens_per_second > 0.0) {
            return Err(RefreshError::ConfigInvalid(format!(
                "rate limit must be positive, got {}",
                self.tokens_per_second
            )));
        }
        if !(self.burst_capacity.is_finite() && self.burst_capacity >= 1.0) {
            return Err(RefreshError::ConfigInvalid(format!(
                "burst capacity must be at least 1, got {}",
                self.burst_capacity
            )));
        }
        Ok(())
    }
}

/// Thread-safe token bucket limiter for one provider.
pub struct RateLimiter {
    provider: String,
    bucket: Mutex<TokenBucket>,
}

impl RateLimiter {
    pub fn new(provider: impl Into<String>, config: &RateLimitConfig) -> Self {
        Self {
            provider: provider.into(),
            bucket: Mutex::new(TokenBucket::with_config(config)),
        }
    }

    /// Lock the bucket, recovering from poison if necessary.
    ///
    /// The worst case after recovery is a slightly wrong token count.
    fn lock_bucket(&self) -> MutexGuard<'_, TokenBucket> {
        self.bucket.lock().unwrap_or_else(|poisoned| {
            warn!(
                "Rate limiter mutex for '{}' was poisoned, recovering",
                self.provider
            );
            poisoned.into_inner()
        })
    }

    /// Acquire a token, waiting until one is available.
    ///
    /// Returns [`RefreshError::Canceled`] if `cancel` fires first.
    pub async fn acquire(&self, cancel: &CancellationToken) -> Result<(), RefreshError> {
        loop {
            if cancel.is_cancelled() {
                return Err(self.canceled());
            }

            let wait_time = {
                let mut bucket = self.lock_bucket();
                if bucket.try_acquire() {
                    debug!("Rate limiter: acquired token for '{}'", self.provider);
                    return Ok(());
                }
                bucket.time_until_available()
            };

            debug!(
                "Rate limiter: waiting {:?} for provider '{}'",
                wait_time, self.provider
            );
            tokio::select! {
                _ = cancel.cancelled() => return Err(self.canceled()),
                _ = tokio::time::sleep(wait_time) => {}
            }
        }
    }

    /// Try to acquire a token without waiting.
    pub fn try_acquire(&self) -> bool {
        self.lock_bucket().try_acquire()
    }

    /// Tokens currently available.
    pub fn remaining_tokens(&self) -> f64 {
        let mut bucket = self.lock_bucket();
        bucket.refill();
        bucket.tokens
    }

    /// Refill the bucket to capacity.
    pub fn reset(&self) {
        let mut bucket = self.lock_bucket();
        bucket.tokens = bucket.capacity;
        bucket.last_update = Instant::now();
    }

    fn canceled(&self) -> RefreshError {
        RefreshError::Canceled(format!("rate limiter wait for '{}'", self.provider))
    }
}
