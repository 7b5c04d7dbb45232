//! Engine configuration.
//!
//! Plain structs with working defaults. The embedding binary fills them from
//! its own configuration source and the engine calls [`EngineConfig::validate`]
//! at construction.

use std::time::Duration;

use crate::credential::CredentialMonitorConfig;
use crate::errors::{RefreshError, Result};
use crate::policy::{BackoffPolicy, RateLimitConfig};
use crate::provider::market::MarketScriptConfig;
use crate::provider::node_stats::NodeConnection;
use crate::provider::ranking::{DEFAULT_MAX_PAGES, DEFAULT_PAGE_SIZE};

const DEFAULT_RANKING_INTERVAL: Duration = Duration::from_secs(60 * 60);
const DEFAULT_MARKET_INTERVAL: Duration = Duration::from_secs(10 * 60);
const DEFAULT_MARKET_CACHE_TTL: Duration = Duration::from_secs(5 * 60);
const DEFAULT_NODE_STATS_INTERVAL: Duration = Duration::from_secs(60);

/// Upper bound for any timer period. Larger values overflow the runtime clock.
pub const MAX_INTERVAL: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// Timer settings for one fetch task.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TaskSchedule {
    /// Time between steady-state ticks.
    pub interval: Duration,
    /// Upper bound on one invocation including retries. Defaults to `interval`.
    pub deadline: Option<Duration>,
}

impl TaskSchedule {
    pub fn every(interval: Duration) -> Self {
        Self {
            interval,
            deadline: None,
        }
    }

    pub fn deadline(&self) -> Duration {
        self.deadline.unwrap_or(self.interval)
    }

    fn validate(&self, task: &str) -> Result<()> {
        check_period(self.interval, &format!("{} interval", task))?;
        check_period(self.deadline(), &format!("{} deadline", task))
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct RankingConfig {
    /// GraphQL endpoint URL.
    pub endpoint: String,
    /// Initial bearer token (JWT). Only read by [`Providers::live`] to seed the
    /// credential store; the engine checks the store, not this field.
    ///
    /// [`Providers::live`]: crate::scheduler::Providers::live
    pub api_token: String,
    pub page_size: u32,
    /// Safety cap on pages per fetch.
    pub max_pages: usize,
    pub rate_limit: RateLimitConfig,
    pub schedule: TaskSchedule,
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            api_token: String::new(),
            page_size: DEFAULT_PAGE_SIZE,
            max_pages: DEFAULT_MAX_PAGES,
            rate_limit: RateLimitConfig::default(),
            schedule: TaskSchedule::every(DEFAULT_RANKING_INTERVAL),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct MarketConfig {
    pub script: MarketScriptConfig,
    /// How long a successful script result may be republished without rerunning it.
    pub cache_ttl: Duration,
    pub schedule: TaskSchedule,
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            script: MarketScriptConfig::default(),
            cache_ttl: DEFAULT_MARKET_CACHE_TTL,
            schedule: TaskSchedule::every(DEFAULT_MARKET_INTERVAL),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct NodeStatsConfig {
    pub connection: NodeConnection,
    pub schedule: TaskSchedule,
}

impl Default for NodeStatsConfig {
    fn default() -> Self {
        Self {
            connection: NodeConnection::default(),
            schedule: TaskSchedule::every(DEFAULT_NODE_STATS_INTERVAL),
        }
    }
}

/// Complete engine configuration.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct EngineConfig {
    pub ranking: RankingConfig,
    pub market: MarketConfig,
    pub node_stats: NodeStatsConfig,
    /// Shared by all three tasks.
    pub backoff: BackoffPolicy,
    pub credential: CredentialMonitorConfig,
}

impl EngineConfig {
    /// Check the configuration before any task is built.
    ///
    /// Every problem is reported as [`RefreshError::ConfigInvalid`]. The
    /// ranking token is checked by [`RefreshEngine::new`] against the
    /// credential store it actually runs on.
    ///
    /// [`RefreshEngine::new`]: crate::scheduler::RefreshEngine::new
    pub fn validate(&self) -> Result<()> {
        if self.ranking.page_size == 0 {
            return Err(RefreshError::ConfigInvalid(
                "ranking page size must be positive".to_string(),
            ));
        }
        if self.ranking.max_pages == 0 {
            return Err(RefreshError::ConfigInvalid(
                "ranking max pages must be positive".to_string(),
            ));
        }
        self.ranking.rate_limit.validate()?;
        self.ranking.schedule.validate("ranking")?;
        self.market.schedule.validate("market data")?;
        self.node_stats.schedule.validate("node stats")?;

        check_period(self.credential.check_interval, "credential check interval")?;
        if self.credential.threshold_days < 0 {
            return Err(RefreshError::ConfigInvalid(
                "credential threshold must not be negative".to_string(),
            ));
        }
        Ok(())
    }
}

fn check_period(period: Duration, what: &str) -> Result<()> {
    if period.is_zero() {
        return Err(RefreshError::ConfigInvalid(format!(
            "{} must be positive",
            what
        )));
    }
    if period > MAX_INTERVAL {
        return Err(RefreshError::ConfigInvalid(format!(
            "{} must not exceed {} days",
            what,
            MAX_INTERVAL.as_secs() / 86_400
        )));
    }
    Ok(())
}
