//! Nodewatch Refresh Engine
//!
//! This crate keeps one in-memory snapshot of Lightning network data fresh by
//! periodically pulling from three independent providers.
//!
//! # Overview
//!
//! The engine supports:
//! - A paginated GraphQL node ranking API, rate limited with a token bucket
//! - An external market-data script, fronted by a TTL cache
//! - A node CLI queried with several concurrent sub-commands
//! - Retry with exponential backoff and jitter, bounded by a per-task deadline
//! - A debounced warning before the ranking credential expires
//!
//! # Architecture
//!
//! ```text
//! +------------------+
//! |  RefreshEngine   |  (warm-up, one timer per task, shutdown)
//! +------------------+
//!          |
//!          v
//! +------------------+
//! |  Retry Driver    |  (backoff policy, deadline, cancellation)
//! +------------------+
//!          |
//!          v
//! +------------------+     +------------------+
//! |     Fetcher      | --> |  Rate Limiter /  |
//! | ranking, market, |     |    TTL Cache     |
//! |    node stats    |     +------------------+
//! +------------------+
//!          |
//!          v
//! +------------------+
//! |  Snapshot Store  |  (one mutex, whole-field replacement)
//! +------------------+
//! ```
//!
//! # Core Types
//!
//! - [`RefreshEngine`] - Lifecycle entry point
//! - [`EngineConfig`] - Intervals, limits and policies
//! - [`Snapshot`] - What readers receive
//! - [`RefreshError`] - Closed error set with retry classification

pub mod cache;
pub mod config;
pub mod credential;
pub mod errors;
pub mod models;
pub mod policy;
pub mod provider;
pub mod scheduler;
pub mod store;

pub use config::{EngineConfig, MarketConfig, NodeStatsConfig, RankingConfig, TaskSchedule};
pub use credential::{CredentialCheck, CredentialMonitorConfig, CredentialStore};
pub use errors::{RefreshError, Result, RetryClass};
pub use models::{Fragment, MarketQuote, Node, Snapshot};
pub use policy::{Backoff, BackoffPolicy, RateLimitConfig, RateLimiter};
pub use provider::market::MarketScriptConfig;
pub use provider::node_stats::NodeConnection;
pub use provider::{FetchOutcome, Fetcher};
pub use scheduler::{FetchTask, Providers, RefreshEngine};
