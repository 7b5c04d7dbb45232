//! Data providers.
//!
//! Each provider implements [`Fetcher`] and owns a fixed set of snapshot
//! fields:
//!
//! - [`ranking`]: paginated GraphQL node ranking (`nodes`, `last_updated`)
//! - [`market`]: external price script behind a TTL cache (`market_data`)
//! - [`node_stats`]: concurrent node CLI queries (`local_stats`)

pub mod command;
pub mod market;
pub mod node_stats;
pub mod ranking;
mod traits;

pub use command::{CmdOutput, CommandRunner, CommandSpec, TokioCommandRunner};
pub use traits::{FetchOutcome, Fetcher};
