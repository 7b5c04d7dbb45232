//! Data models for the refresh engine.
//!
//! - [`Snapshot`] - the published view readers receive
//! - [`Fragment`] - the fields one fetcher owns and replaces
//! - [`Node`] - normalized ranking record
//! - [`MarketQuote`] - validated market-data script output

mod market;
mod node;
mod snapshot;

pub use market::MarketQuote;
pub use node::Node;
pub use snapshot::{Fragment, Snapshot};
