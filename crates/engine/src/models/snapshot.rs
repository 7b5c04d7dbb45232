use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::node::Node;

/// The single published view of all fetched data.
///
/// Each group of fields is owned by exactly one fetcher and only ever
/// replaced wholesale by that fetcher:
///
/// | Fields | Owner |
/// |--------|-------|
/// | `nodes`, `last_updated` | ranking |
/// | `market_data`, `market_data_updated` | market data |
/// | `local_stats`, `local_stats_updated` | node stats |
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    /// Ranked nodes in provider order
    pub nodes: Vec<Node>,

    /// When `nodes` was last replaced
    pub last_updated: Option<DateTime<Utc>>,

    /// Latest market quote fields
    pub market_data: BTreeMap<String, Value>,

    /// When `market_data` was last replaced
    #[serde(skip_serializing_if = "Option::is_none")]
    pub market_data_updated: Option<DateTime<Utc>>,

    /// Local node status, keyed by query name
    pub local_stats: BTreeMap<String, Value>,

    /// When `local_stats` was last replaced
    #[serde(skip_serializing_if = "Option::is_none")]
    pub local_stats_updated: Option<DateTime<Utc>>,
}

/// The subset of snapshot fields owned by one fetcher.
#[derive(Clone, Debug, PartialEq)]
pub enum Fragment {
    Ranking {
        nodes: Vec<Node>,
        fetched_at: DateTime<Utc>,
    },
    Market {
        data: BTreeMap<String, Value>,
        fetched_at: DateTime<Utc>,
    },
    NodeStats {
        stats: BTreeMap<String, Value>,
        fetched_at: DateTime<Utc>,
    },
}

impl Snapshot {
    /// Replace the fields owned by the fragment's fetcher.
    pub fn apply(&mut self, fragment: Fragment) {
        match fragment {
            Fragment::Ranking { nodes, fetched_at } => {
                self.nodes = nodes;
                self.last_updated = Some(fetched_at);
            }
            Fragment::Market { data, fetched_at } => {
                self.market_data = data;
                self.market_data_updated = Some(fetched_at);
            }
            Fragment::NodeStats { stats, fetched_at } => {
                self.local_stats = stats;
                self.local_stats_updated = Some(fetched_at);
            }
        }
    }
}
