use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};

/// A ranked Lightning node as published in the snapshot.
///
/// Records arrive from the ranking provider with most derived fields
/// optional; [`Node::normalize`] fills them before publication.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    /// Node identity key (hex-encoded public key)
    pub pub_key: String,

    /// Display name
    #[serde(default, deserialize_with = "null_as_default")]
    pub alias: String,

    /// Total channel capacity in satoshis
    #[serde(default, deserialize_with = "null_as_default")]
    pub capacity: u64,

    /// Number of open channels
    #[serde(default, deserialize_with = "null_as_default")]
    pub channels: u32,

    /// Current rank (1 = best)
    #[serde(default, deserialize_with = "null_as_default")]
    pub rank: u32,

    /// Rank delta per period ("day", "week", "month")
    #[serde(default, deserialize_with = "null_as_default")]
    pub rank_change: BTreeMap<String, i64>,

    /// Fraction of time the node was reachable, in [0, 1]
    #[serde(default)]
    pub uptime_percentage: Option<f64>,

    /// Fraction of routing attempts that succeeded, in [0, 1]
    #[serde(default)]
    pub success_rate: Option<f64>,

    /// Mean outbound fee rate in ppm
    #[serde(default)]
    pub avg_routing_fee: Option<f64>,

    /// Per-channel outbound fee rates in ppm
    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub fee_rates: Vec<f64>,
}

impl Node {
    /// Fill derived fields the provider did not supply.
    ///
    /// - `avg_routing_fee`: mean of `fee_rates`, 0 when there are none
    /// - `uptime_percentage`, `success_rate`: 0 when absent, clamped to [0, 1]
    pub fn normalize(mut self) -> Self {
        if self.avg_routing_fee.is_none() {
            self.avg_routing_fee = Some(mean(&self.fee_rates));
        }
        self.uptime_percentage = Some(clamp_fraction(self.uptime_percentage));
        self.success_rate = Some(clamp_fraction(self.success_rate));
        self
    }
}

/// Upstream sends `null` for fields it has no data for.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn mean(values: &[f64]) -> f64 {
    let finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if finite.is_empty() {
        return 0.0;
    }
    finite.iter().sum::<f64>() / finite.len() as f64
}

fn clamp_fraction(value: Option<f64>) -> f64 {
    match value {
        Some(v) if v.is_finite() => v.clamp(0.0, 1.0),
        _ => 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bare(pub_key: &str) -> Node {
        Node {
            pub_key: pub_key.to_string(),
            alias: String::new(),
            capacity: 0,
            channels: 0,
            rank: 0,
            rank_change: BTreeMap::new(),
            uptime_percentage: None,
            success_rate: None,
            avg_routing_fee: None,
            fee_rates: Vec::new(),
        }
    }

    #[test]
    fn test_normalize_fills_defaults() {
        let node = bare("02aa").normalize();
        assert_eq!(node.avg_routing_fee, Some(0.0));
        assert_eq!(node.uptime_percentage, Some(0.0));
        assert_eq!(node.success_rate, Some(0.0));
    }

    #[test]
    fn test_normalize_derives_average_fee() {
        let mut node = bare("02aa");
        node.fee_rates = vec![100.0, 200.0, 600.0];
        let node = node.normalize();
        assert_eq!(node.avg_routing_fee, Some(300.0));
    }

    #[test]
    fn test_normalize_keeps_upstream_values() {
        let mut node = bare("02aa");
        node.fee_rates = vec![100.0];
        node.avg_routing_fee = Some(42.0);
        node.uptime_percentage = Some(0.97);
        node.success_rate = Some(1.4);
        let node = node.normalize();
        assert_eq!(node.avg_routing_fee, Some(42.0));
        assert_eq!(node.uptime_percentage, Some(0.97));
        assert_eq!(node.success_rate, Some(1.0));
    }

    #[test]
    fn test_deserialize_camel_case() {
        let node: Node = serde_json::from_str(
            r#"{"pubKey":"03bb","alias":"ACINQ","capacity":1000,"channels":3,"rank":1,
                "rankChange":{"day":-2},"feeRates":[10.0,30.0]}"#,
        )
        .unwrap();
        assert_eq!(node.pub_key, "03bb");
        assert_eq!(node.rank_change.get("day"), Some(&-2));
        assert_eq!(node.normalize().avg_routing_fee, Some(20.0));
    }

    #[test]
    fn test_deserialize_tolerates_nulls() {
        let node: Node = serde_json::from_str(
            r#"{"pubKey":"03bb","alias":null,"rankChange":null,"feeRates":null,"successRate":null}"#,
        )
        .unwrap();
        assert_eq!(node.alias, "");
        assert!(node.rank_change.is_empty());
        assert!(node.fee_rates.is_empty());
        assert_eq!(node.success_rate, None);
    }
}
