use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Market data emitted by the external script.
///
/// `price` and `timestamp` are required; any other field the script adds is
/// carried through untouched. The price is validated as a decimal but
/// republished exactly as the script emitted it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MarketQuote {
    /// Spot price
    pub price: Decimal,

    /// Provider timestamp (string or epoch number, as emitted)
    pub timestamp: Value,

    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,

    #[serde(skip)]
    price_value: Value,
}

impl MarketQuote {
    /// Parse and validate the script's stdout.
    ///
    /// Exactly one JSON object is expected; surrounding whitespace is ignored.
    pub fn parse(stdout: &str) -> Result<Self, String> {
        let trimmed = stdout.trim();
        if trimmed.is_empty() {
            return Err("script produced no output".to_string());
        }

        let value: Value =
            serde_json::from_str(trimmed).map_err(|e| format!("invalid JSON: {}", e))?;
        let price_value = match &value {
            Value::Object(map) if map.is_empty() => {
                return Err("script produced an empty object".to_string())
            }
            Value::Object(map) => map.get("price").cloned().unwrap_or(Value::Null),
            other => return Err(format!("expected a JSON object, got {}", kind(other))),
        };

        let mut quote: MarketQuote =
            serde_json::from_value(value).map_err(|e| format!("invalid quote: {}", e))?;
        quote.price_value = price_value;
        if quote.timestamp.is_null() {
            return Err("timestamp is null".to_string());
        }
        Ok(quote)
    }

    /// Flatten into the snapshot's string-keyed representation.
    pub fn into_map(self) -> BTreeMap<String, Value> {
        let mut map = self.extra;
        map.insert("price".to_string(), self.price_value);
        map.insert("timestamp".to_string(), self.timestamp);
        map
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
