use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::de::{decimal_string, number_or_string};
use crate::models::oracle::{AccountId, RecordedStatus};

/// Flight fields as stored by the data contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlightAttributes {
    pub flight_no: String,
    pub from: String,
    pub to: String,
    #[serde(deserialize_with = "number_or_string")]
    pub take_off: u64,
    #[serde(deserialize_with = "number_or_string")]
    pub landing: u64,
    /// Ticket price in wei.
    #[serde(deserialize_with = "decimal_string")]
    pub price: String,
    pub status_code: RecordedStatus,
    #[serde(default)]
    pub airline: Option<AccountId>,
    #[serde(default)]
    pub is_registered: bool,
    /// Named fields this server does not interpret, passed through as-is.
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl FlightAttributes {
    /// Decode a `flights(key)` result, dropping the positional copies of each field.
    pub fn from_ledger(raw: Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(strip_positional(raw))
    }
}

/// One row of the flight projection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlightRecord {
    #[serde(rename = "index")]
    pub ordinal: u64,
    pub key: String,
    #[serde(rename = "flight")]
    pub attributes: FlightAttributes,
}

/// Struct returns come back with every field twice, once by position and once
/// by name. Only the named copies mean anything outside the ledger.
pub fn strip_positional(raw: Value) -> Value {
    match raw {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .filter(|(key, _)| !is_positional(key))
                .collect(),
        ),
        other => other,
    }
}

fn is_positional(key: &str) -> bool {
    key == "__length__" || (!key.is_empty() && key.bytes().all(|b| b.is_ascii_digit()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::StatusCode;
    use serde_json::json;

    fn ledger_flight() -> Value {
        json!({
            "0": true, "1": "0", "2": "1700000000000", "3": "1700003600000",
            "4": "0x1111111111111111111111111111111111111111", "5": "AB123",
            "6": "1000000000000000000", "7": "LIS", "8": "MAD",
            "__length__": 9,
            "isRegistered": true,
            "statusCode": "0",
            "takeOff": "1700000000000",
            "landing": "1700003600000",
            "airline": "0x1111111111111111111111111111111111111111",
            "flightNo": "AB123",
            "price": "1000000000000000000",
            "from": "LIS",
            "to": "MAD"
        })
    }

    #[test]
    fn strips_positional_fields() {
        let stripped = strip_positional(ledger_flight());
        let keys: Vec<&String> = stripped.as_object().unwrap().keys().collect();
        assert!(keys.iter().all(|k| !is_positional(k)));
        assert_eq!(keys.len(), 9);
    }

    #[test]
    fn decodes_ledger_flight() {
        let attributes = FlightAttributes::from_ledger(ledger_flight()).unwrap();
        assert_eq!(attributes.flight_no, "AB123");
        assert_eq!(attributes.status_code, StatusCode::Unknown);
        assert_eq!(attributes.landing, 1_700_003_600_000);
        assert_eq!(attributes.price, "1000000000000000000");
        assert!(attributes.is_registered);
        assert!(attributes.extra.is_empty());
    }

    #[test]
    fn serializes_in_presentation_shape() {
        let record = FlightRecord {
            ordinal: 4,
            key: "0xabc".to_string(),
            attributes: FlightAttributes::from_ledger(ledger_flight()).unwrap(),
        };
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["index"], 4);
        assert_eq!(value["flight"]["flightNo"], "AB123");
        assert_eq!(value["flight"]["statusCode"], 0);
        assert!(value["flight"].get("0").is_none());
    }
}
