//! Deserialization helpers for ledger values.
//!
//! The gateway encodes unsigned integers either as JSON numbers or as decimal
//! strings (large values never fit a JSON number), so numeric fields accept both.

use serde::{Deserialize, Deserializer};

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum NumberOrString {
    Number(u64),
    Text(String),
}

impl NumberOrString {
    pub fn as_u64(&self) -> Result<u64, String> {
        match self {
            NumberOrString::Number(n) => Ok(*n),
            NumberOrString::Text(s) => s
                .trim()
                .parse::<u64>()
                .map_err(|e| format!("invalid unsigned integer {s:?}: {e}")),
        }
    }

    fn into_decimal(self) -> Result<String, String> {
        match self {
            NumberOrString::Number(n) => Ok(n.to_string()),
            NumberOrString::Text(s) => {
                let s = s.trim().to_string();
                if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
                    return Err(format!("invalid decimal amount {s:?}"));
                }
                Ok(s)
            }
        }
    }
}

pub fn number_or_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
    NumberOrString::deserialize(deserializer)?
        .as_u64()
        .map_err(serde::de::Error::custom)
}

/// Arbitrary-width unsigned amount (wei), kept as its decimal string.
pub fn decimal_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    NumberOrString::deserialize(deserializer)?
        .into_decimal()
        .map_err(serde::de::Error::custom)
}
