use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::models::de::{number_or_string, NumberOrString};

/// Ledger account handle, `0x`-prefixed 20-byte hex, kept lowercase.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AccountId(String);

impl AccountId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for AccountId {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let trimmed = raw.trim();
        let digits = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .ok_or_else(|| format!("account {trimmed} is missing 0x prefix"))?;

        let bytes = hex::decode(digits).map_err(|e| format!("invalid account hex {trimmed}: {e}"))?;
        if bytes.len() != 20 {
            return Err(format!("account {trimmed} must be 20 bytes, got {}", bytes.len()));
        }

        Ok(Self(format!("0x{}", hex::encode(bytes))))
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Serialize for AccountId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for AccountId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// The three indexes the ledger assigns to an oracle at registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct IndexGroup([u8; 3]);

impl IndexGroup {
    pub fn new(indexes: [u8; 3]) -> Self {
        Self(indexes)
    }

    pub fn indexes(&self) -> [u8; 3] {
        self.0
    }
}

impl<'de> Deserialize<'de> for IndexGroup {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Vec::<NumberOrString>::deserialize(deserializer)?;
        if raw.len() != 3 {
            return Err(serde::de::Error::custom(format!(
                "index group must hold 3 indexes, got {}",
                raw.len()
            )));
        }

        let mut indexes = [0u8; 3];
        for (slot, value) in indexes.iter_mut().zip(raw) {
            let index = value.as_u64().map_err(serde::de::Error::custom)?;
            *slot = u8::try_from(index)
                .map_err(|_| serde::de::Error::custom(format!("index {index} out of range")))?;
        }

        Ok(Self(indexes))
    }
}

impl fmt::Display for IndexGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c] = self.0;
        write!(f, "{a} {b} {c}")
    }
}

/// An account taking part in status attestation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OracleIdentity {
    pub handle: AccountId,
    pub index_group: Option<IndexGroup>,
    pub registered: bool,
}

impl OracleIdentity {
    pub fn new(handle: AccountId) -> Self {
        Self {
            handle,
            index_group: None,
            registered: false,
        }
    }
}

/// Flight status codes understood by the app contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusCode {
    Unknown,
    OnTime,
    LateAirline,
    LateWeather,
    LateTechnical,
    LateOther,
}

impl StatusCode {
    /// Codes an oracle can actually report.
    pub const REPORTABLE: [StatusCode; 5] = [
        StatusCode::OnTime,
        StatusCode::LateAirline,
        StatusCode::LateWeather,
        StatusCode::LateTechnical,
        StatusCode::LateOther,
    ];

    pub fn code(self) -> u8 {
        match self {
            StatusCode::Unknown => 0,
            StatusCode::OnTime => 10,
            StatusCode::LateAirline => 20,
            StatusCode::LateWeather => 30,
            StatusCode::LateTechnical => 40,
            StatusCode::LateOther => 50,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            StatusCode::Unknown => "unknown",
            StatusCode::OnTime => "on time",
            StatusCode::LateAirline => "late due to airline",
            StatusCode::LateWeather => "late due to weather",
            StatusCode::LateTechnical => "late due to technical reason",
            StatusCode::LateOther => "late due to other reason",
        }
    }
}

impl TryFrom<u64> for StatusCode {
    type Error = String;

    fn try_from(code: u64) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(StatusCode::Unknown),
            10 => Ok(StatusCode::OnTime),
            20 => Ok(StatusCode::LateAirline),
            30 => Ok(StatusCode::LateWeather),
            40 => Ok(StatusCode::LateTechnical),
            50 => Ok(StatusCode::LateOther),
            other => Err(format!("unknown status code {other}")),
        }
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl Serialize for StatusCode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.code())
    }
}

impl<'de> Deserialize<'de> for StatusCode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let code = number_or_string(deserializer)?;
        StatusCode::try_from(code).map_err(serde::de::Error::custom)
    }
}

/// Status byte stored on a ledger flight. The contract accepts any `uint8`
/// from an oracle, so codes outside [`StatusCode`] are kept verbatim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct RecordedStatus(pub u8);

impl RecordedStatus {
    pub fn known(self) -> Option<StatusCode> {
        StatusCode::try_from(u64::from(self.0)).ok()
    }
}

impl From<StatusCode> for RecordedStatus {
    fn from(status: StatusCode) -> Self {
        RecordedStatus(status.code())
    }
}

impl PartialEq<StatusCode> for RecordedStatus {
    fn eq(&self, other: &StatusCode) -> bool {
        self.0 == other.code()
    }
}

impl fmt::Display for RecordedStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.known() {
            Some(status) => f.write_str(status.label()),
            None => write!(f, "unrecognised status {}", self.0),
        }
    }
}

impl<'de> Deserialize<'de> for RecordedStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let code = number_or_string(deserializer)?;
        u8::try_from(code)
            .map(RecordedStatus)
            .map_err(|_| serde::de::Error::custom(format!("status {code} exceeds uint8")))
    }
}

/// A status request observed on the ledger. Never stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusRequest {
    pub index: u8,
    pub flight: String,
    pub destination: String,
    pub timestamp: u64,
}
