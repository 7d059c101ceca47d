//! Ledger event kinds and their payload shapes.
//!
//! Every event the server listens to has exactly one payload record here. A
//! payload that does not match its record is rejected on receipt.

use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use thiserror::Error;

use crate::models::de::{decimal_string, number_or_string};
use crate::models::oracle::{AccountId, IndexGroup, StatusCode, StatusRequest};

/// Which deployed contract emits an event or receives a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Contract {
    App,
    Data,
}

impl Contract {
    pub fn as_str(self) -> &'static str {
        match self {
            Contract::App => "app",
            Contract::Data => "data",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    OracleRegistered,
    AirlineRegistered,
    FlightRegistered,
    OracleRequest,
    OracleReport,
    FlightStatusInfo,
    FlightProcessed,
    Funded,
    WithdrawRequest,
    Paid,
    Credited,
    FlightBought,
    CreditingInsurees,
}

impl EventKind {
    pub const ALL: [EventKind; 13] = [
        EventKind::OracleRegistered,
        EventKind::AirlineRegistered,
        EventKind::FlightRegistered,
        EventKind::OracleRequest,
        EventKind::OracleReport,
        EventKind::FlightStatusInfo,
        EventKind::FlightProcessed,
        EventKind::Funded,
        EventKind::WithdrawRequest,
        EventKind::Paid,
        EventKind::Credited,
        EventKind::FlightBought,
        EventKind::CreditingInsurees,
    ];

    /// Event name as emitted by the contract.
    pub fn name(self) -> &'static str {
        match self {
            EventKind::OracleRegistered => "OracleRegistered",
            EventKind::AirlineRegistered => "AirlineRegistered",
            EventKind::FlightRegistered => "FlightRegistered",
            EventKind::OracleRequest => "OracleRequest",
            EventKind::OracleReport => "OracleReport",
            EventKind::FlightStatusInfo => "FlightStatusInfo",
            EventKind::FlightProcessed => "FlightProcessed",
            EventKind::Funded => "Funded",
            EventKind::WithdrawRequest => "WithdrawRequest",
            EventKind::Paid => "Paid",
            EventKind::Credited => "Credited",
            EventKind::FlightBought => "FlightBought",
            EventKind::CreditingInsurees => "CreditingInsurees",
        }
    }

    pub fn contract(self) -> Contract {
        match self {
            EventKind::OracleRegistered
            | EventKind::FlightRegistered
            | EventKind::OracleRequest
            | EventKind::OracleReport
            | EventKind::FlightStatusInfo
            | EventKind::FlightProcessed
            | EventKind::WithdrawRequest => Contract::App,
            EventKind::AirlineRegistered
            | EventKind::Funded
            | EventKind::Paid
            | EventKind::Credited
            | EventKind::FlightBought
            | EventKind::CreditingInsurees => Contract::Data,
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Error)]
pub enum PayloadError {
    #[error("malformed {kind} payload: {source}")]
    Malformed {
        kind: EventKind,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid {kind} payload: {reason}")]
    Invalid { kind: EventKind, reason: String },
}

fn small_index<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u8, D::Error> {
    let index = number_or_string(deserializer)?;
    u8::try_from(index).map_err(|_| serde::de::Error::custom(format!("index {index} out of range")))
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct OracleRegistered {
    pub indexes: IndexGroup,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AirlineRegistered {
    pub origin: AccountId,
    pub new_airline: AccountId,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FlightRegistered {
    pub flight: String,
    pub to: String,
    #[serde(deserialize_with = "number_or_string")]
    pub landing: u64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct OracleRequest {
    #[serde(deserialize_with = "small_index")]
    pub index: u8,
    pub flight: String,
    pub destination: String,
    #[serde(deserialize_with = "number_or_string")]
    pub timestamp: u64,
}

impl From<OracleRequest> for StatusRequest {
    fn from(event: OracleRequest) -> Self {
        StatusRequest {
            index: event.index,
            flight: event.flight,
            destination: event.destination,
            timestamp: event.timestamp,
        }
    }
}

/// Shared shape of `OracleReport` and `FlightStatusInfo`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FlightStatus {
    pub flight: String,
    pub destination: String,
    #[serde(deserialize_with = "number_or_string")]
    pub timestamp: u64,
    pub status: StatusCode,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlightProcessed {
    pub flight: String,
    pub destination: String,
    #[serde(deserialize_with = "number_or_string")]
    pub timestamp: u64,
    pub status_code: StatusCode,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Funded {
    pub airline: AccountId,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct WithdrawRequest {
    pub recipient: AccountId,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Paid {
    pub recipient: AccountId,
    #[serde(deserialize_with = "decimal_string")]
    pub amount: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Credited {
    pub passenger: AccountId,
    #[serde(deserialize_with = "decimal_string")]
    pub amount: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlightBought {
    pub passenger: AccountId,
    pub flight_no: String,
}

/// A decoded, validated event payload.
#[derive(Debug, Clone, PartialEq)]
pub enum EventPayload {
    OracleRegistered(OracleRegistered),
    AirlineRegistered(AirlineRegistered),
    FlightRegistered(FlightRegistered),
    OracleRequest(OracleRequest),
    OracleReport(FlightStatus),
    FlightStatusInfo(FlightStatus),
    FlightProcessed(FlightProcessed),
    Funded(Funded),
    WithdrawRequest(WithdrawRequest),
    Paid(Paid),
    Credited(Credited),
    FlightBought(FlightBought),
    CreditingInsurees,
}

impl EventPayload {
    pub fn decode(kind: EventKind, raw: Value) -> Result<Self, PayloadError> {
        let payload = match kind {
            EventKind::OracleRegistered => EventPayload::OracleRegistered(parse(kind, raw)?),
            EventKind::AirlineRegistered => EventPayload::AirlineRegistered(parse(kind, raw)?),
            EventKind::FlightRegistered => EventPayload::FlightRegistered(parse(kind, raw)?),
            EventKind::OracleRequest => EventPayload::OracleRequest(parse(kind, raw)?),
            EventKind::OracleReport => EventPayload::OracleReport(parse(kind, raw)?),
            EventKind::FlightStatusInfo => EventPayload::FlightStatusInfo(parse(kind, raw)?),
            EventKind::FlightProcessed => EventPayload::FlightProcessed(parse(kind, raw)?),
            EventKind::Funded => EventPayload::Funded(parse(kind, raw)?),
            EventKind::WithdrawRequest => EventPayload::WithdrawRequest(parse(kind, raw)?),
            EventKind::Paid => EventPayload::Paid(parse(kind, raw)?),
            EventKind::Credited => EventPayload::Credited(parse(kind, raw)?),
            EventKind::FlightBought => EventPayload::FlightBought(parse(kind, raw)?),
            EventKind::CreditingInsurees => EventPayload::CreditingInsurees,
        };

        payload.validate(kind)?;
        Ok(payload)
    }

    fn validate(&self, kind: EventKind) -> Result<(), PayloadError> {
        let invalid = |reason: &str| PayloadError::Invalid {
            kind,
            reason: reason.to_string(),
        };

        match self {
            EventPayload::OracleRequest(request) => {
                if request.flight.trim().is_empty() {
                    return Err(invalid("empty flight"));
                }
                if request.destination.trim().is_empty() {
                    return Err(invalid("empty destination"));
                }
            }
            EventPayload::FlightRegistered(flight) if flight.flight.trim().is_empty() => {
                return Err(invalid("empty flight"));
            }
            _ => {}
        }

        Ok(())
    }
}

fn parse<T: DeserializeOwned>(kind: EventKind, raw: Value) -> Result<T, PayloadError> {
    serde_json::from_value(raw).map_err(|source| PayloadError::Malformed { kind, source })
}
