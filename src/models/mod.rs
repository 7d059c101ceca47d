//! Data models for the flight oracle server

pub mod de;
pub mod events;
pub mod flight;
pub mod oracle;

pub use events::{Contract, EventKind, EventPayload, PayloadError};
pub use flight::{FlightAttributes, FlightRecord};
pub use oracle::{AccountId, IndexGroup, OracleIdentity, RecordedStatus, StatusCode, StatusRequest};

use serde::Serialize;

/// Message body of the `/api` banner route.
#[derive(Debug, Serialize)]
pub struct ApiMessage {
    pub message: String,
}
