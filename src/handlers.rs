//! API handlers for the flight oracle server

use std::sync::Arc;

use axum::{extract::State, Json};

use crate::models::{ApiMessage, FlightRecord};
use crate::services::FlightProjection;

pub async fn root() -> &'static str {
    "Flight Oracle Server"
}

pub async fn health_check() -> &'static str {
    "OK"
}

pub async fn api_info() -> Json<ApiMessage> {
    Json(ApiMessage {
        message: "An API for use with your Dapp!".to_string(),
    })
}

/// Every projected flight, ordered by ledger ordinal.
pub async fn list_flights(State(projection): State<Arc<FlightProjection>>) -> Json<Vec<FlightRecord>> {
    Json(projection.list_flights())
}
