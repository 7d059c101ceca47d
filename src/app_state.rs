//! Application state shared across handlers

use std::sync::Arc;

use axum::extract::FromRef;

use crate::services::FlightProjection;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub projection: Arc<FlightProjection>,
}

impl AppState {
    pub fn new(projection: Arc<FlightProjection>) -> Self {
        Self { projection }
    }
}

impl FromRef<AppState> for Arc<FlightProjection> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.projection.clone()
    }
}
