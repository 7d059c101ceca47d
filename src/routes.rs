//! Route definitions for the flight oracle server

use axum::{
    http::{header, HeaderValue, Method},
    routing::get,
    Router,
};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::app_state::AppState;
use crate::handlers::{api_info, health_check, list_flights, root};

pub fn flight_routes() -> Router<AppState> {
    Router::new()
        .route("/api", get(api_info))
        .route("/flights", get(list_flights))
}

pub fn app_router(state: AppState, allowed_origins: &[String]) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
        .merge(flight_routes())
        .layer(build_cors_layer(allowed_origins))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn build_cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let allow_origin = if allowed_origins.iter().any(|origin| origin == "*") {
        AllowOrigin::any()
    } else {
        AllowOrigin::list(
            allowed_origins
                .iter()
                .filter_map(|origin| origin.parse::<HeaderValue>().ok()),
        )
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers([
            header::ORIGIN,
            header::CONTENT_TYPE,
            header::ACCEPT,
            header::HeaderName::from_static("x-requested-with"),
        ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::mock::MockLedger;
    use crate::services::FlightProjection;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use std::sync::Arc;
    use tower::ServiceExt;

    async fn router_with_flights(flights: &[&str]) -> Router {
        let ledger = Arc::new(MockLedger::with_accounts(0));
        for flight in flights {
            ledger.add_flight(flight);
        }
        let projection = Arc::new(FlightProjection::new(ledger));
        projection.resync().await;
        app_router(AppState::new(projection), &["*".to_string()])
    }

    async fn get_json(router: Router, uri: &str) -> serde_json::Value {
        let response = router
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn flights_are_served_in_ordinal_order() {
        let router = router_with_flights(&["AB1", "AB2"]).await;

        let body = get_json(router, "/flights").await;

        let flights = body.as_array().unwrap();
        assert_eq!(flights.len(), 2);
        assert_eq!(flights[0]["index"], 0);
        assert_eq!(flights[1]["index"], 1);
        assert_eq!(flights[1]["flight"]["flightNo"], "AB2");
        assert!(flights[0]["flight"].get("0").is_none());
    }

    #[tokio::test]
    async fn empty_projection_is_an_empty_array() {
        let router = router_with_flights(&[]).await;
        assert_eq!(get_json(router, "/flights").await, serde_json::json!([]));
    }

    #[tokio::test]
    async fn api_banner() {
        let router = router_with_flights(&[]).await;
        let body = get_json(router, "/api").await;
        assert_eq!(body["message"], "An API for use with your Dapp!");
    }

    #[tokio::test]
    async fn cors_allows_any_origin_by_default() {
        let router = router_with_flights(&[]).await;
        let response = router
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .header(header::ORIGIN, "http://localhost:8000")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(
            response.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
            "*"
        );
    }
}
