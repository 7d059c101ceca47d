//! Event dispatcher: one subscription per ledger event kind, each drained by its
//! own task for the life of the process.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::ledger::{LedgerClient, LedgerEvent, Subscription};
use crate::models::events::EventPayload;
use crate::models::{EventKind, StatusRequest};
use crate::services::flight_projection::FlightProjection;
use crate::services::response_coordinator::ResponseCoordinator;

/// Where events of a kind are delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Coordinator,
    ProjectionAppend,
    ProjectionResync,
    Diagnostic,
}

pub fn route_for(kind: EventKind) -> Route {
    match kind {
        EventKind::OracleRequest => Route::Coordinator,
        EventKind::FlightRegistered => Route::ProjectionAppend,
        EventKind::FlightStatusInfo => Route::ProjectionResync,
        _ => Route::Diagnostic,
    }
}

/// Subscriptions opened by [`EventDispatcher::start`].
pub struct DispatcherHandle {
    pub subscribed: Vec<EventKind>,
    pub failed: Vec<EventKind>,
    tasks: Vec<JoinHandle<()>>,
}

impl DispatcherHandle {
    /// Wait until every subscription stream has ended.
    pub async fn join(self) {
        for task in self.tasks {
            if let Err(join_error) = task.await {
                if join_error.is_panic() {
                    error!("Ledger event drain task panicked");
                } else {
                    error!(error = %join_error, "Ledger event drain task failed");
                }
            }
        }
    }
}

#[derive(Clone)]
pub struct EventDispatcher {
    ledger: Arc<dyn LedgerClient>,
    coordinator: Arc<ResponseCoordinator>,
    projection: Arc<FlightProjection>,
}

impl EventDispatcher {
    pub fn new(
        ledger: Arc<dyn LedgerClient>,
        coordinator: Arc<ResponseCoordinator>,
        projection: Arc<FlightProjection>,
    ) -> Self {
        Self {
            ledger,
            coordinator,
            projection,
        }
    }

    /// Subscribe to every event kind. A kind that cannot be subscribed is logged
    /// and skipped.
    pub async fn start(&self) -> DispatcherHandle {
        let mut handle = DispatcherHandle {
            subscribed: Vec::new(),
            failed: Vec::new(),
            tasks: Vec::new(),
        };

        for kind in EventKind::ALL {
            match self.ledger.subscribe(kind).await {
                Ok(subscription) => {
                    let dispatcher = self.clone();
                    handle
                        .tasks
                        .push(tokio::spawn(async move { dispatcher.drain(subscription).await }));
                    handle.subscribed.push(kind);
                }
                Err(err) => {
                    error!(event = %kind, error = %err, "Cannot subscribe to ledger event");
                    handle.failed.push(kind);
                }
            }
        }

        info!(
            subscribed = handle.subscribed.len(),
            failed = handle.failed.len(),
            "Ledger event subscriptions open"
        );
        handle
    }

    async fn drain(&self, mut subscription: Subscription) {
        let kind = subscription.kind();
        while let Some(event) = subscription.recv().await {
            self.dispatch(event).await;
        }
        warn!(event = %kind, "Ledger event stream ended");
    }

    /// Decode one event and hand it to its handler. Malformed payloads are dropped.
    pub async fn dispatch(&self, event: LedgerEvent) {
        let kind = event.kind;
        let payload = match EventPayload::decode(kind, event.payload) {
            Ok(payload) => payload,
            Err(err) => {
                warn!(event = %kind, block = event.block, error = %err, "Dropping malformed event");
                return;
            }
        };

        match (route_for(kind), payload) {
            (Route::Coordinator, EventPayload::OracleRequest(request)) => {
                let request = StatusRequest::from(request);
                info!(
                    event = %kind,
                    index = request.index,
                    flight = %request.flight,
                    destination = %request.destination,
                    timestamp = request.timestamp,
                    "Status requested"
                );
                // Detached: the submissions outlive this handler.
                drop(self.coordinator.handle_status_request(request));
            }
            (Route::ProjectionAppend, EventPayload::FlightRegistered(flight)) => {
                info!(event = %kind, flight = %flight.flight, to = %flight.to, landing = flight.landing, "Flight registered");
                self.projection.apply_registration(&flight).await;
            }
            (Route::ProjectionResync, EventPayload::FlightStatusInfo(status)) => {
                info!(
                    event = %kind,
                    flight = %status.flight,
                    destination = %status.destination,
                    timestamp = status.timestamp,
                    status = %status.status,
                    "Flight status resolved"
                );
                self.projection.resync().await;
            }
            (_, payload) => log_diagnostic(kind, &payload),
        }
    }
}

fn log_diagnostic(kind: EventKind, payload: &EventPayload) {
    match payload {
        EventPayload::OracleRegistered(p) => info!(event = %kind, indexes = %p.indexes, "Oracle registered"),
        EventPayload::AirlineRegistered(p) => {
            info!(event = %kind, origin = %p.origin, airline = %p.new_airline, "Airline registered")
        }
        EventPayload::OracleReport(p) => info!(
            event = %kind,
            flight = %p.flight,
            destination = %p.destination,
            timestamp = p.timestamp,
            status = %p.status,
            "Oracle report"
        ),
        EventPayload::FlightProcessed(p) => info!(
            event = %kind,
            flight = %p.flight,
            destination = %p.destination,
            timestamp = p.timestamp,
            status = %p.status_code,
            "Flight processed"
        ),
        EventPayload::Funded(p) => info!(event = %kind, airline = %p.airline, "Airline provided funding"),
        EventPayload::WithdrawRequest(p) => info!(event = %kind, recipient = %p.recipient, "Withdraw requested"),
        EventPayload::Paid(p) => info!(event = %kind, recipient = %p.recipient, amount = %p.amount, "Paid"),
        EventPayload::Credited(p) => info!(event = %kind, passenger = %p.passenger, amount = %p.amount, "Credited"),
        EventPayload::FlightBought(p) => {
            info!(event = %kind, passenger = %p.passenger, flight = %p.flight_no, "Insurance bought")
        }
        EventPayload::CreditingInsurees => info!(event = %kind, "Crediting insurees"),
        other => debug!(event = %kind, payload = ?other, "Unrouted event"),
    }
}
