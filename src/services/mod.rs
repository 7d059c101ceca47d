//! Oracle coordination and flight projection services

pub mod event_dispatcher;
pub mod flight_projection;
pub mod oracle_pool;
pub mod response_coordinator;

pub use event_dispatcher::{DispatcherHandle, EventDispatcher};
pub use flight_projection::FlightProjection;
pub use oracle_pool::{OraclePool, PoolReport};
pub use response_coordinator::{status_policy, ResponseCoordinator, StatusPolicy};
