//! Flight Oracle Server Library
//!
//! Off-chain coordination for a flight-status oracle network: oracle pool
//! registration, fan-out of status responses, and a read projection of the
//! flights held by the data contract.

pub mod app_state;
pub mod config;
pub mod engine;
pub mod handlers;
pub mod ledger;
pub mod models;
pub mod routes;
pub mod services;
