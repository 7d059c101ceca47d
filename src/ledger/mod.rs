//! Ledger client capability.
//!
//! Everything the server knows about the contracts goes through [`LedgerClient`]:
//! event subscriptions, read-only calls, transactions and account enumeration.

pub mod rpc;

#[cfg(test)]
pub mod mock;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::models::{AccountId, Contract, EventKind};

pub use rpc::RpcLedgerClient;

/// Contract method names used by the server.
pub mod methods {
    pub const REGISTRATION_FEE: &str = "REGISTRATION_FEE";
    pub const REGISTER_ORACLE: &str = "registerOracle";
    pub const GET_MY_INDEXES: &str = "getMyIndexes";
    pub const SUBMIT_ORACLE_RESPONSE: &str = "submitOracleResponse";
    pub const AUTHORIZE_CALLER: &str = "authorizeCaller";
    pub const INDEX_FLIGHT_KEYS: &str = "indexFlightKeys";
    pub const FLIGHT_KEYS: &str = "flightKeys";
    pub const FLIGHTS: &str = "flights";
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("ledger transport error: {0}")]
    Transport(String),
    #[error("ledger rpc error {code}: {message}")]
    Rpc { code: i64, message: String },
    #[error("transaction reverted: {0}")]
    Reverted(String),
    /// The ledger holds nothing at the requested position.
    #[error("no data")]
    NoData,
    #[error("undecodable ledger value: {0}")]
    Decode(String),
    #[error("subscription to {0} closed")]
    SubscriptionClosed(String),
    #[error("invalid account handle: {0}")]
    InvalidAccount(String),
}

/// An event as delivered by a subscription, payload still undecoded.
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerEvent {
    pub kind: EventKind,
    pub block: u64,
    pub payload: Value,
}

/// Live stream of one event kind. Dropping it ends the stream.
pub struct Subscription {
    kind: EventKind,
    receiver: mpsc::Receiver<LedgerEvent>,
}

impl Subscription {
    pub fn new(kind: EventKind, receiver: mpsc::Receiver<LedgerEvent>) -> Self {
        Self { kind, receiver }
    }

    pub fn kind(&self) -> EventKind {
        self.kind
    }

    /// Next event, or `None` once the ledger side has gone away.
    pub async fn recv(&mut self) -> Option<LedgerEvent> {
        self.receiver.recv().await
    }
}

/// Sender and fee settings for a state-mutating call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxOptions {
    pub from: AccountId,
    /// Amount in wei sent along with the call.
    pub value: Option<String>,
    pub gas: u64,
    pub gas_price: u64,
}

impl TxOptions {
    pub fn new(from: AccountId, gas: GasSettings) -> Self {
        Self {
            from,
            value: None,
            gas: gas.gas,
            gas_price: gas.gas_price,
        }
    }

    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GasSettings {
    pub gas: u64,
    pub gas_price: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TxReceipt {
    pub transaction_hash: String,
    #[serde(default = "default_status")]
    pub status: bool,
}

fn default_status() -> bool {
    true
}

#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// Open a stream of `kind` events emitted from now on.
    async fn subscribe(&self, kind: EventKind) -> Result<Subscription, LedgerError>;

    /// Read-only method call.
    async fn call(
        &self,
        contract: Contract,
        method: &str,
        args: Vec<Value>,
        from: Option<&AccountId>,
    ) -> Result<Value, LedgerError>;

    /// State-mutating transaction. Resolves once the ledger has accepted or rejected it.
    async fn send(
        &self,
        contract: Contract,
        method: &str,
        args: Vec<Value>,
        options: TxOptions,
    ) -> Result<TxReceipt, LedgerError>;

    /// Accounts known to the ledger node, in node order.
    async fn accounts(&self) -> Result<Vec<AccountId>, LedgerError>;
}

/// Decode a call result into a typed value.
pub fn decode<T: DeserializeOwned>(method: &str, value: Value) -> Result<T, LedgerError> {
    serde_json::from_value(value).map_err(|e| LedgerError::Decode(format!("{method}: {e}")))
}
