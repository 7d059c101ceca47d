//! In-memory ledger used by unit tests.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::mpsc;

use crate::ledger::{methods, LedgerClient, LedgerError, LedgerEvent, Subscription, TxOptions, TxReceipt};
use crate::models::{AccountId, Contract, EventKind};

pub const REGISTRATION_FEE: &str = "1000000000000000000";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    pub oracle: AccountId,
    pub index: u8,
    pub flight: String,
    pub destination: String,
    pub timestamp: u64,
    pub status: u8,
}

#[derive(Default)]
struct MockState {
    accounts: Vec<AccountId>,
    registered: HashMap<AccountId, [u8; 3]>,
    failing_registrations: HashSet<AccountId>,
    failing_index_reads: HashSet<AccountId>,
    failing_submissions: HashSet<(AccountId, u8)>,
    submissions: Vec<Submission>,
    registration_values: Vec<Option<String>>,
    flights: Vec<(String, Value)>,
    failing_flight_reads: HashSet<u64>,
    failing_subscriptions: HashSet<EventKind>,
    subscribers: HashMap<EventKind, mpsc::Sender<LedgerEvent>>,
    sent: Vec<(Contract, String)>,
}

pub struct MockLedger {
    state: Mutex<MockState>,
}

pub fn account(n: usize) -> AccountId {
    format!("0x{n:040x}").parse().unwrap()
}

pub fn flight_value(flight_no: &str, status: u8) -> Value {
    json!({
        "0": true, "1": status.to_string(), "2": "1700000000000", "3": "1700003600000",
        "4": "0x00000000000000000000000000000000000000aa", "5": flight_no,
        "6": "500000000000000000", "7": "LIS", "8": "MAD",
        "isRegistered": true,
        "statusCode": status.to_string(),
        "takeOff": "1700000000000",
        "landing": "1700003600000",
        "airline": "0x00000000000000000000000000000000000000aa",
        "flightNo": flight_no,
        "price": "500000000000000000",
        "from": "LIS",
        "to": "MAD"
    })
}

impl MockLedger {
    pub fn with_accounts(count: usize) -> Self {
        let state = MockState {
            accounts: (1..=count).map(account).collect(),
            ..MockState::default()
        };
        Self {
            state: Mutex::new(state),
        }
    }

    pub fn fail_registration(&self, oracle: &AccountId) {
        self.state.lock().unwrap().failing_registrations.insert(oracle.clone());
    }

    pub fn fail_index_read(&self, oracle: &AccountId) {
        self.state.lock().unwrap().failing_index_reads.insert(oracle.clone());
    }

    pub fn fail_submission(&self, oracle: &AccountId, index: u8) {
        self.state
            .lock()
            .unwrap()
            .failing_submissions
            .insert((oracle.clone(), index));
    }

    pub fn fail_flight_read(&self, ordinal: u64) {
        self.state.lock().unwrap().failing_flight_reads.insert(ordinal);
    }

    pub fn fail_subscription(&self, kind: EventKind) {
        self.state.lock().unwrap().failing_subscriptions.insert(kind);
    }

    pub fn add_flight(&self, flight_no: &str) -> u64 {
        let mut state = self.state.lock().unwrap();
        let ordinal = state.flights.len() as u64;
        state
            .flights
            .push((format!("0x{:064x}", ordinal + 1), flight_value(flight_no, 0)));
        ordinal
    }

    pub fn set_status(&self, ordinal: u64, status: u8) {
        let mut state = self.state.lock().unwrap();
        let (_, value) = &mut state.flights[ordinal as usize];
        value["statusCode"] = json!(status.to_string());
        value["1"] = json!(status.to_string());
    }

    pub fn submissions(&self) -> Vec<Submission> {
        self.state.lock().unwrap().submissions.clone()
    }

    pub fn registration_values(&self) -> Vec<Option<String>> {
        self.state.lock().unwrap().registration_values.clone()
    }

    pub fn index_group_of(&self, oracle: &AccountId) -> Option<[u8; 3]> {
        self.state.lock().unwrap().registered.get(oracle).copied()
    }

    pub fn sent_methods(&self) -> Vec<(Contract, String)> {
        self.state.lock().unwrap().sent.clone()
    }

    pub fn subscribed(&self) -> Vec<EventKind> {
        self.state.lock().unwrap().subscribers.keys().copied().collect()
    }

    /// Deliver an event to the subscriber of `kind`, if any.
    pub async fn emit(&self, kind: EventKind, payload: Value) {
        let sender = self.state.lock().unwrap().subscribers.get(&kind).cloned();
        if let Some(sender) = sender {
            let _ = sender
                .send(LedgerEvent {
                    kind,
                    block: 1,
                    payload,
                })
                .await;
        }
    }

    fn assign_indexes(state: &MockState) -> [u8; 3] {
        // n-th ascending triple of distinct indexes in 0..10; 120 groups before repeating.
        let n = state.registered.len() % 120;
        (0..10u8)
            .flat_map(|a| (a + 1..10).flat_map(move |b| (b + 1..10).map(move |c| [a, b, c])))
            .nth(n)
            .unwrap_or([0, 1, 2])
    }
}

fn arg_u64(args: &[Value], position: usize) -> u64 {
    args.get(position)
        .and_then(|v| v.as_u64().or_else(|| v.as_str().and_then(|s| s.parse().ok())))
        .unwrap_or_default()
}

fn arg_str(args: &[Value], position: usize) -> String {
    args.get(position)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

#[async_trait]
impl LedgerClient for MockLedger {
    async fn subscribe(&self, kind: EventKind) -> Result<Subscription, LedgerError> {
        let mut state = self.state.lock().unwrap();
        if state.failing_subscriptions.contains(&kind) {
            return Err(LedgerError::Transport(format!("cannot subscribe to {kind}")));
        }
        let (sender, receiver) = mpsc::channel(64);
        state.subscribers.insert(kind, sender);
        Ok(Subscription::new(kind, receiver))
    }

    async fn call(
        &self,
        contract: Contract,
        method: &str,
        args: Vec<Value>,
        from: Option<&AccountId>,
    ) -> Result<Value, LedgerError> {
        let state = self.state.lock().unwrap();
        match (contract, method) {
            (Contract::App, methods::REGISTRATION_FEE) => Ok(json!(REGISTRATION_FEE)),
            (Contract::App, methods::GET_MY_INDEXES) => {
                let oracle = from.ok_or(LedgerError::Reverted("no sender".into()))?;
                if state.failing_index_reads.contains(oracle) {
                    return Err(LedgerError::Transport("connection reset".into()));
                }
                state
                    .registered
                    .get(oracle)
                    .map(|indexes| json!(indexes.map(|i| i.to_string())))
                    .ok_or_else(|| LedgerError::Reverted("Not registered as an oracle".into()))
            }
            (Contract::Data, methods::INDEX_FLIGHT_KEYS) => {
                Ok(json!(state.flights.len().saturating_sub(1).to_string()))
            }
            (Contract::Data, methods::FLIGHT_KEYS) => {
                let ordinal = arg_u64(&args, 0);
                if state.failing_flight_reads.contains(&ordinal) {
                    return Err(LedgerError::Transport("timeout".into()));
                }
                state
                    .flights
                    .get(ordinal as usize)
                    .map(|(key, _)| json!(key))
                    .ok_or_else(|| LedgerError::Reverted("invalid opcode".into()))
            }
            (Contract::Data, methods::FLIGHTS) => {
                let key = arg_str(&args, 0);
                state
                    .flights
                    .iter()
                    .find(|(k, _)| *k == key)
                    .map(|(_, value)| value.clone())
                    .ok_or(LedgerError::NoData)
            }
            _ => Err(LedgerError::Rpc {
                code: -32601,
                message: format!("unknown method {method}"),
            }),
        }
    }

    async fn send(
        &self,
        contract: Contract,
        method: &str,
        args: Vec<Value>,
        options: TxOptions,
    ) -> Result<TxReceipt, LedgerError> {
        tokio::task::yield_now().await;
        let mut state = self.state.lock().unwrap();
        state.sent.push((contract, method.to_string()));

        match method {
            methods::REGISTER_ORACLE => {
                state.registration_values.push(options.value.clone());
                if state.failing_registrations.contains(&options.from) {
                    return Err(LedgerError::Reverted("out of gas".into()));
                }
                let indexes = Self::assign_indexes(&state);
                state.registered.insert(options.from.clone(), indexes);
            }
            methods::SUBMIT_ORACLE_RESPONSE => {
                let index = arg_u64(&args, 0) as u8;
                if state.failing_submissions.contains(&(options.from.clone(), index)) {
                    return Err(LedgerError::Reverted("Index does not match oracle request".into()));
                }
                let submission = Submission {
                    oracle: options.from.clone(),
                    index,
                    flight: arg_str(&args, 1),
                    destination: arg_str(&args, 2),
                    timestamp: arg_u64(&args, 3),
                    status: arg_u64(&args, 4) as u8,
                };
                state.submissions.push(submission);
            }
            _ => {}
        }

        Ok(TxReceipt {
            transaction_hash: format!("0x{:064x}", state.sent.len()),
            status: true,
        })
    }

    async fn accounts(&self) -> Result<Vec<AccountId>, LedgerError> {
        Ok(self.state.lock().unwrap().accounts.clone())
    }
}
