//! JSON-RPC client for the ledger gateway.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::config::contracts::ContractsConfig;
use crate::ledger::{decode, LedgerClient, LedgerError, LedgerEvent, Subscription, TxOptions, TxReceipt};
use crate::models::de::number_or_string;
use crate::models::{AccountId, Contract, EventKind};

const EVENT_CHANNEL_CAPACITY: usize = 256;
const MAX_BLOCK_RANGE: u64 = 500;

#[derive(Clone)]
pub struct RpcLedgerClient {
    inner: Arc<RpcInner>,
}

struct RpcInner {
    rpc_url: String,
    contracts: ContractsConfig,
    http: Client,
    poll_interval: Duration,
}

#[derive(Debug, Deserialize)]
struct RpcErrorBody {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawEvent {
    #[serde(deserialize_with = "number_or_string")]
    block_number: u64,
    #[serde(default)]
    return_values: Value,
}

impl RpcLedgerClient {
    pub fn new(
        rpc_url: String,
        contracts: ContractsConfig,
        request_timeout: Duration,
        poll_interval: Duration,
    ) -> Result<Self, LedgerError> {
        let http = Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| LedgerError::Transport(e.to_string()))?;

        Ok(Self {
            inner: Arc::new(RpcInner {
                rpc_url,
                contracts,
                http,
                poll_interval,
            }),
        })
    }
}

impl RpcInner {
    async fn rpc_call(&self, method: &str, params: Value) -> Result<Value, LedgerError> {
        let response = self
            .http
            .post(&self.rpc_url)
            .json(&json!({
                "jsonrpc": "2.0",
                "id": "flight-oracle-server",
                "method": method,
                "params": params,
            }))
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| LedgerError::Transport(format!("{method}: {e}")))?
            .json::<Value>()
            .await
            .map_err(|e| LedgerError::Decode(format!("{method}: {e}")))?;

        if let Some(error) = response.get("error") {
            let body: RpcErrorBody = decode(method, error.clone())?;
            return Err(classify_rpc_error(body));
        }

        Ok(response.get("result").cloned().unwrap_or(Value::Null))
    }

    async fn block_number(&self) -> Result<u64, LedgerError> {
        let value = self.rpc_call("ledger_blockNumber", json!({})).await?;
        value
            .as_u64()
            .or_else(|| value.as_str().and_then(|s| s.parse().ok()))
            .ok_or_else(|| LedgerError::Decode(format!("ledger_blockNumber: {value}")))
    }

    async fn fetch_events(
        &self,
        kind: EventKind,
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<LedgerEvent>, LedgerError> {
        let params = json!({
            "contract": self.contracts.address(kind.contract()),
            "event": kind.name(),
            "fromBlock": from_block,
            "toBlock": to_block,
        });

        let raw: Vec<RawEvent> = decode("ledger_getEvents", self.rpc_call("ledger_getEvents", params).await?)?;

        Ok(raw
            .into_iter()
            .map(|event| LedgerEvent {
                kind,
                block: event.block_number,
                payload: event.return_values,
            })
            .collect())
    }

    /// Poll `kind` events from `cursor + 1` up to the current head, bounded per cycle.
    async fn poll_once(
        &self,
        kind: EventKind,
        cursor: &mut u64,
        sender: &mpsc::Sender<LedgerEvent>,
    ) -> Result<(), LedgerError> {
        let latest = self.block_number().await?;
        let Some((from_block, to_block)) = block_window(*cursor, latest) else {
            return Ok(());
        };

        let events = self.fetch_events(kind, from_block, to_block).await?;
        let delivered = events.len();

        for event in events {
            if sender.send(event).await.is_err() {
                return Err(LedgerError::SubscriptionClosed(kind.name().to_string()));
            }
        }

        *cursor = to_block;
        if delivered > 0 {
            debug!(event = %kind, from_block, to_block, delivered, "Delivered ledger events");
        }

        Ok(())
    }
}

/// Inclusive block range for the next poll, at most `MAX_BLOCK_RANGE` blocks.
fn block_window(cursor: u64, latest: u64) -> Option<(u64, u64)> {
    let from_block = cursor.saturating_add(1);
    if from_block > latest {
        return None;
    }
    Some((from_block, latest.min(from_block + MAX_BLOCK_RANGE - 1)))
}

fn classify_rpc_error(body: RpcErrorBody) -> LedgerError {
    if body.message.to_ascii_lowercase().contains("revert") {
        LedgerError::Reverted(body.message)
    } else {
        LedgerError::Rpc {
            code: body.code,
            message: body.message,
        }
    }
}

#[async_trait]
impl LedgerClient for RpcLedgerClient {
    async fn subscribe(&self, kind: EventKind) -> Result<Subscription, LedgerError> {
        let mut cursor = self.inner.block_number().await?;
        let (sender, receiver) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let inner = Arc::clone(&self.inner);

        tokio::spawn(async move {
            info!(event = %kind, start_block = cursor, "Polling ledger events");
            loop {
                sleep(inner.poll_interval).await;
                match inner.poll_once(kind, &mut cursor, &sender).await {
                    Ok(()) => {}
                    Err(LedgerError::SubscriptionClosed(_)) => break,
                    Err(err) => warn!(event = %kind, error = %err, "Event poll cycle failed"),
                }
                if sender.is_closed() {
                    break;
                }
            }
            debug!(event = %kind, "Event poller stopped");
        });

        Ok(Subscription::new(kind, receiver))
    }

    async fn call(
        &self,
        contract: Contract,
        method: &str,
        args: Vec<Value>,
        from: Option<&AccountId>,
    ) -> Result<Value, LedgerError> {
        let params = json!({
            "contract": self.inner.contracts.address(contract),
            "method": method,
            "args": args,
            "from": from,
        });

        match self.inner.rpc_call("ledger_call", params).await? {
            Value::Null => Err(LedgerError::NoData),
            value => Ok(value),
        }
    }

    async fn send(
        &self,
        contract: Contract,
        method: &str,
        args: Vec<Value>,
        options: TxOptions,
    ) -> Result<TxReceipt, LedgerError> {
        let params = json!({
            "contract": self.inner.contracts.address(contract),
            "method": method,
            "args": args,
            "from": options.from,
            "value": options.value,
            "gas": options.gas,
            "gasPrice": options.gas_price,
        });

        let receipt: TxReceipt = decode(
            "ledger_sendTransaction",
            self.inner.rpc_call("ledger_sendTransaction", params).await?,
        )?;

        if !receipt.status {
            return Err(LedgerError::Reverted(format!(
                "{method} in {}",
                receipt.transaction_hash
            )));
        }

        Ok(receipt)
    }

    async fn accounts(&self) -> Result<Vec<AccountId>, LedgerError> {
        let raw: Vec<String> = decode("ledger_accounts", self.inner.rpc_call("ledger_accounts", json!([])).await?)?;
        parse_accounts(&raw)
    }
}

fn parse_accounts(raw: &[String]) -> Result<Vec<AccountId>, LedgerError> {
    raw.iter()
        .map(|account| account.parse().map_err(LedgerError::InvalidAccount))
        .collect()
}
