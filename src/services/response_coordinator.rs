//! Response coordinator: fans a status request out to every registered oracle.
//!
//! Submissions are detached tasks. The coordinator never waits for them and
//! never retries; a rejected response is logged and dropped, since the app
//! contract reaches consensus from whichever responses land.

use std::sync::Arc;

use rand::seq::SliceRandom;
use serde_json::json;
use tokio::task::{JoinError, JoinHandle};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::StatusPolicyKind;
use crate::ledger::{methods, GasSettings, LedgerClient, TxOptions};
use crate::models::{AccountId, Contract, StatusCode, StatusRequest};
use crate::services::oracle_pool::{fetch_index_group, OraclePool};

/// Chooses the status code an oracle reports for one index.
pub trait StatusPolicy: Send + Sync {
    fn select(&self, request: &StatusRequest, oracle: &AccountId, index: u8) -> StatusCode;
}

/// Every oracle reports the same code.
pub struct FixedStatus(pub StatusCode);

impl StatusPolicy for FixedStatus {
    fn select(&self, _request: &StatusRequest, _oracle: &AccountId, _index: u8) -> StatusCode {
        self.0
    }
}

/// Uniform pick among the reportable codes, per submission.
pub struct RandomStatus;

impl StatusPolicy for RandomStatus {
    fn select(&self, _request: &StatusRequest, _oracle: &AccountId, _index: u8) -> StatusCode {
        StatusCode::REPORTABLE
            .choose(&mut rand::thread_rng())
            .copied()
            .unwrap_or(StatusCode::Unknown)
    }
}

pub fn status_policy(kind: StatusPolicyKind) -> Arc<dyn StatusPolicy> {
    match kind {
        StatusPolicyKind::Fixed(code) => Arc::new(FixedStatus(code)),
        StatusPolicyKind::Random => Arc::new(RandomStatus),
    }
}

/// Handles of the tasks spawned for one status request.
///
/// Dropping this detaches the tasks, which is what the dispatcher does.
pub struct Dispatched {
    pub id: Uuid,
    pub oracles: usize,
    handles: Vec<JoinHandle<Vec<JoinHandle<()>>>>,
}

impl Dispatched {
    /// Wait for every oracle task and every submission it spawned.
    pub async fn join(self) {
        for handle in self.handles {
            let submissions = match handle.await {
                Ok(submissions) => submissions,
                Err(join_error) => {
                    report_join_error(self.id, "oracle", &join_error);
                    continue;
                }
            };
            for submission in submissions {
                if let Err(join_error) = submission.await {
                    report_join_error(self.id, "submission", &join_error);
                }
            }
        }
    }
}

fn report_join_error(dispatch: Uuid, task: &str, join_error: &JoinError) {
    if join_error.is_panic() {
        error!(%dispatch, task, "Status response task panicked");
    } else {
        error!(%dispatch, task, error = %join_error, "Status response task failed");
    }
}

pub struct ResponseCoordinator {
    ledger: Arc<dyn LedgerClient>,
    pool: Arc<OraclePool>,
    policy: Arc<dyn StatusPolicy>,
    gas: GasSettings,
}

/// Everything a submission task needs, shared across the fan-out.
struct SubmissionContext {
    dispatch: Uuid,
    ledger: Arc<dyn LedgerClient>,
    policy: Arc<dyn StatusPolicy>,
    gas: GasSettings,
    request: StatusRequest,
}

impl ResponseCoordinator {
    pub fn new(
        ledger: Arc<dyn LedgerClient>,
        pool: Arc<OraclePool>,
        policy: Arc<dyn StatusPolicy>,
        gas: GasSettings,
    ) -> Self {
        Self {
            ledger,
            pool,
            policy,
            gas,
        }
    }

    /// Start one submission per (registered oracle, assigned index). Returns immediately.
    pub fn handle_status_request(&self, request: StatusRequest) -> Dispatched {
        let oracles = self.pool.registered();
        let dispatch = Uuid::new_v4();

        if oracles.is_empty() {
            warn!(
                dispatch = %dispatch,
                flight = %request.flight,
                "Status request observed with no registered oracles"
            );
        } else {
            info!(
                dispatch = %dispatch,
                oracles = oracles.len(),
                index = request.index,
                flight = %request.flight,
                destination = %request.destination,
                timestamp = request.timestamp,
                "Dispatching oracle responses"
            );
        }

        let context = Arc::new(SubmissionContext {
            dispatch,
            ledger: Arc::clone(&self.ledger),
            policy: Arc::clone(&self.policy),
            gas: self.gas,
            request,
        });

        let handles = oracles
            .into_iter()
            .map(|oracle| tokio::spawn(respond_as(Arc::clone(&context), oracle)))
            .collect::<Vec<_>>();

        Dispatched {
            id: dispatch,
            oracles: handles.len(),
            handles,
        }
    }
}

async fn respond_as(context: Arc<SubmissionContext>, oracle: AccountId) -> Vec<JoinHandle<()>> {
    let group = match fetch_index_group(context.ledger.as_ref(), &oracle).await {
        Ok(group) => group,
        Err(err) => {
            error!(
                dispatch = %context.dispatch,
                oracle = %oracle,
                flight = %context.request.flight,
                destination = %context.request.destination,
                timestamp = context.request.timestamp,
                error = %err,
                "Cannot read oracle indexes"
            );
            return Vec::new();
        }
    };

    group
        .indexes()
        .into_iter()
        .map(|index| {
            let status = context.policy.select(&context.request, &oracle, index);
            tokio::spawn(submit_response(Arc::clone(&context), oracle.clone(), index, status))
        })
        .collect()
}

async fn submit_response(context: Arc<SubmissionContext>, oracle: AccountId, index: u8, status: StatusCode) {
    let request = &context.request;
    let args = vec![
        json!(index),
        json!(request.flight),
        json!(request.destination),
        json!(request.timestamp),
        json!(status.code()),
    ];
    let options = TxOptions::new(oracle.clone(), context.gas);

    match context
        .ledger
        .send(Contract::App, methods::SUBMIT_ORACLE_RESPONSE, args, options)
        .await
    {
        Ok(receipt) => debug!(
            dispatch = %context.dispatch,
            oracle = %oracle,
            index,
            status = %status,
            tx = %receipt.transaction_hash,
            "Oracle response submitted"
        ),
        Err(err) => error!(
            dispatch = %context.dispatch,
            oracle = %oracle,
            index,
            flight = %request.flight,
            destination = %request.destination,
            timestamp = request.timestamp,
            error = %err,
            "Error submitting oracle response"
        ),
    }
}
