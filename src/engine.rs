//! Wiring of the oracle services and the startup sequence.

use std::sync::Arc;

use serde_json::json;
use tracing::{error, info, warn};

use crate::config::ServerConfig;
use crate::ledger::{methods, LedgerClient, TxOptions};
use crate::models::{AccountId, Contract};
use crate::services::{
    status_policy, DispatcherHandle, EventDispatcher, FlightProjection, OraclePool, ResponseCoordinator,
};

pub struct OracleEngine {
    ledger: Arc<dyn LedgerClient>,
    config: ServerConfig,
    pub pool: Arc<OraclePool>,
    pub projection: Arc<FlightProjection>,
    dispatcher: EventDispatcher,
}

impl OracleEngine {
    pub fn new(config: ServerConfig, ledger: Arc<dyn LedgerClient>) -> Self {
        let pool = Arc::new(OraclePool::new(
            Arc::clone(&ledger),
            config.number_of_accounts,
            config.gas,
        ));
        let coordinator = Arc::new(ResponseCoordinator::new(
            Arc::clone(&ledger),
            Arc::clone(&pool),
            status_policy(config.status_policy),
            config.gas,
        ));
        let projection = Arc::new(FlightProjection::new(Arc::clone(&ledger)));
        let dispatcher = EventDispatcher::new(Arc::clone(&ledger), coordinator, Arc::clone(&projection));

        Self {
            ledger,
            config,
            pool,
            projection,
            dispatcher,
        }
    }

    /// Subscribe, register the oracle pool and build the projection once.
    pub async fn start(&self) -> DispatcherHandle {
        let subscriptions = self.dispatcher.start().await;

        if self.config.authorize_app_caller {
            self.authorize_app_caller().await;
        }

        let report = self.pool.register_pool(self.config.number_of_oracles).await;
        if report.registered < report.requested {
            warn!(
                requested = report.requested,
                registered = report.registered,
                "Oracle pool running degraded"
            );
        }
        self.pool.load_index_groups().await;

        self.projection.resync().await;
        info!("Oracle engine started");
        subscriptions
    }

    async fn authorize_app_caller(&self) {
        let owner: AccountId = match self.ledger.accounts().await.map(|a| a.into_iter().next()) {
            Ok(Some(owner)) => owner,
            Ok(None) => {
                warn!("No ledger accounts; skipping caller authorization");
                return;
            }
            Err(err) => {
                error!(error = %err, "Cannot enumerate accounts for caller authorization");
                return;
            }
        };

        let app = &self.config.contracts.app_contract_address;
        let options = TxOptions::new(owner, self.config.gas);
        match self
            .ledger
            .send(Contract::Data, methods::AUTHORIZE_CALLER, vec![json!(app)], options)
            .await
        {
            Ok(receipt) => info!(app = %app, tx = %receipt.transaction_hash, "App contract authorized"),
            Err(err) => error!(app = %app, error = %err, "Error authorizing app contract"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::mock::MockLedger;
    use std::collections::HashMap;

    fn config(authorize: bool) -> ServerConfig {
        let vars = HashMap::from([
            (
                "APP_CONTRACT_ADDRESS".to_string(),
                "0x00000000000000000000000000000000000000a1".to_string(),
            ),
            (
                "DATA_CONTRACT_ADDRESS".to_string(),
                "0x00000000000000000000000000000000000000d1".to_string(),
            ),
            ("NUMBER_OF_ORACLES".to_string(), "4".to_string()),
            ("NUMBER_OF_ACCOUNTS".to_string(), "6".to_string()),
            ("AUTHORIZE_APP_CALLER".to_string(), authorize.to_string()),
        ]);
        ServerConfig::from_map(&vars).unwrap()
    }

    #[tokio::test]
    async fn start_registers_pool_and_builds_projection() {
        let ledger = Arc::new(MockLedger::with_accounts(10));
        ledger.add_flight("AB1");
        ledger.add_flight("AB2");
        let engine = OracleEngine::new(config(false), ledger.clone());

        let subscriptions = engine.start().await;

        assert!(subscriptions.failed.is_empty());
        assert_eq!(engine.pool.registered().len(), 4);
        assert!(engine.pool.identities().iter().all(|i| i.index_group.is_some()));
        assert_eq!(engine.projection.query().len(), 2);
        assert!(!ledger
            .sent_methods()
            .iter()
            .any(|(_, method)| method == methods::AUTHORIZE_CALLER));
    }

    #[tokio::test]
    async fn start_can_authorize_app_contract() {
        let ledger = Arc::new(MockLedger::with_accounts(10));
        let engine = OracleEngine::new(config(true), ledger.clone());

        engine.start().await;

        assert!(ledger
            .sent_methods()
            .contains(&(Contract::Data, methods::AUTHORIZE_CALLER.to_string())));
    }
}
