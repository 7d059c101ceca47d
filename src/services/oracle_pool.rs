//! Oracle pool: selection and registration of the accounts acting as oracles.

use std::sync::{Arc, PoisonError, RwLock};

use futures_util::future::join_all;
use serde::Deserialize;
use serde_json::Value;
use tracing::{error, info, warn};

use crate::ledger::{decode, methods, GasSettings, LedgerClient, LedgerError, TxOptions};
use crate::models::de::decimal_string;
use crate::models::{AccountId, Contract, IndexGroup, OracleIdentity};

/// Registration fee in wei.
#[derive(Deserialize)]
#[serde(transparent)]
struct Fee(#[serde(deserialize_with = "decimal_string")] String);

/// Outcome of a [`OraclePool::register_pool`] run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PoolReport {
    pub requested: usize,
    pub selected: usize,
    pub registered: usize,
    pub failed: usize,
}

pub struct OraclePool {
    ledger: Arc<dyn LedgerClient>,
    account_set_size: usize,
    gas: GasSettings,
    identities: RwLock<Vec<OracleIdentity>>,
}

impl OraclePool {
    pub fn new(ledger: Arc<dyn LedgerClient>, account_set_size: usize, gas: GasSettings) -> Self {
        Self {
            ledger,
            account_set_size,
            gas,
            identities: RwLock::new(Vec::new()),
        }
    }

    /// Register up to `size` oracles drawn from the tail of the account set.
    ///
    /// A failed registration is logged and skipped; the pool then runs with
    /// fewer oracles. Nothing is retried and no error reaches the caller.
    pub async fn register_pool(&self, size: usize) -> PoolReport {
        let mut report = PoolReport {
            requested: size,
            ..PoolReport::default()
        };

        let accounts = match self.ledger.accounts().await {
            Ok(accounts) => accounts,
            Err(err) => {
                error!(error = %err, "Cannot enumerate ledger accounts; oracle pool is empty");
                return report;
            }
        };

        let selected = select_accounts(&accounts, self.account_set_size, size);
        report.selected = selected.len();
        if selected.len() < size {
            warn!(requested = size, available = selected.len(), "Fewer accounts than requested oracles");
        }

        let fee = match self.registration_fee().await {
            Ok(fee) => fee,
            Err(err) => {
                error!(error = %err, "Cannot read registration fee; no oracle registered");
                report.failed = selected.len();
                self.replace(selected.into_iter().map(OracleIdentity::new).collect());
                return report;
            }
        };

        let outcomes = join_all(selected.iter().map(|account| self.register_one(account, &fee))).await;

        let identities: Vec<OracleIdentity> = selected
            .into_iter()
            .zip(outcomes)
            .map(|(handle, registered)| OracleIdentity {
                registered,
                ..OracleIdentity::new(handle)
            })
            .collect();

        report.registered = identities.iter().filter(|identity| identity.registered).count();
        report.failed = report.selected - report.registered;
        self.replace(identities);

        info!(
            requested = report.requested,
            registered = report.registered,
            failed = report.failed,
            "Oracle pool registration finished"
        );
        report
    }

    async fn registration_fee(&self) -> Result<String, LedgerError> {
        let raw = self
            .ledger
            .call(Contract::App, methods::REGISTRATION_FEE, vec![], None)
            .await?;
        let Fee(fee) = decode(methods::REGISTRATION_FEE, raw)?;
        Ok(fee)
    }

    async fn register_one(&self, account: &AccountId, fee: &str) -> bool {
        let options = TxOptions::new(account.clone(), self.gas).with_value(fee);
        match self
            .ledger
            .send(Contract::App, methods::REGISTER_ORACLE, vec![], options)
            .await
        {
            Ok(_) => true,
            Err(err) => {
                error!(oracle = %account, error = %err, "Error registering oracle");
                false
            }
        }
    }

    /// Read every registered oracle's index group and remember it.
    pub async fn load_index_groups(&self) {
        let registered = self.registered();
        let groups = join_all(
            registered
                .iter()
                .map(|oracle| fetch_index_group(self.ledger.as_ref(), oracle)),
        )
        .await;

        let mut identities = self.identities.write().unwrap_or_else(PoisonError::into_inner);
        for (oracle, group) in registered.iter().zip(groups) {
            match group {
                Ok(group) => {
                    info!(oracle = %oracle, indexes = %group, "Oracle index group");
                    if let Some(identity) = identities.iter_mut().find(|i| &i.handle == oracle) {
                        identity.index_group = Some(group);
                    }
                }
                Err(err) => warn!(oracle = %oracle, error = %err, "Cannot read oracle index group"),
            }
        }
    }

    /// Handles of the successfully registered oracles.
    pub fn registered(&self) -> Vec<AccountId> {
        self.identities
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|identity| identity.registered)
            .map(|identity| identity.handle.clone())
            .collect()
    }

    pub fn identities(&self) -> Vec<OracleIdentity> {
        self.identities
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn replace(&self, identities: Vec<OracleIdentity>) {
        *self.identities.write().unwrap_or_else(PoisonError::into_inner) = identities;
    }
}

/// Current index group of `oracle`, as the app contract reports it.
pub async fn fetch_index_group(
    ledger: &dyn LedgerClient,
    oracle: &AccountId,
) -> Result<IndexGroup, LedgerError> {
    let raw: Value = ledger
        .call(Contract::App, methods::GET_MY_INDEXES, vec![], Some(oracle))
        .await?;
    decode(methods::GET_MY_INDEXES, raw)
}

/// The last `size` accounts of the first `account_set_size` accounts.
fn select_accounts(accounts: &[AccountId], account_set_size: usize, size: usize) -> Vec<AccountId> {
    let set = &accounts[..accounts.len().min(account_set_size)];
    let start = set.len().saturating_sub(size);
    set[start..].to_vec()
}
