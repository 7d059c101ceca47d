use crate::config::{ConfigError, Lookup};
use crate::models::{AccountId, Contract};

/// Deployed contract addresses.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ContractsConfig {
    pub app_contract_address: AccountId,
    pub data_contract_address: AccountId,
}

impl ContractsConfig {
    pub fn from_lookup(lookup: &Lookup<'_>) -> Result<Self, ConfigError> {
        Ok(Self {
            app_contract_address: required_address(lookup, "APP_CONTRACT_ADDRESS")?,
            data_contract_address: required_address(lookup, "DATA_CONTRACT_ADDRESS")?,
        })
    }

    pub fn address(&self, contract: Contract) -> &AccountId {
        match contract {
            Contract::App => &self.app_contract_address,
            Contract::Data => &self.data_contract_address,
        }
    }
}

fn required_address(lookup: &Lookup<'_>, var: &'static str) -> Result<AccountId, ConfigError> {
    let raw = lookup(var)
        .filter(|value| !value.trim().is_empty())
        .ok_or(ConfigError::Missing(var))?;

    raw.parse().map_err(|_| ConfigError::Invalid { var, value: raw })
}
