//! Environment configuration

pub mod contracts;

use std::collections::HashMap;
use std::env;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

use crate::ledger::GasSettings;
use crate::models::StatusCode;
use contracts::ContractsConfig;

pub type Lookup<'a> = dyn Fn(&str) -> Option<String> + 'a;

pub const DEFAULT_NUMBER_OF_ORACLES: usize = 30;
pub const DEFAULT_NUMBER_OF_ACCOUNTS: usize = 50;
const DEFAULT_GAS: u64 = 4_712_388;
const DEFAULT_GAS_PRICE: u64 = 100_000_000_000;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),
    #[error("invalid value {value:?} for {var}")]
    Invalid { var: &'static str, value: String },
    #[error("NUMBER_OF_ORACLES ({oracles}) exceeds NUMBER_OF_ACCOUNTS ({accounts})")]
    PoolTooLarge { oracles: usize, accounts: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusPolicyKind {
    Fixed(StatusCode),
    Random,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub ledger_rpc_url: String,
    pub contracts: ContractsConfig,
    pub number_of_oracles: usize,
    pub number_of_accounts: usize,
    pub gas: GasSettings,
    pub status_policy: StatusPolicyKind,
    pub event_poll_interval: Duration,
    pub rpc_timeout: Duration,
    pub authorize_app_caller: bool,
    pub port: u16,
    pub cors_allowed_origins: Vec<String>,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(&|key: &str| env::var(key).ok())
    }

    pub fn from_map(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        Self::from_lookup(&|key: &str| vars.get(key).cloned())
    }

    fn from_lookup(lookup: &Lookup<'_>) -> Result<Self, ConfigError> {
        let number_of_oracles = parse_or(lookup, "NUMBER_OF_ORACLES", DEFAULT_NUMBER_OF_ORACLES)?;
        let number_of_accounts = parse_or(lookup, "NUMBER_OF_ACCOUNTS", DEFAULT_NUMBER_OF_ACCOUNTS)?;
        if number_of_oracles > number_of_accounts {
            return Err(ConfigError::PoolTooLarge {
                oracles: number_of_oracles,
                accounts: number_of_accounts,
            });
        }

        let status_policy = match lookup("STATUS_POLICY").as_deref().map(str::trim) {
            None | Some("") | Some("fixed") => {
                let code: u64 = parse_or(lookup, "FIXED_STATUS_CODE", 20)?;
                let status = StatusCode::try_from(code).map_err(|_| ConfigError::Invalid {
                    var: "FIXED_STATUS_CODE",
                    value: code.to_string(),
                })?;
                StatusPolicyKind::Fixed(status)
            }
            Some("random") => StatusPolicyKind::Random,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    var: "STATUS_POLICY",
                    value: other.to_string(),
                })
            }
        };

        let cors_allowed_origins = lookup("CORS_ALLOWED_ORIGINS")
            .unwrap_or_else(|| "*".to_string())
            .split(',')
            .map(|origin| origin.trim().to_string())
            .filter(|origin| !origin.is_empty())
            .collect();

        Ok(Self {
            ledger_rpc_url: lookup("LEDGER_RPC_URL")
                .unwrap_or_else(|| "http://localhost:8545".to_string()),
            contracts: ContractsConfig::from_lookup(lookup)?,
            number_of_oracles,
            number_of_accounts,
            gas: GasSettings {
                gas: parse_or(lookup, "ORACLE_GAS", DEFAULT_GAS)?,
                gas_price: parse_or(lookup, "ORACLE_GAS_PRICE", DEFAULT_GAS_PRICE)?,
            },
            status_policy,
            event_poll_interval: Duration::from_millis(parse_or(lookup, "EVENT_POLL_INTERVAL_MS", 1000)?),
            rpc_timeout: Duration::from_secs(parse_or(lookup, "RPC_TIMEOUT_SECONDS", 30)?),
            authorize_app_caller: parse_or(lookup, "AUTHORIZE_APP_CALLER", false)?,
            port: parse_or(lookup, "PORT", 3000)?,
            cors_allowed_origins,
        })
    }
}

fn parse_or<T: FromStr>(lookup: &Lookup<'_>, var: &'static str, default: T) -> Result<T, ConfigError> {
    match lookup(var) {
        None => Ok(default),
        Some(raw) if raw.trim().is_empty() => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { var, value: raw }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_vars() -> HashMap<String, String> {
        HashMap::from([
            (
                "APP_CONTRACT_ADDRESS".to_string(),
                "0x00000000000000000000000000000000000000a1".to_string(),
            ),
            (
                "DATA_CONTRACT_ADDRESS".to_string(),
                "0x00000000000000000000000000000000000000d1".to_string(),
            ),
        ])
    }

    #[test]
    fn defaults_apply() {
        let config = ServerConfig::from_map(&base_vars()).unwrap();
        assert_eq!(config.number_of_oracles, 30);
        assert_eq!(config.number_of_accounts, 50);
        assert_eq!(config.gas.gas, 4_712_388);
        assert_eq!(config.status_policy, StatusPolicyKind::Fixed(StatusCode::LateAirline));
        assert_eq!(config.port, 3000);
        assert_eq!(config.cors_allowed_origins, vec!["*".to_string()]);
        assert!(!config.authorize_app_caller);
    }

    #[test]
    fn missing_contract_address_is_an_error() {
        let mut vars = base_vars();
        vars.remove("DATA_CONTRACT_ADDRESS");
        assert_eq!(
            ServerConfig::from_map(&vars).unwrap_err(),
            ConfigError::Missing("DATA_CONTRACT_ADDRESS")
        );
    }

    #[test]
    fn pool_cannot_exceed_accounts() {
        let mut vars = base_vars();
        vars.insert("NUMBER_OF_ORACLES".into(), "60".into());
        assert!(matches!(
            ServerConfig::from_map(&vars),
            Err(ConfigError::PoolTooLarge { oracles: 60, accounts: 50 })
        ));
    }

    #[test]
    fn status_policy_parses() {
        let mut vars = base_vars();
        vars.insert("STATUS_POLICY".into(), "random".into());
        assert_eq!(
            ServerConfig::from_map(&vars).unwrap().status_policy,
            StatusPolicyKind::Random
        );

        vars.insert("STATUS_POLICY".into(), "fixed".into());
        vars.insert("FIXED_STATUS_CODE".into(), "25".into());
        assert!(matches!(
            ServerConfig::from_map(&vars),
            Err(ConfigError::Invalid { var: "FIXED_STATUS_CODE", .. })
        ));
    }

    #[test]
    fn invalid_numbers_are_reported() {
        let mut vars = base_vars();
        vars.insert("PORT".into(), "http".into());
        assert_eq!(
            ServerConfig::from_map(&vars).unwrap_err(),
            ConfigError::Invalid {
                var: "PORT",
                value: "http".into()
            }
        );
    }
}
