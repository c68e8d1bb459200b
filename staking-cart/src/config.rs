use std::env;
use std::time::Duration;

use crate::error::{CartError, CartResult};
use crate::tx_queue::DEFAULT_STORAGE_KEY;

/// Environment variable names
pub mod env_vars {
    pub const CART_DB_PATH: &str = "CART_DB_PATH";
    pub const CART_STORAGE_KEY: &str = "CART_STORAGE_KEY";
    pub const RPC_URL: &str = "RPC_URL";
    pub const CHAIN_ID: &str = "CHAIN_ID";
    pub const WALLET_PRIVATE_KEY: &str = "WALLET_PRIVATE_KEY";
    pub const RECEIPT_TIMEOUT_SECS: &str = "RECEIPT_TIMEOUT_SECS";
    pub const RECEIPT_POLL_INTERVAL_MS: &str = "RECEIPT_POLL_INTERVAL_MS";
}

#[derive(Clone)]
pub struct Config {
    pub database_path: String,
    pub storage_key: String,
    pub rpc_url: String,
    pub chain_id: u64,
    /// Falls back to WALLET_PRIVATE_KEY at submitter creation when unset
    pub private_key: Option<String>,
    pub receipt_timeout: Duration,
    pub receipt_poll_interval: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: "./.db/cart.db".to_string(),
            storage_key: DEFAULT_STORAGE_KEY.to_string(),
            rpc_url: "http://127.0.0.1:8545".to_string(),
            chain_id: 1,
            private_key: None,
            receipt_timeout: Duration::from_secs(120),
            receipt_poll_interval: Duration::from_millis(2000),
        }
    }
}

impl Config {
    pub fn from_env() -> CartResult<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build from any variable source; unset values keep their defaults
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> CartResult<Self> {
        let defaults = Self::default();

        Ok(Self {
            database_path: lookup(env_vars::CART_DB_PATH).unwrap_or(defaults.database_path),
            storage_key: lookup(env_vars::CART_STORAGE_KEY).unwrap_or(defaults.storage_key),
            rpc_url: lookup(env_vars::RPC_URL).unwrap_or(defaults.rpc_url),
            chain_id: parse_var(&lookup, env_vars::CHAIN_ID)?.unwrap_or(defaults.chain_id),
            private_key: lookup(env_vars::WALLET_PRIVATE_KEY).filter(|k| !k.trim().is_empty()),
            receipt_timeout: parse_var(&lookup, env_vars::RECEIPT_TIMEOUT_SECS)?
                .map(Duration::from_secs)
                .unwrap_or(defaults.receipt_timeout),
            receipt_poll_interval: parse_var(&lookup, env_vars::RECEIPT_POLL_INTERVAL_MS)?
                .map(Duration::from_millis)
                .unwrap_or(defaults.receipt_poll_interval),
        })
    }
}

fn parse_var(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> CartResult<Option<u64>> {
    match lookup(name) {
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| {
                CartError::Config(format!("{} must be a valid number, got '{}'", name, raw))
            }),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> =
            pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |name: &str| map.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(config.chain_id, 1);
        assert_eq!(config.storage_key, DEFAULT_STORAGE_KEY);
        assert!(config.private_key.is_none());
        assert_eq!(config.receipt_timeout, Duration::from_secs(120));
    }

    #[test]
    fn test_overrides() {
        let config = Config::from_lookup(lookup_from(&[
            (env_vars::CHAIN_ID, "11155111"),
            (env_vars::RECEIPT_TIMEOUT_SECS, "30"),
            (env_vars::RECEIPT_POLL_INTERVAL_MS, "250"),
            (env_vars::RPC_URL, "https://rpc.example"),
        ]))
        .unwrap();
        assert_eq!(config.chain_id, 11155111);
        assert_eq!(config.receipt_timeout, Duration::from_secs(30));
        assert_eq!(config.receipt_poll_interval, Duration::from_millis(250));
        assert_eq!(config.rpc_url, "https://rpc.example");
    }

    #[test]
    fn test_invalid_number() {
        let result = Config::from_lookup(lookup_from(&[(env_vars::CHAIN_ID, "mainnet")]));
        assert!(matches!(result, Err(CartError::Config(_))));
    }
}
