use alloy::primitives::Address;
use dotenvy::dotenv;
use eyre::{eyre, Result};
use std::{collections::HashSet, env, str::FromStr};
use tracing::{info, warn};

use crate::networks::{self, Network};

const DEFAULT_SUBGRAPH_URL: &str = "https://api.studio.thegraph.com/query/119163/my-first/v0.0.3";

#[derive(Debug, Clone)]
pub struct Config {
    pub network: &'static Network,
    pub rpc_http_url: String,
    pub explorer_api_key: String,
    pub subgraph_url: String,
    pub db_path: String,
    pub confirmations: u64,
    pub backfill_blocks: u64,
    pub lookback_blocks: u64,
    pub token_set: HashSet<Address>,
    pub port: u16,
    pub demo_fallback: bool,
}

pub fn load() -> Result<Config> {
    dotenv().ok();

    let cfg = from_lookup(|key| env::var(key).ok())?;
    // explorer key stays out of the logs
    info!(
        "Loaded config: network={}, db={}, port={}, tokens={}",
        cfg.network.key,
        cfg.db_path,
        cfg.port,
        cfg.token_set.len()
    );
    Ok(cfg)
}

fn parsed_or<T: FromStr>(get: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T {
    match get(key) {
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!("Ignoring invalid {}={:?}", key, raw);
            default
        }),
        None => default,
    }
}

/// Build the config from any key → value source (process env in production).
pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Config> {
    let network_key = get("NETWORK").unwrap_or_else(|| networks::DEFAULT_NETWORK.to_string());
    let network = networks::find(&network_key)
        .ok_or_else(|| eyre!("Unknown NETWORK {:?}", network_key))?;

    // explicit RPC URL wins over the network default
    let rpc_http_url = get("RPC_HTTP_URL")
        .or_else(|| get("RPC_URL"))
        .unwrap_or_else(|| network.rpc_url.to_string());

    let explorer_api_key = get("EXPLORER_API_KEY")
        .or_else(|| get("ETHERSCAN_API_KEY"))
        .unwrap_or_default();

    let subgraph_url = get("SUBGRAPH_URL").unwrap_or_else(|| DEFAULT_SUBGRAPH_URL.to_string());

    let db_path = get("DATABASE_URL").unwrap_or_else(|| "bnb_scope.db".to_string());

    let token_set: HashSet<Address> = get("TOKEN_ADDRESSES")
        .or_else(|| get("BNB_TOKEN"))
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .filter_map(|s| match s.parse::<Address>() {
            Ok(addr) => Some(addr),
            Err(_) => {
                warn!("Skipping invalid token address {:?}", s);
                None
            }
        })
        .collect();

    Ok(Config {
        network,
        rpc_http_url,
        explorer_api_key,
        subgraph_url,
        db_path,
        confirmations: parsed_or(&get, "CONFIRMATIONS", 2),
        backfill_blocks: parsed_or(&get, "BACKFILL_BLOCKS", 5000),
        lookback_blocks: parsed_or(&get, "LOOKBACK_BLOCKS", 100),
        token_set,
        port: parsed_or(&get, "PORT", 8080),
        demo_fallback: parsed_or(&get, "EXPLORER_DEMO_FALLBACK", false),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults() {
        let cfg = config_from(&[]).unwrap();
        assert_eq!(cfg.network.key, "sepolia");
        assert_eq!(cfg.rpc_http_url, cfg.network.rpc_url);
        assert_eq!(cfg.subgraph_url, DEFAULT_SUBGRAPH_URL);
        assert_eq!(cfg.db_path, "bnb_scope.db");
        assert_eq!(cfg.confirmations, 2);
        assert_eq!(cfg.backfill_blocks, 5000);
        assert_eq!(cfg.lookback_blocks, 100);
        assert_eq!(cfg.port, 8080);
        assert!(cfg.token_set.is_empty());
        assert!(!cfg.demo_fallback);
    }

    #[test]
    fn overrides_and_aliases() {
        let cfg = config_from(&[
            ("NETWORK", "bscTestnet"),
            ("RPC_URL", "http://localhost:8545"),
            ("PORT", "9090"),
            ("CONFIRMATIONS", "12"),
            ("EXPLORER_DEMO_FALLBACK", "true"),
            (
                "BNB_TOKEN",
                "0xB8c77482e45F1F44dE1745F52C74426C631bDD52, not-an-address,",
            ),
        ])
        .unwrap();
        assert_eq!(cfg.network.chain_id, 97);
        assert_eq!(cfg.rpc_http_url, "http://localhost:8545");
        assert_eq!(cfg.port, 9090);
        assert_eq!(cfg.confirmations, 12);
        assert!(cfg.demo_fallback);
        assert_eq!(cfg.token_set.len(), 1);
    }

    #[test]
    fn invalid_numbers_fall_back_to_defaults() {
        let cfg = config_from(&[("PORT", "eighty"), ("LOOKBACK_BLOCKS", "-1")]).unwrap();
        assert_eq!(cfg.port, 8080);
        assert_eq!(cfg.lookback_blocks, 100);
    }

    #[test]
    fn unknown_network_is_an_error() {
        assert!(config_from(&[("NETWORK", "atlantis")]).is_err());
    }
}
