// src/networks.rs
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct Currency {
    pub name: &'static str,
    pub symbol: &'static str,
    pub decimals: u8,
}

/// Static description of a chain this service can talk to.
#[derive(Debug, Clone, Serialize)]
pub struct Network {
    pub key: &'static str,
    pub name: &'static str,
    pub chain_id: u64,
    pub rpc_url: &'static str,
    pub block_explorer: &'static str,
    /// Etherscan-compatible API endpoint
    pub explorer_api: &'static str,
    pub currency: Currency,
}

pub const DEFAULT_NETWORK: &str = "sepolia";

pub static NETWORKS: &[Network] = &[
    Network {
        key: "sepolia",
        name: "Sepolia",
        chain_id: 11155111,
        rpc_url: "https://ethereum-sepolia-rpc.publicnode.com",
        block_explorer: "https://sepolia.etherscan.io",
        explorer_api: "https://api-sepolia.etherscan.io/api",
        currency: Currency {
            name: "SepoliaETH",
            symbol: "ETH",
            decimals: 18,
        },
    },
    Network {
        key: "bsc-testnet",
        name: "BSC Testnet",
        chain_id: 97,
        rpc_url: "https://data-seed-prebsc-1-s1.bnbchain.org:8545",
        block_explorer: "https://testnet.bscscan.com",
        explorer_api: "https://api-testnet.bscscan.com/api",
        currency: Currency {
            name: "tBNB",
            symbol: "tBNB",
            decimals: 18,
        },
    },
    Network {
        key: "polygon-mumbai",
        name: "Polygon Mumbai",
        chain_id: 80001,
        rpc_url: "https://rpc-mumbai.maticvigil.com",
        block_explorer: "https://mumbai.polygonscan.com",
        explorer_api: "https://api-testnet.polygonscan.com/api",
        currency: Currency {
            name: "MATIC",
            symbol: "MATIC",
            decimals: 18,
        },
    },
];

/// Find a network by key. camelCase keys (`bscTestnet`) are accepted too.
pub fn find(key: &str) -> Option<&'static Network> {
    let wanted = normalize_key(key);
    NETWORKS.iter().find(|n| normalize_key(n.key) == wanted)
}

fn normalize_key(key: &str) -> String {
    key.trim()
        .chars()
        .filter(|c| *c != '-' && *c != '_')
        .flat_map(char::to_lowercase)
        .collect()
}

impl Network {
    pub fn tx_url(&self, tx_hash: &str) -> String {
        format!("{}/tx/{}", self.block_explorer, tx_hash)
    }

    pub fn address_url(&self, address: &str) -> String {
        format!("{}/address/{}", self.block_explorer, address)
    }
}
