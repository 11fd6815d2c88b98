// src/rpc.rs
use alloy::primitives::{Address, B256, U256};
use eyre::{eyre, Result};
use reqwest::{Client, StatusCode};
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, warn};

use crate::units::parse_quantity;

const MAX_ATTEMPTS: u32 = 3;

#[derive(Debug, Deserialize, Clone)]
pub struct Log {
    #[allow(dead_code)]
    pub address: String,
    pub topics: Vec<String>,
    pub data: String,

    #[serde(rename = "blockNumber")]
    pub block_number_hex: String,

    /// Not every node returns this; fall back to `eth_getBlockByNumber`.
    #[serde(rename = "blockTimestamp", default)]
    pub block_timestamp_hex: Option<String>,

    #[serde(rename = "transactionHash")]
    pub tx_hash: String,

    #[serde(rename = "logIndex")]
    pub log_index_hex: String,
}

#[derive(Debug, Deserialize)]
struct RpcError {
    code: i64,
    message: String,
}

// `Error` first: a missing `result` would otherwise deserialize as `None`
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RpcResponse<T> {
    Error { error: RpcError },
    Success { result: T },
}

#[derive(Debug, Deserialize)]
struct BlockHeader {
    timestamp: String,
}

fn http_client(timeout_secs: u64) -> Result<Client> {
    Ok(Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()?)
}

/// Send one JSON-RPC request, retrying transport failures.
async fn call<T: DeserializeOwned>(rpc_url: &str, method: &str, params: Value) -> Result<T> {
    let client = http_client(15)?;
    let payload = json!({
        "jsonrpc": "2.0",
        "id": 1,
        "method": method,
        "params": params,
    });

    for attempt in 1..=MAX_ATTEMPTS {
        debug!("Sending {} → {}", method, rpc_url);

        match client.post(rpc_url).json(&payload).send().await {
            Ok(resp) => {
                if resp.status() != StatusCode::OK {
                    return Err(eyre!("RPC error: HTTP {} for {}", resp.status(), method));
                }
                let text = resp.text().await?;
                debug!("Raw {} response: {}", method, text);

                return match serde_json::from_str::<RpcResponse<T>>(&text)? {
                    RpcResponse::Success { result } => Ok(result),
                    RpcResponse::Error { error } => Err(eyre!(
                        "{} failed: {} (code {})",
                        method,
                        error.message,
                        error.code
                    )),
                };
            }
            Err(e) if attempt < MAX_ATTEMPTS => {
                warn!(
                    "RPC request {} failed (attempt {}): {}. Retrying...",
                    method, attempt, e
                );
                tokio::time::sleep(Duration::from_secs(2)).await;
            }
            Err(e) => {
                return Err(eyre!(
                    "RPC request {} failed after {} attempts: {}",
                    method,
                    MAX_ATTEMPTS,
                    e
                ))
            }
        }
    }

    Err(eyre!("Unreachable: retries exhausted"))
}

fn quantity(method: &str, raw: &str) -> Result<U256> {
    parse_quantity(raw).ok_or_else(|| eyre!("{} returned a bad quantity: {:?}", method, raw))
}

fn quantity_u64(method: &str, raw: &str) -> Result<u64> {
    u64::try_from(quantity(method, raw)?)
        .map_err(|_| eyre!("{} returned an out-of-range quantity: {}", method, raw))
}

/// Latest block number
pub async fn get_block_number(rpc_url: &str) -> Result<u64> {
    let raw: String = call(rpc_url, "eth_blockNumber", json!([])).await?;
    quantity_u64("eth_blockNumber", &raw)
}

/// Unix timestamp of a block
pub async fn get_block_timestamp(rpc_url: &str, block_number: u64) -> Result<u64> {
    let header: Option<BlockHeader> = call(
        rpc_url,
        "eth_getBlockByNumber",
        json!([format!("0x{:x}", block_number), false]),
    )
    .await?;
    let header = header.ok_or_else(|| eyre!("Block {} not found", block_number))?;
    quantity_u64("eth_getBlockByNumber", &header.timestamp)
}

/// Logs emitted by `contract` whose topic0 is any of `topics`
pub async fn get_event_logs(
    rpc_url: &str,
    contract: &Address,
    topics: &[B256],
    from_block: u64,
    to_block: u64,
) -> Result<Vec<Log>> {
    debug!(
        "eth_getLogs range {} → {} for {} ({} topics)",
        from_block,
        to_block,
        contract,
        topics.len()
    );

    call(
        rpc_url,
        "eth_getLogs",
        json!([{
            "fromBlock": format!("0x{:x}", from_block),
            "toBlock": format!("0x{:x}", to_block),
            "address": contract.to_string(),
            "topics": [topics.iter().map(|t| t.to_string()).collect::<Vec<_>>()]
        }]),
    )
    .await
}

pub async fn get_balance(rpc_url: &str, address: &Address) -> Result<U256> {
    let raw: String = call(
        rpc_url,
        "eth_getBalance",
        json!([address.to_string(), "latest"]),
    )
    .await?;
    quantity("eth_getBalance", &raw)
}

pub async fn get_transaction_count(rpc_url: &str, address: &Address) -> Result<u64> {
    let raw: String = call(
        rpc_url,
        "eth_getTransactionCount",
        json!([address.to_string(), "latest"]),
    )
    .await?;
    quantity_u64("eth_getTransactionCount", &raw)
}

/// Deployed bytecode at `address` (`"0x"` for accounts without code)
pub async fn get_code(rpc_url: &str, address: &Address) -> Result<String> {
    call(rpc_url, "eth_getCode", json!([address.to_string(), "latest"])).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_success_and_error_envelopes() {
        let ok: RpcResponse<String> =
            serde_json::from_str(r#"{"jsonrpc":"2.0","id":1,"result":"0x89b1fd"}"#).unwrap();
        assert!(matches!(ok, RpcResponse::Success { result } if result == "0x89b1fd"));

        let err: RpcResponse<Option<BlockHeader>> = serde_json::from_str(
            r#"{"jsonrpc":"2.0","id":1,"error":{"code":-32000,"message":"header not found"}}"#,
        )
        .unwrap();
        match err {
            RpcResponse::Error { error } => {
                assert_eq!(error.code, -32000);
                assert_eq!(error.message, "header not found");
            }
            RpcResponse::Success { .. } => panic!("error envelope parsed as success"),
        }

        let missing: RpcResponse<Option<BlockHeader>> =
            serde_json::from_str(r#"{"jsonrpc":"2.0","id":1,"result":null}"#).unwrap();
        assert!(matches!(missing, RpcResponse::Success { result: None }));
    }

    #[test]
    fn log_timestamp_is_optional() {
        let log: Log = serde_json::from_str(
            r#"{
                "address": "0xb8c77482e45f1f44de1745f52c74426c631bdd52",
                "topics": [],
                "data": "0x",
                "blockNumber": "0x10",
                "transactionHash": "0x00",
                "logIndex": "0x0"
            }"#,
        )
        .unwrap();
        assert!(log.block_timestamp_hex.is_none());
    }

    #[test]
    fn quantities() {
        assert_eq!(quantity_u64("m", "0x89b1fd").unwrap(), 9023997);
        assert!(quantity_u64("m", "0xzz").is_err());
        let too_big = format!("0x1{}", "0".repeat(20));
        assert!(quantity_u64("m", &too_big).is_err());
    }
}
