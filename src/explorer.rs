// src/explorer.rs
use alloy::primitives::{Address, U256};
use chrono::Utc;
use eyre::{eyre, Result};
use futures_util::future::try_join;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use std::{str::FromStr, time::Duration};
use tracing::{info, warn};

use crate::config::Config;
use crate::decoder;
use crate::models::{DecodedTransaction, TransactionRecord, WalletData};
use crate::networks::Network;
use crate::rpc;
use crate::units::{format_ether, format_ether_str, format_gwei};

/// Address the demo transactions belong to
pub const DEMO_ADDRESS: &str = "0x742d35cc6634c0532925a3b8d34e8a9a7dc6c0da";

#[derive(Debug, Deserialize)]
struct ExplorerResponse {
    status: String,
    #[serde(default)]
    message: String,
    /// an array on success, an error string otherwise
    result: Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExplorerTx {
    hash: String,
    from: String,
    #[serde(default)]
    to: String,
    value: String,
    gas_price: String,
    gas_used: String,
    block_number: String,
    time_stamp: String,
    #[serde(default)]
    input: String,
    #[serde(rename = "txreceipt_status", default)]
    receipt_status: String,
}

impl From<ExplorerTx> for TransactionRecord {
    fn from(tx: ExplorerTx) -> Self {
        TransactionRecord {
            formatted_value: format_ether_str(&tx.value),
            hash: tx.hash,
            from: tx.from,
            to: (!tx.to.is_empty()).then_some(tx.to),
            value: tx.value,
            gas_price: tx.gas_price,
            gas_used: tx.gas_used,
            block_number: tx.block_number.parse().unwrap_or(0),
            timestamp: tx.time_stamp.parse().unwrap_or(0),
            status: tx.receipt_status.parse().unwrap_or(1),
            data: if tx.input.is_empty() {
                "0x".to_string()
            } else {
                tx.input
            },
        }
    }
}

pub fn parse_address(address: &str) -> Result<Address> {
    Address::from_str(address.trim()).map_err(|_| eyre!("Invalid wallet address {:?}", address))
}

/// `Some(records)` for a `status == "1"` payload, newest first.
fn parse_txlist(resp: ExplorerResponse) -> Result<Option<Vec<TransactionRecord>>> {
    if resp.status != "1" {
        info!("Explorer returned status {}: {}", resp.status, resp.message);
        return Ok(None);
    }
    let txs: Vec<ExplorerTx> = serde_json::from_value(resp.result)?;
    let mut records: Vec<TransactionRecord> = txs.into_iter().map(Into::into).collect();
    records.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    Ok(Some(records))
}

async fn fetch_txlist(cfg: &Config, address: &Address, limit: u32) -> Result<ExplorerResponse> {
    let client = Client::builder().timeout(Duration::from_secs(15)).build()?;
    let address = address.to_string();
    let offset = limit.to_string();
    let resp = client
        .get(cfg.network.explorer_api)
        .query(&[
            ("module", "account"),
            ("action", "txlist"),
            ("address", address.as_str()),
            ("startblock", "0"),
            ("endblock", "99999999"),
            ("page", "1"),
            ("offset", offset.as_str()),
            ("sort", "desc"),
            ("apikey", cfg.explorer_api_key.as_str()),
        ])
        .send()
        .await?
        .error_for_status()?;
    Ok(resp.json().await?)
}

/// Most recent transactions of `address` according to the block explorer.
pub async fn recent_transactions(
    cfg: &Config,
    address: &str,
    limit: u32,
) -> Result<Vec<TransactionRecord>> {
    let parsed = parse_address(address)?;
    info!("Fetching transactions for {} via {}", parsed, cfg.network.explorer_api);

    match fetch_txlist(cfg, &parsed, limit).await.and_then(parse_txlist) {
        Ok(Some(records)) => {
            info!("Explorer returned {} transactions", records.len());
            Ok(records)
        }
        Ok(None) if cfg.demo_fallback && address.eq_ignore_ascii_case(DEMO_ADDRESS) => {
            Ok(demo_transactions())
        }
        Ok(None) => Ok(Vec::new()),
        Err(e) if cfg.demo_fallback => {
            warn!("Explorer request failed, serving demo data: {:?}", e);
            Ok(demo_transactions())
        }
        Err(e) => Err(e),
    }
}

/// Balance, nonce and contract flag for `address`.
pub async fn wallet_data(cfg: &Config, address: &str) -> Result<WalletData> {
    let parsed = parse_address(address)?;

    let (balance, transaction_count) = try_join(
        rpc::get_balance(&cfg.rpc_http_url, &parsed),
        rpc::get_transaction_count(&cfg.rpc_http_url, &parsed),
    )
    .await
    .map_err(|e| eyre!("Failed to fetch wallet data: {}", e))?;

    Ok(WalletData {
        address: parsed.to_string(),
        balance: balance.to_string(),
        formatted_balance: format_ether(balance),
        network: cfg.network.name.to_string(),
        transaction_count,
        is_contract: is_contract(cfg, &parsed).await,
        explorer_url: cfg.network.address_url(&parsed.to_string()),
    })
}

/// Whether code is deployed at `address`; RPC failures count as "no".
pub async fn is_contract(cfg: &Config, address: &Address) -> bool {
    match rpc::get_code(&cfg.rpc_http_url, address).await {
        Ok(code) => code != "0x",
        Err(e) => {
            warn!("eth_getCode failed for {}: {:?}", address, e);
            false
        }
    }
}

/// Attach the decoded input and display helpers to a transaction.
pub fn decorate(network: &Network, transaction: TransactionRecord) -> DecodedTransaction {
    let decoded = decoder::decode(&transaction.data);
    DecodedTransaction {
        gas_price_gwei: U256::from_str(&transaction.gas_price)
            .map(format_gwei)
            .unwrap_or_default(),
        summary: decoded.summary(),
        decoded,
        explorer_url: network.tx_url(&transaction.hash),
        transaction,
    }
}

/// Fixed sample transactions for offline use.
pub fn demo_transactions() -> Vec<TransactionRecord> {
    let now = Utc::now().timestamp();
    let tx = |hash: &str,
              from: &str,
              to: &str,
              value: &str,
              gas_price: &str,
              gas_used: &str,
              block_number: u64,
              age: i64,
              data: &str| TransactionRecord {
        hash: hash.into(),
        from: from.into(),
        to: Some(to.into()),
        value: value.into(),
        formatted_value: format_ether_str(value),
        gas_price: gas_price.into(),
        gas_used: gas_used.into(),
        block_number,
        timestamp: now - age,
        status: 1,
        data: data.into(),
    };

    vec![
        tx(
            "0x08ef8242125b307f49a2e55280ee4204cdbc20badffa5f234bfad518af429c21",
            "0x742d35Cc6634C0532925a3b8D34e8a9A7Dc6C0dA",
            "0xB4FBF271143F4FBf7B91A5ded31805e42b2208d6",
            "1000000000000000000",
            "20000000000",
            "21000",
            9023997,
            3600,
            "0x",
        ),
        tx(
            "0x2d4b2cbb31bbe1db5165e9a1c16f28fa39a859bfedc545a4c4063172b72ca078",
            "0x8ba1f109551bD432803012645aac136c89FBa4BE",
            "0x742d35Cc6634C0532925a3b8D34e8a9A7Dc6C0dA",
            "500000000000000000",
            "25000000000",
            "51000",
            9023996,
            7200,
            "0xa9059cbb000000000000000000000000742d35cc6634c0532925a3b8d34e8a9a7dc6c0da0000000000000000000000000000000000000000000000000de0b6b3a7640000",
        ),
        tx(
            "0xf58b2d0b2438187fcb3e568d3f28ec2e82038333cf23085a0f04f6e4b9595f7f",
            "0x742d35Cc6634C0532925a3b8D34e8a9A7Dc6C0dA",
            "0x1f9840a85d5aF5bf1D1762F925BDADdC4201F984",
            "0",
            "30000000000",
            "45000",
            9023995,
            10800,
            "0xa9059cbb0000000000000000000000008ba1f109551bd432803012645aac136c89fba4be0000000000000000000000000000000000000000000000001bc16d674ec80000",
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::DecodeResult;
    use crate::networks;

    fn response(body: &str) -> ExplorerResponse {
        serde_json::from_str(body).unwrap()
    }

    #[test]
    fn maps_txlist_rows() {
        let records = parse_txlist(response(
            r#"{
                "status": "1",
                "message": "OK",
                "result": [
                    {
                        "blockNumber": "100", "timeStamp": "1755455300",
                        "hash": "0xaa", "from": "0x01", "to": "",
                        "value": "0", "gasPrice": "1", "gasUsed": "21000",
                        "input": "", "txreceipt_status": ""
                    },
                    {
                        "blockNumber": "101", "timeStamp": "1755455364",
                        "hash": "0xbb", "from": "0x01", "to": "0x02",
                        "value": "500000000000000000", "gasPrice": "20000000000",
                        "gasUsed": "51000", "input": "0xa9059cbb", "txreceipt_status": "0"
                    }
                ]
            }"#,
        ))
        .unwrap()
        .unwrap();

        // newest first
        assert_eq!(records[0].hash, "0xbb");
        assert_eq!(records[0].formatted_value, "0.5");
        assert_eq!(records[0].status, 0);
        assert_eq!(records[0].to.as_deref(), Some("0x02"));

        assert_eq!(records[1].to, None);
        assert_eq!(records[1].data, "0x");
        assert_eq!(records[1].status, 1);
        assert_eq!(records[1].block_number, 100);
    }

    #[test]
    fn non_ok_status_is_no_data() {
        let parsed = parse_txlist(response(
            r#"{"status":"0","message":"NOTOK","result":"Max rate limit reached"}"#,
        ))
        .unwrap();
        assert!(parsed.is_none());
    }

    #[test]
    fn demo_data_decodes() {
        let network = networks::find("sepolia").unwrap();
        let decorated: Vec<_> = demo_transactions()
            .into_iter()
            .map(|tx| decorate(network, tx))
            .collect();

        assert_eq!(decorated.len(), 3);
        assert_eq!(decorated[0].decoded, DecodeResult::EmptyTransfer);
        assert_eq!(decorated[0].gas_price_gwei, "20.0");
        assert_eq!(decorated[1].summary, "contract call: transfer(address,uint256)");
        assert!(decorated[2].explorer_url.ends_with(&decorated[2].transaction.hash));
        let involves_demo = |address: &str| address.eq_ignore_ascii_case(DEMO_ADDRESS);
        assert!(decorated.iter().all(|d| involves_demo(&d.transaction.from)
            || d.transaction.to.as_deref().is_some_and(involves_demo)));
    }

    #[test]
    fn rejects_bad_addresses() {
        assert!(parse_address("0x1234").is_err());
        assert!(parse_address(DEMO_ADDRESS).is_ok());
    }
}
