use alloy::primitives::{Address, B256};
use eyre::{eyre, Result, WrapErr};
use rusqlite::Connection;
use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex};
use tokio::task;
use tokio::time::{sleep, Duration};
use tracing::{debug, info, warn};

use crate::{aggregator, config::Config, mapping, parser, rpc};
use crate::parser::DecodedLog;

const BASE_RETRY_SECS: u64 = 10;
const MAX_RETRY_SECS: u64 = 120;

/// Inclusive `[from, to]` block windows of at most `step` blocks.
fn windows(from: u64, to: u64, step: u64) -> Vec<(u64, u64)> {
    let step = step.max(1);
    let mut out = Vec::new();
    let mut lo = from;
    while lo <= to {
        let hi = lo.saturating_add(step - 1).min(to);
        out.push((lo, hi));
        if hi == u64::MAX {
            break;
        }
        lo = hi + 1;
    }
    out
}

fn backoff(delay: u64) -> u64 {
    (delay * 2).min(MAX_RETRY_SECS)
}

/// Timestamps for the blocks whose logs did not carry one.
async fn block_timestamps(rpc_url: &str, logs: &[rpc::Log]) -> Result<HashMap<u64, u64>> {
    let blocks: BTreeSet<u64> = logs
        .iter()
        .filter(|log| log.block_timestamp_hex.is_none())
        .filter_map(parser::log_block_number)
        .collect();

    let mut timestamps = HashMap::new();
    for block in blocks {
        let ts = rpc::get_block_timestamp(rpc_url, block)
            .await
            .wrap_err_with(|| format!("no timestamp for block {}", block))?;
        timestamps.insert(block, ts);
    }
    Ok(timestamps)
}

/// Decode a window of logs. Every log needs a timestamp, either its own or
/// one fetched for its block.
fn decode_logs(logs: &[rpc::Log], timestamps: &HashMap<u64, u64>) -> Result<Vec<DecodedLog>> {
    let mut events = Vec::with_capacity(logs.len());
    for log in logs {
        let Some(block) = parser::log_block_number(log) else {
            debug!("Skipping log without block number in tx {}", log.tx_hash);
            continue;
        };
        let fallback = match timestamps.get(&block) {
            Some(ts) => *ts,
            None if log.block_timestamp_hex.is_some() => 0,
            None => return Err(eyre!("missing timestamp for block {}", block)),
        };
        match parser::decode_event(log, fallback) {
            Some(event) => events.push(event),
            None => debug!("Skipping undecodable log in tx {}", log.tx_hash),
        }
    }
    Ok(events)
}

/// Write one batch and refresh the stats of the holders it touches, all in a
/// single transaction. Any failure rolls the whole batch back.
fn persist(conn: &Mutex<Connection>, events: &[DecodedLog]) -> Result<usize> {
    let mut db = conn.lock().map_err(|_| eyre!("database mutex poisoned"))?;

    let tx = db.transaction()?;
    for event in events {
        mapping::handle(&tx, event)
            .wrap_err_with(|| format!("insert failed for {:?}", event.meta))?;
    }

    let holders: BTreeSet<String> = events
        .iter()
        .filter_map(|e| e.event.holder())
        .map(mapping::address_hex)
        .collect();
    if !holders.is_empty() {
        let updated = aggregator::update_holder_stats(&tx, &holders)?;
        debug!("Refreshed {} holder(s)", updated);
    }

    tx.commit()?;
    Ok(events.len())
}

async fn index_window(
    cfg: &Config,
    conn: &Arc<Mutex<Connection>>,
    contract: &Address,
    topics: &[B256],
    from_block: u64,
    to_block: u64,
) -> Result<usize> {
    let rpc_url = &cfg.rpc_http_url;
    let logs = rpc::get_event_logs(rpc_url, contract, topics, from_block, to_block).await?;
    let timestamps = block_timestamps(rpc_url, &logs).await?;
    let events = decode_logs(&logs, &timestamps)?;

    let conn = Arc::clone(conn);
    task::spawn_blocking(move || persist(&conn, &events))
        .await
        .map_err(|e| eyre!("persist task failed: {}", e))?
}

/// Index `[from_block, to_block]` for every tracked contract.
/// Returns false if any window failed.
async fn scan(
    cfg: &Config,
    conn: &Arc<Mutex<Connection>>,
    topics: &[B256],
    from_block: u64,
    to_block: u64,
) -> bool {
    let rpc_pause = Duration::from_millis(200);
    let mut complete = true;

    for contract in &cfg.token_set {
        let mut processed = 0;
        for (lo, hi) in windows(from_block, to_block, cfg.lookback_blocks) {
            match index_window(cfg, conn, contract, topics, lo, hi).await {
                Ok(n) => processed += n,
                Err(e) => {
                    warn!("Fetch logs failed for {} ({} → {}): {:?}", contract, lo, hi, e);
                    complete = false;
                }
            }
            sleep(rpc_pause).await; // avoid hammering
        }
        info!(
            "Indexed {} → {} for {}: {} events",
            from_block, to_block, contract, processed
        );
    }

    complete
}

pub async fn run(cfg: Config, conn: Arc<Mutex<Connection>>) -> Result<()> {
    let topics = parser::tracked_topics();
    let mut retry_delay = BASE_RETRY_SECS;
    let mut next_block: Option<u64> = None;

    if cfg.token_set.is_empty() {
        warn!("No TOKEN_ADDRESSES configured, the indexer will stay idle");
    }
    info!(
        "Indexer started on {} (backfill {} blocks, lookback {} blocks)",
        cfg.network.name, cfg.backfill_blocks, cfg.lookback_blocks
    );

    loop {
        match rpc::get_block_number(&cfg.rpc_http_url).await {
            Ok(latest_block) => {
                retry_delay = BASE_RETRY_SECS;
                let target_block = latest_block.saturating_sub(cfg.confirmations);

                // first round backfills, later rounds continue where we stopped
                let from_block = match next_block {
                    Some(next) => next,
                    None => {
                        let start = target_block.saturating_sub(cfg.backfill_blocks);
                        info!("Backfill: scanning {} → {}", start, target_block);
                        start
                    }
                };

                if from_block <= target_block {
                    if scan(&cfg, &conn, &topics, from_block, target_block).await {
                        next_block = Some(target_block + 1);
                    } else {
                        retry_delay = backoff(retry_delay);
                    }
                } else {
                    debug!("No new blocks (latest {})", latest_block);
                }
            }
            Err(e) => {
                warn!("RPC failed this round: {:?}", e);
                retry_delay = backoff(retry_delay);
            }
        }

        sleep(Duration::from_secs(retry_delay)).await;
    }
}
