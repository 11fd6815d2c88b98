// src/mapping.rs
//! Contract event → entity handlers. Each handler copies the event fields
//! into a row keyed by transaction hash + log index and saves it.

use alloy::primitives::{Address, B256, U256};
use eyre::Result;
use rusqlite::Connection;

use crate::db;
use crate::models::{AccountEvent, AccountEventKind, Transfer};
use crate::parser::{BnbEvent, DecodedLog, EventMeta};

/// Transaction hash bytes followed by the little-endian `i32` log index.
pub fn entity_id(tx_hash: &B256, log_index: u32) -> String {
    let mut bytes = tx_hash.to_vec();
    bytes.extend_from_slice(&(log_index as i32).to_le_bytes());
    format!("0x{}", hex::encode(bytes))
}

/// Lowercase `0x` form used for every stored address.
pub fn address_hex(address: &Address) -> String {
    format!("0x{}", hex::encode(address.as_slice()))
}

fn account_event(from: &Address, value: &U256, meta: &EventMeta) -> AccountEvent {
    AccountEvent {
        id: entity_id(&meta.tx_hash, meta.log_index),
        from: address_hex(from),
        value: value.to_string(),
        block_number: meta.block_number as i64,
        block_timestamp: meta.block_timestamp as i64,
        transaction_hash: meta.tx_hash.to_string(),
    }
}

pub fn handle_transfer(
    conn: &Connection,
    from: &Address,
    to: &Address,
    value: &U256,
    meta: &EventMeta,
) -> Result<()> {
    let entity = Transfer {
        id: entity_id(&meta.tx_hash, meta.log_index),
        from: address_hex(from),
        to: address_hex(to),
        value: value.to_string(),
        block_number: meta.block_number as i64,
        block_timestamp: meta.block_timestamp as i64,
        transaction_hash: meta.tx_hash.to_string(),
    };
    db::save_transfer(conn, &entity)
}

pub fn handle_burn(
    conn: &Connection,
    from: &Address,
    value: &U256,
    meta: &EventMeta,
) -> Result<()> {
    db::save_account_event(conn, AccountEventKind::Burn, &account_event(from, value, meta))
}

pub fn handle_freeze(
    conn: &Connection,
    from: &Address,
    value: &U256,
    meta: &EventMeta,
) -> Result<()> {
    db::save_account_event(conn, AccountEventKind::Freeze, &account_event(from, value, meta))
}

pub fn handle_unfreeze(
    conn: &Connection,
    from: &Address,
    value: &U256,
    meta: &EventMeta,
) -> Result<()> {
    db::save_account_event(conn, AccountEventKind::Unfreeze, &account_event(from, value, meta))
}

/// Route a decoded log to its handler.
pub fn handle(conn: &Connection, log: &DecodedLog) -> Result<()> {
    match &log.event {
        BnbEvent::Transfer { from, to, value } => handle_transfer(conn, from, to, value, &log.meta),
        BnbEvent::Burn { from, value } => handle_burn(conn, from, value, &log.meta),
        BnbEvent::Freeze { from, value } => handle_freeze(conn, from, value, &log.meta),
        BnbEvent::Unfreeze { from, value } => handle_unfreeze(conn, from, value, &log.meta),
    }
}
