// src/models.rs
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::decoder::DecodeResult;

/// Indexed `Transfer(from, to, value)` event
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Transfer {
    pub id: String,
    pub from: String,
    pub to: String,
    pub value: String, // raw token units, decimal string
    pub block_number: i64,
    pub block_timestamp: i64,
    pub transaction_hash: String,
}

/// Indexed `Burn`, `Freeze` or `Unfreeze` event; all three share one shape
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccountEvent {
    pub id: String,
    pub from: String,
    pub value: String,
    pub block_number: i64,
    pub block_timestamp: i64,
    pub transaction_hash: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountEventKind {
    Burn,
    Freeze,
    Unfreeze,
}

impl AccountEventKind {
    pub const ALL: [AccountEventKind; 3] = [Self::Burn, Self::Freeze, Self::Unfreeze];

    pub fn table(self) -> &'static str {
        match self {
            Self::Burn => "burns",
            Self::Freeze => "freezes",
            Self::Unfreeze => "unfreezes",
        }
    }
}

/// Per-address aggregates, ether-scaled
#[derive(Debug, Clone, Serialize)]
pub struct HolderStats {
    pub address: String,
    pub frozen: Decimal,
    pub burned: Decimal,
    pub last_block: i64,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct WalletData {
    pub address: String,
    pub balance: String,
    pub formatted_balance: String,
    pub network: String,
    pub transaction_count: u64,
    pub is_contract: bool,
    pub explorer_url: String,
}

/// A transaction as listed by the block explorer
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransactionRecord {
    pub hash: String,
    pub from: String,
    pub to: Option<String>,
    pub value: String,
    pub formatted_value: String,
    pub gas_price: String,
    pub gas_used: String,
    pub block_number: u64,
    pub timestamp: i64,
    pub status: u8,
    pub data: String,
}

/// A transaction with its input decoded for display
#[derive(Debug, Clone, Serialize)]
pub struct DecodedTransaction {
    #[serde(flatten)]
    pub transaction: TransactionRecord,
    pub gas_price_gwei: String,
    pub summary: String,
    pub decoded: DecodeResult,
    pub explorer_url: String,
}
