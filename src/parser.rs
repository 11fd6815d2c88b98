// src/parser.rs
use alloy::primitives::{keccak256, Address, B256, U256};
use std::str::FromStr;

use crate::rpc::Log;
use crate::units::parse_quantity;

pub const TRANSFER_EVENT: &str = "Transfer(address,address,uint256)";
pub const BURN_EVENT: &str = "Burn(address,uint256)";
pub const FREEZE_EVENT: &str = "Freeze(address,uint256)";
pub const UNFREEZE_EVENT: &str = "Unfreeze(address,uint256)";

/// topic0 for an event signature
pub fn event_topic(signature: &str) -> B256 {
    keccak256(signature.as_bytes())
}

/// topic0 of every event the BNB contract emits that we index
pub fn tracked_topics() -> Vec<B256> {
    [TRANSFER_EVENT, BURN_EVENT, FREEZE_EVENT, UNFREEZE_EVENT]
        .into_iter()
        .map(event_topic)
        .collect()
}

/// Where and when an event was emitted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventMeta {
    pub tx_hash: B256,
    pub log_index: u32,
    pub block_number: u64,
    pub block_timestamp: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BnbEvent {
    Transfer { from: Address, to: Address, value: U256 },
    Burn { from: Address, value: U256 },
    Freeze { from: Address, value: U256 },
    Unfreeze { from: Address, value: U256 },
}

impl BnbEvent {
    /// Account whose frozen/burned balance the event changes. Transfers touch none.
    pub fn holder(&self) -> Option<&Address> {
        match self {
            BnbEvent::Transfer { .. } => None,
            BnbEvent::Burn { from, .. }
            | BnbEvent::Freeze { from, .. }
            | BnbEvent::Unfreeze { from, .. } => Some(from),
        }
    }
}

/// A decoded log together with its position on chain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedLog {
    pub event: BnbEvent,
    pub meta: EventMeta,
}

fn topic_to_address(topic: &str) -> Option<Address> {
    // indexed addresses are left-padded to 32 bytes; the address is the last 20
    let bytes = hex::decode(topic.trim_start_matches("0x")).ok()?;
    if bytes.len() != 32 {
        return None;
    }
    Some(Address::from_slice(&bytes[12..32]))
}

fn parse_u64(hex_quantity: &str) -> Option<u64> {
    u64::from_str_radix(hex_quantity.trim_start_matches("0x"), 16).ok()
}

/// Decode a single log. `block_timestamp` is used when the node did not
/// include one in the log itself.
pub fn decode_event(log: &Log, block_timestamp: u64) -> Option<DecodedLog> {
    let topic0 = B256::from_str(log.topics.first()?).ok()?;
    let value = parse_quantity(&log.data)?;
    let from = topic_to_address(log.topics.get(1)?)?;

    let event = if topic0 == event_topic(TRANSFER_EVENT) {
        BnbEvent::Transfer {
            from,
            to: topic_to_address(log.topics.get(2)?)?,
            value,
        }
    } else if topic0 == event_topic(BURN_EVENT) {
        BnbEvent::Burn { from, value }
    } else if topic0 == event_topic(FREEZE_EVENT) {
        BnbEvent::Freeze { from, value }
    } else if topic0 == event_topic(UNFREEZE_EVENT) {
        BnbEvent::Unfreeze { from, value }
    } else {
        return None;
    };

    let block_timestamp = log
        .block_timestamp_hex
        .as_deref()
        .and_then(parse_u64)
        .unwrap_or(block_timestamp);

    Some(DecodedLog {
        event,
        meta: EventMeta {
            tx_hash: B256::from_str(&log.tx_hash).ok()?,
            log_index: u32::try_from(parse_u64(&log.log_index_hex)?).ok()?,
            block_number: parse_u64(&log.block_number_hex)?,
            block_timestamp,
        },
    })
}

/// Block number of a raw log, if it parses.
pub fn log_block_number(log: &Log) -> Option<u64> {
    parse_u64(&log.block_number_hex)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub const HOLDER: &str = "742d35cc6634c0532925a3b8d34e8a9a7dc6c0da";
    pub const OTHER: &str = "8ba1f109551bd432803012645aac136c89fba4be";
    pub const TX: &str = "0x2d4b2cbb31bbe1db5165e9a1c16f28fa39a859bfedc545a4c4063172b72ca078";

    pub fn padded(address: &str) -> String {
        format!("0x{:0>64}", address)
    }

    pub fn log(signature: &str, indexed: &[&str], value: u64) -> Log {
        let mut topics = vec![event_topic(signature).to_string()];
        topics.extend(indexed.iter().map(|a| padded(a)));
        Log {
            address: "0xb8c77482e45f1f44de1745f52c74426c631bdd52".into(),
            topics,
            data: format!("0x{:064x}", value),
            block_number_hex: "0x89b1fd".into(),
            block_timestamp_hex: None,
            tx_hash: TX.into(),
            log_index_hex: "0x3".into(),
        }
    }

    #[test]
    fn known_topic_hashes() {
        assert_eq!(
            event_topic(TRANSFER_EVENT).to_string(),
            "0xddf252ad1be2c89b69c2b068fc378daa952ba7f163c4a11628f55a4df523b3ef"
        );
        assert_eq!(tracked_topics().len(), 4);
    }

    #[test]
    fn decodes_transfer() {
        let raw = log(TRANSFER_EVENT, &[HOLDER, OTHER], 1_000);
        let decoded = decode_event(&raw, 1_755_455_364).unwrap();
        assert_eq!(
            decoded.event,
            BnbEvent::Transfer {
                from: HOLDER.parse().unwrap(),
                to: OTHER.parse().unwrap(),
                value: U256::from(1_000u64),
            }
        );
        assert_eq!(decoded.meta.block_number, 9023997);
        assert_eq!(decoded.meta.log_index, 3);
        assert_eq!(decoded.meta.block_timestamp, 1_755_455_364);
        assert_eq!(decoded.meta.tx_hash.to_string(), TX);
    }

    #[test]
    fn decodes_burn_freeze_unfreeze() {
        let from: Address = HOLDER.parse().unwrap();
        let value = U256::from(7u64);
        assert_eq!(
            decode_event(&log(BURN_EVENT, &[HOLDER], 7), 0).unwrap().event,
            BnbEvent::Burn { from, value }
        );
        assert_eq!(
            decode_event(&log(FREEZE_EVENT, &[HOLDER], 7), 0).unwrap().event,
            BnbEvent::Freeze { from, value }
        );
        assert_eq!(
            decode_event(&log(UNFREEZE_EVENT, &[HOLDER], 7), 0).unwrap().event,
            BnbEvent::Unfreeze { from, value }
        );
    }

    #[test]
    fn holder_is_set_for_account_events_only() {
        let from: Address = HOLDER.parse().unwrap();
        let burn = decode_event(&log(BURN_EVENT, &[HOLDER], 1), 0).unwrap();
        assert_eq!(burn.event.holder(), Some(&from));
        let transfer = decode_event(&log(TRANSFER_EVENT, &[HOLDER, OTHER], 1), 0).unwrap();
        assert_eq!(transfer.event.holder(), None);
    }

    #[test]
    fn prefers_timestamp_from_log() {
        let mut raw = log(BURN_EVENT, &[HOLDER], 1);
        raw.block_timestamp_hex = Some("0x10".into());
        assert_eq!(decode_event(&raw, 99).unwrap().meta.block_timestamp, 16);
    }

    #[test]
    fn rejects_unknown_or_malformed_logs() {
        let approval = log("Approval(address,address,uint256)", &[HOLDER, OTHER], 1);
        assert!(decode_event(&approval, 0).is_none());
        // transfer without the `to` topic
        assert!(decode_event(&log(TRANSFER_EVENT, &[HOLDER], 1), 0).is_none());
        let mut raw = log(BURN_EVENT, &[HOLDER], 1);
        raw.topics[1] = "0x1234".into();
        assert!(decode_event(&raw, 0).is_none());
    }
}
