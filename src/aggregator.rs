use alloy::primitives::U256;
use chrono::Utc;
use eyre::Result;
use rusqlite::Connection;
use rust_decimal::Decimal;
use std::collections::{BTreeSet, HashMap};
use std::str::FromStr;
use tracing::{debug, warn};

use crate::db;
use crate::models::{AccountEventKind, HolderStats};
use crate::units::format_ether;

#[derive(Debug, Default)]
struct Totals {
    frozen: U256,
    unfrozen: U256,
    burned: U256,
    last_block: i64,
}

fn to_decimal(wei: U256) -> Option<Decimal> {
    Decimal::from_str(&format_ether(wei)).ok()
}

/// Recompute frozen (freeze − unfreeze) and burned totals for `holders`.
///
/// Holders are the lowercase `0x` addresses the event handlers store.
pub fn update_holder_stats(conn: &Connection, holders: &BTreeSet<String>) -> Result<usize> {
    let mut totals: HashMap<String, Totals> = HashMap::new();

    for holder in holders {
        for kind in AccountEventKind::ALL {
            for (value, block) in db::account_event_values(conn, kind, holder)? {
                let Ok(value) = U256::from_str(&value) else {
                    warn!("Skipping unparseable {:?} value {:?} for {}", kind, value, holder);
                    continue;
                };

                let entry = totals.entry(holder.clone()).or_default();
                match kind {
                    AccountEventKind::Freeze => entry.frozen = entry.frozen.saturating_add(value),
                    AccountEventKind::Unfreeze => {
                        entry.unfrozen = entry.unfrozen.saturating_add(value)
                    }
                    AccountEventKind::Burn => entry.burned = entry.burned.saturating_add(value),
                }
                entry.last_block = entry.last_block.max(block);
            }
        }
    }

    let now = Utc::now();
    let mut updated = 0;
    for (address, t) in totals {
        let (Some(frozen), Some(burned)) = (
            to_decimal(t.frozen.saturating_sub(t.unfrozen)),
            to_decimal(t.burned),
        ) else {
            warn!("Holder totals for {} exceed decimal range, skipping", address);
            continue;
        };

        db::upsert_holder_stats(
            conn,
            &HolderStats {
                address: address.clone(),
                frozen,
                burned,
                last_block: t.last_block,
                updated_at: now,
            },
        )?;
        debug!("Updated holder {} => frozen {}, burned {}", address, frozen, burned);
        updated += 1;
    }

    Ok(updated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AccountEvent;

    fn save(
        conn: &Connection,
        kind: AccountEventKind,
        id: &str,
        from: &str,
        value: &str,
        block: i64,
    ) {
        db::save_account_event(
            conn,
            kind,
            &AccountEvent {
                id: id.into(),
                from: from.into(),
                value: value.into(),
                block_number: block,
                block_timestamp: 0,
                transaction_hash: "0xfeed".into(),
            },
        )
        .unwrap();
    }

    fn holders(addresses: &[&str]) -> BTreeSet<String> {
        addresses.iter().map(|a| a.to_string()).collect()
    }

    #[test]
    fn frozen_is_freezes_minus_unfreezes() {
        let conn = db::memory();
        save(&conn, AccountEventKind::Freeze, "0x01", "0xaaaa", "3000000000000000000", 10);
        save(&conn, AccountEventKind::Unfreeze, "0x02", "0xaaaa", "500000000000000000", 12);
        save(&conn, AccountEventKind::Burn, "0x03", "0xaaaa", "1000000000000000000", 11);
        save(&conn, AccountEventKind::Burn, "0x04", "0xbbbb", "1", 5);

        assert_eq!(update_holder_stats(&conn, &holders(&["0xaaaa", "0xbbbb"])).unwrap(), 2);

        let a = db::holder_stats(&conn, "0xaaaa").unwrap().unwrap();
        assert_eq!(a.frozen, Decimal::from_str("2.5").unwrap());
        assert_eq!(a.burned, Decimal::ONE);
        assert_eq!(a.last_block, 12);

        let b = db::holder_stats(&conn, "0xbbbb").unwrap().unwrap();
        assert_eq!(b.frozen, Decimal::ZERO);
        assert_eq!(b.burned, Decimal::from_str("0.000000000000000001").unwrap());
    }

    #[test]
    fn only_listed_holders_are_updated() {
        let conn = db::memory();
        save(&conn, AccountEventKind::Freeze, "0x01", "0xaaaa", "1", 1);
        save(&conn, AccountEventKind::Freeze, "0x02", "0xbbbb", "1", 1);

        assert_eq!(update_holder_stats(&conn, &holders(&["0xaaaa"])).unwrap(), 1);
        assert!(db::holder_stats(&conn, "0xaaaa").unwrap().is_some());
        assert!(db::holder_stats(&conn, "0xbbbb").unwrap().is_none());

        // a holder with no account events gets no row
        assert_eq!(update_holder_stats(&conn, &holders(&["0xcccc"])).unwrap(), 0);
    }

    #[test]
    fn unfreezing_more_than_frozen_floors_at_zero() {
        let conn = db::memory();
        save(&conn, AccountEventKind::Unfreeze, "0x01", "0xaaaa", "10", 1);
        update_holder_stats(&conn, &holders(&["0xaaaa"])).unwrap();
        assert_eq!(db::holder_stats(&conn, "0xaaaa").unwrap().unwrap().frozen, Decimal::ZERO);
    }

    #[test]
    fn recompute_is_stable() {
        let conn = db::memory();
        save(&conn, AccountEventKind::Freeze, "0x01", "0xaaaa", "7", 1);
        update_holder_stats(&conn, &holders(&["0xaaaa"])).unwrap();
        update_holder_stats(&conn, &holders(&["0xaaaa"])).unwrap();
        let a = db::holder_stats(&conn, "0xaaaa").unwrap().unwrap();
        assert_eq!(a.frozen, Decimal::from_str("0.000000000000000007").unwrap());
    }
}
