use chrono::{DateTime, Utc};
use eyre::Result;
use rusqlite::{params, Connection, OptionalExtension};
use rust_decimal::Decimal;
use std::str::FromStr;

use crate::models::{AccountEvent, AccountEventKind, HolderStats, Transfer};

const INIT_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS transfers (
  id               TEXT PRIMARY KEY,
  from_address     TEXT NOT NULL,
  to_address       TEXT NOT NULL,
  value            TEXT NOT NULL, -- U256 as decimal string
  block_number     INTEGER NOT NULL,
  block_timestamp  INTEGER NOT NULL,
  transaction_hash TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS burns (
  id               TEXT PRIMARY KEY,
  from_address     TEXT NOT NULL,
  value            TEXT NOT NULL,
  block_number     INTEGER NOT NULL,
  block_timestamp  INTEGER NOT NULL,
  transaction_hash TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS freezes (
  id               TEXT PRIMARY KEY,
  from_address     TEXT NOT NULL,
  value            TEXT NOT NULL,
  block_number     INTEGER NOT NULL,
  block_timestamp  INTEGER NOT NULL,
  transaction_hash TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS unfreezes (
  id               TEXT PRIMARY KEY,
  from_address     TEXT NOT NULL,
  value            TEXT NOT NULL,
  block_number     INTEGER NOT NULL,
  block_timestamp  INTEGER NOT NULL,
  transaction_hash TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS transfers_block ON transfers (block_number);
CREATE INDEX IF NOT EXISTS burns_block ON burns (block_number);
CREATE INDEX IF NOT EXISTS freezes_block ON freezes (block_number);
CREATE INDEX IF NOT EXISTS unfreezes_block ON unfreezes (block_number);
CREATE INDEX IF NOT EXISTS burns_from ON burns (from_address);
CREATE INDEX IF NOT EXISTS freezes_from ON freezes (from_address);
CREATE INDEX IF NOT EXISTS unfreezes_from ON unfreezes (from_address);

CREATE TABLE IF NOT EXISTS holder_stats (
  address    TEXT NOT NULL PRIMARY KEY,
  frozen     TEXT NOT NULL, -- Decimal stored as string
  burned     TEXT NOT NULL,
  last_block INTEGER NOT NULL,
  updated_at TEXT NOT NULL
);
"#;

/// Connect to SQLite (with WAL mode for performance)
pub fn connect(path: &str) -> Result<Connection> {
    let conn = Connection::open(path)?;
    conn.pragma_update(None, "journal_mode", "WAL")?;
    Ok(conn)
}

/// Run schema migrations
pub fn run_migrations(conn: &Connection) -> Result<()> {
    conn.execute_batch(INIT_SQL)?;
    Ok(())
}

/// Insert or update a transfer entity
pub fn save_transfer(conn: &Connection, entity: &Transfer) -> Result<()> {
    conn.execute(
        r#"
        INSERT INTO transfers (
            id, from_address, to_address, value,
            block_number, block_timestamp, transaction_hash
        )
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
        ON CONFLICT(id) DO UPDATE SET
            from_address     = excluded.from_address,
            to_address       = excluded.to_address,
            value            = excluded.value,
            block_number     = excluded.block_number,
            block_timestamp  = excluded.block_timestamp,
            transaction_hash = excluded.transaction_hash
        "#,
        params![
            entity.id,
            entity.from,
            entity.to,
            entity.value,
            entity.block_number,
            entity.block_timestamp,
            entity.transaction_hash
        ],
    )?;
    Ok(())
}

/// Insert or update a burn / freeze / unfreeze entity
pub fn save_account_event(
    conn: &Connection,
    kind: AccountEventKind,
    entity: &AccountEvent,
) -> Result<()> {
    // table names come from a closed enum, never from input
    let sql = format!(
        r#"
        INSERT INTO {} (
            id, from_address, value,
            block_number, block_timestamp, transaction_hash
        )
        VALUES (?1, ?2, ?3, ?4, ?5, ?6)
        ON CONFLICT(id) DO UPDATE SET
            from_address     = excluded.from_address,
            value            = excluded.value,
            block_number     = excluded.block_number,
            block_timestamp  = excluded.block_timestamp,
            transaction_hash = excluded.transaction_hash
        "#,
        kind.table()
    );
    conn.execute(
        &sql,
        params![
            entity.id,
            entity.from,
            entity.value,
            entity.block_number,
            entity.block_timestamp,
            entity.transaction_hash
        ],
    )?;
    Ok(())
}

pub fn recent_transfers(conn: &Connection, limit: u32) -> Result<Vec<Transfer>> {
    let mut stmt = conn.prepare(
        "SELECT id, from_address, to_address, value, block_number, block_timestamp, transaction_hash
         FROM transfers
         ORDER BY block_number DESC, id DESC
         LIMIT ?1",
    )?;

    let rows = stmt.query_map([limit as i64], |r| {
        Ok(Transfer {
            id: r.get(0)?,
            from: r.get(1)?,
            to: r.get(2)?,
            value: r.get(3)?,
            block_number: r.get(4)?,
            block_timestamp: r.get(5)?,
            transaction_hash: r.get(6)?,
        })
    })?;

    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

pub fn recent_account_events(
    conn: &Connection,
    kind: AccountEventKind,
    limit: u32,
) -> Result<Vec<AccountEvent>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT id, from_address, value, block_number, block_timestamp, transaction_hash
         FROM {}
         ORDER BY block_number DESC, id DESC
         LIMIT ?1",
        kind.table()
    ))?;

    let rows = stmt.query_map([limit as i64], |r| {
        Ok(AccountEvent {
            id: r.get(0)?,
            from: r.get(1)?,
            value: r.get(2)?,
            block_number: r.get(3)?,
            block_timestamp: r.get(4)?,
            transaction_hash: r.get(5)?,
        })
    })?;

    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

/// `(value, block_number)` for every stored event of `kind` emitted by `holder`
pub fn account_event_values(
    conn: &Connection,
    kind: AccountEventKind,
    holder: &str,
) -> Result<Vec<(String, i64)>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT value, block_number FROM {} WHERE from_address = ?1",
        kind.table()
    ))?;
    let rows = stmt.query_map([holder], |r| Ok((r.get(0)?, r.get(1)?)))?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

pub fn upsert_holder_stats(conn: &Connection, stats: &HolderStats) -> Result<()> {
    conn.execute(
        "
        INSERT INTO holder_stats (address, frozen, burned, last_block, updated_at)
        VALUES (?1, ?2, ?3, ?4, ?5)
        ON CONFLICT(address) DO UPDATE SET
            frozen     = excluded.frozen,
            burned     = excluded.burned,
            last_block = excluded.last_block,
            updated_at = excluded.updated_at
        ",
        params![
            stats.address,
            stats.frozen.to_string(),
            stats.burned.to_string(),
            stats.last_block,
            stats.updated_at.to_rfc3339()
        ],
    )?;
    Ok(())
}

pub fn holder_stats(conn: &Connection, address: &str) -> Result<Option<HolderStats>> {
    let row = conn
        .query_row(
            "SELECT address, frozen, burned, last_block, updated_at
             FROM holder_stats WHERE LOWER(address) = LOWER(?1)",
            [address],
            |r| {
                let address: String = r.get(0)?;
                let frozen: String = r.get(1)?;
                let burned: String = r.get(2)?;
                let last_block: i64 = r.get(3)?;
                let updated_at: String = r.get(4)?;
                Ok((address, frozen, burned, last_block, updated_at))
            },
        )
        .optional()?;

    let Some((address, frozen, burned, last_block, updated_at)) = row else {
        return Ok(None);
    };

    Ok(Some(HolderStats {
        address,
        frozen: Decimal::from_str(&frozen)?,
        burned: Decimal::from_str(&burned)?,
        last_block,
        updated_at: DateTime::parse_from_rfc3339(&updated_at)?.with_timezone(&Utc),
    }))
}

#[cfg(test)]
pub(crate) fn memory() -> Connection {
    let conn = Connection::open_in_memory().expect("in-memory sqlite");
    run_migrations(&conn).expect("migrations");
    conn
}
