//! SQLite-backed hash store.
//!
//! # Responsibility
//! - Persist integer hashes in `hash_fields` with deadlines in `hash_expiry`.
//! - Execute `update_pair` as one `BEGIN IMMEDIATE` transaction.
//!
//! # Invariants
//! - Every write path takes the database write lock before its first read,
//!   so two writers sharing a database file never interleave.
//! - Read paths filter expired keys without writing.
//! - Write paths drop an expired key inside their own transaction before
//!   touching it.

use crate::clock::{duration_to_ms, Clock, SystemClock};
use crate::repo::hash_store::{
    checked_increment, decode_value, encode_value, ensure_distinct_fields, HashStore,
    PairCompute, PairUpdate, StoreResult,
};
use rusqlite::{params, Connection, OptionalExtension, Transaction, TransactionBehavior};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

const LIVE_KEY_FILTER_SQL: &str = "NOT EXISTS (
    SELECT 1
    FROM hash_expiry e
    WHERE e.hash_key = f.hash_key
      AND e.expires_at_ms <= ?2
)";

/// Hash store over a migrated SQLite connection.
///
/// Each worker should own its connection; the database file is the shared
/// resource and its write lock is the serialization point.
#[derive(Clone)]
pub struct SqliteHashStore<'conn> {
    conn: &'conn Connection,
    clock: Arc<dyn Clock>,
}

impl<'conn> SqliteHashStore<'conn> {
    /// Creates a store reading time from the system clock.
    pub fn new(conn: &'conn Connection) -> Self {
        Self::with_clock(conn, Arc::new(SystemClock))
    }

    /// Creates a store reading time from `clock`.
    pub fn with_clock(conn: &'conn Connection, clock: Arc<dyn Clock>) -> Self {
        Self { conn, clock }
    }

    fn begin_write(&self) -> StoreResult<Transaction<'conn>> {
        Ok(Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?)
    }
}

impl HashStore for SqliteHashStore<'_> {
    fn get_field(&self, key: &str, field: &str) -> StoreResult<Option<i64>> {
        let raw: Option<String> = self
            .conn
            .query_row(
                &format!(
                    "SELECT f.value
                     FROM hash_fields f
                     WHERE f.hash_key = ?1
                       AND f.field = ?3
                       AND {LIVE_KEY_FILTER_SQL};"
                ),
                params![key, self.clock.now_ms(), field],
                |row| row.get(0),
            )
            .optional()?;

        raw.map(|value| decode_value(key, field, &value)).transpose()
    }

    fn get_all(&self, key: &str) -> StoreResult<BTreeMap<String, i64>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT f.field, f.value
             FROM hash_fields f
             WHERE f.hash_key = ?1
               AND {LIVE_KEY_FILTER_SQL}
             ORDER BY f.field ASC;"
        ))?;

        let mut rows = stmt.query(params![key, self.clock.now_ms()])?;
        let mut fields = BTreeMap::new();
        while let Some(row) = rows.next()? {
            let field: String = row.get(0)?;
            let raw: String = row.get(1)?;
            let value = decode_value(key, &field, &raw)?;
            fields.insert(field, value);
        }

        Ok(fields)
    }

    fn field_exists(&self, key: &str, field: &str) -> StoreResult<bool> {
        let exists: i64 = self.conn.query_row(
            &format!(
                "SELECT EXISTS(
                    SELECT 1
                    FROM hash_fields f
                    WHERE f.hash_key = ?1
                      AND f.field = ?3
                      AND {LIVE_KEY_FILTER_SQL}
                );"
            ),
            params![key, self.clock.now_ms(), field],
            |row| row.get(0),
        )?;
        Ok(exists == 1)
    }

    fn set_fields(&self, key: &str, fields: &[(String, i64)]) -> StoreResult<()> {
        if fields.is_empty() {
            return Ok(());
        }

        let tx = self.begin_write()?;
        drop_if_expired(&tx, key, self.clock.now_ms())?;
        for (field, value) in fields {
            upsert_field(&tx, key, field, *value)?;
        }
        tx.commit()?;
        Ok(())
    }

    fn increment_field(&self, key: &str, field: &str, by: i64) -> StoreResult<i64> {
        let tx = self.begin_write()?;
        drop_if_expired(&tx, key, self.clock.now_ms())?;
        let current = read_field_in_tx(&tx, key, field)?.unwrap_or(0);
        let next = checked_increment(key, field, current, by)?;
        upsert_field(&tx, key, field, next)?;
        tx.commit()?;
        Ok(next)
    }

    fn update_pair(
        &self,
        key: &str,
        fields: [&str; 2],
        compute: &mut PairCompute<'_>,
    ) -> StoreResult<PairUpdate> {
        ensure_distinct_fields(fields)?;

        let tx = self.begin_write()?;
        drop_if_expired(&tx, key, self.clock.now_ms())?;
        let old = [
            read_field_in_tx(&tx, key, fields[0])?,
            read_field_in_tx(&tx, key, fields[1])?,
        ];
        let new = compute(old)?;
        upsert_field(&tx, key, fields[0], new[0])?;
        upsert_field(&tx, key, fields[1], new[1])?;
        tx.commit()?;

        Ok(PairUpdate { old, new })
    }

    fn delete_keys(&self, keys: &[&str]) -> StoreResult<()> {
        if keys.is_empty() {
            return Ok(());
        }

        let tx = self.begin_write()?;
        for key in keys {
            delete_key(&tx, key)?;
        }
        tx.commit()?;
        Ok(())
    }

    fn expire_keys(&self, keys: &[&str], ttl: Duration) -> StoreResult<()> {
        if keys.is_empty() {
            return Ok(());
        }

        let now_ms = self.clock.now_ms();
        let expires_at_ms = now_ms.saturating_add(duration_to_ms(ttl));
        let tx = self.begin_write()?;
        for key in keys {
            drop_if_expired(&tx, key, now_ms)?;
            tx.execute(
                "INSERT INTO hash_expiry (hash_key, expires_at_ms)
                 SELECT ?1, ?2
                 WHERE EXISTS(SELECT 1 FROM hash_fields WHERE hash_key = ?1)
                 ON CONFLICT(hash_key) DO UPDATE SET expires_at_ms = excluded.expires_at_ms;",
                params![key, expires_at_ms],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    fn purge_expired(&self) -> StoreResult<usize> {
        let now_ms = self.clock.now_ms();
        let tx = self.begin_write()?;
        tx.execute(
            "DELETE FROM hash_fields
             WHERE hash_key IN (
                SELECT hash_key FROM hash_expiry WHERE expires_at_ms <= ?1
             );",
            [now_ms],
        )?;
        let purged = tx.execute("DELETE FROM hash_expiry WHERE expires_at_ms <= ?1;", [now_ms])?;
        tx.commit()?;
        Ok(purged)
    }
}

fn read_field_in_tx(tx: &Transaction<'_>, key: &str, field: &str) -> StoreResult<Option<i64>> {
    let raw: Option<String> = tx
        .query_row(
            "SELECT value FROM hash_fields WHERE hash_key = ?1 AND field = ?2;",
            params![key, field],
            |row| row.get(0),
        )
        .optional()?;

    raw.map(|value| decode_value(key, field, &value)).transpose()
}

fn upsert_field(tx: &Transaction<'_>, key: &str, field: &str, value: i64) -> StoreResult<()> {
    tx.execute(
        "INSERT INTO hash_fields (hash_key, field, value)
         VALUES (?1, ?2, ?3)
         ON CONFLICT(hash_key, field) DO UPDATE SET value = excluded.value;",
        params![key, field, encode_value(value)],
    )?;
    Ok(())
}

fn delete_key(tx: &Transaction<'_>, key: &str) -> StoreResult<()> {
    tx.execute("DELETE FROM hash_fields WHERE hash_key = ?1;", [key])?;
    tx.execute("DELETE FROM hash_expiry WHERE hash_key = ?1;", [key])?;
    Ok(())
}

fn drop_if_expired(tx: &Transaction<'_>, key: &str, now_ms: i64) -> StoreResult<()> {
    let expired: i64 = tx.query_row(
        "SELECT EXISTS(
            SELECT 1 FROM hash_expiry WHERE hash_key = ?1 AND expires_at_ms <= ?2
        );",
        params![key, now_ms],
        |row| row.get(0),
    )?;
    if expired == 1 {
        delete_key(tx, key)?;
    }
    Ok(())
}
