//! Hash-store contract shared by the SQLite store and the in-memory fake.
//!
//! # Responsibility
//! - Model the key -> {field -> integer} storage the rating engine runs on.
//! - Provide one atomic read-compute-write entry point over two fields.
//! - Own key expiry semantics.
//!
//! # Invariants
//! - Values are persisted as decimal-string integers; anything else read back
//!   is rejected as `StoreError::InvalidData`.
//! - `update_pair` reads, computes and writes as one indivisible unit with
//!   respect to every other write on the same store.
//! - An expired key reads as empty, and the first write after expiry
//!   recreates it without a deadline.
//! - `expire_keys` only applies to keys that currently hold fields.

use crate::db::DbError;
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Duration;

pub type StoreResult<T> = Result<T, StoreError>;

/// Failure raised by a hash store.
#[derive(Debug)]
pub enum StoreError {
    /// SQLite transport/lock/IO failure.
    Db(DbError),
    /// Store cannot be reached at all.
    Unavailable(String),
    /// Persisted state is not a valid integer hash.
    InvalidData(String),
    /// Caller passed arguments the store cannot act on.
    InvalidArgument(String),
}

impl StoreError {
    /// Returns whether the failure means "the store could not be reached or
    /// locked in time" as opposed to corrupt data or misuse.
    pub fn is_unavailable(&self) -> bool {
        match self {
            Self::Unavailable(_) => true,
            Self::Db(err) => err.is_busy(),
            Self::InvalidData(_) | Self::InvalidArgument(_) => false,
        }
    }
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::Unavailable(message) => write!(f, "store unavailable: {message}"),
            Self::InvalidData(message) => write!(f, "invalid persisted hash data: {message}"),
            Self::InvalidArgument(message) => write!(f, "invalid store argument: {message}"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::Unavailable(_) | Self::InvalidData(_) | Self::InvalidArgument(_) => None,
        }
    }
}

impl From<DbError> for StoreError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Values observed and written by one `update_pair` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PairUpdate {
    /// Raw values before the update; `None` when the field was absent.
    pub old: [Option<i64>; 2],
    /// Values persisted by the update.
    pub new: [i64; 2],
}

/// Callback run inside the atomic step of `update_pair`.
///
/// Returning an error aborts the step with no write applied.
pub type PairCompute<'a> = dyn FnMut([Option<i64>; 2]) -> StoreResult<[i64; 2]> + 'a;

/// Integer hash storage with per-key expiry.
pub trait HashStore {
    /// Reads one field of a live key.
    fn get_field(&self, key: &str, field: &str) -> StoreResult<Option<i64>>;
    /// Reads every field of a live key. Missing or expired keys are empty.
    fn get_all(&self, key: &str) -> StoreResult<BTreeMap<String, i64>>;
    /// Returns whether a live key holds `field`.
    fn field_exists(&self, key: &str, field: &str) -> StoreResult<bool>;
    /// Writes all `fields` in one atomic step. Empty input is a no-op.
    fn set_fields(&self, key: &str, fields: &[(String, i64)]) -> StoreResult<()>;
    /// Adds `by` to a field (absent counts as 0) and returns the new value.
    fn increment_field(&self, key: &str, field: &str, by: i64) -> StoreResult<i64>;
    /// Reads two distinct fields, runs `compute`, and writes both results,
    /// all as one atomic step.
    fn update_pair(
        &self,
        key: &str,
        fields: [&str; 2],
        compute: &mut PairCompute<'_>,
    ) -> StoreResult<PairUpdate>;
    /// Removes every listed key and its deadline in one atomic step.
    fn delete_keys(&self, keys: &[&str]) -> StoreResult<()>;
    /// Sets the same deadline on every listed live key in one atomic step.
    fn expire_keys(&self, keys: &[&str], ttl: Duration) -> StoreResult<()>;
    /// Physically removes every key whose deadline has passed.
    ///
    /// Returns the number of keys removed.
    fn purge_expired(&self) -> StoreResult<usize>;
}

/// Encodes a stored integer.
pub fn encode_value(value: i64) -> String {
    value.to_string()
}

/// Decodes a stored integer, naming the slot on failure.
pub fn decode_value(key: &str, field: &str, raw: &str) -> StoreResult<i64> {
    raw.parse::<i64>().map_err(|_| {
        StoreError::InvalidData(format!(
            "value `{raw}` at `{key}`/`{field}` is not a decimal integer"
        ))
    })
}

/// Rejects pair updates that name the same field twice.
pub fn ensure_distinct_fields(fields: [&str; 2]) -> StoreResult<()> {
    if fields[0] == fields[1] {
        return Err(StoreError::InvalidArgument(format!(
            "atomic pair update needs two distinct fields, got `{}` twice",
            fields[0]
        )));
    }
    Ok(())
}

/// Adds `by` to `current`, rejecting overflow the way an integer store would.
pub fn checked_increment(key: &str, field: &str, current: i64, by: i64) -> StoreResult<i64> {
    current.checked_add(by).ok_or_else(|| {
        StoreError::InvalidArgument(format!(
            "increment of `{key}`/`{field}` by {by} would overflow"
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::{decode_value, ensure_distinct_fields, StoreError};

    #[test]
    fn decode_rejects_non_integer_text() {
        let err = decode_value("c:1", "7", "15x0").unwrap_err();
        assert!(matches!(err, StoreError::InvalidData(_)));
        assert!(err.to_string().contains("c:1"));
        assert_eq!(decode_value("c:1", "7", "-12").unwrap(), -12);
    }

    #[test]
    fn distinct_field_guard_rejects_duplicates() {
        assert!(ensure_distinct_fields(["1", "2"]).is_ok());
        let err = ensure_distinct_fields(["3", "3"]).unwrap_err();
        assert!(!err.is_unavailable());
    }
}
