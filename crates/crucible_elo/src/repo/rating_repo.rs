//! Per-contest rating storage.
//!
//! # Responsibility
//! - Read, seed and retire the `entryId -> rating` hash of each contest.
//! - Run the two-entry atomic update the vote processor builds on.
//!
//! # Invariants
//! - Raw reads return `None` for entries never written; only
//!   `update_pair_atomic` merges in `DEFAULT_RATING`, through
//!   `resolve_rating`.
//! - Bulk seeding with an empty map issues no store call.

use crate::model::contest::{
    entry_field, resolve_rating, ContestId, EntryId, KeySpace, Rating, DEFAULT_RATING,
};
use crate::repo::hash_store::{HashStore, PairUpdate, StoreError, StoreResult};
use std::collections::BTreeMap;
use std::time::Duration;

/// Rating access scoped by contest, stored under `<namespace>:<contestId>`.
#[derive(Clone)]
pub struct RatingRepository<S: HashStore> {
    store: S,
    keys: KeySpace,
}

impl<S: HashStore> RatingRepository<S> {
    pub fn new(store: S, keys: KeySpace) -> Self {
        Self { store, keys }
    }

    /// Returns the stored rating, or `None` when the entry was never written.
    pub fn get_rating(
        &self,
        contest_id: ContestId,
        entry_id: EntryId,
    ) -> StoreResult<Option<Rating>> {
        let key = self.keys.ratings_key(contest_id);
        self.store.get_field(&key, &entry_field(entry_id))
    }

    /// Snapshot of every stored rating in the contest.
    ///
    /// Not synchronized with in-flight votes.
    pub fn get_all_ratings(
        &self,
        contest_id: ContestId,
    ) -> StoreResult<BTreeMap<EntryId, Rating>> {
        let key = self.keys.ratings_key(contest_id);
        parse_entry_map(&key, self.store.get_all(&key)?)
    }

    pub fn set_rating(
        &self,
        contest_id: ContestId,
        entry_id: EntryId,
        rating: Rating,
    ) -> StoreResult<()> {
        let key = self.keys.ratings_key(contest_id);
        self.store.set_fields(&key, &[(entry_field(entry_id), rating)])
    }

    /// Writes many ratings in one store call.
    ///
    /// An empty map returns immediately without touching the store.
    pub fn set_multiple_ratings(
        &self,
        contest_id: ContestId,
        ratings: &BTreeMap<EntryId, Rating>,
    ) -> StoreResult<()> {
        if ratings.is_empty() {
            return Ok(());
        }

        let key = self.keys.ratings_key(contest_id);
        let fields = ratings
            .iter()
            .map(|(entry_id, rating)| (entry_field(*entry_id), *rating))
            .collect::<Vec<_>>();
        self.store.set_fields(&key, &fields)
    }

    /// Writes `DEFAULT_RATING` for an entry, overwriting any earlier value.
    pub fn initialize_rating(&self, contest_id: ContestId, entry_id: EntryId) -> StoreResult<()> {
        self.set_rating(contest_id, entry_id, DEFAULT_RATING)
    }

    pub fn has_rating(&self, contest_id: ContestId, entry_id: EntryId) -> StoreResult<bool> {
        let key = self.keys.ratings_key(contest_id);
        self.store.field_exists(&key, &entry_field(entry_id))
    }

    /// Removes every rating of the contest.
    pub fn delete_all(&self, contest_id: ContestId) -> StoreResult<()> {
        let key = self.keys.ratings_key(contest_id);
        self.store.delete_keys(&[key.as_str()])
    }

    /// Schedules the rating hash for expiry. Has no effect when the contest
    /// holds no ratings.
    pub fn set_ttl(&self, contest_id: ContestId, ttl: Duration) -> StoreResult<()> {
        let key = self.keys.ratings_key(contest_id);
        self.store.expire_keys(&[key.as_str()], ttl)
    }

    /// Reads two ratings (defaulting absent ones), applies `compute`, and
    /// persists both results in one atomic store step.
    ///
    /// `compute` receives `(first, second)` and returns the new pair.
    pub(crate) fn update_pair_atomic<F>(
        &self,
        contest_id: ContestId,
        first: EntryId,
        second: EntryId,
        mut compute: F,
    ) -> StoreResult<PairUpdate>
    where
        F: FnMut(Rating, Rating) -> StoreResult<(Rating, Rating)>,
    {
        let key = self.keys.ratings_key(contest_id);
        let first_field = entry_field(first);
        let second_field = entry_field(second);

        self.store.update_pair(
            &key,
            [first_field.as_str(), second_field.as_str()],
            &mut |[first_raw, second_raw]| {
                let (first_new, second_new) =
                    compute(resolve_rating(first_raw), resolve_rating(second_raw))?;
                Ok([first_new, second_new])
            },
        )
    }
}

/// Converts stored `field -> value` pairs into `entryId -> value`.
///
/// # Errors
/// - `StoreError::InvalidData` when a field is not an entry id.
pub(crate) fn parse_entry_map(
    key: &str,
    fields: BTreeMap<String, i64>,
) -> StoreResult<BTreeMap<EntryId, i64>> {
    fields
        .into_iter()
        .map(|(field, value)| {
            field
                .parse::<EntryId>()
                .map(|entry_id| (entry_id, value))
                .map_err(|_| {
                    StoreError::InvalidData(format!("field `{field}` in `{key}` is not an entry id"))
                })
        })
        .collect()
}
