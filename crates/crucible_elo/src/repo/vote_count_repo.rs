//! Per-contest vote counters.
//!
//! # Responsibility
//! - Count how many decided votes each entry took part in.
//!
//! # Invariants
//! - Counts only grow; they reset only when the whole contest is purged or
//!   expires.
//! - Counters are updated by callers, outside the atomic rating update.

use crate::model::contest::{entry_field, ContestId, EntryId, KeySpace, VoteCount};
use crate::repo::hash_store::{HashStore, StoreResult};
use crate::repo::rating_repo::parse_entry_map;
use std::collections::BTreeMap;

/// Vote-count access scoped by contest, stored under
/// `<namespace>:<contestId>:votes`.
#[derive(Clone)]
pub struct VoteCountRepository<S: HashStore> {
    store: S,
    keys: KeySpace,
}

impl<S: HashStore> VoteCountRepository<S> {
    pub fn new(store: S, keys: KeySpace) -> Self {
        Self { store, keys }
    }

    /// Returns the vote count of an entry, `0` when never counted.
    pub fn get_vote_count(
        &self,
        contest_id: ContestId,
        entry_id: EntryId,
    ) -> StoreResult<VoteCount> {
        let key = self.keys.votes_key(contest_id);
        Ok(self
            .store
            .get_field(&key, &entry_field(entry_id))?
            .unwrap_or(0))
    }

    /// Atomically adds one to an entry's count and returns the new count.
    pub fn increment_vote_count(
        &self,
        contest_id: ContestId,
        entry_id: EntryId,
    ) -> StoreResult<VoteCount> {
        let key = self.keys.votes_key(contest_id);
        self.store.increment_field(&key, &entry_field(entry_id), 1)
    }

    /// Counts one participation for both sides of a decided vote.
    ///
    /// The two increments are independent; a failure on the second leaves
    /// the first in place.
    pub fn increment_pair(
        &self,
        contest_id: ContestId,
        winner: EntryId,
        loser: EntryId,
    ) -> StoreResult<(VoteCount, VoteCount)> {
        let winner_count = self.increment_vote_count(contest_id, winner)?;
        let loser_count = self.increment_vote_count(contest_id, loser)?;
        Ok((winner_count, loser_count))
    }

    /// Snapshot of every counted entry in the contest.
    pub fn get_all_vote_counts(
        &self,
        contest_id: ContestId,
    ) -> StoreResult<BTreeMap<EntryId, VoteCount>> {
        let key = self.keys.votes_key(contest_id);
        parse_entry_map(&key, self.store.get_all(&key)?)
    }
}
