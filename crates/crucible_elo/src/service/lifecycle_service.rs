//! Contest rating lifecycle: seeding before voting, retirement after.
//!
//! # Responsibility
//! - Bulk-seed ratings before a contest opens.
//! - Snapshot final standings for the finalization job.
//! - Expire or purge the rating and vote-count hashes together.
//!
//! # Invariants
//! - Seeding with no entries issues no store call.
//! - Expiry and purge cover both hashes of a contest in one store call, so
//!   neither hash outlives the other.

use crate::model::contest::{resolve_rating, ContestId, EntryId, KeySpace, Rating, DEFAULT_RATING};
use crate::model::vote::Standing;
use crate::repo::hash_store::{HashStore, StoreResult};
use crate::repo::rating_repo::RatingRepository;
use crate::repo::vote_count_repo::VoteCountRepository;
use log::{error, info};
use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

/// Lifecycle operations over one store.
pub struct LifecycleService<S: HashStore + Clone> {
    store: S,
    keys: KeySpace,
    ratings: RatingRepository<S>,
    votes: VoteCountRepository<S>,
}

impl<S: HashStore + Clone> LifecycleService<S> {
    pub fn new(store: S, keys: KeySpace) -> Self {
        Self {
            ratings: RatingRepository::new(store.clone(), keys.clone()),
            votes: VoteCountRepository::new(store.clone(), keys.clone()),
            store,
            keys,
        }
    }

    /// Seeds explicit ratings. An empty map is a no-op.
    pub fn set_multiple_ratings(
        &self,
        contest_id: ContestId,
        ratings: &BTreeMap<EntryId, Rating>,
    ) -> StoreResult<()> {
        if ratings.is_empty() {
            return Ok(());
        }

        self.ratings.set_multiple_ratings(contest_id, ratings)?;
        info!(
            "event=ratings_seeded module=service status=ok contest_id={} entries={}",
            contest_id,
            ratings.len()
        );
        Ok(())
    }

    /// Seeds every listed entry at `DEFAULT_RATING`. An empty slice is a no-op.
    pub fn initialize_entries(
        &self,
        contest_id: ContestId,
        entry_ids: &[EntryId],
    ) -> StoreResult<()> {
        let ratings = entry_ids
            .iter()
            .map(|entry_id| (*entry_id, DEFAULT_RATING))
            .collect::<BTreeMap<_, _>>();
        self.set_multiple_ratings(contest_id, &ratings)
    }

    /// Expires the rating and vote-count hashes of a contest after `ttl`.
    pub fn set_ttl(&self, contest_id: ContestId, ttl: Duration) -> StoreResult<()> {
        let ratings_key = self.keys.ratings_key(contest_id);
        let votes_key = self.keys.votes_key(contest_id);

        match self
            .store
            .expire_keys(&[ratings_key.as_str(), votes_key.as_str()], ttl)
        {
            Ok(()) => {
                info!(
                    "event=contest_ttl_set module=service status=ok contest_id={} ttl_secs={}",
                    contest_id,
                    ttl.as_secs()
                );
                Ok(())
            }
            Err(err) => {
                error!(
                    "event=contest_ttl_set module=service status=error contest_id={} error={}",
                    contest_id, err
                );
                Err(err)
            }
        }
    }

    /// Purges the rating and vote-count hashes of a contest immediately.
    pub fn delete_all(&self, contest_id: ContestId) -> StoreResult<()> {
        let ratings_key = self.keys.ratings_key(contest_id);
        let votes_key = self.keys.votes_key(contest_id);

        match self
            .store
            .delete_keys(&[ratings_key.as_str(), votes_key.as_str()])
        {
            Ok(()) => {
                info!(
                    "event=contest_purged module=service status=ok contest_id={}",
                    contest_id
                );
                Ok(())
            }
            Err(err) => {
                error!(
                    "event=contest_purged module=service status=error contest_id={} error={}",
                    contest_id, err
                );
                Err(err)
            }
        }
    }

    /// Current standings of a contest, best rating first.
    ///
    /// Every entry with a rating or a vote count is listed; entries counted
    /// but never rated show `DEFAULT_RATING`. Equal ratings are ordered by
    /// entry id.
    pub fn standings(&self, contest_id: ContestId) -> StoreResult<Vec<Standing>> {
        let ratings = self.ratings.get_all_ratings(contest_id)?;
        let vote_counts = self.votes.get_all_vote_counts(contest_id)?;

        let entry_ids = ratings
            .keys()
            .chain(vote_counts.keys())
            .copied()
            .collect::<BTreeSet<_>>();

        let mut rows = entry_ids
            .into_iter()
            .map(|entry_id| {
                (
                    entry_id,
                    resolve_rating(ratings.get(&entry_id).copied()),
                    vote_counts.get(&entry_id).copied().unwrap_or(0),
                )
            })
            .collect::<Vec<_>>();
        rows.sort_by(|left, right| right.1.cmp(&left.1).then(left.0.cmp(&right.0)));

        Ok(rows
            .into_iter()
            .enumerate()
            .map(|(index, (entry_id, rating, vote_count))| Standing {
                rank: index as u32 + 1,
                entry_id,
                rating,
                vote_count,
            })
            .collect())
    }

    /// Snapshots standings, then schedules both hashes to expire after
    /// `grace`.
    ///
    /// The snapshot is returned only when the expiry was applied.
    pub fn finalize(&self, contest_id: ContestId, grace: Duration) -> StoreResult<Vec<Standing>> {
        let standings = self.standings(contest_id)?;
        self.set_ttl(contest_id, grace)?;
        info!(
            "event=contest_finalized module=service status=ok contest_id={} entries={}",
            contest_id,
            standings.len()
        );
        Ok(standings)
    }

    /// Physically removes expired hashes across all contests.
    pub fn sweep_expired(&self) -> StoreResult<usize> {
        let purged = self.store.purge_expired()?;
        if purged > 0 {
            info!("event=expired_swept module=service status=ok keys={purged}");
        }
        Ok(purged)
    }
}
