//! Atomic vote processing.
//!
//! # Responsibility
//! - Turn one decided vote into a zero-sum rating update.
//! - Guarantee the read-compute-write over both entries is one atomic
//!   store step.
//!
//! # Invariants
//! - `winner_delta + loser_delta == 0` for every returned `VoteResult`.
//! - Invalid votes are rejected before any store call.
//! - A failed store step leaves both ratings untouched and is returned to
//!   the caller; there is no retry and no fallback path.

use crate::model::contest::{resolve_rating, ContestId, EntryId};
use crate::model::elo::zero_sum_delta;
use crate::model::vote::{InvalidVote, Vote, VoteResult};
use crate::repo::hash_store::{HashStore, StoreError, StoreResult};
use crate::repo::rating_repo::RatingRepository;
use log::{debug, error, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Failure of `VoteService::process_vote`.
#[derive(Debug)]
pub enum VoteError {
    /// The vote breaks a precondition; nothing was read or written.
    Invalid(InvalidVote),
    /// The atomic store step failed; nothing was written.
    Store(StoreError),
}

impl Display for VoteError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Invalid(err) => write!(f, "invalid vote: {err}"),
            Self::Store(err) => write!(f, "{err}"),
        }
    }
}

impl Error for VoteError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Invalid(err) => Some(err),
            Self::Store(err) => Some(err),
        }
    }
}

impl From<InvalidVote> for VoteError {
    fn from(value: InvalidVote) -> Self {
        Self::Invalid(value)
    }
}

impl From<StoreError> for VoteError {
    fn from(value: StoreError) -> Self {
        Self::Store(value)
    }
}

/// Applies votes to contest ratings.
pub struct VoteService<S: HashStore> {
    ratings: RatingRepository<S>,
}

impl<S: HashStore> VoteService<S> {
    pub fn new(ratings: RatingRepository<S>) -> Self {
        Self { ratings }
    }

    /// Processes one vote between two entries of a contest.
    ///
    /// Unknown entries start from `DEFAULT_RATING` inside the atomic step.
    ///
    /// # Errors
    /// - `VoteError::Invalid` for a self-vote or a K-factor that is negative
    ///   or not finite.
    /// - `VoteError::Store` when the store step cannot complete.
    pub fn process_vote(
        &self,
        contest_id: ContestId,
        winner: EntryId,
        loser: EntryId,
        winner_k: f64,
        loser_k: f64,
    ) -> Result<VoteResult, VoteError> {
        self.process(contest_id, &Vote::new(winner, loser, winner_k, loser_k))
    }

    /// Processes a vote value. See `process_vote`.
    pub fn process(&self, contest_id: ContestId, vote: &Vote) -> Result<VoteResult, VoteError> {
        if let Err(err) = vote.validate() {
            warn!(
                "event=vote_rejected module=service status=error contest_id={} winner={} loser={} error={}",
                contest_id, vote.winner, vote.loser, err
            );
            return Err(err.into());
        }

        let update = self
            .ratings
            .update_pair_atomic(contest_id, vote.winner, vote.loser, |winner_old, loser_old| {
                let delta = zero_sum_delta(winner_old, loser_old, vote.winner_k, vote.loser_k);
                Ok((
                    apply_delta(winner_old, delta.winner)?,
                    apply_delta(loser_old, delta.loser)?,
                ))
            });

        let update = match update {
            Ok(update) => update,
            Err(err) => {
                error!(
                    "event=vote_processed module=service status=error contest_id={} winner={} loser={} unavailable={} error={}",
                    contest_id,
                    vote.winner,
                    vote.loser,
                    err.is_unavailable(),
                    err
                );
                return Err(err.into());
            }
        };

        let winner_old_rating = resolve_rating(update.old[0]);
        let loser_old_rating = resolve_rating(update.old[1]);
        let result = VoteResult {
            winner_old_rating,
            loser_old_rating,
            winner_new_rating: update.new[0],
            loser_new_rating: update.new[1],
            winner_delta: update.new[0] - winner_old_rating,
            loser_delta: update.new[1] - loser_old_rating,
        };

        debug!(
            "event=vote_processed module=service status=ok contest_id={} winner={} loser={} winner_delta={} winner_rating={} loser_rating={}",
            contest_id,
            vote.winner,
            vote.loser,
            result.winner_delta,
            result.winner_new_rating,
            result.loser_new_rating
        );
        Ok(result)
    }
}

fn apply_delta(rating: i64, delta: i64) -> StoreResult<i64> {
    rating.checked_add(delta).ok_or_else(|| {
        StoreError::InvalidArgument(format!("rating {rating} cannot move by {delta}"))
    })
}
