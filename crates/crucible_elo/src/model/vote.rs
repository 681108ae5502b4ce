//! Vote request/result records and vote preconditions.
//!
//! # Responsibility
//! - Describe one transient vote outcome and what it changed.
//! - Reject votes that cannot be applied as a well-defined update.
//!
//! # Invariants
//! - A `Vote` is consumed once; it is never stored or replayed.
//! - `VoteResult::winner_delta + VoteResult::loser_delta == 0`.

use crate::model::contest::{EntryId, Rating, VoteCount};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// One decided head-to-head outcome.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Vote {
    pub winner: EntryId,
    pub loser: EntryId,
    /// Sensitivity coefficient of the winning entry.
    pub winner_k: f64,
    /// Sensitivity coefficient of the losing entry.
    pub loser_k: f64,
}

impl Vote {
    pub fn new(winner: EntryId, loser: EntryId, winner_k: f64, loser_k: f64) -> Self {
        Self {
            winner,
            loser,
            winner_k,
            loser_k,
        }
    }

    /// Checks the vote preconditions.
    ///
    /// # Errors
    /// - `InvalidVote::SelfVote` when both sides name the same entry.
    /// - `InvalidVote::KFactor` when a K-factor is negative or not finite.
    pub fn validate(&self) -> Result<(), InvalidVote> {
        if self.winner == self.loser {
            return Err(InvalidVote::SelfVote(self.winner));
        }
        validate_k_factor(VoteSide::Winner, self.winner_k)?;
        validate_k_factor(VoteSide::Loser, self.loser_k)?;
        Ok(())
    }
}

fn validate_k_factor(side: VoteSide, value: f64) -> Result<(), InvalidVote> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(InvalidVote::KFactor { side, value })
    }
}

/// Which participant of a vote a value belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VoteSide {
    Winner,
    Loser,
}

impl Display for VoteSide {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Winner => write!(f, "winner"),
            Self::Loser => write!(f, "loser"),
        }
    }
}

/// Precondition failure for a vote.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InvalidVote {
    /// Winner and loser are the same entry.
    SelfVote(EntryId),
    /// K-factor is negative, NaN or infinite.
    KFactor { side: VoteSide, value: f64 },
}

impl Display for InvalidVote {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SelfVote(entry_id) => {
                write!(f, "entry {entry_id} cannot vote against itself")
            }
            Self::KFactor { side, value } => {
                write!(f, "{side} k-factor must be a finite non-negative number, got {value}")
            }
        }
    }
}

impl Error for InvalidVote {}

/// Ratings before and after one processed vote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteResult {
    pub winner_old_rating: Rating,
    pub loser_old_rating: Rating,
    pub winner_new_rating: Rating,
    pub loser_new_rating: Rating,
    pub winner_delta: Rating,
    pub loser_delta: Rating,
}

/// Final-standings row for one entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Standing {
    /// 1-based position; ties in rating are broken by entry id.
    pub rank: u32,
    pub entry_id: EntryId,
    pub rating: Rating,
    pub vote_count: VoteCount,
}
