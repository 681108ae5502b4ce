//! Logistic ELO expectation and zero-sum rating deltas.
//!
//! # Responsibility
//! - Compute the winner's expected score from two ratings.
//! - Reconcile two per-entry K-factors into one symmetric update.
//!
//! # Invariants
//! - `loser_delta == -winner_delta` for every input.
//! - `winner_delta >= 0` whenever both K-factors are non-negative.

use crate::model::contest::Rating;

/// Rating gap at which the stronger side is expected to score ~0.91.
const LOGISTIC_SCALE: f64 = 400.0;

/// Rating deltas produced by one decided vote.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EloDelta {
    pub winner: Rating,
    pub loser: Rating,
}

/// Expected score of the winner against the loser, in `[0, 1]`.
pub fn expected_score(winner_rating: Rating, loser_rating: Rating) -> f64 {
    let gap = loser_rating as f64 - winner_rating as f64;
    1.0 / (1.0 + 10f64.powf(gap / LOGISTIC_SCALE))
}

/// Computes the zero-sum deltas for one vote.
///
/// Both legs use the mean of the two K-factors. The loser delta is derived
/// from the rounded winner delta, never computed on its own.
pub fn zero_sum_delta(
    winner_rating: Rating,
    loser_rating: Rating,
    winner_k: f64,
    loser_k: f64,
) -> EloDelta {
    let expected = expected_score(winner_rating, loser_rating);
    let avg_k = (winner_k + loser_k) / 2.0;
    let winner = round_half_up(avg_k * (1.0 - expected));
    EloDelta {
        winner,
        loser: -winner,
    }
}

/// Rounds to the nearest integer, ties toward positive infinity.
pub fn round_half_up(value: f64) -> Rating {
    (value + 0.5).floor() as Rating
}
