//! Domain model for pairwise contest ratings.
//!
//! # Responsibility
//! - Define identifiers, rating values and the storage key convention.
//! - Keep rating math free of storage concerns.
//!
//! # Invariants
//! - An entry rating is `DEFAULT_RATING` until first written.
//! - Every processed vote is zero-sum.

pub mod contest;
pub mod elo;
pub mod vote;
