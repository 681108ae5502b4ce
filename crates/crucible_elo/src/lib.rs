//! Atomic pairwise-rating engine for Crucible contests.
//! This crate owns the rating invariants: lazy 1500 defaults, atomic
//! two-entry updates and exact zero-sum deltas.

pub mod clock;
pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{ConfigError, EngineConfig};
pub use logging::{default_log_level, init_logging, init_logging_from_config, logging_status};
pub use model::contest::{
    resolve_rating, ContestId, EntryId, KeySpace, Rating, VoteCount, DEFAULT_NAMESPACE,
    DEFAULT_RATING,
};
pub use model::elo::{expected_score, zero_sum_delta, EloDelta};
pub use model::vote::{InvalidVote, Standing, Vote, VoteResult, VoteSide};
pub use repo::hash_store::{HashStore, PairUpdate, StoreError, StoreResult};
pub use repo::memory_store::MemoryHashStore;
pub use repo::rating_repo::RatingRepository;
pub use repo::sqlite_store::SqliteHashStore;
pub use repo::vote_count_repo::VoteCountRepository;
pub use service::lifecycle_service::LifecycleService;
pub use service::vote_service::{VoteError, VoteService};

/// Returns the engine crate version.
pub fn engine_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::engine_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!engine_version().is_empty());
    }
}
