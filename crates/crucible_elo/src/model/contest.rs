//! Contest scoping, identifiers and key layout.
//!
//! # Responsibility
//! - Name the scalar types shared by repositories and services.
//! - Own the `<namespace>:<contestId>` key convention for both keyspaces.
//!
//! # Invariants
//! - Ratings and vote counts for one contest live under sibling keys that
//!   share the same prefix, so they can be expired and purged together.

use serde::{Deserialize, Serialize};

/// Contest ("crucible") identifier. Contests exist implicitly from the
/// first write until purge or expiry.
pub type ContestId = i64;

/// Entry identifier, unique within one contest.
pub type EntryId = i64;

/// Signed ELO rating.
pub type Rating = i64;

/// Number of decided votes an entry participated in.
pub type VoteCount = i64;

/// Rating every entry starts from until first written.
pub const DEFAULT_RATING: Rating = 1500;

/// Key namespace used when none is configured.
pub const DEFAULT_NAMESPACE: &str = "crucible_elo";

const VOTES_KEY_SUFFIX: &str = "votes";

/// Resolves a raw rating read into the effective rating.
///
/// This is the only place where "absent" becomes `DEFAULT_RATING`.
pub fn resolve_rating(raw: Option<Rating>) -> Rating {
    raw.unwrap_or(DEFAULT_RATING)
}

/// Key layout for the rating and vote-count hashes of every contest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeySpace {
    namespace: String,
}

impl KeySpace {
    /// Creates a key layout rooted at `namespace`.
    ///
    /// The namespace is expected to be validated by configuration loading.
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
        }
    }

    pub fn namespace(&self) -> &str {
        self.namespace.as_str()
    }

    /// Hash key holding `entryId -> rating` for one contest.
    pub fn ratings_key(&self, contest_id: ContestId) -> String {
        format!("{}:{contest_id}", self.namespace)
    }

    /// Hash key holding `entryId -> vote count` for one contest.
    pub fn votes_key(&self, contest_id: ContestId) -> String {
        format!("{}:{contest_id}:{VOTES_KEY_SUFFIX}", self.namespace)
    }
}

impl Default for KeySpace {
    fn default() -> Self {
        Self::new(DEFAULT_NAMESPACE)
    }
}

/// Encodes an entry id as a hash field name.
pub fn entry_field(entry_id: EntryId) -> String {
    entry_id.to_string()
}
