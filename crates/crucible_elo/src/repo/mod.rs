//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define the hash-store contract the engine is written against.
//! - Provide SQLite and in-memory stores behind that contract.
//! - Scope rating and vote-count access per contest.
//!
//! # Invariants
//! - Repositories never fall back to a non-atomic path when a store call
//!   fails; errors surface unchanged.

pub mod hash_store;
pub mod memory_store;
pub mod rating_repo;
pub mod sqlite_store;
pub mod vote_count_repo;
