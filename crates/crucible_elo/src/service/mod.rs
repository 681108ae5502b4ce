//! Engine use-case services.
//!
//! # Responsibility
//! - Orchestrate repository calls into vote and lifecycle use-cases.
//! - Keep callers decoupled from storage details.

pub mod lifecycle_service;
pub mod vote_service;
