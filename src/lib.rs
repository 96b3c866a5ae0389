//! Pairing Engine - partner matching and rematching for campus blind-date matching
//!
//! This library pairs unmatched users in bulk, finds a single replacement
//! partner on request, and tracks the status of every match it creates.
//! The engine core is pure; the job layer runs it against a [`services::MatchStore`].

pub mod config;
pub mod core;
pub mod jobs;
pub mod models;
pub mod services;

// Re-export commonly used types
pub use crate::core::{
    score, BulkMatcher, BulkOutcome, ExclusionScope, MatchError, MatchLedger, RematchFinder, Scorer,
};
pub use crate::models::{Match, MatchStatus, Preference, Profile, ScoringWeights};
