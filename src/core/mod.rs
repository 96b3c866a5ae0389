// Core engine exports
pub mod error;
pub mod filters;
pub mod ledger;
pub mod matcher;
pub mod rematch;
pub mod scoring;

pub use error::MatchError;
pub use filters::{check_profile, is_opposite_gender, matches_preference, within_age_gap};
pub use ledger::{ExclusionScope, MatchLedger};
pub use matcher::{BulkMatcher, BulkOutcome, BulkRunResult, MatchStamp};
pub use rematch::{RematchCandidate, RematchFinder, RematchQuery};
pub use scoring::{is_hard_excluded, score, Score, ScoreBreakdown, Scorer, ScoringMode};
