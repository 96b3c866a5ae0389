//! Storage abstraction for the data the engine reads and the matches it writes

use crate::core::MatchError;
use crate::models::{Gender, Match, Preference, Profile, RematchRequest, RematchRequestStatus};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use thiserror::Error;
use uuid::Uuid;

/// Errors that can occur when reading or writing match data
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Not found: {0}")]
    NotFound(String),

    /// A write would break the one-active-match-per-user rule
    #[error("Conflict: {0}")]
    Conflict(String),

    /// The stored match refused the requested transition
    #[error("Rejected: {0}")]
    Rejected(#[from] MatchError),

    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Optional narrowing of a profile listing
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileFilter {
    pub gender: Option<Gender>,
    pub department: Option<String>,
}

impl ProfileFilter {
    pub fn gender(gender: Gender) -> Self {
        Self {
            gender: Some(gender),
            department: None,
        }
    }

    pub fn matches(&self, profile: &Profile) -> bool {
        self.gender.map_or(true, |g| profile.gender == g)
            && self
                .department
                .as_deref()
                .map_or(true, |d| profile.department == d)
    }
}

/// Collaborator that owns profiles, preferences and match records
///
/// Implementations must make `replace_active_match` atomic: cancelling the
/// user's pending match and inserting the new one either both happen or
/// neither does, and a user never ends up holding two active matches.
#[async_trait]
pub trait MatchStore: Send + Sync {
    /// Profiles ordered by creation time, oldest first
    async fn list_profiles(&self, filter: &ProfileFilter) -> StoreResult<Vec<Profile>>;

    async fn get_profile(&self, user_id: &str) -> StoreResult<Option<Profile>>;

    /// Preferences keyed by user id; users without a row have no preference
    async fn list_preferences(&self) -> StoreResult<HashMap<String, Preference>>;

    async fn get_preference(&self, user_id: &str) -> StoreResult<Option<Preference>>;

    async fn list_matches(&self) -> StoreResult<Vec<Match>>;

    async fn get_match(&self, match_id: Uuid) -> StoreResult<Option<Match>>;

    /// Insert new matches; all or nothing
    async fn insert_matches(&self, matches: &[Match]) -> StoreResult<()>;

    /// Cancel the user's pending match and insert `new_match`, atomically.
    /// Returns the id of the cancelled match, if any.
    async fn replace_active_match(
        &self,
        user_id: &str,
        new_match: &Match,
    ) -> StoreResult<Option<Uuid>>;

    /// Apply one member's decision to the stored match, atomically.
    /// Returns the match as stored afterwards.
    async fn record_decision(
        &self,
        match_id: Uuid,
        user_id: &str,
        accept: bool,
    ) -> StoreResult<Match>;

    /// Expire every match still pending that was created before `cutoff`.
    /// Returns the ids of the expired matches.
    async fn expire_pending(&self, cutoff: DateTime<Utc>) -> StoreResult<Vec<Uuid>>;

    /// Currently scheduled system-wide matching time
    async fn scheduled_matching_time(&self) -> StoreResult<Option<DateTime<Utc>>>;

    async fn enqueue_rematch(&self, request: &RematchRequest) -> StoreResult<()>;

    /// Requests still waiting for a partner, oldest first
    async fn pending_rematch_requests(&self) -> StoreResult<Vec<RematchRequest>>;

    async fn resolve_rematch_request(
        &self,
        request_id: Uuid,
        status: RematchRequestStatus,
        match_id: Option<Uuid>,
    ) -> StoreResult<()>;
}
