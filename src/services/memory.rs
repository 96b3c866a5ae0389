//! In-memory store for tests, benchmarks and embedding

use crate::core::{MatchError, MatchLedger};
use crate::models::{Match, Preference, Profile, RematchRequest, RematchRequestStatus};
use crate::services::store::{MatchStore, ProfileFilter, StoreError, StoreResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

/// In-memory store backed by a [`MatchLedger`]
///
/// Every write runs under one write lock, which makes
/// `replace_active_match` atomic.
#[derive(Debug, Default)]
pub struct MemoryStore {
    profiles: RwLock<Vec<Profile>>,
    preferences: RwLock<HashMap<String, Preference>>,
    ledger: RwLock<MatchLedger>,
    rematch_requests: RwLock<Vec<RematchRequest>>,
    matching_time: RwLock<Option<DateTime<Utc>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_profiles(mut self, profiles: Vec<Profile>) -> Self {
        self.profiles.get_mut().extend(profiles);
        self
    }

    pub fn with_preferences(mut self, preferences: Vec<Preference>) -> Self {
        self.preferences
            .get_mut()
            .extend(preferences.into_iter().map(|p| (p.user_id.clone(), p)));
        self
    }

    /// Seed existing match records as-is
    pub fn with_matches(mut self, matches: Vec<Match>) -> Self {
        *self.ledger.get_mut() = MatchLedger::from_matches(matches);
        self
    }

    pub async fn add_profile(&self, profile: Profile) {
        self.profiles.write().await.push(profile);
    }

    pub async fn set_matching_time(&self, matching_time: Option<DateTime<Utc>>) {
        *self.matching_time.write().await = matching_time;
    }

    pub async fn rematch_requests(&self) -> Vec<RematchRequest> {
        self.rematch_requests.read().await.clone()
    }
}

fn conflict(err: MatchError) -> StoreError {
    match err {
        MatchError::MatchNotFound(id) => StoreError::NotFound(format!("match {}", id)),
        other => StoreError::Conflict(other.to_string()),
    }
}

#[async_trait]
impl MatchStore for MemoryStore {
    async fn list_profiles(&self, filter: &ProfileFilter) -> StoreResult<Vec<Profile>> {
        let mut profiles: Vec<Profile> = self
            .profiles
            .read()
            .await
            .iter()
            .filter(|p| filter.matches(p))
            .cloned()
            .collect();
        profiles.sort_by_key(|p| p.created_at);
        Ok(profiles)
    }

    async fn get_profile(&self, user_id: &str) -> StoreResult<Option<Profile>> {
        Ok(self
            .profiles
            .read()
            .await
            .iter()
            .find(|p| p.user_id == user_id)
            .cloned())
    }

    async fn list_preferences(&self) -> StoreResult<HashMap<String, Preference>> {
        Ok(self.preferences.read().await.clone())
    }

    async fn get_preference(&self, user_id: &str) -> StoreResult<Option<Preference>> {
        Ok(self.preferences.read().await.get(user_id).cloned())
    }

    async fn list_matches(&self) -> StoreResult<Vec<Match>> {
        Ok(self.ledger.read().await.matches().to_vec())
    }

    async fn get_match(&self, match_id: Uuid) -> StoreResult<Option<Match>> {
        Ok(self.ledger.read().await.get(match_id).cloned())
    }

    async fn insert_matches(&self, matches: &[Match]) -> StoreResult<()> {
        self.ledger
            .write()
            .await
            .record_all(matches.to_vec())
            .map_err(conflict)
    }

    async fn replace_active_match(
        &self,
        user_id: &str,
        new_match: &Match,
    ) -> StoreResult<Option<Uuid>> {
        self.ledger
            .write()
            .await
            .replace_active(user_id, new_match.clone())
            .map_err(conflict)
    }

    async fn record_decision(
        &self,
        match_id: Uuid,
        user_id: &str,
        accept: bool,
    ) -> StoreResult<Match> {
        let mut ledger = self.ledger.write().await;
        match ledger.record_decision(match_id, user_id, accept) {
            Ok(decided) => Ok(decided.clone()),
            Err(MatchError::MatchNotFound(id)) => {
                Err(StoreError::NotFound(format!("match {}", id)))
            }
            Err(err) => Err(StoreError::Rejected(err)),
        }
    }

    async fn expire_pending(&self, cutoff: DateTime<Utc>) -> StoreResult<Vec<Uuid>> {
        Ok(self.ledger.write().await.expire_pending(cutoff))
    }

    async fn scheduled_matching_time(&self) -> StoreResult<Option<DateTime<Utc>>> {
        Ok(*self.matching_time.read().await)
    }

    async fn enqueue_rematch(&self, request: &RematchRequest) -> StoreResult<()> {
        self.rematch_requests.write().await.push(request.clone());
        Ok(())
    }

    async fn pending_rematch_requests(&self) -> StoreResult<Vec<RematchRequest>> {
        let mut pending: Vec<RematchRequest> = self
            .rematch_requests
            .read()
            .await
            .iter()
            .filter(|r| r.status == RematchRequestStatus::Requested)
            .cloned()
            .collect();
        pending.sort_by_key(|r| r.requested_at);
        Ok(pending)
    }

    async fn resolve_rematch_request(
        &self,
        request_id: Uuid,
        status: RematchRequestStatus,
        match_id: Option<Uuid>,
    ) -> StoreResult<()> {
        let mut requests = self.rematch_requests.write().await;
        let request = requests
            .iter_mut()
            .find(|r| r.id == request_id)
            .ok_or_else(|| StoreError::NotFound(format!("rematch request {}", request_id)))?;
        request.status = status;
        request.match_id = match_id;
        Ok(())
    }
}
