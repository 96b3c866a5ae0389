use crate::config::Settings;
use crate::core::{
    BulkMatcher, ExclusionScope, MatchError, MatchLedger, MatchStamp, RematchFinder, RematchQuery,
    Scorer,
};
use crate::models::{
    BulkRunSummary, DecisionRequest, Match, MatchStatus, RematchOutcome, RematchQueueSummary,
    RematchRequest, RematchRequestStatus, RunSummary,
};
use crate::services::{MatchStore, ProfileFilter, StoreError};
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;
use validator::Validate;

/// Errors surfaced by the matching jobs
#[derive(Debug, Error)]
pub enum JobError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Matching error: {0}")]
    Engine(#[from] MatchError),

    #[error("Validation failed: {0}")]
    Validation(#[from] validator::ValidationErrors),

    #[error("Profile not found: {0}")]
    ProfileNotFound(String),

    #[error("Match not found: {0}")]
    MatchNotFound(Uuid),
}

/// Shared state for every job
#[derive(Clone)]
pub struct JobContext {
    pub store: Arc<dyn MatchStore>,
    pub bulk: BulkMatcher,
    pub rematch: RematchFinder,
    pub exclusion_scope: ExclusionScope,
    /// Used when the store has no scheduled matching time
    pub fallback_matching_time: Option<DateTime<Utc>>,
    pub pending_ttl: Duration,
}

impl JobContext {
    pub fn from_settings(store: Arc<dyn MatchStore>, settings: &Settings) -> Self {
        let weights = settings.scoring.weights;
        let bulk = BulkMatcher::new(
            Scorer::new(settings.matching.scoring_mode, weights),
            settings.matching.max_age_gap,
        );
        let rematch = RematchFinder::new(Scorer::Attribute(weights))
            .with_mutual_preferences(settings.rematch.mutual_preferences);

        Self {
            store,
            bulk,
            rematch,
            exclusion_scope: settings.rematch.exclusion_scope,
            fallback_matching_time: settings.matching.matching_time,
            pending_ttl: Duration::hours(i64::from(settings.matching.pending_ttl_hours)),
        }
    }

    /// Scheduled matching time from the store, else the configured fallback, else `now`
    async fn matching_time(&self, now: DateTime<Utc>) -> Result<DateTime<Utc>, JobError> {
        let scheduled = self.store.scheduled_matching_time().await?;
        Ok(scheduled.or(self.fallback_matching_time).unwrap_or(now))
    }
}

/// Pair every unmatched user that can be paired and store the new matches
pub async fn run_bulk_matching(
    ctx: &JobContext,
    now: DateTime<Utc>,
) -> Result<BulkRunSummary, JobError> {
    let matching_time = ctx.matching_time(now).await?;
    let profiles = ctx.store.list_profiles(&ProfileFilter::default()).await?;
    let ledger = MatchLedger::from_matches(ctx.store.list_matches().await?);
    let already_matched = ledger.already_matched();

    tracing::info!(
        "Bulk matching over {} profiles ({} already matched)",
        profiles.len(),
        already_matched.len()
    );

    let stamp = MatchStamp {
        created_at: now,
        matching_time,
    };
    let result = ctx.bulk.run(&profiles, &already_matched, stamp)?;

    if !result.matches.is_empty() {
        ctx.store.insert_matches(&result.matches).await?;
    }

    tracing::info!(
        "Bulk matching finished: {:?}, {} matches created",
        result.outcome,
        result.matches.len()
    );

    Ok(BulkRunSummary {
        outcome: result.outcome,
        eligible: result.eligible,
        created: result.matches.len(),
        matching_time,
    })
}

/// Find a new partner for `user_id`, replacing their pending match if they have one
pub async fn request_rematch(
    ctx: &JobContext,
    user_id: &str,
    now: DateTime<Utc>,
) -> Result<RematchOutcome, JobError> {
    let requester = ctx
        .store
        .get_profile(user_id)
        .await?
        .ok_or_else(|| JobError::ProfileNotFound(user_id.to_string()))?;

    let ledger = MatchLedger::from_matches(ctx.store.list_matches().await?);
    if let Some(active) = ledger.active_match(user_id) {
        if active.status == MatchStatus::Accepted {
            tracing::warn!("Rematch refused for {}: match {} already accepted", user_id, active.id);
            return Err(MatchError::RematchNotAllowed {
                user_id: user_id.to_string(),
                match_id: active.id,
            }
            .into());
        }
    }

    let exclusion_ids = ledger.exclusion_ids(user_id, ctx.exclusion_scope);
    let active_ids = ledger.already_matched();
    let candidates = ctx
        .store
        .list_profiles(&ProfileFilter::gender(requester.gender.opposite()))
        .await?;
    let preference = ctx.store.get_preference(user_id).await?;
    let candidate_preferences = if ctx.rematch.mutual_preferences() {
        ctx.store.list_preferences().await?
    } else {
        HashMap::new()
    };

    let query = RematchQuery {
        requester: &requester,
        preference: preference.as_ref(),
        candidates: &candidates,
        candidate_preferences: &candidate_preferences,
        exclusion_ids: &exclusion_ids,
        active_ids: &active_ids,
    };

    let Some(found) = ctx.rematch.find(&query)? else {
        tracing::info!("No rematch candidate for {}", user_id);
        return Ok(RematchOutcome::NoMatchFound);
    };

    let matching_time = ctx.matching_time(now).await?;
    let new_match = Match::pending(&requester.user_id, &found.profile.user_id, now, matching_time)
        .scored(found.score.total, found.score.components);

    let cancelled_match_id = ctx.store.replace_active_match(user_id, &new_match).await?;

    tracing::info!(
        "Rematched {} with {} (score {}, cancelled {:?})",
        user_id,
        found.profile.user_id,
        found.score.total,
        cancelled_match_id
    );

    Ok(RematchOutcome::Matched {
        new_match,
        cancelled_match_id,
    })
}

/// Queue a rematch request for the next batch run
pub async fn enqueue_rematch(
    ctx: &JobContext,
    user_id: &str,
    now: DateTime<Utc>,
) -> Result<RematchRequest, JobError> {
    if ctx.store.get_profile(user_id).await?.is_none() {
        return Err(JobError::ProfileNotFound(user_id.to_string()));
    }

    let request = RematchRequest::new(user_id, now);
    ctx.store.enqueue_rematch(&request).await?;
    tracing::debug!("Queued rematch request {} for {}", request.id, user_id);
    Ok(request)
}

/// Work through queued rematch requests, oldest first
///
/// Requests the matching rules can never satisfy (unknown user, accepted
/// match) are resolved as refused. Store failures leave the request queued.
pub async fn process_rematch_queue(
    ctx: &JobContext,
    now: DateTime<Utc>,
) -> Result<RematchQueueSummary, JobError> {
    let requests = ctx.store.pending_rematch_requests().await?;
    let mut summary = RematchQueueSummary::default();

    for request in requests {
        summary.processed += 1;

        match request_rematch(ctx, &request.user_id, now).await {
            Ok(RematchOutcome::Matched { new_match, .. }) => {
                ctx.store
                    .resolve_rematch_request(
                        request.id,
                        RematchRequestStatus::Matched,
                        Some(new_match.id),
                    )
                    .await?;
                summary.matched += 1;
            }
            Ok(RematchOutcome::NoMatchFound) => {
                ctx.store
                    .resolve_rematch_request(request.id, RematchRequestStatus::NoMatchFound, None)
                    .await?;
                summary.no_match_found += 1;
            }
            Err(e @ (JobError::Engine(_) | JobError::ProfileNotFound(_))) => {
                tracing::warn!(
                    "Rematch request {} for {} refused: {}",
                    request.id,
                    request.user_id,
                    e
                );
                ctx.store
                    .resolve_rematch_request(request.id, RematchRequestStatus::Refused, None)
                    .await?;
                summary.refused += 1;
            }
            Err(e) => {
                tracing::warn!(
                    "Rematch request {} for {} failed: {}",
                    request.id,
                    request.user_id,
                    e
                );
                summary.failed += 1;
            }
        }
    }

    tracing::info!(
        "Rematch queue processed: {} matched, {} without match, {} refused, {} failed",
        summary.matched,
        summary.no_match_found,
        summary.refused,
        summary.failed
    );

    Ok(summary)
}

/// Record one member's accept/reject decision on a pending match
pub async fn record_decision(ctx: &JobContext, req: DecisionRequest) -> Result<Match, JobError> {
    if let Err(errors) = req.validate() {
        tracing::info!("Validation failed for decision request: field_errors={:?}", errors);
        return Err(errors.into());
    }

    let decided = match ctx
        .store
        .record_decision(req.match_id, &req.user_id, req.accept)
        .await
    {
        Ok(decided) => decided,
        Err(StoreError::NotFound(_)) => return Err(JobError::MatchNotFound(req.match_id)),
        Err(StoreError::Rejected(e)) => return Err(e.into()),
        Err(e) => return Err(e.into()),
    };

    tracing::info!(
        "Recorded decision of {} on match {} (accept: {}, status: {})",
        req.user_id,
        req.match_id,
        req.accept,
        decided.status
    );

    Ok(decided)
}

/// Expire pending matches that outlived the configured time to live
pub async fn expire_pending(ctx: &JobContext, now: DateTime<Utc>) -> Result<Vec<Uuid>, JobError> {
    let cutoff = now - ctx.pending_ttl;
    let expired = ctx.store.expire_pending(cutoff).await?;

    if !expired.is_empty() {
        tracing::info!("Expired {} pending matches created before {}", expired.len(), cutoff);
    }

    Ok(expired)
}

/// One batch invocation: expiry, the rematch queue, then bulk matching
///
/// Queued requesters are served first so a bulk pair is never created only
/// to be cancelled by their rematch in the same run.
pub async fn run_all(ctx: &JobContext, now: DateTime<Utc>) -> Result<RunSummary, JobError> {
    let expired = expire_pending(ctx, now).await?;
    let rematch = process_rematch_queue(ctx, now).await?;
    let bulk = run_bulk_matching(ctx, now).await?;

    Ok(RunSummary {
        expired: expired.len(),
        bulk,
        rematch,
        finished_at: Utc::now(),
    })
}
