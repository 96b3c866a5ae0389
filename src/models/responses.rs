use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use crate::core::BulkOutcome;
use crate::models::matches::Match;

/// Summary of one bulk matching pass
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkRunSummary {
    pub outcome: BulkOutcome,
    pub eligible: usize,
    pub created: usize,
    #[serde(rename = "matchingTime")]
    pub matching_time: DateTime<Utc>,
}

/// Result of a single rematch request
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RematchOutcome {
    Matched {
        #[serde(rename = "newMatch")]
        new_match: Match,
        #[serde(rename = "cancelledMatchId")]
        cancelled_match_id: Option<Uuid>,
    },
    NoMatchFound,
}

/// Summary of draining the rematch request queue
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RematchQueueSummary {
    pub processed: usize,
    pub matched: usize,
    #[serde(rename = "noMatchFound")]
    pub no_match_found: usize,
    pub refused: usize,
    /// Left queued after a store failure
    pub failed: usize,
}

/// Everything the batch binary did in one invocation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub expired: usize,
    pub bulk: BulkRunSummary,
    pub rematch: RematchQueueSummary,
    #[serde(rename = "finishedAt")]
    pub finished_at: DateTime<Utc>,
}
