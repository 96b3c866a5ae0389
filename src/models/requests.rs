use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use uuid::Uuid;
use validator::Validate;

/// One side's decision on a pending match
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct DecisionRequest {
    #[serde(alias = "match_id", rename = "matchId")]
    pub match_id: Uuid,
    #[validate(length(min = 1))]
    #[serde(alias = "user_id", rename = "userId")]
    pub user_id: String,
    pub accept: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, AsRefStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RematchRequestStatus {
    Requested,
    Matched,
    NoMatchFound,
    /// The requester can never be rematched (unknown user or accepted match)
    Refused,
}

/// Queued request from a user for a new partner
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RematchRequest {
    pub id: Uuid,
    #[serde(rename = "userId")]
    pub user_id: String,
    #[serde(rename = "requestedAt")]
    pub requested_at: DateTime<Utc>,
    pub status: RematchRequestStatus,
    #[serde(rename = "matchId", default)]
    pub match_id: Option<Uuid>,
}

impl RematchRequest {
    pub fn new(user_id: impl Into<String>, requested_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: user_id.into(),
            requested_at,
            status: RematchRequestStatus::Requested,
            match_id: None,
        }
    }
}
