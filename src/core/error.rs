use crate::models::MatchStatus;
use thiserror::Error;
use uuid::Uuid;

/// Contract violations raised by the matching engine
///
/// Empty outcomes (not enough users, no rematch candidate) are never errors;
/// these variants signal caller bugs or illegal state transitions.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MatchError {
    #[error("Invalid profile {user_id:?}: {reason}")]
    InvalidProfile { user_id: String, reason: String },

    #[error("Profile {0} appears more than once in the pool")]
    DuplicateProfile(String),

    #[error("Requester {0} must not be part of the candidate list")]
    RequesterInCandidates(String),

    #[error("User {0} cannot be matched with themself")]
    SelfMatch(String),

    #[error("User {user_id} already holds active match {match_id}")]
    AlreadyActive { user_id: String, match_id: Uuid },

    #[error("Match {match_id} cannot move from {from} to {to}")]
    InvalidTransition {
        match_id: Uuid,
        from: MatchStatus,
        to: MatchStatus,
    },

    #[error("Match {match_id} is {status}, decisions are only accepted while pending")]
    NotPending { match_id: Uuid, status: MatchStatus },

    #[error("User {user_id} is not a member of match {match_id}")]
    NotAMember { match_id: Uuid, user_id: String },

    #[error("User {user_id} already decided on match {match_id}")]
    AlreadyDecided { match_id: Uuid, user_id: String },

    #[error("Match not found: {0}")]
    MatchNotFound(Uuid),

    #[error("User {user_id} holds accepted match {match_id} and cannot request a rematch")]
    RematchNotAllowed { user_id: String, match_id: Uuid },
}
