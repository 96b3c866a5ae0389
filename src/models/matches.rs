use crate::core::error::MatchError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use uuid::Uuid;

/// Match lifecycle status
///
/// `Pending` is the only non-terminal state. `Pending` and `Accepted` both
/// hold their members, so neither member can be matched again meanwhile.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum MatchStatus {
    Pending,
    Accepted,
    Rejected,
    Cancelled,
    Expired,
}

impl MatchStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, MatchStatus::Pending)
    }

    /// Whether a match in this status still occupies both of its members
    pub fn holds_members(self) -> bool {
        matches!(self, MatchStatus::Pending | MatchStatus::Accepted)
    }

    pub fn can_transition_to(self, next: MatchStatus) -> bool {
        self == MatchStatus::Pending && next != MatchStatus::Pending
    }
}

/// Scoring rule that contributed to a match score
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ScoreRule {
    SameTier,
    AdjacentTier,
    Mbti,
    Smoking,
    Drinking,
    Tattoo,
    Height,
    Personality,
    DatingStyle,
    Interest,
}

/// One line of a score rationale
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreComponent {
    pub rule: ScoreRule,
    pub points: u32,
    /// Shared values for set-valued rules, empty otherwise
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub shared: Vec<String>,
}

/// A pairing between two users
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Match {
    pub id: Uuid,
    #[serde(rename = "userA")]
    pub user_a: String,
    #[serde(rename = "userB")]
    pub user_b: String,
    pub status: MatchStatus,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "matchingTime")]
    pub matching_time: DateTime<Utc>,
    #[serde(default)]
    pub score: Option<u32>,
    #[serde(default)]
    pub rationale: Vec<ScoreComponent>,
    #[serde(rename = "decisionA", default)]
    pub decision_a: Option<bool>,
    #[serde(rename = "decisionB", default)]
    pub decision_b: Option<bool>,
}

impl Match {
    /// Create a new pending match
    pub fn pending(
        user_a: impl Into<String>,
        user_b: impl Into<String>,
        created_at: DateTime<Utc>,
        matching_time: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_a: user_a.into(),
            user_b: user_b.into(),
            status: MatchStatus::Pending,
            created_at,
            matching_time,
            score: None,
            rationale: Vec::new(),
            decision_a: None,
            decision_b: None,
        }
    }

    /// Attach a score and its rationale
    pub fn scored(mut self, score: u32, rationale: Vec<ScoreComponent>) -> Self {
        self.score = Some(score);
        self.rationale = rationale;
        self
    }

    pub fn involves(&self, user_id: &str) -> bool {
        self.user_a == user_id || self.user_b == user_id
    }

    /// The other member of the match, if `user_id` is a member
    pub fn partner_of(&self, user_id: &str) -> Option<&str> {
        if self.user_a == user_id {
            Some(&self.user_b)
        } else if self.user_b == user_id {
            Some(&self.user_a)
        } else {
            None
        }
    }

    /// Only accepted matches may go on to propose an offline meeting
    pub fn allows_meeting_proposal(&self) -> bool {
        self.status == MatchStatus::Accepted
    }

    /// Record one side's accept/reject decision
    ///
    /// The match stays pending until both sides have decided. Both accepting
    /// moves it to `Accepted`; any rejection moves it to `Rejected`.
    pub fn record_decision(
        &mut self,
        user_id: &str,
        accept: bool,
    ) -> Result<MatchStatus, MatchError> {
        if self.status != MatchStatus::Pending {
            return Err(MatchError::NotPending {
                match_id: self.id,
                status: self.status,
            });
        }

        let slot = if self.user_a == user_id {
            &mut self.decision_a
        } else if self.user_b == user_id {
            &mut self.decision_b
        } else {
            return Err(MatchError::NotAMember {
                match_id: self.id,
                user_id: user_id.to_string(),
            });
        };

        if slot.is_some() {
            return Err(MatchError::AlreadyDecided {
                match_id: self.id,
                user_id: user_id.to_string(),
            });
        }
        *slot = Some(accept);

        if let (Some(a), Some(b)) = (self.decision_a, self.decision_b) {
            let next = if a && b {
                MatchStatus::Accepted
            } else {
                MatchStatus::Rejected
            };
            self.transition(next)?;
        }

        Ok(self.status)
    }

    pub fn cancel(&mut self) -> Result<(), MatchError> {
        self.transition(MatchStatus::Cancelled)
    }

    pub fn expire(&mut self) -> Result<(), MatchError> {
        self.transition(MatchStatus::Expired)
    }

    fn transition(&mut self, next: MatchStatus) -> Result<(), MatchError> {
        if !self.status.can_transition_to(next) {
            return Err(MatchError::InvalidTransition {
                match_id: self.id,
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pending_match() -> Match {
        let now = Utc::now();
        Match::pending("alice", "bob", now, now)
    }

    #[test]
    fn test_single_decision_stays_pending() {
        let mut m = pending_match();
        assert_eq!(m.record_decision("alice", true).unwrap(), MatchStatus::Pending);
        assert_eq!(m.decision_a, Some(true));
        assert!(!m.allows_meeting_proposal());
    }

    #[test]
    fn test_both_accept() {
        let mut m = pending_match();
        m.record_decision("bob", true).unwrap();
        assert_eq!(m.record_decision("alice", true).unwrap(), MatchStatus::Accepted);
        assert!(m.allows_meeting_proposal());
    }

    #[test]
    fn test_any_reject() {
        let mut m = pending_match();
        m.record_decision("alice", true).unwrap();
        assert_eq!(m.record_decision("bob", false).unwrap(), MatchStatus::Rejected);

        let mut m = pending_match();
        m.record_decision("alice", false).unwrap();
        assert_eq!(m.status, MatchStatus::Pending);
        assert_eq!(m.record_decision("bob", true).unwrap(), MatchStatus::Rejected);
    }

    #[test]
    fn test_decision_errors() {
        let mut m = pending_match();
        assert!(matches!(
            m.record_decision("carol", true),
            Err(MatchError::NotAMember { .. })
        ));

        m.record_decision("alice", true).unwrap();
        assert!(matches!(
            m.record_decision("alice", false),
            Err(MatchError::AlreadyDecided { .. })
        ));

        m.cancel().unwrap();
        assert!(matches!(
            m.record_decision("bob", true),
            Err(MatchError::NotPending { .. })
        ));
    }

    #[test]
    fn test_terminal_states_are_final() {
        let mut m = pending_match();
        m.expire().unwrap();
        assert_eq!(m.status, MatchStatus::Expired);
        assert!(m.cancel().is_err());
        assert!(MatchStatus::Cancelled.is_terminal());
        assert!(!MatchStatus::Cancelled.holds_members());
        assert!(MatchStatus::Accepted.holds_members());
    }

    #[test]
    fn test_partner_of() {
        let m = pending_match();
        assert_eq!(m.partner_of("alice"), Some("bob"));
        assert_eq!(m.partner_of("bob"), Some("alice"));
        assert_eq!(m.partner_of("carol"), None);
    }
}
