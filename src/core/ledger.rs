use crate::core::error::MatchError;
use crate::models::{Match, MatchStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use uuid::Uuid;

/// Which prior partners a rematch must avoid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExclusionScope {
    /// Every user the requester was ever matched with
    #[default]
    FullHistory,
    /// Only the partner of the requester's latest match
    MostRecent,
}

/// In-memory view of match records
///
/// Answers "who is taken" and "who did this user already meet", and applies
/// status transitions while keeping the one-active-match-per-user rule.
#[derive(Debug, Clone, Default)]
pub struct MatchLedger {
    matches: Vec<Match>,
}

impl MatchLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a ledger from stored records without re-checking invariants
    pub fn from_matches(matches: Vec<Match>) -> Self {
        Self { matches }
    }

    pub fn matches(&self) -> &[Match] {
        &self.matches
    }

    pub fn get(&self, match_id: Uuid) -> Option<&Match> {
        self.matches.iter().find(|m| m.id == match_id)
    }

    /// Users holding a pending or accepted match
    pub fn already_matched(&self) -> HashSet<String> {
        self.matches
            .iter()
            .filter(|m| m.status.holds_members())
            .flat_map(|m| [m.user_a.clone(), m.user_b.clone()])
            .collect()
    }

    /// The user's pending or accepted match, if any
    pub fn active_match(&self, user_id: &str) -> Option<&Match> {
        self.matches
            .iter()
            .find(|m| m.status.holds_members() && m.involves(user_id))
    }

    /// Everyone the user has ever been matched with, whatever the status
    pub fn previous_partners(&self, user_id: &str) -> HashSet<String> {
        self.matches
            .iter()
            .filter_map(|m| m.partner_of(user_id))
            .map(str::to_string)
            .collect()
    }

    /// Partner from the user's latest match; later records win on equal timestamps
    pub fn most_recent_partner(&self, user_id: &str) -> Option<&str> {
        self.matches
            .iter()
            .filter(|m| m.involves(user_id))
            .max_by_key(|m| m.created_at)
            .and_then(|m| m.partner_of(user_id))
    }

    pub fn exclusion_ids(&self, user_id: &str, scope: ExclusionScope) -> HashSet<String> {
        match scope {
            ExclusionScope::FullHistory => self.previous_partners(user_id),
            ExclusionScope::MostRecent => self
                .most_recent_partner(user_id)
                .map(|partner| HashSet::from([partner.to_string()]))
                .unwrap_or_default(),
        }
    }

    /// Add a new match, refusing self-pairs and users that are already taken
    pub fn record(&mut self, new_match: Match) -> Result<(), MatchError> {
        self.check_insertable(&new_match, None)?;
        self.matches.push(new_match);
        Ok(())
    }

    /// Add several matches; nothing is recorded if any of them conflicts
    pub fn record_all(&mut self, new_matches: Vec<Match>) -> Result<(), MatchError> {
        let checkpoint = self.matches.len();
        for new_match in new_matches {
            if let Err(err) = self.record(new_match) {
                self.matches.truncate(checkpoint);
                return Err(err);
            }
        }
        Ok(())
    }

    /// Cancel the user's pending match and record `new_match` in its place
    ///
    /// Returns the id of the cancelled match, if there was one. An accepted
    /// match cannot be replaced.
    pub fn replace_active(
        &mut self,
        user_id: &str,
        new_match: Match,
    ) -> Result<Option<Uuid>, MatchError> {
        let retiring = match self.active_match(user_id) {
            Some(active) if active.status == MatchStatus::Accepted => {
                return Err(MatchError::RematchNotAllowed {
                    user_id: user_id.to_string(),
                    match_id: active.id,
                });
            }
            Some(active) => Some(active.id),
            None => None,
        };

        self.check_insertable(&new_match, retiring)?;

        if let Some(id) = retiring {
            self.get_mut(id)?.cancel()?;
        }
        self.matches.push(new_match);
        Ok(retiring)
    }

    /// Apply one side's decision to a pending match
    pub fn record_decision(
        &mut self,
        match_id: Uuid,
        user_id: &str,
        accept: bool,
    ) -> Result<&Match, MatchError> {
        let target = self.get_mut(match_id)?;
        target.record_decision(user_id, accept)?;
        Ok(target)
    }

    /// Expire pending matches created before `cutoff`, returning their ids
    pub fn expire_pending(&mut self, cutoff: DateTime<Utc>) -> Vec<Uuid> {
        let mut expired = Vec::new();
        for m in self
            .matches
            .iter_mut()
            .filter(|m| m.status == MatchStatus::Pending && m.created_at < cutoff)
        {
            if m.expire().is_ok() {
                expired.push(m.id);
            }
        }
        expired
    }

    fn get_mut(&mut self, match_id: Uuid) -> Result<&mut Match, MatchError> {
        self.matches
            .iter_mut()
            .find(|m| m.id == match_id)
            .ok_or(MatchError::MatchNotFound(match_id))
    }

    fn check_insertable(
        &self,
        new_match: &Match,
        retiring: Option<Uuid>,
    ) -> Result<(), MatchError> {
        if new_match.user_a == new_match.user_b {
            return Err(MatchError::SelfMatch(new_match.user_a.clone()));
        }

        for member in [&new_match.user_a, &new_match.user_b] {
            if let Some(active) = self.active_match(member) {
                if Some(active.id) != retiring {
                    return Err(MatchError::AlreadyActive {
                        user_id: member.clone(),
                        match_id: active.id,
                    });
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn at(minutes: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap() + Duration::minutes(minutes)
    }

    fn finished(a: &str, b: &str, status: MatchStatus, minutes: i64) -> Match {
        let mut m = Match::pending(a, b, at(minutes), at(minutes));
        m.status = status;
        m
    }

    #[test]
    fn test_already_matched_counts_pending_and_accepted() {
        let ledger = MatchLedger::from_matches(vec![
            finished("a", "b", MatchStatus::Pending, 0),
            finished("c", "d", MatchStatus::Accepted, 0),
            finished("e", "f", MatchStatus::Cancelled, 0),
            finished("g", "h", MatchStatus::Rejected, 0),
        ]);

        let taken = ledger.already_matched();
        assert_eq!(taken.len(), 4);
        assert!(taken.contains("a") && taken.contains("d"));
        assert!(!taken.contains("e") && !taken.contains("h"));
    }

    #[test]
    fn test_exclusion_scopes() {
        let ledger = MatchLedger::from_matches(vec![
            finished("r", "p1", MatchStatus::Cancelled, 0),
            finished("p2", "r", MatchStatus::Cancelled, 10),
            finished("r", "p3", MatchStatus::Pending, 20),
            finished("x", "y", MatchStatus::Pending, 30),
        ]);

        let full = ledger.exclusion_ids("r", ExclusionScope::FullHistory);
        assert_eq!(full.len(), 3);
        assert!(full.contains("p1") && full.contains("p2") && full.contains("p3"));

        let recent = ledger.exclusion_ids("r", ExclusionScope::MostRecent);
        assert_eq!(recent, HashSet::from(["p3".to_string()]));

        assert!(ledger.exclusion_ids("nobody", ExclusionScope::MostRecent).is_empty());
    }

    #[test]
    fn test_record_rejects_conflicts() {
        let mut ledger = MatchLedger::new();
        ledger.record(finished("a", "b", MatchStatus::Pending, 0)).unwrap();

        assert!(matches!(
            ledger.record(finished("b", "c", MatchStatus::Pending, 1)),
            Err(MatchError::AlreadyActive { .. })
        ));
        assert!(matches!(
            ledger.record(finished("c", "c", MatchStatus::Pending, 1)),
            Err(MatchError::SelfMatch(_))
        ));
    }

    #[test]
    fn test_record_all_is_all_or_nothing() {
        let mut ledger = MatchLedger::new();
        let result = ledger.record_all(vec![
            finished("a", "b", MatchStatus::Pending, 0),
            finished("c", "a", MatchStatus::Pending, 0),
        ]);

        assert!(result.is_err());
        assert!(ledger.matches().is_empty());
    }

    #[test]
    fn test_replace_active_cancels_pending() {
        let mut ledger = MatchLedger::new();
        let old = finished("r", "p1", MatchStatus::Pending, 0);
        let old_id = old.id;
        ledger.record(old).unwrap();

        let cancelled = ledger
            .replace_active("r", finished("r", "p2", MatchStatus::Pending, 5))
            .unwrap();

        assert_eq!(cancelled, Some(old_id));
        assert_eq!(ledger.get(old_id).unwrap().status, MatchStatus::Cancelled);
        assert_eq!(ledger.active_match("r").unwrap().partner_of("r"), Some("p2"));
        assert!(ledger.active_match("p1").is_none());
    }

    #[test]
    fn test_replace_active_refuses_accepted_and_taken_partner() {
        let mut ledger = MatchLedger::from_matches(vec![
            finished("r", "p1", MatchStatus::Accepted, 0),
            finished("s", "p2", MatchStatus::Pending, 0),
        ]);

        assert!(matches!(
            ledger.replace_active("r", finished("r", "p3", MatchStatus::Pending, 5)),
            Err(MatchError::RematchNotAllowed { .. })
        ));

        let before = ledger.matches().to_vec();
        assert!(matches!(
            ledger.replace_active("s", finished("s", "p1", MatchStatus::Pending, 5)),
            Err(MatchError::AlreadyActive { .. })
        ));
        assert_eq!(ledger.matches(), before.as_slice());
    }

    #[test]
    fn test_decision_and_expiry() {
        let mut ledger = MatchLedger::new();
        let m = finished("a", "b", MatchStatus::Pending, 0);
        let id = m.id;
        ledger.record(m).unwrap();
        ledger.record(finished("c", "d", MatchStatus::Pending, 60)).unwrap();

        ledger.record_decision(id, "a", true).unwrap();
        let decided = ledger.record_decision(id, "b", true).unwrap();
        assert_eq!(decided.status, MatchStatus::Accepted);

        let expired = ledger.expire_pending(at(30));
        assert!(expired.is_empty());
        let expired = ledger.expire_pending(at(90));
        assert_eq!(expired.len(), 1);
        assert!(ledger.already_matched().contains("a"));
        assert!(!ledger.already_matched().contains("c"));

        assert_eq!(
            ledger.record_decision(Uuid::nil(), "a", true).unwrap_err(),
            MatchError::MatchNotFound(Uuid::nil())
        );
    }
}
