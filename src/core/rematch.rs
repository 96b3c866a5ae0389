use crate::core::{
    error::MatchError,
    filters::{check_profile, is_opposite_gender, matches_preference},
    scoring::{ScoreBreakdown, Scorer},
};
use crate::models::{Preference, Profile};
use std::collections::{HashMap, HashSet};

/// Snapshot a rematch is computed against
#[derive(Debug, Clone, Copy)]
pub struct RematchQuery<'a> {
    pub requester: &'a Profile,
    /// Requester's preference; `None` filters nothing
    pub preference: Option<&'a Preference>,
    /// Candidate pool, which must not contain the requester
    pub candidates: &'a [Profile],
    /// Candidates' own preferences, consulted only for mutual filtering
    pub candidate_preferences: &'a HashMap<String, Preference>,
    /// Prior partners of the requester
    pub exclusion_ids: &'a HashSet<String>,
    /// Users holding a pending or accepted match
    pub active_ids: &'a HashSet<String>,
}

/// Best candidate found for a rematch
#[derive(Debug, Clone, PartialEq)]
pub struct RematchCandidate<'a> {
    pub profile: &'a Profile,
    pub score: ScoreBreakdown,
}

/// Finds the single best new partner for one user
///
/// Pure query over a snapshot: it never mutates state, and the same query
/// always yields the same answer. Cancelling the requester's old match and
/// storing the new one is the caller's job.
#[derive(Debug, Clone)]
pub struct RematchFinder {
    scorer: Scorer,
    mutual_preferences: bool,
}

impl RematchFinder {
    pub fn new(scorer: Scorer) -> Self {
        Self {
            scorer,
            mutual_preferences: false,
        }
    }

    /// Also require each candidate's own preference to accept the requester
    pub fn with_mutual_preferences(mut self, enabled: bool) -> Self {
        self.mutual_preferences = enabled;
        self
    }

    pub fn mutual_preferences(&self) -> bool {
        self.mutual_preferences
    }

    /// Find the highest scoring eligible candidate
    ///
    /// Candidates are dropped when they are excluded, active, of the same
    /// gender, outside the requester's preference, or from the same
    /// department. The highest score wins; ties go to the oldest profile,
    /// then to input order.
    ///
    /// # Returns
    /// `Ok(None)` when nobody survives filtering.
    ///
    /// # Errors
    /// Fails when the requester appears among the candidates, or any
    /// profile lacks an id or department.
    pub fn find<'a>(
        &self,
        query: &RematchQuery<'a>,
    ) -> Result<Option<RematchCandidate<'a>>, MatchError> {
        let requester = query.requester;
        check_profile(requester)?;

        for candidate in query.candidates {
            if candidate.user_id == requester.user_id {
                return Err(MatchError::RequesterInCandidates(requester.user_id.clone()));
            }
            check_profile(candidate)?;
        }

        let mut best: Option<RematchCandidate<'a>> = None;

        for candidate in query.candidates.iter() {
            if query.exclusion_ids.contains(&candidate.user_id)
                || query.active_ids.contains(&candidate.user_id)
                || !is_opposite_gender(requester, candidate)
            {
                continue;
            }

            if let Some(preference) = query.preference {
                if !matches_preference(requester, preference, candidate) {
                    continue;
                }
            }

            if self.mutual_preferences {
                if let Some(theirs) = query.candidate_preferences.get(&candidate.user_id) {
                    if !matches_preference(candidate, theirs, requester) {
                        continue;
                    }
                }
            }

            let Some(score) = self.scorer.score(requester, candidate).into_breakdown() else {
                tracing::trace!(
                    "Rematch for {} skipped {}: same department",
                    requester.user_id,
                    candidate.user_id
                );
                continue;
            };

            let better = match &best {
                None => true,
                Some(current) => {
                    score.total > current.score.total
                        || (score.total == current.score.total
                            && candidate.created_at < current.profile.created_at)
                }
            };
            if better {
                best = Some(RematchCandidate {
                    profile: candidate,
                    score,
                });
            }
        }

        match &best {
            Some(found) => tracing::debug!(
                "Rematch for {} found {} with score {}",
                requester.user_id,
                found.profile.user_id,
                found.score.total
            ),
            None => {
                tracing::debug!("Rematch for {} found no eligible candidate", requester.user_id)
            }
        }

        Ok(best)
    }
}

impl Default for RematchFinder {
    fn default() -> Self {
        Self::new(Scorer::default())
    }
}
