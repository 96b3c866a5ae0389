use crate::core::{
    error::MatchError,
    filters::{check_profile, within_age_gap},
    scoring::{ScoreBreakdown, Scorer},
};
use crate::models::{Gender, Match, Profile};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// How a bulk run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BulkOutcome {
    /// At least one pair was produced
    Paired,
    /// Fewer than two users were left after removing already matched ones
    NotEnoughUsers,
    /// Enough users, but no pair passed the gender, age and department rules
    NoCompatiblePairs,
}

/// Result of a bulk matching run
#[derive(Debug, Clone)]
pub struct BulkRunResult {
    pub matches: Vec<Match>,
    pub eligible: usize,
    pub outcome: BulkOutcome,
}

/// Timestamps stamped on every match of one run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchStamp {
    pub created_at: DateTime<Utc>,
    /// System-wide scheduled matching time, identical for every pair of a run
    pub matching_time: DateTime<Utc>,
}

/// Greedy pairing pass over an unmatched population
///
/// # Algorithm
/// 1. Drop users that already hold a pending or accepted match
/// 2. Partition by gender, each side ordered oldest profile first
/// 3. For each male user, take the best scoring female user still free and
///    within the age gap; ties go to the earliest in scan order
///
/// With [`Scorer::Basic`] every score ties, so step 3 is plain first-fit.
/// The run is O(n·m) and fully deterministic for a given input order.
#[derive(Debug, Clone)]
pub struct BulkMatcher {
    scorer: Scorer,
    max_age_gap: u8,
}

impl BulkMatcher {
    pub fn new(scorer: Scorer, max_age_gap: u8) -> Self {
        Self { scorer, max_age_gap }
    }

    /// First-fit matcher on age and gender only
    pub fn basic(max_age_gap: u8) -> Self {
        Self::new(Scorer::Basic, max_age_gap)
    }

    pub fn scorer(&self) -> &Scorer {
        &self.scorer
    }

    pub fn max_age_gap(&self) -> u8 {
        self.max_age_gap
    }

    /// Pair up the pool
    ///
    /// # Arguments
    /// * `pool` - Candidate profiles, in the order the store returned them
    /// * `already_matched` - Ids of users holding a pending or accepted match
    /// * `stamp` - Timestamps written on every produced match
    ///
    /// # Errors
    /// Fails when a profile lacks an id or department, or an id appears twice.
    pub fn run(
        &self,
        pool: &[Profile],
        already_matched: &HashSet<String>,
        stamp: MatchStamp,
    ) -> Result<BulkRunResult, MatchError> {
        let mut seen = HashSet::with_capacity(pool.len());
        for profile in pool {
            check_profile(profile)?;
            if !seen.insert(profile.user_id.as_str()) {
                return Err(MatchError::DuplicateProfile(profile.user_id.clone()));
            }
        }

        let eligible: Vec<&Profile> = pool
            .iter()
            .filter(|profile| !already_matched.contains(&profile.user_id))
            .collect();
        let eligible_count = eligible.len();

        if eligible_count < 2 {
            tracing::debug!("Bulk run skipped: only {} eligible users", eligible_count);
            return Ok(BulkRunResult {
                matches: Vec::new(),
                eligible: eligible_count,
                outcome: BulkOutcome::NotEnoughUsers,
            });
        }

        let (mut seekers, mut partners): (Vec<&Profile>, Vec<&Profile>) = eligible
            .into_iter()
            .partition(|profile| profile.gender == Gender::Male);

        // Stable sorts keep input order among equal creation times
        seekers.sort_by_key(|profile| profile.created_at);
        partners.sort_by_key(|profile| profile.created_at);

        let mut taken = vec![false; partners.len()];
        let mut matches = Vec::new();

        for seeker in &seekers {
            let Some((idx, breakdown)) = self.pick_partner(seeker, &partners, &taken) else {
                tracing::trace!("No partner left for {}", seeker.user_id);
                continue;
            };

            taken[idx] = true;
            let partner = partners[idx];

            let mut pair = Match::pending(
                &seeker.user_id,
                &partner.user_id,
                stamp.created_at,
                stamp.matching_time,
            );
            if self.scorer.is_scored() {
                pair = pair.scored(breakdown.total, breakdown.components);
            }
            matches.push(pair);
        }

        let outcome = if matches.is_empty() {
            BulkOutcome::NoCompatiblePairs
        } else {
            BulkOutcome::Paired
        };

        tracing::debug!(
            "Bulk run paired {} couples from {} eligible users ({} male, {} female)",
            matches.len(),
            eligible_count,
            seekers.len(),
            partners.len()
        );

        Ok(BulkRunResult {
            matches,
            eligible: eligible_count,
            outcome,
        })
    }

    /// Best free partner for `seeker`, earliest wins on equal score
    fn pick_partner(
        &self,
        seeker: &Profile,
        partners: &[&Profile],
        taken: &[bool],
    ) -> Option<(usize, ScoreBreakdown)> {
        let mut best: Option<(usize, ScoreBreakdown)> = None;

        for (idx, partner) in partners.iter().enumerate() {
            if taken[idx] || !within_age_gap(seeker, partner, self.max_age_gap) {
                continue;
            }

            let Some(breakdown) = self.scorer.score(seeker, partner).into_breakdown() else {
                continue;
            };

            let better = best
                .as_ref()
                .map_or(true, |(_, current)| breakdown.total > current.total);
            if better {
                best = Some((idx, breakdown));
                if !self.scorer.is_scored() {
                    break;
                }
            }
        }

        best
    }
}
