use crate::models::{Profile, ScoreComponent, ScoreRule, ScoringWeights};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Result of comparing two profiles
///
/// `Excluded` is not a low score: callers must drop the pair before any
/// ranking takes place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Score {
    Excluded,
    Compatible(ScoreBreakdown),
}

impl Score {
    /// Total points, or `None` for an excluded pair
    pub fn points(&self) -> Option<u32> {
        match self {
            Score::Excluded => None,
            Score::Compatible(breakdown) => Some(breakdown.total),
        }
    }

    pub fn is_excluded(&self) -> bool {
        matches!(self, Score::Excluded)
    }

    pub fn into_breakdown(self) -> Option<ScoreBreakdown> {
        match self {
            Score::Excluded => None,
            Score::Compatible(breakdown) => Some(breakdown),
        }
    }
}

/// Total score plus the rules that contributed to it
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScoreBreakdown {
    pub total: u32,
    pub components: Vec<ScoreComponent>,
}

impl ScoreBreakdown {
    fn add(&mut self, rule: ScoreRule, points: u32, shared: Vec<String>) {
        if points == 0 {
            return;
        }
        self.total = self.total.saturating_add(points);
        self.components.push(ScoreComponent { rule, points, shared });
    }
}

/// Configured scoring mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScoringMode {
    /// Constant score: pairing falls back to plain first-fit on age and gender
    #[default]
    Basic,
    /// Weighted attribute rules
    Attribute,
}

/// Scoring function applied by the matchers
///
/// Both variants enforce the same-department exclusion, so the basic pass
/// can never emit a pair the attribute pass would refuse.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scorer {
    Basic,
    Attribute(ScoringWeights),
}

impl Scorer {
    pub fn new(mode: ScoringMode, weights: ScoringWeights) -> Self {
        match mode {
            ScoringMode::Basic => Scorer::Basic,
            ScoringMode::Attribute => Scorer::Attribute(weights),
        }
    }

    pub fn is_scored(&self) -> bool {
        matches!(self, Scorer::Attribute(_))
    }

    pub fn score(&self, a: &Profile, b: &Profile) -> Score {
        if is_hard_excluded(a, b) {
            return Score::Excluded;
        }

        match self {
            Scorer::Basic => Score::Compatible(ScoreBreakdown::default()),
            Scorer::Attribute(weights) => Score::Compatible(attribute_breakdown(a, b, weights)),
        }
    }
}

impl Default for Scorer {
    fn default() -> Self {
        Scorer::Attribute(ScoringWeights::default())
    }
}

/// Score two profiles with the default attribute weights
pub fn score(a: &Profile, b: &Profile) -> Score {
    Scorer::default().score(a, b)
}

/// Same department or major never pairs, whatever the other attributes say
#[inline]
pub fn is_hard_excluded(a: &Profile, b: &Profile) -> bool {
    a.department == b.department
}

/// Accumulate the additive rule points for a pair.
///
/// Every rule is an equality test or a set intersection, so swapping the
/// arguments cannot change the result.
fn attribute_breakdown(a: &Profile, b: &Profile, weights: &ScoringWeights) -> ScoreBreakdown {
    let mut breakdown = ScoreBreakdown::default();

    match a.tier.steps_from(b.tier) {
        0 => breakdown.add(ScoreRule::SameTier, weights.same_tier, Vec::new()),
        1 => breakdown.add(ScoreRule::AdjacentTier, weights.adjacent_tier, Vec::new()),
        _ => {}
    }

    if a.mbti == b.mbti {
        breakdown.add(ScoreRule::Mbti, weights.mbti, Vec::new());
    }
    if a.smoking == b.smoking {
        breakdown.add(ScoreRule::Smoking, weights.smoking, Vec::new());
    }
    if a.drinking == b.drinking {
        breakdown.add(ScoreRule::Drinking, weights.drinking, Vec::new());
    }
    if a.tattoo == b.tattoo {
        breakdown.add(ScoreRule::Tattoo, weights.tattoo, Vec::new());
    }
    if a.height.trim() == b.height.trim() {
        breakdown.add(ScoreRule::Height, weights.height, Vec::new());
    }

    for (rule, weight, left, right) in [
        (ScoreRule::Personality, weights.personality, &a.personalities, &b.personalities),
        (ScoreRule::DatingStyle, weights.dating_style, &a.dating_styles, &b.dating_styles),
        (ScoreRule::Interest, weights.interest, &a.interests, &b.interests),
    ] {
        let shared = shared_values(left, right);
        let points = weight.saturating_mul(shared.len() as u32);
        breakdown.add(rule, points, shared);
    }

    breakdown
}

/// Sorted intersection of two attribute sets
fn shared_values(left: &BTreeSet<String>, right: &BTreeSet<String>) -> Vec<String> {
    left.intersection(right).cloned().collect()
}
