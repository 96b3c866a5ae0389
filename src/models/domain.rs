use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use strum::{AsRefStr, Display, EnumString};
use validator::Validate;

/// Binary gender used to partition the matching pool
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Gender {
    Male,
    Female,
}

impl Gender {
    pub fn opposite(self) -> Self {
        match self {
            Gender::Male => Gender::Female,
            Gender::Female => Gender::Male,
        }
    }
}

/// Tier classification, ordered S > A > B > C
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[strum(ascii_case_insensitive)]
pub enum Tier {
    S,
    A,
    B,
    C,
}

impl Tier {
    /// Position in the S > A > B > C ordering, S being 0
    pub fn rank(self) -> u8 {
        match self {
            Tier::S => 0,
            Tier::A => 1,
            Tier::B => 2,
            Tier::C => 3,
        }
    }

    /// Number of steps between two tiers in the ordering
    pub fn steps_from(self, other: Tier) -> u8 {
        self.rank().abs_diff(other.rank())
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Display,
    EnumString, AsRefStr,
)]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE", ascii_case_insensitive)]
pub enum Mbti {
    Intj,
    Intp,
    Entj,
    Entp,
    Infj,
    Infp,
    Enfj,
    Enfp,
    Istj,
    Isfj,
    Estj,
    Esfj,
    Istp,
    Isfp,
    Estp,
    Esfp,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Smoking {
    Never,
    Sometimes,
    Often,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Drinking {
    Never,
    Sometimes,
    Often,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Tattoo {
    None,
    Hidden,
    Visible,
}

/// User profile as supplied by the profile store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct Profile {
    #[validate(length(min = 1))]
    #[serde(rename = "userId")]
    pub user_id: String,
    pub gender: Gender,
    pub age: u8,
    #[validate(length(min = 1))]
    pub department: String,
    pub tier: Tier,
    pub mbti: Mbti,
    pub smoking: Smoking,
    pub drinking: Drinking,
    pub tattoo: Tattoo,
    /// Height bucket such as "170-175"
    pub height: String,
    #[serde(default)]
    pub personalities: BTreeSet<String>,
    #[serde(rename = "datingStyles", default)]
    pub dating_styles: BTreeSet<String>,
    #[serde(default)]
    pub interests: BTreeSet<String>,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
}

impl Profile {
    /// Lower bound of the height bucket in centimetres ("170-175" -> 170)
    pub fn height_cm(&self) -> Option<u16> {
        let digits: String = self
            .height
            .trim()
            .chars()
            .take_while(|c| c.is_ascii_digit())
            .collect();
        digits.parse().ok()
    }
}

/// Desired partner age, either an explicit range or relative to the owner's own age
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum AgePreference {
    Range { min: u8, max: u8 },
    Older,
    Younger,
    Same,
    #[default]
    Any,
}

impl AgePreference {
    pub fn accepts(&self, own_age: u8, candidate_age: u8) -> bool {
        match *self {
            AgePreference::Range { min, max } => candidate_age >= min && candidate_age <= max,
            AgePreference::Older => candidate_age > own_age,
            AgePreference::Younger => candidate_age < own_age,
            AgePreference::Same => candidate_age == own_age,
            AgePreference::Any => true,
        }
    }
}

/// Inclusive height range in centimetres
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeightRange {
    #[serde(rename = "minCm")]
    pub min_cm: u16,
    #[serde(rename = "maxCm")]
    pub max_cm: u16,
}

impl HeightRange {
    pub fn contains(&self, height_cm: u16) -> bool {
        height_cm >= self.min_cm && height_cm <= self.max_cm
    }
}

/// User matching preferences. Every axis is optional; an unset axis never filters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Preference {
    #[serde(rename = "userId")]
    pub user_id: String,
    #[serde(default)]
    pub age: AgePreference,
    #[serde(default)]
    pub height: Option<HeightRange>,
    /// Accepted MBTI types; empty accepts all
    #[serde(default)]
    pub mbti: BTreeSet<Mbti>,
}

impl Preference {
    /// A preference that accepts everyone
    pub fn permissive(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            age: AgePreference::Any,
            height: None,
            mbti: BTreeSet::new(),
        }
    }
}

/// Points awarded by each scoring rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringWeights {
    pub same_tier: u32,
    pub adjacent_tier: u32,
    pub mbti: u32,
    pub smoking: u32,
    pub drinking: u32,
    pub tattoo: u32,
    pub height: u32,
    pub personality: u32,
    pub dating_style: u32,
    pub interest: u32,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            same_tier: 10,
            adjacent_tier: 5,
            mbti: 5,
            smoking: 3,
            drinking: 3,
            tattoo: 3,
            height: 2,
            personality: 2,
            dating_style: 2,
            interest: 1,
        }
    }
}
