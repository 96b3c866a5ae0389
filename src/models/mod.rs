// Model exports
pub mod domain;
pub mod matches;
pub mod requests;
pub mod responses;

pub use domain::{
    AgePreference, Drinking, Gender, HeightRange, Mbti, Preference, Profile, ScoringWeights,
    Smoking, Tattoo, Tier,
};
pub use matches::{Match, MatchStatus, ScoreComponent, ScoreRule};
pub use requests::{DecisionRequest, RematchRequest, RematchRequestStatus};
pub use responses::{BulkRunSummary, RematchOutcome, RematchQueueSummary, RunSummary};
