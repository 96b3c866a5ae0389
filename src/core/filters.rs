use crate::core::error::MatchError;
use crate::models::{Preference, Profile};
use validator::Validate;

/// Reject profiles missing the fields the hard-exclusion rule depends on
pub fn check_profile(profile: &Profile) -> Result<(), MatchError> {
    if let Err(errors) = profile.validate() {
        return Err(MatchError::InvalidProfile {
            user_id: profile.user_id.clone(),
            reason: errors.to_string(),
        });
    }

    if profile.department.trim().is_empty() {
        return Err(MatchError::InvalidProfile {
            user_id: profile.user_id.clone(),
            reason: "department is blank".to_string(),
        });
    }

    Ok(())
}

/// Check that two profiles are within the allowed age gap
#[inline]
pub fn within_age_gap(a: &Profile, b: &Profile, max_age_gap: u8) -> bool {
    a.age.abs_diff(b.age) <= max_age_gap
}

#[inline]
pub fn is_opposite_gender(a: &Profile, b: &Profile) -> bool {
    a.gender != b.gender
}

/// Check if a candidate satisfies the owner's declared preferences
///
/// Each axis filters only when set. A candidate whose height bucket cannot
/// be read as centimetres passes the height axis.
#[inline]
pub fn matches_preference(owner: &Profile, preference: &Preference, candidate: &Profile) -> bool {
    if !preference.age.accepts(owner.age, candidate.age) {
        return false;
    }

    if let (Some(range), Some(height_cm)) = (preference.height, candidate.height_cm()) {
        if !range.contains(height_cm) {
            return false;
        }
    }

    if !preference.mbti.is_empty() && !preference.mbti.contains(&candidate.mbti) {
        return false;
    }

    true
}
