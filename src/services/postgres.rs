use crate::config::DatabaseSettings;
use crate::models::{
    AgePreference, HeightRange, Match, MatchStatus, Mbti, Preference, Profile, RematchRequest,
    RematchRequestStatus, ScoreComponent,
};
use crate::services::store::{MatchStore, ProfileFilter, StoreError, StoreResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::types::Json;
use sqlx::{PgConnection, PgPool, Row};
use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;
use uuid::Uuid;

const PROFILE_COLUMNS: &str = "user_id, gender, age, department, tier, mbti, smoking, drinking, \
     tattoo, height, personalities, dating_styles, interests, created_at";

const MATCH_COLUMNS: &str = "id, user_a, user_b, status, created_at, matching_time, score, \
     rationale, decision_a, decision_b";

/// PostgreSQL-backed match store
///
/// The one-active-match-per-user rule is enforced by the primary key of
/// `active_matches`: a second active row for the same user fails the
/// insert, and the whole transaction rolls back.
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Connect and run migrations
    pub async fn new(
        database_url: &str,
        max_connections: u32,
        min_connections: u32,
        acquire_timeout: Duration,
        idle_timeout: Duration,
    ) -> StoreResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .acquire_timeout(acquire_timeout)
            .idle_timeout(idle_timeout)
            .test_before_acquire(true)
            .connect(database_url)
            .await?;

        sqlx::migrate!("./migrations").run(&pool).await?;

        Ok(Self { pool })
    }

    pub async fn from_settings(settings: &DatabaseSettings) -> StoreResult<Self> {
        tracing::info!(
            "Connecting to PostgreSQL (max: {} connections)",
            settings.max_connections
        );

        Self::new(
            &settings.url,
            settings.max_connections,
            settings.min_connections,
            Duration::from_secs(settings.acquire_timeout_secs),
            Duration::from_secs(settings.idle_timeout_secs),
        )
        .await
    }

    /// Health check for the database connection
    pub async fn health_check(&self) -> StoreResult<bool> {
        sqlx::query("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .map(|_| true)
            .map_err(Into::into)
    }
}

/// Map unique violations on `active_matches` to a conflict
fn write_error(err: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db) = &err {
        if db.is_unique_violation() {
            return StoreError::Conflict(db.message().to_string());
        }
    }
    StoreError::Database(err)
}

/// Read a text column holding a categorical value
fn text_column<T: FromStr>(row: &PgRow, name: &str) -> StoreResult<T> {
    let raw: String = row.try_get(name)?;
    raw.parse()
        .map_err(|_| StoreError::InvalidRecord(format!("{}: unexpected value {:?}", name, raw)))
}

fn small_column<T: TryFrom<i16>>(row: &PgRow, name: &str) -> StoreResult<T> {
    let raw: i16 = row.try_get(name)?;
    narrow(name, raw)
}

fn optional_small_column<T: TryFrom<i16>>(row: &PgRow, name: &str) -> StoreResult<Option<T>> {
    let raw: Option<i16> = row.try_get(name)?;
    raw.map(|v| narrow(name, v)).transpose()
}

/// Convert between integer widths, refusing values the target cannot hold
fn narrow<T, V>(name: &str, value: V) -> StoreResult<T>
where
    T: TryFrom<V>,
    V: Copy + std::fmt::Display,
{
    T::try_from(value)
        .map_err(|_| StoreError::InvalidRecord(format!("{}: out of range {}", name, value)))
}

fn profile_from_row(row: &PgRow) -> StoreResult<Profile> {
    Ok(Profile {
        user_id: row.try_get("user_id")?,
        gender: text_column(row, "gender")?,
        age: small_column(row, "age")?,
        department: row.try_get("department")?,
        tier: text_column(row, "tier")?,
        mbti: text_column(row, "mbti")?,
        smoking: text_column(row, "smoking")?,
        drinking: text_column(row, "drinking")?,
        tattoo: text_column(row, "tattoo")?,
        height: row.try_get("height")?,
        personalities: row.try_get::<Vec<String>, _>("personalities")?.into_iter().collect(),
        dating_styles: row.try_get::<Vec<String>, _>("dating_styles")?.into_iter().collect(),
        interests: row.try_get::<Vec<String>, _>("interests")?.into_iter().collect(),
        created_at: row.try_get("created_at")?,
    })
}

fn preference_from_row(row: &PgRow) -> StoreResult<Preference> {
    let user_id: String = row.try_get("user_id")?;
    let mode: String = row.try_get("age_mode")?;

    let age = match mode.as_str() {
        "range" => {
            let min: Option<u8> = optional_small_column(row, "age_min")?;
            let max: Option<u8> = optional_small_column(row, "age_max")?;
            match (min, max) {
                (Some(min), Some(max)) => AgePreference::Range { min, max },
                _ => {
                    return Err(StoreError::InvalidRecord(format!(
                        "preference {}: range mode without bounds",
                        user_id
                    )))
                }
            }
        }
        "older" => AgePreference::Older,
        "younger" => AgePreference::Younger,
        "same" => AgePreference::Same,
        "any" => AgePreference::Any,
        other => {
            return Err(StoreError::InvalidRecord(format!(
                "preference {}: unknown age mode {:?}",
                user_id, other
            )))
        }
    };

    let height = match (
        optional_small_column::<u16>(row, "height_min_cm")?,
        optional_small_column::<u16>(row, "height_max_cm")?,
    ) {
        (Some(min_cm), Some(max_cm)) => Some(HeightRange { min_cm, max_cm }),
        (Some(min_cm), None) => Some(HeightRange { min_cm, max_cm: u16::MAX }),
        (None, Some(max_cm)) => Some(HeightRange { min_cm: 0, max_cm }),
        (None, None) => None,
    };

    let mbti = row
        .try_get::<Vec<String>, _>("mbti")?
        .iter()
        .map(|raw| {
            Mbti::from_str(raw).map_err(|_| {
                StoreError::InvalidRecord(format!("preference {}: bad mbti {:?}", user_id, raw))
            })
        })
        .collect::<StoreResult<_>>()?;

    Ok(Preference {
        user_id,
        age,
        height,
        mbti,
    })
}

fn match_from_row(row: &PgRow) -> StoreResult<Match> {
    let score = row
        .try_get::<Option<i32>, _>("score")?
        .map(|v| narrow::<u32, i32>("score", v))
        .transpose()?;

    Ok(Match {
        id: row.try_get("id")?,
        user_a: row.try_get("user_a")?,
        user_b: row.try_get("user_b")?,
        status: text_column(row, "status")?,
        created_at: row.try_get("created_at")?,
        matching_time: row.try_get("matching_time")?,
        score,
        rationale: row.try_get::<Json<Vec<ScoreComponent>>, _>("rationale")?.0,
        decision_a: row.try_get("decision_a")?,
        decision_b: row.try_get("decision_b")?,
    })
}

fn rematch_request_from_row(row: &PgRow) -> StoreResult<RematchRequest> {
    Ok(RematchRequest {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        requested_at: row.try_get("requested_at")?,
        status: text_column(row, "status")?,
        match_id: row.try_get("match_id")?,
    })
}

/// Insert a match and claim both members in `active_matches`
async fn insert_match(conn: &mut PgConnection, new_match: &Match) -> StoreResult<()> {
    let query = r#"
        INSERT INTO matches (
            id, user_a, user_b, status, created_at, matching_time, score, rationale,
            decision_a, decision_b
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
    "#;

    let score = new_match
        .score
        .map(|s| narrow::<i32, u32>("score", s))
        .transpose()?;

    sqlx::query(query)
        .bind(new_match.id)
        .bind(&new_match.user_a)
        .bind(&new_match.user_b)
        .bind(new_match.status.as_ref())
        .bind(new_match.created_at)
        .bind(new_match.matching_time)
        .bind(score)
        .bind(Json(&new_match.rationale))
        .bind(new_match.decision_a)
        .bind(new_match.decision_b)
        .execute(&mut *conn)
        .await
        .map_err(write_error)?;

    if new_match.status.holds_members() {
        sqlx::query("INSERT INTO active_matches (user_id, match_id) VALUES ($1, $3), ($2, $3)")
            .bind(&new_match.user_a)
            .bind(&new_match.user_b)
            .bind(new_match.id)
            .execute(&mut *conn)
            .await
            .map_err(write_error)?;
    }

    Ok(())
}

#[async_trait]
impl MatchStore for PostgresStore {
    async fn list_profiles(&self, filter: &ProfileFilter) -> StoreResult<Vec<Profile>> {
        let query = format!(
            r#"
            SELECT {}
            FROM profiles
            WHERE ($1::TEXT IS NULL OR gender = $1)
              AND ($2::TEXT IS NULL OR department = $2)
            ORDER BY created_at ASC, user_id ASC
            "#,
            PROFILE_COLUMNS
        );

        let rows = sqlx::query(&query)
            .bind(filter.gender.map(|g| g.as_ref().to_string()))
            .bind(filter.department.as_deref())
            .fetch_all(&self.pool)
            .await?;

        let profiles = rows.iter().map(profile_from_row).collect::<StoreResult<Vec<_>>>()?;
        tracing::debug!("Loaded {} profiles", profiles.len());
        Ok(profiles)
    }

    async fn get_profile(&self, user_id: &str) -> StoreResult<Option<Profile>> {
        let query = format!("SELECT {} FROM profiles WHERE user_id = $1", PROFILE_COLUMNS);
        let row = sqlx::query(&query)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(profile_from_row).transpose()
    }

    async fn list_preferences(&self) -> StoreResult<HashMap<String, Preference>> {
        let rows = sqlx::query("SELECT * FROM preferences")
            .fetch_all(&self.pool)
            .await?;

        rows.iter()
            .map(|row| preference_from_row(row).map(|p| (p.user_id.clone(), p)))
            .collect()
    }

    async fn get_preference(&self, user_id: &str) -> StoreResult<Option<Preference>> {
        let row = sqlx::query("SELECT * FROM preferences WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(preference_from_row).transpose()
    }

    async fn list_matches(&self) -> StoreResult<Vec<Match>> {
        let query = format!("SELECT {} FROM matches ORDER BY created_at ASC", MATCH_COLUMNS);
        let rows = sqlx::query(&query).fetch_all(&self.pool).await?;

        rows.iter().map(match_from_row).collect()
    }

    async fn get_match(&self, match_id: Uuid) -> StoreResult<Option<Match>> {
        let query = format!("SELECT {} FROM matches WHERE id = $1", MATCH_COLUMNS);
        let row = sqlx::query(&query)
            .bind(match_id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(match_from_row).transpose()
    }

    async fn insert_matches(&self, matches: &[Match]) -> StoreResult<()> {
        let mut tx = self.pool.begin().await?;
        for new_match in matches {
            insert_match(&mut tx, new_match).await?;
        }
        tx.commit().await?;

        tracing::debug!("Inserted {} matches", matches.len());
        Ok(())
    }

    async fn replace_active_match(
        &self,
        user_id: &str,
        new_match: &Match,
    ) -> StoreResult<Option<Uuid>> {
        let mut tx = self.pool.begin().await?;

        let current = sqlx::query(
            r#"
            SELECT m.id, m.status
            FROM active_matches a
            JOIN matches m ON m.id = a.match_id
            WHERE a.user_id = $1
            FOR UPDATE
            "#,
        )
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?;

        let retired = match current {
            Some(row) => {
                let id: Uuid = row.try_get("id")?;
                let status: MatchStatus = text_column(&row, "status")?;
                if status != MatchStatus::Pending {
                    return Err(StoreError::Conflict(format!(
                        "user {} holds {} match {}",
                        user_id, status, id
                    )));
                }

                sqlx::query("UPDATE matches SET status = $2 WHERE id = $1")
                    .bind(id)
                    .bind(MatchStatus::Cancelled.as_ref())
                    .execute(&mut *tx)
                    .await?;
                sqlx::query("DELETE FROM active_matches WHERE match_id = $1")
                    .bind(id)
                    .execute(&mut *tx)
                    .await?;
                Some(id)
            }
            None => None,
        };

        insert_match(&mut tx, new_match).await?;
        tx.commit().await?;

        tracing::debug!(
            "Replaced active match of {} (cancelled: {:?}, new: {})",
            user_id,
            retired,
            new_match.id
        );
        Ok(retired)
    }

    async fn record_decision(
        &self,
        match_id: Uuid,
        user_id: &str,
        accept: bool,
    ) -> StoreResult<Match> {
        let mut tx = self.pool.begin().await?;

        let query = format!("SELECT {} FROM matches WHERE id = $1 FOR UPDATE", MATCH_COLUMNS);
        let row = sqlx::query(&query)
            .bind(match_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("match {}", match_id)))?;

        let mut decided = match_from_row(&row)?;
        decided.record_decision(user_id, accept)?;

        let result = sqlx::query(
            r#"
            UPDATE matches SET status = $2, decision_a = $3, decision_b = $4
            WHERE id = $1 AND status = 'pending'
            "#,
        )
        .bind(decided.id)
        .bind(decided.status.as_ref())
        .bind(decided.decision_a)
        .bind(decided.decision_b)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::Conflict(format!("match {} is no longer pending", match_id)));
        }

        if !decided.status.holds_members() {
            sqlx::query("DELETE FROM active_matches WHERE match_id = $1")
                .bind(decided.id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(decided)
    }

    async fn expire_pending(&self, cutoff: DateTime<Utc>) -> StoreResult<Vec<Uuid>> {
        let mut tx = self.pool.begin().await?;

        let rows = sqlx::query(
            r#"
            UPDATE matches SET status = $1
            WHERE status = 'pending' AND created_at < $2
            RETURNING id
            "#,
        )
        .bind(MatchStatus::Expired.as_ref())
        .bind(cutoff)
        .fetch_all(&mut *tx)
        .await?;

        let expired = rows
            .iter()
            .map(|row| row.try_get::<Uuid, _>("id"))
            .collect::<Result<Vec<_>, _>>()?;

        if !expired.is_empty() {
            sqlx::query("DELETE FROM active_matches WHERE match_id = ANY($1)")
                .bind(&expired)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(expired)
    }

    async fn scheduled_matching_time(&self) -> StoreResult<Option<DateTime<Utc>>> {
        let row = sqlx::query("SELECT matching_time FROM matching_schedule WHERE id = 1")
            .fetch_optional(&self.pool)
            .await?;

        row.map(|r| r.try_get("matching_time"))
            .transpose()
            .map_err(Into::into)
    }

    async fn enqueue_rematch(&self, request: &RematchRequest) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO rematch_requests (id, user_id, requested_at, status, match_id)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(request.id)
        .bind(&request.user_id)
        .bind(request.requested_at)
        .bind(request.status.as_ref())
        .bind(request.match_id)
        .execute(&self.pool)
        .await
        .map_err(write_error)?;

        Ok(())
    }

    async fn pending_rematch_requests(&self) -> StoreResult<Vec<RematchRequest>> {
        let rows = sqlx::query(
            r#"
            SELECT id, user_id, requested_at, status, match_id
            FROM rematch_requests
            WHERE status = $1
            ORDER BY requested_at ASC
            "#,
        )
        .bind(RematchRequestStatus::Requested.as_ref())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(rematch_request_from_row).collect()
    }

    async fn resolve_rematch_request(
        &self,
        request_id: Uuid,
        status: RematchRequestStatus,
        match_id: Option<Uuid>,
    ) -> StoreResult<()> {
        let result = sqlx::query(
            "UPDATE rematch_requests SET status = $2, match_id = $3 WHERE id = $1",
        )
            .bind(request_id)
            .bind(status.as_ref())
            .bind(match_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("rematch request {}", request_id)));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_narrow_keeps_values_in_range() {
        assert_eq!(narrow::<u8, i16>("age_min", 25).unwrap(), 25);
        assert_eq!(narrow::<u16, i16>("height_min_cm", 180).unwrap(), 180);
        assert_eq!(narrow::<i32, u32>("score", 42).unwrap(), 42);
    }

    #[test]
    fn test_narrow_rejects_out_of_range() {
        for result in [
            narrow::<u8, i16>("age_max", 300).map(u32::from),
            narrow::<u8, i16>("age_min", -1).map(u32::from),
            narrow::<u32, i32>("score", -5),
        ] {
            assert!(matches!(result, Err(StoreError::InvalidRecord(_))));
        }

        let err = narrow::<i32, u32>("score", u32::MAX).unwrap_err();
        assert!(err.to_string().contains("score: out of range"));
    }
}
