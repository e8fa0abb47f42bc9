/// Reward types, issued rewards and rating queries
///
/// Issuing a reward copies the type's name and points into
/// `student_rewards`, so editing or deleting a type never rewrites history.
/// Rewards are filed under the club-local month they were issued in.
///
/// # Example
///
/// ```no_run
/// use clubdesk_shared::models::reward::StudentReward;
/// use clubdesk_shared::rating::reward_window;
/// use chrono::NaiveDate;
/// use sqlx::PgPool;
/// use uuid::Uuid;
///
/// # async fn example(pool: PgPool, student: Uuid) -> Result<(), sqlx::Error> {
/// let today = NaiveDate::from_ymd_opt(2025, 5, 14).unwrap();
/// let window = reward_window(3, today);
/// let points = StudentReward::points_in_window(&pool, student, window).await?;
/// # Ok(())
/// # }
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use super::deserialize_some;
use crate::billing::YearMonth;
use crate::rating::{RatingEntry, RewardWindow};

/// Kind of reward a teacher can hand out
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct RewardType {
    pub id: Uuid,
    pub name: String,
    pub points: i32,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CreateRewardType {
    pub name: String,
    pub points: i32,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateRewardType {
    pub name: Option<String>,
    pub points: Option<i32>,

    #[serde(default, deserialize_with = "deserialize_some")]
    pub description: Option<Option<String>>,
}

/// A reward given to a student
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct StudentReward {
    pub id: Uuid,
    pub student_id: Uuid,
    pub reward_type_id: Option<Uuid>,
    pub points: i32,
    pub reward_name: String,
    pub issued_by: Option<Uuid>,
    pub issued_at: DateTime<Utc>,
    pub month: i32,
    pub year: i32,
}

/// Issued reward with the issuer's username ("System" when unknown)
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct IssuedReward {
    pub id: Uuid,
    pub reward_name: String,
    pub points: i32,
    pub issued_at: DateTime<Utc>,
    pub issuer_name: String,
}

/// Rating line tagged with the student's group
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct GroupRatingRow {
    pub group_id: Uuid,

    #[sqlx(flatten)]
    pub entry: RatingEntry,
}

/// Points of one student in one month of a year
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct MonthlyPointsRow {
    pub group_id: Uuid,
    pub month: i32,

    #[sqlx(flatten)]
    pub entry: RatingEntry,
}

impl RewardType {
    pub fn apply(&self, patch: UpdateRewardType) -> RewardType {
        let mut reward = self.clone();

        if let Some(name) = patch.name {
            reward.name = name.trim().to_string();
        }
        if let Some(points) = patch.points {
            reward.points = points;
        }
        if let Some(description) = patch.description {
            reward.description = description
                .map(|d| d.trim().to_string())
                .filter(|d| !d.is_empty());
        }

        reward
    }

    pub async fn create(pool: &PgPool, data: CreateRewardType) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, RewardType>(
            r#"
            INSERT INTO reward_types (name, points, description)
            VALUES ($1, $2, $3)
            RETURNING id, name, points, description, created_at, updated_at
            "#,
        )
        .bind(data.name)
        .bind(data.points)
        .bind(data.description)
        .fetch_one(pool)
        .await
    }

    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, RewardType>(
            r#"
            SELECT id, name, points, description, created_at, updated_at
            FROM reward_types
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    /// Newest first
    pub async fn list(pool: &PgPool) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, RewardType>(
            r#"
            SELECT id, name, points, description, created_at, updated_at
            FROM reward_types
            ORDER BY created_at DESC
            "#,
        )
        .fetch_all(pool)
        .await
    }

    pub async fn save(pool: &PgPool, reward: &RewardType) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, RewardType>(
            r#"
            UPDATE reward_types
            SET name = $2, points = $3, description = $4, updated_at = NOW()
            WHERE id = $1
            RETURNING id, name, points, description, created_at, updated_at
            "#,
        )
        .bind(reward.id)
        .bind(&reward.name)
        .bind(reward.points)
        .bind(&reward.description)
        .fetch_optional(pool)
        .await
    }

    /// Deletes a reward type and returns its name
    ///
    /// Issued rewards keep their copied name and points.
    pub async fn delete(pool: &PgPool, id: Uuid) -> Result<Option<String>, sqlx::Error> {
        let deleted: Option<(String,)> =
            sqlx::query_as("DELETE FROM reward_types WHERE id = $1 RETURNING name")
                .bind(id)
                .fetch_optional(pool)
                .await?;

        Ok(deleted.map(|(name,)| name))
    }
}

impl StudentReward {
    /// Gives `reward` to a student, filed under `month`
    pub async fn issue(
        pool: &PgPool,
        student_id: Uuid,
        reward: &RewardType,
        issued_by: Uuid,
        month: YearMonth,
    ) -> Result<Self, sqlx::Error> {
        let issued = sqlx::query_as::<_, StudentReward>(
            r#"
            INSERT INTO student_rewards (student_id, reward_type_id, points, reward_name,
                                         issued_by, month, year)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id, student_id, reward_type_id, points, reward_name, issued_by, issued_at,
                      month, year
            "#,
        )
        .bind(student_id)
        .bind(reward.id)
        .bind(reward.points)
        .bind(&reward.name)
        .bind(issued_by)
        .bind(month.month as i32)
        .bind(month.year)
        .fetch_one(pool)
        .await?;

        tracing::info!(
            student_id = %student_id,
            reward = %reward.name,
            points = reward.points,
            "Reward issued"
        );

        Ok(issued)
    }

    /// A student's rewards filed under one month, newest first
    pub async fn list_for_month(
        pool: &PgPool,
        student_id: Uuid,
        month: YearMonth,
    ) -> Result<Vec<IssuedReward>, sqlx::Error> {
        sqlx::query_as::<_, IssuedReward>(
            r#"
            SELECT r.id, r.reward_name, r.points, r.issued_at,
                   COALESCE(u.username, 'System') AS issuer_name
            FROM student_rewards r
            LEFT JOIN users u ON u.id = r.issued_by
            WHERE r.student_id = $1 AND r.year = $2 AND r.month = $3
            ORDER BY r.issued_at DESC
            "#,
        )
        .bind(student_id)
        .bind(month.year)
        .bind(month.month as i32)
        .fetch_all(pool)
        .await
    }

    pub async fn points_in_window(
        pool: &PgPool,
        student_id: Uuid,
        window: RewardWindow,
    ) -> Result<i64, sqlx::Error> {
        let (points,): (i64,) = sqlx::query_as(
            r#"
            SELECT COALESCE(SUM(points), 0)::BIGINT
            FROM student_rewards
            WHERE student_id = $1 AND year = $2 AND month BETWEEN $3 AND $4
            "#,
        )
        .bind(student_id)
        .bind(window.year)
        .bind(window.start_month as i32)
        .bind(window.end_month as i32)
        .fetch_one(pool)
        .await?;

        Ok(points)
    }

    /// Points of active students in `window`, optionally for one group
    ///
    /// Students without points are included with zero; ranking drops them.
    pub async fn window_points(
        pool: &PgPool,
        window: RewardWindow,
        group_id: Option<Uuid>,
    ) -> Result<Vec<GroupRatingRow>, sqlx::Error> {
        sqlx::query_as::<_, GroupRatingRow>(
            r#"
            SELECT s.group_id, s.id AS student_id, s.full_name, s.photo_path,
                   COALESCE(SUM(r.points), 0)::BIGINT AS points
            FROM students s
            LEFT JOIN student_rewards r
                   ON r.student_id = s.id
                  AND r.year = $1
                  AND r.month BETWEEN $2 AND $3
            WHERE s.status = 'active'
              AND s.group_id IS NOT NULL
              AND ($4::UUID IS NULL OR s.group_id = $4)
            GROUP BY s.id
            "#,
        )
        .bind(window.year)
        .bind(window.start_month as i32)
        .bind(window.end_month as i32)
        .bind(group_id)
        .fetch_all(pool)
        .await
    }

    /// Per-month points of active students for a whole year
    pub async fn monthly_points(pool: &PgPool, year: i32) -> Result<Vec<MonthlyPointsRow>, sqlx::Error> {
        sqlx::query_as::<_, MonthlyPointsRow>(
            r#"
            SELECT s.group_id, r.month, s.id AS student_id, s.full_name, s.photo_path,
                   SUM(r.points)::BIGINT AS points
            FROM student_rewards r
            JOIN students s ON s.id = r.student_id
            WHERE r.year = $1
              AND s.status = 'active'
              AND s.group_id IS NOT NULL
            GROUP BY s.group_id, r.month, s.id
            "#,
        )
        .bind(year)
        .fetch_all(pool)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_trims_and_blanks() {
        let reward = RewardType {
            id: Uuid::new_v4(),
            name: "Best player".to_string(),
            points: 3,
            description: Some("match day".to_string()),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        let patch: UpdateRewardType =
            serde_json::from_str(r#"{"name": " MVP ", "description": "   "}"#).unwrap();
        let updated = reward.apply(patch);

        assert_eq!(updated.name, "MVP");
        assert_eq!(updated.points, 3);
        assert_eq!(updated.description, None);
    }
}
