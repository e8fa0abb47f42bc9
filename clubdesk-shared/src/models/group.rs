/// Training groups
///
/// A group trains on a fixed set of weekdays at one start time and occupies
/// one or more field blocks while it does. Students and teachers point at a
/// group; deleting the group detaches them.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE groups (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     name VARCHAR(100) NOT NULL,
///     schedule_time TIME NOT NULL,
///     duration_minutes INTEGER NOT NULL DEFAULT 60,
///     schedule_days INTEGER[] NOT NULL DEFAULT '{}',
///     late_threshold INTEGER NOT NULL DEFAULT 15,
///     max_students INTEGER,
///     field_block_indices INTEGER[] NOT NULL DEFAULT '{0}',
///     notes TEXT,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```

use chrono::{DateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, PgExecutor, PgPool};
use uuid::Uuid;

use super::deserialize_some;
use crate::schedule::{day_label, normalize_block_indices, GroupSlot};

/// Training group
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Group {
    pub id: Uuid,
    pub name: String,

    /// Start time, club-local
    pub schedule_time: NaiveTime,

    pub duration_minutes: i32,

    /// ISO weekdays, sorted and unique
    pub schedule_days: Vec<i32>,

    /// Minutes after the start before a check-in counts as late
    pub late_threshold: i32,

    /// `None` means unlimited
    pub max_students: Option<i32>,

    /// Field blocks the group occupies, sorted and unique
    pub field_block_indices: Vec<i32>,

    pub notes: Option<String>,

    pub created_at: DateTime<Utc>,
}

/// Group with its enrollment counts
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct GroupWithCounts {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub group: Group,

    pub student_count: i64,

    pub active_student_count: i64,
}

impl GroupWithCounts {
    pub fn is_full(&self) -> bool {
        self.group
            .max_students
            .is_some_and(|max| self.active_student_count >= i64::from(max))
    }
}

/// Input for creating a group
#[derive(Debug, Clone)]
pub struct CreateGroup {
    pub name: String,
    pub schedule_time: NaiveTime,
    pub duration_minutes: i32,
    pub schedule_days: Vec<i32>,
    pub late_threshold: i32,
    pub max_students: Option<i32>,
    pub field_block_indices: Vec<i32>,
    pub notes: Option<String>,
}

/// Partial group update; `None` leaves a field untouched
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateGroup {
    pub name: Option<String>,
    pub schedule_time: Option<NaiveTime>,
    pub duration_minutes: Option<i32>,
    pub schedule_days: Option<Vec<i32>>,
    pub late_threshold: Option<i32>,

    #[serde(default, deserialize_with = "deserialize_some")]
    pub max_students: Option<Option<i32>>,

    pub field_block_indices: Option<Vec<i32>>,

    #[serde(default, deserialize_with = "deserialize_some")]
    pub notes: Option<Option<String>>,
}

/// Active enrollment of one group, read under a row lock
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct GroupCapacity {
    pub name: String,
    pub max_students: Option<i32>,
    pub active_students: i64,
}

impl GroupCapacity {
    pub fn is_full(&self) -> bool {
        self.max_students
            .is_some_and(|max| self.active_students >= i64::from(max))
    }

    /// `Group "U10" is full (12/12)`
    pub fn full_message(&self) -> String {
        format!(
            "Group \"{}\" is full ({}/{})",
            self.name,
            self.active_students,
            self.max_students.unwrap_or_default()
        )
    }
}

impl Group {
    /// Schedule view used by the slot validator
    pub fn to_slot(&self) -> GroupSlot {
        GroupSlot {
            id: Some(self.id),
            name: self.name.clone(),
            start: self.schedule_time,
            duration_minutes: self.duration_minutes,
            days: self.schedule_days.clone(),
            blocks: self.field_block_indices.clone(),
        }
    }

    /// Number of field blocks the group occupies
    pub fn field_blocks(&self) -> usize {
        self.field_block_indices.len()
    }

    /// `"Mon, Wed, Fri"`
    pub fn days_label(&self) -> String {
        self.schedule_days
            .iter()
            .map(|d| day_label(*d))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Applies a partial update, normalizing days and blocks
    pub fn apply(&self, patch: UpdateGroup) -> Group {
        let mut group = self.clone();

        if let Some(name) = patch.name {
            group.name = name.trim().to_string();
        }
        if let Some(time) = patch.schedule_time {
            group.schedule_time = time;
        }
        if let Some(duration) = patch.duration_minutes {
            group.duration_minutes = duration;
        }
        if let Some(days) = patch.schedule_days {
            group.schedule_days = normalize_days(&days);
        }
        if let Some(threshold) = patch.late_threshold {
            group.late_threshold = threshold;
        }
        if let Some(max) = patch.max_students {
            group.max_students = max;
        }
        if let Some(blocks) = patch.field_block_indices {
            group.field_block_indices = normalize_block_indices(&blocks);
        }
        if let Some(notes) = patch.notes {
            group.notes = notes;
        }

        group
    }

    pub async fn create(pool: &PgPool, data: CreateGroup) -> Result<Self, sqlx::Error> {
        let group = sqlx::query_as::<_, Group>(
            r#"
            INSERT INTO groups (name, schedule_time, duration_minutes, schedule_days,
                                late_threshold, max_students, field_block_indices, notes)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING id, name, schedule_time, duration_minutes, schedule_days, late_threshold,
                      max_students, field_block_indices, notes, created_at
            "#,
        )
        .bind(data.name)
        .bind(data.schedule_time)
        .bind(data.duration_minutes)
        .bind(normalize_days(&data.schedule_days))
        .bind(data.late_threshold)
        .bind(data.max_students)
        .bind(normalize_block_indices(&data.field_block_indices))
        .bind(data.notes)
        .fetch_one(pool)
        .await?;

        tracing::info!(group_id = %group.id, name = %group.name, "Group created");

        Ok(group)
    }

    pub async fn find_by_id<'e, E: PgExecutor<'e>>(
        executor: E,
        id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Group>(
            r#"
            SELECT id, name, schedule_time, duration_minutes, schedule_days, late_threshold,
                   max_students, field_block_indices, notes, created_at
            FROM groups
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(executor)
        .await
    }

    /// All groups, used for schedule validation
    pub async fn list(pool: &PgPool) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Group>(
            r#"
            SELECT id, name, schedule_time, duration_minutes, schedule_days, late_threshold,
                   max_students, field_block_indices, notes, created_at
            FROM groups
            ORDER BY schedule_time, name
            "#,
        )
        .fetch_all(pool)
        .await
    }

    /// All groups with total and active enrollment, by start time
    pub async fn list_with_counts(pool: &PgPool) -> Result<Vec<GroupWithCounts>, sqlx::Error> {
        sqlx::query_as::<_, GroupWithCounts>(
            r#"
            SELECT g.id, g.name, g.schedule_time, g.duration_minutes, g.schedule_days,
                   g.late_threshold, g.max_students, g.field_block_indices, g.notes, g.created_at,
                   COUNT(s.id) AS student_count,
                   COUNT(s.id) FILTER (WHERE s.status = 'active') AS active_student_count
            FROM groups g
            LEFT JOIN students s ON s.group_id = g.id
            GROUP BY g.id
            ORDER BY g.schedule_time, g.name
            "#,
        )
        .fetch_all(pool)
        .await
    }

    /// Writes every editable column of `group` back
    pub async fn save(pool: &PgPool, group: &Group) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Group>(
            r#"
            UPDATE groups
            SET name = $2, schedule_time = $3, duration_minutes = $4, schedule_days = $5,
                late_threshold = $6, max_students = $7, field_block_indices = $8, notes = $9
            WHERE id = $1
            RETURNING id, name, schedule_time, duration_minutes, schedule_days, late_threshold,
                      max_students, field_block_indices, notes, created_at
            "#,
        )
        .bind(group.id)
        .bind(&group.name)
        .bind(group.schedule_time)
        .bind(group.duration_minutes)
        .bind(&group.schedule_days)
        .bind(group.late_threshold)
        .bind(group.max_students)
        .bind(&group.field_block_indices)
        .bind(&group.notes)
        .fetch_optional(pool)
        .await
    }

    /// Detaches students and teachers, then deletes the group
    ///
    /// Returns the number of students that were detached, or `None` if the
    /// group did not exist.
    pub async fn delete(pool: &PgPool, id: Uuid) -> Result<Option<u64>, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let detached = sqlx::query("UPDATE students SET group_id = NULL WHERE group_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        sqlx::query("UPDATE users SET group_id = NULL WHERE group_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        let deleted = sqlx::query("DELETE FROM groups WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        if deleted == 0 {
            return Ok(None);
        }

        tx.commit().await?;

        tracing::info!(group_id = %id, detached, "Group deleted");

        Ok(Some(detached))
    }

    /// Locks the group row and counts its active students
    ///
    /// Must run inside a transaction so concurrent enrollments serialize on
    /// the lock.
    pub async fn capacity_for_update(
        conn: &mut PgConnection,
        id: Uuid,
    ) -> Result<Option<GroupCapacity>, sqlx::Error> {
        let locked: Option<(String, Option<i32>)> =
            sqlx::query_as("SELECT name, max_students FROM groups WHERE id = $1 FOR UPDATE")
                .bind(id)
                .fetch_optional(&mut *conn)
                .await?;

        let Some((name, max_students)) = locked else {
            return Ok(None);
        };

        let (active_students,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM students WHERE group_id = $1 AND status = 'active'",
        )
        .bind(id)
        .fetch_one(&mut *conn)
        .await?;

        Ok(Some(GroupCapacity {
            name,
            max_students,
            active_students,
        }))
    }
}

fn normalize_days(days: &[i32]) -> Vec<i32> {
    let mut days: Vec<i32> = days.iter().copied().filter(|d| (1..=7).contains(d)).collect();
    days.sort_unstable();
    days.dedup();
    days
}

#[cfg(test)]
mod tests {
    use super::*;

    fn group() -> Group {
        Group {
            id: Uuid::new_v4(),
            name: "U10".to_string(),
            schedule_time: NaiveTime::from_hms_opt(16, 0, 0).unwrap(),
            duration_minutes: 90,
            schedule_days: vec![1, 3, 5],
            late_threshold: 15,
            max_students: Some(2),
            field_block_indices: vec![0, 1],
            notes: Some("indoor in winter".to_string()),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_days_label_and_blocks() {
        let g = group();
        assert_eq!(g.days_label(), "Mon, Wed, Fri");
        assert_eq!(g.field_blocks(), 2);
    }

    #[test]
    fn test_to_slot() {
        let g = group();
        let slot = g.to_slot();

        assert_eq!(slot.id, Some(g.id));
        assert_eq!(slot.days, vec![1, 3, 5]);
        assert_eq!(slot.blocks, vec![0, 1]);
        assert_eq!(slot.duration_minutes, 90);
    }

    #[test]
    fn test_apply_normalizes_and_clears() {
        let patch: UpdateGroup = serde_json::from_value(serde_json::json!({
            "name": "  U12 ",
            "schedule_days": [5, 1, 1, 9],
            "field_block_indices": [3, -1, 2, 3],
            "max_students": null,
        }))
        .unwrap();

        let updated = group().apply(patch);

        assert_eq!(updated.name, "U12");
        assert_eq!(updated.schedule_days, vec![1, 5]);
        assert_eq!(updated.field_block_indices, vec![2, 3]);
        assert_eq!(updated.max_students, None);
        assert_eq!(updated.notes.as_deref(), Some("indoor in winter"));
    }

    #[test]
    fn test_group_with_counts_is_full() {
        let full = GroupWithCounts {
            group: group(),
            student_count: 5,
            active_student_count: 2,
        };
        assert!(full.is_full());

        let mut unlimited = full.clone();
        unlimited.group.max_students = None;
        assert!(!unlimited.is_full());
    }

    #[test]
    fn test_capacity_message() {
        let capacity = GroupCapacity {
            name: "U10".to_string(),
            max_students: Some(12),
            active_students: 12,
        };

        assert!(capacity.is_full());
        assert_eq!(capacity.full_message(), "Group \"U10\" is full (12/12)");
    }
}
