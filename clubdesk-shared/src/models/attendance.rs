/// Attendance records
///
/// One record per student per club-local date, enforced by the
/// `attendance_student_date_key` unique constraint. Every record counts as an
/// attended lesson in the balance formula.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, PgExecutor, PgPool};
use uuid::Uuid;

use super::student::{BalanceFacts, BALANCE_COLUMNS, BALANCE_JOINS};

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Attendance {
    pub id: Uuid,
    pub student_id: Uuid,
    pub check_in: DateTime<Utc>,
    pub check_out: Option<DateTime<Utc>>,

    /// Club-local date of the check-in
    pub date: NaiveDate,

    /// False for club-funded students
    pub lesson_deducted: bool,

    pub is_late: bool,
    pub late_minutes: i32,
}

#[derive(Debug, Clone)]
pub struct CreateAttendance {
    pub student_id: Uuid,
    pub check_in: DateTime<Utc>,
    pub date: NaiveDate,
    pub lesson_deducted: bool,
    pub is_late: bool,
    pub late_minutes: i32,
}

/// Attendance record with the student's name, group and balance inputs
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AttendanceRow {
    #[sqlx(flatten)]
    pub attendance: Attendance,

    pub student_name: String,
    pub group_name: Option<String>,
    pub photo_path: Option<String>,

    #[sqlx(flatten)]
    pub facts: BalanceFacts,
}

/// Filters for the attendance journal; all optional
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AttendanceFilter {
    pub year: Option<i32>,
    pub month: Option<i32>,
    pub group_id: Option<Uuid>,
    pub student_id: Option<Uuid>,
}

/// Check-in count for one bucket (month number, ISO weekday)
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::FromRow)]
pub struct BucketCount {
    pub bucket: i32,
    pub count: i64,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct GroupCount {
    pub group_name: String,
    pub count: i64,
}

/// Raw lateness numbers for one year
#[derive(Debug, Clone, Copy, sqlx::FromRow)]
pub struct LateTotals {
    pub total: i64,
    pub late: i64,
    pub avg_late_minutes: Option<f64>,
}

const ROW_SELECT: &str = "a.id, a.student_id, a.check_in, a.check_out, a.date, \
    a.lesson_deducted, a.is_late, a.late_minutes, s.full_name AS student_name, \
    g.name AS group_name, s.photo_path";

impl Attendance {
    /// Inserts a check-in
    ///
    /// # Errors
    ///
    /// Unique violation on `attendance_student_date_key` when the student
    /// already has a record for that date.
    pub async fn create(
        conn: &mut PgConnection,
        data: CreateAttendance,
    ) -> Result<Self, sqlx::Error> {
        let record = sqlx::query_as::<_, Attendance>(
            r#"
            INSERT INTO attendance (student_id, check_in, date, lesson_deducted, is_late, late_minutes)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, student_id, check_in, check_out, date, lesson_deducted, is_late, late_minutes
            "#,
        )
        .bind(data.student_id)
        .bind(data.check_in)
        .bind(data.date)
        .bind(data.lesson_deducted)
        .bind(data.is_late)
        .bind(data.late_minutes)
        .fetch_one(conn)
        .await?;

        tracing::debug!(
            student_id = %record.student_id,
            date = %record.date,
            is_late = record.is_late,
            "Attendance recorded"
        );

        Ok(record)
    }

    pub async fn find_for_day<'e, E: PgExecutor<'e>>(
        executor: E,
        student_id: Uuid,
        date: NaiveDate,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Attendance>(
            r#"
            SELECT id, student_id, check_in, check_out, date, lesson_deducted, is_late, late_minutes
            FROM attendance
            WHERE student_id = $1 AND date = $2
            "#,
        )
        .bind(student_id)
        .bind(date)
        .fetch_optional(executor)
        .await
    }

    /// Rewrites the lateness of an existing record
    pub async fn set_lateness(
        conn: &mut PgConnection,
        id: Uuid,
        is_late: bool,
        late_minutes: i32,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Attendance>(
            r#"
            UPDATE attendance
            SET is_late = $2, late_minutes = $3
            WHERE id = $1
            RETURNING id, student_id, check_in, check_out, date, lesson_deducted, is_late, late_minutes
            "#,
        )
        .bind(id)
        .bind(is_late)
        .bind(late_minutes)
        .fetch_one(conn)
        .await
    }

    /// Deletes a record and returns the student it belonged to
    pub async fn delete(pool: &PgPool, id: Uuid) -> Result<Option<Uuid>, sqlx::Error> {
        let deleted: Option<(Uuid,)> =
            sqlx::query_as("DELETE FROM attendance WHERE id = $1 RETURNING student_id")
                .bind(id)
                .fetch_optional(pool)
                .await?;

        Ok(deleted.map(|(student_id,)| student_id))
    }

    /// Removes a student's record for a date; `true` if one existed
    pub async fn delete_for_day(
        conn: &mut PgConnection,
        student_id: Uuid,
        date: NaiveDate,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM attendance WHERE student_id = $1 AND date = $2")
            .bind(student_id)
            .bind(date)
            .execute(conn)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn count_on(pool: &PgPool, date: NaiveDate) -> Result<i64, sqlx::Error> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM attendance WHERE date = $1")
            .bind(date)
            .fetch_one(pool)
            .await?;

        Ok(count)
    }

    /// Everyone checked in on `date`, in check-in order
    pub async fn list_for_day(pool: &PgPool, date: NaiveDate) -> Result<Vec<AttendanceRow>, sqlx::Error> {
        let query = format!(
            r#"
            SELECT {ROW_SELECT}, {BALANCE_COLUMNS}
            FROM attendance a
            JOIN students s ON s.id = a.student_id
            LEFT JOIN groups g ON g.id = s.group_id
            {BALANCE_JOINS}
            WHERE a.date = $1
            ORDER BY a.check_in
            "#
        );

        sqlx::query_as::<_, AttendanceRow>(&query)
            .bind(date)
            .fetch_all(pool)
            .await
    }

    /// The attendance journal, newest first
    pub async fn list_filtered(
        pool: &PgPool,
        filter: &AttendanceFilter,
    ) -> Result<Vec<AttendanceRow>, sqlx::Error> {
        let query = format!(
            r#"
            SELECT {ROW_SELECT}, {BALANCE_COLUMNS}
            FROM attendance a
            JOIN students s ON s.id = a.student_id
            LEFT JOIN groups g ON g.id = s.group_id
            {BALANCE_JOINS}
            WHERE ($1::INT IS NULL OR EXTRACT(YEAR FROM a.date)::INT = $1)
              AND ($2::INT IS NULL OR EXTRACT(MONTH FROM a.date)::INT = $2)
              AND ($3::UUID IS NULL OR s.group_id = $3)
              AND ($4::UUID IS NULL OR a.student_id = $4)
            ORDER BY a.check_in DESC
            "#
        );

        sqlx::query_as::<_, AttendanceRow>(&query)
            .bind(filter.year)
            .bind(filter.month)
            .bind(filter.group_id)
            .bind(filter.student_id)
            .fetch_all(pool)
            .await
    }

    /// Years that have attendance, newest first
    pub async fn years(pool: &PgPool) -> Result<Vec<i32>, sqlx::Error> {
        let rows: Vec<(i32,)> = sqlx::query_as(
            "SELECT DISTINCT EXTRACT(YEAR FROM date)::INT AS year FROM attendance ORDER BY year DESC",
        )
        .fetch_all(pool)
        .await?;

        Ok(rows.into_iter().map(|(year,)| year).collect())
    }

    /// Records of one group's students on `date`
    pub async fn for_group_on(
        pool: &PgPool,
        group_id: Uuid,
        date: NaiveDate,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Attendance>(
            r#"
            SELECT a.id, a.student_id, a.check_in, a.check_out, a.date, a.lesson_deducted,
                   a.is_late, a.late_minutes
            FROM attendance a
            JOIN students s ON s.id = a.student_id
            WHERE s.group_id = $1 AND a.date = $2
            "#,
        )
        .bind(group_id)
        .bind(date)
        .fetch_all(pool)
        .await
    }

    /// Check-ins per month (1..=12) of `year`; empty months are absent
    pub async fn monthly_counts(pool: &PgPool, year: i32) -> Result<Vec<BucketCount>, sqlx::Error> {
        sqlx::query_as::<_, BucketCount>(
            r#"
            SELECT EXTRACT(MONTH FROM date)::INT AS bucket, COUNT(*) AS count
            FROM attendance
            WHERE EXTRACT(YEAR FROM date)::INT = $1
            GROUP BY bucket
            "#,
        )
        .bind(year)
        .fetch_all(pool)
        .await
    }

    /// Check-ins per ISO weekday (1 = Monday) of `year`
    pub async fn weekday_counts(pool: &PgPool, year: i32) -> Result<Vec<BucketCount>, sqlx::Error> {
        sqlx::query_as::<_, BucketCount>(
            r#"
            SELECT EXTRACT(ISODOW FROM date)::INT AS bucket, COUNT(*) AS count
            FROM attendance
            WHERE EXTRACT(YEAR FROM date)::INT = $1
            GROUP BY bucket
            "#,
        )
        .bind(year)
        .fetch_all(pool)
        .await
    }

    /// Check-ins per group in `year`, busiest first
    pub async fn group_counts(pool: &PgPool, year: i32) -> Result<Vec<GroupCount>, sqlx::Error> {
        sqlx::query_as::<_, GroupCount>(
            r#"
            SELECT g.name AS group_name, COUNT(a.id) AS count
            FROM attendance a
            JOIN students s ON s.id = a.student_id
            JOIN groups g ON g.id = s.group_id
            WHERE EXTRACT(YEAR FROM a.date)::INT = $1
            GROUP BY g.id, g.name
            ORDER BY count DESC, g.name
            "#,
        )
        .bind(year)
        .fetch_all(pool)
        .await
    }

    pub async fn late_totals(pool: &PgPool, year: i32) -> Result<LateTotals, sqlx::Error> {
        sqlx::query_as::<_, LateTotals>(
            r#"
            SELECT COUNT(*) AS total,
                   COUNT(*) FILTER (WHERE is_late) AS late,
                   (AVG(late_minutes) FILTER (WHERE is_late))::FLOAT8 AS avg_late_minutes
            FROM attendance
            WHERE EXTRACT(YEAR FROM date)::INT = $1
            "#,
        )
        .bind(year)
        .fetch_one(pool)
        .await
    }
}

/// Spreads sparse bucket counts over `1..=last`, filling gaps with zero
pub fn fill_buckets(counts: &[BucketCount], last: i32) -> Vec<BucketCount> {
    (1..=last)
        .map(|bucket| BucketCount {
            bucket,
            count: counts
                .iter()
                .find(|c| c.bucket == bucket)
                .map_or(0, |c| c.count),
        })
        .collect()
}
