/// Students and their balances
///
/// The lesson balance is never stored for students on a priced tariff: it is
/// derived from the sum of their payments and the number of attendance
/// records (see [`crate::billing::compute_balance`]). Queries that need it
/// select the [`BalanceFacts`] columns next to their own.
///
/// # Example
///
/// ```no_run
/// use clubdesk_shared::models::student::Student;
/// use sqlx::PgPool;
/// use uuid::Uuid;
///
/// # async fn example(pool: PgPool, id: Uuid) -> Result<(), sqlx::Error> {
/// if let Some(facts) = Student::balance(&pool, id).await? {
///     println!("{} lessons left", facts.balance());
/// }
/// # Ok(())
/// # }
/// ```

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, PgExecutor, PgPool};
use uuid::Uuid;
use validator::Validate;

use super::deserialize_some;
use crate::billing::{compute_balance, is_low_balance, BalanceInput, TariffTerms};
use crate::rating::RewardWindow;

const COLUMNS: &str = "id, student_number, school_number, full_name, phone, parent_phone, \
    photo_path, face_encoding, stored_balance, tariff_type, tariff_id, status, blacklist_reason, \
    admission_date, group_id, city, district, street, house_number, birth_year, passport_series, \
    passport_number, passport_issued_by, passport_issue_date, passport_expiry_date, club_funded, \
    created_at";

/// Columns of [`BalanceFacts`] for a query over `students s` joined with [`BALANCE_JOINS`]
pub(crate) const BALANCE_COLUMNS: &str = "t.lessons_count AS tariff_lessons, \
    t.price AS tariff_price, COALESCE(pt.total_paid, 0)::BIGINT AS total_paid, \
    COALESCE(ac.attendance_count, 0)::BIGINT AS attendance_count, s.stored_balance, s.club_funded";

pub(crate) const BALANCE_JOINS: &str = "LEFT JOIN tariffs t ON t.id = s.tariff_id \
    LEFT JOIN (SELECT student_id, SUM(amount_paid)::BIGINT AS total_paid \
               FROM payments GROUP BY student_id) pt ON pt.student_id = s.id \
    LEFT JOIN (SELECT student_id, COUNT(*) AS attendance_count \
               FROM attendance GROUP BY student_id) ac ON ac.student_id = s.id";

/// Enrollment status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StudentStatus {
    #[default]
    Active,
    Inactive,
    Blacklist,
}

impl StudentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StudentStatus::Active => "active",
            StudentStatus::Inactive => "inactive",
            StudentStatus::Blacklist => "blacklist",
        }
    }
}

impl fmt::Display for StudentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown student status: {0}")]
pub struct ParseStatusError(pub String);

impl FromStr for StudentStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(StudentStatus::Active),
            "inactive" => Ok(StudentStatus::Inactive),
            "blacklist" => Ok(StudentStatus::Blacklist),
            other => Err(ParseStatusError(other.to_string())),
        }
    }
}

impl TryFrom<String> for StudentStatus {
    type Error = ParseStatusError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Student card
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Student {
    pub id: Uuid,

    /// Club-issued number, unique
    pub student_number: String,

    pub school_number: Option<String>,
    pub full_name: String,
    pub phone: Option<String>,
    pub parent_phone: Option<String>,
    pub photo_path: Option<String>,

    /// 128-value face descriptor
    #[serde(skip_serializing)]
    pub face_encoding: Option<Vec<f64>>,

    /// Manually kept credits, used only without a priced tariff
    pub stored_balance: i32,

    /// Name of the tariff last paid in full
    pub tariff_type: Option<String>,

    pub tariff_id: Option<Uuid>,

    #[sqlx(try_from = "String")]
    pub status: StudentStatus,

    pub blacklist_reason: Option<String>,
    pub admission_date: Option<NaiveDate>,
    pub group_id: Option<Uuid>,

    pub city: Option<String>,
    pub district: Option<String>,
    pub street: Option<String>,
    pub house_number: Option<String>,

    pub birth_year: Option<i32>,
    pub passport_series: Option<String>,
    pub passport_number: Option<String>,
    pub passport_issued_by: Option<String>,
    pub passport_issue_date: Option<NaiveDate>,
    pub passport_expiry_date: Option<NaiveDate>,

    /// Trains for free; attendance never deducts a lesson
    pub club_funded: bool,

    pub created_at: DateTime<Utc>,
}

/// Input for enrolling a student
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct CreateStudent {
    #[validate(length(min = 1, max = 20, message = "Student number is required"))]
    pub student_number: String,

    #[validate(length(min = 1, max = 200, message = "Full name is required"))]
    pub full_name: String,

    #[serde(default)]
    #[validate(length(max = 100))]
    pub school_number: Option<String>,

    #[serde(default)]
    #[validate(length(max = 20))]
    pub phone: Option<String>,

    #[serde(default)]
    #[validate(length(max = 20))]
    pub parent_phone: Option<String>,

    #[serde(default)]
    #[validate(length(max = 300))]
    pub photo_path: Option<String>,

    #[serde(default)]
    pub face_encoding: Option<Vec<f64>>,

    #[serde(default)]
    pub stored_balance: i32,

    #[serde(default)]
    pub tariff_id: Option<Uuid>,

    #[serde(default)]
    pub status: StudentStatus,

    #[serde(default)]
    pub blacklist_reason: Option<String>,

    #[serde(default)]
    pub admission_date: Option<NaiveDate>,

    #[serde(default)]
    pub group_id: Option<Uuid>,

    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub district: Option<String>,
    #[serde(default)]
    pub street: Option<String>,
    #[serde(default)]
    pub house_number: Option<String>,

    #[serde(default)]
    pub birth_year: Option<i32>,
    #[serde(default)]
    pub passport_series: Option<String>,
    #[serde(default)]
    pub passport_number: Option<String>,
    #[serde(default)]
    pub passport_issued_by: Option<String>,
    #[serde(default)]
    pub passport_issue_date: Option<NaiveDate>,
    #[serde(default)]
    pub passport_expiry_date: Option<NaiveDate>,

    #[serde(default)]
    pub club_funded: bool,
}

impl CreateStudent {
    /// Trims text, turns blank strings into `None`, drops a blacklist reason
    /// for other statuses and defaults the admission date to `today`
    pub fn normalized(mut self, today: NaiveDate) -> Self {
        self.student_number = self.student_number.trim().to_string();
        self.full_name = self.full_name.trim().to_string();

        for field in [
            &mut self.school_number,
            &mut self.phone,
            &mut self.parent_phone,
            &mut self.photo_path,
            &mut self.blacklist_reason,
            &mut self.city,
            &mut self.district,
            &mut self.street,
            &mut self.house_number,
            &mut self.passport_series,
            &mut self.passport_number,
            &mut self.passport_issued_by,
        ] {
            *field = blank_to_none(field.take());
        }

        if self.status != StudentStatus::Blacklist {
            self.blacklist_reason = None;
        }
        self.admission_date.get_or_insert(today);

        self
    }
}

/// Partial student update
///
/// `None` leaves a field alone; for nullable columns `Some(None)` clears it.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateStudent {
    #[validate(length(min = 1, max = 20, message = "Student number cannot be empty"))]
    pub student_number: Option<String>,

    #[validate(length(min = 1, max = 200, message = "Full name cannot be empty"))]
    pub full_name: Option<String>,

    #[serde(default, deserialize_with = "deserialize_some")]
    pub school_number: Option<Option<String>>,
    #[serde(default, deserialize_with = "deserialize_some")]
    pub phone: Option<Option<String>>,
    #[serde(default, deserialize_with = "deserialize_some")]
    pub parent_phone: Option<Option<String>>,
    #[serde(default, deserialize_with = "deserialize_some")]
    pub photo_path: Option<Option<String>>,
    #[serde(default, deserialize_with = "deserialize_some")]
    pub face_encoding: Option<Option<Vec<f64>>>,

    pub stored_balance: Option<i32>,

    #[serde(default, deserialize_with = "deserialize_some")]
    pub tariff_id: Option<Option<Uuid>>,

    pub status: Option<StudentStatus>,

    #[serde(default, deserialize_with = "deserialize_some")]
    pub blacklist_reason: Option<Option<String>>,
    #[serde(default, deserialize_with = "deserialize_some")]
    pub admission_date: Option<Option<NaiveDate>>,
    #[serde(default, deserialize_with = "deserialize_some")]
    pub group_id: Option<Option<Uuid>>,

    #[serde(default, deserialize_with = "deserialize_some")]
    pub city: Option<Option<String>>,
    #[serde(default, deserialize_with = "deserialize_some")]
    pub district: Option<Option<String>>,
    #[serde(default, deserialize_with = "deserialize_some")]
    pub street: Option<Option<String>>,
    #[serde(default, deserialize_with = "deserialize_some")]
    pub house_number: Option<Option<String>>,

    #[serde(default, deserialize_with = "deserialize_some")]
    pub birth_year: Option<Option<i32>>,
    #[serde(default, deserialize_with = "deserialize_some")]
    pub passport_series: Option<Option<String>>,
    #[serde(default, deserialize_with = "deserialize_some")]
    pub passport_number: Option<Option<String>>,
    #[serde(default, deserialize_with = "deserialize_some")]
    pub passport_issued_by: Option<Option<String>>,
    #[serde(default, deserialize_with = "deserialize_some")]
    pub passport_issue_date: Option<Option<NaiveDate>>,
    #[serde(default, deserialize_with = "deserialize_some")]
    pub passport_expiry_date: Option<Option<NaiveDate>>,

    pub club_funded: Option<bool>,
}

/// Inputs of the balance formula for one student
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::FromRow)]
pub struct BalanceFacts {
    pub tariff_lessons: Option<i32>,
    pub tariff_price: Option<i64>,
    pub total_paid: i64,
    pub attendance_count: i64,
    pub stored_balance: i32,
    pub club_funded: bool,
}

impl BalanceFacts {
    pub fn tariff(&self) -> Option<TariffTerms> {
        match (self.tariff_lessons, self.tariff_price) {
            (Some(lessons_count), Some(price)) => Some(TariffTerms { lessons_count, price }),
            _ => None,
        }
    }

    /// Remaining lessons
    pub fn balance(&self) -> i64 {
        compute_balance(&BalanceInput {
            tariff: self.tariff(),
            total_paid: self.total_paid,
            attendance_count: self.attendance_count,
            stored_balance: self.stored_balance,
        })
    }

    pub fn low_balance(&self) -> bool {
        is_low_balance(self.balance(), self.club_funded)
    }
}

/// Row of the compact list used by filters and pickers
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct StudentListItem {
    pub id: Uuid,
    pub full_name: String,
    pub student_number: String,
    pub group_id: Option<Uuid>,
    pub group_name: Option<String>,

    #[sqlx(try_from = "String")]
    pub status: StudentStatus,

    pub photo_path: Option<String>,
    pub admission_date: Option<NaiveDate>,
}

/// Row of the students overview table
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct StudentOverviewRow {
    pub id: Uuid,
    pub student_number: String,
    pub full_name: String,

    #[sqlx(try_from = "String")]
    pub status: StudentStatus,

    pub group_id: Option<Uuid>,
    pub group_name: Option<String>,
    pub photo_path: Option<String>,
    pub phone: Option<String>,

    #[sqlx(flatten)]
    pub facts: BalanceFacts,

    pub last_payment_date: Option<DateTime<Utc>>,
    pub last_payment_amount: Option<i64>,
    pub last_payment_due: Option<i64>,

    /// Points in the current reward window
    pub points: i64,
}

/// Active student on a priced tariff, for the debtors report
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct DebtorCandidate {
    pub student_id: Uuid,
    pub full_name: String,
    pub phone: Option<String>,
    pub parent_phone: Option<String>,
    pub admission_date: Option<NaiveDate>,
    pub tariff_name: String,
    pub tariff_price: i64,
}

impl Student {
    /// Applies a partial update
    ///
    /// Any status other than `blacklist` clears the blacklist reason, and
    /// blank text becomes `None`.
    pub fn apply(&self, patch: UpdateStudent) -> Student {
        let mut s = self.clone();

        if let Some(number) = patch.student_number {
            s.student_number = number.trim().to_string();
        }
        if let Some(name) = patch.full_name {
            s.full_name = name.trim().to_string();
        }

        set_text(&mut s.school_number, patch.school_number);
        set_text(&mut s.phone, patch.phone);
        set_text(&mut s.parent_phone, patch.parent_phone);
        set_text(&mut s.photo_path, patch.photo_path);
        set_text(&mut s.city, patch.city);
        set_text(&mut s.district, patch.district);
        set_text(&mut s.street, patch.street);
        set_text(&mut s.house_number, patch.house_number);
        set_text(&mut s.passport_series, patch.passport_series);
        set_text(&mut s.passport_number, patch.passport_number);
        set_text(&mut s.passport_issued_by, patch.passport_issued_by);
        set_text(&mut s.blacklist_reason, patch.blacklist_reason);

        if let Some(encoding) = patch.face_encoding {
            s.face_encoding = encoding;
        }
        if let Some(balance) = patch.stored_balance {
            s.stored_balance = balance;
        }
        if let Some(tariff_id) = patch.tariff_id {
            s.tariff_id = tariff_id;
        }
        if let Some(status) = patch.status {
            s.status = status;
        }
        if let Some(date) = patch.admission_date {
            s.admission_date = date;
        }
        if let Some(group_id) = patch.group_id {
            s.group_id = group_id;
        }
        if let Some(year) = patch.birth_year {
            s.birth_year = year;
        }
        if let Some(date) = patch.passport_issue_date {
            s.passport_issue_date = date;
        }
        if let Some(date) = patch.passport_expiry_date {
            s.passport_expiry_date = date;
        }
        if let Some(funded) = patch.club_funded {
            s.club_funded = funded;
        }

        if s.status != StudentStatus::Blacklist {
            s.blacklist_reason = None;
        }

        s
    }

    pub fn has_face(&self) -> bool {
        self.face_encoding.is_some()
    }

    /// Inserts a student
    ///
    /// # Errors
    ///
    /// Unique violation on `students_student_number_key` for a duplicate number.
    pub async fn create(conn: &mut PgConnection, data: CreateStudent) -> Result<Self, sqlx::Error> {
        let query = format!(
            r#"
            INSERT INTO students (student_number, school_number, full_name, phone, parent_phone,
                                  photo_path, face_encoding, stored_balance, tariff_id, status,
                                  blacklist_reason, admission_date, group_id, city, district,
                                  street, house_number, birth_year, passport_series,
                                  passport_number, passport_issued_by, passport_issue_date,
                                  passport_expiry_date, club_funded)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17,
                    $18, $19, $20, $21, $22, $23, $24)
            RETURNING {COLUMNS}
            "#
        );

        let student = sqlx::query_as::<_, Student>(&query)
            .bind(data.student_number)
            .bind(data.school_number)
            .bind(data.full_name)
            .bind(data.phone)
            .bind(data.parent_phone)
            .bind(data.photo_path)
            .bind(data.face_encoding)
            .bind(data.stored_balance)
            .bind(data.tariff_id)
            .bind(data.status.as_str())
            .bind(data.blacklist_reason)
            .bind(data.admission_date)
            .bind(data.group_id)
            .bind(data.city)
            .bind(data.district)
            .bind(data.street)
            .bind(data.house_number)
            .bind(data.birth_year)
            .bind(data.passport_series)
            .bind(data.passport_number)
            .bind(data.passport_issued_by)
            .bind(data.passport_issue_date)
            .bind(data.passport_expiry_date)
            .bind(data.club_funded)
            .fetch_one(conn)
            .await?;

        tracing::info!(
            student_id = %student.id,
            student_number = %student.student_number,
            "Student enrolled"
        );

        Ok(student)
    }

    pub async fn find_by_id<'e, E: PgExecutor<'e>>(
        executor: E,
        id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM students WHERE id = $1");

        sqlx::query_as::<_, Student>(&query)
            .bind(id)
            .fetch_optional(executor)
            .await
    }

    /// Loads a student and locks the row until the transaction ends
    ///
    /// Payments and check-ins of one student serialize on this lock.
    pub async fn find_for_update(
        conn: &mut PgConnection,
        id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM students WHERE id = $1 FOR UPDATE");

        sqlx::query_as::<_, Student>(&query)
            .bind(id)
            .fetch_optional(conn)
            .await
    }

    /// Writes every editable column back
    pub async fn save(conn: &mut PgConnection, s: &Student) -> Result<Option<Self>, sqlx::Error> {
        let query = format!(
            r#"
            UPDATE students
            SET student_number = $2, school_number = $3, full_name = $4, phone = $5,
                parent_phone = $6, photo_path = $7, face_encoding = $8, stored_balance = $9,
                tariff_id = $10, status = $11, blacklist_reason = $12, admission_date = $13,
                group_id = $14, city = $15, district = $16, street = $17, house_number = $18,
                birth_year = $19, passport_series = $20, passport_number = $21,
                passport_issued_by = $22, passport_issue_date = $23, passport_expiry_date = $24,
                club_funded = $25
            WHERE id = $1
            RETURNING {COLUMNS}
            "#
        );

        sqlx::query_as::<_, Student>(&query)
            .bind(s.id)
            .bind(&s.student_number)
            .bind(&s.school_number)
            .bind(&s.full_name)
            .bind(&s.phone)
            .bind(&s.parent_phone)
            .bind(&s.photo_path)
            .bind(&s.face_encoding)
            .bind(s.stored_balance)
            .bind(s.tariff_id)
            .bind(s.status.as_str())
            .bind(&s.blacklist_reason)
            .bind(s.admission_date)
            .bind(s.group_id)
            .bind(&s.city)
            .bind(&s.district)
            .bind(&s.street)
            .bind(&s.house_number)
            .bind(s.birth_year)
            .bind(&s.passport_series)
            .bind(&s.passport_number)
            .bind(&s.passport_issued_by)
            .bind(s.passport_issue_date)
            .bind(s.passport_expiry_date)
            .bind(s.club_funded)
            .fetch_optional(conn)
            .await
    }

    /// Deletes a student with their payments, attendance and rewards
    ///
    /// Returns the deleted student's name.
    pub async fn delete(pool: &PgPool, id: Uuid) -> Result<Option<String>, sqlx::Error> {
        let deleted: Option<(String,)> =
            sqlx::query_as("DELETE FROM students WHERE id = $1 RETURNING full_name")
                .bind(id)
                .fetch_optional(pool)
                .await?;

        if deleted.is_some() {
            tracing::info!(student_id = %id, "Student deleted");
        }

        Ok(deleted.map(|(name,)| name))
    }

    /// Replaces or clears the face encoding
    pub async fn set_face_encoding(
        pool: &PgPool,
        id: Uuid,
        encoding: Option<&[f64]>,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("UPDATE students SET face_encoding = $2 WHERE id = $1")
            .bind(id)
            .bind(encoding)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Records the name of the tariff the student last paid in full
    pub async fn set_tariff_type(
        conn: &mut PgConnection,
        id: Uuid,
        tariff_name: &str,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE students SET tariff_type = $2 WHERE id = $1")
            .bind(id)
            .bind(tariff_name)
            .execute(conn)
            .await?;

        Ok(())
    }

    /// Balance inputs for one student
    pub async fn balance<'e, E: PgExecutor<'e>>(
        executor: E,
        id: Uuid,
    ) -> Result<Option<BalanceFacts>, sqlx::Error> {
        let query =
            format!("SELECT {BALANCE_COLUMNS} FROM students s {BALANCE_JOINS} WHERE s.id = $1");

        sqlx::query_as::<_, BalanceFacts>(&query)
            .bind(id)
            .fetch_optional(executor)
            .await
    }

    /// Balance inputs of every active student
    pub async fn active_balances(pool: &PgPool) -> Result<Vec<BalanceFacts>, sqlx::Error> {
        let query = format!(
            "SELECT {BALANCE_COLUMNS} FROM students s {BALANCE_JOINS} WHERE s.status = 'active'"
        );

        sqlx::query_as::<_, BalanceFacts>(&query).fetch_all(pool).await
    }

    pub async fn count_active(pool: &PgPool) -> Result<i64, sqlx::Error> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM students WHERE status = 'active'")
                .fetch_one(pool)
                .await?;

        Ok(count)
    }

    /// Every student by name, with group names
    pub async fn list_compact(pool: &PgPool) -> Result<Vec<StudentListItem>, sqlx::Error> {
        sqlx::query_as::<_, StudentListItem>(
            r#"
            SELECT s.id, s.full_name, s.student_number, s.group_id, g.name AS group_name,
                   s.status, s.photo_path, s.admission_date
            FROM students s
            LEFT JOIN groups g ON g.id = s.group_id
            ORDER BY s.full_name
            "#,
        )
        .fetch_all(pool)
        .await
    }

    /// Every student with balance inputs, latest payment and points in `window`
    pub async fn overview(
        pool: &PgPool,
        window: RewardWindow,
    ) -> Result<Vec<StudentOverviewRow>, sqlx::Error> {
        let query = format!(
            r#"
            SELECT s.id, s.student_number, s.full_name, s.status, s.group_id,
                   g.name AS group_name, s.photo_path, s.phone,
                   {BALANCE_COLUMNS},
                   lp.payment_date AS last_payment_date,
                   lp.amount_paid AS last_payment_amount,
                   lp.amount_due AS last_payment_due,
                   COALESCE(rw.points, 0)::BIGINT AS points
            FROM students s
            LEFT JOIN groups g ON g.id = s.group_id
            {BALANCE_JOINS}
            LEFT JOIN LATERAL (
                SELECT payment_date, amount_paid, amount_due
                FROM payments
                WHERE student_id = s.id
                ORDER BY payment_date DESC
                LIMIT 1
            ) lp ON TRUE
            LEFT JOIN (
                SELECT student_id, SUM(points)::BIGINT AS points
                FROM student_rewards
                WHERE year = $1 AND month BETWEEN $2 AND $3
                GROUP BY student_id
            ) rw ON rw.student_id = s.id
            ORDER BY s.full_name
            "#
        );

        sqlx::query_as::<_, StudentOverviewRow>(&query)
            .bind(window.year)
            .bind(window.start_month as i32)
            .bind(window.end_month as i32)
            .fetch_all(pool)
            .await
    }

    /// Active students whose tariff has a price
    pub async fn debtor_candidates(pool: &PgPool) -> Result<Vec<DebtorCandidate>, sqlx::Error> {
        sqlx::query_as::<_, DebtorCandidate>(
            r#"
            SELECT s.id AS student_id, s.full_name, s.phone, s.parent_phone, s.admission_date,
                   t.name AS tariff_name, t.price AS tariff_price
            FROM students s
            JOIN tariffs t ON t.id = s.tariff_id
            WHERE s.status = 'active'
            ORDER BY s.full_name
            "#,
        )
        .fetch_all(pool)
        .await
    }
}

fn blank_to_none(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn set_text(field: &mut Option<String>, patch: Option<Option<String>>) {
    if let Some(value) = patch {
        *field = blank_to_none(value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn student() -> Student {
        Student {
            id: Uuid::new_v4(),
            student_number: "A-17".to_string(),
            school_number: None,
            full_name: "Aziz Karimov".to_string(),
            phone: Some("+998901234567".to_string()),
            parent_phone: None,
            photo_path: None,
            face_encoding: None,
            stored_balance: 0,
            tariff_type: None,
            tariff_id: None,
            status: StudentStatus::Blacklist,
            blacklist_reason: Some("unpaid season".to_string()),
            admission_date: NaiveDate::from_ymd_opt(2025, 2, 1),
            group_id: None,
            city: None,
            district: None,
            street: None,
            house_number: None,
            birth_year: Some(2014),
            passport_series: None,
            passport_number: None,
            passport_issued_by: None,
            passport_issue_date: None,
            passport_expiry_date: None,
            club_funded: false,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_status_parsing() {
        assert_eq!("blacklist".parse::<StudentStatus>().unwrap(), StudentStatus::Blacklist);
        assert!("expelled".parse::<StudentStatus>().is_err());
        assert_eq!(StudentStatus::default(), StudentStatus::Active);
    }

    #[test]
    fn test_create_normalized() {
        let today = NaiveDate::from_ymd_opt(2025, 3, 10).unwrap();
        let data = CreateStudent {
            student_number: "  B-2 ".to_string(),
            full_name: " Dilnoza ".to_string(),
            phone: Some("   ".to_string()),
            blacklist_reason: Some("should vanish".to_string()),
            ..Default::default()
        }
        .normalized(today);

        assert_eq!(data.student_number, "B-2");
        assert_eq!(data.full_name, "Dilnoza");
        assert_eq!(data.phone, None);
        assert_eq!(data.blacklist_reason, None);
        assert_eq!(data.admission_date, Some(today));
    }

    #[test]
    fn test_create_validation() {
        let empty = CreateStudent {
            full_name: "Someone".to_string(),
            ..Default::default()
        };
        assert!(empty.validate().is_err());

        let ok = CreateStudent {
            student_number: "C-1".to_string(),
            full_name: "Someone".to_string(),
            ..Default::default()
        };
        assert!(ok.validate().is_ok());
    }

    #[test]
    fn test_apply_status_clears_reason() {
        let patch: UpdateStudent = serde_json::from_str(r#"{"status": "active"}"#).unwrap();
        let updated = student().apply(patch);

        assert_eq!(updated.status, StudentStatus::Active);
        assert_eq!(updated.blacklist_reason, None);
    }

    #[test]
    fn test_apply_keeps_untouched_and_clears_null() {
        let patch: UpdateStudent =
            serde_json::from_str(r#"{"phone": null, "full_name": " Aziz K. "}"#).unwrap();
        let updated = student().apply(patch);

        assert_eq!(updated.full_name, "Aziz K.");
        assert_eq!(updated.phone, None);
        assert_eq!(updated.birth_year, Some(2014));
        assert_eq!(updated.blacklist_reason.as_deref(), Some("unpaid season"));
    }

    #[test]
    fn test_balance_facts() {
        let facts = BalanceFacts {
            tariff_lessons: Some(12),
            tariff_price: Some(600_000),
            total_paid: 600_000,
            attendance_count: 11,
            stored_balance: 40,
            club_funded: false,
        };
        assert_eq!(facts.balance(), 1);
        assert!(!facts.low_balance());

        let no_tariff = BalanceFacts {
            tariff_lessons: None,
            tariff_price: None,
            ..facts
        };
        assert_eq!(no_tariff.balance(), 40);

        let exhausted = BalanceFacts {
            attendance_count: 12,
            ..facts
        };
        assert!(exhausted.low_balance());
        assert!(!BalanceFacts { club_funded: true, ..exhausted }.low_balance());
    }

    #[test]
    fn test_face_encoding_not_serialized() {
        let mut s = student();
        s.face_encoding = Some(vec![0.0; 128]);

        let json = serde_json::to_value(&s).unwrap();
        assert!(json.get("face_encoding").is_none());
        assert_eq!(json["status"], "blacklist");
        assert!(s.has_face());
    }
}
