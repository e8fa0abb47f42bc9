/// Payments
///
/// Two kinds share one table:
///
/// - **Lesson-pack payments** add lessons and leave `payment_month` empty.
/// - **Monthly payments** cover one calendar month (`payment_year`,
///   `payment_month`). Their per-month sum never exceeds the tariff price.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE payments (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     student_id UUID NOT NULL REFERENCES students(id) ON DELETE CASCADE,
///     tariff_id UUID REFERENCES tariffs(id) ON DELETE SET NULL,
///     amount_paid BIGINT NOT NULL,
///     amount_due BIGINT NOT NULL DEFAULT 0,
///     lessons_added INTEGER NOT NULL DEFAULT 0,
///     is_full_payment BOOLEAN NOT NULL DEFAULT TRUE,
///     payment_date TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     tariff_name VARCHAR(100),
///     notes TEXT,
///     created_by UUID REFERENCES users(id) ON DELETE SET NULL,
///     payment_month INTEGER,
///     payment_year INTEGER
/// );
/// ```

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{PgConnection, PgExecutor, PgPool};
use uuid::Uuid;

use crate::billing::{PaymentLine, YearMonth};

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Payment {
    pub id: Uuid,
    pub student_id: Uuid,
    pub tariff_id: Option<Uuid>,
    pub amount_paid: i64,
    pub amount_due: i64,
    pub lessons_added: i32,
    pub is_full_payment: bool,
    pub payment_date: DateTime<Utc>,

    /// Tariff name at the time of payment
    pub tariff_name: Option<String>,

    pub notes: Option<String>,
    pub created_by: Option<Uuid>,
    pub payment_month: Option<i32>,
    pub payment_year: Option<i32>,
}

#[derive(Debug, Clone)]
pub struct CreatePayment {
    pub student_id: Uuid,
    pub tariff_id: Option<Uuid>,
    pub amount_paid: i64,
    pub amount_due: i64,
    pub lessons_added: i32,
    pub is_full_payment: bool,

    /// `None` means now
    pub payment_date: Option<DateTime<Utc>>,

    pub tariff_name: Option<String>,
    pub notes: Option<String>,
    pub created_by: Option<Uuid>,
    pub covers: Option<YearMonth>,
}

/// Payment with the payer's name, for history screens
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct PaymentWithStudent {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub payment: Payment,

    pub student_name: String,

    pub group_name: Option<String>,
}

/// Sum of monthly payments of one student for one covered month
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CoveredMonthTotal {
    pub student_id: Uuid,
    pub payment_year: i32,
    pub payment_month: i32,
    pub total: i64,
}

impl Payment {
    pub fn covered_month(&self) -> Option<YearMonth> {
        match (self.payment_year, self.payment_month) {
            (Some(year), Some(month)) => u32::try_from(month)
                .ok()
                .and_then(|m| YearMonth::new(year, m)),
            _ => None,
        }
    }

    pub async fn create(conn: &mut PgConnection, data: CreatePayment) -> Result<Self, sqlx::Error> {
        let payment = sqlx::query_as::<_, Payment>(
            r#"
            INSERT INTO payments (student_id, tariff_id, amount_paid, amount_due, lessons_added,
                                  is_full_payment, payment_date, tariff_name, notes, created_by,
                                  payment_month, payment_year)
            VALUES ($1, $2, $3, $4, $5, $6, COALESCE($7, NOW()), $8, $9, $10, $11, $12)
            RETURNING id, student_id, tariff_id, amount_paid, amount_due, lessons_added,
                      is_full_payment, payment_date, tariff_name, notes, created_by,
                      payment_month, payment_year
            "#,
        )
        .bind(data.student_id)
        .bind(data.tariff_id)
        .bind(data.amount_paid)
        .bind(data.amount_due)
        .bind(data.lessons_added)
        .bind(data.is_full_payment)
        .bind(data.payment_date)
        .bind(data.tariff_name)
        .bind(data.notes)
        .bind(data.created_by)
        .bind(data.covers.map(|ym| ym.month as i32))
        .bind(data.covers.map(|ym| ym.year))
        .fetch_one(conn)
        .await?;

        tracing::info!(
            payment_id = %payment.id,
            student_id = %payment.student_id,
            amount = payment.amount_paid,
            "Payment recorded"
        );

        Ok(payment)
    }

    pub async fn find_by_id<'e, E: PgExecutor<'e>>(
        executor: E,
        id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Payment>(
            r#"
            SELECT id, student_id, tariff_id, amount_paid, amount_due, lessons_added,
                   is_full_payment, payment_date, tariff_name, notes, created_by,
                   payment_month, payment_year
            FROM payments
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(executor)
        .await
    }

    /// Writes amount, date and notes back
    pub async fn save(conn: &mut PgConnection, payment: &Payment) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Payment>(
            r#"
            UPDATE payments
            SET amount_paid = $2, payment_date = $3, notes = $4
            WHERE id = $1
            RETURNING id, student_id, tariff_id, amount_paid, amount_due, lessons_added,
                      is_full_payment, payment_date, tariff_name, notes, created_by,
                      payment_month, payment_year
            "#,
        )
        .bind(payment.id)
        .bind(payment.amount_paid)
        .bind(payment.payment_date)
        .bind(&payment.notes)
        .fetch_one(conn)
        .await
    }

    /// Deletes a payment and returns the payer's id
    pub async fn delete(pool: &PgPool, id: Uuid) -> Result<Option<Uuid>, sqlx::Error> {
        let deleted: Option<(Uuid,)> =
            sqlx::query_as("DELETE FROM payments WHERE id = $1 RETURNING student_id")
                .bind(id)
                .fetch_optional(pool)
                .await?;

        Ok(deleted.map(|(student_id,)| student_id))
    }

    /// Sum already paid by a student for one covered month
    ///
    /// `exclude` leaves one payment out, for re-checking an edited payment.
    pub async fn paid_for_month(
        conn: &mut PgConnection,
        student_id: Uuid,
        month: YearMonth,
        exclude: Option<Uuid>,
    ) -> Result<i64, sqlx::Error> {
        let (total,): (i64,) = sqlx::query_as(
            r#"
            SELECT COALESCE(SUM(amount_paid), 0)::BIGINT
            FROM payments
            WHERE student_id = $1
              AND payment_year = $2
              AND payment_month = $3
              AND ($4::UUID IS NULL OR id <> $4)
            "#,
        )
        .bind(student_id)
        .bind(month.year)
        .bind(month.month as i32)
        .bind(exclude)
        .fetch_one(conn)
        .await?;

        Ok(total)
    }

    /// Every payment of a student, newest first, for month bucketing
    pub async fn lines_for_student(
        pool: &PgPool,
        student_id: Uuid,
    ) -> Result<Vec<PaymentLine>, sqlx::Error> {
        sqlx::query_as::<_, PaymentLine>(
            r#"
            SELECT id, amount_paid, payment_date, payment_month, payment_year, notes
            FROM payments
            WHERE student_id = $1
            ORDER BY payment_date DESC
            "#,
        )
        .bind(student_id)
        .fetch_all(pool)
        .await
    }

    /// Monthly payment sums keyed by student and covered month
    pub async fn covered_month_totals(
        pool: &PgPool,
    ) -> Result<HashMap<Uuid, HashMap<YearMonth, i64>>, sqlx::Error> {
        let rows = sqlx::query_as::<_, CoveredMonthTotal>(
            r#"
            SELECT student_id, payment_year, payment_month, SUM(amount_paid)::BIGINT AS total
            FROM payments
            WHERE payment_year IS NOT NULL AND payment_month IS NOT NULL
            GROUP BY student_id, payment_year, payment_month
            "#,
        )
        .fetch_all(pool)
        .await?;

        let mut totals: HashMap<Uuid, HashMap<YearMonth, i64>> = HashMap::new();
        for row in rows {
            let Some(month) = u32::try_from(row.payment_month)
                .ok()
                .and_then(|m| YearMonth::new(row.payment_year, m))
            else {
                continue;
            };
            totals
                .entry(row.student_id)
                .or_default()
                .insert(month, row.total);
        }

        Ok(totals)
    }

    /// Latest payments with student and group names
    pub async fn recent(pool: &PgPool, limit: i64) -> Result<Vec<PaymentWithStudent>, sqlx::Error> {
        sqlx::query_as::<_, PaymentWithStudent>(
            r#"
            SELECT p.id, p.student_id, p.tariff_id, p.amount_paid, p.amount_due, p.lessons_added,
                   p.is_full_payment, p.payment_date, p.tariff_name, p.notes, p.created_by,
                   p.payment_month, p.payment_year,
                   s.full_name AS student_name, g.name AS group_name
            FROM payments p
            JOIN students s ON s.id = p.student_id
            LEFT JOIN groups g ON g.id = s.group_id
            ORDER BY p.payment_date DESC
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(pool)
        .await
    }

    /// Income received in `[start, end)`
    pub async fn sum_between(
        pool: &PgPool,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<i64, sqlx::Error> {
        let (total,): (i64,) = sqlx::query_as(
            r#"
            SELECT COALESCE(SUM(amount_paid), 0)::BIGINT
            FROM payments
            WHERE payment_date >= $1 AND payment_date < $2
            "#,
        )
        .bind(start)
        .bind(end)
        .fetch_one(pool)
        .await?;

        Ok(total)
    }

    /// All income ever received
    pub async fn total(pool: &PgPool) -> Result<i64, sqlx::Error> {
        let (total,): (i64,) =
            sqlx::query_as("SELECT COALESCE(SUM(amount_paid), 0)::BIGINT FROM payments")
                .fetch_one(pool)
                .await?;

        Ok(total)
    }
}
