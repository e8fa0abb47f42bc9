/// Payment endpoints
///
/// Two kinds of payment exist: a lesson-pack payment records money against a
/// tariff, a monthly payment additionally names the month it covers and may
/// never push that month above the tariff price. Both run in a transaction
/// that holds the student's row lock, so concurrent payments for one student
/// serialize.
///
/// # Endpoints
///
/// - `POST /api/payments` - Lesson-pack payment
/// - `POST /api/payments/monthly` - Month-covering payment
/// - `PUT /api/payments/:id` - Correct amount, date or notes
/// - `DELETE /api/payments/:id` - Delete a payment
/// - `GET /api/payments/history` - Last 100 payments

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use clubdesk_shared::{
    auth::{
        authorization::{require_any_role, PAYMENT_EDIT_ROLES, PAYMENT_HISTORY_ROLES},
        middleware::AuthContext,
    },
    billing::{check_month_capacity, check_monthly_payment, paid_lessons, BillingError, YearMonth},
    models::{
        club_settings::ClubSettings,
        deserialize_some,
        payment::{CreatePayment, Payment, PaymentWithStudent},
        student::Student,
        tariff::Tariff,
    },
};
use serde::{Deserialize, Serialize};
use sqlx::PgConnection;
use uuid::Uuid;
use validator::Validate;

/// Payments listed by the history endpoint
pub const HISTORY_LIMIT: i64 = 100;

/// Lesson-pack payment request
#[derive(Debug, Deserialize, Validate)]
pub struct CreatePaymentRequest {
    pub student_id: Uuid,

    /// Defaults to the student's tariff
    #[serde(default)]
    pub tariff_id: Option<Uuid>,

    #[validate(range(min = 1, message = "Amount must be positive"))]
    pub amount_paid: i64,

    /// Still owed after this payment
    #[serde(default)]
    #[validate(range(min = 0, message = "Amount due cannot be negative"))]
    pub amount_due: i64,

    #[serde(default)]
    #[validate(range(min = 0, message = "Lessons added cannot be negative"))]
    pub lessons_added: i32,

    /// Defaults to `amount_due == 0`
    #[serde(default)]
    pub is_full_payment: Option<bool>,

    #[serde(default)]
    pub notes: Option<String>,
}

/// Month-covering payment request
#[derive(Debug, Deserialize)]
pub struct MonthlyPaymentRequest {
    pub student_id: Uuid,
    pub year: i32,
    pub month: u32,
    pub amount: i64,

    #[serde(default)]
    pub notes: Option<String>,
}

/// Payment correction request
#[derive(Debug, Deserialize)]
pub struct UpdatePaymentRequest {
    pub amount_paid: i64,

    #[serde(default)]
    pub payment_date: Option<DateTime<Utc>>,

    #[serde(default, deserialize_with = "deserialize_some")]
    pub notes: Option<Option<String>>,
}

#[derive(Debug, Serialize)]
pub struct CreatePaymentResponse {
    pub success: bool,
    pub payment_id: Uuid,
    pub new_balance: i64,
    pub is_full_payment: bool,
    pub amount_due: i64,
}

#[derive(Debug, Serialize)]
pub struct MonthlyPaymentResponse {
    pub success: bool,
    pub payment_id: Uuid,

    /// `"M/YYYY"`
    pub month_label: String,

    pub paid_for_month: i64,
    pub remaining_for_month: i64,
    pub new_balance: i64,
}

#[derive(Debug, Serialize)]
pub struct UpdatePaymentResponse {
    pub success: bool,
    pub payment: Payment,
    pub new_balance: i64,
}

#[derive(Debug, Serialize)]
pub struct DeletePaymentResponse {
    pub success: bool,
    pub message: String,
    pub new_balance: i64,
}

/// Notes stored with a monthly payment
fn monthly_notes(month: YearMonth, extra: Option<&str>) -> String {
    let label = format!("Payment for {}", month.slash_label());
    match extra.map(str::trim).filter(|n| !n.is_empty()) {
        Some(extra) => format!("{label}. {extra}"),
        None => label,
    }
}

async fn current_balance(conn: &mut PgConnection, student_id: Uuid) -> ApiResult<i64> {
    let facts = Student::balance(conn, student_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Student not found".to_string()))?;

    Ok(facts.balance())
}

/// Record a lesson-pack payment
///
/// A full payment also records the tariff name as the student's tariff type.
///
/// # Endpoint
///
/// ```text
/// POST /api/payments
///
/// {
///   "student_id": "uuid",
///   "amount_paid": 600000,
///   "amount_due": 0,
///   "lessons_added": 12
/// }
/// ```
///
/// # Errors
///
/// - `404 Not Found`: Unknown student or tariff
/// - `422 Unprocessable Entity`: Non-positive amount or negative due/lessons
pub async fn create_payment(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<CreatePaymentRequest>,
) -> ApiResult<(StatusCode, Json<CreatePaymentResponse>)> {
    req.validate()?;

    let mut tx = state.db.begin().await?;

    let student = Student::find_for_update(&mut tx, req.student_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Student not found".to_string()))?;

    let tariff = match req.tariff_id.or(student.tariff_id) {
        Some(tariff_id) => Some(
            Tariff::find_by_id(&mut *tx, tariff_id)
                .await?
                .ok_or_else(|| ApiError::NotFound("Tariff not found".to_string()))?,
        ),
        None => None,
    };

    let is_full_payment = req.is_full_payment.unwrap_or(req.amount_due == 0);

    let payment = Payment::create(
        &mut tx,
        CreatePayment {
            student_id: student.id,
            tariff_id: tariff.as_ref().map(|t| t.id),
            amount_paid: req.amount_paid,
            amount_due: req.amount_due,
            lessons_added: req.lessons_added,
            is_full_payment,
            payment_date: None,
            tariff_name: tariff.as_ref().map(|t| t.name.clone()),
            notes: req.notes.map(|n| n.trim().to_string()).filter(|n| !n.is_empty()),
            created_by: Some(auth.user_id),
            covers: None,
        },
    )
    .await?;

    if is_full_payment {
        if let Some(tariff) = &tariff {
            Student::set_tariff_type(&mut tx, student.id, &tariff.name).await?;
        }
    }

    let new_balance = current_balance(&mut tx, student.id).await?;
    tx.commit().await?;

    Ok((
        StatusCode::CREATED,
        Json(CreatePaymentResponse {
            success: true,
            payment_id: payment.id,
            new_balance,
            is_full_payment,
            amount_due: payment.amount_due,
        }),
    ))
}

/// Record a payment covering one month of the student's tariff
///
/// # Errors
///
/// - `400 Bad Request`: Month out of range, future month blocked by
///   settings, no tariff, or the month would exceed the tariff price
/// - `404 Not Found`: Unknown student
pub async fn create_monthly_payment(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<MonthlyPaymentRequest>,
) -> ApiResult<(StatusCode, Json<MonthlyPaymentResponse>)> {
    let settings = ClubSettings::get(&state.db).await?;
    let covered = check_monthly_payment(
        req.year,
        req.month,
        req.amount,
        settings.block_future_payments,
        state.clock.today(),
    )?;

    let mut tx = state.db.begin().await?;

    let student = Student::find_for_update(&mut tx, req.student_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Student not found".to_string()))?;

    let tariff_id = student
        .tariff_id
        .ok_or_else(|| ApiError::BadRequest("Student has no tariff".to_string()))?;
    let tariff = Tariff::find_by_id(&mut *tx, tariff_id)
        .await?
        .ok_or_else(|| ApiError::BadRequest("Student has no tariff".to_string()))?;

    let already_paid = Payment::paid_for_month(&mut tx, student.id, covered, None).await?;
    check_month_capacity(tariff.price, already_paid, req.amount)?;

    let paid_for_month = already_paid + req.amount;
    let remaining_for_month = tariff.price - paid_for_month;
    let is_full_payment = remaining_for_month == 0;

    let payment = Payment::create(
        &mut tx,
        CreatePayment {
            student_id: student.id,
            tariff_id: Some(tariff.id),
            amount_paid: req.amount,
            amount_due: remaining_for_month,
            lessons_added: paid_lessons(req.amount, &tariff.terms()) as i32,
            is_full_payment,
            payment_date: None,
            tariff_name: Some(tariff.name.clone()),
            notes: Some(monthly_notes(covered, req.notes.as_deref())),
            created_by: Some(auth.user_id),
            covers: Some(covered),
        },
    )
    .await?;

    if is_full_payment {
        Student::set_tariff_type(&mut tx, student.id, &tariff.name).await?;
    }

    let new_balance = current_balance(&mut tx, student.id).await?;
    tx.commit().await?;

    Ok((
        StatusCode::CREATED,
        Json(MonthlyPaymentResponse {
            success: true,
            payment_id: payment.id,
            month_label: covered.slash_label(),
            paid_for_month,
            remaining_for_month,
            new_balance,
        }),
    ))
}

/// Correct a payment
///
/// A month-covering payment is re-checked against the tariff price of its
/// month, not counting its own previous amount.
pub async fn update_payment(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdatePaymentRequest>,
) -> ApiResult<Json<UpdatePaymentResponse>> {
    require_any_role(&auth, PAYMENT_EDIT_ROLES)?;
    if req.amount_paid <= 0 {
        return Err(BillingError::NonPositiveAmount.into());
    }

    let mut tx = state.db.begin().await?;

    let mut payment = Payment::find_by_id(&mut *tx, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Payment not found".to_string()))?;

    let student = Student::find_for_update(&mut tx, payment.student_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Student not found".to_string()))?;

    if let Some(month) = payment.covered_month() {
        if let Some(tariff_id) = payment.tariff_id.or(student.tariff_id) {
            if let Some(tariff) = Tariff::find_by_id(&mut *tx, tariff_id).await? {
                let others = Payment::paid_for_month(&mut tx, student.id, month, Some(id)).await?;
                check_month_capacity(tariff.price, others, req.amount_paid)?;
            }
        }
    }

    payment.amount_paid = req.amount_paid;
    if let Some(date) = req.payment_date {
        payment.payment_date = date;
    }
    if let Some(notes) = req.notes {
        payment.notes = notes.map(|n| n.trim().to_string()).filter(|n| !n.is_empty());
    }

    let saved = Payment::save(&mut tx, &payment).await?;
    let new_balance = current_balance(&mut tx, student.id).await?;
    tx.commit().await?;

    tracing::info!(payment_id = %id, updated_by = %auth.user_id, "Payment updated");

    Ok(Json(UpdatePaymentResponse {
        success: true,
        payment: saved,
        new_balance,
    }))
}

/// Delete a payment and report the student's new balance
pub async fn delete_payment(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<DeletePaymentResponse>> {
    require_any_role(&auth, PAYMENT_EDIT_ROLES)?;

    let student_id = Payment::delete(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Payment not found".to_string()))?;

    tracing::info!(payment_id = %id, deleted_by = %auth.user_id, "Payment deleted");

    let new_balance = Student::balance(&state.db, student_id)
        .await?
        .map_or(0, |facts| facts.balance());

    Ok(Json(DeletePaymentResponse {
        success: true,
        message: "Payment deleted".to_string(),
        new_balance,
    }))
}

/// Latest payments for the payment desk
pub async fn payment_history(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<Vec<PaymentWithStudent>>> {
    require_any_role(&auth, PAYMENT_HISTORY_ROLES)?;

    Ok(Json(Payment::recent(&state.db, HISTORY_LIMIT).await?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_monthly_notes() {
        let month = YearMonth { year: 2025, month: 3 };
        assert_eq!(monthly_notes(month, None), "Payment for 3/2025");
        assert_eq!(monthly_notes(month, Some("  ")), "Payment for 3/2025");
        assert_eq!(
            monthly_notes(month, Some("cash")),
            "Payment for 3/2025. cash"
        );
    }

    #[test]
    fn test_lesson_pack_request_validation() {
        let req: CreatePaymentRequest = serde_json::from_str(&format!(
            r#"{{"student_id": "{}", "amount_paid": 0}}"#,
            Uuid::new_v4()
        ))
        .unwrap();
        assert!(req.validate().is_err());

        let req: CreatePaymentRequest = serde_json::from_str(&format!(
            r#"{{"student_id": "{}", "amount_paid": 50000}}"#,
            Uuid::new_v4()
        ))
        .unwrap();
        assert!(req.validate().is_ok());
        assert_eq!(req.is_full_payment.unwrap_or(req.amount_due == 0), true);
    }
}
