/// Student endpoints
///
/// # Endpoints
///
/// - `GET /api/students` - Compact list for filters and pickers
/// - `GET /api/students/overview` - Balances, latest payment, current points
/// - `POST /api/students` - Enroll a student
/// - `GET /api/students/:id` - Student card with balance
/// - `PUT /api/students/:id` - Partial update
/// - `DELETE /api/students/:id` - Delete with payments, attendance, rewards
/// - `PUT /api/students/:id/face` - Replace or clear the face encoding
/// - `GET /api/students/:id/monthly-payments` - Payments grouped by covered month

use std::collections::BTreeMap;

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    routes::MessageResponse,
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use clubdesk_shared::{
    billing::{group_payments_by_month, MonthBucket},
    face::validate_encoding,
    models::{
        club_settings::ClubSettings,
        group::Group,
        payment::Payment,
        student::{
            CreateStudent, Student, StudentListItem, StudentOverviewRow, StudentStatus,
            UpdateStudent,
        },
        tariff::Tariff,
    },
    rating::reward_window,
};
use serde::{Deserialize, Serialize};
use sqlx::PgConnection;
use uuid::Uuid;
use validator::Validate;

/// Enrollment response
#[derive(Debug, Serialize)]
pub struct CreateStudentResponse {
    pub success: bool,
    pub student_id: Uuid,
    pub student_number: String,
}

/// Student card with its computed balance
#[derive(Debug, Serialize)]
pub struct StudentDetail {
    #[serde(flatten)]
    pub student: Student,

    pub balance: i64,
    pub low_balance: bool,

    /// Price of the assigned tariff, if any
    pub tariff_price: Option<i64>,

    pub has_face: bool,
}

/// Row of the students overview
#[derive(Debug, Serialize)]
pub struct StudentOverviewItem {
    pub id: Uuid,
    pub student_number: String,
    pub full_name: String,
    pub status: StudentStatus,
    pub group_id: Option<Uuid>,
    pub group_name: Option<String>,
    pub photo_path: Option<String>,
    pub phone: Option<String>,
    pub balance: i64,
    pub low_balance: bool,
    pub club_funded: bool,
    pub tariff_price: Option<i64>,
    pub last_payment_date: Option<DateTime<Utc>>,
    pub last_payment_amount: Option<i64>,
    pub last_payment_due: Option<i64>,
    pub points: i64,
}

impl From<StudentOverviewRow> for StudentOverviewItem {
    fn from(row: StudentOverviewRow) -> Self {
        Self {
            balance: row.facts.balance(),
            low_balance: row.facts.low_balance(),
            club_funded: row.facts.club_funded,
            tariff_price: row.facts.tariff_price,
            id: row.id,
            student_number: row.student_number,
            full_name: row.full_name,
            status: row.status,
            group_id: row.group_id,
            group_name: row.group_name,
            photo_path: row.photo_path,
            phone: row.phone,
            last_payment_date: row.last_payment_date,
            last_payment_amount: row.last_payment_amount,
            last_payment_due: row.last_payment_due,
            points: row.points,
        }
    }
}

/// Face encoding replacement; `null` clears it
#[derive(Debug, Deserialize)]
pub struct SetFaceRequest {
    pub encoding: Option<Vec<f64>>,
}

#[derive(Debug, Serialize)]
pub struct SetFaceResponse {
    pub success: bool,
    pub has_face: bool,
}

#[derive(Debug, Serialize)]
pub struct MonthlyPaymentsResponse {
    /// Keyed `YYYY-MM`, oldest first
    pub payments_by_month: BTreeMap<String, MonthBucket>,
    pub tariff_price: i64,
}

/// Rejects enrollment into a group that is already full
///
/// Locks the group row so concurrent enrollments serialize.
async fn ensure_group_has_room(conn: &mut PgConnection, group_id: Uuid) -> ApiResult<()> {
    let capacity = Group::capacity_for_update(conn, group_id)
        .await?
        .ok_or_else(|| ApiError::BadRequest("Group not found".to_string()))?;

    if capacity.is_full() {
        return Err(ApiError::BadRequest(capacity.full_message()));
    }

    Ok(())
}

/// Compact student list
pub async fn list_students(State(state): State<AppState>) -> ApiResult<Json<Vec<StudentListItem>>> {
    Ok(Json(Student::list_compact(&state.db).await?))
}

/// Every student with balance, latest payment and points in the current
/// reward window
pub async fn students_overview(
    State(state): State<AppState>,
) -> ApiResult<Json<Vec<StudentOverviewItem>>> {
    let settings = ClubSettings::get(&state.db).await?;
    let window = reward_window(settings.rewards_reset_period_months, state.clock.today());

    let rows = Student::overview(&state.db, window).await?;

    Ok(Json(rows.into_iter().map(StudentOverviewItem::from).collect()))
}

/// Enroll a student
///
/// # Endpoint
///
/// ```text
/// POST /api/students
///
/// {
///   "student_number": "A-17",
///   "full_name": "Aziz Karimov",
///   "group_id": "uuid",
///   "tariff_id": "uuid"
/// }
/// ```
///
/// # Errors
///
/// - `400 Bad Request`: Unknown or full group
/// - `409 Conflict`: Student number already exists
/// - `422 Unprocessable Entity`: Missing number or name, bad face encoding
pub async fn create_student(
    State(state): State<AppState>,
    Json(req): Json<CreateStudent>,
) -> ApiResult<(StatusCode, Json<CreateStudentResponse>)> {
    let data = req.normalized(state.clock.today());
    data.validate()?;
    if let Some(encoding) = &data.face_encoding {
        validate_encoding(encoding)?;
    }

    let mut tx = state.db.begin().await?;

    if let Some(group_id) = data.group_id {
        ensure_group_has_room(&mut tx, group_id).await?;
    }

    let student = Student::create(&mut tx, data).await?;
    tx.commit().await?;

    if student.has_face() {
        state.refresh_face_index().await;
    }

    Ok((
        StatusCode::CREATED,
        Json(CreateStudentResponse {
            success: true,
            student_id: student.id,
            student_number: student.student_number,
        }),
    ))
}

/// Student card with balance and tariff price
pub async fn get_student(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<StudentDetail>> {
    let student = Student::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Student not found".to_string()))?;

    let facts = Student::balance(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Student not found".to_string()))?;

    Ok(Json(StudentDetail {
        balance: facts.balance(),
        low_balance: facts.low_balance(),
        tariff_price: facts.tariff_price,
        has_face: student.has_face(),
        student,
    }))
}

/// Partial student update
///
/// Moving the student to another group re-checks that group's capacity.
/// Changes that affect recognition (encoding, status, name) reload the face
/// index.
pub async fn update_student(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateStudent>,
) -> ApiResult<Json<Student>> {
    req.validate()?;
    if let Some(Some(encoding)) = &req.face_encoding {
        validate_encoding(encoding)?;
    }

    let mut tx = state.db.begin().await?;

    let existing = Student::find_for_update(&mut tx, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Student not found".to_string()))?;

    let updated = existing.apply(req);

    if updated.group_id != existing.group_id {
        if let Some(group_id) = updated.group_id {
            ensure_group_has_room(&mut tx, group_id).await?;
        }
    }

    let saved = Student::save(&mut tx, &updated)
        .await?
        .ok_or_else(|| ApiError::NotFound("Student not found".to_string()))?;
    tx.commit().await?;

    let recognition_changed = existing.face_encoding != saved.face_encoding
        || existing.status != saved.status
        || existing.full_name != saved.full_name;
    if recognition_changed {
        state.refresh_face_index().await;
    }

    tracing::info!(student_id = %id, "Student updated");

    Ok(Json(saved))
}

/// Delete a student with everything that references them
pub async fn delete_student(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<MessageResponse>> {
    let name = Student::delete(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Student not found".to_string()))?;

    state.refresh_face_index().await;

    Ok(Json(MessageResponse::ok(format!("Student {} deleted", name))))
}

/// Replace or clear a student's face encoding
///
/// The encoding is produced by the capture client; this endpoint only
/// validates its shape.
pub async fn set_face(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<SetFaceRequest>,
) -> ApiResult<Json<SetFaceResponse>> {
    if let Some(encoding) = &req.encoding {
        validate_encoding(encoding)?;
    }

    if !Student::set_face_encoding(&state.db, id, req.encoding.as_deref()).await? {
        return Err(ApiError::NotFound("Student not found".to_string()));
    }

    state.refresh_face_index().await;

    Ok(Json(SetFaceResponse {
        success: true,
        has_face: req.encoding.is_some(),
    }))
}

/// A student's payments grouped by the month they cover
pub async fn monthly_payments(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<MonthlyPaymentsResponse>> {
    let student = Student::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Student not found".to_string()))?;

    let tariff_price = match student.tariff_id {
        Some(tariff_id) => Tariff::find_by_id(&state.db, tariff_id)
            .await?
            .map_or(0, |t| t.price),
        None => 0,
    };

    let lines = Payment::lines_for_student(&state.db, id).await?;

    Ok(Json(MonthlyPaymentsResponse {
        payments_by_month: group_payments_by_month(&lines, tariff_price),
        tariff_price,
    }))
}
