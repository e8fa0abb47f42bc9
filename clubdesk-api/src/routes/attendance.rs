/// Attendance endpoints
///
/// # Endpoints
///
/// - `POST /api/attendance/checkin` - Check a student in for today
/// - `GET /api/attendance/today` - Who is here today
/// - `GET /api/attendance/years` - Years with attendance
/// - `GET /api/attendance` - Filtered journal
/// - `GET /api/attendance/analytics` - Yearly statistics
/// - `DELETE /api/attendance/:id` - Remove a record

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    routes::{clock_label, MessageResponse},
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, Utc};
use clubdesk_shared::{
    analytics::{late_stats, month_name, LateStats},
    models::{
        attendance::{
            fill_buckets, Attendance, AttendanceFilter, AttendanceRow, CreateAttendance, GroupCount,
        },
        group::Group,
        student::{Student, StudentStatus},
    },
};
use serde::{Deserialize, Serialize};
use sqlx::PgConnection;
use uuid::Uuid;

const NO_GROUP: &str = "No group";

/// Check-in request from the camera kiosk or the front desk
#[derive(Debug, Deserialize)]
pub struct CheckInRequest {
    pub student_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct CheckInResponse {
    pub success: bool,
    pub student_name: String,
    pub remaining_balance: i64,
    pub is_late: bool,
    pub late_minutes: i32,
    pub club_funded: bool,

    /// Balance was already used up before this check-in
    pub low_balance: bool,
}

/// Today's check-in row
#[derive(Debug, Serialize)]
pub struct TodayItem {
    pub id: Uuid,
    pub student_id: Uuid,
    pub student_name: String,
    pub photo_path: Option<String>,
    pub group_name: String,

    /// Club-local `HH:MM`
    pub check_in: String,

    pub is_late: bool,
    pub balance: i64,
    pub low_balance: bool,
}

/// Journal row
#[derive(Debug, Serialize)]
pub struct JournalItem {
    pub id: Uuid,
    pub student_id: Uuid,
    pub student_name: String,
    pub group_name: Option<String>,
    pub check_in_time: DateTime<Utc>,
    pub date: NaiveDate,
    pub is_late: bool,
    pub late_minutes: i32,
    pub balance: i64,
}

impl From<AttendanceRow> for JournalItem {
    fn from(row: AttendanceRow) -> Self {
        Self {
            balance: row.facts.balance(),
            id: row.attendance.id,
            student_id: row.attendance.student_id,
            student_name: row.student_name,
            group_name: row.group_name,
            check_in_time: row.attendance.check_in,
            date: row.attendance.date,
            is_late: row.attendance.is_late,
            late_minutes: row.attendance.late_minutes,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct YearsResponse {
    pub years: Vec<i32>,
    pub current_year: i32,
}

#[derive(Debug, Deserialize)]
pub struct AnalyticsQuery {
    pub year: Option<i32>,
}

#[derive(Debug, Serialize)]
pub struct MonthCount {
    pub month: i32,
    pub month_name: &'static str,
    pub count: i64,
}

#[derive(Debug, Serialize)]
pub struct WeekdayCount {
    /// ISO weekday, 1 = Monday
    pub weekday: i32,
    pub count: i64,
}

#[derive(Debug, Serialize)]
pub struct AnalyticsResponse {
    pub year: i32,
    pub monthly: Vec<MonthCount>,
    pub weekdays: Vec<WeekdayCount>,
    pub groups: Vec<GroupCount>,
    pub late_stats: LateStats,
}

/// Whether a check-in at club-local `at` is late for `group`, and by how
/// many whole minutes after the start
pub(crate) fn lateness(group: &Group, at: NaiveDateTime) -> (bool, i32) {
    let start = at.date().and_time(group.schedule_time);
    let seconds = (at - start).num_seconds();

    if seconds > i64::from(group.late_threshold) * 60 {
        (true, (seconds / 60) as i32)
    } else {
        (false, 0)
    }
}

/// Lateness of a student checking in at `at`; never late without a group
pub(crate) async fn lateness_for(
    conn: &mut PgConnection,
    group_id: Option<Uuid>,
    at: NaiveDateTime,
) -> ApiResult<(bool, i32)> {
    let Some(group_id) = group_id else {
        return Ok((false, 0));
    };

    Ok(Group::find_by_id(conn, group_id)
        .await?
        .map_or((false, 0), |group| lateness(&group, at)))
}

/// Check a student in for the current club-local day
///
/// A student with no lessons left is still let in; the response flags
/// `low_balance` so the desk can follow up.
///
/// # Errors
///
/// - `403 Forbidden`: Student is blacklisted
/// - `404 Not Found`: Unknown student
/// - `409 Conflict`: Already checked in today
pub async fn check_in(
    State(state): State<AppState>,
    Json(req): Json<CheckInRequest>,
) -> ApiResult<(StatusCode, Json<CheckInResponse>)> {
    let now = Utc::now();
    let local = state.clock.local(now);
    let today = local.date();

    let mut tx = state.db.begin().await?;

    let student = Student::find_for_update(&mut tx, req.student_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Student not found".to_string()))?;

    if student.status == StudentStatus::Blacklist {
        tracing::info!(student_id = %student.id, "Blacklisted student refused at check-in");
        return Err(ApiError::Forbidden(format!(
            "{} is blacklisted",
            student.full_name
        )));
    }

    if Attendance::find_for_day(&mut *tx, student.id, today).await?.is_some() {
        return Err(ApiError::Conflict("Already checked in today".to_string()));
    }

    let before = Student::balance(&mut *tx, student.id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Student not found".to_string()))?;
    let low_balance = before.low_balance();

    let (is_late, late_minutes) = lateness_for(&mut tx, student.group_id, local).await?;

    Attendance::create(
        &mut tx,
        CreateAttendance {
            student_id: student.id,
            check_in: now,
            date: today,
            lesson_deducted: !student.club_funded,
            is_late,
            late_minutes,
        },
    )
    .await?;

    let remaining_balance = Student::balance(&mut *tx, student.id)
        .await?
        .map_or(0, |facts| facts.balance());
    tx.commit().await?;

    tracing::info!(
        student_id = %student.id,
        is_late,
        remaining_balance,
        "Student checked in"
    );

    Ok((
        StatusCode::CREATED,
        Json(CheckInResponse {
            success: true,
            student_name: student.full_name,
            remaining_balance,
            is_late,
            late_minutes,
            club_funded: student.club_funded,
            low_balance,
        }),
    ))
}

/// Everyone checked in today, in check-in order
pub async fn today(State(state): State<AppState>) -> ApiResult<Json<Vec<TodayItem>>> {
    let rows = Attendance::list_for_day(&state.db, state.clock.today()).await?;

    let items = rows
        .into_iter()
        .map(|row| TodayItem {
            id: row.attendance.id,
            student_id: row.attendance.student_id,
            check_in: clock_label(&state.clock.local(row.attendance.check_in)),
            is_late: row.attendance.is_late,
            balance: row.facts.balance(),
            low_balance: row.facts.low_balance(),
            student_name: row.student_name,
            photo_path: row.photo_path,
            group_name: row.group_name.unwrap_or_else(|| NO_GROUP.to_string()),
        })
        .collect();

    Ok(Json(items))
}

/// Years with attendance, newest first, always including the current year
pub async fn years(State(state): State<AppState>) -> ApiResult<Json<YearsResponse>> {
    let current_year = state.clock.today().year();

    let mut years = Attendance::years(&state.db).await?;
    if !years.contains(&current_year) {
        years.push(current_year);
        years.sort_unstable_by(|a, b| b.cmp(a));
    }

    Ok(Json(YearsResponse {
        years,
        current_year,
    }))
}

/// Attendance journal, newest first
///
/// # Endpoint
///
/// ```text
/// GET /api/attendance?year=2025&month=3&group_id=uuid&student_id=uuid
/// ```
pub async fn list_attendance(
    State(state): State<AppState>,
    Query(filter): Query<AttendanceFilter>,
) -> ApiResult<Json<Vec<JournalItem>>> {
    if let Some(month) = filter.month {
        if !(1..=12).contains(&month) {
            return Err(ApiError::BadRequest("Month must be between 1 and 12".to_string()));
        }
    }

    let rows = Attendance::list_filtered(&state.db, &filter).await?;

    Ok(Json(rows.into_iter().map(JournalItem::from).collect()))
}

/// Monthly, weekday, per-group and lateness statistics for a year
pub async fn analytics(
    State(state): State<AppState>,
    Query(query): Query<AnalyticsQuery>,
) -> ApiResult<Json<AnalyticsResponse>> {
    let year = query.year.unwrap_or_else(|| state.clock.today().year());

    let monthly = fill_buckets(&Attendance::monthly_counts(&state.db, year).await?, 12)
        .into_iter()
        .map(|b| MonthCount {
            month: b.bucket,
            month_name: month_name(b.bucket as u32),
            count: b.count,
        })
        .collect();

    let weekdays = fill_buckets(&Attendance::weekday_counts(&state.db, year).await?, 7)
        .into_iter()
        .map(|b| WeekdayCount {
            weekday: b.bucket,
            count: b.count,
        })
        .collect();

    let groups = Attendance::group_counts(&state.db, year).await?;
    let totals = Attendance::late_totals(&state.db, year).await?;

    Ok(Json(AnalyticsResponse {
        year,
        monthly,
        weekdays,
        groups,
        late_stats: late_stats(totals.total, totals.late, totals.avg_late_minutes),
    }))
}

/// Delete an attendance record, giving the lesson back
pub async fn delete_attendance(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<MessageResponse>> {
    let student_id = Attendance::delete(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Record not found".to_string()))?;

    let student = Student::find_by_id(&state.db, student_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Student not found".to_string()))?;
    let balance = Student::balance(&state.db, student_id)
        .await?
        .map_or(0, |facts| facts.balance());

    Ok(Json(MessageResponse::ok(format!(
        "Record deleted, balance of {}: {}",
        student.full_name, balance
    ))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveTime;

    fn group(start: (u32, u32), threshold: i32) -> Group {
        Group {
            id: Uuid::new_v4(),
            name: "U-12".to_string(),
            schedule_time: NaiveTime::from_hms_opt(start.0, start.1, 0).unwrap(),
            duration_minutes: 90,
            schedule_days: vec![1, 3, 5],
            late_threshold: threshold,
            max_students: None,
            field_block_indices: vec![0],
            notes: None,
            created_at: Utc::now(),
        }
    }

    fn at(h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 3, 10)
            .unwrap()
            .and_hms_opt(h, m, s)
            .unwrap()
    }

    #[test]
    fn test_on_time_and_early() {
        let g = group((16, 0), 15);
        assert_eq!(lateness(&g, at(15, 40, 0)), (false, 0));
        assert_eq!(lateness(&g, at(16, 15, 0)), (false, 0));
    }

    #[test]
    fn test_late_after_threshold() {
        let g = group((16, 0), 15);
        assert_eq!(lateness(&g, at(16, 15, 1)), (true, 15));
        assert_eq!(lateness(&g, at(16, 42, 30)), (true, 42));
    }

    #[test]
    fn test_zero_threshold() {
        let g = group((9, 0), 0);
        assert_eq!(lateness(&g, at(9, 0, 0)), (false, 0));
        assert_eq!(lateness(&g, at(9, 3, 0)), (true, 3));
    }
}
