/// Teacher roll call
///
/// Teachers mark their own group's students by hand; admins may mark anyone
/// and pick the group to view.
///
/// # Endpoints
///
/// - `POST /api/teacher/attendance` - Mark a student present, late or absent
/// - `GET /api/teacher/attendance/today` - Today's marks for one group

use std::collections::HashMap;

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    routes::{attendance::lateness, clock_label, MessageResponse},
};
use axum::{
    extract::{Query, State},
    Extension, Json,
};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Utc};
use clubdesk_shared::{
    auth::{
        authorization::{require_any_role, require_group_access, ROLL_CALL_ROLES},
        middleware::AuthContext,
    },
    models::{
        attendance::{Attendance, CreateAttendance},
        group::Group,
        student::Student,
        user::{User, UserRole},
    },
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Roll call mark
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RollCallStatus {
    Present,
    Late,
    Absent,
}

#[derive(Debug, Deserialize)]
pub struct MarkAttendanceRequest {
    pub student_id: Uuid,
    pub status: RollCallStatus,

    /// Club-local date, defaults to today
    #[serde(default)]
    pub date: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
pub struct TodayQuery {
    /// Used for admins; teachers always see their own group
    pub group_id: Option<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct RollCallEntry {
    pub status: RollCallStatus,

    /// Club-local `HH:MM`
    pub check_in_time: String,
}

/// The group a teacher account is responsible for
pub(crate) async fn teacher_group(state: &AppState, auth: &AuthContext) -> ApiResult<Option<Uuid>> {
    if auth.role != UserRole::Teacher {
        return Ok(None);
    }

    let user = User::find_by_id(&state.db, auth.user_id)
        .await?
        .ok_or_else(|| ApiError::Unauthorized("Account no longer exists".to_string()))?;

    Ok(user.group_id)
}

/// Lateness recorded for a hand-made mark
///
/// A `late` mark for today counts minutes from the group start up to now;
/// for another day the minutes are unknown and stay zero.
fn marked_lateness(group: Option<&Group>, local_now: NaiveDateTime, date: NaiveDate) -> i32 {
    match group {
        Some(group) if date == local_now.date() => lateness(group, local_now).1.max(0),
        _ => 0,
    }
}

/// `(is_late, late_minutes)` stored for a `present` or `late` mark
fn mark_lateness(
    status: RollCallStatus,
    group: Option<&Group>,
    local_now: NaiveDateTime,
    date: NaiveDate,
) -> (bool, i32) {
    match status {
        RollCallStatus::Late => (true, marked_lateness(group, local_now, date)),
        _ => (false, 0),
    }
}

/// Mark a student for a day
///
/// `present` and `late` create the day's record when it is missing and
/// overwrite its lateness when it exists; `absent` removes it.
///
/// # Errors
///
/// - `403 Forbidden`: Not admin or teacher, or the student is in another group
/// - `404 Not Found`: Unknown student
pub async fn mark_attendance(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<MarkAttendanceRequest>,
) -> ApiResult<Json<MessageResponse>> {
    require_any_role(&auth, ROLL_CALL_ROLES)?;

    let own_group = teacher_group(&state, &auth).await?;

    let now = Utc::now();
    let local_now = state.clock.local(now);
    let date = req.date.unwrap_or(local_now.date());

    let mut tx = state.db.begin().await?;

    let student = Student::find_for_update(&mut tx, req.student_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Student not found".to_string()))?;

    require_group_access(&auth, own_group, student.group_id)?;

    if req.status == RollCallStatus::Absent {
        let removed = Attendance::delete_for_day(&mut tx, student.id, date).await?;
        tx.commit().await?;

        tracing::info!(student_id = %student.id, %date, removed, "Marked absent");
        return Ok(Json(MessageResponse::ok("Status saved")));
    }

    let group = match student.group_id {
        Some(group_id) => Group::find_by_id(&mut *tx, group_id).await?,
        None => None,
    };

    let (is_late, late_minutes) = mark_lateness(req.status, group.as_ref(), local_now, date);

    if let Some(existing) = Attendance::find_for_day(&mut *tx, student.id, date).await? {
        Attendance::set_lateness(&mut tx, existing.id, is_late, late_minutes).await?;
        tx.commit().await?;

        tracing::info!(
            student_id = %student.id,
            %date,
            marked_by = %auth.user_id,
            is_late,
            "Roll call mark corrected"
        );
        return Ok(Json(MessageResponse::ok("Status saved")));
    }

    // Past days are stamped at the group's start time
    let check_in = if date == local_now.date() {
        now
    } else {
        let start = group
            .as_ref()
            .map_or(NaiveTime::MIN, |g| g.schedule_time);
        state.clock.to_utc(date, start)
    };

    Attendance::create(
        &mut tx,
        CreateAttendance {
            student_id: student.id,
            check_in,
            date,
            lesson_deducted: !student.club_funded,
            is_late,
            late_minutes,
        },
    )
    .await?;
    tx.commit().await?;

    tracing::info!(
        student_id = %student.id,
        %date,
        marked_by = %auth.user_id,
        is_late,
        "Roll call mark saved"
    );

    Ok(Json(MessageResponse::ok("Status saved")))
}

/// Today's marks for a group, keyed by student id
///
/// # Errors
///
/// - `400 Bad Request`: No group given (admin) or assigned (teacher)
pub async fn today_status(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Query(query): Query<TodayQuery>,
) -> ApiResult<Json<HashMap<Uuid, RollCallEntry>>> {
    require_any_role(&auth, ROLL_CALL_ROLES)?;

    let group_id = if auth.role == UserRole::Teacher {
        teacher_group(&state, &auth).await?
    } else {
        query.group_id
    }
    .ok_or_else(|| ApiError::BadRequest("Group is not specified".to_string()))?;

    let records = Attendance::for_group_on(&state.db, group_id, state.clock.today()).await?;

    let marks = records
        .into_iter()
        .map(|record| {
            let status = if record.is_late {
                RollCallStatus::Late
            } else {
                RollCallStatus::Present
            };
            (
                record.student_id,
                RollCallEntry {
                    status,
                    check_in_time: clock_label(&state.clock.local(record.check_in)),
                },
            )
        })
        .collect();

    Ok(Json(marks))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn group() -> Group {
        Group {
            id: Uuid::new_v4(),
            name: "U-9".to_string(),
            schedule_time: NaiveTime::from_hms_opt(17, 0, 0).unwrap(),
            duration_minutes: 60,
            schedule_days: vec![2, 4],
            late_threshold: 10,
            max_students: Some(20),
            field_block_indices: vec![1],
            notes: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_status_wire_format() {
        let req: MarkAttendanceRequest = serde_json::from_str(&format!(
            r#"{{"student_id": "{}", "status": "late", "date": "2025-04-01"}}"#,
            Uuid::new_v4()
        ))
        .unwrap();

        assert_eq!(req.status, RollCallStatus::Late);
        assert_eq!(req.date, NaiveDate::from_ymd_opt(2025, 4, 1));
        assert!(serde_json::from_str::<RollCallStatus>(r#""sick""#).is_err());
    }

    #[test]
    fn test_marked_lateness() {
        let g = group();
        let now = NaiveDate::from_ymd_opt(2025, 4, 1)
            .unwrap()
            .and_hms_opt(17, 25, 0)
            .unwrap();

        assert_eq!(marked_lateness(Some(&g), now, now.date()), 25);
        assert_eq!(
            marked_lateness(Some(&g), now, NaiveDate::from_ymd_opt(2025, 3, 30).unwrap()),
            0
        );
        assert_eq!(marked_lateness(None, now, now.date()), 0);
    }

    #[test]
    fn test_mark_lateness_follows_status() {
        let g = group();
        let now = NaiveDate::from_ymd_opt(2025, 4, 1)
            .unwrap()
            .and_hms_opt(17, 25, 0)
            .unwrap();

        assert_eq!(
            mark_lateness(RollCallStatus::Late, Some(&g), now, now.date()),
            (true, 25)
        );
        assert_eq!(
            mark_lateness(RollCallStatus::Present, Some(&g), now, now.date()),
            (false, 0)
        );
    }
}
