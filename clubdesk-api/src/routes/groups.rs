/// Training groups
///
/// Every create and every update that touches the schedule runs the slot
/// validator against all other groups. When no explicit field blocks are
/// given, the lowest free blocks are assigned.
///
/// # Endpoints
///
/// - `GET /api/groups` - Groups with enrollment counts
/// - `POST /api/groups` - Create a group
/// - `PUT /api/groups/:id` - Partial update
/// - `DELETE /api/groups/:id` - Delete, detaching its students

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    routes::{clock_label, parse_time, required_text, MessageResponse},
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use clubdesk_shared::{
    models::{
        club_settings::ClubSettings,
        deserialize_some,
        group::{CreateGroup, Group, GroupWithCounts, UpdateGroup},
    },
    schedule::{
        assign_free_blocks, normalize_block_indices, parse_days, require_time,
        validate_group_schedule, GroupSlot,
    },
};
use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

const DEFAULT_DURATION: i32 = 60;
const DEFAULT_LATE_THRESHOLD: i32 = 15;

fn default_duration() -> i32 {
    DEFAULT_DURATION
}

fn default_late_threshold() -> i32 {
    DEFAULT_LATE_THRESHOLD
}

/// Create group request
///
/// `schedule_days` accepts an array of numbers or a comma-separated string.
#[derive(Debug, Deserialize)]
pub struct CreateGroupRequest {
    pub name: String,

    /// `"HH:MM"`
    #[serde(default)]
    pub schedule_time: Option<String>,

    #[serde(default = "default_duration")]
    pub duration_minutes: i32,

    #[serde(default)]
    pub schedule_days: serde_json::Value,

    /// Explicit blocks; when empty, `field_blocks` free blocks are assigned
    #[serde(default)]
    pub field_block_indices: Vec<i32>,

    #[serde(default)]
    pub field_blocks: Option<usize>,

    #[serde(default = "default_late_threshold")]
    pub late_threshold: i32,

    #[serde(default)]
    pub max_students: Option<i32>,

    #[serde(default)]
    pub notes: Option<String>,
}

/// Partial group update
#[derive(Debug, Default, Deserialize)]
pub struct UpdateGroupRequest {
    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub schedule_time: Option<String>,

    #[serde(default)]
    pub duration_minutes: Option<i32>,

    #[serde(default)]
    pub schedule_days: Option<serde_json::Value>,

    #[serde(default)]
    pub field_block_indices: Option<Vec<i32>>,

    /// Re-assign this many free blocks; ignored when indices are given
    #[serde(default)]
    pub field_blocks: Option<usize>,

    #[serde(default)]
    pub late_threshold: Option<i32>,

    #[serde(default, deserialize_with = "deserialize_some")]
    pub max_students: Option<Option<i32>>,

    #[serde(default, deserialize_with = "deserialize_some")]
    pub notes: Option<Option<String>>,
}

/// Group as listed
#[derive(Debug, Serialize)]
pub struct GroupItem {
    #[serde(flatten)]
    pub group: GroupWithCounts,

    /// `"HH:MM"`
    pub schedule_time_label: String,

    /// `"Mon, Wed, Fri"`
    pub schedule_days_label: String,

    pub field_blocks: usize,
    pub is_full: bool,
}

impl From<GroupWithCounts> for GroupItem {
    fn from(row: GroupWithCounts) -> Self {
        Self {
            schedule_time_label: clock_label(&row.group.schedule_time),
            schedule_days_label: row.group.days_label(),
            field_blocks: row.group.field_blocks(),
            is_full: row.is_full(),
            group: row,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CreateGroupResponse {
    pub success: bool,
    pub group_id: Uuid,
    pub field_block_indices: Vec<i32>,
}

/// Parses an optional `HH:MM` field; present but malformed is a 422
fn lesson_time(raw: Option<&str>) -> ApiResult<Option<NaiveTime>> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(None),
        Some(value) => parse_time(value)
            .map(Some)
            .ok_or_else(|| ApiError::invalid("schedule_time", "Time must be HH:MM")),
    }
}

fn check_limits(duration: i32, late_threshold: i32, max_students: Option<i32>) -> ApiResult<()> {
    if duration <= 0 {
        return Err(ApiError::invalid("duration_minutes", "Lesson duration must be positive"));
    }
    if late_threshold < 0 {
        return Err(ApiError::invalid("late_threshold", "Late threshold cannot be negative"));
    }
    if max_students.is_some_and(|max| max <= 0) {
        return Err(ApiError::invalid("max_students", "Maximum students must be positive"));
    }
    Ok(())
}

/// Normalized explicit block list; a group occupies at least one block
fn explicit_blocks(raw: &[i32]) -> ApiResult<Vec<i32>> {
    let blocks = normalize_block_indices(raw);
    if blocks.is_empty() {
        return Err(ApiError::invalid(
            "field_block_indices",
            "Select at least one field block",
        ));
    }
    Ok(blocks)
}

/// Validates `candidate` against the other groups and settles its blocks
///
/// Explicit blocks are checked as given; otherwise `block_count` free
/// blocks are picked.
async fn place_on_field(
    state: &AppState,
    mut candidate: GroupSlot,
    block_count: Option<usize>,
) -> ApiResult<Vec<i32>> {
    let rules = ClubSettings::get(&state.db).await?.slot_rules();
    let existing: Vec<GroupSlot> = Group::list(&state.db)
        .await?
        .iter()
        .map(Group::to_slot)
        .collect();

    match block_count {
        Some(count) => Ok(assign_free_blocks(&rules, &candidate, &existing, count)?),
        None => {
            candidate.blocks = explicit_blocks(&candidate.blocks)?;
            validate_group_schedule(&rules, &candidate, &existing)?;
            Ok(candidate.blocks)
        }
    }
}

/// Groups with enrollment, ordered by start time
pub async fn list_groups(State(state): State<AppState>) -> ApiResult<Json<Vec<GroupItem>>> {
    let groups = Group::list_with_counts(&state.db).await?;

    Ok(Json(groups.into_iter().map(GroupItem::from).collect()))
}

/// Create a group
///
/// # Endpoint
///
/// ```text
/// POST /api/groups
///
/// {
///   "name": "U-10",
///   "schedule_time": "15:00",
///   "duration_minutes": 90,
///   "schedule_days": [1, 3, 5],
///   "field_blocks": 1,
///   "max_students": 20
/// }
/// ```
///
/// # Errors
///
/// - `400 Bad Request`: No time or days, day or time outside club hours,
///   block out of range
/// - `409 Conflict`: No free field in the slot, or a requested block is taken
/// - `422 Unprocessable Entity`: Blank name, malformed time, bad limits
pub async fn create_group(
    State(state): State<AppState>,
    Json(req): Json<CreateGroupRequest>,
) -> ApiResult<(StatusCode, Json<CreateGroupResponse>)> {
    let name = required_text("name", &req.name, "Group name is required")?;
    let start = require_time(lesson_time(req.schedule_time.as_deref())?)?;
    check_limits(req.duration_minutes, req.late_threshold, req.max_students)?;

    let days = parse_days(&req.schedule_days);
    let block_count = if req.field_block_indices.is_empty() {
        Some(req.field_blocks.unwrap_or(1))
    } else {
        None
    };

    let candidate = GroupSlot {
        id: None,
        name: name.clone(),
        start,
        duration_minutes: req.duration_minutes,
        days: days.clone(),
        blocks: req.field_block_indices,
    };
    let blocks = place_on_field(&state, candidate, block_count).await?;

    let group = Group::create(
        &state.db,
        CreateGroup {
            name,
            schedule_time: start,
            duration_minutes: req.duration_minutes,
            schedule_days: days,
            late_threshold: req.late_threshold,
            max_students: req.max_students,
            field_block_indices: blocks,
            notes: req.notes.map(|n| n.trim().to_string()).filter(|n| !n.is_empty()),
        },
    )
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(CreateGroupResponse {
            success: true,
            group_id: group.id,
            field_block_indices: group.field_block_indices,
        }),
    ))
}

/// Partial group update
///
/// The schedule is re-validated when time, days, duration or blocks change.
pub async fn update_group(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateGroupRequest>,
) -> ApiResult<Json<Group>> {
    let existing = Group::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Group not found".to_string()))?;

    let name = req
        .name
        .as_deref()
        .map(|n| required_text("name", n, "Group name is required"))
        .transpose()?;
    let schedule_time = lesson_time(req.schedule_time.as_deref())?;
    let schedule_days = req.schedule_days.as_ref().map(parse_days);

    let reschedule = schedule_time.is_some()
        || schedule_days.is_some()
        || req.duration_minutes.is_some()
        || req.field_block_indices.is_some()
        || req.field_blocks.is_some();
    let block_count = match (&req.field_block_indices, req.field_blocks) {
        (None, Some(count)) => Some(count),
        _ => None,
    };

    let mut updated = existing.apply(UpdateGroup {
        name,
        schedule_time,
        duration_minutes: req.duration_minutes,
        schedule_days,
        late_threshold: req.late_threshold,
        max_students: req.max_students,
        field_block_indices: req.field_block_indices,
        notes: req
            .notes
            .map(|n| n.map(|n| n.trim().to_string()).filter(|n| !n.is_empty())),
    });
    check_limits(updated.duration_minutes, updated.late_threshold, updated.max_students)?;

    if reschedule {
        updated.field_block_indices = place_on_field(&state, updated.to_slot(), block_count).await?;
    }

    let saved = Group::save(&state.db, &updated)
        .await?
        .ok_or_else(|| ApiError::NotFound("Group not found".to_string()))?;

    tracing::info!(group_id = %id, rescheduled = reschedule, "Group updated");

    Ok(Json(saved))
}

/// Delete a group; its students stay enrolled without a group
pub async fn delete_group(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<MessageResponse>> {
    let detached = Group::delete(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Group not found".to_string()))?;

    Ok(Json(MessageResponse::ok(format!(
        "Group deleted, {} students left without a group",
        detached
    ))))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lesson_time() {
        assert_eq!(lesson_time(None).unwrap(), None);
        assert_eq!(lesson_time(Some("  ")).unwrap(), None);
        assert_eq!(
            lesson_time(Some("13:00")).unwrap(),
            NaiveTime::from_hms_opt(13, 0, 0)
        );
        assert!(matches!(
            lesson_time(Some("1pm")),
            Err(ApiError::ValidationError(_))
        ));
    }

    #[test]
    fn test_explicit_blocks_must_not_be_empty() {
        assert_eq!(explicit_blocks(&[2, 0, 2]).unwrap(), vec![0, 2]);
        assert!(matches!(
            explicit_blocks(&[-1]),
            Err(ApiError::ValidationError(ref details)) if details[0].field == "field_block_indices"
        ));
        assert!(explicit_blocks(&[]).is_err());
    }

    #[test]
    fn test_check_limits() {
        assert!(check_limits(60, 15, None).is_ok());
        assert!(check_limits(60, 0, Some(12)).is_ok());
        assert!(check_limits(0, 15, None).is_err());
        assert!(check_limits(60, -1, None).is_err());
        assert!(check_limits(60, 15, Some(0)).is_err());
    }

    #[test]
    fn test_create_request_defaults() {
        let req: CreateGroupRequest = serde_json::from_str(
            r#"{"name": "U-8", "schedule_time": "10:00", "schedule_days": "1,3"}"#,
        )
        .unwrap();

        assert_eq!(req.duration_minutes, DEFAULT_DURATION);
        assert_eq!(req.late_threshold, DEFAULT_LATE_THRESHOLD);
        assert!(req.field_block_indices.is_empty());
        assert_eq!(parse_days(&req.schedule_days), vec![1, 3]);
    }

    #[test]
    fn test_update_request_distinguishes_clearing() {
        let req: UpdateGroupRequest =
            serde_json::from_str(r#"{"max_students": null}"#).unwrap();
        assert_eq!(req.max_students, Some(None));

        let req: UpdateGroupRequest = serde_json::from_str(r#"{}"#).unwrap();
        assert_eq!(req.max_students, None);
    }
}
