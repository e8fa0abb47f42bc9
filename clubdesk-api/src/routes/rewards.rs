/// Reward types and rewards issued to students
///
/// # Endpoints
///
/// - `GET /api/rewards` - Reward types (admin)
/// - `POST /api/rewards` - Create a reward type (admin)
/// - `PUT /api/rewards/:id` - Partial update (admin)
/// - `DELETE /api/rewards/:id` - Delete (admin)
/// - `GET /api/students/:id/rewards` - Rewards of one month
/// - `POST /api/students/:id/rewards` - Issue a reward (admin, teacher)
/// - `GET /api/students/:id/points` - Points in the current reward window

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    routes::{required_text, teacher::teacher_group, MessageResponse},
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use clubdesk_shared::{
    auth::{
        authorization::{require_admin, require_any_role, require_group_access, REWARD_ISSUE_ROLES},
        middleware::AuthContext,
    },
    billing::YearMonth,
    models::{
        club_settings::ClubSettings,
        reward::{CreateRewardType, IssuedReward, RewardType, StudentReward, UpdateRewardType},
        student::Student,
    },
    rating::{reward_window, RewardWindow},
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

fn default_points() -> i32 {
    1
}

#[derive(Debug, Deserialize)]
pub struct CreateRewardTypeRequest {
    pub name: String,

    #[serde(default = "default_points")]
    pub points: i32,

    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct IssueRewardRequest {
    pub reward_type_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct IssueRewardResponse {
    pub success: bool,
    pub message: String,

    /// Points of the student in the current reward window
    pub total_points: i64,
}

#[derive(Debug, Deserialize)]
pub struct RewardMonthQuery {
    pub month: Option<u32>,
    pub year: Option<i32>,
}

#[derive(Debug, Serialize)]
pub struct PointsResponse {
    pub points: i64,
    pub window: RewardWindow,
}

fn check_reward_type(reward: &RewardType) -> ApiResult<()> {
    if reward.name.is_empty() {
        return Err(ApiError::invalid("name", "Reward name is required"));
    }
    if reward.points < 1 {
        return Err(ApiError::invalid("points", "Points must be at least 1"));
    }
    Ok(())
}

/// Month asked for, or the club's current month when either part is missing
fn requested_month(query: &RewardMonthQuery, current: YearMonth) -> ApiResult<YearMonth> {
    match (query.year, query.month) {
        (Some(year), Some(month)) => YearMonth::new(year, month)
            .ok_or_else(|| ApiError::invalid("month", "Month must be between 1 and 12")),
        _ => Ok(current),
    }
}

async fn current_window(state: &AppState) -> ApiResult<RewardWindow> {
    let settings = ClubSettings::get(&state.db).await?;
    Ok(reward_window(
        settings.rewards_reset_period_months,
        state.clock.today(),
    ))
}

/// Reward types, newest first
pub async fn list_reward_types(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<Vec<RewardType>>> {
    require_admin(&auth)?;

    Ok(Json(RewardType::list(&state.db).await?))
}

/// Create a reward type
///
/// # Errors
///
/// - `403 Forbidden`: Not admin
/// - `422 Unprocessable Entity`: Blank name or points below 1
pub async fn create_reward_type(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<CreateRewardTypeRequest>,
) -> ApiResult<(StatusCode, Json<RewardType>)> {
    require_admin(&auth)?;
    let name = required_text("name", &req.name, "Reward name is required")?;
    if req.points < 1 {
        return Err(ApiError::invalid("points", "Points must be at least 1"));
    }

    let reward = RewardType::create(
        &state.db,
        CreateRewardType {
            name,
            points: req.points,
            description: req.description.map(|d| d.trim().to_string()).filter(|d| !d.is_empty()),
        },
    )
    .await?;

    Ok((StatusCode::CREATED, Json(reward)))
}

pub async fn update_reward_type(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateRewardType>,
) -> ApiResult<Json<RewardType>> {
    require_admin(&auth)?;

    let existing = RewardType::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Reward not found".to_string()))?;

    let updated = existing.apply(req);
    check_reward_type(&updated)?;

    let saved = RewardType::save(&state.db, &updated)
        .await?
        .ok_or_else(|| ApiError::NotFound("Reward not found".to_string()))?;

    Ok(Json(saved))
}

/// Delete a reward type; rewards already issued keep their name and points
pub async fn delete_reward_type(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<MessageResponse>> {
    require_admin(&auth)?;

    let name = RewardType::delete(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Reward not found".to_string()))?;

    Ok(Json(MessageResponse::ok(format!("Reward \"{}\" deleted", name))))
}

/// Issue a reward to a student
///
/// # Endpoint
///
/// ```text
/// POST /api/students/:id/rewards
///
/// { "reward_type_id": "..." }
/// ```
///
/// # Errors
///
/// - `403 Forbidden`: Not admin or teacher, or a teacher outside their group
/// - `404 Not Found`: Unknown student or reward type
pub async fn issue_reward(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(student_id): Path<Uuid>,
    Json(req): Json<IssueRewardRequest>,
) -> ApiResult<Json<IssueRewardResponse>> {
    require_any_role(&auth, REWARD_ISSUE_ROLES)?;

    let student = Student::find_by_id(&state.db, student_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Student not found".to_string()))?;
    let own_group = teacher_group(&state, &auth).await?;
    require_group_access(&auth, own_group, student.group_id)?;

    let reward = RewardType::find_by_id(&state.db, req.reward_type_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Reward not found".to_string()))?;

    StudentReward::issue(
        &state.db,
        student.id,
        &reward,
        auth.user_id,
        YearMonth::of(state.clock.today()),
    )
    .await?;

    let window = current_window(&state).await?;
    let total_points = StudentReward::points_in_window(&state.db, student.id, window).await?;

    Ok(Json(IssueRewardResponse {
        success: true,
        message: format!("Reward \"{}\" issued (+{} points)", reward.name, reward.points),
        total_points,
    }))
}

/// Rewards of `?year&month`, newest first
pub async fn student_rewards(
    State(state): State<AppState>,
    Path(student_id): Path<Uuid>,
    Query(query): Query<RewardMonthQuery>,
) -> ApiResult<Json<Vec<IssuedReward>>> {
    let month = requested_month(&query, YearMonth::of(state.clock.today()))?;

    Ok(Json(
        StudentReward::list_for_month(&state.db, student_id, month).await?,
    ))
}

pub async fn student_points(
    State(state): State<AppState>,
    Path(student_id): Path<Uuid>,
) -> ApiResult<Json<PointsResponse>> {
    let window = current_window(&state).await?;
    let points = StudentReward::points_in_window(&state.db, student_id, window).await?;

    Ok(Json(PointsResponse { points, window }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_requested_month() {
        let current = YearMonth { year: 2025, month: 5 };

        let query = RewardMonthQuery { month: Some(2), year: Some(2024) };
        assert_eq!(
            requested_month(&query, current).unwrap(),
            YearMonth { year: 2024, month: 2 }
        );

        let query = RewardMonthQuery { month: Some(2), year: None };
        assert_eq!(requested_month(&query, current).unwrap(), current);

        let query = RewardMonthQuery { month: Some(13), year: Some(2025) };
        assert!(requested_month(&query, current).is_err());
    }

    #[test]
    fn test_check_reward_type() {
        let mut reward = RewardType {
            id: Uuid::new_v4(),
            name: "Goal of the week".to_string(),
            points: 2,
            description: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        assert!(check_reward_type(&reward).is_ok());

        reward.points = 0;
        assert!(check_reward_type(&reward).is_err());

        reward.points = 1;
        reward.name.clear();
        assert!(check_reward_type(&reward).is_err());
    }

    #[test]
    fn test_create_request_defaults_to_one_point() {
        let req: CreateRewardTypeRequest = serde_json::from_str(r#"{"name": "Fair play"}"#).unwrap();
        assert_eq!(req.points, 1);
    }
}
