/// Group ratings and monthly podiums
///
/// Current ratings sum reward points over the current reward window and
/// show at most `podium_display_count` students. The winners history keeps
/// the top three of every calendar month.
///
/// # Endpoints
///
/// - `GET /api/rating/groups/:group_id` - Rating of one group
/// - `GET /api/rating/all-groups` - Rating of every group
/// - `GET /api/rating/winners-history` - Monthly top three per group for `?year`

use std::collections::HashMap;

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
};
use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::Datelike;
use clubdesk_shared::{
    models::{
        club_settings::ClubSettings,
        group::Group,
        reward::{GroupRatingRow, StudentReward},
    },
    rating::{rank, reward_window, yearly_podiums, MonthPodium, RatingEntry, RewardWindow},
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Serialize)]
pub struct GroupRatingResponse {
    pub group_id: Uuid,
    pub group_name: String,
    pub rating: Vec<RatingEntry>,
    pub window: RewardWindow,
}

#[derive(Debug, Serialize)]
pub struct GroupRating {
    pub group_id: Uuid,
    pub group_name: String,
    pub rating: Vec<RatingEntry>,
}

#[derive(Debug, Serialize)]
pub struct AllGroupsResponse {
    pub groups: Vec<GroupRating>,
    pub window: RewardWindow,
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub year: Option<i32>,
}

#[derive(Debug, Serialize)]
pub struct GroupWinners {
    pub group_id: Uuid,
    pub group_name: String,
    pub winners: Vec<MonthPodium>,
}

#[derive(Debug, Serialize)]
pub struct WinnersHistoryResponse {
    pub year: i32,
    pub groups: Vec<GroupWinners>,
}

/// Splits rating rows by group
fn by_group(rows: Vec<GroupRatingRow>) -> HashMap<Uuid, Vec<RatingEntry>> {
    let mut grouped: HashMap<Uuid, Vec<RatingEntry>> = HashMap::new();
    for row in rows {
        grouped.entry(row.group_id).or_default().push(row.entry);
    }
    grouped
}

/// Window and podium size from the current settings
async fn rating_scope(state: &AppState) -> ApiResult<(RewardWindow, usize)> {
    let settings = ClubSettings::get(&state.db).await?;
    let window = reward_window(settings.rewards_reset_period_months, state.clock.today());
    let limit = usize::try_from(settings.podium_display_count).unwrap_or(0);
    Ok((window, limit))
}

pub async fn group_rating(
    State(state): State<AppState>,
    Path(group_id): Path<Uuid>,
) -> ApiResult<Json<GroupRatingResponse>> {
    let group = Group::find_by_id(&state.db, group_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Group not found".to_string()))?;
    let (window, limit) = rating_scope(&state).await?;

    let rows = StudentReward::window_points(&state.db, window, Some(group.id)).await?;
    let entries = rows.into_iter().map(|row| row.entry).collect();

    Ok(Json(GroupRatingResponse {
        group_id: group.id,
        group_name: group.name,
        rating: rank(entries, limit),
        window,
    }))
}

/// Ratings of all groups, in group listing order
pub async fn all_groups(State(state): State<AppState>) -> ApiResult<Json<AllGroupsResponse>> {
    let (window, limit) = rating_scope(&state).await?;
    let groups = Group::list(&state.db).await?;
    let mut points = by_group(StudentReward::window_points(&state.db, window, None).await?);

    let groups = groups
        .into_iter()
        .map(|group| GroupRating {
            rating: rank(points.remove(&group.id).unwrap_or_default(), limit),
            group_id: group.id,
            group_name: group.name,
        })
        .collect();

    Ok(Json(AllGroupsResponse { groups, window }))
}

/// Top three students of each month of `?year` (default: current year)
pub async fn winners_history(
    State(state): State<AppState>,
    Query(query): Query<HistoryQuery>,
) -> ApiResult<Json<WinnersHistoryResponse>> {
    let year = query.year.unwrap_or_else(|| state.clock.today().year());
    let groups = Group::list(&state.db).await?;

    let mut monthly: HashMap<Uuid, Vec<(u32, RatingEntry)>> = HashMap::new();
    for row in StudentReward::monthly_points(&state.db, year).await? {
        let Ok(month) = u32::try_from(row.month) else {
            continue;
        };
        monthly.entry(row.group_id).or_default().push((month, row.entry));
    }

    let groups = groups
        .into_iter()
        .map(|group| GroupWinners {
            winners: yearly_podiums(monthly.remove(&group.id).unwrap_or_default()),
            group_id: group.id,
            group_name: group.name,
        })
        .collect();

    Ok(Json(WinnersHistoryResponse { year, groups }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(group_id: Uuid, name: &str, points: i64) -> GroupRatingRow {
        GroupRatingRow {
            group_id,
            entry: RatingEntry {
                student_id: Uuid::new_v4(),
                full_name: name.to_string(),
                photo_path: None,
                points,
            },
        }
    }

    #[test]
    fn test_by_group_then_rank() {
        let juniors = Uuid::new_v4();
        let seniors = Uuid::new_v4();
        let rows = vec![
            row(juniors, "Bobur", 4),
            row(seniors, "Jasur", 0),
            row(juniors, "Anvar", 7),
            row(juniors, "Dilshod", 0),
        ];

        let mut grouped = by_group(rows);
        let juniors_rating = rank(grouped.remove(&juniors).unwrap(), 20);
        let names: Vec<&str> = juniors_rating.iter().map(|e| e.full_name.as_str()).collect();
        assert_eq!(names, vec!["Anvar", "Bobur"]);

        assert!(rank(grouped.remove(&seniors).unwrap(), 20).is_empty());
    }
}
