/// Club settings endpoints
///
/// # Endpoints
///
/// - `GET /api/club-settings` - Current settings
/// - `PUT /api/club-settings` - Replace settings (admin, financier)

use crate::{app::AppState, error::ApiResult};
use axum::{extract::State, Extension, Json};
use clubdesk_shared::{
    auth::{
        authorization::{require_any_role, SETTINGS_ROLES},
        middleware::AuthContext,
    },
    models::club_settings::{ClubSettings, SettingsInput},
};

pub async fn get_settings(State(state): State<AppState>) -> ApiResult<Json<ClubSettings>> {
    Ok(Json(ClubSettings::get(&state.db).await?))
}

/// Replace the club settings
///
/// # Endpoint
///
/// ```text
/// PUT /api/club-settings
///
/// {
///   "system_name": "FK QORASUV",
///   "working_days": [1, 2, 3, 4, 5, 6],
///   "work_start_time": "08:00:00",
///   "work_end_time": "21:00:00",
///   "max_groups_per_slot": 2,
///   "block_future_payments": true,
///   "rewards_reset_period_months": 3,
///   "podium_display_count": 20
/// }
/// ```
///
/// # Errors
///
/// - `400 Bad Request`: No working days, end not after start, capacity not
///   positive, reset period outside 1..=12, podium not 5..=50 in steps of 5
/// - `403 Forbidden`: Not admin or financier
pub async fn update_settings(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<SettingsInput>,
) -> ApiResult<Json<ClubSettings>> {
    require_any_role(&auth, SETTINGS_ROLES)?;

    let settings = req.into_settings(&state.config.club.system_name)?;
    let saved = ClubSettings::update(&state.db, &settings).await?;

    tracing::info!(updated_by = %auth.user_id, "Club settings replaced");

    Ok(Json(saved))
}
