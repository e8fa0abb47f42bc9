/// Tariff endpoints
///
/// # Endpoints
///
/// - `GET /api/tariffs` - Active tariffs by lesson count
/// - `POST /api/tariffs` - Create a tariff
/// - `PUT /api/tariffs/:id` - Partial update
/// - `DELETE /api/tariffs/:id` - Deactivate

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    routes::{required_text, MessageResponse},
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use clubdesk_shared::{
    analytics::round_price,
    billing::lesson_price,
    models::tariff::{CreateTariff, Tariff, UpdateTariff},
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateTariffRequest {
    pub name: String,

    #[validate(range(min = 1, message = "A tariff needs at least one lesson"))]
    pub lessons_count: i32,

    #[validate(range(min = 0, message = "Price cannot be negative"))]
    pub price: i64,

    #[serde(default)]
    pub description: Option<String>,
}

/// Tariff as listed, with the derived per-lesson price
#[derive(Debug, Serialize)]
pub struct TariffItem {
    #[serde(flatten)]
    pub tariff: Tariff,

    /// Rounded to two decimals; 0 when the tariff has no lessons
    pub price_per_lesson: f64,
}

impl From<Tariff> for TariffItem {
    fn from(tariff: Tariff) -> Self {
        Self {
            price_per_lesson: lesson_price(&tariff.terms()).map_or(0.0, round_price),
            tariff,
        }
    }
}

/// Rules shared by create and update
fn check_terms(tariff: &Tariff) -> ApiResult<()> {
    if tariff.name.is_empty() {
        return Err(ApiError::invalid("name", "Tariff name is required"));
    }
    if tariff.lessons_count < 1 {
        return Err(ApiError::invalid("lessons_count", "A tariff needs at least one lesson"));
    }
    if tariff.price < 0 {
        return Err(ApiError::invalid("price", "Price cannot be negative"));
    }
    Ok(())
}

/// Active tariffs, smallest pack first
pub async fn list_tariffs(State(state): State<AppState>) -> ApiResult<Json<Vec<TariffItem>>> {
    let tariffs = Tariff::list_active(&state.db).await?;

    Ok(Json(tariffs.into_iter().map(TariffItem::from).collect()))
}

/// Create a tariff
///
/// # Errors
///
/// - `409 Conflict`: Name already used
/// - `422 Unprocessable Entity`: Blank name, no lessons, negative price
pub async fn create_tariff(
    State(state): State<AppState>,
    Json(req): Json<CreateTariffRequest>,
) -> ApiResult<(StatusCode, Json<TariffItem>)> {
    req.validate()?;
    let name = required_text("name", &req.name, "Tariff name is required")?;

    let tariff = Tariff::create(
        &state.db,
        CreateTariff {
            name,
            lessons_count: req.lessons_count,
            price: req.price,
            description: req.description.map(|d| d.trim().to_string()).filter(|d| !d.is_empty()),
        },
    )
    .await?;

    Ok((StatusCode::CREATED, Json(TariffItem::from(tariff))))
}

pub async fn update_tariff(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateTariff>,
) -> ApiResult<Json<TariffItem>> {
    let existing = Tariff::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Tariff not found".to_string()))?;

    let updated = existing.apply(req);
    check_terms(&updated)?;

    let saved = Tariff::save(&state.db, &updated)
        .await?
        .ok_or_else(|| ApiError::NotFound("Tariff not found".to_string()))?;

    tracing::info!(tariff_id = %id, price = saved.price, "Tariff updated");

    Ok(Json(TariffItem::from(saved)))
}

/// Deactivate a tariff; its payments keep referring to it
pub async fn delete_tariff(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<MessageResponse>> {
    let tariff = Tariff::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Tariff not found".to_string()))?;

    if !Tariff::deactivate(&state.db, id).await? {
        return Err(ApiError::NotFound("Tariff not found".to_string()));
    }

    Ok(Json(MessageResponse::ok(format!(
        "Tariff \"{}\" deactivated",
        tariff.name
    ))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn tariff(lessons_count: i32, price: i64) -> Tariff {
        Tariff {
            id: Uuid::new_v4(),
            name: "12 lessons".to_string(),
            lessons_count,
            price,
            description: None,
            is_active: true,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_price_per_lesson_rounding() {
        assert_eq!(TariffItem::from(tariff(12, 600_000)).price_per_lesson, 50_000.0);
        assert_eq!(TariffItem::from(tariff(3, 100)).price_per_lesson, 33.33);
    }

    #[test]
    fn test_check_terms() {
        assert!(check_terms(&tariff(8, 400_000)).is_ok());
        assert!(check_terms(&tariff(0, 400_000)).is_err());
        assert!(check_terms(&tariff(8, -1)).is_err());

        let mut blank = tariff(8, 1);
        blank.name.clear();
        assert!(check_terms(&blank).is_err());
    }

    #[test]
    fn test_create_request_validation() {
        let req: CreateTariffRequest =
            serde_json::from_str(r#"{"name": "Trial", "lessons_count": 0, "price": 0}"#).unwrap();
        assert!(req.validate().is_err());
    }
}
