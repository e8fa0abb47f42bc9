/// Expense endpoints, restricted to admins and financiers
///
/// # Endpoints
///
/// - `GET /api/expenses` - Last 50 expenses
/// - `POST /api/expenses` - Record an expense
/// - `PUT /api/expenses/:id` - Partial update
/// - `DELETE /api/expenses/:id` - Delete

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    routes::{required_text, MessageResponse},
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use clubdesk_shared::{
    auth::{
        authorization::{require_any_role, FINANCE_ROLES},
        middleware::AuthContext,
    },
    models::expense::{CreateExpense, Expense, UpdateExpense},
};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

/// Expenses listed by the expenses page and the finances report
pub const RECENT_LIMIT: i64 = 50;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateExpenseRequest {
    pub category: String,

    #[validate(range(min = 1, message = "Amount must be positive"))]
    pub amount: i64,

    #[serde(default)]
    pub description: Option<String>,

    /// Defaults to now
    #[serde(default)]
    pub expense_date: Option<DateTime<Utc>>,
}

pub async fn list_expenses(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<Vec<Expense>>> {
    require_any_role(&auth, FINANCE_ROLES)?;

    Ok(Json(Expense::recent(&state.db, RECENT_LIMIT).await?))
}

/// Record an expense
///
/// # Errors
///
/// - `403 Forbidden`: Not admin or financier
/// - `422 Unprocessable Entity`: Blank category or non-positive amount
pub async fn create_expense(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<CreateExpenseRequest>,
) -> ApiResult<(StatusCode, Json<Expense>)> {
    require_any_role(&auth, FINANCE_ROLES)?;
    req.validate()?;
    let category = required_text("category", &req.category, "Category is required")?;

    let expense = Expense::create(
        &state.db,
        CreateExpense {
            category,
            amount: req.amount,
            description: req.description.map(|d| d.trim().to_string()).filter(|d| !d.is_empty()),
            expense_date: req.expense_date,
            created_by: Some(auth.user_id),
        },
    )
    .await?;

    Ok((StatusCode::CREATED, Json(expense)))
}

pub async fn update_expense(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateExpense>,
) -> ApiResult<Json<Expense>> {
    require_any_role(&auth, FINANCE_ROLES)?;

    let existing = Expense::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Expense not found".to_string()))?;

    let updated = existing.apply(req);
    if updated.category.is_empty() {
        return Err(ApiError::invalid("category", "Category is required"));
    }
    if updated.amount <= 0 {
        return Err(ApiError::invalid("amount", "Amount must be positive"));
    }

    let saved = Expense::save(&state.db, &updated)
        .await?
        .ok_or_else(|| ApiError::NotFound("Expense not found".to_string()))?;

    tracing::info!(expense_id = %id, updated_by = %auth.user_id, "Expense updated");

    Ok(Json(saved))
}

pub async fn delete_expense(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<MessageResponse>> {
    require_any_role(&auth, FINANCE_ROLES)?;

    if !Expense::delete(&state.db, id).await? {
        return Err(ApiError::NotFound("Expense not found".to_string()));
    }

    tracing::info!(expense_id = %id, deleted_by = %auth.user_id, "Expense deleted");

    Ok(Json(MessageResponse::ok("Expense deleted")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_request() {
        let req: CreateExpenseRequest =
            serde_json::from_str(r#"{"category": "Balls", "amount": 250000}"#).unwrap();
        assert!(req.validate().is_ok());
        assert!(req.expense_date.is_none());

        let req: CreateExpenseRequest =
            serde_json::from_str(r#"{"category": "Balls", "amount": -5}"#).unwrap();
        assert!(req.validate().is_err());
    }
}
