/// Cash handed over from the payment desk
///
/// Open to admins, financiers and payment admins.
///
/// # Endpoints
///
/// - `GET /api/cash-transfers` - All transfers, newest first
/// - `POST /api/cash-transfers` - Record a transfer
/// - `GET /api/cash-transfers/summary` - Income, transferred, cash on hand
/// - `PUT /api/cash-transfers/:id` - Partial update
/// - `DELETE /api/cash-transfers/:id` - Delete

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
        authorization::{require_any_role, CASH_TRANSFER_ROLES},
        middleware::AuthContext,
    },
    models::{
        cash_transfer::{CashTransfer, CreateCashTransfer, UpdateCashTransfer},
        payment::Payment,
    },
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateTransferRequest {
    #[validate(range(min = 1, message = "Amount must be positive"))]
    pub amount: i64,

    pub recipient: String,

    /// Defaults to now
    #[serde(default)]
    pub transfer_date: Option<DateTime<Utc>>,

    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CashSummary {
    pub total_income: i64,
    pub total_transferred: i64,
    pub cash_on_hand: i64,
}

impl CashSummary {
    pub fn new(total_income: i64, total_transferred: i64) -> Self {
        Self {
            total_income,
            total_transferred,
            cash_on_hand: total_income - total_transferred,
        }
    }
}

pub async fn list_transfers(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<Vec<CashTransfer>>> {
    require_any_role(&auth, CASH_TRANSFER_ROLES)?;

    Ok(Json(CashTransfer::list(&state.db).await?))
}

/// Record a transfer
///
/// # Errors
///
/// - `403 Forbidden`: Role not allowed
/// - `422 Unprocessable Entity`: Non-positive amount or blank recipient
pub async fn create_transfer(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<CreateTransferRequest>,
) -> ApiResult<(StatusCode, Json<CashTransfer>)> {
    require_any_role(&auth, CASH_TRANSFER_ROLES)?;
    req.validate()?;
    let recipient = required_text("recipient", &req.recipient, "Recipient is required")?;

    let transfer = CashTransfer::create(
        &state.db,
        CreateCashTransfer {
            amount: req.amount,
            recipient,
            transfer_date: req.transfer_date.unwrap_or_else(Utc::now),
            notes: req.notes.map(|n| n.trim().to_string()).filter(|n| !n.is_empty()),
            created_by: Some(auth.user_id),
        },
    )
    .await?;

    Ok((StatusCode::CREATED, Json(transfer)))
}

/// Cash still at the desk: all income minus all transfers
pub async fn summary(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<CashSummary>> {
    require_any_role(&auth, CASH_TRANSFER_ROLES)?;

    let income = Payment::total(&state.db).await?;
    let transferred = CashTransfer::total(&state.db).await?;

    Ok(Json(CashSummary::new(income, transferred)))
}

pub async fn update_transfer(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateCashTransfer>,
) -> ApiResult<Json<CashTransfer>> {
    require_any_role(&auth, CASH_TRANSFER_ROLES)?;

    let existing = CashTransfer::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Transfer not found".to_string()))?;

    let updated = existing.apply(req);
    if updated.amount <= 0 {
        return Err(ApiError::invalid("amount", "Amount must be positive"));
    }
    if updated.recipient.is_empty() {
        return Err(ApiError::invalid("recipient", "Recipient is required"));
    }

    let saved = CashTransfer::save(&state.db, &updated)
        .await?
        .ok_or_else(|| ApiError::NotFound("Transfer not found".to_string()))?;

    tracing::info!(transfer_id = %id, updated_by = %auth.user_id, "Cash transfer updated");

    Ok(Json(saved))
}

pub async fn delete_transfer(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<MessageResponse>> {
    require_any_role(&auth, CASH_TRANSFER_ROLES)?;

    if !CashTransfer::delete(&state.db, id).await? {
        return Err(ApiError::NotFound("Transfer not found".to_string()));
    }

    tracing::info!(transfer_id = %id, deleted_by = %auth.user_id, "Cash transfer deleted");

    Ok(Json(MessageResponse::ok("Transfer deleted")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cash_on_hand() {
        let summary = CashSummary::new(5_000_000, 3_200_000);
        assert_eq!(summary.cash_on_hand, 1_800_000);

        // Over-transferred desks go negative rather than being clamped
        assert_eq!(CashSummary::new(0, 100).cash_on_hand, -100);
    }

    #[test]
    fn test_create_request_validation() {
        let req: CreateTransferRequest =
            serde_json::from_str(r#"{"amount": 0, "recipient": "Director"}"#).unwrap();
        assert!(req.validate().is_err());

        let req: CreateTransferRequest =
            serde_json::from_str(r#"{"amount": 100000, "recipient": "Director"}"#).unwrap();
        assert!(req.validate().is_ok());
        assert!(req.transfer_date.is_none());
    }
}
