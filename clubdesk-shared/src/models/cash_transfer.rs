/// Cash handed over from the payment desk
///
/// Cash on hand is all income received minus everything transferred.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use super::deserialize_some;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct CashTransfer {
    pub id: Uuid,
    pub amount: i64,

    /// Who received the cash
    pub recipient: String,

    pub transfer_date: DateTime<Utc>,
    pub notes: Option<String>,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CreateCashTransfer {
    pub amount: i64,
    pub recipient: String,
    pub transfer_date: DateTime<Utc>,
    pub notes: Option<String>,
    pub created_by: Option<Uuid>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateCashTransfer {
    pub amount: Option<i64>,
    pub recipient: Option<String>,
    pub transfer_date: Option<DateTime<Utc>>,

    #[serde(default, deserialize_with = "deserialize_some")]
    pub notes: Option<Option<String>>,
}

impl CashTransfer {
    pub fn apply(&self, patch: UpdateCashTransfer) -> CashTransfer {
        let mut transfer = self.clone();

        if let Some(amount) = patch.amount {
            transfer.amount = amount;
        }
        if let Some(recipient) = patch.recipient {
            transfer.recipient = recipient.trim().to_string();
        }
        if let Some(date) = patch.transfer_date {
            transfer.transfer_date = date;
        }
        if let Some(notes) = patch.notes {
            transfer.notes = notes;
        }

        transfer
    }

    pub async fn create(pool: &PgPool, data: CreateCashTransfer) -> Result<Self, sqlx::Error> {
        let transfer = sqlx::query_as::<_, CashTransfer>(
            r#"
            INSERT INTO cash_transfers (amount, recipient, transfer_date, notes, created_by)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, amount, recipient, transfer_date, notes, created_by, created_at, updated_at
            "#,
        )
        .bind(data.amount)
        .bind(data.recipient)
        .bind(data.transfer_date)
        .bind(data.notes)
        .bind(data.created_by)
        .fetch_one(pool)
        .await?;

        tracing::info!(
            transfer_id = %transfer.id,
            amount = transfer.amount,
            recipient = %transfer.recipient,
            "Cash transfer recorded"
        );

        Ok(transfer)
    }

    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, CashTransfer>(
            r#"
            SELECT id, amount, recipient, transfer_date, notes, created_by, created_at, updated_at
            FROM cash_transfers
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    /// Newest transfer first
    pub async fn list(pool: &PgPool) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, CashTransfer>(
            r#"
            SELECT id, amount, recipient, transfer_date, notes, created_by, created_at, updated_at
            FROM cash_transfers
            ORDER BY transfer_date DESC, created_at DESC
            "#,
        )
        .fetch_all(pool)
        .await
    }

    pub async fn save(pool: &PgPool, transfer: &CashTransfer) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, CashTransfer>(
            r#"
            UPDATE cash_transfers
            SET amount = $2, recipient = $3, transfer_date = $4, notes = $5, updated_at = NOW()
            WHERE id = $1
            RETURNING id, amount, recipient, transfer_date, notes, created_by, created_at, updated_at
            "#,
        )
        .bind(transfer.id)
        .bind(transfer.amount)
        .bind(&transfer.recipient)
        .bind(transfer.transfer_date)
        .bind(&transfer.notes)
        .fetch_optional(pool)
        .await
    }

    pub async fn delete(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM cash_transfers WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Sum of every transfer
    pub async fn total(pool: &PgPool) -> Result<i64, sqlx::Error> {
        let (total,): (i64,) =
            sqlx::query_as("SELECT COALESCE(SUM(amount), 0)::BIGINT FROM cash_transfers")
                .fetch_one(pool)
                .await?;

        Ok(total)
    }
}
