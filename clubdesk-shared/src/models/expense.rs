/// Club expenses

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use super::deserialize_some;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Expense {
    pub id: Uuid,
    pub category: String,
    pub amount: i64,
    pub description: Option<String>,
    pub expense_date: DateTime<Utc>,
    pub created_by: Option<Uuid>,
}

#[derive(Debug, Clone)]
pub struct CreateExpense {
    pub category: String,
    pub amount: i64,
    pub description: Option<String>,

    /// `None` means now
    pub expense_date: Option<DateTime<Utc>>,

    pub created_by: Option<Uuid>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateExpense {
    pub category: Option<String>,
    pub amount: Option<i64>,

    #[serde(default, deserialize_with = "deserialize_some")]
    pub description: Option<Option<String>>,

    pub expense_date: Option<DateTime<Utc>>,
}

impl Expense {
    pub fn apply(&self, patch: UpdateExpense) -> Expense {
        let mut expense = self.clone();

        if let Some(category) = patch.category {
            expense.category = category.trim().to_string();
        }
        if let Some(amount) = patch.amount {
            expense.amount = amount;
        }
        if let Some(description) = patch.description {
            expense.description = description;
        }
        if let Some(date) = patch.expense_date {
            expense.expense_date = date;
        }

        expense
    }

    pub async fn create(pool: &PgPool, data: CreateExpense) -> Result<Self, sqlx::Error> {
        let expense = sqlx::query_as::<_, Expense>(
            r#"
            INSERT INTO expenses (category, amount, description, expense_date, created_by)
            VALUES ($1, $2, $3, COALESCE($4, NOW()), $5)
            RETURNING id, category, amount, description, expense_date, created_by
            "#,
        )
        .bind(data.category)
        .bind(data.amount)
        .bind(data.description)
        .bind(data.expense_date)
        .bind(data.created_by)
        .fetch_one(pool)
        .await?;

        tracing::info!(
            expense_id = %expense.id,
            category = %expense.category,
            amount = expense.amount,
            "Expense recorded"
        );

        Ok(expense)
    }

    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Expense>(
            r#"
            SELECT id, category, amount, description, expense_date, created_by
            FROM expenses
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    pub async fn save(pool: &PgPool, expense: &Expense) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Expense>(
            r#"
            UPDATE expenses
            SET category = $2, amount = $3, description = $4, expense_date = $5
            WHERE id = $1
            RETURNING id, category, amount, description, expense_date, created_by
            "#,
        )
        .bind(expense.id)
        .bind(&expense.category)
        .bind(expense.amount)
        .bind(&expense.description)
        .bind(expense.expense_date)
        .fetch_optional(pool)
        .await
    }

    pub async fn delete(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM expenses WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Latest expenses, newest first
    pub async fn recent(pool: &PgPool, limit: i64) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Expense>(
            r#"
            SELECT id, category, amount, description, expense_date, created_by
            FROM expenses
            ORDER BY expense_date DESC
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(pool)
        .await
    }

    /// Spending in `[start, end)`
    pub async fn sum_between(
        pool: &PgPool,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<i64, sqlx::Error> {
        let (total,): (i64,) = sqlx::query_as(
            r#"
            SELECT COALESCE(SUM(amount), 0)::BIGINT
            FROM expenses
            WHERE expense_date >= $1 AND expense_date < $2
            "#,
        )
        .bind(start)
        .bind(end)
        .fetch_one(pool)
        .await?;

        Ok(total)
    }

    pub async fn total(pool: &PgPool) -> Result<i64, sqlx::Error> {
        let (total,): (i64,) =
            sqlx::query_as("SELECT COALESCE(SUM(amount), 0)::BIGINT FROM expenses")
                .fetch_one(pool)
                .await?;

        Ok(total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply() {
        let expense = Expense {
            id: Uuid::new_v4(),
            category: "Equipment".to_string(),
            amount: 250_000,
            description: Some("balls".to_string()),
            expense_date: Utc::now(),
            created_by: None,
        };

        let patch: UpdateExpense =
            serde_json::from_str(r#"{"category": " Rent ", "description": null}"#).unwrap();
        let updated = expense.apply(patch);

        assert_eq!(updated.category, "Rent");
        assert_eq!(updated.amount, 250_000);
        assert_eq!(updated.description, None);
    }
}
