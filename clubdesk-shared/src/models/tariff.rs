/// Tariffs: priced lesson packs
///
/// Deleting a tariff only deactivates it so payments keep their history.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;

use super::deserialize_some;
use crate::billing::TariffTerms;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Tariff {
    pub id: Uuid,

    /// Unique display name
    pub name: String,

    pub lessons_count: i32,

    /// Whole currency units
    pub price: i64,

    pub description: Option<String>,

    pub is_active: bool,

    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CreateTariff {
    pub name: String,
    pub lessons_count: i32,
    pub price: i64,
    pub description: Option<String>,
}

/// Partial tariff update
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateTariff {
    pub name: Option<String>,
    pub lessons_count: Option<i32>,
    pub price: Option<i64>,

    #[serde(default, deserialize_with = "deserialize_some")]
    pub description: Option<Option<String>>,

    pub is_active: Option<bool>,
}

impl Tariff {
    pub fn terms(&self) -> TariffTerms {
        TariffTerms {
            lessons_count: self.lessons_count,
            price: self.price,
        }
    }

    pub fn apply(&self, patch: UpdateTariff) -> Tariff {
        let mut tariff = self.clone();

        if let Some(name) = patch.name {
            tariff.name = name.trim().to_string();
        }
        if let Some(lessons) = patch.lessons_count {
            tariff.lessons_count = lessons;
        }
        if let Some(price) = patch.price {
            tariff.price = price;
        }
        if let Some(description) = patch.description {
            tariff.description = description;
        }
        if let Some(active) = patch.is_active {
            tariff.is_active = active;
        }

        tariff
    }

    /// Creates a tariff
    ///
    /// # Errors
    ///
    /// Unique violation on `tariffs_name_key` for a duplicate name.
    pub async fn create(pool: &PgPool, data: CreateTariff) -> Result<Self, sqlx::Error> {
        let tariff = sqlx::query_as::<_, Tariff>(
            r#"
            INSERT INTO tariffs (name, lessons_count, price, description)
            VALUES ($1, $2, $3, $4)
            RETURNING id, name, lessons_count, price, description, is_active, created_at
            "#,
        )
        .bind(data.name)
        .bind(data.lessons_count)
        .bind(data.price)
        .bind(data.description)
        .fetch_one(pool)
        .await?;

        tracing::info!(tariff_id = %tariff.id, price = tariff.price, "Tariff created");

        Ok(tariff)
    }

    pub async fn find_by_id<'e, E: PgExecutor<'e>>(
        executor: E,
        id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Tariff>(
            r#"
            SELECT id, name, lessons_count, price, description, is_active, created_at
            FROM tariffs
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(executor)
        .await
    }

    /// Active tariffs, smallest pack first
    pub async fn list_active(pool: &PgPool) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Tariff>(
            r#"
            SELECT id, name, lessons_count, price, description, is_active, created_at
            FROM tariffs
            WHERE is_active
            ORDER BY lessons_count, name
            "#,
        )
        .fetch_all(pool)
        .await
    }

    pub async fn save(pool: &PgPool, tariff: &Tariff) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Tariff>(
            r#"
            UPDATE tariffs
            SET name = $2, lessons_count = $3, price = $4, description = $5, is_active = $6
            WHERE id = $1
            RETURNING id, name, lessons_count, price, description, is_active, created_at
            "#,
        )
        .bind(tariff.id)
        .bind(&tariff.name)
        .bind(tariff.lessons_count)
        .bind(tariff.price)
        .bind(&tariff.description)
        .bind(tariff.is_active)
        .fetch_optional(pool)
        .await
    }

    /// Soft delete
    ///
    /// Returns `true` if the tariff exists.
    pub async fn deactivate(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("UPDATE tariffs SET is_active = FALSE WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tariff() -> Tariff {
        Tariff {
            id: Uuid::new_v4(),
            name: "Monthly 12".to_string(),
            lessons_count: 12,
            price: 600_000,
            description: Some("three times a week".to_string()),
            is_active: true,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_terms() {
        let terms = tariff().terms();
        assert_eq!(terms.lessons_count, 12);
        assert_eq!(terms.price, 600_000);
    }

    #[test]
    fn test_apply_partial() {
        let patch: UpdateTariff =
            serde_json::from_str(r#"{"price": 650000, "description": null}"#).unwrap();
        let updated = tariff().apply(patch);

        assert_eq!(updated.price, 650_000);
        assert_eq!(updated.lessons_count, 12);
        assert_eq!(updated.description, None);
        assert!(updated.is_active);
    }
}
