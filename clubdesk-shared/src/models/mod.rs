/// Database models for ClubDesk
///
/// One module per table. Each model is a `sqlx::FromRow` struct with
/// associated async functions that run runtime-checked queries.
///
/// # Models
///
/// - `user`: Staff accounts and roles
/// - `group`: Training groups and their weekly schedule
/// - `tariff`: Lesson packs and monthly prices
/// - `student`: Student cards, balances and face encodings
/// - `payment`: Lesson-pack and month-covering payments
/// - `attendance`: Daily check-ins
/// - `expense`: Club expenses
/// - `club_settings`: The single settings row
/// - `reward`: Reward types, issued rewards and ratings
/// - `cash_transfer`: Cash handed over from the payment desk
///
/// # Example
///
/// ```no_run
/// use clubdesk_shared::models::user::User;
/// use clubdesk_shared::db::pool::{create_pool, DatabaseConfig};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let pool = create_pool(DatabaseConfig::default()).await?;
///
/// let admin = User::find_by_username(&pool, "admin").await?;
/// # Ok(())
/// # }
/// ```

use serde::{Deserialize, Deserializer};

pub mod attendance;
pub mod cash_transfer;
pub mod club_settings;
pub mod expense;
pub mod group;
pub mod payment;
pub mod reward;
pub mod student;
pub mod tariff;
pub mod user;

/// Deserializes a present field into `Some`, keeping `null` distinct from absent
///
/// Use with `#[serde(default, deserialize_with = "deserialize_some")]` on an
/// `Option<Option<T>>` field: absent → `None`, `null` → `Some(None)`.
pub fn deserialize_some<'de, T, D>(deserializer: D) -> Result<Option<T>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Deserialize::deserialize(deserializer).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Deserialize)]
    struct Patch {
        #[serde(default, deserialize_with = "deserialize_some")]
        notes: Option<Option<String>>,
    }

    #[test]
    fn test_deserialize_some_distinguishes_null() {
        let absent: Patch = serde_json::from_str("{}").unwrap();
        let cleared: Patch = serde_json::from_str(r#"{"notes": null}"#).unwrap();
        let set: Patch = serde_json::from_str(r#"{"notes": "hi"}"#).unwrap();

        assert_eq!(absent.notes, None);
        assert_eq!(cleared.notes, Some(None));
        assert_eq!(set.notes, Some(Some("hi".to_string())));
    }
}
