/// Staff accounts and roles
///
/// Every person who logs in is a `User` with exactly one [`UserRole`].
/// Teachers may be bound to a single group through `group_id`.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE users (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     username VARCHAR(80) NOT NULL UNIQUE,
///     password_hash VARCHAR(255) NOT NULL,
///     role TEXT NOT NULL,
///     group_id UUID REFERENCES groups(id) ON DELETE SET NULL,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     last_login_at TIMESTAMPTZ
/// );
/// ```
///
/// # Example
///
/// ```no_run
/// use clubdesk_shared::models::user::{CreateUser, User, UserRole};
/// use sqlx::PgPool;
///
/// # async fn example(pool: PgPool) -> Result<(), sqlx::Error> {
/// let user = User::create(
///     &pool,
///     CreateUser {
///         username: "cashier".to_string(),
///         password_hash: "$argon2id$...".to_string(),
///         role: UserRole::PaymentAdmin,
///         group_id: None,
///     },
/// )
/// .await?;
///
/// assert_eq!(user.role.home_path(), "/mobile-payments");
/// # Ok(())
/// # }
/// ```

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

/// Staff role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    /// Full access
    Admin,
    /// Finances, expenses and settings
    Financier,
    /// The payment desk
    PaymentAdmin,
    /// Roll call and rewards for one group
    Teacher,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Admin => "admin",
            UserRole::Financier => "financier",
            UserRole::PaymentAdmin => "payment_admin",
            UserRole::Teacher => "teacher",
        }
    }

    /// Client page a freshly logged-in user should land on
    pub fn home_path(&self) -> &'static str {
        match self {
            UserRole::PaymentAdmin => "/mobile-payments",
            UserRole::Teacher => "/teacher-attendance",
            UserRole::Admin | UserRole::Financier => "/dashboard",
        }
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unknown role name
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown role: {0}")]
pub struct ParseRoleError(pub String);

impl FromStr for UserRole {
    type Err = ParseRoleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(UserRole::Admin),
            "financier" => Ok(UserRole::Financier),
            "payment_admin" => Ok(UserRole::PaymentAdmin),
            "teacher" => Ok(UserRole::Teacher),
            other => Err(ParseRoleError(other.to_string())),
        }
    }
}

impl TryFrom<String> for UserRole {
    type Error = ParseRoleError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Staff account
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct User {
    pub id: Uuid,

    /// Unique login name
    pub username: String,

    /// Argon2id hash in PHC format
    #[serde(skip_serializing)]
    pub password_hash: String,

    #[sqlx(try_from = "String")]
    pub role: UserRole,

    /// Group a teacher is responsible for
    pub group_id: Option<Uuid>,

    pub created_at: DateTime<Utc>,

    pub last_login_at: Option<DateTime<Utc>>,
}

/// Input for creating a staff account
#[derive(Debug, Clone)]
pub struct CreateUser {
    pub username: String,

    /// Argon2id hash, never the plaintext password
    pub password_hash: String,

    pub role: UserRole,

    pub group_id: Option<Uuid>,
}

impl User {
    /// Creates a new staff account
    ///
    /// # Errors
    ///
    /// Fails with a unique violation on `users_username_key` when the
    /// username is taken.
    pub async fn create(pool: &PgPool, data: CreateUser) -> Result<Self, sqlx::Error> {
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (username, password_hash, role, group_id)
            VALUES ($1, $2, $3, $4)
            RETURNING id, username, password_hash, role, group_id, created_at, last_login_at
            "#,
        )
        .bind(data.username)
        .bind(data.password_hash)
        .bind(data.role.as_str())
        .bind(data.group_id)
        .fetch_one(pool)
        .await?;

        tracing::info!(user_id = %user.id, role = %user.role, "Staff account created");

        Ok(user)
    }

    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, User>(
            r#"
            SELECT id, username, password_hash, role, group_id, created_at, last_login_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    /// Finds a user by login name (exact match)
    pub async fn find_by_username(pool: &PgPool, username: &str) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, User>(
            r#"
            SELECT id, username, password_hash, role, group_id, created_at, last_login_at
            FROM users
            WHERE username = $1
            "#,
        )
        .bind(username)
        .fetch_optional(pool)
        .await
    }

    /// Lists all staff accounts, oldest first
    pub async fn list(pool: &PgPool) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, User>(
            r#"
            SELECT id, username, password_hash, role, group_id, created_at, last_login_at
            FROM users
            ORDER BY created_at ASC
            "#,
        )
        .fetch_all(pool)
        .await
    }

    /// Whether any admin account exists
    pub async fn admin_exists(pool: &PgPool) -> Result<bool, sqlx::Error> {
        let exists: (bool,) =
            sqlx::query_as("SELECT EXISTS(SELECT 1 FROM users WHERE role = 'admin')")
                .fetch_one(pool)
                .await?;

        Ok(exists.0)
    }

    /// Whether `username` belongs to someone other than `except`
    pub async fn username_taken(
        pool: &PgPool,
        username: &str,
        except: Uuid,
    ) -> Result<bool, sqlx::Error> {
        let taken: (bool,) =
            sqlx::query_as("SELECT EXISTS(SELECT 1 FROM users WHERE username = $1 AND id <> $2)")
                .bind(username)
                .bind(except)
                .fetch_one(pool)
                .await?;

        Ok(taken.0)
    }

    /// Replaces username and/or password hash
    ///
    /// `None` keeps the current value. Returns `None` if the user is gone.
    pub async fn update_credentials(
        pool: &PgPool,
        id: Uuid,
        username: Option<&str>,
        password_hash: Option<&str>,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, User>(
            r#"
            UPDATE users
            SET username = COALESCE($2, username),
                password_hash = COALESCE($3, password_hash)
            WHERE id = $1
            RETURNING id, username, password_hash, role, group_id, created_at, last_login_at
            "#,
        )
        .bind(id)
        .bind(username)
        .bind(password_hash)
        .fetch_optional(pool)
        .await
    }

    /// Stamps `last_login_at` with the current time
    pub async fn touch_last_login(pool: &PgPool, id: Uuid) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE users SET last_login_at = NOW() WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;

        Ok(())
    }

    /// Deletes a staff account
    ///
    /// Returns `true` if a row was deleted.
    pub async fn delete(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_string_roundtrip() {
        for role in [
            UserRole::Admin,
            UserRole::Financier,
            UserRole::PaymentAdmin,
            UserRole::Teacher,
        ] {
            assert_eq!(role.as_str().parse::<UserRole>().unwrap(), role);
            assert_eq!(role.to_string(), role.as_str());
        }
    }

    #[test]
    fn test_unknown_role() {
        assert_eq!(
            UserRole::try_from("owner".to_string()),
            Err(ParseRoleError("owner".to_string()))
        );
    }

    #[test]
    fn test_role_serde_is_snake_case() {
        assert_eq!(
            serde_json::to_string(&UserRole::PaymentAdmin).unwrap(),
            "\"payment_admin\""
        );
        let role: UserRole = serde_json::from_str("\"teacher\"").unwrap();
        assert_eq!(role, UserRole::Teacher);
    }

    #[test]
    fn test_home_path() {
        assert_eq!(UserRole::PaymentAdmin.home_path(), "/mobile-payments");
        assert_eq!(UserRole::Teacher.home_path(), "/teacher-attendance");
        assert_eq!(UserRole::Admin.home_path(), "/dashboard");
        assert_eq!(UserRole::Financier.home_path(), "/dashboard");
    }

    #[test]
    fn test_password_hash_not_serialized() {
        let user = User {
            id: Uuid::new_v4(),
            username: "admin".to_string(),
            password_hash: "$argon2id$secret".to_string(),
            role: UserRole::Admin,
            group_id: None,
            created_at: Utc::now(),
            last_login_at: None,
        };

        let json = serde_json::to_value(&user).unwrap();
        assert!(json.get("password_hash").is_none());
        assert_eq!(json["role"], "admin");
    }
}
