/// Staff accounts and admin credentials
///
/// All endpoints are admin-only.
///
/// # Endpoints
///
/// - `GET /api/users` - List staff accounts
/// - `POST /api/users` - Create a staff account
/// - `DELETE /api/users/:id` - Delete a staff account (not yourself)
/// - `GET /api/admin-credentials` - Current admin login
/// - `PUT /api/admin-credentials` - Change admin login and/or password

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    routes::MessageResponse,
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use clubdesk_shared::{
    auth::{authorization::require_admin, middleware::AuthContext, password},
    models::{
        group::Group,
        user::{CreateUser, User, UserRole},
    },
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Minimum length of a login name
pub const MIN_USERNAME_LEN: usize = 3;

/// Create staff account request
#[derive(Debug, Deserialize, Validate)]
pub struct CreateUserRequest {
    #[validate(length(min = 3, max = 50, message = "Username must be 3-50 characters"))]
    pub username: String,

    pub password: String,

    pub role: UserRole,

    /// Group a teacher is responsible for
    #[serde(default)]
    pub group_id: Option<Uuid>,
}

/// Admin credentials change request
///
/// At least one of `username` and `password` must be given.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateCredentialsRequest {
    #[serde(default)]
    pub username: Option<String>,

    #[serde(default)]
    pub password: Option<String>,

    #[serde(default)]
    pub confirm_password: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AdminCredentialsResponse {
    pub username: String,
}

/// Checked values of a credentials change
#[derive(Debug, PartialEq, Eq)]
struct CredentialsChange {
    username: Option<String>,
    password: Option<String>,
}

impl UpdateCredentialsRequest {
    /// Applies the credential rules that need no database
    fn check(self) -> Result<CredentialsChange, ApiError> {
        let username = self
            .username
            .map(|u| u.trim().to_string())
            .filter(|u| !u.is_empty());
        let password = self.password.filter(|p| !p.is_empty());

        if let Some(name) = &username {
            if name.chars().count() < MIN_USERNAME_LEN {
                return Err(ApiError::invalid(
                    "username",
                    "Username must be at least 3 characters long",
                ));
            }
        }

        if let Some(new_password) = &password {
            password::validate_password_strength(new_password)
                .map_err(|msg| ApiError::invalid("password", msg))?;

            if self.confirm_password.as_deref() != Some(new_password.as_str()) {
                return Err(ApiError::invalid("confirm_password", "Passwords do not match"));
            }
        }

        if username.is_none() && password.is_none() {
            return Err(ApiError::BadRequest("Nothing to update".to_string()));
        }

        Ok(CredentialsChange { username, password })
    }
}

/// List staff accounts
pub async fn list_users(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<Vec<User>>> {
    require_admin(&auth)?;

    Ok(Json(User::list(&state.db).await?))
}

/// Create a staff account
///
/// # Errors
///
/// - `400 Bad Request`: Unknown group
/// - `403 Forbidden`: Caller is not an admin
/// - `409 Conflict`: Username already exists
/// - `422 Unprocessable Entity`: Validation failed
pub async fn create_user(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<CreateUserRequest>,
) -> ApiResult<(StatusCode, Json<User>)> {
    require_admin(&auth)?;
    req.validate()?;
    password::validate_password_strength(&req.password)
        .map_err(|msg| ApiError::invalid("password", msg))?;

    if let Some(group_id) = req.group_id {
        if Group::find_by_id(&state.db, group_id).await?.is_none() {
            return Err(ApiError::BadRequest("Group not found".to_string()));
        }
    }

    let password_hash = password::hash_password(&req.password)?;

    let user = User::create(
        &state.db,
        CreateUser {
            username: req.username.trim().to_string(),
            password_hash,
            role: req.role,
            group_id: req.group_id,
        },
    )
    .await?;

    Ok((StatusCode::CREATED, Json(user)))
}

/// Delete a staff account
///
/// Admins cannot delete their own account.
pub async fn delete_user(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<MessageResponse>> {
    require_admin(&auth)?;

    if id == auth.user_id {
        return Err(ApiError::BadRequest(
            "You cannot delete your own account".to_string(),
        ));
    }

    if !User::delete(&state.db, id).await? {
        return Err(ApiError::NotFound("User not found".to_string()));
    }

    tracing::info!(user_id = %id, deleted_by = %auth.user_id, "Staff account deleted");

    Ok(Json(MessageResponse::ok("User deleted")))
}

/// Current admin login name
pub async fn get_admin_credentials(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<AdminCredentialsResponse>> {
    require_admin(&auth)?;

    let user = User::find_by_id(&state.db, auth.user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Administrator not found".to_string()))?;

    Ok(Json(AdminCredentialsResponse {
        username: user.username,
    }))
}

/// Change the calling admin's username and/or password
///
/// # Endpoint
///
/// ```text
/// PUT /api/admin-credentials
///
/// {
///   "username": "director",
///   "password": "new-secret",
///   "confirm_password": "new-secret"
/// }
/// ```
///
/// # Errors
///
/// - `400 Bad Request`: Nothing to change, or the username is taken
/// - `422 Unprocessable Entity`: Username too short, weak password, or
///   confirmation mismatch
pub async fn update_admin_credentials(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<UpdateCredentialsRequest>,
) -> ApiResult<Json<MessageResponse>> {
    require_admin(&auth)?;
    let change = req.check()?;

    if let Some(username) = &change.username {
        if User::username_taken(&state.db, username, auth.user_id).await? {
            return Err(ApiError::BadRequest("This username is already taken".to_string()));
        }
    }

    let password_hash = change
        .password
        .as_deref()
        .map(password::hash_password)
        .transpose()?;

    User::update_credentials(
        &state.db,
        auth.user_id,
        change.username.as_deref(),
        password_hash.as_deref(),
    )
    .await?
    .ok_or_else(|| ApiError::NotFound("Administrator not found".to_string()))?;

    tracing::info!(user_id = %auth.user_id, "Admin credentials updated");

    Ok(Json(MessageResponse::ok("Credentials updated")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(username: Option<&str>, password: Option<&str>, confirm: Option<&str>) -> UpdateCredentialsRequest {
        UpdateCredentialsRequest {
            username: username.map(str::to_string),
            password: password.map(str::to_string),
            confirm_password: confirm.map(str::to_string),
        }
    }

    #[test]
    fn test_credentials_require_something() {
        assert!(matches!(
            request(Some("  "), None, None).check(),
            Err(ApiError::BadRequest(_))
        ));
    }

    #[test]
    fn test_credentials_username_rules() {
        assert!(request(Some("ab"), None, None).check().is_err());

        let change = request(Some(" director "), None, None).check().unwrap();
        assert_eq!(change.username.as_deref(), Some("director"));
        assert_eq!(change.password, None);
    }

    #[test]
    fn test_credentials_password_rules() {
        assert!(request(None, Some("12345"), Some("12345")).check().is_err());
        assert!(request(None, Some("secret1"), Some("secret2")).check().is_err());
        assert!(request(None, Some("secret1"), None).check().is_err());

        let change = request(None, Some("secret1"), Some("secret1")).check().unwrap();
        assert_eq!(change.password.as_deref(), Some("secret1"));
    }
}
