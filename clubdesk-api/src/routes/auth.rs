/// Authentication endpoints
///
/// This module provides staff authentication endpoints:
/// - Login
/// - Token refresh
/// - Current user
///
/// # Endpoints
///
/// - `POST /api/auth/login` - Login and get tokens
/// - `POST /api/auth/refresh` - Exchange a refresh token for a new pair
/// - `GET /api/auth/me` - The authenticated staff member

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
};
use axum::{extract::State, Extension, Json};
use clubdesk_shared::{
    auth::{
        jwt::{self, TokenPair},
        middleware::AuthContext,
        password,
    },
    models::user::{User, UserRole},
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Login request
#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(length(min = 1, max = 50, message = "Username is required"))]
    pub username: String,

    #[validate(length(min = 1, max = 128, message = "Password is required"))]
    pub password: String,
}

/// Login response
#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub user_id: Uuid,
    pub username: String,
    pub role: UserRole,

    /// Client page to open after login
    pub redirect: &'static str,

    #[serde(flatten)]
    pub tokens: TokenPair,
}

/// Refresh token request
#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// Current user response
#[derive(Debug, Serialize)]
pub struct MeResponse {
    #[serde(flatten)]
    pub user: User,

    pub redirect: &'static str,
}

const BAD_CREDENTIALS: &str = "Invalid username or password";

/// Login endpoint
///
/// Authenticates a staff member and returns JWT tokens.
///
/// # Endpoint
///
/// ```text
/// POST /api/auth/login
/// Content-Type: application/json
///
/// {
///   "username": "admin",
///   "password": "admin123"
/// }
/// ```
///
/// # Response
///
/// ```json
/// {
///   "user_id": "uuid",
///   "username": "admin",
///   "role": "admin",
///   "redirect": "/dashboard",
///   "access_token": "eyJ...",
///   "refresh_token": "eyJ...",
///   "token_type": "Bearer",
///   "expires_in": 86400
/// }
/// ```
///
/// # Errors
///
/// - `401 Unauthorized`: Invalid credentials
/// - `422 Unprocessable Entity`: Validation failed
/// - `429 Too Many Requests`: Too many attempts for this username
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<Json<LoginResponse>> {
    req.validate()?;

    let username = req.username.trim();
    state.login_throttle.check(username)?;

    let user = User::find_by_username(&state.db, username)
        .await?
        .ok_or_else(|| ApiError::Unauthorized(BAD_CREDENTIALS.to_string()))?;

    if !password::verify_password(&req.password, &user.password_hash)? {
        tracing::info!(username = %username, "Rejected login");
        return Err(ApiError::Unauthorized(BAD_CREDENTIALS.to_string()));
    }

    state.login_throttle.reset(username);
    User::touch_last_login(&state.db, user.id).await?;

    let tokens = jwt::issue_token_pair(user.id, &user.username, user.role, state.jwt_secret())?;

    tracing::info!(user_id = %user.id, role = %user.role, "Staff member logged in");

    Ok(Json(LoginResponse {
        user_id: user.id,
        username: user.username,
        role: user.role,
        redirect: user.role.home_path(),
        tokens,
    }))
}

/// Token refresh endpoint
///
/// Issues a new token pair. The role is re-read from the database so a
/// changed or deleted account cannot keep refreshing stale claims.
///
/// # Errors
///
/// - `401 Unauthorized`: Invalid or expired refresh token, or unknown user
pub async fn refresh(
    State(state): State<AppState>,
    Json(req): Json<RefreshRequest>,
) -> ApiResult<Json<TokenPair>> {
    let claims = jwt::validate_refresh_token(&req.refresh_token, state.jwt_secret())?;

    let user = User::find_by_id(&state.db, claims.sub)
        .await?
        .ok_or_else(|| ApiError::Unauthorized("Account no longer exists".to_string()))?;

    let tokens = jwt::issue_token_pair(user.id, &user.username, user.role, state.jwt_secret())?;

    Ok(Json(tokens))
}

/// The authenticated staff member
pub async fn me(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<MeResponse>> {
    let user = User::find_by_id(&state.db, auth.user_id)
        .await?
        .ok_or_else(|| ApiError::Unauthorized("Account no longer exists".to_string()))?;

    Ok(Json(MeResponse {
        redirect: user.role.home_path(),
        user,
    }))
}
