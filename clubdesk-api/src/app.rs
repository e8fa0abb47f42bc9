/// Application state and router builder
///
/// This module defines the shared application state and provides
/// a function to build the Axum router with all routes and middleware.
///
/// # Example
///
/// ```no_run
/// use clubdesk_api::{app::AppState, config::Config};
/// use sqlx::PgPool;
///
/// # async fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// let pool = PgPool::connect(&config.database.url).await?;
/// let state = AppState::new(pool, config);
/// let app = clubdesk_api::app::build_router(state);
/// # Ok(())
/// # }
/// ```

use crate::{
    config::Config,
    error::ApiError,
    middleware::{rate_limit::LoginThrottle, security::SecurityHeadersLayer},
};
use axum::{
    extract::{Request, State},
    http::{header, HeaderValue, Method},
    middleware::Next,
    response::Response,
    routing::{delete, get, post, put},
    Router,
};
use clubdesk_shared::{auth::middleware::authenticate, clock::ClubClock, face::FaceIndex};
use sqlx::PgPool;
use std::sync::Arc;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

/// Shared application state
///
/// Cloned for each request handler via Axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: PgPool,

    /// Application configuration
    pub config: Arc<Config>,

    /// Club-local time
    pub clock: ClubClock,

    /// Encodings of active students for recognition
    pub face_index: Arc<FaceIndex>,

    /// Per-username login attempt limiter
    pub login_throttle: Arc<LoginThrottle>,
}

impl AppState {
    /// Creates new application state with an empty face index
    pub fn new(db: PgPool, config: Config) -> Self {
        Self {
            db,
            clock: config.clock(),
            config: Arc::new(config),
            face_index: Arc::new(FaceIndex::new()),
            login_throttle: Arc::new(LoginThrottle::default()),
        }
    }

    /// Gets JWT secret for token operations
    pub fn jwt_secret(&self) -> &str {
        &self.config.jwt.secret
    }

    /// Face match tolerance from configuration
    pub fn face_tolerance(&self) -> f64 {
        self.config.club.face_match_tolerance
    }

    /// Reloads the face index after a student change
    ///
    /// A failed reload keeps the previous index and is only logged; the
    /// write that triggered it has already been committed.
    pub async fn refresh_face_index(&self) {
        match self.face_index.reload(&self.db).await {
            Ok(count) => tracing::debug!(count, "Face index reloaded"),
            Err(e) => tracing::warn!(error = %e, "Face index reload failed"),
        }
    }
}

/// Builds the complete Axum router with all routes and middleware
///
/// # Architecture
///
/// ```text
/// /
/// ├── /health                        # Health check (public)
/// └── /api/
///     ├── /auth/login, /auth/refresh # Public
///     └── everything else            # Bearer access token required
///         ├── /auth/me, /users, /admin-credentials
///         ├── /dashboard
///         ├── /students, /payments, /attendance, /teacher
///         ├── /groups, /tariffs, /expenses, /finances
///         ├── /club-settings, /rewards, /rating
///         ├── /recognize
///         └── /cash-transfers
/// ```
///
/// # Middleware Stack
///
/// Applied in order (bottom to top):
/// 1. Security headers
/// 2. CORS (tower-http CorsLayer)
/// 3. Logging (tower-http TraceLayer)
/// 4. Authentication (protected routes only, via `route_layer`)
pub fn build_router(state: AppState) -> Router {
    use crate::routes;

    // Health check (public, no auth)
    let health_routes = Router::new().route("/health", get(routes::health::health_check));

    // Auth routes (public, no auth required)
    let public_api = Router::new()
        .route("/auth/login", post(routes::auth::login))
        .route("/auth/refresh", post(routes::auth::refresh));

    let protected_api = Router::new()
        .route("/auth/me", get(routes::auth::me))
        .route(
            "/admin-credentials",
            get(routes::users::get_admin_credentials).put(routes::users::update_admin_credentials),
        )
        .route(
            "/users",
            get(routes::users::list_users).post(routes::users::create_user),
        )
        .route("/users/:id", delete(routes::users::delete_user))
        .route("/dashboard", get(routes::dashboard::dashboard))
        // Students
        .route(
            "/students",
            get(routes::students::list_students).post(routes::students::create_student),
        )
        .route("/students/overview", get(routes::students::students_overview))
        .route(
            "/students/:id",
            get(routes::students::get_student)
                .put(routes::students::update_student)
                .delete(routes::students::delete_student),
        )
        .route("/students/:id/face", put(routes::students::set_face))
        .route(
            "/students/:id/monthly-payments",
            get(routes::students::monthly_payments),
        )
        .route(
            "/students/:id/rewards",
            get(routes::rewards::student_rewards).post(routes::rewards::issue_reward),
        )
        .route("/students/:id/points", get(routes::rewards::student_points))
        // Payments
        .route("/payments", post(routes::payments::create_payment))
        .route("/payments/monthly", post(routes::payments::create_monthly_payment))
        .route("/payments/history", get(routes::payments::payment_history))
        .route(
            "/payments/:id",
            put(routes::payments::update_payment).delete(routes::payments::delete_payment),
        )
        // Attendance
        .route("/attendance", get(routes::attendance::list_attendance))
        .route("/attendance/checkin", post(routes::attendance::check_in))
        .route("/attendance/today", get(routes::attendance::today))
        .route("/attendance/years", get(routes::attendance::years))
        .route("/attendance/analytics", get(routes::attendance::analytics))
        .route("/attendance/:id", delete(routes::attendance::delete_attendance))
        .route("/teacher/attendance", post(routes::teacher::mark_attendance))
        .route("/teacher/attendance/today", get(routes::teacher::today_status))
        // Groups and tariffs
        .route(
            "/groups",
            get(routes::groups::list_groups).post(routes::groups::create_group),
        )
        .route(
            "/groups/:id",
            put(routes::groups::update_group).delete(routes::groups::delete_group),
        )
        .route(
            "/tariffs",
            get(routes::tariffs::list_tariffs).post(routes::tariffs::create_tariff),
        )
        .route(
            "/tariffs/:id",
            put(routes::tariffs::update_tariff).delete(routes::tariffs::delete_tariff),
        )
        // Money
        .route(
            "/expenses",
            get(routes::expenses::list_expenses).post(routes::expenses::create_expense),
        )
        .route(
            "/expenses/:id",
            put(routes::expenses::update_expense).delete(routes::expenses::delete_expense),
        )
        .route("/finances/income", get(routes::finances::income))
        .route("/finances/expenses", get(routes::finances::expenses))
        .route("/finances/debtors", get(routes::finances::debtors))
        .route("/finances/analytics", get(routes::finances::analytics))
        .route("/finances/monthly", get(routes::finances::monthly))
        .route(
            "/cash-transfers",
            get(routes::cash_transfers::list_transfers).post(routes::cash_transfers::create_transfer),
        )
        .route("/cash-transfers/summary", get(routes::cash_transfers::summary))
        .route(
            "/cash-transfers/:id",
            put(routes::cash_transfers::update_transfer)
                .delete(routes::cash_transfers::delete_transfer),
        )
        // Settings, rewards, ratings
        .route(
            "/club-settings",
            get(routes::settings::get_settings).put(routes::settings::update_settings),
        )
        .route(
            "/rewards",
            get(routes::rewards::list_reward_types).post(routes::rewards::create_reward_type),
        )
        .route(
            "/rewards/:id",
            put(routes::rewards::update_reward_type).delete(routes::rewards::delete_reward_type),
        )
        .route("/rating/groups/:group_id", get(routes::rating::group_rating))
        .route("/rating/all-groups", get(routes::rating::all_groups))
        .route("/rating/winners-history", get(routes::rating::winners_history))
        // Recognition
        .route("/recognize", post(routes::recognition::recognize))
        .route("/recognize/multiple", post(routes::recognition::recognize_multiple))
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            jwt_auth_layer,
        ));

    let api_routes = public_api.merge(protected_api);

    // Configure CORS based on environment
    let cors = if state.config.api.cors_origins.contains(&"*".to_string()) {
        // Development mode: permissive CORS
        CorsLayer::permissive()
    } else {
        let origins: Vec<HeaderValue> = state
            .config
            .api
            .cors_origins
            .iter()
            .filter_map(|origin| origin.parse().ok())
            .collect();

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([
                Method::GET,
                Method::POST,
                Method::PUT,
                Method::DELETE,
                Method::OPTIONS,
            ])
            .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
            .allow_credentials(true)
            .max_age(std::time::Duration::from_secs(3600))
    };

    Router::new()
        .merge(health_routes)
        .nest("/api", api_routes)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors)
        .layer(SecurityHeadersLayer::new(state.config.api.production))
        .with_state(state)
}

/// JWT authentication middleware layer
///
/// Validates the bearer access token and injects the resulting
/// `AuthContext` into request extensions.
async fn jwt_auth_layer(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let auth_context = authenticate(req.headers(), state.jwt_secret())?;

    req.extensions_mut().insert(auth_context);

    Ok(next.run(req).await)
}
