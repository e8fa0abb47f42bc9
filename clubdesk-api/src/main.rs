//! # ClubDesk API Server
//!
//! Back-office API of a youth football school: students and groups, tariffs
//! and payments, attendance with face recognition, expenses, rewards and
//! ratings.
//!
//! ## Startup
//!
//! 1. Load configuration from the environment
//! 2. Connect to PostgreSQL and apply pending migrations
//! 3. Create the first admin account when none exists
//! 4. Load face encodings into the recognition index
//! 5. Serve until Ctrl+C
//!
//! ## Usage
//!
//! ```bash
//! DATABASE_URL=postgresql://localhost/clubdesk JWT_SECRET=... cargo run -p clubdesk-api
//! ```
//!
//! Set `LOG_FORMAT=json` for JSON log lines.

use clubdesk_api::{app, config::Config};
use clubdesk_shared::{
    auth::password::hash_password,
    db::{migrations, pool},
    models::user::{CreateUser, User, UserRole},
};
use sqlx::PgPool;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "clubdesk_api=debug,clubdesk_shared=info,tower_http=debug".into());

    let json = std::env::var("LOG_FORMAT").is_ok_and(|f| f.eq_ignore_ascii_case("json"));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_current_span(true))
            .init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

/// Creates the configured admin account if the club has no admin yet
async fn bootstrap_admin(db: &PgPool, config: &Config) -> anyhow::Result<()> {
    if User::admin_exists(db).await? {
        return Ok(());
    }

    let username = config.club.bootstrap_admin_username.trim();
    let password_hash = hash_password(&config.club.bootstrap_admin_password)?;

    User::create(
        db,
        CreateUser {
            username: username.to_string(),
            password_hash,
            role: UserRole::Admin,
            group_id: None,
        },
    )
    .await?;

    tracing::warn!(
        username = %username,
        "No admin found, created the bootstrap admin account; change its password"
    );

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
    tracing::info!("Shutdown signal received");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    tracing::info!("ClubDesk API Server v{} starting...", env!("CARGO_PKG_VERSION"));

    let config = Config::from_env()?;

    let mut db_config = pool::DatabaseConfig::from_url(config.database.url.clone());
    db_config.max_connections = config.database.max_connections;
    let db = pool::create_pool(db_config).await?;

    migrations::run_migrations(&db).await?;
    let status = migrations::get_migration_status(&db).await?;
    tracing::info!(
        applied = status.applied_migrations,
        latest = ?status.latest_version,
        "Database schema ready"
    );

    bootstrap_admin(&db, &config).await?;

    let bind_address = config.bind_address();
    let state = app::AppState::new(db.clone(), config);
    state.refresh_face_index().await;

    let router = app::build_router(state);

    let listener = tokio::net::TcpListener::bind(&bind_address).await?;
    tracing::info!(address = %bind_address, "Server listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    pool::close_pool(db).await;

    Ok(())
}
