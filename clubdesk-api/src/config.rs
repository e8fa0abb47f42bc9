/// Configuration management for the API server
///
/// This module loads configuration from environment variables (and a `.env`
/// file during development) into a type-safe configuration struct.
///
/// # Environment Variables
///
/// - `DATABASE_URL`: PostgreSQL connection string (required)
/// - `DATABASE_MAX_CONNECTIONS`: Pool size (default: 10)
/// - `API_HOST`: Host to bind to (default: 0.0.0.0)
/// - `API_PORT`: Port to bind to (default: 8080)
/// - `API_CORS_ORIGINS`: Comma-separated origins, `*` for any (default: *)
/// - `API_PRODUCTION`: Enables HSTS (default: false)
/// - `JWT_SECRET`: Secret key for JWT signing (required, at least 32 chars)
/// - `CLUB_UTC_OFFSET_MINUTES`: Club time zone offset (default: 300)
/// - `CLUB_SYSTEM_NAME`: Fallback display name (default: FK QORASUV)
/// - `FACE_MATCH_TOLERANCE`: Maximum face distance for a match (default: 0.6)
/// - `BOOTSTRAP_ADMIN_USERNAME` / `BOOTSTRAP_ADMIN_PASSWORD`: First admin
///   account, created only when no admin exists (default: admin / admin123)
/// - `RUST_LOG`, `LOG_FORMAT`: Logging, read by `main`
///
/// # Example
///
/// ```no_run
/// use clubdesk_api::config::Config;
///
/// # fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// println!("Server will listen on {}", config.bind_address());
/// # Ok(())
/// # }
/// ```

use clubdesk_shared::clock::{ClubClock, DEFAULT_UTC_OFFSET_MINUTES};
use clubdesk_shared::face::DEFAULT_TOLERANCE;
use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;

/// Complete application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub api: ApiConfig,
    pub database: DatabaseConfig,
    pub jwt: JwtConfig,
    pub club: ClubConfig,
}

/// API server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,

    /// Allowed CORS origins; `["*"]` allows any
    pub cors_origins: Vec<String>,

    /// Production mode turns on HSTS
    pub production: bool,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    pub url: String,

    /// Maximum number of connections in pool
    pub max_connections: u32,
}

/// JWT configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtConfig {
    /// Secret key for JWT signing
    ///
    /// Must be at least 32 bytes. Generate with: `openssl rand -hex 32`
    pub secret: String,
}

/// Club-specific settings that are not stored in the database
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClubConfig {
    /// Offset of club-local time from UTC, in minutes
    pub utc_offset_minutes: i32,

    /// Name used when the stored system name is blank
    pub system_name: String,

    pub face_match_tolerance: f64,

    pub bootstrap_admin_username: String,
    pub bootstrap_admin_password: String,
}

fn var_or(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

fn parse_var<T>(name: &str, default: &str) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    var_or(name, default)
        .trim()
        .parse::<T>()
        .map_err(|e| anyhow::anyhow!("{} has an invalid value: {}", name, e))
}

impl Config {
    /// Loads configuration from environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - `DATABASE_URL` or `JWT_SECRET` is missing
    /// - `JWT_SECRET` is shorter than 32 characters
    /// - A numeric variable does not parse
    /// - The club offset or face tolerance is out of range
    pub fn from_env() -> anyhow::Result<Self> {
        // Load .env file if present (for development)
        dotenvy::dotenv().ok();

        let database_url = env::var("DATABASE_URL")
            .map_err(|_| anyhow::anyhow!("DATABASE_URL environment variable is required"))?;

        let jwt_secret = env::var("JWT_SECRET")
            .map_err(|_| anyhow::anyhow!("JWT_SECRET environment variable is required"))?;

        let cors_origins = var_or("API_CORS_ORIGINS", "*")
            .split(',')
            .map(|o| o.trim().to_string())
            .filter(|o| !o.is_empty())
            .collect();

        let config = Self {
            api: ApiConfig {
                host: var_or("API_HOST", "0.0.0.0"),
                port: parse_var("API_PORT", "8080")?,
                cors_origins,
                production: parse_var("API_PRODUCTION", "false")?,
            },
            database: DatabaseConfig {
                url: database_url,
                max_connections: parse_var("DATABASE_MAX_CONNECTIONS", "10")?,
            },
            jwt: JwtConfig { secret: jwt_secret },
            club: ClubConfig {
                utc_offset_minutes: parse_var(
                    "CLUB_UTC_OFFSET_MINUTES",
                    &DEFAULT_UTC_OFFSET_MINUTES.to_string(),
                )?,
                system_name: var_or("CLUB_SYSTEM_NAME", "FK QORASUV"),
                face_match_tolerance: parse_var(
                    "FACE_MATCH_TOLERANCE",
                    &DEFAULT_TOLERANCE.to_string(),
                )?,
                bootstrap_admin_username: var_or("BOOTSTRAP_ADMIN_USERNAME", "admin"),
                bootstrap_admin_password: var_or("BOOTSTRAP_ADMIN_PASSWORD", "admin123"),
            },
        };

        config.validate()?;
        Ok(config)
    }

    /// Checks the values that have hard limits
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.jwt.secret.len() < 32 {
            anyhow::bail!("JWT_SECRET must be at least 32 characters long");
        }

        if ClubClock::from_offset_minutes(self.club.utc_offset_minutes).is_none() {
            anyhow::bail!(
                "CLUB_UTC_OFFSET_MINUTES must be within one day, got {}",
                self.club.utc_offset_minutes
            );
        }

        if !(self.club.face_match_tolerance > 0.0 && self.club.face_match_tolerance.is_finite()) {
            anyhow::bail!("FACE_MATCH_TOLERANCE must be a positive number");
        }

        Ok(())
    }

    /// Returns the server bind address
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.api.host, self.api.port)
    }

    /// Clock for the configured club offset
    pub fn clock(&self) -> ClubClock {
        ClubClock::from_offset_minutes(self.club.utc_offset_minutes).unwrap_or_default()
    }
}
