/// Connection pool and schema migrations
///
/// The schema lives in the workspace `migrations/` directory. Table access
/// is in `crate::models`, one module per table.
///
/// # Example
///
/// ```no_run
/// use clubdesk_shared::db::{migrations::run_migrations, pool::{create_pool, DatabaseConfig}};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let pool = create_pool(DatabaseConfig::from_url(std::env::var("DATABASE_URL")?)).await?;
/// run_migrations(&pool).await?;
/// # Ok(())
/// # }
/// ```

pub mod migrations;
pub mod pool;
