/// Embedded database migrations
///
/// The SQL files under the workspace `migrations/` directory are compiled
/// into the binary, so a deployed server can bring its own schema up to date
/// on startup.

use sqlx::{migrate::MigrateDatabase, postgres::PgPool, Postgres};
use tracing::{debug, info, warn};

/// Applies every pending migration
///
/// # Errors
///
/// Returns the first migration that fails; earlier ones stay applied.
pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    info!("running database migrations");

    match sqlx::migrate!("../migrations").run(pool).await {
        Ok(()) => {
            info!("database schema is up to date");
            Ok(())
        }
        Err(e) => {
            warn!(error = %e, "migration failed");
            Err(e)
        }
    }
}

/// Creates the database if it doesn't exist
///
/// Meant for development and test setups.
pub async fn ensure_database_exists(database_url: &str) -> Result<(), sqlx::Error> {
    if Postgres::database_exists(database_url).await? {
        debug!("database already exists");
    } else {
        info!("database does not exist, creating it");
        Postgres::create_database(database_url).await?;
    }

    Ok(())
}
