//! Embedded schema migrations.

use diesel::Connection;
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use tracing::info;

use super::pool::{to_diesel_error, DieselError};

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations/sqlite");

/// Run pending migrations against a SQLite database path.
///
/// Diesel's migration harness is sync, so this runs on the blocking pool.
pub async fn run_migrations(database_url: &str) -> Result<(), DieselError> {
    let url = database_url
        .strip_prefix("sqlite:")
        .unwrap_or(database_url)
        .to_string();

    tokio::task::spawn_blocking(move || {
        let mut conn = diesel::SqliteConnection::establish(&url).map_err(to_diesel_error)?;

        let applied = conn
            .run_pending_migrations(MIGRATIONS)
            .map_err(DieselError::QueryBuilderError)?;

        for migration in &applied {
            info!("applied migration {}", migration);
        }

        Ok(())
    })
    .await
    .map_err(|e| DieselError::QueryBuilderError(Box::new(e)))?
}
