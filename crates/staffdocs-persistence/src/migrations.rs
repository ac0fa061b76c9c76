//! Embedded schema migrations.

use diesel::pg::PgConnection;
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use tracing::info;

use crate::error::PersistenceError;

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!();

/// Apply every migration not yet recorded in `__diesel_schema_migrations`.
/// Returns how many were applied.
pub fn run_pending_migrations(conn: &mut PgConnection) -> Result<usize, PersistenceError> {
    let applied = conn
        .run_pending_migrations(MIGRATIONS)
        .map_err(|err| PersistenceError::Migration(err.to_string()))?;
    if !applied.is_empty() {
        info!(applied = applied.len(), "database migrations applied");
    }
    Ok(applied.len())
}
