use staffdocs::config::{AppConfig, DatabaseConfig, StorageConfig};
use staffdocs::documents::StoreError;
use staffdocs::error::AppError;
use staffdocs::telemetry;
use staffdocs_persistence::build_pool;
use tracing::info;

/// Build a pool against the configured database, which applies any pending
/// migrations on first checkout.
pub(crate) async fn run_migrations() -> Result<(), AppError> {
    let config = AppConfig::load()?;
    telemetry::init(&config.telemetry)?;

    let database = match config.storage {
        StorageConfig::Postgres(database) => database,
        StorageConfig::Memory => DatabaseConfig::from_env()?,
    };

    tokio::task::spawn_blocking(move || {
        build_pool(&database.url, 1, 1)
            .map(|_| ())
            .map_err(StoreError::from)
    })
    .await
    .map_err(std::io::Error::from)??;

    info!("database schema is up to date");
    println!("Migrations applied; schema is up to date.");
    Ok(())
}
