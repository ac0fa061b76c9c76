use crate::cli::ServeArgs;
use crate::infra::{document_api, AppState};
use crate::routes::with_document_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use staffdocs::config::{AppConfig, StorageConfig};
use staffdocs::documents::{DocumentStore, InMemoryStore, StoreError};
use staffdocs::error::AppError;
use staffdocs::telemetry;
use staffdocs_persistence::PgDocumentStore;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    match config.storage.clone() {
        StorageConfig::Memory => {
            warn!("serving from the in-memory store; data is lost on shutdown");
            serve(config, Arc::new(InMemoryStore::new())).await
        }
        StorageConfig::Postgres(database) => {
            let store = tokio::task::spawn_blocking(move || PgDocumentStore::connect(&database))
                .await
                .map_err(std::io::Error::from)?
                .map_err(StoreError::from)?;
            serve(config, Arc::new(store)).await
        }
    }
}

async fn serve<S>(config: AppConfig, store: Arc<S>) -> Result<(), AppError>
where
    S: DocumentStore + 'static,
{
    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let api = document_api(store, &config.documents);
    let app = with_document_routes(api)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        upload_dir = %config.documents.upload_dir.display(),
        "staffdocs api ready"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
