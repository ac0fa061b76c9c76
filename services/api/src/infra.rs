use metrics_exporter_prometheus::PrometheusHandle;
use staffdocs::config::DocumentsConfig;
use staffdocs::documents::{DocumentApi, DocumentStore, FilesystemSink};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Wire a store to the upload directory configured for this deployment.
pub(crate) fn document_api<S>(
    store: Arc<S>,
    settings: &DocumentsConfig,
) -> Arc<DocumentApi<S, FilesystemSink>>
where
    S: DocumentStore + 'static,
{
    let sink = Arc::new(FilesystemSink::new(settings.upload_dir.clone()));
    Arc::new(DocumentApi::new(store, sink, settings.clone()))
}
