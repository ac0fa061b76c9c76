use std::fmt::Display;
use std::sync::Arc;

use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post, put},
    Router,
};
use serde::Deserialize;
use serde_json::json;
use tracing::error;

use super::domain::{
    AssociationRequest, DocumentFilter, DocumentId, DocumentTypeId, EmployeeId, EmployeeUpdate,
    FilePayload, NewDocumentType, NewEmployee, PageRequest,
};
use super::registry::StaffRegistry;
use super::service::DocumentLifecycle;
use super::sink::DocumentSink;
use super::store::DocumentStore;
use crate::config::DocumentsConfig;
use crate::error::Classify;

/// Multipart field carrying the uploaded file.
const FILE_FIELD: &str = "file";

/// Services and upload limits shared by every handler.
pub struct DocumentApi<S, K> {
    pub lifecycle: Arc<DocumentLifecycle<S, K>>,
    pub registry: Arc<StaffRegistry<S>>,
    pub settings: DocumentsConfig,
}

impl<S, K> DocumentApi<S, K>
where
    S: DocumentStore + 'static,
    K: DocumentSink + 'static,
{
    pub fn new(store: Arc<S>, sink: Arc<K>, settings: DocumentsConfig) -> Self {
        Self {
            lifecycle: Arc::new(DocumentLifecycle::new(store.clone(), sink)),
            registry: Arc::new(StaffRegistry::new(store)),
            settings,
        }
    }
}

/// Router builder exposing the employee, document type, and document endpoints.
pub fn document_router<S, K>(api: Arc<DocumentApi<S, K>>) -> Router
where
    S: DocumentStore + 'static,
    K: DocumentSink + 'static,
{
    let body_limit = api.settings.max_upload_bytes.saturating_add(64 * 1024);

    Router::new()
        .route("/api/v1/employees", post(register_employee_handler::<S, K>))
        .route(
            "/api/v1/employees/:employee_id",
            put(update_employee_handler::<S, K>),
        )
        .route(
            "/api/v1/employees/:employee_id/documentation-status",
            get(documentation_status_handler::<S, K>),
        )
        .route(
            "/api/v1/document-types",
            post(create_document_type_handler::<S, K>),
        )
        .route(
            "/api/v1/document-types/:document_type_id",
            put(update_document_type_handler::<S, K>)
                .delete(remove_document_type_handler::<S, K>),
        )
        .route("/api/v1/documents", get(list_handler::<S, K>))
        .route(
            "/api/v1/documents/associate",
            post(associate_handler::<S, K>),
        )
        .route(
            "/api/v1/documents/disassociate",
            delete(disassociate_handler::<S, K>),
        )
        .route(
            "/api/v1/documents/:document_id/upload",
            post(upload_handler::<S, K>),
        )
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(api)
}

/// Query string accepted by the listing endpoint.
#[derive(Debug, Default, Deserialize)]
pub struct ListDocumentsQuery {
    pub employee: Option<String>,
    #[serde(rename = "type")]
    pub document_type: Option<String>,
    pub pending: Option<bool>,
    pub page: Option<u32>,
}

fn failure<E>(err: E) -> Response
where
    E: Classify + Display,
{
    let status = err.kind().status_code();
    if status.is_server_error() {
        error!(error = %err, "document request failed");
    }
    let payload = json!({ "error": err.to_string() });
    (status, axum::Json(payload)).into_response()
}

fn bad_request(messages: Vec<String>) -> Response {
    let payload = json!({
        "error": "invalid request",
        "details": messages,
    });
    (StatusCode::BAD_REQUEST, axum::Json(payload)).into_response()
}

/// Run blocking store work off the async executor.
async fn blocking<T, E, F>(work: F) -> Result<T, Response>
where
    F: FnOnce() -> Result<T, E> + Send + 'static,
    T: Send + 'static,
    E: Classify + Display + Send + 'static,
{
    match tokio::task::spawn_blocking(work).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(err)) => Err(failure(err)),
        Err(join_error) => {
            error!(error = %join_error, "document worker panicked");
            let payload = json!({ "error": "internal error" });
            Err((StatusCode::INTERNAL_SERVER_ERROR, axum::Json(payload)).into_response())
        }
    }
}

pub(crate) async fn register_employee_handler<S, K>(
    State(api): State<Arc<DocumentApi<S, K>>>,
    axum::Json(new): axum::Json<NewEmployee>,
) -> Response
where
    S: DocumentStore + 'static,
    K: DocumentSink + 'static,
{
    let registry = api.registry.clone();
    match blocking(move || registry.register_employee(new)).await {
        Ok(employee) => (StatusCode::CREATED, axum::Json(employee)).into_response(),
        Err(response) => response,
    }
}

pub(crate) async fn update_employee_handler<S, K>(
    State(api): State<Arc<DocumentApi<S, K>>>,
    Path(employee_id): Path<String>,
    axum::Json(update): axum::Json<EmployeeUpdate>,
) -> Response
where
    S: DocumentStore + 'static,
    K: DocumentSink + 'static,
{
    let registry = api.registry.clone();
    let id = EmployeeId::new(employee_id);
    match blocking(move || registry.update_employee(&id, update)).await {
        Ok(employee) => (StatusCode::OK, axum::Json(employee)).into_response(),
        Err(response) => response,
    }
}

pub(crate) async fn documentation_status_handler<S, K>(
    State(api): State<Arc<DocumentApi<S, K>>>,
    Path(employee_id): Path<String>,
) -> Response
where
    S: DocumentStore + 'static,
    K: DocumentSink + 'static,
{
    let registry = api.registry.clone();
    let id = EmployeeId::new(employee_id);
    match blocking(move || registry.documentation_status(&id)).await {
        Ok(status) => (StatusCode::OK, axum::Json(status)).into_response(),
        Err(response) => response,
    }
}

pub(crate) async fn create_document_type_handler<S, K>(
    State(api): State<Arc<DocumentApi<S, K>>>,
    axum::Json(new): axum::Json<NewDocumentType>,
) -> Response
where
    S: DocumentStore + 'static,
    K: DocumentSink + 'static,
{
    let registry = api.registry.clone();
    match blocking(move || registry.create_document_type(new)).await {
        Ok(document_type) => (StatusCode::CREATED, axum::Json(document_type)).into_response(),
        Err(response) => response,
    }
}

pub(crate) async fn update_document_type_handler<S, K>(
    State(api): State<Arc<DocumentApi<S, K>>>,
    Path(document_type_id): Path<String>,
    axum::Json(update): axum::Json<NewDocumentType>,
) -> Response
where
    S: DocumentStore + 'static,
    K: DocumentSink + 'static,
{
    let registry = api.registry.clone();
    let id = DocumentTypeId::new(document_type_id);
    match blocking(move || registry.update_document_type(&id, update)).await {
        Ok(document_type) => (StatusCode::OK, axum::Json(document_type)).into_response(),
        Err(response) => response,
    }
}

pub(crate) async fn remove_document_type_handler<S, K>(
    State(api): State<Arc<DocumentApi<S, K>>>,
    Path(document_type_id): Path<String>,
) -> Response
where
    S: DocumentStore + 'static,
    K: DocumentSink + 'static,
{
    let registry = api.registry.clone();
    let id = DocumentTypeId::new(document_type_id);
    match blocking(move || registry.remove_document_type(&id)).await {
        Ok(document_type) => (StatusCode::OK, axum::Json(document_type)).into_response(),
        Err(response) => response,
    }
}

pub(crate) async fn associate_handler<S, K>(
    State(api): State<Arc<DocumentApi<S, K>>>,
    axum::Json(request): axum::Json<AssociationRequest>,
) -> Response
where
    S: DocumentStore + 'static,
    K: DocumentSink + 'static,
{
    let problems = request.problems();
    if !problems.is_empty() {
        return bad_request(problems.iter().map(ToString::to_string).collect());
    }

    let lifecycle = api.lifecycle.clone();
    let outcome = blocking(move || {
        let (employee_id, types) = request.into_parts()?;
        lifecycle.associate(&employee_id, &types)
    })
    .await;

    match outcome {
        Ok(records) => (StatusCode::CREATED, axum::Json(records)).into_response(),
        Err(response) => response,
    }
}

pub(crate) async fn disassociate_handler<S, K>(
    State(api): State<Arc<DocumentApi<S, K>>>,
    axum::Json(request): axum::Json<AssociationRequest>,
) -> Response
where
    S: DocumentStore + 'static,
    K: DocumentSink + 'static,
{
    let problems = request.problems();
    if !problems.is_empty() {
        return bad_request(problems.iter().map(ToString::to_string).collect());
    }

    let lifecycle = api.lifecycle.clone();
    let outcome = blocking(move || {
        let (employee_id, types) = request.into_parts()?;
        lifecycle.disassociate(&employee_id, &types)
    })
    .await;

    match outcome {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(response) => response,
    }
}

pub(crate) async fn upload_handler<S, K>(
    State(api): State<Arc<DocumentApi<S, K>>>,
    Path(document_id): Path<String>,
    multipart: Multipart,
) -> Response
where
    S: DocumentStore + 'static,
    K: DocumentSink + 'static,
{
    let payload = match read_pdf_upload(multipart, api.settings.max_upload_bytes).await {
        Ok(payload) => payload,
        Err(message) => return bad_request(vec![message]),
    };

    let lifecycle = api.lifecycle.clone();
    let id = DocumentId::new(document_id);
    match blocking(move || lifecycle.upload(&id, &payload)).await {
        Ok(record) => (StatusCode::CREATED, axum::Json(record)).into_response(),
        Err(response) => response,
    }
}

/// Pull the `file` field out of the form and check it is a PDF within the
/// size limit.
async fn read_pdf_upload(mut multipart: Multipart, max_bytes: usize) -> Result<FilePayload, String> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| format!("malformed multipart body: {err}"))?
    {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }

        let file_name = field.file_name().unwrap_or("upload").to_string();
        let content_type = field
            .content_type()
            .and_then(|raw| raw.parse::<mime::Mime>().ok());
        let is_pdf = content_type
            .as_ref()
            .map_or(false, |mime| mime.essence_str() == mime::APPLICATION_PDF.essence_str());
        if !is_pdf {
            return Err("file must be a pdf".to_string());
        }

        let bytes = field
            .bytes()
            .await
            .map_err(|err| format!("unable to read uploaded file: {err}"))?;
        if bytes.len() > max_bytes {
            return Err(format!("file must be at most {max_bytes} bytes"));
        }

        return Ok(FilePayload::pdf(file_name, bytes.to_vec()));
    }

    Err(format!("multipart field '{FILE_FIELD}' is required"))
}

pub(crate) async fn list_handler<S, K>(
    State(api): State<Arc<DocumentApi<S, K>>>,
    Query(query): Query<ListDocumentsQuery>,
) -> Response
where
    S: DocumentStore + 'static,
    K: DocumentSink + 'static,
{
    let page = match PageRequest::new(query.page.unwrap_or(1), api.settings.page_size) {
        Ok(page) => page,
        Err(err) => return bad_request(vec![err.to_string()]),
    };
    let filter = DocumentFilter {
        employee_id: query.employee.map(EmployeeId::new),
        document_type_id: query.document_type.map(DocumentTypeId::new),
        pending: query.pending,
    };

    let lifecycle = api.lifecycle.clone();
    match blocking(move || lifecycle.list(&filter, page)).await {
        Ok(page) => (StatusCode::OK, axum::Json(page)).into_response(),
        Err(response) => response,
    }
}
