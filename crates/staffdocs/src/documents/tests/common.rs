use std::sync::Arc;

use axum::response::Response;
use chrono::NaiveDate;
use serde_json::Value;

use crate::config::DocumentsConfig;
use crate::documents::domain::{
    DocumentRecord, DocumentType, DocumentTypeId, DocumentTypeSelection, Employee, EmployeeId,
    FilePayload,
};
use crate::documents::memory::InMemoryStore;
use crate::documents::sink::{DocumentSink, MemorySink, SinkError, StoredFile};
use crate::documents::store::{DocumentStore, StoreError, StoreTransaction};
use crate::documents::{document_router, DocumentApi, DocumentId, DocumentLifecycle};

pub(super) const EMPLOYEE: &str = "e-1";
pub(super) const CPF: &str = "cpf";
pub(super) const RG: &str = "rg";

pub(super) fn employee(id: &str, name: &str) -> Employee {
    Employee {
        id: EmployeeId::new(id),
        name: name.to_string(),
        hired_at: NaiveDate::from_ymd_opt(2023, 7, 12).expect("valid date"),
    }
}

pub(super) fn document_type(id: &str, name: &str) -> DocumentType {
    DocumentType {
        id: DocumentTypeId::new(id),
        name: name.to_string(),
    }
}

pub(super) fn selection(ids: &[&str]) -> DocumentTypeSelection {
    DocumentTypeSelection::new(ids.iter().map(|id| DocumentTypeId::new(*id)))
        .expect("valid selection")
}

pub(super) fn employee_id() -> EmployeeId {
    EmployeeId::new(EMPLOYEE)
}

pub(super) fn pdf() -> FilePayload {
    FilePayload::pdf("teste.pdf", b"%PDF-1.4 compliance".to_vec())
}

/// Store holding one employee and two document types.
pub(super) fn seeded_store() -> Arc<InMemoryStore> {
    let store = InMemoryStore::new();
    store
        .transaction(|tx| {
            tx.insert_employee(&employee(EMPLOYEE, "Jackson"))?;
            tx.insert_document_type(&document_type(CPF, "CPF"))?;
            tx.insert_document_type(&document_type(RG, "RG"))?;
            Ok::<_, StoreError>(())
        })
        .expect("seed commits");
    Arc::new(store)
}

pub(super) fn build_lifecycle() -> (
    DocumentLifecycle<InMemoryStore, MemorySink>,
    Arc<InMemoryStore>,
    Arc<MemorySink>,
) {
    let store = seeded_store();
    let sink = Arc::new(MemorySink::new());
    let lifecycle = DocumentLifecycle::new(store.clone(), sink.clone());
    (lifecycle, store, sink)
}

/// Associate the given types with the seeded employee and return the records.
pub(super) fn associated(
    lifecycle: &DocumentLifecycle<InMemoryStore, MemorySink>,
    types: &[&str],
) -> Vec<DocumentRecord> {
    lifecycle
        .associate(&employee_id(), &selection(types))
        .expect("association succeeds")
}

pub(super) fn record_for(records: &[DocumentRecord], type_id: &str) -> DocumentId {
    records
        .iter()
        .find(|record| record.document_type_id.as_str() == type_id)
        .map(|record| record.id.clone())
        .expect("record for type")
}

/// Sink whose backend is always down.
#[derive(Debug, Default)]
pub(super) struct FailingSink;

impl DocumentSink for FailingSink {
    fn store(
        &self,
        _document_id: &DocumentId,
        _payload: &FilePayload,
    ) -> Result<StoredFile, SinkError> {
        Err(SinkError::Unavailable("bucket offline".to_string()))
    }
}

/// Store that refuses to open transactions.
#[derive(Debug, Default)]
pub(super) struct UnavailableStore;

impl DocumentStore for UnavailableStore {
    fn transaction<T, E, F>(&self, _work: F) -> Result<T, E>
    where
        F: FnOnce(&mut dyn StoreTransaction) -> Result<T, E>,
        E: From<StoreError>,
    {
        Err(StoreError::Unavailable("database offline".to_string()).into())
    }
}

pub(super) fn router_for<S, K>(store: Arc<S>, sink: Arc<K>) -> axum::Router
where
    S: DocumentStore + 'static,
    K: DocumentSink + 'static,
{
    document_router(Arc::new(DocumentApi::new(
        store,
        sink,
        DocumentsConfig::default(),
    )))
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
