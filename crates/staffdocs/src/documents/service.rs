use std::sync::Arc;

use tracing::{debug, info, warn};

use super::domain::{
    DocumentFilter, DocumentId, DocumentPage, DocumentRecord, DocumentTypeSelection, Employee,
    EmployeeId, FilePayload, PageMeta, PageRequest, ValidationError,
};
use super::sink::{DocumentSink, SinkError};
use super::store::{DocumentStore, StoreError};
use super::validator::{confirm_targets, ExistenceError};
use crate::error::{Classify, ErrorKind};

/// Service owning the document record lifecycle: association,
/// disassociation, fulfilment, and listing.
///
/// Holds no in-process state besides its collaborators; all consistency comes
/// from the store's transactions.
pub struct DocumentLifecycle<S, K> {
    store: Arc<S>,
    sink: Arc<K>,
}

impl<S, K> DocumentLifecycle<S, K>
where
    S: DocumentStore + 'static,
    K: DocumentSink + 'static,
{
    pub fn new(store: Arc<S>, sink: Arc<K>) -> Self {
        Self { store, sink }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Check that the employee and all requested types exist.
    pub fn validate(
        &self,
        employee_id: &EmployeeId,
        types: &DocumentTypeSelection,
    ) -> Result<Employee, DocumentServiceError> {
        guard_employee_id(employee_id)?;

        self.store.transaction(|tx| {
            confirm_targets(tx, employee_id, types).map_err(DocumentServiceError::from)
        })
    }

    /// Ensure a pending record exists for every requested type and return the
    /// records for those types, old and new alike.
    pub fn associate(
        &self,
        employee_id: &EmployeeId,
        types: &DocumentTypeSelection,
    ) -> Result<Vec<DocumentRecord>, DocumentServiceError> {
        let outcome = guard_employee_id(employee_id)
            .map_err(DocumentServiceError::from)
            .and_then(|()| {
                self.store.transaction(|tx| {
                    let employee = confirm_targets(tx, employee_id, types)?;
                    let created = tx.insert_pending_documents(&employee.id, types)?;
                    let records = tx.documents_for(&employee.id, types)?;
                    Ok::<_, DocumentServiceError>((created, records))
                })
            });

        match outcome {
            Ok((created, records)) => {
                info!(
                    employee_id = %employee_id,
                    requested = types.len(),
                    created,
                    "document types associated"
                );
                Ok(records)
            }
            Err(err) => {
                warn!(employee_id = %employee_id, error = %err, "association rejected");
                Err(err)
            }
        }
    }

    /// Remove the records for the requested types. Types with no record are
    /// ignored.
    pub fn disassociate(
        &self,
        employee_id: &EmployeeId,
        types: &DocumentTypeSelection,
    ) -> Result<(), DocumentServiceError> {
        let outcome = guard_employee_id(employee_id)
            .map_err(DocumentServiceError::from)
            .and_then(|()| {
                self.store.transaction(|tx| {
                    let employee = confirm_targets(tx, employee_id, types)?;
                    let removed = tx.delete_documents(&employee.id, types)?;
                    Ok::<_, DocumentServiceError>(removed)
                })
            });

        match outcome {
            Ok(removed) => {
                info!(
                    employee_id = %employee_id,
                    requested = types.len(),
                    removed,
                    "document types disassociated"
                );
                Ok(())
            }
            Err(err) => {
                warn!(employee_id = %employee_id, error = %err, "disassociation rejected");
                Err(err)
            }
        }
    }

    /// Fulfil a pending record with an accepted file.
    ///
    /// The record is locked, flipped, and handed to the sink inside one
    /// transaction, which commits only after the sink succeeds. A sink failure
    /// leaves the record pending.
    pub fn upload(
        &self,
        document_id: &DocumentId,
        payload: &FilePayload,
    ) -> Result<DocumentRecord, DocumentServiceError> {
        let outcome: Result<DocumentRecord, DocumentServiceError> = self.store.transaction(|tx| {
            let mut record = tx
                .lock_document(document_id)?
                .ok_or_else(|| DocumentServiceError::DocumentNotFound(document_id.clone()))?;

            if !record.pending {
                return Err(DocumentServiceError::AlreadyFulfilled(document_id.clone()));
            }

            tx.mark_fulfilled(document_id)?;
            record.pending = false;

            let stored = self.sink.store(document_id, payload)?;
            debug!(document_id = %document_id, location = %stored.location, "file handed to sink");
            Ok(record)
        });

        match &outcome {
            Ok(_) => info!(
                document_id = %document_id,
                file_name = %payload.file_name,
                bytes = payload.len(),
                "document fulfilled"
            ),
            Err(err) => warn!(document_id = %document_id, error = %err, "upload rejected"),
        }
        outcome
    }

    /// Page through records matching every predicate in `filter`.
    pub fn list(
        &self,
        filter: &DocumentFilter,
        page: PageRequest,
    ) -> Result<DocumentPage, DocumentServiceError> {
        let (data, total) = self.store.transaction(|tx| {
            let total = tx.count_documents(filter)?;
            let data = tx.list_documents(filter, &page)?;
            Ok::<_, StoreError>((data, total))
        })?;

        Ok(DocumentPage {
            data,
            meta: PageMeta {
                page: page.number(),
                total,
            },
        })
    }
}

fn guard_employee_id(employee_id: &EmployeeId) -> Result<(), ValidationError> {
    if employee_id.is_blank() {
        return Err(ValidationError::BlankEmployeeId);
    }
    Ok(())
}

/// Error raised by the document lifecycle service.
#[derive(Debug, thiserror::Error)]
pub enum DocumentServiceError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Existence(#[from] ExistenceError),
    #[error("pending document {0} not found")]
    DocumentNotFound(DocumentId),
    #[error("document {0} was already submitted")]
    AlreadyFulfilled(DocumentId),
    #[error(transparent)]
    Sink(#[from] SinkError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl Classify for DocumentServiceError {
    fn kind(&self) -> ErrorKind {
        match self {
            DocumentServiceError::Validation(_) => ErrorKind::Validation,
            DocumentServiceError::Existence(err) => err.kind(),
            DocumentServiceError::DocumentNotFound(_) => ErrorKind::NotFound,
            DocumentServiceError::AlreadyFulfilled(_) => ErrorKind::Conflict,
            DocumentServiceError::Sink(err) => err.kind(),
            DocumentServiceError::Store(err) => err.kind(),
        }
    }
}
