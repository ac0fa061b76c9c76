use super::domain::{
    DocumentFilter, DocumentId, DocumentRecord, DocumentType, DocumentTypeId,
    DocumentTypeSelection, Employee, EmployeeId, PageRequest,
};
use crate::error::{Classify, ErrorKind};

/// Statements available inside one unit of work.
///
/// Every call observes the writes made earlier in the same transaction and
/// none of the writes of transactions that have not committed.
pub trait StoreTransaction {
    /// Reads the employee and keeps it from being changed or removed by other
    /// transactions until this one ends.
    fn employee(&mut self, id: &EmployeeId) -> Result<Option<Employee>, StoreError>;
    fn insert_employee(&mut self, employee: &Employee) -> Result<(), StoreError>;
    /// Fails with [`StoreError::NotFound`] when the employee does not exist.
    fn update_employee(&mut self, employee: &Employee) -> Result<(), StoreError>;

    fn document_type(&mut self, id: &DocumentTypeId) -> Result<Option<DocumentType>, StoreError>;
    /// Fails with [`StoreError::UniqueViolation`] when the name is taken.
    fn insert_document_type(&mut self, document_type: &DocumentType) -> Result<(), StoreError>;
    fn update_document_type(&mut self, document_type: &DocumentType) -> Result<(), StoreError>;
    /// Fails with [`StoreError::ForeignKeyViolation`] while document records
    /// still reference the type.
    fn delete_document_type(&mut self, id: &DocumentTypeId) -> Result<(), StoreError>;
    /// Number of the given type ids that exist. The counted types stay locked
    /// against removal until the transaction ends.
    fn count_document_types(&mut self, ids: &DocumentTypeSelection) -> Result<usize, StoreError>;

    /// Insert a pending record per type id, silently skipping pairs that
    /// already have one. Returns how many rows were created.
    fn insert_pending_documents(
        &mut self,
        employee_id: &EmployeeId,
        types: &DocumentTypeSelection,
    ) -> Result<usize, StoreError>;
    fn documents_for(
        &mut self,
        employee_id: &EmployeeId,
        types: &DocumentTypeSelection,
    ) -> Result<Vec<DocumentRecord>, StoreError>;
    fn delete_documents(
        &mut self,
        employee_id: &EmployeeId,
        types: &DocumentTypeSelection,
    ) -> Result<usize, StoreError>;

    /// Read a record and hold it exclusively until the transaction ends.
    fn lock_document(&mut self, id: &DocumentId) -> Result<Option<DocumentRecord>, StoreError>;
    fn mark_fulfilled(&mut self, id: &DocumentId) -> Result<(), StoreError>;

    fn list_documents(
        &mut self,
        filter: &DocumentFilter,
        page: &PageRequest,
    ) -> Result<Vec<DocumentRecord>, StoreError>;
    fn count_documents(&mut self, filter: &DocumentFilter) -> Result<u64, StoreError>;
    /// Every record of the employee joined with its type, ordered by type name.
    fn employee_documents(
        &mut self,
        employee_id: &EmployeeId,
    ) -> Result<Vec<(DocumentRecord, DocumentType)>, StoreError>;
}

/// Handle to the backing store. Injected into each service; there is no
/// process-wide instance.
pub trait DocumentStore: Send + Sync {
    /// Run `work` as one atomic unit: its writes commit only if it returns
    /// `Ok`, and are discarded on any error.
    fn transaction<T, E, F>(&self, work: F) -> Result<T, E>
    where
        F: FnOnce(&mut dyn StoreTransaction) -> Result<T, E>,
        E: From<StoreError>;
}

/// Error enumeration for store failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("unique constraint violated: {0}")]
    UniqueViolation(String),
    #[error("foreign key constraint violated: {0}")]
    ForeignKeyViolation(String),
    #[error("record not found")]
    NotFound,
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("transaction aborted: {0}")]
    Aborted(String),
}

impl Classify for StoreError {
    fn kind(&self) -> ErrorKind {
        match self {
            StoreError::NotFound => ErrorKind::NotFound,
            StoreError::UniqueViolation(_) | StoreError::ForeignKeyViolation(_) => {
                ErrorKind::Conflict
            }
            StoreError::Unavailable(_) | StoreError::Aborted(_) => ErrorKind::Infrastructure,
        }
    }
}
