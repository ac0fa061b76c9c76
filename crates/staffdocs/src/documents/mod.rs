//! Employee document lifecycle.
//!
//! Associating a type with an employee creates one pending [`DocumentRecord`]
//! per pair; disassociating deletes it; an accepted upload flips it to
//! fulfilled exactly once. All consistency comes from the [`DocumentStore`]
//! transaction handed to each operation.

pub mod domain;
pub mod memory;
pub mod registry;
pub mod router;
pub mod service;
pub mod sink;
pub mod store;
pub(crate) mod validator;

#[cfg(test)]
mod tests;

pub use domain::{
    AssociationRequest, DocumentFilter, DocumentId, DocumentPage, DocumentRecord, DocumentState,
    DocumentStatusEntry, DocumentType, DocumentTypeId, DocumentTypeSelection,
    DocumentationStatus, Employee, EmployeeId, EmployeeUpdate, FilePayload, NewDocumentType,
    NewEmployee, PageMeta, PageRequest, ValidationError,
};
pub use memory::InMemoryStore;
pub use registry::{RegistryError, StaffRegistry};
pub use router::{document_router, DocumentApi, ListDocumentsQuery};
pub use service::{DocumentLifecycle, DocumentServiceError};
pub use sink::{DocumentSink, FilesystemSink, MemorySink, SinkError, StoredFile};
pub use store::{DocumentStore, StoreError, StoreTransaction};
pub use validator::{confirm_targets, ExistenceError};
