use std::collections::BTreeSet;
use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Classify, ErrorKind};

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            /// Fresh random identifier for newly created rows.
            pub fn generate() -> Self {
                Self(Uuid::new_v4().to_string())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            pub fn is_blank(&self) -> bool {
                self.0.trim().is_empty()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.pad(&self.0)
            }
        }
    };
}

string_id!(
    /// Identifier wrapper for employees.
    EmployeeId
);
string_id!(
    /// Identifier wrapper for document types.
    DocumentTypeId
);
string_id!(
    /// Identifier wrapper for document records.
    DocumentId
);

/// Person who owes compliance documents. Created by the onboarding flow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Employee {
    pub id: EmployeeId,
    pub name: String,
    pub hired_at: NaiveDate,
}

/// Kind of document an employee can be asked for (ID card, tax form, ...).
/// Names are unique across types.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentType {
    pub id: DocumentTypeId,
    pub name: String,
}

/// One employee's obligation to submit one document type.
///
/// At most one record exists per (employee, type) pair. `pending` only ever
/// moves from `true` to `false`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentRecord {
    pub id: DocumentId,
    pub employee_id: EmployeeId,
    pub document_type_id: DocumentTypeId,
    pub pending: bool,
}

impl DocumentRecord {
    pub fn pending(employee_id: EmployeeId, document_type_id: DocumentTypeId) -> Self {
        Self {
            id: DocumentId::generate(),
            employee_id,
            document_type_id,
            pending: true,
        }
    }

    pub fn state(&self) -> DocumentState {
        if self.pending {
            DocumentState::Pending
        } else {
            DocumentState::Fulfilled
        }
    }
}

/// Lifecycle of a document record. `Fulfilled` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentState {
    Pending,
    Fulfilled,
}

impl DocumentState {
    pub fn label(&self) -> &'static str {
        match self {
            DocumentState::Pending => "pending",
            DocumentState::Fulfilled => "fulfilled",
        }
    }
}

/// Distinct, non-empty set of document type identifiers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentTypeSelection(BTreeSet<DocumentTypeId>);

impl DocumentTypeSelection {
    /// Duplicates collapse; an empty input or a blank id is rejected.
    pub fn new<I>(ids: I) -> Result<Self, ValidationError>
    where
        I: IntoIterator<Item = DocumentTypeId>,
    {
        let mut distinct = BTreeSet::new();
        for id in ids {
            if id.is_blank() {
                return Err(ValidationError::BlankDocumentTypeId);
            }
            distinct.insert(id);
        }

        if distinct.is_empty() {
            return Err(ValidationError::EmptyDocumentTypes);
        }

        Ok(Self(distinct))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, id: &DocumentTypeId) -> bool {
        self.0.contains(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &DocumentTypeId> {
        self.0.iter()
    }

    pub fn as_strs(&self) -> Vec<&str> {
        self.0.iter().map(DocumentTypeId::as_str).collect()
    }
}

/// Body of an associate/disassociate request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssociationRequest {
    pub employee_id: EmployeeId,
    pub document_type_ids: Vec<DocumentTypeId>,
}

impl AssociationRequest {
    pub fn new(employee_id: impl Into<String>, document_type_ids: &[&str]) -> Self {
        Self {
            employee_id: EmployeeId::new(employee_id),
            document_type_ids: document_type_ids
                .iter()
                .map(|id| DocumentTypeId::new(*id))
                .collect(),
        }
    }

    /// Every field-level problem with the request, in a stable order.
    pub fn problems(&self) -> Vec<ValidationError> {
        let mut problems = Vec::new();
        if self.document_type_ids.is_empty() {
            problems.push(ValidationError::EmptyDocumentTypes);
        } else if self.document_type_ids.iter().any(DocumentTypeId::is_blank) {
            problems.push(ValidationError::BlankDocumentTypeId);
        }
        if self.employee_id.is_blank() {
            problems.push(ValidationError::BlankEmployeeId);
        }
        problems
    }

    pub fn into_parts(self) -> Result<(EmployeeId, DocumentTypeSelection), ValidationError> {
        if self.employee_id.is_blank() {
            return Err(ValidationError::BlankEmployeeId);
        }
        let selection = DocumentTypeSelection::new(self.document_type_ids)?;
        Ok((self.employee_id, selection))
    }
}

/// File accepted at the upload boundary. Format and size were checked by the
/// caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilePayload {
    pub file_name: String,
    pub content_type: mime::Mime,
    pub bytes: Vec<u8>,
}

impl FilePayload {
    pub fn new(file_name: impl Into<String>, content_type: mime::Mime, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            content_type,
            bytes,
        }
    }

    pub fn pdf(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self::new(file_name, mime::APPLICATION_PDF, bytes)
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Conjunction of optional predicates over document records.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentFilter {
    pub employee_id: Option<EmployeeId>,
    pub document_type_id: Option<DocumentTypeId>,
    pub pending: Option<bool>,
}

impl DocumentFilter {
    pub fn for_employee(employee_id: EmployeeId) -> Self {
        Self {
            employee_id: Some(employee_id),
            ..Self::default()
        }
    }

    pub fn matches(&self, record: &DocumentRecord) -> bool {
        self.employee_id
            .as_ref()
            .map_or(true, |id| *id == record.employee_id)
            && self
                .document_type_id
                .as_ref()
                .map_or(true, |id| *id == record.document_type_id)
            && self.pending.map_or(true, |pending| pending == record.pending)
    }
}

/// One-based page of a listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    number: u32,
    size: u32,
}

impl PageRequest {
    pub const DEFAULT_SIZE: u32 = 10;

    pub fn new(number: u32, size: u32) -> Result<Self, ValidationError> {
        if number == 0 {
            return Err(ValidationError::InvalidPage);
        }
        if size == 0 {
            return Err(ValidationError::InvalidPageSize);
        }
        Ok(Self { number, size })
    }

    pub fn first() -> Self {
        Self {
            number: 1,
            size: Self::DEFAULT_SIZE,
        }
    }

    pub fn number(&self) -> u32 {
        self.number
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.number - 1) * u64::from(self.size)
    }
}

/// Result of a listing. `total` counts every match, not just this page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentPage {
    pub data: Vec<DocumentRecord>,
    pub meta: PageMeta,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PageMeta {
    pub page: u32,
    pub total: u64,
}

/// Onboarding payload for a new employee.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewEmployee {
    pub name: String,
    pub hired_at: NaiveDate,
}

/// Partial edit of an employee. Document identity is unaffected.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmployeeUpdate {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub hired_at: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewDocumentType {
    pub name: String,
}

/// Per-employee view of every document they owe and its state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentationStatus {
    pub employee: Employee,
    pub documents: Vec<DocumentStatusEntry>,
    pub pending: usize,
    pub fulfilled: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentStatusEntry {
    pub document_id: DocumentId,
    pub document_type_id: DocumentTypeId,
    pub document_type_name: String,
    pub status: DocumentState,
}

/// Input rejected before any store access.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("employee id must not be empty")]
    BlankEmployeeId,
    #[error("at least one document type id is required")]
    EmptyDocumentTypes,
    #[error("document type ids must not be empty")]
    BlankDocumentTypeId,
    #[error("name must not be empty")]
    BlankName,
    #[error("hire date {0} is in the future")]
    HireDateInFuture(NaiveDate),
    #[error("page numbers start at 1")]
    InvalidPage,
    #[error("page size must be at least 1")]
    InvalidPageSize,
}

impl Classify for ValidationError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::Validation
    }
}
