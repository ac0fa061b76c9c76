use std::sync::Arc;

use chrono::{Local, NaiveDate};
use tracing::info;

use super::domain::{
    DocumentState, DocumentStatusEntry, DocumentType, DocumentTypeId, DocumentationStatus, Employee,
    EmployeeId, EmployeeUpdate, NewDocumentType, NewEmployee, ValidationError,
};
use super::store::{DocumentStore, StoreError};
use crate::error::{Classify, ErrorKind};

/// Employee onboarding and document type catalogue.
pub struct StaffRegistry<S> {
    store: Arc<S>,
}

impl<S> StaffRegistry<S>
where
    S: DocumentStore + 'static,
{
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    pub fn register_employee(&self, new: NewEmployee) -> Result<Employee, RegistryError> {
        self.register_employee_as_of(new, Local::now().date_naive())
    }

    /// Register relative to an explicit "today", rejecting future hire dates.
    pub fn register_employee_as_of(
        &self,
        new: NewEmployee,
        today: NaiveDate,
    ) -> Result<Employee, RegistryError> {
        let employee = Employee {
            id: EmployeeId::generate(),
            name: required_name(&new.name)?,
            hired_at: hire_date(new.hired_at, today)?,
        };

        self.store
            .transaction(|tx| tx.insert_employee(&employee))?;
        info!(employee_id = %employee.id, "employee registered");
        Ok(employee)
    }

    pub fn update_employee(
        &self,
        id: &EmployeeId,
        update: EmployeeUpdate,
    ) -> Result<Employee, RegistryError> {
        let today = Local::now().date_naive();
        let name = update.name.as_deref().map(required_name).transpose()?;
        let hired_at = update
            .hired_at
            .map(|date| hire_date(date, today))
            .transpose()?;

        self.store.transaction(|tx| {
            let mut employee = tx
                .employee(id)?
                .ok_or_else(|| RegistryError::EmployeeNotFound(id.clone()))?;
            if let Some(name) = name {
                employee.name = name;
            }
            if let Some(hired_at) = hired_at {
                employee.hired_at = hired_at;
            }
            tx.update_employee(&employee)?;
            Ok(employee)
        })
    }

    /// Every document the employee owes, with pending/fulfilled totals.
    pub fn documentation_status(
        &self,
        id: &EmployeeId,
    ) -> Result<DocumentationStatus, RegistryError> {
        self.store.transaction(|tx| {
            let employee = tx
                .employee(id)?
                .ok_or_else(|| RegistryError::EmployeeNotFound(id.clone()))?;

            let documents: Vec<DocumentStatusEntry> = tx
                .employee_documents(id)?
                .into_iter()
                .map(|(record, document_type)| DocumentStatusEntry {
                    status: record.state(),
                    document_id: record.id,
                    document_type_id: record.document_type_id,
                    document_type_name: document_type.name,
                })
                .collect();
            let pending = documents
                .iter()
                .filter(|entry| entry.status == DocumentState::Pending)
                .count();

            Ok(DocumentationStatus {
                employee,
                fulfilled: documents.len() - pending,
                pending,
                documents,
            })
        })
    }

    pub fn create_document_type(
        &self,
        new: NewDocumentType,
    ) -> Result<DocumentType, RegistryError> {
        let document_type = DocumentType {
            id: DocumentTypeId::generate(),
            name: required_name(&new.name)?,
        };

        self.store
            .transaction(|tx| tx.insert_document_type(&document_type))
            .map_err(|err| name_conflict(err, &document_type.name))?;
        info!(document_type_id = %document_type.id, name = %document_type.name, "document type created");
        Ok(document_type)
    }

    pub fn update_document_type(
        &self,
        id: &DocumentTypeId,
        update: NewDocumentType,
    ) -> Result<DocumentType, RegistryError> {
        let document_type = DocumentType {
            id: id.clone(),
            name: required_name(&update.name)?,
        };

        self.store
            .transaction(|tx| tx.update_document_type(&document_type))
            .map_err(|err| match err {
                StoreError::NotFound => RegistryError::DocumentTypeNotFound(id.clone()),
                other => name_conflict(other, &document_type.name),
            })?;
        Ok(document_type)
    }

    /// Remove a type nobody is linked to. Linked types must be disassociated
    /// first.
    pub fn remove_document_type(&self, id: &DocumentTypeId) -> Result<DocumentType, RegistryError> {
        let removed = self.store.transaction(|tx| {
            let document_type = tx
                .document_type(id)?
                .ok_or_else(|| RegistryError::DocumentTypeNotFound(id.clone()))?;
            tx.delete_document_type(id).map_err(|err| match err {
                StoreError::ForeignKeyViolation(_) => RegistryError::DocumentTypeInUse(id.clone()),
                StoreError::NotFound => RegistryError::DocumentTypeNotFound(id.clone()),
                other => RegistryError::Store(other),
            })?;
            Ok::<_, RegistryError>(document_type)
        })?;

        info!(document_type_id = %id, "document type removed");
        Ok(removed)
    }
}

fn required_name(raw: &str) -> Result<String, ValidationError> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(ValidationError::BlankName);
    }
    Ok(name.to_string())
}

fn hire_date(date: NaiveDate, today: NaiveDate) -> Result<NaiveDate, ValidationError> {
    if date > today {
        return Err(ValidationError::HireDateInFuture(date));
    }
    Ok(date)
}

fn name_conflict(err: StoreError, name: &str) -> RegistryError {
    match err {
        StoreError::UniqueViolation(_) => RegistryError::DuplicateName(name.to_string()),
        other => RegistryError::Store(other),
    }
}

/// Error raised by the registry.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("employee {0} not found")]
    EmployeeNotFound(EmployeeId),
    #[error("document type {0} not found")]
    DocumentTypeNotFound(DocumentTypeId),
    #[error("a document type named '{0}' already exists")]
    DuplicateName(String),
    #[error("document type {0} is still linked to employee documents")]
    DocumentTypeInUse(DocumentTypeId),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl Classify for RegistryError {
    fn kind(&self) -> ErrorKind {
        match self {
            RegistryError::Validation(_) => ErrorKind::Validation,
            RegistryError::EmployeeNotFound(_) | RegistryError::DocumentTypeNotFound(_) => {
                ErrorKind::NotFound
            }
            RegistryError::DuplicateName(_) | RegistryError::DocumentTypeInUse(_) => {
                ErrorKind::Conflict
            }
            RegistryError::Store(err) => err.kind(),
        }
    }
}
