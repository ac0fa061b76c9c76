use super::domain::{DocumentTypeSelection, Employee, EmployeeId};
use super::store::{StoreError, StoreTransaction};
use crate::error::{Classify, ErrorKind};

/// Why an association target could not be confirmed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExistenceError {
    #[error("employee {0} not found")]
    EmployeeNotFound(EmployeeId),
    #[error("one or more document types were not found ({found} of {requested} exist)")]
    DocumentTypesNotFound { requested: usize, found: usize },
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl Classify for ExistenceError {
    fn kind(&self) -> ErrorKind {
        match self {
            ExistenceError::EmployeeNotFound(_) | ExistenceError::DocumentTypesNotFound { .. } => {
                ErrorKind::NotFound
            }
            ExistenceError::Store(err) => err.kind(),
        }
    }
}

/// Confirm that the employee and every requested type exist, reading both
/// through `tx` so they observe one snapshot.
///
/// Both reads always run. A missing employee outranks missing types.
pub fn confirm_targets(
    tx: &mut dyn StoreTransaction,
    employee_id: &EmployeeId,
    types: &DocumentTypeSelection,
) -> Result<Employee, ExistenceError> {
    let employee = tx.employee(employee_id)?;
    let found = tx.count_document_types(types)?;

    let employee =
        employee.ok_or_else(|| ExistenceError::EmployeeNotFound(employee_id.clone()))?;

    if found != types.len() {
        return Err(ExistenceError::DocumentTypesNotFound {
            requested: types.len(),
            found,
        });
    }

    Ok(employee)
}
