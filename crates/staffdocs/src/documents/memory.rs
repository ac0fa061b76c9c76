use std::collections::BTreeMap;
use std::sync::{Mutex, PoisonError};

use super::domain::{
    DocumentFilter, DocumentId, DocumentRecord, DocumentType, DocumentTypeId,
    DocumentTypeSelection, Employee, EmployeeId, PageRequest,
};
use super::store::{DocumentStore, StoreError, StoreTransaction};

#[derive(Debug, Clone, Default)]
struct StoreState {
    employees: BTreeMap<EmployeeId, Employee>,
    document_types: BTreeMap<DocumentTypeId, DocumentType>,
    documents: BTreeMap<DocumentId, DocumentRecord>,
}

/// Process-local store with serializable transactions.
///
/// A transaction holds the store lock for its whole duration and works on a
/// copy of the committed state, which is swapped in only when the work
/// succeeds. Constraints match the relational schema: unique
/// (employee, type) pairs, unique type names, and restricting foreign keys.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    state: Mutex<StoreState>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DocumentStore for InMemoryStore {
    fn transaction<T, E, F>(&self, work: F) -> Result<T, E>
    where
        F: FnOnce(&mut dyn StoreTransaction) -> Result<T, E>,
        E: From<StoreError>,
    {
        // Committed state is only ever replaced whole, so a panic inside an
        // earlier transaction cannot have left it half-written.
        let mut committed = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let mut working = committed.clone();

        let outcome = work(&mut MemoryTransaction {
            state: &mut working,
        });
        if outcome.is_ok() {
            *committed = working;
        }
        outcome
    }
}

struct MemoryTransaction<'a> {
    state: &'a mut StoreState,
}

impl MemoryTransaction<'_> {
    fn name_taken(&self, name: &str, except: &DocumentTypeId) -> bool {
        self.state
            .document_types
            .values()
            .any(|existing| existing.name == name && existing.id != *except)
    }

    fn pair_exists(&self, employee_id: &EmployeeId, document_type_id: &DocumentTypeId) -> bool {
        self.state.documents.values().any(|record| {
            record.employee_id == *employee_id && record.document_type_id == *document_type_id
        })
    }

    fn matching<'s>(
        &'s self,
        employee_id: &'s EmployeeId,
        types: &'s DocumentTypeSelection,
    ) -> impl Iterator<Item = &'s DocumentRecord> + 's {
        self.state.documents.values().filter(move |record| {
            record.employee_id == *employee_id && types.contains(&record.document_type_id)
        })
    }
}

impl StoreTransaction for MemoryTransaction<'_> {
    fn employee(&mut self, id: &EmployeeId) -> Result<Option<Employee>, StoreError> {
        Ok(self.state.employees.get(id).cloned())
    }

    fn insert_employee(&mut self, employee: &Employee) -> Result<(), StoreError> {
        if self.state.employees.contains_key(&employee.id) {
            return Err(StoreError::UniqueViolation("employees_pkey".to_string()));
        }
        self.state
            .employees
            .insert(employee.id.clone(), employee.clone());
        Ok(())
    }

    fn update_employee(&mut self, employee: &Employee) -> Result<(), StoreError> {
        match self.state.employees.get_mut(&employee.id) {
            Some(existing) => {
                *existing = employee.clone();
                Ok(())
            }
            None => Err(StoreError::NotFound),
        }
    }

    fn document_type(&mut self, id: &DocumentTypeId) -> Result<Option<DocumentType>, StoreError> {
        Ok(self.state.document_types.get(id).cloned())
    }

    fn insert_document_type(&mut self, document_type: &DocumentType) -> Result<(), StoreError> {
        if self.state.document_types.contains_key(&document_type.id) {
            return Err(StoreError::UniqueViolation("document_types_pkey".to_string()));
        }
        if self.name_taken(&document_type.name, &document_type.id) {
            return Err(StoreError::UniqueViolation(
                "document_types_name_key".to_string(),
            ));
        }
        self.state
            .document_types
            .insert(document_type.id.clone(), document_type.clone());
        Ok(())
    }

    fn update_document_type(&mut self, document_type: &DocumentType) -> Result<(), StoreError> {
        if !self.state.document_types.contains_key(&document_type.id) {
            return Err(StoreError::NotFound);
        }
        if self.name_taken(&document_type.name, &document_type.id) {
            return Err(StoreError::UniqueViolation(
                "document_types_name_key".to_string(),
            ));
        }
        self.state
            .document_types
            .insert(document_type.id.clone(), document_type.clone());
        Ok(())
    }

    fn delete_document_type(&mut self, id: &DocumentTypeId) -> Result<(), StoreError> {
        if !self.state.document_types.contains_key(id) {
            return Err(StoreError::NotFound);
        }
        if self
            .state
            .documents
            .values()
            .any(|record| record.document_type_id == *id)
        {
            return Err(StoreError::ForeignKeyViolation(
                "documents_document_type_id_fkey".to_string(),
            ));
        }
        self.state.document_types.remove(id);
        Ok(())
    }

    fn count_document_types(&mut self, ids: &DocumentTypeSelection) -> Result<usize, StoreError> {
        Ok(ids
            .iter()
            .filter(|id| self.state.document_types.contains_key(*id))
            .count())
    }

    fn insert_pending_documents(
        &mut self,
        employee_id: &EmployeeId,
        types: &DocumentTypeSelection,
    ) -> Result<usize, StoreError> {
        if !self.state.employees.contains_key(employee_id) {
            return Err(StoreError::ForeignKeyViolation(
                "documents_employee_id_fkey".to_string(),
            ));
        }

        let mut created = 0;
        for document_type_id in types.iter() {
            if !self.state.document_types.contains_key(document_type_id) {
                return Err(StoreError::ForeignKeyViolation(
                    "documents_document_type_id_fkey".to_string(),
                ));
            }
            if self.pair_exists(employee_id, document_type_id) {
                continue;
            }
            let record = DocumentRecord::pending(employee_id.clone(), document_type_id.clone());
            self.state.documents.insert(record.id.clone(), record);
            created += 1;
        }
        Ok(created)
    }

    fn documents_for(
        &mut self,
        employee_id: &EmployeeId,
        types: &DocumentTypeSelection,
    ) -> Result<Vec<DocumentRecord>, StoreError> {
        let mut records: Vec<DocumentRecord> =
            self.matching(employee_id, types).cloned().collect();
        records.sort_by(|left, right| left.document_type_id.cmp(&right.document_type_id));
        Ok(records)
    }

    fn delete_documents(
        &mut self,
        employee_id: &EmployeeId,
        types: &DocumentTypeSelection,
    ) -> Result<usize, StoreError> {
        let doomed: Vec<DocumentId> = self
            .matching(employee_id, types)
            .map(|record| record.id.clone())
            .collect();
        for id in &doomed {
            self.state.documents.remove(id);
        }
        Ok(doomed.len())
    }

    fn lock_document(&mut self, id: &DocumentId) -> Result<Option<DocumentRecord>, StoreError> {
        Ok(self.state.documents.get(id).cloned())
    }

    fn mark_fulfilled(&mut self, id: &DocumentId) -> Result<(), StoreError> {
        let record = self
            .state
            .documents
            .get_mut(id)
            .ok_or(StoreError::NotFound)?;
        record.pending = false;
        Ok(())
    }

    fn list_documents(
        &mut self,
        filter: &DocumentFilter,
        page: &PageRequest,
    ) -> Result<Vec<DocumentRecord>, StoreError> {
        let offset = usize::try_from(page.offset()).unwrap_or(usize::MAX);
        Ok(self
            .state
            .documents
            .values()
            .filter(|record| filter.matches(record))
            .skip(offset)
            .take(page.size() as usize)
            .cloned()
            .collect())
    }

    fn count_documents(&mut self, filter: &DocumentFilter) -> Result<u64, StoreError> {
        Ok(self
            .state
            .documents
            .values()
            .filter(|record| filter.matches(record))
            .count() as u64)
    }

    fn employee_documents(
        &mut self,
        employee_id: &EmployeeId,
    ) -> Result<Vec<(DocumentRecord, DocumentType)>, StoreError> {
        let mut joined: Vec<(DocumentRecord, DocumentType)> = self
            .state
            .documents
            .values()
            .filter(|record| record.employee_id == *employee_id)
            .filter_map(|record| {
                self.state
                    .document_types
                    .get(&record.document_type_id)
                    .map(|document_type| (record.clone(), document_type.clone()))
            })
            .collect();
        joined.sort_by(|(_, left), (_, right)| left.name.cmp(&right.name));
        Ok(joined)
    }
}
