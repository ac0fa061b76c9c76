use chrono::NaiveDate;
use diesel::prelude::*;
use staffdocs::documents::{
    DocumentId, DocumentRecord, DocumentType, DocumentTypeId, Employee, EmployeeId,
};

use crate::schema::{document_types, documents, employees};

#[derive(Debug, Queryable, Selectable, Insertable)]
#[diesel(table_name = employees)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(super) struct EmployeeRow {
    pub id: String,
    pub name: String,
    pub hired_at: NaiveDate,
}

#[derive(Debug, Queryable, Selectable, Insertable)]
#[diesel(table_name = document_types)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(super) struct DocumentTypeRow {
    pub id: String,
    pub name: String,
}

/// Column order matches the table so unselected loads map too.
#[derive(Debug, Queryable, Selectable, Insertable)]
#[diesel(table_name = documents)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(super) struct DocumentRow {
    pub id: String,
    pub employee_id: String,
    pub document_type_id: String,
    pub pending: bool,
}

impl From<EmployeeRow> for Employee {
    fn from(row: EmployeeRow) -> Self {
        Employee {
            id: EmployeeId(row.id),
            name: row.name,
            hired_at: row.hired_at,
        }
    }
}

impl From<&Employee> for EmployeeRow {
    fn from(employee: &Employee) -> Self {
        EmployeeRow {
            id: employee.id.as_str().to_string(),
            name: employee.name.clone(),
            hired_at: employee.hired_at,
        }
    }
}

impl From<DocumentTypeRow> for DocumentType {
    fn from(row: DocumentTypeRow) -> Self {
        DocumentType {
            id: DocumentTypeId(row.id),
            name: row.name,
        }
    }
}

impl From<&DocumentType> for DocumentTypeRow {
    fn from(document_type: &DocumentType) -> Self {
        DocumentTypeRow {
            id: document_type.id.as_str().to_string(),
            name: document_type.name.clone(),
        }
    }
}

impl From<DocumentRow> for DocumentRecord {
    fn from(row: DocumentRow) -> Self {
        DocumentRecord {
            id: DocumentId(row.id),
            employee_id: EmployeeId(row.employee_id),
            document_type_id: DocumentTypeId(row.document_type_id),
            pending: row.pending,
        }
    }
}

impl From<&DocumentRecord> for DocumentRow {
    fn from(record: &DocumentRecord) -> Self {
        DocumentRow {
            id: record.id.as_str().to_string(),
            employee_id: record.employee_id.as_str().to_string(),
            document_type_id: record.document_type_id.as_str().to_string(),
            pending: record.pending,
        }
    }
}
