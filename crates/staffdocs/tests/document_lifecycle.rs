use std::sync::Arc;

use chrono::NaiveDate;
use staffdocs::documents::{
    DocumentFilter, DocumentLifecycle, DocumentServiceError, DocumentType, DocumentTypeSelection,
    Employee, EmployeeId, ExistenceError, FilePayload, InMemoryStore, MemorySink,
    NewDocumentType, NewEmployee, PageRequest, StaffRegistry,
};
use staffdocs::error::{Classify, ErrorKind};

struct Harness {
    registry: StaffRegistry<InMemoryStore>,
    lifecycle: DocumentLifecycle<InMemoryStore, MemorySink>,
    sink: Arc<MemorySink>,
}

fn harness() -> Harness {
    let store = Arc::new(InMemoryStore::new());
    let sink = Arc::new(MemorySink::new());
    Harness {
        registry: StaffRegistry::new(store.clone()),
        lifecycle: DocumentLifecycle::new(store, sink.clone()),
        sink,
    }
}

fn onboard(harness: &Harness) -> (Employee, Vec<DocumentType>) {
    let employee = harness
        .registry
        .register_employee(NewEmployee {
            name: "Jackson".to_string(),
            hired_at: NaiveDate::from_ymd_opt(2023, 7, 12).expect("valid date"),
        })
        .expect("employee registered");
    let types = ["CPF", "RG"]
        .into_iter()
        .map(|name| {
            harness
                .registry
                .create_document_type(NewDocumentType {
                    name: name.to_string(),
                })
                .expect("type created")
        })
        .collect();
    (employee, types)
}

fn select(types: &[&DocumentType]) -> DocumentTypeSelection {
    DocumentTypeSelection::new(types.iter().map(|document_type| document_type.id.clone()))
        .expect("valid selection")
}

#[test]
fn association_through_upload_lifecycle() {
    let harness = harness();
    let (employee, types) = onboard(&harness);
    let (cpf, rg) = (&types[0], &types[1]);

    let records = harness
        .lifecycle
        .associate(&employee.id, &select(&[cpf]))
        .expect("association succeeds");
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].employee_id, employee.id);
    assert_eq!(records[0].document_type_id, cpf.id);
    assert!(records[0].pending);

    let again = harness
        .lifecycle
        .associate(&employee.id, &select(&[cpf, rg]))
        .expect("association succeeds");
    assert_eq!(again.len(), 2);

    let fulfilled = harness
        .lifecycle
        .upload(&records[0].id, &FilePayload::pdf("cpf.pdf", b"%PDF-1.4".to_vec()))
        .expect("upload succeeds");
    assert!(!fulfilled.pending);
    assert_eq!(harness.sink.len(), 1);

    let second = harness
        .lifecycle
        .upload(&records[0].id, &FilePayload::pdf("cpf.pdf", b"%PDF-1.4".to_vec()))
        .expect_err("second upload conflicts");
    assert_eq!(second.kind(), ErrorKind::Conflict);

    let status = harness
        .registry
        .documentation_status(&employee.id)
        .expect("status available");
    assert_eq!((status.pending, status.fulfilled), (1, 1));
}

#[test]
fn unknown_employee_is_named_in_the_error() {
    let harness = harness();
    let (_, types) = onboard(&harness);

    let err = harness
        .lifecycle
        .associate(&EmployeeId::new("ghost"), &select(&[&types[0]]))
        .expect_err("ghost employee");

    assert!(matches!(
        &err,
        DocumentServiceError::Existence(ExistenceError::EmployeeNotFound(id)) if id.as_str() == "ghost"
    ));
    assert!(err.to_string().contains("ghost"));
}

#[test]
fn disassociation_empties_the_listing() {
    let harness = harness();
    let (employee, types) = onboard(&harness);
    let selection = select(&[&types[0]]);

    harness
        .lifecycle
        .associate(&employee.id, &selection)
        .expect("association succeeds");
    harness
        .lifecycle
        .disassociate(&employee.id, &selection)
        .expect("disassociation succeeds");
    harness
        .lifecycle
        .disassociate(&employee.id, &selection)
        .expect("repeat is a no-op");

    let page = harness
        .lifecycle
        .list(&DocumentFilter::for_employee(employee.id.clone()), PageRequest::first())
        .expect("listing succeeds");
    assert!(page.data.is_empty());
    assert_eq!(page.meta.total, 0);

    harness
        .registry
        .remove_document_type(&types[0].id)
        .expect("unreferenced type can be removed");
}
