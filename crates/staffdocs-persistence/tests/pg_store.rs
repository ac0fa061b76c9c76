//! Runs against a live database only when `DATABASE_URL` is set.

use std::sync::{mpsc, Arc, OnceLock};
use std::thread;
use std::time::{Duration, Instant};

use chrono::NaiveDate;
use staffdocs::config::DatabaseConfig;
use staffdocs::documents::{
    confirm_targets, DocumentFilter, DocumentLifecycle, DocumentStore, DocumentType,
    DocumentTypeId, DocumentTypeSelection, Employee, EmployeeId, ExistenceError, FilePayload,
    MemorySink, PageRequest, RegistryError, StaffRegistry, StoreError,
};
use staffdocs::error::{Classify, ErrorKind};
use staffdocs_persistence::PgDocumentStore;

fn store() -> Option<Arc<PgDocumentStore>> {
    static STORE: OnceLock<Option<Arc<PgDocumentStore>>> = OnceLock::new();
    STORE
        .get_or_init(|| {
            dotenvy::dotenv().ok();
            let config = DatabaseConfig::from_env().ok()?;
            match PgDocumentStore::connect(&config) {
                Ok(store) => Some(Arc::new(store)),
                Err(err) => {
                    eprintln!("could not build test pool: {err}");
                    None
                }
            }
        })
        .clone()
}

fn unique(prefix: &str) -> String {
    format!("{prefix}-{}", uuid::Uuid::new_v4())
}

/// Insert one employee and two types with fresh ids so tests never collide.
fn seed(store: &PgDocumentStore) -> (EmployeeId, Vec<DocumentTypeId>) {
    let employee = Employee {
        id: EmployeeId::new(unique("emp")),
        name: "Jackson".to_string(),
        hired_at: NaiveDate::from_ymd_opt(2023, 7, 12).expect("valid date"),
    };
    let types: Vec<DocumentType> = ["cpf", "rg"]
        .iter()
        .map(|name| {
            let id = unique(name);
            DocumentType {
                id: DocumentTypeId::new(id.clone()),
                name: id,
            }
        })
        .collect();

    store
        .transaction(|tx| {
            tx.insert_employee(&employee)?;
            for document_type in &types {
                tx.insert_document_type(document_type)?;
            }
            Ok::<_, StoreError>(())
        })
        .expect("seed commits");

    (employee.id, types.into_iter().map(|t| t.id).collect())
}

fn selection(ids: &[DocumentTypeId]) -> DocumentTypeSelection {
    DocumentTypeSelection::new(ids.iter().cloned()).expect("valid selection")
}

#[test]
fn association_is_idempotent() {
    let Some(store) = store() else {
        eprintln!("skip (no DATABASE_URL)");
        return;
    };
    let (employee_id, types) = seed(&store);
    let lifecycle = DocumentLifecycle::new(store.clone(), Arc::new(MemorySink::new()));

    let first = lifecycle
        .associate(&employee_id, &selection(&types))
        .expect("first association");
    let second = lifecycle
        .associate(&employee_id, &selection(&types))
        .expect("second association");

    assert_eq!(first, second);
    let page = lifecycle
        .list(&DocumentFilter::for_employee(employee_id), PageRequest::first())
        .expect("listing succeeds");
    assert_eq!(page.meta.total, 2);
    assert!(page.data.iter().all(|record| record.pending));
}

#[test]
fn failed_work_rolls_back() {
    let Some(store) = store() else {
        eprintln!("skip (no DATABASE_URL)");
        return;
    };
    let (employee_id, types) = seed(&store);

    let result: Result<usize, StoreError> = store.transaction(|tx| {
        tx.insert_pending_documents(&employee_id, &selection(&types))?;
        Err(StoreError::Aborted("caller gave up".to_string()))
    });
    assert!(result.is_err());

    let count = store
        .transaction(|tx| tx.count_documents(&DocumentFilter::for_employee(employee_id.clone())))
        .expect("count succeeds");
    assert_eq!(count, 0);
}

#[test]
fn concurrent_uploads_have_exactly_one_winner() {
    let Some(store) = store() else {
        eprintln!("skip (no DATABASE_URL)");
        return;
    };
    let (employee_id, types) = seed(&store);
    let sink = Arc::new(MemorySink::new());
    let lifecycle = DocumentLifecycle::new(store.clone(), sink.clone());
    let id = lifecycle
        .associate(&employee_id, &selection(&types[..1]))
        .expect("association")[0]
        .id
        .clone();
    let payload = FilePayload::pdf("cpf.pdf", b"%PDF-1.4".to_vec());

    let outcomes: Vec<_> = thread::scope(|scope| {
        let racers: Vec<_> = (0..2)
            .map(|_| scope.spawn(|| lifecycle.upload(&id, &payload)))
            .collect();
        racers
            .into_iter()
            .map(|racer| racer.join().expect("upload thread"))
            .collect()
    });

    let winners = outcomes.iter().filter(|outcome| outcome.is_ok()).count();
    let conflicts = outcomes
        .iter()
        .filter(|outcome| matches!(outcome, Err(err) if err.kind() == ErrorKind::Conflict))
        .count();
    assert_eq!((winners, conflicts), (1, 1));
    assert_eq!(sink.len(), 1);
}

#[test]
fn constraint_failures_surface_as_conflicts() {
    let Some(store) = store() else {
        eprintln!("skip (no DATABASE_URL)");
        return;
    };
    let (employee_id, types) = seed(&store);
    let lifecycle = DocumentLifecycle::new(store.clone(), Arc::new(MemorySink::new()));
    let registry = StaffRegistry::new(store.clone());
    lifecycle
        .associate(&employee_id, &selection(&types[..1]))
        .expect("association");

    let in_use = registry
        .remove_document_type(&types[0])
        .expect_err("referenced type");
    assert!(matches!(in_use, RegistryError::DocumentTypeInUse(_)));

    let duplicate = store.transaction(|tx| {
        tx.insert_document_type(&DocumentType {
            id: DocumentTypeId::new(unique("dup")),
            name: types[1].as_str().to_string(),
        })
    });
    assert!(matches!(duplicate, Err(StoreError::UniqueViolation(_))));
    assert_eq!(
        duplicate.map_err(|err| err.kind()),
        Err(ErrorKind::Conflict)
    );

    registry
        .remove_document_type(&types[1])
        .expect("unreferenced type removed");
}

#[test]
fn validated_type_cannot_be_removed_before_the_association_commits() {
    let Some(store) = store() else {
        eprintln!("skip (no DATABASE_URL)");
        return;
    };
    let (employee_id, types) = seed(&store);
    let target = selection(&types[..1]);
    let registry = StaffRegistry::new(store.clone());
    let (validated_tx, validated_rx) = mpsc::channel();

    let (associated, removal, removal_done) = thread::scope(|scope| {
        let associate = scope.spawn(move || {
            store.transaction(|tx| {
                confirm_targets(tx, &employee_id, &target)?;
                validated_tx.send(()).expect("remover listening");
                thread::sleep(Duration::from_millis(300));
                let created = tx.insert_pending_documents(&employee_id, &target)?;
                Ok::<_, ExistenceError>((created, Instant::now()))
            })
        });
        let remove = scope.spawn(move || {
            validated_rx.recv().expect("validation signal");
            let outcome = registry.remove_document_type(&types[0]);
            (outcome, Instant::now())
        });
        let associated = associate.join().expect("associate thread");
        let (removal, removal_done) = remove.join().expect("remove thread");
        (associated, removal, removal_done)
    });

    let (created, work_done) = associated.expect("association commits");
    assert_eq!(created, 1);
    assert!(removal_done >= work_done, "removal finished before the association");
    assert!(matches!(removal, Err(RegistryError::DocumentTypeInUse(_))));
}
