use chrono::NaiveDate;
use clap::Args;
use serde::Serialize;
use staffdocs::documents::{
    DocumentFilter, DocumentLifecycle, DocumentPage, DocumentRecord, DocumentTypeSelection,
    EmployeeId, FilePayload, InMemoryStore, MemorySink, NewDocumentType, NewEmployee, PageRequest,
    StaffRegistry,
};
use staffdocs::error::AppError;
use std::sync::Arc;

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Print each step's records as JSON instead of a table.
    #[arg(long)]
    pub(crate) json: bool,
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let store = Arc::new(InMemoryStore::new());
    let sink = Arc::new(MemorySink::new());
    let registry = StaffRegistry::new(store.clone());
    let lifecycle = DocumentLifecycle::new(store, sink.clone());

    println!("Employee document demo (in-memory store)");

    let hired_at = NaiveDate::from_ymd_opt(2023, 7, 12).unwrap_or_default();
    let employee = registry
        .register_employee(NewEmployee {
            name: "Jackson".to_string(),
            hired_at,
        })
        .map_err(AppError::operation)?;
    let cpf = registry
        .create_document_type(NewDocumentType {
            name: "CPF".to_string(),
        })
        .map_err(AppError::operation)?;
    let rg = registry
        .create_document_type(NewDocumentType {
            name: "RG".to_string(),
        })
        .map_err(AppError::operation)?;
    println!(
        "  Registered {} ({}) with document types {} and {}",
        employee.name, employee.id, cpf.name, rg.name
    );

    let both = DocumentTypeSelection::new([cpf.id.clone(), rg.id.clone()])
        .map_err(AppError::operation)?;
    let only_cpf =
        DocumentTypeSelection::new([cpf.id.clone()]).map_err(AppError::operation)?;

    println!("\n1. Associate {} with CPF and RG", employee.name);
    let records = lifecycle
        .associate(&employee.id, &both)
        .map_err(AppError::operation)?;
    render(&args, &records);

    println!("\n2. Associate again (no duplicates are created)");
    let records = lifecycle
        .associate(&employee.id, &both)
        .map_err(AppError::operation)?;
    render(&args, &records);

    let cpf_record = records
        .iter()
        .find(|record| record.document_type_id == cpf.id)
        .map(|record| record.id.clone());
    if let Some(document_id) = cpf_record {
        println!("\n3. Upload a PDF for the CPF record");
        let payload = FilePayload::pdf("cpf.pdf", b"%PDF-1.4 demo".to_vec());
        let fulfilled = lifecycle
            .upload(&document_id, &payload)
            .map_err(AppError::operation)?;
        render(&args, std::slice::from_ref(&fulfilled));
        println!("   Files held by the sink: {}", sink.len());

        println!("\n4. Upload the same record again");
        match lifecycle.upload(&document_id, &payload) {
            Ok(_) => println!("   Unexpectedly accepted a second upload"),
            Err(err) => println!("   Rejected: {err}"),
        }
    }

    println!("\n5. Associate an unknown employee");
    match lifecycle.associate(&EmployeeId::new("ghost"), &only_cpf) {
        Ok(_) => println!("   Unexpectedly accepted"),
        Err(err) => println!("   Rejected: {err}"),
    }

    println!("\n6. Disassociate CPF, then list what remains");
    lifecycle
        .disassociate(&employee.id, &only_cpf)
        .map_err(AppError::operation)?;
    let page = lifecycle
        .list(
            &DocumentFilter::for_employee(employee.id.clone()),
            PageRequest::first(),
        )
        .map_err(AppError::operation)?;
    render_page(&args, &page);

    let status = registry
        .documentation_status(&employee.id)
        .map_err(AppError::operation)?;
    println!(
        "\nDocumentation status for {}: {} pending, {} fulfilled",
        status.employee.name, status.pending, status.fulfilled
    );

    Ok(())
}

fn render(args: &DemoArgs, records: &[DocumentRecord]) {
    if args.json {
        print_json(records);
        return;
    }
    for record in records {
        println!(
            "   {:<36}  type={:<36}  {}",
            record.id,
            record.document_type_id,
            record.state().label()
        );
    }
}

fn render_page(args: &DemoArgs, page: &DocumentPage) {
    if args.json {
        print_json(page);
        return;
    }
    println!("   page {} of {} total record(s)", page.meta.page, page.meta.total);
    render(args, &page.data);
}

fn print_json<T: Serialize + ?Sized>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{json}"),
        Err(err) => println!("   (unable to render JSON: {err})"),
    }
}
