use super::common::*;
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

use crate::config::DocumentsConfig;
use crate::documents::sink::MemorySink;
use crate::documents::{document_router, DocumentApi};

const BOUNDARY: &str = "staffdocs-boundary";

fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(serde_json::to_vec(&body).expect("serialize body")))
        .expect("request builds")
}

fn upload_request(document_id: &str, content_type: &str, bytes: &[u8]) -> Request<Body> {
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"teste.pdf\"\r\nContent-Type: {content_type}\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

    Request::post(format!("/api/v1/documents/{document_id}/upload"))
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .expect("request builds")
}

fn memory_router() -> axum::Router {
    router_for(seeded_store(), Arc::new(MemorySink::new()))
}

fn limited_router(max_upload_bytes: usize) -> axum::Router {
    let settings = DocumentsConfig {
        max_upload_bytes,
        ..DocumentsConfig::default()
    };
    document_router(Arc::new(DocumentApi::new(
        seeded_store(),
        Arc::new(MemorySink::new()),
        settings,
    )))
}

async fn associate(router: &axum::Router, types: &[&str]) -> Value {
    let response = router
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/v1/documents/associate",
            json!({ "employeeId": EMPLOYEE, "documentTypeIds": types }),
        ))
        .await
        .expect("router responds");
    assert_eq!(response.status(), StatusCode::CREATED);
    read_json_body(response).await
}

#[tokio::test]
async fn associate_route_returns_the_records() {
    let router = memory_router();

    let records = associate(&router, &[CPF]).await;

    assert_eq!(records.as_array().map(Vec::len), Some(1));
    assert_eq!(records[0]["employeeId"], EMPLOYEE);
    assert_eq!(records[0]["documentTypeId"], CPF);
    assert_eq!(records[0]["pending"], true);
}

#[tokio::test]
async fn associate_route_reports_every_field_problem() {
    let router = memory_router();

    let response = router
        .oneshot(json_request(
            "POST",
            "/api/v1/documents/associate",
            json!({ "employeeId": "", "documentTypeIds": [] }),
        ))
        .await
        .expect("router responds");

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = read_json_body(response).await;
    assert_eq!(body["details"].as_array().map(Vec::len), Some(2));
}

#[tokio::test]
async fn associate_route_maps_missing_employee_to_not_found() {
    let router = memory_router();

    let response = router
        .oneshot(json_request(
            "POST",
            "/api/v1/documents/associate",
            json!({ "employeeId": "ghost", "documentTypeIds": [CPF] }),
        ))
        .await
        .expect("router responds");

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = read_json_body(response).await;
    assert!(body["error"]
        .as_str()
        .is_some_and(|message| message.contains("ghost")));
}

#[tokio::test]
async fn disassociate_route_returns_no_content() {
    let router = memory_router();
    associate(&router, &[CPF]).await;

    let response = router
        .clone()
        .oneshot(json_request(
            "DELETE",
            "/api/v1/documents/disassociate",
            json!({ "employeeId": EMPLOYEE, "documentTypeIds": [CPF] }),
        ))
        .await
        .expect("router responds");
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let listing = router
        .oneshot(
            Request::get(format!("/api/v1/documents?employee={EMPLOYEE}"))
                .body(Body::empty())
                .expect("request builds"),
        )
        .await
        .expect("router responds");
    let body = read_json_body(listing).await;
    assert_eq!(body["meta"]["total"], 0);
}

#[tokio::test]
async fn upload_route_fulfils_once_then_conflicts() {
    let router = memory_router();
    let records = associate(&router, &[CPF]).await;
    let id = records[0]["id"].as_str().expect("record id").to_string();

    let first = router
        .clone()
        .oneshot(upload_request(&id, "application/pdf", b"%PDF-1.4"))
        .await
        .expect("router responds");
    assert_eq!(first.status(), StatusCode::CREATED);
    assert_eq!(read_json_body(first).await["pending"], false);

    let second = router
        .oneshot(upload_request(&id, "application/pdf", b"%PDF-1.4"))
        .await
        .expect("router responds");
    assert_eq!(second.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn upload_route_rejects_non_pdf_files() {
    let router = memory_router();
    let records = associate(&router, &[CPF]).await;
    let id = records[0]["id"].as_str().expect("record id").to_string();

    let response = router
        .oneshot(upload_request(&id, "image/png", b"\x89PNG"))
        .await
        .expect("router responds");

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn upload_route_enforces_the_size_limit() {
    let router = limited_router(10);
    let records = associate(&router, &[CPF, RG]).await;
    let id_of = |type_id: &str| {
        records
            .as_array()
            .and_then(|records| {
                records
                    .iter()
                    .find(|record| record["documentTypeId"] == type_id)
            })
            .and_then(|record| record["id"].as_str())
            .expect("record id")
            .to_string()
    };
    let (cpf, rg) = (id_of(CPF), id_of(RG));

    let at_limit = router
        .clone()
        .oneshot(upload_request(&cpf, "application/pdf", &[b'x'; 10]))
        .await
        .expect("router responds");
    assert_eq!(at_limit.status(), StatusCode::CREATED);

    let one_over = router
        .clone()
        .oneshot(upload_request(&rg, "application/pdf", &[b'x'; 11]))
        .await
        .expect("router responds");
    assert_eq!(one_over.status(), StatusCode::BAD_REQUEST);
    let body = read_json_body(one_over).await;
    assert_eq!(body["details"], json!(["file must be at most 10 bytes"]));

    let oversized_body = router
        .oneshot(upload_request(&rg, "application/pdf", &vec![b'x'; 200_000]))
        .await
        .expect("router responds");
    assert_eq!(oversized_body.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn upload_route_maps_unknown_record_to_not_found() {
    let router = memory_router();

    let response = router
        .oneshot(upload_request("missing", "application/pdf", b"%PDF-1.4"))
        .await
        .expect("router responds");

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn list_route_filters_and_paginates() {
    let router = memory_router();
    associate(&router, &[CPF, RG]).await;

    let response = router
        .clone()
        .oneshot(
            Request::get(format!(
                "/api/v1/documents?employee={EMPLOYEE}&type={RG}&pending=true&page=1"
            ))
            .body(Body::empty())
            .expect("request builds"),
        )
        .await
        .expect("router responds");
    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json_body(response).await;
    assert_eq!(body["meta"], json!({ "page": 1, "total": 1 }));
    assert_eq!(body["data"][0]["documentTypeId"], RG);

    let page_zero = router
        .oneshot(
            Request::get("/api/v1/documents?page=0")
                .body(Body::empty())
                .expect("request builds"),
        )
        .await
        .expect("router responds");
    assert_eq!(page_zero.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn registry_routes_create_and_guard_document_types() {
    let router = memory_router();

    let created = router
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/v1/document-types",
            json!({ "name": "Carteira de Trabalho" }),
        ))
        .await
        .expect("router responds");
    assert_eq!(created.status(), StatusCode::CREATED);

    let duplicate = router
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/v1/document-types",
            json!({ "name": "Carteira de Trabalho" }),
        ))
        .await
        .expect("router responds");
    assert_eq!(duplicate.status(), StatusCode::CONFLICT);

    associate(&router, &[CPF]).await;
    let in_use = router
        .oneshot(
            Request::delete(format!("/api/v1/document-types/{CPF}"))
                .body(Body::empty())
                .expect("request builds"),
        )
        .await
        .expect("router responds");
    assert_eq!(in_use.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn employee_routes_register_and_report_status() {
    let router = memory_router();

    let registered = router
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/v1/employees",
            json!({ "name": "Pietra", "hiredAt": "2024-01-15" }),
        ))
        .await
        .expect("router responds");
    assert_eq!(registered.status(), StatusCode::CREATED);
    let employee = read_json_body(registered).await;
    let id = employee["id"].as_str().expect("employee id").to_string();

    let status = router
        .oneshot(
            Request::get(format!("/api/v1/employees/{id}/documentation-status"))
                .body(Body::empty())
                .expect("request builds"),
        )
        .await
        .expect("router responds");
    assert_eq!(status.status(), StatusCode::OK);
    let body = read_json_body(status).await;
    assert_eq!(body["employee"]["name"], "Pietra");
    assert_eq!(body["pending"], 0);
}

#[tokio::test]
async fn unavailable_store_maps_to_internal_error() {
    let router = router_for(Arc::new(UnavailableStore), Arc::new(MemorySink::new()));

    let response = router
        .oneshot(
            Request::get("/api/v1/documents")
                .body(Body::empty())
                .expect("request builds"),
        )
        .await
        .expect("router responds");

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}
