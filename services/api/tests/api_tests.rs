use std::path::Path;
use std::sync::Arc;

use api::{router, AppState};
use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use dataset::store::SqliteStore;
use serde_json::{json, Value};
use tower::ServiceExt;

const BOUNDARY: &str = "relatorios-test-boundary";
const LATIN1_CSV: &[u8] = b"CNES;Munic\xedpio;Nome Fantaia\r\n2345;Recife;Posto A\r\n6789;Olinda;Posto B\r\n";

async fn app() -> Router {
    app_with_static(None).await
}

async fn app_with_static(static_dir: Option<&Path>) -> Router {
    build_app(static_dir, 1024 * 1024).await
}

async fn build_app(static_dir: Option<&Path>, max_upload_bytes: usize) -> Router {
    let store = SqliteStore::in_memory().await.unwrap();
    router(AppState::new(Arc::new(store)), static_dir, max_upload_bytes)
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into()))
    };
    (status, body)
}

fn json_request(method: Method, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn upload(uri: &str, file: Option<&[u8]>, fields: &[(&str, &str)]) -> Request<Body> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
    }
    if let Some(file) = file {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"dados.csv\"\r\nContent-Type: text/csv\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(file);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

async fn save_two_rows(app: &Router) {
    let (status, body) = send(
        app,
        json_request(
            Method::POST,
            "/api/reports/save",
            json!({"rows": [
                {"__id": "row-a", "Município": "Recife", "cnes": "2345", "extra": "x"},
                {"__id": "row-b", "Município": "Olinda", "cnes": "6789"}
            ]}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["message"], "Salvo 2 linha(s) em dados_filtrados.");
}

#[tokio::test]
async fn test_health() {
    let app = app().await;
    let (status, body) = send(&app, get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ok"], true);
}

#[tokio::test]
async fn test_upload_latin1_semicolon_csv() {
    let app = app().await;
    let (status, body) = send(&app, upload("/api/upload-csv", Some(LATIN1_CSV), &[])).await;

    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["total"], 2);
    assert_eq!(body["columns"], json!(["municipio", "cnes", "nome_fantasia"]));
    assert_eq!(body["rows"][0]["municipio"], "Recife");
    assert_eq!(body["rows"][1]["nome_fantasia"], "Posto B");
}

#[tokio::test]
async fn test_upload_column_options() {
    let app = app().await;

    let (status, body) = send(
        &app,
        upload("/api/upload-csv?only_pertinentes=false", Some(b"CNES,Outra\n1,a\n"), &[]),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["columns"], json!(["cnes", "outra"]));

    let (status, body) = send(
        &app,
        upload(
            "/api/upload-csv",
            Some(LATIN1_CSV),
            &[("columns", r#"["nome_fantasia", "inexistente"]"#)],
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["columns"], json!(["nome_fantasia"]));
    assert_eq!(body["total"], 2);
}

#[tokio::test]
async fn test_upload_form_fields_override_query() {
    let app = app().await;
    let (status, body) = send(
        &app,
        upload(
            "/api/upload-csv?only_pertinentes=false",
            Some(b"CNES;Outra;Municipio\n1;a;Recife\n"),
            &[("only_pertinentes", "true")],
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["columns"], json!(["municipio", "cnes"]));
}

#[tokio::test]
async fn test_upload_rows_follow_column_order() {
    let app = app().await;
    let request = upload(
        "/api/upload-csv",
        Some(LATIN1_CSV),
        &[("columns", r#"["nome_fantasia", "cnes"]"#)],
    );
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(
        text.contains(r#"{"nome_fantasia":"Posto A","cnes":"2345"}"#),
        "{text}"
    );
}

#[tokio::test]
async fn test_upload_over_limit_is_rejected() {
    let app = build_app(None, 1024).await;
    let mut csv = b"cnes;municipio\n".to_vec();
    for i in 0..500 {
        csv.extend_from_slice(format!("{i};Cidade {i}\n").as_bytes());
    }

    let (status, body) = send(&app, upload("/api/upload-csv", Some(&csv), &[])).await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert!(body["detail"].is_string());
}

#[tokio::test]
async fn test_save_over_limit_is_rejected() {
    let app = build_app(None, 1024).await;
    let rows: Vec<Value> = (0..200)
        .map(|i| json!({"cnes": i.to_string(), "municipio": "Recife"}))
        .collect();

    let (status, body) = send(
        &app,
        json_request(Method::POST, "/api/reports/save", json!({ "rows": rows })),
    )
    .await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert!(body["detail"].is_string());
}

#[tokio::test]
async fn test_upload_errors() {
    let app = app().await;

    let (status, body) = send(&app, upload("/api/upload-csv", Some(b"foo;bar\n1;2\n"), &[])).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["detail"], "Nenhuma coluna reconhecida no CSV.");

    let (status, body) = send(&app, upload("/api/upload-csv", Some(b""), &[])).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["detail"]
        .as_str()
        .unwrap()
        .starts_with("Erro ao processar CSV: "));

    let (status, _) = send(&app, upload("/api/upload-csv", None, &[])).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &app,
        upload("/api/upload-csv", Some(LATIN1_CSV), &[("columns", "[oops")]),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_read_before_save_is_empty() {
    let app = app().await;
    let (status, body) = send(&app, get("/api/reports/data")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 0);
    assert_eq!(body["rows"], json!([]));
    assert_eq!(body["page"], 1);
    assert_eq!(body["page_size"], 50);
    assert_eq!(body["version"], 0);
}

#[tokio::test]
async fn test_save_then_read() {
    let app = app().await;
    save_two_rows(&app).await;

    let (status, body) = send(&app, get("/api/reports/data")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 2);
    assert_eq!(body["columns"], json!(["municipio", "cnes", "__id"]));
    assert_eq!(
        body["rows"][0],
        json!({"municipio": "Recife", "cnes": "2345", "__id": "row-a"})
    );
    assert!(body["version"].as_i64().unwrap() > 0);

    let (_, version) = send(&app, get("/api/reports/version")).await;
    assert_eq!(version["version"], body["version"]);
}

#[tokio::test]
async fn test_second_page() {
    let app = app().await;
    save_two_rows(&app).await;

    let (status, body) = send(&app, get("/api/reports/data?page=2&page_size=1")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 2);
    assert_eq!(body["rows"].as_array().unwrap().len(), 1);
    assert_eq!(body["rows"][0]["__id"], "row-b");
}

#[tokio::test]
async fn test_pagination_bounds() {
    let app = app().await;
    for uri in [
        "/api/reports/data?page=0",
        "/api/reports/data?page_size=0",
        "/api/reports/data?page_size=501",
        "/api/reports/data?page=abc",
    ] {
        let (status, body) = send(&app, get(uri)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
        assert!(body["detail"].is_string(), "{uri}");
    }
}

#[tokio::test]
async fn test_save_empty_rows() {
    let app = app().await;
    let (status, body) = send(
        &app,
        json_request(Method::POST, "/api/reports/save", json!({"rows": []})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["detail"], "Sem linhas para salvar.");
}

#[tokio::test]
async fn test_save_duplicate_ids() {
    let app = app().await;
    let (status, body) = send(
        &app,
        json_request(
            Method::POST,
            "/api/reports/save",
            json!({"rows": [{"__id": "a", "cnes": "1"}, {"__id": "a", "cnes": "2"}]}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["detail"], "ID duplicado: a");
}

#[tokio::test]
async fn test_patch_row() {
    let app = app().await;
    save_two_rows(&app).await;
    let (_, before) = send(&app, get("/api/reports/version")).await;

    let (status, body) = send(
        &app,
        json_request(
            Method::PATCH,
            "/api/reports/row",
            json!({"id": "row-b", "changes": {"municipio": "Paulista", "foo": "bar"}}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body, json!({"ok": true}));

    let (_, data) = send(&app, get("/api/reports/data")).await;
    assert_eq!(data["rows"][1]["municipio"], "Paulista");
    assert_eq!(data["rows"][0]["municipio"], "Recife");
    assert!(data["version"].as_i64().unwrap() > before["version"].as_i64().unwrap());
}

#[tokio::test]
async fn test_patch_row_errors() {
    let app = app().await;
    save_two_rows(&app).await;

    let (status, body) = send(
        &app,
        json_request(
            Method::PATCH,
            "/api/reports/row",
            json!({"id": "row-a", "changes": {"foo": "bar"}}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["detail"], "Nada para atualizar.");

    let (status, body) = send(
        &app,
        json_request(
            Method::PATCH,
            "/api/reports/row",
            json!({"id": "  ", "changes": {"cnes": "1"}}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["detail"], "ID ausente.");

    let (status, body) = send(
        &app,
        json_request(
            Method::PATCH,
            "/api/reports/row",
            json!({"id": "missing", "changes": {"cnes": "1"}}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["detail"], "Linha não encontrada.");
}

#[tokio::test]
async fn test_replace_data() {
    let app = app().await;
    save_two_rows(&app).await;

    let (status, body) = send(
        &app,
        json_request(
            Method::PUT,
            "/api/reports/data",
            json!({"rows": [{"nome_fantaia": "Posto C", "cnes": 42}]}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["message"], "Atualizado com 1 linha(s).");

    let (_, data) = send(&app, get("/api/reports/data")).await;
    assert_eq!(data["total"], 1);
    assert_eq!(data["columns"], json!(["cnes", "nome_fantasia", "__id"]));
    assert_eq!(data["rows"][0]["cnes"], "42");
    assert_eq!(data["rows"][0]["nome_fantasia"], "Posto C");
    assert!(data["rows"][0]["__id"].as_str().is_some_and(|id| !id.is_empty()));
}

#[tokio::test]
async fn test_static_fallback() {
    let dir = std::env::temp_dir().join(format!("relatorios-static-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("index.html"), "<h1>relatorios</h1>").unwrap();

    let app = app_with_static(Some(&dir)).await;
    let response = app.clone().oneshot(get("/")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&bytes[..], b"<h1>relatorios</h1>");

    let (status, _) = send(&app, get("/health")).await;
    assert_eq!(status, StatusCode::OK);

    std::fs::remove_dir_all(&dir).ok();
}
