//! Wire-contract tests for `HttpBackend` against an in-process stand-in server.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    routing::{delete, get, post},
    Json, Router,
};
use serde_json::{json, Value};

use docbot_core::{
    ApiError, Backend, ChatWorkflow, DocumentStatus, DocumentWorkflow, FileUpload, HttpBackend,
    Role, Session,
};

const TOKEN: &str = "admin-token";

#[derive(Clone, Default)]
struct Server {
    files: Arc<Mutex<Vec<String>>>,
    upload_content_types: Arc<Mutex<Vec<String>>>,
}

fn authorized(headers: &HeaderMap) -> bool {
    headers.get("authorization").and_then(|v| v.to_str().ok()) == Some("Bearer admin-token")
}

fn multipart_filename(body: &str) -> Option<String> {
    let start = body.find("filename=\"")? + "filename=\"".len();
    let end = body[start..].find('"')? + start;
    Some(body[start..end].to_string())
}

async fn list_files(State(s): State<Server>, headers: HeaderMap) -> Result<Json<Value>, StatusCode> {
    if !authorized(&headers) {
        return Err(StatusCode::UNAUTHORIZED);
    }
    let files = s.files.lock().unwrap().clone();
    Ok(Json(json!({ "files": files })))
}

async fn upload(
    State(s): State<Server>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    if !authorized(&headers) {
        return Err((StatusCode::UNAUTHORIZED, Json(json!({ "detail": "Unauthorized" }))));
    }
    let content_type = headers
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    s.upload_content_types.lock().unwrap().push(content_type);

    let text = String::from_utf8_lossy(&body);
    if !text.contains("name=\"file\"") {
        return Err((StatusCode::UNPROCESSABLE_ENTITY, Json(json!({ "detail": [{ "msg": "field required" }] }))));
    }
    if !text.contains("Content-Type: application/pdf") {
        return Err((
            StatusCode::UNSUPPORTED_MEDIA_TYPE,
            Json(json!({ "detail": "Unsupported file type" })),
        ));
    }
    let name = multipart_filename(&text).unwrap_or_default();
    s.files.lock().unwrap().push(name.clone());
    Ok(Json(json!({ "message": format!("File {} processed successfully", name) })))
}

async fn delete_file(
    State(s): State<Server>,
    Path(filename): Path<String>,
    headers: HeaderMap,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    if !authorized(&headers) {
        return Err((StatusCode::UNAUTHORIZED, Json(json!({ "detail": "Unauthorized" }))));
    }
    let mut files = s.files.lock().unwrap();
    let before = files.len();
    files.retain(|f| f != &filename);
    if files.len() == before {
        return Err((StatusCode::NOT_FOUND, Json(json!({ "detail": "File not found" }))));
    }
    Ok(Json(json!({ "message": format!("File {} deleted successfully", filename) })))
}

async fn chat(headers: HeaderMap, Json(body): Json<Value>) -> Result<Json<Value>, StatusCode> {
    if !authorized(&headers) {
        return Err(StatusCode::UNAUTHORIZED);
    }
    let message = body["user_message"].as_str().unwrap_or_default().to_string();
    if message == "slow" {
        tokio::time::sleep(Duration::from_secs(3)).await;
    }
    Ok(Json(json!({ "response": format!("You asked: {}", message) })))
}

async fn fetch(State(s): State<Server>, Path(filename): Path<String>) -> Result<Vec<u8>, StatusCode> {
    if s.files.lock().unwrap().contains(&filename) {
        Ok(format!("contents of {}", filename).into_bytes())
    } else {
        Err(StatusCode::NOT_FOUND)
    }
}

async fn spawn_server(server: Server) -> String {
    let app = Router::new()
        .route("/documents/getfile", get(list_files))
        .route("/documents/upload", post(upload))
        .route("/documents/{filename}", delete(delete_file))
        .route("/chat", post(chat))
        .route("/uploads/{filename}", get(fetch))
        .with_state(server);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

fn server_with(files: &[&str]) -> Server {
    let server = Server::default();
    *server.files.lock().unwrap() = files.iter().map(|f| f.to_string()).collect();
    server
}

fn backend(url: &str) -> HttpBackend {
    HttpBackend::new(url, Duration::from_secs(2)).unwrap()
}

#[tokio::test]
async fn test_list_sends_bearer_token() {
    let url = spawn_server(server_with(&["a.pdf", "b.docx"])).await;
    let backend = backend(&url);

    assert_eq!(backend.list(TOKEN).await.unwrap(), vec!["a.pdf", "b.docx"]);

    let err = backend.list("wrong").await.unwrap_err();
    assert_eq!(err, ApiError::Status { status: 401, detail: "Unauthorized".to_string() });
}

#[tokio::test]
async fn test_upload_is_multipart_with_file_field() {
    let server = server_with(&[]);
    let url = spawn_server(server.clone()).await;
    let backend = backend(&url);

    let file = FileUpload::new("report.pdf", b"%PDF-1.4 test".to_vec()).unwrap();
    let message = backend.upload(TOKEN, &file).await.unwrap();
    assert_eq!(message, "File report.pdf processed successfully");
    assert_eq!(*server.files.lock().unwrap(), vec!["report.pdf".to_string()]);
    assert!(server.upload_content_types.lock().unwrap()[0].starts_with("multipart/form-data"));
}

#[tokio::test]
async fn test_upload_rejection_surfaces_detail() {
    let url = spawn_server(server_with(&[])).await;
    let backend = backend(&url);

    let file = FileUpload::new("sheet.xlsx", vec![0x50, 0x4b]).unwrap();
    let err = backend.upload(TOKEN, &file).await.unwrap_err();
    assert_eq!(err, ApiError::Status { status: 415, detail: "Unsupported file type".to_string() });
}

#[tokio::test]
async fn test_delete_encodes_filename_and_maps_404() {
    let server = server_with(&["q1 report.pdf"]);
    let url = spawn_server(server.clone()).await;
    let backend = backend(&url);

    backend.delete(TOKEN, "q1 report.pdf").await.unwrap();
    assert!(server.files.lock().unwrap().is_empty());

    let err = backend.delete(TOKEN, "q1 report.pdf").await.unwrap_err();
    assert!(err.is_not_found());
    assert_eq!(err, ApiError::Status { status: 404, detail: "File not found".to_string() });
}

#[tokio::test]
async fn test_chat_round_trip_and_timeout() {
    let url = spawn_server(server_with(&[])).await;
    let fast = backend(&url);
    assert_eq!(fast.chat(TOKEN, "hello").await.unwrap(), "You asked: hello");

    let impatient = HttpBackend::new(&url, Duration::from_millis(200)).unwrap();
    assert_eq!(impatient.chat(TOKEN, "slow").await.unwrap_err(), ApiError::Timeout);
}

#[tokio::test]
async fn test_download_needs_no_token() {
    let url = spawn_server(server_with(&["a.pdf"])).await;
    let backend = backend(&url);

    assert_eq!(backend.download("a.pdf").await.unwrap(), b"contents of a.pdf".to_vec());
    assert!(backend.download("missing.pdf").await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn test_unreachable_server_is_network_error() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let url = format!("http://{}", listener.local_addr().unwrap());
    drop(listener);

    let err = backend(&url).list(TOKEN).await.unwrap_err();
    assert!(matches!(err, ApiError::Network(_)), "got {:?}", err);
}

#[tokio::test]
async fn test_workflows_over_http() {
    let url = spawn_server(server_with(&["seed.pdf"])).await;
    let backend = backend(&url);
    let session = Session::new(TOKEN, Role::Admin).unwrap();

    let mut docs = DocumentWorkflow::new();
    docs.refresh(&backend, Some(&session)).await.unwrap();
    assert_eq!(docs.files(), ["seed.pdf"]);

    docs.select_file(FileUpload::new("new.pdf", b"%PDF".to_vec()).unwrap());
    docs.upload(&backend, Some(&session)).await.unwrap();
    assert_eq!(docs.files(), ["seed.pdf", "new.pdf"]);

    docs.delete(&backend, Some(&session), "seed.pdf").await.unwrap();
    assert_eq!(docs.files(), ["new.pdf"]);
    assert_eq!(docs.status(), &DocumentStatus::Success("File deleted successfully".to_string()));

    let mut chat = ChatWorkflow::new();
    chat.draft = "Hello".to_string();
    chat.send(&backend, Some(&session)).await;
    let texts: Vec<&str> = chat.transcript().iter().map(|m| m.text.as_str()).collect();
    assert_eq!(texts, ["Hello", "You asked: Hello"]);
}
