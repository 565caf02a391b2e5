use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::body::{Body, to_bytes};
use axum::http::{Method, Request, StatusCode, header};
use serde_json::{Value, json};
use tempfile::NamedTempFile;
use tower::ServiceExt;

use userdir::domain::{Message, ServerConfig, ViewerConfig};
use userdir::model::{LoadStatus, Model};
use userdir::record::Status;
use userdir::server::{USERS_ROUTE, router};
use userdir::source::{FetchError, HttpSource, LoadError, SingleFlight, load_records};

fn fixture(content: &Value) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    write!(file, "{content}").unwrap();
    file
}

fn config(path: &Path) -> ServerConfig {
    ServerConfig::default().with_fixture(path.to_path_buf())
}

fn repo_fixture() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("data/users.json")
}

async fn get(config: &ServerConfig, origin: Option<&str>) -> (StatusCode, header::HeaderMap, Value) {
    let mut request = Request::builder().uri(USERS_ROUTE);
    if let Some(origin) = origin {
        request = request.header(header::ORIGIN, origin);
    }
    let response = router(config)
        .unwrap()
        .oneshot(request.body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, headers, serde_json::from_slice(&body).unwrap_or(Value::Null))
}

#[tokio::test]
async fn serves_users_in_transport_shape() {
    let file = fixture(&json!([
        {"id": "5", "name": "X", "email": "x@y.com", "mobile": "000", "status": "INACTIVE"},
        {"id": 6, "name": "Y", "email": "y@y.com", "mobile": "111", "status": "Active", "avatar": "https://example.com/y.png"}
    ]));
    let (status, _, body) = get(&config(file.path()), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!([
            {"id": 5, "name": "X", "email": "x@y.com", "mobile": "000", "status": "inactive", "avatar": "https://i.pravatar.cc/150?img=5"},
            {"id": 6, "name": "Y", "email": "y@y.com", "mobile": "111", "status": "active", "avatar": "https://example.com/y.png"}
        ])
    );
}

#[tokio::test]
async fn non_array_fixture_is_a_server_error() {
    let file = fixture(&json!({"users": []}));
    let (status, _, body) = get(&config(file.path()), None).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "Invalid data format");
    assert_eq!(body["message"], "Data is not an array");
}

#[tokio::test]
async fn record_missing_a_field_fails_the_whole_response() {
    let file = fixture(&json!([
        {"id": 1, "name": "X", "email": "x@y.com", "mobile": "000", "status": "active"},
        {"id": 2, "name": "Y", "email": "y@y.com", "status": "active"}
    ]));
    let (status, _, body) = get(&config(file.path()), None).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["message"], "Missing required fields: mobile");
}

#[tokio::test]
async fn unreadable_fixture_is_a_server_error() {
    let (status, _, body) = get(&config(Path::new("/nonexistent/users.json")), None).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "Invalid data format");
}

#[tokio::test]
async fn repository_fixture_is_valid() {
    let (status, _, body) = get(&config(&repo_fixture()), None).await;
    assert_eq!(status, StatusCode::OK);
    let users = body.as_array().unwrap();
    assert_eq!(users.len(), 12);
    assert!(users.iter().all(|u| u["status"] == "active" || u["status"] == "inactive"));
}

#[tokio::test]
async fn cors_allows_the_dev_origins() {
    let (_, headers, _) = get(&config(&repo_fixture()), Some("http://127.0.0.1:5173")).await;
    assert_eq!(
        headers.get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
        "http://127.0.0.1:5173"
    );
    assert_eq!(headers.get(header::ACCESS_CONTROL_ALLOW_CREDENTIALS).unwrap(), "true");

    let (_, headers, _) = get(&config(&repo_fixture()), Some("http://evil.example")).await;
    assert!(headers.get(header::ACCESS_CONTROL_ALLOW_ORIGIN).is_none());
}

#[tokio::test]
async fn cors_preflight_lists_get_and_options() {
    let request = Request::builder()
        .method(Method::OPTIONS)
        .uri(USERS_ROUTE)
        .header(header::ORIGIN, "http://localhost:5173")
        .header(header::ACCESS_CONTROL_REQUEST_METHOD, "GET")
        .body(Body::empty())
        .unwrap();
    let response = router(&config(&repo_fixture()))
        .unwrap()
        .oneshot(request)
        .await
        .unwrap();
    assert!(response.status().is_success());
    let methods = response
        .headers()
        .get(header::ACCESS_CONTROL_ALLOW_METHODS)
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(methods.contains("GET"));
    assert!(methods.contains("OPTIONS"));
}

#[tokio::test]
async fn only_get_is_routed() {
    let request = Request::builder()
        .method(Method::POST)
        .uri(USERS_ROUTE)
        .body(Body::empty())
        .unwrap();
    let response = router(&config(&repo_fixture()))
        .unwrap()
        .oneshot(request)
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
}

async fn spawn_server(config: ServerConfig) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = router(&config).unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}{USERS_ROUTE}")
}

#[tokio::test]
async fn http_source_loads_and_normalizes() {
    let url = spawn_server(config(&repo_fixture())).await;
    let records = load_records(&HttpSource::new(url)).await.unwrap();
    assert_eq!(records.len(), 12);
    assert_eq!(records[3].status, Status::Inactive);
    assert_eq!(records[6].id, 7);
}

#[tokio::test]
async fn failed_load_surfaces_one_error_and_retry_recovers() {
    let file = fixture(&json!({"not": "an array"}));
    let url = spawn_server(config(file.path())).await;
    let flight = SingleFlight::new(Arc::new(HttpSource::new(url)));

    let mut model = Model::init(&ViewerConfig::default());
    assert!(model.take_fetch_request());
    let result = flight.load().await;
    assert_eq!(
        result,
        Err(LoadError::Fetch(FetchError::Status {
            status: 500,
            message: Some("Data is not an array".into()),
        }))
    );
    model.update(Some(Message::Loaded(result))).unwrap();
    assert!(matches!(model.load_status(), LoadStatus::Failed(_)));

    std::fs::write(file.path(), std::fs::read(repo_fixture()).unwrap()).unwrap();

    model.update(Some(Message::Retry)).unwrap();
    assert!(model.take_fetch_request());
    model.update(Some(Message::Loaded(flight.load().await))).unwrap();
    assert_eq!(model.load_status(), &LoadStatus::Ready);
    let ui = model.get_uidata();
    assert_eq!(ui.window.rows.len(), 10);
    assert_eq!(ui.window.total_pages, 2);
}

#[tokio::test]
async fn unreachable_server_is_a_transport_error() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    let err = load_records(&HttpSource::new(format!("http://{addr}/api/users")))
        .await
        .unwrap_err();
    assert!(matches!(err, LoadError::Fetch(FetchError::Transport(_))));
}
