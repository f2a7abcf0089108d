//! End-to-end tests of the submission endpoint against a mock GitHub API.

use crate::AppState;
use crate::store::{ContentStore, PutFile, StoreError, StoredFile};
use crate::test_utils::*;
use async_trait::async_trait;
use axum::http::StatusCode;
use axum_test::multipart::MultipartForm;
use base64::{Engine as _, engine::general_purpose};
use serde_json::{Value, json};
use std::sync::{Arc, Mutex};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Mount a GitHub mock that has no file at `file_path` and accepts the write.
async fn mount_new_file(server: &MockServer, file_path: &str) {
    Mock::given(method("GET"))
        .and(path(contents_path(file_path)))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({ "message": "Not Found" })))
        .mount(server)
        .await;

    Mock::given(method("PUT"))
        .and(path(contents_path(file_path)))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "content": {
                "sha": "3d21ec53a331a6f037a91c368710b99387d012c1",
                "html_url": format!("https://github.com/{TEST_OWNER}/{TEST_REPO}/blob/main/{file_path}")
            }
        })))
        .expect(1)
        .mount(server)
        .await;
}

/// Body of the single PUT the mock received.
async fn put_body(server: &MockServer) -> Value {
    let requests = server.received_requests().await.expect("request recording is enabled");
    let puts: Vec<_> = requests.iter().filter(|r| r.method.as_str() == "PUT").collect();
    assert_eq!(puts.len(), 1, "expected exactly one write");
    puts[0].body_json().expect("PUT body should be JSON")
}

fn decoded_content(body: &Value) -> Vec<u8> {
    general_purpose::STANDARD
        .decode(body["content"].as_str().expect("content should be a string"))
        .expect("content should be base64")
}

async fn assert_no_requests(server: &MockServer) {
    let requests = server.received_requests().await.expect("request recording is enabled");
    assert!(requests.is_empty(), "expected no calls to GitHub, got {}", requests.len());
}

#[test_log::test(tokio::test)]
async fn test_plain_text_submission() {
    let github = MockServer::start().await;
    mount_new_file(&github, "data/demo/alice/notes.txt").await;
    let server = create_test_app_for(&github).await;

    let response = server
        .post("/post-data")
        .bytes(form_body(&[("project_name", "demo"), ("user_name", "alice"), ("directory", "notes"), ("data", "hello")]).into())
        .content_type("text/plain")
        .await;

    response.assert_status(StatusCode::CREATED);
    let body: Value = response.json();
    assert_eq!(body["message"], "File successfully saved to GitHub.");
    assert_eq!(body["file_url"], "https://github.com/octo/store/blob/main/data/demo/alice/notes.txt");
    assert_eq!(body["file_type"], "txt");

    let put = put_body(&github).await;
    assert_eq!(put["message"], "Add or update txt file for demo/alice");
    assert_eq!(decoded_content(&put), b"hello");
}

#[tokio::test]
async fn test_put_carries_credentials() {
    let github = MockServer::start().await;
    mount_new_file(&github, "data/demo/alice/notes.txt").await;
    let server = create_test_app_for(&github).await;

    server
        .post("/post-data")
        .bytes(form_body(&[("project_name", "demo"), ("user_name", "alice"), ("directory", "notes"), ("data", "x")]).into())
        .content_type("text/plain")
        .await
        .assert_status(StatusCode::CREATED);

    let requests = github.received_requests().await.unwrap();
    for request in &requests {
        assert_eq!(request.headers.get("authorization").unwrap(), &format!("token {TEST_TOKEN}"));
        assert_eq!(request.headers.get("accept").unwrap(), "application/vnd.github.v3+json");
    }
}

#[tokio::test]
async fn test_json_submission_is_reserialized() {
    let github = MockServer::start().await;
    mount_new_file(&github, "data/demo/alice/config.json").await;
    let server = create_test_app_for(&github).await;

    let response = server
        .post("/post-data")
        .bytes(
            form_body(&[
                ("project_name", "demo"),
                ("user_name", "alice"),
                ("directory", "config"),
                ("data", r#"{ "a": 1 }"#),
            ])
            .into(),
        )
        .content_type("application/json")
        .await;

    response.assert_status(StatusCode::CREATED);
    let body: Value = response.json();
    assert_eq!(body["file_type"], "json");

    let put = put_body(&github).await;
    assert_eq!(put["message"], "Add or update json file for demo/alice");
    assert_eq!(decoded_content(&put), br#"{"a":1}"#);
}

#[tokio::test]
async fn test_json_submission_preserves_non_ascii() {
    let github = MockServer::start().await;
    mount_new_file(&github, "data/demo/taro/profile.json").await;
    let server = create_test_app_for(&github).await;

    server
        .post("/post-data")
        .bytes(
            form_body(&[
                ("project_name", "demo"),
                ("user_name", "taro"),
                ("directory", "profile"),
                ("data", r#"{"名前":"太郎"}"#),
            ])
            .into(),
        )
        .content_type("application/json; charset=utf-8")
        .await
        .assert_status(StatusCode::CREATED);

    let put = put_body(&github).await;
    assert_eq!(String::from_utf8(decoded_content(&put)).unwrap(), r#"{"名前":"太郎"}"#);
}

#[tokio::test]
async fn test_invalid_json_is_rejected_without_remote_call() {
    let github = MockServer::start().await;
    let server = create_test_app_for(&github).await;

    let response = server
        .post("/post-data")
        .bytes(form_body(&[("project_name", "demo"), ("user_name", "alice"), ("directory", "bad"), ("data", "{invalid}")]).into())
        .content_type("application/json")
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["error"], "Invalid JSON format for 'data' field.");
    assert_no_requests(&github).await;
}

#[tokio::test]
async fn test_missing_fields_are_rejected_without_remote_call() {
    let github = MockServer::start().await;
    let server = create_test_app_for(&github).await;

    let complete = [("project_name", "demo"), ("user_name", "alice"), ("directory", "notes"), ("data", "hello")];
    for missing in ["project_name", "user_name", "directory"] {
        let fields: Vec<_> = complete.iter().copied().filter(|(name, _)| *name != missing).collect();

        let response = server
            .post("/post-data")
            .bytes(form_body(&fields).into())
            .content_type("text/plain")
            .await;

        response.assert_status(StatusCode::BAD_REQUEST);
        let body: Value = response.json();
        assert_eq!(body["error"], "Missing project, user, or directory name.", "missing {missing}");
    }

    let response = server
        .post("/post-data")
        .bytes(form_body(&[("project_name", ""), ("user_name", "alice"), ("directory", "notes")]).into())
        .content_type("text/plain")
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);

    assert_no_requests(&github).await;
}

#[tokio::test]
async fn test_missing_token_fails_without_remote_call() {
    let github = MockServer::start().await;
    let mut config = create_test_config(&github.uri());
    config.github.token = None;
    let server = create_test_app(config).await;

    let response = server
        .post("/post-data")
        .bytes(form_body(&[("project_name", "demo"), ("user_name", "alice"), ("directory", "notes"), ("data", "hello")]).into())
        .content_type("text/plain")
        .await;

    response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = response.json();
    assert_eq!(body["error"], "GitHub token not found.");

    // Checked before the body, so even an invalid submission gets the configuration error
    let response = server.post("/post-data").bytes("".into()).content_type("application/json").await;
    response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);

    assert_no_requests(&github).await;
}

#[tokio::test]
async fn test_unrecognized_content_type_falls_back_to_txt() {
    let github = MockServer::start().await;
    mount_new_file(&github, "data/demo/alice/picture.txt").await;
    let server = create_test_app_for(&github).await;

    let response = server
        .post("/post-data")
        .bytes(form_body(&[("project_name", "demo"), ("user_name", "alice"), ("directory", "picture"), ("data", "not a png")]).into())
        .content_type("image/png")
        .await;

    response.assert_status(StatusCode::CREATED);
    let body: Value = response.json();
    assert_eq!(body["file_type"], "txt");
    assert_eq!(decoded_content(&put_body(&github).await), b"not a png");
}

#[tokio::test]
async fn test_mapped_content_type_extension() {
    let github = MockServer::start().await;
    mount_new_file(&github, "data/web/bob/theme.css").await;
    let server = create_test_app_for(&github).await;

    let css = "body { color: red; }";
    let response = server
        .post("/post-data")
        .bytes(form_body(&[("project_name", "web"), ("user_name", "bob"), ("directory", "theme"), ("data", css)]).into())
        .content_type("text/css")
        .await;

    response.assert_status(StatusCode::CREATED);
    let body: Value = response.json();
    assert_eq!(body["file_type"], "css");
    assert_eq!(decoded_content(&put_body(&github).await), css.as_bytes());
}

#[tokio::test]
async fn test_multipart_submission() {
    let github = MockServer::start().await;
    mount_new_file(&github, "data/demo/alice/sub/notes.txt").await;
    let server = create_test_app_for(&github).await;

    let form = MultipartForm::new()
        .add_text("project_name", "demo")
        .add_text("user_name", "alice")
        .add_text("directory", "sub/notes")
        .add_text("data", "multi\nline");

    let response = server.post("/post-data").multipart(form).await;

    response.assert_status(StatusCode::CREATED);
    let body: Value = response.json();
    assert_eq!(body["file_type"], "txt");
    assert_eq!(decoded_content(&put_body(&github).await), b"multi\nline");
}

#[tokio::test]
async fn test_existing_file_is_updated_with_its_sha() {
    let github = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(contents_path("data/demo/alice/notes.txt")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "type": "file",
            "sha": "95b966ae1c166bd92f8ae7d1c313e738c731dfc3"
        })))
        .expect(1)
        .mount(&github)
        .await;
    Mock::given(method("PUT"))
        .and(path(contents_path("data/demo/alice/notes.txt")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "content": { "html_url": "https://github.com/octo/store/blob/main/data/demo/alice/notes.txt" }
        })))
        .expect(1)
        .mount(&github)
        .await;
    let server = create_test_app_for(&github).await;

    server
        .post("/post-data")
        .bytes(form_body(&[("project_name", "demo"), ("user_name", "alice"), ("directory", "notes"), ("data", "v2")]).into())
        .content_type("text/plain")
        .await
        .assert_status(StatusCode::CREATED);

    let put = put_body(&github).await;
    assert_eq!(put["sha"], "95b966ae1c166bd92f8ae7d1c313e738c731dfc3");
}

#[tokio::test]
async fn test_remote_error_message_is_passed_through() {
    let github = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&github)
        .await;
    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({
            "message": "Resource not accessible by personal access token",
            "documentation_url": "https://docs.github.com/rest/repos/contents"
        })))
        .mount(&github)
        .await;
    let server = create_test_app_for(&github).await;

    let response = server
        .post("/post-data")
        .bytes(form_body(&[("project_name", "demo"), ("user_name", "alice"), ("directory", "notes"), ("data", "hello")]).into())
        .content_type("text/plain")
        .await;

    response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = response.json();
    assert_eq!(body["error"], "GitHub API error: Resource not accessible by personal access token");
}

#[tokio::test]
async fn test_remote_error_without_message_uses_fallback() {
    let github = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503).set_body_string("upstream unavailable"))
        .mount(&github)
        .await;
    let server = create_test_app_for(&github).await;

    let response = server
        .post("/post-data")
        .bytes(form_body(&[("project_name", "demo"), ("user_name", "alice"), ("directory", "notes"), ("data", "hello")]).into())
        .content_type("text/plain")
        .await;

    response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = response.json();
    assert_eq!(body["error"], "GitHub API error: 503 Service Unavailable");
}

#[tokio::test]
async fn test_remote_timeout_is_unexpected_error() {
    let github = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404).set_delay(std::time::Duration::from_secs(5)))
        .mount(&github)
        .await;
    let mut config = create_test_config(&github.uri());
    config.github.request_timeout = std::time::Duration::from_millis(100);
    let server = create_test_app(config).await;

    let response = server
        .post("/post-data")
        .bytes(form_body(&[("project_name", "demo"), ("user_name", "alice"), ("directory", "notes"), ("data", "hello")]).into())
        .content_type("text/plain")
        .await;

    response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = response.json();
    let error = body["error"].as_str().unwrap();
    assert!(!error.is_empty());
    assert!(!error.starts_with("GitHub API error"));
}

#[tokio::test]
async fn test_body_limit() {
    let github = MockServer::start().await;
    let mut config = create_test_config(&github.uri());
    config.max_body_size = 64;
    let server = create_test_app(config).await;

    let data = "x".repeat(1024);
    let response = server
        .post("/post-data")
        .bytes(form_body(&[("project_name", "demo"), ("user_name", "alice"), ("directory", "big"), ("data", &data)]).into())
        .content_type("text/plain")
        .await;

    response.assert_status(StatusCode::PAYLOAD_TOO_LARGE);
    let body: Value = response.json();
    assert_eq!(body, json!({ "error": "Request body exceeds maximum allowed size of 64 bytes" }));
    assert_no_requests(&github).await;
}

#[tokio::test]
async fn test_missing_token_is_reported_before_body_limit() {
    let github = MockServer::start().await;
    let mut config = create_test_config(&github.uri());
    config.github.token = None;
    config.max_body_size = 64;
    let server = create_test_app(config).await;

    let data = "x".repeat(1024);
    let response = server
        .post("/post-data")
        .bytes(form_body(&[("project_name", "demo"), ("user_name", "alice"), ("directory", "big"), ("data", &data)]).into())
        .content_type("text/plain")
        .await;

    response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = response.json();
    assert_eq!(body["error"], "GitHub token not found.");
}

#[tokio::test]
async fn test_dot_and_empty_path_segments_are_rejected_without_remote_call() {
    let github = MockServer::start().await;
    let server = create_test_app_for(&github).await;

    for (user_name, directory) in [("alice", "../bob/notes"), ("alice", "./notes"), ("alice", "a//b"), ("..", "notes")] {
        let response = server
            .post("/post-data")
            .bytes(form_body(&[("project_name", "demo"), ("user_name", user_name), ("directory", directory), ("data", "x")]).into())
            .content_type("text/plain")
            .await;

        response.assert_status(StatusCode::BAD_REQUEST);
        let body: Value = response.json();
        assert!(
            body["error"].as_str().unwrap().contains("path segments"),
            "user {user_name:?} directory {directory:?}"
        );
    }

    assert_no_requests(&github).await;
}

#[tokio::test]
async fn test_repeated_urlencoded_fields_keep_first_value() {
    let github = MockServer::start().await;
    mount_new_file(&github, "data/demo/alice/notes.txt").await;
    let server = create_test_app_for(&github).await;

    let response = server
        .post("/post-data")
        .bytes(
            form_body(&[
                ("project_name", "demo"),
                ("user_name", "alice"),
                ("directory", "notes"),
                ("data", "a"),
                ("data", "b"),
                ("directory", "other"),
            ])
            .into(),
        )
        .content_type("text/plain")
        .await;

    response.assert_status(StatusCode::CREATED);
    assert_eq!(decoded_content(&put_body(&github).await), b"a");
}

#[tokio::test]
async fn test_repeated_multipart_fields_keep_first_value() {
    let github = MockServer::start().await;
    mount_new_file(&github, "data/demo/alice/notes.txt").await;
    let server = create_test_app_for(&github).await;

    let form = MultipartForm::new()
        .add_text("project_name", "demo")
        .add_text("user_name", "alice")
        .add_text("directory", "notes")
        .add_text("data", "a")
        .add_text("data", "b");

    let response = server.post("/post-data").multipart(form).await;

    response.assert_status(StatusCode::CREATED);
    assert_eq!(decoded_content(&put_body(&github).await), b"a");
}

/// In-memory store recording every write.
#[derive(Default)]
struct RecordingStore {
    writes: Mutex<Vec<PutFile>>,
}

#[async_trait]
impl ContentStore for RecordingStore {
    async fn put_file(&self, request: PutFile) -> Result<StoredFile, StoreError> {
        let html_url = format!("memory://{}", request.path);
        self.writes.lock().unwrap().push(request);
        Ok(StoredFile { html_url, sha: None })
    }
}

#[tokio::test]
async fn test_handler_writes_through_content_store() {
    let store = Arc::new(RecordingStore::default());
    let state = AppState::builder()
        .config(create_test_config("http://unused.invalid"))
        .store(store.clone())
        .build();
    let server = create_test_server(state);

    let response = server
        .post("/post-data")
        .bytes(form_body(&[("project_name", "P"), ("user_name", "U"), ("directory", "D"), ("data", "payload")]).into())
        .content_type("text/x-csrc")
        .await;

    response.assert_status(StatusCode::CREATED);
    let body: Value = response.json();
    assert_eq!(body["file_url"], "memory://data/P/U/D.c");
    assert_eq!(body["file_type"], "c");

    let writes = store.writes.lock().unwrap();
    assert_eq!(
        *writes,
        vec![PutFile {
            path: "data/P/U/D.c".to_string(),
            message: "Add or update c file for P/U".to_string(),
            content: b"payload".to_vec(),
        }]
    );
}

#[tokio::test]
async fn test_healthz() {
    let github = MockServer::start().await;
    let server = create_test_app_for(&github).await;

    let response = server.get("/healthz").await;
    response.assert_status_ok();
    assert_eq!(response.text(), "OK");
}

#[tokio::test]
async fn test_openapi_document() {
    let github = MockServer::start().await;
    let server = create_test_app_for(&github).await;

    let response = server.get("/openapi.json").await;
    response.assert_status_ok();
    let text = response.text();
    assert!(text.contains("\"openapi\""));
    assert!(text.contains("/post-data"));
    assert!(text.contains("SubmissionCreated"));

    server.get("/docs").await.assert_status_ok();
}

#[tokio::test]
async fn test_landing_page() {
    let github = MockServer::start().await;
    let server = create_test_app_for(&github).await;

    let response = server.get("/").await;
    response.assert_status_ok();
    assert!(response.text().contains("<form"));
}
