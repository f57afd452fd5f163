//! HTTP-level tests for the REST adapter over the reqwest transport

use cloudfs_client::{
    ClientError, Config, Exists, ItemKind, ProgressCallback, RestAdapter, RestoreMethod,
    TransferProgress,
};
use serde_json::json;
use std::io::Write;
use std::sync::{Arc, Mutex};
use std::sync::atomic::{AtomicU64, Ordering};
use wiremock::matchers::{body_string_contains, header, header_exists, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn config(server: &MockServer) -> Config {
    Config::new(server.uri()).with_client("test-client", "test-secret")
}

async fn signed_in(server: &MockServer) -> RestAdapter {
    let adapter = RestAdapter::new(config(server)).unwrap();
    adapter.credential().set_session("alice", "tok-1", "Bearer");
    adapter
}

fn form_of(body: &[u8]) -> Vec<(String, String)> {
    url::form_urlencoded::parse(body)
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect()
}

#[tokio::test]
async fn test_authenticate_performs_one_signed_request() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v2/oauth2/token"))
        .and(header_exists("date"))
        .and(header("content-type", "application/x-www-form-urlencoded"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "tok-9",
            "token_type": "Bearer"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let adapter = RestAdapter::new(config(&server)).unwrap();
    adapter.authenticate("alice@example.com", "pw").await.unwrap();
    adapter.authenticate("alice@example.com", "pw").await.unwrap();

    assert_eq!(adapter.credential().access_token().as_deref(), Some("tok-9"));

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    let auth = requests[0].headers.get("authorization").unwrap().to_str().unwrap();
    assert!(auth.starts_with("BCS test-client:"));

    let form = form_of(&requests[0].body);
    assert!(form.contains(&("grant_type".to_string(), "password".to_string())));
    assert!(form.contains(&("username".to_string(), "alice@example.com".to_string())));
}

#[tokio::test]
async fn test_authenticate_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v2/oauth2/token"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "error": "invalid_grant",
            "error_description": "Bad credentials"
        })))
        .mount(&server)
        .await;

    let adapter = RestAdapter::new(config(&server)).unwrap();
    match adapter.authenticate("alice", "wrong").await.unwrap_err() {
        ClientError::Authentication { source: Some(source), .. } => {
            assert!(source.is_api());
            assert!(source.to_string().contains("Bad credentials"));
        }
        other => panic!("Expected Authentication error, got {:?}", other),
    }
    assert!(!adapter.is_authenticated());
}

#[tokio::test]
async fn test_create_folder_over_http() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v2/folders/My%20Docs"))
        .and(query_param("operation", "create"))
        .and(header("authorization", "Bearer tok-1"))
        .and(body_string_contains("exists=overwrite"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "result": { "items": [{ "name": "Reports", "type": "folder", "id": "R1" }] }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let adapter = signed_in(&server).await;
    let folder = adapter
        .create_folder("/My Docs", "Reports", Exists::Overwrite)
        .await
        .unwrap();

    assert_eq!(folder.kind, ItemKind::Folder);
    assert_eq!(folder.path, "/My Docs/R1");
}

#[tokio::test]
async fn test_delete_folder_force_only_when_set() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/v2/folders/old"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "result": { "success": true } })),
        )
        .expect(2)
        .mount(&server)
        .await;

    let adapter = signed_in(&server).await;
    assert!(adapter.delete_folder("/old", false, true).await.unwrap());
    assert!(adapter.delete_folder("/old", false, false).await.unwrap());

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests[0].url.query(), Some("force=true"));
    assert_eq!(requests[1].url.query(), None);
}

#[tokio::test]
async fn test_upload_from_file() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v2/files/docs/"))
        .and(body_string_contains("name=\"file\""))
        .and(body_string_contains("quarterly numbers"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "result": { "items": [{
                "name": "q3.txt",
                "type": "file",
                "id": "F9",
                "mime": "text/plain",
                "size": 17
            }] }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let mut source = tempfile::NamedTempFile::new().unwrap();
    source.write_all(b"quarterly numbers").unwrap();

    let sent = Arc::new(AtomicU64::new(0));
    let seen = sent.clone();
    let progress: ProgressCallback = Arc::new(move |p: TransferProgress| {
        seen.store(p.bytes_transferred, Ordering::SeqCst);
    });

    let adapter = signed_in(&server).await;
    let item = adapter
        .upload_file("/docs", "q3.txt", source.path(), Exists::Rename, Some(progress))
        .await
        .unwrap();

    assert_eq!(item.kind, ItemKind::Document);
    assert_eq!(item.size, 17);
    assert_eq!(sent.load(Ordering::SeqCst), 17);

    let requests = server.received_requests().await.unwrap();
    let body = String::from_utf8_lossy(&requests[0].body);
    assert!(body.contains("name=\"exists\""));
    assert!(body.contains("rename"));
}

#[tokio::test]
async fn test_upload_streams_in_chunks() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v2/files/docs/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "result": { "items": [{ "name": "big.bin", "type": "file", "id": "G" }] }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let content: Vec<u8> = (0..200_000u32).map(|i| (i % 251) as u8).collect();
    let mut source = tempfile::NamedTempFile::new().unwrap();
    source.write_all(&content).unwrap();
    source.flush().unwrap();

    let calls = Arc::new(Mutex::new(Vec::new()));
    let seen = calls.clone();
    let progress: ProgressCallback = Arc::new(move |p: TransferProgress| {
        seen.lock().unwrap().push((p.bytes_transferred, p.total_bytes));
    });

    let adapter = signed_in(&server).await;
    adapter
        .upload_file("/docs", "big.bin", source.path(), Exists::Fail, Some(progress))
        .await
        .unwrap();

    let calls = calls.lock().unwrap().clone();
    assert!(calls.len() > 1);
    assert!(calls.iter().all(|(_, total)| *total == Some(200_000)));
    assert!(calls.windows(2).all(|w| w[0].0 < w[1].0));
    assert_eq!(calls.last().map(|(sent, _)| *sent), Some(200_000));

    let requests = server.received_requests().await.unwrap();
    let body = &requests[0].body;
    assert!(body.windows(content.len()).any(|w| w == content.as_slice()));
}

#[tokio::test]
async fn test_upload_missing_source_is_io_error() {
    let server = MockServer::start().await;
    let adapter = signed_in(&server).await;

    let dir = tempfile::tempdir().unwrap();
    let err = adapter
        .upload_file("/docs", "gone.txt", &dir.path().join("gone.txt"), Exists::Fail, None)
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::Io(_)));
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_download_into_buffer() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v2/files/docs/F9"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"quarterly numbers".to_vec()))
        .mount(&server)
        .await;

    let adapter = signed_in(&server).await;
    let mut sink: Vec<u8> = Vec::new();
    let written = adapter.download_file("/docs/F9", &mut sink, None).await.unwrap();

    assert_eq!(written, 17);
    assert_eq!(sink, b"quarterly numbers");
}

#[tokio::test]
async fn test_download_location_does_not_follow() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v2/files/docs/F9"))
        .respond_with(
            ResponseTemplate::new(302).insert_header("location", "https://cdn.example.com/F9"),
        )
        .expect(1)
        .mount(&server)
        .await;

    let adapter = signed_in(&server).await;
    let location = adapter.download_location("/docs/F9").await.unwrap();
    assert_eq!(location, "https://cdn.example.com/F9");
}

#[tokio::test]
async fn test_api_error_surfaces() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v2/files/nope/meta"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "error": { "code": 2002, "message": "File does not exist" }
        })))
        .mount(&server)
        .await;

    let adapter = signed_in(&server).await;
    let err = adapter.file_meta("/nope").await.unwrap_err();
    assert!(err.is_not_found());
    assert!(err.to_string().contains("File does not exist"));
}

#[tokio::test]
async fn test_restore_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v2/trash/T1"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "result": { "success": true } })),
        )
        .expect(2)
        .mount(&server)
        .await;

    let adapter = signed_in(&server).await;
    adapter
        .restore("/T1", Some("/back"), RestoreMethod::Recreate)
        .await
        .unwrap();
    adapter.restore("/T1", None, RestoreMethod::Fail).await.unwrap();

    let requests = server.received_requests().await.unwrap();
    assert_eq!(
        form_of(&requests[0].body),
        vec![
            ("restore".to_string(), "recreate".to_string()),
            ("recreate-path".to_string(), "/back".to_string()),
        ]
    );
    assert_eq!(requests[1].body, b"restore=fail");
}

#[tokio::test]
async fn test_share_lifecycle() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v2/shares/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "result": { "share_key": "k3y", "url": "https://s.example.com/k3y" }
        })))
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/v2/shares/k3y/"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "result": { "success": true } })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let adapter = signed_in(&server).await;
    let share = adapter.create_share(["/docs/F9"], None).await.unwrap();
    assert_eq!(share.url.as_deref(), Some("https://s.example.com/k3y"));
    assert!(share.delete().await.unwrap());
}

#[tokio::test]
async fn test_unreachable_server_is_transport_error() {
    // A port the OS just handed out and took back has no listener
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let adapter = RestAdapter::new(Config::new(format!("http://127.0.0.1:{}", port))).unwrap();
    adapter.credential().set_session("alice", "tok-1", "Bearer");
    let err = adapter.list_folder(None, 0, None).await.unwrap_err();
    assert!(err.is_transport());
}
