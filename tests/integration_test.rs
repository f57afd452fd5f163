//! Integration tests for the CloudFS client
//!
//! These tests drive a complete session against a mock HTTP server.

use cloudfs_client::{
    ClientError, Config, Exists, ItemKind, RestAdapter, RestoreMethod, VersionConflict,
    VersionRange,
};
use serde_json::json;
use std::collections::BTreeMap;
use wiremock::matchers::{body_string_contains, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn mount_json(server: &MockServer, verb: &str, route: &str, body: serde_json::Value) {
    Mock::given(method(verb))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

async fn authenticated(server: &MockServer) -> RestAdapter {
    mount_json(
        server,
        "POST",
        "/v2/oauth2/token",
        json!({ "access_token": "session-token", "token_type": "Bearer" }),
    )
    .await;

    let config = Config::new(server.uri())
        .with_client("app", "app-secret")
        .with_debug(true);
    let adapter = RestAdapter::new(config).unwrap();
    adapter.authenticate("alice@example.com", "hunter2").await.unwrap();
    adapter
}

/// Test a full folder and file session
#[tokio::test]
async fn test_file_session() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    let server = MockServer::start().await;
    let adapter = authenticated(&server).await;

    Mock::given(method("POST"))
        .and(path("/v2/folders/"))
        .and(query_param("operation", "create"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "result": { "items": [{ "name": "photos", "type": "folder", "id": "P" }] }
        })))
        .mount(&server)
        .await;

    let folder = adapter.create_folder("/", "photos", Exists::Fail).await.unwrap();
    assert_eq!(folder.path, "/P");
    assert!(folder.is_folder());

    mount_json(
        &server,
        "GET",
        "/v2/folders/P",
        json!({ "result": { "items": [
            { "name": "beach.jpg", "type": "file", "id": "B", "mime": "image/jpeg", "size": 2048,
              "date_created": 1392670130, "date_content_last_modified": 1392670200 },
            { "name": "clip.mp4", "type": "file", "id": "C", "mime": "video/mp4" }
        ] } }),
    )
    .await;

    let children = folder.list(0, None).await.unwrap();
    assert_eq!(children.len(), 2);
    let photo = &children[0];
    assert_eq!(photo.kind, ItemKind::Photo);
    assert_eq!(photo.path, "/P/B");
    assert!(photo.created.is_some());
    assert_eq!(children[1].kind, ItemKind::Video);

    mount_json(
        &server,
        "POST",
        "/v2/files/P/B/meta",
        json!({ "result": { "meta": {
            "name": "sunset.jpg", "type": "file", "id": "B", "version": 2
        } } }),
    )
    .await;

    let mut attributes = BTreeMap::new();
    attributes.insert("name".to_string(), "sunset.jpg".to_string());
    let altered = photo
        .alter_meta(&attributes, VersionConflict::Ignore)
        .await
        .unwrap();
    assert_eq!(altered.name, "sunset.jpg");
    assert_eq!(altered.version, 2);

    mount_json(
        &server,
        "GET",
        "/v2/files/P/B/versions",
        json!({ "result": [
            { "name": "beach.jpg", "type": "file", "id": "B", "version": 1 },
            { "name": "sunset.jpg", "type": "file", "id": "B", "version": 2 }
        ] }),
    )
    .await;

    let versions = altered.versions(VersionRange::default()).await.unwrap();
    assert_eq!(versions.len(), 2);

    // Folder-only and file-only helpers are rejected up front
    assert!(photo.list(0, None).await.unwrap_err().is_invalid_argument());

    let requests = server.received_requests().await.unwrap();
    for request in requests.iter().skip(1) {
        assert_eq!(
            request.headers.get("authorization").unwrap(),
            "Bearer session-token"
        );
    }
}

/// Test sharing a folder and receiving it elsewhere
#[tokio::test]
async fn test_share_session() {
    let server = MockServer::start().await;
    let adapter = authenticated(&server).await;

    Mock::given(method("POST"))
        .and(path("/v2/shares/"))
        .and(body_string_contains("password=pw"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "result": { "share_key": "abc", "share_name": "P", "is_password_protected": true }
        })))
        .expect(1)
        .mount(&server)
        .await;
    mount_json(
        &server,
        "POST",
        "/v2/shares/abc/unlock",
        json!({ "result": { "success": true } }),
    )
    .await;
    mount_json(
        &server,
        "GET",
        "/v2/shares/abc/meta",
        json!({ "result": { "items": [{ "name": "B", "type": "file", "id": "B" }] } }),
    )
    .await;
    mount_json(
        &server,
        "POST",
        "/v2/shares/abc/",
        json!({ "result": [{ "name": "P", "type": "folder", "id": "P2" }] }),
    )
    .await;

    let share = adapter.create_share(["/P"], Some("pw")).await.unwrap();
    assert!(share.password_protected);
    assert_eq!(share.paths, vec!["/P".to_string()]);

    assert!(share.unlock("pw").await.unwrap());
    assert_eq!(share.browse(None).await.unwrap().len(), 1);

    let received = share.receive("/inbox", Exists::Rename).await.unwrap();
    assert_eq!(received[0].path, "/inbox/P2");
}

/// Test deleting into the trash and restoring
#[tokio::test]
async fn test_trash_session() {
    let server = MockServer::start().await;
    let adapter = authenticated(&server).await;

    mount_json(&server, "DELETE", "/v2/files/P/B", json!({ "result": { "success": true } })).await;
    mount_json(
        &server,
        "GET",
        "/v2/trash/",
        json!({ "result": { "items": [{ "name": "beach.jpg", "type": "file", "id": "T1" }] } }),
    )
    .await;
    mount_json(&server, "POST", "/v2/trash/T1", json!({ "result": { "success": true } })).await;

    assert!(adapter.delete_file("/P/B", false).await.unwrap());

    let trashed = adapter.list_trash(None).await.unwrap();
    assert_eq!(trashed[0].path, "/T1");
    assert!(trashed[0]
        .restore(Some("/P"), RestoreMethod::Rescue)
        .await
        .unwrap());

    let requests = server.received_requests().await.unwrap();
    let restore = requests.last().unwrap();
    let body = String::from_utf8_lossy(&restore.body);
    assert_eq!(body, "restore=rescue&rescue-path=%2FP");

    // Trashed items are purged through the trash, never the files endpoint
    mount_json(&server, "DELETE", "/v2/trash/T1", json!({ "result": { "success": true } })).await;
    assert!(trashed[0].delete(false, false).await.unwrap());
    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.last().unwrap().url.path(), "/v2/trash/T1");
}

/// Test that items outliving their adapter fail cleanly
#[tokio::test]
async fn test_detached_item() {
    let server = MockServer::start().await;
    let adapter = authenticated(&server).await;

    mount_json(
        &server,
        "GET",
        "/v2/folders/meta",
        json!({ "result": { "meta": { "name": "root", "type": "folder" } } }),
    )
    .await;

    let root = adapter.folder_meta("/").await.unwrap();
    drop(adapter);

    assert!(matches!(root.list(0, None).await.unwrap_err(), ClientError::Detached));
}

/// Test signing out drops the session
#[tokio::test]
async fn test_sign_out() {
    let server = MockServer::start().await;
    let adapter = authenticated(&server).await;
    assert!(adapter.is_authenticated());

    adapter.sign_out();
    assert!(adapter.list_folder(None, 0, None).await.unwrap_err().is_authentication());
}
