//! Folder creation, multipart uploads and resumable sessions

use gdup_core::domain::newtypes::RemoteId;
use gdup_core::ports::remote_store::{IRemoteStore, RemoteError, UploadSource};
use gdup_drive::DriveRemoteStore;
use tempfile::TempDir;
use wiremock::matchers::{body_string, body_string_contains, header, header_regex, method, path, query_param};
use wiremock::{Mock, ResponseTemplate};

use crate::common;

/// Writes `content` to a temp file and describes it for upload
fn source(dir: &TempDir, content: &[u8]) -> UploadSource {
    let path = dir.path().join("payload");
    std::fs::write(&path, content).unwrap();
    UploadSource::new(path, content.len() as u64)
}

#[tokio::test]
async fn test_create_folder_posts_metadata() {
    let (server, client) = common::setup_drive_mock().await;
    Mock::given(method("POST"))
        .and(path("/files"))
        .and(body_string_contains("\"mimeType\":\"application/vnd.google-apps.folder\""))
        .and(body_string_contains("\"title\":\"photos\""))
        .respond_with(ResponseTemplate::new(200).set_body_json(common::folder_json("d9", "photos")))
        .expect(1)
        .mount(&server)
        .await;

    let store = DriveRemoteStore::new(client);
    let stat = store.create_folder(&RemoteId::root(), "photos").await.unwrap();
    assert!(stat.is_folder());
    assert_eq!(stat.id().as_str(), "d9");
}

#[tokio::test]
async fn test_insert_file_uses_multipart_upload() {
    let dir = TempDir::new().unwrap();
    let (server, client) = common::setup_drive_mock().await;
    Mock::given(method("POST"))
        .and(path("/upload/files"))
        .and(query_param("uploadType", "multipart"))
        .and(header_regex("content-type", "^multipart/related; boundary=gdup-"))
        .and(body_string_contains("\"title\":\"a.txt\""))
        .and(body_string_contains("abc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(common::file_json(
            "f7",
            "a.txt",
            "text/plain",
            3,
            "900150983cd24fb0d6963f7d28e17f72",
        )))
        .expect(1)
        .mount(&server)
        .await;

    let store = DriveRemoteStore::new(client);
    let stat = store
        .create_file(&RemoteId::root(), "a.txt", &source(&dir, b"abc"), "text/plain")
        .await
        .unwrap();
    assert_eq!(stat.size(), Some(3));
    assert_eq!(
        stat.content_hash().unwrap().as_str(),
        "900150983cd24fb0d6963f7d28e17f72"
    );
}

#[tokio::test]
async fn test_update_file_puts_to_file_id() {
    let dir = TempDir::new().unwrap();
    let (server, client) = common::setup_drive_mock().await;
    Mock::given(method("PUT"))
        .and(path("/upload/files/f7"))
        .and(query_param("uploadType", "multipart"))
        .respond_with(ResponseTemplate::new(200).set_body_json(common::file_json(
            "f7",
            "a.txt",
            "text/plain",
            4,
            "e2fc714c4727ee9395f324cd2e7f331f",
        )))
        .expect(1)
        .mount(&server)
        .await;

    let store = DriveRemoteStore::new(client);
    let id = RemoteId::new("f7".to_string()).unwrap();
    let stat = store
        .update_file(&id, &source(&dir, b"abcd"), "text/plain")
        .await
        .unwrap();
    assert_eq!(stat.id().as_str(), "f7");
    assert_eq!(stat.size(), Some(4));
}

#[tokio::test]
async fn test_large_file_streams_through_resumable_session() {
    let dir = TempDir::new().unwrap();
    let (server, client) = common::setup_drive_mock().await;
    let client = client.with_upload_limits(4, 4);
    let session_url = format!("{}/session/s1", server.uri());

    Mock::given(method("POST"))
        .and(path("/upload/files"))
        .and(query_param("uploadType", "resumable"))
        .and(header("x-upload-content-length", "10"))
        .and(header("x-upload-content-type", "application/octet-stream"))
        .and(body_string_contains("\"title\":\"big.bin\""))
        .respond_with(ResponseTemplate::new(200).insert_header("Location", session_url.as_str()))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/session/s1"))
        .and(header("content-range", "bytes 0-3/10"))
        .and(body_string("0123"))
        .respond_with(ResponseTemplate::new(308).insert_header("Range", "bytes=0-3"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/session/s1"))
        .and(header("content-range", "bytes 4-7/10"))
        .and(body_string("4567"))
        .respond_with(ResponseTemplate::new(308).insert_header("Range", "bytes=0-7"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/session/s1"))
        .and(header("content-range", "bytes 8-9/10"))
        .and(body_string("89"))
        .respond_with(ResponseTemplate::new(200).set_body_json(common::file_json(
            "f9",
            "big.bin",
            "application/octet-stream",
            10,
            "781e5e245d69b566979b86e28d23f2c7",
        )))
        .expect(1)
        .mount(&server)
        .await;

    let store = DriveRemoteStore::new(client);
    let stat = store
        .create_file(
            &RemoteId::root(),
            "big.bin",
            &source(&dir, b"0123456789"),
            "application/octet-stream",
        )
        .await
        .unwrap();
    assert_eq!(stat.id().as_str(), "f9");
    assert_eq!(stat.size(), Some(10));
}

#[tokio::test]
async fn test_resumable_session_resends_unpersisted_bytes() {
    let dir = TempDir::new().unwrap();
    let (server, client) = common::setup_drive_mock().await;
    let client = client.with_upload_limits(0, 4);
    let session_url = format!("{}/session/s2", server.uri());

    Mock::given(method("PUT"))
        .and(path("/upload/files/f5"))
        .and(query_param("uploadType", "resumable"))
        .respond_with(ResponseTemplate::new(200).insert_header("Location", session_url.as_str()))
        .expect(1)
        .mount(&server)
        .await;
    // the server keeps only two of the first four bytes
    Mock::given(method("PUT"))
        .and(path("/session/s2"))
        .and(header("content-range", "bytes 0-3/6"))
        .respond_with(ResponseTemplate::new(308).insert_header("Range", "bytes=0-1"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/session/s2"))
        .and(header("content-range", "bytes 2-5/6"))
        .and(body_string("cdef"))
        .respond_with(ResponseTemplate::new(200).set_body_json(common::file_json(
            "f5",
            "x",
            "text/plain",
            6,
            "e80b5017098950fc58aad83c8c14978e",
        )))
        .expect(1)
        .mount(&server)
        .await;

    let store = DriveRemoteStore::new(client);
    let id = RemoteId::new("f5".to_string()).unwrap();
    let stat = store
        .update_file(&id, &source(&dir, b"abcdef"), "text/plain")
        .await
        .unwrap();
    assert_eq!(stat.size(), Some(6));
}

#[tokio::test]
async fn test_stalled_session_is_an_error() {
    let dir = TempDir::new().unwrap();
    let (server, client) = common::setup_drive_mock().await;
    let client = client.with_upload_limits(0, 4);
    let session_url = format!("{}/session/s3", server.uri());

    Mock::given(method("POST"))
        .and(path("/upload/files"))
        .respond_with(ResponseTemplate::new(200).insert_header("Location", session_url.as_str()))
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/session/s3"))
        .respond_with(ResponseTemplate::new(308))
        .expect(1)
        .mount(&server)
        .await;

    let store = DriveRemoteStore::new(client);
    let err = store
        .create_file(&RemoteId::root(), "x", &source(&dir, b"abcdef"), "text/plain")
        .await
        .unwrap_err();
    assert!(err.to_string().contains("stalled"), "{err}");
    assert!(matches!(err.downcast_ref::<RemoteError>(), Some(RemoteError::Transport(_))));
}

#[tokio::test]
async fn test_session_error_status_reaches_the_port() {
    let dir = TempDir::new().unwrap();
    let (server, client) = common::setup_drive_mock().await;
    let client = client.with_upload_limits(0, 4);

    Mock::given(method("POST"))
        .and(path("/upload/files"))
        .and(query_param("uploadType", "resumable"))
        .respond_with(ResponseTemplate::new(403).set_body_json(serde_json::json!({
            "error": { "code": 403, "message": "Rate Limit Exceeded" }
        })))
        .mount(&server)
        .await;

    let store = DriveRemoteStore::new(client);
    let err = store
        .create_file(&RemoteId::root(), "x", &source(&dir, b"abcdef"), "text/plain")
        .await
        .unwrap_err();
    assert_eq!(
        err.downcast_ref::<RemoteError>(),
        Some(&RemoteError::Status {
            code: 403,
            message: "Rate Limit Exceeded".to_string()
        })
    );
}

#[tokio::test]
async fn test_unreadable_source_fails_before_any_request() {
    let (server, client) = common::setup_drive_mock().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&server)
        .await;

    let store = DriveRemoteStore::new(client);
    let missing = UploadSource::new("/nonexistent/gdup/payload", 3);
    let err = store
        .create_file(&RemoteId::root(), "x", &missing, "text/plain")
        .await
        .unwrap_err();
    assert!(matches!(err.downcast_ref::<RemoteError>(), Some(RemoteError::Transport(_))));
}

#[tokio::test]
async fn test_upload_without_checksum_is_rejected() {
    let dir = TempDir::new().unwrap();
    let (server, client) = common::setup_drive_mock().await;
    Mock::given(method("POST"))
        .and(path("/upload/files"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": "f8",
            "title": "doc",
            "mimeType": "application/vnd.google-apps.document",
        })))
        .mount(&server)
        .await;

    let store = DriveRemoteStore::new(client);
    let err = store
        .create_file(&RemoteId::root(), "doc", &source(&dir, b"x"), "text/plain")
        .await
        .unwrap_err();
    assert!(err.to_string().contains("no size or checksum"));
}
