//! Lookups and folder listings

use gdup_core::domain::newtypes::RemoteId;
use gdup_core::ports::remote_store::{IRemoteStore, RemoteError};
use gdup_drive::{DriveError, DriveRemoteStore};
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, ResponseTemplate};

use crate::common;

#[tokio::test]
async fn test_find_child_sends_escaped_query() {
    let (server, client) = common::setup_drive_mock().await;
    common::mount_list(
        &server,
        "'root' in parents and title='it\\'s.txt' and trashed=false",
        serde_json::json!([common::file_json(
            "f1",
            "it's.txt",
            "text/plain",
            84,
            "1a6da41da9916bbcbe660978b1e6b635"
        )]),
    )
    .await;

    let found = client
        .find_child("root", "it's.txt")
        .await
        .expect("find_child failed")
        .expect("item not found");
    assert_eq!(found.id, "f1");
    assert_eq!(found.file_size, Some(84));
}

#[tokio::test]
async fn test_find_child_sends_bearer_token() {
    let (server, client) = common::setup_drive_mock().await;
    Mock::given(method("GET"))
        .and(path("/files"))
        .and(header("authorization", "Bearer test-access-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "items": [] })))
        .expect(1)
        .mount(&server)
        .await;

    let found = client.find_child("root", "nothing").await.unwrap();
    assert!(found.is_none());
}

#[tokio::test]
async fn test_store_lookup_maps_folder() {
    let (server, client) = common::setup_drive_mock().await;
    common::mount_list(
        &server,
        "'root' in parents and title='docs' and trashed=false",
        serde_json::json!([common::folder_json("d1", "docs")]),
    )
    .await;

    let store = DriveRemoteStore::new(client);
    let stat = store
        .lookup(&RemoteId::root(), "docs")
        .await
        .unwrap()
        .unwrap();
    assert!(stat.is_folder());
    assert_eq!(stat.id().as_str(), "d1");
}

#[tokio::test]
async fn test_error_status_and_message_are_kept() {
    let (server, client) = common::setup_drive_mock().await;
    Mock::given(method("GET"))
        .and(path("/files"))
        .respond_with(ResponseTemplate::new(403).set_body_json(serde_json::json!({
            "error": { "code": 403, "message": "Rate Limit Exceeded" }
        })))
        .mount(&server)
        .await;

    let err = client.find_child("root", "x").await.unwrap_err();
    match err {
        DriveError::Status { code, message } => {
            assert_eq!(code, 403);
            assert_eq!(message, "Rate Limit Exceeded");
        }
        other => panic!("unexpected error: {other:?}"),
    }

    let (_empty, other) = common::setup_drive_mock().await;
    let store = DriveRemoteStore::new(other);
    let err = store.lookup(&RemoteId::root(), "x").await.unwrap_err();
    // a server without mocks answers 404
    assert_eq!(
        err.downcast_ref::<RemoteError>().map(|e| e.status().as_u16()),
        Some(404)
    );
}

#[tokio::test]
async fn test_list_children_follows_pages() {
    let (server, client) = common::setup_drive_mock().await;
    let q = "'d1' in parents and trashed=false";

    Mock::given(method("GET"))
        .and(path("/files"))
        .and(query_param("q", q))
        .and(query_param("pageToken", "page2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "items": [common::folder_json("d2", "sub")],
        })))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/files"))
        .and(query_param("q", q))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "items": [common::file_json("f1", "a.txt", "text/plain", 3, "900150983cd24fb0d6963f7d28e17f72")],
            "nextPageToken": "page2",
        })))
        .up_to_n_times(1)
        .mount(&server)
        .await;

    let items = client.list_children("d1").await.expect("list failed");
    let ids: Vec<&str> = items.iter().map(|f| f.id.as_str()).collect();
    assert_eq!(ids, vec!["f1", "d2"]);
}
