//! Shared wiremock helpers for Drive v2 integration tests

use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use gdup_drive::DriveClient;

pub const TEST_TOKEN: &str = "test-access-token";

/// Starts a mock server and returns a client pointed at it
///
/// Metadata requests go to `{uri}`, media uploads to `{uri}/upload`.
pub async fn setup_drive_mock() -> (MockServer, DriveClient) {
    let server = MockServer::start().await;
    let client = DriveClient::with_base_urls(
        TEST_TOKEN,
        server.uri(),
        format!("{}/upload", server.uri()),
    );
    (server, client)
}

/// A Drive v2 file resource as the API returns it
pub fn file_json(id: &str, title: &str, mime: &str, size: u64, md5: &str) -> serde_json::Value {
    serde_json::json!({
        "id": id,
        "title": title,
        "mimeType": mime,
        "fileSize": size.to_string(),
        "md5Checksum": md5,
    })
}

pub fn folder_json(id: &str, title: &str) -> serde_json::Value {
    serde_json::json!({
        "id": id,
        "title": title,
        "mimeType": "application/vnd.google-apps.folder",
    })
}

/// Mounts a `files.list` answer for the exact query `q`
pub async fn mount_list(server: &MockServer, q: &str, items: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path("/files"))
        .and(query_param("q", q))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "items": items,
        })))
        .mount(server)
        .await;
}
