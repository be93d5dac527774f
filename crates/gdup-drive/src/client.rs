//! Google Drive v2 API client
//!
//! Provides a typed HTTP client for the subset of the Drive v2 API gdup
//! needs: `files.list` with a query, `files.insert` for folders, and media
//! uploads for file creation and update.
//!
//! ## Uploads
//!
//! Files up to [`MULTIPART_LIMIT`] bytes are sent in one
//! `uploadType=multipart` request. Larger files open a resumable session
//! and are streamed from disk in [`CHUNK_SIZE`] pieces, so memory use does
//! not grow with the file.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use gdup_drive::client::DriveClient;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let client = DriveClient::new("ya29.access-token");
//! let children = client.list_children("root").await?;
//! println!("{} items in root", children.len());
//! # Ok(())
//! # }
//! ```

use std::io::SeekFrom;

use reqwest::header::{CONTENT_LENGTH, CONTENT_RANGE, CONTENT_TYPE, LOCATION, RANGE};
use reqwest::{Body, Client, Method, RequestBuilder, Response};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::json;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio_util::io::ReaderStream;
use tracing::{debug, info};

use gdup_core::ports::remote_store::{UploadSource, FOLDER_MIME_TYPE};

use crate::DriveError;

/// Base URL for the Drive v2 metadata API
const DRIVE_API_URL: &str = "https://www.googleapis.com/drive/v2";

/// Base URL for the Drive v2 media upload API
const DRIVE_UPLOAD_URL: &str = "https://www.googleapis.com/upload/drive/v2";

/// Fields requested for a single file resource
pub const FILE_FIELDS: &str = "id,title,mimeType,fileSize,md5Checksum";

/// Largest file sent as a single multipart request: 5 MiB
pub const MULTIPART_LIMIT: u64 = 5 * 1024 * 1024;

/// Chunk size for resumable uploads: 8 MiB
///
/// Drive requires every chunk but the last to be a multiple of 256 KiB.
pub const CHUNK_SIZE: u64 = 8 * 1024 * 1024;

/// Status Drive answers with while a resumable session expects more bytes
const RESUME_INCOMPLETE: u16 = 308;

// ============================================================================
// Drive API response types
// ============================================================================

/// A Drive v2 file resource, restricted to the requested fields
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriveFile {
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    pub mime_type: String,
    /// Drive v2 reports sizes as decimal strings
    #[serde(default, deserialize_with = "size_from_string")]
    pub file_size: Option<u64>,
    #[serde(default)]
    pub md5_checksum: Option<String>,
}

impl DriveFile {
    pub fn is_folder(&self) -> bool {
        self.mime_type == FOLDER_MIME_TYPE
    }
}

/// Response from `files.list`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileList {
    #[serde(default)]
    items: Vec<DriveFile>,
    next_page_token: Option<String>,
}

/// Error body returned by Google APIs
#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: String,
}

/// Parent reference in a file resource
#[derive(Debug, Serialize)]
struct ParentRef<'a> {
    id: &'a str,
}

fn size_from_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u64>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Size {
        Text(String),
        Number(u64),
    }

    match Option::<Size>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Size::Number(n)) => Ok(Some(n)),
        Some(Size::Text(s)) => s.parse().map(Some).map_err(serde::de::Error::custom),
    }
}

/// Where a resumable session stands after one chunk
#[derive(Debug)]
pub enum ChunkProgress {
    /// The server holds every byte before `next_offset`
    Incomplete { next_offset: u64 },
    /// The last byte arrived and the file resource was returned
    Complete(DriveFile),
}

/// Offset following the last persisted byte, from a `Range: bytes=0-N` header
///
/// No header means nothing has been persisted yet.
fn next_offset(response: &Response) -> Result<u64, DriveError> {
    let Some(value) = response.headers().get(RANGE) else {
        return Ok(0);
    };
    let invalid = || DriveError::InvalidResponse(format!("bad Range header: {value:?}"));
    let last = value
        .to_str()
        .ok()
        .and_then(|v| v.strip_prefix("bytes="))
        .and_then(|v| v.split_once('-'))
        .and_then(|(_, end)| end.parse::<u64>().ok())
        .ok_or_else(invalid)?;
    Ok(last + 1)
}

/// Quotes a title for use inside a `files.list` query string literal
pub fn escape_query_value(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}

// ============================================================================
// DriveClient
// ============================================================================

/// HTTP client for Google Drive v2 API calls
///
/// Wraps `reqwest::Client` with the bearer token and both base URLs
/// (metadata and media upload).
pub struct DriveClient {
    /// The underlying HTTP client
    client: Client,
    /// Base URL for metadata requests
    api_url: String,
    /// Base URL for media uploads
    upload_url: String,
    /// OAuth2 access token
    access_token: String,
    /// Files above this size use a resumable session
    multipart_limit: u64,
    /// Bytes sent per resumable request
    chunk_size: u64,
}

impl DriveClient {
    /// Creates a new DriveClient against the public Google endpoints
    pub fn new(access_token: impl Into<String>) -> Self {
        Self::with_base_urls(access_token, DRIVE_API_URL, DRIVE_UPLOAD_URL)
    }

    /// Creates a new DriveClient with custom base URLs (configuration, tests)
    pub fn with_base_urls(
        access_token: impl Into<String>,
        api_url: impl Into<String>,
        upload_url: impl Into<String>,
    ) -> Self {
        Self {
            client: Client::new(),
            api_url: api_url.into().trim_end_matches('/').to_string(),
            upload_url: upload_url.into().trim_end_matches('/').to_string(),
            access_token: access_token.into(),
            multipart_limit: MULTIPART_LIMIT,
            chunk_size: CHUNK_SIZE,
        }
    }

    /// Overrides the multipart size limit and the resumable chunk size
    pub fn with_upload_limits(mut self, multipart_limit: u64, chunk_size: u64) -> Self {
        self.multipart_limit = multipart_limit;
        self.chunk_size = chunk_size.max(1);
        self
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    pub fn upload_url(&self) -> &str {
        &self.upload_url
    }

    /// Creates an authenticated request against the metadata API
    pub fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.api_url, path);
        self.client.request(method, &url).bearer_auth(&self.access_token)
    }

    fn upload_request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.upload_url, path);
        self.client.request(method, &url).bearer_auth(&self.access_token)
    }

    /// Turns a non-success response into [`DriveError::Status`]
    async fn check(response: Response) -> Result<Response, DriveError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorBody>(&body)
            .map(|b| b.error.message)
            .unwrap_or_else(|_| status.canonical_reason().unwrap_or("unknown").to_string());
        Err(DriveError::Status {
            code: status.as_u16(),
            message,
        })
    }

    async fn json<T: for<'de> Deserialize<'de>>(response: Response) -> Result<T, DriveError> {
        let bytes = Self::check(response).await?.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|e| DriveError::InvalidResponse(e.to_string()))
    }

    async fn list(&self, query: &str, page_token: Option<&str>) -> Result<FileList, DriveError> {
        let fields = format!("nextPageToken,items({FILE_FIELDS})");
        let mut request = self
            .request(Method::GET, "/files")
            .query(&[("q", query), ("fields", fields.as_str())]);
        if let Some(token) = page_token {
            request = request.query(&[("pageToken", token)]);
        }
        Self::json(request.send().await?).await
    }

    /// Finds the non-trashed item named `title` directly under `parent`
    ///
    /// When several items share the title, the first one returned wins.
    pub async fn find_child(&self, parent: &str, title: &str) -> Result<Option<DriveFile>, DriveError> {
        let query = format!(
            "'{}' in parents and title='{}' and trashed=false",
            escape_query_value(parent),
            escape_query_value(title)
        );
        debug!(%query, "Looking up Drive item");
        let list = self.list(&query, None).await?;
        if list.items.len() > 1 {
            debug!(parent, title, matches = list.items.len(), "Several items share a title");
        }
        Ok(list.items.into_iter().next())
    }

    /// Lists every non-trashed child of `parent`, following `nextPageToken`
    pub async fn list_children(&self, parent: &str) -> Result<Vec<DriveFile>, DriveError> {
        let query = format!("'{}' in parents and trashed=false", escape_query_value(parent));
        let mut items = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let page = self.list(&query, page_token.as_deref()).await?;
            items.extend(page.items);
            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }
        debug!(parent, count = items.len(), "Listed Drive folder");
        Ok(items)
    }

    /// Creates a folder via `files.insert`
    pub async fn create_folder(&self, parent: &str, title: &str) -> Result<DriveFile, DriveError> {
        let body = json!({
            "title": title,
            "mimeType": FOLDER_MIME_TYPE,
            "parents": [ParentRef { id: parent }],
        });
        let response = self
            .request(Method::POST, "/files")
            .query(&[("fields", FILE_FIELDS)])
            .json(&body)
            .send()
            .await?;
        Self::json(response).await
    }

    /// Creates a file named `title` under `parent` with the content of `source`
    pub async fn insert_file(
        &self,
        parent: &str,
        title: &str,
        source: &UploadSource,
        mime_type: &str,
    ) -> Result<DriveFile, DriveError> {
        let metadata = json!({
            "title": title,
            "mimeType": mime_type,
            "parents": [ParentRef { id: parent }],
        });
        self.upload(Method::POST, "/files", &metadata, source, mime_type)
            .await
    }

    /// Replaces the content of an existing file with the content of `source`
    pub async fn update_file(
        &self,
        id: &str,
        source: &UploadSource,
        mime_type: &str,
    ) -> Result<DriveFile, DriveError> {
        let metadata = json!({ "mimeType": mime_type });
        let path = format!("/files/{id}");
        self.upload(Method::PUT, &path, &metadata, source, mime_type)
            .await
    }

    async fn upload(
        &self,
        method: Method,
        path: &str,
        metadata: &serde_json::Value,
        source: &UploadSource,
        mime_type: &str,
    ) -> Result<DriveFile, DriveError> {
        if source.size() <= self.multipart_limit {
            let content = tokio::fs::read(source.path()).await?;
            return self
                .multipart(method, path, metadata, &content, mime_type)
                .await;
        }
        let session = self
            .create_upload_session(method, path, metadata, source.size(), mime_type)
            .await?;
        self.upload_large(&session, source).await
    }

    async fn multipart(
        &self,
        method: Method,
        path: &str,
        metadata: &serde_json::Value,
        content: &[u8],
        mime_type: &str,
    ) -> Result<DriveFile, DriveError> {
        let boundary = format!("gdup-{}", uuid::Uuid::new_v4().simple());
        let body = multipart_related_body(&boundary, metadata, content, mime_type);
        debug!(path, bytes = content.len(), "Uploading media");
        let response = self
            .upload_request(method, path)
            .query(&[("uploadType", "multipart"), ("fields", FILE_FIELDS)])
            .header(CONTENT_TYPE, format!("multipart/related; boundary={boundary}"))
            .body(body)
            .send()
            .await?;
        Self::json(response).await
    }

    /// Opens a resumable upload session and returns its URL
    ///
    /// The session URL comes back in the `Location` header.
    pub async fn create_upload_session(
        &self,
        method: Method,
        path: &str,
        metadata: &serde_json::Value,
        size: u64,
        mime_type: &str,
    ) -> Result<String, DriveError> {
        debug!(path, size, "Creating resumable upload session");
        let response = self
            .upload_request(method, path)
            .query(&[("uploadType", "resumable"), ("fields", FILE_FIELDS)])
            .header("X-Upload-Content-Type", mime_type)
            .header("X-Upload-Content-Length", size)
            .json(metadata)
            .send()
            .await?;
        let response = Self::check(response).await?;
        response
            .headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| DriveError::InvalidResponse("upload session has no Location header".to_string()))
    }

    /// Streams `len` bytes of `source` starting at `offset` into a session
    pub async fn upload_chunk(
        &self,
        session_url: &str,
        source: &UploadSource,
        offset: u64,
        len: u64,
    ) -> Result<ChunkProgress, DriveError> {
        let mut file = tokio::fs::File::open(source.path()).await?;
        file.seek(SeekFrom::Start(offset)).await?;
        let body = Body::wrap_stream(ReaderStream::new(file.take(len)));
        let range = format!("bytes {}-{}/{}", offset, offset + len - 1, source.size());
        debug!(content_range = %range, "Uploading chunk");

        let response = self
            .client
            .put(session_url)
            .bearer_auth(&self.access_token)
            .header(CONTENT_LENGTH, len)
            .header(CONTENT_RANGE, range)
            .body(body)
            .send()
            .await?;

        if response.status().as_u16() == RESUME_INCOMPLETE {
            return Ok(ChunkProgress::Incomplete {
                next_offset: next_offset(&response)?,
            });
        }
        Self::json(response).await.map(ChunkProgress::Complete)
    }

    /// Sends `source` through a resumable session, one chunk at a time
    ///
    /// Resumes from whatever offset the server reports after each chunk.
    async fn upload_large(&self, session_url: &str, source: &UploadSource) -> Result<DriveFile, DriveError> {
        let total = source.size();
        info!(
            path = %source.path().display(),
            bytes = total,
            chunks = total.div_ceil(self.chunk_size),
            "Starting resumable upload"
        );

        let mut offset = 0;
        while offset < total {
            let len = self.chunk_size.min(total - offset);
            match self.upload_chunk(session_url, source, offset, len).await? {
                ChunkProgress::Complete(file) => {
                    info!(id = %file.id, bytes = total, "Resumable upload completed");
                    return Ok(file);
                }
                ChunkProgress::Incomplete { next_offset } if next_offset > offset => {
                    offset = next_offset;
                }
                ChunkProgress::Incomplete { next_offset } => {
                    return Err(DriveError::InvalidResponse(format!(
                        "upload session stalled at byte {next_offset} of {total}"
                    )));
                }
            }
        }
        Err(DriveError::InvalidResponse(
            "upload session accepted every byte but returned no file".to_string(),
        ))
    }
}

/// Builds a `multipart/related` body: JSON metadata part, then the media part
fn multipart_related_body(
    boundary: &str,
    metadata: &serde_json::Value,
    content: &[u8],
    mime_type: &str,
) -> Vec<u8> {
    let mut body = Vec::with_capacity(content.len() + 512);
    body.extend_from_slice(
        format!("--{boundary}\r\nContent-Type: application/json; charset=UTF-8\r\n\r\n{metadata}\r\n")
            .as_bytes(),
    );
    body.extend_from_slice(format!("--{boundary}\r\nContent-Type: {mime_type}\r\n\r\n").as_bytes());
    body.extend_from_slice(content);
    body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());
    body
}
