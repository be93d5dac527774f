//! Remote store port (driven/secondary port)
//!
//! This module defines the capabilities the sync protocol needs from a
//! hierarchical object store: objects are addressed by `(parent, title)`
//! and are either folders or files.
//!
//! ## Design Notes
//!
//! - Methods return `anyhow::Result`. Adapters put a [`RemoteError`] inside
//!   the `anyhow::Error` whenever they can classify the failure, and the
//!   audit recorder downcasts to it to pick the record's status code.
//! - `lookup` returns `Ok(None)` when nothing matches; a missing object is
//!   not an error at this boundary.
//! - Uploads hand the store an [`UploadSource`] rather than bytes, so an
//!   adapter can stream large files instead of holding them in memory.

use std::fmt::{self, Display, Formatter};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::audit::StatusCode;
use crate::domain::newtypes::{ContentHash, RemoteId};

/// MIME type the store uses to mark folders
pub const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";

// ============================================================================
// Remote object metadata
// ============================================================================

/// Kind of a remote object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RemoteKind {
    File,
    Folder,
}

impl RemoteKind {
    /// Classifies a store-reported MIME type
    pub fn from_mime_type(mime_type: &str) -> Self {
        if mime_type == FOLDER_MIME_TYPE {
            RemoteKind::Folder
        } else {
            RemoteKind::File
        }
    }
}

impl Display for RemoteKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            RemoteKind::File => f.write_str("file"),
            RemoteKind::Folder => f.write_str("folder"),
        }
    }
}

/// Result of a lookup or a create/update call
///
/// Folders never carry a size or content hash; files always carry both.
/// The constructors enforce this.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteObjectStat {
    id: RemoteId,
    kind: RemoteKind,
    mime_type: String,
    size: Option<u64>,
    content_hash: Option<ContentHash>,
}

impl RemoteObjectStat {
    /// Metadata for a folder
    pub fn folder(id: RemoteId) -> Self {
        Self {
            id,
            kind: RemoteKind::Folder,
            mime_type: FOLDER_MIME_TYPE.to_string(),
            size: None,
            content_hash: None,
        }
    }

    /// Metadata for a file
    pub fn file(id: RemoteId, mime_type: impl Into<String>, size: u64, content_hash: ContentHash) -> Self {
        Self {
            id,
            kind: RemoteKind::File,
            mime_type: mime_type.into(),
            size: Some(size),
            content_hash: Some(content_hash),
        }
    }

    pub fn id(&self) -> &RemoteId {
        &self.id
    }

    pub fn kind(&self) -> RemoteKind {
        self.kind
    }

    pub fn is_folder(&self) -> bool {
        self.kind == RemoteKind::Folder
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    /// File size in bytes; `None` for folders
    pub fn size(&self) -> Option<u64> {
        self.size
    }

    /// MD5 of the file content; `None` for folders
    pub fn content_hash(&self) -> Option<&ContentHash> {
        self.content_hash.as_ref()
    }

    /// True when this is a file with exactly the given size and hash
    pub fn matches_content(&self, size: u64, content_hash: &ContentHash) -> bool {
        self.size == Some(size) && self.content_hash.as_ref() == Some(content_hash)
    }
}

/// A named entry of a folder listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteChild {
    pub title: String,
    pub stat: RemoteObjectStat,
}

/// A local file to be uploaded, with the size it had when it was hashed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadSource {
    path: PathBuf,
    size: u64,
}

impl UploadSource {
    pub fn new(path: impl Into<PathBuf>, size: u64) -> Self {
        Self {
            path: path.into(),
            size,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn size(&self) -> u64 {
        self.size
    }
}

// ============================================================================
// Classified remote failures
// ============================================================================

/// Remote failures the audit recorder knows how to classify
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RemoteError {
    /// The store answered with a non-success status
    #[error("remote store returned {code}: {message}")]
    Status { code: u16, message: String },

    /// An object that had to exist was not found
    #[error("expected remote object is missing: {0}")]
    Missing(String),

    /// The operation targets the broken-parent sentinel
    #[error("parent folder could not be created")]
    BrokenParent,

    /// The request never produced a response
    #[error("transport failure: {0}")]
    Transport(String),
}

impl RemoteError {
    /// Audit status for this failure
    pub fn status(&self) -> StatusCode {
        match self {
            RemoteError::Status { code, .. } => StatusCode::new(*code),
            RemoteError::Missing(_) | RemoteError::BrokenParent => StatusCode::NOT_FOUND,
            RemoteError::Transport(_) => StatusCode::UNHANDLED,
        }
    }
}

// ============================================================================
// IRemoteStore trait
// ============================================================================

/// Port trait for a hierarchical remote object store
///
/// One handle is shared by the walker and every worker.
#[async_trait::async_trait]
pub trait IRemoteStore: Send + Sync {
    /// Finds the non-trashed object named `title` directly under `parent`
    ///
    /// # Returns
    /// `None` when no object matches
    async fn lookup(&self, parent: &RemoteId, title: &str) -> anyhow::Result<Option<RemoteObjectStat>>;

    /// Creates a folder named `title` under `parent`
    async fn create_folder(&self, parent: &RemoteId, title: &str) -> anyhow::Result<RemoteObjectStat>;

    /// Creates a file named `title` under `parent` with the content of `source`
    async fn create_file(
        &self,
        parent: &RemoteId,
        title: &str,
        source: &UploadSource,
        mime_type: &str,
    ) -> anyhow::Result<RemoteObjectStat>;

    /// Replaces the content of an existing file with the content of `source`
    async fn update_file(
        &self,
        id: &RemoteId,
        source: &UploadSource,
        mime_type: &str,
    ) -> anyhow::Result<RemoteObjectStat>;

    /// Lists the direct children of a folder
    async fn list_children(&self, parent: &RemoteId) -> anyhow::Result<Vec<RemoteChild>>;
}
