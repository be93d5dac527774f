//! DriveRemoteStore - IRemoteStore implementation for Google Drive
//!
//! Wraps the [`DriveClient`] and maps Drive file resources onto
//! [`RemoteObjectStat`]. Every failure leaves this module as a
//! [`RemoteError`] inside the `anyhow::Error`, so the audit recorder can
//! classify it.
//!
//! ## Design Notes
//!
//! - Google-native documents carry no `md5Checksum`; they cannot be
//!   compared with local files and are reported as an invalid response.

use anyhow::Result;
use tracing::instrument;

use gdup_core::domain::newtypes::{ContentHash, RemoteId};
use gdup_core::ports::remote_store::{IRemoteStore, RemoteChild, RemoteError, RemoteObjectStat, UploadSource};

use crate::client::{DriveClient, DriveFile};
use crate::DriveError;

/// Converts a Drive file resource into port-level metadata
fn to_stat(file: DriveFile) -> Result<RemoteObjectStat, DriveError> {
    let id = RemoteId::new(file.id.clone())
        .map_err(|e| DriveError::InvalidResponse(e.to_string()))?;
    if file.is_folder() {
        return Ok(RemoteObjectStat::folder(id));
    }
    let (Some(size), Some(md5)) = (file.file_size, file.md5_checksum) else {
        return Err(DriveError::InvalidResponse(format!(
            "file {} ({}) has no size or checksum",
            file.id, file.mime_type
        )));
    };
    let hash = ContentHash::new(md5).map_err(|e| DriveError::InvalidResponse(e.to_string()))?;
    Ok(RemoteObjectStat::file(id, file.mime_type, size, hash))
}

fn remote(err: DriveError) -> anyhow::Error {
    RemoteError::from(err).into()
}

/// Remote store implementation that delegates to the Drive v2 API
pub struct DriveRemoteStore {
    client: DriveClient,
}

impl DriveRemoteStore {
    /// Creates a new store from a configured client
    pub fn new(client: DriveClient) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &DriveClient {
        &self.client
    }
}

#[async_trait::async_trait]
impl IRemoteStore for DriveRemoteStore {
    #[instrument(skip(self), fields(parent = %parent))]
    async fn lookup(&self, parent: &RemoteId, title: &str) -> Result<Option<RemoteObjectStat>> {
        let found = self
            .client
            .find_child(parent.as_str(), title)
            .await
            .map_err(remote)?;
        found.map(to_stat).transpose().map_err(remote)
    }

    #[instrument(skip(self), fields(parent = %parent))]
    async fn create_folder(&self, parent: &RemoteId, title: &str) -> Result<RemoteObjectStat> {
        let created = self
            .client
            .create_folder(parent.as_str(), title)
            .await
            .map_err(remote)?;
        to_stat(created).map_err(remote)
    }

    #[instrument(skip(self, source), fields(parent = %parent, bytes = source.size()))]
    async fn create_file(
        &self,
        parent: &RemoteId,
        title: &str,
        source: &UploadSource,
        mime_type: &str,
    ) -> Result<RemoteObjectStat> {
        let created = self
            .client
            .insert_file(parent.as_str(), title, source, mime_type)
            .await
            .map_err(remote)?;
        to_stat(created).map_err(remote)
    }

    #[instrument(skip(self, source), fields(id = %id, bytes = source.size()))]
    async fn update_file(&self, id: &RemoteId, source: &UploadSource, mime_type: &str) -> Result<RemoteObjectStat> {
        let updated = self
            .client
            .update_file(id.as_str(), source, mime_type)
            .await
            .map_err(remote)?;
        to_stat(updated).map_err(remote)
    }

    #[instrument(skip(self), fields(parent = %parent))]
    async fn list_children(&self, parent: &RemoteId) -> Result<Vec<RemoteChild>> {
        let files = self
            .client
            .list_children(parent.as_str())
            .await
            .map_err(remote)?;
        let mut children = Vec::with_capacity(files.len());
        for file in files {
            let title = file.title.clone().unwrap_or_default();
            match to_stat(file) {
                Ok(stat) => children.push(RemoteChild { title, stat }),
                Err(e) => tracing::debug!(title = %title, error = %e, "Skipping item without content metadata"),
            }
        }
        Ok(children)
    }
}
