//! Idempotent remote operations
//!
//! [`SyncProtocol`] turns the raw [`IRemoteStore`] capabilities into the
//! operations the walker and workers use. Each of `stat`, `mkdir`,
//! `upload` and `bad_source` runs inside its own audit span, so every call
//! writes exactly one record and never returns an error: callers branch on
//! the [`Outcome`] instead.
//!
//! ## Decision tables
//!
//! `mkdir(parent, title)`:
//!
//! | lookup            | action        | status |
//! |-------------------|---------------|--------|
//! | not found         | create folder | 200    |
//! | folder            | none          | 304    |
//! | file              | reject        | 409    |
//!
//! `upload(source, parent, title)`:
//!
//! | lookup                      | action          | status / op    |
//! |-----------------------------|-----------------|----------------|
//! | not found                   | create file     | 200 / insert   |
//! | folder                      | reject          | 409 / update   |
//! | file, same size and MD5     | skip            | 304 / update   |
//! | file, different content     | replace content | 200 / update   |
//!
//! A lookup that fails for any reason other than "not found" aborts the
//! enclosing `mkdir` or `upload`, which is recorded with the lookup's status.
//! Such a failure is never read as "not found": `upload` does not fall
//! through to `insert`, so a folder that could not be listed never gains a
//! second file with the same title.
//!
//! Uploads pass the local path and the size that was hashed to the store;
//! the file is not read into memory here.

use std::path::Path;
use std::sync::Arc;

use gdup_audit::{AuditRecorder, AuditSpan, Outcome};
use gdup_core::{
    domain::{
        audit::{AuditOperation, StatusCode},
        newtypes::{RemoteId, TargetParent},
    },
    ports::remote_store::{IRemoteStore, RemoteError, RemoteObjectStat, UploadSource, FOLDER_MIME_TYPE},
};
use tracing::debug;

use crate::{hashing, mime};

/// What a lookup told the enclosing operation
enum Lookup {
    Found(RemoteObjectStat),
    NotFound,
    Failed(StatusCode),
}

/// Audited remote operations shared by the walker and the workers
#[derive(Clone)]
pub struct SyncProtocol {
    store: Arc<dyn IRemoteStore>,
    recorder: Arc<AuditRecorder>,
}

impl SyncProtocol {
    pub fn new(store: Arc<dyn IRemoteStore>, recorder: Arc<AuditRecorder>) -> Self {
        Self { store, recorder }
    }

    pub fn recorder(&self) -> &Arc<AuditRecorder> {
        &self.recorder
    }

    pub fn store(&self) -> &Arc<dyn IRemoteStore> {
        &self.store
    }

    // ========================================================================
    // stat
    // ========================================================================

    /// Looks up `title` under `parent`
    ///
    /// A missing object is recorded as 404 and yields no value.
    pub async fn stat(&self, parent: &TargetParent, title: &str) -> Outcome<RemoteObjectStat> {
        let mut span = self.recorder.open(AuditOperation::Stat, parent, Some(title));
        let result = self.stat_body(&mut span, parent, title).await;
        span.finish(result)
    }

    async fn stat_body(
        &self,
        span: &mut AuditSpan<'_>,
        parent: &TargetParent,
        title: &str,
    ) -> anyhow::Result<Option<RemoteObjectStat>> {
        let parent_id = parent.id().ok_or(RemoteError::BrokenParent)?;
        match self.store.lookup(parent_id, title).await? {
            Some(stat) => {
                let record = span.record();
                record.set_child(stat.id().clone());
                record.set_mime_type(stat.mime_type());
                if let (Some(size), Some(hash)) = (stat.size(), stat.content_hash()) {
                    record.set_size(size);
                    record.set_content_hash(hash.clone());
                }
                Ok(Some(stat))
            }
            None => {
                debug!(parent = %parent_id, title, "Remote object not found");
                span.set_status(StatusCode::NOT_FOUND);
                Ok(None)
            }
        }
    }

    async fn lookup(&self, parent: &TargetParent, title: &str) -> Lookup {
        let outcome = self.stat(parent, title).await;
        match outcome.value {
            Some(stat) => Lookup::Found(stat),
            None if outcome.status == StatusCode::NOT_FOUND => Lookup::NotFound,
            None => Lookup::Failed(outcome.status),
        }
    }

    // ========================================================================
    // mkdir / mkpath
    // ========================================================================

    /// Ensures a folder named `title` exists under `parent`
    ///
    /// Yields the folder's id when it was created (200) or already
    /// existed (304).
    pub async fn mkdir(&self, parent: &TargetParent, title: &str) -> Outcome<RemoteId> {
        let mut span = self.recorder.open(AuditOperation::Mkdir, parent, Some(title));
        span.record().set_mime_type(FOLDER_MIME_TYPE);
        let result = self.mkdir_body(&mut span, parent, title).await;
        span.finish(result)
    }

    async fn mkdir_body(
        &self,
        span: &mut AuditSpan<'_>,
        parent: &TargetParent,
        title: &str,
    ) -> anyhow::Result<Option<RemoteId>> {
        match self.lookup(parent, title).await {
            Lookup::Found(existing) => {
                span.record().set_child(existing.id().clone());
                if existing.is_folder() {
                    debug!(title, id = %existing.id(), "Folder already exists");
                    span.set_status(StatusCode::NOT_MODIFIED);
                    Ok(Some(existing.id().clone()))
                } else {
                    debug!(title, parent = %parent, "A file with the folder's name already exists");
                    span.record().set_mime_type(existing.mime_type());
                    span.set_status(StatusCode::CONFLICT);
                    Ok(None)
                }
            }
            Lookup::Failed(status) => {
                span.set_status(status);
                Ok(None)
            }
            Lookup::NotFound => {
                let parent_id = parent.id().ok_or(RemoteError::BrokenParent)?;
                let created = self.store.create_folder(parent_id, title).await?;
                debug!(title, id = %created.id(), "Created folder");
                span.record().set_child(created.id().clone());
                Ok(Some(created.id().clone()))
            }
        }
    }

    /// Creates every component of `path` below `parent`
    ///
    /// `path` is split on `/` and `\`; empty components are ignored. Stops
    /// at the first component that fails and returns that failure. An empty
    /// path yields `parent` itself.
    pub async fn mkpath(&self, parent: &RemoteId, path: &str) -> Outcome<RemoteId> {
        let mut current = parent.clone();
        let mut status = StatusCode::SUCCESS;
        for component in path.split(['/', '\\']).filter(|c| !c.is_empty()) {
            let outcome = self
                .mkdir(&TargetParent::Folder(current.clone()), component)
                .await;
            status = outcome.status;
            match outcome.value {
                Some(id) => current = id,
                None => {
                    return Outcome {
                        status,
                        value: None,
                    }
                }
            }
        }
        Outcome {
            status,
            value: Some(current),
        }
    }

    // ========================================================================
    // upload
    // ========================================================================

    /// Uploads `source` as `title` under `parent`, unless an identical file
    /// is already there
    pub async fn upload(&self, source: &Path, parent: &TargetParent, title: &str) -> Outcome<RemoteObjectStat> {
        let mut span = self.recorder.open(AuditOperation::Update, parent, Some(title));
        span.record().set_source(source.display().to_string());
        let result = self.upload_body(&mut span, source, parent, title).await;
        span.finish(result)
    }

    async fn upload_body(
        &self,
        span: &mut AuditSpan<'_>,
        source: &Path,
        parent: &TargetParent,
        title: &str,
    ) -> anyhow::Result<Option<RemoteObjectStat>> {
        let (local_hash, local_size) = hashing::md5_file(source).await?;
        let mime_type = mime::guess_mime_type(source);
        {
            let record = span.record();
            record.set_size(local_size);
            record.set_content_hash(local_hash.clone());
            record.set_mime_type(mime_type);
        }

        let existing = match self.lookup(parent, title).await {
            Lookup::Failed(status) => {
                span.set_status(status);
                return Ok(None);
            }
            Lookup::NotFound => None,
            Lookup::Found(existing) => {
                span.record().set_child(existing.id().clone());
                if existing.is_folder() {
                    debug!(title, parent = %parent, "A folder with the file's name already exists");
                    span.record().set_mime_type(existing.mime_type());
                    span.set_status(StatusCode::CONFLICT);
                    return Ok(None);
                }
                if existing.matches_content(local_size, &local_hash) {
                    debug!(source = %source.display(), id = %existing.id(), "Remote copy is identical, skipping");
                    span.set_status(StatusCode::NOT_MODIFIED);
                    return Ok(Some(existing));
                }
                Some(existing)
            }
        };

        let content = UploadSource::new(source, local_size);
        let uploaded = match existing {
            Some(existing) => {
                self.store
                    .update_file(existing.id(), &content, mime_type)
                    .await?
            }
            None => {
                span.record().set_operation(AuditOperation::Insert);
                let parent_id = parent.id().ok_or(RemoteError::BrokenParent)?;
                self.store
                    .create_file(parent_id, title, &content, mime_type)
                    .await?
            }
        };

        debug!(source = %source.display(), id = %uploaded.id(), bytes = local_size, "Uploaded file");
        let record = span.record();
        record.set_child(uploaded.id().clone());
        record.set_mime_type(uploaded.mime_type());
        record.set_bytes_transferred(local_size);
        if let (Some(size), Some(hash)) = (uploaded.size(), uploaded.content_hash()) {
            record.set_size(size);
            record.set_content_hash(hash.clone());
        }
        Ok(Some(uploaded))
    }

    // ========================================================================
    // bad_source
    // ========================================================================

    /// Records a local entry that cannot be synchronized (status 417)
    pub async fn bad_source(&self, source: &Path, parent: &TargetParent) -> Outcome<()> {
        let mut span = self.recorder.open(AuditOperation::BadSource, parent, None);
        span.record().set_source(source.display().to_string());
        span.set_status(StatusCode::UNSUPPORTED_SOURCE);
        span.finish(Ok(None))
    }
}
