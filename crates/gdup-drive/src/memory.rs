//! InMemoryRemoteStore - IRemoteStore kept in process memory
//!
//! Behaves like the Drive adapter as far as the sync protocol can tell:
//! titles are unique per folder, creating under a missing parent fails with
//! 404, and content hashes are the MD5 of the stored bytes. Used by
//! `gdup run --dry-run` and by the tests.
//!
//! Failures can be injected per title with [`InMemoryRemoteStore::fail_title`].

use std::collections::HashMap;
use std::sync::Mutex;

use anyhow::{Context, Result};
use md5::{Digest, Md5};

use gdup_core::domain::newtypes::{ContentHash, RemoteId};
use gdup_core::ports::remote_store::{IRemoteStore, RemoteChild, RemoteError, RemoteObjectStat, UploadSource};

#[derive(Debug, Clone)]
struct StoredObject {
    parent: RemoteId,
    title: String,
    stat: RemoteObjectStat,
    content: Vec<u8>,
}

#[derive(Default)]
struct StoreState {
    next_id: u64,
    objects: HashMap<RemoteId, StoredObject>,
    failures: HashMap<String, RemoteError>,
}

impl StoreState {
    fn allocate_id(&mut self) -> RemoteId {
        self.next_id += 1;
        // "m" followed by digits is always a valid remote id
        RemoteId::new(format!("m{:06}", self.next_id)).unwrap_or_else(|_| RemoteId::root())
    }

    fn is_folder(&self, id: &RemoteId) -> bool {
        id.as_str() == RemoteId::ROOT_ALIAS
            || self.objects.get(id).is_some_and(|o| o.stat.is_folder())
    }

    fn child(&self, parent: &RemoteId, title: &str) -> Option<&StoredObject> {
        self.objects
            .values()
            .find(|o| &o.parent == parent && o.title == title)
    }

    fn check_failure(&self, title: &str) -> Result<(), RemoteError> {
        match self.failures.get(title) {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    /// Validates that a new object `title` may be created under `parent`
    fn check_create(&self, parent: &RemoteId, title: &str) -> Result<(), RemoteError> {
        self.check_failure(title)?;
        if !self.is_folder(parent) {
            return Err(RemoteError::Status {
                code: 404,
                message: format!("File not found: {parent}"),
            });
        }
        if self.child(parent, title).is_some() {
            return Err(RemoteError::Status {
                code: 409,
                message: format!("{title} already exists in {parent}"),
            });
        }
        Ok(())
    }
}

async fn read_source(source: &UploadSource) -> Result<Vec<u8>> {
    tokio::fs::read(source.path())
        .await
        .with_context(|| format!("reading upload source {}", source.path().display()))
}

fn file_stat(id: RemoteId, content: &[u8], mime_type: &str) -> RemoteObjectStat {
    let digest: [u8; 16] = Md5::digest(content).into();
    RemoteObjectStat::file(
        id,
        mime_type,
        content.len() as u64,
        ContentHash::from_digest(digest),
    )
}

/// Hierarchical store held in a mutex
///
/// The folder `root` always exists and cannot be looked up by title.
#[derive(Default)]
pub struct InMemoryRemoteStore {
    state: Mutex<StoreState>,
}

impl InMemoryRemoteStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, StoreState>, RemoteError> {
        self.state
            .lock()
            .map_err(|_| RemoteError::Transport("in-memory store lock poisoned".to_string()))
    }

    /// Makes every lookup, create and update of `title` fail with `error`
    pub fn fail_title(&self, title: impl Into<String>, error: RemoteError) {
        if let Ok(mut state) = self.lock() {
            state.failures.insert(title.into(), error);
        }
    }

    /// Metadata of the object named `title` directly under `parent`
    pub fn get(&self, parent: &RemoteId, title: &str) -> Option<RemoteObjectStat> {
        let state = self.lock().ok()?;
        state.child(parent, title).map(|o| o.stat.clone())
    }

    /// Stored bytes of a file
    pub fn content(&self, id: &RemoteId) -> Option<Vec<u8>> {
        let state = self.lock().ok()?;
        state
            .objects
            .get(id)
            .filter(|o| !o.stat.is_folder())
            .map(|o| o.content.clone())
    }

    /// Resolves a `/`-separated path of titles below `root`
    pub fn find_path(&self, root: &RemoteId, path: &str) -> Option<RemoteObjectStat> {
        let state = self.lock().ok()?;
        let mut current = RemoteObjectStat::folder(root.clone());
        for title in path.split('/').filter(|s| !s.is_empty()) {
            current = state.child(current.id(), title)?.stat.clone();
        }
        Some(current)
    }

    /// Number of stored objects, not counting the root
    pub fn object_count(&self) -> usize {
        self.lock().map(|s| s.objects.len()).unwrap_or(0)
    }
}

#[async_trait::async_trait]
impl IRemoteStore for InMemoryRemoteStore {
    async fn lookup(&self, parent: &RemoteId, title: &str) -> Result<Option<RemoteObjectStat>> {
        let state = self.lock()?;
        state.check_failure(title)?;
        Ok(state.child(parent, title).map(|o| o.stat.clone()))
    }

    async fn create_folder(&self, parent: &RemoteId, title: &str) -> Result<RemoteObjectStat> {
        let mut state = self.lock()?;
        state.check_create(parent, title)?;
        let id = state.allocate_id();
        let stat = RemoteObjectStat::folder(id.clone());
        state.objects.insert(
            id,
            StoredObject {
                parent: parent.clone(),
                title: title.to_string(),
                stat: stat.clone(),
                content: Vec::new(),
            },
        );
        Ok(stat)
    }

    async fn create_file(
        &self,
        parent: &RemoteId,
        title: &str,
        source: &UploadSource,
        mime_type: &str,
    ) -> Result<RemoteObjectStat> {
        let content = read_source(source).await?;
        let mut state = self.lock()?;
        state.check_create(parent, title)?;
        let id = state.allocate_id();
        let stat = file_stat(id.clone(), &content, mime_type);
        state.objects.insert(
            id,
            StoredObject {
                parent: parent.clone(),
                title: title.to_string(),
                stat: stat.clone(),
                content,
            },
        );
        Ok(stat)
    }

    async fn update_file(&self, id: &RemoteId, source: &UploadSource, mime_type: &str) -> Result<RemoteObjectStat> {
        let content = read_source(source).await?;
        let mut state = self.lock()?;
        let title = match state.objects.get(id) {
            Some(o) if !o.stat.is_folder() => o.title.clone(),
            _ => {
                return Err(RemoteError::Status {
                    code: 404,
                    message: format!("File not found: {id}"),
                }
                .into())
            }
        };
        state.check_failure(&title)?;
        let stat = file_stat(id.clone(), &content, mime_type);
        if let Some(object) = state.objects.get_mut(id) {
            object.stat = stat.clone();
            object.content = content;
        }
        Ok(stat)
    }

    async fn list_children(&self, parent: &RemoteId) -> Result<Vec<RemoteChild>> {
        let state = self.lock()?;
        if !state.is_folder(parent) {
            return Err(RemoteError::Status {
                code: 404,
                message: format!("File not found: {parent}"),
            }
            .into());
        }
        let mut children: Vec<RemoteChild> = state
            .objects
            .values()
            .filter(|o| &o.parent == parent)
            .map(|o| RemoteChild {
                title: o.title.clone(),
                stat: o.stat.clone(),
            })
            .collect();
        children.sort_by(|a, b| a.title.cmp(&b.title));
        Ok(children)
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    /// Writes `content` to a file in `dir` and describes it for upload
    fn source(dir: &TempDir, name: &str, content: &[u8]) -> UploadSource {
        let path = dir.path().join(name);
        std::fs::write(&path, content).unwrap();
        UploadSource::new(path, content.len() as u64)
    }

    fn status_of(err: &anyhow::Error) -> u16 {
        err.downcast_ref::<RemoteError>().map(|e| e.status().as_u16()).unwrap_or(0)
    }

    #[tokio::test]
    async fn test_create_and_lookup() {
        let store = InMemoryRemoteStore::new();
        let root = RemoteId::root();
        let folder = store.create_folder(&root, "docs").await.unwrap();
        assert!(folder.is_folder());
        assert_eq!(folder.id().as_str(), "m000001");

        let found = store.lookup(&root, "docs").await.unwrap().unwrap();
        assert_eq!(found.id(), folder.id());
        assert!(store.lookup(&root, "other").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_file_hash_is_md5_of_content() {
        let dir = TempDir::new().unwrap();
        let store = InMemoryRemoteStore::new();
        let stat = store
            .create_file(&RemoteId::root(), "a.txt", &source(&dir, "a", b""), "text/plain")
            .await
            .unwrap();
        assert_eq!(stat.size(), Some(0));
        assert_eq!(
            stat.content_hash().unwrap().as_str(),
            "d41d8cd98f00b204e9800998ecf8427e"
        );
        assert_eq!(store.content(stat.id()).unwrap(), b"".to_vec());
    }

    #[tokio::test]
    async fn test_duplicate_title_conflicts() {
        let dir = TempDir::new().unwrap();
        let store = InMemoryRemoteStore::new();
        let root = RemoteId::root();
        store.create_folder(&root, "x").await.unwrap();
        let err = store
            .create_file(&root, "x", &source(&dir, "x", b"1"), "text/plain")
            .await
            .unwrap_err();
        assert_eq!(status_of(&err), 409);
    }

    #[tokio::test]
    async fn test_create_under_missing_parent_is_not_found() {
        let store = InMemoryRemoteStore::new();
        let missing = RemoteId::new("nope".to_string()).unwrap();
        let err = store.create_folder(&missing, "x").await.unwrap_err();
        assert_eq!(status_of(&err), 404);
    }

    #[tokio::test]
    async fn test_update_replaces_content() {
        let dir = TempDir::new().unwrap();
        let store = InMemoryRemoteStore::new();
        let created = store
            .create_file(&RemoteId::root(), "a.txt", &source(&dir, "old", b"old"), "text/plain")
            .await
            .unwrap();
        let updated = store
            .update_file(created.id(), &source(&dir, "new", b"newer"), "text/plain")
            .await
            .unwrap();
        assert_eq!(updated.id(), created.id());
        assert_eq!(updated.size(), Some(5));
        assert_eq!(store.content(created.id()).unwrap(), b"newer".to_vec());
    }

    #[tokio::test]
    async fn test_update_folder_is_not_found() {
        let dir = TempDir::new().unwrap();
        let store = InMemoryRemoteStore::new();
        let folder = store.create_folder(&RemoteId::root(), "d").await.unwrap();
        let err = store
            .update_file(folder.id(), &source(&dir, "x", b"x"), "text/plain")
            .await
            .unwrap_err();
        assert_eq!(status_of(&err), 404);
    }

    #[tokio::test]
    async fn test_unreadable_source_stores_nothing() {
        let store = InMemoryRemoteStore::new();
        let missing = UploadSource::new("/nonexistent/gdup/file", 3);
        let err = store
            .create_file(&RemoteId::root(), "f", &missing, "text/plain")
            .await
            .unwrap_err();
        assert!(err.downcast_ref::<RemoteError>().is_none());
        assert_eq!(store.object_count(), 0);
    }

    #[tokio::test]
    async fn test_injected_failure() {
        let store = InMemoryRemoteStore::new();
        store.fail_title(
            "flaky",
            RemoteError::Status {
                code: 403,
                message: "Rate Limit Exceeded".to_string(),
            },
        );
        let err = store.lookup(&RemoteId::root(), "flaky").await.unwrap_err();
        assert_eq!(status_of(&err), 403);
        assert_eq!(store.object_count(), 0);
    }

    #[tokio::test]
    async fn test_find_path_and_listing() {
        let dir = TempDir::new().unwrap();
        let store = InMemoryRemoteStore::new();
        let root = RemoteId::root();
        let a = store.create_folder(&root, "a").await.unwrap();
        let b = store.create_folder(a.id(), "b").await.unwrap();
        store
            .create_file(a.id(), "z.txt", &source(&dir, "z", b"z"), "text/plain")
            .await
            .unwrap();

        assert_eq!(store.find_path(&root, "a/b").unwrap().id(), b.id());
        assert!(store.find_path(&root, "a/c").is_none());

        let titles: Vec<String> = store
            .list_children(a.id())
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.title)
            .collect();
        assert_eq!(titles, vec!["b".to_string(), "z.txt".to_string()]);
    }
}
