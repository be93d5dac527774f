//! Upload task entity
//!
//! An [`UploadTask`] is produced by the directory walker for every regular
//! file it finds and consumed exactly once by a worker.

use std::path::{Path, PathBuf};

use super::newtypes::TargetParent;

/// One file scheduled for upload
///
/// Fields are private and there are no setters: a task is never modified
/// after the walker creates it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadTask {
    source_path: PathBuf,
    parent: TargetParent,
    title: String,
}

impl UploadTask {
    /// Creates a new task
    pub fn new(source_path: impl Into<PathBuf>, parent: TargetParent, title: impl Into<String>) -> Self {
        Self {
            source_path: source_path.into(),
            parent,
            title: title.into(),
        }
    }

    /// Local file to upload
    pub fn source_path(&self) -> &Path {
        &self.source_path
    }

    /// Remote folder the file goes into
    pub fn parent(&self) -> &TargetParent {
        &self.parent
    }

    /// Remote title of the file
    pub fn title(&self) -> &str {
        &self.title
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::newtypes::RemoteId;

    #[test]
    fn test_task_accessors() {
        let task = UploadTask::new(
            "/tmp/photos/a.jpg",
            TargetParent::from(RemoteId::root()),
            "a.jpg",
        );
        assert_eq!(task.source_path(), Path::new("/tmp/photos/a.jpg"));
        assert_eq!(task.parent().id().map(RemoteId::as_str), Some("root"));
        assert_eq!(task.title(), "a.jpg");
    }

    #[test]
    fn test_task_on_broken_parent() {
        let task = UploadTask::new("/x", TargetParent::Broken, "x");
        assert!(task.parent().is_broken());
    }
}
