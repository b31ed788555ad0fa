//! File metadata, snapshots and change events.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Platform identity of a file, independent of the path it was reached by.
///
/// Inode numbers are only unique within a device, so both are kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FileIdentity {
    /// Device id.
    pub device: u64,
    /// Inode number.
    pub inode: u64,
}

impl FileIdentity {
    /// Create a new identity from device and inode numbers.
    pub fn new(device: u64, inode: u64) -> Self {
        Self { device, inode }
    }

    /// Read the identity out of filesystem metadata.
    #[cfg(unix)]
    pub fn from_metadata(metadata: &std::fs::Metadata) -> Option<Self> {
        use std::os::unix::fs::MetadataExt;
        Some(Self::new(metadata.dev(), metadata.ino()))
    }

    /// Read the identity out of filesystem metadata.
    #[cfg(not(unix))]
    pub fn from_metadata(_metadata: &std::fs::Metadata) -> Option<Self> {
        None
    }
}

/// Per-file state captured by a scan.
///
/// A new scan always builds fresh values; nothing mutates metadata after
/// it has been captured.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileMetadata {
    path: PathBuf,
    size: u64,
    modified: SystemTime,
    is_dir: bool,
    identity: Option<FileIdentity>,
}

impl FileMetadata {
    /// Create metadata for a regular file.
    pub fn new(path: impl Into<PathBuf>, size: u64, modified: SystemTime) -> Self {
        Self {
            path: path.into(),
            size,
            modified,
            is_dir: false,
            identity: None,
        }
    }

    /// Capture metadata from a `std::fs::Metadata` for the given path.
    pub fn from_fs(path: impl Into<PathBuf>, metadata: &std::fs::Metadata) -> Self {
        Self {
            path: path.into(),
            size: metadata.len(),
            // Platforms without mtime report the epoch; size changes still register.
            modified: metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH),
            is_dir: metadata.is_dir(),
            identity: FileIdentity::from_metadata(metadata),
        }
    }

    /// Attach a platform identity.
    pub fn with_identity(mut self, identity: FileIdentity) -> Self {
        self.identity = Some(identity);
        self
    }

    /// Absolute path of the file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Size in bytes.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Last modification time.
    pub fn modified(&self) -> SystemTime {
        self.modified
    }

    /// Whether the entry is a directory.
    pub fn is_dir(&self) -> bool {
        self.is_dir
    }

    /// Device and inode, when the platform provides them.
    pub fn identity(&self) -> Option<FileIdentity> {
        self.identity
    }

    /// Whether size or modification time differ from `other`.
    pub fn content_changed(&self, other: &FileMetadata) -> bool {
        self.size != other.size || self.modified != other.modified
    }
}

/// All regular files visible under the configured roots at one instant.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    files: HashMap<PathBuf, FileMetadata>,
}

impl Snapshot {
    /// Create an empty snapshot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert metadata keyed by its path. Returns false if the path was
    /// already present, in which case the first entry is kept.
    pub fn insert(&mut self, metadata: FileMetadata) -> bool {
        if self.files.contains_key(metadata.path()) {
            return false;
        }
        self.files.insert(metadata.path().to_path_buf(), metadata);
        true
    }

    /// Look up a file by path.
    pub fn get(&self, path: &Path) -> Option<&FileMetadata> {
        self.files.get(path)
    }

    /// Whether the snapshot contains the given path.
    pub fn contains(&self, path: &Path) -> bool {
        self.files.contains_key(path)
    }

    /// Number of files.
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Whether the snapshot is empty.
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Iterate over `(path, metadata)` pairs in arbitrary order.
    pub fn iter(&self) -> impl Iterator<Item = (&PathBuf, &FileMetadata)> {
        self.files.iter()
    }

    /// Iterate over the paths in arbitrary order.
    pub fn paths(&self) -> impl Iterator<Item = &PathBuf> {
        self.files.keys()
    }
}

impl FromIterator<FileMetadata> for Snapshot {
    fn from_iter<I: IntoIterator<Item = FileMetadata>>(iter: I) -> Self {
        let mut snapshot = Snapshot::new();
        for metadata in iter {
            snapshot.insert(metadata);
        }
        snapshot
    }
}

/// Kinds of file change reported by the watcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    /// File appeared.
    Create,
    /// File size or modification time changed.
    Write,
    /// File disappeared.
    Delete,
    /// File moved to a new path, same identity.
    Rename,
    /// File shrank in place.
    Truncate,
}

impl Operation {
    /// Get a string representation of the operation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Write => "write",
            Self::Delete => "delete",
            Self::Rename => "rename",
            Self::Truncate => "truncate",
        }
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One reported filesystem change between two consecutive snapshots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FsEvent {
    /// Kind of change.
    pub op: Operation,
    /// Path before the change; empty for `Create`.
    pub old_path: PathBuf,
    /// Path after the change; empty for `Delete`.
    pub new_path: PathBuf,
    /// New metadata, or the last known metadata for `Delete`.
    pub metadata: FileMetadata,
}

impl FsEvent {
    /// A file appeared.
    pub fn create(metadata: FileMetadata) -> Self {
        Self {
            op: Operation::Create,
            old_path: PathBuf::new(),
            new_path: metadata.path().to_path_buf(),
            metadata,
        }
    }

    /// A file changed in place.
    pub fn write(metadata: FileMetadata) -> Self {
        let path = metadata.path().to_path_buf();
        Self {
            op: Operation::Write,
            old_path: path.clone(),
            new_path: path,
            metadata,
        }
    }

    /// A file disappeared; `metadata` is what was last seen.
    pub fn delete(metadata: FileMetadata) -> Self {
        Self {
            op: Operation::Delete,
            old_path: metadata.path().to_path_buf(),
            new_path: PathBuf::new(),
            metadata,
        }
    }

    /// A file shrank in place.
    pub fn truncate(metadata: FileMetadata) -> Self {
        let path = metadata.path().to_path_buf();
        Self {
            op: Operation::Truncate,
            old_path: path.clone(),
            new_path: path,
            metadata,
        }
    }

    /// A file moved from `old_path` to the path in `metadata`.
    pub fn rename(old_path: impl Into<PathBuf>, metadata: FileMetadata) -> Self {
        Self {
            op: Operation::Rename,
            old_path: old_path.into(),
            new_path: metadata.path().to_path_buf(),
            metadata,
        }
    }

    /// The path this event is about: the new path, or the old one for deletes.
    pub fn path(&self) -> &Path {
        match self.op {
            Operation::Delete => &self.old_path,
            _ => &self.new_path,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_snapshot_keeps_first_entry_for_duplicate_path() {
        let t0 = SystemTime::UNIX_EPOCH;
        let mut snapshot = Snapshot::new();
        assert!(snapshot.insert(FileMetadata::new("/var/log/a.log", 5, t0)));
        assert!(!snapshot.insert(FileMetadata::new("/var/log/a.log", 10, t0)));

        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot.get(Path::new("/var/log/a.log")).unwrap().size(), 5);
    }

    #[test]
    fn test_event_paths() {
        let meta = FileMetadata::new("/var/log/a.log", 5, SystemTime::UNIX_EPOCH);

        let create = FsEvent::create(meta.clone());
        assert_eq!(create.old_path, PathBuf::new());
        assert_eq!(create.new_path, PathBuf::from("/var/log/a.log"));

        let delete = FsEvent::delete(meta.clone());
        assert_eq!(delete.new_path, PathBuf::new());
        assert_eq!(delete.path(), Path::new("/var/log/a.log"));

        let write = FsEvent::write(meta);
        assert_eq!(write.old_path, write.new_path);
    }

    #[test]
    fn test_content_changed() {
        let t0 = SystemTime::UNIX_EPOCH;
        let a = FileMetadata::new("/a", 5, t0);

        assert!(!a.content_changed(&FileMetadata::new("/a", 5, t0)));
        assert!(a.content_changed(&FileMetadata::new("/a", 6, t0)));
        assert!(a.content_changed(&FileMetadata::new("/a", 5, t0 + Duration::from_secs(1))));
    }

    #[test]
    fn test_operation_serializes_lowercase() {
        let json = serde_json::to_string(&Operation::Truncate).unwrap();
        assert_eq!(json, "\"truncate\"");
    }
}
