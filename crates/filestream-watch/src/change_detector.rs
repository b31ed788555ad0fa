//! Change detection between two snapshots.
//!
//! [`diff`] is a pure function: given the previous and the next snapshot it
//! returns one [`FsEvent`] per path transition and touches neither input.
//! Files whose size and modification time are unchanged produce no event, so
//! a stable file is announced exactly once, when it first appears.
//!
//! Events come back in arbitrary order; callers treat each result as an
//! unordered batch.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use tracing::trace;

use crate::events::{FileIdentity, FileMetadata, FsEvent, Snapshot};

/// Optional refinements of the path-keyed diff.
///
/// Both are off by default, in which case a shrinking file is a `Write` and a
/// moved file is a `Delete` plus a `Create`. With either one on, a path whose
/// [`FileIdentity`] changed is treated as the old file leaving and a new one
/// arriving, never as a write to the same file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DiffOptions {
    /// Report a file that got smaller as `Truncate`.
    pub detect_truncation: bool,
    /// Pair a deleted and a created path with the same [`FileIdentity`] into
    /// a single `Rename`.
    pub detect_renames: bool,
}

impl DiffOptions {
    fn tracks_identity(&self) -> bool {
        self.detect_truncation || self.detect_renames
    }
}

/// Per-kind counts of a diff result.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChangeSummary {
    /// Created files.
    pub created: usize,
    /// Written files.
    pub written: usize,
    /// Deleted files.
    pub deleted: usize,
    /// Renamed files.
    pub renamed: usize,
    /// Truncated files.
    pub truncated: usize,
}

impl ChangeSummary {
    /// Count the events of a batch.
    pub fn from_events(events: &[FsEvent]) -> Self {
        use crate::events::Operation;

        let mut summary = Self::default();
        for event in events {
            match event.op {
                Operation::Create => summary.created += 1,
                Operation::Write => summary.written += 1,
                Operation::Delete => summary.deleted += 1,
                Operation::Rename => summary.renamed += 1,
                Operation::Truncate => summary.truncated += 1,
            }
        }
        summary
    }

    /// Total number of events.
    pub fn total(&self) -> usize {
        self.created + self.written + self.deleted + self.renamed + self.truncated
    }
}

impl std::fmt::Display for ChangeSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} created, {} written, {} deleted, {} renamed, {} truncated",
            self.created, self.written, self.deleted, self.renamed, self.truncated
        )
    }
}

/// Compute the events that turn `prev` into `next`.
pub fn diff(prev: &Snapshot, next: &Snapshot, options: &DiffOptions) -> Vec<FsEvent> {
    let mut events = Vec::new();
    let mut created = Vec::new();
    let mut deleted = Vec::new();

    for (path, current) in next.iter() {
        match prev.get(path) {
            None => created.push(current),
            Some(previous) if options.tracks_identity() && replaced(previous, current) => {
                trace!("{:?} was replaced by a different file", path);
                deleted.push(previous);
                created.push(current);
            }
            Some(previous) if current.content_changed(previous) => {
                if options.detect_truncation && current.size() < previous.size() {
                    trace!("{:?} truncated from {} to {} bytes", path, previous.size(), current.size());
                    events.push(FsEvent::truncate(current.clone()));
                } else {
                    events.push(FsEvent::write(current.clone()));
                }
            }
            Some(_) => {}
        }
    }

    for (path, previous) in prev.iter() {
        if !next.contains(path) {
            deleted.push(previous);
        }
    }

    if options.detect_renames {
        pair_renames(&mut created, &mut deleted, &mut events);
    }

    events.extend(created.into_iter().cloned().map(FsEvent::create));
    events.extend(deleted.into_iter().cloned().map(FsEvent::delete));
    events
}

/// A path whose file identity changed between snapshots holds a new file.
fn replaced(previous: &FileMetadata, current: &FileMetadata) -> bool {
    match (previous.identity(), current.identity()) {
        (Some(before), Some(after)) => before != after,
        _ => false,
    }
}

/// Move Delete/Create pairs that share an identity out of `created` and
/// `deleted` and into `events` as renames.
fn pair_renames<'a>(
    created: &mut Vec<&'a FileMetadata>,
    deleted: &mut Vec<&'a FileMetadata>,
    events: &mut Vec<FsEvent>,
) {
    let mut deleted_by_identity: HashMap<FileIdentity, Vec<&Path>> = HashMap::new();
    for &previous in deleted.iter() {
        if let Some(identity) = previous.identity() {
            deleted_by_identity
                .entry(identity)
                .or_default()
                .push(previous.path());
        }
    }

    if deleted_by_identity.is_empty() {
        return;
    }

    // Hardlinks share an identity, so each pairing consumes one old path.
    let mut paired: HashSet<&Path> = HashSet::new();
    created.retain(|current| {
        let old_path = match current.identity() {
            Some(identity) => deleted_by_identity
                .get_mut(&identity)
                .and_then(|paths| paths.pop()),
            None => None,
        };
        match old_path {
            Some(old_path) => {
                trace!("{:?} renamed to {:?}", old_path, current.path());
                events.push(FsEvent::rename(old_path, (*current).clone()));
                paired.insert(old_path);
                false
            }
            None => true,
        }
    });

    deleted.retain(|previous| !paired.contains(previous.path()));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::Operation;
    use std::path::PathBuf;
    use std::time::{Duration, SystemTime};

    fn t0() -> SystemTime {
        SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000)
    }

    fn t1() -> SystemTime {
        t0() + Duration::from_secs(5)
    }

    fn snapshot(files: &[FileMetadata]) -> Snapshot {
        files.iter().cloned().collect()
    }

    fn file(path: &str, size: u64, modified: SystemTime) -> FileMetadata {
        FileMetadata::new(path, size, modified)
    }

    fn assert_same_events(mut actual: Vec<FsEvent>, mut expected: Vec<FsEvent>) {
        let key = |e: &FsEvent| (e.op.as_str(), e.old_path.clone(), e.new_path.clone());
        actual.sort_by_key(key);
        expected.sort_by_key(key);
        assert_eq!(actual, expected);
    }

    #[test]
    fn test_one_new_file() {
        let prev = Snapshot::new();
        let next = snapshot(&[file("new_path", 5, t0())]);

        assert_same_events(
            diff(&prev, &next, &DiffOptions::default()),
            vec![FsEvent::create(file("new_path", 5, t0()))],
        );
    }

    #[test]
    fn test_one_deleted_file() {
        let prev = snapshot(&[file("old_path", 5, t0())]);
        let next = Snapshot::new();

        let events = diff(&prev, &next, &DiffOptions::default());
        assert_same_events(events.clone(), vec![FsEvent::delete(file("old_path", 5, t0()))]);
        assert_eq!(events[0].old_path, PathBuf::from("old_path"));
        assert_eq!(events[0].new_path, PathBuf::new());
    }

    #[test]
    fn test_one_modified_file() {
        let prev = snapshot(&[file("path", 5, t0())]);
        let next = snapshot(&[file("path", 10, t1())]);

        assert_same_events(
            diff(&prev, &next, &DiffOptions::default()),
            vec![FsEvent::write(file("path", 10, t1()))],
        );
    }

    #[test]
    fn test_two_modified_files() {
        let prev = snapshot(&[file("path1", 5, t0()), file("path2", 5, t0())]);
        let next = snapshot(&[file("path1", 10, t1()), file("path2", 10, t1())]);

        assert_same_events(
            diff(&prev, &next, &DiffOptions::default()),
            vec![
                FsEvent::write(file("path1", 10, t1())),
                FsEvent::write(file("path2", 10, t1())),
            ],
        );
    }

    #[test]
    fn test_modified_and_new_file() {
        let prev = snapshot(&[file("path1", 5, t0())]);
        let next = snapshot(&[file("path1", 10, t1()), file("path2", 10, t1())]);

        assert_same_events(
            diff(&prev, &next, &DiffOptions::default()),
            vec![
                FsEvent::write(file("path1", 10, t1())),
                FsEvent::create(file("path2", 10, t1())),
            ],
        );
    }

    #[test]
    fn test_new_and_deleted_file() {
        let prev = snapshot(&[file("path_deleted", 5, t0())]);
        let next = snapshot(&[file("path_new", 10, t1())]);

        assert_same_events(
            diff(&prev, &next, &DiffOptions::default()),
            vec![
                FsEvent::delete(file("path_deleted", 5, t0())),
                FsEvent::create(file("path_new", 10, t1())),
            ],
        );
    }

    #[test]
    fn test_unchanged_files_produce_no_events() {
        let prev = snapshot(&[file("a", 5, t0()), file("b", 7, t1())]);
        let next = prev.clone();

        assert!(diff(&prev, &next, &DiffOptions::default()).is_empty());
    }

    #[test]
    fn test_mtime_only_change_is_a_write() {
        let prev = snapshot(&[file("a", 5, t0())]);
        let next = snapshot(&[file("a", 5, t1())]);

        let events = diff(&prev, &next, &DiffOptions::default());
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].op, Operation::Write);
    }

    #[test]
    fn test_diff_is_pure() {
        let prev = snapshot(&[file("path1", 5, t0()), file("gone", 1, t0())]);
        let next = snapshot(&[file("path1", 10, t1()), file("path2", 10, t1())]);
        let (prev_copy, next_copy) = (prev.clone(), next.clone());

        let first = diff(&prev, &next, &DiffOptions::default());
        let second = diff(&prev, &next, &DiffOptions::default());

        assert_same_events(first, second);
        assert_eq!(prev, prev_copy);
        assert_eq!(next, next_copy);
    }

    #[test]
    fn test_shrink_is_write_by_default_and_truncate_when_enabled() {
        let prev = snapshot(&[file("a", 100, t0())]);
        let next = snapshot(&[file("a", 10, t1())]);

        let events = diff(&prev, &next, &DiffOptions::default());
        assert_eq!(events[0].op, Operation::Write);

        let options = DiffOptions {
            detect_truncation: true,
            ..Default::default()
        };
        assert_same_events(
            diff(&prev, &next, &options),
            vec![FsEvent::truncate(file("a", 10, t1()))],
        );
    }

    #[test]
    fn test_rename_detection() {
        let identity = FileIdentity::new(1, 42);
        let prev = snapshot(&[
            file("app.log", 50, t0()).with_identity(identity),
            file("other.log", 5, t0()).with_identity(FileIdentity::new(1, 7)),
        ]);
        let next = snapshot(&[file("app.log.1", 50, t0()).with_identity(identity)]);

        let options = DiffOptions {
            detect_renames: true,
            ..Default::default()
        };

        assert_same_events(
            diff(&prev, &next, &options),
            vec![
                FsEvent::rename("app.log", file("app.log.1", 50, t0()).with_identity(identity)),
                FsEvent::delete(file("other.log", 5, t0()).with_identity(FileIdentity::new(1, 7))),
            ],
        );
    }

    #[test]
    fn test_hardlinks_pair_one_rename_and_keep_the_other_delete() {
        let shared = FileIdentity::new(1, 42);
        let prev = snapshot(&[
            file("a.log", 50, t0()).with_identity(shared),
            file("b.log", 50, t0()).with_identity(shared),
        ]);
        let next = snapshot(&[file("c.log", 50, t0()).with_identity(shared)]);

        let options = DiffOptions {
            detect_renames: true,
            ..Default::default()
        };
        let events = diff(&prev, &next, &options);

        let summary = ChangeSummary::from_events(&events);
        assert_eq!(summary.renamed, 1);
        assert_eq!(summary.deleted, 1);
        assert_eq!(summary.total(), 2);

        let rename = events.iter().find(|e| e.op == Operation::Rename).unwrap();
        let delete = events.iter().find(|e| e.op == Operation::Delete).unwrap();
        assert_eq!(rename.new_path, PathBuf::from("c.log"));
        let mut old_paths = vec![rename.old_path.clone(), delete.old_path.clone()];
        old_paths.sort();
        assert_eq!(old_paths, vec![PathBuf::from("a.log"), PathBuf::from("b.log")]);
    }

    #[test]
    fn test_rotation_with_recreated_file_is_rename_and_create() {
        let rotated = FileIdentity::new(1, 1);
        let fresh = FileIdentity::new(1, 2);
        let prev = snapshot(&[file("app.log", 100, t0()).with_identity(rotated)]);
        let next = snapshot(&[
            file("app.log", 3, t1()).with_identity(fresh),
            file("app.1.log", 100, t0()).with_identity(rotated),
        ]);

        let options = DiffOptions {
            detect_truncation: true,
            detect_renames: true,
        };
        assert_same_events(
            diff(&prev, &next, &options),
            vec![
                FsEvent::rename("app.log", file("app.1.log", 100, t0()).with_identity(rotated)),
                FsEvent::create(file("app.log", 3, t1()).with_identity(fresh)),
            ],
        );
    }

    #[test]
    fn test_recreated_file_is_not_a_truncate() {
        let prev = snapshot(&[file("app.log", 100, t0()).with_identity(FileIdentity::new(1, 1))]);
        let next = snapshot(&[file("app.log", 3, t1()).with_identity(FileIdentity::new(1, 2))]);

        let options = DiffOptions {
            detect_truncation: true,
            ..Default::default()
        };
        assert_same_events(
            diff(&prev, &next, &options),
            vec![
                FsEvent::delete(file("app.log", 100, t0()).with_identity(FileIdentity::new(1, 1))),
                FsEvent::create(file("app.log", 3, t1()).with_identity(FileIdentity::new(1, 2))),
            ],
        );

        // Same inode shrinking in place is still a truncate.
        let same = snapshot(&[file("app.log", 3, t1()).with_identity(FileIdentity::new(1, 1))]);
        let events = diff(&prev, &same, &options);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].op, Operation::Truncate);
    }

    #[test]
    fn test_rename_detection_off_reports_delete_and_create() {
        let identity = FileIdentity::new(1, 42);
        let prev = snapshot(&[file("a.log", 50, t0()).with_identity(identity)]);
        let next = snapshot(&[file("b.log", 50, t0()).with_identity(identity)]);

        let summary = ChangeSummary::from_events(&diff(&prev, &next, &DiffOptions::default()));
        assert_eq!(summary.deleted, 1);
        assert_eq!(summary.created, 1);
        assert_eq!(summary.renamed, 0);
        assert_eq!(summary.total(), 2);
    }
}
