//! File scanner that turns root paths and glob patterns into a [`Snapshot`].
//!
//! The scanner is stateless: every call to [`Scanner::scan`] walks the
//! configured roots from scratch, stats each candidate, and returns the set of
//! regular files that survive the filters. Per-file failures never abort a
//! scan; a file that cannot be read is logged and left out of that snapshot.
//!
//! ```text
//! roots ──▶ expand (literal | glob) ──▶ absolute path ──▶ filters
//!                                                           │
//!       Snapshot ◀── insert (dedupe) ◀── regular file? ◀── stat / resolve symlink
//! ```

use std::collections::HashSet;
use std::io;
use std::path::{Path, PathBuf, MAIN_SEPARATOR};
use std::time::Instant;

use async_trait::async_trait;
use glob::{MatchOptions, Pattern};
use tracing::{debug, trace, warn};

use crate::config::ScanFilterConfig;
use crate::error::{Error, Result};
use crate::events::{FileIdentity, FileMetadata, Snapshot};
use crate::filter::PathFilter;
use crate::traits::Scanner;

const GLOB_META_CHARS: [char; 3] = ['*', '?', '['];

/// A compiled scan root.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Root {
    /// A path without glob metacharacters, used as is.
    Literal(PathBuf),
    /// An absolute glob pattern.
    Pattern(String),
}

impl Root {
    fn compile(raw: &str, recursive_glob: bool, cwd: &Path) -> Result<Self> {
        if raw.trim().is_empty() {
            return Err(Error::Config("empty root path".to_string()));
        }

        if !raw.contains(|c: char| GLOB_META_CHARS.contains(&c)) {
            return Ok(Root::Literal(absolutize(Path::new(raw), cwd)));
        }

        let mut pattern = if Path::new(raw).is_absolute() {
            raw.to_string()
        } else {
            let base = Pattern::escape(&cwd.to_string_lossy());
            format!("{}{}{}", base.trim_end_matches(MAIN_SEPARATOR), MAIN_SEPARATOR, raw)
        };

        if !recursive_glob {
            // `**` degrades to a single-segment wildcard, as in a plain shell glob.
            while pattern.contains("**") {
                pattern = pattern.replace("**", "*");
            }
        }

        Pattern::new(&pattern)?;
        Ok(Root::Pattern(pattern))
    }
}

/// Counters for a single scan, used for the summary log line.
#[derive(Debug, Default)]
struct ScanTally {
    candidates: usize,
    skipped: usize,
    errors: usize,
}

/// Discovers regular files under a set of roots.
#[derive(Debug, Clone)]
pub struct FileScanner {
    roots: Vec<Root>,
    filter: PathFilter,
    symlinks: bool,
}

impl FileScanner {
    /// Compile the roots and filters.
    ///
    /// # Errors
    ///
    /// Returns `Error::Pattern` for a malformed glob or matcher expression,
    /// and `Error::Config` for an empty root.
    pub fn new<I, S>(paths: I, config: &ScanFilterConfig) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let cwd = std::env::current_dir()?;
        let roots = paths
            .into_iter()
            .map(|raw| Root::compile(raw.as_ref(), config.recursive_glob, &cwd))
            .collect::<Result<Vec<_>>>()?;

        debug!(
            "Created FileScanner with {} roots, symlinks: {}, recursive_glob: {}",
            roots.len(),
            config.symlinks,
            config.recursive_glob
        );

        Ok(Self {
            roots,
            filter: PathFilter::from_config(config)?,
            symlinks: config.symlinks,
        })
    }

    /// Perform one scan synchronously.
    pub fn scan_now(&self) -> Result<Snapshot> {
        let start_time = Instant::now();
        let mut snapshot = Snapshot::new();
        let mut tally = ScanTally::default();
        let mut seen_identities = HashSet::new();

        for root in &self.roots {
            for candidate in self.expand(root, &mut tally)? {
                tally.candidates += 1;
                if !self.inspect(&candidate, &mut snapshot, &mut seen_identities, &mut tally) {
                    tally.skipped += 1;
                }
            }
        }

        debug!(
            "Scan completed in {:?}: {} files, {} candidates, {} skipped, {} errors",
            start_time.elapsed(),
            snapshot.len(),
            tally.candidates,
            tally.skipped,
            tally.errors
        );

        Ok(snapshot)
    }

    /// Expand a root into candidate paths.
    fn expand(&self, root: &Root, tally: &mut ScanTally) -> Result<Vec<PathBuf>> {
        let pattern = match root {
            Root::Literal(path) => return Ok(vec![path.clone()]),
            Root::Pattern(pattern) => pattern,
        };

        let options = MatchOptions {
            case_sensitive: true,
            require_literal_separator: true,
            require_literal_leading_dot: false,
        };

        let mut candidates = Vec::new();
        for entry in glob::glob_with(pattern, options)? {
            match entry {
                Ok(path) => candidates.push(path),
                Err(e) => {
                    warn!("Error expanding {}: {}", pattern, e);
                    tally.errors += 1;
                }
            }
        }

        trace!("Pattern {} expanded to {} candidates", pattern, candidates.len());
        Ok(candidates)
    }

    /// Stat a candidate and add it to the snapshot. Returns false when skipped.
    fn inspect(
        &self,
        path: &Path,
        snapshot: &mut Snapshot,
        seen_identities: &mut HashSet<FileIdentity>,
        tally: &mut ScanTally,
    ) -> bool {
        if let Some(rejection) = self.filter.check(path) {
            trace!("Skipping {:?}: {}", path, rejection);
            return false;
        }

        let link_metadata = match stat(path, |p| std::fs::symlink_metadata(p), tally) {
            Some(metadata) => metadata,
            None => return false,
        };

        let (key, metadata) = if link_metadata.file_type().is_symlink() {
            if !self.symlinks {
                trace!("Skipping symlink {:?}", path);
                return false;
            }

            let real_path = match stat(path, |p| std::fs::canonicalize(p), tally) {
                Some(real_path) => real_path,
                None => return false,
            };
            match stat(&real_path, |p| std::fs::metadata(p), tally) {
                Some(metadata) => (real_path, metadata),
                None => return false,
            }
        } else {
            (path.to_path_buf(), link_metadata)
        };

        if metadata.is_dir() {
            trace!("Skipping directory {:?}", key);
            return false;
        }

        if !metadata.is_file() {
            trace!("Skipping non-regular file {:?}", key);
            return false;
        }

        if key != path {
            if let Some(rejection) = self.filter.check(&key) {
                trace!("Skipping {:?} (target of {:?}): {}", key, path, rejection);
                return false;
            }
        }

        let file = FileMetadata::from_fs(key, &metadata);

        if self.symlinks {
            if let Some(identity) = file.identity() {
                if !seen_identities.insert(identity) {
                    trace!("Skipping {:?}: same file already reached via another path", path);
                    return false;
                }
            }
        }

        if !snapshot.insert(file) {
            trace!("Skipping {:?}: already in snapshot", path);
            return false;
        }

        true
    }
}

#[async_trait]
impl Scanner for FileScanner {
    async fn scan(&self) -> Result<Snapshot> {
        self.scan_now()
    }
}

/// Run a filesystem call, treating NotFound as absence and logging other failures.
fn stat<T>(
    path: &Path,
    op: impl FnOnce(&Path) -> io::Result<T>,
    tally: &mut ScanTally,
) -> Option<T> {
    match op(path) {
        Ok(value) => Some(value),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            trace!("{:?} vanished before it could be read", path);
            None
        }
        Err(e) => {
            warn!("Skipping {:?}: {}", path, e);
            tally.errors += 1;
            None
        }
    }
}

fn absolutize(path: &Path, cwd: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        cwd.join(path)
    }
}
