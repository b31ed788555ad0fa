//! Configuration schema for file discovery and change detection.

use crate::change_detector::DiffOptions;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default time between two scans.
pub const DEFAULT_CHECK_INTERVAL: Duration = Duration::from_secs(10);

/// Watcher configuration as supplied by the config loading layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WatcherConfig {
    /// Root paths or glob patterns, in order.
    pub paths: Vec<String>,
    /// Time between scans, in milliseconds on the wire.
    #[serde(with = "duration_serde", default = "default_check_interval")]
    pub check_interval: Duration,
    /// Scanner filters.
    #[serde(default)]
    pub scanner: ScanFilterConfig,
    /// Report files that shrank as `truncate` instead of `write`.
    #[serde(default)]
    pub detect_truncation: bool,
    /// Pair deletes and creates of the same inode into a `rename`.
    #[serde(default)]
    pub detect_renames: bool,
}

/// Filters applied by the scanner. Fixed for the lifetime of a watcher.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanFilterConfig {
    /// Paths matching any of these are dropped.
    #[serde(default)]
    pub exclude_files: Vec<MatcherConfig>,
    /// When non-empty, only paths matching one of these are kept.
    #[serde(default)]
    pub include_files: Vec<MatcherConfig>,
    /// Follow symlinks instead of skipping them.
    #[serde(default)]
    pub symlinks: bool,
    /// Let `**` match across directory boundaries.
    #[serde(default = "default_true")]
    pub recursive_glob: bool,
}

/// What part of a path a matcher is tested against.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchTarget {
    /// The full absolute path.
    #[default]
    Path,
    /// The final path component only.
    FileName,
}

/// A regular expression matcher.
///
/// Deserializes either from a bare string (matched against the full path)
/// or from `{ pattern, target }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "MatcherRepr")]
pub struct MatcherConfig {
    /// Regular expression.
    pub pattern: String,
    /// Part of the path to match.
    pub target: MatchTarget,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum MatcherRepr {
    Pattern(String),
    Full {
        pattern: String,
        #[serde(default)]
        target: MatchTarget,
    },
}

impl From<MatcherRepr> for MatcherConfig {
    fn from(repr: MatcherRepr) -> Self {
        match repr {
            MatcherRepr::Pattern(pattern) => Self::path(pattern),
            MatcherRepr::Full { pattern, target } => Self { pattern, target },
        }
    }
}

impl MatcherConfig {
    /// Matcher tested against the full path.
    pub fn path(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            target: MatchTarget::Path,
        }
    }

    /// Matcher tested against the file name.
    pub fn file_name(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            target: MatchTarget::FileName,
        }
    }
}

impl From<&str> for MatcherConfig {
    fn from(pattern: &str) -> Self {
        Self::path(pattern)
    }
}

mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(u64::try_from(duration.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

fn default_check_interval() -> Duration {
    DEFAULT_CHECK_INTERVAL
}

fn default_true() -> bool {
    true
}

impl Default for ScanFilterConfig {
    fn default() -> Self {
        Self {
            exclude_files: Vec::new(),
            include_files: Vec::new(),
            symlinks: false,
            recursive_glob: true,
        }
    }
}

impl ScanFilterConfig {
    /// Add an exclusion matcher.
    pub fn with_exclude(mut self, matcher: impl Into<MatcherConfig>) -> Self {
        self.exclude_files.push(matcher.into());
        self
    }

    /// Add an inclusion matcher.
    pub fn with_include(mut self, matcher: impl Into<MatcherConfig>) -> Self {
        self.include_files.push(matcher.into());
        self
    }

    /// Enable or disable following symlinks.
    pub fn with_symlinks(mut self, enabled: bool) -> Self {
        self.symlinks = enabled;
        self
    }

    /// Enable or disable recursive `**` globbing.
    pub fn with_recursive_glob(mut self, enabled: bool) -> Self {
        self.recursive_glob = enabled;
        self
    }
}

impl WatcherConfig {
    /// Create a config for the given roots with default settings.
    pub fn new<I, S>(paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            paths: paths.into_iter().map(Into::into).collect(),
            check_interval: DEFAULT_CHECK_INTERVAL,
            scanner: ScanFilterConfig::default(),
            detect_truncation: false,
            detect_renames: false,
        }
    }

    /// Set the scan interval.
    pub fn with_check_interval(mut self, interval: Duration) -> Self {
        self.check_interval = interval;
        self
    }

    /// Set the scanner filters.
    pub fn with_scanner(mut self, scanner: ScanFilterConfig) -> Self {
        self.scanner = scanner;
        self
    }

    /// Enable or disable truncation detection.
    pub fn with_truncation_detection(mut self, enabled: bool) -> Self {
        self.detect_truncation = enabled;
        self
    }

    /// Enable or disable rename detection.
    pub fn with_rename_detection(mut self, enabled: bool) -> Self {
        self.detect_renames = enabled;
        self
    }

    /// Diff settings derived from this config.
    pub fn diff_options(&self) -> DiffOptions {
        DiffOptions {
            detect_truncation: self.detect_truncation,
            detect_renames: self.detect_renames,
        }
    }
}

/// Configuration validation utilities.
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate a complete watcher configuration.
    ///
    /// Glob and regex syntax is checked when the scanner compiles them.
    pub fn validate_config(config: &WatcherConfig) -> Result<(), ValidationError> {
        if config.paths.is_empty() {
            return Err(ValidationError::EmptyPathList);
        }

        for path in &config.paths {
            if path.trim().is_empty() {
                return Err(ValidationError::InvalidPath("empty path".to_string()));
            }
        }

        if config.check_interval.is_zero() {
            return Err(ValidationError::InvalidValue(
                "check_interval".to_string(),
                "must be greater than 0".to_string(),
            ));
        }

        Self::validate_filters(&config.scanner)
    }

    fn validate_filters(config: &ScanFilterConfig) -> Result<(), ValidationError> {
        for matcher in config.exclude_files.iter().chain(&config.include_files) {
            if matcher.pattern.is_empty() {
                return Err(ValidationError::InvalidValue(
                    "matcher".to_string(),
                    "pattern must not be empty".to_string(),
                ));
            }
        }
        Ok(())
    }
}

/// Configuration validation errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Invalid configuration value
    InvalidValue(String, String),
    /// No roots configured
    EmptyPathList,
    /// Invalid path
    InvalidPath(String),
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::InvalidValue(field, reason) => {
                write!(f, "Invalid value for {}: {}", field, reason)
            }
            ValidationError::EmptyPathList => write!(f, "No paths configured"),
            ValidationError::InvalidPath(path) => write!(f, "Invalid path: {}", path),
        }
    }
}

impl std::error::Error for ValidationError {}
