//! Include/exclude matchers applied to scanned paths.

use crate::config::{MatchTarget, MatcherConfig, ScanFilterConfig};
use crate::error::Result;
use regex::Regex;
use std::path::Path;

/// A compiled regular expression tested against a path or its file name.
#[derive(Debug, Clone)]
pub struct PathMatcher {
    regex: Regex,
    target: MatchTarget,
}

impl PathMatcher {
    /// Compile a matcher. Fails with `Error::Pattern` on invalid syntax.
    pub fn new(config: &MatcherConfig) -> Result<Self> {
        Ok(Self {
            regex: Regex::new(&config.pattern)?,
            target: config.target,
        })
    }

    /// Check if the matcher applies to `path`.
    pub fn is_match(&self, path: &Path) -> bool {
        match self.target {
            MatchTarget::Path => self.regex.is_match(&path.to_string_lossy()),
            MatchTarget::FileName => path
                .file_name()
                .map(|name| self.regex.is_match(&name.to_string_lossy()))
                .unwrap_or(false),
        }
    }

    /// The source expression.
    pub fn as_str(&self) -> &str {
        self.regex.as_str()
    }
}

/// Why the filter rejected a path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterRejection {
    /// Matched an exclusion expression.
    Excluded(String),
    /// Include matchers are configured and none matched.
    NotIncluded,
}

impl std::fmt::Display for FilterRejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Excluded(pattern) => write!(f, "matches exclude pattern '{}'", pattern),
            Self::NotIncluded => write!(f, "matches no include pattern"),
        }
    }
}

/// Compiled form of the matchers in a [`ScanFilterConfig`].
#[derive(Debug, Clone, Default)]
pub struct PathFilter {
    include: Vec<PathMatcher>,
    exclude: Vec<PathMatcher>,
}

impl PathFilter {
    /// Compile all matchers of the config.
    pub fn from_config(config: &ScanFilterConfig) -> Result<Self> {
        let compile = |matchers: &[MatcherConfig]| -> Result<Vec<PathMatcher>> {
            matchers.iter().map(PathMatcher::new).collect()
        };

        Ok(Self {
            include: compile(config.include_files.as_slice())?,
            exclude: compile(config.exclude_files.as_slice())?,
        })
    }

    /// Returns the rejection reason, or `None` if the path is kept.
    ///
    /// Exclusions win over inclusions.
    pub fn check(&self, path: &Path) -> Option<FilterRejection> {
        if let Some(matcher) = self.exclude.iter().find(|m| m.is_match(path)) {
            return Some(FilterRejection::Excluded(matcher.as_str().to_string()));
        }

        if !self.include.is_empty() && !self.include.iter().any(|m| m.is_match(path)) {
            return Some(FilterRejection::NotIncluded);
        }

        None
    }

    /// Check if the path passes all matchers.
    pub fn allows(&self, path: &Path) -> bool {
        self.check(path).is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn test_exclude_by_path() {
        let config = ScanFilterConfig::default().with_exclude("\\.gz$");
        let filter = PathFilter::from_config(&config).unwrap();

        assert!(filter.allows(Path::new("/var/log/app.log")));
        assert_eq!(
            filter.check(Path::new("/var/log/app.log.1.gz")),
            Some(FilterRejection::Excluded("\\.gz$".to_string()))
        );
    }

    #[test]
    fn test_file_name_target_ignores_directories() {
        let config = ScanFilterConfig::default().with_exclude(MatcherConfig::file_name("^debug"));
        let filter = PathFilter::from_config(&config).unwrap();

        assert!(filter.allows(Path::new("/srv/debug/app.log")));
        assert!(!filter.allows(Path::new("/srv/app/debug.log")));
    }

    #[test]
    fn test_include_and_exclude() {
        let config = ScanFilterConfig::default()
            .with_include("\\.log$")
            .with_exclude("secret");
        let filter = PathFilter::from_config(&config).unwrap();

        assert!(filter.allows(Path::new("/var/log/app.log")));
        assert_eq!(
            filter.check(Path::new("/var/log/app.txt")),
            Some(FilterRejection::NotIncluded)
        );
        assert!(!filter.allows(Path::new("/var/log/secret.log")));
    }

    #[test]
    fn test_invalid_expression() {
        let config = ScanFilterConfig::default().with_exclude("([a-z]");
        assert!(matches!(
            PathFilter::from_config(&config),
            Err(Error::Pattern(_))
        ));
    }
}
