//! Read-spec resolution: a literal path or glob pattern → the set of regular
//! files it currently matches.
//!
//! The match set is a point-in-time snapshot; the engine re-resolves it on
//! every poll cycle, so it may grow or shrink between calls.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use crate::error::EngineError;

/// Characters that make a read spec a glob pattern instead of a literal path.
const WILDCARD_CHARS: [char; 3] = ['*', '?', '['];

/// Resolves one read spec against its base directory.
#[derive(Debug, Clone)]
pub struct PathMatcher {
    /// The spec as the user gave it (for error messages).
    spec: String,
    /// The spec resolved against `base_dir` (absolute).
    resolved: PathBuf,
    recursive: bool,
    literal: bool,
}

impl PathMatcher {
    /// Build a matcher. `read_spec` may be relative (resolved against
    /// `base_dir`) or absolute. Validates the pattern syntax eagerly so a bad
    /// spec fails at link start, not inside the loop.
    pub fn new(read_spec: &str, base_dir: &Path, recursive: bool) -> Result<Self, EngineError> {
        let spec_path = PathBuf::from(read_spec);
        let resolved = if spec_path.is_absolute() {
            spec_path
        } else {
            base_dir.join(spec_path)
        };
        let literal = !read_spec.contains(WILDCARD_CHARS);

        if !literal {
            // Compile once to reject malformed patterns up front.
            glob::Pattern::new(&resolved.to_string_lossy()).map_err(|source| {
                EngineError::Pattern {
                    spec: read_spec.to_owned(),
                    source,
                }
            })?;
        }

        Ok(Self {
            spec: read_spec.to_owned(),
            resolved,
            recursive,
            literal,
        })
    }

    /// Whether the spec is a glob pattern (contains a wildcard).
    pub fn is_pattern(&self) -> bool {
        !self.literal
    }

    /// The current set of matching regular files, de-duplicated and sorted.
    ///
    /// A literal spec that names no existing file is [`EngineError::ReadSpecNotFound`];
    /// a pattern with zero matches is an empty set — matching files may appear
    /// later.
    pub fn resolve(&self) -> Result<BTreeSet<PathBuf>, EngineError> {
        if self.literal {
            if self.resolved.is_file() {
                return Ok(BTreeSet::from([self.resolved.clone()]));
            }
            return Err(EngineError::ReadSpecNotFound {
                spec: self.spec.clone(),
            });
        }

        let pattern = self.pattern_string();
        let paths = glob::glob(&pattern).map_err(|source| EngineError::Pattern {
            spec: self.spec.clone(),
            source,
        })?;

        let mut matches = BTreeSet::new();
        for entry in paths {
            match entry {
                Ok(path) if path.is_file() => {
                    matches.insert(path);
                }
                Ok(_) => {} // directories never match
                Err(err) => {
                    // Unreadable entry mid-walk: skip this cycle, retry next.
                    tracing::debug!(spec = %self.spec, error = %err, "skipping unreadable match");
                }
            }
        }
        Ok(matches)
    }

    /// The expansion pattern handed to the glob walker. Recursive matching
    /// injects `**/` before the final spec component, mirroring the
    /// subtree rooted at the pattern's directory.
    fn pattern_string(&self) -> String {
        if !self.recursive {
            return self.resolved.to_string_lossy().into_owned();
        }
        match (self.resolved.parent(), self.resolved.file_name()) {
            (Some(parent), Some(name)) => parent
                .join("**")
                .join(name)
                .to_string_lossy()
                .into_owned(),
            _ => self.resolved.to_string_lossy().into_owned(),
        }
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::fs;
    use tempfile::TempDir;

    fn touch(dir: &TempDir, rel: &str) -> PathBuf {
        let path = dir.path().join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("mkdir");
        }
        fs::write(&path, rel).expect("write");
        path
    }

    #[test]
    fn literal_path_matches_itself() {
        let dir = TempDir::new().expect("tempdir");
        let file = touch(&dir, "code.py");
        let matcher = PathMatcher::new("code.py", dir.path(), false).expect("matcher");
        assert!(!matcher.is_pattern());
        let set = matcher.resolve().expect("resolve");
        assert_eq!(set, BTreeSet::from([file]));
    }

    #[test]
    fn missing_literal_path_is_not_found() {
        let dir = TempDir::new().expect("tempdir");
        let matcher = PathMatcher::new("ghost.py", dir.path(), false).expect("matcher");
        let err = matcher.resolve().unwrap_err();
        assert!(matches!(err, EngineError::ReadSpecNotFound { .. }));
    }

    #[test]
    fn literal_directory_is_not_a_match() {
        let dir = TempDir::new().expect("tempdir");
        fs::create_dir(dir.path().join("sub")).expect("mkdir");
        let matcher = PathMatcher::new("sub", dir.path(), false).expect("matcher");
        assert!(matcher.resolve().is_err());
    }

    #[test]
    fn pattern_with_zero_matches_is_empty_set() {
        let dir = TempDir::new().expect("tempdir");
        let matcher = PathMatcher::new("*.txt", dir.path(), false).expect("matcher");
        assert!(matcher.is_pattern());
        assert!(matcher.resolve().expect("resolve").is_empty());
    }

    #[test]
    fn flat_pattern_ignores_subdirectories() {
        let dir = TempDir::new().expect("tempdir");
        let a = touch(&dir, "a.txt");
        let b = touch(&dir, "b.txt");
        touch(&dir, "nested/c.txt");
        touch(&dir, "other.py");

        let matcher = PathMatcher::new("*.txt", dir.path(), false).expect("matcher");
        let set = matcher.resolve().expect("resolve");
        assert_eq!(set, BTreeSet::from([a, b]));
    }

    #[test]
    fn recursive_pattern_walks_the_subtree() {
        let dir = TempDir::new().expect("tempdir");
        let a = touch(&dir, "a.txt");
        let c = touch(&dir, "nested/deep/c.txt");
        touch(&dir, "nested/skip.py");

        let matcher = PathMatcher::new("*.txt", dir.path(), true).expect("matcher");
        let set = matcher.resolve().expect("resolve");
        assert_eq!(set, BTreeSet::from([a, c]));
    }

    #[test]
    fn match_set_tracks_filesystem_changes() {
        let dir = TempDir::new().expect("tempdir");
        let a = touch(&dir, "a.txt");
        let matcher = PathMatcher::new("*.txt", dir.path(), false).expect("matcher");
        assert_eq!(matcher.resolve().expect("first").len(), 1);

        let b = touch(&dir, "b.txt");
        assert_eq!(
            matcher.resolve().expect("grown"),
            BTreeSet::from([a.clone(), b])
        );

        fs::remove_file(&a).expect("remove");
        assert_eq!(matcher.resolve().expect("shrunk").len(), 1);
    }

    #[rstest]
    #[case("*.txt", true)]
    #[case("data?.csv", true)]
    #[case("[ab].txt", true)]
    #[case("plain/file.txt", false)]
    fn wildcard_detection(#[case] spec: &str, #[case] pattern: bool) {
        let dir = TempDir::new().expect("tempdir");
        let matcher = PathMatcher::new(spec, dir.path(), false).expect("matcher");
        assert_eq!(matcher.is_pattern(), pattern);
    }
}
