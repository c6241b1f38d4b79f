//! Ranking of rebar3 lock files
//!
//! A `rebar.lock` can turn up in unrelated ancestors (a stray one in a home
//! directory, say), so the nearest lock is not necessarily the project.
//! Each lock is scored by the structure around it and the best one wins.

use std::cmp::Ordering;
use std::path::{Path, PathBuf};

use crate::paths;

const DESCRIPTORS: &[&str] = &["rebar.config", "rebar.config.script"];
const SINGLE_APP_DIR: &str = "src";
const MULTI_APP_DIR: &str = "apps";

/// A lock file with its `(bucket, depth)` score; lower is better.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockCandidate {
    pub path: PathBuf,
    pub bucket: u8,
    pub depth: usize,
}

impl LockCandidate {
    pub fn new(path: &Path) -> Self {
        let dir = path.parent().unwrap_or(path);

        let bucket = if DESCRIPTORS.iter().any(|d| dir.join(d).is_file()) {
            1
        } else if dir.join(SINGLE_APP_DIR).is_dir() ^ dir.join(MULTI_APP_DIR).is_dir() {
            2
        } else {
            3
        };

        Self {
            path: path.to_path_buf(),
            bucket,
            depth: paths::depth(dir),
        }
    }

    pub fn score(&self) -> (u8, usize) {
        (self.bucket, self.depth)
    }

    pub fn dir(&self) -> &Path {
        self.path.parent().unwrap_or(&self.path)
    }
}

impl Ord for LockCandidate {
    fn cmp(&self, other: &Self) -> Ordering {
        self.score()
            .cmp(&other.score())
            .then_with(|| self.path.cmp(&other.path))
    }
}

impl PartialOrd for LockCandidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Score and sort lock files, best first.
pub fn rank(locks: &[PathBuf]) -> Vec<LockCandidate> {
    let mut candidates: Vec<LockCandidate> = locks.iter().map(|p| LockCandidate::new(p)).collect();
    candidates.sort();
    for candidate in &candidates {
        tracing::debug!(
            "Lock candidate {} scored {:?}",
            candidate.path.display(),
            candidate.score()
        );
    }
    candidates
}

/// Directory of the best-ranked lock file.
pub fn select_project_root(locks: &[PathBuf]) -> Option<PathBuf> {
    rank(locks)
        .into_iter()
        .next()
        .map(|winner| winner.dir().to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, "").unwrap();
    }

    #[test]
    fn test_descriptor_beats_nearer_bare_lock() {
        let temp_dir = TempDir::new().unwrap();
        let home = temp_dir.path().join("home/user");
        let proj = home.join("proj");
        touch(&home.join("rebar.lock"));
        touch(&proj.join("rebar.lock"));
        touch(&proj.join("rebar.config"));

        let locks = vec![proj.join("rebar.lock"), home.join("rebar.lock")];
        assert_eq!(select_project_root(&locks), Some(proj.clone()));

        // order of discovery does not matter
        let reversed = vec![home.join("rebar.lock"), proj.join("rebar.lock")];
        assert_eq!(select_project_root(&reversed), Some(proj));
    }

    #[test]
    fn test_buckets() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();

        touch(&root.join("a/rebar.lock"));
        touch(&root.join("a/rebar.config.script"));
        touch(&root.join("b/rebar.lock"));
        fs::create_dir_all(root.join("b/apps")).unwrap();
        touch(&root.join("c/rebar.lock"));
        fs::create_dir_all(root.join("c/src")).unwrap();
        fs::create_dir_all(root.join("c/apps")).unwrap();

        assert_eq!(LockCandidate::new(&root.join("a/rebar.lock")).bucket, 1);
        assert_eq!(LockCandidate::new(&root.join("b/rebar.lock")).bucket, 2);
        // both src and apps is ambiguous
        assert_eq!(LockCandidate::new(&root.join("c/rebar.lock")).bucket, 3);
    }

    #[test]
    fn test_shallower_wins_within_bucket() {
        let temp_dir = TempDir::new().unwrap();
        let outer = temp_dir.path().join("ws");
        let inner = outer.join("apps/inner");
        touch(&outer.join("rebar.lock"));
        touch(&outer.join("rebar.config"));
        touch(&inner.join("rebar.lock"));
        touch(&inner.join("rebar.config"));

        let ranked = rank(&[inner.join("rebar.lock"), outer.join("rebar.lock")]);
        assert_eq!(ranked[0].dir(), outer);
        assert!(ranked[0] < ranked[1]);
    }

    #[test]
    fn test_ordering_is_transitive() {
        let a = LockCandidate {
            path: PathBuf::from("/a/rebar.lock"),
            bucket: 1,
            depth: 5,
        };
        let b = LockCandidate {
            path: PathBuf::from("/b/c/rebar.lock"),
            bucket: 2,
            depth: 2,
        };
        let c = LockCandidate {
            path: PathBuf::from("/rebar.lock"),
            bucket: 2,
            depth: 3,
        };
        assert!(a <= b && b <= c && a <= c);
    }
}
