use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::paths;

/// Ordered, deduplicating set of code-search paths handed to the compiler.
///
/// Paths are only ever appended. Registering a directory that is already
/// present keeps the original position, so the first registration wins.
#[derive(Debug, Default, Clone)]
pub struct SearchPaths {
    ordered: Vec<PathBuf>,
    seen: HashSet<PathBuf>,
}

impl SearchPaths {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `path`; returns `false` if it was already registered.
    pub fn register(&mut self, path: impl AsRef<Path>) -> bool {
        let path = paths::normalize(path.as_ref());
        if self.seen.contains(&path) {
            return false;
        }
        tracing::debug!("Adding code path {}", path.display());
        self.seen.insert(path.clone());
        self.ordered.push(path);
        true
    }

    pub fn register_all<I, P>(&mut self, paths: I) -> usize
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        paths.into_iter().filter(|p| self.register(p)).count()
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.seen.contains(&paths::normalize(path))
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.ordered
    }

    pub fn len(&self) -> usize {
        self.ordered.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ordered.is_empty()
    }
}
