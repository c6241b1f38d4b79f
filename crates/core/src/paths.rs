//! Path helpers shared by the resolver and the loaders
//!
//! Everything here is lexical or a plain existence check; nothing follows
//! symlinks or canonicalizes, so results stay stable for paths that do not
//! exist yet (output directories, dependency ebins).

use std::path::{Component, Path, PathBuf};

/// Resolve `path` against `base` and normalize `.` and `..` components.
pub fn absolute(base: &Path, path: &Path) -> PathBuf {
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    };
    normalize(&joined)
}

/// Lexically normalize a path (remove `.`, collapse `..`).
pub fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                // `..` above the root stays at the root
                if !out.pop() && !out.has_root() {
                    out.push("..");
                }
            }
            c => out.push(c.as_os_str()),
        }
    }
    out
}

/// Iterator over `dir` and each of its ancestors, nearest first, ending with
/// the filesystem root.
pub fn ancestors(dir: &Path) -> Ancestors {
    Ancestors {
        next: Some(dir.to_path_buf()),
    }
}

pub struct Ancestors {
    next: Option<PathBuf>,
}

impl Iterator for Ancestors {
    type Item = PathBuf;

    fn next(&mut self) -> Option<PathBuf> {
        let current = self.next.take()?;
        self.next = current
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
            .map(Path::to_path_buf);
        Some(current)
    }
}

/// All paths matching `pattern` relative to `dir`, sorted.
pub fn wildcard(dir: &Path, pattern: &str) -> Vec<PathBuf> {
    let escaped = glob::Pattern::escape(&dir.to_string_lossy());
    let full = format!("{}/{}", escaped.trim_end_matches('/'), pattern);
    let mut matches: Vec<PathBuf> = match glob::glob(&full) {
        Ok(paths) => paths.filter_map(|entry| entry.ok()).collect(),
        Err(e) => {
            tracing::debug!("Invalid wildcard {}: {}", full, e);
            Vec::new()
        }
    };
    matches.sort();
    matches
}

/// Whether anything matches `pattern` relative to `dir`.
pub fn wildcard_exists(dir: &Path, pattern: &str) -> bool {
    !wildcard(dir, pattern).is_empty()
}

/// Number of components in `path`. Shallower paths have a smaller depth.
pub fn depth(path: &Path) -> usize {
    path.components().count()
}

/// Look `program` up in `PATH`.
pub fn find_in_path(program: &str) -> Option<PathBuf> {
    let paths = std::env::var_os("PATH")?;
    find_in_dirs(program, std::env::split_paths(&paths))
}

/// First `dir/program` that is an executable file.
pub fn find_in_dirs<I>(program: &str, dirs: I) -> Option<PathBuf>
where
    I: IntoIterator<Item = PathBuf>,
{
    dirs.into_iter()
        .map(|dir| dir.join(program))
        .find(|candidate| is_executable(candidate))
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .is_ok_and(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}
