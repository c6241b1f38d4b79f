//! Build system classification
//!
//! Works out which application a source file belongs to, which build tool
//! governs it and where the top of that build is.

use std::path::{Path, PathBuf};

use crate::paths;

pub mod lock;

pub use lock::{LockCandidate, select_project_root};

/// Evidence that a directory is an application root, relative to it.
const APP_ROOT_EVIDENCE: &[&str] = &["ebin/*.app", "src/*.app.src"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuildSystemKind {
    /// rebar3, recognised by its lock file
    Rebar3,
    /// rebar 2, recognised by `rebar.config` descriptors
    Rebar,
    /// erlang.mk or plain make
    Make,
    Unknown,
}

impl BuildSystemKind {
    /// Candidates in precedence order. Makefiles often sit next to the
    /// other systems' files, so make is only a catch-all.
    pub const PRECEDENCE: [BuildSystemKind; 3] = [
        BuildSystemKind::Rebar3,
        BuildSystemKind::Rebar,
        BuildSystemKind::Make,
    ];

    pub fn markers(self) -> &'static [&'static str] {
        match self {
            BuildSystemKind::Rebar3 => &["rebar.lock"],
            // the script comes first so that, within one directory, its result
            // takes precedence over the static file it rewrites
            BuildSystemKind::Rebar => &["rebar.config.script", "rebar.config"],
            BuildSystemKind::Make => &["Makefile", "erlang.mk"],
            BuildSystemKind::Unknown => &[],
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            BuildSystemKind::Rebar3 => "rebar3",
            BuildSystemKind::Rebar => "rebar",
            BuildSystemKind::Make => "make",
            BuildSystemKind::Unknown => "unknown",
        }
    }
}

/// Which build system won, and every marker file of it on the upward path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub kind: BuildSystemKind,
    /// Absolute marker paths, nearest first
    pub markers: Vec<PathBuf>,
}

/// Everything the loader needs to know about where a file lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub file: PathBuf,
    pub app_root: PathBuf,
    pub project_root: PathBuf,
    pub kind: BuildSystemKind,
    pub markers: Vec<PathBuf>,
}

/// First ancestor of `start` (inclusive, up to the root) that looks like an
/// application root. Falls back to `start` itself.
pub fn find_app_root(start: &Path) -> PathBuf {
    for dir in paths::ancestors(start) {
        if APP_ROOT_EVIDENCE
            .iter()
            .any(|pattern| paths::wildcard_exists(&dir, pattern))
        {
            tracing::debug!("Application root: {}", dir.display());
            return dir;
        }
    }
    tracing::debug!(
        "No application root found above {}, using it as the root",
        start.display()
    );
    start.to_path_buf()
}

/// Classify the build system governing `app_root`.
///
/// Each system's markers are searched on the whole upward path before the
/// next system is tried, so a lock file far above a Makefile still wins.
pub fn classify(app_root: &Path) -> Classification {
    for kind in BuildSystemKind::PRECEDENCE {
        let markers: Vec<PathBuf> = paths::ancestors(app_root)
            .flat_map(|dir| {
                kind.markers()
                    .iter()
                    .map(move |marker| dir.join(marker))
                    .collect::<Vec<_>>()
            })
            .filter(|candidate| candidate.is_file())
            .collect();

        if !markers.is_empty() {
            tracing::debug!(
                "Detected {} build ({} marker(s), nearest {})",
                kind.name(),
                markers.len(),
                markers[0].display()
            );
            return Classification { kind, markers };
        }
    }

    Classification {
        kind: BuildSystemKind::Unknown,
        markers: Vec::new(),
    }
}

/// Resolve application root, build system and project root for `file`.
///
/// `file` must be absolute.
pub fn resolve(file: &Path) -> Resolution {
    let start = file.parent().unwrap_or(file);
    let app_root = find_app_root(start);
    let Classification { kind, markers } = classify(&app_root);

    let project_root = match kind {
        BuildSystemKind::Rebar3 => {
            select_project_root(&markers).unwrap_or_else(|| app_root.clone())
        }
        BuildSystemKind::Rebar | BuildSystemKind::Make => markers
            .first()
            .and_then(|m| m.parent())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| app_root.clone()),
        BuildSystemKind::Unknown => app_root.clone(),
    };
    tracing::debug!("Project root: {}", project_root.display());

    Resolution {
        file: file.to_path_buf(),
        app_root,
        project_root,
        kind,
        markers,
    }
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
    fn test_app_root_from_app_src() {
        let temp_dir = TempDir::new().unwrap();
        let app = temp_dir.path().join("apps/web");
        touch(&app.join("src/web.app.src"));

        assert_eq!(find_app_root(&app.join("src")), app);
    }

    #[test]
    fn test_app_root_from_ebin_app() {
        let temp_dir = TempDir::new().unwrap();
        let app = temp_dir.path().join("lib/x");
        touch(&app.join("ebin/x.app"));
        fs::create_dir_all(app.join("src/deep")).unwrap();

        assert_eq!(find_app_root(&app.join("src/deep")), app);
    }

    #[test]
    fn test_app_root_defaults_to_start_dir() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path().join("loose");
        fs::create_dir_all(&dir).unwrap();

        assert_eq!(find_app_root(&dir), dir);
    }

    #[test]
    fn test_detect_rebar3_above_app() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        touch(&root.join("rebar.lock"));
        touch(&root.join("apps/web/src/web.app.src"));

        let classification = classify(&root.join("apps/web"));
        assert_eq!(classification.kind, BuildSystemKind::Rebar3);
        assert_eq!(classification.markers, vec![root.join("rebar.lock")]);
    }

    #[test]
    fn test_prefer_rebar3_over_rebar_over_make() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        touch(&root.join("app/Makefile"));
        touch(&root.join("app/rebar.config"));
        assert_eq!(classify(&root.join("app")).kind, BuildSystemKind::Rebar);

        // a lock file further up still outranks the nearer descriptor
        touch(&root.join("rebar.lock"));
        assert_eq!(classify(&root.join("app")).kind, BuildSystemKind::Rebar3);
    }

    #[test]
    fn test_markers_are_nearest_first() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        touch(&root.join("rebar.config"));
        touch(&root.join("lib/x/rebar.config"));
        touch(&root.join("lib/x/rebar.config.script"));

        let classification = classify(&root.join("lib/x"));
        assert_eq!(classification.kind, BuildSystemKind::Rebar);
        assert_eq!(
            classification.markers,
            vec![
                root.join("lib/x/rebar.config.script"),
                root.join("lib/x/rebar.config"),
                root.join("rebar.config"),
            ]
        );
    }

    #[test]
    fn test_resolve_plain_rebar_project() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        touch(&root.join("rebar.config"));
        touch(&root.join("src/a.app.src"));
        touch(&root.join("src/a.erl"));

        let resolution = resolve(&root.join("src/a.erl"));
        assert_eq!(resolution.app_root, root);
        assert_eq!(resolution.project_root, root);
        assert_eq!(resolution.kind, BuildSystemKind::Rebar);
    }
}
