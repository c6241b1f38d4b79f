//! Copying a fresh artifact over stale copies of it

use std::fs;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

/// Outcome of one replication run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReplicationReport {
    pub copied: Vec<PathBuf>,
    /// Targets that could not be overwritten, with the reason
    pub failed: Vec<(PathBuf, String)>,
}

/// Overwrite every file under `target_root` named like `artifact` with it.
///
/// The artifact itself is never a target, even when it lives under
/// `target_root`. A failed copy is recorded and the walk moves on.
pub fn replicate(artifact: &Path, target_root: &Path) -> ReplicationReport {
    let mut report = ReplicationReport::default();
    let Some(name) = artifact.file_name() else {
        return report;
    };
    let artifact_id = same_file_key(artifact);

    for entry in WalkDir::new(target_root).follow_links(false) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!("Skipping part of {}: {e}", target_root.display());
                continue;
            }
        };
        if !entry.file_type().is_file() || entry.file_name() != name {
            continue;
        }
        let target = entry.path();
        if same_file_key(target) == artifact_id {
            continue;
        }

        match fs::copy(artifact, target) {
            Ok(_) => {
                tracing::info!("Copied {} to {}", artifact.display(), target.display());
                report.copied.push(target.to_path_buf());
            }
            Err(e) => {
                tracing::warn!(
                    "Failed to copy {} to {}: {e}",
                    artifact.display(),
                    target.display()
                );
                report.failed.push((target.to_path_buf(), e.to_string()));
            }
        }
    }

    report
}

fn same_file_key(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}
