use std::path::{Path, PathBuf};

use crate::build_system::Resolution;
use crate::error::{Error, Result};
use crate::paths;
use crate::term::{Term, proplist_get};

use super::{
    ConfigDescriptor, LoadContext, SearchPaths, consult_file, evaluate_script, from_erl_opts,
};

const DEFAULT_DEPS_DIR: &str = "deps";
const SCRIPT_EXTENSION: &str = "script";

/// A descriptor that parsed, with the directory its relative paths hang off.
struct Parsed<'a> {
    dir: &'a Path,
    terms: Vec<Term>,
}

/// Load a rebar 2 project.
///
/// Descriptors are visited nearest first. The first one that parses supplies
/// the compiler options; every one that parses contributes code paths.
pub(super) fn load(
    resolution: &Resolution,
    ctx: &LoadContext<'_>,
    search_paths: &mut SearchPaths,
) -> Result<ConfigDescriptor> {
    let mut parsed = Vec::new();
    let mut first_error = None;

    for marker in &resolution.markers {
        match read_descriptor(marker, ctx) {
            Ok(terms) => parsed.push(Parsed {
                dir: marker.parent().unwrap_or(marker),
                terms,
            }),
            Err(e @ Error::DescriptorUnreadable { .. }) => return Err(e),
            Err(e) => {
                tracing::warn!("Skipping {}: {e}", marker.display());
                first_error.get_or_insert(e);
            }
        }
    }

    let Some(winner) = parsed.first() else {
        return Err(first_error.unwrap_or_else(|| Error::MissingDescriptor {
            root: resolution.project_root.clone(),
            expected: "rebar.config".to_string(),
        }));
    };

    let options = proplist_get(&winner.terms, "erl_opts")
        .and_then(Term::as_list)
        .map(|opts| from_erl_opts(opts, winner.dir))
        .unwrap_or_default();
    let include_dirs = sub_dirs(&winner.terms)
        .into_iter()
        .map(|sub_dir| paths::absolute(winner.dir, &sub_dir).join("include"))
        .collect();

    for descriptor in &parsed {
        register_code_paths(descriptor, search_paths);
    }

    Ok(ConfigDescriptor {
        options,
        include_dirs,
    })
}

fn read_descriptor(path: &Path, ctx: &LoadContext<'_>) -> Result<Vec<Term>> {
    if path.extension().is_some_and(|ext| ext == SCRIPT_EXTENSION) {
        // the script sees the static file beside it as CONFIG
        let static_config = path.with_extension("");
        let config = if static_config.is_file() {
            consult_file(&static_config)?
        } else {
            Vec::new()
        };
        evaluate_script(path, &config, ctx)
    } else {
        consult_file(path)
    }
}

fn register_code_paths(descriptor: &Parsed<'_>, search_paths: &mut SearchPaths) {
    let deps_dir = proplist_get(&descriptor.terms, "deps_dir")
        .and_then(Term::as_name)
        .unwrap_or_else(|| DEFAULT_DEPS_DIR.to_string());
    let deps_root = paths::absolute(descriptor.dir, Path::new(&deps_dir));
    search_paths.register_all(paths::wildcard(&deps_root, "*/ebin"));

    let lib_dirs = proplist_get(&descriptor.terms, "lib_dirs")
        .and_then(Term::as_list)
        .unwrap_or_default();
    for lib_dir in lib_dirs.iter().filter_map(Term::as_name) {
        let lib_root = paths::absolute(descriptor.dir, Path::new(&lib_dir));
        search_paths.register_all(paths::wildcard(&lib_root, "*/ebin"));
    }

    for sub_dir in sub_dirs(&descriptor.terms) {
        search_paths.register(paths::absolute(descriptor.dir, &sub_dir).join("ebin"));
    }
}

fn sub_dirs(terms: &[Term]) -> Vec<PathBuf> {
    proplist_get(terms, "sub_dirs")
        .and_then(Term::as_list)
        .unwrap_or_default()
        .iter()
        .filter_map(Term::as_name)
        .map(PathBuf::from)
        .collect()
}
