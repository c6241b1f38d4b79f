use std::path::{Path, PathBuf};

use crate::build_system::Resolution;
use crate::error::{Error, Result};
use crate::paths;
use crate::process::CommandSpec;
use crate::term::{Term, proplist_get};

use super::{
    ConfigDescriptor, LoadContext, SearchPaths, consult_file, evaluate_script, from_erl_opts,
};

const DESCRIPTOR: &str = "rebar.config";
const DESCRIPTOR_SCRIPT: &str = "rebar.config.script";
const DEFAULT_PROFILE: &str = "default";
/// Project key selecting the profile whose paths are used for checking:
/// `{erlcheck, [{profile, test}]}`
const PROFILE_KEY: &str = "erlcheck";

/// Load a rebar3 project rooted at the winning lock file's directory.
pub(super) fn load(
    resolution: &Resolution,
    ctx: &LoadContext<'_>,
    search_paths: &mut SearchPaths,
) -> Result<ConfigDescriptor> {
    let root = &resolution.project_root;
    let terms = read_companion(root, ctx)?;

    let profile = proplist_get(&terms, PROFILE_KEY)
        .and_then(|settings| settings.get("profile"))
        .and_then(Term::as_name)
        .unwrap_or_else(|| DEFAULT_PROFILE.to_string());
    let tool = find_tool(root, ctx)?;

    let spec = path_command(&tool, root, &profile, None);
    let output = ctx.runner.run(&spec, ctx.timeout())?;
    if !output.success() {
        return Err(Error::ToolFailed {
            command: spec.to_shell_command(),
            code: output.code,
            output: output.combined(),
        });
    }
    let added = search_paths.register_all(parse_paths(&output.stdout, root));
    tracing::debug!("rebar3 profile {profile}: {added} new code path(s)");

    for (name, deps) in extra_profiles(&terms, &profile) {
        let spec = path_command(&tool, root, &name, Some(&deps));
        match ctx.runner.run(&spec, ctx.timeout()) {
            Ok(output) if output.success() => {
                search_paths.register_all(parse_paths(&output.stdout, root));
            }
            Ok(output) => tracing::warn!(
                "Ignoring profile {name}: '{}' exited with {:?}",
                spec.to_shell_command(),
                output.code
            ),
            Err(e) => tracing::warn!("Ignoring profile {name}: {e}"),
        }
    }

    let options = proplist_get(&terms, "erl_opts")
        .and_then(Term::as_list)
        .map(|opts| from_erl_opts(opts, root))
        .unwrap_or_default();

    Ok(ConfigDescriptor {
        options,
        include_dirs: Vec::new(),
    })
}

/// `rebar.config` in the project root, rewritten by `rebar.config.script`
/// when one exists.
fn read_companion(root: &Path, ctx: &LoadContext<'_>) -> Result<Vec<Term>> {
    let descriptor = root.join(DESCRIPTOR);
    let script = root.join(DESCRIPTOR_SCRIPT);
    let has_descriptor = descriptor.is_file();
    let has_script = script.is_file();

    if !has_descriptor && !has_script {
        return Err(Error::MissingDescriptor {
            root: root.to_path_buf(),
            expected: DESCRIPTOR.to_string(),
        });
    }

    let terms = if has_descriptor {
        consult_file(&descriptor)?
    } else {
        Vec::new()
    };
    if has_script {
        evaluate_script(&script, &terms, ctx)
    } else {
        Ok(terms)
    }
}

/// The project's own `rebar3` wins over the configured one, which is looked
/// up on `PATH` unless it is already a path.
fn find_tool(root: &Path, ctx: &LoadContext<'_>) -> Result<PathBuf> {
    let project_local = root.join("rebar3");
    if project_local.is_file() {
        return Ok(project_local);
    }

    let configured = &ctx.settings.rebar3;
    let found = if configured.components().count() > 1 {
        configured.is_file().then(|| configured.clone())
    } else {
        paths::find_in_path(&configured.to_string_lossy())
    };

    found.ok_or_else(|| Error::ToolNotFound {
        tool: configured.display().to_string(),
        project_local,
    })
}

fn path_command(tool: &Path, root: &Path, profile: &str, apps: Option<&[String]>) -> CommandSpec {
    let mut spec = CommandSpec::new(tool)
        .args(["as", profile, "path"])
        .with_working_dir(root)
        .with_env("QUIET", "1");
    if let Some(apps) = apps {
        spec = spec.arg(format!("--app={}", apps.join(",")));
    }
    spec
}

fn parse_paths(stdout: &str, root: &Path) -> Vec<PathBuf> {
    stdout
        .split_whitespace()
        .map(|fragment| paths::absolute(root, Path::new(fragment)))
        .collect()
}

/// Every profile other than `active` that declares dependencies, with the
/// names of those dependencies.
fn extra_profiles(terms: &[Term], active: &str) -> Vec<(String, Vec<String>)> {
    let Some(profiles) = proplist_get(terms, "profiles").and_then(Term::as_list) else {
        return Vec::new();
    };

    profiles
        .iter()
        .filter_map(|entry| match entry.as_tuple() {
            Some([name, settings]) => Some((name.as_name()?, settings)),
            _ => None,
        })
        .filter(|(name, _)| name != active)
        .filter_map(|(name, settings)| {
            let deps: Vec<String> = settings
                .get("deps")?
                .as_list()?
                .iter()
                .filter_map(dep_name)
                .collect();
            (!deps.is_empty()).then_some((name, deps))
        })
        .collect()
}

/// `cowboy`, `{cowboy, "2.10.0"}` and `{cowboy, {git, ...}}` all name `cowboy`.
fn dep_name(dep: &Term) -> Option<String> {
    dep.as_atom()
        .map(str::to_string)
        .or_else(|| dep.as_tuple()?.first()?.as_name())
}
