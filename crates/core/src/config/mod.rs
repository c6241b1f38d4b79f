//! Build configuration loading
//!
//! Turns a resolved project into the compiler options and code paths its
//! build system would use. Each build system has its own loader; all of
//! them append code paths to a caller-owned [`SearchPaths`] before the
//! compile call and never remove any.

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::build_system::{BuildSystemKind, Resolution};
use crate::error::{Error, Result};
use crate::paths;
use crate::process::{CommandSpec, ProcessRunner};
use crate::term::{self, Term};

mod make;
mod options;
mod rebar;
mod rebar3;
mod search_paths;
mod settings;

pub use options::{CompileOption, from_erl_opts};
pub use search_paths::SearchPaths;
pub use settings::Settings;

/// Options and include directories loaded for one file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigDescriptor {
    pub options: Vec<CompileOption>,
    pub include_dirs: Vec<PathBuf>,
}

impl ConfigDescriptor {
    /// Options followed by one `{i, Dir}` per include directory.
    pub fn into_options(self) -> Vec<CompileOption> {
        let mut options = self.options;
        options.extend(self.include_dirs.into_iter().map(CompileOption::Include));
        options
    }
}

/// What the loaders need from the outside world.
pub struct LoadContext<'a> {
    pub runner: &'a dyn ProcessRunner,
    pub settings: &'a Settings,
}

impl LoadContext<'_> {
    fn timeout(&self) -> Option<Duration> {
        Some(self.settings.subprocess_timeout())
    }
}

/// Load the configuration for `resolution`, registering code paths.
pub fn load(
    resolution: &Resolution,
    ctx: &LoadContext<'_>,
    search_paths: &mut SearchPaths,
) -> Result<ConfigDescriptor> {
    tracing::debug!(
        "Loading {} configuration for {}",
        resolution.kind.name(),
        resolution.file.display()
    );
    match resolution.kind {
        BuildSystemKind::Rebar3 => rebar3::load(resolution, ctx, search_paths),
        BuildSystemKind::Rebar => rebar::load(resolution, ctx, search_paths),
        BuildSystemKind::Make => Ok(make::load(&resolution.project_root, search_paths)),
        BuildSystemKind::Unknown => Ok(load_fallback(&resolution.project_root)),
    }
}

/// Include paths for a file with no recognised build system.
pub fn load_fallback(root: &Path) -> ConfigDescriptor {
    ConfigDescriptor {
        options: Vec::new(),
        include_dirs: vec![
            root.join("include"),
            paths::absolute(root, Path::new("../include")),
            root.to_path_buf(),
        ],
    }
}

/// Read a static descriptor with `file:consult/1` semantics.
pub(crate) fn consult_file(path: &Path) -> Result<Vec<Term>> {
    let contents = std::fs::read_to_string(path).map_err(|source| Error::DescriptorUnreadable {
        path: path.to_path_buf(),
        source,
    })?;
    term::consult(&contents).map_err(|e| match e {
        term::TermError::Syntax { line, message } => Error::DescriptorSyntax {
            path: path.to_path_buf(),
            line,
            message,
        },
        other => Error::TermError(other),
    })
}

/// Evaluate a `rebar.config.script` the way rebar does: with `CONFIG`
/// bound to the static configuration and `SCRIPT` to the script's path.
pub(crate) fn evaluate_script(
    script: &Path,
    config: &[Term],
    ctx: &LoadContext<'_>,
) -> Result<Vec<Term>> {
    if !script.is_file() {
        return Err(Error::DescriptorUnreadable {
            path: script.to_path_buf(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "no such file"),
        });
    }

    let script_path = Term::string(script.to_string_lossy());
    let expr = format!(
        "case file:script({script_path}, [{{'CONFIG', {config}}}, {{'SCRIPT', {script_path}}}]) of \
             {{ok, Result}} -> io:format(\"~p.~n\", [Result]), halt(0); \
             {{error, Reason}} -> io:format(standard_error, \"~p~n\", [Reason]), halt(1) \
         end.",
        config = Term::List(config.to_vec()),
    );
    let spec = CommandSpec::new(&ctx.settings.erl)
        .args(["-noshell", "-eval"])
        .arg(expr)
        .with_working_dir(script.parent().unwrap_or(script));

    let output = ctx.runner.run(&spec, ctx.timeout())?;
    if !output.success() {
        return Err(Error::ToolFailed {
            command: spec.to_shell_command(),
            code: output.code,
            output: output.combined(),
        });
    }

    let result = term::parse_term(&output.stdout).map_err(|e| {
        Error::ConfigError(format!(
            "{} did not evaluate to a term: {e}",
            script.display()
        ))
    })?;
    match result {
        Term::List(items) => Ok(items),
        other => Err(Error::ConfigError(format!(
            "{} evaluated to {other}, expected a list",
            script.display()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use crate::process::testing::{ScriptedRunner, ok};
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_fallback_include_dirs() {
        let descriptor = load_fallback(Path::new("/work/loose"));
        assert_eq!(
            descriptor.include_dirs,
            vec![
                PathBuf::from("/work/loose/include"),
                PathBuf::from("/work/include"),
                PathBuf::from("/work/loose"),
            ]
        );
        assert!(descriptor.options.is_empty());
    }

    #[test]
    fn test_into_options_appends_includes() {
        let descriptor = ConfigDescriptor {
            options: vec![CompileOption::flag("debug_info")],
            include_dirs: vec![PathBuf::from("/p/include")],
        };
        assert_eq!(
            descriptor.into_options(),
            vec![
                CompileOption::flag("debug_info"),
                CompileOption::Include(PathBuf::from("/p/include")),
            ]
        );
    }

    #[test]
    fn test_consult_file_reports_descriptor_line() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("rebar.config");
        std::fs::write(&path, "{erl_opts, []}.\n{deps, [}.\n").unwrap();

        match consult_file(&path) {
            Err(Error::DescriptorSyntax { path: p, line, .. }) => {
                assert_eq!(p, path);
                assert_eq!(line, 2);
            }
            other => panic!("expected a syntax error, got {other:?}"),
        }
    }

    #[test]
    fn test_evaluate_script_binds_config() {
        let temp_dir = TempDir::new().unwrap();
        let script = temp_dir.path().join("rebar.config.script");
        std::fs::write(&script, "CONFIG.").unwrap();

        let runner = ScriptedRunner::with_outputs(vec![ok("[{erl_opts,[debug_info]}].\n")]);
        let settings = Settings::default();
        let ctx = LoadContext {
            runner: &runner,
            settings: &settings,
        };

        let config = term::consult("{erl_opts, [debug_info]}.").unwrap();
        let terms = evaluate_script(&script, &config, &ctx).unwrap();
        assert_eq!(terms, config);

        let calls = runner.calls.borrow();
        assert_eq!(calls[0].program, PathBuf::from("erl"));
        assert!(calls[0].args[2].contains("{'CONFIG', [{erl_opts,[debug_info]}]}"));
        assert_eq!(calls[0].working_dir(), Some(temp_dir.path()));
    }
}
