use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::config::{CompileOption, Settings};
use crate::error::{Error, Result};
use crate::process::{CommandSpec, ProcessRunner, SystemRunner};

use super::{CompileRequest, CompileResult, Compiler};

/// [`Compiler`] that shells out to `erlc`.
#[derive(Debug, Clone)]
pub struct ErlcCompiler<R = SystemRunner> {
    runner: R,
    erlc: PathBuf,
    timeout: Duration,
}

impl ErlcCompiler<SystemRunner> {
    pub fn new(settings: &Settings) -> Self {
        Self::with_runner(SystemRunner, settings)
    }
}

impl<R: ProcessRunner> ErlcCompiler<R> {
    pub fn with_runner(runner: R, settings: &Settings) -> Self {
        Self {
            runner,
            erlc: settings.erlc.clone(),
            timeout: settings.subprocess_timeout(),
        }
    }

    pub fn command(&self, request: &CompileRequest<'_>) -> CommandSpec {
        let mut spec = CommandSpec::new(&self.erlc);
        for dir in request.code_paths {
            spec = spec.arg("-pa").arg(dir.to_string_lossy());
        }
        for option in request.options {
            spec = spec.args(render_option(option));
        }
        spec.arg(request.file.to_string_lossy())
    }
}

impl<R: ProcessRunner> Compiler for ErlcCompiler<R> {
    fn compile(&self, request: &CompileRequest<'_>) -> Result<CompileResult> {
        let spec = self.command(request);
        let output = self.runner.run(&spec, Some(self.timeout))?;

        // erlc already prints `File:Line:Col: message`, pass it through as is
        let mut stdout = std::io::stdout().lock();
        stdout.write_all(output.stdout.as_bytes())?;
        stdout.write_all(output.stderr.as_bytes())?;
        stdout.flush()?;

        if output.timed_out {
            tracing::warn!(
                "erlc timed out after {}s on {}",
                self.timeout.as_secs(),
                request.file.display()
            );
            // the caller turns this into a `file:1:` line for the editor
            return Err(Error::ToolTimedOut {
                command: spec.to_shell_command(),
                timeout: self.timeout,
            });
        }
        if !output.success() {
            return Ok(CompileResult::Failure);
        }
        Ok(CompileResult::Success {
            module: module_name(request.file),
        })
    }
}

/// The module a source file defines, by the `name.erl` convention.
pub fn module_name(file: &Path) -> String {
    file.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn render_option(option: &CompileOption) -> Vec<String> {
    match option {
        CompileOption::Include(dir) => {
            vec!["-I".to_string(), dir.to_string_lossy().into_owned()]
        }
        CompileOption::OutDir(dir) => {
            vec!["-o".to_string(), dir.to_string_lossy().into_owned()]
        }
        CompileOption::Define { name, value: None } => vec![format!("-D{name}")],
        CompileOption::Define {
            name,
            value: Some(value),
        } => vec![format!("-D{name}={value}")],
        CompileOption::Flag(_) | CompileOption::Raw(_) => {
            vec![format!("+{}", option.to_term())]
        }
    }
}
