//! Fakes shared by the integration tests

#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use erlcheck_core::compiler::{CompileRequest, CompileResult, Compiler};
use erlcheck_core::config::CompileOption;
use erlcheck_core::process::{CommandSpec, ProcessOutput, ProcessRunner};

/// Records commands and replays canned outputs in order.
#[derive(Default)]
pub struct FakeRunner {
    pub calls: RefCell<Vec<CommandSpec>>,
    outputs: RefCell<VecDeque<ProcessOutput>>,
}

impl FakeRunner {
    pub fn replying(outputs: Vec<ProcessOutput>) -> Self {
        Self {
            calls: RefCell::new(Vec::new()),
            outputs: RefCell::new(outputs.into()),
        }
    }
}

impl ProcessRunner for FakeRunner {
    fn run(
        &self,
        spec: &CommandSpec,
        _timeout: Option<Duration>,
    ) -> erlcheck_core::Result<ProcessOutput> {
        self.calls.borrow_mut().push(spec.clone());
        Ok(self.outputs.borrow_mut().pop_front().unwrap_or_default())
    }
}

pub fn exited(code: i32, stdout: &str, stderr: &str) -> ProcessOutput {
    ProcessOutput {
        code: Some(code),
        stdout: stdout.to_string(),
        stderr: stderr.to_string(),
        timed_out: false,
    }
}

/// What the compiler was asked to do.
#[derive(Debug, Clone)]
pub struct Recorded {
    pub file: PathBuf,
    pub options: Vec<CompileOption>,
    pub code_paths: Vec<PathBuf>,
}

/// Always succeeds, writing a placeholder `.beam` into the output directory
/// when one is requested.
#[derive(Default)]
pub struct FakeCompiler {
    pub requests: RefCell<Vec<Recorded>>,
}

impl Compiler for FakeCompiler {
    fn compile(&self, request: &CompileRequest<'_>) -> erlcheck_core::Result<CompileResult> {
        self.requests.borrow_mut().push(Recorded {
            file: request.file.to_path_buf(),
            options: request.options.to_vec(),
            code_paths: request.code_paths.to_vec(),
        });

        let module = request
            .file
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        for option in request.options {
            if let CompileOption::OutDir(dir) = option {
                fs::create_dir_all(dir)?;
                fs::write(dir.join(format!("{module}.beam")), b"fresh beam")?;
            }
        }
        Ok(CompileResult::Success { module })
    }
}

pub fn write(path: &Path, contents: &str) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, contents).unwrap();
}
