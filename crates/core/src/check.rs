//! Checking source files end to end
//!
//! For each file: resolve the project, load its build configuration,
//! compile, then hand the result to the post-compile pipeline. Only the
//! first three steps can fail a file.

use std::io::Write;
use std::path::{Path, PathBuf};

use crate::build_system::{self, Resolution};
use crate::compiler::{CompileRequest, CompileResult, Compiler, ErlcCompiler};
use crate::config::{self, CompileOption, LoadContext, SearchPaths, Settings};
use crate::error::Result;
use crate::paths;
use crate::pipeline::{Compiled, Pipeline, PipelineReport};
use crate::process::{ProcessRunner, SystemRunner};
use crate::reload::{ErlReloader, Reloader, RemoteTarget};
use crate::xref::{Analyzer, ErlXref};

/// Warnings always asked of the compiler, ahead of the project's options.
const DIAGNOSTIC_FLAGS: &[&str] = &[
    "report",
    "warn_export_all",
    "warn_export_vars",
    "warn_shadow_vars",
    "warn_obsolete_guard",
    "warn_unused_import",
];

/// Where to replicate fresh artifacts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopySpec {
    pub target: PathBuf,
}

/// Run options, fixed for the whole run.
#[derive(Debug, Clone, Default)]
pub struct CheckConfig {
    /// Where compiled modules are written; `None` checks without writing
    pub outdir: Option<PathBuf>,
    pub xref: bool,
    pub load: Option<RemoteTarget>,
    pub copy: Option<CopySpec>,
    pub settings: Settings,
}

impl CheckConfig {
    /// The full option list for one file, in the order the compiler sees it.
    ///
    /// The application's own directories go last so project options cannot
    /// shadow them.
    pub fn compile_options(
        &self,
        app_root: &Path,
        loaded: Vec<CompileOption>,
    ) -> Vec<CompileOption> {
        let mut options: Vec<CompileOption> =
            DIAGNOSTIC_FLAGS.iter().map(|flag| CompileOption::flag(*flag)).collect();
        if self.xref {
            options.push(CompileOption::flag("debug_info"));
        }
        options.extend(loaded);
        options.push(match &self.outdir {
            Some(dir) => CompileOption::OutDir(dir.clone()),
            None => CompileOption::flag("strong_validation"),
        });
        options.extend([
            CompileOption::Include(app_root.join("src")),
            CompileOption::Include(app_root.join("include")),
            CompileOption::Include(app_root.to_path_buf()),
        ]);
        options
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileStatus {
    Passed,
    /// The build configuration could not be loaded
    ConfigFailed,
    CompileFailed,
}

#[derive(Debug)]
pub struct FileOutcome {
    pub file: PathBuf,
    pub status: FileStatus,
    /// Lines this checker printed for the file, not counting compiler output
    pub diagnostics: Vec<String>,
    pub pipeline: Option<PipelineReport>,
}

impl FileOutcome {
    pub fn passed(&self) -> bool {
        self.status == FileStatus::Passed
    }
}

#[derive(Debug, Default)]
pub struct CheckReport {
    pub files: Vec<FileOutcome>,
}

impl CheckReport {
    pub fn passed(&self) -> bool {
        self.files.iter().all(FileOutcome::passed)
    }

    pub fn failed_count(&self) -> usize {
        self.files.iter().filter(|f| !f.passed()).count()
    }
}

/// Checks files one after another, sharing code paths between them.
pub struct Checker<'a> {
    config: &'a CheckConfig,
    runner: Box<dyn ProcessRunner + 'a>,
    compiler: Box<dyn Compiler + 'a>,
    analyzer: Box<dyn Analyzer + 'a>,
    reloader: Box<dyn Reloader + 'a>,
    search_paths: SearchPaths,
}

impl<'a> Checker<'a> {
    /// A checker that runs the real `erlc`, `erl` and build tools.
    pub fn new(config: &'a CheckConfig) -> Self {
        Self {
            config,
            runner: Box::new(SystemRunner),
            compiler: Box::new(ErlcCompiler::new(&config.settings)),
            analyzer: Box::new(ErlXref::new(&config.settings)),
            reloader: Box::new(ErlReloader::new(&config.settings)),
            search_paths: SearchPaths::new(),
        }
    }

    pub fn with_runner(mut self, runner: impl ProcessRunner + 'a) -> Self {
        self.runner = Box::new(runner);
        self
    }

    pub fn with_compiler(mut self, compiler: impl Compiler + 'a) -> Self {
        self.compiler = Box::new(compiler);
        self
    }

    pub fn with_analyzer(mut self, analyzer: impl Analyzer + 'a) -> Self {
        self.analyzer = Box::new(analyzer);
        self
    }

    pub fn with_reloader(mut self, reloader: impl Reloader + 'a) -> Self {
        self.reloader = Box::new(reloader);
        self
    }

    /// Code paths registered so far in this run.
    pub fn search_paths(&self) -> &SearchPaths {
        &self.search_paths
    }

    pub fn check_all<P: AsRef<Path>>(&mut self, files: &[P]) -> CheckReport {
        let mut report = CheckReport::default();
        for file in files {
            report.files.push(self.check_file(file.as_ref()));
        }
        tracing::debug!(
            "Checked {} file(s), {} failed",
            report.files.len(),
            report.failed_count()
        );
        report
    }

    pub fn check_file(&mut self, file: &Path) -> FileOutcome {
        let file = match std::env::current_dir() {
            Ok(cwd) => paths::absolute(&cwd, file),
            Err(_) => paths::normalize(file),
        };
        tracing::debug!("Checking {}", file.display());

        let resolution = build_system::resolve(&file);
        let loaded = match self.load(&resolution) {
            Ok(loaded) => loaded,
            Err(e) => {
                let line = e.diagnostic(&file);
                emit(&line);
                return FileOutcome {
                    file,
                    status: FileStatus::ConfigFailed,
                    diagnostics: vec![line],
                    pipeline: None,
                };
            }
        };

        let options = self.config.compile_options(&resolution.app_root, loaded);
        let request = CompileRequest {
            file: &file,
            options: &options,
            code_paths: self.search_paths.paths(),
        };
        let module = match self.compiler.compile(&request) {
            Ok(CompileResult::Success { module }) => module,
            Ok(CompileResult::Failure) => {
                return FileOutcome {
                    file,
                    status: FileStatus::CompileFailed,
                    diagnostics: Vec::new(),
                    pipeline: None,
                };
            }
            Err(e) => {
                let line = e.diagnostic(&file);
                emit(&line);
                return FileOutcome {
                    file,
                    status: FileStatus::CompileFailed,
                    diagnostics: vec![line],
                    pipeline: None,
                };
            }
        };

        let pipeline = Pipeline::new(self.config, self.analyzer.as_ref(), self.reloader.as_ref());
        let report = pipeline.run(&Compiled {
            file: &file,
            module: &module,
            code_paths: self.search_paths.paths(),
        });
        let diagnostics: Vec<String> = report.xref.iter().map(ToString::to_string).collect();
        for line in &diagnostics {
            emit(line);
        }

        FileOutcome {
            file,
            status: FileStatus::Passed,
            diagnostics,
            pipeline: Some(report),
        }
    }

    fn load(&mut self, resolution: &Resolution) -> Result<Vec<CompileOption>> {
        let ctx = LoadContext {
            runner: self.runner.as_ref(),
            settings: &self.config.settings,
        };
        let descriptor = config::load(resolution, &ctx, &mut self.search_paths)?;
        Ok(descriptor.into_options())
    }
}

/// Diagnostics go to stdout, where the editor reads them.
fn emit(line: &str) {
    let mut stdout = std::io::stdout().lock();
    if let Err(e) = writeln!(stdout, "{line}") {
        tracing::error!("Failed to write diagnostic: {e}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_option_order_without_outdir() {
        let config = CheckConfig::default();
        let options = config.compile_options(
            Path::new("/proj"),
            vec![CompileOption::Include(PathBuf::from("/proj/lib/x/include"))],
        );

        let rendered: Vec<String> = options.iter().map(|o| o.to_term().to_string()).collect();
        assert_eq!(
            rendered,
            vec![
                "report",
                "warn_export_all",
                "warn_export_vars",
                "warn_shadow_vars",
                "warn_obsolete_guard",
                "warn_unused_import",
                r#"{i,"/proj/lib/x/include"}"#,
                "strong_validation",
                r#"{i,"/proj/src"}"#,
                r#"{i,"/proj/include"}"#,
                r#"{i,"/proj"}"#,
            ]
        );
    }

    #[test]
    fn test_option_order_with_outdir_and_xref() {
        let config = CheckConfig {
            outdir: Some(PathBuf::from("/out")),
            xref: true,
            ..Default::default()
        };
        let options = config.compile_options(Path::new("/proj"), Vec::new());

        assert_eq!(options[6], CompileOption::flag("debug_info"));
        assert_eq!(options[7], CompileOption::OutDir(PathBuf::from("/out")));
        assert!(!options.contains(&CompileOption::flag("strong_validation")));
    }

    #[test]
    fn test_report_fails_if_any_file_failed() {
        let outcome = |status| FileOutcome {
            file: PathBuf::from("/a.erl"),
            status,
            diagnostics: Vec::new(),
            pipeline: None,
        };
        let report = CheckReport {
            files: vec![outcome(FileStatus::Passed), outcome(FileStatus::ConfigFailed)],
        };
        assert!(!report.passed());
        assert_eq!(report.failed_count(), 1);
        assert!(CheckReport::default().passed());
    }
}
