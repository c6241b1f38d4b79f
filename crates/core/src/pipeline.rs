//! Post-compile stages: cross reference, hot reload and replication
//!
//! Runs only after a successful compile. Every stage is optional and best
//! effort: failures are logged and reported but never fail the file.

use std::path::{Path, PathBuf};

use crate::check::CheckConfig;
use crate::reload::{ReloadError, Reloader};
use crate::replicate::{ReplicationReport, replicate};
use crate::xref::{self, Analyzer, XrefWarning};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Compiled,
    Xref,
    Load,
    Copy,
    Done,
}

impl Stage {
    fn next(self) -> Self {
        match self {
            Stage::Compiled => Stage::Xref,
            Stage::Xref => Stage::Load,
            Stage::Load => Stage::Copy,
            Stage::Copy | Stage::Done => Stage::Done,
        }
    }
}

/// A module that compiled cleanly.
#[derive(Debug, Clone, Copy)]
pub struct Compiled<'a> {
    pub file: &'a Path,
    pub module: &'a str,
    pub code_paths: &'a [PathBuf],
}

/// What each stage that ran produced.
#[derive(Debug, Default)]
pub struct PipelineReport {
    pub xref: Vec<XrefWarning>,
    pub reload: Option<Result<(), ReloadError>>,
    pub replication: Option<ReplicationReport>,
}

pub struct Pipeline<'a> {
    config: &'a CheckConfig,
    analyzer: &'a dyn Analyzer,
    reloader: &'a dyn Reloader,
}

impl<'a> Pipeline<'a> {
    pub fn new(
        config: &'a CheckConfig,
        analyzer: &'a dyn Analyzer,
        reloader: &'a dyn Reloader,
    ) -> Self {
        Self {
            config,
            analyzer,
            reloader,
        }
    }

    pub fn run(&self, compiled: &Compiled<'_>) -> PipelineReport {
        let artifact = self
            .config
            .outdir
            .as_ref()
            .map(|dir| dir.join(format!("{}.beam", compiled.module)));

        let mut report = PipelineReport::default();
        let mut stage = Stage::Compiled;
        while stage != Stage::Done {
            stage = stage.next();
            match stage {
                Stage::Xref if self.config.xref => {
                    report.xref = self.cross_reference(compiled, artifact.as_deref());
                }
                Stage::Load => {
                    if let Some(target) = &self.config.load {
                        let result = match artifact.as_deref() {
                            Some(beam) if beam.is_file() => {
                                self.reloader.reload(target, compiled.module, beam)
                            }
                            other => Err(ReloadError::MissingObjectCode {
                                module: compiled.module.to_string(),
                                path: other.map(Path::to_path_buf).unwrap_or_default(),
                            }),
                        };
                        match &result {
                            Ok(()) => tracing::info!("Loaded {} into {target}", compiled.module),
                            Err(e) => tracing::warn!("Hot reload failed: {e}"),
                        }
                        report.reload = Some(result);
                    }
                }
                Stage::Copy => {
                    if let Some(copy) = &self.config.copy {
                        match artifact.as_deref() {
                            Some(beam) if beam.is_file() => {
                                report.replication = Some(replicate(beam, &copy.target));
                            }
                            _ => tracing::warn!(
                                "Not copying {}: no compiled artifact (use --outdir)",
                                compiled.module
                            ),
                        }
                    }
                }
                _ => {}
            }
        }
        report
    }

    fn cross_reference(
        &self,
        compiled: &Compiled<'_>,
        artifact: Option<&Path>,
    ) -> Vec<XrefWarning> {
        let Some(beam) = artifact else {
            tracing::warn!("Skipping xref for {}: no output directory", compiled.module);
            return Vec::new();
        };
        match self.analyzer.analyze(beam, compiled.code_paths) {
            Ok(report) => xref::undefined_warnings(&report, beam, compiled.file),
            Err(e) => {
                tracing::warn!("Cross reference check failed: {e}");
                Vec::new()
            }
        }
    }
}
