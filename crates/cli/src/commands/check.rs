use std::path::Path;

use anyhow::{Context, Result};
use erlcheck_core::paths;
use erlcheck_core::{CheckConfig, Checker, CopySpec, RemoteTarget, Settings};
use tracing::debug;

use crate::cli::Cli;

/// Check every file on the command line. Returns whether all passed.
pub fn check_command(cli: &Cli, load: Option<RemoteTarget>) -> Result<bool> {
    let cwd = std::env::current_dir().context("Failed to read the current directory")?;
    let settings = Settings::discover(&cwd).context("Failed to load erlcheck settings")?;
    let config = build_config(cli, &cwd, settings, load);
    debug!("Check configuration: {:?}", config);

    let report = Checker::new(&config).check_all(&cli.files);
    if !report.passed() {
        debug!(
            "{} of {} file(s) failed",
            report.failed_count(),
            report.files.len()
        );
    }
    Ok(report.passed())
}

pub fn build_config(
    cli: &Cli,
    cwd: &Path,
    settings: Settings,
    load: Option<RemoteTarget>,
) -> CheckConfig {
    CheckConfig {
        outdir: cli.effective_outdir().map(|dir| paths::absolute(cwd, dir)),
        xref: cli.xref,
        load,
        copy: cli.copy.as_ref().map(|dir| CopySpec {
            target: paths::absolute(cwd, dir),
        }),
        settings,
    }
}
