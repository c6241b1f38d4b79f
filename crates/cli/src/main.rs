use std::process::ExitCode;

use clap::Parser;
use erlcheck::Cli;
use erlcheck::commands::check_command;
use tracing_subscriber::EnvFilter;

/// Exit status for bad invocations and startup failures, matching clap's.
const USAGE_ERROR: u8 = 2;

fn main() -> ExitCode {
    let cli = Cli::parse();

    // RUST_LOG wins; otherwise -v turns on our own debug output
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if cli.verbose {
            EnvFilter::new("warn,erlcheck=debug,erlcheck_core=debug")
        } else {
            EnvFilter::new("warn")
        }
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let load = cli.remote_target().unwrap_or_else(|e| e.exit());

    match check_command(&cli, load) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::from(USAGE_ERROR)
        }
    }
}
