use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Errors that can occur while resolving, loading or compiling a file
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO error: {0}")]
    IoError(#[from] io::Error),

    #[error("Failed to read {}: {source}", path.display())]
    DescriptorUnreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{message}")]
    DescriptorSyntax {
        path: PathBuf,
        line: usize,
        message: String,
    },

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Missing {expected} in project root {}", root.display())]
    MissingDescriptor { root: PathBuf, expected: String },

    #[error("Build tool '{tool}' not found (looked in {} and PATH)", project_local.display())]
    ToolNotFound { tool: String, project_local: PathBuf },

    #[error("Command '{command}' failed with {}: {output}", exit_description(code))]
    ToolFailed {
        command: String,
        code: Option<i32>,
        output: String,
    },

    #[error("Command '{command}' timed out after {}s", timeout.as_secs())]
    ToolTimedOut { command: String, timeout: Duration },

    #[error("Term error: {0}")]
    TermError(#[from] crate::term::TermError),

    #[error("Invalid beam file: {0}")]
    BeamError(String),

    #[error("Cross reference error: {0}")]
    XrefError(String),

    #[error("Failed to parse settings {}: {source}", path.display())]
    SettingsError {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

fn exit_description(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code {code}"),
        None => "no exit code (killed or timed out)".to_string(),
    }
}

impl Error {
    /// Formats the error as an editor-addressable `path:line: message` line.
    ///
    /// Descriptor syntax errors point at the descriptor itself; everything
    /// else is reported against the file being checked.
    pub fn diagnostic(&self, target: &Path) -> String {
        match self {
            Error::DescriptorSyntax {
                path,
                line,
                message,
            } => format!("{}:{}: {}", path.display(), line, message),
            other => format!("{}:1: {}", target.display(), other),
        }
    }
}

/// Result type alias for erlcheck operations
pub type Result<T> = std::result::Result<T, Error>;
