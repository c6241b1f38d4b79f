//! erlcheck - build-aware checking of Erlang source files
//!
//! This crate provides functionality to:
//! - Find the application and project a source file belongs to and the
//!   build system (rebar3, rebar, make) that governs it
//! - Reconstruct the compiler options and code paths that build would use
//! - Compile with `erlc` and report diagnostics an editor can jump to
//! - Optionally cross-reference the result, hot-load it into a running node
//!   and copy it over stale artifacts
pub mod beam;
pub mod build_system;
pub mod check;
pub mod compiler;
pub mod config;
pub mod error;
pub mod paths;
pub mod pipeline;
pub mod process;
pub mod reload;
pub mod replicate;
pub mod term;
pub mod xref;

// Re-export commonly used types and traits
pub use build_system::{BuildSystemKind, Resolution};
pub use check::{CheckConfig, CheckReport, Checker, CopySpec, FileOutcome, FileStatus};
pub use compiler::{CompileRequest, CompileResult, Compiler};
pub use config::{CompileOption, SearchPaths, Settings};
pub use error::{Error, Result};
pub use reload::{NamingMode, ReloadError, Reloader, RemoteTarget};
pub use xref::Analyzer;
