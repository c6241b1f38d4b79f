//! The module compiler collaborator

use std::path::{Path, PathBuf};

use crate::config::CompileOption;
use crate::error::Result;

mod erlc;

pub use erlc::ErlcCompiler;

/// Everything needed to compile one file.
#[derive(Debug, Clone, Copy)]
pub struct CompileRequest<'a> {
    /// Absolute path of the source file
    pub file: &'a Path,
    pub options: &'a [CompileOption],
    /// Code paths in registration order
    pub code_paths: &'a [PathBuf],
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompileResult {
    Success { module: String },
    /// Diagnostics have already been printed by the compiler
    Failure,
}

/// Compiles a module and reports its own diagnostics.
pub trait Compiler {
    /// `Err` means the compiler could not be run at all, not that the
    /// file has errors.
    fn compile(&self, request: &CompileRequest<'_>) -> Result<CompileResult>;
}

impl<T: Compiler + ?Sized> Compiler for &T {
    fn compile(&self, request: &CompileRequest<'_>) -> Result<CompileResult> {
        (**self).compile(request)
    }
}
