//! Cross-reference check of a freshly compiled module
//!
//! The analysis itself is OTP's `xref:m/1`; this module runs it, keeps the
//! undefined-call category and maps each caller back to a source line using
//! the debug info in the `.beam`.

use std::fmt;
use std::path::{Path, PathBuf};

use crate::beam::{self, BeamFile};
use crate::config::Settings;
use crate::error::{Error, Result};
use crate::process::{CommandSpec, ProcessRunner, SystemRunner};
use crate::term::{self, Term, proplist_get};

/// `module:function/arity`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Mfa {
    pub module: String,
    pub function: String,
    pub arity: u32,
}

impl Mfa {
    fn from_term(term: &Term) -> Option<Self> {
        match term.as_tuple()? {
            [module, function, arity] => Some(Self {
                module: module.as_atom()?.to_string(),
                function: function.as_atom()?.to_string(),
                arity: u32::try_from(arity.as_integer()?).ok()?,
            }),
            _ => None,
        }
    }
}

impl fmt::Display for Mfa {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}/{}",
            Term::atom(self.module.as_str()),
            Term::atom(self.function.as_str()),
            self.arity
        )
    }
}

/// A call from `caller` to `callee`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XrefCall {
    pub caller: Mfa,
    pub callee: Mfa,
}

/// Every category `xref:m/1` reports, in the analyzer's order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct XrefReport {
    pub undefined: Vec<XrefCall>,
    pub deprecated: Vec<XrefCall>,
    pub unused: Vec<Mfa>,
}

impl XrefReport {
    /// Parse the `[{deprecated, _}, {undefined, _}, {unused, _}]` proplist.
    pub fn from_term(term: &Term) -> Result<Self> {
        let items = term
            .as_list()
            .ok_or_else(|| Error::XrefError(format!("unexpected xref result {term}")))?;

        let calls = |key: &str| -> Vec<XrefCall> {
            proplist_get(items, key)
                .and_then(Term::as_list)
                .unwrap_or_default()
                .iter()
                .filter_map(|call| match call.as_tuple()? {
                    [caller, callee] => Some(XrefCall {
                        caller: Mfa::from_term(caller)?,
                        callee: Mfa::from_term(callee)?,
                    }),
                    _ => None,
                })
                .collect()
        };
        let unused = proplist_get(items, "unused")
            .and_then(Term::as_list)
            .unwrap_or_default()
            .iter()
            .filter_map(Mfa::from_term)
            .collect();

        Ok(Self {
            undefined: calls("undefined"),
            deprecated: calls("deprecated"),
            unused,
        })
    }
}

/// Runs a cross-reference analysis on one compiled module.
pub trait Analyzer {
    fn analyze(&self, beam: &Path, code_paths: &[PathBuf]) -> Result<XrefReport>;
}

impl<T: Analyzer + ?Sized> Analyzer for &T {
    fn analyze(&self, beam: &Path, code_paths: &[PathBuf]) -> Result<XrefReport> {
        (**self).analyze(beam, code_paths)
    }
}

/// [`Analyzer`] that runs `xref:m/1` in a throwaway `erl` node.
#[derive(Debug, Clone)]
pub struct ErlXref<R = SystemRunner> {
    runner: R,
    settings: Settings,
}

impl ErlXref<SystemRunner> {
    pub fn new(settings: &Settings) -> Self {
        Self::with_runner(SystemRunner, settings)
    }
}

impl<R: ProcessRunner> ErlXref<R> {
    pub fn with_runner(runner: R, settings: &Settings) -> Self {
        Self {
            runner,
            settings: settings.clone(),
        }
    }

    fn command(&self, beam: &Path, code_paths: &[PathBuf]) -> CommandSpec {
        let expr = format!(
            "case xref:m({}) of \
                 {{error, Module, Reason}} -> \
                     io:format(standard_error, \"~s~n\", [Module:format_error(Reason)]), halt(1); \
                 Result -> io:format(\"~p.~n\", [Result]), halt(0) \
             end.",
            Term::string(beam.to_string_lossy())
        );
        let mut spec = CommandSpec::new(&self.settings.erl).arg("-noshell");
        for dir in code_paths {
            spec = spec.arg("-pa").arg(dir.to_string_lossy());
        }
        spec.arg("-eval").arg(expr)
    }
}

impl<R: ProcessRunner> Analyzer for ErlXref<R> {
    fn analyze(&self, beam: &Path, code_paths: &[PathBuf]) -> Result<XrefReport> {
        let spec = self.command(beam, code_paths);
        let output = self
            .runner
            .run(&spec, Some(self.settings.subprocess_timeout()))?;
        if !output.success() {
            return Err(Error::XrefError(format!(
                "'{}' failed: {}",
                spec.to_shell_command(),
                output.combined().trim()
            )));
        }
        XrefReport::from_term(&term::parse_term(&output.stdout)?)
    }
}

/// An undefined call, located in the source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XrefWarning {
    pub file: PathBuf,
    pub line: u32,
    pub callee: Mfa,
}

impl fmt::Display for XrefWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}: Warning: Call to undefined function {}",
            self.file.display(),
            self.line,
            self.callee
        )
    }
}

/// Locate every undefined call in `report`.
///
/// Callers the debug info does not know about (compiler generated
/// functions, modules built without `debug_info`) land on line 1 of
/// `source`. The result is in the reverse of the analyzer's order.
pub fn undefined_warnings(
    report: &XrefReport,
    beam_path: &Path,
    source: &Path,
) -> Vec<XrefWarning> {
    let forms = match BeamFile::read(beam_path).and_then(|beam| beam.abstract_forms()) {
        Ok(forms) => forms.unwrap_or_default(),
        Err(e) => {
            tracing::debug!("No abstract code in {}: {e}", beam_path.display());
            Vec::new()
        }
    };

    let mut warnings: Vec<XrefWarning> = report
        .undefined
        .iter()
        .map(|call| {
            let location = beam::find_function(&forms, &call.caller.function, call.caller.arity);
            let (file, line) = match location {
                Some(location) if !location.file.as_os_str().is_empty() => {
                    (location.file, location.line)
                }
                Some(location) => (source.to_path_buf(), location.line),
                None => (source.to_path_buf(), 1),
            };
            XrefWarning {
                file,
                line,
                callee: call.callee.clone(),
            }
        })
        .collect();
    warnings.reverse();
    warnings
}
