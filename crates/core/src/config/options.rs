use std::path::{Path, PathBuf};

use crate::paths;
use crate::term::Term;

/// Flags dropped from loaded `erl_opts`. `warnings_as_errors` turns every
/// warning into a line editors show as an error, and the output directory
/// is decided by the checker, not the project.
const STRIPPED_FLAGS: &[&str] = &["warnings_as_errors"];

/// One compiler option, as understood by `compile:file/2`.
#[derive(Debug, Clone, PartialEq)]
pub enum CompileOption {
    /// A bare atom option such as `debug_info`
    Flag(String),
    /// `{i, Dir}`
    Include(PathBuf),
    /// `{outdir, Dir}`
    OutDir(PathBuf),
    /// `{d, Name}` or `{d, Name, Value}`
    Define { name: String, value: Option<Term> },
    /// Anything else, passed through as-is
    Raw(Term),
}

impl CompileOption {
    pub fn flag(name: impl Into<String>) -> Self {
        CompileOption::Flag(name.into())
    }

    /// Interpret an `erl_opts` entry. Relative include and output
    /// directories are resolved against `base`.
    pub fn from_term(term: &Term, base: &Path) -> Self {
        if let Some(name) = term.as_atom() {
            return CompileOption::Flag(name.to_string());
        }
        match term.as_tuple() {
            Some([key, dir]) if key.as_atom() == Some("i") => match dir.as_name() {
                Some(dir) => CompileOption::Include(paths::absolute(base, Path::new(&dir))),
                None => CompileOption::Raw(term.clone()),
            },
            Some([key, dir]) if key.as_atom() == Some("outdir") => match dir.as_name() {
                Some(dir) => CompileOption::OutDir(paths::absolute(base, Path::new(&dir))),
                None => CompileOption::Raw(term.clone()),
            },
            Some([key, name]) if key.as_atom() == Some("d") => match name.as_name() {
                Some(name) => CompileOption::Define { name, value: None },
                None => CompileOption::Raw(term.clone()),
            },
            Some([key, name, value]) if key.as_atom() == Some("d") => match name.as_name() {
                Some(name) => CompileOption::Define {
                    name,
                    value: Some(value.clone()),
                },
                None => CompileOption::Raw(term.clone()),
            },
            _ => CompileOption::Raw(term.clone()),
        }
    }

    pub fn to_term(&self) -> Term {
        match self {
            CompileOption::Flag(name) => Term::atom(name.clone()),
            CompileOption::Include(dir) => Term::Tuple(vec![
                Term::atom("i"),
                Term::string(dir.to_string_lossy()),
            ]),
            CompileOption::OutDir(dir) => Term::Tuple(vec![
                Term::atom("outdir"),
                Term::string(dir.to_string_lossy()),
            ]),
            CompileOption::Define { name, value: None } => {
                Term::Tuple(vec![Term::atom("d"), Term::atom(name.clone())])
            }
            CompileOption::Define {
                name,
                value: Some(value),
            } => Term::Tuple(vec![Term::atom("d"), Term::atom(name.clone()), value.clone()]),
            CompileOption::Raw(term) => term.clone(),
        }
    }

    fn is_stripped(&self) -> bool {
        match self {
            CompileOption::Flag(name) => STRIPPED_FLAGS.contains(&name.as_str()),
            CompileOption::OutDir(_) => true,
            _ => false,
        }
    }
}

/// Convert an `erl_opts` list, dropping options the checker controls.
pub fn from_erl_opts(opts: &[Term], base: &Path) -> Vec<CompileOption> {
    opts.iter()
        .map(|term| CompileOption::from_term(term, base))
        .filter(|option| {
            let stripped = option.is_stripped();
            if stripped {
                tracing::debug!("Ignoring compiler option {}", option.to_term());
            }
            !stripped
        })
        .collect()
}
