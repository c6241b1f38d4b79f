//! Reads the abstract code embedded in compiled `.beam` files
//!
//! Only what the cross-reference stage needs: the chunk table, the debug
//! info (or legacy abstract code) chunk, and a lookup from a function's
//! name and arity to the source file and line it was defined at.

use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::term::{Term, etf};

/// A `.beam` file split into its IFF chunks.
#[derive(Debug, Clone)]
pub struct BeamFile {
    chunks: Vec<([u8; 4], Vec<u8>)>,
}

/// Where a function is defined.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLocation {
    pub file: PathBuf,
    pub line: u32,
}

impl BeamFile {
    pub fn read(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        Self::parse(&bytes)
    }

    pub fn parse(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < 12 || &bytes[0..4] != b"FOR1" || &bytes[8..12] != b"BEAM" {
            return Err(Error::BeamError("missing FOR1/BEAM header".to_string()));
        }
        let declared = u32::from_be_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]) as usize;
        let end = (declared + 8).min(bytes.len());

        let mut chunks = Vec::new();
        let mut pos = 12;
        while pos + 8 <= end {
            let mut id = [0u8; 4];
            id.copy_from_slice(&bytes[pos..pos + 4]);
            let size =
                u32::from_be_bytes([bytes[pos + 4], bytes[pos + 5], bytes[pos + 6], bytes[pos + 7]])
                    as usize;
            let start = pos + 8;
            let stop = start
                .checked_add(size)
                .filter(|stop| *stop <= end)
                .ok_or_else(|| {
                    Error::BeamError(format!(
                        "chunk {} overruns the file",
                        String::from_utf8_lossy(&id)
                    ))
                })?;
            chunks.push((id, bytes[start..stop].to_vec()));
            // chunks are padded to a multiple of four bytes
            pos = stop + (4 - size % 4) % 4;
        }
        Ok(Self { chunks })
    }

    pub fn chunk(&self, id: &[u8; 4]) -> Option<&[u8]> {
        self.chunks
            .iter()
            .find(|(chunk_id, _)| chunk_id == id)
            .map(|(_, data)| data.as_slice())
    }

    /// The abstract forms, if the module was compiled with debug info.
    pub fn abstract_forms(&self) -> Result<Option<Vec<Term>>> {
        if let Some(data) = self.chunk(b"Dbgi").filter(|d| !d.is_empty()) {
            // {debug_info_v1, erl_abstract_code, {Forms | none, Opts}}
            let term = etf::decode(data)?;
            let forms = match term.as_tuple() {
                Some([tag, backend, payload])
                    if tag.as_atom() == Some("debug_info_v1")
                        && backend.as_atom() == Some("erl_abstract_code") =>
                {
                    payload
                        .as_tuple()
                        .and_then(|p| p.first())
                        .and_then(Term::as_list)
                        .map(<[Term]>::to_vec)
                }
                _ => None,
            };
            return Ok(forms);
        }

        if let Some(data) = self.chunk(b"Abst").filter(|d| !d.is_empty()) {
            // {raw_abstract_v1, Forms}
            let term = etf::decode(data)?;
            return Ok(match term.as_tuple() {
                Some([tag, forms]) if tag.as_atom() == Some("raw_abstract_v1") => {
                    forms.as_list().map(<[Term]>::to_vec)
                }
                _ => None,
            });
        }

        Ok(None)
    }
}

/// Line number carried by an abstract-code annotation.
fn anno_line(anno: &Term) -> Option<u32> {
    match anno {
        Term::Integer(line) => u32::try_from(*line).ok(),
        Term::Tuple(items) => items.first().and_then(anno_line),
        Term::List(items) => crate::term::proplist_get(items, "location").and_then(anno_line),
        _ => None,
    }
}

/// Find the definition of `name/arity` among `forms`.
///
/// The file is whichever `-file` attribute was last in effect, so functions
/// pulled in from headers resolve to the header.
pub fn find_function(forms: &[Term], name: &str, arity: u32) -> Option<SourceLocation> {
    let mut current_file: Option<PathBuf> = None;
    for form in forms {
        match form.as_tuple() {
            Some([kind, _anno, attr, value])
                if kind.as_atom() == Some("attribute") && attr.as_atom() == Some("file") =>
            {
                if let Some(file) = value
                    .as_tuple()
                    .and_then(|v| v.first())
                    .and_then(Term::as_str)
                {
                    current_file = Some(PathBuf::from(file));
                }
            }
            Some([kind, anno, fname, farity, _clauses])
                if kind.as_atom() == Some("function")
                    && fname.as_atom() == Some(name)
                    && farity.as_integer() == Some(i64::from(arity)) =>
            {
                return Some(SourceLocation {
                    file: current_file.unwrap_or_default(),
                    line: anno_line(anno).unwrap_or(1),
                });
            }
            _ => {}
        }
    }
    None
}
