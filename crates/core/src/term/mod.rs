//! Erlang term model
//!
//! Build descriptors (`rebar.config`), the output of the erl helpers and the
//! debug info embedded in `.beam` files are all Erlang terms. `text` parses
//! the human-readable syntax, `etf` decodes the binary external format, and
//! `Display` renders a term back to syntax `erl` accepts.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

pub mod etf;
pub mod text;

pub use text::{consult, parse_term};

/// Errors raised while parsing or decoding terms
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TermError {
    #[error("line {line}: {message}")]
    Syntax { line: usize, message: String },

    #[error("external term format: {0}")]
    Decode(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Term {
    Atom(String),
    Integer(i64),
    /// Integer outside the `i64` range, kept as its decimal text
    BigInteger(String),
    Float(f64),
    /// A charlist written as a string literal
    String(String),
    Binary(Vec<u8>),
    Tuple(Vec<Term>),
    List(Vec<Term>),
    ImproperList(Vec<Term>, Box<Term>),
    Map(Vec<(Term, Term)>),
}

impl Term {
    pub fn atom(name: impl Into<String>) -> Self {
        Term::Atom(name.into())
    }

    pub fn string(value: impl Into<String>) -> Self {
        Term::String(value.into())
    }

    pub fn as_atom(&self) -> Option<&str> {
        match self {
            Term::Atom(name) => Some(name),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Term::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_tuple(&self) -> Option<&[Term]> {
        match self {
            Term::Tuple(items) => Some(items),
            _ => None,
        }
    }

    /// Elements of a proper list. A string literal is not treated as a list.
    pub fn as_list(&self) -> Option<&[Term]> {
        match self {
            Term::List(items) => Some(items),
            _ => None,
        }
    }

    /// Text content of a charlist, string literal or UTF-8 binary.
    pub fn as_str(&self) -> Option<String> {
        match self {
            Term::String(s) => Some(s.clone()),
            Term::Binary(bytes) => String::from_utf8(bytes.clone()).ok(),
            Term::List(items) => items
                .iter()
                .map(|item| {
                    item.as_integer()
                        .and_then(|c| u32::try_from(c).ok())
                        .and_then(char::from_u32)
                })
                .collect(),
            _ => None,
        }
    }

    /// Text of an atom or string-like term, for options that accept either.
    pub fn as_name(&self) -> Option<String> {
        self.as_atom().map(str::to_string).or_else(|| self.as_str())
    }

    /// The value of `key` in a proplist term.
    pub fn get(&self, key: &str) -> Option<&Term> {
        self.as_list().and_then(|items| proplist_get(items, key))
    }
}

/// First `{Key, Value}` entry for `key` in a proplist.
pub fn proplist_get<'a>(items: &'a [Term], key: &str) -> Option<&'a Term> {
    items.iter().find_map(|item| match item.as_tuple() {
        Some([k, v]) if k.as_atom() == Some(key) => Some(v),
        _ => None,
    })
}

static BARE_ATOM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z][A-Za-z0-9_@]*$").expect("valid atom regex"));

const RESERVED: &[&str] = &[
    "after", "and", "andalso", "band", "begin", "bnot", "bor", "bsl", "bsr", "bxor", "case",
    "catch", "cond", "div", "else", "end", "fun", "if", "let", "maybe", "not", "of", "or",
    "orelse", "receive", "rem", "try", "when", "xor",
];

fn needs_quotes(atom: &str) -> bool {
    !BARE_ATOM.is_match(atom) || RESERVED.contains(&atom)
}

fn write_escaped(f: &mut fmt::Formatter<'_>, text: &str, quote: char) -> fmt::Result {
    for c in text.chars() {
        match c {
            '\\' => f.write_str("\\\\")?,
            '\n' => f.write_str("\\n")?,
            '\t' => f.write_str("\\t")?,
            '\r' => f.write_str("\\r")?,
            c if c == quote => write!(f, "\\{c}")?,
            c if c.is_control() => write!(f, "\\x{{{:X}}}", c as u32)?,
            c => write!(f, "{c}")?,
        }
    }
    Ok(())
}

fn write_seq(f: &mut fmt::Formatter<'_>, items: &[Term]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(",")?;
        }
        write!(f, "{item}")?;
    }
    Ok(())
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Term::Atom(name) if needs_quotes(name) => {
                f.write_str("'")?;
                write_escaped(f, name, '\'')?;
                f.write_str("'")
            }
            Term::Atom(name) => f.write_str(name),
            Term::Integer(i) => write!(f, "{i}"),
            Term::BigInteger(digits) => f.write_str(digits),
            Term::Float(x) => {
                // Erlang floats always need a fractional part before the exponent
                let text = format!("{x:?}");
                match text.split_once('e') {
                    Some((mantissa, exp)) if !mantissa.contains('.') => {
                        write!(f, "{mantissa}.0e{exp}")
                    }
                    _ => f.write_str(&text),
                }
            }
            Term::String(s) => {
                f.write_str("\"")?;
                write_escaped(f, s, '"')?;
                f.write_str("\"")
            }
            Term::Binary(bytes) => match std::str::from_utf8(bytes) {
                Ok(s) if s.chars().all(|c| !c.is_control()) => {
                    f.write_str("<<\"")?;
                    write_escaped(f, s, '"')?;
                    f.write_str("\"/utf8>>")
                }
                _ => {
                    f.write_str("<<")?;
                    for (i, b) in bytes.iter().enumerate() {
                        if i > 0 {
                            f.write_str(",")?;
                        }
                        write!(f, "{b}")?;
                    }
                    f.write_str(">>")
                }
            },
            Term::Tuple(items) => {
                f.write_str("{")?;
                write_seq(f, items)?;
                f.write_str("}")
            }
            Term::List(items) => {
                f.write_str("[")?;
                write_seq(f, items)?;
                f.write_str("]")
            }
            Term::ImproperList(items, tail) => {
                f.write_str("[")?;
                write_seq(f, items)?;
                write!(f, "|{tail}]")
            }
            Term::Map(pairs) => {
                f.write_str("#{")?;
                for (i, (k, v)) in pairs.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{k} => {v}")?;
                }
                f.write_str("}")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_atoms_are_quoted_only_when_needed() {
        assert_eq!(Term::atom("debug_info").to_string(), "debug_info");
        assert_eq!(Term::atom("node@host").to_string(), "node@host");
        assert_eq!(Term::atom("Upper").to_string(), "'Upper'");
        assert_eq!(Term::atom("end").to_string(), "'end'");
        assert_eq!(Term::atom("it's").to_string(), r"'it\'s'");
        assert_eq!(Term::atom("").to_string(), "''");
    }

    #[test]
    fn test_display_nested_terms() {
        let term = Term::Tuple(vec![
            Term::atom("i"),
            Term::string("/proj/include"),
            Term::List(vec![Term::Integer(-1), Term::Float(1.5)]),
            Term::ImproperList(vec![Term::atom("a")], Box::new(Term::atom("b"))),
        ]);
        assert_eq!(term.to_string(), r#"{i,"/proj/include",[-1,1.5],[a|b]}"#);
    }

    #[test]
    fn test_display_float_exponent_keeps_fraction() {
        assert_eq!(Term::Float(1e20).to_string(), "1.0e20");
    }

    #[test]
    fn test_display_binaries() {
        assert_eq!(Term::Binary(b"abc".to_vec()).to_string(), r#"<<"abc"/utf8>>"#);
        assert_eq!(Term::Binary(vec![0, 255]).to_string(), "<<0,255>>");
    }

    #[test]
    fn test_as_str_accepts_charlists_and_binaries() {
        let charlist = Term::List(vec![Term::Integer(104), Term::Integer(105)]);
        assert_eq!(charlist.as_str().as_deref(), Some("hi"));
        assert_eq!(Term::Binary(b"lib".to_vec()).as_str().as_deref(), Some("lib"));
        assert_eq!(Term::atom("lib").as_str(), None);
        assert_eq!(Term::atom("lib").as_name().as_deref(), Some("lib"));
    }

    #[test]
    fn test_proplist_lookup() {
        let config = Term::List(vec![
            Term::atom("debug_info"),
            Term::Tuple(vec![Term::atom("deps_dir"), Term::string("vendor")]),
            Term::Tuple(vec![Term::atom("deps_dir"), Term::string("ignored")]),
        ]);
        assert_eq!(config.get("deps_dir"), Some(&Term::string("vendor")));
        assert_eq!(config.get("sub_dirs"), None);
    }
}
