//! Decoder for the Erlang external term format (`term_to_binary/1`)

use std::io::Read;

use flate2::read::ZlibDecoder;

use super::{Term, TermError};

const VERSION: u8 = 131;
const COMPRESSED: u8 = 80;
const NEW_FLOAT_EXT: u8 = 70;
const BIT_BINARY_EXT: u8 = 77;
const SMALL_INTEGER_EXT: u8 = 97;
const INTEGER_EXT: u8 = 98;
const FLOAT_EXT: u8 = 99;
const ATOM_EXT: u8 = 100;
const SMALL_TUPLE_EXT: u8 = 104;
const LARGE_TUPLE_EXT: u8 = 105;
const NIL_EXT: u8 = 106;
const STRING_EXT: u8 = 107;
const LIST_EXT: u8 = 108;
const BINARY_EXT: u8 = 109;
const SMALL_BIG_EXT: u8 = 110;
const LARGE_BIG_EXT: u8 = 111;
const SMALL_ATOM_EXT: u8 = 115;
const MAP_EXT: u8 = 116;
const ATOM_UTF8_EXT: u8 = 118;
const SMALL_ATOM_UTF8_EXT: u8 = 119;

/// Decode a versioned (and possibly compressed) external term.
pub fn decode(bytes: &[u8]) -> Result<Term, TermError> {
    let mut cursor = Cursor { bytes, pos: 0 };
    let version = cursor.u8()?;
    if version != VERSION {
        return Err(decode_error(format!("unknown version {version}")));
    }

    if cursor.peek() == Some(COMPRESSED) {
        cursor.u8()?;
        let size = cursor.u32()? as usize;
        let mut inflated = Vec::with_capacity(size.min(1 << 24));
        ZlibDecoder::new(cursor.rest())
            .read_to_end(&mut inflated)
            .map_err(|e| decode_error(format!("inflate failed: {e}")))?;
        if inflated.len() != size {
            return Err(decode_error(format!(
                "inflated {} bytes, header says {size}",
                inflated.len()
            )));
        }
        let mut inner = Cursor {
            bytes: &inflated,
            pos: 0,
        };
        return inner.term();
    }

    cursor.term()
}

fn decode_error(message: impl Into<String>) -> TermError {
    TermError::Decode(message.into())
}

struct Cursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn rest(&self) -> &'a [u8] {
        &self.bytes[self.pos..]
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], TermError> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|end| *end <= self.bytes.len())
            .ok_or_else(|| decode_error(format!("truncated input at offset {}", self.pos)))?;
        let slice = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn u8(&mut self) -> Result<u8, TermError> {
        Ok(self.take(1)?[0])
    }

    fn u16(&mut self) -> Result<u16, TermError> {
        let b = self.take(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    fn u32(&mut self) -> Result<u32, TermError> {
        let b = self.take(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn terms(&mut self, count: usize) -> Result<Vec<Term>, TermError> {
        (0..count).map(|_| self.term()).collect()
    }

    fn term(&mut self) -> Result<Term, TermError> {
        let tag = self.u8()?;
        match tag {
            SMALL_INTEGER_EXT => Ok(Term::Integer(i64::from(self.u8()?))),
            INTEGER_EXT => Ok(Term::Integer(i64::from(self.u32()? as i32))),
            NEW_FLOAT_EXT => {
                let b = self.take(8)?;
                let mut raw = [0u8; 8];
                raw.copy_from_slice(b);
                Ok(Term::Float(f64::from_be_bytes(raw)))
            }
            FLOAT_EXT => {
                let raw = self.take(31)?;
                let text = String::from_utf8_lossy(raw);
                text.trim_end_matches('\0')
                    .trim()
                    .parse::<f64>()
                    .map(Term::Float)
                    .map_err(|_| decode_error(format!("bad float text '{text}'")))
            }
            ATOM_EXT | SMALL_ATOM_EXT => {
                let len = if tag == ATOM_EXT {
                    usize::from(self.u16()?)
                } else {
                    usize::from(self.u8()?)
                };
                // Latin-1: every byte maps to the code point of the same value
                Ok(Term::Atom(self.take(len)?.iter().map(|&b| char::from(b)).collect()))
            }
            ATOM_UTF8_EXT | SMALL_ATOM_UTF8_EXT => {
                let len = if tag == ATOM_UTF8_EXT {
                    usize::from(self.u16()?)
                } else {
                    usize::from(self.u8()?)
                };
                let raw = self.take(len)?;
                String::from_utf8(raw.to_vec())
                    .map(Term::Atom)
                    .map_err(|_| decode_error("atom is not valid UTF-8"))
            }
            SMALL_TUPLE_EXT => {
                let arity = usize::from(self.u8()?);
                Ok(Term::Tuple(self.terms(arity)?))
            }
            LARGE_TUPLE_EXT => {
                let arity = self.u32()? as usize;
                Ok(Term::Tuple(self.terms(arity)?))
            }
            NIL_EXT => Ok(Term::List(Vec::new())),
            STRING_EXT => {
                let len = usize::from(self.u16()?);
                Ok(Term::String(self.take(len)?.iter().map(|&b| char::from(b)).collect()))
            }
            LIST_EXT => {
                let len = self.u32()? as usize;
                let items = self.terms(len)?;
                Ok(match self.term()? {
                    Term::List(tail) if tail.is_empty() => Term::List(items),
                    tail => Term::ImproperList(items, Box::new(tail)),
                })
            }
            BINARY_EXT => {
                let len = self.u32()? as usize;
                Ok(Term::Binary(self.take(len)?.to_vec()))
            }
            BIT_BINARY_EXT => {
                let len = self.u32()? as usize;
                let _bits = self.u8()?;
                Ok(Term::Binary(self.take(len)?.to_vec()))
            }
            SMALL_BIG_EXT | LARGE_BIG_EXT => {
                let n = if tag == SMALL_BIG_EXT {
                    usize::from(self.u8()?)
                } else {
                    self.u32()? as usize
                };
                let negative = self.u8()? != 0;
                let digits = self.take(n)?;
                Ok(big_integer(negative, digits))
            }
            MAP_EXT => {
                let arity = self.u32()? as usize;
                let mut pairs = Vec::with_capacity(arity.min(1024));
                for _ in 0..arity {
                    let key = self.term()?;
                    let value = self.term()?;
                    pairs.push((key, value));
                }
                Ok(Term::Map(pairs))
            }
            other => Err(decode_error(format!(
                "unsupported tag {other} at offset {}",
                self.pos - 1
            ))),
        }
    }
}

/// Little-endian magnitude bytes to an integer term.
fn big_integer(negative: bool, le_digits: &[u8]) -> Term {
    if le_digits.len() <= 16 {
        let magnitude = le_digits
            .iter()
            .rev()
            .fold(0u128, |acc, &b| (acc << 8) | u128::from(b));
        let value = i128::try_from(magnitude).ok().map(|m| if negative { -m } else { m });
        if let Some(small) = value.and_then(|v| i64::try_from(v).ok()) {
            return Term::Integer(small);
        }
    }

    // Base 10^9 limbs, least significant first
    let mut limbs: Vec<u64> = vec![0];
    for &byte in le_digits.iter().rev() {
        let mut carry = u64::from(byte);
        for limb in limbs.iter_mut() {
            let value = *limb * 256 + carry;
            *limb = value % 1_000_000_000;
            carry = value / 1_000_000_000;
        }
        while carry > 0 {
            limbs.push(carry % 1_000_000_000);
            carry /= 1_000_000_000;
        }
    }
    let mut text = String::new();
    if negative {
        text.push('-');
    }
    let mut iter = limbs.iter().rev();
    if let Some(first) = iter.next() {
        text.push_str(&first.to_string());
    }
    for limb in iter {
        text.push_str(&format!("{limb:09}"));
    }
    Term::BigInteger(text)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use flate2::Compression;
    use flate2::write::ZlibEncoder;
    use std::io::Write;

    /// `term_to_binary/1` for the subset of terms the fixtures need.
    pub(crate) fn encode(term: &Term) -> Vec<u8> {
        let mut out = vec![VERSION];
        encode_into(term, &mut out);
        out
    }

    fn encode_into(term: &Term, out: &mut Vec<u8>) {
        match term {
            Term::Atom(name) => {
                out.push(SMALL_ATOM_UTF8_EXT);
                out.push(name.len() as u8);
                out.extend_from_slice(name.as_bytes());
            }
            Term::Integer(i @ 0..=255) => out.extend_from_slice(&[SMALL_INTEGER_EXT, *i as u8]),
            Term::Integer(i) => {
                out.push(INTEGER_EXT);
                out.extend_from_slice(&(*i as i32).to_be_bytes());
            }
            Term::String(s) => {
                out.push(STRING_EXT);
                out.extend_from_slice(&(s.len() as u16).to_be_bytes());
                out.extend_from_slice(s.as_bytes());
            }
            Term::Tuple(items) => {
                out.extend_from_slice(&[SMALL_TUPLE_EXT, items.len() as u8]);
                items.iter().for_each(|item| encode_into(item, out));
            }
            Term::List(items) if items.is_empty() => out.push(NIL_EXT),
            Term::List(items) => {
                out.push(LIST_EXT);
                out.extend_from_slice(&(items.len() as u32).to_be_bytes());
                items.iter().for_each(|item| encode_into(item, out));
                out.push(NIL_EXT);
            }
            other => panic!("fixture encoder does not support {other:?}"),
        }
    }

    #[test]
    fn test_fixture_encoder_matches_decoder() {
        assert_eq!(encode(&decode(FUNCTION_FORM).unwrap()), FUNCTION_FORM);
    }

    // term_to_binary({function, 12, hello, 1, []})
    const FUNCTION_FORM: &[u8] = &[
        131, 104, 5, 119, 8, b'f', b'u', b'n', b'c', b't', b'i', b'o', b'n', 97, 12, 119, 5, b'h',
        b'e', b'l', b'l', b'o', 97, 1, 106,
    ];

    #[test]
    fn test_decode_tuple_with_atoms_and_ints() {
        assert_eq!(
            decode(FUNCTION_FORM).unwrap(),
            Term::Tuple(vec![
                Term::atom("function"),
                Term::Integer(12),
                Term::atom("hello"),
                Term::Integer(1),
                Term::List(vec![]),
            ])
        );
    }

    #[test]
    fn test_decode_strings_lists_and_negative_ints() {
        // ["ab", -2 | tail]
        let bytes = [
            131, 108, 0, 0, 0, 2, 107, 0, 2, b'a', b'b', 98, 255, 255, 255, 254, 100, 0, 4,
            b't', b'a', b'i', b'l',
        ];
        assert_eq!(
            decode(&bytes).unwrap(),
            Term::ImproperList(
                vec![Term::string("ab"), Term::Integer(-2)],
                Box::new(Term::atom("tail"))
            )
        );
    }

    #[test]
    fn test_decode_compressed() {
        let body = &FUNCTION_FORM[1..];
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(body).unwrap();
        let compressed = encoder.finish().unwrap();

        let mut bytes = vec![131, 80];
        bytes.extend_from_slice(&(body.len() as u32).to_be_bytes());
        bytes.extend_from_slice(&compressed);

        assert_eq!(decode(&bytes).unwrap(), decode(FUNCTION_FORM).unwrap());
    }

    #[test]
    fn test_decode_big_integers() {
        // 2^64 as SMALL_BIG_EXT
        let bytes = [131, 110, 9, 0, 0, 0, 0, 0, 0, 0, 0, 0, 1];
        assert_eq!(
            decode(&bytes).unwrap(),
            Term::BigInteger("18446744073709551616".to_string())
        );
        // -5 encoded as a bignum still fits an i64
        let bytes = [131, 110, 1, 1, 5];
        assert_eq!(decode(&bytes).unwrap(), Term::Integer(-5));
    }

    #[test]
    fn test_truncated_input_is_an_error() {
        assert!(decode(&FUNCTION_FORM[..10]).is_err());
        assert!(decode(&[130, 97, 1]).is_err());
    }
}
