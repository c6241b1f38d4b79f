//! Parser for Erlang term text, as read by `file:consult/1`

use std::iter::Peekable;
use std::str::Chars;

use super::{Term, TermError};

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Atom(String),
    Var(String),
    Str(String),
    Int(i64),
    BigInt(String),
    Float(f64),
    Punct(&'static str),
    /// A `.` ending a term
    Dot,
}

struct Lexer<'a> {
    chars: Peekable<Chars<'a>>,
    line: usize,
}

impl<'a> Lexer<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            chars: input.chars().peekable(),
            line: 1,
        }
    }

    fn error(&self, message: impl Into<String>) -> TermError {
        TermError::Syntax {
            line: self.line,
            message: message.into(),
        }
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.chars.next()?;
        if c == '\n' {
            self.line += 1;
        }
        Some(c)
    }

    fn eat(&mut self, expected: char) -> bool {
        if self.chars.peek() == Some(&expected) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn skip_blank(&mut self) {
        while let Some(&c) = self.chars.peek() {
            if c == '%' {
                while let Some(c) = self.bump() {
                    if c == '\n' {
                        break;
                    }
                }
            } else if c.is_whitespace() {
                self.bump();
            } else {
                break;
            }
        }
    }

    /// Next token with the line it starts on, or `None` at end of input.
    fn next_token(&mut self) -> Result<Option<(Token, usize)>, TermError> {
        self.skip_blank();
        let line = self.line;
        let Some(&c) = self.chars.peek() else {
            return Ok(None);
        };

        let token = match c {
            'a'..='z' => Token::Atom(self.word()),
            c if c.is_lowercase() => Token::Atom(self.word()),
            'A'..='Z' | '_' => Token::Var(self.word()),
            '0'..='9' => self.number()?,
            '\'' => {
                self.bump();
                Token::Atom(self.quoted('\'')?)
            }
            '"' => {
                self.bump();
                Token::Str(self.quoted('"')?)
            }
            '$' => {
                self.bump();
                let ch = match self.bump() {
                    Some('\\') => self.escape()?,
                    Some(ch) => ch,
                    None => return Err(self.error("unterminated character literal")),
                };
                Token::Int(i64::from(u32::from(ch)))
            }
            '.' => {
                self.bump();
                match self.chars.peek() {
                    None => Token::Dot,
                    Some(&c) if c.is_whitespace() || c == '%' => Token::Dot,
                    Some(&c) => return Err(self.error(format!("syntax error before: '{c}'"))),
                }
            }
            '<' => {
                self.bump();
                if !self.eat('<') {
                    return Err(self.error("syntax error before: '<'"));
                }
                Token::Punct("<<")
            }
            '>' => {
                self.bump();
                if !self.eat('>') {
                    return Err(self.error("syntax error before: '>'"));
                }
                Token::Punct(">>")
            }
            '=' => {
                self.bump();
                if !self.eat('>') {
                    return Err(self.error("syntax error before: '='"));
                }
                Token::Punct("=>")
            }
            '#' => {
                self.bump();
                if !self.eat('{') {
                    return Err(self.error("syntax error before: '#'"));
                }
                Token::Punct("#{")
            }
            _ => {
                self.bump();
                let punct = match c {
                    '{' => "{",
                    '}' => "}",
                    '[' => "[",
                    ']' => "]",
                    ',' => ",",
                    '|' => "|",
                    '-' => "-",
                    '+' => "+",
                    '/' => "/",
                    ':' => ":",
                    other => return Err(self.error(format!("illegal character '{other}'"))),
                };
                Token::Punct(punct)
            }
        };
        Ok(Some((token, line)))
    }

    fn word(&mut self) -> String {
        let mut out = String::new();
        while let Some(&c) = self.chars.peek() {
            if c.is_alphanumeric() || c == '_' || c == '@' {
                out.push(c);
                self.bump();
            } else {
                break;
            }
        }
        out
    }

    fn digits(&mut self, radix: u32) -> String {
        let mut out = String::new();
        while let Some(&c) = self.chars.peek() {
            if c.is_digit(radix) {
                out.push(c);
                self.bump();
            } else if c == '_' {
                self.bump();
            } else {
                break;
            }
        }
        out
    }

    fn number(&mut self) -> Result<Token, TermError> {
        let int_part = self.digits(10);

        if self.eat('#') {
            let radix: u32 = int_part
                .parse()
                .ok()
                .filter(|r| (2..=36).contains(r))
                .ok_or_else(|| self.error(format!("illegal base '{int_part}'")))?;
            let digits = self.digits(radix);
            return i64::from_str_radix(&digits, radix)
                .map(Token::Int)
                .map_err(|_| self.error(format!("illegal integer '{int_part}#{digits}'")));
        }

        // A '.' only continues the number when a digit follows it
        let mut lookahead = self.chars.clone();
        let is_float = lookahead.next() == Some('.')
            && lookahead.next().is_some_and(|c| c.is_ascii_digit());
        if !is_float {
            return Ok(match int_part.parse::<i64>() {
                Ok(i) => Token::Int(i),
                Err(_) => Token::BigInt(int_part),
            });
        }

        self.bump();
        let mut text = format!("{}.{}", int_part, self.digits(10));
        if matches!(self.chars.peek(), Some('e' | 'E')) {
            self.bump();
            text.push('e');
            if let Some(&sign) = self.chars.peek() {
                if sign == '-' || sign == '+' {
                    text.push(sign);
                    self.bump();
                }
            }
            text.push_str(&self.digits(10));
        }
        text.parse::<f64>()
            .map(Token::Float)
            .map_err(|_| self.error(format!("illegal float '{text}'")))
    }

    fn quoted(&mut self, quote: char) -> Result<String, TermError> {
        let start_line = self.line;
        let mut out = String::new();
        loop {
            match self.bump() {
                Some(c) if c == quote => return Ok(out),
                Some('\\') => out.push(self.escape()?),
                Some(c) => out.push(c),
                None => {
                    return Err(TermError::Syntax {
                        line: start_line,
                        message: format!("unterminated {quote}"),
                    });
                }
            }
        }
    }

    fn escape(&mut self) -> Result<char, TermError> {
        let c = self
            .bump()
            .ok_or_else(|| self.error("unterminated escape sequence"))?;
        let ch = match c {
            'b' => '\u{8}',
            'd' => '\u{7f}',
            'e' => '\u{1b}',
            'f' => '\u{c}',
            'n' => '\n',
            'r' => '\r',
            's' => ' ',
            't' => '\t',
            'v' => '\u{b}',
            '0'..='7' => {
                let mut value = c.to_digit(8).unwrap_or(0);
                for _ in 0..2 {
                    match self.chars.peek().and_then(|c| c.to_digit(8)) {
                        Some(d) => {
                            value = value * 8 + d;
                            self.bump();
                        }
                        None => break,
                    }
                }
                char::from_u32(value).ok_or_else(|| self.error("illegal octal escape"))?
            }
            'x' => {
                let hex = if self.eat('{') {
                    let digits = self.digits(16);
                    if !self.eat('}') {
                        return Err(self.error("unterminated \\x{...} escape"));
                    }
                    digits
                } else {
                    let mut digits = String::new();
                    for _ in 0..2 {
                        match self.chars.peek() {
                            Some(&d) if d.is_ascii_hexdigit() => {
                                digits.push(d);
                                self.bump();
                            }
                            _ => break,
                        }
                    }
                    digits
                };
                u32::from_str_radix(&hex, 16)
                    .ok()
                    .and_then(char::from_u32)
                    .ok_or_else(|| self.error(format!("illegal hex escape '{hex}'")))?
            }
            '^' => {
                let ctl = self
                    .bump()
                    .ok_or_else(|| self.error("unterminated control escape"))?;
                char::from_u32(u32::from(ctl) & 0x1f)
                    .ok_or_else(|| self.error("illegal control escape"))?
            }
            other => other,
        };
        Ok(ch)
    }
}

struct Parser<'a> {
    lexer: Lexer<'a>,
    peeked: Option<(Token, usize)>,
    last_line: usize,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            lexer: Lexer::new(input),
            peeked: None,
            last_line: 1,
        }
    }

    fn peek(&mut self) -> Result<Option<&Token>, TermError> {
        if self.peeked.is_none() {
            self.peeked = self.lexer.next_token()?;
        }
        Ok(self.peeked.as_ref().map(|(t, _)| t))
    }

    fn next(&mut self) -> Result<Option<Token>, TermError> {
        self.peek()?;
        Ok(self.peeked.take().map(|(token, line)| {
            self.last_line = line;
            token
        }))
    }

    fn error(&self, message: impl Into<String>) -> TermError {
        TermError::Syntax {
            line: self.last_line,
            message: message.into(),
        }
    }

    fn expect(&mut self, punct: &'static str) -> Result<(), TermError> {
        match self.next()? {
            Some(Token::Punct(p)) if p == punct => Ok(()),
            Some(other) => Err(self.error(format!("syntax error before: {}", describe(&other)))),
            None => Err(self.error(format!("unexpected end of input, expected '{punct}'"))),
        }
    }

    fn at_punct(&mut self, punct: &str) -> Result<bool, TermError> {
        Ok(matches!(self.peek()?, Some(Token::Punct(p)) if *p == punct))
    }

    fn term(&mut self) -> Result<Term, TermError> {
        let token = self
            .next()?
            .ok_or_else(|| self.error("unexpected end of input"))?;
        match token {
            Token::Atom(name) => Ok(Term::Atom(name)),
            Token::Int(i) => Ok(Term::Integer(i)),
            Token::BigInt(digits) => Ok(Term::BigInteger(digits)),
            Token::Float(x) => Ok(Term::Float(x)),
            Token::Str(mut s) => {
                // Adjacent string literals are concatenated
                while let Some(Token::Str(_)) = self.peek()? {
                    if let Some(Token::Str(more)) = self.next()? {
                        s.push_str(&more);
                    }
                }
                Ok(Term::String(s))
            }
            Token::Var(name) => Err(self.error(format!("variable '{name}' is unbound"))),
            Token::Punct("-") => match self.term()? {
                Term::Integer(i) => Ok(Term::Integer(-i)),
                Term::BigInteger(digits) => Ok(Term::BigInteger(format!("-{digits}"))),
                Term::Float(x) => Ok(Term::Float(-x)),
                _ => Err(self.error("bad argument to unary '-'")),
            },
            Token::Punct("+") => self.term(),
            Token::Punct("{") => Ok(Term::Tuple(self.sequence("}")?)),
            Token::Punct("[") => self.list(),
            Token::Punct("<<") => self.binary(),
            Token::Punct("#{") => self.map(),
            other => Err(self.error(format!("syntax error before: {}", describe(&other)))),
        }
    }

    fn sequence(&mut self, close: &'static str) -> Result<Vec<Term>, TermError> {
        let mut items = Vec::new();
        if self.at_punct(close)? {
            self.next()?;
            return Ok(items);
        }
        loop {
            items.push(self.term()?);
            if self.at_punct(",")? {
                self.next()?;
            } else {
                self.expect(close)?;
                return Ok(items);
            }
        }
    }

    fn list(&mut self) -> Result<Term, TermError> {
        let mut items = Vec::new();
        if self.at_punct("]")? {
            self.next()?;
            return Ok(Term::List(items));
        }
        loop {
            items.push(self.term()?);
            if self.at_punct(",")? {
                self.next()?;
            } else if self.at_punct("|")? {
                self.next()?;
                let tail = self.term()?;
                self.expect("]")?;
                return Ok(match tail {
                    Term::List(rest) => {
                        items.extend(rest);
                        Term::List(items)
                    }
                    other => Term::ImproperList(items, Box::new(other)),
                });
            } else {
                self.expect("]")?;
                return Ok(Term::List(items));
            }
        }
    }

    fn binary(&mut self) -> Result<Term, TermError> {
        let mut bytes = Vec::new();
        if self.at_punct(">>")? {
            self.next()?;
            return Ok(Term::Binary(bytes));
        }
        loop {
            let segment = self.term()?;
            let mut utf8 = false;
            if self.at_punct("/")? {
                self.next()?;
                match self.next()? {
                    Some(Token::Atom(spec)) => utf8 = spec == "utf8",
                    _ => return Err(self.error("bad binary type specifier")),
                }
            }
            // Without `/utf8` each character is one byte, truncated like erl does.
            match segment {
                Term::String(s) if utf8 => bytes.extend_from_slice(s.as_bytes()),
                Term::String(s) => bytes.extend(s.chars().map(|c| (c as u32 & 0xff) as u8)),
                Term::Integer(i) if utf8 => {
                    let c = u32::try_from(i)
                        .ok()
                        .and_then(char::from_u32)
                        .ok_or_else(|| self.error("invalid utf8 code point"))?;
                    let mut buf = [0u8; 4];
                    bytes.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
                }
                Term::Integer(i) => bytes.push((i & 0xff) as u8),
                _ => return Err(self.error("unsupported binary segment")),
            }
            if self.at_punct(",")? {
                self.next()?;
            } else {
                self.expect(">>")?;
                return Ok(Term::Binary(bytes));
            }
        }
    }

    fn map(&mut self) -> Result<Term, TermError> {
        let mut pairs = Vec::new();
        if self.at_punct("}")? {
            self.next()?;
            return Ok(Term::Map(pairs));
        }
        loop {
            let key = self.term()?;
            self.expect("=>")?;
            pairs.push((key, self.term()?));
            if self.at_punct(",")? {
                self.next()?;
            } else {
                self.expect("}")?;
                return Ok(Term::Map(pairs));
            }
        }
    }
}

fn describe(token: &Token) -> String {
    match token {
        Token::Atom(a) => Term::Atom(a.clone()).to_string(),
        Token::Var(v) => format!("'{v}'"),
        Token::Str(s) => Term::String(s.clone()).to_string(),
        Token::Int(i) => i.to_string(),
        Token::BigInt(digits) => digits.clone(),
        Token::Float(x) => x.to_string(),
        Token::Punct(p) => format!("'{p}'"),
        Token::Dot => "'.'".to_string(),
    }
}

/// Parse every dot-terminated term in `input`, like `file:consult/1`.
pub fn consult(input: &str) -> Result<Vec<Term>, TermError> {
    let mut parser = Parser::new(input);
    let mut terms = Vec::new();
    while parser.peek()?.is_some() {
        terms.push(parser.term()?);
        match parser.next()? {
            Some(Token::Dot) => {}
            Some(other) => {
                return Err(parser.error(format!("syntax error before: {}", describe(&other))));
            }
            None => return Err(parser.error("unexpected end of input, expected '.'")),
        }
    }
    Ok(terms)
}

/// Parse a single term, with or without a terminating dot.
pub fn parse_term(input: &str) -> Result<Term, TermError> {
    let mut parser = Parser::new(input);
    let term = parser.term()?;
    match parser.next()? {
        None | Some(Token::Dot) => {}
        Some(other) => {
            return Err(parser.error(format!("syntax error before: {}", describe(&other))));
        }
    }
    if let Some(extra) = parser.next()? {
        return Err(parser.error(format!("syntax error before: {}", describe(&extra))));
    }
    Ok(term)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_consult_rebar_config() {
        let input = r#"
%% rebar.config
{erl_opts, [debug_info, warnings_as_errors, {i, "include"}, {d, 'TEST'}]}.
{deps_dir, "deps"}.
{sub_dirs, ["apps/web", "rel"]}.   % trailing comment
"#;
        let terms = consult(input).unwrap();
        assert_eq!(terms.len(), 3);
        assert_eq!(
            terms[1],
            Term::Tuple(vec![Term::atom("deps_dir"), Term::string("deps")])
        );
        let opts = terms[0].as_tuple().unwrap()[1].as_list().unwrap();
        assert_eq!(opts[0], Term::atom("debug_info"));
        assert_eq!(opts[3], Term::Tuple(vec![Term::atom("d"), Term::atom("TEST")]));
    }

    #[test]
    fn test_numbers_chars_and_escapes() {
        let term = parse_term(
            r#"[16#ff, -3, 2.5e3, $a, $\n, "tab\there", 'quo\'te', 12345678901234567890]"#,
        )
        .unwrap();
        assert_eq!(
            term,
            Term::List(vec![
                Term::Integer(255),
                Term::Integer(-3),
                Term::Float(2500.0),
                Term::Integer(97),
                Term::Integer(10),
                Term::string("tab\there"),
                Term::atom("quo'te"),
                Term::BigInteger("12345678901234567890".to_string()),
            ])
        );
    }

    #[test]
    fn test_binaries_maps_and_tails() {
        let term =
            parse_term(r#"{<<"ab"/utf8, 1>>, #{k => [a | b]}, [1 | [2]], "con" "cat"}"#).unwrap();
        assert_eq!(
            term,
            Term::Tuple(vec![
                Term::Binary(vec![b'a', b'b', 1]),
                Term::Map(vec![(
                    Term::atom("k"),
                    Term::ImproperList(vec![Term::atom("a")], Box::new(Term::atom("b"))),
                )]),
                Term::List(vec![Term::Integer(1), Term::Integer(2)]),
                Term::string("concat"),
            ])
        );
    }

    #[test]
    fn test_binary_strings_are_latin1_unless_utf8() {
        assert_eq!(parse_term(r#"<<"é">>"#).unwrap(), Term::Binary(vec![0xe9]));
        assert_eq!(
            parse_term(r#"<<"é"/utf8>>"#).unwrap(),
            Term::Binary(vec![0xc3, 0xa9])
        );
        assert_eq!(
            parse_term("<<233/utf8, 233>>").unwrap(),
            Term::Binary(vec![0xc3, 0xa9, 0xe9])
        );
    }

    #[test]
    fn test_float_vs_terminating_dot() {
        assert_eq!(consult("1.\n2.5.").unwrap(), vec![Term::Integer(1), Term::Float(2.5)]);
    }

    #[test]
    fn test_errors_report_line() {
        let err = consult("{a, b}.\n{c,\n d ].\n").unwrap_err();
        assert_eq!(
            err,
            TermError::Syntax {
                line: 3,
                message: "syntax error before: ']'".to_string()
            }
        );
    }

    #[test]
    fn test_missing_dot_is_an_error() {
        assert!(consult("{a, b}").is_err());
    }

    #[test]
    fn test_variables_are_rejected() {
        let err = consult("{deps, Deps}.").unwrap_err();
        assert!(err.to_string().contains("Deps"));
    }

    #[test]
    fn test_display_round_trips_through_parser() {
        let term = parse_term(r#"{'Quoted Atom', "a\"b", [1, 2.0, x], <<"bin"/utf8>>}"#).unwrap();
        assert_eq!(parse_term(&term.to_string()).unwrap(), term);
    }
}
