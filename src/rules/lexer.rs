//! Tokeniser for rule definitions.
//!
//! Newlines are tokens (a rule ends at the end of its line); spaces, tabs and
//! carriage returns are skipped. `// line` and `/* block */` comments are
//! skipped too. A line comment stops before its newline so the rule it trails
//! is still terminated; a block comment swallows any newlines it spans.
//!
//! Strings come in two forms:
//! - `"interpreted"` with the usual backslash escapes, single line only;
//! - `` `raw` `` with no escape processing, may span lines.
//!
//! String values are bytes: `\xHH` and octal escapes may produce sequences
//! that are not valid UTF-8, which the byte-oriented filters accept.

use nom::{
    branch::alt,
    bytes::complete::{tag, take_till, take_until, take_while, take_while1, take_while_m_n},
    character::complete::{anychar, char, satisfy},
    combinator::{map, recognize, value},
    error::{ErrorKind, ParseError},
    multi::fold_many0,
    sequence::{pair, preceded, terminated},
    IResult,
};
use std::fmt;

/// A single lexical token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    Ident(String),
    Str(Vec<u8>),
    Newline,
    Eof,
    Other(char),
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Ident(s) => write!(f, "{:?}", s),
            Token::Str(v) => write!(f, "{:?}", String::from_utf8_lossy(v)),
            Token::Newline => f.write_str("newline"),
            Token::Eof => f.write_str("end of input"),
            Token::Other(c) => write!(f, "{:?}", c.to_string()),
        }
    }
}

/// A tokenisation failure at a 1-based line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LexError {
    pub line: usize,
    pub message: String,
}

pub struct Lexer<'a> {
    rest: &'a str,
    line: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            rest: input,
            line: 1,
        }
    }

    /// Scan the next token, returning it with the line it starts on.
    pub fn next_token(&mut self) -> Result<(Token, usize), LexError> {
        loop {
            if let Ok((rest, _)) = blanks(self.rest) {
                self.rest = rest;
            }
            let line = self.line;

            if self.rest.is_empty() {
                return Ok((Token::Eof, line));
            }

            let scanned = alt((
                value(None, line_comment),
                value(None, block_comment),
                map(token, Some),
            ))(self.rest);

            match scanned {
                Ok((rest, token)) => {
                    self.advance(rest);
                    if let Some(token) = token {
                        return Ok((token, line));
                    }
                }
                Err(nom::Err::Error(Failure(message)) | nom::Err::Failure(Failure(message))) => {
                    return Err(LexError {
                        line,
                        message: message.unwrap_or_else(|| "unexpected input".into()),
                    });
                }
                Err(nom::Err::Incomplete(_)) => {
                    return Err(LexError {
                        line,
                        message: "unexpected end of input".into(),
                    });
                }
            }
        }
    }

    /// Move past everything before `rest`, counting the newlines consumed.
    fn advance(&mut self, rest: &'a str) {
        let consumed = &self.rest[..self.rest.len() - rest.len()];
        self.line += consumed.matches('\n').count();
        self.rest = rest;
    }
}

// ── Parsers ──────────────────────────────────────────────────────────────

/// Parser error carrying a message once the input is known to be malformed.
///
/// `None` is an ordinary mismatch that lets `alt` try the next branch.
#[derive(Debug)]
struct Failure(Option<String>);

impl<'a> ParseError<&'a str> for Failure {
    fn from_error_kind(_input: &'a str, _kind: ErrorKind) -> Self {
        Failure(None)
    }

    fn append(_input: &'a str, _kind: ErrorKind, other: Self) -> Self {
        other
    }
}

type Res<'a, T> = IResult<&'a str, T, Failure>;

fn fail<'a, T>(message: impl Into<String>) -> Res<'a, T> {
    Err(nom::Err::Failure(Failure(Some(message.into()))))
}

/// Run `parser`, turning a plain mismatch into a hard failure with `message`.
fn expect<'a, O>(
    message: &'static str,
    mut parser: impl FnMut(&'a str) -> Res<'a, O>,
) -> impl FnMut(&'a str) -> Res<'a, O> {
    move |input| {
        parser(input).map_err(|e| match e {
            nom::Err::Error(Failure(None)) | nom::Err::Failure(Failure(None)) => {
                nom::Err::Failure(Failure(Some(message.into())))
            }
            other => other,
        })
    }
}

fn blanks(input: &str) -> Res<'_, &str> {
    take_while(|c: char| matches!(c, ' ' | '\t' | '\r'))(input)
}

/// `// ...` up to, not including, the newline.
fn line_comment(input: &str) -> Res<'_, &str> {
    preceded(tag("//"), take_till(|c: char| c == '\n'))(input)
}

fn block_comment(input: &str) -> Res<'_, &str> {
    preceded(
        tag("/*"),
        expect("comment not terminated", terminated(take_until("*/"), tag("*/"))),
    )(input)
}

fn token(input: &str) -> Res<'_, Token> {
    alt((
        value(Token::Newline, char('\n')),
        map(interpreted_string, Token::Str),
        map(raw_string, Token::Str),
        map(ident, |s: &str| Token::Ident(s.to_owned())),
        map(anychar, Token::Other),
    ))(input)
}

fn ident(input: &str) -> Res<'_, &str> {
    recognize(pair(
        satisfy(|c| c == '_' || c.is_alphabetic()),
        take_while(|c: char| c == '_' || c.is_alphanumeric()),
    ))(input)
}

fn raw_string(input: &str) -> Res<'_, Vec<u8>> {
    let (rest, body) = preceded(
        char('`'),
        expect("literal not terminated", terminated(take_till(|c: char| c == '`'), char('`'))),
    )(input)?;
    // carriage returns are dropped from raw strings
    let bytes = body.bytes().filter(|&b| b != b'\r').collect();
    Ok((rest, bytes))
}

/// A run of an interpreted string: literal text or one decoded escape.
#[derive(Clone, Copy)]
enum Fragment<'a> {
    Literal(&'a str),
    Byte(u8),
    Char(char),
}

fn interpreted_string(input: &str) -> Res<'_, Vec<u8>> {
    let body = fold_many0(
        alt((
            map(take_while1(|c: char| !matches!(c, '"' | '\\' | '\n')), Fragment::Literal),
            preceded(char('\\'), escape),
        )),
        Vec::new,
        |mut out: Vec<u8>, fragment| {
            match fragment {
                Fragment::Literal(s) => out.extend_from_slice(s.as_bytes()),
                Fragment::Byte(b) => out.push(b),
                Fragment::Char(c) => {
                    let mut buf = [0u8; 4];
                    out.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
                }
            }
            out
        },
    );
    preceded(char('"'), expect("literal not terminated", terminated(body, char('"'))))(input)
}

/// Decode the escape after a backslash.
fn escape(input: &str) -> Res<'_, Fragment<'_>> {
    let (mut rest, c) = anychar(input)?;

    let fragment = match c {
        'a' => Fragment::Byte(0x07),
        'b' => Fragment::Byte(0x08),
        'f' => Fragment::Byte(0x0c),
        'n' => Fragment::Byte(b'\n'),
        'r' => Fragment::Byte(b'\r'),
        't' => Fragment::Byte(b'\t'),
        'v' => Fragment::Byte(0x0b),
        '\\' => Fragment::Byte(b'\\'),
        '"' => Fragment::Byte(b'"'),
        'x' => {
            let (r, v) = digits(rest, 2, 16, "invalid \\x escape")?;
            rest = r;
            Fragment::Byte(v as u8)
        }
        '0'..='7' => {
            let (r, low) = digits(rest, 2, 8, "invalid octal escape")?;
            rest = r;
            let v = (c as u32 - '0' as u32) * 64 + low;
            if v > 0xff {
                return fail("octal escape value > 255");
            }
            Fragment::Byte(v as u8)
        }
        'u' | 'U' => {
            let n = if c == 'u' { 4 } else { 8 };
            let (r, v) = digits(rest, n, 16, format!("invalid \\{c} escape"))?;
            rest = r;
            match char::from_u32(v) {
                Some(ch) => Fragment::Char(ch),
                None => return fail("escape sequence is invalid Unicode code point"),
            }
        }
        other => return fail(format!("unknown escape sequence \\{other}")),
    };

    Ok((rest, fragment))
}

/// Exactly `n` digits in `radix`.
fn digits<'a>(input: &'a str, n: usize, radix: u32, message: impl Into<String>) -> Res<'a, u32> {
    match take_while_m_n::<_, _, Failure>(n, n, |c: char| c.is_digit(radix))(input) {
        Ok((rest, s)) => {
            let v = s
                .chars()
                .filter_map(|c| c.to_digit(radix))
                .fold(0, |v, d| v * radix + d);
            Ok((rest, v))
        }
        Err(_) => fail(message),
    }
}
