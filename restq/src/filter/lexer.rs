//! Tokenizer for `$filter` expressions.

use super::FilterError;

/// A token and the byte offset it starts at.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Token {
    pub(crate) kind: TokenKind,
    pub(crate) pos: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum TokenKind {
    /// Column, keyword, operator or function name.
    Ident(String),
    /// Quoted string with `''` unescaped.
    Str(String),
    Int(i64),
    Decimal(f64),
    LParen,
    RParen,
    Comma,
}

pub(crate) fn tokenize(src: &str) -> Result<Vec<Token>, FilterError> {
    let bytes = src.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0;

    while let Some(&b) = bytes.get(i) {
        let start = i;
        let kind = match b {
            b' ' | b'\t' | b'\r' | b'\n' => {
                i += 1;
                continue;
            },
            b'(' => {
                i += 1;
                TokenKind::LParen
            },
            b')' => {
                i += 1;
                TokenKind::RParen
            },
            b',' => {
                i += 1;
                TokenKind::Comma
            },
            b'\'' => {
                let (value, end) = string(src, start)?;
                i = end;
                TokenKind::Str(value)
            },
            b'-' | b'0'..=b'9' => {
                let (kind, end) = number(src, start)?;
                i = end;
                kind
            },
            b if b.is_ascii_alphabetic() || b == b'_' => {
                while bytes
                    .get(i)
                    .is_some_and(|c| c.is_ascii_alphanumeric() || *c == b'_')
                {
                    i += 1;
                }
                TokenKind::Ident(src[start..i].to_string())
            },
            _ => {
                let found = src[start..].chars().next().unwrap_or('?');
                return Err(FilterError::syntax(
                    start,
                    format!("unexpected character {found:?}"),
                ));
            },
        };
        tokens.push(Token { kind, pos: start });
    }

    Ok(tokens)
}

/// Quoted string starting at `start`. Returns the value and the offset just
/// past the closing quote.
fn string(src: &str, start: usize) -> Result<(String, usize), FilterError> {
    let mut value = String::new();
    let mut chars = src[start + 1..].char_indices().peekable();

    while let Some((offset, c)) = chars.next() {
        if c != '\'' {
            value.push(c);
            continue;
        }
        if chars.peek().is_some_and(|(_, next)| *next == '\'') {
            chars.next();
            value.push('\'');
            continue;
        }
        return Ok((value, start + 1 + offset + 1));
    }

    Err(FilterError::syntax(start, "unterminated string"))
}

fn number(src: &str, start: usize) -> Result<(TokenKind, usize), FilterError> {
    let bytes = src.as_bytes();
    let mut i = start;
    if bytes.get(i) == Some(&b'-') {
        i += 1;
    }
    let digits_start = i;
    while bytes.get(i).is_some_and(u8::is_ascii_digit) {
        i += 1;
    }
    if i == digits_start {
        return Err(FilterError::syntax(start, "expected a number after '-'"));
    }

    let mut decimal = false;
    if bytes.get(i) == Some(&b'.') && bytes.get(i + 1).is_some_and(u8::is_ascii_digit) {
        decimal = true;
        i += 1;
        while bytes.get(i).is_some_and(u8::is_ascii_digit) {
            i += 1;
        }
    }
    if bytes
        .get(i)
        .is_some_and(|c| c.is_ascii_alphabetic() || *c == b'_' || *c == b'.')
    {
        return Err(FilterError::syntax(i, "malformed number"));
    }

    let text = &src[start..i];
    let kind = if decimal {
        text.parse()
            .map(TokenKind::Decimal)
            .map_err(|_| FilterError::syntax(start, "malformed number"))?
    } else {
        text.parse()
            .map(TokenKind::Int)
            .map_err(|_| FilterError::syntax(start, "integer out of range"))?
    };
    Ok((kind, i))
}
