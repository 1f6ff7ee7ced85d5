//! Source tokenizer.
//!
//! Produces a flat token stream with byte offsets. Preprocessor lines (`#...`)
//! are dropped from the stream; `#property` lines are kept as key/value pairs.
//! Char constants, `C'r,g,b'` colors and `D'yyyy.mm.dd hh:mi:ss'` datetimes
//! are folded into integer literals.

use chrono::NaiveDate;

use crate::domain::error::ParseError;

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Ident(String),
    Int(i64),
    Double(f64),
    Str(String),
    Symbol(&'static str),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub position: usize,
}

/// Lexer output: tokens plus `#property` directives.
#[derive(Debug, Clone, Default)]
pub struct Lexed {
    pub tokens: Vec<Token>,
    pub properties: Vec<(String, String)>,
}

// Longest first so that e.g. `>>=` wins over `>>` and `>`.
const SYMBOLS: &[&str] = &[
    ">>=", "<<=", "++", "--", "+=", "-=", "*=", "/=", "%=", "^=", "&=", "|=", "==", "!=", "<=",
    ">=", "&&", "||", "<<", ">>", "->", "::", "+", "-", "*", "/", "%", "=", ">", "<", "!", "&",
    "|", "^", "~", "?", "(", ")", "{", "}", "[", "]", ";", ",", ".", ":",
];

struct Lexer<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Lexer<'a> {
    fn remaining(&self) -> &'a str {
        &self.input[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.remaining().chars().next()
    }

    fn peek_at(&self, n: usize) -> Option<char> {
        self.remaining().chars().nth(n)
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += ch.len_utf8();
        Some(ch)
    }

    fn error(&self, message: impl Into<String>, position: usize) -> ParseError {
        ParseError {
            message: message.into(),
            position,
        }
    }

    fn skip_line(&mut self) -> &'a str {
        let start = self.pos;
        while let Some(ch) = self.peek() {
            if ch == '\n' {
                break;
            }
            self.advance();
        }
        &self.input[start..self.pos]
    }

    fn skip_block_comment(&mut self) -> Result<(), ParseError> {
        let start = self.pos;
        self.pos += 2;
        match self.remaining().find("*/") {
            Some(end) => {
                self.pos += end + 2;
                Ok(())
            }
            None => Err(self.error("unterminated comment", start)),
        }
    }

    fn lex_string(&mut self) -> Result<String, ParseError> {
        let start = self.pos;
        self.advance();
        let mut value = String::new();
        loop {
            match self.advance() {
                Some('"') => return Ok(value),
                Some('\\') => {
                    let esc = self
                        .advance()
                        .ok_or_else(|| self.error("unterminated string", start))?;
                    value.push(match esc {
                        'n' => '\n',
                        't' => '\t',
                        'r' => '\r',
                        '0' => '\0',
                        other => other,
                    });
                }
                Some(ch) => value.push(ch),
                None => return Err(self.error("unterminated string", start)),
            }
        }
    }

    fn lex_char_constant(&mut self) -> Result<i64, ParseError> {
        let start = self.pos;
        self.advance();
        let value = match self.advance() {
            Some('\\') => match self.advance() {
                Some('n') => 10,
                Some('t') => 9,
                Some('r') => 13,
                Some('0') => 0,
                Some('x') => {
                    let digits_start = self.pos;
                    while self.peek().is_some_and(|c| c.is_ascii_hexdigit()) {
                        self.advance();
                    }
                    i64::from_str_radix(&self.input[digits_start..self.pos], 16).unwrap_or(0)
                }
                Some(other) => other as i64,
                None => return Err(self.error("unterminated char constant", start)),
            },
            Some(ch) => ch as i64,
            None => return Err(self.error("unterminated char constant", start)),
        };
        if self.advance() != Some('\'') {
            return Err(self.error("unterminated char constant", start));
        }
        Ok(value)
    }

    fn quoted_literal(&mut self) -> Result<&'a str, ParseError> {
        let start = self.pos;
        self.pos += 2;
        let inner_start = self.pos;
        match self.remaining().find('\'') {
            Some(end) => {
                self.pos += end + 1;
                Ok(&self.input[inner_start..inner_start + end])
            }
            None => Err(self.error("unterminated literal", start)),
        }
    }

    fn lex_color(&mut self) -> Result<i64, ParseError> {
        let inner = self.quoted_literal()?;
        let parts: Vec<i64> = inner
            .split(',')
            .map(|s| {
                let s = s.trim();
                match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
                    Some(hex) => i64::from_str_radix(hex, 16).unwrap_or(0),
                    None => s.parse().unwrap_or(0),
                }
            })
            .collect();
        let r = parts.first().copied().unwrap_or(0);
        let g = parts.get(1).copied().unwrap_or(0);
        let b = parts.get(2).copied().unwrap_or(0);
        Ok(r + (g << 8) + (b << 16))
    }

    fn lex_datetime(&mut self) -> Result<i64, ParseError> {
        let start = self.pos;
        let inner = self.quoted_literal()?;
        parse_datetime_literal(inner)
            .ok_or_else(|| self.error(format!("invalid datetime literal '{}'", inner), start))
    }

    fn lex_number(&mut self) -> Result<TokenKind, ParseError> {
        let start = self.pos;
        if self.peek() == Some('0') && matches!(self.peek_at(1), Some('x') | Some('X')) {
            self.pos += 2;
            let digits_start = self.pos;
            while self.peek().is_some_and(|c| c.is_ascii_hexdigit()) {
                self.advance();
            }
            let digits = &self.input[digits_start..self.pos];
            return i64::from_str_radix(digits, 16)
                .map(TokenKind::Int)
                .map_err(|_| self.error(format!("invalid hex literal 0x{}", digits), start));
        }

        let mut is_float = false;
        while let Some(ch) = self.peek() {
            if ch.is_ascii_digit() {
                self.advance();
            } else if ch == '.' && !is_float {
                is_float = true;
                self.advance();
            } else if (ch == 'e' || ch == 'E')
                && self
                    .peek_at(1)
                    .is_some_and(|c| c.is_ascii_digit() || c == '-' || c == '+')
            {
                is_float = true;
                self.advance();
                self.advance();
            } else {
                break;
            }
        }
        let text = &self.input[start..self.pos];
        // Suffixes like `1.0f` or `10L` carry no meaning here.
        while self
            .peek()
            .is_some_and(|c| matches!(c, 'f' | 'F' | 'l' | 'L' | 'u' | 'U'))
        {
            self.advance();
        }
        if is_float {
            text.parse::<f64>()
                .map(TokenKind::Double)
                .map_err(|_| self.error(format!("invalid number: {}", text), start))
        } else {
            match text.parse::<i64>() {
                Ok(v) => Ok(TokenKind::Int(v)),
                Err(_) => text
                    .parse::<f64>()
                    .map(TokenKind::Double)
                    .map_err(|_| self.error(format!("invalid number: {}", text), start)),
            }
        }
    }

    fn lex_symbol(&mut self) -> Option<&'static str> {
        let rest = self.remaining();
        let sym = SYMBOLS.iter().find(|s| rest.starts_with(**s))?;
        self.pos += sym.len();
        Some(sym)
    }
}

/// Parses the body of a `D'...'` literal into epoch seconds (UTC).
/// Accepts `yyyy.mm.dd [hh[:mi[:ss]]]` and `dd.mm.yyyy [hh[:mi[:ss]]]`.
pub fn parse_datetime_literal(text: &str) -> Option<i64> {
    let text = text.trim();
    let mut parts = text.split_whitespace();
    let date = parts.next()?;
    let time = parts.next().unwrap_or("");
    let fields: Vec<u32> = date
        .split('.')
        .map(|p| p.parse().ok())
        .collect::<Option<Vec<u32>>>()?;
    if fields.len() != 3 {
        return None;
    }
    let (year, month, day) = if fields[0] > 31 {
        (fields[0], fields[1], fields[2])
    } else {
        (fields[2], fields[1], fields[0])
    };
    let mut hms = [0u32; 3];
    if !time.is_empty() {
        for (slot, part) in hms.iter_mut().zip(time.split(':')) {
            *slot = part.parse().ok()?;
        }
    }
    let date = NaiveDate::from_ymd_opt(year as i32, month, day)?;
    let dt = date.and_hms_opt(hms[0], hms[1], hms[2])?;
    Some(dt.and_utc().timestamp())
}

/// Tokenize source text.
pub fn lex(input: &str) -> Result<Lexed, ParseError> {
    let mut lx = Lexer { input, pos: 0 };
    let mut out = Lexed::default();
    let mut at_line_start = true;

    while let Some(ch) = lx.peek() {
        if ch == '\n' {
            at_line_start = true;
            lx.advance();
            continue;
        }
        if ch.is_whitespace() {
            lx.advance();
            continue;
        }
        if ch == '/' && lx.peek_at(1) == Some('/') {
            lx.skip_line();
            continue;
        }
        if ch == '/' && lx.peek_at(1) == Some('*') {
            lx.skip_block_comment()?;
            continue;
        }
        if ch == '#' && at_line_start {
            let line = lx.skip_line();
            if let Some(rest) = line.strip_prefix("#property") {
                let rest = rest.trim();
                let (key, value) = match rest.split_once(char::is_whitespace) {
                    Some((k, v)) => (k, v.trim().trim_matches('"')),
                    None => (rest, ""),
                };
                if !key.is_empty() {
                    out.properties.push((key.to_string(), value.to_string()));
                }
            }
            continue;
        }
        at_line_start = false;

        let position = lx.pos;
        let kind = if ch == '"' {
            TokenKind::Str(lx.lex_string()?)
        } else if ch == '\'' {
            TokenKind::Int(lx.lex_char_constant()?)
        } else if matches!(ch, 'C' | 'c') && lx.peek_at(1) == Some('\'') {
            TokenKind::Int(lx.lex_color()?)
        } else if matches!(ch, 'D' | 'd') && lx.peek_at(1) == Some('\'') {
            TokenKind::Int(lx.lex_datetime()?)
        } else if ch.is_ascii_digit() || (ch == '.' && lx.peek_at(1).is_some_and(|c| c.is_ascii_digit())) {
            lx.lex_number()?
        } else if ch.is_alphabetic() || ch == '_' {
            let start = lx.pos;
            while lx.peek().is_some_and(|c| c.is_alphanumeric() || c == '_') {
                lx.advance();
            }
            TokenKind::Ident(input[start..lx.pos].to_string())
        } else if let Some(sym) = lx.lex_symbol() {
            TokenKind::Symbol(sym)
        } else {
            return Err(lx.error(format!("unexpected character '{}'", ch), position));
        };
        out.tokens.push(Token { kind, position });
    }

    Ok(out)
}
