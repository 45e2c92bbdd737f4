//! PromQL tokenizer.

use crate::error::{ExprError, Result};

/// Milliseconds per PromQL duration unit.
const DURATION_UNITS: &[(&str, i64)] = &[
    ("ms", 1),
    ("s", 1000),
    ("m", 60 * 1000),
    ("h", 60 * 60 * 1000),
    ("d", 24 * 60 * 60 * 1000),
    ("w", 7 * 24 * 60 * 60 * 1000),
    ("y", 365 * 24 * 60 * 60 * 1000),
];

/// The kind of a lexical token.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    /// A numeric literal.
    Number(f64),
    /// A duration literal such as `5m` or `1h30m`, in milliseconds.
    Duration(i64),
    /// A string literal with escapes resolved.
    String(String),
    /// An identifier or keyword.
    Ident(String),
    /// `(`
    LeftParen,
    /// `)`
    RightParen,
    /// `{`
    LeftBrace,
    /// `}`
    RightBrace,
    /// `[`
    LeftBracket,
    /// `]`
    RightBracket,
    /// `,`
    Comma,
    /// `:`
    Colon,
    /// `+`
    Add,
    /// `-`
    Sub,
    /// `*`
    Mul,
    /// `/`
    Div,
    /// `%`
    Mod,
    /// `^`
    Pow,
    /// `==`
    Eql,
    /// `!=`
    Neq,
    /// `<`
    Lss,
    /// `<=`
    Lte,
    /// `>`
    Gtr,
    /// `>=`
    Gte,
    /// `=`
    Assign,
    /// `=~`
    EqlRegex,
    /// `!~`
    NeqRegex,
    /// `@`
    At,
    /// End of input.
    Eof,
}

/// A token and the byte offset where it starts.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    /// The token kind.
    pub kind: TokenKind,
    /// Byte offset into the input.
    pub pos: usize,
}

/// Splits a PromQL expression into tokens, ending with [`TokenKind::Eof`].
///
/// # Errors
///
/// Returns `ExprError::Parse` on unterminated strings, unknown characters and
/// malformed numbers or durations.
pub fn tokenize(input: &str) -> Result<Vec<Token>> {
    Lexer { input, pos: 0 }.run()
}

struct Lexer<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Lexer<'a> {
    fn run(mut self) -> Result<Vec<Token>> {
        let mut tokens = Vec::new();
        loop {
            self.skip_whitespace_and_comments();
            let start = self.pos;
            let Some(c) = self.peek() else {
                tokens.push(Token {
                    kind: TokenKind::Eof,
                    pos: start,
                });
                return Ok(tokens);
            };

            let kind = match c {
                '(' => self.single(TokenKind::LeftParen),
                ')' => self.single(TokenKind::RightParen),
                '{' => self.single(TokenKind::LeftBrace),
                '}' => self.single(TokenKind::RightBrace),
                '[' => self.single(TokenKind::LeftBracket),
                ']' => self.single(TokenKind::RightBracket),
                ',' => self.single(TokenKind::Comma),
                ':' => self.single(TokenKind::Colon),
                '+' => self.single(TokenKind::Add),
                '-' => self.single(TokenKind::Sub),
                '*' => self.single(TokenKind::Mul),
                '/' => self.single(TokenKind::Div),
                '%' => self.single(TokenKind::Mod),
                '^' => self.single(TokenKind::Pow),
                '@' => self.single(TokenKind::At),
                '=' => {
                    self.bump();
                    if self.eat('=') {
                        TokenKind::Eql
                    } else if self.eat('~') {
                        TokenKind::EqlRegex
                    } else {
                        TokenKind::Assign
                    }
                }
                '!' => {
                    self.bump();
                    if self.eat('=') {
                        TokenKind::Neq
                    } else if self.eat('~') {
                        TokenKind::NeqRegex
                    } else {
                        return Err(ExprError::parse(start, "unexpected character after '!'"));
                    }
                }
                '<' => {
                    self.bump();
                    if self.eat('=') {
                        TokenKind::Lte
                    } else {
                        TokenKind::Lss
                    }
                }
                '>' => {
                    self.bump();
                    if self.eat('=') {
                        TokenKind::Gte
                    } else {
                        TokenKind::Gtr
                    }
                }
                '"' | '\'' => self.string(c)?,
                '`' => self.raw_string()?,
                c if c.is_ascii_digit() || c == '.' => self.number_or_duration()?,
                c if is_ident_start(c) => self.ident(),
                other => {
                    return Err(ExprError::parse(
                        start,
                        format!("unexpected character {other:?}"),
                    ));
                }
            };
            tokens.push(Token { kind, pos: start });
        }
    }

    fn peek(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn peek_nth(&self, n: usize) -> Option<char> {
        self.input[self.pos..].chars().nth(n)
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn eat(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.pos += expected.len_utf8();
            true
        } else {
            false
        }
    }

    fn single(&mut self, kind: TokenKind) -> TokenKind {
        self.bump();
        kind
    }

    fn eat_while(&mut self, pred: impl Fn(char) -> bool) -> &'a str {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if !pred(c) {
                break;
            }
            self.pos += c.len_utf8();
        }
        &self.input[start..self.pos]
    }

    fn skip_whitespace_and_comments(&mut self) {
        loop {
            self.eat_while(char::is_whitespace);
            if self.peek() == Some('#') {
                self.eat_while(|c| c != '\n');
            } else {
                return;
            }
        }
    }

    fn ident(&mut self) -> TokenKind {
        TokenKind::Ident(self.eat_while(is_ident_char).to_string())
    }

    fn string(&mut self, quote: char) -> Result<TokenKind> {
        let start = self.pos;
        self.bump();
        // \x and octal escapes produce raw bytes, so the value is checked
        // for UTF-8 once the closing quote is reached.
        let mut value = Vec::new();
        loop {
            match self.bump() {
                None => return Err(ExprError::parse(start, "unterminated quoted string")),
                Some(c) if c == quote => {
                    return String::from_utf8(value)
                        .map(TokenKind::String)
                        .map_err(|_| ExprError::parse(start, "string is not valid UTF-8"));
                }
                Some('\\') => self.escape(start, &mut value)?,
                Some(c) => push_char(&mut value, c),
            }
        }
    }

    fn escape(&mut self, start: usize, value: &mut Vec<u8>) -> Result<()> {
        let at = self.pos;
        let simple = match self.bump() {
            None => return Err(ExprError::parse(start, "unterminated quoted string")),
            Some('a') => '\u{07}',
            Some('b') => '\u{08}',
            Some('f') => '\u{0c}',
            Some('n') => '\n',
            Some('r') => '\r',
            Some('t') => '\t',
            Some('v') => '\u{0b}',
            Some(c @ ('\\' | '"' | '\'')) => c,
            Some('x') => {
                value.push(self.escaped_byte(at, 16, 2)?);
                return Ok(());
            }
            Some('0'..='7') => {
                self.pos = at;
                value.push(self.escaped_byte(at, 8, 3)?);
                return Ok(());
            }
            Some('u') => self.escaped_char(at, 4)?,
            Some('U') => self.escaped_char(at, 8)?,
            Some(other) => {
                return Err(ExprError::parse(
                    at,
                    format!("unknown escape sequence '\\{other}'"),
                ));
            }
        };
        push_char(value, simple);
        Ok(())
    }

    fn escaped_digits(&mut self, at: usize, radix: u32, len: usize) -> Result<u32> {
        let mut code: u32 = 0;
        for _ in 0..len {
            let digit = self
                .peek()
                .and_then(|c| c.to_digit(radix))
                .ok_or_else(|| ExprError::parse(at, "illegal character in escape sequence"))?;
            self.bump();
            code = code * radix + digit;
        }
        Ok(code)
    }

    fn escaped_byte(&mut self, at: usize, radix: u32, len: usize) -> Result<u8> {
        let code = self.escaped_digits(at, radix, len)?;
        u8::try_from(code).map_err(|_| ExprError::parse(at, "escape sequence out of range"))
    }

    fn escaped_char(&mut self, at: usize, len: usize) -> Result<char> {
        let code = self.escaped_digits(at, 16, len)?;
        char::from_u32(code)
            .ok_or_else(|| ExprError::parse(at, "escape sequence is an invalid Unicode code point"))
    }

    fn raw_string(&mut self) -> Result<TokenKind> {
        let start = self.pos;
        self.bump();
        let value = self.eat_while(|c| c != '`').to_string();
        if !self.eat('`') {
            return Err(ExprError::parse(start, "unterminated raw string"));
        }
        Ok(TokenKind::String(value))
    }

    fn number_or_duration(&mut self) -> Result<TokenKind> {
        let start = self.pos;

        if self.peek() == Some('0') && matches!(self.peek_nth(1), Some('x' | 'X')) {
            self.pos += 2;
            let digits = self.eat_while(|c| c.is_ascii_hexdigit());
            let value = i64::from_str_radix(digits, 16)
                .map_err(|_| ExprError::parse(start, "invalid hexadecimal literal"))?;
            return Ok(TokenKind::Number(value as f64));
        }

        self.eat_while(|c| c.is_ascii_digit());
        let integral_only = self.peek().is_some_and(is_duration_unit_start) && !self.at_exponent();
        if integral_only {
            self.pos = start;
            return self.duration();
        }

        if self.eat('.') {
            self.eat_while(|c| c.is_ascii_digit());
        }
        if self.at_exponent() {
            self.bump();
            if matches!(self.peek(), Some('+' | '-')) {
                self.bump();
            }
            self.eat_while(|c| c.is_ascii_digit());
        }

        let text = &self.input[start..self.pos];
        if self.peek().is_some_and(is_word_char) {
            return Err(ExprError::parse(start, format!("bad number or duration syntax: {text:?}")));
        }
        text.parse::<f64>()
            .map(TokenKind::Number)
            .map_err(|_| ExprError::parse(start, format!("invalid number {text:?}")))
    }

    fn at_exponent(&self) -> bool {
        matches!(self.peek(), Some('e' | 'E'))
            && match self.peek_nth(1) {
                Some(c) if c.is_ascii_digit() => true,
                Some('+' | '-') => self.peek_nth(2).is_some_and(|c| c.is_ascii_digit()),
                _ => false,
            }
    }

    fn duration(&mut self) -> Result<TokenKind> {
        let start = self.pos;
        let mut total: i64 = 0;
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            let digits = self.eat_while(|c| c.is_ascii_digit());
            let amount: i64 = digits
                .parse()
                .map_err(|_| ExprError::parse(start, "duration out of range"))?;
            let unit = self.eat_while(|c| c.is_ascii_alphabetic());
            let Some((_, millis)) = DURATION_UNITS.iter().find(|(name, _)| *name == unit) else {
                return Err(ExprError::parse(start, format!("unknown duration unit {unit:?}")));
            };
            total = amount
                .checked_mul(*millis)
                .and_then(|v| total.checked_add(v))
                .ok_or_else(|| ExprError::parse(start, "duration out of range"))?;
        }
        if self.peek().is_some_and(is_word_char) {
            return Err(ExprError::parse(start, "bad duration syntax"));
        }
        Ok(TokenKind::Duration(total))
    }
}

fn push_char(buf: &mut Vec<u8>, c: char) {
    buf.extend_from_slice(c.encode_utf8(&mut [0; 4]).as_bytes());
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_' || c == ':'
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == ':'
}

fn is_word_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

fn is_duration_unit_start(c: char) -> bool {
    matches!(c, 'm' | 's' | 'h' | 'd' | 'w' | 'y')
}

/// Formats milliseconds the way Prometheus prints durations (`1h30m`, `90d`).
pub fn format_duration(millis: i64) -> String {
    if millis == 0 {
        return "0s".to_string();
    }

    let (sign, mut rest) = if millis < 0 { ("-", -millis) } else { ("", millis) };
    let mut out = String::from(sign);
    // Years and weeks only when exact: 90d reads better than 12w6d.
    for (unit, mult, exact) in [
        ("y", 365 * 24 * 60 * 60 * 1000, true),
        ("w", 7 * 24 * 60 * 60 * 1000, true),
        ("d", 24 * 60 * 60 * 1000, false),
        ("h", 60 * 60 * 1000, false),
        ("m", 60 * 1000, false),
        ("s", 1000, false),
        ("ms", 1, false),
    ] {
        if exact && rest % mult != 0 {
            continue;
        }
        let amount = rest / mult;
        if amount > 0 {
            out.push_str(&format!("{amount}{unit}"));
            rest -= amount * mult;
        }
    }
    out
}
