//! Scanner for the JavaScript literal subset found in nock recordings.
//!
//! Covers strings with escapes, numbers, `true`/`false`/`null`/`undefined`,
//! arrays and objects with bare or quoted keys. Object keys keep their source
//! order so recorded headers replay in the order they were captured.

use crate::error::{HarnessError, HarnessResult};
use serde_json::{json, Map, Number, Value};

#[derive(Clone, Debug, PartialEq)]
pub(super) enum JsValue {
    Null,
    Bool(bool),
    Number(Number),
    String(String),
    Array(Vec<JsValue>),
    Object(Vec<(String, JsValue)>),
}

impl JsValue {
    pub(super) fn to_json(&self) -> Value {
        match self {
            JsValue::Null => Value::Null,
            JsValue::Bool(value) => Value::Bool(*value),
            JsValue::Number(value) => Value::Number(value.clone()),
            JsValue::String(value) => Value::String(value.clone()),
            JsValue::Array(items) => Value::Array(items.iter().map(JsValue::to_json).collect()),
            JsValue::Object(entries) => Value::Object(
                entries
                    .iter()
                    .map(|(key, value)| (key.clone(), value.to_json()))
                    .collect::<Map<String, Value>>(),
            ),
        }
    }

    pub(super) fn as_str(&self) -> Option<&str> {
        match self {
            JsValue::String(value) => Some(value),
            _ => None,
        }
    }

    /// Field lookup on an object literal.
    pub(super) fn get(&self, key: &str) -> Option<&JsValue> {
        match self {
            JsValue::Object(entries) => entries
                .iter()
                .find(|(name, _)| name == key)
                .map(|(_, value)| value),
            _ => None,
        }
    }

    /// Scalar rendered as text (header values may be numbers).
    pub(super) fn to_text(&self) -> String {
        match self {
            JsValue::String(value) => value.clone(),
            JsValue::Null => String::new(),
            other => other.to_json().to_string(),
        }
    }
}

pub(super) struct Scanner<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Scanner<'a> {
    pub(super) fn new(src: &'a str, pos: usize) -> Self {
        Self { src, pos }
    }

    pub(super) fn position(&self) -> usize {
        self.pos
    }

    pub(super) fn error(&self, message: impl Into<String>) -> HarnessError {
        let line = self
            .src
            .get(..self.pos)
            .map_or(0, |before| before.matches('\n').count() + 1);
        HarnessError::fixture_load(message, json!({ "offset": self.pos, "line": line }))
    }

    fn peek(&self) -> Option<u8> {
        self.src.as_bytes().get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<u8> {
        self.src.as_bytes().get(self.pos + offset).copied()
    }

    fn bump(&mut self) -> Option<u8> {
        let byte = self.peek()?;
        self.pos += 1;
        Some(byte)
    }

    /// Skip whitespace and comments.
    pub(super) fn skip_trivia(&mut self) {
        loop {
            match (self.peek(), self.peek_at(1)) {
                (Some(byte), _) if byte.is_ascii_whitespace() => self.pos += 1,
                (Some(b'/'), Some(b'/')) => {
                    while let Some(byte) = self.bump() {
                        if byte == b'\n' {
                            break;
                        }
                    }
                }
                (Some(b'/'), Some(b'*')) => {
                    self.pos += 2;
                    while self.peek().is_some()
                        && !(self.peek() == Some(b'*') && self.peek_at(1) == Some(b'/'))
                    {
                        self.pos += 1;
                    }
                    self.pos = (self.pos + 2).min(self.src.len());
                }
                _ => break,
            }
        }
    }

    /// Consume `byte` after trivia if it is next.
    pub(super) fn eat(&mut self, byte: u8) -> bool {
        self.skip_trivia();
        if self.peek() == Some(byte) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    pub(super) fn expect(&mut self, byte: u8) -> HarnessResult<()> {
        if self.eat(byte) {
            Ok(())
        } else {
            Err(self.error(format!("expected '{}'", char::from(byte))))
        }
    }

    pub(super) fn ident(&mut self) -> Option<&'a str> {
        self.skip_trivia();
        let start = self.pos;
        while self
            .peek()
            .is_some_and(|byte| byte.is_ascii_alphanumeric() || byte == b'_' || byte == b'$')
        {
            self.pos += 1;
        }
        (self.pos > start).then(|| self.src.get(start..self.pos)).flatten()
    }

    pub(super) fn string(&mut self) -> HarnessResult<String> {
        self.skip_trivia();
        let quote = match self.peek() {
            Some(quote @ (b'\'' | b'"')) => quote,
            _ => return Err(self.error("expected string literal")),
        };
        self.pos += 1;
        let mut out: Vec<u8> = Vec::new();
        loop {
            let byte = self
                .bump()
                .ok_or_else(|| self.error("unterminated string literal"))?;
            if byte == quote {
                break;
            }
            if byte != b'\\' {
                out.push(byte);
                continue;
            }
            let escaped = self
                .bump()
                .ok_or_else(|| self.error("unterminated escape sequence"))?;
            let decoded = match escaped {
                b'n' => '\n',
                b'r' => '\r',
                b't' => '\t',
                b'b' => '\u{8}',
                b'f' => '\u{c}',
                b'v' => '\u{b}',
                b'0' => '\0',
                b'x' => self.hex_escape(2)?,
                b'u' => self.unicode_escape()?,
                b'\n' => continue,
                other => char::from(other),
            };
            let mut buffer = [0u8; 4];
            out.extend_from_slice(decoded.encode_utf8(&mut buffer).as_bytes());
        }
        String::from_utf8(out).map_err(|_| self.error("string literal is not valid utf-8"))
    }

    fn hex_digits(&mut self, count: usize) -> HarnessResult<u32> {
        let digits = self
            .src
            .get(self.pos..self.pos + count)
            .ok_or_else(|| self.error("truncated escape sequence"))?;
        let value =
            u32::from_str_radix(digits, 16).map_err(|_| self.error("invalid escape sequence"))?;
        self.pos += count;
        Ok(value)
    }

    fn hex_escape(&mut self, count: usize) -> HarnessResult<char> {
        let code = self.hex_digits(count)?;
        Ok(char::from_u32(code).unwrap_or(char::REPLACEMENT_CHARACTER))
    }

    fn unicode_escape(&mut self) -> HarnessResult<char> {
        let high = self.hex_digits(4)?;
        if (0xD800..0xDC00).contains(&high)
            && self.peek() == Some(b'\\')
            && self.peek_at(1) == Some(b'u')
        {
            self.pos += 2;
            let low = self.hex_digits(4)?;
            let code = 0x10000 + ((high - 0xD800) << 10) + (low.wrapping_sub(0xDC00) & 0x3FF);
            return Ok(char::from_u32(code).unwrap_or(char::REPLACEMENT_CHARACTER));
        }
        Ok(char::from_u32(high).unwrap_or(char::REPLACEMENT_CHARACTER))
    }

    fn number(&mut self) -> HarnessResult<Number> {
        let start = self.pos;
        while self.peek().is_some_and(|byte| {
            byte.is_ascii_digit() || matches!(byte, b'-' | b'+' | b'.' | b'e' | b'E')
        }) {
            self.pos += 1;
        }
        let text = self.src.get(start..self.pos).unwrap_or_default();
        if let Ok(value) = text.parse::<i64>() {
            return Ok(Number::from(value));
        }
        text.parse::<f64>()
            .ok()
            .and_then(Number::from_f64)
            .ok_or_else(|| self.error(format!("invalid number literal '{text}'")))
    }

    pub(super) fn value(&mut self) -> HarnessResult<JsValue> {
        self.skip_trivia();
        match self.peek() {
            Some(b'\'' | b'"') => self.string().map(JsValue::String),
            Some(b'{') => self.object(),
            Some(b'[') => self.array(),
            Some(byte) if byte.is_ascii_digit() || byte == b'-' => {
                self.number().map(JsValue::Number)
            }
            Some(_) => match self.ident() {
                Some("true") => Ok(JsValue::Bool(true)),
                Some("false") => Ok(JsValue::Bool(false)),
                Some("null" | "undefined") => Ok(JsValue::Null),
                Some(other) => Err(self.error(format!("unsupported expression '{other}'"))),
                None => Err(self.error("expected a literal value")),
            },
            None => Err(self.error("unexpected end of input")),
        }
    }

    fn object(&mut self) -> HarnessResult<JsValue> {
        self.expect(b'{')?;
        let mut entries = Vec::new();
        loop {
            if self.eat(b'}') {
                break;
            }
            self.skip_trivia();
            let key = match self.peek() {
                Some(b'\'' | b'"') => self.string()?,
                _ => self
                    .ident()
                    .map(str::to_string)
                    .ok_or_else(|| self.error("expected object key"))?,
            };
            self.expect(b':')?;
            let value = self.value()?;
            entries.push((key, value));
            if !self.eat(b',') {
                self.expect(b'}')?;
                break;
            }
        }
        Ok(JsValue::Object(entries))
    }

    fn array(&mut self) -> HarnessResult<JsValue> {
        self.expect(b'[')?;
        let mut items = Vec::new();
        loop {
            if self.eat(b']') {
                break;
            }
            items.push(self.value()?);
            if !self.eat(b',') {
                self.expect(b']')?;
                break;
            }
        }
        Ok(JsValue::Array(items))
    }

    /// Skip a bracketed region such as a function argument list, honouring
    /// string literals inside it.
    pub(super) fn skip_balanced(&mut self, open: u8, close: u8) -> HarnessResult<()> {
        self.expect(open)?;
        let mut depth = 1usize;
        while depth > 0 {
            match self.peek() {
                Some(b'\'' | b'"') => {
                    self.string()?;
                }
                Some(byte) => {
                    self.pos += 1;
                    if byte == open {
                        depth += 1;
                    } else if byte == close {
                        depth -= 1;
                    }
                }
                None => return Err(self.error("unbalanced brackets")),
            }
        }
        Ok(())
    }
}
