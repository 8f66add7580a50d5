//! # Decoder
//!
//! A pull parser over `quick-xml` events that reads XML-RPC values.
//!
//! ## Invariants
//! - **Panic Safety**: Every path returns `Result`; unknown or truncated input is an error.
//! - **Whitespace**: Whitespace-only text between elements is insignificant. Text inside
//!   `<string>` (and untyped `<value>`) is kept exactly as written.
//! - **Recursion Safety**: Nesting is bounded by `MAX_RECURSION_DEPTH`.

use std::collections::BTreeMap;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::NaiveDateTime;
use quick_xml::Reader;
use quick_xml::events::Event;

use crate::DATETIME_FORMAT;
use crate::Error;
use crate::MAX_RECURSION_DEPTH;
use crate::Result;
use crate::Value;

/// A structural piece of the document, with namespaces stripped from names.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Open(String),
    Close(String),
    /// A self-closing element such as `<nil/>`.
    Empty(String),
    /// Unescaped character data (text or CDATA).
    Text(String),
    Eof,
}

impl Token {
    fn describe(&self) -> String {
        match self {
            Self::Open(name) => format!("<{}>", name),
            Self::Close(name) => format!("</{}>", name),
            Self::Empty(name) => format!("<{}/>", name),
            Self::Text(text) => format!("text {:?}", text),
            Self::Eof => "end of document".into(),
        }
    }

    fn is_blank(&self) -> bool {
        matches!(self, Self::Text(text) if text.trim().is_empty())
    }
}

/// Pull decoder over an XML document.
pub struct Decoder<'a> {
    reader: Reader<&'a [u8]>,
    peeked: Option<Token>,
}

impl<'a> Decoder<'a> {
    pub fn new(doc: &'a str) -> Self {
        Self { reader: Reader::from_str(doc), peeked: None }
    }

    /// Creates a decoder over raw bytes, which must be UTF-8.
    pub fn from_bytes(doc: &'a [u8]) -> Result<Self> {
        let doc = std::str::from_utf8(doc).map_err(|_| Error::InvalidUtf8)?;
        Ok(Self::new(doc))
    }

    /// Returns the next token, including whitespace text.
    pub fn next_token(&mut self) -> Result<Token> {
        if let Some(token) = self.peeked.take() {
            return Ok(token);
        }
        loop {
            let event = self.reader.read_event().map_err(|e| Error::Xml(e.to_string()))?;
            let token = match event {
                Event::Start(e) => Token::Open(name_of(e.local_name().as_ref())?),
                Event::End(e) => Token::Close(name_of(e.local_name().as_ref())?),
                Event::Empty(e) => Token::Empty(name_of(e.local_name().as_ref())?),
                Event::Text(t) => {
                    let text = t.unescape().map_err(|e| Error::Xml(e.to_string()))?;
                    Token::Text(text.into_owned())
                },
                Event::CData(c) => {
                    let bytes = c.into_inner().into_owned();
                    Token::Text(String::from_utf8(bytes).map_err(|_| Error::InvalidUtf8)?)
                },
                Event::Eof => Token::Eof,
                // declarations, comments, processing instructions and doctypes carry no data
                _ => continue,
            };
            return Ok(token);
        }
    }

    /// Returns the next token that is not whitespace-only text.
    pub fn next_structural(&mut self) -> Result<Token> {
        loop {
            let token = self.next_token()?;
            if !token.is_blank() {
                return Ok(token);
            }
        }
    }

    /// Peeks at the next structural token without consuming it.
    pub fn peek_structural(&mut self) -> Result<&Token> {
        let token = self.next_structural()?;
        Ok(self.peeked.insert(token))
    }

    /// Consumes `<name>`.
    pub fn expect_open(&mut self, name: &str) -> Result<()> {
        match self.next_structural()? {
            Token::Open(found) if found == name => Ok(()),
            other => Err(unexpected(&format!("<{}>", name), &other)),
        }
    }

    /// Consumes `</name>`.
    pub fn expect_close(&mut self, name: &str) -> Result<()> {
        match self.next_structural()? {
            Token::Close(found) if found == name => Ok(()),
            other => Err(unexpected(&format!("</{}>", name), &other)),
        }
    }

    /// Consumes the rest of the document, which must hold nothing but whitespace.
    pub fn expect_eof(&mut self) -> Result<()> {
        match self.next_structural()? {
            Token::Eof => Ok(()),
            other => Err(unexpected("end of document", &other)),
        }
    }

    /// Reads character data up to `</name>`. The opening tag must already be consumed.
    pub fn text_until(&mut self, name: &str) -> Result<String> {
        let mut text = String::new();
        loop {
            match self.next_token()? {
                Token::Text(chunk) => text.push_str(&chunk),
                Token::Close(found) if found == name => return Ok(text),
                Token::Eof => return Err(Error::UnexpectedEnd),
                other => return Err(unexpected(&format!("</{}>", name), &other)),
            }
        }
    }

    /// Reads a complete `<value>` element (or an empty `<value/>`).
    pub fn value(&mut self) -> Result<Value> {
        self.value_impl(0)
    }

    fn value_impl(&mut self, depth: usize) -> Result<Value> {
        if depth > MAX_RECURSION_DEPTH {
            return Err(Error::RecursionLimitExceeded);
        }

        match self.next_structural()? {
            Token::Open(name) if name == "value" => {},
            Token::Empty(name) if name == "value" => return Ok(Value::String(String::new())),
            other => return Err(unexpected("<value>", &other)),
        }

        // an untyped value is a string; collect text until we learn which it is
        let mut text = String::new();
        loop {
            match self.next_token()? {
                Token::Text(chunk) => text.push_str(&chunk),
                Token::Close(name) if name == "value" => return Ok(Value::String(text)),
                Token::Open(tag) if text.trim().is_empty() => {
                    let value = self.typed(&tag, depth)?;
                    self.expect_close("value")?;
                    return Ok(value);
                },
                Token::Empty(tag) if text.trim().is_empty() => {
                    let value = empty_typed(&tag)?;
                    self.expect_close("value")?;
                    return Ok(value);
                },
                Token::Eof => return Err(Error::UnexpectedEnd),
                other => return Err(unexpected("</value>", &other)),
            }
        }
    }

    /// Reads the body of a typed element; `<tag>` is already consumed.
    fn typed(&mut self, tag: &str, depth: usize) -> Result<Value> {
        match tag {
            "array" => self.array(depth),
            "struct" => self.structure(depth),
            "nil" => {
                self.text_until(tag)?;
                Ok(Value::Nil)
            },
            _ => {
                let text = self.text_until(tag)?;
                scalar(tag, text)
            },
        }
    }

    fn array(&mut self, depth: usize) -> Result<Value> {
        let mut items = Vec::new();
        match self.next_structural()? {
            Token::Empty(name) if name == "data" => {},
            Token::Open(name) if name == "data" => loop {
                let closing = matches!(self.peek_structural()?, Token::Close(name) if name == "data");
                if closing {
                    self.next_structural()?;
                    break;
                }
                items.push(self.value_impl(depth + 1)?);
            },
            other => return Err(unexpected("<data>", &other)),
        }
        self.expect_close("array")?;
        Ok(Value::Array(items))
    }

    fn structure(&mut self, depth: usize) -> Result<Value> {
        let mut members = BTreeMap::new();
        loop {
            match self.next_structural()? {
                Token::Close(name) if name == "struct" => return Ok(Value::Struct(members)),
                Token::Open(name) if name == "member" => {
                    self.expect_open("name")?;
                    let key = self.text_until("name")?;
                    let value = self.value_impl(depth + 1)?;
                    self.expect_close("member")?;
                    members.insert(key, value);
                },
                other => return Err(unexpected("<member>", &other)),
            }
        }
    }
}

fn name_of(raw: &[u8]) -> Result<String> {
    std::str::from_utf8(raw).map(str::to_string).map_err(|_| Error::InvalidUtf8)
}

fn unexpected(expected: &str, found: &Token) -> Error {
    Error::UnexpectedToken { expected: expected.to_string(), found: found.describe() }
}

fn empty_typed(tag: &str) -> Result<Value> {
    match tag {
        "nil" => Ok(Value::Nil),
        "string" => Ok(Value::String(String::new())),
        "base64" => Ok(Value::Binary(Vec::new())),
        "array" => Ok(Value::Array(Vec::new())),
        "struct" => Ok(Value::Struct(BTreeMap::new())),
        // every other scalar needs text to be meaningful
        other => scalar(other, String::new()),
    }
}

fn scalar(tag: &str, text: String) -> Result<Value> {
    match tag {
        "string" => Ok(Value::String(text)),
        "int" | "i4" | "i1" | "i2" | "i8" => text
            .trim()
            .parse::<i64>()
            .ok()
            .and_then(|v| i32::try_from(v).ok())
            .map(Value::Int)
            .ok_or(Error::InvalidScalar { kind: "int", text }),
        "double" => text
            .trim()
            .parse::<f64>()
            .map(Value::Double)
            .map_err(|_| Error::InvalidScalar { kind: "double", text }),
        "boolean" => {
            let flag = match text.trim() {
                "0" => Some(false),
                "1" => Some(true),
                _ => None,
            };
            flag.map(Value::Bool).ok_or(Error::InvalidScalar { kind: "boolean", text })
        },
        "dateTime.iso8601" => {
            let trimmed = text.trim();
            NaiveDateTime::parse_from_str(trimmed, DATETIME_FORMAT)
                .or_else(|_| NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S"))
                .map(Value::DateTime)
                .map_err(|_| Error::InvalidScalar { kind: "dateTime.iso8601", text })
        },
        "base64" => {
            let compact: String = text.chars().filter(|c| !c.is_ascii_whitespace()).collect();
            BASE64
                .decode(compact.as_bytes())
                .map(Value::Binary)
                .map_err(|_| Error::InvalidScalar { kind: "base64", text })
        },
        other => Err(Error::UnknownType(other.to_string())),
    }
}
