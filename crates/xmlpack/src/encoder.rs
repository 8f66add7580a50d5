//! # Encoder
//!
//! Writes `Value`s as XML-RPC `<value>` elements into a text buffer.
//!
//! The encoder only knows about values. Envelopes (`<methodCall>`,
//! `<methodResponse>`, ...) are written around it with [`Encoder::raw`].

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;

use crate::DATETIME_FORMAT;
use crate::Error;
use crate::MAX_RECURSION_DEPTH;
use crate::Result;
use crate::Value;

/// Line width of base64 payloads, matching MIME-style output.
const BASE64_LINE: usize = 76;

/// Escapes XML character data. Only `&`, `<` and `>` are replaced.
pub fn escape(text: &str) -> std::borrow::Cow<'_, str> {
    if !text.contains(['&', '<', '>']) {
        return std::borrow::Cow::Borrowed(text);
    }
    let mut out = String::with_capacity(text.len() + 8);
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            c => out.push(c),
        }
    }
    std::borrow::Cow::Owned(out)
}

/// Streaming writer for XML-RPC values.
pub struct Encoder {
    buf: String,
    allow_none: bool,
}

impl Encoder {
    pub fn new(allow_none: bool) -> Self {
        Self { buf: String::new(), allow_none }
    }

    /// Appends markup verbatim.
    pub fn raw(&mut self, markup: &str) -> &mut Self {
        self.buf.push_str(markup);
        self
    }

    /// Appends character data, escaping markup characters.
    pub fn text(&mut self, text: &str) -> &mut Self {
        self.buf.push_str(&escape(text));
        self
    }

    /// Appends a complete `<value>...</value>\n` element.
    ///
    /// On error the buffer may hold a partial element; callers discard it.
    pub fn value(&mut self, value: &Value) -> Result<()> {
        self.value_impl(value, 0)
    }

    pub fn into_string(self) -> String {
        self.buf
    }

    fn value_impl(&mut self, value: &Value, depth: usize) -> Result<()> {
        if depth > MAX_RECURSION_DEPTH {
            return Err(Error::RecursionLimitExceeded);
        }

        match value {
            Value::Int(v) => self.scalar("int", &v.to_string()),
            Value::Double(v) => self.scalar("double", &format!("{:?}", v)),
            Value::Bool(v) => self.scalar("boolean", if *v { "1" } else { "0" }),
            Value::String(v) => {
                self.raw("<value><string>").text(v).raw("</string></value>\n");
            },
            Value::DateTime(v) => {
                self.scalar("dateTime.iso8601", &v.format(DATETIME_FORMAT).to_string())
            },
            Value::Binary(v) => {
                self.raw("<value><base64>\n");
                let encoded = BASE64.encode(v);
                // base64 output is pure ASCII, so byte offsets are char boundaries
                let mut rest = encoded.as_str();
                while !rest.is_empty() {
                    let (line, tail) = rest.split_at(rest.len().min(BASE64_LINE));
                    self.raw(line).raw("\n");
                    rest = tail;
                }
                self.raw("</base64></value>\n");
            },
            Value::Nil => {
                if !self.allow_none {
                    return Err(Error::NilNotAllowed);
                }
                self.raw("<value><nil/></value>\n");
            },
            Value::Array(items) => {
                self.raw("<value><array><data>\n");
                for item in items {
                    self.value_impl(item, depth + 1)?;
                }
                self.raw("</data></array></value>\n");
            },
            Value::Struct(members) => {
                self.raw("<value><struct>\n");
                for (name, member) in members {
                    self.raw("<member>\n<name>").text(name).raw("</name>\n");
                    self.value_impl(member, depth + 1)?;
                    self.raw("</member>\n");
                }
                self.raw("</struct></value>\n");
            },
        }
        Ok(())
    }

    fn scalar(&mut self, tag: &str, text: &str) {
        self.buf.push_str("<value><");
        self.buf.push_str(tag);
        self.buf.push('>');
        self.buf.push_str(text);
        self.buf.push_str("</");
        self.buf.push_str(tag);
        self.buf.push_str("></value>\n");
    }
}
