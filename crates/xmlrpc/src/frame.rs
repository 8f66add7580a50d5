//! # Protocol Frames
//!
//! The XML-RPC envelopes: `<methodCall>` and `<methodResponse>`.
//!
//! ## Invariants
//! - **Layout**: Encoded documents follow the reference marshaller line for line.
//! - **Panic Safety**: All decoding paths return `Result`, never panicking on unknown data.
//! - **Fault Shape**: A fault is a struct with exactly `faultCode` (int) and `faultString` (string).

use xmlpack::Decoder;
use xmlpack::Encoder;
use xmlpack::Token;
use xmlpack::Value;

use crate::error::Error;
use crate::error::Fault;
use crate::error::Result;

/// Character encoding of an outgoing document.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Encoding {
    #[default]
    Utf8,
    /// US-ASCII. Characters outside ASCII become numeric character references.
    Ascii,
}

impl Encoding {
    /// The label written in the XML declaration.
    pub fn label(self) -> &'static str {
        match self {
            Self::Utf8 => "utf-8",
            Self::Ascii => "us-ascii",
        }
    }

    /// Looks an encoding up by its (case-insensitive) label.
    pub fn from_label(label: &str) -> Option<Self> {
        match label.to_ascii_lowercase().as_str() {
            "utf-8" | "utf8" => Some(Self::Utf8),
            "us-ascii" | "ascii" => Some(Self::Ascii),
            _ => None,
        }
    }

    fn header(self) -> String {
        match self {
            Self::Utf8 => "<?xml version='1.0'?>\n".to_string(),
            other => format!("<?xml version='1.0' encoding='{}'?>\n", other.label()),
        }
    }

    fn encode(self, doc: String) -> Vec<u8> {
        match self {
            Self::Utf8 => doc.into_bytes(),
            Self::Ascii => {
                let mut out = String::with_capacity(doc.len());
                for c in doc.chars() {
                    if c.is_ascii() {
                        out.push(c);
                    } else {
                        out.push_str(&format!("&#{};", u32::from(c)));
                    }
                }
                out.into_bytes()
            },
        }
    }
}

/// Marshaling options shared by both directions of an exchange.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Options {
    pub encoding: Encoding,
    /// Permit `<nil/>` values.
    pub allow_none: bool,
}

impl Options {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn encoding(mut self, encoding: Encoding) -> Self {
        self.encoding = encoding;
        self
    }

    pub fn allow_none(mut self, allow_none: bool) -> Self {
        self.allow_none = allow_none;
        self
    }
}

/// A decoded `<methodCall>`.
#[derive(Debug, Clone, PartialEq)]
pub struct MethodCall {
    /// Dot-separated method name, e.g. `version.info`.
    pub method_name: String,
    pub params: Vec<Value>,
}

impl MethodCall {
    pub fn new(method_name: impl Into<String>, params: Vec<Value>) -> Self {
        Self { method_name: method_name.into(), params }
    }

    /// Encode this call as a request document.
    pub fn encode(&self, options: &Options) -> Result<Vec<u8>> {
        encode_call(&self.method_name, &self.params, options)
    }
}

/// A decoded `<methodResponse>`.
#[derive(Debug, Clone, PartialEq)]
pub struct MethodResponse {
    /// - `Ok(params)`: the `<params>` list.
    /// - `Err(Fault)`: the remote side answered with a fault.
    pub status: std::result::Result<Vec<Value>, Fault>,
}

impl MethodResponse {
    /// Unwraps the response to its single result value.
    ///
    /// Only the first param is meaningful; a response without params is malformed.
    pub fn into_value(self) -> Result<std::result::Result<Value, Fault>> {
        match self.status {
            Ok(params) => params
                .into_iter()
                .next()
                .map(Ok)
                .ok_or_else(|| Error::MalformedResponse("response carries no params".into())),
            Err(fault) => Ok(Err(fault)),
        }
    }
}

// ============================================================================
//  WIRE ENCODING
// ============================================================================

/// Encodes a full `<methodCall>` request document.
pub fn encode_call(method_name: &str, params: &[Value], options: &Options) -> Result<Vec<u8>> {
    let mut enc = Encoder::new(options.allow_none);
    enc.raw(&options.encoding.header());
    enc.raw("<methodCall>\n<methodName>").text(method_name).raw("</methodName>\n");
    write_params(&mut enc, params)?;
    enc.raw("</methodCall>\n");
    Ok(options.encoding.encode(enc.into_string()))
}

/// Encodes a `<methodResponse>` carrying either one result value or a fault.
pub fn encode_response(result: &std::result::Result<Value, Fault>, options: &Options) -> Result<Vec<u8>> {
    let value = match result {
        Ok(value) => value,
        Err(fault) => return Ok(encode_fault(fault, options.encoding)),
    };

    let mut enc = Encoder::new(options.allow_none);
    enc.raw(&options.encoding.header());
    enc.raw("<methodResponse>\n");
    write_params(&mut enc, std::slice::from_ref(value))?;
    enc.raw("</methodResponse>\n");
    Ok(options.encoding.encode(enc.into_string()))
}

/// Encodes a fault response. Cannot fail: a fault holds only an int and a string.
pub fn encode_fault(fault: &Fault, encoding: Encoding) -> Vec<u8> {
    let mut doc = encoding.header();
    doc.push_str("<methodResponse>\n<fault>\n<value><struct>\n");
    doc.push_str("<member>\n<name>faultCode</name>\n");
    doc.push_str(&format!("<value><int>{}</int></value>\n", fault.code));
    doc.push_str("</member>\n<member>\n<name>faultString</name>\n");
    doc.push_str("<value><string>");
    doc.push_str(&xmlpack::escape(&fault.message));
    doc.push_str("</string></value>\n");
    doc.push_str("</member>\n</struct></value>\n</fault>\n</methodResponse>\n");
    encoding.encode(doc)
}

fn write_params(enc: &mut Encoder, params: &[Value]) -> Result<()> {
    enc.raw("<params>\n");
    for param in params {
        enc.raw("<param>\n");
        enc.value(param)?;
        enc.raw("</param>\n");
    }
    enc.raw("</params>\n");
    Ok(())
}

// ============================================================================
//  WIRE DECODING
// ============================================================================

/// Decodes a `<methodCall>` request document.
pub fn decode_call(body: &[u8]) -> Result<MethodCall> {
    parse_call(body).map_err(|e| Error::MalformedRequest(e.to_string()))
}

/// Decodes a `<methodResponse>` document into params or a fault.
pub fn decode_response(body: &[u8]) -> Result<MethodResponse> {
    let response = parse_response(body).map_err(|e| Error::MalformedResponse(e.to_string()))?;
    match response {
        ParsedResponse::Params(params) => Ok(MethodResponse { status: Ok(params) }),
        ParsedResponse::Fault(value) => {
            let fault = Fault::from_value(&value)
                .ok_or_else(|| Error::MalformedResponse("fault is not a {faultCode, faultString} struct".into()))?;
            Ok(MethodResponse { status: Err(fault) })
        },
    }
}

enum ParsedResponse {
    Params(Vec<Value>),
    Fault(Value),
}

fn parse_call(body: &[u8]) -> xmlpack::Result<MethodCall> {
    let mut dec = Decoder::from_bytes(body)?;
    dec.expect_open("methodCall")?;

    let mut method_name = None;
    let mut params = Vec::new();
    loop {
        match dec.next_structural()? {
            Token::Close(name) if name == "methodCall" => break,
            Token::Open(name) if name == "methodName" => {
                method_name = Some(dec.text_until("methodName")?.trim().to_string());
            },
            Token::Open(name) if name == "params" => params = read_params(&mut dec)?,
            Token::Empty(name) if name == "params" => {},
            other => return Err(unexpected("<methodName> or <params>", &other)),
        }
    }
    dec.expect_eof()?;

    match method_name {
        Some(method_name) if !method_name.is_empty() => Ok(MethodCall { method_name, params }),
        _ => Err(xmlpack::Error::UnexpectedToken {
            expected: "<methodName>".into(),
            found: "no method name".into(),
        }),
    }
}

fn parse_response(body: &[u8]) -> xmlpack::Result<ParsedResponse> {
    let mut dec = Decoder::from_bytes(body)?;
    dec.expect_open("methodResponse")?;

    let response = match dec.next_structural()? {
        Token::Open(name) if name == "params" => ParsedResponse::Params(read_params(&mut dec)?),
        Token::Empty(name) if name == "params" => ParsedResponse::Params(Vec::new()),
        Token::Open(name) if name == "fault" => {
            let value = dec.value()?;
            dec.expect_close("fault")?;
            ParsedResponse::Fault(value)
        },
        other => return Err(unexpected("<params> or <fault>", &other)),
    };

    dec.expect_close("methodResponse")?;
    dec.expect_eof()?;
    Ok(response)
}

/// Reads `<param>` elements up to `</params>`; `<params>` is already consumed.
fn read_params(dec: &mut Decoder) -> xmlpack::Result<Vec<Value>> {
    let mut params = Vec::new();
    loop {
        match dec.next_structural()? {
            Token::Close(name) if name == "params" => return Ok(params),
            Token::Open(name) if name == "param" => {
                params.push(dec.value()?);
                dec.expect_close("param")?;
            },
            other => return Err(unexpected("<param>", &other)),
        }
    }
}

fn unexpected(expected: &str, found: &Token) -> xmlpack::Error {
    xmlpack::Error::UnexpectedToken { expected: expected.to_string(), found: format!("{:?}", found) }
}
