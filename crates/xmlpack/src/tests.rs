use std::collections::BTreeMap;

use chrono::NaiveDate;
use pretty_assertions::assert_eq;

use crate::*;

// ============================================================================
//  HELPERS
// ============================================================================

fn encode(value: &Value, allow_none: bool) -> Result<String> {
    let mut enc = Encoder::new(allow_none);
    enc.value(value)?;
    Ok(enc.into_string())
}

fn decode(doc: &str) -> Result<Value> {
    let mut dec = Decoder::new(doc);
    let value = dec.value()?;
    dec.expect_eof()?;
    Ok(value)
}

/// Encodes and decodes a value and asserts equality.
fn assert_roundtrip(value: Value) {
    let doc = encode(&value, true).expect("Encoding failed");
    let decoded = decode(&doc).expect("Decoding failed");
    assert_eq!(value, decoded);
}

// ============================================================================
//  1. ENCODER LAYOUT
// ============================================================================

#[test]
fn test_encode_scalars_layout() {
    assert_eq!(encode(&Value::Int(42), false).unwrap(), "<value><int>42</int></value>\n");
    assert_eq!(encode(&Value::Double(4.0), false).unwrap(), "<value><double>4.0</double></value>\n");
    assert_eq!(encode(&Value::Bool(true), false).unwrap(), "<value><boolean>1</boolean></value>\n");
    assert_eq!(encode(&Value::from("hi"), false).unwrap(), "<value><string>hi</string></value>\n");
}

#[test]
fn test_encode_escapes_markup() {
    let doc = encode(&Value::from("<a> & <b>"), false).unwrap();
    assert_eq!(doc, "<value><string>&lt;a&gt; &amp; &lt;b&gt;</string></value>\n");
}

#[test]
fn test_encode_datetime_without_timezone() {
    let dt = NaiveDate::from_ymd_opt(1998, 7, 17).unwrap().and_hms_opt(14, 8, 55).unwrap();
    let doc = encode(&Value::DateTime(dt), false).unwrap();
    assert_eq!(doc, "<value><dateTime.iso8601>19980717T14:08:55</dateTime.iso8601></value>\n");
}

#[test]
fn test_encode_base64_wraps_lines() {
    let doc = encode(&Value::Binary(vec![0u8; 60]), false).unwrap();
    let lines: Vec<&str> = doc.lines().collect();
    assert_eq!(lines[0], "<value><base64>");
    assert_eq!(lines[1].len(), 76);
    assert_eq!(lines[2].len(), 4);
    assert_eq!(lines[3], "</base64></value>");
}

#[test]
fn test_encode_struct_layout() {
    let value = Value::structure([("faultCode", Value::Int(1)), ("faultString", Value::from("x"))]);
    let doc = encode(&value, false).unwrap();
    assert_eq!(
        doc,
        "<value><struct>\n\
         <member>\n<name>faultCode</name>\n<value><int>1</int></value>\n</member>\n\
         <member>\n<name>faultString</name>\n<value><string>x</string></value>\n</member>\n\
         </struct></value>\n"
    );
}

#[test]
fn test_encode_array_layout() {
    let doc = encode(&Value::Array(vec![Value::Int(1), Value::Int(2)]), false).unwrap();
    assert_eq!(
        doc,
        "<value><array><data>\n<value><int>1</int></value>\n<value><int>2</int></value>\n</data></array></value>\n"
    );
}

#[test]
fn test_encode_nil_requires_allow_none() {
    assert_eq!(encode(&Value::Nil, false), Err(Error::NilNotAllowed));
    assert_eq!(encode(&Value::Nil, true).unwrap(), "<value><nil/></value>\n");

    // nested nil fails too
    let nested = Value::Array(vec![Value::Int(1), Value::Nil]);
    assert_eq!(encode(&nested, false), Err(Error::NilNotAllowed));
}

#[test]
fn test_encode_recursion_limit() {
    let mut value = Value::Int(0);
    for _ in 0..(MAX_RECURSION_DEPTH + 2) {
        value = Value::Array(vec![value]);
    }
    assert_eq!(encode(&value, false), Err(Error::RecursionLimitExceeded));
}

// ============================================================================
//  2. ROUNDTRIPS
// ============================================================================

#[test]
fn test_roundtrip_scalars() {
    assert_roundtrip(Value::Int(i32::MIN));
    assert_roundtrip(Value::Int(i32::MAX));
    assert_roundtrip(Value::Double(std::f64::consts::PI));
    assert_roundtrip(Value::Double(-0.5));
    assert_roundtrip(Value::Double(1e300));
    assert_roundtrip(Value::Bool(false));
    assert_roundtrip(Value::Nil);
}

#[test]
fn test_roundtrip_strings() {
    assert_roundtrip(Value::from(""));
    assert_roundtrip(Value::from("  padded  "));
    assert_roundtrip(Value::from("a < b && c > d"));
    assert_roundtrip(Value::from("line\nbreak"));
    assert_roundtrip(Value::from("Hello World 🚀"));
}

#[test]
fn test_roundtrip_binary_and_datetime() {
    assert_roundtrip(Value::Binary(Vec::new()));
    assert_roundtrip(Value::Binary((0..=255).collect()));
    let dt = NaiveDate::from_ymd_opt(2026, 10, 16).unwrap().and_hms_opt(9, 30, 0).unwrap();
    assert_roundtrip(Value::DateTime(dt));
}

#[test]
fn test_roundtrip_containers() {
    let mut inner = BTreeMap::new();
    inner.insert("name".to_string(), Value::from("crab"));
    inner.insert("legs".to_string(), Value::Int(10));
    inner.insert("tags".to_string(), Value::Array(vec![Value::from("a"), Value::Bool(true)]));

    assert_roundtrip(Value::Array(Vec::new()));
    assert_roundtrip(Value::Struct(BTreeMap::new()));
    assert_roundtrip(Value::Array(vec![Value::Struct(inner.clone()), Value::Nil]));
    assert_roundtrip(Value::Struct(inner));
}

// ============================================================================
//  3. DECODER TOLERANCE
// ============================================================================

#[test]
fn test_decode_untyped_value_is_string() {
    assert_eq!(decode("<value>plain</value>").unwrap(), Value::from("plain"));
    assert_eq!(decode("<value/>").unwrap(), Value::from(""));
    assert_eq!(decode("<value></value>").unwrap(), Value::from(""));
}

#[test]
fn test_decode_integer_aliases() {
    assert_eq!(decode("<value><i4>7</i4></value>").unwrap(), Value::Int(7));
    assert_eq!(decode("<value><i8> -3 </i8></value>").unwrap(), Value::Int(-3));
    assert!(matches!(
        decode("<value><i8>9999999999</i8></value>"),
        Err(Error::InvalidScalar { kind: "int", .. })
    ));
}

#[test]
fn test_decode_whitespace_between_elements() {
    let doc = "<value>\n  <struct>\n    <member>\n      <name>a</name>\n      <value><int>1</int></value>\n    </member>\n  </struct>\n</value>";
    assert_eq!(decode(doc).unwrap(), Value::structure([("a", 1)]));
}

#[test]
fn test_decode_entities_and_cdata() {
    assert_eq!(decode("<value><string>&lt;&amp;&gt;&#65;</string></value>").unwrap(), Value::from("<&>A"));
    assert_eq!(decode("<value><string><![CDATA[<raw>]]></string></value>").unwrap(), Value::from("<raw>"));
}

#[test]
fn test_decode_namespaced_nil_and_empty_scalars() {
    assert_eq!(decode("<value><ex:nil/></value>").unwrap(), Value::Nil);
    assert_eq!(decode("<value><string/></value>").unwrap(), Value::from(""));
    assert_eq!(decode("<value><array><data/></array></value>").unwrap(), Value::Array(Vec::new()));
}

#[test]
fn test_decode_base64_ignores_line_breaks() {
    assert_eq!(decode("<value><base64>\naGVs\nbG8=\n</base64></value>").unwrap(), Value::Binary(b"hello".to_vec()));
}

#[test]
fn test_decode_alternate_datetime_layout() {
    let dt = NaiveDate::from_ymd_opt(2001, 2, 3).unwrap().and_hms_opt(4, 5, 6).unwrap();
    assert_eq!(decode("<value><dateTime.iso8601>2001-02-03T04:05:06</dateTime.iso8601></value>").unwrap(), Value::DateTime(dt));
}

#[test]
fn test_decode_rejects_bad_input() {
    assert_eq!(decode("<value><float>1</float></value>"), Err(Error::UnknownType("float".into())));
    assert!(matches!(decode("<value><boolean>yes</boolean></value>"), Err(Error::InvalidScalar { kind: "boolean", .. })));
    assert!(decode("<value><int>1</int>").is_err());
    assert!(decode("<value><int>1</double></value>").is_err());
    assert!(matches!(decode("<param/>"), Err(Error::UnexpectedToken { .. })));
}

// ============================================================================
//  4. TYPED EXTRACTION
// ============================================================================

#[test]
fn test_extract_typed_values() {
    assert_eq!(Value::Int(8).extract::<f64>().unwrap(), 8.0);
    assert_eq!(Value::from("x").extract::<String>().unwrap(), "x");
    assert_eq!(Value::Nil.extract::<Option<i32>>().unwrap(), None);
    assert_eq!(
        Value::Double(1.5).extract::<i32>(),
        Err(Error::TypeMismatch { expected: "int", found: "double" })
    );
}

#[test]
fn test_option_into_value() {
    assert_eq!(Value::from(None::<i32>), Value::Nil);
    assert_eq!(Value::from(Some("y")), Value::from("y"));
}
