// src/utils/serialization.rs
//! Serialization utilities for the DID system.
//!
//! Provides:
//! - Canonical JSON bytes used as the signing pre-image of credentials
//! - Tab-indented JSON used for uploaded DID Documents
//! - Serde helpers for documents written by older Go tooling

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::ser::{Formatter, PrettyFormatter, Serializer};
use serde_json::{Map, Value};
use std::io;

/// Compact JSON formatter matching Go's `encoding/json` byte for byte.
///
/// `<`, `>`, `&`, U+2028 and U+2029 are written as `\uXXXX` escapes, and
/// floats use Go's float64 layout (see [`write_go_float`]).
#[derive(Debug, Default, Clone, Copy)]
pub struct CanonicalFormatter;

impl Formatter for CanonicalFormatter {
    fn write_f64<W>(&mut self, writer: &mut W, value: f64) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        writer.write_all(write_go_float(value).as_bytes())
    }

    fn write_string_fragment<W>(&mut self, writer: &mut W, fragment: &str) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        let mut start = 0;
        for (i, ch) in fragment.char_indices() {
            let escaped = match ch {
                '<' => "\\u003c",
                '>' => "\\u003e",
                '&' => "\\u0026",
                '\u{2028}' => "\\u2028",
                '\u{2029}' => "\\u2029",
                _ => continue,
            };
            writer.write_all(fragment[start..i].as_bytes())?;
            writer.write_all(escaped.as_bytes())?;
            start = i + ch.len_utf8();
        }
        writer.write_all(fragment[start..].as_bytes())
    }
}

/// Formats `value` the way Go's `encoding/json` writes a float64.
///
/// Shortest round-trip digits in plain decimal notation, except for
/// magnitudes below `1e-6` or from `1e21` up, which use an exponent with an
/// explicit sign (`1e-7`, `1e+21`).
pub fn write_go_float(value: f64) -> String {
    let abs = value.abs();
    if abs != 0.0 && (abs < 1e-6 || abs >= 1e21) {
        let sci = format!("{:e}", value);
        match sci.split_once('e') {
            Some((mantissa, exp)) => match exp.parse::<i32>() {
                Ok(exp) if exp < 0 => format!("{}e-{}", mantissa, -exp),
                Ok(exp) => format!("{}e+{:02}", mantissa, exp),
                Err(_) => sci,
            },
            None => sci,
        }
    } else {
        format!("{}", value)
    }
}

/// Rewrites `value` as Go sees it after decoding into `interface{}`.
///
/// Object keys are sorted and every number becomes a float64, so integers
/// beyond 2^53 lose precision exactly as they do on the Go side.
pub fn to_go_json_value(value: Value) -> Value {
    sort_json_keys(numbers_as_float64(value))
}

fn numbers_as_float64(value: Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(k, v)| (k, numbers_as_float64(v)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.into_iter().map(numbers_as_float64).collect()),
        Value::Number(n) => match n.as_f64().and_then(serde_json::Number::from_f64) {
            Some(float) => Value::Number(float),
            None => Value::Number(n),
        },
        other => other,
    }
}

/// Serializes `value` to its canonical byte form.
///
/// Struct fields keep declaration order, map keys are sorted, there is no
/// insignificant whitespace, and the output ends with a single `\n`.
pub fn to_canonical_bytes<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, serde_json::Error> {
    let mut buf = Vec::new();
    let mut ser = Serializer::with_formatter(&mut buf, CanonicalFormatter);
    value.serialize(&mut ser)?;
    buf.push(b'\n');
    Ok(buf)
}

/// Serializes `value` as tab-indented JSON.
pub fn to_tab_indented_bytes<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, serde_json::Error> {
    let mut buf = Vec::new();
    let mut ser = Serializer::with_formatter(&mut buf, PrettyFormatter::with_indent(b"\t"));
    value.serialize(&mut ser)?;
    Ok(buf)
}

/// Rebuilds every object in `value` with its keys in sorted order.
///
/// `serde_json::Map` only sorts when the `preserve_order` feature is off;
/// signing pre-images go through this so they never depend on feature
/// unification.
pub fn sort_json_keys(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(String, Value)> = map.into_iter().collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            Value::Object(
                entries
                    .into_iter()
                    .map(|(k, v)| (k, sort_json_keys(v)))
                    .collect::<Map<String, Value>>(),
            )
        }
        Value::Array(items) => Value::Array(items.into_iter().map(sort_json_keys).collect()),
        other => other,
    }
}

/// Deserializes a JSON array that may also be `null`, as Go encodes empty slices.
pub fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn canonical_bytes_are_compact_sorted_and_newline_terminated() {
        let value = sort_json_keys(json!({"b": 1, "a": [true, null], "c": {"z": "x", "y": "w"}}));
        let bytes = to_canonical_bytes(&value).unwrap();
        assert_eq!(
            String::from_utf8(bytes).unwrap(),
            "{\"a\":[true,null],\"b\":1,\"c\":{\"y\":\"w\",\"z\":\"x\"}}\n"
        );
    }

    #[test]
    fn canonical_bytes_escape_html_characters() {
        let value = json!({"k<&>": "a<b>&c\u{2028}"});
        let bytes = to_canonical_bytes(&value).unwrap();
        assert_eq!(
            String::from_utf8(bytes).unwrap(),
            "{\"k\\u003c\\u0026\\u003e\":\"a\\u003cb\\u003e\\u0026c\\u2028\"}\n"
        );
    }

    #[test]
    fn floats_use_go_layout() {
        let cases = [
            (1.0, "1"),
            (0.000001, "0.000001"),
            (1e21, "1e+21"),
            (1e-7, "1e-7"),
            (-2.5e-10, "-2.5e-10"),
            (123.456, "123.456"),
            (1e20, "100000000000000000000"),
            (0.0, "0"),
        ];
        for (input, expected) in cases {
            assert_eq!(write_go_float(input), expected, "{}", input);
        }
    }

    #[test]
    fn go_json_values_print_like_go() {
        let value = to_go_json_value(json!({
            "n": 1.0,
            "small": 0.000001,
            "age": 21,
            "big": 12345678901234567890u64,
            "nested": [{"b": 2.50, "a": -3}]
        }));
        let bytes = to_canonical_bytes(&value).unwrap();
        assert_eq!(
            String::from_utf8(bytes).unwrap(),
            "{\"age\":21,\"big\":12345678901234567000,\"n\":1,\"nested\":[{\"a\":-3,\"b\":2.5}],\"small\":0.000001}\n"
        );
    }

    #[test]
    fn sort_json_keys_reaches_nested_arrays() {
        let value = sort_json_keys(json!([{"b": 1, "a": 2}]));
        let keys: Vec<&String> = value[0].as_object().unwrap().keys().collect();
        assert_eq!(keys, ["a", "b"]);
    }

    #[test]
    fn tab_indented_output() {
        let bytes = to_tab_indented_bytes(&json!({"id": "did:go:abc"})).unwrap();
        assert_eq!(String::from_utf8(bytes).unwrap(), "{\n\t\"id\": \"did:go:abc\"\n}");
    }

    #[test]
    fn null_arrays_decode_as_empty() {
        #[derive(Deserialize)]
        struct Holder {
            #[serde(default, deserialize_with = "null_as_empty")]
            items: Vec<u8>,
        }
        let holder: Holder = serde_json::from_str(r#"{"items": null}"#).unwrap();
        assert!(holder.items.is_empty());
        let holder: Holder = serde_json::from_str(r#"{}"#).unwrap();
        assert!(holder.items.is_empty());
        let holder: Holder = serde_json::from_str(r#"{"items": [1, 2]}"#).unwrap();
        assert_eq!(holder.items, vec![1, 2]);
    }
}
