//! Step function library.
//!
//! Every function takes one JSON value and returns one JSON value or a
//! `StepError`. String-consuming functions accept numbers and booleans by
//! their display form; containers are a type mismatch.

use std::borrow::Cow;
use std::io::Read;

use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig};
use base64::engine::DecodePaddingMode;
use base64::Engine;
use flate2::read::GzDecoder;
use serde_json::{Map, Value};

use crate::binary::{binary_string_to_text, bytes_to_binary_string, bytes_to_text, string_to_bytes};
use crate::error::{StepError, ValueKind};
use crate::model::StepFunction;
use crate::protobuf::decode_protobuf;

/// Standard alphabet, padding optional, trailing bits tolerated. URL-safe
/// input is mapped onto it before decoding.
const LENIENT_BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new()
        .with_decode_padding_mode(DecodePaddingMode::Indifferent)
        .with_decode_allow_trailing_bits(true),
);

/// Deepest bracket nesting expanded by `parseQueryString`; anything deeper
/// stays a literal key.
const QS_MAX_DEPTH: usize = 5;

/// Largest bracket index treated as an array position.
const QS_ARRAY_LIMIT: usize = 20;

impl StepFunction {
    /// Apply this function to one input value.
    pub fn apply(&self, input: &Value) -> Result<Value, StepError> {
        match self {
            StepFunction::ParseQueryString => Ok(parse_query_string(&text(input)?)),
            StepFunction::ParseJson => parse_json(&text(input)?),
            StepFunction::DecodeBase64 => {
                let bytes = decode_base64(&text(input)?)?;
                Ok(Value::String(bytes_to_binary_string(&bytes)))
            }
            StepFunction::DecodeUrl => Ok(Value::String(decode_url(&text(input)?))),
            StepFunction::DecodeProtobuf => {
                let input = text(input)?;
                Ok(decode_protobuf(&string_to_bytes(&input))?)
            }
            StepFunction::Gunzip => gunzip(&text(input)?).map(Value::String),
            StepFunction::EnsureArray => Ok(ensure_array(input)),
            StepFunction::GetProperty { path } => Ok(path.query_unwrapped(input).unwrap_or(Value::Null)),
            StepFunction::DecodeJwt => decode_jwt(&text(input)?),
            StepFunction::Split { separator } => Ok(split(&text(input)?, separator)),
        }
    }
}

fn text(value: &Value) -> Result<Cow<'_, str>, StepError> {
    match value {
        Value::String(s) => Ok(Cow::Borrowed(s.as_str())),
        Value::Number(n) => Ok(Cow::Owned(n.to_string())),
        Value::Bool(b) => Ok(Cow::Owned(b.to_string())),
        other => Err(StepError::TypeMismatch {
            expected: "string",
            found: ValueKind::of(other),
        }),
    }
}

/// Strict JSON parse. Binary strings carrying UTF-8 are repaired first.
pub fn parse_json(input: &str) -> Result<Value, StepError> {
    Ok(serde_json::from_str(&binary_string_to_text(input))?)
}

/// Lenient base64: standard or URL-safe alphabet, optional padding, ASCII
/// whitespace ignored.
pub fn decode_base64(input: &str) -> Result<Vec<u8>, base64::DecodeError> {
    let normalized: String = input
        .chars()
        .filter(|c| !c.is_ascii_whitespace())
        .map(|c| match c {
            '-' => '+',
            '_' => '/',
            c => c,
        })
        .collect();
    LENIENT_BASE64.decode(normalized)
}

/// Percent-decode. `+` is left alone.
pub fn decode_url(input: &str) -> String {
    let bytes: Vec<u8> = percent_encoding::percent_decode_str(input).collect();
    bytes_to_text(bytes)
}

/// Inflate a gzip stream held in a binary string.
pub fn gunzip(input: &str) -> Result<String, StepError> {
    let compressed = string_to_bytes(input);
    let mut decoder = GzDecoder::new(&compressed[..]);
    let mut out = Vec::new();
    decoder.read_to_end(&mut out)?;
    Ok(bytes_to_binary_string(&out))
}

pub fn ensure_array(input: &Value) -> Value {
    match input {
        Value::Array(_) => input.clone(),
        other => Value::Array(vec![other.clone()]),
    }
}

/// Decode the payload (second) segment of a JWT as JSON. The signature is not
/// checked.
pub fn decode_jwt(input: &str) -> Result<Value, StepError> {
    let payload = input
        .trim()
        .split('.')
        .nth(1)
        .ok_or_else(|| StepError::Jwt("missing payload segment".to_string()))?;
    let bytes = decode_base64(payload)?;
    serde_json::from_str(&bytes_to_text(bytes)).map_err(|e| StepError::Jwt(format!("payload is not JSON: {e}")))
}

/// Split on a literal separator. An empty separator splits into chars.
pub fn split(input: &str, separator: &str) -> Value {
    let parts: Vec<Value> = if separator.is_empty() {
        input.chars().map(|c| Value::String(c.to_string())).collect()
    } else {
        input
            .split(separator)
            .map(|part| Value::String(part.to_string()))
            .collect()
    };
    Value::Array(parts)
}

// ---------------------------------------------------------------------------
// Query strings
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
enum QsKey {
    Name(String),
    Index(usize),
    Push,
}

/// Parse an `application/x-www-form-urlencoded` string into a nested object.
///
/// Everything up to and including the first `?` is dropped. Bracket keys nest
/// (`a[b]=1`, `a[]=1`, `a[0]=1`); repeated keys collect into arrays; dots are
/// literal. When a pair would nest below an existing scalar, the earlier
/// value is kept.
pub fn parse_query_string(input: &str) -> Value {
    let query = input.split_once('?').map_or(input, |(_, query)| query);
    let mut root = Value::Object(Map::new());
    for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
        if key.is_empty() {
            continue;
        }
        let keys = parse_qs_key(&key);
        insert(&mut root, &keys, Value::String(value.into_owned()));
    }
    root
}

fn parse_qs_key(key: &str) -> Vec<QsKey> {
    let (root, mut rest) = match key.find('[') {
        Some(open) if key[open..].contains(']') => key.split_at(open),
        _ => return vec![QsKey::Name(key.to_string())],
    };

    let mut keys = Vec::new();
    if !root.is_empty() {
        keys.push(QsKey::Name(root.to_string()));
    }
    let mut depth = 0;
    while depth < QS_MAX_DEPTH {
        let Some(inner) = rest.strip_prefix('[') else {
            break;
        };
        let Some(close) = inner.find(']') else {
            break;
        };
        let segment = &inner[..close];
        keys.push(match segment.parse::<usize>() {
            _ if segment.is_empty() => QsKey::Push,
            Ok(index) if index <= QS_ARRAY_LIMIT => QsKey::Index(index),
            _ => QsKey::Name(segment.to_string()),
        });
        rest = &inner[close + 1..];
        depth += 1;
    }
    if !rest.is_empty() {
        keys.push(QsKey::Name(rest.to_string()));
    }
    keys
}

fn insert(node: &mut Value, keys: &[QsKey], value: Value) {
    let Some((first, rest)) = keys.split_first() else {
        return;
    };
    let Some(next) = rest.first() else {
        set_leaf(node, first, value);
        return;
    };
    let fresh = match next {
        QsKey::Name(_) => Value::Object(Map::new()),
        QsKey::Index(_) | QsKey::Push => Value::Array(Vec::new()),
    };
    if let Some(child) = slot(node, first, fresh) {
        if child.is_object() || child.is_array() {
            insert(child, rest, value);
        }
    }
}

/// Child slot for `key`, created from `fresh` when missing.
fn slot<'a>(node: &'a mut Value, key: &QsKey, fresh: Value) -> Option<&'a mut Value> {
    if matches!(key, QsKey::Name(_)) {
        array_to_object(node);
    }
    match (node, key) {
        (Value::Object(map), QsKey::Name(name)) => Some(map.entry(name.clone()).or_insert(fresh)),
        (Value::Object(map), QsKey::Index(index)) => {
            Some(map.entry(index.to_string()).or_insert(fresh))
        }
        (Value::Object(map), QsKey::Push) => {
            let next = map.len().to_string();
            Some(map.entry(next).or_insert(fresh))
        }
        (Value::Array(items), key) => {
            let at = match key {
                QsKey::Index(index) if *index < items.len() => *index,
                _ => {
                    items.push(fresh);
                    items.len() - 1
                }
            };
            items.get_mut(at)
        }
        _ => None,
    }
}

fn set_leaf(node: &mut Value, key: &QsKey, value: Value) {
    if matches!(key, QsKey::Name(_)) {
        array_to_object(node);
    }
    match (node, key) {
        (Value::Object(map), QsKey::Name(name)) => match map.get_mut(name) {
            Some(existing) => combine(existing, value),
            None => {
                map.insert(name.clone(), value);
            }
        },
        (Value::Object(map), QsKey::Index(index)) => {
            let name = index.to_string();
            match map.get_mut(&name) {
                Some(existing) => combine(existing, value),
                None => {
                    map.insert(name, value);
                }
            }
        }
        (Value::Object(map), QsKey::Push) => {
            let next = map.len().to_string();
            map.insert(next, value);
        }
        (Value::Array(items), QsKey::Index(index)) if *index < items.len() => {
            combine(&mut items[*index], value);
        }
        (Value::Array(items), _) => items.push(value),
        _ => {}
    }
}

fn combine(existing: &mut Value, value: Value) {
    match existing {
        Value::Array(items) => items.push(value),
        other => {
            let first = std::mem::take(other);
            *other = Value::Array(vec![first, value]);
        }
    }
}

fn array_to_object(node: &mut Value) {
    if let Value::Array(items) = node {
        let map = std::mem::take(items)
            .into_iter()
            .enumerate()
            .map(|(i, v)| (i.to_string(), v))
            .collect();
        *node = Value::Object(map);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extraction::json_path::JsonPath;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use serde_json::json;
    use std::io::Write;

    fn apply(function: StepFunction, input: Value) -> Value {
        function.apply(&input).unwrap()
    }

    #[test]
    fn test_parse_query_string_flat() {
        assert_eq!(
            parse_query_string("https://t.example/c?app=com.example&v=1.2&empty="),
            json!({"app": "com.example", "v": "1.2", "empty": ""})
        );
        assert_eq!(parse_query_string("a=hello+world&b=%C3%A4"), json!({"a": "hello world", "b": "ä"}));
    }

    #[test]
    fn test_parse_query_string_nesting() {
        assert_eq!(
            parse_query_string("d[os]=ios&d[screen][w]=375&ids[]=1&ids[]=2&e[0]=x&e[1]=y"),
            json!({
                "d": {"os": "ios", "screen": {"w": "375"}},
                "ids": ["1", "2"],
                "e": ["x", "y"]
            })
        );
    }

    #[test]
    fn test_parse_query_string_objects_inside_arrays() {
        assert_eq!(
            parse_query_string("ev[0][n]=open&ev[0][t]=12&ev[][n]=close"),
            json!({"ev": [{"n": "open", "t": "12"}, {"n": "close"}]})
        );
    }

    #[test]
    fn test_parse_query_string_repeated_and_literal_keys() {
        assert_eq!(
            parse_query_string("a=1&a=2&a=3&x.y=z&b]=w"),
            json!({"a": ["1", "2", "3"], "x.y": "z", "b]": "w"})
        );
    }

    #[test]
    fn test_parse_query_string_limits() {
        let parsed = parse_query_string("a[b][c][d][e][f][g]=1&big[21]=x");
        assert_eq!(parsed["a"]["b"]["c"]["d"]["e"]["f"]["[g]"], json!("1"));
        assert_eq!(parsed["big"], json!({"21": "x"}));
    }

    #[test]
    fn test_parse_query_string_keeps_earlier_scalar() {
        assert_eq!(parse_query_string("a=1&a[b]=2"), json!({"a": "1"}));
    }

    #[test]
    fn test_parse_json() {
        assert_eq!(apply(StepFunction::ParseJson, json!(r#"{"a":[1,true]}"#)), json!({"a": [1, true]}));
        assert!(matches!(
            StepFunction::ParseJson.apply(&json!("{nope")),
            Err(StepError::Json(_))
        ));
    }

    #[test]
    fn test_parse_json_repairs_binary_utf8() {
        let binary = bytes_to_binary_string("{\"city\":\"Köln\"}".as_bytes());
        assert_eq!(apply(StepFunction::ParseJson, json!(binary)), json!({"city": "Köln"}));
    }

    #[test]
    fn test_decode_base64_variants() {
        assert_eq!(apply(StepFunction::DecodeBase64, json!("MTIz")), json!("123"));
        assert_eq!(apply(StepFunction::DecodeBase64, json!("aGk")), json!("hi"));
        assert_eq!(apply(StepFunction::DecodeBase64, json!("aG\nk=")), json!("hi"));
        assert_eq!(decode_base64("-_8").unwrap(), vec![0xfb, 0xff]);
        assert_eq!(decode_base64("+/8=").unwrap(), vec![0xfb, 0xff]);
        assert!(decode_base64("!!!").is_err());
    }

    #[test]
    fn test_decode_base64_is_binary_safe() {
        assert_eq!(apply(StepFunction::DecodeBase64, json!("/wA=")), json!("\u{ff}\u{0}"));
    }

    #[test]
    fn test_decode_url() {
        assert_eq!(apply(StepFunction::DecodeUrl, json!("a%20b%2Bc+d")), json!("a b+c+d"));
        assert_eq!(apply(StepFunction::DecodeUrl, json!("%E2%9C%93")), json!("\u{2713}"));
        assert_eq!(apply(StepFunction::DecodeUrl, json!("%FF")), json!("\u{ff}"));
    }

    #[test]
    fn test_gunzip_round_trip_through_base64() {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(br#"{"id":"abc"}"#).unwrap();
        let compressed = encoder.finish().unwrap();

        let binary = bytes_to_binary_string(&compressed);
        let inflated = apply(StepFunction::Gunzip, json!(binary));
        assert_eq!(apply(StepFunction::ParseJson, inflated), json!({"id": "abc"}));
    }

    #[test]
    fn test_gunzip_rejects_garbage() {
        assert!(matches!(
            StepFunction::Gunzip.apply(&json!("not gzip")),
            Err(StepError::Gzip(_))
        ));
    }

    #[test]
    fn test_decode_protobuf_from_binary_string() {
        // field 1 varint 150, field 2 "ab"
        let binary = bytes_to_binary_string(&[0x08, 0x96, 0x01, 0x12, 0x02, b'a', b'b']);
        assert_eq!(apply(StepFunction::DecodeProtobuf, json!(binary)), json!({"1": 150, "2": "ab"}));
    }

    #[test]
    fn test_ensure_array() {
        assert_eq!(apply(StepFunction::EnsureArray, json!([1])), json!([1]));
        assert_eq!(apply(StepFunction::EnsureArray, json!({"a": 1})), json!([{"a": 1}]));
    }

    #[test]
    fn test_get_property() {
        let function = StepFunction::GetProperty {
            path: JsonPath::parse("attributes.id").unwrap(),
        };
        assert_eq!(function.apply(&json!({"attributes": {"id": "x"}})).unwrap(), json!("x"));
        assert_eq!(function.apply(&json!({"other": 1})).unwrap(), Value::Null);
    }

    #[test]
    fn test_decode_jwt() {
        // {"alg":"none"}.{"sub":"user-1","n":2}.
        let token = "eyJhbGciOiJub25lIn0.eyJzdWIiOiJ1c2VyLTEiLCJuIjoyfQ.";
        assert_eq!(apply(StepFunction::DecodeJwt, json!(token)), json!({"sub": "user-1", "n": 2}));
        assert!(matches!(
            StepFunction::DecodeJwt.apply(&json!("no-dots")),
            Err(StepError::Jwt(_))
        ));
    }

    #[test]
    fn test_split() {
        let function = StepFunction::Split {
            separator: "|".to_string(),
        };
        assert_eq!(function.apply(&json!("a|b||c")).unwrap(), json!(["a", "b", "", "c"]));
        assert_eq!(split("ab", ""), json!(["a", "b"]));
    }

    #[test]
    fn test_scalar_coercion_and_type_mismatch() {
        assert_eq!(
            StepFunction::Split {
                separator: "0".into()
            }
            .apply(&json!(1020))
            .unwrap(),
            json!(["1", "2", ""])
        );
        assert!(matches!(
            StepFunction::DecodeUrl.apply(&json!({"a": 1})),
            Err(StepError::TypeMismatch {
                expected: "string",
                found: ValueKind::Object
            })
        ));
    }
}
