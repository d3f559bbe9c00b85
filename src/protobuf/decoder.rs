//! Message decoding without a schema.
//!
//! Every length-delimited field is first tried as a nested message. If that
//! fails the bytes are kept as a binary string. Field names are unknown, so
//! the resulting tree is keyed by field number at every level.

use serde_json::{json, Map, Value};

use crate::binary::bytes_to_binary_string;
use crate::error::WireError;

use super::reader::{WireReader, WireType};

/// One decoded field record.
#[derive(Debug, Clone, PartialEq)]
pub struct Field<'a> {
    pub number: u64,
    pub wire_type: WireType,
    pub value: FieldValue<'a>,
}

/// Payload of a field record.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue<'a> {
    Varint(u64),
    Fixed64(u64),
    Fixed32(u32),
    Message(Vec<Field<'a>>),
    Bytes(&'a [u8]),
}

/// Parse a byte sequence into its field records.
///
/// Fails if the buffer runs out mid-record or a tag carries an unknown wire
/// type. Failures inside a nested length-delimited field are not errors;
/// that field just stays as raw bytes.
pub fn parse_message(buf: &[u8]) -> Result<Vec<Field<'_>>, WireError> {
    let mut reader = WireReader::new(buf);
    let mut fields = Vec::new();

    while !reader.is_empty() {
        let (number, wire_type) = reader.read_tag()?;
        let value = match wire_type {
            WireType::Varint => FieldValue::Varint(reader.read_varint()?),
            WireType::Fixed64 => FieldValue::Fixed64(reader.read_fixed64()?),
            WireType::Fixed32 => FieldValue::Fixed32(reader.read_fixed32()?),
            WireType::LengthDelimited => {
                let len = reader.read_varint()?;
                let len = usize::try_from(len).map_err(|_| WireError::Exhausted {
                    offset: reader.position(),
                    needed: usize::MAX,
                    available: reader.remaining(),
                })?;
                let slice = reader.read_slice(len)?;
                try_submessage(slice)
            }
        };
        fields.push(Field {
            number,
            wire_type,
            value,
        });
    }

    Ok(fields)
}

fn try_submessage(slice: &[u8]) -> FieldValue<'_> {
    if slice.is_empty() {
        return FieldValue::Bytes(slice);
    }
    match parse_message(slice) {
        Ok(fields) => FieldValue::Message(fields),
        Err(_) => FieldValue::Bytes(slice),
    }
}

/// Decode a protobuf message into a tree keyed by field number.
///
/// Repeated field numbers collect into an array in occurrence order.
///
/// # Examples
/// ```
/// use trackhar_core::protobuf::decode_protobuf;
/// let tree = decode_protobuf(&[0x08, 0x96, 0x01]).unwrap();
/// assert_eq!(tree, serde_json::json!({"1": 150}));
/// ```
pub fn decode_protobuf(buf: &[u8]) -> Result<Value, WireError> {
    let fields = parse_message(buf)?;
    Ok(render(&fields, false))
}

/// Like [`decode_protobuf`], but every leaf is wrapped as
/// `{"wireType": <n>, "value": <v>}`.
pub fn decode_protobuf_typed(buf: &[u8]) -> Result<Value, WireError> {
    let fields = parse_message(buf)?;
    Ok(render(&fields, true))
}

fn render(fields: &[Field<'_>], typed: bool) -> Value {
    let mut out = Map::new();

    for field in fields {
        let value = match &field.value {
            FieldValue::Varint(v) | FieldValue::Fixed64(v) => json!(v),
            FieldValue::Fixed32(v) => json!(v),
            FieldValue::Message(nested) => render(nested, typed),
            FieldValue::Bytes(bytes) => Value::String(bytes_to_binary_string(bytes)),
        };
        let value = if typed {
            json!({"wireType": field.wire_type.as_u8(), "value": value})
        } else {
            value
        };

        let key = field.number.to_string();
        match out.get_mut(&key) {
            // Field values are never arrays themselves, so an array here is
            // always an accumulation of repeats.
            Some(Value::Array(items)) => items.push(value),
            Some(existing) => {
                let first = existing.take();
                *existing = Value::Array(vec![first, value]);
            }
            None => {
                out.insert(key, value);
            }
        }
    }

    Value::Object(out)
}
