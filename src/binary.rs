//! Binary strings.
//!
//! Request bodies and intermediate decode results are carried as strings.
//! Raw bytes are stored one char per byte (U+0000..=U+00FF) so that a value
//! can pass through `decodeBase64` into `gunzip` or `decodeProtobuf` without
//! losing data.

use std::borrow::Cow;

/// Map each byte to the char with the same code point.
pub fn bytes_to_binary_string(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| char::from(b)).collect()
}

/// Recover the bytes of a string.
///
/// A string made only of chars up to U+00FF is read as a binary string (one
/// byte per char). Anything else is real text and yields its UTF-8 encoding.
pub fn string_to_bytes(s: &str) -> Cow<'_, [u8]> {
    if s.is_ascii() {
        return Cow::Borrowed(s.as_bytes());
    }
    if s.chars().all(|c| (c as u32) <= 0xFF) {
        Cow::Owned(s.chars().map(|c| c as u8).collect())
    } else {
        Cow::Borrowed(s.as_bytes())
    }
}

/// Decode bytes as UTF-8 text, falling back to a binary string.
pub fn bytes_to_text(bytes: Vec<u8>) -> String {
    match String::from_utf8(bytes) {
        Ok(text) => text,
        Err(e) => bytes_to_binary_string(e.as_bytes()),
    }
}

/// Undo a binary-string round trip for text payloads.
///
/// If `s` is a binary string whose bytes are valid UTF-8 (the usual result of
/// base64-decoding or inflating a JSON document), return that UTF-8 text.
/// Otherwise return `s` unchanged.
pub fn binary_string_to_text(s: &str) -> Cow<'_, str> {
    if s.is_ascii() {
        return Cow::Borrowed(s);
    }
    match string_to_bytes(s) {
        Cow::Owned(bytes) => match String::from_utf8(bytes) {
            Ok(text) => Cow::Owned(text),
            Err(_) => Cow::Borrowed(s),
        },
        Cow::Borrowed(_) => Cow::Borrowed(s),
    }
}
