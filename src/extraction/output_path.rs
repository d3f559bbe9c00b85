//! Write targets for decoding steps.
//!
//! Output identifiers are plain dotted paths (`res.body.events.0`), with
//! `[n]` accepted as an alternative spelling of a numeric segment. Wildcards
//! and filters are rejected so the target is always unambiguous.

use std::fmt;

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::PathError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathKey {
    Name(String),
    Index(usize),
}

/// A compiled write target.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "String")]
pub struct OutputPath {
    source: String,
    keys: Vec<PathKey>,
}

/// Result of an assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Assigned {
    Written,
    /// An intermediate segment exists but is a scalar.
    Conflict,
}

impl OutputPath {
    pub fn parse(source: &str) -> Result<Self, PathError> {
        let invalid = |reason: &str| PathError::InvalidOutput {
            path: source.to_string(),
            reason: reason.to_string(),
        };

        let normalized = source.replace('[', ".").replace(']', "");
        let normalized = normalized
            .strip_prefix("$.")
            .unwrap_or(normalized.as_str());

        if normalized.trim().is_empty() {
            return Err(invalid("empty path"));
        }
        if normalized.contains(['*', '?', '@', '(', ')']) {
            return Err(invalid("wildcards and filters cannot be written to"));
        }

        let keys = normalized
            .split('.')
            .map(|part| {
                if part.is_empty() {
                    Err(invalid("empty segment"))
                } else if part.bytes().all(|b| b.is_ascii_digit()) {
                    part.parse()
                        .map(PathKey::Index)
                        .map_err(|_| invalid("index out of range"))
                } else {
                    Ok(PathKey::Name(part.to_string()))
                }
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            source: source.to_string(),
            keys,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn keys(&self) -> &[PathKey] {
        &self.keys
    }

    /// Write `value` at this path inside `root`, creating missing
    /// containers as objects. A numeric segment indexes into an existing
    /// array (padding with nulls); anywhere else it is an object key.
    pub fn assign(&self, root: &mut Value, value: Value) -> Assigned {
        let Some((last, parents)) = self.keys.split_last() else {
            return Assigned::Conflict;
        };

        let mut current = root;
        for key in parents {
            current = match child_slot(current, key) {
                Some(slot) => {
                    if slot.is_null() {
                        *slot = Value::Object(Map::new());
                    }
                    if !(slot.is_object() || slot.is_array()) {
                        return Assigned::Conflict;
                    }
                    slot
                }
                None => return Assigned::Conflict,
            };
        }

        match child_slot(current, last) {
            Some(slot) => {
                *slot = value;
                Assigned::Written
            }
            None => Assigned::Conflict,
        }
    }
}

/// Mutable slot for `key` inside a container, created as `null` if missing.
fn child_slot<'a>(container: &'a mut Value, key: &PathKey) -> Option<&'a mut Value> {
    match (container, key) {
        (Value::Array(arr), PathKey::Index(i)) => {
            if *i >= arr.len() {
                arr.resize(*i + 1, Value::Null);
            }
            arr.get_mut(*i)
        }
        (Value::Object(obj), PathKey::Index(i)) => Some(obj.entry(i.to_string()).or_insert(Value::Null)),
        (Value::Object(obj), PathKey::Name(name)) => {
            Some(obj.entry(name.clone()).or_insert(Value::Null))
        }
        _ => None,
    }
}

impl TryFrom<String> for OutputPath {
    type Error = PathError;

    fn try_from(source: String) -> Result<Self, Self::Error> {
        OutputPath::parse(&source)
    }
}

impl fmt::Display for OutputPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}
