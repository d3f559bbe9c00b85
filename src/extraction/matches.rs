//! Path extraction from decoded requests.
//!
//! Decodes a request with its adapter's steps, then pulls every declared
//! data path out of the decoded tree as annotated matches.

use serde_json::Value;

use crate::error::DecodeError;
use crate::extraction::json_path::value_to_string;
use crate::log_debug;
use crate::logging::structured::LogContext;
use crate::model::{Adapter, AnnotatedMatch, DataPath, Request};
use crate::pipeline::engine::decode_request_with_context;

/// Decode `request` with `adapter` and extract its data paths.
///
/// # Arguments
/// * `request` - The captured request
/// * `adapter` - The adapter to decode it with (already matched)
///
/// # Returns
/// One match per surviving value, grouped by property in property order and
/// by data path in declaration order. Paths are never deduplicated against
/// each other.
pub fn process_request_with_adapter(
    request: &Request,
    adapter: &Adapter,
) -> Result<Vec<AnnotatedMatch>, DecodeError> {
    let adapter_id = adapter.id();
    let ctx = LogContext::for_request().with_adapter(&adapter_id);
    extract_with_context(request, adapter, &ctx)
}

/// [`process_request_with_adapter`] logging under an existing context.
pub fn extract_with_context(
    request: &Request,
    adapter: &Adapter,
    ctx: &LogContext,
) -> Result<Vec<AnnotatedMatch>, DecodeError> {
    let decoded = decode_request_with_context(request, &adapter.decoding_steps, ctx)?;
    let adapter_id = adapter.id();

    let mut matches = Vec::new();
    for (property, paths) in &adapter.contained_data_paths {
        for data_path in paths {
            let scope = match decoded.get(data_path.context.as_str()) {
                Some(scope) => scope,
                None => continue,
            };

            for value in data_path.path.query(scope) {
                if !keep_value(value, data_path) {
                    continue;
                }

                log_debug!(
                    ctx,
                    "PATH_MATCHED",
                    property = property,
                    context = data_path.context,
                    path = data_path.path,
                );

                matches.push(AnnotatedMatch {
                    adapter: Some(adapter_id.clone()),
                    property: *property,
                    context: data_path.context,
                    path: data_path.path.as_str().to_string(),
                    reasoning: data_path.reasoning.clone(),
                    value: value.clone(),
                });
            }
        }
    }

    log_debug!(ctx, "EXTRACT_COMPLETE", matches = matches.len());

    Ok(matches)
}

/// Null and blank strings are dropped; everything else is subject to the
/// path's `onlyIf`/`notIf` checks on its string form.
fn keep_value(value: &Value, data_path: &DataPath) -> bool {
    match value {
        Value::Null => return false,
        Value::String(s) if s.trim().is_empty() => return false,
        _ => {}
    }

    if data_path.only_if.is_none() && data_path.not_if.is_none() {
        return true;
    }

    let text = value_to_string(value);
    if let Some(only_if) = &data_path.only_if {
        if !only_if.matches(&text) {
            return false;
        }
    }
    if let Some(not_if) = &data_path.not_if {
        if not_if.matches(&text) {
            return false;
        }
    }
    true
}
