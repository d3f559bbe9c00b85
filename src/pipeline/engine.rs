//! Decoding engine.
//!
//! Runs an adapter's steps, in order, against a fresh evaluation state and
//! returns the `res` slot. Any step failure aborts the whole run.

use serde_json::{Map, Value};

use crate::error::{DecodeError, StepError, ValueKind};
use crate::extraction::json_path::is_truthy;
use crate::extraction::output_path::Assigned;
use crate::logging::structured::LogContext;
use crate::model::{DecodingStep, Request, StepInput};
use crate::log_debug;

use super::state;

/// Decode `request` with `steps` and return the decoded tree.
pub fn decode_request(request: &Request, steps: &[DecodingStep]) -> Result<Value, DecodeError> {
    decode_request_with_context(request, steps, &LogContext::for_request())
}

/// [`decode_request`] logging under an existing context.
pub fn decode_request_with_context(
    request: &Request,
    steps: &[DecodingStep],
    ctx: &LogContext,
) -> Result<Value, DecodeError> {
    let mut state = state::initial_state(request);

    for (index, step) in steps.iter().enumerate() {
        let Some(result) = evaluate_step(index, step, &state, ctx)? else {
            continue;
        };

        if let Assigned::Conflict = step.output.assign(&mut state, result) {
            return Err(DecodeError::OutputConflict {
                index,
                path: step.output.as_str().to_string(),
            });
        }

        log_debug!(
            ctx,
            "STEP_APPLIED",
            index = index,
            function = step.function.name(),
            output = step.output.as_str(),
        );
    }

    Ok(match state {
        Value::Object(mut slots) => slots
            .remove(state::RESULT_SLOT)
            .unwrap_or_else(|| Value::Object(Map::new())),
        _ => Value::Object(Map::new()),
    })
}

/// Result to write for one step, or `None` when the step is skipped.
fn evaluate_step(
    index: usize,
    step: &DecodingStep,
    state: &Value,
    ctx: &LogContext,
) -> Result<Option<Value>, DecodeError> {
    let function = step.function.name();
    let fail = |source: StepError| {
        log_debug!(
            ctx,
            "STEP_FAILED",
            index = index,
            function = function,
            input = step.input.path(),
            error = &source,
        );
        DecodeError::Step {
            index,
            function,
            source,
        }
    };

    match &step.input {
        StepInput::Single(path) => {
            let input = path.query_unwrapped(state).unwrap_or(Value::Null);
            if !is_truthy(&input) {
                log_debug!(ctx, "STEP_SKIPPED", index = index, function = function, reason = "falsy_input");
                return Ok(None);
            }

            let result = step.function.apply(&input).map_err(fail)?;
            if !is_truthy(&result) {
                log_debug!(ctx, "STEP_SKIPPED", index = index, function = function, reason = "falsy_output");
                return Ok(None);
            }
            Ok(Some(result))
        }
        StepInput::Map(path) => {
            let items = match path.query_unwrapped(state) {
                Some(Value::Array(items)) => items,
                other => {
                    return Err(DecodeError::MapInputNotArray {
                        index,
                        path: path.as_str().to_string(),
                        found: ValueKind::of(&other.unwrap_or(Value::Null)),
                    });
                }
            };

            let results = items
                .iter()
                .filter(|item| !item.is_null())
                .map(|item| step.function.apply(item))
                .collect::<Result<Vec<_>, _>>()
                .map_err(fail)?;
            Ok(Some(Value::Array(results)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn steps(definitions: Value) -> Vec<DecodingStep> {
        serde_json::from_value(definitions).unwrap()
    }

    #[test]
    fn test_parse_json_body() {
        let request = Request::new("https://t.example/").with_content(r#"{"device_id":"abc123"}"#);
        let decoded = decode_request(
            &request,
            &steps(json!([{"function": "parseJson", "input": "body", "output": "res.body"}])),
        )
        .unwrap();
        assert_eq!(decoded, json!({"body": {"device_id": "abc123"}}));
    }

    #[test]
    fn test_skip_on_missing_input() {
        let request = Request::new("https://t.example/").with_content("x");
        let decoded = decode_request(
            &request,
            &steps(json!([{"function": "getProperty", "input": "cookie.sid", "options": {"path": "$"}, "output": "res.cookie"}])),
        )
        .unwrap();
        assert_eq!(decoded, json!({}));
    }

    #[test]
    fn test_skip_cookie_slot_without_cookies() {
        let request = Request::new("https://t.example/").with_content("x");
        let decoded = decode_request(
            &request,
            &steps(json!([{"function": "getProperty", "input": "cookie", "options": {"path": "$"}, "output": "res.cookie"}])),
        )
        .unwrap();
        assert!(decoded.get("cookie").is_none());
    }

    #[test]
    fn test_skip_header_slot_without_headers() {
        let request = Request::new("https://t.example/").with_content("x");
        let decoded = decode_request(
            &request,
            &steps(json!([{"function": "getProperty", "input": "header", "options": {"path": "$"}, "output": "res.header"}])),
        )
        .unwrap();
        assert!(decoded.get("header").is_none());
    }

    #[test]
    fn test_cookie_slot_read_when_present() {
        let request = Request::new("https://t.example/").with_cookie("sid", "s1");
        let decoded = decode_request(
            &request,
            &steps(json!([{"function": "getProperty", "input": "cookie", "options": {"path": "$"}, "output": "res.cookie"}])),
        )
        .unwrap();
        assert_eq!(decoded, json!({"cookie": {"sid": "s1"}}));
    }

    #[test]
    fn test_falsy_result_not_written() {
        let request = Request::new("https://t.example/").with_content(r#"{"a":""}"#);
        let decoded = decode_request(
            &request,
            &steps(json!([
                {"function": "parseJson", "input": "body", "output": "res.body"},
                {"function": "getProperty", "input": "res.body", "options": {"path": "a"}, "output": "res.a"}
            ])),
        )
        .unwrap();
        assert_eq!(decoded, json!({"body": {"a": ""}}));
    }

    #[test]
    fn test_map_input_decodes_each_element() {
        let request = Request::new("https://t.example/").with_content(r#"{"ids":["MTIz",null,"NDU2"]}"#);
        let decoded = decode_request(
            &request,
            &steps(json!([
                {"function": "parseJson", "input": "body", "output": "res.body"},
                {"function": "decodeBase64", "mapInput": "res.body.ids", "output": "res.ids"}
            ])),
        )
        .unwrap();
        assert_eq!(decoded["ids"], json!(["123", "456"]));
    }

    #[test]
    fn test_map_input_empty_array_is_written() {
        let request = Request::new("https://t.example/").with_content(r#"{"ids":[null]}"#);
        let decoded = decode_request(
            &request,
            &steps(json!([
                {"function": "parseJson", "input": "body", "output": "res.body"},
                {"function": "decodeBase64", "mapInput": "res.body.ids", "output": "res.ids"}
            ])),
        )
        .unwrap();
        assert_eq!(decoded["ids"], json!([]));
    }

    #[test]
    fn test_map_input_must_be_array() {
        let request = Request::new("https://t.example/").with_content(r#"{"ids":"MTIz"}"#);
        let err = decode_request(
            &request,
            &steps(json!([
                {"function": "parseJson", "input": "body", "output": "res.body"},
                {"function": "decodeBase64", "mapInput": "res.body.ids", "output": "res.ids"}
            ])),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            DecodeError::MapInputNotArray {
                index: 1,
                found: ValueKind::String,
                ..
            }
        ));
    }

    #[test]
    fn test_step_failure_names_index_and_function() {
        let request = Request::new("https://t.example/").with_content("{not json");
        let err = decode_request(
            &request,
            &steps(json!([{"function": "parseJson", "input": "body", "output": "res.body"}])),
        )
        .unwrap_err();
        match err {
            DecodeError::Step {
                index: 0,
                function: "parseJson",
                source: StepError::Json(_),
            } => {}
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_later_steps_see_earlier_writes() {
        let request = Request::new("https://t.example/c")
            .with_path("/c?d=eyJ1c2VyIjoiYWxpY2UifQ%3D%3D");
        let decoded = decode_request(
            &request,
            &steps(json!([
                {"function": "parseQueryString", "input": "query", "output": "res.query"},
                {"function": "decodeBase64", "input": "res.query.d", "output": "res.query.d"},
                {"function": "parseJson", "input": "res.query.d", "output": "res.query.d"}
            ])),
        )
        .unwrap();
        assert_eq!(decoded, json!({"query": {"d": {"user": "alice"}}}));
    }

    #[test]
    fn test_output_creates_intermediate_objects() {
        let request = Request::new("https://t.example/").with_content("v");
        let decoded = decode_request(
            &request,
            &steps(json!([{"function": "ensureArray", "input": "body", "output": "res.body.a.b"}])),
        )
        .unwrap();
        assert_eq!(decoded, json!({"body": {"a": {"b": ["v"]}}}));
    }

    #[test]
    fn test_output_through_scalar_conflicts() {
        let request = Request::new("https://t.example/").with_content("v");
        let err = decode_request(
            &request,
            &steps(json!([
                {"function": "ensureArray", "input": "body", "output": "res.body"},
                {"function": "ensureArray", "input": "body", "output": "res.body.0.x"}
            ])),
        )
        .unwrap_err();
        assert!(matches!(err, DecodeError::OutputConflict { index: 1, .. }));
    }

    #[test]
    fn test_decode_is_idempotent() {
        let request = Request::new("https://t.example/").with_content(r#"{"a":[1,2]}"#);
        let steps = steps(json!([{"function": "parseJson", "input": "body", "output": "res.body"}]));
        assert_eq!(
            decode_request(&request, &steps).unwrap(),
            decode_request(&request, &steps).unwrap()
        );
    }
}
