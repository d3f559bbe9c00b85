//! Per-call evaluation state.

use serde_json::{Map, Value};

use crate::model::{NameValue, Request};

/// Slot holding step outputs.
pub const RESULT_SLOT: &str = "res";

/// Build the initial state tree for one decode run:
/// `{header, cookie, path, query, body, res: {}}`.
///
/// Parts the request lacks (no headers, no cookies, no query, no body) stay
/// absent so that steps reading them are skipped.
pub fn initial_state(request: &Request) -> Value {
    let mut state = Map::new();
    if !request.headers.is_empty() {
        state.insert("header".to_string(), name_value_map(&request.headers));
    }
    if !request.cookies.is_empty() {
        state.insert("cookie".to_string(), name_value_map(&request.cookies));
    }
    state.insert("path".to_string(), Value::String(request.path_only().to_string()));
    if let Some(query) = request.query_string() {
        state.insert("query".to_string(), Value::String(query.to_string()));
    }
    if let Some(content) = &request.content {
        state.insert("body".to_string(), Value::String(content.clone()));
    }
    state.insert(RESULT_SLOT.to_string(), Value::Object(Map::new()));
    Value::Object(state)
}

/// Last write wins on duplicate names.
fn name_value_map(pairs: &[NameValue]) -> Value {
    let map = pairs
        .iter()
        .map(|pair| (pair.name.clone(), Value::String(pair.value.clone())))
        .collect::<Map<String, Value>>();
    Value::Object(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_initial_state_splits_path() {
        let request = Request::new("https://t.example/collect")
            .with_path("/collect?a=1")
            .with_content("payload")
            .with_header("X-Id", "1")
            .with_header("X-Id", "2")
            .with_cookie("sid", "s");

        assert_eq!(
            initial_state(&request),
            json!({
                "header": {"X-Id": "2"},
                "cookie": {"sid": "s"},
                "path": "/collect",
                "query": "a=1",
                "body": "payload",
                "res": {}
            })
        );
    }

    #[test]
    fn test_initial_state_omits_missing_parts() {
        let state = initial_state(&Request::new("https://t.example/").with_path("/"));
        assert!(state.get("query").is_none());
        assert!(state.get("body").is_none());
        assert!(state.get("header").is_none());
        assert!(state.get("cookie").is_none());
        assert_eq!(state, json!({"path": "/", "res": {}}));
    }
}
