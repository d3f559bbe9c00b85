//! Request processing orchestration.
//!
//! Coordinates the full per-request workflow:
//! 1. Adapter matching (catalog order)
//! 2. Decoding with the adapter's steps
//! 3. Data path extraction
//! 4. Indicator fallback when no adapter matched
//!
//! Failures are contained per request in batch mode; one bad request never
//! aborts the batch.

use std::collections::BTreeMap;

use rayon::prelude::*;
use serde::Serialize;
use serde_json::Value;

use crate::error::DecodeError;
use crate::extraction::matches::extract_with_context;
use crate::logging::structured::{short_id, LogContext};
use crate::model::{Adapter, AnnotatedMatch, Property, Request};
use crate::routing::decision::adapter_for_request_with_context;
use crate::routing::indicators::{indicator_matches, IndicatorValues};
use crate::{log_info, log_warn};

/// Orchestrator configuration.
#[derive(Debug, Clone, Default)]
pub struct ProcessOptions {
    /// Known values to search for when no adapter matches.
    pub indicator_values: Option<IndicatorValues>,
}

/// Result of processing a single request.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestResult {
    pub request_id: String,
    /// Id of the adapter that handled the request.
    pub adapter: Option<String>,
    /// `None` when nothing handled the request.
    pub matches: Option<Vec<AnnotatedMatch>>,
    pub error: Option<String>,
}

impl RequestResult {
    pub fn is_failed(&self) -> bool {
        self.error.is_some()
    }
}

/// Result of processing a batch.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchResult {
    pub batch_id: String,
    pub received_count: usize,
    pub matched_count: usize,
    pub unmatched_count: usize,
    pub failed_count: usize,
    /// Same positions as the input requests.
    pub requests: Vec<RequestResult>,
}

/// Process one request against a catalog.
///
/// # Returns
/// `Ok(None)` if no adapter matched and no indicator values are configured;
/// otherwise the adapter's matches, or the indicator hits on fallback.
pub fn process_request(
    request: &Request,
    catalog: &[Adapter],
    options: &ProcessOptions,
) -> Result<Option<Vec<AnnotatedMatch>>, DecodeError> {
    process_with_context(request, catalog, options, &LogContext::for_request()).1
}

/// The id of the matched adapter, if any, alongside the outcome.
fn process_with_context(
    request: &Request,
    catalog: &[Adapter],
    options: &ProcessOptions,
    ctx: &LogContext,
) -> (Option<String>, Result<Option<Vec<AnnotatedMatch>>, DecodeError>) {
    let Some(adapter) = adapter_for_request_with_context(request, catalog, ctx) else {
        return (None, Ok(fallback(request, options, ctx)));
    };

    let adapter_id = adapter.id();
    let ctx = ctx.with_adapter(&adapter_id);
    let outcome = extract_with_context(request, adapter, &ctx).map(|matches| {
        log_info!(ctx, "REQUEST_DECODED", matches = matches.len());
        Some(matches)
    });
    (Some(adapter_id), outcome)
}

fn fallback(request: &Request, options: &ProcessOptions, ctx: &LogContext) -> Option<Vec<AnnotatedMatch>> {
    match &options.indicator_values {
        Some(indicators) => {
            let matches = indicator_matches(request, indicators);
            log_info!(ctx, "REQUEST_INDICATORS", endpoint = request.endpoint_url, matches = matches.len());
            Some(matches)
        }
        None => {
            log_info!(ctx, "REQUEST_UNMATCHED", endpoint = request.endpoint_url);
            None
        }
    }
}

/// Process a batch of requests in parallel.
///
/// Main entry point for bulk processing. Output positions match input
/// positions; per-request failures are recorded, logged and counted.
pub fn process_batch(requests: &[Request], catalog: &[Adapter], options: &ProcessOptions) -> BatchResult {
    let batch_id = short_id("batch");

    let results: Vec<RequestResult> = requests
        .par_iter()
        .enumerate()
        .map(|(index, request)| {
            let request_id = format!("{batch_id}/{index}");
            let ctx = LogContext::new(&request_id);
            let (adapter, outcome) = process_with_context(request, catalog, options, &ctx);
            match outcome {
                Ok(matches) => RequestResult {
                    request_id,
                    adapter,
                    matches,
                    error: None,
                },
                Err(e) => {
                    log_warn!(ctx, "REQUEST_FAILED", endpoint = request.endpoint_url, error = e);
                    RequestResult {
                        request_id,
                        adapter,
                        matches: None,
                        error: Some(e.to_string()),
                    }
                }
            }
        })
        .collect();

    let failed = results.iter().filter(|r| r.is_failed()).count();
    let matched = results
        .iter()
        .filter(|r| r.adapter.is_some() && !r.is_failed())
        .count();
    let unmatched = results.len() - matched - failed;

    log::info!(
        "[batch={}] BATCH_COMPLETE received={} matched={} unmatched={} failed={}",
        batch_id,
        requests.len(),
        matched,
        unmatched,
        failed
    );

    BatchResult {
        batch_id,
        received_count: requests.len(),
        matched_count: matched,
        unmatched_count: unmatched,
        failed_count: failed,
        requests: results,
    }
}

/// Drop provenance: property to the values found for it, in match order.
pub fn values_only(matches: &[AnnotatedMatch]) -> BTreeMap<Property, Vec<Value>> {
    let mut values: BTreeMap<Property, Vec<Value>> = BTreeMap::new();
    for m in matches {
        values.entry(m.property).or_default().push(m.value.clone());
    }
    values
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Context;
    use crate::validation::catalog::AdapterCatalog;
    use serde_json::json;

    fn catalog() -> AdapterCatalog {
        AdapterCatalog::from_value(json!({
            "trackers": [{
                "slug": "t",
                "name": "T",
                "adapters": [
                    {
                        "slug": "a",
                        "endpointUrls": ["https://example.com/track"],
                        "match": {"kind": "contentStartsWith", "prefix": "{\""},
                        "decodingSteps": [{"function": "parseJson", "input": "body", "output": "res.body"}],
                        "containedDataPaths": {
                            "otherIdentifiers": {"context": "body", "path": "device_id", "reasoning": "obvious property name", "notIf": "0"}
                        }
                    },
                    {
                        "slug": "qs",
                        "endpointUrls": ["https://example.com/track"],
                        "decodingSteps": [{"function": "parseQueryString", "input": "body", "output": "res.body"}],
                        "containedDataPaths": {
                            "otherIdentifiers": {"context": "body", "path": "device_id", "reasoning": "form field"},
                            "appId": {"context": "body", "path": "app", "reasoning": "form field"}
                        }
                    }
                ]
            }]
        }))
        .unwrap()
    }

    fn request(content: &str) -> Request {
        Request::new("https://example.com/track").with_content(content)
    }

    #[test]
    fn test_process_request_end_to_end() {
        let catalog = catalog();
        let matches = process_request(&request(r#"{"device_id":"abc123"}"#), catalog.adapters(), &ProcessOptions::default())
            .unwrap()
            .unwrap();
        assert_eq!(
            matches,
            vec![AnnotatedMatch {
                adapter: Some("t/a".to_string()),
                property: Property::OtherIdentifiers,
                context: Context::Body,
                path: "device_id".to_string(),
                reasoning: "obvious property name".to_string(),
                value: json!("abc123"),
            }]
        );
    }

    #[test]
    fn test_not_if_sentinel_yields_no_matches() {
        let catalog = catalog();
        let matches = process_request(&request(r#"{"device_id":"0"}"#), catalog.adapters(), &ProcessOptions::default())
            .unwrap()
            .unwrap();
        assert!(matches.is_empty());
    }

    #[test]
    fn test_form_body_falls_through_to_second_adapter() {
        let catalog = catalog();
        let matches = process_request(&request("device_id=xyz&app=com.example"), catalog.adapters(), &ProcessOptions::default())
            .unwrap()
            .unwrap();
        assert!(matches.iter().all(|m| m.adapter.as_deref() == Some("t/qs")));
        assert_eq!(
            values_only(&matches),
            BTreeMap::from([
                (Property::AppId, vec![json!("com.example")]),
                (Property::OtherIdentifiers, vec![json!("xyz")]),
            ])
        );
    }

    #[test]
    fn test_unmatched_without_indicators_is_none() {
        let catalog = catalog();
        let other = Request::new("https://other.example/");
        assert!(process_request(&other, catalog.adapters(), &ProcessOptions::default())
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_unmatched_falls_back_to_indicators() {
        let catalog = catalog();
        let options = ProcessOptions {
            indicator_values: Some(BTreeMap::from([(Property::AppId, vec!["com.example".to_string()])])),
        };
        let other = Request::new("https://other.example/").with_path("/p?bundle=com.example");
        let matches = process_request(&other, catalog.adapters(), &options).unwrap().unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].context, Context::Query);
        assert!(matches[0].adapter.is_none());
    }

    #[test]
    fn test_process_batch_preserves_order_and_counts() {
        let catalog = catalog();
        let requests = vec![
            request(r#"{"device_id":"abc123"}"#),
            Request::new("https://other.example/"),
            request(r#"{"device_id":"#),
            request("device_id=xyz"),
        ];

        let result = process_batch(&requests, catalog.adapters(), &ProcessOptions::default());
        assert_eq!(result.received_count, 4);
        assert_eq!(result.matched_count, 2);
        assert_eq!(result.unmatched_count, 1);
        assert_eq!(result.failed_count, 1);

        let adapters: Vec<Option<&str>> = result.requests.iter().map(|r| r.adapter.as_deref()).collect();
        assert_eq!(adapters, vec![Some("t/a"), None, Some("t/a"), Some("t/qs")]);
        assert!(result.requests[2].error.as_deref().unwrap().contains("parseJson"));
        assert!(result.requests[1].matches.is_none() && result.requests[1].error.is_none());
        assert!(result.requests[3].request_id.ends_with("/3"));
        assert!(result.requests[3].request_id.starts_with(&result.batch_id));
    }
}
