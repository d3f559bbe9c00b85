//! Indicator matching.
//!
//! Fallback for requests no adapter handles: search the raw request for
//! known values planted on the device (honey data), in plain and encoded
//! forms.

use std::collections::BTreeMap;

use base64::engine::general_purpose::{STANDARD, STANDARD_NO_PAD};
use base64::Engine;
use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
use regex::{Regex, RegexBuilder};
use serde_json::Value;

use crate::model::{AnnotatedMatch, Context, Property, Request};

/// Known values per property, e.g. the test device's advertising id.
pub type IndicatorValues = BTreeMap<Property, Vec<String>>;

pub const INDICATOR_REASONING: &str = "indicator";

/// The forms a value is searched in: as is, base64 (padded and unpadded) and
/// percent-encoded.
pub fn encoded_variants(value: &str) -> Vec<String> {
    let mut variants = vec![
        value.to_string(),
        STANDARD.encode(value),
        STANDARD_NO_PAD.encode(value),
        utf8_percent_encode(value, NON_ALPHANUMERIC).to_string(),
    ];
    variants.sort();
    variants.dedup();
    variants
}

fn variant_pattern(value: &str) -> Option<Regex> {
    let alternatives: Vec<String> = encoded_variants(value)
        .iter()
        .map(|variant| regex::escape(variant))
        .collect();
    RegexBuilder::new(&alternatives.join("|"))
        .case_insensitive(true)
        .build()
        .ok()
}

/// Searchable parts of a request: context, path label and raw text.
fn request_parts(request: &Request) -> Vec<(Context, &str, &str)> {
    let mut parts = Vec::new();
    for header in &request.headers {
        parts.push((Context::Header, header.name.as_str(), header.value.as_str()));
    }
    for cookie in &request.cookies {
        parts.push((Context::Cookie, cookie.name.as_str(), cookie.value.as_str()));
    }
    parts.push((Context::Path, Context::Path.as_str(), request.path_only()));
    if let Some(query) = request.query_string() {
        parts.push((Context::Query, Context::Query.as_str(), query));
    }
    if let Some(content) = request.content.as_deref() {
        parts.push((Context::Body, Context::Body.as_str(), content));
    }
    parts
}

/// Every place an indicator value (or an encoding of it) occurs in
/// `request`, compared case-insensitively.
pub fn indicator_matches(request: &Request, indicators: &IndicatorValues) -> Vec<AnnotatedMatch> {
    let parts = request_parts(request);
    let mut matches = Vec::new();

    for (property, values) in indicators {
        for value in values {
            if value.is_empty() {
                continue;
            }
            let Some(pattern) = variant_pattern(value) else {
                continue;
            };

            for (context, path, text) in &parts {
                if pattern.is_match(text) {
                    matches.push(AnnotatedMatch {
                        adapter: None,
                        property: *property,
                        context: *context,
                        path: path.to_string(),
                        reasoning: INDICATOR_REASONING.to_string(),
                        value: Value::String(value.clone()),
                    });
                }
            }
        }
    }

    matches
}
