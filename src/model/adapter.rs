//! Trackers, adapters and data paths.

use std::fmt;
use std::sync::Arc;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::extraction::json_path::JsonPath;

use super::property::Property;
use super::request::Request;
use super::step::DecodingStep;

/// A tracking company.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tracker {
    pub slug: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub datenanfragen_slug: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exodus_id: Option<u32>,
}

impl Tracker {
    pub fn new(slug: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            slug: slug.into(),
            name: name.into(),
            datenanfragen_slug: None,
            exodus_id: None,
        }
    }
}

/// The request part a piece of data is attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Context {
    Header,
    Cookie,
    Path,
    Query,
    Body,
}

impl Context {
    pub const ALL: [Context; 5] = [
        Context::Header,
        Context::Cookie,
        Context::Path,
        Context::Query,
        Context::Body,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Context::Header => "header",
            Context::Cookie => "cookie",
            Context::Path => "path",
            Context::Query => "query",
            Context::Body => "body",
        }
    }
}

impl fmt::Display for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A compiled regular expression loaded from configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(try_from = "String")]
pub struct Pattern(Regex);

impl Pattern {
    pub fn new(pattern: &str) -> Result<Self, regex::Error> {
        Regex::new(pattern).map(Pattern)
    }

    pub fn is_match(&self, haystack: &str) -> bool {
        self.0.is_match(haystack)
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl TryFrom<String> for Pattern {
    type Error = regex::Error;

    fn try_from(pattern: String) -> Result<Self, Self::Error> {
        Pattern::new(&pattern)
    }
}

/// Matches a request's endpoint URL (scheme, host and path; never the query).
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum EndpointMatcher {
    Exact(String),
    Pattern { regex: Pattern },
}

impl EndpointMatcher {
    pub fn regex(pattern: &str) -> Result<Self, regex::Error> {
        Pattern::new(pattern).map(|regex| EndpointMatcher::Pattern { regex })
    }

    pub fn matches(&self, endpoint_url: &str) -> bool {
        match self {
            EndpointMatcher::Exact(url) => url == endpoint_url,
            EndpointMatcher::Pattern { regex } => regex.is_match(endpoint_url),
        }
    }
}

/// Caller-supplied predicate over a request.
#[derive(Clone)]
pub struct CustomPredicate(Arc<dyn Fn(&Request) -> bool + Send + Sync>);

impl CustomPredicate {
    pub fn new(f: impl Fn(&Request) -> bool + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }
}

impl fmt::Debug for CustomPredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("CustomPredicate(..)")
    }
}

/// Extra condition an adapter places on a request besides its endpoint URL.
///
/// Used to tell apart request shapes that share an endpoint, e.g. a JSON
/// body versus a form-encoded body.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum RequestPredicate {
    ContentStartsWith { prefix: String },
    ContentMatches { regex: Pattern },
    HeaderEquals { name: String, value: String },
    HeaderPresent { name: String },
    MethodIs { method: String },
    QueryContains { needle: String },
    All { of: Vec<RequestPredicate> },
    Any { of: Vec<RequestPredicate> },
    Not { predicate: Box<RequestPredicate> },
    #[serde(skip)]
    Custom(CustomPredicate),
}

impl RequestPredicate {
    pub fn custom(f: impl Fn(&Request) -> bool + Send + Sync + 'static) -> Self {
        RequestPredicate::Custom(CustomPredicate::new(f))
    }

    pub fn accepts(&self, request: &Request) -> bool {
        match self {
            RequestPredicate::ContentStartsWith { prefix } => request
                .content
                .as_deref()
                .is_some_and(|c| c.starts_with(prefix.as_str())),
            RequestPredicate::ContentMatches { regex } => request
                .content
                .as_deref()
                .is_some_and(|c| regex.is_match(c)),
            RequestPredicate::HeaderEquals { name, value } => {
                request.header(name).is_some_and(|v| v == value)
            }
            RequestPredicate::HeaderPresent { name } => request.header(name).is_some(),
            RequestPredicate::MethodIs { method } => request.method.eq_ignore_ascii_case(method),
            RequestPredicate::QueryContains { needle } => request
                .query_string()
                .is_some_and(|q| q.contains(needle.as_str())),
            RequestPredicate::All { of } => of.iter().all(|p| p.accepts(request)),
            RequestPredicate::Any { of } => of.iter().any(|p| p.accepts(request)),
            RequestPredicate::Not { predicate } => !predicate.accepts(request),
            RequestPredicate::Custom(f) => (f.0)(request),
        }
    }
}

/// Sentinel check on an extracted value: literal equality or a pattern.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ValuePredicate {
    Equals(String),
    Pattern { regex: Pattern },
}

impl ValuePredicate {
    pub fn matches(&self, value: &str) -> bool {
        match self {
            ValuePredicate::Equals(expected) => expected == value,
            ValuePredicate::Pattern { regex } => regex.is_match(value),
        }
    }
}

/// Where one property's value lives in the decoded tree.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataPath {
    pub context: Context,
    pub path: JsonPath,
    pub reasoning: String,
    #[serde(default)]
    pub only_if: Option<ValuePredicate>,
    #[serde(default)]
    pub not_if: Option<ValuePredicate>,
}

impl DataPath {
    pub fn new(context: Context, path: JsonPath, reasoning: impl Into<String>) -> Self {
        Self {
            context,
            path,
            reasoning: reasoning.into(),
            only_if: None,
            not_if: None,
        }
    }
}

/// A decoding and extraction recipe for one request shape of one tracker.
#[derive(Debug, Clone)]
pub struct Adapter {
    pub tracker: Arc<Tracker>,
    pub slug: String,
    pub endpoint_urls: Vec<EndpointMatcher>,
    pub predicate: Option<RequestPredicate>,
    pub decoding_steps: Vec<DecodingStep>,
    /// In declaration order.
    pub contained_data_paths: Vec<(Property, Vec<DataPath>)>,
}

impl Adapter {
    pub fn new(tracker: Arc<Tracker>, slug: impl Into<String>) -> Self {
        Self {
            tracker,
            slug: slug.into(),
            endpoint_urls: Vec::new(),
            predicate: None,
            decoding_steps: Vec::new(),
            contained_data_paths: Vec::new(),
        }
    }

    /// `tracker-slug/adapter-slug`
    pub fn id(&self) -> String {
        format!("{}/{}", self.tracker.slug, self.slug)
    }

    /// Data paths declared for `property`.
    pub fn data_paths(&self, property: Property) -> &[DataPath] {
        self.contained_data_paths
            .iter()
            .find(|(declared, _)| *declared == property)
            .map_or(&[], |(_, paths)| paths.as_slice())
    }
}

/// One extracted value, with where it came from.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnnotatedMatch {
    /// `None` for matches found by indicator search rather than an adapter.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub adapter: Option<String>,
    pub property: Property,
    pub context: Context,
    pub path: String,
    pub reasoning: String,
    pub value: Value,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_endpoint_matchers() {
        let exact: EndpointMatcher = serde_json::from_value(json!("https://a.example/v1")).unwrap();
        assert!(exact.matches("https://a.example/v1"));
        assert!(!exact.matches("https://a.example/v1/x"));

        let pattern: EndpointMatcher =
            serde_json::from_value(json!({"regex": r"^https://[a-z]+\.a\.example/v\d+$"})).unwrap();
        assert!(pattern.matches("https://eu.a.example/v2"));
        assert!(!pattern.matches("https://eu.a.example/v2/extra"));
    }

    #[test]
    fn test_request_predicates() {
        let json_body: RequestPredicate =
            serde_json::from_value(json!({"kind": "contentStartsWith", "prefix": "{\""})).unwrap();
        let request = Request::new("https://x/").with_content(r#"{"a":1}"#);
        assert!(json_body.accepts(&request));
        assert!(!json_body.accepts(&Request::new("https://x/").with_content("a=1")));
        assert!(!json_body.accepts(&Request::new("https://x/")));

        let combined: RequestPredicate = serde_json::from_value(json!({
            "kind": "all",
            "of": [
                {"kind": "headerPresent", "name": "x-api-key"},
                {"kind": "not", "predicate": {"kind": "methodIs", "method": "GET"}}
            ]
        }))
        .unwrap();
        let mut post = Request::new("https://x/").with_header("X-Api-Key", "k");
        post.method = "POST".into();
        assert!(combined.accepts(&post));
        post.method = "get".into();
        assert!(!combined.accepts(&post));
    }

    #[test]
    fn test_custom_predicate() {
        let predicate = RequestPredicate::custom(|r| r.path.ends_with(".gif"));
        assert!(predicate.accepts(&Request::new("https://x/").with_path("/p.gif")));
        assert!(!predicate.accepts(&Request::new("https://x/").with_path("/p.png")));
    }

    #[test]
    fn test_value_predicates() {
        let literal: ValuePredicate = serde_json::from_value(json!("0")).unwrap();
        assert!(literal.matches("0"));
        assert!(!literal.matches("00"));

        let zeros: ValuePredicate =
            serde_json::from_value(json!({"regex": "^[0-]+$"})).unwrap();
        assert!(zeros.matches("00000000-0000-0000-0000-000000000000"));
        assert!(!zeros.matches("ea7c"));
    }

    #[test]
    fn test_data_path_deserialize() {
        let path: DataPath = serde_json::from_value(json!({
            "context": "body",
            "path": "device.id",
            "reasoning": "obvious property name",
            "notIf": "0"
        }))
        .unwrap();
        assert_eq!(path.context, Context::Body);
        assert_eq!(path.path.as_str(), "device.id");
        assert!(path.not_if.is_some() && path.only_if.is_none());
    }

    #[test]
    fn test_annotated_match_serialize_skips_missing_adapter() {
        let m = AnnotatedMatch {
            adapter: None,
            property: Property::AppId,
            context: Context::Query,
            path: "app".into(),
            reasoning: "indicator".into(),
            value: json!("com.example"),
        };
        let json = serde_json::to_value(&m).unwrap();
        assert!(json.get("adapter").is_none());
        assert_eq!(json["property"], json!("appId"));
    }
}
