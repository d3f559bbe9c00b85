//! Captured HTTP requests.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A header or cookie.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NameValue {
    pub name: String,
    pub value: String,
}

impl NameValue {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// One captured HTTP transaction, normalized.
///
/// `path` may still carry a `?query` suffix; the decoding state splits it
/// off. `content` is the raw body, binary payloads as a binary string.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Request {
    #[serde(default)]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub method: String,
    #[serde(default)]
    pub host: String,
    #[serde(default)]
    pub path: String,
    pub endpoint_url: String,
    #[serde(default)]
    pub query: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub headers: Vec<NameValue>,
    #[serde(default)]
    pub cookies: Vec<NameValue>,
}

impl Request {
    pub fn new(endpoint_url: impl Into<String>) -> Self {
        Self {
            endpoint_url: endpoint_url.into(),
            ..Self::default()
        }
    }

    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push(NameValue::new(name, value));
        self
    }

    pub fn with_cookie(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.cookies.push(NameValue::new(name, value));
        self
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    /// Path without any query suffix.
    pub fn path_only(&self) -> &str {
        self.path
            .split_once('?')
            .map_or(self.path.as_str(), |(path, _)| path)
    }

    /// The raw query string without `?`: the `query` field if set,
    /// otherwise whatever follows `?` in `path`.
    pub fn query_string(&self) -> Option<&str> {
        self.query
            .as_deref()
            .or_else(|| self.path.split_once('?').map(|(_, query)| query))
    }

    /// Last header with this name, compared case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .rev()
            .find(|h| h.name.eq_ignore_ascii_case(name))
            .map(|h| h.value.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_split_from_path() {
        let request = Request::new("https://t.example/collect").with_path("/collect?a=1&b=2");
        assert_eq!(request.path_only(), "/collect");
        assert_eq!(request.query_string(), Some("a=1&b=2"));
    }

    #[test]
    fn test_explicit_query_wins() {
        let mut request = Request::new("https://t.example/collect").with_path("/collect?a=1");
        request.query = Some("z=9".into());
        assert_eq!(request.query_string(), Some("z=9"));
    }

    #[test]
    fn test_header_lookup_is_case_insensitive_last_wins() {
        let request = Request::new("https://t.example/")
            .with_header("User-Agent", "first")
            .with_header("user-agent", "second");
        assert_eq!(request.header("USER-AGENT"), Some("second"));
        assert_eq!(request.header("accept"), None);
    }

    #[test]
    fn test_deserialize_minimal() {
        let request: Request = serde_json::from_str(
            r#"{"endpointUrl": "https://example.com/track", "content": "{}"}"#,
        )
        .unwrap();
        assert_eq!(request.endpoint_url, "https://example.com/track");
        assert_eq!(request.content.as_deref(), Some("{}"));
        assert!(request.headers.is_empty());
    }
}
