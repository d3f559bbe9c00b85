//! HAR ingestion.
//!
//! Flattens a HAR 1.2 capture into one [`Request`] per entry.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use url::Url;

use crate::binary::bytes_to_binary_string;
use crate::error::HarError;
use crate::model::{NameValue, Request};
use crate::pipeline::steps::decode_base64;

#[derive(Debug, Clone, Deserialize)]
pub struct Har {
    pub log: HarLog,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HarLog {
    #[serde(default)]
    pub entries: Vec<HarEntry>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HarEntry {
    #[serde(default)]
    pub started_date_time: Option<String>,
    pub request: HarRequest,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HarRequest {
    pub method: String,
    pub url: String,
    #[serde(default)]
    pub headers: Vec<NameValue>,
    #[serde(default)]
    pub cookies: Vec<NameValue>,
    #[serde(default)]
    pub post_data: Option<HarPostData>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HarPostData {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub encoding: Option<String>,
}

impl Har {
    pub fn from_json(json: &str) -> Result<Self, HarError> {
        Ok(serde_json::from_str(json)?)
    }

    /// All entries as requests, in capture order.
    pub fn requests(&self) -> Result<Vec<Request>, HarError> {
        self.log
            .entries
            .iter()
            .enumerate()
            .map(|(index, entry)| entry.to_request(index))
            .collect()
    }
}

impl HarEntry {
    pub fn to_request(&self, index: usize) -> Result<Request, HarError> {
        let request = &self.request;
        let url = Url::parse(&request.url).map_err(|source| HarError::Url {
            url: request.url.clone(),
            source,
        })?;

        let host = url.host_str().unwrap_or_default().to_string();
        let authority = match url.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.clone(),
        };
        let endpoint_url = format!("{}://{}{}", url.scheme(), authority, url.path());

        let content = match &request.post_data {
            Some(HarPostData {
                text: Some(text),
                encoding,
                ..
            }) => Some(if encoding.as_deref() == Some("base64") {
                decode_base64(text)
                    .map(|bytes| bytes_to_binary_string(&bytes))
                    .map_err(|source| HarError::Body { entry: index, source })?
            } else {
                text.clone()
            }),
            _ => None,
        };

        let start_time = self
            .started_date_time
            .as_deref()
            .and_then(|ts| DateTime::parse_from_rfc3339(ts).ok())
            .map(|dt| dt.with_timezone(&Utc));

        Ok(Request {
            start_time,
            method: request.method.clone(),
            host,
            path: url.path().to_string(),
            endpoint_url,
            query: url.query().map(str::to_string),
            content,
            headers: request.headers.clone(),
            cookies: request.cookies.clone(),
        })
    }
}

/// Parse a HAR document into requests.
pub fn parse_har(json: &str) -> Result<Vec<Request>, HarError> {
    Har::from_json(json)?.requests()
}
