//! Per-call request options and body encoding.

use flate2::write::GzEncoder;
use flate2::Compression;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::Method;
use serde::Serialize;
use serde_json::Value;
use std::io::Write;
use std::sync::Arc;
use url::Url;

use crate::error::{Error, Result};
use crate::load_balancer::Endpoint;
use crate::retry::Retrier;

/// Request payload.
#[derive(Debug, Clone, PartialEq)]
pub enum Body {
    /// Serialized as JSON.
    Json(Value),
    /// Sent verbatim. Used for NDJSON bulk bodies and pre-encoded JSON.
    Text(String),
    Bytes(Vec<u8>),
}

impl Body {
    /// Serialize any value into a JSON body.
    pub fn json<T: Serialize>(value: &T) -> Result<Self> {
        serde_json::to_value(value)
            .map(Body::Json)
            .map_err(|e| Error::Body(e.to_string()))
    }

    pub fn into_bytes(self) -> Result<Vec<u8>> {
        match self {
            Body::Json(value) => serde_json::to_vec(&value).map_err(|e| Error::Body(e.to_string())),
            Body::Text(text) => Ok(text.into_bytes()),
            Body::Bytes(bytes) => Ok(bytes),
        }
    }
}

impl From<Value> for Body {
    fn from(value: Value) -> Self {
        Body::Json(value)
    }
}

impl From<String> for Body {
    fn from(text: String) -> Self {
        Body::Text(text)
    }
}

impl From<&str> for Body {
    fn from(text: &str) -> Self {
        Body::Text(text.to_string())
    }
}

impl From<Vec<u8>> for Body {
    fn from(bytes: Vec<u8>) -> Self {
        Body::Bytes(bytes)
    }
}

/// Gzip-compress a request body.
pub fn gzip(data: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::with_capacity(data.len() / 2), Compression::default());
    encoder.write_all(data).map_err(|e| Error::Body(e.to_string()))?;
    encoder.finish().map_err(|e| Error::Body(e.to_string()))
}

/// Options for a single [`Client::perform_request`](crate::Client::perform_request) call.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    pub method: Method,
    /// Path relative to the endpoint base URL, e.g. `/_cluster/health`.
    pub path: String,
    pub params: Vec<(String, String)>,
    pub body: Option<Body>,
    pub content_type: Option<String>,
    /// Non-success statuses to treat as success for this call.
    pub ignore_errors: Vec<u16>,
    /// Overrides the client retrier for this call.
    pub retrier: Option<Arc<dyn Retrier>>,
    /// Overrides the client list of retryable status codes for this call.
    pub retry_status_codes: Option<Vec<u16>>,
    pub headers: HeaderMap,
    pub max_response_size: Option<u64>,
    /// Hand back the unread body instead of buffering it.
    pub stream: bool,
}

impl RequestOptions {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            ..Default::default()
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn head(path: impl Into<String>) -> Self {
        Self::new(Method::HEAD, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    pub fn param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push((key.into(), value.into()));
        self
    }

    pub fn body(mut self, body: impl Into<Body>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn ignore(mut self, status: u16) -> Self {
        self.ignore_errors.push(status);
        self
    }

    pub fn retrier(mut self, retrier: Arc<dyn Retrier>) -> Self {
        self.retrier = Some(retrier);
        self
    }

    pub fn retry_status_codes(mut self, codes: impl Into<Vec<u16>>) -> Self {
        self.retry_status_codes = Some(codes.into());
        self
    }

    /// Add a header. Invalid names or values are rejected.
    pub fn header(mut self, name: &str, value: &str) -> Result<Self> {
        let name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| Error::Body(e.to_string()))?;
        let value = HeaderValue::from_str(value).map_err(|e| Error::Body(e.to_string()))?;
        self.headers.append(name, value);
        Ok(self)
    }

    pub fn max_response_size(mut self, limit: u64) -> Self {
        self.max_response_size = Some(limit);
        self
    }

    pub fn stream(mut self, enabled: bool) -> Self {
        self.stream = enabled;
        self
    }

    /// Whether `status` counts as success for this call.
    pub fn accepts(&self, status: u16) -> bool {
        (200..300).contains(&status) || self.ignore_errors.contains(&status)
    }

    /// Resolve the full URL of this request against `endpoint`.
    pub fn url_for(&self, endpoint: &Endpoint) -> Result<Url> {
        let path = if self.path.starts_with('/') {
            self.path.clone()
        } else {
            format!("/{}", self.path)
        };
        let raw = format!("{}{}", endpoint.base(), path);
        let mut url = Url::parse(&raw).map_err(|source| Error::InvalidUrl { url: raw, source })?;
        if !self.params.is_empty() {
            url.query_pairs_mut().extend_pairs(self.params.iter());
        }
        Ok(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::read::GzDecoder;
    use serde_json::json;
    use std::io::Read;

    #[test]
    fn test_url_for() {
        let endpoint = Endpoint::new("n1", Url::parse("http://127.0.0.1:9200/prefix").unwrap());
        let opts = RequestOptions::get("_search")
            .param("q", "user:olivere")
            .param("pretty", "true");
        assert_eq!(
            opts.url_for(&endpoint).unwrap().as_str(),
            "http://127.0.0.1:9200/prefix/_search?q=user%3Aolivere&pretty=true"
        );

        let endpoint = Endpoint::new("n1", Url::parse("http://127.0.0.1:9200").unwrap());
        assert_eq!(
            RequestOptions::head("/").url_for(&endpoint).unwrap().as_str(),
            "http://127.0.0.1:9200/"
        );
    }

    #[test]
    fn test_accepts_ignore_list() {
        let opts = RequestOptions::get("/index/_doc/1").ignore(404);
        assert!(opts.accepts(200));
        assert!(opts.accepts(404));
        assert!(!opts.accepts(409));
    }

    #[test]
    fn test_body_encoding() {
        let body = Body::from(json!({"query": {"match_all": {}}}));
        assert_eq!(body.into_bytes().unwrap(), br#"{"query":{"match_all":{}}}"#.to_vec());

        let ndjson = "{\"index\":{}}\n{\"a\":1}\n";
        assert_eq!(Body::from(ndjson).into_bytes().unwrap(), ndjson.as_bytes());
    }

    #[test]
    fn test_gzip_roundtrip() {
        let compressed = gzip(b"{\"a\":1}").unwrap();
        let mut out = String::new();
        GzDecoder::new(&compressed[..]).read_to_string(&mut out).unwrap();
        assert_eq!(out, "{\"a\":1}");
    }

    #[test]
    fn test_invalid_header_rejected() {
        assert!(RequestOptions::get("/").header("bad header", "x").is_err());
        let opts = RequestOptions::get("/").header("X-Opaque-Id", "abc").unwrap();
        assert_eq!(opts.headers["x-opaque-id"], "abc");
    }
}
