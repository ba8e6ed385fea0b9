//! Responses, body decoding and deprecation warnings.

use reqwest::header::{HeaderMap, WARNING};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::fmt::Debug;
use std::sync::Arc;
use url::Url;

use crate::error::{Error, Result};

/// Decodes response bodies into JSON values.
pub trait Decoder: Send + Sync + Debug {
    fn decode(&self, data: &[u8]) -> Result<Value>;
}

/// Decoder backed by `serde_json`.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultDecoder;

impl Decoder for DefaultDecoder {
    fn decode(&self, data: &[u8]) -> Result<Value> {
        serde_json::from_slice(data).map_err(|e| Error::Decode(e.to_string()))
    }
}

/// Deprecation warnings attached to one response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeprecationWarning {
    pub method: Method,
    pub url: String,
    pub warnings: Vec<String>,
}

/// Collect the `Warning` header values of a response.
pub fn warnings(headers: &HeaderMap) -> Vec<String> {
    headers
        .get_all(WARNING)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .map(str::to_string)
        .collect()
}

/// A response from Elasticsearch.
#[derive(Debug)]
pub struct Response {
    pub url: Url,
    pub status: StatusCode,
    pub headers: HeaderMap,
    /// Buffered body. Empty for streaming responses.
    pub body: Vec<u8>,
    stream: Option<reqwest::Response>,
    decoder: Arc<dyn Decoder>,
}

impl Response {
    pub(crate) fn buffered(
        url: Url,
        status: StatusCode,
        headers: HeaderMap,
        body: Vec<u8>,
        decoder: Arc<dyn Decoder>,
    ) -> Self {
        Self {
            url,
            status,
            headers,
            body,
            stream: None,
            decoder,
        }
    }

    pub(crate) fn streaming(url: Url, inner: reqwest::Response, decoder: Arc<dyn Decoder>) -> Self {
        Self {
            url,
            status: inner.status(),
            headers: inner.headers().clone(),
            body: Vec::new(),
            stream: Some(inner),
            decoder,
        }
    }

    /// Decode the body into `T` using the configured decoder.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T> {
        let value = self.decoder.decode(&self.body)?;
        serde_json::from_value(value).map_err(|e| Error::Decode(e.to_string()))
    }

    /// Decode the body into a JSON value.
    pub fn json(&self) -> Result<Value> {
        self.decoder.decode(&self.body)
    }

    /// The body as text, with invalid UTF-8 replaced.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Deprecation warnings sent by the node.
    pub fn deprecations(&self) -> Vec<String> {
        warnings(&self.headers)
    }

    pub fn is_streaming(&self) -> bool {
        self.stream.is_some()
    }

    /// Take the unread body of a streaming response.
    pub fn into_stream(self) -> Option<reqwest::Response> {
        self.stream
    }
}

/// Read a whole body, enforcing an optional size limit.
pub(crate) async fn read_body(mut res: reqwest::Response, limit: Option<u64>) -> Result<Vec<u8>> {
    if let (Some(limit), Some(len)) = (limit, res.content_length()) {
        if len > limit {
            return Err(Error::ResponseTooLarge { limit });
        }
    }
    let mut body = Vec::new();
    while let Some(chunk) = res.chunk().await? {
        body.extend_from_slice(&chunk);
        if let Some(limit) = limit {
            if body.len() as u64 > limit {
                return Err(Error::ResponseTooLarge { limit });
            }
        }
    }
    Ok(body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    struct Health {
        cluster_name: String,
        number_of_nodes: u32,
    }

    fn response(body: &str) -> Response {
        Response::buffered(
            Url::parse("http://127.0.0.1:9200/_cluster/health").unwrap(),
            StatusCode::OK,
            HeaderMap::new(),
            body.as_bytes().to_vec(),
            Arc::new(DefaultDecoder),
        )
    }

    #[test]
    fn test_decode() {
        let resp = response(r#"{"cluster_name":"elasticsearch","number_of_nodes":3,"status":"green"}"#);
        let health: Health = resp.decode().unwrap();
        assert_eq!(health.cluster_name, "elasticsearch");
        assert_eq!(health.number_of_nodes, 3);
        assert_eq!(resp.json().unwrap()["status"], "green");
        assert!(!resp.is_streaming());
    }

    #[test]
    fn test_decode_error() {
        let resp = response("not json");
        assert!(matches!(resp.decode::<Health>(), Err(Error::Decode(_))));
        assert_eq!(resp.text(), "not json");
    }

    #[derive(Debug)]
    struct Constant;

    impl Decoder for Constant {
        fn decode(&self, _data: &[u8]) -> Result<Value> {
            Ok(serde_json::json!({"cluster_name": "fixed", "number_of_nodes": 1}))
        }
    }

    #[test]
    fn test_custom_decoder() {
        let resp = Response::buffered(
            Url::parse("http://127.0.0.1:9200/").unwrap(),
            StatusCode::OK,
            HeaderMap::new(),
            Vec::new(),
            Arc::new(Constant),
        );
        assert_eq!(resp.decode::<Health>().unwrap().cluster_name, "fixed");
    }

    #[test]
    fn test_warnings() {
        let mut headers = HeaderMap::new();
        headers.append(WARNING, HeaderValue::from_static("299 Elasticsearch \"old api\""));
        headers.append(WARNING, HeaderValue::from_static("299 Elasticsearch \"older api\""));
        assert_eq!(warnings(&headers).len(), 2);
        assert!(warnings(&HeaderMap::new()).is_empty());
    }
}
