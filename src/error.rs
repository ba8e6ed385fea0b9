//! Error taxonomy for the client.
//!
//! Every terminal error returned by the client is one of the [`Error`]
//! variants below. Callers should branch on [`Error::kind`] rather than on
//! message text to tell "cluster unreachable" apart from "this request was
//! rejected".

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use thiserror::Error;

use crate::config::validation::ValidationError;
use crate::transport::response::Response;

/// Errors that can occur while talking to the cluster.
#[derive(Debug, Error)]
pub enum Error {
    /// Every tracked endpoint is dead, or the pool is empty.
    #[error("no Elasticsearch node available: {0}")]
    NoEndpoint(String),

    /// DNS, connect, TLS or I/O failure.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The caller's context was canceled.
    #[error("context canceled")]
    Cancelled,

    /// The caller's context deadline passed.
    #[error("context deadline exceeded")]
    DeadlineExceeded,

    /// Elasticsearch answered with a status outside the success range.
    /// The partially built response is kept when the body could be read.
    #[error("{error}")]
    Response {
        error: ResponseError,
        response: Option<Box<Response>>,
    },

    /// The retry policy declined further attempts after at least one retry.
    #[error("cannot connect after {attempts} attempts: {last}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        last: Box<Error>,
    },

    /// The retry policy aborted with an unrecoverable error.
    #[error("retry aborted: {0}")]
    Fatal(Box<dyn std::error::Error + Send + Sync>),

    /// The client configuration was rejected.
    #[error("invalid configuration: {}", join_validation(.0))]
    Config(Vec<ValidationError>),

    /// A URL could not be parsed.
    #[error("invalid URL {url:?}: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    /// A response body could not be decoded.
    #[error("cannot decode response: {0}")]
    Decode(String),

    /// A request body could not be encoded.
    #[error("cannot encode request body: {0}")]
    Body(String),

    /// The response body is larger than the configured maximum.
    #[error("response body exceeds {limit} bytes")]
    ResponseTooLarge { limit: u64 },

    /// Plugins required by the caller are not installed on any node.
    #[error("required plugins missing: {}", .0.join(", "))]
    MissingPlugins(Vec<String>),
}

/// Coarse classification of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NoEndpoint,
    Transport,
    Cancelled,
    Response,
    RetriesExhausted,
    Fatal,
    Config,
    Decode,
}

/// Result type for client operations.
pub type Result<T> = std::result::Result<T, Error>;

pub(crate) fn join_validation(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

impl Error {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::NoEndpoint(_) => ErrorKind::NoEndpoint,
            Error::Transport(_) => ErrorKind::Transport,
            Error::Cancelled | Error::DeadlineExceeded => ErrorKind::Cancelled,
            Error::Response { .. } | Error::ResponseTooLarge { .. } => ErrorKind::Response,
            Error::RetriesExhausted { .. } => ErrorKind::RetriesExhausted,
            Error::Fatal(_) => ErrorKind::Fatal,
            Error::Config(_) | Error::InvalidUrl { .. } | Error::MissingPlugins(_) => {
                ErrorKind::Config
            }
            Error::Decode(_) | Error::Body(_) => ErrorKind::Decode,
        }
    }

    /// Build an application error from a buffered response, keeping the
    /// response as the partial result.
    pub(crate) fn from_response(response: Response) -> Self {
        Error::Response {
            error: ResponseError::from_body(response.status.as_u16(), &response.body),
            response: Some(Box::new(response)),
        }
    }

    /// True if the error stems from a canceled context or an expired deadline.
    pub fn is_context_error(&self) -> bool {
        match self {
            Error::Cancelled | Error::DeadlineExceeded => true,
            Error::RetriesExhausted { last, .. } => last.is_context_error(),
            _ => false,
        }
    }

    /// True if no node could be selected, including after exhausted retries.
    pub fn is_no_endpoint(&self) -> bool {
        match self {
            Error::NoEndpoint(_) => true,
            Error::RetriesExhausted { last, .. } => last.is_no_endpoint(),
            _ => false,
        }
    }

    /// HTTP status of an application error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Response { error, .. } => Some(error.status),
            Error::RetriesExhausted { last, .. } => last.status(),
            _ => None,
        }
    }

    /// True if Elasticsearch rejected the credentials.
    pub fn is_unauthorized(&self) -> bool {
        self.status() == Some(StatusCode::UNAUTHORIZED.as_u16())
    }

    /// The partial response attached to an application error.
    pub fn response(&self) -> Option<&Response> {
        match self {
            Error::Response { response, .. } => response.as_deref(),
            Error::RetriesExhausted { last, .. } => last.response(),
            _ => None,
        }
    }
}

/// Returns the reason Elasticsearch reported for an application error.
pub fn error_reason(err: &Error) -> Option<&str> {
    match err {
        Error::Response { error, .. } => error
            .details
            .as_ref()
            .map(|d| d.reason.as_str())
            .filter(|r| !r.is_empty()),
        Error::RetriesExhausted { last, .. } => error_reason(last),
        _ => None,
    }
}

/// Error body as returned by Elasticsearch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResponseError {
    #[serde(default)]
    pub status: u16,
    #[serde(rename = "error", default, skip_serializing_if = "Option::is_none")]
    pub details: Option<ErrorDetails>,
}

impl ResponseError {
    /// Parse an error body, falling back to the bare status when the body
    /// is empty or not in the expected shape.
    pub fn from_body(status: u16, body: &[u8]) -> Self {
        let fallback = Self { status, details: None };
        if body.is_empty() {
            return fallback;
        }
        match serde_json::from_slice::<ResponseError>(body) {
            Ok(mut parsed) => {
                if parsed.status == 0 {
                    parsed.status = status;
                }
                parsed
            }
            Err(_) => fallback,
        }
    }
}

impl fmt::Display for ResponseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = StatusCode::from_u16(self.status)
            .ok()
            .and_then(|s| s.canonical_reason())
            .unwrap_or("");
        match &self.details {
            Some(d) if !d.reason.is_empty() => write!(
                f,
                "elastic: Error {} ({}): {} [type={}]",
                self.status, text, d.reason, d.kind
            ),
            _ => write!(f, "elastic: Error {} ({})", self.status, text),
        }
    }
}

/// Structured error details.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ErrorDetails {
    #[serde(rename = "type")]
    pub kind: String,
    pub reason: String,
    #[serde(rename = "resource.type", skip_serializing_if = "String::is_empty")]
    pub resource_type: String,
    #[serde(rename = "resource.id", skip_serializing_if = "String::is_empty")]
    pub resource_id: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub index: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub phase: String,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub grouped: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub caused_by: Option<Map<String, Value>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub root_cause: Vec<ErrorDetails>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub suppressed: Vec<ErrorDetails>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub failed_shards: Vec<Map<String, Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub header: Option<Map<String, Value>>,

    // Script exceptions
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub script_stack: Vec<String>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub script: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub lang: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<ScriptErrorPosition>,
}

/// Position of an error inside a script.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptErrorPosition {
    pub offset: i64,
    pub start: i64,
    pub end: i64,
}
