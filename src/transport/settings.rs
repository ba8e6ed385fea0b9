//! Runtime client settings.
//!
//! [`ClientSettings`] is the validated, ready-to-use form of a
//! [`ClientConfig`] plus the collaborators that cannot be serialized
//! (retrier, decoder, deprecation hook). The client keeps it behind an
//! `ArcSwap`; every call and every probe works on one snapshot.

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_ENCODING, CONTENT_TYPE, USER_AGENT};
use reqwest::{Method, RequestBuilder};
use std::fmt;
use std::sync::Arc;
use url::Url;

use crate::config::validation::{validate_config, ValidationError};
use crate::config::{BasicAuthConfig, ClientConfig, HealthcheckConfig, SnifferConfig};
use crate::error::{Error, Result};
use crate::retry::{retrier, Retrier};
use crate::transport::response::{Decoder, DefaultDecoder, DeprecationWarning};

/// User agent sent when the caller did not provide one.
pub fn default_user_agent() -> String {
    format!(
        "elastic-client/{} ({}-{})",
        env!("CARGO_PKG_VERSION"),
        std::env::consts::OS,
        std::env::consts::ARCH
    )
}

/// Callback invoked for responses carrying deprecation warnings.
#[derive(Clone)]
pub struct DeprecationHook(Arc<dyn Fn(&DeprecationWarning) + Send + Sync>);

impl DeprecationHook {
    pub fn new(f: impl Fn(&DeprecationWarning) + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }

    pub fn call(&self, warning: &DeprecationWarning) {
        (self.0)(warning)
    }
}

impl fmt::Debug for DeprecationHook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("DeprecationHook")
    }
}

/// Validated runtime settings shared by executor, health checker and sniffer.
#[derive(Debug, Clone)]
pub struct ClientSettings {
    pub urls: Vec<Url>,
    pub scheme: String,
    pub basic_auth: Option<BasicAuthConfig>,
    pub healthcheck: HealthcheckConfig,
    pub sniffer: SnifferConfig,
    pub gzip: bool,
    pub send_get_body_as: Method,
    pub headers: HeaderMap,
    pub retrier: Arc<dyn Retrier>,
    pub retry_status_codes: Vec<u16>,
    pub required_plugins: Vec<String>,
    pub decoder: Arc<dyn Decoder>,
    pub trace_bodies: bool,
    pub deprecation_hook: Option<DeprecationHook>,
}

impl ClientSettings {
    /// Validate `config` and turn it into runtime settings.
    pub fn from_config(config: &ClientConfig) -> Result<Self> {
        validate_config(config).map_err(Error::Config)?;

        let mut basic_auth = config.basic_auth.clone();
        let mut urls = Vec::with_capacity(config.urls.len());
        for raw in &config.urls {
            let (url, credentials) = canonicalize(raw)?;
            if basic_auth.is_none() {
                basic_auth = credentials;
            }
            if !urls.contains(&url) {
                urls.push(url);
            }
        }
        if urls.is_empty() {
            let (url, _) = canonicalize(crate::config::schema::DEFAULT_URL)?;
            urls.push(url);
        }

        let mut headers = HeaderMap::new();
        for (name, value) in &config.headers {
            let name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| {
                Error::Config(vec![ValidationError {
                    field: "headers".into(),
                    message: format!("{name:?}: {e}"),
                }])
            })?;
            let value = HeaderValue::from_str(value).map_err(|e| {
                Error::Config(vec![ValidationError {
                    field: format!("headers.{name}"),
                    message: e.to_string(),
                }])
            })?;
            headers.append(name, value);
        }

        let send_get_body_as = Method::from_bytes(config.send_get_body_as.to_ascii_uppercase().as_bytes())
            .map_err(|e| {
                Error::Config(vec![ValidationError {
                    field: "send_get_body_as".into(),
                    message: e.to_string(),
                }])
            })?;

        Ok(Self {
            urls,
            scheme: config.scheme.clone(),
            basic_auth,
            healthcheck: config.healthcheck.clone(),
            sniffer: config.sniffer.clone(),
            gzip: config.gzip,
            send_get_body_as,
            headers,
            retrier: retrier::from_config(&config.retries),
            retry_status_codes: config.retries.status_codes.clone(),
            required_plugins: config.required_plugins.clone(),
            decoder: Arc::new(DefaultDecoder),
            trace_bodies: config.observability.trace_bodies,
            deprecation_hook: None,
        })
    }

    /// Assemble the headers of one request: per-call headers first, then
    /// the default headers, then a user agent if none was given.
    pub fn request_headers(&self, per_call: &HeaderMap, content_type: Option<&str>, gzip: bool) -> HeaderMap {
        let mut headers = HeaderMap::new();
        if let Some(ct) = content_type.and_then(|ct| HeaderValue::from_str(ct).ok()) {
            headers.insert(CONTENT_TYPE, ct);
        }
        for (name, value) in per_call {
            headers.append(name.clone(), value.clone());
        }
        for (name, value) in &self.headers {
            headers.append(name.clone(), value.clone());
        }
        if !headers.contains_key(USER_AGENT) {
            if let Ok(ua) = HeaderValue::from_str(&default_user_agent()) {
                headers.insert(USER_AGENT, ua);
            }
        }
        if gzip {
            headers.insert(CONTENT_ENCODING, HeaderValue::from_static("gzip"));
        }
        headers
    }

    /// Apply basic auth, if configured.
    pub fn authorize(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.basic_auth {
            Some(auth) => builder.basic_auth(&auth.username, Some(&auth.password)),
            None => builder,
        }
    }
}

/// Normalise a seed URL: drop query, fragment and trailing slashes, and
/// split off embedded credentials.
pub fn canonicalize(raw: &str) -> Result<(Url, Option<BasicAuthConfig>)> {
    let mut url = Url::parse(raw).map_err(|source| Error::InvalidUrl {
        url: raw.to_string(),
        source,
    })?;

    let credentials = if url.username().is_empty() && url.password().is_none() {
        None
    } else {
        Some(BasicAuthConfig {
            username: url.username().to_string(),
            password: url.password().unwrap_or_default().to_string(),
        })
    };
    // Only URLs with a host can carry credentials or address a node.
    if url.set_username("").and_then(|_| url.set_password(None)).is_err() {
        return Err(Error::InvalidUrl {
            url: raw.to_string(),
            source: url::ParseError::EmptyHost,
        });
    }
    url.set_query(None);
    url.set_fragment(None);
    let path = url.path().trim_end_matches('/').to_string();
    url.set_path(&path);

    Ok((url, credentials))
}
