//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate URLs and schemes
//! - Validate value ranges (timeouts > 0 when a check is enabled)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ClientConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the client

use std::fmt;
use url::Url;

use crate::config::schema::ClientConfig;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path of the offending field.
    pub field: String,
    /// What is wrong with it.
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validate a configuration, collecting every problem found.
pub fn validate_config(config: &ClientConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    for (i, raw) in config.urls.iter().enumerate() {
        match Url::parse(raw) {
            Ok(url) if url.scheme() != "http" && url.scheme() != "https" => {
                errors.push(ValidationError::new(
                    format!("urls[{i}]"),
                    format!("unsupported scheme {:?} in {raw}", url.scheme()),
                ));
            }
            Ok(url) if url.host_str().is_none() => {
                errors.push(ValidationError::new(format!("urls[{i}]"), format!("missing host in {raw}")));
            }
            Ok(_) => {}
            Err(e) => {
                errors.push(ValidationError::new(format!("urls[{i}]"), format!("{raw}: {e}")));
            }
        }
    }

    if config.scheme != "http" && config.scheme != "https" {
        errors.push(ValidationError::new("scheme", "must be http or https"));
    }

    let hc = &config.healthcheck;
    if hc.enabled {
        if hc.timeout_startup_ms == 0 {
            errors.push(ValidationError::new("healthcheck.timeout_startup_ms", "must be greater than 0"));
        }
        if hc.timeout_ms == 0 {
            errors.push(ValidationError::new("healthcheck.timeout_ms", "must be greater than 0"));
        }
        if hc.interval_ms == 0 {
            errors.push(ValidationError::new("healthcheck.interval_ms", "must be greater than 0"));
        }
    }

    let sn = &config.sniffer;
    if sn.enabled {
        if sn.timeout_startup_ms == 0 {
            errors.push(ValidationError::new("sniffer.timeout_startup_ms", "must be greater than 0"));
        }
        if sn.timeout_ms == 0 {
            errors.push(ValidationError::new("sniffer.timeout_ms", "must be greater than 0"));
        }
        if sn.interval_ms == 0 {
            errors.push(ValidationError::new("sniffer.interval_ms", "must be greater than 0"));
        }
    }

    let method = config.send_get_body_as.to_ascii_uppercase();
    if method != "GET" && method != "POST" {
        errors.push(ValidationError::new("send_get_body_as", "must be GET or POST"));
    }

    let retries = &config.retries;
    if retries.base_delay_ms > retries.max_delay_ms {
        errors.push(ValidationError::new(
            "retries.base_delay_ms",
            "must not exceed retries.max_delay_ms",
        ));
    }
    for code in &retries.status_codes {
        if !(100..=599).contains(code) {
            errors.push(ValidationError::new(
                "retries.status_codes",
                format!("{code} is not an HTTP status code"),
            ));
        }
    }

    for name in config.headers.keys() {
        if reqwest::header::HeaderName::from_bytes(name.as_bytes()).is_err() {
            errors.push(ValidationError::new("headers", format!("invalid header name {name:?}")));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&ClientConfig::default()).is_ok());
        assert!(validate_config(&ClientConfig::simple()).is_ok());
    }

    #[test]
    fn test_collects_all_errors() {
        let mut config = ClientConfig::default();
        config.urls = vec!["ftp://127.0.0.1:9200".into(), "not a url".into()];
        config.scheme = "gopher".into();
        config.healthcheck.interval_ms = 0;
        config.send_get_body_as = "PUT".into();
        config.retries.status_codes = vec![503, 42];

        let errors = validate_config(&config).unwrap_err();
        let fields: Vec<_> = errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(
            fields,
            vec![
                "urls[0]",
                "urls[1]",
                "scheme",
                "healthcheck.interval_ms",
                "send_get_body_as",
                "retries.status_codes",
            ]
        );
    }

    #[test]
    fn test_disabled_checks_skip_interval_validation() {
        let mut config = ClientConfig::simple();
        config.healthcheck.interval_ms = 0;
        config.sniffer.timeout_ms = 0;
        assert!(validate_config(&config).is_ok());
    }
}
