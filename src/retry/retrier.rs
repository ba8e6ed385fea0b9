//! Retry policies.
//!
//! # Responsibilities
//! - Decide per failed attempt whether to retry and how long to wait
//! - Allow a policy to abort the whole call with a fatal error
//!
//! # Design Decisions
//! - The default policy never retries
//! - Status-code driven retries reuse the same policy call as transport errors

use reqwest::{Method, StatusCode};
use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;

use crate::config::RetryConfig;
use crate::error::{Error, Result};
use crate::lifecycle::Context;
use crate::retry::backoff::{Backoff, ExponentialBackoff};

/// The request that failed.
#[derive(Debug, Clone, Copy)]
pub struct RequestInfo<'a> {
    pub method: &'a Method,
    pub url: &'a str,
}

/// Everything known about a failed attempt.
#[derive(Debug, Clone, Copy)]
pub struct Attempt<'a> {
    /// Number of failed attempts so far, starting at 1.
    pub number: u32,
    /// `None` when no endpoint could be selected.
    pub request: Option<RequestInfo<'a>>,
    /// Status of the response, when the node answered.
    pub status: Option<StatusCode>,
    /// Transport or selection error, when there was one.
    pub error: Option<&'a Error>,
}

/// Outcome of a retry decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Wait for the given duration, then try again.
    Retry(Duration),
    /// Give up and return the failure to the caller.
    Stop,
}

/// Strategy deciding whether and when to retry a failed attempt.
///
/// Returning `Err` aborts the call immediately with that error.
pub trait Retrier: Send + Sync + Debug {
    fn retry(&self, ctx: &Context, attempt: &Attempt<'_>) -> Result<RetryDecision>;
}

/// A retrier that never retries.
#[derive(Debug, Clone, Copy, Default)]
pub struct StopRetrier;

impl StopRetrier {
    pub fn new() -> Self {
        Self
    }
}

impl Retrier for StopRetrier {
    fn retry(&self, _ctx: &Context, _attempt: &Attempt<'_>) -> Result<RetryDecision> {
        Ok(RetryDecision::Stop)
    }
}

/// A retrier driven by a [`Backoff`] strategy.
#[derive(Debug, Clone)]
pub struct BackoffRetrier {
    backoff: Arc<dyn Backoff>,
    max_retries: Option<u32>,
}

impl BackoffRetrier {
    pub fn new(backoff: impl Backoff + 'static) -> Self {
        Self {
            backoff: Arc::new(backoff),
            max_retries: None,
        }
    }

    /// Stop after `max` retries even if the backoff would continue.
    pub fn with_max_retries(mut self, max: u32) -> Self {
        self.max_retries = Some(max);
        self
    }
}

impl Retrier for BackoffRetrier {
    fn retry(&self, _ctx: &Context, attempt: &Attempt<'_>) -> Result<RetryDecision> {
        if matches!(self.max_retries, Some(max) if attempt.number > max) {
            return Ok(RetryDecision::Stop);
        }
        Ok(match self.backoff.next(attempt.number) {
            Some(wait) => RetryDecision::Retry(wait),
            None => RetryDecision::Stop,
        })
    }
}

/// Build the retrier described by a [`RetryConfig`].
pub fn from_config(config: &RetryConfig) -> Arc<dyn Retrier> {
    if config.max_retries == 0 {
        return Arc::new(StopRetrier);
    }
    let backoff = ExponentialBackoff::new(
        Duration::from_millis(config.base_delay_ms),
        Duration::from_millis(config.max_delay_ms),
    );
    Arc::new(BackoffRetrier::new(backoff).with_max_retries(config.max_retries))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retry::backoff::SimpleBackoff;

    fn attempt(number: u32) -> Attempt<'static> {
        Attempt {
            number,
            request: None,
            status: None,
            error: None,
        }
    }

    #[test]
    fn test_stop_retrier() {
        let ctx = Context::background();
        assert_eq!(StopRetrier.retry(&ctx, &attempt(1)).unwrap(), RetryDecision::Stop);
    }

    #[test]
    fn test_backoff_retrier_follows_backoff() {
        let ctx = Context::background();
        let r = BackoffRetrier::new(SimpleBackoff::new(vec![5, 10]));
        assert_eq!(r.retry(&ctx, &attempt(1)).unwrap(), RetryDecision::Retry(Duration::from_millis(5)));
        assert_eq!(r.retry(&ctx, &attempt(2)).unwrap(), RetryDecision::Retry(Duration::from_millis(10)));
        assert_eq!(r.retry(&ctx, &attempt(3)).unwrap(), RetryDecision::Stop);
    }

    #[test]
    fn test_max_retries_caps_unbounded_backoff() {
        let ctx = Context::background();
        let config = RetryConfig {
            max_retries: 2,
            base_delay_ms: 1,
            max_delay_ms: 1,
            status_codes: vec![],
        };
        let r = from_config(&config);
        assert!(matches!(r.retry(&ctx, &attempt(2)).unwrap(), RetryDecision::Retry(_)));
        assert_eq!(r.retry(&ctx, &attempt(3)).unwrap(), RetryDecision::Stop);

        let none = from_config(&RetryConfig::default());
        assert_eq!(none.retry(&ctx, &attempt(1)).unwrap(), RetryDecision::Stop);
    }
}
