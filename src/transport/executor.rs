//! Request execution with endpoint selection and retries.
//!
//! # Responsibilities
//! - Pick a live node for every attempt
//! - Consult the retry policy on selection failures, transport errors and
//!   retryable statuses
//! - Update node liveness from the outcome
//! - Turn non-success statuses into application errors

use arc_swap::ArcSwap;
use reqwest::header::HeaderMap;
use reqwest::{Method, StatusCode};
use std::sync::Arc;
use std::time::Instant;

use crate::error::{Error, Result};
use crate::health::HealthChecker;
use crate::lifecycle::Context;
use crate::load_balancer::EndpointPool;
use crate::observability::logging::TRACE_TARGET;
use crate::observability::metrics;
use crate::retry::{Attempt, RequestInfo, Retrier, RetryDecision};
use crate::transport::request::{gzip, RequestOptions};
use crate::transport::response::{read_body, warnings, DeprecationWarning, Response};
use crate::transport::ClientSettings;

/// Executes logical calls against the pool.
#[derive(Debug, Clone)]
pub struct Executor {
    pool: Arc<EndpointPool>,
    settings: Arc<ArcSwap<ClientSettings>>,
    http: reqwest::Client,
    health: HealthChecker,
}

/// Retry bookkeeping for one logical call.
#[derive(Debug, Default)]
struct Attempts {
    failed: u32,
    retried: u32,
}

impl Attempts {
    /// Wrap the final error once at least one retry happened.
    fn give_up(&self, err: Error) -> Error {
        if self.retried > 0 {
            Error::RetriesExhausted {
                attempts: self.failed,
                last: Box::new(err),
            }
        } else {
            err
        }
    }
}

impl Executor {
    pub fn new(
        pool: Arc<EndpointPool>,
        settings: Arc<ArcSwap<ClientSettings>>,
        http: reqwest::Client,
        health: HealthChecker,
    ) -> Self {
        Self {
            pool,
            settings,
            http,
            health,
        }
    }

    /// Perform one logical call, retrying per policy.
    pub async fn perform(&self, ctx: &Context, opts: RequestOptions) -> Result<Response> {
        let start = Instant::now();
        let method = opts.method.clone();
        let result = self.execute(ctx, opts).await;

        let status = match &result {
            Ok(resp) => resp.status.as_u16(),
            Err(e) => e.status().unwrap_or(0),
        };
        metrics::record_request(method.as_str(), status, start);
        if let Ok(resp) = &result {
            tracing::info!(
                "{} {} [status:{}, request:{:.3}s]",
                method,
                resp.url,
                status,
                start.elapsed().as_secs_f64()
            );
        }
        result
    }

    async fn execute(&self, ctx: &Context, mut opts: RequestOptions) -> Result<Response> {
        let settings = self.settings.load_full();
        let retrier: Arc<dyn Retrier> = opts.retrier.clone().unwrap_or_else(|| settings.retrier.clone());
        let retry_codes = opts
            .retry_status_codes
            .clone()
            .unwrap_or_else(|| settings.retry_status_codes.clone());

        let mut method = opts.method.clone();
        if method == Method::GET && opts.body.is_some() && settings.send_get_body_as != Method::GET {
            method = settings.send_get_body_as.clone();
        }

        let payload = match opts.body.take() {
            Some(body) => {
                let raw = body.into_bytes()?;
                Some(if settings.gzip { gzip(&raw)? } else { raw })
            }
            None => None,
        };
        let content_type = match (&opts.content_type, &payload) {
            (Some(ct), _) => Some(ct.as_str()),
            (None, Some(_)) => Some("application/json"),
            (None, None) => None,
        };
        let headers = settings.request_headers(&opts.headers, content_type, settings.gzip && payload.is_some());

        let mut attempts = Attempts::default();
        let mut forced_check = false;

        loop {
            let endpoint = match self.pool.next() {
                Ok(endpoint) => endpoint,
                Err(err) => {
                    attempts.failed += 1;
                    if !forced_check {
                        forced_check = true;
                        self.health.check(ctx, settings.healthcheck.timeout(), false).await;
                        if let Some(ctx_err) = ctx.err() {
                            return Err(ctx_err);
                        }
                        if settings.healthcheck.enabled {
                            continue;
                        }
                    }
                    let attempt = Attempt {
                        number: attempts.failed,
                        request: None,
                        status: None,
                        error: Some(&err),
                    };
                    match retrier.retry(ctx, &attempt)? {
                        RetryDecision::Retry(wait) => {
                            attempts.retried += 1;
                            metrics::record_retry("no_endpoint");
                            tracing::warn!(attempt = attempts.failed, delay = ?wait, "No node available, retrying");
                            ctx.sleep(wait).await?;
                            continue;
                        }
                        RetryDecision::Stop => return Err(attempts.give_up(err)),
                    }
                }
            };

            let url = opts.url_for(&endpoint)?;
            let mut builder = self.http.request(method.clone(), url.clone()).headers(headers.clone());
            builder = settings.authorize(builder);
            if let Some(payload) = &payload {
                builder = builder.body(payload.clone());
            }
            let request = builder.build()?;
            if settings.trace_bodies {
                trace_request(&request, payload.as_deref());
            }
            let info = RequestInfo {
                method: &method,
                url: url.as_str(),
            };

            // A canceled context ends the call without touching the node.
            let res = match ctx.run(self.http.execute(request)).await? {
                Ok(res) => res,
                Err(e) => {
                    attempts.failed += 1;
                    let err = Error::Transport(e);
                    let attempt = Attempt {
                        number: attempts.failed,
                        request: Some(info),
                        status: None,
                        error: Some(&err),
                    };
                    match retrier.retry(ctx, &attempt) {
                        Ok(RetryDecision::Retry(wait)) => {
                            attempts.retried += 1;
                            metrics::record_retry("transport");
                            tracing::warn!(url = %url, attempt = attempts.failed, delay = ?wait, error = %err, "Request failed, retrying");
                            ctx.sleep(wait).await?;
                            continue;
                        }
                        Ok(RetryDecision::Stop) => {
                            self.pool.mark_dead(&endpoint);
                            return Err(attempts.give_up(err));
                        }
                        Err(fatal) => {
                            self.pool.mark_dead(&endpoint);
                            return Err(fatal);
                        }
                    }
                }
            };

            let status = res.status();
            let mut exhausted = false;
            if retry_codes.contains(&status.as_u16()) {
                attempts.failed += 1;
                let attempt = Attempt {
                    number: attempts.failed,
                    request: Some(info),
                    status: Some(status),
                    error: None,
                };
                match retrier.retry(ctx, &attempt) {
                    Ok(RetryDecision::Retry(wait)) => {
                        attempts.retried += 1;
                        metrics::record_retry("status");
                        tracing::warn!(url = %url, status = status.as_u16(), attempt = attempts.failed, delay = ?wait, "Retryable status, retrying");
                        ctx.sleep(wait).await?;
                        continue;
                    }
                    Ok(RetryDecision::Stop) => {
                        self.pool.mark_dead(&endpoint);
                        exhausted = true;
                    }
                    Err(fatal) => {
                        self.pool.mark_dead(&endpoint);
                        return Err(fatal);
                    }
                }
            }

            self.report_deprecations(&settings, &method, &url, res.headers());

            if opts.stream && opts.accepts(status.as_u16()) {
                if !exhausted {
                    self.pool.mark_healthy(&endpoint);
                }
                return Ok(Response::streaming(url, res, settings.decoder.clone()));
            }

            let resp_headers = res.headers().clone();
            let body = ctx.run(read_body(res, opts.max_response_size)).await??;
            if settings.trace_bodies {
                trace_response(status, &resp_headers, &body);
            }

            if !opts.accepts(status.as_u16()) {
                let response = Response::buffered(url, status, resp_headers, body, settings.decoder.clone());
                let err = Error::from_response(response);
                return Err(if exhausted { attempts.give_up(err) } else { err });
            }

            if !exhausted {
                self.pool.mark_healthy(&endpoint);
            }
            return Ok(Response::buffered(url, status, resp_headers, body, settings.decoder.clone()));
        }
    }

    fn report_deprecations(&self, settings: &ClientSettings, method: &Method, url: &url::Url, headers: &HeaderMap) {
        let warnings = warnings(headers);
        if warnings.is_empty() {
            return;
        }
        for warning in &warnings {
            tracing::warn!(method = %method, url = %url, "Deprecation warning: {}", warning);
        }
        if let Some(hook) = &settings.deprecation_hook {
            hook.call(&DeprecationWarning {
                method: method.clone(),
                url: url.to_string(),
                warnings,
            });
        }
    }
}

fn trace_request(request: &reqwest::Request, body: Option<&[u8]>) {
    tracing::trace!(
        target: TRACE_TARGET,
        method = %request.method(),
        url = %request.url(),
        headers = ?request.headers(),
        body = %body.map(String::from_utf8_lossy).unwrap_or_default(),
        "Request"
    );
}

fn trace_response(status: StatusCode, headers: &HeaderMap, body: &[u8]) {
    tracing::trace!(
        target: TRACE_TARGET,
        status = status.as_u16(),
        headers = ?headers,
        body = %String::from_utf8_lossy(body),
        "Response"
    );
}
