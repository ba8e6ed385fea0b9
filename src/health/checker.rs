//! Active health checking.
//!
//! # Responsibilities
//! - Probe every known node with `HEAD /` under a per-probe timeout
//! - Mark nodes alive or dead from the result
//! - Repeat on a fixed interval until stopped

use arc_swap::ArcSwap;
use futures_util::future::join_all;
use reqwest::{Method, StatusCode};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;

use crate::lifecycle::Context;
use crate::load_balancer::EndpointPool;
use crate::transport::ClientSettings;

/// Probes nodes and updates their liveness.
#[derive(Debug, Clone)]
pub struct HealthChecker {
    pool: Arc<EndpointPool>,
    settings: Arc<ArcSwap<ClientSettings>>,
    http: reqwest::Client,
}

/// Send one `HEAD` probe to `url` and return the status.
pub(crate) async fn probe(
    http: reqwest::Client,
    settings: Arc<ClientSettings>,
    url: String,
) -> Result<StatusCode, reqwest::Error> {
    let headers = settings.request_headers(&Default::default(), None, false);
    let builder = settings.authorize(http.request(Method::HEAD, url).headers(headers));
    Ok(builder.send().await?.status())
}

impl HealthChecker {
    pub fn new(
        pool: Arc<EndpointPool>,
        settings: Arc<ArcSwap<ClientSettings>>,
        http: reqwest::Client,
    ) -> Self {
        Self { pool, settings, http }
    }

    pub(crate) fn settings(&self) -> Arc<ClientSettings> {
        self.settings.load_full()
    }

    pub(crate) fn http(&self) -> &reqwest::Client {
        &self.http
    }

    /// Probe every node concurrently and update its liveness.
    ///
    /// Does nothing when health checks are disabled, unless `force` is set.
    /// A canceled `ctx` ends the sweep without touching any node.
    pub async fn check(&self, ctx: &Context, timeout: Duration, force: bool) {
        let settings = self.settings.load_full();
        if !settings.healthcheck.enabled && !force {
            return;
        }

        let probes = self.pool.endpoints().into_iter().map(|endpoint| {
            let http = self.http.clone();
            let settings = settings.clone();
            let probe_ctx = ctx.with_timeout(timeout);
            async move {
                let handle = tokio::spawn(probe(http, settings, endpoint.base().to_string()));
                let abort = handle.abort_handle();
                let outcome = probe_ctx.run(handle).await;
                if outcome.is_err() {
                    abort.abort();
                }
                (endpoint, outcome)
            }
        });

        for (endpoint, outcome) in join_all(probes).await {
            if ctx.err().is_some() {
                tracing::debug!("Health check interrupted");
                return;
            }
            match outcome {
                Ok(Ok(Ok(status))) if status.is_success() => self.pool.mark_alive(&endpoint),
                Ok(Ok(Ok(status))) => {
                    tracing::warn!(url = %endpoint.url(), status = status.as_u16(), "Health check failed: non-success status");
                    self.pool.mark_dead(&endpoint);
                }
                Ok(Ok(Err(e))) => {
                    tracing::warn!(url = %endpoint.url(), error = %e, "Health check failed: connection error");
                    self.pool.mark_dead(&endpoint);
                }
                Ok(Err(e)) => {
                    tracing::warn!(url = %endpoint.url(), error = %e, "Health check failed: probe aborted");
                    self.pool.mark_dead(&endpoint);
                }
                Err(_) => {
                    tracing::warn!(url = %endpoint.url(), timeout = ?timeout, "Health check failed: timeout");
                    self.pool.mark_dead(&endpoint);
                }
            }
        }
    }

    /// Periodic sweep loop. Exits when `stop` is canceled.
    pub async fn run(self, stop: CancellationToken) {
        let interval = self.settings.load().healthcheck.interval();
        tracing::info!(interval = ?interval, "Health checker starting");

        let ctx = Context::with_token(stop.clone());
        let mut ticker = time::interval_at(Instant::now() + interval, interval);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let timeout = self.settings.load().healthcheck.timeout();
                    self.check(&ctx, timeout, false).await;
                }
                _ = stop.cancelled() => {
                    tracing::info!("Health checker received stop signal, exiting loop");
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClientConfig;
    use crate::load_balancer::Endpoint;
    use url::Url;

    fn checker(urls: &[&str]) -> HealthChecker {
        let endpoints = urls
            .iter()
            .map(|u| Endpoint::new(*u, Url::parse(u).unwrap()))
            .collect();
        let pool = Arc::new(EndpointPool::new(endpoints, false));
        let settings = ClientSettings::from_config(&ClientConfig::simple()).unwrap();
        let http = reqwest::Client::builder().no_proxy().build().unwrap();
        HealthChecker::new(pool, Arc::new(ArcSwap::from_pointee(settings)), http)
    }

    #[tokio::test]
    async fn test_disabled_check_is_noop() {
        let checker = checker(&["http://127.0.0.1:1"]);
        checker.check(&Context::background(), Duration::from_millis(200), false).await;
        assert!(checker.pool.endpoints().iter().all(|e| !e.is_dead()));
    }

    #[tokio::test]
    async fn test_forced_check_marks_unreachable_dead() {
        let checker = checker(&["http://127.0.0.1:1"]);
        checker.check(&Context::background(), Duration::from_secs(2), true).await;
        assert!(checker.pool.endpoints()[0].is_dead());
    }

    #[tokio::test]
    async fn test_canceled_check_leaves_state_alone() {
        let checker = checker(&["http://127.0.0.1:1"]);
        let ctx = Context::background();
        ctx.cancel();
        checker.check(&ctx, Duration::from_secs(2), true).await;
        assert!(!checker.pool.endpoints()[0].is_dead());
    }
}
