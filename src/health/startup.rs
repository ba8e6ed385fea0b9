//! Startup health check.
//!
//! Before the pool is built, the seed URLs are probed until one of them
//! answers or the startup timeout passes.

use reqwest::StatusCode;
use std::time::Duration;
use tokio::time::Instant;
use url::Url;

use crate::error::{Error, ResponseError, Result};
use crate::health::checker::{probe, HealthChecker};
use crate::lifecycle::Context;

/// Pause between two rounds over the seed URLs.
pub const STARTUP_RETRY_INTERVAL: Duration = Duration::from_secs(1);

impl HealthChecker {
    /// Wait until at least one seed URL answers `HEAD /` with 2xx.
    ///
    /// A 401 answer or a canceled `ctx` fails immediately. Everything else
    /// is retried until `timeout` passes.
    pub async fn wait_for_startup(&self, ctx: &Context, urls: &[Url], timeout: Duration) -> Result<()> {
        let settings = self.settings();
        let start = Instant::now();
        let mut last_error: Option<Error> = None;

        loop {
            for url in urls {
                let base = url.as_str().trim_end_matches('/').to_string();
                let attempt_ctx = ctx.with_timeout(timeout);
                match attempt_ctx.run(probe(self.http().clone(), settings.clone(), base)).await {
                    Ok(Ok(status)) if status.is_success() => {
                        tracing::debug!(url = %url, elapsed = ?start.elapsed(), "Startup health check passed");
                        return Ok(());
                    }
                    Ok(Ok(status)) if status == StatusCode::UNAUTHORIZED => {
                        return Err(Error::Response {
                            error: ResponseError {
                                status: StatusCode::UNAUTHORIZED.as_u16(),
                                details: None,
                            },
                            response: None,
                        });
                    }
                    Ok(Ok(status)) => {
                        tracing::debug!(url = %url, status = status.as_u16(), "Startup health check: node not ready");
                    }
                    Ok(Err(e)) => last_error = Some(Error::Transport(e)),
                    Err(e) => {
                        if let Some(ctx_err) = ctx.err() {
                            return Err(ctx_err);
                        }
                        last_error = Some(e);
                    }
                }
            }

            ctx.sleep(STARTUP_RETRY_INTERVAL).await?;
            if start.elapsed() >= timeout {
                break;
            }
        }

        Err(Error::NoEndpoint(match last_error {
            Some(e) => format!("health check timeout: {e}"),
            None => "health check timeout".to_string(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClientConfig;
    use crate::load_balancer::EndpointPool;
    use crate::transport::ClientSettings;
    use arc_swap::ArcSwap;
    use std::sync::Arc;

    fn checker() -> HealthChecker {
        let settings = ClientSettings::from_config(&ClientConfig::simple()).unwrap();
        HealthChecker::new(
            Arc::new(EndpointPool::new(vec![], false)),
            Arc::new(ArcSwap::from_pointee(settings)),
            reqwest::Client::builder().no_proxy().build().unwrap(),
        )
    }

    #[tokio::test]
    async fn test_startup_times_out_without_nodes() {
        let urls = vec![Url::parse("http://127.0.0.1:1").unwrap()];
        let err = checker()
            .wait_for_startup(&Context::background(), &urls, Duration::from_millis(200))
            .await
            .unwrap_err();
        assert!(err.is_no_endpoint());
        assert!(err.to_string().contains("health check timeout"));
    }

    #[tokio::test]
    async fn test_startup_honors_cancellation() {
        let urls = vec![Url::parse("http://127.0.0.1:1").unwrap()];
        let ctx = Context::background();
        ctx.cancel();
        let err = checker()
            .wait_for_startup(&ctx, &urls, Duration::from_secs(5))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Cancelled));
    }
}
