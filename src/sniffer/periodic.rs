//! Periodic topology discovery.
//!
//! # Responsibilities
//! - Ask the cluster for its current nodes
//! - Reconcile the pool with the answer
//! - Repeat on a fixed interval until stopped

use arc_swap::ArcSwap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::error::{Error, Result};
use crate::lifecycle::Context;
use crate::load_balancer::{Endpoint, EndpointPool};
use crate::sniffer::discover::Discoverer;
use crate::transport::ClientSettings;

/// Keeps the pool in sync with the cluster.
#[derive(Debug, Clone)]
pub struct Sniffer {
    pool: Arc<EndpointPool>,
    settings: Arc<ArcSwap<ClientSettings>>,
    discoverer: Arc<dyn Discoverer>,
}

impl Sniffer {
    pub fn new(
        pool: Arc<EndpointPool>,
        settings: Arc<ArcSwap<ClientSettings>>,
        discoverer: Arc<dyn Discoverer>,
    ) -> Self {
        Self {
            pool,
            settings,
            discoverer,
        }
    }

    /// Seed URLs first, then every live pool member not already listed.
    fn seeds(&self, settings: &ClientSettings) -> Vec<Url> {
        let mut seeds = settings.urls.clone();
        for endpoint in self.pool.endpoints() {
            if !endpoint.is_dead() && !seeds.contains(endpoint.url()) {
                seeds.push(endpoint.url().clone());
            }
        }
        seeds
    }

    /// Discover the cluster once and reconcile the pool.
    ///
    /// Does nothing when sniffing is disabled. An empty or failed discovery
    /// leaves the pool unchanged.
    pub async fn sniff(&self, ctx: &Context, timeout: Duration) -> Result<()> {
        let settings = self.settings.load_full();
        if !settings.sniffer.enabled {
            return Ok(());
        }

        let seeds = self.seeds(&settings);
        if seeds.is_empty() {
            return Err(Error::NoEndpoint("no URLs found".to_string()));
        }

        let sniff_ctx = ctx.with_timeout(timeout);
        let nodes = match self.discoverer.discover(&sniff_ctx, &seeds).await {
            Ok(nodes) => nodes,
            Err(e) if e.is_context_error() => {
                if let Some(ctx_err) = ctx.err() {
                    return Err(ctx_err);
                }
                return Err(Error::NoEndpoint("sniff timeout".to_string()));
            }
            Err(e) => return Err(e),
        };
        if nodes.is_empty() {
            return Err(Error::NoEndpoint("no nodes found during sniffing".to_string()));
        }

        tracing::debug!(nodes = nodes.len(), "Sniffing found nodes");
        self.pool.reconcile(
            nodes
                .into_iter()
                .map(|node| Endpoint::new(node.id, node.url))
                .collect(),
        );
        Ok(())
    }

    /// Periodic sniffing loop. Exits when `stop` is canceled.
    pub async fn run(self, stop: CancellationToken) {
        let interval = self.settings.load().sniffer.interval();
        tracing::info!(interval = ?interval, "Sniffer starting");

        let ctx = Context::with_token(stop.clone());
        let mut ticker = time::interval_at(Instant::now() + interval, interval);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let timeout = self.settings.load().sniffer.timeout();
                    if let Err(e) = self.sniff(&ctx, timeout).await {
                        if !e.is_context_error() {
                            tracing::warn!(error = %e, "Sniffing failed");
                        }
                    }
                }
                _ = stop.cancelled() => {
                    tracing::info!("Sniffer received stop signal, exiting loop");
                    break;
                }
            }
        }
    }
}
