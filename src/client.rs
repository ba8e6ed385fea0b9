//! The Elasticsearch client.
//!
//! # Responsibilities
//! - Build validated settings from a [`ClientBuilder`]
//! - Run the startup sequence (health check, sniff, plugin check)
//! - Own the background health check and sniffer loops
//! - Route calls through the [`Executor`]
//!
//! # Lifecycle
//! ```text
//! dial:   validate → startup health check → sniff → forced sweep
//!         → require an alive node → required plugins → start()
//! simple: validate → require a non-empty pool (no probes, no tasks)
//! stop:   cancel loops → wait until each has exited
//! ```

use arc_swap::ArcSwap;
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use crate::config::{BasicAuthConfig, ClientConfig};
use crate::error::{Error, Result};
use crate::health::HealthChecker;
use crate::lifecycle::{BackgroundTask, Context};
use crate::load_balancer::{Endpoint, EndpointPool};
use crate::retry::Retrier;
use crate::sniffer::{Discoverer, NodesInfoDiscoverer, Sniffer};
use crate::transport::{
    ClientSettings, Decoder, DeprecationHook, DeprecationWarning, Executor, RequestOptions, Response,
};

fn millis(d: Duration) -> u64 {
    d.as_millis() as u64
}

/// Builder for [`Client`].
#[derive(Debug, Default)]
pub struct ClientBuilder {
    config: ClientConfig,
    retrier: Option<Arc<dyn Retrier>>,
    decoder: Option<Arc<dyn Decoder>>,
    discoverer: Option<Arc<dyn Discoverer>>,
    http: Option<reqwest::Client>,
    deprecation_hook: Option<DeprecationHook>,
}

impl ClientBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from a loaded configuration file.
    pub fn from_config(config: ClientConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// Use a single seed URL.
    pub fn url(self, url: impl Into<String>) -> Self {
        self.urls([url.into()])
    }

    /// Replace the seed URLs.
    pub fn urls<I, S>(mut self, urls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.urls = urls.into_iter().map(Into::into).collect();
        self
    }

    pub fn scheme(mut self, scheme: impl Into<String>) -> Self {
        self.config.scheme = scheme.into();
        self
    }

    pub fn basic_auth(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.config.basic_auth = Some(BasicAuthConfig {
            username: username.into(),
            password: password.into(),
        });
        self
    }

    pub fn healthcheck(mut self, enabled: bool) -> Self {
        self.config.healthcheck.enabled = enabled;
        self
    }

    pub fn healthcheck_timeout_startup(mut self, timeout: Duration) -> Self {
        self.config.healthcheck.timeout_startup_ms = millis(timeout);
        self
    }

    pub fn healthcheck_timeout(mut self, timeout: Duration) -> Self {
        self.config.healthcheck.timeout_ms = millis(timeout);
        self
    }

    pub fn healthcheck_interval(mut self, interval: Duration) -> Self {
        self.config.healthcheck.interval_ms = millis(interval);
        self
    }

    pub fn sniff(mut self, enabled: bool) -> Self {
        self.config.sniffer.enabled = enabled;
        self
    }

    pub fn sniffer_timeout_startup(mut self, timeout: Duration) -> Self {
        self.config.sniffer.timeout_startup_ms = millis(timeout);
        self
    }

    pub fn sniffer_timeout(mut self, timeout: Duration) -> Self {
        self.config.sniffer.timeout_ms = millis(timeout);
        self
    }

    pub fn sniffer_interval(mut self, interval: Duration) -> Self {
        self.config.sniffer.interval_ms = millis(interval);
        self
    }

    pub fn gzip(mut self, enabled: bool) -> Self {
        self.config.gzip = enabled;
        self
    }

    /// Method used for GET requests that carry a body (`GET` or `POST`).
    pub fn send_get_body_as(mut self, method: impl Into<String>) -> Self {
        self.config.send_get_body_as = method.into();
        self
    }

    /// Add a header sent with every request.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.config.headers.insert(name.into(), value.into());
        self
    }

    pub fn retrier(mut self, retrier: Arc<dyn Retrier>) -> Self {
        self.retrier = Some(retrier);
        self
    }

    /// Retry up to `max` times with exponential backoff. Ignored when a
    /// retrier is set explicitly.
    pub fn max_retries(mut self, max: u32) -> Self {
        self.config.retries.max_retries = max;
        self
    }

    /// Statuses that are handed to the retrier instead of returned.
    pub fn retry_status_codes(mut self, codes: impl Into<Vec<u16>>) -> Self {
        self.config.retries.status_codes = codes.into();
        self
    }

    pub fn required_plugins<I, S>(mut self, plugins: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.required_plugins = plugins.into_iter().map(Into::into).collect();
        self
    }

    pub fn decoder(mut self, decoder: Arc<dyn Decoder>) -> Self {
        self.decoder = Some(decoder);
        self
    }

    /// Use a custom discoverer for sniffing.
    pub fn discoverer(mut self, discoverer: Arc<dyn Discoverer>) -> Self {
        self.discoverer = Some(discoverer);
        self
    }

    /// Use a preconfigured HTTP client (proxies, TLS roots, timeouts).
    pub fn http_client(mut self, http: reqwest::Client) -> Self {
        self.http = Some(http);
        self
    }

    pub fn deprecation_hook(mut self, hook: impl Fn(&DeprecationWarning) + Send + Sync + 'static) -> Self {
        self.deprecation_hook = Some(DeprecationHook::new(hook));
        self
    }

    /// Dump raw requests and responses on the trace target.
    pub fn trace_bodies(mut self, enabled: bool) -> Self {
        self.config.observability.trace_bodies = enabled;
        self
    }

    fn build_settings(&self) -> Result<ClientSettings> {
        let mut settings = ClientSettings::from_config(&self.config)?;
        if let Some(retrier) = &self.retrier {
            settings.retrier = retrier.clone();
        }
        if let Some(decoder) = &self.decoder {
            settings.decoder = decoder.clone();
        }
        settings.deprecation_hook = self.deprecation_hook.clone();
        Ok(settings)
    }
}

#[derive(Debug)]
struct ClientInner {
    pool: Arc<EndpointPool>,
    settings: Arc<ArcSwap<ClientSettings>>,
    executor: Executor,
    health: HealthChecker,
    sniffer: Sniffer,
    tasks: Mutex<Vec<BackgroundTask>>,
    running: AtomicBool,
}

impl ClientInner {
    fn tasks(&self) -> MutexGuard<'_, Vec<BackgroundTask>> {
        self.tasks.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Drop for ClientInner {
    fn drop(&mut self) {
        for task in self.tasks().iter() {
            task.cancel();
        }
    }
}

/// A client for an Elasticsearch cluster. Cheap to clone.
#[derive(Debug, Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

#[derive(Debug, Deserialize)]
struct NodesPlugins {
    #[serde(default)]
    nodes: HashMap<String, NodePlugins>,
}

#[derive(Debug, Deserialize)]
struct NodePlugins {
    #[serde(default)]
    plugins: Vec<PluginInfo>,
}

#[derive(Debug, Deserialize)]
struct PluginInfo {
    name: String,
}

impl Client {
    /// Create a client and run the full startup sequence.
    pub async fn dial(builder: ClientBuilder) -> Result<Self> {
        Self::dial_with_context(&Context::background(), builder).await
    }

    /// Like [`Client::dial`], bounded by `ctx`.
    pub async fn dial_with_context(ctx: &Context, builder: ClientBuilder) -> Result<Self> {
        let settings = builder.build_settings()?;
        let client = Self::assemble(builder, settings);
        let settings = client.settings();

        if settings.healthcheck.enabled {
            client
                .inner
                .health
                .wait_for_startup(ctx, &settings.urls, settings.healthcheck.timeout_startup())
                .await?;
        }
        if settings.sniffer.enabled {
            client.inner.sniffer.sniff(ctx, settings.sniffer.timeout_startup()).await?;
        }
        if settings.healthcheck.enabled {
            client
                .inner
                .health
                .check(ctx, settings.healthcheck.timeout_startup(), true)
                .await;
        }
        client.inner.pool.must_have_active()?;
        client.check_required_plugins(ctx).await?;

        client.start();
        Ok(client)
    }

    /// Create a client without probes, sniffing or background tasks.
    pub fn simple(mut builder: ClientBuilder) -> Result<Self> {
        builder.config.healthcheck.enabled = false;
        builder.config.sniffer.enabled = false;
        let settings = builder.build_settings()?;
        let client = Self::assemble(builder, settings);
        if client.inner.pool.is_empty() {
            return Err(Error::NoEndpoint("no active connection found".to_string()));
        }
        client.inner.running.store(true, Ordering::SeqCst);
        Ok(client)
    }

    fn assemble(builder: ClientBuilder, settings: ClientSettings) -> Self {
        let seeds = settings
            .urls
            .iter()
            .map(|url| Endpoint::new(url.as_str(), url.clone()))
            .collect();
        let pool = Arc::new(EndpointPool::new(seeds, settings.sniffer.enabled));
        let settings = Arc::new(ArcSwap::from_pointee(settings));
        let http = builder.http.unwrap_or_default();

        let health = HealthChecker::new(pool.clone(), settings.clone(), http.clone());
        let discoverer = builder
            .discoverer
            .unwrap_or_else(|| Arc::new(NodesInfoDiscoverer::new(http.clone(), settings.clone())));
        let sniffer = Sniffer::new(pool.clone(), settings.clone(), discoverer);
        let executor = Executor::new(pool.clone(), settings.clone(), http, health.clone());

        Self {
            inner: Arc::new(ClientInner {
                pool,
                settings,
                executor,
                health,
                sniffer,
                tasks: Mutex::new(Vec::new()),
                running: AtomicBool::new(false),
            }),
        }
    }

    async fn check_required_plugins(&self, ctx: &Context) -> Result<()> {
        let required = self.settings().required_plugins.clone();
        if required.is_empty() {
            return Ok(());
        }

        let resp = self
            .perform_request(ctx, RequestOptions::get("/_nodes/plugins"))
            .await?;
        let info: NodesPlugins = resp.decode()?;
        let installed: HashSet<String> = info
            .nodes
            .into_values()
            .flat_map(|node| node.plugins.into_iter().map(|p| p.name))
            .collect();

        let missing: Vec<String> = required.into_iter().filter(|p| !installed.contains(p)).collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(Error::MissingPlugins(missing))
        }
    }

    /// Start the background loops enabled in the settings. No-op if running.
    pub fn start(&self) {
        let mut tasks = self.inner.tasks();
        if self.inner.running.load(Ordering::SeqCst) {
            return;
        }

        let settings = self.settings();
        if settings.healthcheck.enabled {
            let health = self.inner.health.clone();
            tasks.push(BackgroundTask::spawn("healthcheck", move |stop| health.run(stop)));
        }
        if settings.sniffer.enabled {
            let sniffer = self.inner.sniffer.clone();
            tasks.push(BackgroundTask::spawn("sniffer", move |stop| sniffer.run(stop)));
        }

        self.inner.running.store(true, Ordering::SeqCst);
        tracing::info!(tasks = tasks.len(), "Client started");
    }

    /// Stop the background loops and wait until each has exited.
    pub async fn stop(&self) {
        let tasks = {
            let mut tasks = self.inner.tasks();
            if !self.inner.running.swap(false, Ordering::SeqCst) {
                return;
            }
            std::mem::take(&mut *tasks)
        };
        for task in tasks {
            task.stop().await;
        }
        tracing::info!("Client stopped");
    }

    pub fn is_running(&self) -> bool {
        self.inner.running.load(Ordering::SeqCst)
    }

    /// Perform a call against the cluster.
    pub async fn perform_request(&self, ctx: &Context, opts: RequestOptions) -> Result<Response> {
        self.inner.executor.perform(ctx, opts).await
    }

    /// Probe every node now, regardless of the health check setting.
    pub async fn healthcheck(&self, ctx: &Context) {
        let timeout = self.settings().healthcheck.timeout();
        self.inner.health.check(ctx, timeout, true).await;
    }

    /// Discover the cluster now. No-op when sniffing is disabled.
    pub async fn sniff(&self, ctx: &Context) -> Result<()> {
        let timeout = self.settings().sniffer.timeout();
        self.inner.sniffer.sniff(ctx, timeout).await
    }

    /// Snapshot of the current settings.
    pub fn settings(&self) -> Arc<ClientSettings> {
        self.inner.settings.load_full()
    }

    /// Replace the settings atomically. In-flight calls keep the old snapshot.
    pub fn update_settings(&self, f: impl FnOnce(&mut ClientSettings)) {
        let mut next = (*self.settings()).clone();
        f(&mut next);
        self.inner.pool.set_sniffing(next.sniffer.enabled);
        self.inner.settings.store(Arc::new(next));
    }

    /// Snapshot of the tracked nodes.
    pub fn endpoints(&self) -> Vec<Arc<Endpoint>> {
        self.inner.pool.endpoints()
    }

    /// True if at least one node is alive.
    pub fn has_active_endpoint(&self) -> bool {
        self.inner.pool.has_active()
    }
}

impl fmt::Display for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.inner.pool)
    }
}
