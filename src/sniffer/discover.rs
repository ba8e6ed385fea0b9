//! Cluster node discovery.
//!
//! The default [`NodesInfoDiscoverer`] asks every known URL for
//! `GET /_nodes/http` concurrently and takes the first non-empty answer.

use arc_swap::ArcSwap;
use async_trait::async_trait;
use futures_util::stream::{FuturesUnordered, StreamExt};
use reqwest::Method;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt::Debug;
use std::sync::Arc;
use url::Url;

use crate::error::{Error, Result};
use crate::lifecycle::Context;
use crate::transport::ClientSettings;

/// A node reported by the cluster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredNode {
    pub id: String,
    pub url: Url,
}

/// Source of cluster membership.
#[async_trait]
pub trait Discoverer: Send + Sync + Debug {
    /// Return the current nodes of the cluster, asking `seeds`.
    async fn discover(&self, ctx: &Context, seeds: &[Url]) -> Result<Vec<DiscoveredNode>>;
}

#[derive(Debug, Deserialize)]
struct NodesInfo {
    #[serde(default)]
    nodes: BTreeMap<String, NodeInfo>,
}

#[derive(Debug, Deserialize)]
struct NodeInfo {
    #[serde(default)]
    http: Option<NodeHttp>,
}

#[derive(Debug, Deserialize)]
struct NodeHttp {
    #[serde(default)]
    publish_address: String,
}

/// Build a node URL from a published address.
///
/// Addresses look like `127.0.0.1:9200` or `hostname/127.0.0.1:9200`; in
/// the second form the host name is kept and the port taken from the end.
pub fn extract_url(scheme: &str, address: &str) -> Result<Url> {
    let address = address.trim();
    let host_port = match address.split_once('/') {
        Some((host, rest)) => {
            let port = rest.rsplit_once(':').map(|(_, port)| port).unwrap_or_default();
            format!("{host}:{port}")
        }
        None => address.to_string(),
    };
    let raw = format!("{scheme}://{host_port}");
    Url::parse(&raw).map_err(|source| Error::InvalidUrl { url: raw, source })
}

/// Discovers nodes through the nodes info API.
#[derive(Debug, Clone)]
pub struct NodesInfoDiscoverer {
    http: reqwest::Client,
    settings: Arc<ArcSwap<ClientSettings>>,
}

impl NodesInfoDiscoverer {
    pub fn new(http: reqwest::Client, settings: Arc<ArcSwap<ClientSettings>>) -> Self {
        Self { http, settings }
    }

    async fn query(&self, settings: &ClientSettings, seed: &Url) -> Result<Vec<DiscoveredNode>> {
        let url = format!("{}/_nodes/http", seed.as_str().trim_end_matches('/'));
        let headers = settings.request_headers(&Default::default(), None, false);
        let builder = settings.authorize(self.http.request(Method::GET, &url).headers(headers));
        let res = builder.send().await?;
        if !res.status().is_success() {
            return Err(Error::NoEndpoint(format!(
                "sniffing {url} returned status {}",
                res.status().as_u16()
            )));
        }
        let info: NodesInfo = res.json().await?;

        let mut nodes = Vec::with_capacity(info.nodes.len());
        for (id, node) in info.nodes {
            let Some(http) = node.http.filter(|h| !h.publish_address.is_empty()) else {
                continue;
            };
            match extract_url(&settings.scheme, &http.publish_address) {
                Ok(url) => nodes.push(DiscoveredNode { id, url }),
                Err(e) => tracing::warn!(node = %id, error = %e, "Skipping node with invalid address"),
            }
        }
        Ok(nodes)
    }
}

#[async_trait]
impl Discoverer for NodesInfoDiscoverer {
    async fn discover(&self, ctx: &Context, seeds: &[Url]) -> Result<Vec<DiscoveredNode>> {
        let settings = self.settings.load_full();
        let mut pending: FuturesUnordered<_> = seeds.iter().map(|seed| self.query(&settings, seed)).collect();

        let mut last_error = None;
        loop {
            match ctx.run(pending.next()).await? {
                Some(Ok(nodes)) if !nodes.is_empty() => return Ok(nodes),
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    tracing::debug!(error = %e, "Sniffing a node failed");
                    last_error = Some(e);
                }
                None => break,
            }
        }

        Err(Error::NoEndpoint(match last_error {
            Some(e) => format!("no node found during sniffing: {e}"),
            None => "no node found during sniffing".to_string(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_url() {
        let cases = [
            ("http", "127.0.0.1:9200", "http://127.0.0.1:9200/"),
            ("https", "127.0.0.1:9243", "https://127.0.0.1:9243/"),
            ("http", "myelk.local/10.1.0.24:9200", "http://myelk.local:9200/"),
            ("http", "[::1]:9200", "http://[::1]:9200/"),
        ];
        for (scheme, address, expected) in cases {
            assert_eq!(extract_url(scheme, address).unwrap().as_str(), expected, "{address}");
        }
    }

    #[test]
    fn test_nodes_info_parsing() {
        let body = r#"{
            "cluster_name": "elasticsearch",
            "nodes": {
                "n2": {"name": "b", "http": {"publish_address": "127.0.0.1:9201"}},
                "n1": {"name": "a", "http": {"publish_address": "127.0.0.1:9200"}},
                "n3": {"name": "c"}
            }
        }"#;
        let info: NodesInfo = serde_json::from_str(body).unwrap();
        let ids: Vec<_> = info.nodes.keys().cloned().collect();
        assert_eq!(ids, vec!["n1", "n2", "n3"]);
        assert!(info.nodes["n3"].http.is_none());
    }
}
