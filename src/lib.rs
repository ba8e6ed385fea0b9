//! Elasticsearch client connection layer.
//!
//! Tracks the nodes of a cluster, spreads calls across the live ones,
//! probes and rediscovers nodes in the background, and retries failed
//! attempts according to a pluggable policy.

pub mod client;
pub mod config;
pub mod error;
pub mod health;
pub mod lifecycle;
pub mod load_balancer;
pub mod observability;
pub mod retry;
pub mod sniffer;
pub mod transport;

pub use client::{Client, ClientBuilder};
pub use config::ClientConfig;
pub use error::{error_reason, Error, ErrorKind, Result};
pub use lifecycle::Context;
pub use transport::{Body, RequestOptions, Response};
