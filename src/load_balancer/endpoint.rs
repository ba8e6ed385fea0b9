//! Endpoint abstraction.
//!
//! # Responsibilities
//! - Represent a single cluster node (identifier + base URL)
//! - Track liveness state (Alive/Dead)
//! - Track failure count and the time the node was first seen dead
//!
//! # Design Decisions
//! - URL and node id are immutable after creation; sniffing replaces
//!   endpoints instead of editing them
//! - Liveness lives in atomics on the endpoint itself so health updates
//!   never serialize through the pool lock

use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Mutex;
use std::time::SystemTime;
use url::Url;

/// Liveness state.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointState {
    Alive = 0,
    Dead = 1,
}

impl From<u8> for EndpointState {
    fn from(val: u8) -> Self {
        match val {
            1 => EndpointState::Dead,
            _ => EndpointState::Alive,
        }
    }
}

/// A single Elasticsearch node.
#[derive(Debug)]
pub struct Endpoint {
    node_id: String,
    url: Url,
    state: AtomicU8,
    failures: AtomicU64,
    dead_since: Mutex<Option<SystemTime>>,
}

impl Endpoint {
    /// Create a new, alive endpoint.
    pub fn new(node_id: impl Into<String>, url: Url) -> Self {
        Self {
            node_id: node_id.into(),
            url,
            state: AtomicU8::new(EndpointState::Alive as u8),
            failures: AtomicU64::new(0),
            dead_since: Mutex::new(None),
        }
    }

    /// Node identifier as reported by the cluster. Seed endpoints use their URL.
    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Base URL without a trailing slash, ready for path concatenation.
    pub fn base(&self) -> &str {
        self.url.as_str().trim_end_matches('/')
    }

    pub fn state(&self) -> EndpointState {
        EndpointState::from(self.state.load(Ordering::Acquire))
    }

    pub fn is_dead(&self) -> bool {
        self.state() == EndpointState::Dead
    }

    /// Number of failures since the last fully successful round-trip.
    pub fn failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }

    /// Time the endpoint was first marked dead since it was last healthy.
    pub fn dead_since(&self) -> Option<SystemTime> {
        self.dead_since.lock().map(|g| *g).unwrap_or(None)
    }

    /// Mark the endpoint dead and count the failure.
    pub fn mark_dead(&self) {
        self.state.store(EndpointState::Dead as u8, Ordering::Release);
        if let Ok(mut since) = self.dead_since.lock() {
            if since.is_none() {
                *since = Some(SystemTime::now());
            }
        }
        self.failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Flip the endpoint back to alive, keeping its failure history.
    pub fn mark_alive(&self) {
        self.state.store(EndpointState::Alive as u8, Ordering::Release);
    }

    /// Mark alive after a successful round-trip and clear failure history.
    pub fn mark_healthy(&self) {
        self.state.store(EndpointState::Alive as u8, Ordering::Release);
        if let Ok(mut since) = self.dead_since.lock() {
            *since = None;
        }
        self.failures.store(0, Ordering::Relaxed);
    }

    /// True if both identifier and URL match.
    pub fn same_node(&self, other: &Endpoint) -> bool {
        self.node_id == other.node_id && self.url == other.url
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [dead={}, failures={}",
            self.base(),
            self.is_dead(),
            self.failures()
        )?;
        if let Some(since) = self.dead_since() {
            let secs = since
                .duration_since(SystemTime::UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or(0);
            write!(f, ", dead_since={}", secs)?;
        }
        write!(f, "]")
    }
}
