//! Endpoint pool management.
//!
//! # Responsibilities
//! - Hold the ordered set of known nodes
//! - Hand out live endpoints in round-robin order
//! - Resurrect every node when all are dead and nothing else would
//! - Reconcile membership with the result of a sniff

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::error::{Error, Result};
use crate::observability::metrics;
use crate::load_balancer::endpoint::Endpoint;
use crate::load_balancer::round_robin::RoundRobin;

#[derive(Debug, Default)]
struct PoolState {
    endpoints: Vec<Arc<Endpoint>>,
    rotation: RoundRobin,
}

/// The set of nodes the client talks to.
#[derive(Debug)]
pub struct EndpointPool {
    state: RwLock<PoolState>,
    /// Sniffing revives nodes on its own; without it the pool must.
    sniffing: AtomicBool,
}

impl EndpointPool {
    /// Create a pool from an ordered list of endpoints.
    pub fn new(endpoints: Vec<Endpoint>, sniffing: bool) -> Self {
        Self {
            state: RwLock::new(PoolState {
                endpoints: endpoints.into_iter().map(Arc::new).collect(),
                rotation: RoundRobin::new(),
            }),
            sniffing: AtomicBool::new(sniffing),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, PoolState> {
        self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, PoolState> {
        self.state.write().unwrap_or_else(|e| e.into_inner())
    }

    pub fn set_sniffing(&self, enabled: bool) {
        self.sniffing.store(enabled, Ordering::Relaxed);
    }

    /// Select the next live endpoint.
    ///
    /// When every endpoint is dead and sniffing is disabled, all endpoints are
    /// resurrected so a later call can succeed, but this call still fails.
    pub fn next(&self) -> Result<Arc<Endpoint>> {
        let mut state = self.write();
        let PoolState { endpoints, rotation } = &mut *state;

        if let Some(endpoint) = rotation.select(endpoints) {
            return Ok(endpoint);
        }

        if endpoints.is_empty() {
            return Err(Error::NoEndpoint("connection pool is empty".into()));
        }

        if !self.sniffing.load(Ordering::Relaxed) {
            tracing::error!(
                count = endpoints.len(),
                "All nodes marked as dead; resurrecting them to prevent deadlock"
            );
            metrics::record_resurrection(endpoints.len());
            for endpoint in endpoints.iter() {
                endpoint.mark_alive();
                metrics::record_endpoint_state(endpoint.base(), true);
            }
        }

        Err(Error::NoEndpoint("no available connection".into()))
    }

    /// Replace the pool contents with `discovered`.
    ///
    /// Entries matching an existing endpoint by node id and URL keep the
    /// existing endpoint, including its liveness and failure history.
    pub fn reconcile(&self, discovered: Vec<Endpoint>) {
        let mut state = self.write();

        let mut next = Vec::with_capacity(discovered.len());
        for endpoint in discovered {
            match state.endpoints.iter().find(|old| old.same_node(&endpoint)) {
                Some(old) => next.push(old.clone()),
                None => {
                    tracing::info!(url = %endpoint.base(), node_id = %endpoint.node_id(), "Node joined the cluster");
                    next.push(Arc::new(endpoint));
                }
            }
        }

        for old in &state.endpoints {
            if !next.iter().any(|e| Arc::ptr_eq(e, old)) {
                tracing::info!(url = %old.base(), node_id = %old.node_id(), "Node left the cluster");
            }
        }

        state.endpoints = next;
        state.rotation.reset();
    }

    pub fn mark_dead(&self, endpoint: &Endpoint) {
        tracing::error!(url = %endpoint.base(), "Node is dead");
        endpoint.mark_dead();
        metrics::record_endpoint_state(endpoint.base(), false);
    }

    pub fn mark_alive(&self, endpoint: &Endpoint) {
        endpoint.mark_alive();
        metrics::record_endpoint_state(endpoint.base(), true);
    }

    pub fn mark_healthy(&self, endpoint: &Endpoint) {
        endpoint.mark_healthy();
        metrics::record_endpoint_state(endpoint.base(), true);
    }

    /// True iff at least one endpoint is not dead.
    pub fn has_active(&self) -> bool {
        self.read().endpoints.iter().any(|e| !e.is_dead())
    }

    /// Fails with [`Error::NoEndpoint`] unless an endpoint is alive.
    pub fn must_have_active(&self) -> Result<()> {
        if self.has_active() {
            Ok(())
        } else {
            Err(Error::NoEndpoint("no active connection found".into()))
        }
    }

    /// Snapshot of the current endpoints, in rotation order.
    pub fn endpoints(&self) -> Vec<Arc<Endpoint>> {
        self.read().endpoints.clone()
    }

    pub fn len(&self) -> usize {
        self.read().endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().endpoints.is_empty()
    }
}

impl fmt::Display for EndpointPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.read();
        for (i, endpoint) in state.endpoints.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", endpoint)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use url::Url;

    fn endpoint(id: &str, port: u16) -> Endpoint {
        Endpoint::new(id, Url::parse(&format!("http://127.0.0.1:{port}")).unwrap())
    }

    fn pool(sniffing: bool) -> EndpointPool {
        EndpointPool::new(
            vec![endpoint("a", 9200), endpoint("b", 9201), endpoint("c", 9202)],
            sniffing,
        )
    }

    fn ids(pool: &EndpointPool, n: usize) -> Vec<String> {
        (0..n).map(|_| pool.next().unwrap().node_id().to_string()).collect()
    }

    #[test]
    fn test_round_robin_wraps() {
        let pool = pool(false);
        assert_eq!(ids(&pool, 4), vec!["a", "b", "c", "a"]);
    }

    #[test]
    fn test_dead_endpoint_skipped() {
        let pool = pool(false);
        let b = pool.endpoints()[1].clone();
        pool.mark_dead(&b);
        assert_eq!(ids(&pool, 3), vec!["a", "c", "a"]);
    }

    #[test]
    fn test_live_set_covered_once_per_lap() {
        let pool = EndpointPool::new(
            (0..5).map(|i| endpoint(&format!("n{i}"), 9200 + i)).collect(),
            false,
        );
        let eps = pool.endpoints();
        pool.mark_dead(&eps[1]);
        pool.mark_dead(&eps[3]);

        let lap = ids(&pool, 3);
        assert_eq!(lap, vec!["n0", "n2", "n4"]);
        assert_eq!(ids(&pool, 3), lap);
    }

    #[test]
    fn test_resurrects_when_sniffing_disabled() {
        let pool = pool(false);
        for e in pool.endpoints() {
            pool.mark_dead(&e);
        }
        assert!(!pool.has_active());

        let err = pool.next().unwrap_err();
        assert!(err.is_no_endpoint());
        assert!(pool.has_active());
        assert!(pool.endpoints().iter().all(|e| !e.is_dead()));

        // Resurrection keeps failure history
        assert!(pool.endpoints().iter().all(|e| e.failures() == 1));
        assert!(pool.next().is_ok());
    }

    #[test]
    fn test_no_resurrection_when_sniffing_enabled() {
        let pool = pool(true);
        for e in pool.endpoints() {
            pool.mark_dead(&e);
        }
        assert!(pool.next().unwrap_err().is_no_endpoint());
        assert!(!pool.has_active());
        assert!(pool.next().is_err());
    }

    #[test]
    fn test_empty_pool() {
        let pool = EndpointPool::new(Vec::new(), false);
        assert!(pool.next().unwrap_err().is_no_endpoint());
        assert!(pool.must_have_active().is_err());
        assert!(pool.is_empty());
    }

    #[test]
    fn test_reconcile_preserves_matched_state() {
        let pool = pool(true);
        let before = pool.endpoints();
        pool.mark_dead(&before[1]);

        pool.reconcile(vec![endpoint("a", 9200), endpoint("b", 9201), endpoint("c", 9202)]);

        let after = pool.endpoints();
        assert_eq!(after.len(), 3);
        for (old, new) in before.iter().zip(after.iter()) {
            assert!(Arc::ptr_eq(old, new));
        }
        assert!(after[1].is_dead());
        assert_eq!(after[1].failures(), 1);
    }

    #[test]
    fn test_reconcile_replaces_membership() {
        let pool = pool(true);
        pool.next().unwrap();
        pool.next().unwrap();

        // "b" moved to a new URL, "c" left, "d" joined
        pool.reconcile(vec![endpoint("a", 9200), endpoint("b", 9301), endpoint("d", 9203)]);

        let after = pool.endpoints();
        let urls: Vec<_> = after.iter().map(|e| e.url().port().unwrap()).collect();
        assert_eq!(urls, vec![9200, 9301, 9203]);

        // Cursor was reset
        assert_eq!(ids(&pool, 1), vec!["a"]);
    }

    #[test]
    fn test_display() {
        let pool = EndpointPool::new(vec![endpoint("a", 9200), endpoint("b", 9201)], false);
        assert_eq!(
            pool.to_string(),
            "http://127.0.0.1:9200 [dead=false, failures=0], http://127.0.0.1:9201 [dead=false, failures=0]"
        );
    }
}
