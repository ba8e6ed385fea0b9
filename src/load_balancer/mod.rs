//! Endpoint selection subsystem.
//!
//! # Data Flow
//! ```text
//! Executor asks for a node
//!     → pool.rs (lock, rotate)
//!     → round_robin.rs (advance cursor, skip dead endpoints)
//!     → endpoint.rs (liveness read from atomics)
//!     → Arc<Endpoint> or NoEndpoint error
//!
//! Health checker / sniffer / executor outcome
//!     → pool.rs mark_* / reconcile
//! ```
//!
//! # Design Decisions
//! - One RwLock guards the endpoint list and the rotation cursor
//! - Liveness flags are atomics on each endpoint, not under the pool lock
//! - Selection never blocks waiting for a node; it fails fast

pub mod endpoint;
pub mod pool;
pub mod round_robin;

pub use endpoint::{Endpoint, EndpointState};
pub use pool::EndpointPool;
pub use round_robin::RoundRobin;
