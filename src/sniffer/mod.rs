//! Sniffing subsystem.
//!
//! # Data Flow
//! ```text
//! Client startup / background loop:
//!     → periodic.rs (seed URLs + live members)
//!     → discover.rs (GET /_nodes/http, first non-empty answer)
//!     → EndpointPool::reconcile
//! ```

pub mod discover;
pub mod periodic;

pub use discover::{extract_url, DiscoveredNode, Discoverer, NodesInfoDiscoverer};
pub use periodic::Sniffer;
