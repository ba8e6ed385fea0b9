//! Health checking subsystem.
//!
//! # Data Flow
//! ```text
//! Client startup:
//!     → startup.rs (probe seed URLs until one answers)
//! Background loop / forced sweep on "no endpoint":
//!     → checker.rs (HEAD / on every node, concurrently)
//!     → EndpointPool::mark_alive / mark_dead
//! ```
//!
//! # Design Decisions
//! - A sweep interrupted by cancellation changes nothing
//! - Probes carry the client's auth and default headers

pub mod checker;
pub mod startup;

pub use checker::HealthChecker;
