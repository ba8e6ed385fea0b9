//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Calls (context.rs):
//!     Caller token / deadline → Context
//!     → raced against send, body read, retry sleep, probes
//!
//! Background loops (task.rs):
//!     Client::start → BackgroundTask::spawn (health checker, sniffer)
//!     Client::stop  → cancel token → await JoinHandle (acknowledged exit)
//! ```
//!
//! # Design Decisions
//! - Cancellation is never interpreted as a node failure
//! - Shutdown is synchronous: stop returns only after the loop exited

pub mod context;
pub mod task;

pub use context::Context;
pub use task::BackgroundTask;
