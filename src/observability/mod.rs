//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Pool, health checker, sniffer, executor produce:
//!     → logging.rs (tracing events, trace-target dumps)
//!     → metrics.rs (counters, gauges, histograms)
//!     → deprecation hook (caller supplied)
//! ```
//!
//! # Design Decisions
//! - Pluggable loggers are tracing targets; the subscriber decides routing
//! - Metrics go through the facade; no exporter is installed by the library

pub mod logging;
pub mod metrics;
