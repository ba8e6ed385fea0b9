//! Structured logging.
//!
//! # Targets
//! - `elastic_client`: node liveness, membership changes, request timing
//! - `elastic_client::trace`: raw request/response dumps
//!   (only emitted when `observability.trace_bodies` is set)

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Target used for raw request and response dumps.
pub const TRACE_TARGET: &str = "elastic_client::trace";

/// Install a global fmt subscriber. `RUST_LOG` takes precedence over `level`.
pub fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("elastic_client={level},elastic_cli={level}").into());

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init();
}
