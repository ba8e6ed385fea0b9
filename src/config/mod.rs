//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)            ClientBuilder setters
//!     → loader.rs (parse)           │
//!     → validation.rs ◀─────────────┘
//!     → ClientConfig (validated)
//!     → ClientSettings snapshot (ArcSwap) shared by executor,
//!       health checker and sniffer
//! ```
//!
//! # Design Decisions
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks
//! - Runtime settings are swapped atomically; a call reads one snapshot

pub mod loader;
pub mod schema;
pub mod validation;

pub use schema::{
    BasicAuthConfig, ClientConfig, HealthcheckConfig, ObservabilityConfig, RetryConfig,
    SnifferConfig,
};
pub use validation::ValidationError;
