//! Retry subsystem.
//!
//! # Data Flow
//! ```text
//! Failed attempt (no endpoint, transport error, retryable status):
//!     → retrier.rs (Retrier::retry → Retry(wait) | Stop | Err(fatal))
//!     → backoff.rs (wait duration for retry n)
//!     → executor sleeps (cancellable) and loops
//! ```
//!
//! # Design Decisions
//! - Jittered backoff prevents thundering herd
//! - A fatal policy error short-circuits all retrying
//! - Application errors are retried only through the status-code list

pub mod backoff;
pub mod retrier;

pub use backoff::{Backoff, ConstantBackoff, ExponentialBackoff, SimpleBackoff};
pub use retrier::{Attempt, BackoffRetrier, RequestInfo, Retrier, RetryDecision, StopRetrier};
