//! Transport subsystem.
//!
//! # Data Flow
//! ```text
//! Client::perform_request(ctx, RequestOptions)
//!     → executor.rs (select node, send, retry, bookkeeping)
//!     → request.rs (URL, body encoding, gzip)
//!     → settings.rs (headers, auth, retrier, decoder snapshot)
//!     → response.rs (bounded body read, decoding, deprecations)
//! ```

pub mod executor;
pub mod request;
pub mod response;
pub mod settings;

pub use executor::Executor;
pub use request::{Body, RequestOptions};
pub use response::{Decoder, DefaultDecoder, DeprecationWarning, Response};
pub use settings::{ClientSettings, DeprecationHook};
