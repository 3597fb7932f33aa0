//! Backend network resources.
//!
//! # Data Flow
//! ```text
//! Outbound exchange:
//!     limiter.rs (wait for a connection slot, bounded by timeout)
//!     → backend client sends the request
//!     → ConnectionLease rides with the response body
//!     → released when the body finishes or is dropped
//! ```

pub mod limiter;

pub use limiter::{ConnectionLease, ConnectionLimiter};
