//! URL rewriting subsystem.
//!
//! # Data Flow
//! ```text
//! Outbound:
//!     base URI + decoded path info + raw query [+ fragment]
//!     → codec.rs (escape path with '%', query/fragment without)
//!     → mapping.rs (assemble target URL)
//!
//! Inbound:
//!     backend Location / absolute URL
//!     → mapping.rs (re-root under proxy origin + mount path if it points at the target)
//! ```

pub mod codec;
pub mod mapping;

pub use codec::{encode_query_or_fragment, percent_decode, EncodeMode};
pub use mapping::{build_target_url, map_backend_url, split_fragment};
