//! Target resolution subsystem.
//!
//! # Data Flow
//! ```text
//! Startup:
//!     TargetConfig
//!     → static: parse URI once → ResolvedTarget
//!     → template: template.rs compiles placeholders → UriTemplate
//!
//! Per request (target.rs):
//!     raw query string
//!     → TargetResolver::resolve
//!     → ResolvedTarget (base URI, host/port/scheme, residual query)
//! ```
//!
//! # Design Decisions
//! - Resolver is built at startup and immutable afterwards
//! - Template parameters are consumed and never forwarded to the backend

pub mod target;
pub mod template;

pub use target::{ResolvedTarget, TargetResolver};
pub use template::UriTemplate;
