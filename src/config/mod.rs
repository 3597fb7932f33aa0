//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML) + CLI overrides
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → ProxyConfig (validated, immutable)
//!     → shared via Arc by every request
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; there is no reload path
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, load_with_overrides, parse_config, ConfigError, ConfigOverrides};
pub use schema::{
    ClientConfig, CookieConfig, ForwardingConfig, ListenerConfig, LogFormat, ObservabilityConfig,
    ProxyConfig, TargetConfig, TargetMode,
};
pub use validation::{validate_config, ValidationError};
