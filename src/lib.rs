//! Mountable HTTP reverse proxy library.
//!
//! A [`ProxyService`] forwards every request received under a mount path
//! to one backend target, rewriting headers, cookies and redirect
//! locations so the backend appears to live under the mount.

pub mod config;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod rewrite;
pub mod routing;

pub use config::schema::ProxyConfig;
pub use error::{ProxyError, Result};
pub use http::{BackendClient, HttpServer, HyperBackendClient, Policies, ProxyService};
pub use lifecycle::Shutdown;
