//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, mount routing, request ID, tracing)
//!     → request.rs (inbound head, outbound URL/headers/body)
//!         ↳ headers.rs (hop-by-hop filter, canonical names)
//!         ↳ cookies.rs (namespace on the way in, strip on the way out)
//!         ↳ policy.rs (overridable header/cookie/URL decisions)
//!     → client.rs (backend exchange, timeouts, connection slots)
//!     → response.rs (Location and Set-Cookie rewrite, 304 handling)
//!     → stream.rs (bulk or block copy to the client)
//! ```
//! handler.rs sequences these steps for one exchange.

pub mod client;
pub mod cookies;
pub mod handler;
pub mod headers;
pub mod policy;
pub mod request;
pub mod response;
pub mod server;
pub mod stream;

pub use client::{BackendClient, BackendResponse, HyperBackendClient};
pub use handler::ProxyService;
pub use headers::HeaderList;
pub use policy::{
    CookiePolicy, ExchangeContext, HeaderForwardPolicy, Policies, StandardPolicy, UrlRewritePolicy,
};
pub use request::{InboundRequest, OutboundRequest, RequestHead};
pub use server::{HttpServer, X_REQUEST_ID};
