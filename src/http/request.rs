//! Inbound request model and outbound request construction.
//!
//! # Responsibilities
//! - Capture what the proxy needs from an inbound request
//! - Derive the path below the mount point
//! - Build the outbound request: URL, filtered headers, forwarding headers
//! - Attach the client body as a lazily read stream
//!
//! # Design Decisions
//! - Headers keep arrival order and every repeated value
//! - The body is never buffered; it is streamed to the backend as read
//! - `Content-Length` is never copied; the transport derives it from the body

use std::net::SocketAddr;

use axum::body::Body;
use axum::http::{request::Parts, Method};

use crate::http::headers::{self, canonical_name, is_hop_by_hop, HeaderList};
use crate::http::policy::{ExchangeContext, Policies};
use crate::rewrite::{percent_decode, split_fragment};

/// Everything about an inbound request except its body.
#[derive(Debug, Clone)]
pub struct RequestHead {
    pub method: Method,
    /// Raw request path as received.
    pub path: String,
    /// Raw query string, without the leading `?`.
    pub query: Option<String>,
    pub headers: HeaderList,
    pub client_addr: SocketAddr,
    /// `http` or `https`.
    pub scheme: String,
    /// Client-visible authority (`host[:port]`).
    pub authority: String,
    /// Externally visible mount path of the proxy, empty for the root.
    pub mount_path: String,
    /// Decoded remainder of the path below `mount_path`, if any.
    pub path_info: Option<String>,
}

impl RequestHead {
    /// Capture request parts received under `mount_path`.
    pub fn from_parts(parts: &Parts, client_addr: SocketAddr, mount_path: &str) -> Self {
        let headers = HeaderList::from_header_map(&parts.headers);
        let scheme = parts
            .uri
            .scheme_str()
            .unwrap_or("http")
            .to_ascii_lowercase();
        let authority = parts
            .uri
            .authority()
            .map(|a| a.as_str().to_string())
            .or_else(|| headers.get(headers::HOST).map(str::to_string))
            .unwrap_or_else(|| "localhost".to_string());

        let path = parts.uri.path().to_string();
        let path_info = path_below_mount(&path, mount_path);

        Self {
            method: parts.method.clone(),
            query: parts.uri.query().map(str::to_string),
            path,
            headers,
            client_addr,
            scheme,
            authority,
            mount_path: mount_path.to_string(),
            path_info,
        }
    }

    pub fn is_secure(&self) -> bool {
        self.scheme == "https"
    }

    /// `scheme://authority` as seen by the client.
    pub fn origin(&self) -> String {
        format!("{}://{}", self.scheme, self.authority)
    }

    /// The full URL the client requested.
    pub fn request_url(&self) -> String {
        match &self.query {
            Some(query) => format!("{}{}?{}", self.origin(), self.path, query),
            None => format!("{}{}", self.origin(), self.path),
        }
    }

    /// Query string and fragment, split at the first `#`.
    pub fn query_and_fragment(&self) -> (Option<&str>, Option<&str>) {
        match self.query.as_deref() {
            Some(raw) => {
                let (query, fragment) = split_fragment(raw);
                (Some(query), fragment)
            }
            None => (None, None),
        }
    }

    /// Whether the client announced a request body.
    pub fn has_body(&self) -> bool {
        self.headers.contains(headers::CONTENT_LENGTH)
            || self.headers.contains("Transfer-Encoding")
    }

    #[cfg(test)]
    pub(crate) fn for_test(method: &str, path: &str, query: Option<&str>, mount_path: &str) -> Self {
        let mut headers = HeaderList::new();
        headers.append("Host", "proxy.example");
        Self {
            method: method.parse().unwrap_or(Method::GET),
            path: path.to_string(),
            query: query.map(str::to_string),
            headers,
            client_addr: SocketAddr::from(([127, 0, 0, 1], 50000)),
            scheme: "http".to_string(),
            authority: "proxy.example".to_string(),
            mount_path: mount_path.to_string(),
            path_info: path_below_mount(path, mount_path),
        }
    }
}

fn path_below_mount(path: &str, mount_path: &str) -> Option<String> {
    let rest = path.strip_prefix(mount_path).unwrap_or(path);
    if rest.is_empty() {
        None
    } else {
        Some(percent_decode(rest).into_owned())
    }
}

/// An inbound request as handed to the proxy.
#[derive(Debug)]
pub struct InboundRequest {
    pub head: RequestHead,
    pub body: Body,
}

/// The request sent to the backend.
#[derive(Debug)]
pub struct OutboundRequest {
    pub method: Method,
    /// Absolute target URL.
    pub url: String,
    pub headers: HeaderList,
    /// Client body, `None` when the client sent none.
    pub body: Option<Body>,
}

/// Assemble the outbound request for an exchange.
pub fn build_outbound(ctx: &ExchangeContext<'_>, policies: &Policies, body: Body) -> OutboundRequest {
    let mut out = HeaderList::new();

    for (name, value) in ctx.head.headers.iter() {
        if is_hop_by_hop(name) || name.eq_ignore_ascii_case(headers::CONTENT_LENGTH) {
            continue;
        }
        if ctx.forwarding.handle_compression && name.eq_ignore_ascii_case(headers::ACCEPT_ENCODING) {
            continue;
        }

        let name = canonical_name(name);
        let value = if name.eq_ignore_ascii_case(headers::COOKIE) {
            policies.cookies.backend_cookie_header(ctx, value)
        } else {
            policies.headers.request_header(ctx, &name, value)
        };
        if let Some(value) = value {
            out.append(name.into_owned(), value);
        }
    }

    if ctx.forwarding.forward_client_ip {
        let client_ip = ctx.head.client_addr.ip().to_canonical().to_string();
        let forwarded_for = match out.get(headers::X_FORWARDED_FOR) {
            Some(existing) => format!("{}, {}", existing, client_ip),
            None => client_ip,
        };
        out.set(headers::X_FORWARDED_FOR, forwarded_for);

        if ctx.forwarding.forward_proto {
            out.set(headers::X_FORWARDED_PROTO, ctx.head.scheme.clone());
        }
    }

    OutboundRequest {
        method: ctx.head.method.clone(),
        url: policies.urls.request_url(ctx),
        headers: out,
        body: ctx.head.has_body().then_some(body),
    }
}
