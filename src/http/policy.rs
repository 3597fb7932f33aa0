//! Pluggable forwarding policies.
//!
//! # Responsibilities
//! - Decide the outbound value of each forwarded request header
//! - Decide the client value of each relayed response header
//! - Build client cookies and the backend `Cookie` header
//! - Map URLs between the proxy mount and the target
//!
//! # Design Decisions
//! - One trait per concern, each method with the standard behaviour as its
//!   default body; a custom policy overrides only what it changes
//! - Policies are stateless with respect to requests and shared via `Arc`
//! - Every method receives the same read-only [`ExchangeContext`]

use std::sync::Arc;

use crate::config::ForwardingConfig;
use crate::http::cookies::{self, ClientCookieScope, CookieView};
use crate::http::headers;
use crate::http::request::RequestHead;
use crate::rewrite::{build_target_url, map_backend_url};
use crate::routing::ResolvedTarget;

/// Read-only facts about one proxied exchange.
#[derive(Debug, Clone, Copy)]
pub struct ExchangeContext<'a> {
    pub head: &'a RequestHead,
    pub target: &'a ResolvedTarget,
    pub forwarding: &'a ForwardingConfig,
    /// Cookie name prefix, e.g. `!Proxy!svc`.
    pub cookie_prefix: &'a str,
}

/// Per-header forwarding decisions.
pub trait HeaderForwardPolicy: Send + Sync {
    /// Outbound value for a client header, `None` to drop it.
    ///
    /// Called after hop-by-hop and length headers are filtered and the
    /// name is canonicalized. `Cookie` is handled by [`CookiePolicy`].
    fn request_header(&self, ctx: &ExchangeContext<'_>, name: &str, value: &str) -> Option<String> {
        let is_host = name.eq_ignore_ascii_case(headers::HOST)
            || name.eq_ignore_ascii_case(headers::ORIGIN);
        if is_host && !ctx.forwarding.preserve_host {
            Some(ctx.target.host_header())
        } else {
            Some(value.to_string())
        }
    }

    /// Client value for a backend header, `None` to drop it.
    ///
    /// Called for headers other than hop-by-hop, `Location` and cookies.
    fn response_header(&self, _ctx: &ExchangeContext<'_>, _name: &str, value: &str) -> Option<String> {
        Some(value.to_string())
    }
}

/// Cookie translation between backend and client.
pub trait CookiePolicy: Send + Sync {
    /// Rewrite a backend cookie before it is handed to the client.
    fn client_cookie(&self, ctx: &ExchangeContext<'_>, cookie: &CookieView) -> CookieView {
        let scope = ClientCookieScope {
            prefix: ctx.cookie_prefix,
            mount_path: &ctx.head.mount_path,
            preserve_cookies: ctx.forwarding.preserve_cookies,
            preserve_cookie_path: ctx.forwarding.preserve_cookie_path,
            request_secure: ctx.head.is_secure(),
        };
        cookies::to_client_cookie(cookie, &scope)
    }

    /// Outbound `Cookie` header from the client's, `None` to send none.
    fn backend_cookie_header(&self, ctx: &ExchangeContext<'_>, value: &str) -> Option<String> {
        if ctx.forwarding.preserve_cookies {
            Some(value.to_string())
        } else {
            cookies::to_backend_cookie_header(value, ctx.cookie_prefix)
        }
    }
}

/// URL mapping in both directions.
pub trait UrlRewritePolicy: Send + Sync {
    /// Rewrite the query string before it is encoded and forwarded.
    fn rewrite_query(&self, _ctx: &ExchangeContext<'_>, query: Option<&str>) -> Option<String> {
        query.map(str::to_string)
    }

    /// The full outbound URL for this request.
    fn request_url(&self, ctx: &ExchangeContext<'_>) -> String {
        let (query, fragment) = ctx.head.query_and_fragment();
        let query = self.rewrite_query(ctx, ctx.target.forward_query(query));
        let fragment = fragment.filter(|_| ctx.forwarding.send_url_fragment);
        build_target_url(
            &ctx.target.base_uri,
            ctx.head.path_info.as_deref(),
            query.as_deref(),
            fragment,
            ctx.target.encode_mode(),
        )
    }

    /// Map a backend URL, such as a redirect `Location`, for the client.
    fn backend_url(&self, ctx: &ExchangeContext<'_>, url: &str) -> String {
        map_backend_url(
            url,
            &ctx.target.base_uri,
            &ctx.head.origin(),
            &ctx.head.mount_path,
        )
    }
}

/// The standard behaviour for every policy.
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardPolicy;

impl HeaderForwardPolicy for StandardPolicy {}
impl CookiePolicy for StandardPolicy {}
impl UrlRewritePolicy for StandardPolicy {}

/// The set of policies a proxy instance runs with.
#[derive(Clone)]
pub struct Policies {
    pub headers: Arc<dyn HeaderForwardPolicy>,
    pub cookies: Arc<dyn CookiePolicy>,
    pub urls: Arc<dyn UrlRewritePolicy>,
}

impl Policies {
    pub fn with_headers(mut self, policy: impl HeaderForwardPolicy + 'static) -> Self {
        self.headers = Arc::new(policy);
        self
    }

    pub fn with_cookies(mut self, policy: impl CookiePolicy + 'static) -> Self {
        self.cookies = Arc::new(policy);
        self
    }

    pub fn with_urls(mut self, policy: impl UrlRewritePolicy + 'static) -> Self {
        self.urls = Arc::new(policy);
        self
    }
}

impl Default for Policies {
    fn default() -> Self {
        Self {
            headers: Arc::new(StandardPolicy),
            cookies: Arc::new(StandardPolicy),
            urls: Arc::new(StandardPolicy),
        }
    }
}

impl std::fmt::Debug for Policies {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Policies").finish_non_exhaustive()
    }
}
