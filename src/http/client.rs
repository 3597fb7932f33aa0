//! Backend HTTP client.
//!
//! # Responsibilities
//! - Execute one outbound request against the resolved target
//! - Enforce connect, read and connection-slot timeouts
//! - Optionally decompress responses and follow redirects
//! - Never store or send cookies of its own
//!
//! # Design Decisions
//! - [`BackendClient`] is the seam for alternative transports
//! - The bundled client speaks plain HTTP/1.1; TLS belongs to a custom client
//! - Header names are written title-cased on the wire
//! - Redirects are only followed when no request body has to be replayed

use std::future::Future;
use std::time::Duration;

use axum::body::Body;
use axum::http::{header, Method, Request, Response, StatusCode, Uri};
use http_body_util::BodyExt;
use hyper::body::Incoming;
use hyper::ext::ReasonPhrase;
use hyper_util::client::legacy::{connect::HttpConnector, Client};
use hyper_util::rt::TokioExecutor;
use percent_encoding::{utf8_percent_encode, CONTROLS};
use tower::ServiceExt;
use tower_http::decompression::Decompression;

use crate::config::{ClientConfig, ForwardingConfig};
use crate::error::{ProxyError, Result};
use crate::http::headers::{self, HeaderList};
use crate::http::request::OutboundRequest;
use crate::http::stream::BackendBody;
use crate::net::{ConnectionLease, ConnectionLimiter};
use crate::routing::ResolvedTarget;

/// Maximum redirects followed for one request.
pub const MAX_REDIRECTS: usize = 10;

/// A backend response as received.
pub struct BackendResponse {
    pub status: StatusCode,
    /// Reason phrase, when the backend sent a non-standard one.
    pub reason: Option<String>,
    pub headers: HeaderList,
    /// Whether the body arrived with chunked transfer encoding.
    pub chunked: bool,
    pub body: BackendBody,
    /// Connection slot held for as long as the body is alive.
    pub lease: Option<ConnectionLease>,
}

impl std::fmt::Debug for BackendResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendResponse")
            .field("status", &self.status)
            .field("reason", &self.reason)
            .field("headers", &self.headers)
            .field("chunked", &self.chunked)
            .finish_non_exhaustive()
    }
}

/// Transport used to reach the backend.
pub trait BackendClient: Send + Sync + 'static {
    /// Send `request` to `target` and return the response head with a
    /// streaming body.
    fn execute(
        &self,
        target: &ResolvedTarget,
        request: OutboundRequest,
    ) -> impl Future<Output = Result<BackendResponse>> + Send;
}

/// Pooled hyper client.
#[derive(Clone)]
pub struct HyperBackendClient {
    client: Client<HttpConnector, Body>,
    limiter: Option<ConnectionLimiter>,
    read_timeout: Option<Duration>,
    handle_compression: bool,
    handle_redirects: bool,
}

impl HyperBackendClient {
    pub fn new(config: &ClientConfig, forwarding: &ForwardingConfig) -> Self {
        let mut connector = HttpConnector::new();
        connector.set_connect_timeout(config.connect_timeout());
        connector.set_nodelay(true);

        let mut builder = Client::builder(TokioExecutor::new());
        builder.http1_title_case_headers(true);
        if config.max_connections > 0 {
            builder.pool_max_idle_per_host(config.max_connections);
        }
        let client = builder.build(connector);

        let limiter = (config.max_connections > 0).then(|| {
            ConnectionLimiter::new(config.max_connections, config.connection_request_timeout())
        });

        Self {
            client,
            limiter,
            read_timeout: config.read_timeout(),
            handle_compression: forwarding.handle_compression,
            handle_redirects: forwarding.handle_redirects,
        }
    }

    async fn send(&self, request: Request<Body>) -> Result<Response<BackendBody>> {
        let call = async {
            if self.handle_compression {
                Decompression::new(self.client.clone())
                    .oneshot(request)
                    .await
                    .map(|response| response.map(|body| body.map_err(Into::into).boxed_unsync()))
                    .map_err(|e| classify(&e))
            } else {
                self.client
                    .request(request)
                    .await
                    .map(|response| response.map(box_incoming))
                    .map_err(|e| classify(&e))
            }
        };

        match self.read_timeout {
            Some(limit) => tokio::time::timeout(limit, call)
                .await
                .map_err(|_| ProxyError::BackendTimeout(format!("no response within {:?}", limit)))?,
            None => call.await,
        }
    }
}

fn box_incoming(body: Incoming) -> BackendBody {
    body.map_err(Into::into).boxed_unsync()
}

fn classify(error: &(dyn std::error::Error + 'static)) -> ProxyError {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }

    let is_connect = error
        .downcast_ref::<hyper_util::client::legacy::Error>()
        .is_some_and(|e| e.is_connect());
    if is_connect {
        if message.contains("timed out") || message.contains("timeout") {
            ProxyError::BackendTimeout(message)
        } else {
            ProxyError::BackendConnect(message)
        }
    } else {
        ProxyError::Backend(message)
    }
}

/// Convert a target URL string into a request URI.
///
/// The fragment is dropped; remaining non-ASCII and control characters
/// are percent-encoded.
pub fn to_request_uri(url: &str) -> Result<Uri> {
    let without_fragment = url.split_once('#').map_or(url, |(head, _)| head);
    utf8_percent_encode(without_fragment, CONTROLS)
        .to_string()
        .parse::<Uri>()
        .map_err(|e| ProxyError::InvalidTarget {
            target: url.to_string(),
            reason: e.to_string(),
        })
}

fn redirect_method(status: StatusCode, method: &Method) -> Option<Method> {
    match status.as_u16() {
        303 => Some(if method == Method::HEAD { Method::HEAD } else { Method::GET }),
        301 | 302 if method == Method::POST => Some(Method::GET),
        301 | 302 | 307 | 308 => Some(method.clone()),
        _ => None,
    }
}

fn build_request(method: Method, uri: Uri, headers: &HeaderList, body: Option<Body>) -> Result<Request<Body>> {
    let mut request = Request::builder()
        .method(method)
        .uri(uri)
        .body(body.unwrap_or_else(Body::empty))
        .map_err(|e| ProxyError::Backend(e.to_string()))?;
    *request.headers_mut() = headers.to_header_map()?;
    Ok(request)
}

impl BackendClient for HyperBackendClient {
    async fn execute(&self, _target: &ResolvedTarget, request: OutboundRequest) -> Result<BackendResponse> {
        let lease = match &self.limiter {
            Some(limiter) => Some(limiter.acquire().await?),
            None => None,
        };

        let OutboundRequest {
            mut method,
            url,
            headers: mut outbound_headers,
            body,
        } = request;

        let mut uri = to_request_uri(&url)?;
        let mut has_body = body.is_some();
        let mut response = self.send(build_request(method.clone(), uri.clone(), &outbound_headers, body)?).await?;

        if self.handle_redirects {
            let mut hops = 0;
            while hops < MAX_REDIRECTS {
                let Some(next_method) = redirect_method(response.status(), &method) else {
                    break;
                };
                let switches_to_bodiless = next_method != method || response.status() == StatusCode::SEE_OTHER;
                if has_body && !switches_to_bodiless {
                    // The streamed body is gone; hand the redirect back.
                    break;
                }
                let Some(location) = response
                    .headers()
                    .get(header::LOCATION)
                    .and_then(|v| v.to_str().ok())
                else {
                    break;
                };
                let next = url::Url::parse(&uri.to_string())
                    .and_then(|base| base.join(location))
                    .map_err(|e| ProxyError::Backend(format!("bad redirect location {}: {}", location, e)))?;
                let next_uri = to_request_uri(next.as_str())?;

                tracing::debug!(
                    status = response.status().as_u16(),
                    location = %next,
                    "Following backend redirect"
                );

                if let Some(authority) = next_uri.authority() {
                    if uri.authority() != Some(authority) {
                        outbound_headers.set(headers::HOST, authority.as_str());
                    }
                }
                if switches_to_bodiless {
                    has_body = false;
                }
                method = next_method;
                uri = next_uri;
                response = self.send(build_request(method.clone(), uri.clone(), &outbound_headers, None)?).await?;
                hops += 1;
            }
        }

        let (parts, body) = response.into_parts();
        let reason = parts
            .extensions
            .get::<ReasonPhrase>()
            .and_then(|r| std::str::from_utf8(r.as_bytes()).ok())
            .map(str::to_string);
        let chunked = parts
            .headers
            .get(header::TRANSFER_ENCODING)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.to_ascii_lowercase().contains("chunked"));

        Ok(BackendResponse {
            status: parts.status,
            reason,
            headers: HeaderList::from_header_map(&parts.headers),
            chunked,
            body,
            lease,
        })
    }
}
