//! Per-request orchestration.
//!
//! Sequences one proxied exchange:
//!
//! ```text
//! InboundRequest
//!     → TargetResolver::resolve      (template params consumed)
//!     → request::build_outbound      (URL, headers, cookies, body)
//!     → BackendClient::execute
//!     → response::translate_head     (Location, Set-Cookie, 304)
//!     → stream::ProxyBody            (bulk or block copy)
//!     → client response
//! ```
//!
//! The backend response is always either streamed to completion or dropped,
//! which closes it, before the handler's result is discarded.

use std::sync::Arc;
use std::time::Instant;

use axum::body::Body;
use axum::http::{HeaderValue, Response};
use axum::response::IntoResponse;
use hyper::ext::ReasonPhrase;

use crate::config::ProxyConfig;
use crate::error::Result;
use crate::http::client::{BackendClient, BackendResponse};
use crate::http::policy::{ExchangeContext, Policies};
use crate::http::request::{build_outbound, InboundRequest};
use crate::http::response::{translate_head, ClientResponseHead};
use crate::http::stream::{CopyMode, ProxyBody};
use crate::observability::metrics;
use crate::routing::TargetResolver;

/// The proxy core for one configured instance.
pub struct ProxyService<C> {
    config: Arc<ProxyConfig>,
    resolver: TargetResolver,
    policies: Policies,
    cookie_prefix: String,
    client: C,
}

impl<C: BackendClient> ProxyService<C> {
    /// Build the service. Fails if the target cannot be parsed.
    pub fn new(config: Arc<ProxyConfig>, client: C) -> Result<Self> {
        Self::with_policies(config, client, Policies::default())
    }

    /// Build the service with custom forwarding policies.
    pub fn with_policies(config: Arc<ProxyConfig>, client: C, policies: Policies) -> Result<Self> {
        let resolver = TargetResolver::from_config(&config.target)?;
        let cookie_prefix = config.cookies.prefix();
        Ok(Self {
            config,
            resolver,
            policies,
            cookie_prefix,
            client,
        })
    }

    pub fn config(&self) -> &ProxyConfig {
        &self.config
    }

    #[cfg(test)]
    pub(crate) fn client_for_test(&self) -> &C {
        &self.client
    }

    /// Proxy one request. Failures become plain-text error responses.
    pub async fn handle(&self, request: InboundRequest) -> Response<Body> {
        let start = Instant::now();
        let method = request.head.method.clone();

        let response = match self.forward(request).await {
            Ok(response) => response,
            Err(e) => {
                if e.is_proxy_side() {
                    tracing::warn!(error = %e, method = %method, "Proxy request failed");
                } else {
                    tracing::error!(error = %e, kind = e.kind(), method = %method, "Backend exchange failed");
                    metrics::record_backend_error(e.kind());
                }
                e.into_response()
            }
        };

        metrics::record_request(method.as_str(), response.status().as_u16(), start);
        response
    }

    async fn forward(&self, request: InboundRequest) -> Result<Response<Body>> {
        let InboundRequest { head, body } = request;
        let (query, _) = head.query_and_fragment();
        let target = self.resolver.resolve(query)?;

        let ctx = ExchangeContext {
            head: &head,
            target: &target,
            forwarding: &self.config.forwarding,
            cookie_prefix: &self.cookie_prefix,
        };

        let outbound = build_outbound(&ctx, &self.policies, body);
        if self.config.observability.log_requests {
            tracing::info!(
                "proxy {} uri: {} -- {}",
                head.method,
                head.request_url(),
                outbound.url
            );
        }

        let backend = self.client.execute(&target, outbound).await?;
        tracing::debug!(
            status = backend.status.as_u16(),
            chunked = backend.chunked,
            "Backend responded"
        );

        let client_head = translate_head(
            &ctx,
            &self.policies,
            backend.status,
            backend.reason.clone(),
            &backend.headers,
        )?;

        self.client_response(client_head, backend)
    }

    fn client_response(&self, head: ClientResponseHead, backend: BackendResponse) -> Result<Response<Body>> {
        let body = if head.bodiless {
            // Dropping the backend body here closes it.
            drop(backend.body);
            Body::empty()
        } else {
            use http_body::Body as _;
            let mode = CopyMode::select(
                backend.chunked,
                backend.body.size_hint().exact(),
                self.config.forwarding.handle_compression,
            );
            Body::new(ProxyBody::new(backend.body, mode, backend.lease))
        };

        let mut response = Response::new(body);
        *response.status_mut() = head.status;
        *response.headers_mut() = head.headers.to_header_map()?;

        if let Some(reason) = head.reason {
            match ReasonPhrase::try_from(reason) {
                Ok(phrase) => {
                    response.extensions_mut().insert(phrase);
                }
                Err(_) => tracing::debug!("Dropping unrepresentable backend reason phrase"),
            }
        }

        if head.bodiless && !response.headers().contains_key(axum::http::header::CONTENT_LENGTH) {
            response
                .headers_mut()
                .insert(axum::http::header::CONTENT_LENGTH, HeaderValue::from_static("0"));
        }

        Ok(response)
    }
}

impl<C> std::fmt::Debug for ProxyService<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProxyService")
            .field("target", &self.config.target.uri)
            .field("cookie_prefix", &self.cookie_prefix)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use bytes::Bytes;
    use http_body_util::{BodyExt, Full};

    use crate::config::TargetMode;
    use crate::error::ProxyError;
    use crate::http::headers::HeaderList;
    use crate::http::request::{OutboundRequest, RequestHead};
    use crate::routing::ResolvedTarget;

    /// Records the outbound request and answers with a canned response.
    struct CannedClient {
        status: u16,
        headers: Vec<(&'static str, &'static str)>,
        body: &'static str,
        seen: Mutex<Option<(String, HeaderList)>>,
    }

    impl CannedClient {
        fn new(status: u16, headers: Vec<(&'static str, &'static str)>, body: &'static str) -> Self {
            Self {
                status,
                headers,
                body,
                seen: Mutex::new(None),
            }
        }
    }

    impl BackendClient for CannedClient {
        async fn execute(&self, _target: &ResolvedTarget, request: OutboundRequest) -> Result<BackendResponse> {
            *self.seen.lock().unwrap() = Some((request.url, request.headers));
            Ok(BackendResponse {
                status: axum::http::StatusCode::from_u16(self.status).unwrap(),
                reason: None,
                headers: self
                    .headers
                    .iter()
                    .map(|(n, v)| (n.to_string(), v.to_string()))
                    .collect(),
                chunked: false,
                body: Full::new(Bytes::from_static(self.body.as_bytes()))
                    .map_err(|never| match never {})
                    .boxed_unsync(),
                lease: None,
            })
        }
    }

    fn config(uri: &str, mode: TargetMode) -> Arc<ProxyConfig> {
        let mut config = ProxyConfig::default();
        config.target.uri = uri.to_string();
        config.target.mode = mode;
        config.listener.mount_path = "/proxy".to_string();
        config.cookies.namespace = "svc".to_string();
        Arc::new(config)
    }

    fn inbound(path: &str, query: Option<&str>) -> InboundRequest {
        InboundRequest {
            head: RequestHead::for_test("GET", path, query, "/proxy"),
            body: Body::empty(),
        }
    }

    #[tokio::test]
    async fn test_round_trip() {
        let client = CannedClient::new(
            200,
            vec![("Content-Type", "text/plain"), ("Set-Cookie", "sid=1; Path=/")],
            "hello",
        );
        let service = ProxyService::new(config("http://backend/api", TargetMode::Static), client).unwrap();

        let response = service.handle(inbound("/proxy/x", Some("a=1"))).await;
        assert_eq!(response.status(), 200);
        assert_eq!(
            response.headers().get("set-cookie").unwrap(),
            "!Proxy!svcsid=1; Path=/proxy"
        );

        let (url, headers) = service.client.seen.lock().unwrap().clone().unwrap();
        assert_eq!(url, "http://backend/api/x?a=1");
        assert_eq!(headers.get("Host"), Some("backend"));

        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(body, "hello");
    }

    #[tokio::test]
    async fn test_not_modified_has_no_body() {
        let client = CannedClient::new(304, vec![("ETag", "\"v\"")], "should not be sent");
        let service = ProxyService::new(config("http://backend", TargetMode::Static), client).unwrap();

        let response = service.handle(inbound("/proxy", None)).await;
        assert_eq!(response.status(), 304);
        assert_eq!(response.headers().get("content-length").unwrap(), "0");
        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert!(body.is_empty());
    }

    #[tokio::test]
    async fn test_missing_template_param_never_reaches_backend() {
        let client = CannedClient::new(200, vec![], "");
        let service = ProxyService::new(
            config("http://{host}:{port}/", TargetMode::Template),
            client,
        )
        .unwrap();

        let response = service.handle(inbound("/proxy", Some("host=localhost"))).await;
        assert_eq!(response.status(), 500);
        assert!(service.client.seen.lock().unwrap().is_none());
    }

    #[tokio::test]
    async fn test_template_params_stripped_from_forwarded_query() {
        let client = CannedClient::new(200, vec![], "");
        let service = ProxyService::new(
            config("http://{host}:{port}/{path}", TargetMode::Template),
            client,
        )
        .unwrap();

        service
            .handle(inbound("/proxy", Some("host=localhost&port=8080&path=api&x=1")))
            .await;
        let (url, _) = service.client.seen.lock().unwrap().clone().unwrap();
        assert_eq!(url, "http://localhost:8080/api?x=1");
    }

    #[tokio::test]
    async fn test_redirect_without_location_is_bad_gateway() {
        let client = CannedClient::new(302, vec![], "");
        let service = ProxyService::new(config("http://backend", TargetMode::Static), client).unwrap();
        let response = service.handle(inbound("/proxy", None)).await;
        assert_eq!(response.status(), 502);
    }

    #[test]
    fn test_bad_static_target_fails_startup() {
        let client = CannedClient::new(200, vec![], "");
        let err = ProxyService::new(config("not a uri", TargetMode::Static), client).unwrap_err();
        assert!(matches!(err, ProxyError::Config(_)));
    }
}
