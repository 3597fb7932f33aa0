//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum Router that mounts the proxy under `mount_path`
//! - Wire up middleware (request ID, tracing, request timeout)
//! - Turn each Axum request into an [`InboundRequest`]
//! - Serve until the shutdown future resolves, then drain
//!
//! # Design Decisions
//! - Every method is routed; the proxy does not interpret methods
//! - Paths outside the mount answer 404 without touching the backend
//! - The client address comes from `ConnectInfo`, never from headers

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{Request, Response, StatusCode},
    response::IntoResponse,
    routing::any,
    Router,
};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::http::client::BackendClient;
use crate::http::handler::ProxyService;
use crate::http::request::{InboundRequest, RequestHead};

/// Header carrying the per-request correlation ID.
pub const X_REQUEST_ID: &str = "x-request-id";

/// HTTP server fronting one [`ProxyService`].
pub struct HttpServer<C> {
    router: Router,
    service: Arc<ProxyService<C>>,
}

impl<C: BackendClient> HttpServer<C> {
    pub fn new(service: ProxyService<C>) -> Self {
        let service = Arc::new(service);
        let router = Self::build_router(service.clone());
        Self { router, service }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(service: Arc<ProxyService<C>>) -> Router {
        let listener = &service.config().listener;
        let timeout = Duration::from_secs(listener.request_timeout_secs);
        let mount = listener.mount_path.clone();

        let routes = if mount.is_empty() {
            Router::new()
                .route("/", any(proxy_handler::<C>))
                .route("/{*rest}", any(proxy_handler::<C>))
        } else {
            Router::new()
                .route(&mount, any(proxy_handler::<C>))
                .route(&format!("{}/", mount), any(proxy_handler::<C>))
                .route(&format!("{}/{{*rest}}", mount), any(proxy_handler::<C>))
        };

        routes
            .fallback(not_mounted)
            .with_state(service)
            .layer(
                ServiceBuilder::new()
                    .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                    .layer(TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                        let request_id = request
                            .headers()
                            .get(X_REQUEST_ID)
                            .and_then(|v| v.to_str().ok())
                            .unwrap_or("-");
                        tracing::info_span!(
                            "request",
                            method = %request.method(),
                            uri = %request.uri(),
                            request_id = %request_id,
                        )
                    }))
                    .layer(PropagateRequestIdLayer::x_request_id())
                    .layer(TimeoutLayer::new(timeout)),
            )
    }

    /// The fully layered router, for embedding or in-process tests.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub fn service(&self) -> &ProxyService<C> {
        &self.service
    }

    /// Run the server until `shutdown` resolves, then let in-flight
    /// requests finish.
    pub async fn run<F>(self, listener: TcpListener, shutdown: F) -> Result<(), std::io::Error>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = listener.local_addr()?;
        let config = self.service.config();
        tracing::info!(
            address = %addr,
            mount_path = %config.listener.mount_path,
            target = %config.target.uri,
            "HTTP server starting"
        );

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Hand a mounted request to the proxy core.
async fn proxy_handler<C: BackendClient>(
    State(service): State<Arc<ProxyService<C>>>,
    ConnectInfo(client_addr): ConnectInfo<SocketAddr>,
    request: Request<Body>,
) -> Response<Body> {
    let (parts, body) = request.into_parts();
    let head = RequestHead::from_parts(&parts, client_addr, &service.config().listener.mount_path);

    tracing::debug!(
        method = %head.method,
        path = %head.path,
        client = %client_addr,
        "Proxying request"
    );

    service.handle(InboundRequest { head, body }).await
}

async fn not_mounted() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, "Not found")
}
