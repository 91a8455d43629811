//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with all handlers
//! - Wire up middleware (tracing, limits, request ID, metrics)
//! - Bind server to listener, plain or TLS
//! - Drain in-flight requests on shutdown

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::{DefaultBodyLimit, Request};
use axum::http::HeaderMap;
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::{any, get, post};
use axum::Router;
use axum_server::tls_rustls::RustlsConfig;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower::ServiceBuilder;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::auth::{AuthorizationGate, Session, SessionProvider, SessionStore};
use crate::config::GatewayConfig;
use crate::http::forward::UpstreamClient;
use crate::http::handlers::{self, evoting, proxies, roles, session};
use crate::observability::metrics;
use crate::signing::RequestSigner;
use crate::storage::ProxyDirectory;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub signer: RequestSigner,
    pub proxies: ProxyDirectory,
    pub gate: AuthorizationGate,
    pub sessions: Arc<SessionStore>,
    pub upstream: UpstreamClient,
    pub default_node_url: Arc<str>,
}

impl AppState {
    /// The caller's session, resolved through the session provider.
    pub fn session(&self, headers: &HeaderMap) -> Option<Session> {
        SessionProvider::session(self.sessions.as_ref(), headers)
    }
}

/// HTTP server for the signing gateway.
pub struct GatewayServer {
    router: Router,
}

impl GatewayServer {
    pub fn new(config: &GatewayConfig, state: AppState) -> Self {
        Self {
            router: Self::build_router(config, state),
        }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    pub fn build_router(config: &GatewayConfig, state: AppState) -> Router {
        let proxy_routes = Router::new()
            .route(
                "/api/proxies",
                get(proxies::list_proxies).post(proxies::add_proxy),
            )
            .route(
                "/api/proxies/{node}",
                get(proxies::get_proxy)
                    .put(proxies::update_proxy)
                    .delete(proxies::delete_proxy),
            )
            .route_layer(middleware::from_fn_with_state(
                state.clone(),
                proxies::require_proxy_grant,
            ));

        let mut router = Router::new()
            .route("/api/config/proxy", get(proxies::default_proxy))
            .merge(proxy_routes)
            .route("/api/evoting/{*rest}", any(evoting::dispatch))
            .route("/api/personal_info", get(session::personal_info))
            .route("/api/logout", post(session::logout))
            .route("/api/user_rights", get(roles::user_rights))
            .route("/api/add_role", post(roles::add_role))
            .route("/api/remove_role", post(roles::remove_role));

        if config.session.dev_login {
            tracing::warn!("Development login enabled");
            router = router.route("/api/get_dev_login/{user}", get(session::dev_login));
        }

        router
            .fallback(handlers::not_found)
            .with_state(state)
            .layer(middleware::from_fn(record_request))
            .layer(DefaultBodyLimit::disable())
            .layer(
                ServiceBuilder::new()
                    .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                    .layer(TraceLayer::new_for_http())
                    .layer(PropagateRequestIdLayer::x_request_id())
                    .layer(RequestBodyLimitLayer::new(config.security.max_body_size))
                    // Innermost: `Timeout` needs a `Default` response body.
                    .layer(TimeoutLayer::new(Duration::from_secs(
                        config.listener.request_timeout_secs,
                    ))),
            )
    }

    /// Serve plain HTTP until `shutdown` fires.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Serve HTTPS until `shutdown` fires, then drain for up to `grace`.
    pub async fn run_tls(
        self,
        addr: SocketAddr,
        tls: RustlsConfig,
        mut shutdown: broadcast::Receiver<()>,
        grace: Duration,
    ) -> Result<(), std::io::Error> {
        let handle = axum_server::Handle::new();
        let signal_handle = handle.clone();
        tokio::spawn(async move {
            let _ = shutdown.recv().await;
            signal_handle.graceful_shutdown(Some(grace));
        });

        tracing::info!(address = %addr, "HTTPS server starting");
        axum_server::bind_rustls(addr, tls)
            .handle(handle)
            .serve(self.router.into_make_service())
            .await?;

        tracing::info!("HTTPS server stopped");
        Ok(())
    }

    pub fn into_router(self) -> Router {
        self.router
    }
}

async fn record_request(request: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().to_string();
    let response = next.run(request).await;
    metrics::record_request(&method, response.status().as_u16(), start);
    response
}
