//! Shared utilities for integration testing.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::body::{Body, Bytes};
use axum::extract::{Request, State};
use axum::http::{HeaderMap, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Router;
use tokio::net::TcpListener;
use tower::ServiceExt;

use signing_gateway::auth::{PermissionStore, Role, Session};
use signing_gateway::config::GatewayConfig;
use signing_gateway::http::{AppState, GatewayServer};
use signing_gateway::lifecycle::startup::build_state;
use signing_gateway::signing::SigningKeyPair;
use signing_gateway::storage::MemoryStore;

/// A request received by a mock node.
#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: Method,
    pub path: String,
    pub headers: HeaderMap,
    pub body: Bytes,
}

#[derive(Clone)]
struct NodeBehaviour {
    status: StatusCode,
    body: &'static str,
    delay: Duration,
    log: Arc<Mutex<Vec<Recorded>>>,
}

/// A consensus node stand-in that records every request it receives.
pub struct MockNode {
    pub addr: SocketAddr,
    log: Arc<Mutex<Vec<Recorded>>>,
}

impl MockNode {
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.log.lock().unwrap().clone()
    }
}

/// Start a mock node answering every request with `status` and `body`.
pub async fn start_mock_node(status: u16, body: &'static str) -> MockNode {
    start_slow_mock_node(status, body, Duration::ZERO).await
}

/// Like `start_mock_node`, but waits `delay` before answering.
pub async fn start_slow_mock_node(status: u16, body: &'static str, delay: Duration) -> MockNode {
    let log = Arc::new(Mutex::new(Vec::new()));
    let behaviour = NodeBehaviour {
        status: StatusCode::from_u16(status).unwrap(),
        body,
        delay,
        log: log.clone(),
    };

    let app = Router::new().fallback(record).with_state(behaviour);
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    MockNode { addr, log }
}

async fn record(State(node): State<NodeBehaviour>, request: Request) -> Response {
    let (parts, body) = request.into_parts();
    let body = axum::body::to_bytes(body, usize::MAX).await.unwrap();
    node.log.lock().unwrap().push(Recorded {
        method: parts.method,
        path: parts.uri.path().to_string(),
        headers: parts.headers,
        body,
    });
    if !node.delay.is_zero() {
        tokio::time::sleep(node.delay).await;
    }
    (
        node.status,
        [("content-type", "application/json")],
        node.body,
    )
        .into_response()
}

/// A gateway wired to in-memory stores and a fresh key pair.
pub struct TestGateway {
    pub state: AppState,
    pub config: GatewayConfig,
    pub keys: SigningKeyPair,
}

impl TestGateway {
    pub fn new(default_node_url: &str) -> Self {
        Self::with_config(default_node_url, |_| {})
    }

    pub fn with_config(default_node_url: &str, tweak: impl FnOnce(&mut GatewayConfig)) -> Self {
        Self::build(default_node_url, tweak, PermissionStore::new(None))
    }

    /// A gateway backed by the given permission store.
    pub fn with_permissions(default_node_url: &str, permissions: PermissionStore) -> Self {
        Self::build(default_node_url, |_| {}, permissions)
    }

    fn build(
        default_node_url: &str,
        tweak: impl FnOnce(&mut GatewayConfig),
        permissions: PermissionStore,
    ) -> Self {
        let mut config = GatewayConfig::default();
        config.upstream.default_node_url = default_node_url.to_string();
        config.upstream.forward_timeout_secs = 2;
        config.session.dev_login = true;
        tweak(&mut config);

        let keys = SigningKeyPair::generate();
        let state = build_state(
            &config,
            keys.clone(),
            Arc::new(MemoryStore::new()),
            permissions,
        )
        .unwrap();

        Self {
            state,
            config,
            keys,
        }
    }

    /// Log `user_id` in and return the cookie header value.
    pub fn login(&self, user_id: u64) -> String {
        let token = self.state.sessions.create(Session {
            user_id,
            first_name: "Test".into(),
            last_name: format!("User {user_id}"),
        });
        format!("{}={}", self.config.session.cookie_name, token)
    }

    /// Log in a user holding `role`.
    pub fn login_as(&self, user_id: u64, role: Role) -> String {
        self.state
            .gate
            .permissions()
            .assign_role(user_id, role)
            .unwrap();
        self.login(user_id)
    }

    pub fn grant_ownership(&self, user_id: u64, form_id: &str) {
        self.state
            .gate
            .permissions()
            .grant_ownership(user_id, form_id)
            .unwrap();
    }

    /// Send one request through the full router.
    pub async fn send(
        &self,
        method: Method,
        uri: &str,
        cookie: Option<&str>,
        body: Option<serde_json::Value>,
    ) -> (StatusCode, String) {
        let mut builder = axum::http::Request::builder().method(method).uri(uri);
        if let Some(cookie) = cookie {
            builder = builder.header("cookie", cookie);
        }
        let body = match body {
            Some(json) => {
                builder = builder.header("content-type", "application/json");
                Body::from(serde_json::to_vec(&json).unwrap())
            }
            None => Body::empty(),
        };

        let router = GatewayServer::new(&self.config, self.state.clone()).into_router();
        let response = router.oneshot(builder.body(body).unwrap()).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, String::from_utf8_lossy(&bytes).into_owned())
    }
}
