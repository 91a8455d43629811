//! Request handlers.
//!
//! # Responsibilities
//! - proxies.rs: proxy directory CRUD and the default proxy
//! - evoting.rs: gated, rewritten and signed forwards to the nodes
//! - session.rs: who am I, logout, development login
//! - roles.rs: role management
//!
//! Handlers receive the caller's session as an explicit `CurrentSession`
//! argument; nothing reads ambient request state.

pub mod evoting;
pub mod proxies;
pub mod roles;
pub mod session;

use std::convert::Infallible;

use axum::body::Bytes;
use axum::extract::{FromRequestParts, Request};
use axum::http::request::Parts;
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use serde_json::{Map, Value};

use crate::auth::{PermissionStore, Session};
use crate::http::error::GatewayError;
use crate::http::sanitize::escape_html;
use crate::http::server::AppState;
use crate::storage::StoreError;

/// Path prefix stripped before forwarding.
pub const API_PREFIX: &str = "/api";

/// The caller's session, if any.
pub struct CurrentSession(pub Option<Session>);

impl FromRequestParts<AppState> for CurrentSession {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        Ok(CurrentSession(state.session(&parts.headers)))
    }
}

/// Parse a JSON request body. An empty body is an empty object.
pub fn parse_body(bytes: &Bytes) -> Result<Value, GatewayError> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Object(Map::new()));
    }
    serde_json::from_slice(bytes)
        .map_err(|e| GatewayError::BadRequest(format!("invalid JSON body: {e}")))
}

/// String field of a JSON body, if present and non-empty.
pub fn body_str<'a>(body: &'a Value, field: &str) -> Option<&'a str> {
    body.get(field)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
}

/// `path` without the leading `/api` segment.
pub fn route_suffix(path: &str) -> &str {
    path.strip_prefix(API_PREFIX).unwrap_or(path)
}

pub fn request_id(headers: &HeaderMap) -> Option<HeaderValue> {
    headers.get("x-request-id").cloned()
}

/// Run a permission change on the blocking pool; saving writes the
/// persistence file.
pub async fn update_permissions<F>(state: &AppState, change: F) -> Result<(), GatewayError>
where
    F: FnOnce(&PermissionStore) -> Result<(), StoreError> + Send + 'static,
{
    let permissions = state.gate.permissions().clone();
    tokio::task::spawn_blocking(move || change(&permissions))
        .await
        .map_err(|e| StoreError::Backend(format!("permission update aborted: {e}")))??;
    Ok(())
}

/// Catch-all for unmatched routes.
pub async fn not_found(request: Request) -> Response {
    let host = request
        .headers()
        .get("host")
        .and_then(|h| h.to_str().ok())
        .unwrap_or("localhost");
    let url = format!("http://{}{}", host, request.uri());
    tracing::debug!(uri = %request.uri(), "No route matched");
    (StatusCode::NOT_FOUND, format!("not found {}", escape_html(&url))).into_response()
}
