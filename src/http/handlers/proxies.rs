//! Proxy directory endpoints.
//!
//! Reads are open. Mutations pass through `require_proxy_grant`, which maps
//! the HTTP method to the `proxies` action it needs.

use axum::body::Bytes;
use axum::extract::{Path, Request, State};
use axum::http::{Method, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use std::collections::BTreeMap;

use super::{body_str, parse_body};
use crate::auth::{Action, ResourceId, Subject};
use crate::http::error::{GatewayError, ADMIN_ONLY};
use crate::http::server::AppState;

#[derive(Debug, Serialize)]
pub struct ProxyList {
    #[serde(rename = "Proxies")]
    pub proxies: BTreeMap<String, String>,
}

#[derive(Debug, Serialize)]
pub struct ProxyEntry {
    #[serde(rename = "NodeAddr")]
    pub node_addr: String,
    #[serde(rename = "Proxy")]
    pub proxy: String,
}

/// Gate proxy mutations on `proxies:{post,put,delete}`.
pub async fn require_proxy_grant(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let action = match *request.method() {
        Method::POST => Action::Post,
        Method::PUT => Action::Put,
        Method::DELETE => Action::Delete,
        _ => return next.run(request).await,
    };

    let session = state.session(request.headers());
    let resource = ResourceId::Subject(Subject::Proxies);
    match state.gate.check(session.as_ref(), &resource, action) {
        Ok(session) => {
            tracing::debug!(
                user_id = session.user_id,
                action = action.as_str(),
                "Proxy mutation admitted"
            );
            next.run(request).await
        }
        Err(denial) => GatewayError::denied(denial, ADMIN_ONLY).into_response(),
    }
}

/// `GET /api/config/proxy`
pub async fn default_proxy(State(state): State<AppState>) -> String {
    state.default_node_url.to_string()
}

/// `GET /api/proxies`
pub async fn list_proxies(State(state): State<AppState>) -> Result<Json<ProxyList>, GatewayError> {
    Ok(Json(ProxyList {
        proxies: state.proxies.list()?,
    }))
}

/// `GET /api/proxies/{node}`
pub async fn get_proxy(
    State(state): State<AppState>,
    Path(node): Path<String>,
) -> Result<Json<ProxyEntry>, GatewayError> {
    let proxy = state
        .proxies
        .get(&node)?
        .ok_or_else(|| GatewayError::NotFound("not found".into()))?;
    Ok(Json(ProxyEntry {
        node_addr: node,
        proxy,
    }))
}

/// `POST /api/proxies` with `{"NodeAddr", "Proxy"}`
pub async fn add_proxy(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<impl IntoResponse, GatewayError> {
    let body = parse_body(&body)?;
    let node = body_str(&body, "NodeAddr")
        .ok_or_else(|| GatewayError::BadRequest("bad request, NodeAddr is undefined".into()))?;
    let proxy = body_str(&body, "Proxy")
        .ok_or_else(|| GatewayError::BadRequest("bad request, proxy is undefined".into()))?;

    state.proxies.put(node, proxy)?;
    Ok((StatusCode::OK, "ok"))
}

/// `PUT /api/proxies/{node}` with `{"Proxy", "NewNode"?}`
pub async fn update_proxy(
    State(state): State<AppState>,
    Path(node): Path<String>,
    body: Bytes,
) -> Result<impl IntoResponse, GatewayError> {
    if state.proxies.get(&node)?.is_none() {
        return Err(GatewayError::NotFound("not found".into()));
    }

    let body = parse_body(&body)?;
    let proxy = body_str(&body, "Proxy")
        .ok_or_else(|| GatewayError::BadRequest("bad request, proxy is undefined".into()))?;
    let new_node = body_str(&body, "NewNode").unwrap_or(&node);

    state.proxies.rename(&node, new_node, proxy)?;
    Ok((StatusCode::OK, "ok"))
}

/// `DELETE /api/proxies/{node}`
pub async fn delete_proxy(
    State(state): State<AppState>,
    Path(node): Path<String>,
) -> Result<impl IntoResponse, GatewayError> {
    match state.proxies.remove(&node)? {
        Some(_) => Ok((StatusCode::OK, "ok")),
        None => Err(GatewayError::NotFound("not found".into())),
    }
}
