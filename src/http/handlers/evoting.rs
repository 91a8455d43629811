//! Signed forwards to the consensus nodes.
//!
//! # Data Flow
//! ```text
//! request + CurrentSession
//!     → classify (ordered route table → guarded operation)
//!     → gate (session / grant for the addressed form)
//!     → rewrite (source to sign, destination)
//!     → signer (envelope, or raw signature for form deletion)
//!     → UpstreamClient::forward → relay
//! ```
//!
//! Authorization and validation failures are answered here and never
//! reach a node.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use serde_json::Value;

use super::{body_str, parse_body, request_id, route_suffix, update_permissions, CurrentSession};
use crate::auth::{Action, Denial, ResourceId, Session, Subject};
use crate::http::error::{GatewayError, UNAUTHORIZED};
use crate::http::forward::{ForwardRequest, OutboundBody, Relayed};
use crate::http::server::AppState;
use crate::rewrite::rules::{DKG_ACTOR, DKG_ACTORS};
use crate::rewrite::{self, Destination};
use crate::routing::{PathPattern, Segment::*};

const AUTHORIZATIONS: PathPattern =
    PathPattern::new(&[Literal("evoting"), Literal("authorizations")]);
const FORM: PathPattern = PathPattern::new(&[Literal("evoting"), Literal("forms"), Param]);
const SHUFFLE: PathPattern = PathPattern::new(&[
    Literal("evoting"),
    Literal("services"),
    Literal("shuffle"),
    Param,
]);

/// Guarded operations under `/api/evoting`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    /// `PUT /authorizations`: caller claims a form it created.
    ClaimOwnership,
    /// `PUT /forms/{id}`: owner only.
    UpdateForm(String),
    /// `DELETE /forms/{id}`: owner only, 401 without session, raw-signed.
    DeleteForm(String),
    /// `POST /services/dkg/actors`: owner of the body's form only.
    CreateDkgActors,
    /// `* /services/dkg/actors/{id}`: owner only.
    DkgActor(String),
    /// `* /services/shuffle/{id}`: owner only, 401 without session.
    Shuffle(String),
    /// Anything else: any logged-in user.
    Forward,
}

/// First matching entry wins.
pub fn classify(method: &Method, suffix: &str) -> Operation {
    let form = |pattern: &PathPattern| {
        pattern
            .captures(suffix)
            .and_then(|ids| ids.first().map(|id| id.to_string()))
    };

    if *method == Method::PUT && AUTHORIZATIONS.is_match(suffix) {
        return Operation::ClaimOwnership;
    }
    if let Some(id) = form(&FORM) {
        match *method {
            Method::PUT => return Operation::UpdateForm(id),
            Method::DELETE => return Operation::DeleteForm(id),
            _ => {}
        }
    }
    if *method == Method::POST && DKG_ACTORS.is_match(suffix) {
        return Operation::CreateDkgActors;
    }
    if let Some(id) = form(&DKG_ACTOR) {
        return Operation::DkgActor(id);
    }
    if let Some(id) = form(&SHUFFLE) {
        return Operation::Shuffle(id);
    }
    Operation::Forward
}

/// `* /api/evoting/{*rest}`
pub async fn dispatch(
    State(state): State<AppState>,
    CurrentSession(session): CurrentSession,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, GatewayError> {
    let suffix = route_suffix(uri.path());
    let session = session.as_ref();
    let owner_of = |form_id: &str, strict: bool| {
        state
            .gate
            .check(session, &ResourceId::form(form_id), Action::Own)
            .map_err(|denial| {
                if strict {
                    GatewayError::denied_strict(denial)
                } else {
                    GatewayError::denied(denial, UNAUTHORIZED)
                }
            })
    };

    match classify(&method, suffix) {
        Operation::ClaimOwnership => claim_ownership(&state, session, &body).await,
        Operation::DeleteForm(form_id) => {
            let owner = owner_of(&form_id, true)?;
            delete_form(&state, owner, &form_id, suffix, &headers)
                .await
                .map(IntoResponse::into_response)
        }
        Operation::CreateDkgActors => {
            let body = parse_body(&body)?;
            let form_id = body_str(&body, "FormID")
                .ok_or_else(|| GatewayError::BadRequest("FormID undefined in body".into()))?;
            owner_of(form_id, false)?;
            forward_signed(&state, method, suffix, body, &headers)
                .await
                .map(IntoResponse::into_response)
        }
        Operation::UpdateForm(form_id) | Operation::DkgActor(form_id) => {
            owner_of(&form_id, false)?;
            forward_signed(&state, method, suffix, parse_body(&body)?, &headers)
                .await
                .map(IntoResponse::into_response)
        }
        Operation::Shuffle(form_id) => {
            owner_of(&form_id, true)?;
            forward_signed(&state, method, suffix, parse_body(&body)?, &headers)
                .await
                .map(IntoResponse::into_response)
        }
        Operation::Forward => {
            if session.is_none() {
                return Err(GatewayError::denied(Denial::NoSession, UNAUTHORIZED));
            }
            forward_signed(&state, method, suffix, parse_body(&body)?, &headers)
                .await
                .map(IntoResponse::into_response)
        }
    }
}

/// Record that the caller owns the election it just created.
async fn claim_ownership(
    state: &AppState,
    session: Option<&Session>,
    body: &Bytes,
) -> Result<Response, GatewayError> {
    let create = ResourceId::Subject(Subject::Election);
    let session = state
        .gate
        .check(session, &create, Action::Create)
        .map_err(|denial| GatewayError::denied(denial, UNAUTHORIZED))?;

    let body = parse_body(body)?;
    let form_id = body_str(&body, "FormID")
        .ok_or_else(|| GatewayError::BadRequest("FormID undefined in body".into()))?
        .to_string();

    let user_id = session.user_id;
    update_permissions(state, move |permissions| {
        permissions.grant_ownership(user_id, &form_id)
    })
    .await?;
    Ok((StatusCode::OK, "ok").into_response())
}

/// Sign the form id itself and send it as `Authorization`. Ownership is
/// revoked once the node accepted the deletion.
async fn delete_form(
    state: &AppState,
    owner: &Session,
    form_id: &str,
    suffix: &str,
    headers: &HeaderMap,
) -> Result<Relayed, GatewayError> {
    let signature = state.signer.sign_raw(form_id.as_bytes());
    let relayed = state
        .upstream
        .forward(ForwardRequest {
            method: Method::DELETE,
            uri: destination_uri(&state.default_node_url, suffix),
            body: OutboundBody::RawSignature(signature),
            request_id: request_id(headers),
        })
        .await?;

    let (user_id, owned) = (owner.user_id, form_id.to_string());
    if let Err(e) = update_permissions(state, move |permissions| {
        permissions.revoke_ownership(user_id, &owned)
    })
    .await
    {
        tracing::error!(
            user_id = owner.user_id,
            form_id = %form_id,
            error = %e,
            "Election deleted but ownership could not be revoked"
        );
    }
    Ok(relayed)
}

/// Rewrite, sign in envelope mode and forward.
async fn forward_signed(
    state: &AppState,
    method: Method,
    suffix: &str,
    body: Value,
    headers: &HeaderMap,
) -> Result<Relayed, GatewayError> {
    let rewrite = rewrite::rewrite(suffix, body)?;

    let base = match rewrite.destination {
        Destination::DefaultNode => state.default_node_url.to_string(),
        Destination::Explicit(proxy) => proxy,
        Destination::Node(node) => state
            .proxies
            .get(&node)?
            .ok_or_else(|| GatewayError::NotFound("proxy not found for node".into()))?,
    };

    let payload = state.signer.sign(&rewrite.source);
    state
        .upstream
        .forward(ForwardRequest {
            method,
            uri: destination_uri(&base, suffix),
            body: OutboundBody::Envelope(payload),
            request_id: request_id(headers),
        })
        .await
}

fn destination_uri(base: &str, suffix: &str) -> String {
    format!("{}{}", base.trim_end_matches('/'), suffix)
}
