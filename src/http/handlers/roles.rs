//! Role management endpoints. Admin only.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};

use super::{update_permissions, CurrentSession};
use crate::auth::{Action, ResourceId, Role, Session, Subject};
use crate::http::error::{GatewayError, UNAUTHORIZED};
use crate::http::server::AppState;

#[derive(Debug, Serialize)]
pub struct UserRights {
    pub sciper: u64,
    pub roles: Vec<Role>,
}

#[derive(Debug, Deserialize)]
pub struct RoleChange {
    pub sciper: u64,
    pub role: Role,
}

fn require(
    state: &AppState,
    session: Option<&Session>,
    action: Action,
) -> Result<(), GatewayError> {
    state
        .gate
        .check(session, &ResourceId::Subject(Subject::Roles), action)
        .map(|_| ())
        .map_err(|denial| GatewayError::denied(denial, UNAUTHORIZED))
}

fn parse_change(body: &Bytes) -> Result<RoleChange, GatewayError> {
    serde_json::from_slice(body)
        .map_err(|e| GatewayError::BadRequest(format!("invalid role change: {e}")))
}

/// `GET /api/user_rights`
pub async fn user_rights(
    State(state): State<AppState>,
    CurrentSession(session): CurrentSession,
) -> Result<Json<Vec<UserRights>>, GatewayError> {
    require(&state, session.as_ref(), Action::List)?;
    let users = state
        .gate
        .permissions()
        .users_with_roles()
        .into_iter()
        .map(|(sciper, roles)| UserRights { sciper, roles })
        .collect();
    Ok(Json(users))
}

/// `POST /api/add_role` with `{"sciper", "role"}`
pub async fn add_role(
    State(state): State<AppState>,
    CurrentSession(session): CurrentSession,
    body: Bytes,
) -> Result<impl IntoResponse, GatewayError> {
    require(&state, session.as_ref(), Action::Add)?;
    let change = parse_change(&body)?;
    let (sciper, role) = (change.sciper, change.role);
    update_permissions(&state, move |permissions| permissions.assign_role(sciper, role)).await?;
    tracing::info!(user_id = change.sciper, role = ?change.role, "Role assigned");
    Ok((StatusCode::OK, "ok"))
}

/// `POST /api/remove_role` with `{"sciper", "role"}`
pub async fn remove_role(
    State(state): State<AppState>,
    CurrentSession(session): CurrentSession,
    body: Bytes,
) -> Result<impl IntoResponse, GatewayError> {
    require(&state, session.as_ref(), Action::Remove)?;
    let change = parse_change(&body)?;
    let (sciper, role) = (change.sciper, change.role);
    update_permissions(&state, move |permissions| permissions.remove_role(sciper, role)).await?;
    tracing::info!(user_id = change.sciper, role = ?change.role, "Role removed");
    Ok((StatusCode::OK, "ok"))
}
