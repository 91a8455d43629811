//! Session endpoints.

use std::collections::BTreeMap;

use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use super::CurrentSession;
use crate::auth::Session;
use crate::http::error::GatewayError;
use crate::http::server::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonalInfo {
    pub islogged: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sciper: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub authorization: BTreeMap<String, Vec<&'static str>>,
}

/// `GET /api/personal_info`
pub async fn personal_info(
    State(state): State<AppState>,
    CurrentSession(session): CurrentSession,
) -> Json<PersonalInfo> {
    let info = match session {
        Some(session) => PersonalInfo {
            islogged: true,
            sciper: Some(session.user_id),
            authorization: state
                .gate
                .permissions()
                .authorization_summary(session.user_id),
            first_name: Some(session.first_name),
            last_name: Some(session.last_name),
        },
        None => PersonalInfo {
            islogged: false,
            sciper: None,
            first_name: None,
            last_name: None,
            authorization: BTreeMap::new(),
        },
    };
    Json(info)
}

/// `POST /api/logout`
pub async fn logout(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if let Some(token) = state.sessions.token_from_headers(&headers) {
        state.sessions.destroy(&token);
    }
    match state.sessions.clear_cookie() {
        Ok(cookie) => (StatusCode::OK, [(header::SET_COOKIE, cookie)], "ok").into_response(),
        Err(_) => (StatusCode::OK, "ok").into_response(),
    }
}

/// `GET /api/get_dev_login/{user}`; only routed when development login is on.
pub async fn dev_login(
    State(state): State<AppState>,
    Path(user_id): Path<u64>,
) -> Result<Response, GatewayError> {
    tracing::warn!(user_id, "Development login used");
    let token = state.sessions.create(Session {
        user_id,
        first_name: "Dev".into(),
        last_name: format!("User {user_id}"),
    });
    let cookie = state
        .sessions
        .set_cookie(&token)
        .map_err(|e| GatewayError::BadRequest(e.to_string()))?;
    Ok((StatusCode::OK, [(header::SET_COOKIE, cookie)], "ok").into_response())
}
