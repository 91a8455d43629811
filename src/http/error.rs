//! Gateway error taxonomy and its HTTP rendering.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::auth::Denial;
use crate::observability::metrics;
use crate::rewrite::RewriteError;
use crate::storage::StoreError;

pub const UNAUTHENTICATED: &str = "Unauthenticated";
pub const UNAUTHORIZED: &str = "Unauthorized";
pub const ADMIN_ONLY: &str = "Unauthorized - only admins and operators allowed";

#[derive(Debug, Error)]
pub enum GatewayError {
    /// No session where one is strictly required.
    #[error("Unauthenticated")]
    Unauthenticated,

    /// Session missing or grant absent. Carries the message shown to the caller.
    #[error("{0}")]
    Unauthorized(&'static str),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    /// Destination unreachable, timed out or answered non-2xx.
    #[error("failed to proxy request: {method} {uri} - {detail} - {body}")]
    Upstream {
        method: String,
        uri: String,
        detail: String,
        body: String,
    },

    #[error("storage failure: {0}")]
    Storage(#[from] StoreError),
}

impl GatewayError {
    pub fn status(&self) -> StatusCode {
        match self {
            GatewayError::Unauthenticated => StatusCode::UNAUTHORIZED,
            GatewayError::Unauthorized(_) | GatewayError::BadRequest(_) => StatusCode::BAD_REQUEST,
            GatewayError::NotFound(_) => StatusCode::NOT_FOUND,
            GatewayError::Upstream { .. } | GatewayError::Storage(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Gate refusal answered with the given message.
    pub fn denied(denial: Denial, message: &'static str) -> Self {
        metrics::record_denied(denial.reason());
        GatewayError::Unauthorized(message)
    }

    /// Gate refusal where a missing session is answered 401.
    pub fn denied_strict(denial: Denial) -> Self {
        match denial {
            Denial::NoSession => {
                metrics::record_denied(denial.reason());
                GatewayError::Unauthenticated
            }
            Denial::NoGrant => Self::denied(denial, UNAUTHORIZED),
        }
    }
}

impl From<RewriteError> for GatewayError {
    fn from(err: RewriteError) -> Self {
        GatewayError::BadRequest(err.to_string())
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status();
        match &self {
            GatewayError::Storage(e) => tracing::error!(error = %e, "Storage failure"),
            GatewayError::Upstream { .. } => tracing::warn!(error = %self, "Upstream failure"),
            _ => tracing::debug!(status = %status, error = %self, "Request rejected"),
        }
        (status, self.to_string()).into_response()
    }
}
