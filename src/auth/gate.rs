//! Authorization gate.
//!
//! Admits a request when the caller has a session and holds a grant
//! covering the requested `(resource, action)`.

use std::sync::Arc;

use super::permissions::{Action, PermissionStore, ResourceId};
use super::session::Session;

/// Why the gate refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Denial {
    NoSession,
    NoGrant,
}

impl Denial {
    pub fn reason(&self) -> &'static str {
        match self {
            Denial::NoSession => "no_session",
            Denial::NoGrant => "no_grant",
        }
    }
}

#[derive(Clone)]
pub struct AuthorizationGate {
    permissions: Arc<PermissionStore>,
}

impl AuthorizationGate {
    pub fn new(permissions: Arc<PermissionStore>) -> Self {
        Self { permissions }
    }

    pub fn permissions(&self) -> &Arc<PermissionStore> {
        &self.permissions
    }

    pub fn admit(&self, session: Option<&Session>, resource: &ResourceId, action: Action) -> bool {
        self.check(session, resource, action).is_ok()
    }

    /// Like `admit`, but returns the admitted session or the reason for refusal.
    pub fn check<'a>(
        &self,
        session: Option<&'a Session>,
        resource: &ResourceId,
        action: Action,
    ) -> Result<&'a Session, Denial> {
        let session = session.ok_or(Denial::NoSession)?;
        if self
            .permissions
            .is_authorized(session.user_id, resource, action)
        {
            Ok(session)
        } else {
            tracing::debug!(
                user_id = session.user_id,
                resource = %resource,
                action = action.as_str(),
                "Gate denied request"
            );
            Err(Denial::NoGrant)
        }
    }
}
