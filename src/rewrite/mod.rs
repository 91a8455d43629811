//! Request rewriting.
//!
//! # Data Flow
//! ```text
//! route suffix + JSON body
//!     → rules.rs (first matching rule, or default)
//!     → Rewrite { source bytes to sign, destination, mutated body }
//!     → handed to the signer and the forwarder
//! ```
//!
//! # Design Decisions
//! - Pure: no I/O. `Destination::Node` is resolved by the caller
//! - A required proxy that is absent is an error, never a silent default
//! - The only non-deterministic output is the ballot submitter id

pub mod rules;
pub mod submitter;

use serde_json::{json, Map, Value};
use thiserror::Error;

use rules::RuleKind;

const FORM_ID_FIELD: &str = "FormID";
const ACTION_FIELD: &str = "Action";
const PROXY_FIELD: &str = "Proxy";
const NODE_ADDR_FIELD: &str = "NodeAddr";
const USER_ID_FIELD: &str = "UserID";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RewriteError {
    #[error("proxy undefined in body")]
    MissingProxy,

    #[error("FormID undefined in body")]
    MissingFormId,

    #[error("Action undefined in body")]
    MissingAction,

    #[error("unknown action '{0}'")]
    UnknownAction(String),

    #[error("body must be a JSON object")]
    NotAnObject,
}

/// Where a rewritten request goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Destination {
    /// The configured default node.
    DefaultNode,
    /// A proxy base URL carried in the body.
    Explicit(String),
    /// A node address to resolve through the proxy directory.
    Node(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Rewrite {
    /// Bytes the signer signs.
    pub source: Vec<u8>,
    pub destination: Destination,
    pub body: Value,
}

/// DKG actor actions understood by the nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DkgAction {
    Setup,
    ComputePubshares,
}

impl DkgAction {
    fn parse(action: &str) -> Result<Self, RewriteError> {
        match action {
            "setup" => Ok(DkgAction::Setup),
            "computePubshares" => Ok(DkgAction::ComputePubshares),
            other => Err(RewriteError::UnknownAction(other.to_string())),
        }
    }
}

/// Compute what to sign and where to send it.
///
/// `suffix` is the request path with the `/api` prefix removed.
pub fn rewrite(suffix: &str, body: Value) -> Result<Rewrite, RewriteError> {
    match rules::select(suffix) {
        Some(RuleKind::DkgCreate) => {
            let form_id = body
                .get(FORM_ID_FIELD)
                .filter(|v| !v.is_null())
                .cloned()
                .ok_or(RewriteError::MissingFormId)?;
            Ok(Rewrite {
                source: to_source(&json!({ FORM_ID_FIELD: form_id })),
                destination: override_destination(&body).unwrap_or(Destination::DefaultNode),
                body,
            })
        }
        Some(RuleKind::DkgAction) => {
            let action = body
                .get(ACTION_FIELD)
                .and_then(Value::as_str)
                .ok_or(RewriteError::MissingAction)?;
            let destination = match DkgAction::parse(action)? {
                DkgAction::Setup => {
                    override_destination(&body).ok_or(RewriteError::MissingProxy)?
                }
                DkgAction::ComputePubshares => Destination::DefaultNode,
            };
            Ok(Rewrite {
                source: to_source(&json!({ ACTION_FIELD: action })),
                destination,
                body,
            })
        }
        Some(RuleKind::CastVote) => {
            let mut fields = into_object(body)?;
            fields.insert(
                USER_ID_FIELD.to_string(),
                Value::String(submitter::submitter_id()),
            );
            Ok(default_rewrite(Value::Object(fields)))
        }
        None => Ok(default_rewrite(body)),
    }
}

/// Only an explicit `Proxy` redirects a default request; `NodeAddr` is an
/// ordinary body field here.
fn default_rewrite(body: Value) -> Rewrite {
    Rewrite {
        source: to_source(&body),
        destination: text_field(&body, PROXY_FIELD)
            .map(Destination::Explicit)
            .unwrap_or(Destination::DefaultNode),
        body,
    }
}

/// DKG targets: `Proxy` wins over `NodeAddr`.
fn override_destination(body: &Value) -> Option<Destination> {
    text_field(body, PROXY_FIELD)
        .map(Destination::Explicit)
        .or_else(|| text_field(body, NODE_ADDR_FIELD).map(Destination::Node))
}

/// Blank values count as absent.
fn text_field(body: &Value, name: &str) -> Option<String> {
    body.get(name)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn into_object(body: Value) -> Result<Map<String, Value>, RewriteError> {
    match body {
        Value::Object(fields) => Ok(fields),
        Value::Null => Ok(Map::new()),
        _ => Err(RewriteError::NotAnObject),
    }
}

fn to_source(value: &Value) -> Vec<u8> {
    // Serializing a `Value` cannot fail.
    serde_json::to_vec(value).unwrap_or_default()
}
