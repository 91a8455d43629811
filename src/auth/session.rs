//! Login sessions.
//!
//! The gateway only reads sessions; how a user logs in is outside its
//! concern. `SessionStore` is the in-process provider: an opaque token in an
//! HttpOnly cookie maps to the user's identity until the TTL runs out.

use std::time::{Duration, Instant};

use axum::http::header::{InvalidHeaderValue, AUTHORIZATION, COOKIE};
use axum::http::{HeaderMap, HeaderValue};
use dashmap::DashMap;
use serde::Serialize;
use uuid::Uuid;

use crate::config::SessionConfig;

/// Identity of a logged-in user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Session {
    pub user_id: u64,
    pub first_name: String,
    pub last_name: String,
}

/// Source of the caller's session for a request.
pub trait SessionProvider: Send + Sync {
    /// `None` when the request carries no valid session.
    fn session(&self, headers: &HeaderMap) -> Option<Session>;
}

struct SessionEntry {
    session: Session,
    expires_at: Instant,
}

/// In-memory sessions keyed by cookie token.
pub struct SessionStore {
    sessions: DashMap<String, SessionEntry>,
    cookie_name: String,
    ttl: Duration,
    secure: bool,
}

impl SessionStore {
    pub fn new(config: &SessionConfig) -> Self {
        Self {
            sessions: DashMap::new(),
            cookie_name: config.cookie_name.clone(),
            ttl: Duration::from_secs(config.ttl_secs),
            secure: config.cookie_secure,
        }
    }

    /// Register a session and return its token.
    pub fn create(&self, session: Session) -> String {
        let token = Uuid::new_v4().simple().to_string();
        tracing::info!(user_id = session.user_id, "Session created");
        self.sessions.insert(
            token.clone(),
            SessionEntry {
                session,
                expires_at: Instant::now() + self.ttl,
            },
        );
        token
    }

    pub fn lookup(&self, token: &str) -> Option<Session> {
        let expired = {
            let entry = self.sessions.get(token)?;
            if entry.expires_at > Instant::now() {
                return Some(entry.session.clone());
            }
            true
        };
        if expired {
            self.sessions.remove(token);
        }
        None
    }

    pub fn destroy(&self, token: &str) -> bool {
        self.sessions.remove(token).is_some()
    }

    /// Drop every expired entry. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut purged = 0;
        self.sessions.retain(|_, entry| {
            let live = entry.expires_at > now;
            if !live {
                purged += 1;
            }
            live
        });
        purged
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Token from the session cookie, or from a bearer header for CLI clients.
    pub fn token_from_headers(&self, headers: &HeaderMap) -> Option<String> {
        if let Some(token) = bearer_token(headers) {
            return Some(token);
        }
        let value = headers.get(COOKIE)?.to_str().ok()?;
        for pair in value.split(';') {
            let Some((key, val)) = pair.trim().split_once('=') else {
                continue;
            };
            if key.trim() == self.cookie_name {
                return Some(val.trim().to_string());
            }
        }
        None
    }

    pub fn set_cookie(&self, token: &str) -> Result<HeaderValue, InvalidHeaderValue> {
        let mut cookie = format!(
            "{}={token}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
            self.cookie_name,
            self.ttl.as_secs()
        );
        if self.secure {
            cookie.push_str("; Secure");
        }
        HeaderValue::from_str(&cookie)
    }

    pub fn clear_cookie(&self) -> Result<HeaderValue, InvalidHeaderValue> {
        let mut cookie = format!(
            "{}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0",
            self.cookie_name
        );
        if self.secure {
            cookie.push_str("; Secure");
        }
        HeaderValue::from_str(&cookie)
    }
}

impl SessionProvider for SessionStore {
    fn session(&self, headers: &HeaderMap) -> Option<Session> {
        let token = self.token_from_headers(headers)?;
        self.lookup(&token)
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?.trim();
    let token = value
        .strip_prefix("Bearer ")
        .or_else(|| value.strip_prefix("bearer "))?
        .trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}
