//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.
//! Signing keys are deliberately absent: they are read from the environment.

use serde::{Deserialize, Serialize};

use crate::auth::permissions::Role;

/// Root configuration for the signing gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener configuration (bind address, TLS).
    pub listener: ListenerConfig,

    /// Consensus node forwarding settings.
    pub upstream: UpstreamConfig,

    /// Embedded store for the proxy directory.
    pub storage: StorageConfig,

    /// Session cookie handling.
    pub session: SessionConfig,

    /// Permission seeding and persistence.
    pub permissions: PermissionsConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    #[serde(default)]
    pub security: SecurityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:5000").
    pub bind_address: String,

    /// Optional TLS configuration.
    pub tls: Option<TlsConfig>,

    /// Whole-request deadline for inbound requests, in seconds.
    pub request_timeout_secs: u64,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:5000".to_string(),
            tls: None,
            request_timeout_secs: 60,
        }
    }
}

/// TLS configuration for the listener.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TlsConfig {
    /// Path to certificate file (PEM).
    pub cert_path: String,

    /// Path to private key file (PEM).
    pub key_path: String,
}

/// Where and how signed requests are forwarded.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Base URL of the default consensus node (e.g., "http://127.0.0.1:9081").
    pub default_node_url: String,

    /// Per-forward deadline in seconds. A stalled node never holds a request longer.
    pub forward_timeout_secs: u64,

    /// TCP connect timeout in seconds.
    pub connect_timeout_secs: u64,

    /// Largest upstream response body relayed back, in bytes.
    pub max_response_bytes: usize,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            default_node_url: "http://127.0.0.1:9081".to_string(),
            forward_timeout_secs: 30,
            connect_timeout_secs: 5,
            max_response_bytes: 8 * 1024 * 1024,
        }
    }
}

/// Embedded storage configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory of the sled database holding proxy mappings.
    pub db_path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: "./data/proxies".to_string(),
        }
    }
}

/// Session cookie configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Name of the session cookie.
    pub cookie_name: String,

    /// Session lifetime in seconds.
    pub ttl_secs: u64,

    /// Mark the cookie `Secure` (frontend served over HTTPS).
    pub cookie_secure: bool,

    /// Expose `GET /api/get_dev_login/{user_id}`. Never enable in production.
    pub dev_login: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cookie_name: "gateway.sid".to_string(),
            ttl_secs: 24 * 60 * 60,
            cookie_secure: false,
            dev_login: false,
        }
    }
}

/// Permission store configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct PermissionsConfig {
    /// JSON file the grants are saved to after every mutation.
    pub persistence_path: Option<String>,

    /// Roles assigned at startup.
    pub roles: Vec<RoleAssignment>,
}

/// A role seeded for one user.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RoleAssignment {
    pub user_id: u64,
    pub role: Role,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Emit JSON log lines instead of the human format.
    pub log_json: bool,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_json: false,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Security hardening configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Maximum inbound body size in bytes.
    pub max_body_size: usize,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            max_body_size: 2 * 1024 * 1024, // 2MB
        }
    }
}
