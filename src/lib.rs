//! Authenticated signing gateway.
//!
//! Terminates user sessions, authorizes privileged actions against a
//! per-resource permission model, rewrites and Schnorr-signs requests, and
//! forwards them to consensus nodes or their proxies.

// Core subsystems
pub mod auth;
pub mod config;
pub mod http;
pub mod net;
pub mod rewrite;
pub mod routing;
pub mod signing;
pub mod storage;

// Cross-cutting concerns
pub mod lifecycle;
pub mod observability;

pub use config::schema::GatewayConfig;
pub use http::GatewayServer;
pub use lifecycle::Shutdown;
