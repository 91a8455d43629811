//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP/TLS connection
//!     → server.rs (Axum setup, middleware: request id, trace, limits)
//!     → handlers/ (session → gate → rewrite → sign)
//!     → forward.rs (outbound call with timeout, relay or translate)
//!     → error.rs (GatewayError → status + message)
//! ```

pub mod error;
pub mod forward;
pub mod handlers;
pub mod sanitize;
pub mod server;

pub use error::GatewayError;
pub use forward::UpstreamClient;
pub use server::{AppState, GatewayServer};
