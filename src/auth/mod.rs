//! Authentication and authorization.
//!
//! # Data Flow
//! ```text
//! request headers
//!     → session.rs (cookie/bearer token → Session)
//!     → gate.rs (Session + resource + action → admit/deny)
//!     → permissions.rs (grant lookup)
//! ```
//!
//! # Design Decisions
//! - Default deny: no grant, no access
//! - Roles expand to grants; ownership grants are added per election
//! - Grants live in memory, optionally mirrored to a JSON file

pub mod gate;
pub mod permissions;
pub mod session;

pub use gate::{AuthorizationGate, Denial};
pub use permissions::{Action, Grant, PermissionStore, ResourceId, Role, Subject};
pub use session::{Session, SessionProvider, SessionStore};
