//! Storage subsystem.
//!
//! # Data Flow
//! ```text
//! http handlers / request rewriter
//!     → proxies.rs (ProxyDirectory: get, put, remove, rename, list)
//!     → kv.rs (KvStore contract)
//!     → embedded.rs (sled, durable) | kv::MemoryStore (tests)
//! ```
//!
//! # Design Decisions
//! - A lookup miss is `Ok(None)`, distinct from a storage failure
//! - Rename is a single transaction; no state has both keys or neither
//! - Last write wins; no versioning

pub mod embedded;
pub mod kv;
pub mod proxies;

pub use embedded::SledStore;
pub use kv::{KvStore, MemoryStore, StoreError};
pub use proxies::ProxyDirectory;
