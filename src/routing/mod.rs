//! Routing helpers shared by the request rewriter.
//!
//! # Design Decisions
//! - Patterns are compiled in, immutable at runtime
//! - No regex in hot path
//! - Deterministic: same input always matches same pattern

pub mod matcher;

pub use matcher::{PathPattern, Segment};
