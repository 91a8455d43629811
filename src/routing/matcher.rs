//! Route pattern matching.
//!
//! # Responsibilities
//! - Match a path against a fixed segment pattern
//! - Capture parameter segments in order
//!
//! # Design Decisions
//! - Path matching is case-sensitive
//! - Patterns are `const`, so rule tables need no runtime setup
//! - No regex to guarantee O(n) matching

/// One segment of a route pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Segment {
    /// Must equal this text.
    Literal(&'static str),
    /// Any single non-empty segment; captured.
    Param,
}

/// A path such as `/evoting/forms/{id}/vote`, as segments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PathPattern {
    segments: &'static [Segment],
}

impl PathPattern {
    pub const fn new(segments: &'static [Segment]) -> Self {
        Self { segments }
    }

    pub fn is_match(&self, path: &str) -> bool {
        self.captures(path).is_some()
    }

    /// Captured `Param` segments if `path` matches, `None` otherwise.
    pub fn captures<'p>(&self, path: &'p str) -> Option<Vec<&'p str>> {
        let mut parts = path.trim_end_matches('/').split('/').skip(1);
        let mut captured = Vec::new();

        for segment in self.segments {
            match segment {
                Segment::Literal(expected) => {
                    if parts.next()? != *expected {
                        return None;
                    }
                }
                Segment::Param => {
                    let part = parts.next()?;
                    if part.is_empty() {
                        return None;
                    }
                    captured.push(part);
                }
            }
        }

        match parts.next() {
            None => Some(captured),
            Some(_) => None,
        }
    }
}
