//! Ordered rewrite rule table.
//!
//! The first rule whose pattern matches the route suffix applies; routes no
//! rule matches get the default rewrite.

use crate::routing::{PathPattern, Segment::*};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleKind {
    /// `POST /evoting/services/dkg/actors`: sign only the form id.
    DkgCreate,
    /// `/evoting/services/dkg/actors/{id}`: sign only the action.
    DkgAction,
    /// `/evoting/forms/{id}/vote`: inject an anonymous submitter id.
    CastVote,
}

#[derive(Debug, Clone, Copy)]
pub struct Rule {
    pub pattern: PathPattern,
    pub kind: RuleKind,
}

pub const DKG_ACTORS: PathPattern = PathPattern::new(&[
    Literal("evoting"),
    Literal("services"),
    Literal("dkg"),
    Literal("actors"),
]);

pub const DKG_ACTOR: PathPattern = PathPattern::new(&[
    Literal("evoting"),
    Literal("services"),
    Literal("dkg"),
    Literal("actors"),
    Param,
]);

pub const CAST_VOTE: PathPattern = PathPattern::new(&[
    Literal("evoting"),
    Literal("forms"),
    Param,
    Literal("vote"),
]);

pub const RULES: &[Rule] = &[
    Rule {
        pattern: DKG_ACTORS,
        kind: RuleKind::DkgCreate,
    },
    Rule {
        pattern: DKG_ACTOR,
        kind: RuleKind::DkgAction,
    },
    Rule {
        pattern: CAST_VOTE,
        kind: RuleKind::CastVote,
    },
];

/// Rule applying to `suffix`, if any.
pub fn select(suffix: &str) -> Option<RuleKind> {
    RULES
        .iter()
        .find(|rule| rule.pattern.is_match(suffix))
        .map(|rule| rule.kind)
}
