/// Error types for every phase: request parsing, matching, dispatch, link
/// generation and route construction
use http::Method;
use kettle_accept::MediaType;
use thiserror::Error;

use crate::value::{Codec, DecodeError, Value, ValueKind};

/// Request target or headers that cannot be turned into a [`RouteRequest`](crate::RouteRequest)
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RequestError {
    #[error("invalid percent-encoding in {part:?}")]
    Encoding { part: String },

    #[error("invalid header {name:?}")]
    Header { name: String },
}

/// Why a selector did not match
///
/// Failures are ordinary values; the matcher backtracks over them.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MatchFailure {
    #[error("expected segment {expected:?}, found {found:?}")]
    LiteralMismatch { expected: String, found: String },

    #[error("path ended before {expected}")]
    MissingSegment { expected: String },

    #[error("cannot decode {name:?}: {source}")]
    Decode {
        name: String,
        #[source]
        source: DecodeError,
    },

    #[error("missing query argument {name:?}")]
    MissingQuery { name: String },

    #[error("missing header {header:?}")]
    MissingHeader { header: String },

    #[error("missing cookie {cookie:?}")]
    MissingCookie { cookie: String },

    #[error("method {found} not in {allowed:?}")]
    MethodNotAllowed { found: Method, allowed: Vec<Method> },

    #[error("none of [{}] is acceptable", join(.offered))]
    NotAcceptable { offered: Vec<MediaType> },

    #[error("{remaining} path segment(s) left unmatched")]
    TrailingSegments { remaining: usize },

    #[error("unconsumed query arguments {keys:?}")]
    UnconsumedQuery { keys: Vec<String> },

    #[error("expected at least {min} repetition(s), matched {found}")]
    TooFewRepetitions { min: usize, found: usize },

    #[error("repetition item consumed nothing")]
    NoProgress,

    #[error("alternative has no branches")]
    NoBranches,

    #[error("backtracking budget of {steps} steps exhausted")]
    BudgetExhausted { steps: usize },
}

impl MatchFailure {
    /// How far a candidate got before failing
    ///
    /// When several branches fail, the one with the highest rank is reported.
    pub fn rank(&self) -> u8 {
        match self {
            MatchFailure::BudgetExhausted { .. } => 4,
            MatchFailure::NotAcceptable { .. } => 3,
            MatchFailure::MethodNotAllowed { .. } | MatchFailure::UnconsumedQuery { .. } => 2,
            MatchFailure::MissingQuery { .. }
            | MatchFailure::MissingHeader { .. }
            | MatchFailure::MissingCookie { .. }
            | MatchFailure::TrailingSegments { .. } => 1,
            _ => 0,
        }
    }

    /// Keeps whichever of two failures ranks higher, `self` on ties
    pub fn closer(self, other: MatchFailure) -> MatchFailure {
        if other.rank() > self.rank() {
            other
        } else {
            self
        }
    }
}

/// Why dispatch found no routable for a request
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DispatchError {
    #[error("no route matches {path}")]
    NoRoute { path: String },

    #[error("{path} matched, but none of [{}] is acceptable", join(.offered))]
    NotAcceptable {
        path: String,
        offered: Vec<MediaType>,
    },
}

/// Why a link could not be generated
#[derive(Debug, Clone, PartialEq, Error)]
pub enum UnselectionFailure {
    #[error("unknown routable {id:?}")]
    UnknownRoutable { id: String },

    #[error("missing argument {name:?}")]
    MissingArgument { name: String },

    #[error("arguments not used by the route: {names:?}")]
    UnexpectedArguments { names: Vec<String> },

    #[error("argument {name:?} should be {expected}, got {found}")]
    TypeMismatch {
        name: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error("argument {name:?} must be {expected}, got {found}")]
    ValueMismatch {
        name: String,
        expected: Value,
        found: Value,
    },

    #[error("optional part needs {missing:?} alongside {present:?}")]
    AmbiguousOptional {
        present: Vec<String>,
        missing: Vec<String>,
    },

    #[error("argument {name:?} was already used")]
    AlreadyConsumed { name: String },

    #[error("list arguments {names:?} differ in length")]
    ListLengthMismatch { names: Vec<String> },

    #[error("argument {name:?} needs at least {min} item(s), got {found}")]
    TooFewItems {
        name: String,
        min: usize,
        found: usize,
    },

    #[error("none of {branches} branches could produce a link: {}", join(.reasons))]
    Exhausted {
        branches: usize,
        reasons: Vec<UnselectionFailure>,
    },

    #[error("generated link is unusable: {reason}")]
    InvalidLink { reason: String },

    #[error("link for {id:?} does not route back to it with the same arguments (routed to {routed:?})")]
    RoundTrip { id: String, routed: Option<String> },
}

/// Registration-time errors; fatal to that registration only
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConstructionError {
    #[error("routable {id:?} is already registered")]
    DuplicateRoutable { id: String },

    #[error("{name:?} is bound more than once in one sequence")]
    DuplicateBinding { name: String },

    #[error("alternative branch {index} can never be selected")]
    UnreachableBranch { index: usize },

    #[error("alternative has no branches")]
    EmptyAlternative,

    #[error("optional part binds no argument, so links cannot decide whether to emit it")]
    AmbiguousOptional,

    #[error("repeated item binds no argument")]
    RepetitionBindsNothing,

    #[error("invalid literal segment {literal:?}")]
    InvalidLiteral { literal: String },

    #[error("{name:?}: codec {codec:?} cannot carry {kind}")]
    CodecMismatch {
        name: String,
        kind: ValueKind,
        codec: Codec,
    },

    #[error("selector nesting depth {depth} exceeds {max}")]
    TooDeep { depth: usize, max: usize },

    #[error("invalid name {name:?}")]
    InvalidName { name: String },

    #[error("invalid template {template:?}: {reason}")]
    Template { template: String, reason: String },

    #[error("placeholder {name:?} has no matching path parameter")]
    UnknownParameter { name: String },

    #[error("path parameter {name:?} has no placeholder in the template")]
    MissingPlaceholder { name: String },

    #[error("parameter {name:?} is declared twice")]
    DuplicateParameter { name: String },

    #[error("parameter {name:?}: {reason}")]
    InvalidParameter { name: String, reason: String },
}

fn join<T: std::fmt::Display>(items: &[T]) -> String {
    items
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_closer_prefers_not_acceptable() {
        let mismatch = MatchFailure::LiteralMismatch {
            expected: "a".into(),
            found: "b".into(),
        };
        let refused = MatchFailure::NotAcceptable {
            offered: vec![MediaType::json()],
        };
        assert_eq!(mismatch.clone().closer(refused.clone()), refused);
        assert_eq!(refused.clone().closer(mismatch), refused);
    }

    #[test]
    fn test_display_lists_offers() {
        let err = DispatchError::NotAcceptable {
            path: "/users".into(),
            offered: vec![MediaType::json(), MediaType::xml()],
        };
        assert_eq!(
            err.to_string(),
            "/users matched, but none of [application/json, application/xml] is acceptable"
        );
    }
}
