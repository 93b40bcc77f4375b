/// Selectors: composable, bidirectional request predicates
///
/// A [`Selector`] is a node in a route tree. In the forward direction it
/// consumes part of a request from a [`RoutingContext`] and binds arguments.
/// In the reverse direction it consumes arguments from an
/// [`UnselectionContext`] and produces URL parts. One tree, two directions,
/// so links and routes cannot drift apart.
///
/// # Examples
///
/// ```
/// use kettle_router::{Arguments, RouteRequest, RoutingContext, Selector, UnselectionContext, ValueKind};
///
/// let tree = Selector::sequence(vec![
///     Selector::literal("users"),
///     Selector::variable("id", ValueKind::Int),
/// ]);
///
/// let req = RouteRequest::get("/users/42").unwrap();
/// let mut ctx = RoutingContext::new(&req);
/// assert!(tree.select(&mut ctx).is_matched());
/// assert_eq!(ctx.bindings().get_int("id"), Some(42));
///
/// let mut out = UnselectionContext::new(Arguments::new().with("id", 42));
/// tree.unselect(&mut out).unwrap();
/// assert_eq!(out.into_link().to_string(), "/users/42");
/// ```
use http::Method;
use kettle_accept::MediaType;

use crate::context::{RoutingContext, UnselectionContext};
use crate::error::{MatchFailure, UnselectionFailure};
use crate::value::{Codec, Value, ValueKind};

mod combinators;
mod primitives;
mod validate;

pub(crate) use validate::is_cookie_name;

/// What runs after a selector matched: the rest of the tree
pub(crate) type Continuation<'k, 'r> = &'k mut dyn FnMut(&mut RoutingContext<'r>) -> MatchResult;

/// Outcome of producing URL parts from arguments
pub type ProduceResult = Result<(), UnselectionFailure>;

/// Outcome of matching
#[derive(Debug, Clone, PartialEq)]
pub enum MatchResult {
    Matched,
    Failed(MatchFailure),
    /// Every branch of an alternative failed; `closest` is the highest ranked failure
    Exhausted {
        branches: usize,
        closest: MatchFailure,
    },
}

impl MatchResult {
    pub fn is_matched(&self) -> bool {
        matches!(self, MatchResult::Matched)
    }

    pub fn failure(&self) -> Option<&MatchFailure> {
        match self {
            MatchResult::Matched => None,
            MatchResult::Failed(failure) => Some(failure),
            MatchResult::Exhausted { closest, .. } => Some(closest),
        }
    }

    pub fn into_failure(self) -> Option<MatchFailure> {
        match self {
            MatchResult::Matched => None,
            MatchResult::Failed(failure) => Some(failure),
            MatchResult::Exhausted { closest, .. } => Some(closest),
        }
    }

    pub(crate) fn is_budget_exhausted(&self) -> bool {
        matches!(self.failure(), Some(MatchFailure::BudgetExhausted { .. }))
    }
}

/// Header-level predicates
#[derive(Debug, Clone, PartialEq)]
pub enum HeaderPredicate {
    /// Narrows the acceptable content types to these offers
    Accepts(Vec<MediaType>),
    /// Request method must be one of these; links use the first
    Method(Vec<Method>),
    /// Binds a request header value to an argument
    Capture {
        header: String,
        name: String,
        kind: ValueKind,
        required: bool,
    },
    /// Binds one cookie of the `Cookie` header to an argument
    Cookie {
        cookie: String,
        name: String,
        kind: ValueKind,
        required: bool,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Selector {
    /// Exactly one path segment with this text
    Literal(String),
    /// One path segment decoded into an argument
    Variable {
        name: String,
        kind: ValueKind,
        codec: Codec,
    },
    /// A query argument; `many` collects every value into a list
    QueryArg {
        name: String,
        kind: ValueKind,
        required: bool,
        many: bool,
    },
    Header(HeaderPredicate),
    /// Supplies a fixed value for an argument the request did not provide
    ArgumentBinder { name: String, value: Value },
    Sequence(Vec<Selector>),
    /// Ordered choice; the first branch that lets the whole route match wins
    Alternative(Vec<Selector>),
    Optional(Box<Selector>),
    /// Greedy repetition; bound arguments become lists
    Repetition { item: Box<Selector>, min: usize },
}

// ============================================================================
// Constructors
// ============================================================================

impl Selector {
    pub fn literal(segment: impl Into<String>) -> Self {
        Selector::Literal(segment.into())
    }

    pub fn variable(name: impl Into<String>, kind: ValueKind) -> Self {
        Self::variable_with(name, kind, Codec::Plain)
    }

    pub fn variable_with(name: impl Into<String>, kind: ValueKind, codec: Codec) -> Self {
        Selector::Variable {
            name: name.into(),
            kind,
            codec,
        }
    }

    /// Required single-valued query argument
    pub fn query(name: impl Into<String>, kind: ValueKind) -> Self {
        Selector::QueryArg {
            name: name.into(),
            kind,
            required: true,
            many: false,
        }
    }

    /// Query argument that may be absent
    pub fn optional_query(name: impl Into<String>, kind: ValueKind) -> Self {
        Selector::QueryArg {
            name: name.into(),
            kind,
            required: false,
            many: false,
        }
    }

    /// Multi-valued query argument (`?tag=a&tag=b`)
    pub fn query_list(name: impl Into<String>, kind: ValueKind, required: bool) -> Self {
        Selector::QueryArg {
            name: name.into(),
            kind,
            required,
            many: true,
        }
    }

    pub fn accepts<I>(offers: I) -> Self
    where
        I: IntoIterator<Item = MediaType>,
    {
        Selector::Header(HeaderPredicate::Accepts(offers.into_iter().collect()))
    }

    pub fn method<I>(methods: I) -> Self
    where
        I: IntoIterator<Item = Method>,
    {
        Selector::Header(HeaderPredicate::Method(methods.into_iter().collect()))
    }

    pub fn header(
        header: impl Into<String>,
        name: impl Into<String>,
        kind: ValueKind,
        required: bool,
    ) -> Self {
        Selector::Header(HeaderPredicate::Capture {
            header: header.into().to_ascii_lowercase(),
            name: name.into(),
            kind,
            required,
        })
    }

    pub fn cookie(
        cookie: impl Into<String>,
        name: impl Into<String>,
        kind: ValueKind,
        required: bool,
    ) -> Self {
        Selector::Header(HeaderPredicate::Cookie {
            cookie: cookie.into(),
            name: name.into(),
            kind,
            required,
        })
    }

    pub fn bind(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Selector::ArgumentBinder {
            name: name.into(),
            value: value.into(),
        }
    }

    pub fn sequence(children: Vec<Selector>) -> Self {
        Selector::Sequence(children)
    }

    pub fn alternative(branches: Vec<Selector>) -> Self {
        Selector::Alternative(branches)
    }

    pub fn optional(inner: Selector) -> Self {
        Selector::Optional(Box::new(inner))
    }

    /// Zero or more repetitions
    pub fn repeat(item: Selector) -> Self {
        Self::repeat_at_least(item, 0)
    }

    pub fn repeat_at_least(item: Selector, min: usize) -> Self {
        Selector::Repetition {
            item: Box::new(item),
            min,
        }
    }
}

// ============================================================================
// Matching and link generation
// ============================================================================

impl Selector {
    /// Matches this selector alone against the context
    ///
    /// On failure the context is exactly as it was before the call.
    pub fn select(&self, ctx: &mut RoutingContext<'_>) -> MatchResult {
        self.select_then(ctx, &mut settle)
    }

    /// Matches this selector, then runs `next` on the remaining input
    ///
    /// A selector only succeeds if `next` succeeds too; if `next` fails the
    /// selector tries its other ways of matching (fewer repetitions, the next
    /// branch, skipping an optional) before giving up.
    pub(crate) fn select_then<'r>(
        &self,
        ctx: &mut RoutingContext<'r>,
        next: Continuation<'_, 'r>,
    ) -> MatchResult {
        if let Err(failure) = ctx.tick() {
            return MatchResult::Failed(failure);
        }

        match self {
            Selector::Literal(segment) => primitives::select_literal(segment, ctx, next),
            Selector::Variable { name, kind, codec } => {
                primitives::select_variable(name, *kind, *codec, ctx, next)
            }
            Selector::QueryArg {
                name,
                kind,
                required,
                many,
            } => primitives::select_query(name, *kind, *required, *many, ctx, next),
            Selector::Header(predicate) => primitives::select_header(predicate, ctx, next),
            Selector::ArgumentBinder { name, value } => {
                primitives::select_binder(name, value, ctx, next)
            }
            Selector::Sequence(children) => combinators::select_sequence(children, ctx, next),
            Selector::Alternative(branches) => {
                combinators::select_alternative(branches, ctx, next)
            }
            Selector::Optional(inner) => combinators::select_optional(inner, ctx, next),
            Selector::Repetition { item, min } => {
                combinators::select_repetition(item, *min, ctx, next)
            }
        }
    }

    /// Produces the URL parts for this selector from the supplied arguments
    pub fn unselect(&self, ctx: &mut UnselectionContext) -> ProduceResult {
        match self {
            Selector::Literal(segment) => {
                ctx.push_segment(segment.as_str());
                Ok(())
            }
            Selector::Variable { name, kind, codec } => {
                primitives::unselect_variable(name, *kind, *codec, ctx)
            }
            Selector::QueryArg {
                name,
                kind,
                required,
                many,
            } => primitives::unselect_query(name, *kind, *required, *many, ctx),
            Selector::Header(predicate) => primitives::unselect_header(predicate, ctx),
            Selector::ArgumentBinder { name, value } => {
                primitives::unselect_binder(name, value, ctx)
            }
            Selector::Sequence(children) => children.iter().try_for_each(|child| child.unselect(ctx)),
            Selector::Alternative(branches) => combinators::unselect_alternative(branches, ctx),
            Selector::Optional(inner) => combinators::unselect_optional(inner, ctx),
            Selector::Repetition { item, min } => {
                combinators::unselect_repetition(item, *min, ctx)
            }
        }
    }
}

/// Terminal continuation for a standalone match
fn settle(ctx: &mut RoutingContext<'_>) -> MatchResult {
    match ctx.negotiation_failure() {
        Some(failure) => MatchResult::Failed(failure),
        None => MatchResult::Matched,
    }
}

// ============================================================================
// Structural analysis
// ============================================================================

impl Selector {
    /// Every argument name this selector can bind, in first-seen order
    pub fn binding_names(&self) -> Vec<String> {
        let mut names = Vec::new();
        self.collect_names(&mut names, true);
        names
    }

    /// Names bound from the request itself, excluding argument binders
    pub(crate) fn captured_names(&self) -> Vec<String> {
        let mut names = Vec::new();
        self.collect_names(&mut names, false);
        names
    }

    fn collect_names(&self, names: &mut Vec<String>, with_binders: bool) {
        match self {
            Selector::Literal(_) | Selector::Header(HeaderPredicate::Accepts(_)) => {}
            Selector::Header(HeaderPredicate::Method(_)) => {}
            Selector::Variable { name, .. }
            | Selector::QueryArg { name, .. }
            | Selector::Header(HeaderPredicate::Capture { name, .. })
            | Selector::Header(HeaderPredicate::Cookie { name, .. }) => push_unique(names, name),
            Selector::ArgumentBinder { name, .. } => {
                if with_binders {
                    push_unique(names, name)
                }
            }
            Selector::Sequence(children) | Selector::Alternative(children) => children
                .iter()
                .for_each(|child| child.collect_names(names, with_binders)),
            Selector::Optional(inner) => inner.collect_names(names, with_binders),
            Selector::Repetition { item, .. } => item.collect_names(names, with_binders),
        }
    }

    /// Names that link generation cannot do without
    pub fn required_names(&self) -> Vec<String> {
        match self {
            Selector::Variable { name, .. } => vec![name.clone()],
            Selector::QueryArg { name, required, .. }
            | Selector::Header(HeaderPredicate::Capture { name, required, .. })
            | Selector::Header(HeaderPredicate::Cookie { name, required, .. }) => {
                if *required {
                    vec![name.clone()]
                } else {
                    Vec::new()
                }
            }
            Selector::Sequence(children) => children.iter().fold(Vec::new(), |mut names, child| {
                child
                    .required_names()
                    .iter()
                    .for_each(|name| push_unique(&mut names, name));
                names
            }),
            // only what every branch needs
            Selector::Alternative(branches) => {
                let mut branches = branches.iter().map(Selector::required_names);
                let first = branches.next().unwrap_or_default();
                branches.fold(first, |common, names| {
                    common.into_iter().filter(|name| names.contains(name)).collect()
                })
            }
            Selector::Repetition { item, min } if *min > 0 => item.required_names(),
            _ => Vec::new(),
        }
    }

    /// Nesting depth, 1 for a leaf
    pub fn depth(&self) -> usize {
        match self {
            Selector::Sequence(children) | Selector::Alternative(children) => {
                1 + children.iter().map(Selector::depth).max().unwrap_or(0)
            }
            Selector::Optional(inner) => 1 + inner.depth(),
            Selector::Repetition { item, .. } => 1 + item.depth(),
            _ => 1,
        }
    }
}

fn push_unique(names: &mut Vec<String>, name: &str) {
    if !names.iter().any(|known| known == name) {
        names.push(name.to_string());
    }
}
