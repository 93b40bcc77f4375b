/// Leaf selectors: literals, variables, query arguments, header predicates
/// and argument binders
use http::header::COOKIE;

use super::{Continuation, HeaderPredicate, MatchResult, ProduceResult};
use crate::context::{RoutingContext, UnselectionContext};
use crate::error::{MatchFailure, UnselectionFailure};
use crate::value::{Codec, Value, ValueKind};

// ============================================================================
// Path
// ============================================================================

pub(super) fn select_literal<'r>(
    expected: &str,
    ctx: &mut RoutingContext<'r>,
    next: Continuation<'_, 'r>,
) -> MatchResult {
    let Some(found) = ctx.peek_segment() else {
        return MatchResult::Failed(MatchFailure::MissingSegment {
            expected: format!("{:?}", expected),
        });
    };

    if !ctx.segment_eq(expected, found) {
        return MatchResult::Failed(MatchFailure::LiteralMismatch {
            expected: expected.to_string(),
            found: found.to_string(),
        });
    }

    ctx.attempt(|ctx| {
        ctx.advance();
        next(ctx)
    })
}

pub(super) fn select_variable<'r>(
    name: &str,
    kind: ValueKind,
    codec: Codec,
    ctx: &mut RoutingContext<'r>,
    next: Continuation<'_, 'r>,
) -> MatchResult {
    let Some(raw) = ctx.peek_segment() else {
        return MatchResult::Failed(MatchFailure::MissingSegment {
            expected: format!("{{{}}}", name),
        });
    };

    let value = match codec.decode(kind, raw) {
        Ok(value) => value,
        Err(source) => {
            return MatchResult::Failed(MatchFailure::Decode {
                name: name.to_string(),
                source,
            })
        }
    };

    ctx.attempt(|ctx| {
        ctx.advance();
        ctx.bind(name, value);
        next(ctx)
    })
}

pub(super) fn unselect_variable(
    name: &str,
    kind: ValueKind,
    codec: Codec,
    ctx: &mut UnselectionContext,
) -> ProduceResult {
    let value = ctx
        .claim(name)?
        .ok_or_else(|| UnselectionFailure::MissingArgument {
            name: name.to_string(),
        })?;

    let segment = encode(name, kind, codec, &value)?;
    if segment.is_empty() {
        return Err(UnselectionFailure::InvalidLink {
            reason: format!("{} would produce an empty path segment", name),
        });
    }
    ctx.push_segment(segment);
    Ok(())
}

// ============================================================================
// Query
// ============================================================================

pub(super) fn select_query<'r>(
    name: &str,
    kind: ValueKind,
    required: bool,
    many: bool,
    ctx: &mut RoutingContext<'r>,
    next: Continuation<'_, 'r>,
) -> MatchResult {
    let decoded = match ctx.query_values(name) {
        None if required => {
            return MatchResult::Failed(MatchFailure::MissingQuery {
                name: name.to_string(),
            })
        }
        None => return next(ctx),
        Some(raw) => decode_query(name, kind, many, raw),
    };

    match decoded {
        Ok(value) => ctx.attempt(|ctx| {
            if many {
                ctx.consume_query(name);
            } else {
                ctx.consume_first_query(name);
            }
            ctx.bind(name, value);
            next(ctx)
        }),
        Err(failure) => MatchResult::Failed(failure),
    }
}

/// First value for single arguments, every value for `many`
fn decode_query(
    name: &str,
    kind: ValueKind,
    many: bool,
    raw: &[String],
) -> Result<Value, MatchFailure> {
    let decode = |raw: &String| {
        Codec::Plain
            .decode(kind, raw)
            .map_err(|source| MatchFailure::Decode {
                name: name.to_string(),
                source,
            })
    };

    if many {
        raw.iter().map(decode).collect::<Result<Vec<_>, _>>().map(Value::List)
    } else {
        raw.first()
            .map(decode)
            .unwrap_or_else(|| Err(MatchFailure::MissingQuery {
                name: name.to_string(),
            }))
    }
}

pub(super) fn unselect_query(
    name: &str,
    kind: ValueKind,
    required: bool,
    many: bool,
    ctx: &mut UnselectionContext,
) -> ProduceResult {
    let Some(value) = ctx.claim(name)? else {
        return if required {
            Err(UnselectionFailure::MissingArgument {
                name: name.to_string(),
            })
        } else {
            Ok(())
        };
    };

    if !many {
        let encoded = encode(name, kind, Codec::Plain, &value)?;
        ctx.push_query(name, encoded);
        return Ok(());
    }

    let items = value.as_list().ok_or_else(|| UnselectionFailure::TypeMismatch {
        name: name.to_string(),
        expected: "list",
        found: value.type_name(),
    })?;
    if required && items.is_empty() {
        return Err(UnselectionFailure::TooFewItems {
            name: name.to_string(),
            min: 1,
            found: 0,
        });
    }

    items.iter().try_for_each(|item| {
        let encoded = encode(name, kind, Codec::Plain, item)?;
        ctx.push_query(name, encoded);
        Ok(())
    })
}

// ============================================================================
// Headers
// ============================================================================

pub(super) fn select_header<'r>(
    predicate: &HeaderPredicate,
    ctx: &mut RoutingContext<'r>,
    next: Continuation<'_, 'r>,
) -> MatchResult {
    match predicate {
        // An empty intersection is reported once the rest of the route matched
        HeaderPredicate::Accepts(offers) => ctx.attempt(|ctx| {
            ctx.narrow(offers);
            next(ctx)
        }),
        HeaderPredicate::Method(allowed) => {
            let found = ctx.request().method();
            if allowed.contains(found) {
                next(ctx)
            } else {
                MatchResult::Failed(MatchFailure::MethodNotAllowed {
                    found: found.clone(),
                    allowed: allowed.clone(),
                })
            }
        }
        HeaderPredicate::Capture {
            header,
            name,
            kind,
            required,
        } => match ctx.request().header(header) {
            None if *required => MatchResult::Failed(MatchFailure::MissingHeader {
                header: header.clone(),
            }),
            None => next(ctx),
            Some(raw) => bind_decoded(name, *kind, raw, ctx, next),
        },
        HeaderPredicate::Cookie {
            cookie,
            name,
            kind,
            required,
        } => match ctx.request().cookie(cookie) {
            None if *required => MatchResult::Failed(MatchFailure::MissingCookie {
                cookie: cookie.clone(),
            }),
            None => next(ctx),
            Some(raw) => bind_decoded(name, *kind, &raw, ctx, next),
        },
    }
}

fn bind_decoded<'r>(
    name: &str,
    kind: ValueKind,
    raw: &str,
    ctx: &mut RoutingContext<'r>,
    next: Continuation<'_, 'r>,
) -> MatchResult {
    match Codec::Plain.decode(kind, raw) {
        Ok(value) => ctx.attempt(|ctx| {
            ctx.bind(name, value);
            next(ctx)
        }),
        Err(source) => MatchResult::Failed(MatchFailure::Decode {
            name: name.to_string(),
            source,
        }),
    }
}

pub(super) fn unselect_header(predicate: &HeaderPredicate, ctx: &mut UnselectionContext) -> ProduceResult {
    match predicate {
        HeaderPredicate::Accepts(offers) => {
            ctx.record_offers(offers);
            Ok(())
        }
        HeaderPredicate::Method(allowed) => {
            if let Some(method) = allowed.first() {
                ctx.record_method(method);
            }
            Ok(())
        }
        HeaderPredicate::Capture {
            header,
            name,
            kind,
            required,
        } => match ctx.claim(name)? {
            Some(value) => {
                let encoded = encode(name, *kind, Codec::Plain, &value)?;
                ctx.push_header(header.as_str(), encoded);
                Ok(())
            }
            None if *required => Err(UnselectionFailure::MissingArgument { name: name.clone() }),
            None => Ok(()),
        },
        HeaderPredicate::Cookie {
            cookie,
            name,
            kind,
            required,
        } => match ctx.claim(name)? {
            Some(value) => {
                let encoded = encode(name, *kind, Codec::Plain, &value)?;
                let pair = format!("{}={}", cookie, urlencoding::encode(&encoded));
                ctx.push_header(COOKIE.as_str(), pair);
                Ok(())
            }
            None if *required => Err(UnselectionFailure::MissingArgument { name: name.clone() }),
            None => Ok(()),
        },
    }
}

// ============================================================================
// Argument binder
// ============================================================================

pub(super) fn select_binder<'r>(
    name: &str,
    value: &Value,
    ctx: &mut RoutingContext<'r>,
    next: Continuation<'_, 'r>,
) -> MatchResult {
    if ctx.binding(name).is_some() {
        return next(ctx);
    }

    ctx.attempt(|ctx| {
        ctx.bind(name, value.clone());
        next(ctx)
    })
}

/// Accepts the fixed value if supplied; anything else is a mismatch
pub(super) fn unselect_binder(name: &str, value: &Value, ctx: &mut UnselectionContext) -> ProduceResult {
    let Some(supplied) = ctx.available(name) else {
        return Ok(());
    };

    if supplied != value {
        return Err(UnselectionFailure::ValueMismatch {
            name: name.to_string(),
            expected: value.clone(),
            found: supplied.clone(),
        });
    }

    ctx.claim(name).map(|_| ())
}

fn encode(name: &str, kind: ValueKind, codec: Codec, value: &Value) -> Result<String, UnselectionFailure> {
    codec
        .encode(kind, value)
        .ok_or_else(|| UnselectionFailure::TypeMismatch {
            name: name.to_string(),
            expected: kind.name(),
            found: value.type_name(),
        })
}
