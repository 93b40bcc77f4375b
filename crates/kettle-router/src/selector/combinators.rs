/// Composite selectors: sequence, alternative, optional and repetition
///
/// Matching is continuation-passing: each combinator hands "the rest of the
/// route" to its children, so a later failure makes earlier choices
/// reconsider (another branch, one repetition fewer, skipping an optional).
/// Repetitions keep their own stack of checkpoints instead of nesting.
use super::{Continuation, MatchResult, ProduceResult, Selector};
use crate::context::{RoutingContext, UnselectionContext};
use crate::error::{MatchFailure, UnselectionFailure};
use crate::value::Value;

// ============================================================================
// Sequence
// ============================================================================

pub(super) fn select_sequence<'r>(
    children: &[Selector],
    ctx: &mut RoutingContext<'r>,
    next: Continuation<'_, 'r>,
) -> MatchResult {
    match children.split_first() {
        None => next(ctx),
        Some((last, [])) => last.select_then(ctx, next),
        Some((first, rest)) => ctx.attempt(|ctx| {
            first.select_then(ctx, &mut |ctx: &mut RoutingContext<'r>| {
                select_sequence(rest, ctx, &mut *next)
            })
        }),
    }
}

// ============================================================================
// Alternative
// ============================================================================

pub(super) fn select_alternative<'r>(
    branches: &[Selector],
    ctx: &mut RoutingContext<'r>,
    next: Continuation<'_, 'r>,
) -> MatchResult {
    let mut closest: Option<MatchFailure> = None;

    for branch in branches {
        let result = ctx.attempt(|ctx| branch.select_then(ctx, &mut *next));
        match result.into_failure() {
            None => return MatchResult::Matched,
            Some(failure @ MatchFailure::BudgetExhausted { .. }) => {
                return MatchResult::Failed(failure)
            }
            Some(failure) => {
                closest = Some(match closest {
                    Some(current) => current.closer(failure),
                    None => failure,
                });
            }
        }
    }

    match closest {
        Some(closest) => MatchResult::Exhausted {
            branches: branches.len(),
            closest,
        },
        None => MatchResult::Failed(MatchFailure::NoBranches),
    }
}

/// First branch able to produce wins
///
/// This need not be the branch that would match the produced link; the
/// router's link verification reports such cases.
pub(super) fn unselect_alternative(branches: &[Selector], ctx: &mut UnselectionContext) -> ProduceResult {
    let mut reasons = Vec::new();

    for branch in branches {
        match ctx.attempt(|ctx| branch.unselect(ctx)) {
            Ok(()) => return Ok(()),
            Err(reason) => reasons.push(reason),
        }
    }

    Err(UnselectionFailure::Exhausted {
        branches: branches.len(),
        reasons,
    })
}

// ============================================================================
// Optional
// ============================================================================

pub(super) fn select_optional<'r>(
    inner: &Selector,
    ctx: &mut RoutingContext<'r>,
    next: Continuation<'_, 'r>,
) -> MatchResult {
    let taken = ctx.attempt(|ctx| inner.select_then(ctx, &mut *next));
    if taken.is_matched() || taken.is_budget_exhausted() {
        return taken;
    }

    let skipped = ctx.attempt(|ctx| next(ctx));
    match skipped.into_failure() {
        None => MatchResult::Matched,
        Some(failure) => MatchResult::Failed(match taken.into_failure() {
            Some(taken) => failure.closer(taken),
            None => failure,
        }),
    }
}

/// Emits nothing when none of the inner arguments were supplied
pub(super) fn unselect_optional(inner: &Selector, ctx: &mut UnselectionContext) -> ProduceResult {
    let present: Vec<String> = inner
        .binding_names()
        .into_iter()
        .filter(|name| ctx.available(name).is_some())
        .collect();
    if present.is_empty() {
        return Ok(());
    }

    let missing: Vec<String> = inner
        .required_names()
        .into_iter()
        .filter(|name| ctx.available(name).is_none())
        .collect();
    if !missing.is_empty() {
        return Err(UnselectionFailure::AmbiguousOptional { present, missing });
    }

    ctx.attempt(|ctx| inner.unselect(ctx))
}

// ============================================================================
// Repetition
// ============================================================================

/// Greedy phase first, then hands the rest of the route the longest run
///
/// Items are matched in a loop, each committing to its first match, with a
/// checkpoint kept per iteration. The continuation then runs from the
/// longest run down to `min` items, so stack depth does not grow with the
/// number of repetitions.
pub(super) fn select_repetition<'r>(
    item: &Selector,
    min: usize,
    ctx: &mut RoutingContext<'r>,
    next: Continuation<'_, 'r>,
) -> MatchResult {
    ctx.attempt(|ctx| repeat(item, min, ctx, next))
}

fn repeat<'r>(
    item: &Selector,
    min: usize,
    ctx: &mut RoutingContext<'r>,
    next: Continuation<'_, 'r>,
) -> MatchResult {
    let names = item.binding_names();
    // one slot per iteration; an item may leave a name unbound
    let mut collected: Vec<Vec<Option<Value>>> = vec![Vec::new(); names.len()];
    let mut states = vec![ctx.checkpoint()];

    // the item's own step count bounds this loop
    let stopped = loop {
        let start = ctx.progress();
        let taken = ctx.attempt(|ctx| {
            item.select_then(ctx, &mut |ctx: &mut RoutingContext<'r>| {
                if ctx.progress() == start {
                    MatchResult::Failed(MatchFailure::NoProgress)
                } else {
                    MatchResult::Matched
                }
            })
        });

        match taken.into_failure() {
            None => {
                for (values, name) in collected.iter_mut().zip(&names) {
                    values.push(ctx.take_binding(name));
                }
                states.push(ctx.checkpoint());
            }
            Some(failure @ MatchFailure::BudgetExhausted { .. }) => {
                return MatchResult::Failed(failure)
            }
            Some(failure) => break failure,
        }
    };

    let count = states.len() - 1;
    if count < min {
        let too_few = MatchFailure::TooFewRepetitions { min, found: count };
        return MatchResult::Failed(too_few.closer(stopped));
    }

    let mut closest: Option<MatchFailure> = None;
    for len in (min..=count).rev() {
        ctx.restore(states[len].clone());
        let done = ctx.attempt(|ctx| {
            for (name, values) in names.iter().zip(&collected) {
                let items = values[..len].iter().flatten().cloned().collect();
                ctx.bind(name, Value::List(items));
            }
            next(ctx)
        });

        match done.into_failure() {
            None => return MatchResult::Matched,
            Some(failure @ MatchFailure::BudgetExhausted { .. }) => {
                return MatchResult::Failed(failure)
            }
            Some(failure) => {
                closest = Some(match closest {
                    Some(current) => current.closer(failure),
                    None => failure,
                });
            }
        }
    }

    MatchResult::Failed(match closest {
        Some(closest) => closest.closer(stopped),
        None => stopped,
    })
}

/// Produces the item once per element of the supplied lists
///
/// Every list argument the item binds must have the same length.
pub(super) fn unselect_repetition(item: &Selector, min: usize, ctx: &mut UnselectionContext) -> ProduceResult {
    let names = item.binding_names();
    let supplied: Vec<(String, Value)> = names
        .iter()
        .filter_map(|name| ctx.available(name).map(|value| (name.clone(), value.clone())))
        .collect();

    if supplied.is_empty() {
        return match (min, names.first()) {
            (0, _) | (_, None) => Ok(()),
            (_, Some(name)) => Err(UnselectionFailure::MissingArgument { name: name.clone() }),
        };
    }

    if let Some(name) = item
        .required_names()
        .into_iter()
        .find(|name| !supplied.iter().any(|(supplied, _)| supplied == name))
    {
        return Err(UnselectionFailure::MissingArgument { name });
    }

    let lists = supplied
        .into_iter()
        .map(|(name, value)| match value {
            Value::List(items) => Ok((name, items)),
            other => Err(UnselectionFailure::TypeMismatch {
                name,
                expected: "list",
                found: other.type_name(),
            }),
        })
        .collect::<Result<Vec<_>, _>>()?;

    let len = lists.first().map_or(0, |(_, items)| items.len());
    if lists.iter().any(|(_, items)| items.len() != len) {
        return Err(UnselectionFailure::ListLengthMismatch {
            names: lists.into_iter().map(|(name, _)| name).collect(),
        });
    }
    if len < min {
        let name = lists.first().map(|(name, _)| name.clone()).unwrap_or_default();
        return Err(UnselectionFailure::TooFewItems {
            name,
            min,
            found: len,
        });
    }

    for index in 0..len {
        for (name, items) in &lists {
            ctx.reseat(name, items[index].clone());
        }
        item.unselect(ctx)?;
    }
    for (name, items) in lists {
        ctx.settle(&name, Value::List(items));
    }

    Ok(())
}
