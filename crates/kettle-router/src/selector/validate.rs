/// Registration-time checks on selector trees
///
/// A tree that passes is well-formed in both directions: every binding is
/// unique within its sequence, every alternative branch is reachable and
/// every optional or repeated part can be decided from the arguments alone.
use std::collections::BTreeSet;

use super::{HeaderPredicate, Selector};
use crate::error::ConstructionError;
use crate::value::{Codec, ValueKind};

impl Selector {
    /// Checks the whole tree, rejecting it when deeper than `max_depth`
    ///
    /// # Examples
    ///
    /// ```
    /// use kettle_router::{ConstructionError, Selector, ValueKind};
    ///
    /// let twice = Selector::sequence(vec![
    ///     Selector::variable("id", ValueKind::Int),
    ///     Selector::variable("id", ValueKind::Int),
    /// ]);
    /// assert_eq!(
    ///     twice.validate(64),
    ///     Err(ConstructionError::DuplicateBinding { name: "id".into() })
    /// );
    /// ```
    pub fn validate(&self, max_depth: usize) -> Result<(), ConstructionError> {
        let depth = self.depth();
        if depth > max_depth {
            return Err(ConstructionError::TooDeep {
                depth,
                max: max_depth,
            });
        }
        self.check()
    }

    fn check(&self) -> Result<(), ConstructionError> {
        match self {
            Selector::Literal(segment) => check_literal(segment),
            Selector::Variable { name, kind, codec } => {
                check_name(name)?;
                check_codec(name, *kind, *codec)
            }
            Selector::QueryArg { name, .. } | Selector::ArgumentBinder { name, .. } => {
                check_name(name)
            }
            Selector::Header(HeaderPredicate::Capture { header, name, .. }) => {
                check_name(name)?;
                if header.is_empty() {
                    return Err(ConstructionError::InvalidName {
                        name: header.clone(),
                    });
                }
                Ok(())
            }
            Selector::Header(HeaderPredicate::Cookie { cookie, name, .. }) => {
                check_name(name)?;
                if !is_cookie_name(cookie) {
                    return Err(ConstructionError::InvalidName {
                        name: cookie.clone(),
                    });
                }
                Ok(())
            }
            Selector::Header(_) => Ok(()),
            Selector::Sequence(children) => {
                children.iter().try_for_each(Selector::check)?;
                check_unique_bindings(children)
            }
            Selector::Alternative(branches) => {
                branches.iter().try_for_each(Selector::check)?;
                check_reachable(branches)
            }
            Selector::Optional(inner) => {
                inner.check()?;
                if inner.binding_names().is_empty() {
                    return Err(ConstructionError::AmbiguousOptional);
                }
                Ok(())
            }
            Selector::Repetition { item, .. } => {
                item.check()?;
                if item.captured_names().is_empty() {
                    return Err(ConstructionError::RepetitionBindsNothing);
                }
                Ok(())
            }
        }
    }
}

fn check_literal(segment: &str) -> Result<(), ConstructionError> {
    if segment.is_empty() || segment.contains('/') {
        return Err(ConstructionError::InvalidLiteral {
            literal: segment.to_string(),
        });
    }
    Ok(())
}

fn check_name(name: &str) -> Result<(), ConstructionError> {
    if name.is_empty() {
        return Err(ConstructionError::InvalidName {
            name: name.to_string(),
        });
    }
    Ok(())
}

/// Non-empty and free of the characters that delimit cookie pairs
pub(crate) fn is_cookie_name(cookie: &str) -> bool {
    !cookie.is_empty()
        && cookie
            .chars()
            .all(|c| c.is_ascii_graphic() && !matches!(c, '=' | ';' | ','))
}

fn check_codec(name: &str, kind: ValueKind, codec: Codec) -> Result<(), ConstructionError> {
    if codec.supports(kind) {
        Ok(())
    } else {
        Err(ConstructionError::CodecMismatch {
            name: name.to_string(),
            kind,
            codec,
        })
    }
}

/// No two children of one sequence capture the same name
///
/// Argument binders are exempt: they only fill slots nothing else bound.
fn check_unique_bindings(children: &[Selector]) -> Result<(), ConstructionError> {
    let mut seen = BTreeSet::new();
    for child in children {
        for name in child.captured_names() {
            if !seen.insert(name.clone()) {
                return Err(ConstructionError::DuplicateBinding { name });
            }
        }
    }
    Ok(())
}

/// A branch repeating an earlier one can never be reached
///
/// Any other branch still runs whenever the earlier ones cannot complete the
/// rest of the route.
fn check_reachable(branches: &[Selector]) -> Result<(), ConstructionError> {
    if branches.is_empty() {
        return Err(ConstructionError::EmptyAlternative);
    }

    for (index, branch) in branches.iter().enumerate() {
        if branches[..index].contains(branch) {
            return Err(ConstructionError::UnreachableBranch { index });
        }
    }
    Ok(())
}
