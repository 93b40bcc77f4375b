/// Annotation processing: routable descriptors to selector trees
///
/// The processor is the only place that knows how declared parameters map
/// onto selectors. Its output is an ordinary [`Selector`], so hand-built
/// trees and synthesized ones are interchangeable at registration.
///
/// Synthesized shape:
///
/// ```text
/// Sequence[ template literals and variables, query args (declaration order),
///           header and cookie captures, method predicate, accepts predicate ]
/// ```
///
/// A parameter with a default becomes `Optional(selector)` followed by an
/// argument binder for the default.
use std::collections::{BTreeMap, BTreeSet};

use crate::error::ConstructionError;
use crate::routable::{Parameter, Routable, Source};
use crate::selector::{is_cookie_name, Selector};
use crate::value::Codec;

mod template;

pub use template::{classify_segment, is_identifier, parse_template, TemplateSegment};

/// Stateless translator from [`Routable`] to [`Selector`]
#[derive(Debug, Clone, Copy, Default)]
pub struct AnnotationProcessor;

impl AnnotationProcessor {
    pub fn new() -> Self {
        Self
    }

    /// Builds the selector tree for a routable
    ///
    /// Pure and deterministic: the same routable always yields the same tree.
    ///
    /// # Examples
    ///
    /// ```
    /// use kettle_router::{AnnotationProcessor, Parameter, Routable, Selector, ValueKind};
    ///
    /// let routable = Routable::new("users.show", "/users/{id}")
    ///     .with_param(Parameter::path("id", ValueKind::Int));
    ///
    /// let tree = AnnotationProcessor::new().synthesize(&routable).unwrap();
    /// assert_eq!(
    ///     tree,
    ///     Selector::sequence(vec![
    ///         Selector::literal("users"),
    ///         Selector::variable("id", ValueKind::Int),
    ///     ])
    /// );
    /// ```
    pub fn synthesize(&self, routable: &Routable) -> Result<Selector, ConstructionError> {
        let params = check_params(routable.params())?;
        let mut children = Vec::new();
        let mut placed = BTreeSet::new();

        for segment in parse_template(routable.template())? {
            match segment {
                TemplateSegment::Literal(text) => children.push(Selector::Literal(text)),
                TemplateSegment::Placeholder(name) => {
                    let param = place(&params, &mut placed, &name)?;
                    check_default(param, false)?;
                    let variable = Selector::variable_with(&name, param.kind, param.codec);
                    push_with_default(&mut children, variable, param);
                }
                TemplateSegment::Wildcard(name) => {
                    let param = place(&params, &mut placed, &name)?;
                    check_default(param, true)?;
                    // an empty match binds an empty list, so a default needs at least one item
                    let min = usize::from(param.required || param.default.is_some());
                    let repetition = Selector::repeat_at_least(
                        Selector::variable_with(&name, param.kind, param.codec),
                        min,
                    );
                    push_with_default(&mut children, repetition, param);
                }
            }
        }

        if let Some(unplaced) = routable
            .params()
            .iter()
            .find(|param| param.source == Source::Path && !placed.contains(&param.name))
        {
            return Err(ConstructionError::MissingPlaceholder {
                name: unplaced.name.clone(),
            });
        }

        for param in routable.params() {
            if param.source == Source::Query {
                // a default makes the whole selector optional instead
                let selector = Selector::QueryArg {
                    name: param.name.clone(),
                    kind: param.kind,
                    required: param.required || param.default.is_some(),
                    many: param.many,
                };
                push_with_default(&mut children, selector, param);
            }
        }

        for param in routable.params() {
            let required = param.required || param.default.is_some();
            let selector = match &param.source {
                Source::Header(header) => Selector::header(header, &param.name, param.kind, required),
                Source::Cookie(cookie) => Selector::cookie(cookie, &param.name, param.kind, required),
                Source::Path | Source::Query => continue,
            };
            push_with_default(&mut children, selector, param);
        }

        if !routable.methods().is_empty() {
            children.push(Selector::method(routable.methods().iter().cloned()));
        }
        if !routable.offers().is_empty() {
            children.push(Selector::accepts(routable.offers().iter().cloned()));
        }

        tracing::trace!(
            "synthesized {} selector(s) for {}",
            children.len(),
            routable.id()
        );
        Ok(Selector::Sequence(children))
    }
}

/// Wraps `selector` in an optional plus binder when the parameter has a default
fn push_with_default(children: &mut Vec<Selector>, selector: Selector, param: &Parameter) {
    match &param.default {
        Some(default) => {
            children.push(Selector::optional(selector));
            children.push(Selector::bind(&param.name, default.clone()));
        }
        None => children.push(selector),
    }
}

/// Resolves a placeholder to its declared path parameter, once per name
fn place<'p>(
    params: &BTreeMap<&str, &'p Parameter>,
    placed: &mut BTreeSet<String>,
    name: &str,
) -> Result<&'p Parameter, ConstructionError> {
    if !placed.insert(name.to_string()) {
        return Err(ConstructionError::DuplicateParameter {
            name: name.to_string(),
        });
    }

    params
        .get(name)
        .copied()
        .filter(|param| param.source == Source::Path)
        .ok_or_else(|| ConstructionError::UnknownParameter {
            name: name.to_string(),
        })
}

/// Per-parameter checks; returns the parameters indexed by name
fn check_params(params: &[Parameter]) -> Result<BTreeMap<&str, &Parameter>, ConstructionError> {
    params.iter().try_fold(BTreeMap::new(), |mut index, param| {
        let invalid = |reason: &str| ConstructionError::InvalidParameter {
            name: param.name.clone(),
            reason: reason.to_string(),
        };

        if !is_identifier(&param.name) {
            return Err(ConstructionError::InvalidName {
                name: param.name.clone(),
            });
        }
        if index.insert(param.name.as_str(), param).is_some() {
            return Err(ConstructionError::DuplicateParameter {
                name: param.name.clone(),
            });
        }
        if !param.codec.supports(param.kind) {
            return Err(ConstructionError::CodecMismatch {
                name: param.name.clone(),
                kind: param.kind,
                codec: param.codec,
            });
        }
        if param.codec != Codec::Plain && param.source != Source::Path {
            return Err(invalid("codecs apply to path parameters only"));
        }
        if param.many && param.source != Source::Query {
            return Err(invalid("only query parameters can collect many values"));
        }
        match &param.source {
            Source::Header(header) if http::HeaderName::from_bytes(header.as_bytes()).is_err() => {
                return Err(invalid("invalid header name"));
            }
            Source::Cookie(cookie) if !is_cookie_name(cookie) => {
                return Err(invalid("invalid cookie name"));
            }
            _ => {}
        }
        if param.source != Source::Path {
            check_default(param, param.many)?;
        }

        Ok(index)
    })
}

fn check_default(param: &Parameter, many: bool) -> Result<(), ConstructionError> {
    match &param.default {
        Some(default) if !default.conforms_to(param.kind, many) => {
            Err(ConstructionError::InvalidParameter {
                name: param.name.clone(),
                reason: "default does not match the declared type".to_string(),
            })
        }
        _ => Ok(()),
    }
}
