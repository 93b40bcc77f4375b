/// Route registry, forward dispatch and link generation
///
/// Registration happens on a [`RouterBuilder`]; [`RouterBuilder::build`]
/// freezes the entries into an immutable [`Router`] ordered by priority
/// (lower first, ties keep registration order). A [`SharedRouter`] publishes
/// routers to concurrent readers and applies later registrations
/// copy-on-write.
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use kettle_accept::MediaType;

use crate::annotation::AnnotationProcessor;
use crate::config::RouterConfig;
use crate::context::{RoutingContext, UnselectionContext};
use crate::error::{ConstructionError, DispatchError, MatchFailure, UnselectionFailure};
use crate::path::decode_segments;
use crate::request::RouteRequest;
use crate::routable::{Routable, RoutableId};
use crate::selector::{MatchResult, Selector};
use crate::value::Arguments;

mod link;
mod shared;

pub use link::Link;
pub use shared::SharedRouter;

/// A registered routable: its tree, handler and ordering keys
struct RouteEntry<H> {
    id: RoutableId,
    selector: Selector,
    handler: Arc<H>,
    priority: i32,
    sequence: usize,
}

// ============================================================================
// Builder
// ============================================================================

/// Registration phase of a router
///
/// # Examples
///
/// ```
/// use kettle_router::{Parameter, Routable, RouteRequest, RouterBuilder, ValueKind};
///
/// let mut builder = RouterBuilder::new();
/// builder
///     .register(&Routable::new("home", "/"), "home page")?
///     .register(
///         &Routable::new("users.show", "/users/{id}")
///             .with_param(Parameter::path("id", ValueKind::Int)),
///         "user page",
///     )?;
/// let router = builder.build();
///
/// let matched = router.dispatch(&RouteRequest::get("/users/7").unwrap()).unwrap();
/// assert_eq!(*matched.handler(), "user page");
/// assert_eq!(matched.arguments().get_int("id"), Some(7));
/// # Ok::<(), kettle_router::ConstructionError>(())
/// ```
pub struct RouterBuilder<H> {
    entries: Vec<Arc<RouteEntry<H>>>,
    config: RouterConfig,
    processor: AnnotationProcessor,
    next_sequence: usize,
}

impl<H> RouterBuilder<H> {
    pub fn new() -> Self {
        Self::from_config(RouterConfig::default())
    }

    /// Starts a builder whose registrations honor `config`
    pub fn from_config(config: RouterConfig) -> Self {
        Self {
            entries: Vec::new(),
            config,
            processor: AnnotationProcessor::new(),
            next_sequence: 0,
        }
    }

    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    /// Registers a routable through the annotation processor
    pub fn register(
        &mut self,
        routable: &Routable,
        handler: H,
    ) -> Result<&mut Self, ConstructionError> {
        let selector = self.processor.synthesize(routable)?;
        self.insert(
            routable.id().clone(),
            selector,
            routable.priority().unwrap_or(0),
            handler,
        )
    }

    /// Registers a hand-built selector tree at default priority
    pub fn register_selector(
        &mut self,
        id: impl Into<RoutableId>,
        selector: Selector,
        handler: H,
    ) -> Result<&mut Self, ConstructionError> {
        self.insert(id.into(), selector, 0, handler)
    }

    /// Registers a hand-built selector tree; lower priorities are tried first
    pub fn register_selector_with_priority(
        &mut self,
        id: impl Into<RoutableId>,
        selector: Selector,
        priority: i32,
        handler: H,
    ) -> Result<&mut Self, ConstructionError> {
        self.insert(id.into(), selector, priority, handler)
    }

    /// Removes a routable; returns whether it was registered
    pub fn deregister(&mut self, id: &str) -> bool {
        let before = self.entries.len();
        self.entries.retain(|entry| entry.id.as_str() != id);
        let removed = self.entries.len() != before;
        if removed {
            tracing::debug!("deregistered {}", id);
        }
        removed
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.iter().any(|entry| entry.id.as_str() == id)
    }

    fn insert(
        &mut self,
        id: RoutableId,
        selector: Selector,
        priority: i32,
        handler: H,
    ) -> Result<&mut Self, ConstructionError> {
        if self.contains(id.as_str()) {
            return Err(ConstructionError::DuplicateRoutable { id: id.to_string() });
        }

        let selector = self.rebase(selector)?;
        selector.validate(self.config.max_depth)?;

        tracing::debug!("registered {} (priority {})", id, priority);
        self.entries.push(Arc::new(RouteEntry {
            id,
            selector,
            handler: Arc::new(handler),
            priority,
            sequence: self.next_sequence,
        }));
        self.next_sequence += 1;
        Ok(self)
    }

    /// Prefixes the configured base path
    fn rebase(&self, selector: Selector) -> Result<Selector, ConstructionError> {
        let Some(base_path) = self.config.base_path.as_deref() else {
            return Ok(selector);
        };

        let segments = decode_segments(base_path).map_err(|err| ConstructionError::Template {
            template: base_path.to_string(),
            reason: err.to_string(),
        })?;
        if segments.is_empty() {
            return Ok(selector);
        }

        let mut children: Vec<Selector> = segments.into_iter().map(Selector::Literal).collect();
        children.push(selector);
        Ok(Selector::Sequence(children))
    }

    /// Freezes the registrations into an immutable router
    pub fn build(self) -> Router<H> {
        let mut entries = self.entries;
        entries.sort_by_key(|entry| (entry.priority, entry.sequence));

        let index = entries
            .iter()
            .enumerate()
            .map(|(position, entry)| (entry.id.clone(), position))
            .collect();

        Router {
            entries,
            index,
            config: self.config,
            next_sequence: self.next_sequence,
        }
    }
}

impl<H> Default for RouterBuilder<H> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H> Clone for RouterBuilder<H> {
    fn clone(&self) -> Self {
        Self {
            entries: self.entries.clone(),
            config: self.config.clone(),
            processor: self.processor,
            next_sequence: self.next_sequence,
        }
    }
}

// ============================================================================
// Router
// ============================================================================

/// Result of a successful dispatch: which routable, with what arguments
pub struct RouteMatch<H> {
    id: RoutableId,
    handler: Arc<H>,
    arguments: Arguments,
    content_type: Option<MediaType>,
}

impl<H> RouteMatch<H> {
    pub fn id(&self) -> &RoutableId {
        &self.id
    }

    pub fn handler(&self) -> &H {
        &self.handler
    }

    pub fn arguments(&self) -> &Arguments {
        &self.arguments
    }

    pub fn into_arguments(self) -> Arguments {
        self.arguments
    }

    /// Best offered content type for the client, if the routable offers any
    pub fn content_type(&self) -> Option<&MediaType> {
        self.content_type.as_ref()
    }

    /// Calls the handler with the bound arguments
    pub fn invoke<R>(&self) -> R
    where
        H: Fn(&Arguments) -> R,
    {
        (self.handler)(&self.arguments)
    }
}

impl<H> fmt::Debug for RouteMatch<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteMatch")
            .field("id", &self.id)
            .field("arguments", &self.arguments)
            .field("content_type", &self.content_type)
            .finish_non_exhaustive()
    }
}

/// Immutable, priority-ordered registry
pub struct Router<H> {
    entries: Vec<Arc<RouteEntry<H>>>,
    index: HashMap<RoutableId, usize>,
    config: RouterConfig,
    next_sequence: usize,
}

impl<H> Router<H> {
    pub fn builder() -> RouterBuilder<H> {
        RouterBuilder::new()
    }

    /// A builder holding this router's registrations, for copy-on-write updates
    pub fn to_builder(&self) -> RouterBuilder<H> {
        RouterBuilder {
            entries: self.entries.clone(),
            config: self.config.clone(),
            processor: AnnotationProcessor::new(),
            next_sequence: self.next_sequence,
        }
    }

    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Routable ids in dispatch order
    pub fn routables(&self) -> impl Iterator<Item = &RoutableId> {
        self.entries.iter().map(|entry| &entry.id)
    }

    /// The registered tree of a routable (base path included)
    pub fn selector(&self, id: &str) -> Option<&Selector> {
        self.entry(id).map(|entry| &entry.selector)
    }

    fn entry(&self, id: &str) -> Option<&RouteEntry<H>> {
        self.index
            .get(id)
            .and_then(|position| self.entries.get(*position))
            .map(Arc::as_ref)
    }

    /// Finds the first routable, in priority order, that accepts the request
    ///
    /// A candidate is accepted when its tree matches, no path segment is left
    /// over (no query key either, with `strict_query`) and content
    /// negotiation left at least one acceptable type.
    pub fn dispatch(&self, request: &RouteRequest) -> Result<RouteMatch<H>, DispatchError> {
        let options = self.config.match_options();
        let mut refused: Option<Vec<MediaType>> = None;

        tracing::debug!(
            "dispatching {} {} against {} route(s)",
            request.method(),
            request.path(),
            self.entries.len()
        );

        for entry in &self.entries {
            let mut ctx = RoutingContext::with_options(request, options);
            let result = run_candidate(&entry.selector, &mut ctx, self.config.strict_query);

            match result.into_failure() {
                None => {
                    let content_type = ctx
                        .negotiation()
                        .and_then(|negotiation| request.accept().negotiate(&negotiation.acceptable));
                    tracing::debug!("{} {} -> {}", request.method(), request.path(), entry.id);

                    return Ok(RouteMatch {
                        id: entry.id.clone(),
                        handler: Arc::clone(&entry.handler),
                        arguments: ctx.into_bindings(),
                        content_type,
                    });
                }
                Some(MatchFailure::NotAcceptable { offered }) => {
                    tracing::trace!("{} matched {} but nothing offered is acceptable", entry.id, request.path());
                    refused.get_or_insert(offered);
                }
                Some(failure @ MatchFailure::BudgetExhausted { .. }) => {
                    tracing::warn!("{} gave up on {}: {}", entry.id, request.path(), failure);
                }
                Some(failure) => {
                    tracing::trace!("{} rejected {}: {}", entry.id, request.path(), failure);
                }
            }
        }

        let path = request.path().to_string();
        Err(match refused {
            Some(offered) => DispatchError::NotAcceptable { path, offered },
            None => DispatchError::NoRoute { path },
        })
    }

    /// Builds the link that routes to `id` with `arguments`
    ///
    /// Every supplied argument must be used exactly once.
    ///
    /// # Examples
    ///
    /// ```
    /// use kettle_router::{Arguments, Parameter, Routable, RouterBuilder, ValueKind};
    ///
    /// let mut builder = RouterBuilder::new();
    /// builder.register(
    ///     &Routable::new("posts.show", "/posts/{year}/{slug}")
    ///         .with_param(Parameter::path("year", ValueKind::Int))
    ///         .with_param(Parameter::path("slug", ValueKind::Str)),
    ///     (),
    /// )?;
    /// let router = builder.build();
    ///
    /// let args = Arguments::new().with("year", 2024).with("slug", "hello world");
    /// assert_eq!(router.url_for("posts.show", &args).unwrap(), "/posts/2024/hello%20world");
    /// # Ok::<(), kettle_router::ConstructionError>(())
    /// ```
    pub fn reverse(&self, id: &str, arguments: &Arguments) -> Result<Link, UnselectionFailure> {
        let entry = self
            .entry(id)
            .ok_or_else(|| UnselectionFailure::UnknownRoutable { id: id.to_string() })?;

        let mut ctx = UnselectionContext::new(arguments.clone());
        let produced = entry.selector.unselect(&mut ctx).and_then(|()| {
            let leftovers = ctx.unconsumed();
            if leftovers.is_empty() {
                Ok(())
            } else {
                Err(UnselectionFailure::UnexpectedArguments { names: leftovers })
            }
        });

        if let Err(failure) = produced {
            tracing::debug!("cannot build link for {}: {}", id, failure);
            return Err(failure);
        }
        Ok(ctx.into_link())
    }

    /// [`reverse`](Self::reverse) rendered as `path?query`
    pub fn url_for(&self, id: &str, arguments: &Arguments) -> Result<String, UnselectionFailure> {
        self.reverse(id, arguments).map(|link| link.to_string())
    }

    /// Builds a link and checks that it dispatches back to `id` with the
    /// supplied arguments
    ///
    /// Arguments the route fills in by itself (defaults) may appear in the
    /// dispatched arguments in addition to the supplied ones.
    pub fn verify_link(&self, id: &str, arguments: &Arguments) -> Result<Link, UnselectionFailure> {
        let link = self.reverse(id, arguments)?;
        let request = link.to_request()?;

        let routed = match self.dispatch(&request) {
            Ok(matched) if matched.id.as_str() == id && arguments.is_subset_of(&matched.arguments) => {
                return Ok(link);
            }
            Ok(matched) => Some(matched.id.to_string()),
            Err(_) => None,
        };

        tracing::debug!("link {} for {} does not route back (routed to {:?})", link, id, routed);
        Err(UnselectionFailure::RoundTrip {
            id: id.to_string(),
            routed,
        })
    }

    /// Verifies a whole link table, collecting every failure
    ///
    /// Meant for startup: a table of the links an application renders.
    pub fn validate_links<'a, I>(&self, table: I) -> Result<(), Vec<(String, UnselectionFailure)>>
    where
        I: IntoIterator<Item = (&'a str, &'a Arguments)>,
    {
        let failures: Vec<(String, UnselectionFailure)> = table
            .into_iter()
            .filter_map(|(id, arguments)| {
                self.verify_link(id, arguments)
                    .err()
                    .map(|failure| (id.to_string(), failure))
            })
            .collect();

        if failures.is_empty() {
            return Ok(());
        }

        for (id, failure) in &failures {
            tracing::warn!("invalid link for {}: {}", id, failure);
        }
        Err(failures)
    }
}

impl<H> Clone for Router<H> {
    fn clone(&self) -> Self {
        Self {
            entries: self.entries.clone(),
            index: self.index.clone(),
            config: self.config.clone(),
            next_sequence: self.next_sequence,
        }
    }
}

impl<H> Default for Router<H> {
    fn default() -> Self {
        RouterBuilder::new().build()
    }
}

impl<H> fmt::Debug for Router<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Router")
            .field("routables", &self.routables().collect::<Vec<_>>())
            .field("config", &self.config)
            .finish()
    }
}

/// Matches one candidate, then applies the acceptance rules
fn run_candidate<'r>(selector: &Selector, ctx: &mut RoutingContext<'r>, strict_query: bool) -> MatchResult {
    selector.select_then(ctx, &mut |ctx: &mut RoutingContext<'r>| {
        accept_candidate(ctx, strict_query)
    })
}

fn accept_candidate(ctx: &mut RoutingContext<'_>, strict_query: bool) -> MatchResult {
    let remaining = ctx.remaining_segments().len();
    if remaining > 0 {
        return MatchResult::Failed(MatchFailure::TrailingSegments { remaining });
    }

    if strict_query {
        let keys: Vec<String> = ctx.unconsumed_query().map(str::to_string).collect();
        if !keys.is_empty() {
            return MatchResult::Failed(MatchFailure::UnconsumedQuery { keys });
        }
    }

    match ctx.negotiation_failure() {
        Some(failure) => MatchResult::Failed(failure),
        None => MatchResult::Matched,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routable::Parameter;
    use crate::value::ValueKind;
    use pretty_assertions::assert_eq;

    fn users() -> Routable {
        Routable::new("users.show", "/users/{id}").with_param(Parameter::path("id", ValueKind::Int))
    }

    #[test]
    fn test_duplicate_routable_is_rejected() {
        let mut builder = RouterBuilder::new();
        builder.register(&users(), 1).unwrap();
        assert!(matches!(
            builder.register(&users(), 2),
            Err(ConstructionError::DuplicateRoutable { .. })
        ));
        assert_eq!(builder.build().len(), 1);
    }

    #[test]
    fn test_failed_registration_leaves_builder_usable() {
        let mut builder = RouterBuilder::new();
        let broken = Routable::new("broken", "/{missing}");
        assert!(builder.register(&broken, 0).is_err());
        builder.register(&users(), 1).unwrap();

        let router = builder.build();
        assert_eq!(router.routables().collect::<Vec<_>>(), vec![&RoutableId::from("users.show")]);
    }

    #[test]
    fn test_priority_orders_dispatch() {
        let mut builder = RouterBuilder::new();
        builder
            .register_selector("late", Selector::literal("a"), "late")
            .unwrap()
            .register_selector_with_priority("early", Selector::literal("a"), -1, "early")
            .unwrap();
        let router = builder.build();

        let ids: Vec<&str> = router.routables().map(RoutableId::as_str).collect();
        assert_eq!(ids, vec!["early", "late"]);

        let matched = router.dispatch(&RouteRequest::get("/a").unwrap()).unwrap();
        assert_eq!(*matched.handler(), "early");
    }

    #[test]
    fn test_trailing_segments_reject() {
        let mut builder = RouterBuilder::new();
        builder.register(&users(), ()).unwrap();
        let router = builder.build();

        let err = router.dispatch(&RouteRequest::get("/users/1/edit").unwrap()).unwrap_err();
        assert_eq!(err, DispatchError::NoRoute { path: "/users/1/edit".into() });
    }

    #[test]
    fn test_base_path_applies_both_ways() {
        let config = RouterConfig::default().with_base_path("/api/v1");
        let mut builder = RouterBuilder::from_config(config);
        builder.register(&users(), ()).unwrap();
        let router = builder.build();

        assert!(router.dispatch(&RouteRequest::get("/users/3").unwrap()).is_err());
        let matched = router.dispatch(&RouteRequest::get("/api/v1/users/3").unwrap()).unwrap();
        assert_eq!(matched.arguments().get_int("id"), Some(3));

        let args = Arguments::new().with("id", 3);
        assert_eq!(router.url_for("users.show", &args).unwrap(), "/api/v1/users/3");
    }

    #[test]
    fn test_case_insensitive_literals() {
        let config = RouterConfig::default().with_case_insensitive(true);
        let mut builder = RouterBuilder::from_config(config);
        builder.register(&users(), ()).unwrap();
        let router = builder.build();

        assert!(router.dispatch(&RouteRequest::get("/USERS/3").unwrap()).is_ok());
    }

    #[test]
    fn test_strict_query() {
        let lenient = {
            let mut builder = RouterBuilder::new();
            builder.register(&users(), ()).unwrap();
            builder.build()
        };
        let strict = {
            let mut builder = RouterBuilder::from_config(RouterConfig::default().with_strict_query(true));
            builder.register(&users(), ()).unwrap();
            builder.build()
        };

        let request = RouteRequest::get("/users/3?utm=mail").unwrap();
        assert!(lenient.dispatch(&request).is_ok());
        assert_eq!(
            strict.dispatch(&request).unwrap_err(),
            DispatchError::NoRoute { path: "/users/3".into() }
        );
    }

    #[test]
    fn test_deregister() {
        let mut builder = RouterBuilder::new();
        builder.register(&users(), ()).unwrap();
        assert!(builder.deregister("users.show"));
        assert!(!builder.deregister("users.show"));
        assert!(builder.build().is_empty());
    }

    #[test]
    fn test_reverse_unknown_and_extra_arguments() {
        let mut builder = RouterBuilder::new();
        builder.register(&users(), ()).unwrap();
        let router = builder.build();

        assert_eq!(
            router.reverse("nope", &Arguments::new()),
            Err(UnselectionFailure::UnknownRoutable { id: "nope".into() })
        );
        assert_eq!(
            router.reverse("users.show", &Arguments::new().with("id", 1).with("tab", "x")),
            Err(UnselectionFailure::UnexpectedArguments { names: vec!["tab".into()] })
        );
    }

    #[test]
    fn test_depth_limit() {
        let config = RouterConfig::default().with_max_depth(2);
        let mut builder = RouterBuilder::from_config(config);
        let deep = Selector::sequence(vec![Selector::optional(Selector::sequence(vec![
            Selector::variable("id", ValueKind::Int),
        ]))]);

        assert!(matches!(
            builder.register_selector("deep", deep, ()),
            Err(ConstructionError::TooDeep { depth: 4, max: 2 })
        ));
    }
}
