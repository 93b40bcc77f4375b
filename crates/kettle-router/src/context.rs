/// Matching and link-generation state
///
/// [`RoutingContext`] carries everything a selector may consume or bind
/// while matching one request against one routable. [`UnselectionContext`]
/// is its mirror for link generation: supplied arguments in, URL parts out.
/// Both support cheap checkpoint/restore so failed branches leave no trace.
use std::collections::BTreeSet;

use http::Method;
use kettle_accept::MediaType;

use crate::error::{MatchFailure, UnselectionFailure};
use crate::request::{QueryMap, RouteRequest};
use crate::router::Link;
use crate::selector::MatchResult;
use crate::value::{Arguments, Value};

/// Knobs that affect a single matching attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchOptions {
    /// Compare literal segments ignoring ASCII case
    pub case_insensitive: bool,
    /// Maximum selector evaluations before giving up on a candidate
    pub max_steps: usize,
}

impl Default for MatchOptions {
    fn default() -> Self {
        Self {
            case_insensitive: false,
            max_steps: 10_000,
        }
    }
}

/// Content negotiation progress
#[derive(Debug, Clone, PartialEq)]
pub struct Negotiation {
    /// Every type any passed content predicate offered
    pub offered: Vec<MediaType>,
    /// Offers the client accepts that survived every predicate so far
    pub acceptable: Vec<MediaType>,
}

/// The mutable part of a [`RoutingContext`]
///
/// Cloning it is a checkpoint; assigning it back is a restore.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchState {
    cursor: usize,
    query: QueryMap,
    bindings: Arguments,
    negotiation: Option<Negotiation>,
}

impl MatchState {
    /// Index of the next unconsumed path segment
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Query arguments not consumed yet
    pub fn query(&self) -> &QueryMap {
        &self.query
    }

    pub fn bindings(&self) -> &Arguments {
        &self.bindings
    }

    pub fn negotiation(&self) -> Option<&Negotiation> {
        self.negotiation.as_ref()
    }
}

pub struct RoutingContext<'r> {
    request: &'r RouteRequest,
    state: MatchState,
    options: MatchOptions,
    steps: usize,
}

impl<'r> RoutingContext<'r> {
    pub fn new(request: &'r RouteRequest) -> Self {
        Self::with_options(request, MatchOptions::default())
    }

    pub fn with_options(request: &'r RouteRequest, options: MatchOptions) -> Self {
        Self {
            request,
            state: MatchState {
                cursor: 0,
                query: request.query().clone(),
                bindings: Arguments::new(),
                negotiation: None,
            },
            options,
            steps: 0,
        }
    }

    pub fn request(&self) -> &'r RouteRequest {
        self.request
    }

    pub fn options(&self) -> MatchOptions {
        self.options
    }

    // ========================================================================
    // Checkpoints
    // ========================================================================

    pub fn checkpoint(&self) -> MatchState {
        self.state.clone()
    }

    pub fn restore(&mut self, checkpoint: MatchState) {
        self.state = checkpoint;
    }

    /// Current state, for inspection
    pub fn state(&self) -> &MatchState {
        &self.state
    }

    /// Runs `f`, rolling every state change back unless it matched
    pub fn attempt<F>(&mut self, f: F) -> MatchResult
    where
        F: FnOnce(&mut Self) -> MatchResult,
    {
        let checkpoint = self.checkpoint();
        let result = f(self);
        if !result.is_matched() {
            self.restore(checkpoint);
        }
        result
    }

    /// Counts one selector evaluation against the budget
    ///
    /// Steps are not rolled back by [`restore`](Self::restore).
    pub fn tick(&mut self) -> Result<(), MatchFailure> {
        self.steps += 1;
        if self.steps > self.options.max_steps {
            return Err(MatchFailure::BudgetExhausted {
                steps: self.options.max_steps,
            });
        }
        Ok(())
    }

    pub fn steps(&self) -> usize {
        self.steps
    }

    /// (cursor, unconsumed query values): changes whenever input is consumed
    pub fn progress(&self) -> (usize, usize) {
        let values = self.state.query.values().map(Vec::len).sum();
        (self.state.cursor, values)
    }

    // ========================================================================
    // Path
    // ========================================================================

    pub fn peek_segment(&self) -> Option<&'r str> {
        self.request
            .segments()
            .get(self.state.cursor)
            .map(String::as_str)
    }

    pub fn advance(&mut self) {
        self.state.cursor += 1;
    }

    pub fn remaining_segments(&self) -> &'r [String] {
        let segments = self.request.segments();
        &segments[self.state.cursor.min(segments.len())..]
    }

    pub fn is_path_exhausted(&self) -> bool {
        self.remaining_segments().is_empty()
    }

    /// Literal comparison honoring the case sensitivity option
    pub fn segment_eq(&self, expected: &str, found: &str) -> bool {
        if self.options.case_insensitive {
            expected.eq_ignore_ascii_case(found)
        } else {
            expected == found
        }
    }

    // ========================================================================
    // Query
    // ========================================================================

    pub fn query_values(&self, name: &str) -> Option<&[String]> {
        self.state.query.get(name).map(Vec::as_slice)
    }

    /// Removes every value of `name`
    pub fn consume_query(&mut self, name: &str) -> Option<Vec<String>> {
        self.state.query.remove(name)
    }

    /// Removes the first value of `name`, leaving any others unconsumed
    pub fn consume_first_query(&mut self, name: &str) -> Option<String> {
        let values = self.state.query.get_mut(name)?;
        let first = (!values.is_empty()).then(|| values.remove(0));
        if values.is_empty() {
            self.state.query.remove(name);
        }
        first
    }

    pub fn unconsumed_query(&self) -> impl Iterator<Item = &str> {
        self.state.query.keys().map(String::as_str)
    }

    // ========================================================================
    // Bindings
    // ========================================================================

    pub fn bind(&mut self, name: &str, value: Value) {
        self.state.bindings.insert(name, value);
    }

    pub fn binding(&self, name: &str) -> Option<&Value> {
        self.state.bindings.get(name)
    }

    pub fn take_binding(&mut self, name: &str) -> Option<Value> {
        self.state.bindings.remove(name)
    }

    pub fn bindings(&self) -> &Arguments {
        &self.state.bindings
    }

    pub fn into_bindings(self) -> Arguments {
        self.state.bindings
    }

    // ========================================================================
    // Content negotiation
    // ========================================================================

    /// Intersects the acceptable set with what the client accepts of `offers`
    pub fn narrow(&mut self, offers: &[MediaType]) {
        let accepted = self.request.accept().acceptable(offers);
        match &mut self.state.negotiation {
            Some(negotiation) => {
                negotiation.acceptable.retain(|media| accepted.contains(media));
                for offer in offers {
                    if !negotiation.offered.contains(offer) {
                        negotiation.offered.push(offer.clone());
                    }
                }
            }
            None => {
                self.state.negotiation = Some(Negotiation {
                    offered: offers.to_vec(),
                    acceptable: accepted,
                });
            }
        }
    }

    pub fn negotiation(&self) -> Option<&Negotiation> {
        self.state.negotiation.as_ref()
    }

    /// `NotAcceptable` when content predicates left nothing the client accepts
    pub fn negotiation_failure(&self) -> Option<MatchFailure> {
        self.state
            .negotiation
            .as_ref()
            .filter(|negotiation| negotiation.acceptable.is_empty())
            .map(|negotiation| MatchFailure::NotAcceptable {
                offered: negotiation.offered.clone(),
            })
    }
}

/// Link-generation state
///
/// Holds the supplied arguments, which of them have been consumed, and the
/// URL parts produced so far.
#[derive(Debug, Clone, PartialEq)]
pub struct UnselectionContext {
    arguments: Arguments,
    consumed: BTreeSet<String>,
    segments: Vec<String>,
    query: Vec<(String, String)>,
    headers: Vec<(String, String)>,
    method: Option<Method>,
    content_types: Option<Vec<MediaType>>,
}

impl UnselectionContext {
    pub fn new(arguments: Arguments) -> Self {
        Self {
            arguments,
            consumed: BTreeSet::new(),
            segments: Vec::new(),
            query: Vec::new(),
            headers: Vec::new(),
            method: None,
            content_types: None,
        }
    }

    pub fn checkpoint(&self) -> Self {
        self.clone()
    }

    pub fn restore(&mut self, checkpoint: Self) {
        *self = checkpoint;
    }

    /// Runs `f`, rolling back every change if it fails
    pub fn attempt<F>(&mut self, f: F) -> Result<(), UnselectionFailure>
    where
        F: FnOnce(&mut Self) -> Result<(), UnselectionFailure>,
    {
        let checkpoint = self.checkpoint();
        let result = f(self);
        if result.is_err() {
            self.restore(checkpoint);
        }
        result
    }

    // ========================================================================
    // Arguments
    // ========================================================================

    /// Supplied and not yet consumed
    pub fn available(&self, name: &str) -> Option<&Value> {
        if self.consumed.contains(name) {
            None
        } else {
            self.arguments.get(name)
        }
    }

    pub fn is_consumed(&self, name: &str) -> bool {
        self.consumed.contains(name)
    }

    /// Marks `name` consumed and returns its value
    ///
    /// `Ok(None)` when the argument was not supplied.
    pub fn claim(&mut self, name: &str) -> Result<Option<Value>, UnselectionFailure> {
        if self.consumed.contains(name) {
            return Err(UnselectionFailure::AlreadyConsumed {
                name: name.to_string(),
            });
        }
        let value = self.arguments.get(name).cloned();
        if value.is_some() {
            self.consumed.insert(name.to_string());
        }
        Ok(value)
    }

    /// Exposes `value` as the available argument `name`
    ///
    /// Repetitions use this to hand one list item at a time to their item.
    pub fn reseat(&mut self, name: &str, value: Value) {
        self.consumed.remove(name);
        self.arguments.insert(name, value);
    }

    /// Puts the original argument back and marks it consumed
    pub fn settle(&mut self, name: &str, value: Value) {
        self.arguments.insert(name, value);
        self.consumed.insert(name.to_string());
    }

    /// Supplied arguments nothing consumed, in name order
    pub fn unconsumed(&self) -> Vec<String> {
        self.arguments
            .names()
            .filter(|name| !self.consumed.contains(*name))
            .map(str::to_string)
            .collect()
    }

    // ========================================================================
    // Output
    // ========================================================================

    pub fn push_segment(&mut self, segment: impl Into<String>) {
        self.segments.push(segment.into());
    }

    pub fn push_query(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.query.push((key.into(), value.into()));
    }

    pub fn push_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.headers.push((name.into(), value.into()));
    }

    /// Records the method a link needs; the first predicate wins
    pub fn record_method(&mut self, method: &Method) {
        if self.method.is_none() {
            self.method = Some(method.clone());
        }
    }

    /// Records (or narrows) the content types a link can be served as
    pub fn record_offers(&mut self, offers: &[MediaType]) {
        match &mut self.content_types {
            Some(types) => types.retain(|media| offers.contains(media)),
            None => self.content_types = Some(offers.to_vec()),
        }
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn query(&self) -> &[(String, String)] {
        &self.query
    }

    pub fn into_link(self) -> Link {
        Link::new(
            self.segments,
            self.query,
            self.headers,
            self.method,
            self.content_types.unwrap_or_default(),
        )
    }
}
