//! Bidirectional request routing
//!
//! A route is a tree of [`Selector`]s. The same tree both matches an
//! incoming [`RouteRequest`] into typed [`Arguments`] and turns
//! [`Arguments`] back into a [`Link`] that would match again.
//!
//! Trees are either composed by hand or synthesized from a declarative
//! [`Routable`] by the [`AnnotationProcessor`]. A [`Router`] tries its
//! registered trees in priority order and performs content negotiation
//! against the request's `Accept` header.
//!
//! # Examples
//!
//! ```
//! use kettle_router::{Arguments, Parameter, Routable, RouteRequest, Router, ValueKind};
//!
//! let mut builder = Router::builder();
//! builder.register(
//!     &Routable::new("search", "/search")
//!         .with_param(Parameter::query("q", ValueKind::Str))
//!         .with_param(Parameter::query("page", ValueKind::Int).with_default(1)),
//!     "search handler",
//! )?;
//! let router = builder.build();
//!
//! let matched = router.dispatch(&RouteRequest::get("/search?q=rust").unwrap()).unwrap();
//! assert_eq!(matched.arguments().get_str("q"), Some("rust"));
//! assert_eq!(matched.arguments().get_int("page"), Some(1));
//!
//! let link = router.url_for("search", &Arguments::new().with("q", "rust").with("page", 2));
//! assert_eq!(link.unwrap(), "/search?q=rust&page=2");
//! # Ok::<(), kettle_router::ConstructionError>(())
//! ```

pub mod annotation;
mod config;
mod context;
mod error;
pub mod path;
mod request;
mod routable;
mod router;
mod selector;
mod value;

pub use annotation::AnnotationProcessor;
pub use config::{Config, RouterConfig};
pub use context::{MatchOptions, MatchState, Negotiation, RoutingContext, UnselectionContext};
pub use error::{
    ConstructionError, DispatchError, MatchFailure, RequestError, UnselectionFailure,
};
pub use request::{parse_query, QueryMap, RouteRequest};
pub use routable::{Parameter, Routable, RoutableId, Source};
pub use router::{Link, RouteMatch, Router, RouterBuilder, SharedRouter};
pub use selector::{HeaderPredicate, MatchResult, ProduceResult, Selector};
pub use value::{Arguments, Codec, DecodeError, Value, ValueKind};

// Re-exported so callers can name offers without a direct dependency
pub use kettle_accept::{AcceptList, MediaRange, MediaType};
