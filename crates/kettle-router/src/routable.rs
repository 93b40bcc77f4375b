/// Routable descriptors: what a handler declares about the requests it serves
use std::borrow::Borrow;
use std::fmt;

use http::Method;
use kettle_accept::MediaType;

use crate::value::{Codec, Value, ValueKind};

/// Opaque registration key of a routable
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RoutableId(String);

impl RoutableId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoutableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RoutableId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for RoutableId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl Borrow<str> for RoutableId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Where a parameter's value comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    /// A `{name}` or `{name*}` placeholder in the path template
    Path,
    /// A query argument of the same name
    Query,
    /// The named request header
    Header(String),
    /// The named cookie of the `Cookie` header
    Cookie(String),
}

/// A declared parameter
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    pub name: String,
    pub source: Source,
    pub kind: ValueKind,
    pub codec: Codec,
    pub required: bool,
    pub default: Option<Value>,
    /// Query only: bind every value as a list
    pub many: bool,
}

impl Parameter {
    fn new(name: impl Into<String>, source: Source, kind: ValueKind) -> Self {
        Self {
            name: name.into(),
            source,
            kind,
            codec: Codec::Plain,
            required: true,
            default: None,
            many: false,
        }
    }

    pub fn path(name: impl Into<String>, kind: ValueKind) -> Self {
        Self::new(name, Source::Path, kind)
    }

    pub fn query(name: impl Into<String>, kind: ValueKind) -> Self {
        Self::new(name, Source::Query, kind)
    }

    pub fn header(header: impl Into<String>, name: impl Into<String>, kind: ValueKind) -> Self {
        Self::new(name, Source::Header(header.into()), kind)
    }

    pub fn cookie(cookie: impl Into<String>, name: impl Into<String>, kind: ValueKind) -> Self {
        Self::new(name, Source::Cookie(cookie.into()), kind)
    }

    pub fn with_codec(mut self, codec: Codec) -> Self {
        self.codec = codec;
        self
    }

    /// May be absent from the request
    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    /// Value used when the request does not provide one
    pub fn with_default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    /// Collect every value of a query key into a list
    pub fn many(mut self) -> Self {
        self.many = true;
        self
    }
}

/// Everything the annotation processor needs to build a routable's selector
///
/// # Examples
///
/// ```
/// use http::Method;
/// use kettle_accept::MediaType;
/// use kettle_router::{Parameter, Routable, ValueKind};
///
/// let show = Routable::new("users.show", "/users/{id}")
///     .with_param(Parameter::path("id", ValueKind::Int))
///     .with_param(Parameter::query("tab", ValueKind::Str).with_default("profile"))
///     .with_method(Method::GET)
///     .offering(MediaType::json());
///
/// assert_eq!(show.id().as_str(), "users.show");
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Routable {
    id: RoutableId,
    template: String,
    params: Vec<Parameter>,
    offers: Vec<MediaType>,
    methods: Vec<Method>,
    priority: Option<i32>,
}

impl Routable {
    pub fn new(id: impl Into<RoutableId>, template: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            template: template.into(),
            params: Vec::new(),
            offers: Vec::new(),
            methods: Vec::new(),
            priority: None,
        }
    }

    pub fn with_param(mut self, param: Parameter) -> Self {
        self.params.push(param);
        self
    }

    pub fn with_params<I>(mut self, params: I) -> Self
    where
        I: IntoIterator<Item = Parameter>,
    {
        self.params.extend(params);
        self
    }

    /// Adds an offered content type; offer order is server preference
    pub fn offering(mut self, media: MediaType) -> Self {
        self.offers.push(media);
        self
    }

    pub fn with_method(mut self, method: Method) -> Self {
        self.methods.push(method);
        self
    }

    /// Explicit priority; lower values are tried first
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn id(&self) -> &RoutableId {
        &self.id
    }

    pub fn template(&self) -> &str {
        &self.template
    }

    pub fn params(&self) -> &[Parameter] {
        &self.params
    }

    pub fn offers(&self) -> &[MediaType] {
        &self.offers
    }

    pub fn methods(&self) -> &[Method] {
        &self.methods
    }

    pub fn priority(&self) -> Option<i32> {
        self.priority
    }
}
