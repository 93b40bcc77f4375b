/// Concrete media types offered by routables
use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Errors produced while parsing media types and preference ranges
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MediaTypeError {
    /// Missing `/`, empty type or subtype, or stray characters
    #[error("malformed media type: {0:?}")]
    Malformed(String),

    /// A concrete media type may not contain `*`
    #[error("wildcard not allowed in concrete media type: {0:?}")]
    Wildcard(String),

    /// `q` parameter that is not a number in `0..=1`
    #[error("invalid quality value: {0:?}")]
    InvalidQuality(String),
}

/// A concrete (non-wildcard) media type such as `application/json`
///
/// Type and subtype are stored lowercase, so comparison is case-insensitive
/// as required for MIME types. Parameters are not part of the identity.
///
/// # Examples
///
/// ```
/// use kettle_accept::MediaType;
///
/// let json: MediaType = "Application/JSON".parse().unwrap();
/// assert_eq!(json, MediaType::json());
/// assert_eq!(json.to_string(), "application/json");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MediaType {
    type_: String,
    subtype: String,
}

impl MediaType {
    /// Creates a media type from its two halves
    ///
    /// Returns an error for empty halves or wildcards.
    pub fn new(type_: &str, subtype: &str) -> Result<Self, MediaTypeError> {
        let type_ = type_.trim();
        let subtype = subtype.trim();
        let joined = || format!("{}/{}", type_, subtype);

        if !is_token(type_) || !is_token(subtype) {
            return Err(MediaTypeError::Malformed(joined()));
        }
        if type_ == "*" || subtype == "*" {
            return Err(MediaTypeError::Wildcard(joined()));
        }

        Ok(Self {
            type_: type_.to_ascii_lowercase(),
            subtype: subtype.to_ascii_lowercase(),
        })
    }

    pub fn type_(&self) -> &str {
        &self.type_
    }

    pub fn subtype(&self) -> &str {
        &self.subtype
    }

    pub fn json() -> Self {
        Self::known("application", "json")
    }

    pub fn xml() -> Self {
        Self::known("application", "xml")
    }

    pub fn html() -> Self {
        Self::known("text", "html")
    }

    pub fn plain() -> Self {
        Self::known("text", "plain")
    }

    fn known(type_: &str, subtype: &str) -> Self {
        Self {
            type_: type_.to_string(),
            subtype: subtype.to_string(),
        }
    }
}

impl FromStr for MediaType {
    type Err = MediaTypeError;

    /// Parses `type/subtype`, ignoring any `;param=value` suffix
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let essence = s.split(';').next().unwrap_or_default();
        let (type_, subtype) = essence
            .split_once('/')
            .ok_or_else(|| MediaTypeError::Malformed(s.trim().to_string()))?;
        Self::new(type_, subtype)
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.type_, self.subtype)
    }
}

/// Checks that `s` is a non-empty RFC 7230 token (or a single `*`)
pub(crate) fn is_token(s: &str) -> bool {
    !s.is_empty()
        && s.bytes().all(|b| {
            b.is_ascii_alphanumeric() || b"!#$%&'*+-.^_`|~".contains(&b)
        })
}
