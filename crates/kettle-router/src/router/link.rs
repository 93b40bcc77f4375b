/// The product of link generation
use std::fmt;

use http::header::{HeaderValue, ACCEPT};
use http::Method;
use kettle_accept::MediaType;

use crate::error::UnselectionFailure;
use crate::path::join_segments;
use crate::request::RouteRequest;

/// A generated request: decoded segments and query pairs plus the method,
/// headers and content types the routable expects
///
/// `Display` renders the percent-encoded `path?query` form.
#[derive(Debug, Clone, PartialEq)]
pub struct Link {
    segments: Vec<String>,
    query: Vec<(String, String)>,
    headers: Vec<(String, String)>,
    method: Option<Method>,
    content_types: Vec<MediaType>,
}

impl Link {
    pub(crate) fn new(
        segments: Vec<String>,
        query: Vec<(String, String)>,
        headers: Vec<(String, String)>,
        method: Option<Method>,
        content_types: Vec<MediaType>,
    ) -> Self {
        Self {
            segments,
            query,
            headers,
            method,
            content_types,
        }
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn query(&self) -> &[(String, String)] {
        &self.query
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    /// Method the routable requires, if it restricts methods
    pub fn method(&self) -> Option<&Method> {
        self.method.as_ref()
    }

    /// Content types the routable can be served as, in offer order
    pub fn content_types(&self) -> &[MediaType] {
        &self.content_types
    }

    /// Encoded path, `/` for no segments
    pub fn path(&self) -> String {
        join_segments(&self.segments)
    }

    /// Encoded query string without the leading `?`
    pub fn query_string(&self) -> Option<String> {
        if self.query.is_empty() {
            return None;
        }

        let pairs: Vec<String> = self
            .query
            .iter()
            .map(|(key, value)| format!("{}={}", urlencoding::encode(key), urlencoding::encode(value)))
            .collect();
        Some(pairs.join("&"))
    }

    /// Rebuilds the request this link describes
    ///
    /// Uses `GET` when no method was recorded and an `Accept` header listing
    /// the recorded content types.
    pub fn to_request(&self) -> Result<RouteRequest, UnselectionFailure> {
        let method = self.method.clone().unwrap_or(Method::GET);
        let mut request = RouteRequest::new(method, &self.to_string()).map_err(invalid)?;

        for (name, value) in &self.headers {
            request = request.try_with_header(name, value).map_err(invalid)?;
        }

        if !self.content_types.is_empty() {
            let accept = self
                .content_types
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", ");
            let value = HeaderValue::from_str(&accept).map_err(invalid)?;
            request = request.with_header(ACCEPT, value);
        }

        Ok(request)
    }
}

impl fmt::Display for Link {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path())?;
        if let Some(query) = self.query_string() {
            write!(f, "?{}", query)?;
        }
        Ok(())
    }
}

fn invalid<E: fmt::Display>(err: E) -> UnselectionFailure {
    UnselectionFailure::InvalidLink {
        reason: err.to_string(),
    }
}
