/// Immutable view of an incoming request
///
/// The router never touches a transport. Whatever receives the request
/// builds a [`RouteRequest`] from its method, target and headers, and the
/// matcher reads from it through a [`RoutingContext`](crate::RoutingContext).
use std::borrow::Cow;
use std::collections::BTreeMap;

use http::header::{HeaderName, HeaderValue, ACCEPT, COOKIE};
use http::{HeaderMap, Method, Uri};
use kettle_accept::AcceptList;

use crate::error::RequestError;
use crate::path::{decode_segments, normalize_path};

/// Decoded query string: key to values in order of appearance
pub type QueryMap = BTreeMap<String, Vec<String>>;

#[derive(Debug, Clone)]
pub struct RouteRequest {
    method: Method,
    path: String,
    segments: Vec<String>,
    query: QueryMap,
    headers: HeaderMap,
    accept: AcceptList,
}

impl RouteRequest {
    /// Builds a request from a method and a `path?query` target
    ///
    /// A `#fragment` suffix is ignored.
    ///
    /// # Examples
    ///
    /// ```
    /// use http::Method;
    /// use kettle_router::RouteRequest;
    ///
    /// let req = RouteRequest::new(Method::GET, "/search/?q=rust+lang&page=2").unwrap();
    /// assert_eq!(req.path(), "/search");
    /// assert_eq!(req.segments(), ["search"]);
    /// assert_eq!(req.query_values("q"), Some(&["rust lang".to_string()][..]));
    /// ```
    pub fn new(method: Method, target: &str) -> Result<Self, RequestError> {
        let target = target.split('#').next().unwrap_or_default();
        let (path, query) = match target.split_once('?') {
            Some((path, query)) => (path, Some(query)),
            None => (target, None),
        };
        Self::from_parts(method, path, query, HeaderMap::new())
    }

    /// Shorthand for a `GET` request
    pub fn get(target: &str) -> Result<Self, RequestError> {
        Self::new(Method::GET, target)
    }

    /// Builds a request from already parsed `http` parts
    pub fn from_http(method: Method, uri: &Uri, headers: HeaderMap) -> Result<Self, RequestError> {
        Self::from_parts(method, uri.path(), uri.query(), headers)
    }

    fn from_parts(
        method: Method,
        path: &str,
        query: Option<&str>,
        headers: HeaderMap,
    ) -> Result<Self, RequestError> {
        let path = normalize_path(path).into_owned();
        let segments = decode_segments(&path)?;
        let query = query.map(parse_query).transpose()?.unwrap_or_default();
        let accept = accept_from(&headers);

        Ok(Self {
            method,
            path,
            segments,
            query,
            headers,
            accept,
        })
    }

    pub fn with_method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    /// Adds a header; an `Accept` header also replaces the parsed preferences
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.append(name, value);
        self.accept = accept_from(&self.headers);
        self
    }

    /// Adds a header given as strings
    pub fn try_with_header(self, name: &str, value: &str) -> Result<Self, RequestError> {
        let invalid = || RequestError::Header {
            name: name.to_string(),
        };
        let name = HeaderName::from_bytes(name.as_bytes()).map_err(|_| invalid())?;
        let value = HeaderValue::from_str(value).map_err(|_| invalid())?;
        Ok(self.with_header(name, value))
    }

    /// Sets the `Accept` header
    ///
    /// # Examples
    ///
    /// ```
    /// use kettle_accept::MediaType;
    /// use kettle_router::RouteRequest;
    ///
    /// let req = RouteRequest::get("/users").unwrap().with_accept("application/json");
    /// assert!(req.accept().accepts(&MediaType::json()));
    /// assert!(!req.accept().accepts(&MediaType::html()));
    /// ```
    pub fn with_accept(mut self, header: &str) -> Self {
        match HeaderValue::from_str(header) {
            Ok(value) => {
                self.headers.insert(ACCEPT, value);
                self.accept = accept_from(&self.headers);
            }
            Err(_) => {
                tracing::warn!("ignoring unrepresentable Accept header {:?}", header);
            }
        }
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Normalized, still encoded path
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Decoded path segments
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn query(&self) -> &QueryMap {
        &self.query
    }

    pub fn query_values(&self, key: &str) -> Option<&[String]> {
        self.query.get(key).map(Vec::as_slice)
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// First value of a header, if present and valid UTF-8
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|value| value.to_str().ok())
    }

    /// Value of a cookie across every `Cookie` header, percent-decoded
    ///
    /// The first pair with this name wins; text that does not decode is
    /// returned as sent.
    pub fn cookie(&self, name: &str) -> Option<String> {
        self.headers
            .get_all(COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .flat_map(|header| header.split(';'))
            .filter_map(|pair| pair.trim().split_once('='))
            .find(|(key, _)| *key == name)
            .map(|(_, raw)| {
                let raw = raw.trim_matches('"');
                urlencoding::decode(raw)
                    .map(Cow::into_owned)
                    .unwrap_or_else(|_| raw.to_string())
            })
    }

    pub fn accept(&self) -> &AcceptList {
        &self.accept
    }
}

/// Parses `a=1&b=x+y&a=2` into a [`QueryMap`]
///
/// `+` means space in query values. A key without `=` gets an empty value.
pub fn parse_query(query: &str) -> Result<QueryMap, RequestError> {
    query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            Ok((decode_component(key)?, decode_component(value)?))
        })
        .try_fold(QueryMap::new(), |mut map, pair: Result<_, RequestError>| {
            let (key, value) = pair?;
            map.entry(key).or_default().push(value);
            Ok(map)
        })
}

fn decode_component(raw: &str) -> Result<String, RequestError> {
    let spaced = if raw.contains('+') {
        Cow::Owned(raw.replace('+', " "))
    } else {
        Cow::Borrowed(raw)
    };

    urlencoding::decode(&spaced)
        .map(Cow::into_owned)
        .map_err(|_| RequestError::Encoding {
            part: raw.to_string(),
        })
}

fn accept_from(headers: &HeaderMap) -> AcceptList {
    let joined = headers
        .get_all(ACCEPT)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .collect::<Vec<_>>()
        .join(",");

    // no header at all means */*
    AcceptList::parse(&joined)
}
