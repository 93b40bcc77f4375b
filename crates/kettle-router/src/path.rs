/// Path utilities for validation, normalization and segment handling
///
/// All functions are pure: same input, same output, no side effects.
use std::borrow::Cow;

use crate::error::RequestError;

/// Validates if a path is in canonical form
///
/// # Rules
///
/// - Must start with `/`
/// - Must not contain `//`
/// - Must not end with `/` (except root `/`)
///
/// # Examples
///
/// ```
/// use kettle_router::path::is_canonical;
///
/// assert!(is_canonical("/"));
/// assert!(is_canonical("/users/42"));
///
/// assert!(!is_canonical(""));
/// assert!(!is_canonical("users"));
/// assert!(!is_canonical("/users/"));
/// assert!(!is_canonical("/users//42"));
/// ```
pub fn is_canonical(path: &str) -> bool {
    if !path.starts_with('/') || path.contains("//") {
        return false;
    }

    path == "/" || !path.ends_with('/')
}

/// Normalizes a path to canonical form
///
/// Returns `Cow::Borrowed` when the input is already canonical. Empty
/// segments are dropped: `/a//b/` becomes `/a/b`.
///
/// # Examples
///
/// ```
/// use kettle_router::path::normalize_path;
/// use std::borrow::Cow;
///
/// assert!(matches!(normalize_path("/about"), Cow::Borrowed("/about")));
/// assert_eq!(normalize_path("about/"), "/about");
/// assert_eq!(normalize_path("/path//to///page"), "/path/to/page");
/// assert_eq!(normalize_path(""), "/");
/// ```
pub fn normalize_path(path: &str) -> Cow<'_, str> {
    if is_canonical(path) {
        return Cow::Borrowed(path);
    }

    let normalized = raw_segments(path).collect::<Vec<_>>().join("/");

    if normalized.is_empty() {
        Cow::Borrowed("/")
    } else {
        Cow::Owned(format!("/{}", normalized))
    }
}

/// Non-empty raw (still percent-encoded) segments of a path
pub fn raw_segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty())
}

/// Splits a path into percent-decoded segments
///
/// Decoding happens after splitting, so an encoded `%2F` stays inside its
/// segment.
///
/// # Examples
///
/// ```
/// use kettle_router::path::decode_segments;
///
/// let segments = decode_segments("/files/a%2Fb/hello%20world").unwrap();
/// assert_eq!(segments, vec!["files", "a/b", "hello world"]);
/// ```
pub fn decode_segments(path: &str) -> Result<Vec<String>, RequestError> {
    raw_segments(path)
        .map(|segment| {
            urlencoding::decode(segment)
                .map(Cow::into_owned)
                .map_err(|_| RequestError::Encoding {
                    part: segment.to_string(),
                })
        })
        .collect()
}

/// Percent-encodes one segment so it survives [`decode_segments`]
pub fn encode_segment(segment: &str) -> Cow<'_, str> {
    urlencoding::encode(segment)
}

/// Joins decoded segments into an encoded canonical path
///
/// # Examples
///
/// ```
/// use kettle_router::path::join_segments;
///
/// assert_eq!(join_segments(&["files", "a/b"]), "/files/a%2Fb");
/// assert_eq!(join_segments::<&str>(&[]), "/");
/// ```
pub fn join_segments<S: AsRef<str>>(segments: &[S]) -> String {
    if segments.is_empty() {
        return "/".to_string();
    }

    segments
        .iter()
        .map(|segment| encode_segment(segment.as_ref()))
        .fold(String::new(), |mut path, segment| {
            path.push('/');
            path.push_str(&segment);
            path
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_canonical() {
        assert!(is_canonical("/"));
        assert!(is_canonical("/about"));
        assert!(is_canonical("/blog/posts/hello-world"));

        assert!(!is_canonical(""));
        assert!(!is_canonical("about"));
        assert!(!is_canonical("/about/"));
        assert!(!is_canonical("/about//page"));
    }

    #[test]
    fn test_normalize_path() {
        assert_eq!(normalize_path("/"), "/");
        assert_eq!(normalize_path("//"), "/");
        assert_eq!(normalize_path("/users/"), "/users");
        assert_eq!(normalize_path("users/42"), "/users/42");
    }

    #[test]
    fn test_decode_segments_keeps_encoded_slash_in_segment() {
        let segments = decode_segments("/a%2Fb/c").unwrap();
        assert_eq!(segments, vec!["a/b".to_string(), "c".to_string()]);
    }

    #[test]
    fn test_decode_segments_rejects_invalid_utf8() {
        assert!(matches!(
            decode_segments("/bad/%FF"),
            Err(RequestError::Encoding { .. })
        ));
    }

    #[test]
    fn test_join_then_decode() {
        let segments = vec!["hello world", "50%", "ä"];
        let joined = join_segments(&segments);
        assert_eq!(decode_segments(&joined).unwrap(), segments);
    }

    #[test]
    fn test_root_has_no_segments() {
        assert!(decode_segments("/").unwrap().is_empty());
    }
}
