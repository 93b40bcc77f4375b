/// Path template parsing
///
/// Templates are closed: each segment is literal text, a `{name}`
/// placeholder or a trailing `{name*}` wildcard. Partial-segment
/// placeholders (`user-{id}`) are rejected since they have no unique inverse.
use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::ConstructionError;
use crate::path::raw_segments;

// Identifier rule for parameter names
static IDENT_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap());

/// Validates a parameter name
pub fn is_identifier(name: &str) -> bool {
    IDENT_REGEX.is_match(name)
}

/// One segment of a parsed template
#[derive(Debug, Clone, PartialEq)]
pub enum TemplateSegment {
    /// Static text, percent-decoded
    Literal(String),
    /// `{name}`: exactly one segment
    Placeholder(String),
    /// `{name*}`: every remaining segment
    Wildcard(String),
}

/// Classifies a single raw segment
///
/// # Examples
///
/// ```
/// use kettle_router::annotation::{classify_segment, TemplateSegment};
///
/// assert_eq!(classify_segment("users"), Ok(TemplateSegment::Literal("users".into())));
/// assert_eq!(classify_segment("{id}"), Ok(TemplateSegment::Placeholder("id".into())));
/// assert_eq!(classify_segment("{path*}"), Ok(TemplateSegment::Wildcard("path".into())));
/// assert!(classify_segment("user-{id}").is_err());
/// ```
pub fn classify_segment(segment: &str) -> Result<TemplateSegment, String> {
    match segment.strip_prefix('{').and_then(|s| s.strip_suffix('}')) {
        Some(inner) => {
            let (name, wildcard) = match inner.strip_suffix('*') {
                Some(name) => (name, true),
                None => (inner, false),
            };

            if name.is_empty() {
                return Err("empty placeholder".to_string());
            }
            if !is_identifier(name) {
                return Err(format!("invalid placeholder name {:?}", name));
            }

            Ok(if wildcard {
                TemplateSegment::Wildcard(name.to_string())
            } else {
                TemplateSegment::Placeholder(name.to_string())
            })
        }
        None if segment.contains(['{', '}']) => {
            Err(format!("unbalanced or partial placeholder in {:?}", segment))
        }
        None => urlencoding::decode(segment)
            .map(|text| TemplateSegment::Literal(text.into_owned()))
            .map_err(|_| format!("invalid percent-encoding in {:?}", segment)),
    }
}

/// Parses a whole template such as `/users/{id}/files/{path*}`
pub fn parse_template(template: &str) -> Result<Vec<TemplateSegment>, ConstructionError> {
    let error = |reason: String| ConstructionError::Template {
        template: template.to_string(),
        reason,
    };

    let segments = raw_segments(template)
        .map(classify_segment)
        .collect::<Result<Vec<_>, _>>()
        .map_err(error)?;

    let wildcard_before_end = segments
        .iter()
        .rev()
        .skip(1)
        .any(|segment| matches!(segment, TemplateSegment::Wildcard(_)));
    if wildcard_before_end {
        return Err(error("a wildcard must be the last segment".to_string()));
    }

    Ok(segments)
}
