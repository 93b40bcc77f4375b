/// Client-side content preferences parsed from the `Accept` header
///
/// A header like `text/html, application/*;q=0.5, */*;q=0.1` becomes an
/// [`AcceptList`] of [`MediaRange`]s. Lookups follow RFC 7231 section 5.3.2:
/// the most specific range matching an offered type decides its quality.
use crate::media_type::{is_token, MediaType, MediaTypeError};

/// A single preference range: `type/subtype`, `type/*` or `*/*` plus a q-value
#[derive(Debug, Clone, PartialEq)]
pub struct MediaRange {
    type_: Option<String>,
    subtype: Option<String>,
    q: f32,
    params: Vec<(String, String)>,
}

impl MediaRange {
    /// Parses one comma-separated section of an `Accept` header
    ///
    /// # Examples
    ///
    /// ```
    /// use kettle_accept::MediaRange;
    ///
    /// let range = MediaRange::parse("text/*; q=0.4").unwrap();
    /// assert_eq!(range.quality(), 0.4);
    /// assert_eq!(range.wildcards(), 1);
    /// ```
    pub fn parse(section: &str) -> Result<Self, MediaTypeError> {
        let mut parts = section.split(';');
        let essence = parts.next().unwrap_or_default().trim();
        let malformed = || MediaTypeError::Malformed(section.trim().to_string());

        let (type_, subtype) = essence.split_once('/').ok_or_else(malformed)?;
        let (type_, subtype) = (type_.trim(), subtype.trim());
        if !is_token(type_) || !is_token(subtype) {
            return Err(malformed());
        }

        let type_ = wildcard_or_lower(type_);
        let subtype = wildcard_or_lower(subtype);
        // `*/json` is not a valid range
        if type_.is_none() && subtype.is_some() {
            return Err(malformed());
        }

        let mut q = 1.0;
        let mut params = Vec::new();
        for param in parts {
            let Some((key, value)) = param.split_once('=') else {
                continue;
            };
            let key = key.trim().to_ascii_lowercase();
            let value = value.trim();
            if key.is_empty() || value.is_empty() {
                continue;
            }
            if key == "q" {
                q = parse_quality(value)?;
            } else {
                params.push((key, value.to_string()));
            }
        }

        Ok(Self {
            type_,
            subtype,
            q,
            params,
        })
    }

    /// Range matching exactly one media type with the given quality
    pub fn exact(media: &MediaType, q: f32) -> Self {
        Self {
            type_: Some(media.type_().to_string()),
            subtype: Some(media.subtype().to_string()),
            q,
            params: Vec::new(),
        }
    }

    /// The `*/*` range
    pub fn any() -> Self {
        Self {
            type_: None,
            subtype: None,
            q: 1.0,
            params: Vec::new(),
        }
    }

    pub fn quality(&self) -> f32 {
        self.q
    }

    /// Number of `*` components (0, 1 or 2)
    pub fn wildcards(&self) -> usize {
        usize::from(self.type_.is_none()) + usize::from(self.subtype.is_none())
    }

    /// Returns the specificity of the match, or `None` if `media` is outside
    /// this range. Higher values are more specific.
    pub fn specificity(&self, media: &MediaType) -> Option<usize> {
        match (&self.type_, &self.subtype) {
            (None, _) => Some(0),
            (Some(t), None) if t == media.type_() => Some(1),
            (Some(t), Some(s)) if t == media.type_() && s == media.subtype() => {
                Some(2 + self.params.len())
            }
            _ => None,
        }
    }
}

fn wildcard_or_lower(part: &str) -> Option<String> {
    (part != "*").then(|| part.to_ascii_lowercase())
}

fn parse_quality(value: &str) -> Result<f32, MediaTypeError> {
    value
        .parse::<f32>()
        .ok()
        .filter(|q| q.is_finite() && (0.0..=1.0).contains(q))
        .ok_or_else(|| MediaTypeError::InvalidQuality(value.to_string()))
}

/// Ordered list of client preferences
///
/// An absent or empty header means "anything is acceptable" (`*/*`).
#[derive(Debug, Clone, PartialEq)]
pub struct AcceptList {
    ranges: Vec<MediaRange>,
}

impl AcceptList {
    /// Accepts every media type
    pub fn any() -> Self {
        Self {
            ranges: vec![MediaRange::any()],
        }
    }

    /// Builds a list from already parsed ranges
    ///
    /// An empty iterator yields [`AcceptList::any`].
    pub fn from_ranges<I>(ranges: I) -> Self
    where
        I: IntoIterator<Item = MediaRange>,
    {
        let ranges: Vec<MediaRange> = ranges.into_iter().collect();
        if ranges.is_empty() {
            Self::any()
        } else {
            Self { ranges }
        }
    }

    /// Parses an `Accept` header value
    ///
    /// Malformed sections are dropped with a warning; the rest of the header
    /// still counts.
    ///
    /// # Examples
    ///
    /// ```
    /// use kettle_accept::{AcceptList, MediaType};
    ///
    /// let accept = AcceptList::parse("application/json, bogus, text/*;q=0.2");
    /// assert_eq!(accept.ranges().len(), 2);
    /// assert_eq!(accept.quality(&MediaType::plain()), 0.2);
    /// ```
    pub fn parse(header: &str) -> Self {
        let ranges = header
            .split(',')
            .map(str::trim)
            .filter(|section| !section.is_empty())
            .filter_map(|section| match MediaRange::parse(section) {
                Ok(range) => Some(range),
                Err(err) => {
                    tracing::warn!("dropped malformed Accept entry {:?}: {}", section, err);
                    None
                }
            });

        Self::from_ranges(ranges)
    }

    pub fn ranges(&self) -> &[MediaRange] {
        &self.ranges
    }

    /// Quality the client assigns to `media` (0.0 when no range matches)
    pub fn quality(&self, media: &MediaType) -> f32 {
        self.ranges
            .iter()
            .filter_map(|range| range.specificity(media).map(|spec| (spec, range.q)))
            .fold(None, |best: Option<(usize, f32)>, (spec, q)| match best {
                Some((best_spec, _)) if best_spec >= spec => best,
                _ => Some((spec, q)),
            })
            .map(|(_, q)| q)
            .unwrap_or(0.0)
    }

    pub fn accepts(&self, media: &MediaType) -> bool {
        self.quality(media) > 0.0
    }

    /// Offers the client accepts at all, in offer order
    pub fn acceptable(&self, offers: &[MediaType]) -> Vec<MediaType> {
        offers
            .iter()
            .filter(|offer| self.accepts(offer))
            .cloned()
            .collect()
    }

    /// Picks the offer with the highest client quality
    ///
    /// Ties go to the earlier offer, so server order expresses server
    /// preference. Returns `None` when no offer is acceptable.
    pub fn negotiate(&self, offers: &[MediaType]) -> Option<MediaType> {
        offers
            .iter()
            .map(|offer| (self.quality(offer), offer))
            .filter(|(q, _)| *q > 0.0)
            .fold(None, |best: Option<(f32, &MediaType)>, (q, offer)| match best {
                Some((best_q, _)) if best_q >= q => best,
                _ => Some((q, offer)),
            })
            .map(|(_, offer)| offer.clone())
    }
}

impl Default for AcceptList {
    fn default() -> Self {
        Self::any()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[test]
    fn test_empty_header_accepts_everything() {
        let accept = AcceptList::parse("");
        assert_eq!(accept, AcceptList::any());
        assert!(accept.accepts(&MediaType::json()));
    }

    #[test]
    fn test_all_malformed_falls_back_to_any() {
        let accept = AcceptList::parse("nonsense, */json");
        assert_eq!(accept, AcceptList::any());
    }

    #[test]
    fn test_parse_keeps_params_and_quality() {
        let range = MediaRange::parse("text/html;level=1;q=0.7").unwrap();
        assert_eq!(range.quality(), 0.7);
        assert_eq!(range.specificity(&MediaType::html()), Some(3));
    }

    #[test]
    fn test_invalid_quality_is_rejected() {
        assert!(matches!(
            MediaRange::parse("text/html;q=2"),
            Err(MediaTypeError::InvalidQuality(_))
        ));
        assert!(matches!(
            MediaRange::parse("text/html;q=abc"),
            Err(MediaTypeError::InvalidQuality(_))
        ));
    }

    #[rstest]
    #[case("text/html", "text/html", 1.0)]
    #[case("text/*;q=0.5", "text/plain", 0.5)]
    #[case("text/*;q=0.5, text/plain;q=0.9", "text/plain", 0.9)]
    #[case("text/plain;q=0.9, */*;q=0.1", "application/json", 0.1)]
    #[case("text/plain", "application/json", 0.0)]
    #[case("*/*;q=0.3, application/json;q=0", "application/json", 0.0)]
    fn test_quality(#[case] header: &str, #[case] media: &str, #[case] expected: f32) {
        let accept = AcceptList::parse(header);
        let media: MediaType = media.parse().unwrap();
        assert_eq!(accept.quality(&media), expected);
    }

    #[test]
    fn test_acceptable_preserves_offer_order() {
        let accept = AcceptList::parse("application/*");
        let offers = [MediaType::xml(), MediaType::html(), MediaType::json()];
        assert_eq!(
            accept.acceptable(&offers),
            vec![MediaType::xml(), MediaType::json()]
        );
    }

    #[test]
    fn test_negotiate_prefers_quality_then_offer_order() {
        let accept = AcceptList::parse("application/xml;q=0.5, application/json");
        let offers = [MediaType::xml(), MediaType::json()];
        assert_eq!(accept.negotiate(&offers), Some(MediaType::json()));

        let accept = AcceptList::parse("application/*");
        assert_eq!(accept.negotiate(&offers), Some(MediaType::xml()));
    }

    #[test]
    fn test_negotiate_nothing_acceptable() {
        let accept = AcceptList::parse("text/plain");
        let offers = [MediaType::json(), MediaType::xml()];
        assert_eq!(accept.negotiate(&offers), None);
        assert!(accept.acceptable(&offers).is_empty());
    }
}
