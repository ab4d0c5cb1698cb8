//! Pattern Matcher - narrows page content using previously learned patterns

use std::cmp::Ordering;
use tracing::debug;

use super::error::PatternError;
use super::pattern::ContentPattern;
use super::store::PatternStore;

/// Patterns at or below this confidence are never offered
pub const DEFAULT_MIN_CONFIDENCE: f64 = 0.5;

/// A narrowed window of page content chosen by a learned pattern
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SliceMatch {
    pub pattern_id: String,
    pub pattern_type: String,
    /// Byte offset into the content, always on a char boundary
    pub start: usize,
    /// Byte offset into the content, always on a char boundary
    pub end: usize,
}

impl SliceMatch {
    /// The selected part of `content`.
    ///
    /// `None` when the offsets do not fit `content`, which means the match was
    /// computed against a different page.
    pub fn apply<'c>(&self, content: &'c str) -> Option<&'c str> {
        content.get(self.start..self.end)
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// Read-only view over a store that picks slices for new pages
pub struct PatternMatcher<'s> {
    store: &'s PatternStore,
    min_confidence: f64,
}

impl<'s> PatternMatcher<'s> {
    pub fn new(store: &'s PatternStore) -> Self {
        Self {
            store,
            min_confidence: DEFAULT_MIN_CONFIDENCE,
        }
    }

    pub fn with_min_confidence(mut self, min_confidence: f64) -> Self {
        self.min_confidence = min_confidence;
        self
    }

    /// Eligible patterns for a domain and manufacturer, best first
    pub fn candidates(&self, domain: &str, manufacturer: &str) -> Vec<(&'s String, &'s ContentPattern)> {
        let mut candidates: Vec<(&String, &ContentPattern)> = self
            .store
            .iter()
            .filter(|(_, p)| {
                p.domain == domain
                    && p.manufacturer.eq_ignore_ascii_case(manufacturer)
                    && p.is_eligible(self.min_confidence)
            })
            .collect();

        candidates.sort_by(|(a_id, a), (b_id, b)| {
            b.success_count
                .cmp(&a.success_count)
                .then_with(|| {
                    b.confidence_score
                        .partial_cmp(&a.confidence_score)
                        .unwrap_or(Ordering::Equal)
                })
                .then_with(|| a_id.cmp(b_id))
        });
        candidates
    }

    /// Pick a window of `content` using the best known pattern.
    ///
    /// Returns `None` when there is no eligible pattern, the URL has no host,
    /// or the pattern's start marker no longer appears in the page. None of
    /// these touch the stored pattern.
    pub fn find_matching_pattern(&self, url: &str, content: &str, manufacturer: &str) -> Option<SliceMatch> {
        let domain = match domain_of(url) {
            Ok(domain) => domain,
            Err(e) => {
                debug!("No pattern lookup: {}", e);
                return None;
            }
        };

        let candidates = self.candidates(&domain, manufacturer);
        let (id, pattern) = candidates.first()?;

        if pattern.start_marker.is_empty() {
            debug!("Pattern {} has no start marker", id);
            return None;
        }

        let Some(marker_pos) = find_ignore_ascii_case(content, &pattern.start_marker) else {
            debug!(
                "Marker '{}' for pattern {} not found on {}",
                pattern.start_marker, id, domain
            );
            return None;
        };

        let (start, end) = pattern.content_slice.resolve(marker_pos, content.len());
        let start = floor_char_boundary(content, start);
        let end = floor_char_boundary(content, end).max(start);

        debug!(
            "Pattern {} ({}) selected bytes {}..{} of {} on {}",
            id,
            pattern.pattern_type,
            start,
            end,
            content.len(),
            domain
        );

        Some(SliceMatch {
            pattern_id: (*id).clone(),
            pattern_type: pattern.pattern_type.clone(),
            start,
            end,
        })
    }
}

/// Lower-cased host of a URL
pub fn domain_of(url: &str) -> Result<String, PatternError> {
    let parsed = url::Url::parse(url).map_err(|_| PatternError::InvalidUrl(url.to_string()))?;
    parsed
        .host_str()
        .map(|host| host.to_lowercase())
        .ok_or_else(|| PatternError::InvalidUrl(url.to_string()))
}

/// Byte offset of `needle` in `haystack`, ignoring ASCII case
pub fn find_ignore_ascii_case(haystack: &str, needle: &str) -> Option<usize> {
    let hay = haystack.as_bytes();
    let pat = needle.as_bytes();
    if pat.is_empty() {
        return Some(0);
    }
    if pat.len() > hay.len() {
        return None;
    }
    hay.windows(pat.len()).position(|w| w.eq_ignore_ascii_case(pat))
}

/// Largest char boundary at or below `index`
fn floor_char_boundary(s: &str, index: usize) -> usize {
    let mut index = index.min(s.len());
    while !s.is_char_boundary(index) {
        index -= 1;
    }
    index
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::learning::pattern::{ContentSlice, ExtractionMethod};
    use chrono::Utc;

    fn store_with(patterns: Vec<(&str, ContentPattern)>) -> PatternStore {
        let mut store = PatternStore::new("unused.json");
        for (id, p) in patterns {
            store.upsert(id, p);
        }
        store
    }

    fn pattern(confidence: f64, success_count: u32, marker: &str) -> ContentPattern {
        ContentPattern {
            domain: "eastonarchery.com".to_string(),
            manufacturer: "Easton".to_string(),
            pattern_type: "generic_table".to_string(),
            start_marker: marker.to_string(),
            end_marker: String::new(),
            content_slice: ContentSlice(-1000, 8000),
            extraction_method: ExtractionMethod::Text,
            success_count,
            last_used: Utc::now(),
            confidence_score: confidence,
            sample_content: String::new(),
        }
    }

    const URL: &str = "https://eastonarchery.com/arrows/fmj";

    #[test]
    fn test_confidence_threshold_is_exclusive() {
        let store = store_with(vec![("p", pattern(0.5, 9, "spine"))]);
        let matcher = PatternMatcher::new(&store);
        assert!(matcher.find_matching_pattern(URL, "spine 340", "Easton").is_none());

        let store = store_with(vec![("p", pattern(0.51, 9, "spine"))]);
        let matcher = PatternMatcher::new(&store);
        assert!(matcher.find_matching_pattern(URL, "spine 340", "Easton").is_some());
    }

    #[test]
    fn test_manufacturer_case_insensitive() {
        let store = store_with(vec![("p", pattern(1.0, 1, "spine"))]);
        let matcher = PatternMatcher::new(&store);
        assert!(matcher.find_matching_pattern(URL, "Spine 340", "EASTON").is_some());
        assert!(matcher.find_matching_pattern(URL, "Spine 340", "Gold Tip").is_none());
    }

    #[test]
    fn test_prefers_success_count_then_confidence() {
        let store = store_with(vec![
            ("low", pattern(1.0, 2, "spine")),
            ("high", pattern(0.6, 7, "gpi")),
            ("tied", pattern(0.9, 7, "weight")),
        ]);
        let matcher = PatternMatcher::new(&store);
        let ids: Vec<String> = matcher
            .candidates("eastonarchery.com", "easton")
            .into_iter()
            .map(|(id, _)| id.clone())
            .collect();
        assert_eq!(ids, vec!["tied", "high", "low"]);
    }

    #[test]
    fn test_missing_marker_returns_none_without_penalty() {
        let store = store_with(vec![("p", pattern(0.8, 3, "spine chart"))]);
        let matcher = PatternMatcher::new(&store);
        assert!(matcher.find_matching_pattern(URL, "redesigned page", "Easton").is_none());
        assert_eq!(store.get("p").unwrap().confidence_score, 0.8);
        assert_eq!(store.get("p").unwrap().success_count, 3);
    }

    #[test]
    fn test_cold_start() {
        let empty = PatternStore::new("unused.json");
        assert!(PatternMatcher::new(&empty)
            .find_matching_pattern(URL, "spine", "Easton")
            .is_none());

        let mut other = pattern(1.0, 5, "spine");
        other.domain = "goldtip.com".to_string();
        let store = store_with(vec![("o", other)]);
        assert!(PatternMatcher::new(&store)
            .find_matching_pattern(URL, "spine", "Easton")
            .is_none());
    }

    #[test]
    fn test_invalid_url_is_no_match() {
        let store = store_with(vec![("p", pattern(1.0, 1, "spine"))]);
        let matcher = PatternMatcher::new(&store);
        assert!(matcher.find_matching_pattern("not a url", "spine", "Easton").is_none());
    }

    #[test]
    fn test_slice_clamped_to_short_content() {
        let store = store_with(vec![("p", pattern(1.0, 1, "spine"))]);
        let matcher = PatternMatcher::new(&store);
        let content = "short page: spine 340";
        let m = matcher.find_matching_pattern(URL, content, "Easton").unwrap();
        assert_eq!((m.start, m.end), (0, content.len()));
        assert_eq!(m.apply(content), Some(content));
    }

    #[test]
    fn test_tail_anchored_slice() {
        let mut p = pattern(1.0, 1, "spine");
        p.content_slice = ContentSlice(-10, 0);
        let store = store_with(vec![("p", p)]);
        let content = format!("spine {}0123456789", "x".repeat(50));
        let m = PatternMatcher::new(&store)
            .find_matching_pattern(URL, &content, "Easton")
            .unwrap();
        assert_eq!(m.apply(&content), Some("0123456789"));
    }

    #[test]
    fn test_slice_snaps_to_char_boundary() {
        let mut p = pattern(1.0, 1, "spine");
        p.content_slice = ContentSlice(0, 7);
        let store = store_with(vec![("p", p)]);
        // 'é' is two bytes starting at offset 6
        let content = "spine é gpi";
        let m = PatternMatcher::new(&store)
            .find_matching_pattern(URL, content, "Easton")
            .unwrap();
        assert_eq!(m.end, 6);
        assert_eq!(m.apply(content), Some("spine "));
    }

    #[test]
    fn test_apply_to_other_page_is_none() {
        let m = SliceMatch {
            pattern_id: "p".to_string(),
            pattern_type: "generic_table".to_string(),
            start: 100,
            end: 9100,
        };
        assert_eq!(m.apply("a much shorter page"), None);
        // Offsets landing inside a multi-byte char do not fit either
        let m = SliceMatch { start: 0, end: 1, ..m };
        assert_eq!(m.apply("é"), None);
    }

    #[test]
    fn test_find_ignore_ascii_case() {
        assert_eq!(find_ignore_ascii_case("Arrow SPINE chart", "spine"), Some(6));
        assert_eq!(find_ignore_ascii_case("abc", "abcd"), None);
        assert_eq!(find_ignore_ascii_case("ümlaut Spine", "spine"), Some(8));
    }

    #[test]
    fn test_domain_of() {
        assert_eq!(domain_of("https://WWW.GoldTip.com/shafts").unwrap(), "www.goldtip.com");
        assert!(domain_of("mailto:someone").is_err());
    }
}
