//! Content pattern records and their on-disk shape
//!
//! Every field carries a serde default so that files written by older
//! scrapers (or edited by hand) still load. Missing keys fall back to the
//! values documented on each field.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Upper bound for `confidence_score`
pub const MAX_CONFIDENCE: f64 = 1.0;

/// Extraction tier that produced the success a pattern was learned from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtractionMethod {
    #[default]
    Text,
    Vision,
    Knowledge,
    /// Any tag this build does not know about
    #[serde(other)]
    Unknown,
}

impl std::fmt::Display for ExtractionMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExtractionMethod::Text => write!(f, "text"),
            ExtractionMethod::Vision => write!(f, "vision"),
            ExtractionMethod::Knowledge => write!(f, "knowledge"),
            ExtractionMethod::Unknown => write!(f, "unknown"),
        }
    }
}

impl std::str::FromStr for ExtractionMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(ExtractionMethod::Text),
            "vision" | "ocr" => Ok(ExtractionMethod::Vision),
            "knowledge" | "llm" => Ok(ExtractionMethod::Knowledge),
            other => Err(format!("unknown extraction method '{}'", other)),
        }
    }
}

/// What a [`ContentSlice`] is measured from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SliceAnchor {
    /// Offsets are relative to where the start marker was found
    Marker,
    /// Offsets are relative to the end of the content
    ContentEnd,
}

/// Relative `(start, end)` window, stored as a two-element JSON array.
///
/// A negative start with a positive end straddles the marker. A negative
/// start with a non-positive end counts back from the end of the content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentSlice(pub i64, pub i64);

impl Default for ContentSlice {
    fn default() -> Self {
        ContentSlice(-1000, 8000)
    }
}

impl ContentSlice {
    pub fn start(&self) -> i64 {
        self.0
    }

    pub fn end(&self) -> i64 {
        self.1
    }

    pub fn anchor(&self) -> SliceAnchor {
        if self.0 < 0 && self.1 <= 0 {
            SliceAnchor::ContentEnd
        } else {
            SliceAnchor::Marker
        }
    }

    /// Resolve to absolute byte offsets, clamped so that
    /// `0 <= start <= end <= content_len`.
    pub fn resolve(&self, marker_pos: usize, content_len: usize) -> (usize, usize) {
        let len = content_len as i64;
        let base = match self.anchor() {
            SliceAnchor::Marker => marker_pos as i64,
            SliceAnchor::ContentEnd => len,
        };
        let start = base.saturating_add(self.0).clamp(0, len);
        let end = base.saturating_add(self.1).clamp(0, len).max(start);
        (start as usize, end as usize)
    }
}

/// A cached heuristic describing where spec data sat on a manufacturer's pages
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentPattern {
    /// Host the pattern applies to
    #[serde(default)]
    pub domain: String,
    /// Product-line owner the pattern was learned for
    #[serde(default)]
    pub manufacturer: String,
    /// Structural heuristic name, e.g. `generic_table`
    #[serde(default)]
    pub pattern_type: String,
    #[serde(default)]
    pub start_marker: String,
    #[serde(default)]
    pub end_marker: String,
    /// Defaults to `[-1000, 8000]`
    #[serde(default)]
    pub content_slice: ContentSlice,
    /// Defaults to `text`
    #[serde(default)]
    pub extraction_method: ExtractionMethod,
    /// Defaults to 1
    #[serde(default = "default_success_count")]
    pub success_count: u32,
    /// Defaults to the time the file was loaded
    #[serde(default = "Utc::now", deserialize_with = "deserialize_timestamp")]
    pub last_used: DateTime<Utc>,
    /// Defaults to 1.0; out-of-range values are clamped on load
    #[serde(default = "default_confidence", deserialize_with = "deserialize_confidence")]
    pub confidence_score: f64,
    /// Debug snippet only, never used for matching
    #[serde(default)]
    pub sample_content: String,
}

fn default_success_count() -> u32 {
    1
}

fn default_confidence() -> f64 {
    MAX_CONFIDENCE
}

impl ContentPattern {
    /// Whether the matcher may offer this pattern
    pub fn is_eligible(&self, min_confidence: f64) -> bool {
        self.confidence_score > min_confidence
    }

    /// Record one more successful reuse
    pub fn reinforce(&mut self, step: f64, now: DateTime<Utc>) {
        self.success_count = self.success_count.saturating_add(1);
        self.confidence_score = clamp_confidence(self.confidence_score + step);
        self.last_used = now;
    }

    pub fn is_stale(&self, max_age: chrono::Duration, now: DateTime<Utc>) -> bool {
        now.signed_duration_since(self.last_used) > max_age
    }
}

fn clamp_confidence(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, MAX_CONFIDENCE)
    }
}

fn deserialize_confidence<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = f64::deserialize(deserializer)?;
    Ok(clamp_confidence(raw))
}

fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_timestamp(&raw)
        .ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp '{}'", raw)))
}

/// Parse RFC 3339, or a naive ISO-8601 timestamp taken as UTC
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}
