//! Extraction tiers and the adaptive extractor that drives them
//!
//! Tiers (text parsing, vision/OCR, LLM knowledge) live outside this crate and
//! plug in through [`ExtractionTier`]. The [`AdaptiveExtractor`] offers each
//! tier a pattern-narrowed slice first, then falls back to the full page, and
//! feeds every success back into the pattern learner.

pub mod adaptive;

use anyhow::Result;
use serde_json::Value;

use crate::learning::ExtractionMethod;

pub use adaptive::{AdaptiveExtractor, ExtractionReport};

/// A page as handed over by the web fetcher
#[derive(Debug, Clone, Default)]
pub struct FetchedPage {
    pub url: String,
    pub html: String,
    /// Markdown or plain text rendering of `html`; all offsets refer to this
    pub text: String,
}

impl FetchedPage {
    pub fn new(url: impl Into<String>, html: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            html: html.into(),
            text: text.into(),
        }
    }
}

/// One strategy for pulling arrow specs out of a page
#[async_trait::async_trait]
pub trait ExtractionTier: Send + Sync {
    /// Which tier this is, recorded on learned patterns
    fn method(&self) -> ExtractionMethod;

    /// Extract spec records from `content`, which is either the full page
    /// text or a slice of it. An empty vec means nothing was found.
    async fn extract(&self, page: &FetchedPage, content: &str, manufacturer: &str) -> Result<Vec<Value>>;
}
