//! Adaptive extractor - slice, extract through the tier chain, learn

use serde_json::Value;
use tracing::{debug, info, warn};

use super::{ExtractionTier, FetchedPage};
use crate::learning::{ContentPatternLearner, ExtractionMethod, LearnOutcome, SkipReason, SliceMatch};

/// What happened to one page
#[derive(Debug, Clone)]
pub struct ExtractionReport {
    /// Records from the first tier that produced any
    pub records: Vec<Value>,
    /// Tier that produced `records`
    pub method: Option<ExtractionMethod>,
    /// Window suggested by a learned pattern, if any
    pub slice: Option<SliceMatch>,
    /// Whether `records` came from the slice rather than the full text
    pub used_slice: bool,
    pub learned: LearnOutcome,
}

impl ExtractionReport {
    pub fn is_success(&self) -> bool {
        !self.records.is_empty()
    }
}

/// Runs the tier chain over pattern-narrowed content
pub struct AdaptiveExtractor {
    learner: ContentPatternLearner,
    tiers: Vec<Box<dyn ExtractionTier>>,
}

impl AdaptiveExtractor {
    pub fn new(learner: ContentPatternLearner) -> Self {
        Self {
            learner,
            tiers: Vec::new(),
        }
    }

    /// Append a tier; tiers run in registration order
    pub fn register(&mut self, tier: Box<dyn ExtractionTier>) {
        self.tiers.push(tier);
    }

    pub fn with_tier(mut self, tier: Box<dyn ExtractionTier>) -> Self {
        self.register(tier);
        self
    }

    pub fn learner(&self) -> &ContentPatternLearner {
        &self.learner
    }

    pub fn learner_mut(&mut self) -> &mut ContentPatternLearner {
        &mut self.learner
    }

    pub fn into_learner(self) -> ContentPatternLearner {
        self.learner
    }

    /// Extract specs from one page.
    ///
    /// Each tier sees the learned slice first (when there is one) and then
    /// the full text. The first non-empty result wins and is learned from.
    /// Tier errors are logged and treated as "nothing found".
    pub async fn extract(&mut self, page: &FetchedPage, manufacturer: &str) -> ExtractionReport {
        let slice = self
            .learner
            .find_matching_pattern(&page.url, &page.text, manufacturer)
            .filter(|s| !s.is_empty());

        if let Some(s) = &slice {
            debug!(
                "Using {} pattern for {}: {} of {} bytes",
                s.pattern_type,
                page.url,
                s.len(),
                page.text.len()
            );
        }

        let mut attempts: Vec<(&str, bool)> = Vec::with_capacity(2);
        if let Some(window) = slice.as_ref().and_then(|s| s.apply(&page.text)) {
            attempts.push((window, true));
        }
        attempts.push((page.text.as_str(), false));

        let mut found: Option<(ExtractionMethod, Vec<Value>, bool)> = None;
        'tiers: for tier in &self.tiers {
            for (content, sliced) in &attempts {
                match tier.extract(page, content, manufacturer).await {
                    Ok(records) if !records.is_empty() => {
                        found = Some((tier.method(), records, *sliced));
                        break 'tiers;
                    }
                    Ok(_) => debug!(
                        "{} tier found nothing on {} ({})",
                        tier.method(),
                        page.url,
                        if *sliced { "slice" } else { "full text" }
                    ),
                    Err(e) => warn!("{} tier failed on {}: {}", tier.method(), page.url, e),
                }
            }
        }

        let Some((method, records, used_slice)) = found else {
            info!("No tier extracted data from {}", page.url);
            return ExtractionReport {
                records: Vec::new(),
                method: None,
                slice,
                used_slice: false,
                learned: LearnOutcome::Skipped(SkipReason::NoData),
            };
        };

        let learned = self
            .learner
            .learn_successful_pattern(&page.url, &page.text, manufacturer, &records, method);

        info!(
            "Extracted {} records from {} via {} tier{}",
            records.len(),
            page.url,
            method,
            if used_slice { " (pattern slice)" } else { "" }
        );

        ExtractionReport {
            records,
            method: Some(method),
            slice,
            used_slice,
            learned,
        }
    }
}
