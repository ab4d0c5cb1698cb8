//! Pattern Learner - turns successful extractions into reusable patterns
//!
//! `ContentPatternLearner` owns the [`PatternStore`] for the life of the
//! process. Matching borrows it read-only; learning and cleanup mutate it and
//! flush to disk on their own schedule. Nothing here returns an error to the
//! scrape pipeline: learning is an optimisation and a failure just means
//! nothing was learned this round.

use chrono::Utc;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{debug, info, warn};

use super::error::PatternError;
use super::heuristics::{classify, HEURISTICS};
use super::matcher::{domain_of, PatternMatcher, SliceMatch};
use super::pattern::{ContentPattern, ContentSlice, ExtractionMethod, MAX_CONFIDENCE};
use super::store::{PatternStats, PatternStore};

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Tuning for matching, learning and pruning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LearnerConfig {
    /// Pattern file location
    #[serde(default = "default_store_path")]
    pub store_path: PathBuf,
    /// Save after this many newly created patterns
    #[serde(default = "default_flush_every")]
    pub flush_every: u32,
    /// Patterns must be strictly above this to be reused
    #[serde(default = "default_min_confidence")]
    pub min_confidence: f64,
    /// Confidence added on each reuse
    #[serde(default = "default_confidence_step")]
    pub confidence_step: f64,
    #[serde(default = "default_prune_max_age_days")]
    pub prune_max_age_days: i64,
    /// Patterns reused at least this often are never pruned
    #[serde(default = "default_prune_min_success")]
    pub prune_min_success: u32,
    /// Bytes kept before the start indicator
    #[serde(default = "default_margin_before")]
    pub margin_before: i64,
    /// Bytes kept after the end indicator
    #[serde(default = "default_margin_after")]
    pub margin_after: i64,
    /// Window length from the start indicator when no end indicator is found
    #[serde(default = "default_fallback_window")]
    pub fallback_window: i64,
    /// Characters captured in `sample_content`
    #[serde(default = "default_sample_len")]
    pub sample_len: usize,
}

fn default_store_path() -> PathBuf {
    PathBuf::from("data").join("content_patterns.json")
}

fn default_flush_every() -> u32 {
    5
}

fn default_min_confidence() -> f64 {
    super::matcher::DEFAULT_MIN_CONFIDENCE
}

fn default_confidence_step() -> f64 {
    0.1
}

fn default_prune_max_age_days() -> i64 {
    30
}

fn default_prune_min_success() -> u32 {
    3
}

fn default_margin_before() -> i64 {
    1000
}

fn default_margin_after() -> i64 {
    2000
}

fn default_fallback_window() -> i64 {
    8000
}

fn default_sample_len() -> usize {
    200
}

impl Default for LearnerConfig {
    fn default() -> Self {
        Self {
            store_path: default_store_path(),
            flush_every: default_flush_every(),
            min_confidence: default_min_confidence(),
            confidence_step: default_confidence_step(),
            prune_max_age_days: default_prune_max_age_days(),
            prune_min_success: default_prune_min_success(),
            margin_before: default_margin_before(),
            margin_after: default_margin_after(),
            fallback_window: default_fallback_window(),
            sample_len: default_sample_len(),
        }
    }
}

impl LearnerConfig {
    /// Clamp values that would break the learned window or confidence rules.
    ///
    /// Reinforcement must never lower confidence, and a learned window must
    /// stay marker-relative (a non-positive end reads as a tail window).
    pub fn validate(mut self) -> Self {
        if self.confidence_step.is_nan() || self.confidence_step < 0.0 {
            warn!("patterns.confidence_step {} is negative, using 0", self.confidence_step);
            self.confidence_step = 0.0;
        }
        if self.margin_before < 0 {
            warn!("patterns.margin_before {} is negative, using 0", self.margin_before);
            self.margin_before = 0;
        }
        if self.margin_after < 0 {
            warn!("patterns.margin_after {} is negative, using 0", self.margin_after);
            self.margin_after = 0;
        }
        if self.fallback_window <= 0 {
            warn!(
                "patterns.fallback_window {} must be positive, using {}",
                self.fallback_window,
                default_fallback_window()
            );
            self.fallback_window = default_fallback_window();
        }
        if self.prune_max_age_days < 0 {
            warn!(
                "patterns.prune_max_age_days {} is negative, using {}",
                self.prune_max_age_days,
                default_prune_max_age_days()
            );
            self.prune_max_age_days = default_prune_max_age_days();
        }
        self
    }
}

/// Why a learning call recorded nothing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The extraction produced no records
    NoData,
    /// The page URL has no usable host
    InvalidUrl,
    /// No catalog heuristic matched the page text
    NoHeuristic,
}

/// Result of [`ContentPatternLearner::learn_successful_pattern`]
#[derive(Debug, Clone, PartialEq)]
pub enum LearnOutcome {
    Created {
        id: String,
        pattern_type: String,
    },
    Reinforced {
        id: String,
        pattern_type: String,
        confidence: f64,
    },
    Skipped(SkipReason),
}

impl LearnOutcome {
    pub fn pattern_id(&self) -> Option<&str> {
        match self {
            LearnOutcome::Created { id, .. } | LearnOutcome::Reinforced { id, .. } => Some(id),
            LearnOutcome::Skipped(_) => None,
        }
    }
}

/// Owns the pattern store and applies learning on top of it
pub struct ContentPatternLearner {
    store: PatternStore,
    config: LearnerConfig,
    created_since_flush: u32,
}

impl ContentPatternLearner {
    pub fn new(store: PatternStore, config: LearnerConfig) -> Self {
        Self {
            store,
            config: config.validate(),
            created_since_flush: 0,
        }
    }

    /// Load the configured pattern file (or start empty) and wrap it
    pub fn open(config: LearnerConfig) -> Self {
        let store = PatternStore::load(config.store_path.clone());
        Self::new(store, config)
    }

    pub fn store(&self) -> &PatternStore {
        &self.store
    }

    pub fn config(&self) -> &LearnerConfig {
        &self.config
    }

    pub fn matcher(&self) -> PatternMatcher<'_> {
        PatternMatcher::new(&self.store).with_min_confidence(self.config.min_confidence)
    }

    /// See [`PatternMatcher::find_matching_pattern`]
    pub fn find_matching_pattern(&self, url: &str, content: &str, manufacturer: &str) -> Option<SliceMatch> {
        self.matcher().find_matching_pattern(url, content, manufacturer)
    }

    /// Record that extraction succeeded on this page.
    ///
    /// The page text is classified against the heuristic catalog; the first
    /// matching shape becomes (or reinforces) a pattern for this domain and
    /// manufacturer.
    pub fn learn_successful_pattern<T>(
        &mut self,
        url: &str,
        content: &str,
        manufacturer: &str,
        extracted: &[T],
        method: ExtractionMethod,
    ) -> LearnOutcome {
        if extracted.is_empty() {
            return LearnOutcome::Skipped(SkipReason::NoData);
        }

        let domain = match domain_of(url) {
            Ok(domain) => domain,
            Err(e) => {
                debug!("Not learning from page: {}", e);
                return LearnOutcome::Skipped(SkipReason::InvalidUrl);
            }
        };

        // ASCII folding keeps byte offsets identical to `content`
        let text_lower = content.to_ascii_lowercase();
        let Some(found) = classify(&text_lower, HEURISTICS) else {
            debug!("No structural heuristic matched page on {}", domain);
            return LearnOutcome::Skipped(SkipReason::NoHeuristic);
        };

        let pattern_type = found.heuristic.name.to_string();
        let id = PatternStore::generate_id(&domain, manufacturer, &pattern_type);
        let now = Utc::now();

        if let Some(existing) = self.store.get_mut(&id) {
            existing.reinforce(self.config.confidence_step, now);
            debug!(
                "Reinforced pattern {} ({}): uses={}, confidence={:.2}",
                id, pattern_type, existing.success_count, existing.confidence_score
            );
            return LearnOutcome::Reinforced {
                id,
                pattern_type,
                confidence: existing.confidence_score,
            };
        }

        let window_end = match found.end_pos {
            Some(end_pos) => (end_pos - found.start_pos) as i64 + self.config.margin_after,
            None => self.config.fallback_window,
        };

        let pattern = ContentPattern {
            domain: domain.clone(),
            manufacturer: manufacturer.to_string(),
            pattern_type: pattern_type.clone(),
            start_marker: found.heuristic.start.to_string(),
            end_marker: found.heuristic.end.unwrap_or_default().to_string(),
            content_slice: ContentSlice(-self.config.margin_before, window_end),
            extraction_method: method,
            success_count: 1,
            last_used: now,
            confidence_score: MAX_CONFIDENCE,
            sample_content: sample(&content[found.start_pos..], self.config.sample_len),
        };
        self.store.upsert(id.clone(), pattern);
        info!("Learned new {} pattern {} for {} on {}", pattern_type, id, manufacturer, domain);

        self.created_since_flush += 1;
        if self.created_since_flush >= self.config.flush_every.max(1) {
            self.flush();
        }

        LearnOutcome::Created { id, pattern_type }
    }

    /// Prune patterns unused for `max_age_days` with too few reuses.
    ///
    /// Saves when anything was removed. Returns the removed ids. A negative
    /// or out-of-range age prunes nothing.
    pub fn cleanup_old_patterns(&mut self, max_age_days: i64) -> Vec<String> {
        let max_age = match chrono::Duration::try_days(max_age_days) {
            Some(max_age) if max_age_days >= 0 => max_age,
            _ => {
                warn!("Ignoring pattern cleanup with unusable age of {} days", max_age_days);
                return Vec::new();
            }
        };

        let removed = self
            .store
            .prune_stale(max_age, self.config.prune_min_success, Utc::now());
        if !removed.is_empty() {
            self.flush();
        }
        removed
    }

    pub fn stats(&self) -> PatternStats {
        self.store.stats()
    }

    /// Save now, reporting failure to the caller
    pub fn save(&mut self) -> Result<(), PatternError> {
        self.store.save()?;
        self.created_since_flush = 0;
        Ok(())
    }

    fn flush(&mut self) {
        if let Err(e) = self.save() {
            warn!("Failed to persist content patterns, keeping them in memory: {}", e);
        }
    }
}

/// Whitespace-collapsed prefix of `text`, at most `max_chars` characters
fn sample(text: &str, max_chars: usize) -> String {
    let prefix: String = text.chars().take(max_chars).collect();
    WHITESPACE.replace_all(prefix.trim(), " ").into_owned()
}
