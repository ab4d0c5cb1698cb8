//! Arrow Patterns - adaptive content extraction for arrow spec scraping
//!
//! Learns where manufacturers put their spec tables and reuses that
//! knowledge on later scrapes:
//! - Flat-file pattern store keyed by domain, manufacturer and layout
//! - Matcher that narrows a page to the window that worked before
//! - Learner that classifies successful pages and reinforces patterns
//! - Adaptive extractor that drives text, vision and knowledge tiers
//!
//! # Example
//!
//! ```ignore
//! use arrow_patterns::{ContentPatternLearner, LearnerConfig, ExtractionMethod};
//!
//! let mut learner = ContentPatternLearner::open(LearnerConfig::default());
//! let content = fetch_page_text(url)?;
//! let window = learner
//!     .find_matching_pattern(url, &content, "Easton")
//!     .and_then(|slice| slice.apply(&content))
//!     .unwrap_or(&content);
//! let specs = extract_specs(window)?;
//! learner.learn_successful_pattern(url, &content, "Easton", &specs, ExtractionMethod::Text);
//! ```

pub mod config;
pub mod learning;
pub mod extraction;
pub mod cli;

pub use config::Config;

pub use learning::{
    ContentPattern,
    ContentPatternLearner,
    ExtractionMethod,
    LearnOutcome,
    LearnerConfig,
    PatternError,
    PatternMatcher,
    PatternStore,
    SliceMatch,
};

pub use extraction::{AdaptiveExtractor, ExtractionReport, ExtractionTier, FetchedPage};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
