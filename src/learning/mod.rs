//! Content Pattern Learning System
//!
//! Remembers where spec data sat on each manufacturer's pages, so later
//! scrapes of the same site can hand a narrowed window of text to the
//! extraction tiers instead of the whole page. Patterns are stored in a flat
//! JSON file and reinforced every time they prove useful again.

pub mod error;
pub mod pattern;
pub mod store;
pub mod heuristics;
pub mod matcher;
pub mod learner;

pub use error::PatternError;
pub use pattern::{ContentPattern, ContentSlice, ExtractionMethod, SliceAnchor};
pub use store::{PatternStats, PatternStore, PatternUsage};
pub use heuristics::{StructuralHeuristic, HEURISTICS};
pub use matcher::{PatternMatcher, SliceMatch};
pub use learner::{ContentPatternLearner, LearnOutcome, LearnerConfig, SkipReason};
