//! Integration tests for the adaptive extractor and its tier chain

use anyhow::Result;
use arrow_patterns::extraction::{AdaptiveExtractor, ExtractionTier, FetchedPage};
use arrow_patterns::learning::{ContentPatternLearner, ExtractionMethod, LearnOutcome, LearnerConfig, SkipReason};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};

/// Tier that finds a record only when its keyword is in the content it sees
struct KeywordTier {
    method: ExtractionMethod,
    keyword: &'static str,
    seen_lengths: Arc<Mutex<Vec<usize>>>,
}

impl KeywordTier {
    fn new(method: ExtractionMethod, keyword: &'static str) -> (Self, Arc<Mutex<Vec<usize>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let tier = Self {
            method,
            keyword,
            seen_lengths: seen.clone(),
        };
        (tier, seen)
    }
}

#[async_trait::async_trait]
impl ExtractionTier for KeywordTier {
    fn method(&self) -> ExtractionMethod {
        self.method
    }

    async fn extract(&self, _page: &FetchedPage, content: &str, _manufacturer: &str) -> Result<Vec<Value>> {
        self.seen_lengths.lock().unwrap().push(content.len());
        if content.to_lowercase().contains(self.keyword) {
            Ok(vec![json!({"spine": 400, "gpi": 8.9})])
        } else {
            Ok(Vec::new())
        }
    }
}

struct FailingTier;

#[async_trait::async_trait]
impl ExtractionTier for FailingTier {
    fn method(&self) -> ExtractionMethod {
        ExtractionMethod::Text
    }

    async fn extract(&self, _page: &FetchedPage, _content: &str, _manufacturer: &str) -> Result<Vec<Value>> {
        anyhow::bail!("parser crashed")
    }
}

fn page(url: &str, spine_at: usize, total: usize) -> FetchedPage {
    let mut text = "x".repeat(spine_at);
    text.push_str("Spine 340 400 500 GPI 9.5 8.9 8.0");
    text.push_str(&"x".repeat(total - text.len()));
    FetchedPage::new(url, "<html></html>", text)
}

fn learner(dir: &tempfile::TempDir) -> ContentPatternLearner {
    ContentPatternLearner::open(LearnerConfig {
        store_path: dir.path().join("content_patterns.json"),
        ..Default::default()
    })
}

#[tokio::test]
async fn test_falls_through_tiers_and_learns() {
    let dir = tempfile::tempdir().unwrap();
    let (text, _) = KeywordTier::new(ExtractionMethod::Text, "no-such-word");
    let (vision, _) = KeywordTier::new(ExtractionMethod::Vision, "spine");
    let mut extractor = AdaptiveExtractor::new(learner(&dir))
        .with_tier(Box::new(text))
        .with_tier(Box::new(vision));

    let report = extractor
        .extract(&page("https://eastonarchery.com/fmj", 500, 3000), "Easton")
        .await;

    assert!(report.is_success());
    assert_eq!(report.method, Some(ExtractionMethod::Vision));
    assert!(report.slice.is_none());
    assert!(!report.used_slice);
    assert!(matches!(report.learned, LearnOutcome::Created { .. }));

    let id = report.learned.pattern_id().unwrap();
    let pattern = extractor.learner().store().get(id).unwrap();
    assert_eq!(pattern.extraction_method, ExtractionMethod::Vision);
}

#[tokio::test]
async fn test_second_scrape_uses_learned_slice() {
    let dir = tempfile::tempdir().unwrap();
    let (text, seen) = KeywordTier::new(ExtractionMethod::Text, "spine");
    let mut extractor = AdaptiveExtractor::new(learner(&dir)).with_tier(Box::new(text));

    let first = extractor
        .extract(&page("https://eastonarchery.com/fmj", 500, 3000), "Easton")
        .await;
    assert!(matches!(first.learned, LearnOutcome::Created { .. }));

    let long_page = page("https://eastonarchery.com/axis", 20_000, 40_000);
    let second = extractor.extract(&long_page, "Easton").await;

    let slice = second.slice.clone().expect("pattern offered a slice");
    assert!(second.used_slice);
    assert_eq!(slice.start, 19_000);
    assert_eq!(slice.end, 28_000);
    assert!(matches!(second.learned, LearnOutcome::Reinforced { .. }));

    // The tier only ever saw the narrowed window on the second page
    let seen = seen.lock().unwrap();
    assert_eq!(seen.last().copied(), Some(9000));
}

#[tokio::test]
async fn test_slice_miss_retries_full_text() {
    let dir = tempfile::tempdir().unwrap();
    let (text, seen) = KeywordTier::new(ExtractionMethod::Text, "diameter");
    let mut extractor = AdaptiveExtractor::new(learner(&dir)).with_tier(Box::new(text));

    let mut first = page("https://goldtip.com/hunter", 100, 2000);
    first.text.push_str(" diameter .246");
    extractor.extract(&first, "Gold Tip").await;

    // Data sits far outside the learned window this time
    let mut second = page("https://goldtip.com/pierce", 100, 30_000);
    second.text.push_str(" diameter .204");
    let report = extractor.extract(&second, "Gold Tip").await;

    assert!(report.is_success());
    assert!(report.slice.is_some());
    assert!(!report.used_slice);
    let seen = seen.lock().unwrap();
    assert_eq!(&seen[seen.len() - 2..], &[8100, second.text.len()]);
}

#[tokio::test]
async fn test_tier_errors_are_not_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let (text, _) = KeywordTier::new(ExtractionMethod::Knowledge, "spine");
    let mut extractor = AdaptiveExtractor::new(learner(&dir));
    extractor.register(Box::new(FailingTier));
    extractor.register(Box::new(text));

    let report = extractor
        .extract(&page("https://victoryarchery.com/vap", 10, 500), "Victory")
        .await;
    assert_eq!(report.method, Some(ExtractionMethod::Knowledge));
}

#[tokio::test]
async fn test_nothing_extracted_learns_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let mut extractor = AdaptiveExtractor::new(learner(&dir)).with_tier(Box::new(FailingTier));

    let report = extractor
        .extract(&page("https://victoryarchery.com/vap", 10, 500), "Victory")
        .await;
    assert!(!report.is_success());
    assert_eq!(report.method, None);
    assert_eq!(report.learned, LearnOutcome::Skipped(SkipReason::NoData));
    assert!(extractor.into_learner().store().is_empty());
}
