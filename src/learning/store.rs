//! Pattern Store - persistent storage for learned content patterns
//!
//! Keeps every pattern in memory, keyed by a content-derived id, and writes
//! the whole map to a single flat JSON file (`data/content_patterns.json` by
//! default). Loading never fails hard: a missing file is an empty store and a
//! corrupt one is logged and discarded.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use super::error::PatternError;
use super::pattern::{ContentPattern, ExtractionMethod};

/// Length of the hex id derived from a pattern's identity triple
const ID_LEN: usize = 12;

/// How many patterns `stats()` lists as most used
const TOP_PATTERNS: usize = 5;

/// Usage line for one pattern in [`PatternStats`]
#[derive(Debug, Clone, Serialize)]
pub struct PatternUsage {
    pub id: String,
    pub domain: String,
    pub manufacturer: String,
    pub pattern_type: String,
    pub success_count: u32,
    pub confidence_score: f64,
}

/// Summary of what the store has learned so far
#[derive(Debug, Clone, Default, Serialize)]
pub struct PatternStats {
    pub total_patterns: usize,
    pub by_domain: BTreeMap<String, usize>,
    pub by_method: BTreeMap<ExtractionMethod, usize>,
    pub average_confidence: f64,
    pub most_used: Vec<PatternUsage>,
}

/// In-memory pattern map backed by a flat JSON file
#[derive(Debug, Clone)]
pub struct PatternStore {
    path: PathBuf,
    patterns: BTreeMap<String, ContentPattern>,
}

impl PatternStore {
    /// Create an empty store that will save to `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            patterns: BTreeMap::new(),
        }
    }

    /// Load the store, falling back to an empty one on any failure
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        match Self::try_load(&path) {
            Ok(store) => store,
            Err(e) => {
                warn!("Ignoring unreadable pattern file, starting empty: {}", e);
                Self::new(path)
            }
        }
    }

    /// Load the store, reporting why the file could not be read.
    ///
    /// A missing file is not an error. Records that fail to parse are
    /// skipped individually so one bad entry does not cost the rest.
    pub fn try_load(path: impl Into<PathBuf>) -> Result<Self, PatternError> {
        let path = path.into();
        if !path.exists() {
            debug!("No pattern file at {}, starting empty", path.display());
            return Ok(Self::new(path));
        }

        let raw = std::fs::read_to_string(&path).map_err(|e| PatternError::io(&path, e))?;
        let records: BTreeMap<String, serde_json::Value> =
            serde_json::from_str(&raw).map_err(|e| PatternError::json(&path, e))?;

        let mut patterns = BTreeMap::new();
        for (id, value) in records {
            match serde_json::from_value::<ContentPattern>(value) {
                Ok(pattern) => {
                    patterns.insert(id, pattern);
                }
                Err(e) => warn!("Skipping malformed pattern {}: {}", id, e),
            }
        }

        info!("Loaded {} content patterns from {}", patterns.len(), path.display());
        Ok(Self { path, patterns })
    }

    /// Write every pattern to disk, replacing the previous file
    pub fn save(&self) -> Result<(), PatternError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| PatternError::io(parent, e))?;
            }
        }

        let json = serde_json::to_string_pretty(&self.patterns)
            .map_err(|e| PatternError::json(&self.path, e))?;
        std::fs::write(&self.path, json).map_err(|e| PatternError::io(&self.path, e))?;

        info!("Saved {} content patterns to {}", self.patterns.len(), self.path.display());
        Ok(())
    }

    /// Deterministic id for a `(domain, manufacturer, pattern_type)` triple.
    ///
    /// Case-insensitive: the joined triple is lower-cased before hashing.
    pub fn generate_id(domain: &str, manufacturer: &str, pattern_type: &str) -> String {
        let key = format!("{}_{}_{}", domain, manufacturer, pattern_type).to_lowercase();
        let digest = Sha256::digest(key.as_bytes());
        let mut id = hex::encode(digest);
        id.truncate(ID_LEN);
        id
    }

    pub fn get(&self, id: &str) -> Option<&ContentPattern> {
        self.patterns.get(id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut ContentPattern> {
        self.patterns.get_mut(id)
    }

    /// Insert or replace a pattern, returning the previous record if any
    pub fn upsert(&mut self, id: impl Into<String>, pattern: ContentPattern) -> Option<ContentPattern> {
        self.patterns.insert(id.into(), pattern)
    }

    pub fn remove(&mut self, id: &str) -> Option<ContentPattern> {
        self.patterns.remove(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ContentPattern)> {
        self.patterns.iter()
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Drop patterns that are both old and rarely reused.
    ///
    /// A pattern survives if it was used within `max_age` of `now`, or if it
    /// has at least `min_success` successful reuses. Returns removed ids.
    pub fn prune_stale(
        &mut self,
        max_age: chrono::Duration,
        min_success: u32,
        now: DateTime<Utc>,
    ) -> Vec<String> {
        let stale: Vec<String> = self
            .patterns
            .iter()
            .filter(|(_, p)| p.is_stale(max_age, now) && p.success_count < min_success)
            .map(|(id, _)| id.clone())
            .collect();

        for id in &stale {
            self.patterns.remove(id);
        }

        if !stale.is_empty() {
            info!("Pruned {} stale content patterns", stale.len());
        }
        stale
    }

    pub fn stats(&self) -> PatternStats {
        let mut stats = PatternStats {
            total_patterns: self.patterns.len(),
            ..Default::default()
        };

        let mut confidence_sum = 0.0;
        for pattern in self.patterns.values() {
            *stats.by_domain.entry(pattern.domain.clone()).or_default() += 1;
            *stats.by_method.entry(pattern.extraction_method).or_default() += 1;
            confidence_sum += pattern.confidence_score;
        }
        if !self.patterns.is_empty() {
            stats.average_confidence = confidence_sum / self.patterns.len() as f64;
        }

        let mut usage: Vec<PatternUsage> = self
            .patterns
            .iter()
            .map(|(id, p)| PatternUsage {
                id: id.clone(),
                domain: p.domain.clone(),
                manufacturer: p.manufacturer.clone(),
                pattern_type: p.pattern_type.clone(),
                success_count: p.success_count,
                confidence_score: p.confidence_score,
            })
            .collect();
        usage.sort_by(|a, b| b.success_count.cmp(&a.success_count).then_with(|| a.id.cmp(&b.id)));
        usage.truncate(TOP_PATTERNS);
        stats.most_used = usage;

        stats
    }
}
