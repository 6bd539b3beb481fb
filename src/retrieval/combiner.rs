//! Merging structural and semantic results into one ranked list.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;

use crate::config::RetrievalConfig;
use crate::selector::scoring::unit;
use crate::semantic::SemanticHit;
use crate::types::{Query, ResultSource, RetrievalMode};

/// Metadata key holding an RFC 3339 modification time, used by `max_age_secs`.
pub const META_MODIFIED_AT: &str = "modified_at";

/// A line range in a file. `start_line == 0` means the whole file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Location {
    pub file_path: String,
    pub start_line: u32,
    pub end_line: u32,
}

impl Location {
    pub fn new(file_path: impl Into<String>, start_line: u32, end_line: u32) -> Self {
        Self {
            file_path: file_path.into(),
            start_line,
            end_line: end_line.max(start_line),
        }
    }

    pub fn whole_file(file_path: impl Into<String>) -> Self {
        Self::new(file_path, 0, 0)
    }

    pub fn is_whole_file(&self) -> bool {
        self.start_line == 0
    }

    /// Same file and intersecting line ranges. Whole-file locations never
    /// overlap anything.
    pub fn overlaps(&self, other: &Location) -> bool {
        !self.is_whole_file()
            && !other.is_whole_file()
            && self.file_path == other.file_path
            && self.start_line <= other.end_line
            && other.start_line <= self.end_line
    }

    fn union(&self, other: &Location) -> Location {
        Location::new(
            self.file_path.clone(),
            self.start_line.min(other.start_line),
            self.end_line.max(other.end_line),
        )
    }
}

/// One ranked item returned to the caller.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CombinedResult {
    pub source: ResultSource,
    /// In [0, 1].
    pub relevance: f64,
    /// In [0, 1].
    pub confidence: f64,
    pub content: serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
    pub metadata: BTreeMap<String, String>,
}

impl CombinedResult {
    pub fn from_semantic_hit(hit: &SemanticHit) -> Self {
        let location = hit.file_path().map(|path| match hit.start_line() {
            Some(start) => Location::new(path, start, hit.end_line().unwrap_or(start)),
            None => Location::whole_file(path),
        });
        let mut metadata: BTreeMap<String, String> = hit
            .metadata
            .iter()
            .map(|(k, v)| {
                let value = match v {
                    serde_json::Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                (k.clone(), value)
            })
            .collect();
        metadata.insert("document_id".into(), hit.document_id.clone());
        let score = unit(hit.score);
        Self {
            source: ResultSource::Semantic,
            relevance: score,
            confidence: score,
            content: json!({
                "document_id": hit.document_id,
                "content": hit.content,
            }),
            location,
            metadata,
        }
    }

    pub fn file_path(&self) -> Option<&str> {
        self.location.as_ref().map(|l| l.file_path.as_str())
    }

    fn modified_at(&self) -> Option<DateTime<Utc>> {
        self.metadata
            .get(META_MODIFIED_AT)
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|t| t.with_timezone(&Utc))
    }
}

pub struct ResultCombiner {
    overlap_bonus: f64,
    default_limit: usize,
}

impl ResultCombiner {
    pub fn new(overlap_bonus: f64, default_limit: usize) -> Self {
        Self {
            overlap_bonus: overlap_bonus.max(0.0),
            default_limit: default_limit.max(1),
        }
    }

    pub fn from_config(config: &RetrievalConfig) -> Self {
        Self::new(config.overlap_bonus, config.default_limit)
    }

    /// Rank the results the selected mode calls for. Results from a path the
    /// mode does not use are ignored.
    pub fn combine(
        &self,
        mode: RetrievalMode,
        structural: Vec<CombinedResult>,
        semantic: Vec<CombinedResult>,
        query: &Query,
    ) -> Vec<CombinedResult> {
        let structural = if mode.uses_structural() { structural } else { Vec::new() };
        let semantic = if mode.uses_semantic() { semantic } else { Vec::new() };
        let merged = if mode.is_hybrid() {
            self.merge(structural, semantic)
        } else {
            structural.into_iter().chain(semantic).collect()
        };

        let now = Utc::now();
        let filters = &query.filters;
        let mut ranked: Vec<CombinedResult> = merged
            .into_iter()
            .filter(|r| r.file_path().map_or(true, |p| filters.allows_path(p)))
            .filter(|r| filters.min_relevance.map_or(true, |min| r.relevance >= min))
            .filter(|r| match (filters.max_age_secs, r.modified_at()) {
                (Some(max), Some(at)) => (now - at).num_seconds() <= max as i64,
                _ => true,
            })
            .collect();

        ranked.sort_by(|a, b| {
            b.relevance
                .total_cmp(&a.relevance)
                .then_with(|| mode.source_priority(a.source).cmp(&mode.source_priority(b.source)))
        });
        ranked.truncate(query.effective_limit(self.default_limit));
        ranked
    }

    /// Fold each semantic result into the first structural result it
    /// overlaps; everything else passes through unchanged.
    fn merge(
        &self,
        mut structural: Vec<CombinedResult>,
        semantic: Vec<CombinedResult>,
    ) -> Vec<CombinedResult> {
        let mut extra = Vec::new();
        for sem in semantic {
            let target = sem.location.as_ref().and_then(|loc| {
                structural.iter_mut().find(|s| {
                    s.source == ResultSource::Structural
                        && s.location.as_ref().is_some_and(|l| l.overlaps(loc))
                })
            });
            match target {
                Some(s) => *s = self.merge_pair(s, sem),
                None => extra.push(sem),
            }
        }
        structural.extend(extra);
        structural
    }

    fn merge_pair(&self, structural: &CombinedResult, semantic: CombinedResult) -> CombinedResult {
        let location = match (&structural.location, &semantic.location) {
            (Some(a), Some(b)) => Some(a.union(b)),
            (a, b) => a.clone().or_else(|| b.clone()),
        };
        let mut metadata = semantic.metadata;
        metadata.extend(structural.metadata.clone());
        CombinedResult {
            source: ResultSource::Combined,
            relevance: unit(structural.relevance.max(semantic.relevance) + self.overlap_bonus),
            confidence: structural.confidence.max(semantic.confidence),
            content: json!({
                "structural": structural.content,
                "semantic": semantic.content,
            }),
            location,
            metadata,
        }
    }
}
