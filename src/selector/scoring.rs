//! Structural-fit and semantic-fit scores.
//!
//! Both are weighted sums of [`QueryFeatures`] terms clamped to [0, 1]. The
//! weights are tunable; the clamp is what keeps the result in range.

use std::collections::BTreeMap;

use serde::Serialize;

use super::features::QueryFeatures;
use crate::config::{SemanticWeights, StructuralWeights};
use crate::types::QueryType;

/// One fit score with its per-term contributions.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FitScore {
    pub score: f64,
    pub components: BTreeMap<&'static str, f64>,
    pub reasons: Vec<String>,
}

impl FitScore {
    fn new() -> Self {
        Self {
            score: 0.0,
            components: BTreeMap::new(),
            reasons: Vec::new(),
        }
    }

    fn add(&mut self, name: &'static str, value: f64) {
        if value != 0.0 {
            self.components.insert(name, value);
        }
        self.score += value;
    }

    fn finish(mut self) -> Self {
        self.score = unit(self.score);
        self
    }
}

/// Clamp to [0, 1], mapping NaN to 0.
pub fn unit(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

fn structural_type_credit(query_type: QueryType) -> f64 {
    if query_type.is_structural() {
        1.0
    } else if query_type == QueryType::Mixed {
        0.5
    } else {
        0.0
    }
}

fn semantic_type_credit(query_type: QueryType) -> f64 {
    if query_type.is_semantic() {
        1.0
    } else if query_type == QueryType::Mixed {
        0.5
    } else {
        0.0
    }
}

pub fn structural_fit(f: &QueryFeatures, w: &StructuralWeights) -> FitScore {
    let mut fit = FitScore::new();
    let ext = f.extension.as_deref().unwrap_or_default();

    if f.is_code_extension {
        fit.add("extension", w.extension);
        let origin = if f.extension_from_filters { "filter" } else { "file" };
        fit.reasons
            .push(format!("code extension {ext} ({origin}) matches the structural list"));
    }
    let type_credit = structural_type_credit(f.query_type);
    if type_credit > 0.0 {
        fit.add("query_type", w.query_type * type_credit);
        fit.reasons
            .push(format!("query type {} is answered structurally", f.query_type));
    }
    let code = f.code_signal();
    if code > 0.0 {
        fit.add("code_signals", w.code_signals * code);
        fit.reasons
            .push(format!("query text carries code signals ({code:.2})"));
    }
    if f.has_line {
        fit.add("line_specific", w.line_specific);
        fit.reasons.push("line-specific query".to_string());
    }
    if f.is_doc_extension {
        fit.add("documentation_penalty", -w.documentation_penalty);
        fit.reasons
            .push(format!("documentation extension {ext} penalizes structural analysis"));
    }
    fit.finish()
}

pub fn semantic_fit(f: &QueryFeatures, w: &SemanticWeights) -> FitScore {
    let mut fit = FitScore::new();
    let ext = f.extension.as_deref().unwrap_or_default();

    if f.is_semantic_extension {
        fit.add("extension", w.extension);
        fit.reasons
            .push(format!("extension {ext} is on the semantic list"));
    }
    if f.is_doc_extension {
        fit.add("documentation", w.documentation);
        fit.reasons
            .push(format!("documentation extension {ext} earns the documentation bonus"));
    }
    let prose = f.prose_signal();
    if prose > 0.0 {
        fit.add("prose", w.prose * prose);
        fit.reasons
            .push(format!("natural-language phrasing ({prose:.2})"));
    }
    if f.scope_breadth > 0.0 {
        fit.add("scope", w.scope * f.scope_breadth);
        fit.reasons
            .push(format!("broad scope ({:.1})", f.scope_breadth));
    }
    let type_credit = semantic_type_credit(f.query_type);
    if type_credit > 0.0 {
        fit.add("query_type", w.query_type * type_credit);
        fit.reasons
            .push(format!("query type {} favours similarity search", f.query_type));
    }
    fit.finish()
}
