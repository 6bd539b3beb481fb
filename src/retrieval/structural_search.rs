//! Ranking the declarations of one analyzed file against a query.

use std::collections::{BTreeMap, BTreeSet};

use serde_json::json;

use super::combiner::{CombinedResult, Location, META_MODIFIED_AT};
use crate::analysis::{FunctionInfo, StructuralResult, TypeInfo};
use crate::types::{Query, ResultSource};

/// Words that never identify a declaration.
const STOP_WORDS: &[&str] = &[
    "a", "an", "the", "and", "or", "of", "to", "in", "on", "for", "with", "from", "by", "is",
    "are", "how", "what", "where", "which", "that", "this", "do", "does", "i", "func", "fn",
    "def", "function", "method", "class", "struct", "type", "find", "show", "get",
];

const OVERVIEW_RELEVANCE: f64 = 0.3;

#[derive(Debug, Clone, Copy, PartialEq)]
enum MatchKind {
    Enclosing,
    Exact,
    Contains,
    Partial,
}

impl MatchKind {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Enclosing => "enclosing",
            Self::Exact => "exact",
            Self::Contains => "contains",
            Self::Partial => "partial",
        }
    }
}

/// Lowercase identifier parts, split on separators and lower-to-upper case
/// changes: `parseHTTPConfig` -> `parse`, `httpconfig`.
pub fn identifier_parts(ident: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut prev_lower = false;
    for c in ident.chars() {
        if !c.is_alphanumeric() {
            if !current.is_empty() {
                parts.push(std::mem::take(&mut current));
            }
            prev_lower = false;
            continue;
        }
        if c.is_uppercase() && prev_lower && !current.is_empty() {
            parts.push(std::mem::take(&mut current));
        }
        prev_lower = c.is_lowercase() || c.is_ascii_digit();
        current.extend(c.to_lowercase());
    }
    if !current.is_empty() {
        parts.push(current);
    }
    parts
}

/// Identifier-like terms of the query text, stop words removed. Dotted
/// paths such as `Store.Lookup` stay whole.
fn query_terms(text: &str) -> Vec<String> {
    text.split(|c: char| !(c.is_alphanumeric() || c == '_' || c == '.'))
        .map(|t| t.trim_matches('.'))
        .filter(|t| t.chars().count() >= 2)
        .filter(|t| !STOP_WORDS.contains(&t.to_lowercase().as_str()))
        .map(str::to_string)
        .collect()
}

fn name_match(name: &str, terms: &[String]) -> Option<(f64, MatchKind)> {
    let lower = name.to_lowercase();
    let name_parts: BTreeSet<String> = identifier_parts(name).into_iter().collect();
    let term_parts: BTreeSet<String> = terms.iter().flat_map(|t| identifier_parts(t)).collect();

    let mut best: Option<(f64, MatchKind)> = None;
    let mut consider = |score: f64, kind: MatchKind| {
        if best.map_or(true, |(b, _)| score > b) {
            best = Some((score, kind));
        }
    };
    for term in terms {
        let term_lower = term.to_lowercase();
        if lower == term_lower {
            consider(1.0, MatchKind::Exact);
        } else if term_lower.len() >= 3 && lower.contains(&term_lower) {
            consider(0.8, MatchKind::Contains);
        }
    }
    if !name_parts.is_empty() {
        let common = name_parts.intersection(&term_parts).count();
        if common > 0 {
            consider(0.6 * common as f64 / name_parts.len() as f64, MatchKind::Partial);
        }
    }
    best
}

fn confidence_for(kind: MatchKind) -> f64 {
    match kind {
        MatchKind::Enclosing | MatchKind::Exact => 1.0,
        MatchKind::Contains => 0.8,
        MatchKind::Partial => 0.6,
    }
}

fn base_metadata(file: &StructuralResult, kind: MatchKind) -> BTreeMap<String, String> {
    let mut metadata = BTreeMap::from([
        ("language".to_string(), file.language.as_str().to_string()),
        ("package".to_string(), file.package.clone()),
        ("match".to_string(), kind.as_str().to_string()),
        ("content_hash".to_string(), file.content_hash.clone()),
    ]);
    if let Some(modified) = file.modified_at {
        metadata.insert(META_MODIFIED_AT.to_string(), modified.to_rfc3339());
    }
    metadata
}

fn function_result(file: &StructuralResult, f: &FunctionInfo, relevance: f64, kind: MatchKind) -> CombinedResult {
    CombinedResult {
        source: ResultSource::Structural,
        relevance,
        confidence: confidence_for(kind),
        content: json!({
            "kind": if f.is_method { "method" } else { "function" },
            "name": f.name,
            "qualified_name": f.qualified_name(),
            "receiver": f.receiver,
            "signature": f.signature,
            "complexity": f.complexity,
            "cognitive": f.cognitive,
            "exported": f.exported,
        }),
        location: Some(Location::new(file.file_path.clone(), f.start_line, f.end_line)),
        metadata: base_metadata(file, kind),
    }
}

fn type_result(file: &StructuralResult, t: &TypeInfo, relevance: f64, kind: MatchKind) -> CombinedResult {
    CombinedResult {
        source: ResultSource::Structural,
        relevance,
        confidence: confidence_for(kind),
        content: json!({
            "kind": t.kind.as_str(),
            "name": t.name,
            "fields": t.fields,
            "methods": t.methods,
            "exported": t.exported,
        }),
        location: Some(Location::new(file.file_path.clone(), t.start_line, t.end_line)),
        metadata: base_metadata(file, kind),
    }
}

fn overview(file: &StructuralResult) -> CombinedResult {
    let mut metadata = base_metadata(file, MatchKind::Partial);
    metadata.insert("match".into(), "overview".into());
    CombinedResult {
        source: ResultSource::Structural,
        relevance: OVERVIEW_RELEVANCE,
        confidence: 0.5,
        content: json!({
            "kind": "file",
            "package": file.package,
            "imports": file.imports.iter().map(|i| i.path.as_str()).collect::<Vec<_>>(),
            "functions": file.functions.iter().map(FunctionInfo::qualified_name).collect::<Vec<_>>(),
            "types": file.types.iter().map(|t| t.name.as_str()).collect::<Vec<_>>(),
            "metrics": file.metrics,
        }),
        location: Some(Location::whole_file(file.file_path.clone())),
        metadata,
    }
}

/// Structural results for `query` within one file.
///
/// A line-specific query puts the enclosing function first (then the
/// enclosing type). Name matches follow: exact 1.0, containment 0.8,
/// identifier-part overlap up to 0.6. A file-targeted query with no match
/// yields a single overview item.
pub fn search(file: &StructuralResult, query: &Query) -> Vec<CombinedResult> {
    let mut out = Vec::new();
    let mut seen_functions = BTreeSet::new();
    let mut seen_types = BTreeSet::new();

    if let Some(line) = query.line {
        if let Some(f) = file.function_at(line) {
            seen_functions.insert((f.start_line, f.name.clone()));
            out.push(function_result(file, f, 1.0, MatchKind::Enclosing));
        }
        if let Some(t) = file.type_at(line) {
            seen_types.insert((t.start_line, t.name.clone()));
            out.push(type_result(file, t, 0.9, MatchKind::Enclosing));
        }
    }

    let terms = query_terms(&query.text);
    if !terms.is_empty() {
        for f in &file.functions {
            if seen_functions.contains(&(f.start_line, f.name.clone())) {
                continue;
            }
            let by_name = name_match(&f.name, &terms);
            let by_qualified = f
                .receiver
                .as_ref()
                .and_then(|_| name_match(&f.qualified_name(), &terms))
                .filter(|(_, kind)| *kind == MatchKind::Exact);
            let best = match (by_name, by_qualified) {
                (Some(a), Some(b)) => Some(if b.0 > a.0 { b } else { a }),
                (a, b) => a.or(b),
            };
            if let Some((score, kind)) = best {
                out.push(function_result(file, f, score, kind));
            }
        }
        for t in &file.types {
            if seen_types.contains(&(t.start_line, t.name.clone())) {
                continue;
            }
            if let Some((score, kind)) = name_match(&t.name, &terms) {
                out.push(type_result(file, t, score, kind));
            }
        }
    }

    if out.is_empty() && query.file_path.is_some() {
        out.push(overview(file));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::analyze_source;
    use crate::types::Language;
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    const SRC: &str = r#"package users

type UserStore struct {
	users map[string]string
}

func ValidateUser(name string) bool {
	return name != ""
}

func (s *UserStore) Lookup(name string) string {
	return s.users[name]
}

func helper() {}
"#;

    fn file() -> StructuralResult {
        analyze_source("users.go", SRC, Language::Go).unwrap()
    }

    fn names(results: &[CombinedResult]) -> Vec<String> {
        results
            .iter()
            .map(|r| r.content["name"].as_str().unwrap_or("<file>").to_string())
            .collect()
    }

    #[test_case("parseHTTPConfig", &["parse", "httpconfig"] ; "acronym stays together")]
    #[test_case("validate_user", &["validate", "user"] ; "snake")]
    #[test_case("UserStore", &["user", "store"] ; "pascal")]
    #[test_case("x", &["x"] ; "single")]
    fn splits_identifiers(ident: &str, expected: &[&str]) {
        assert_eq!(identifier_parts(ident), expected);
    }

    #[test]
    fn exact_name_ranks_one() {
        let results = search(&file(), &Query::new("func ValidateUser"));
        assert_eq!(names(&results), vec!["ValidateUser", "UserStore"]);
        assert_eq!(results[0].relevance, 1.0);
        assert_eq!(results[0].metadata["match"], "exact");
        assert_eq!(results[0].location, Some(Location::new("users.go", 7, 9)));
        // Shares only the "user" part.
        assert_eq!(results[1].metadata["match"], "partial");
        assert!((results[1].relevance - 0.3).abs() < 1e-9);
    }

    #[test]
    fn containment_and_partial_matches() {
        let results = search(&file(), &Query::new("user validation"));
        // "user" is contained in both UserStore and ValidateUser.
        let mut got = names(&results);
        got.sort();
        assert_eq!(got, vec!["UserStore", "ValidateUser"]);
        assert!(results.iter().all(|r| r.relevance == 0.8));
    }

    #[test]
    fn line_query_ranks_enclosing_function_first() {
        let q = Query::new("what happens here").with_file("users.go").at_line(12);
        let results = search(&file(), &q);
        assert_eq!(results[0].content["name"], "Lookup");
        assert_eq!(results[0].content["kind"], "method");
        assert_eq!(results[0].metadata["match"], "enclosing");
    }

    #[test]
    fn unmatched_file_query_gives_overview() {
        let q = Query::new("nothing relevant").with_file("users.go");
        let results = search(&file(), &q);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].content["kind"], "file");
        assert_eq!(results[0].relevance, OVERVIEW_RELEVANCE);
        assert!(results[0].location.as_ref().unwrap().is_whole_file());
    }

    #[test]
    fn unmatched_workspace_query_is_empty() {
        assert!(search(&file(), &Query::new("nothing relevant")).is_empty());
    }

    #[test]
    fn qualified_method_name_matches() {
        let results = search(&file(), &Query::new("UserStore.Lookup"));
        let lookup = results.iter().find(|r| r.content["name"] == "Lookup").unwrap();
        assert_eq!(lookup.relevance, 1.0);
    }
}
