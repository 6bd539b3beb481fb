//! Context features derived from a query before scoring.

use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;

use crate::config::SelectorConfig;
use crate::types::{Query, QueryType};

/// Keywords that mark a query as talking about code structure.
const CODE_KEYWORDS: &[&str] = &[
    "func", "fn", "def", "class", "struct", "interface", "impl", "trait", "enum", "type",
    "const", "var", "let", "import", "package", "return", "function", "method",
];

/// Common English words; a high share of them marks prose.
const NATURAL_LANGUAGE_WORDS: &[&str] = &[
    "a", "an", "the", "how", "what", "which", "where", "when", "why", "who", "do", "does",
    "did", "i", "we", "you", "it", "is", "are", "was", "can", "could", "should", "would",
    "that", "this", "these", "those", "with", "from", "for", "into", "of", "to", "in", "on",
    "by", "and", "or", "find", "show", "list", "get", "all", "me", "my", "function",
    "method", "class", "file", "files", "functions",
];

const QUESTION_WORDS: &[&str] = &[
    "how", "what", "which", "where", "when", "why", "who", "can", "does", "do", "is", "are",
    "should", "could", "would",
];

/// Parentheses, braces, brackets, `::`, arrows and dotted member paths.
const CODE_TOKEN_PATTERN: &str = r"[(){}\[\];]|::|->|=>|\w\.\w";

/// camelCase, PascalCase (at least two humps) or snake_case identifiers.
const IDENTIFIER_PATTERN: &str =
    r"\b(?:[a-z][a-z0-9]*[A-Z][A-Za-z0-9]*|[A-Z][a-z0-9]+[A-Z][A-Za-z0-9]*|[a-z][a-z0-9]*_[a-z0-9_]+)\b";

fn code_token_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(CODE_TOKEN_PATTERN).ok()).as_ref()
}

fn identifier_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(IDENTIFIER_PATTERN).ok()).as_ref()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryFeatures {
    /// Extension of the target file, or the first filter extension.
    pub extension: Option<String>,
    /// The extension came from the filters, not a file path.
    pub extension_from_filters: bool,
    pub is_code_extension: bool,
    /// On the prefer-semantic list.
    pub is_semantic_extension: bool,
    pub is_doc_extension: bool,
    pub length: usize,
    pub word_count: usize,
    pub natural_language_words: usize,
    pub is_question: bool,
    pub code_keywords: usize,
    pub has_code_tokens: bool,
    pub has_identifier_style: bool,
    pub has_line: bool,
    /// 0 for a single file, 1 for the whole workspace.
    pub scope_breadth: f64,
    pub query_type: QueryType,
}

fn normalize_word(word: &str) -> String {
    word.trim_matches(|c: char| !c.is_alphanumeric() && c != '_')
        .to_lowercase()
}

impl QueryFeatures {
    pub fn extract(query: &Query, config: &SelectorConfig) -> Self {
        let text = query.text.trim();
        let words: Vec<String> = text
            .split_whitespace()
            .map(normalize_word)
            .filter(|w| !w.is_empty())
            .collect();

        let natural_language_words = words
            .iter()
            .filter(|w| NATURAL_LANGUAGE_WORDS.contains(&w.as_str()))
            .count();
        let code_keywords = words
            .iter()
            .filter(|w| CODE_KEYWORDS.contains(&w.as_str()))
            .count();
        let is_question = text.ends_with('?')
            || words
                .first()
                .is_some_and(|w| QUESTION_WORDS.contains(&w.as_str()));

        let (extension, extension_from_filters) = match query.extension() {
            Some(ext) => (Some(ext), false),
            None => {
                let exts = &query.filters.extensions;
                (exts.first().map(|e| e.to_lowercase()), !exts.is_empty())
            }
        };
        let candidates: Vec<&str> = if extension_from_filters {
            query.filters.extensions.iter().map(String::as_str).collect()
        } else {
            extension.as_deref().into_iter().collect()
        };
        let listed = |on_list: fn(&SelectorConfig, &str) -> bool| {
            candidates.iter().any(|e| on_list(config, e))
        };
        let is_code_extension = listed(SelectorConfig::is_structural_extension);
        let is_semantic_extension = listed(SelectorConfig::is_semantic_extension);
        let is_doc_extension = listed(SelectorConfig::is_documentation_extension);

        Self {
            extension,
            extension_from_filters,
            is_code_extension,
            is_semantic_extension,
            is_doc_extension,
            length: text.chars().count(),
            word_count: words.len(),
            natural_language_words,
            is_question,
            code_keywords,
            has_code_tokens: code_token_regex().is_some_and(|re| re.is_match(text)),
            has_identifier_style: identifier_regex().is_some_and(|re| re.is_match(text)),
            has_line: query.line.is_some(),
            scope_breadth: query.scope.breadth(),
            query_type: query.query_type,
        }
    }

    /// How much the text itself looks like code, in [0, 1].
    pub fn code_signal(&self) -> f64 {
        let keyword: f64 = if self.code_keywords > 0 { 1.0 } else { 0.0 };
        let tokens: f64 = if self.has_code_tokens { 1.0 } else { 0.0 };
        let ident: f64 = if self.has_identifier_style { 1.0 } else { 0.0 };
        (0.5 * keyword + 0.3 * tokens + 0.4 * ident).clamp(0.0, 1.0)
    }

    /// How much the text reads like a natural-language request, in [0, 1].
    pub fn prose_signal(&self) -> f64 {
        let length = (self.word_count as f64 / 5.0).min(1.0);
        let natural = (self.natural_language_words as f64 / 3.0).min(1.0);
        let question: f64 = if self.is_question { 1.0 } else { 0.0 };
        (0.35 * length + 0.35 * natural + 0.3 * question).clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{QueryFilters, Scope};
    use test_case::test_case;

    fn features(query: &Query) -> QueryFeatures {
        QueryFeatures::extract(query, &SelectorConfig::default())
    }

    #[test_case("NewManager", true ; "pascal case")]
    #[test_case("newManager", true ; "camel case")]
    #[test_case("new_manager", true ; "snake case")]
    #[test_case("Manager", false ; "single word capitalized")]
    #[test_case("how do I configure retries", false ; "prose")]
    fn identifier_style(text: &str, expected: bool) {
        assert_eq!(features(&Query::new(text)).has_identifier_style, expected);
    }

    #[test_case("parse(input)", true ; "call")]
    #[test_case("std::fs::read", true ; "path")]
    #[test_case("config.load", true ; "dotted")]
    #[test_case("fn(x) -> y", true ; "arrow")]
    #[test_case("what is a manager", false ; "prose")]
    fn code_tokens(text: &str, expected: bool) {
        assert_eq!(features(&Query::new(text)).has_code_tokens, expected);
    }

    #[test]
    fn question_and_prose_counts() {
        let f = features(&Query::new("how do I configure retries"));
        assert!(f.is_question);
        assert_eq!(f.word_count, 5);
        assert_eq!(f.natural_language_words, 3);
        assert!((f.prose_signal() - 1.0).abs() < 1e-9);
        assert_eq!(f.code_signal(), 0.0);
    }

    #[test]
    fn trailing_question_mark_counts_as_question() {
        assert!(features(&Query::new("retries configured somewhere?")).is_question);
    }

    #[test]
    fn keyword_and_identifier_code_signal() {
        let f = features(&Query::new("func NewManager"));
        assert_eq!(f.code_keywords, 1);
        assert!((f.code_signal() - 0.9).abs() < 1e-9);
    }

    #[test]
    fn file_extension_classification() {
        let f = features(&Query::new("x").with_file("pkg/Service.GO"));
        assert_eq!(f.extension.as_deref(), Some(".go"));
        assert!(f.is_code_extension && !f.is_doc_extension);

        let f = features(&Query::new("x").with_file("README.md"));
        assert!(f.is_doc_extension && f.is_semantic_extension && !f.is_code_extension);

        let f = features(&Query::new("x").with_file("deploy/values.yaml"));
        assert!(f.is_semantic_extension && !f.is_doc_extension);

        let f = features(&Query::new("x").with_file("data.parquet"));
        assert!(!f.is_code_extension && !f.is_doc_extension);
    }

    #[test]
    fn filter_extensions_stand_in_without_a_file() {
        let q = Query::new("retry logic").with_filters(QueryFilters {
            extensions: vec![".RS".into()],
            ..QueryFilters::default()
        });
        let f = features(&q);
        assert!(f.extension_from_filters);
        assert!(f.is_code_extension);
        assert_eq!(f.extension.as_deref(), Some(".rs"));
    }

    #[test]
    fn line_and_scope() {
        let f = features(&Query::new("x").with_file("a.go").at_line(3).with_scope(Scope::Workspace));
        assert!(f.has_line);
        assert_eq!(f.scope_breadth, 1.0);
    }

    #[test]
    fn empty_text_has_no_signals() {
        let f = features(&Query::new("   "));
        assert_eq!(f.word_count, 0);
        assert_eq!(f.code_signal(), 0.0);
        assert_eq!(f.prose_signal(), 0.0);
    }
}
