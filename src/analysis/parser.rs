//! Native tree-sitter parser wrapper.
//!
//! Grammars are statically linked. `tree_sitter::Parser` is `!Sync`, so a
//! fresh parser is created per call; `Parser::new()` is one allocation and
//! `set_language` is a pointer swap, which keeps [`CodeParser`] zero-sized
//! and shareable across worker threads.

use crate::error::{HybridError, Result};
use crate::types::Language;

pub struct CodeParser;

impl CodeParser {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Parse `content` with the grammar for `language`.
    pub fn parse(&self, content: &str, language: Language) -> Result<tree_sitter::Tree> {
        let ts_lang = Self::grammar(language);

        let mut parser = tree_sitter::Parser::new();
        parser
            .set_language(&ts_lang)
            .map_err(|e| HybridError::Parse(format!("Language version mismatch: {e}")))?;

        parser.parse(content, None).ok_or_else(|| {
            HybridError::Parse("tree-sitter returned None (timeout or cancellation)".into())
        })
    }

    /// Statically linked grammar for `language`.
    #[must_use]
    pub fn grammar(language: Language) -> tree_sitter::Language {
        match language {
            Language::Go => tree_sitter_go::LANGUAGE.into(),
            Language::Rust => tree_sitter_rust::LANGUAGE.into(),
            Language::Python => tree_sitter_python::LANGUAGE.into(),
        }
    }

    /// Detect the [`Language`] for a file path based on its extension.
    #[must_use]
    pub fn detect_language(file_path: impl AsRef<std::path::Path>) -> Option<Language> {
        Language::from_path(file_path.as_ref())
    }

    #[must_use]
    pub fn is_supported(file_path: impl AsRef<std::path::Path>) -> bool {
        Self::detect_language(file_path).is_some()
    }
}

impl Default for CodeParser {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_go_returns_valid_tree() {
        let source = r#"
package main

import "fmt"

func main() {
    fmt.Println("hello")
}
"#;
        let tree = CodeParser::new().parse(source, Language::Go).unwrap();
        let root = tree.root_node();
        assert_eq!(root.kind(), "source_file");
        assert!(!root.has_error());
    }

    #[test]
    fn parse_rust_returns_valid_tree() {
        let source = r#"
use std::fmt;

pub trait Greeter {
    fn greet(&self, name: &str) -> String;
}

struct English;

impl Greeter for English {
    fn greet(&self, name: &str) -> String {
        format!("Hello, {name}")
    }
}
"#;
        let tree = CodeParser::new().parse(source, Language::Rust).unwrap();
        assert_eq!(tree.root_node().kind(), "source_file");
        assert!(!tree.root_node().has_error());
    }

    #[test]
    fn parse_python_returns_valid_tree() {
        let source = "import os\n\nclass Greeter:\n    def greet(self, name):\n        return f'hi {name}'\n";
        let tree = CodeParser::new().parse(source, Language::Python).unwrap();
        assert_eq!(tree.root_node().kind(), "module");
        assert!(!tree.root_node().has_error());
    }

    #[test]
    fn parse_empty_source_returns_tree() {
        for lang in [Language::Go, Language::Rust, Language::Python] {
            let tree = CodeParser::new().parse("", lang).unwrap();
            assert_eq!(tree.root_node().named_child_count(), 0);
        }
    }

    #[test]
    fn broken_source_still_parses_with_errors() {
        let tree = CodeParser::new().parse("func (", Language::Go).unwrap();
        assert!(tree.root_node().has_error());
    }

    #[test]
    fn detect_language_by_extension() {
        assert_eq!(CodeParser::detect_language("svc/service.go"), Some(Language::Go));
        assert_eq!(CodeParser::detect_language("src/lib.rs"), Some(Language::Rust));
        assert_eq!(CodeParser::detect_language("app/main.py"), Some(Language::Python));
        assert!(!CodeParser::is_supported("README.md"));
        assert!(!CodeParser::is_supported("Makefile"));
    }
}
