//! Language support through the public analysis pipeline.
//!
//! Each supported language is detected from its extension, parsed, and
//! reduced to a `StructuralResult` whose declarations, packages and
//! complexity numbers are checked against small representative sources.

use std::path::Path;

use hybrid_context::analysis::{analyze_source, CodeParser, TypeKind};
use hybrid_context::types::Language;
use pretty_assertions::assert_eq;
use test_case::test_case;

// =========================================================================
// 1. Detection
// =========================================================================

#[test_case("cmd/server/main.go", Some(Language::Go) ; "go")]
#[test_case("src/lib.rs", Some(Language::Rust) ; "rust")]
#[test_case("tools/gen.py", Some(Language::Python) ; "python")]
#[test_case("typings/api.pyi", Some(Language::Python) ; "python stub")]
#[test_case("Main.GO", None ; "extension is case sensitive")]
#[test_case("README.md", None ; "markdown")]
#[test_case("Makefile", None ; "no extension")]
fn language_from_path(path: &str, expected: Option<Language>) {
    assert_eq!(Language::from_path(Path::new(path)), expected);
    assert_eq!(CodeParser::is_supported(path), expected.is_some());
}

#[test_case("golang", Language::Go ; "go alias")]
#[test_case("RS", Language::Rust ; "rust alias upper")]
#[test_case("Python", Language::Python ; "python mixed case")]
fn language_from_name(name: &str, expected: Language) {
    assert_eq!(Language::from_str_loose(name), Some(expected));
    assert_eq!(Language::from_str_loose(expected.as_str()), Some(expected));
}

// =========================================================================
// 2. Go
// =========================================================================

const GO_SRC: &str = r#"package billing

import (
	"errors"
	"strings"
)

type Invoice struct {
	ID    string
	Lines []Line
}

func (i *Invoice) Total() int {
	return len(i.Lines)
}

func Classify(n int) string {
	if n < 0 && n > -10 {
		return "small"
	}
	for i := 0; i < n; i++ {
		strings.Repeat("x", i)
	}
	return errors.New("").Error()
}
"#;

#[test]
fn go_file_structure() {
    let r = analyze_source("billing/invoice.go", GO_SRC, Language::Go).unwrap();
    assert_eq!(r.language, Language::Go);
    assert_eq!(r.package, "billing");
    let imports: Vec<_> = r.imports.iter().map(|i| i.path.as_str()).collect();
    assert_eq!(imports, vec!["errors", "strings"]);
    assert!(r.imports.iter().all(|i| i.is_std));

    let invoice = r.find_type("Invoice").unwrap();
    assert_eq!(invoice.kind, TypeKind::Struct);
    assert_eq!(invoice.methods, vec!["Total".to_string()]);
    assert_eq!((invoice.start_line, invoice.end_line), (8, 11));

    let total = r.find_function("Total").unwrap();
    assert!(total.is_method);
    assert_eq!(total.qualified_name(), "Invoice.Total");
}

#[test]
fn go_complexity_counts_branches_loops_and_short_circuits() {
    let r = analyze_source("billing/invoice.go", GO_SRC, Language::Go).unwrap();
    assert_eq!(r.find_function("Classify").unwrap().complexity, 4);
    assert_eq!(r.find_function("Total").unwrap().complexity, 1);
    assert_eq!(r.metrics.cyclomatic, 4);
    assert_eq!(r.metrics.functions, 2);
    assert_eq!(r.metrics.types, 1);
    assert_eq!(r.metrics.lines, GO_SRC.lines().count() as u32);
}

// =========================================================================
// 3. Rust
// =========================================================================

const RUST_SRC: &str = r#"use std::collections::HashMap;

pub struct Registry {
    entries: HashMap<String, u32>,
}

impl Registry {
    pub fn pick(&self, v: Option<i32>) -> i32 {
        match v {
            Some(x) if x > 0 => x,
            Some(_) => 0,
            None => -1,
        }
    }
}

fn private_helper() {}
"#;

#[test]
fn rust_file_structure() {
    let r = analyze_source("src/registry/mod.rs", RUST_SRC, Language::Rust).unwrap();
    assert_eq!(r.package, "registry");
    assert!(r.imports[0].is_std);

    let registry = r.find_type("Registry").unwrap();
    assert_eq!(registry.kind, TypeKind::Struct);
    assert!(registry.exported);
    assert_eq!(registry.methods, vec!["pick".to_string()]);

    let pick = r.find_function("pick").unwrap();
    assert_eq!(pick.receiver.as_deref(), Some("Registry"));
    assert_eq!(pick.complexity, 4);
    assert!(!r.find_function("private_helper").unwrap().exported);
}

#[test]
fn rust_crate_root_package() {
    let r = analyze_source("src/main.rs", "fn main() {}\n", Language::Rust).unwrap();
    assert_eq!(r.package, "crate");
    assert_eq!(r.metrics.cyclomatic, 1);
}

// =========================================================================
// 4. Python
// =========================================================================

const PY_SRC: &str = r#"import json


class Grader:
    def grade(self, score):
        if score > 90:
            return "A"
        elif score > 80:
            return "B"
        return "C"


def _load(path):
    return json.loads(path)
"#;

#[test]
fn python_file_structure() {
    let r = analyze_source("school/__init__.py", PY_SRC, Language::Python).unwrap();
    assert_eq!(r.package, "school");
    let grader = r.find_type("Grader").unwrap();
    assert_eq!(grader.kind, TypeKind::Class);

    let grade = r.find_function("grade").unwrap();
    assert_eq!(grade.receiver.as_deref(), Some("Grader"));
    assert_eq!(grade.complexity, 3);
    assert!(!r.find_function("_load").unwrap().exported);
}

#[test]
fn python_enclosing_lookup() {
    let r = analyze_source("school/grader.py", PY_SRC, Language::Python).unwrap();
    assert_eq!(r.function_at(7).unwrap().name, "grade");
    assert_eq!(r.type_at(7).unwrap().name, "Grader");
    assert!(r.function_at(12).is_none());
}

// =========================================================================
// 5. Shared behaviour
// =========================================================================

#[test_case(Language::Go, GO_SRC ; "go")]
#[test_case(Language::Rust, RUST_SRC ; "rust")]
#[test_case(Language::Python, PY_SRC ; "python")]
fn content_hash_is_stable_sha256(language: Language, src: &str) {
    let a = analyze_source("a", src, language).unwrap();
    let b = analyze_source("b", src, language).unwrap();
    assert_eq!(a.content_hash, b.content_hash);
    assert_eq!(a.content_hash.len(), 64);
    let changed = analyze_source("a", &format!("{src}\n"), language).unwrap();
    assert_ne!(a.content_hash, changed.content_hash);
}

#[test_case(Language::Go, "package broken\n\nfunc Good() {}\n\nvar x = (\n" ; "go")]
#[test_case(Language::Rust, "fn good() {}\n\nconst X: u8 = (;\n" ; "rust")]
#[test_case(Language::Python, "def good():\n    pass\n\nx = (\n" ; "python")]
fn syntax_errors_keep_valid_declarations(language: Language, src: &str) {
    let r = analyze_source("broken", src, language).unwrap();
    assert!(r
        .functions
        .iter()
        .any(|f| f.name.eq_ignore_ascii_case("good")));
}

#[test_case(Language::Go ; "go")]
#[test_case(Language::Rust ; "rust")]
#[test_case(Language::Python ; "python")]
fn empty_source_has_no_declarations(language: Language) {
    let r = analyze_source("empty", "", language).unwrap();
    assert!(r.functions.is_empty() && r.types.is_empty());
    assert_eq!(r.metrics.lines, 0);
    assert_eq!(r.average_function_complexity(), 0.0);
}
