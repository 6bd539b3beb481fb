//! Per-language declaration extraction from tree-sitter syntax trees.
//!
//! Walks named children directly rather than compiling `.scm` queries; each
//! language has a small set of declaration kinds and the walk keeps the
//! owning type (receiver, impl target, class) in scope for methods.

use std::collections::BTreeSet;
use std::path::Path;

use tree_sitter::{Node, Tree};

use super::complexity::function_complexity;
use super::model::{
    DependencyEdge, EdgeKind, FieldInfo, FunctionInfo, ImportInfo, TypeInfo, TypeKind,
};
use crate::types::Language;

/// Everything extracted from one file, before metrics and hashing.
#[derive(Debug, Default)]
pub struct Extraction {
    pub package: String,
    pub imports: Vec<ImportInfo>,
    pub functions: Vec<FunctionInfo>,
    pub types: Vec<TypeInfo>,
    pub dependencies: Vec<DependencyEdge>,
}

pub fn extract(tree: &Tree, source: &str, language: Language, file_path: &str) -> Extraction {
    let mut walker = Walker {
        src: source.as_bytes(),
        language,
        out: Extraction::default(),
        edges: BTreeSet::new(),
    };
    let root = tree.root_node();
    match language {
        Language::Go => walker.go_file(root),
        Language::Rust => {
            walker.out.package = module_name(file_path, &["lib", "main"], "mod");
            walker.rust_items(root, None);
        }
        Language::Python => {
            walker.out.package = module_name(file_path, &[], "__init__");
            walker.python_block(root, None);
        }
    }
    walker.finish()
}

// ---------------------------------------------------------------------------
// Standard library detection
// ---------------------------------------------------------------------------

/// Python modules shipped with the interpreter (top-level names).
const PYTHON_STDLIB: &[&str] = &[
    "abc", "argparse", "array", "ast", "asyncio", "base64", "bisect", "builtins", "calendar",
    "collections", "concurrent", "configparser", "contextlib", "copy", "csv", "ctypes",
    "dataclasses", "datetime", "decimal", "difflib", "email", "enum", "errno", "fnmatch",
    "fractions", "functools", "gc", "getpass", "glob", "gzip", "hashlib", "heapq", "hmac",
    "html", "http", "importlib", "inspect", "io", "ipaddress", "itertools", "json", "logging",
    "math", "mimetypes", "multiprocessing", "operator", "os", "pathlib", "pickle", "platform",
    "pprint", "queue", "random", "re", "secrets", "select", "shlex", "shutil", "signal",
    "socket", "sqlite3", "ssl", "stat", "statistics", "string", "struct", "subprocess", "sys",
    "tempfile", "textwrap", "threading", "time", "timeit", "tokenize", "traceback", "types",
    "typing", "unicodedata", "unittest", "urllib", "uuid", "warnings", "weakref", "xml",
    "zipfile", "zlib",
];

pub fn is_std_import(language: Language, path: &str) -> bool {
    match language {
        // Third-party Go modules start with a domain: github.com/..., golang.org/x/...
        Language::Go => path
            .split('/')
            .next()
            .is_some_and(|first| !first.is_empty() && !first.contains('.')),
        Language::Rust => {
            let first = path.trim_start_matches("::").split("::").next().unwrap_or("");
            matches!(first, "std" | "core" | "alloc")
        }
        Language::Python => {
            let first = path.split('.').next().unwrap_or("");
            PYTHON_STDLIB.contains(&first)
        }
    }
}

/// Module name from the file path. `roots` stems map to `crate`; `index`
/// stems take their directory's name.
fn module_name(file_path: &str, roots: &[&str], index: &str) -> String {
    let path = Path::new(file_path);
    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("");
    if roots.contains(&stem) {
        return "crate".to_string();
    }
    if stem == index {
        if let Some(dir) = path
            .parent()
            .and_then(|p| p.file_name())
            .and_then(|n| n.to_str())
        {
            return dir.to_string();
        }
    }
    stem.to_string()
}

// ---------------------------------------------------------------------------
// Walker
// ---------------------------------------------------------------------------

struct Walker<'a> {
    src: &'a [u8],
    language: Language,
    out: Extraction,
    edges: BTreeSet<(String, String, EdgeKind)>,
}

fn named_children(node: Node<'_>) -> Vec<Node<'_>> {
    let mut cursor = node.walk();
    node.named_children(&mut cursor).collect()
}

fn start_line(node: Node<'_>) -> u32 {
    node.start_position().row as u32 + 1
}

fn end_line(node: Node<'_>) -> u32 {
    (node.end_position().row as u32 + 1).max(start_line(node))
}

/// `Foo<T>` / `*Foo` / `Foo[T]` -> `Foo`.
fn bare_type_name(text: &str) -> String {
    let trimmed = text.trim().trim_start_matches('*').trim_start_matches('&');
    let end = trimmed.find(['<', '[', '(']).unwrap_or(trimmed.len());
    trimmed[..end].trim().to_string()
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

impl<'a> Walker<'a> {
    fn text(&self, node: Node<'_>) -> &'a str {
        node.utf8_text(self.src).unwrap_or("")
    }

    fn field_text(&self, node: Node<'_>, field: &str) -> Option<&'a str> {
        node.child_by_field_name(field).map(|n| self.text(n))
    }

    fn edge(&mut self, from: impl Into<String>, to: impl Into<String>, kind: EdgeKind) {
        let (from, to) = (from.into(), to.into());
        if !from.is_empty() && !to.is_empty() && from != to {
            self.edges.insert((from, to, kind));
        }
    }

    fn import(&mut self, path: &str, alias: Option<String>, line: u32) {
        let path = path.trim_matches(|c| c == '"' || c == '`').to_string();
        if path.is_empty() {
            return;
        }
        let is_std = is_std_import(self.language, &path);
        let from = self.out.package.clone();
        self.edge(from, path.clone(), EdgeKind::Import);
        self.out.imports.push(ImportInfo {
            path,
            alias,
            is_std,
            line,
        });
    }

    /// Header text from the declaration start to its body.
    fn signature(&self, node: Node<'_>) -> String {
        let end = node
            .child_by_field_name("body")
            .map(|b| b.start_byte())
            .unwrap_or(node.end_byte());
        let header = std::str::from_utf8(&self.src[node.start_byte()..end]).unwrap_or("");
        collapse_whitespace(header)
            .trim_end_matches(['{', ':'])
            .trim_end()
            .to_string()
    }

    fn push_function(
        &mut self,
        node: Node<'_>,
        name: &str,
        receiver: Option<String>,
        exported: bool,
    ) {
        let complexity = function_complexity(node, self.language);
        let info = FunctionInfo {
            name: name.to_string(),
            is_method: receiver.is_some(),
            receiver,
            signature: self.signature(node),
            start_line: start_line(node),
            end_line: end_line(node),
            complexity: complexity.cyclomatic,
            cognitive: complexity.cognitive,
            exported,
        };
        let caller = info.qualified_name();
        if let Some(body) = node.child_by_field_name("body") {
            for callee in self.calls_in(body) {
                self.edge(caller.clone(), callee, EdgeKind::Call);
            }
        }
        self.out.functions.push(info);
    }

    /// Callee expressions of every call inside `body`.
    fn calls_in(&self, body: Node<'_>) -> BTreeSet<String> {
        let call_kind = match self.language {
            Language::Python => "call",
            Language::Go | Language::Rust => "call_expression",
        };
        let mut callees = BTreeSet::new();
        let mut stack = vec![body];
        while let Some(node) = stack.pop() {
            if node.kind() == call_kind {
                if let Some(func) = node.child_by_field_name("function") {
                    let callee = collapse_whitespace(self.text(func));
                    if !callee.is_empty() && callee.len() <= 120 {
                        callees.insert(callee);
                    }
                }
            }
            stack.extend(named_children(node));
        }
        callees
    }

    fn finish(mut self) -> Extraction {
        // Attach methods declared outside the type body (Go receivers, Rust impls).
        for func in &self.out.functions {
            let Some(recv) = &func.receiver else { continue };
            if let Some(ty) = self.out.types.iter_mut().find(|t| &t.name == recv) {
                if !ty.methods.contains(&func.name) {
                    ty.methods.push(func.name.clone());
                }
            }
        }
        self.out.dependencies = self
            .edges
            .into_iter()
            .map(|(from, to, kind)| DependencyEdge { from, to, kind })
            .collect();
        self.out
    }

    // -- Go ----------------------------------------------------------------

    fn go_file(&mut self, root: Node<'_>) {
        for child in named_children(root) {
            if child.kind() == "package_clause" {
                if let Some(id) = named_children(child).first() {
                    self.out.package = self.text(*id).to_string();
                }
            }
        }
        for child in named_children(root) {
            match child.kind() {
                "import_declaration" => self.go_imports(child),
                "function_declaration" => {
                    let name = self.field_text(child, "name").unwrap_or_default();
                    let exported = go_exported(name);
                    self.push_function(child, name, None, exported);
                }
                "method_declaration" => {
                    let name = self.field_text(child, "name").unwrap_or_default();
                    let receiver = child
                        .child_by_field_name("receiver")
                        .and_then(|r| self.go_receiver_type(r));
                    let exported = go_exported(name);
                    self.push_function(child, name, receiver, exported);
                }
                "type_declaration" => {
                    for spec in named_children(child) {
                        if matches!(spec.kind(), "type_spec" | "type_alias") {
                            self.go_type_spec(spec);
                        }
                    }
                }
                _ => {}
            }
        }
    }

    fn go_imports(&mut self, decl: Node<'_>) {
        let mut stack = vec![decl];
        while let Some(node) = stack.pop() {
            if node.kind() == "import_spec" {
                let path = self.field_text(node, "path").unwrap_or_default();
                let alias = self.field_text(node, "name").map(str::to_string);
                self.import(path, alias, start_line(node));
            } else {
                stack.extend(named_children(node).into_iter().rev());
            }
        }
    }

    fn go_receiver_type(&self, params: Node<'_>) -> Option<String> {
        let decl = named_children(params)
            .into_iter()
            .find(|n| n.kind() == "parameter_declaration")?;
        let ty = decl.child_by_field_name("type")?;
        Some(bare_type_name(self.text(ty)))
    }

    fn go_type_spec(&mut self, spec: Node<'_>) {
        let name = self.field_text(spec, "name").unwrap_or_default().to_string();
        let Some(ty) = spec.child_by_field_name("type") else {
            return;
        };
        let mut fields = Vec::new();
        let mut methods = Vec::new();
        let kind = match ty.kind() {
            "struct_type" => {
                for list in named_children(ty) {
                    for field in named_children(list) {
                        if field.kind() != "field_declaration" {
                            continue;
                        }
                        let type_name = self.field_text(field, "type").unwrap_or_default();
                        let mut cursor = field.walk();
                        let names: Vec<_> = field
                            .children_by_field_name("name", &mut cursor)
                            .map(|n| self.text(n).to_string())
                            .collect();
                        if names.is_empty() {
                            self.edge(name.clone(), bare_type_name(type_name), EdgeKind::Embed);
                            fields.push(FieldInfo {
                                name: bare_type_name(type_name),
                                type_name: type_name.to_string(),
                            });
                        }
                        for field_name in names {
                            fields.push(FieldInfo {
                                name: field_name,
                                type_name: type_name.to_string(),
                            });
                        }
                    }
                }
                TypeKind::Struct
            }
            "interface_type" => {
                for member in named_children(ty) {
                    match member.kind() {
                        "method_elem" | "method_spec" => {
                            if let Some(m) = self.field_text(member, "name") {
                                methods.push(m.to_string());
                            }
                        }
                        "type_elem" | "constraint_elem" | "interface_type_name" | "type_identifier"
                        | "qualified_type" => {
                            let embedded = bare_type_name(self.text(member));
                            self.edge(name.clone(), embedded, EdgeKind::Embed);
                        }
                        _ => {}
                    }
                }
                TypeKind::Interface
            }
            _ => TypeKind::Alias,
        };
        self.out.types.push(TypeInfo {
            exported: go_exported(&name),
            name,
            kind,
            fields,
            methods,
            start_line: start_line(spec),
            end_line: end_line(spec),
        });
    }

    // -- Rust --------------------------------------------------------------

    fn rust_items(&mut self, container: Node<'_>, owner: Option<&str>) {
        for item in named_children(container) {
            match item.kind() {
                "use_declaration" => self.rust_use(item),
                "function_item" => {
                    let name = self.field_text(item, "name").unwrap_or_default();
                    let exported = rust_public(item);
                    self.push_function(item, name, owner.map(str::to_string), exported);
                }
                "impl_item" => {
                    let target = self
                        .field_text(item, "type")
                        .map(bare_type_name)
                        .unwrap_or_default();
                    if let Some(t) = self.field_text(item, "trait") {
                        self.edge(target.clone(), bare_type_name(t), EdgeKind::Implements);
                    }
                    if let Some(body) = item.child_by_field_name("body") {
                        self.rust_items(body, Some(&target));
                    }
                }
                "struct_item" => self.rust_struct(item),
                "enum_item" => self.rust_enum(item),
                "trait_item" => self.rust_trait(item),
                "type_item" => {
                    let name = self.field_text(item, "name").unwrap_or_default();
                    self.push_type(item, name, TypeKind::Alias, Vec::new(), Vec::new(), rust_public(item));
                }
                "mod_item" => {
                    if let Some(body) = item.child_by_field_name("body") {
                        self.rust_items(body, None);
                    }
                }
                _ => {}
            }
        }
    }

    fn rust_use(&mut self, item: Node<'_>) {
        let Some(arg) = item.child_by_field_name("argument") else {
            return;
        };
        let line = start_line(item);
        if arg.kind() == "use_as_clause" {
            let path = self.field_text(arg, "path").unwrap_or_default();
            let alias = self.field_text(arg, "alias").map(str::to_string);
            self.import(path, alias, line);
        } else {
            let path = collapse_whitespace(self.text(arg));
            self.import(&path, None, line);
        }
    }

    fn rust_struct(&mut self, item: Node<'_>) {
        let name = self.field_text(item, "name").unwrap_or_default();
        let mut fields = Vec::new();
        if let Some(body) = item.child_by_field_name("body") {
            match body.kind() {
                "field_declaration_list" => {
                    for field in named_children(body) {
                        if field.kind() == "field_declaration" {
                            fields.push(FieldInfo {
                                name: self.field_text(field, "name").unwrap_or_default().to_string(),
                                type_name: self.field_text(field, "type").unwrap_or_default().to_string(),
                            });
                        }
                    }
                }
                "ordered_field_declaration_list" => {
                    let mut cursor = body.walk();
                    for (i, ty) in body.children_by_field_name("type", &mut cursor).enumerate() {
                        fields.push(FieldInfo {
                            name: i.to_string(),
                            type_name: self.text(ty).to_string(),
                        });
                    }
                }
                _ => {}
            }
        }
        self.push_type(item, name, TypeKind::Struct, fields, Vec::new(), rust_public(item));
    }

    fn rust_enum(&mut self, item: Node<'_>) {
        let name = self.field_text(item, "name").unwrap_or_default();
        let variants = item
            .child_by_field_name("body")
            .map(|body| {
                named_children(body)
                    .into_iter()
                    .filter(|v| v.kind() == "enum_variant")
                    .map(|v| FieldInfo {
                        name: self.field_text(v, "name").unwrap_or_default().to_string(),
                        type_name: String::new(),
                    })
                    .collect()
            })
            .unwrap_or_default();
        self.push_type(item, name, TypeKind::Enum, variants, Vec::new(), rust_public(item));
    }

    fn rust_trait(&mut self, item: Node<'_>) {
        let name = self.field_text(item, "name").unwrap_or_default();
        let mut methods = Vec::new();
        if let Some(body) = item.child_by_field_name("body") {
            for member in named_children(body) {
                match member.kind() {
                    "function_signature_item" => {
                        if let Some(m) = self.field_text(member, "name") {
                            methods.push(m.to_string());
                        }
                    }
                    "function_item" => {
                        let m = self.field_text(member, "name").unwrap_or_default();
                        methods.push(m.to_string());
                        self.push_function(member, m, Some(name.to_string()), rust_public(item));
                    }
                    _ => {}
                }
            }
        }
        self.push_type(item, name, TypeKind::Trait, Vec::new(), methods, rust_public(item));
    }

    fn push_type(
        &mut self,
        node: Node<'_>,
        name: &str,
        kind: TypeKind,
        fields: Vec<FieldInfo>,
        methods: Vec<String>,
        exported: bool,
    ) {
        self.out.types.push(TypeInfo {
            name: name.to_string(),
            kind,
            fields,
            methods,
            start_line: start_line(node),
            end_line: end_line(node),
            exported,
        });
    }

    // -- Python ------------------------------------------------------------

    fn python_block(&mut self, block: Node<'_>, class: Option<&str>) {
        for stmt in named_children(block) {
            self.python_statement(stmt, stmt, class);
        }
    }

    /// `outer` is the node whose range is reported (the decorator wrapper
    /// when present).
    fn python_statement(&mut self, stmt: Node<'_>, outer: Node<'_>, class: Option<&str>) {
        match stmt.kind() {
            "import_statement" => {
                for name in named_children(stmt) {
                    match name.kind() {
                        "dotted_name" => self.import(self.text(name), None, start_line(stmt)),
                        "aliased_import" => {
                            let path = self.field_text(name, "name").unwrap_or_default();
                            let alias = self.field_text(name, "alias").map(str::to_string);
                            self.import(path, alias, start_line(stmt));
                        }
                        _ => {}
                    }
                }
            }
            "import_from_statement" => {
                let module = self.field_text(stmt, "module_name").unwrap_or_default();
                self.import(module, None, start_line(stmt));
            }
            "decorated_definition" => {
                if let Some(def) = stmt.child_by_field_name("definition") {
                    self.python_statement(def, outer, class);
                }
            }
            "function_definition" => {
                let name = self.field_text(stmt, "name").unwrap_or_default();
                let exported = !name.starts_with('_') || is_dunder(name);
                self.push_function_at(stmt, outer, name, class.map(str::to_string), exported);
            }
            "class_definition" => self.python_class(stmt, outer),
            _ => {}
        }
    }

    /// Like `push_function`, but reports `outer`'s line range.
    fn push_function_at(
        &mut self,
        node: Node<'_>,
        outer: Node<'_>,
        name: &str,
        receiver: Option<String>,
        exported: bool,
    ) {
        self.push_function(node, name, receiver, exported);
        if let Some(last) = self.out.functions.last_mut() {
            last.start_line = start_line(outer);
            last.end_line = end_line(outer);
        }
    }

    fn python_class(&mut self, class: Node<'_>, outer: Node<'_>) {
        let name = self.field_text(class, "name").unwrap_or_default();
        if let Some(bases) = class.child_by_field_name("superclasses") {
            for base in named_children(bases) {
                if matches!(base.kind(), "identifier" | "attribute") {
                    self.edge(name, self.text(base), EdgeKind::Extends);
                }
            }
        }

        let mut fields = Vec::new();
        let mut methods = Vec::new();
        if let Some(body) = class.child_by_field_name("body") {
            for stmt in named_children(body) {
                let def = if stmt.kind() == "decorated_definition" {
                    stmt.child_by_field_name("definition")
                } else {
                    Some(stmt)
                };
                match def.map(|d| d.kind()) {
                    Some("function_definition") => {
                        if let Some(m) = def.and_then(|d| self.field_text(d, "name")) {
                            methods.push(m.to_string());
                        }
                    }
                    _ => {
                        if let Some(field) = self.python_class_field(stmt) {
                            fields.push(field);
                        }
                    }
                }
            }
        }
        self.push_type(outer, name, TypeKind::Class, fields, methods, !name.starts_with('_'));
        if let Some(body) = class.child_by_field_name("body") {
            self.python_block(body, Some(name));
        }
    }

    /// `x: int = 0` or `x = 0` at class level.
    fn python_class_field(&self, stmt: Node<'_>) -> Option<FieldInfo> {
        if stmt.kind() != "expression_statement" {
            return None;
        }
        let assign = named_children(stmt)
            .into_iter()
            .find(|n| n.kind() == "assignment")?;
        let left = assign.child_by_field_name("left")?;
        if left.kind() != "identifier" {
            return None;
        }
        Some(FieldInfo {
            name: self.text(left).to_string(),
            type_name: self.field_text(assign, "type").unwrap_or_default().to_string(),
        })
    }
}

fn go_exported(name: &str) -> bool {
    name.chars().next().is_some_and(char::is_uppercase)
}

fn rust_public(item: Node<'_>) -> bool {
    named_children(item)
        .iter()
        .any(|c| c.kind() == "visibility_modifier")
}

fn is_dunder(name: &str) -> bool {
    name.len() > 4 && name.starts_with("__") && name.ends_with("__")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::parser::CodeParser;
    use test_case::test_case;

    fn run(source: &str, language: Language, path: &str) -> Extraction {
        let tree = CodeParser::new().parse(source, language).unwrap();
        extract(&tree, source, language, path)
    }

    #[test_case(Language::Go, "fmt", true ; "go stdlib")]
    #[test_case(Language::Go, "net/http", true ; "go nested stdlib")]
    #[test_case(Language::Go, "github.com/pkg/errors", false ; "go third party")]
    #[test_case(Language::Rust, "std::collections::HashMap", true ; "rust std")]
    #[test_case(Language::Rust, "core::fmt", true ; "rust core")]
    #[test_case(Language::Rust, "serde::Serialize", false ; "rust crate")]
    #[test_case(Language::Rust, "crate::error::Result", false ; "rust local")]
    #[test_case(Language::Python, "os.path", true ; "python stdlib")]
    #[test_case(Language::Python, "requests", false ; "python third party")]
    fn std_detection(language: Language, path: &str, expected: bool) {
        assert_eq!(is_std_import(language, path), expected);
    }

    #[test_case("src/lib.rs", "crate" ; "lib root")]
    #[test_case("src/cache/mod.rs", "cache" ; "mod file")]
    #[test_case("src/cache/decision.rs", "decision" ; "leaf module")]
    fn rust_module_names(path: &str, expected: &str) {
        assert_eq!(module_name(path, &["lib", "main"], "mod"), expected);
    }

    #[test]
    fn go_package_imports_and_functions() {
        let src = r#"package service

import (
	"fmt"
	log "github.com/sirupsen/logrus"
)

func NewManager(name string) *Manager {
	fmt.Println(name)
	return &Manager{name: name}
}

func (m *Manager) Start() error {
	log.Info("start")
	return nil
}
"#;
        let x = run(src, Language::Go, "service.go");
        assert_eq!(x.package, "service");
        assert_eq!(x.imports.len(), 2);
        assert_eq!(x.imports[0].path, "fmt");
        assert!(x.imports[0].is_std);
        assert_eq!(x.imports[1].alias.as_deref(), Some("log"));
        assert!(!x.imports[1].is_std);

        let new = x.functions.iter().find(|f| f.name == "NewManager").unwrap();
        assert!(new.exported);
        assert!(!new.is_method);
        assert_eq!(new.signature, "func NewManager(name string) *Manager");
        assert_eq!(new.start_line, 8);
        assert_eq!(new.end_line, 11);

        let start = x.functions.iter().find(|f| f.name == "Start").unwrap();
        assert_eq!(start.receiver.as_deref(), Some("Manager"));
        assert!(start.is_method);

        assert!(x.dependencies.iter().any(|d| d.kind == EdgeKind::Call
            && d.from == "NewManager"
            && d.to == "fmt.Println"));
        assert!(x.dependencies.iter().any(|d| d.kind == EdgeKind::Import && d.to == "fmt"));
    }

    #[test]
    fn repeated_calls_collapse_into_one_edge() {
        let src = "package p\n\nfunc A() {\n\tB()\n\tB()\n\tC()\n}\n\nfunc B() {}\nfunc C() {}\n";
        let x = run(src, Language::Go, "p.go");
        let calls: Vec<_> = x
            .dependencies
            .iter()
            .filter(|d| d.kind == EdgeKind::Call)
            .map(|d| (d.from.as_str(), d.to.as_str()))
            .collect();
        assert_eq!(calls, vec![("A", "B"), ("A", "C")]);
        assert!(EdgeKind::Import < EdgeKind::Call);
    }

    #[test]
    fn go_struct_interface_and_embedding() {
        let src = r#"package store

type Base struct{}

type Store struct {
	Base
	name, path string
	size int
}

type Reader interface {
	Read(p []byte) (int, error)
}

func (s Store) Name() string { return s.name }
"#;
        let x = run(src, Language::Go, "store.go");
        let store = x.types.iter().find(|t| t.name == "Store").unwrap();
        assert_eq!(store.kind, TypeKind::Struct);
        let names: Vec<_> = store.fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["Base", "name", "path", "size"]);
        assert_eq!(store.methods, vec!["Name".to_string()]);
        assert!(x
            .dependencies
            .iter()
            .any(|d| d.kind == EdgeKind::Embed && d.from == "Store" && d.to == "Base"));

        let reader = x.types.iter().find(|t| t.name == "Reader").unwrap();
        assert_eq!(reader.kind, TypeKind::Interface);
        assert_eq!(reader.methods, vec!["Read".to_string()]);
    }

    #[test]
    fn rust_items_impls_and_traits() {
        let src = r#"use std::fmt;
use serde::Serialize as Ser;

pub struct Point {
    pub x: i32,
    y: i32,
}

pub enum Shape {
    Circle,
    Square,
}

pub trait Area {
    fn area(&self) -> f64;
}

impl Area for Point {
    fn area(&self) -> f64 {
        helper(self.x)
    }
}

fn helper(v: i32) -> f64 {
    v as f64
}
"#;
        let x = run(src, Language::Rust, "src/geometry.rs");
        assert_eq!(x.package, "geometry");
        assert_eq!(x.imports.len(), 2);
        assert!(x.imports[0].is_std);
        assert_eq!(x.imports[1].path, "serde::Serialize");
        assert_eq!(x.imports[1].alias.as_deref(), Some("Ser"));

        let point = x.types.iter().find(|t| t.name == "Point").unwrap();
        assert_eq!(point.fields.len(), 2);
        assert!(point.exported);
        assert_eq!(point.methods, vec!["area".to_string()]);

        let shape = x.types.iter().find(|t| t.name == "Shape").unwrap();
        assert_eq!(shape.kind, TypeKind::Enum);
        assert_eq!(shape.fields.len(), 2);

        let area = x.types.iter().find(|t| t.name == "Area").unwrap();
        assert_eq!(area.kind, TypeKind::Trait);
        assert_eq!(area.methods, vec!["area".to_string()]);

        let method = x
            .functions
            .iter()
            .find(|f| f.name == "area" && f.receiver.as_deref() == Some("Point"))
            .unwrap();
        assert!(method.is_method);
        let helper = x.functions.iter().find(|f| f.name == "helper").unwrap();
        assert!(!helper.exported);

        assert!(x.dependencies.iter().any(|d| d.kind == EdgeKind::Implements
            && d.from == "Point"
            && d.to == "Area"));
        assert!(x
            .dependencies
            .iter()
            .any(|d| d.kind == EdgeKind::Call && d.from == "Point.area" && d.to == "helper"));
    }

    #[test]
    fn python_classes_methods_and_bases() {
        let src = r#"import os
import numpy as np
from typing import Optional


class Base:
    pass


class UserValidator(Base):
    strict: bool = True

    def validate(self, user):
        if not user:
            return False
        return os.path.exists(user.home)

    @staticmethod
    def _helper():
        return None


def main():
    UserValidator().validate(None)
"#;
        let x = run(src, Language::Python, "app/validators.py");
        assert_eq!(x.package, "validators");
        assert_eq!(x.imports.len(), 3);
        assert_eq!(x.imports[1].alias.as_deref(), Some("np"));
        assert!(!x.imports[1].is_std);
        assert_eq!(x.imports[2].path, "typing");
        assert!(x.imports[2].is_std);

        let validator = x.types.iter().find(|t| t.name == "UserValidator").unwrap();
        assert_eq!(validator.kind, TypeKind::Class);
        assert_eq!(validator.methods, vec!["validate".to_string(), "_helper".to_string()]);
        assert_eq!(validator.fields[0].name, "strict");
        assert_eq!(validator.fields[0].type_name, "bool");

        let validate = x.functions.iter().find(|f| f.name == "validate").unwrap();
        assert_eq!(validate.receiver.as_deref(), Some("UserValidator"));
        assert_eq!(validate.complexity, 2);
        assert_eq!(validate.signature, "def validate(self, user)");

        let helper = x.functions.iter().find(|f| f.name == "_helper").unwrap();
        assert!(!helper.exported);
        // range starts at the decorator
        assert_eq!(helper.start_line, 18);

        assert!(x
            .dependencies
            .iter()
            .any(|d| d.kind == EdgeKind::Extends && d.from == "UserValidator" && d.to == "Base"));
    }

    #[test]
    fn bare_type_name_strips_pointers_and_generics() {
        assert_eq!(bare_type_name("*Manager"), "Manager");
        assert_eq!(bare_type_name("Cache<K, V>"), "Cache");
        assert_eq!(bare_type_name("List[T]"), "List");
    }
}
