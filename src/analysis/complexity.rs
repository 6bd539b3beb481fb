//! Cyclomatic and cognitive complexity over tree-sitter syntax trees.
//!
//! Cyclomatic: 1 + every decision point (conditional, loop, case arm,
//! exception handler, short-circuit operator). Cognitive: every nesting
//! construct costs `1 + depth` and deepens the nesting of its body; else
//! branches and short-circuit operators cost a flat 1.

use tree_sitter::Node;

use crate::types::Language;

/// Complexity of one function body.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FunctionComplexity {
    pub cyclomatic: u32,
    pub cognitive: u32,
}

// ---------------------------------------------------------------------------
// Node kind tables
// ---------------------------------------------------------------------------

struct Rules {
    /// Each occurrence is one decision point.
    decisions: &'static [&'static str],
    /// Costs `1 + depth` and nests its children.
    nesting: &'static [&'static str],
    /// Nests its children without a cost (closures, lambdas).
    nesting_only: &'static [&'static str],
    /// Flat cost of 1 (else branches).
    flat: &'static [&'static str],
    /// Node kind carrying `&&`/`||` (or `and`/`or`).
    logical: &'static str,
    /// Whether `logical` nodes must have a short-circuit operator child.
    logical_needs_operator: bool,
}

const GO: Rules = Rules {
    decisions: &[
        "if_statement",
        "for_statement",
        "expression_case",
        "type_case",
        "communication_case",
    ],
    nesting: &[
        "if_statement",
        "for_statement",
        "expression_switch_statement",
        "type_switch_statement",
        "select_statement",
    ],
    nesting_only: &["func_literal"],
    flat: &[],
    logical: "binary_expression",
    logical_needs_operator: true,
};

const RUST: Rules = Rules {
    decisions: &[
        "if_expression",
        "while_expression",
        "for_expression",
        "loop_expression",
        "match_arm",
        "try_expression",
    ],
    nesting: &[
        "if_expression",
        "while_expression",
        "for_expression",
        "loop_expression",
        "match_expression",
    ],
    nesting_only: &["closure_expression"],
    flat: &["else_clause"],
    logical: "binary_expression",
    logical_needs_operator: true,
};

const PYTHON: Rules = Rules {
    decisions: &[
        "if_statement",
        "elif_clause",
        "for_statement",
        "while_statement",
        "except_clause",
        "conditional_expression",
        "case_clause",
        "for_in_clause",
        "if_clause",
    ],
    nesting: &[
        "if_statement",
        "for_statement",
        "while_statement",
        "try_statement",
        "match_statement",
    ],
    nesting_only: &["lambda", "function_definition"],
    flat: &["elif_clause", "else_clause", "except_clause"],
    logical: "boolean_operator",
    logical_needs_operator: false,
};

fn rules_for(language: Language) -> &'static Rules {
    match language {
        Language::Go => &GO,
        Language::Rust => &RUST,
        Language::Python => &PYTHON,
    }
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Complexity of the function rooted at `node`.
pub fn function_complexity(node: Node<'_>, language: Language) -> FunctionComplexity {
    let rules = rules_for(language);
    FunctionComplexity {
        cyclomatic: 1 + count_decisions(node, rules),
        cognitive: cognitive(node, rules, 0),
    }
}

/// Cyclomatic complexity of a whole file: 1 + all decision points.
pub fn file_cyclomatic(root: Node<'_>, language: Language) -> u32 {
    1 + count_decisions(root, rules_for(language))
}

fn named_children(node: Node<'_>) -> Vec<Node<'_>> {
    let mut cursor = node.walk();
    node.named_children(&mut cursor).collect()
}

fn is_short_circuit(node: Node<'_>, rules: &Rules) -> bool {
    if node.kind() != rules.logical {
        return false;
    }
    if !rules.logical_needs_operator {
        return true;
    }
    node.child_by_field_name("operator")
        .is_some_and(|op| matches!(op.kind(), "&&" | "||"))
}

fn count_decisions(node: Node<'_>, rules: &Rules) -> u32 {
    let mut total = 0;
    let mut stack = vec![node];
    while let Some(current) = stack.pop() {
        if rules.decisions.contains(&current.kind()) || is_short_circuit(current, rules) {
            total += 1;
        }
        stack.extend(named_children(current));
    }
    total
}

/// `else if` chains cost a flat 1 rather than another nesting level.
fn is_else_if(parent: Node<'_>, child: Node<'_>) -> bool {
    parent.kind() == "else_clause"
        || (parent.kind() == child.kind()
            && parent
                .child_by_field_name("alternative")
                .is_some_and(|alt| alt.id() == child.id()))
}

fn cognitive(node: Node<'_>, rules: &Rules, depth: u32) -> u32 {
    let mut total = 0;
    for child in named_children(node) {
        let kind = child.kind();
        if rules.nesting.contains(&kind) {
            if is_else_if(node, child) {
                total += 1 + cognitive(child, rules, depth);
            } else {
                total += 1 + depth + cognitive(child, rules, depth + 1);
            }
        } else if rules.flat.contains(&kind) {
            total += 1 + cognitive(child, rules, depth);
        } else if rules.nesting_only.contains(&kind) {
            total += cognitive(child, rules, depth + 1);
        } else if is_short_circuit(child, rules) {
            total += 1 + cognitive(child, rules, depth);
        } else {
            total += cognitive(child, rules, depth);
        }
    }
    total
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
