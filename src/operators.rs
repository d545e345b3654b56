//! Mutation operators and the catalog that holds them.
//!
//! An operator declares the node kinds it looks at and proposes zero or more
//! replacements for a node. Operators hold no state; one instance is shared
//! by every traversal.

use serde::{Deserialize, Serialize};

use crate::Language;
use crate::syntax::{NodeId, NodeRef};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MutatorCategory {
    /// Alters a callable's external contract: visibility, parameter defaults.
    Signature,
    /// Alters only behavior inside a function body.
    Body,
}

/// Replace the full span of `target` with `text`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Replacement {
    pub target: NodeId,
    pub text: String,
}

impl Replacement {
    fn new(target: NodeRef<'_>, text: impl Into<String>) -> Self {
        Self { target: target.id(), text: text.into() }
    }
}

pub trait Mutator: Send + Sync {
    fn id(&self) -> &'static str;
    fn display_name(&self) -> &'static str;
    fn node_kinds(&self) -> &'static [&'static str];
    fn category(&self) -> MutatorCategory;
    /// Empty when the operator declines this node.
    fn transform(&self, node: NodeRef<'_>) -> Vec<Replacement>;

    fn applies_to(&self, kind: &str) -> bool {
        self.node_kinds().contains(&kind)
    }

    fn descriptor(&self) -> MutatorDescriptor {
        MutatorDescriptor {
            id: self.id().to_string(),
            display_name: self.display_name().to_string(),
            node_kinds: self.node_kinds().iter().map(|k| k.to_string()).collect(),
            category: self.category(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MutatorDescriptor {
    pub id: String,
    pub display_name: String,
    pub node_kinds: Vec<String>,
    pub category: MutatorCategory,
}

/// Ordered operator registry. Registration order is traversal order.
#[derive(Default)]
pub struct MutatorCatalog {
    mutators: Vec<Box<dyn Mutator>>,
}

impl MutatorCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn builtin() -> Self {
        let mut catalog = Self::new();
        catalog.register(ConditionalBoundary);
        catalog.register(ConditionalNegation);
        catalog.register(EqualityNegation);
        catalog.register(LogicalFlip);
        catalog.register(NegationRemoval);
        catalog.register(Arithmetic);
        catalog.register(BooleanFlip);
        catalog.register(ReturnValue);
        catalog.register(BlockRemoval);
        catalog.register(PublicVisibility);
        catalog.register(ProtectedVisibility);
        catalog.register(DefaultParameter);
        catalog
    }

    pub fn register(&mut self, mutator: impl Mutator + 'static) {
        self.mutators.push(Box::new(mutator));
    }

    pub fn len(&self) -> usize {
        self.mutators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mutators.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &dyn Mutator> {
        self.mutators.iter().map(|m| m.as_ref())
    }

    pub fn get(&self, name: &str) -> Option<&dyn Mutator> {
        self.iter().find(|m| name_matches(*m, &name.to_lowercase()))
    }

    /// Operators retained by `whitelist`, in registration order. Names are
    /// compared case-insensitively against id and display name; unknown
    /// names are ignored. An empty whitelist keeps everything.
    pub fn active_operators(&self, whitelist: &[String]) -> Vec<&dyn Mutator> {
        if whitelist.is_empty() {
            return self.iter().collect();
        }
        let wanted: Vec<String> = whitelist.iter().map(|w| w.trim().to_lowercase()).collect();
        self.iter()
            .filter(|m| wanted.iter().any(|w| name_matches(*m, w)))
            .collect()
    }

    pub fn descriptors(&self) -> Vec<MutatorDescriptor> {
        self.iter().map(|m| m.descriptor()).collect()
    }
}

fn name_matches(mutator: &dyn Mutator, lowered: &str) -> bool {
    mutator.id().to_lowercase() == lowered || mutator.display_name().to_lowercase() == lowered
}

/// Anonymous children, i.e. punctuation and operator tokens.
fn tokens<'t>(node: NodeRef<'t>) -> impl Iterator<Item = NodeRef<'t>> + 't {
    node.children().filter(|c| !c.is_named())
}

fn swap_tokens(node: NodeRef<'_>, table: fn(&str) -> Option<&'static str>) -> Vec<Replacement> {
    tokens(node)
        .filter_map(|tok| table(tok.text()).map(|r| Replacement::new(tok, r)))
        .collect()
}

const COMPARISON_KINDS: &[&str] = &["comparison_operator", "binary_expression"];

pub struct ConditionalBoundary;

impl Mutator for ConditionalBoundary {
    fn id(&self) -> &'static str {
        "boundary"
    }
    fn display_name(&self) -> &'static str {
        "ConditionalBoundary"
    }
    fn node_kinds(&self) -> &'static [&'static str] {
        COMPARISON_KINDS
    }
    fn category(&self) -> MutatorCategory {
        MutatorCategory::Body
    }
    fn transform(&self, node: NodeRef<'_>) -> Vec<Replacement> {
        swap_tokens(node, |op| match op {
            ">" => Some(">="),
            ">=" => Some(">"),
            "<" => Some("<="),
            "<=" => Some("<"),
            _ => None,
        })
    }
}

pub struct ConditionalNegation;

impl Mutator for ConditionalNegation {
    fn id(&self) -> &'static str {
        "negate_cmp"
    }
    fn display_name(&self) -> &'static str {
        "ConditionalNegation"
    }
    fn node_kinds(&self) -> &'static [&'static str] {
        COMPARISON_KINDS
    }
    fn category(&self) -> MutatorCategory {
        MutatorCategory::Body
    }
    fn transform(&self, node: NodeRef<'_>) -> Vec<Replacement> {
        swap_tokens(node, |op| match op {
            ">" => Some("<="),
            ">=" => Some("<"),
            "<" => Some(">="),
            "<=" => Some(">"),
            _ => None,
        })
    }
}

pub struct EqualityNegation;

impl Mutator for EqualityNegation {
    fn id(&self) -> &'static str {
        "negate_eq"
    }
    fn display_name(&self) -> &'static str {
        "EqualityNegation"
    }
    fn node_kinds(&self) -> &'static [&'static str] {
        COMPARISON_KINDS
    }
    fn category(&self) -> MutatorCategory {
        MutatorCategory::Body
    }
    fn transform(&self, node: NodeRef<'_>) -> Vec<Replacement> {
        if node.language() == Language::Python {
            return swap_tokens(node, |op| match op {
                "==" => Some("!="),
                "!=" => Some("=="),
                "is" => Some("is not"),
                "is not" => Some("is"),
                "in" => Some("not in"),
                "not in" => Some("in"),
                _ => None,
            });
        }
        swap_tokens(node, |op| match op {
            "==" => Some("!="),
            "!=" => Some("=="),
            "===" => Some("!=="),
            "!==" => Some("==="),
            _ => None,
        })
    }
}

pub struct LogicalFlip;

impl Mutator for LogicalFlip {
    fn id(&self) -> &'static str {
        "logic_flip"
    }
    fn display_name(&self) -> &'static str {
        "LogicalFlip"
    }
    fn node_kinds(&self) -> &'static [&'static str] {
        &["boolean_operator", "binary_expression"]
    }
    fn category(&self) -> MutatorCategory {
        MutatorCategory::Body
    }
    fn transform(&self, node: NodeRef<'_>) -> Vec<Replacement> {
        swap_tokens(node, |op| match op {
            "and" => Some("or"),
            "or" => Some("and"),
            "&&" => Some("||"),
            "||" => Some("&&"),
            _ => None,
        })
    }
}

pub struct NegationRemoval;

impl Mutator for NegationRemoval {
    fn id(&self) -> &'static str {
        "negate_remove"
    }
    fn display_name(&self) -> &'static str {
        "NegationRemoval"
    }
    fn node_kinds(&self) -> &'static [&'static str] {
        &["not_operator", "unary_expression"]
    }
    fn category(&self) -> MutatorCategory {
        MutatorCategory::Body
    }
    fn transform(&self, node: NodeRef<'_>) -> Vec<Replacement> {
        let Some(op) = node.child(0) else {
            return vec![];
        };
        if op.kind() != "not" && op.kind() != "!" {
            return vec![];
        }
        match node.named_children().last() {
            Some(operand) => vec![Replacement::new(node, operand.text())],
            None => vec![],
        }
    }
}

const STRING_KINDS: &[&str] = &[
    "string",
    "concatenated_string",
    "template_string",
    "string_literal",
];

pub struct Arithmetic;

impl Mutator for Arithmetic {
    fn id(&self) -> &'static str {
        "arith"
    }
    fn display_name(&self) -> &'static str {
        "Arithmetic"
    }
    fn node_kinds(&self) -> &'static [&'static str] {
        &["binary_operator", "binary_expression"]
    }
    fn category(&self) -> MutatorCategory {
        MutatorCategory::Body
    }
    fn transform(&self, node: NodeRef<'_>) -> Vec<Replacement> {
        // String concatenation is not arithmetic.
        let left_is_string = node
            .named_children()
            .next()
            .is_some_and(|left| STRING_KINDS.contains(&left.kind()));

        tokens(node)
            .filter_map(|tok| {
                let replacement = match tok.text() {
                    "+" if left_is_string => return None,
                    "+" => "-",
                    "-" => "+",
                    "*" => "/",
                    "/" => "*",
                    "//" => "/",
                    "%" => "/",
                    "**" => "*",
                    _ => return None,
                };
                Some(Replacement::new(tok, replacement))
            })
            .collect()
    }
}

const RETURN_KINDS: &[&str] = &["return_statement", "return_expression"];

pub struct BooleanFlip;

impl Mutator for BooleanFlip {
    fn id(&self) -> &'static str {
        "bool_flip"
    }
    fn display_name(&self) -> &'static str {
        "BooleanFlip"
    }
    fn node_kinds(&self) -> &'static [&'static str] {
        &["true", "false", "boolean_literal"]
    }
    fn category(&self) -> MutatorCategory {
        MutatorCategory::Body
    }
    fn transform(&self, node: NodeRef<'_>) -> Vec<Replacement> {
        // Rust's boolean_literal wraps an anonymous `true` token.
        if !node.is_named() {
            return vec![];
        }
        // Returned literals belong to return_val.
        if node.parent().is_some_and(|p| RETURN_KINDS.contains(&p.kind())) {
            return vec![];
        }
        let flipped = match node.text() {
            "True" => "False",
            "False" => "True",
            "true" => "false",
            "false" => "true",
            _ => return vec![],
        };
        vec![Replacement::new(node, flipped)]
    }
}

pub struct ReturnValue;

impl ReturnValue {
    fn python(expr: &str) -> Option<&'static str> {
        Some(match expr {
            "None" => "return \"\"",
            "True" => "return False",
            "False" => "return True",
            "0" => "return 1",
            e if e.starts_with('"') || e.starts_with('\'') || e.starts_with("f\"") || e.starts_with("f'") => {
                "return \"\""
            }
            e if e.starts_with('[') => "return []",
            e if e.starts_with('{') => "return {}",
            e if e.parse::<f64>().is_ok() => "return 0",
            _ => "return None",
        })
    }

    fn rust(expr: &str) -> Option<&'static str> {
        Some(match expr {
            "true" => "return false",
            "false" => "return true",
            "None" | "()" | "Ok(())" => return None,
            "0" => "return 1",
            e if e.starts_with('"') => "return \"\".to_string()",
            e if e.starts_with("vec!") || e.starts_with("Vec::") => "return vec![]",
            _ => "return Default::default()",
        })
    }

    fn javascript(expr: &str) -> Option<&'static str> {
        Some(match expr {
            "true" => "return false;",
            "false" => "return true;",
            "null" | "undefined" => "return \"\";",
            "0" => "return 1;",
            "{}" => "return null;",
            e if e.starts_with('"') || e.starts_with('\'') || e.starts_with('`') => "return \"\";",
            e if e.starts_with('[') => "return [];",
            e if e.starts_with('{') => "return {};",
            e if e.parse::<f64>().is_ok() => "return 0;",
            _ => "return null;",
        })
    }
}

impl Mutator for ReturnValue {
    fn id(&self) -> &'static str {
        "return_val"
    }
    fn display_name(&self) -> &'static str {
        "ReturnValue"
    }
    fn node_kinds(&self) -> &'static [&'static str] {
        RETURN_KINDS
    }
    fn category(&self) -> MutatorCategory {
        MutatorCategory::Body
    }
    fn transform(&self, node: NodeRef<'_>) -> Vec<Replacement> {
        // A bare `return` has nothing to alter.
        let Some(expr) = node.named_children().next() else {
            return vec![];
        };
        let expr = expr.text().trim();
        let replacement = match node.language() {
            Language::Python => Self::python(expr),
            Language::Rust => Self::rust(expr),
            Language::JavaScript | Language::TypeScript | Language::Tsx => Self::javascript(expr),
        };
        match replacement {
            Some(text) if text.trim_end_matches(';') != node.text().trim_end_matches(';') => {
                vec![Replacement::new(node, text)]
            }
            _ => vec![],
        }
    }
}

pub struct BlockRemoval;

impl Mutator for BlockRemoval {
    fn id(&self) -> &'static str {
        "block_remove"
    }
    fn display_name(&self) -> &'static str {
        "BlockRemoval"
    }
    fn node_kinds(&self) -> &'static [&'static str] {
        &["if_statement", "if_expression"]
    }
    fn category(&self) -> MutatorCategory {
        MutatorCategory::Body
    }
    fn transform(&self, node: NodeRef<'_>) -> Vec<Replacement> {
        let (block_kind, empty) = match node.language() {
            Language::Python => ("block", "pass"),
            Language::Rust => ("block", "{}"),
            Language::JavaScript | Language::TypeScript | Language::Tsx => ("statement_block", "{}"),
        };

        let mut blocks = Vec::new();
        if let Some(consequence) = node.first_child_of_kind(&[block_kind]) {
            blocks.push(consequence);
        }
        // `else if` chains are separate if nodes and get their own visit.
        if let Some(alternative) = node.first_child_of_kind(&["else_clause"]) {
            if let Some(block) = alternative.first_child_of_kind(&[block_kind]) {
                blocks.push(block);
            }
        }

        blocks
            .into_iter()
            .filter(|b| b.text().trim() != empty)
            .map(|b| Replacement::new(b, empty))
            .collect()
    }
}

/// Signature operators leave constructors and interface members alone.
fn signature_target(node: NodeRef<'_>) -> bool {
    match node.function() {
        Some(f) => !f.is_constructor && !node.is_inside_interface(),
        None => false,
    }
}

const VISIBILITY_KINDS: &[&str] = &["visibility_modifier", "accessibility_modifier"];

pub struct PublicVisibility;

impl Mutator for PublicVisibility {
    fn id(&self) -> &'static str {
        "public_visibility"
    }
    fn display_name(&self) -> &'static str {
        "PublicVisibility"
    }
    fn node_kinds(&self) -> &'static [&'static str] {
        &["function_item", "method_definition"]
    }
    fn category(&self) -> MutatorCategory {
        MutatorCategory::Signature
    }
    fn transform(&self, node: NodeRef<'_>) -> Vec<Replacement> {
        if !signature_target(node) {
            return vec![];
        }
        let Some(modifier) = node.first_child_of_kind(VISIBILITY_KINDS) else {
            return vec![];
        };
        match modifier.text().trim() {
            "pub" => vec![Replacement::new(modifier, "pub(crate)")],
            "public" => vec![Replacement::new(modifier, "protected")],
            _ => vec![],
        }
    }
}

pub struct ProtectedVisibility;

impl Mutator for ProtectedVisibility {
    fn id(&self) -> &'static str {
        "protected_visibility"
    }
    fn display_name(&self) -> &'static str {
        "ProtectedVisibility"
    }
    fn node_kinds(&self) -> &'static [&'static str] {
        &["function_item", "method_definition"]
    }
    fn category(&self) -> MutatorCategory {
        MutatorCategory::Signature
    }
    fn transform(&self, node: NodeRef<'_>) -> Vec<Replacement> {
        if !signature_target(node) {
            return vec![];
        }
        let Some(modifier) = node.first_child_of_kind(VISIBILITY_KINDS) else {
            return vec![];
        };
        match modifier.text().trim() {
            "pub(crate)" | "pub(super)" => vec![Replacement::new(modifier, "")],
            "protected" => vec![Replacement::new(modifier, "private")],
            _ => vec![],
        }
    }
}

pub struct DefaultParameter;

impl Mutator for DefaultParameter {
    fn id(&self) -> &'static str {
        "default_param"
    }
    fn display_name(&self) -> &'static str {
        "DefaultParameterRemoval"
    }
    fn node_kinds(&self) -> &'static [&'static str] {
        &[
            "default_parameter",
            "typed_default_parameter",
            "assignment_pattern",
            "required_parameter",
        ]
    }
    fn category(&self) -> MutatorCategory {
        MutatorCategory::Signature
    }
    fn transform(&self, node: NodeRef<'_>) -> Vec<Replacement> {
        if !signature_target(node) {
            return vec![];
        }
        // Destructuring defaults are not part of the signature.
        let in_parameter_list = node
            .parent()
            .is_some_and(|p| matches!(p.kind(), "parameters" | "formal_parameters" | "lambda_parameters"));
        if !in_parameter_list {
            return vec![];
        }
        let Some(eq) = tokens(node).find(|t| t.kind() == "=") else {
            return vec![];
        };
        let source = node.tree().source();
        let without_default = source[node.start_byte()..eq.start_byte()].trim_end();
        vec![Replacement::new(node, without_default)]
    }
}
