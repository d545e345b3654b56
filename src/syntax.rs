//! Syntax tree construction.
//!
//! Source is parsed with tree-sitter and lowered once into an owned arena.
//! Node ids are assigned in pre-order, so iterating `0..len` visits every
//! parent before its children. Each node records its parent id and the
//! innermost function it belongs to; ancestry queries are index lookups.

use serde::{Deserialize, Serialize};
use tree_sitter::{Node, Parser};

use crate::Language;
use crate::error::ParseError;

pub type NodeId = usize;
pub type FunctionId = usize;

#[derive(Debug, Clone)]
pub struct SyntaxNode {
    pub kind: &'static str,
    pub named: bool,
    pub start_byte: usize,
    pub end_byte: usize,
    /// 1-based.
    pub line: usize,
    /// 1-based.
    pub column: usize,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    pub function: Option<FunctionId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Public,
    Protected,
    Private,
}

/// Signature metadata of a function or method.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionInfo {
    pub name: String,
    pub parameter_count: usize,
    pub visibility: Visibility,
    pub is_constructor: bool,
    pub node: NodeId,
}

#[derive(Debug)]
pub struct SyntaxTree {
    language: Language,
    source: String,
    nodes: Vec<SyntaxNode>,
    functions: Vec<FunctionInfo>,
}

pub struct SyntaxTreeBuilder {
    language: Language,
}

impl SyntaxTreeBuilder {
    pub fn new(language: Language) -> Self {
        Self { language }
    }

    pub fn build(&self, source: &str) -> Result<SyntaxTree, ParseError> {
        let mut parser = Parser::new();
        parser
            .set_language(&self.language.grammar())
            .map_err(|e| ParseError::Grammar(self.language.name(), e.to_string()))?;

        let tree = parser.parse(source, None).ok_or(ParseError::NoTree)?;
        let root = tree.root_node();
        if root.has_error() {
            let bad = first_error(root).unwrap_or(root);
            return Err(ParseError::Syntax {
                line: bad.start_position().row + 1,
                column: bad.start_position().column + 1,
            });
        }

        let mut out = SyntaxTree {
            language: self.language,
            source: source.to_string(),
            nodes: Vec::new(),
            functions: Vec::new(),
        };
        out.lower(root);
        Ok(out)
    }
}

fn first_error(node: Node) -> Option<Node> {
    if node.is_error() || node.is_missing() {
        return Some(node);
    }
    let count = node.child_count();
    for i in 0..count {
        if let Some(child) = node.child(i) {
            if child.has_error() || child.is_missing() {
                if let Some(found) = first_error(child) {
                    return Some(found);
                }
            }
        }
    }
    None
}

fn node_text<'a>(node: Node<'a>, source: &'a str) -> &'a str {
    &source[node.start_byte()..node.end_byte()]
}

impl SyntaxTree {
    /// Pre-order lowering with an explicit stack; children are pushed in
    /// reverse so they pop in source order.
    fn lower(&mut self, root: Node) {
        let mut stack: Vec<(Node, Option<NodeId>, Option<FunctionId>)> = vec![(root, None, None)];

        while let Some((node, parent, enclosing)) = stack.pop() {
            let id = self.nodes.len();
            let function = match self.function_info(node, id) {
                Some(info) => {
                    self.functions.push(info);
                    Some(self.functions.len() - 1)
                }
                None => enclosing,
            };

            self.nodes.push(SyntaxNode {
                kind: node.kind(),
                named: node.is_named(),
                start_byte: node.start_byte(),
                end_byte: node.end_byte(),
                line: node.start_position().row + 1,
                column: node.start_position().column + 1,
                parent,
                children: Vec::new(),
                function,
            });
            if let Some(p) = parent {
                self.nodes[p].children.push(id);
            }

            let count = node.child_count();
            for i in (0..count).rev() {
                if let Some(child) = node.child(i) {
                    stack.push((child, Some(id), function));
                }
            }
        }
    }

    fn function_info(&self, node: Node, id: NodeId) -> Option<FunctionInfo> {
        if !function_kinds(self.language).contains(&node.kind()) {
            return None;
        }
        let source = self.source.as_str();
        let name = function_name(node, source);
        let parameter_count = match node.child_by_field_name("parameters") {
            Some(params) => {
                let mut count = 0;
                for i in 0..params.named_child_count() {
                    if let Some(p) = params.named_child(i) {
                        if p.kind() != "comment" {
                            count += 1;
                        }
                    }
                }
                count
            }
            // Arrow functions with a single bare parameter.
            None => usize::from(node.child_by_field_name("parameter").is_some()),
        };
        let visibility = function_visibility(self.language, node, &name, source);
        let is_constructor = match self.language {
            Language::Python => name == "__init__",
            Language::Rust => name == "new" && inside_impl(node),
            _ => node.kind() == "method_definition" && name == "constructor",
        };

        Some(FunctionInfo {
            name,
            parameter_count,
            visibility,
            is_constructor,
            node: id,
        })
    }

    pub fn language(&self) -> Language {
        self.language
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn root(&self) -> NodeRef<'_> {
        NodeRef { tree: self, id: 0 }
    }

    pub fn node(&self, id: NodeId) -> NodeRef<'_> {
        NodeRef { tree: self, id }
    }

    pub fn raw(&self, id: NodeId) -> &SyntaxNode {
        &self.nodes[id]
    }

    pub fn functions(&self) -> &[FunctionInfo] {
        &self.functions
    }

    /// Every node, parents before children, siblings in source order.
    pub fn preorder(&self) -> impl Iterator<Item = NodeRef<'_>> {
        (0..self.nodes.len()).map(move |id| NodeRef { tree: self, id })
    }

    pub fn parent_of(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id].parent
    }

    /// Parent chain of `id`, nearest first. Bounded by the node count so a
    /// corrupt index can never loop.
    pub fn ancestors(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        let mut current = self.nodes[id].parent;
        let mut budget = self.nodes.len();
        std::iter::from_fn(move || {
            if budget == 0 {
                return None;
            }
            budget -= 1;
            let next = current?;
            current = self.nodes[next].parent;
            Some(next)
        })
    }
}

fn function_kinds(language: Language) -> &'static [&'static str] {
    match language {
        Language::Python => &["function_definition"],
        Language::Rust => &["function_item"],
        Language::JavaScript | Language::TypeScript | Language::Tsx => &[
            "function_declaration",
            "generator_function_declaration",
            "method_definition",
            "function_expression",
            "function",
            "arrow_function",
        ],
    }
}

/// Node kinds that declare a contract without a body of their own.
fn interface_kinds(language: Language) -> &'static [&'static str] {
    match language {
        Language::Rust => &["trait_item"],
        Language::TypeScript | Language::Tsx => &["interface_declaration"],
        _ => &[],
    }
}

fn function_name(node: Node, source: &str) -> String {
    if let Some(name) = node.child_by_field_name("name") {
        return node_text(name, source).to_string();
    }
    // `const f = () => ...`
    if let Some(parent) = node.parent() {
        if parent.kind() == "variable_declarator" {
            if let Some(name) = parent.child_by_field_name("name") {
                return node_text(name, source).to_string();
            }
        }
    }
    "<anonymous>".to_string()
}

fn function_visibility(language: Language, node: Node, name: &str, source: &str) -> Visibility {
    match language {
        Language::Rust => {
            let count = node.child_count();
            for i in 0..count {
                if let Some(child) = node.child(i) {
                    if child.kind() == "visibility_modifier" {
                        return if node_text(child, source).trim() == "pub" {
                            Visibility::Public
                        } else {
                            Visibility::Protected
                        };
                    }
                }
            }
            Visibility::Private
        }
        Language::Python => {
            if name.starts_with("__") && name.ends_with("__") {
                Visibility::Public
            } else if name.starts_with('_') {
                Visibility::Private
            } else {
                Visibility::Public
            }
        }
        Language::JavaScript | Language::TypeScript | Language::Tsx => {
            if name.starts_with('#') {
                return Visibility::Private;
            }
            let count = node.child_count();
            for i in 0..count {
                if let Some(child) = node.child(i) {
                    if child.kind() == "accessibility_modifier" {
                        return match node_text(child, source).trim() {
                            "private" => Visibility::Private,
                            "protected" => Visibility::Protected,
                            _ => Visibility::Public,
                        };
                    }
                }
            }
            Visibility::Public
        }
    }
}

fn inside_impl(node: Node) -> bool {
    let mut current = node.parent();
    while let Some(n) = current {
        match n.kind() {
            "impl_item" => return true,
            "function_item" | "trait_item" | "mod_item" => return false,
            _ => current = n.parent(),
        }
    }
    false
}

/// Borrowed view of one arena node.
#[derive(Clone, Copy)]
pub struct NodeRef<'t> {
    tree: &'t SyntaxTree,
    id: NodeId,
}

impl<'t> NodeRef<'t> {
    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn tree(&self) -> &'t SyntaxTree {
        self.tree
    }

    pub fn language(&self) -> Language {
        self.tree.language
    }

    fn raw(&self) -> &'t SyntaxNode {
        &self.tree.nodes[self.id]
    }

    pub fn kind(&self) -> &'static str {
        self.raw().kind
    }

    pub fn is_named(&self) -> bool {
        self.raw().named
    }

    pub fn start_byte(&self) -> usize {
        self.raw().start_byte
    }

    pub fn end_byte(&self) -> usize {
        self.raw().end_byte
    }

    pub fn line(&self) -> usize {
        self.raw().line
    }

    pub fn column(&self) -> usize {
        self.raw().column
    }

    pub fn text(&self) -> &'t str {
        let raw = self.raw();
        &self.tree.source[raw.start_byte..raw.end_byte]
    }

    pub fn parent(&self) -> Option<NodeRef<'t>> {
        self.raw().parent.map(|id| self.tree.node(id))
    }

    pub fn children(&self) -> impl Iterator<Item = NodeRef<'t>> + use<'t> {
        let tree = self.tree;
        self.raw().children.iter().map(move |&id| tree.node(id))
    }

    pub fn child(&self, index: usize) -> Option<NodeRef<'t>> {
        self.raw().children.get(index).map(|&id| self.tree.node(id))
    }

    pub fn child_count(&self) -> usize {
        self.raw().children.len()
    }

    pub fn named_children(&self) -> impl Iterator<Item = NodeRef<'t>> + use<'t> {
        self.children().filter(|c| c.is_named() && c.kind() != "comment")
    }

    pub fn first_child_of_kind(&self, kinds: &[&str]) -> Option<NodeRef<'t>> {
        self.children().find(|c| kinds.contains(&c.kind()))
    }

    /// Innermost enclosing function, the function node itself included.
    pub fn function(&self) -> Option<&'t FunctionInfo> {
        self.raw().function.map(|f| &self.tree.functions[f])
    }

    pub fn ancestors(&self) -> impl Iterator<Item = NodeRef<'t>> + use<'t> {
        let tree = self.tree;
        tree.ancestors(self.id).map(move |id| tree.node(id))
    }

    pub fn has_ancestor_kind(&self, kinds: &[&str]) -> bool {
        self.ancestors().any(|a| kinds.contains(&a.kind()))
    }

    pub fn is_inside_interface(&self) -> bool {
        self.has_ancestor_kind(interface_kinds(self.tree.language))
    }
}

impl std::fmt::Debug for NodeRef<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeRef")
            .field("id", &self.id)
            .field("kind", &self.kind())
            .field("line", &self.line())
            .finish()
    }
}
