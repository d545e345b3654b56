use mutant_engine::Language;
use mutant_engine::error::ParseError;
use mutant_engine::syntax::{SyntaxTree, SyntaxTreeBuilder, Visibility};

fn parse(language: Language, source: &str) -> SyntaxTree {
    SyntaxTreeBuilder::new(language).build(source).unwrap()
}

#[test]
fn node_ids_are_preorder() {
    let tree = parse(Language::Python, "def f(a):\n    if a > 1:\n        return a\n    return 0\n");
    assert_eq!(tree.root().id(), 0);
    assert!(tree.root().parent().is_none());
    for node in tree.preorder().skip(1) {
        let parent = node.parent().unwrap();
        assert!(parent.id() < node.id(), "{node:?} listed before its parent");
        assert!(parent.children().any(|c| c.id() == node.id()));
    }
}

#[test]
fn ancestors_end_at_root() {
    let source = "def f(a):\n    return a > 1\n";
    let tree = parse(Language::Python, source);
    let cmp = tree.preorder().find(|n| n.kind() == "comparison_operator").unwrap();

    let chain: Vec<&str> = cmp.ancestors().map(|a| a.kind()).collect();
    assert_eq!(chain.first(), Some(&"return_statement"));
    assert_eq!(chain.last(), Some(&"module"));
    assert!(cmp.has_ancestor_kind(&["function_definition"]));
    assert!(!cmp.has_ancestor_kind(&["class_definition"]));
    assert_eq!(tree.ancestors(cmp.id()).last(), Some(0));
}

#[test]
fn node_positions_are_one_based() {
    let tree = parse(Language::Python, "x = 1\ny = 22\n");
    let literal = tree.preorder().find(|n| n.text() == "22").unwrap();
    assert_eq!(literal.kind(), "integer");
    assert_eq!(literal.line(), 2);
    assert_eq!(literal.column(), 5);
    assert_eq!(&tree.source()[literal.start_byte()..literal.end_byte()], "22");
}

#[test]
fn python_function_metadata() {
    let source = "\
class Account:
    def __init__(self, owner, balance=0):
        self.owner = owner

    def _audit(self):
        return True

    def deposit(self, amount):
        return amount
";
    let tree = parse(Language::Python, source);
    let functions = tree.functions();
    let names: Vec<&str> = functions.iter().map(|f| f.name.as_str()).collect();
    assert_eq!(names, vec!["__init__", "_audit", "deposit"]);

    assert!(functions[0].is_constructor);
    assert_eq!(functions[0].parameter_count, 3);
    assert_eq!(functions[0].visibility, Visibility::Public);

    assert!(!functions[1].is_constructor);
    assert_eq!(functions[1].visibility, Visibility::Private);
    assert_eq!(functions[2].parameter_count, 2);
    assert_eq!(functions[2].visibility, Visibility::Public);
}

#[test]
fn innermost_function_wins() {
    let source = "\
def outer(a):
    def inner(b):
        return b + 1
    return inner(a)
";
    let tree = parse(Language::Python, source);
    let plus = tree.preorder().find(|n| n.kind() == "binary_operator").unwrap();
    assert_eq!(plus.function().unwrap().name, "inner");

    let call = tree.preorder().find(|n| n.kind() == "call").unwrap();
    assert_eq!(call.function().unwrap().name, "outer");
}

#[test]
fn module_level_nodes_have_no_function() {
    let tree = parse(Language::Python, "LIMIT = 3 > 2\n");
    assert!(tree.preorder().all(|n| n.function().is_none()));
}

#[test]
fn rust_visibility_and_constructors() {
    let source = "\
pub fn open() {}
fn close() {}
pub(crate) fn reset() {}
struct S;
impl S {
    pub fn new() -> Self { S }
}
";
    let tree = parse(Language::Rust, source);
    let functions = tree.functions();
    let summary: Vec<(&str, Visibility, bool)> = functions
        .iter()
        .map(|f| (f.name.as_str(), f.visibility, f.is_constructor))
        .collect();
    assert_eq!(
        summary,
        vec![
            ("open", Visibility::Public, false),
            ("close", Visibility::Private, false),
            ("reset", Visibility::Protected, false),
            ("new", Visibility::Public, true),
        ]
    );
}

#[test]
fn rust_trait_bodies_are_inside_interface() {
    let source = "\
trait Check {
    fn ok(&self) -> bool { true }
}
fn plain() -> bool { false }
";
    let tree = parse(Language::Rust, source);
    let in_trait = tree.preorder().find(|n| n.text() == "true" && n.is_named()).unwrap();
    let outside = tree.preorder().find(|n| n.text() == "false" && n.is_named()).unwrap();
    assert!(in_trait.is_inside_interface());
    assert!(!outside.is_inside_interface());
}

#[test]
fn javascript_functions() {
    let source = "\
const add = (a, b) => a + b;
const twice = x => x * 2;
class Counter {
  constructor(start) { this.n = start; }
  #bump() { this.n += 1; }
}
";
    let tree = parse(Language::JavaScript, source);
    let summary: Vec<(&str, usize, Visibility, bool)> = tree
        .functions()
        .iter()
        .map(|f| (f.name.as_str(), f.parameter_count, f.visibility, f.is_constructor))
        .collect();
    assert_eq!(
        summary,
        vec![
            ("add", 2, Visibility::Public, false),
            ("twice", 1, Visibility::Public, false),
            ("constructor", 1, Visibility::Public, true),
            ("#bump", 0, Visibility::Private, false),
        ]
    );
}

#[test]
fn malformed_source_is_a_parse_error() {
    let err = SyntaxTreeBuilder::new(Language::Python)
        .build("def broken(:\n    return\n")
        .unwrap_err();
    assert!(matches!(err, ParseError::Syntax { line: 1, .. }), "{err:?}");
}

#[test]
fn empty_source_parses() {
    let tree = parse(Language::Rust, "");
    assert_eq!(tree.len(), 1);
    assert!(tree.functions().is_empty());
}
