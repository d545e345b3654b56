use std::collections::{HashMap, HashSet};

use camino::Utf8Path;

use crate::Language;
use crate::coverage::CoverageIndex;
use crate::mutants::Mutation;
use crate::operators::{Mutator, MutatorCategory};
use crate::syntax::{NodeRef, SyntaxTree};

/// Walks one syntax tree and turns operator proposals into mutations.
pub struct MutationCollector<'a> {
    operators: &'a [&'a dyn Mutator],
    coverage: &'a CoverageIndex,
    only_covered: bool,
}

impl<'a> MutationCollector<'a> {
    pub fn new(operators: &'a [&'a dyn Mutator], coverage: &'a CoverageIndex, only_covered: bool) -> Self {
        Self {
            operators,
            coverage,
            only_covered,
        }
    }

    /// Depth-first, parents before children, operators in registration
    /// order. The output for a given tree, operator set and coverage index
    /// is always the same sequence.
    pub fn collect(&self, file_path: &Utf8Path, tree: &SyntaxTree) -> Vec<Mutation> {
        let mut mutations = Vec::new();
        let mut ordinals: HashMap<(usize, &'static str), usize> = HashMap::new();
        let mut seen: HashSet<(usize, usize, String)> = HashSet::new();

        let mut stack = vec![tree.root()];
        while let Some(node) = stack.pop() {
            if is_noise(node) {
                continue;
            }

            for op in self.operators {
                if !op.applies_to(node.kind()) {
                    continue;
                }
                if op.category() == MutatorCategory::Body && node.function().is_none() {
                    continue;
                }

                for replacement in op.transform(node) {
                    let target = tree.node(replacement.target);
                    let original = target.text();
                    if replacement.text == original {
                        continue;
                    }
                    if !seen.insert((target.start_byte(), target.end_byte(), replacement.text.clone())) {
                        continue;
                    }

                    let line = target.line();
                    let covering_tests = self.coverage.tests_for(file_path, line);
                    let is_covered = !covering_tests.is_empty();
                    if self.only_covered && !is_covered {
                        continue;
                    }

                    let ordinal = ordinals.entry((line, op.id())).or_insert(0);
                    mutations.push(Mutation {
                        file_path: file_path.to_path_buf(),
                        line,
                        column: target.column(),
                        start_byte: target.start_byte(),
                        end_byte: target.end_byte(),
                        mutator: op.id().to_string(),
                        category: op.category(),
                        ordinal: *ordinal,
                        original: original.to_string(),
                        replacement: replacement.text,
                        is_covered,
                        covering_tests,
                    });
                    *ordinal += 1;
                }
            }

            let children: Vec<NodeRef<'_>> = node.children().collect();
            stack.extend(children.into_iter().rev());
        }

        mutations
    }
}

const RUST_NOISE_MACROS: &[&str] = &[
    "println", "eprintln", "print", "eprint", "format", "log", "debug", "info", "warn", "error", "trace",
];

/// Subtrees that are not business logic: print and logging calls,
/// docstrings, inline test modules.
fn is_noise(node: NodeRef<'_>) -> bool {
    match (node.language(), node.kind()) {
        (Language::Python, "call") => node.child(0).is_some_and(|func| {
            let text = func.text();
            text == "print" || text.starts_with("logging.") || text.starts_with("log.")
        }),
        (Language::Rust, "macro_invocation") => node.child(0).is_some_and(|mac| {
            // `tracing::info` and `info` alike
            let name = mac.text().rsplit("::").next().unwrap_or_default();
            RUST_NOISE_MACROS.contains(&name)
        }),
        (Language::Rust, "mod_item") => node
            .children()
            .any(|c| c.kind() == "identifier" && c.text() == "tests"),
        (lang, "call_expression") if lang.is_js_family() => {
            node.child(0).is_some_and(|func| func.text().starts_with("console."))
        }
        (_, "expression_statement") => {
            node.child_count() == 1 && node.child(0).is_some_and(|c| c.kind() == "string")
        }
        _ => false,
    }
}
