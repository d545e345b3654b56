use std::path::Path;

use mutant_engine::{Language, detect_language};

#[test]
fn detect_python() {
    assert_eq!(detect_language(Path::new("foo.py")), Some(Language::Python));
}

#[test]
fn detect_rust() {
    assert_eq!(detect_language(Path::new("src/lib.rs")), Some(Language::Rust));
}

#[test]
fn detect_javascript() {
    for name in ["foo.js", "foo.mjs", "foo.cjs"] {
        assert_eq!(detect_language(Path::new(name)), Some(Language::JavaScript), "{name}");
    }
}

#[test]
fn detect_typescript() {
    for name in ["foo.ts", "foo.mts", "foo.cts"] {
        assert_eq!(detect_language(Path::new(name)), Some(Language::TypeScript), "{name}");
    }
}

#[test]
fn detect_tsx_jsx() {
    assert_eq!(detect_language(Path::new("foo.tsx")), Some(Language::Tsx));
    assert_eq!(detect_language(Path::new("foo.jsx")), Some(Language::Tsx));
}

#[test]
fn detect_unknown_returns_none() {
    assert!(detect_language(Path::new("foo.go")).is_none());
    assert!(detect_language(Path::new("foo.java")).is_none());
    assert!(detect_language(Path::new("Makefile")).is_none());
}

#[test]
fn js_family() {
    assert!(Language::JavaScript.is_js_family());
    assert!(Language::Tsx.is_js_family());
    assert!(!Language::Python.is_js_family());
    assert!(!Language::Rust.is_js_family());
}
