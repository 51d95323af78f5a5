use symdex::indexer::extract::{LanguageParser, ParsedFile};
use symdex::indexer::python::PythonParser;
use symdex::model::{EdgeType, SymbolKind};

fn parse(source: &str) -> ParsedFile {
    let mut parser = PythonParser::new().unwrap();
    parser.parse_file(source)
}

#[test]
fn extract_classes_methods_functions() {
    let source = r#"
import os
from collections import defaultdict

MAX_RETRIES = 3
default_timeout = 30

class Repository(Base):
    """Stores indexed records."""

    def __init__(self, path):
        self.path = path
        self.cache = {}

    def load(self):
        return read(self.path)

def read(path):
    """Reads one file."""
    return open(path)
"#;
    let parsed = parse(source);
    let by_name = |name: &str| parsed.symbols.iter().find(|s| s.name == name).unwrap();

    assert_eq!(by_name("Repository").kind, SymbolKind::Class);
    assert_eq!(by_name("__init__").kind, SymbolKind::Constructor);
    assert_eq!(by_name("load").kind, SymbolKind::Method);
    assert_eq!(by_name("read").kind, SymbolKind::Function);
    assert_eq!(by_name("MAX_RETRIES").kind, SymbolKind::Constant);
    assert_eq!(by_name("default_timeout").kind, SymbolKind::Variable);

    // self.* assignments become members of the enclosing class.
    let path_attr = by_name("path");
    assert_eq!(path_attr.parent.as_deref(), Some("Repository"));

    // Top-level definitions are exported; members are not.
    assert!(by_name("Repository").exported);
    assert!(by_name("read").exported);
    assert!(!by_name("load").exported);

    assert_eq!(
        by_name("Repository").docstring.as_deref(),
        Some("Stores indexed records.")
    );
    assert_eq!(by_name("read").docstring.as_deref(), Some("Reads one file."));

    let imports: Vec<&str> = parsed
        .edges
        .iter()
        .filter(|e| e.edge_type == EdgeType::Imports)
        .map(|e| e.to.as_str())
        .collect();
    assert!(imports.contains(&"os"));
    assert!(imports.contains(&"collections"));

    assert!(parsed
        .edges
        .iter()
        .any(|e| e.edge_type == EdgeType::Extends && e.to == "Base"));
    assert!(parsed
        .edges
        .iter()
        .any(|e| e.edge_type == EdgeType::Calls
            && e.from.as_deref() == Some("load")
            && e.to == "read"));
}

#[test]
fn decorated_definitions_descend() {
    let source = "@register\ndef task():\n    pass\n";
    let parsed = parse(source);
    assert!(parsed.symbols.iter().any(|s| s.name == "task"));
}

#[test]
fn nested_functions_are_not_methods() {
    let source = "def outer():\n    def inner():\n        pass\n";
    let parsed = parse(source);
    let inner = parsed.symbols.iter().find(|s| s.name == "inner").unwrap();
    assert_eq!(inner.kind, SymbolKind::Function);
    assert!(!inner.exported);
}

#[test]
fn malformed_source_yields_partial_output() {
    let parsed = parse("def broken(:\n    ???\n\ndef ok():\n    pass\n");
    assert!(parsed.symbols.iter().any(|s| s.name == "ok"));
}
