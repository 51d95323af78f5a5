use symdex::indexer::extract::{LanguageParser, ParsedFile};
use symdex::indexer::java::JavaParser;
use symdex::model::{EdgeType, SymbolKind};

fn parse(source: &str) -> ParsedFile {
    let mut parser = JavaParser::new().unwrap();
    parser.parse_file(source)
}

#[test]
fn extract_java_declarations() {
    let source = r#"
package com.example.index;

import java.util.List;
import java.util.Map;

/** Writes records to the store. */
public class Writer extends Base implements Flushable, Closeable {
    public static final int BATCH = 100;
    private List<String> pending;

    public Writer(List<String> pending) {
        this.pending = pending;
    }

    public void flush() {
        int written = drain();
    }

    private int drain() {
        return 0;
    }
}

interface Flushable {
    void flush();
}

enum Level { DEBUG, INFO }
"#;
    let parsed = parse(source);
    let by_name = |name: &str| parsed.symbols.iter().find(|s| s.name == name).unwrap();

    assert_eq!(by_name("com.example.index").kind, SymbolKind::Namespace);
    assert_eq!(by_name("Writer").kind, SymbolKind::Class);
    assert_eq!(by_name("Flushable").kind, SymbolKind::Interface);
    assert_eq!(by_name("Level").kind, SymbolKind::Enum);

    // static field -> constant, instance field -> property.
    assert_eq!(by_name("BATCH").kind, SymbolKind::Constant);
    assert_eq!(by_name("pending").kind, SymbolKind::Property);

    // Enum constants hang off the enum.
    let debug = by_name("DEBUG");
    assert_eq!(debug.kind, SymbolKind::Constant);
    assert_eq!(debug.parent.as_deref(), Some("Level"));

    // Explicit public modifier governs visibility...
    assert!(by_name("Writer").exported);
    assert!(!by_name("drain").exported);
    // ...but interface members default to public with no modifier block.
    let interface_flush = parsed
        .symbols
        .iter()
        .filter(|s| s.name == "flush")
        .find(|s| s.parent.as_deref() == Some("Flushable"))
        .unwrap();
    assert!(interface_flush.exported);

    let constructor = parsed
        .symbols
        .iter()
        .find(|s| s.kind == SymbolKind::Constructor)
        .unwrap();
    assert_eq!(constructor.name, "Writer");

    assert_eq!(
        by_name("Writer").docstring.as_deref(),
        Some("Writes records to the store.")
    );
    let signature = by_name("Writer").signature.as_deref().unwrap();
    assert!(signature.contains("extends Base"));
    assert!(signature.contains("implements Flushable, Closeable"));

    let imports: Vec<&str> = parsed
        .edges
        .iter()
        .filter(|e| e.edge_type == EdgeType::Imports)
        .map(|e| e.to.as_str())
        .collect();
    assert!(imports.contains(&"java.util.List"));
    assert!(imports.contains(&"java.util.Map"));

    assert!(parsed
        .edges
        .iter()
        .any(|e| e.edge_type == EdgeType::Extends && e.to == "Base"));
    assert!(parsed
        .edges
        .iter()
        .any(|e| e.edge_type == EdgeType::Implements && e.to == "Closeable"));
    assert!(parsed
        .edges
        .iter()
        .any(|e| e.edge_type == EdgeType::Calls
            && e.from.as_deref() == Some("flush")
            && e.to == "drain"));
}

#[test]
fn local_variables_inside_methods() {
    let parsed = parse(
        "class A { void run() { int count = 1; String label = \"x\"; } }",
    );
    assert!(parsed
        .symbols
        .iter()
        .any(|s| s.name == "count" && s.kind == SymbolKind::Variable));
    assert!(parsed
        .symbols
        .iter()
        .any(|s| s.name == "label" && s.kind == SymbolKind::Variable));
}
