use symdex::indexer::extract::{LanguageParser, ParsedFile};
use symdex::indexer::go::GoParser;
use symdex::model::{EdgeType, SymbolKind};

fn parse(source: &str) -> ParsedFile {
    let mut parser = GoParser::new().unwrap();
    parser.parse_file(source)
}

#[test]
fn extract_go_declarations() {
    let source = r#"
package store

import (
    "fmt"
    "strings"
)

import "os"

const MaxBatch = 500

var pool *Pool

// Pool holds open connections.
type Pool struct {
    size    int
    Timeout int
}

type Closer interface {
    Close() error
}

// Get returns one connection.
func (p *Pool) Get(name string) error {
    conn := connect(name)
    return fmt.Errorf("no conn %v", conn)
}

func connect(name string) string {
    trimmed := strings.TrimSpace(name)
    return trimmed
}
"#;
    let parsed = parse(source);
    let by_name = |name: &str| parsed.symbols.iter().find(|s| s.name == name).unwrap();

    assert_eq!(by_name("store").kind, SymbolKind::Module);
    assert_eq!(by_name("Pool").kind, SymbolKind::Class);
    assert_eq!(by_name("Closer").kind, SymbolKind::Interface);
    assert_eq!(by_name("MaxBatch").kind, SymbolKind::Constant);
    assert_eq!(by_name("pool").kind, SymbolKind::Variable);
    assert_eq!(by_name("Get").kind, SymbolKind::Method);
    assert_eq!(by_name("connect").kind, SymbolKind::Function);

    // Receiver type is the lexical parent of a method.
    assert_eq!(by_name("Get").parent.as_deref(), Some("Pool"));
    // Interface members belong to the interface.
    assert_eq!(by_name("Close").parent.as_deref(), Some("Closer"));
    // Struct fields become properties with Go visibility.
    assert_eq!(by_name("Timeout").kind, SymbolKind::Property);
    assert!(by_name("Timeout").exported);
    assert!(!by_name("size").exported);

    // Uppercase first letter marks exported.
    assert!(by_name("Pool").exported);
    assert!(!by_name("connect").exported);

    assert_eq!(
        by_name("Pool").docstring.as_deref(),
        Some("Pool holds open connections.")
    );

    // Short declarations inside bodies are locals.
    assert_eq!(by_name("trimmed").kind, SymbolKind::Variable);

    let imports: Vec<&str> = parsed
        .edges
        .iter()
        .filter(|e| e.edge_type == EdgeType::Imports)
        .map(|e| e.to.as_str())
        .collect();
    assert!(imports.contains(&"fmt"));
    assert!(imports.contains(&"strings"));
    assert!(imports.contains(&"os"));

    assert!(parsed
        .edges
        .iter()
        .any(|e| e.edge_type == EdgeType::Calls
            && e.from.as_deref() == Some("Get")
            && e.to == "connect"));
}

#[test]
fn parse_is_deterministic() {
    let source = "package a\n\nfunc F() { G() }\nfunc G() {}\n";
    let first = parse(source);
    let second = parse(source);
    assert_eq!(first.symbols.len(), second.symbols.len());
    assert_eq!(first.edges.len(), second.edges.len());
}
