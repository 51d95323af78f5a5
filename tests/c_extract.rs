use symdex::indexer::c::CParser;
use symdex::indexer::extract::{LanguageParser, ParsedFile};
use symdex::model::{EdgeType, SymbolKind};

fn parse_c(source: &str) -> ParsedFile {
    let mut parser = CParser::new(false).unwrap();
    parser.parse_file(source)
}

fn parse_cpp(source: &str) -> ParsedFile {
    let mut parser = CParser::new(true).unwrap();
    parser.parse_file(source)
}

#[test]
fn extract_c_declarations() {
    let source = r#"
#include <stdio.h>
#include "buffer.h"

#define MAX_LEN 256

struct buffer {
    char *data;
    int len;
};

enum mode { READ, WRITE };

int fill(struct buffer *buf);

/* Drains the buffer. */
int drain(struct buffer *buf) {
    return flush_all(buf);
}
"#;
    let parsed = parse_c(source);
    let by_name = |name: &str| parsed.symbols.iter().find(|s| s.name == name).unwrap();

    assert_eq!(by_name("MAX_LEN").kind, SymbolKind::Constant);
    assert_eq!(by_name("buffer").kind, SymbolKind::Interface);
    assert_eq!(by_name("mode").kind, SymbolKind::Enum);
    assert_eq!(by_name("READ").kind, SymbolKind::Constant);
    assert_eq!(by_name("drain").kind, SymbolKind::Function);
    // Prototype-only declarations still register.
    assert_eq!(by_name("fill").kind, SymbolKind::Function);
    // Struct members become properties of the record.
    assert_eq!(by_name("data").kind, SymbolKind::Property);
    assert_eq!(by_name("data").parent.as_deref(), Some("buffer"));

    assert_eq!(by_name("drain").docstring.as_deref(), Some("Drains the buffer."));

    let includes: Vec<&str> = parsed
        .edges
        .iter()
        .filter(|e| e.edge_type == EdgeType::Imports)
        .map(|e| e.to.as_str())
        .collect();
    assert!(includes.contains(&"stdio.h"));
    assert!(includes.contains(&"buffer.h"));

    assert!(parsed
        .edges
        .iter()
        .any(|e| e.edge_type == EdgeType::Calls
            && e.from.as_deref() == Some("drain")
            && e.to == "flush_all"));
}

#[test]
fn extract_cpp_classes_and_namespaces() {
    let source = r#"
namespace index {

class Store : public Backend {
    int capacity;

    int size();
};

int Store::size() {
    return capacity;
}

}
"#;
    let parsed = parse_cpp(source);
    let by_name = |name: &str| parsed.symbols.iter().find(|s| s.name == name).unwrap();

    assert_eq!(by_name("index").kind, SymbolKind::Namespace);
    assert_eq!(by_name("Store").kind, SymbolKind::Class);
    assert_eq!(by_name("Store").parent.as_deref(), Some("index"));
    assert_eq!(by_name("capacity").kind, SymbolKind::Property);

    // Method prototypes inside the class body register as methods.
    assert!(parsed
        .symbols
        .iter()
        .any(|s| s.name == "size" && s.kind == SymbolKind::Method));

    assert!(parsed
        .edges
        .iter()
        .any(|e| e.edge_type == EdgeType::Extends
            && e.from.as_deref() == Some("Store")
            && e.to == "Backend"));
}

#[test]
fn malformed_source_yields_partial_output() {
    let parsed = parse_c("#define OK 1\nstruct {{{{\n");
    assert!(parsed.symbols.iter().any(|s| s.name == "OK"));
}
