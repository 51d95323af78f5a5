use symdex::indexer::extract::{LanguageParser, ParsedFile};
use symdex::indexer::rust::RustParser;
use symdex::model::{EdgeType, SymbolKind};

fn parse(source: &str) -> ParsedFile {
    let mut parser = RustParser::new().unwrap();
    parser.parse_file(source)
}

#[test]
fn extract_rust_items() {
    let source = r#"
mod inner {
    pub fn helper() {}
}

/// One indexed record.
pub struct Record {
    pub id: u64,
    name: String,
}

pub enum State { Idle, Busy }

pub trait Storage {
    fn put(&mut self, record: Record);
}

impl Storage for Record {
    fn put(&mut self, record: Record) {
        validate(record);
    }
}

impl Record {
    pub fn reset(&mut self) {
        let fresh = String::new();
        self.name = fresh;
    }
}

fn validate(record: Record) {}

pub const LIMIT: usize = 8;
pub static NAME: &str = "symdex";
pub type Id = u64;

use std::collections::HashMap;
"#;
    let parsed = parse(source);
    let by_name = |name: &str| parsed.symbols.iter().find(|s| s.name == name).unwrap();

    assert_eq!(by_name("inner").kind, SymbolKind::Module);
    assert_eq!(by_name("Record").kind, SymbolKind::Class);
    assert_eq!(by_name("State").kind, SymbolKind::Enum);
    assert_eq!(by_name("Storage").kind, SymbolKind::Interface);
    assert_eq!(by_name("validate").kind, SymbolKind::Function);
    assert_eq!(by_name("LIMIT").kind, SymbolKind::Constant);
    assert_eq!(by_name("NAME").kind, SymbolKind::Constant);
    assert_eq!(by_name("Id").kind, SymbolKind::Type);

    // Enum variants are recorded as constants under the enum.
    let idle = by_name("Idle");
    assert_eq!(idle.kind, SymbolKind::Constant);
    assert_eq!(idle.parent.as_deref(), Some("State"));

    // Struct fields become properties; visibility follows `pub`.
    assert_eq!(by_name("id").kind, SymbolKind::Property);
    assert!(by_name("id").exported);
    assert!(!by_name("name").exported);

    // fns inside an impl block belong to the impl type.
    let reset = by_name("reset");
    assert_eq!(reset.kind, SymbolKind::Method);
    assert_eq!(reset.parent.as_deref(), Some("Record"));

    // Local let bindings with identifier patterns.
    assert_eq!(by_name("fresh").kind, SymbolKind::Variable);

    assert!(by_name("Record").exported);
    assert!(!by_name("validate").exported);
    assert_eq!(
        by_name("Record").docstring.as_deref(),
        Some("One indexed record.")
    );

    let imports: Vec<&str> = parsed
        .edges
        .iter()
        .filter(|e| e.edge_type == EdgeType::Imports)
        .map(|e| e.to.as_str())
        .collect();
    assert!(imports.contains(&"std::collections::HashMap"));

    assert!(parsed
        .edges
        .iter()
        .any(|e| e.edge_type == EdgeType::Implements
            && e.from.as_deref() == Some("Record")
            && e.to == "Storage"));
    assert!(parsed
        .edges
        .iter()
        .any(|e| e.edge_type == EdgeType::Calls
            && e.from.as_deref() == Some("put")
            && e.to == "validate"));
}

#[test]
fn malformed_source_yields_partial_output() {
    let parsed = parse("pub fn ok() {}\nstruct {{{\n");
    assert!(parsed.symbols.iter().any(|s| s.name == "ok"));
}
