use serde::{Deserialize, Serialize};

/// Named program entity extracted from source. Identity is the canonical
/// `"<filepath>:<name>:<row>"` string where `row` is the 0-based start row
/// of the declaring syntax node.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Symbol {
    pub id: String,
    pub name: String,
    pub kind: SymbolKind,
    pub filepath: String,
    pub location: Location,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub docstring: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<String>,
    pub exported: bool,
    pub language: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub git: Option<GitMetadata>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_rank: Option<f64>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
pub struct Position {
    /// 1-based line.
    pub line: i64,
    /// 0-based column.
    pub column: i64,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
pub struct Location {
    pub start: Position,
    pub end: Position,
}

impl Location {
    pub fn new(start_line: i64, start_col: i64, end_line: i64, end_col: i64) -> Self {
        Self {
            start: Position { line: start_line, column: start_col },
            end: Position { line: end_line, column: end_col },
        }
    }

    pub fn contains(&self, other: &Location) -> bool {
        let starts_before = self.start.line < other.start.line
            || (self.start.line == other.start.line && self.start.column <= other.start.column);
        let ends_after = self.end.line > other.end.line
            || (self.end.line == other.end.line && self.end.column >= other.end.column);
        starts_before && ends_after
    }

    pub fn line_span(&self) -> i64 {
        self.end.line - self.start.line
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum SymbolKind {
    Class,
    Interface,
    Type,
    Enum,
    Function,
    Method,
    Constructor,
    Variable,
    Constant,
    Property,
    Module,
    Namespace,
}

impl SymbolKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SymbolKind::Class => "class",
            SymbolKind::Interface => "interface",
            SymbolKind::Type => "type",
            SymbolKind::Enum => "enum",
            SymbolKind::Function => "function",
            SymbolKind::Method => "method",
            SymbolKind::Constructor => "constructor",
            SymbolKind::Variable => "variable",
            SymbolKind::Constant => "constant",
            SymbolKind::Property => "property",
            SymbolKind::Module => "module",
            SymbolKind::Namespace => "namespace",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Some(match value {
            "class" => SymbolKind::Class,
            "interface" => SymbolKind::Interface,
            "type" => SymbolKind::Type,
            "enum" => SymbolKind::Enum,
            "function" => SymbolKind::Function,
            "method" => SymbolKind::Method,
            "constructor" => SymbolKind::Constructor,
            "variable" => SymbolKind::Variable,
            "constant" => SymbolKind::Constant,
            "property" => SymbolKind::Property,
            "module" => SymbolKind::Module,
            "namespace" => SymbolKind::Namespace,
            _ => return None,
        })
    }
}

impl std::fmt::Display for SymbolKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum EdgeType {
    Imports,
    Extends,
    Implements,
    Calls,
    Uses,
    Instantiates,
}

impl EdgeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EdgeType::Imports => "imports",
            EdgeType::Extends => "extends",
            EdgeType::Implements => "implements",
            EdgeType::Calls => "calls",
            EdgeType::Uses => "uses",
            EdgeType::Instantiates => "instantiates",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Some(match value {
            "imports" => EdgeType::Imports,
            "extends" => EdgeType::Extends,
            "implements" => EdgeType::Implements,
            "calls" => EdgeType::Calls,
            "uses" => EdgeType::Uses,
            "instantiates" => EdgeType::Instantiates,
            _ => return None,
        })
    }

    /// Traversal priority for breadth-first expansion; lower expands first.
    pub fn priority(&self) -> u8 {
        match self {
            EdgeType::Imports => 0,
            EdgeType::Extends => 1,
            EdgeType::Implements => 2,
            EdgeType::Instantiates => 3,
            EdgeType::Calls => 4,
            EdgeType::Uses => 5,
        }
    }
}

impl std::fmt::Display for EdgeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Typed directed relation. For `imports` at extraction time `from` is a
/// filepath and `to` the raw specifier as written; for every other type both
/// ends are symbol IDs.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct DependencyEdge {
    pub from: String,
    pub to: String,
    #[serde(rename = "type")]
    pub edge_type: EdgeType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
}

impl DependencyEdge {
    pub fn new(from: impl Into<String>, to: impl Into<String>, edge_type: EdgeType) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            edge_type,
            location: None,
        }
    }

    pub fn dedup_key(&self) -> (String, String, EdgeType) {
        (self.from.clone(), self.to.clone(), self.edge_type)
    }
}

/// Change-detection record for one indexed file.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct FileTracking {
    pub mtime: i64,
    pub hash: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProjectStats {
    pub files: i64,
    pub symbols: i64,
    pub edges: i64,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ProjectMetadata {
    pub root: String,
    pub indexed_at: i64,
    pub stats: ProjectStats,
}

/// Per-file history facts mined from git; opaque to the indexing core.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct GitMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_commit_sha: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_commit_at: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub churn_count: Option<i64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub top_contributors: Vec<String>,
    /// `1 / (1 + churn)`, in `(0, 1]`.
    pub stability_score: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub freshness_days: Option<i64>,
    pub ownership_confidence: f64,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct IndexError {
    pub path: String,
    pub message: String,
}

#[derive(Debug, Serialize, Default)]
pub struct IndexStats {
    pub files_indexed: usize,
    pub symbols_found: usize,
    pub dependencies_found: usize,
    pub errors: Vec<IndexError>,
    pub duration_ms: u64,
}

/// Progress signal emitted after every extraction batch.
#[derive(Debug, Serialize, Clone)]
pub struct IndexProgress {
    pub files_processed: usize,
    pub total_files: usize,
    pub symbols_found: usize,
    pub dependencies_found: usize,
    pub errors: usize,
}

#[derive(Debug, Serialize, Clone)]
pub struct RankedSymbol {
    pub symbol: Symbol,
    pub rank: f64,
}

#[derive(Debug, Serialize, Clone)]
pub struct SymbolCompact {
    pub id: String,
    pub name: String,
    pub kind: SymbolKind,
    pub filepath: String,
    pub line: i64,
}

impl From<&Symbol> for SymbolCompact {
    fn from(s: &Symbol) -> Self {
        SymbolCompact {
            id: s.id.clone(),
            name: s.name.clone(),
            kind: s.kind,
            filepath: s.filepath.clone(),
            line: s.location.start.line,
        }
    }
}
