//! Batch extraction: routes files to language walkers, canonicalises
//! symbol IDs, resolves name-based parent pointers to ID-based ones, and
//! deduplicates across the batch.

use crate::config::IndexerConfig;
use crate::indexer::{c, go, java, python, rust, typescript};
use crate::model::{
    DependencyEdge, EdgeType, IndexError, IndexProgress, Location, Symbol, SymbolKind,
};
use crate::util;
use anyhow::{Context, Result};
use rayon::prelude::*;
use std::collections::{HashMap, HashSet};
use std::path::Path;

/// Raw symbol as a walker emits it: no ID, no filepath, parent by name.
#[derive(Debug, Clone)]
pub struct SymbolInput {
    pub kind: SymbolKind,
    pub name: String,
    pub location: Location,
    pub signature: Option<String>,
    pub docstring: Option<String>,
    pub parent: Option<String>,
    pub exported: bool,
}

/// Raw edge as a walker emits it. `from: None` marks a file-level edge
/// (imports); otherwise `from` and `to` are bare names resolved later.
#[derive(Debug, Clone)]
pub struct EdgeInput {
    pub edge_type: EdgeType,
    pub from: Option<String>,
    pub to: String,
    pub location: Option<Location>,
}

#[derive(Debug, Default)]
pub struct ParsedFile {
    pub symbols: Vec<SymbolInput>,
    pub edges: Vec<EdgeInput>,
}

/// One concrete-syntax-tree walker. Implementations tolerate malformed
/// input: they emit what they can and never fail.
pub trait LanguageParser {
    fn parse_file(&mut self, source: &str) -> ParsedFile;
}

/// Extension routing table. Unknown extensions yield no language.
pub fn language_for_path(path: &str) -> Option<&'static str> {
    let ext = Path::new(path).extension()?.to_str()?;
    match ext {
        "ts" | "tsx" | "js" | "jsx" | "mjs" | "cjs" => Some("ts"),
        "py" => Some("python"),
        "go" => Some("go"),
        "rs" => Some("rust"),
        "java" => Some("java"),
        "c" | "h" => Some("c"),
        "cpp" | "cc" | "cxx" | "hpp" | "hxx" => Some("cpp"),
        _ => None,
    }
}

/// Known source extensions, used by the resolver when probing import
/// specifiers against candidate files.
pub const SOURCE_EXTENSIONS: &[&str] = &[
    "ts", "tsx", "js", "jsx", "mjs", "cjs", "py", "go", "rs", "java", "c", "h", "cpp", "cc",
    "cxx", "hpp", "hxx",
];

fn make_parser(path: &str, language: &str) -> Result<Box<dyn LanguageParser>> {
    let ext = Path::new(path)
        .extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or_default();
    Ok(match language {
        "ts" => Box::new(typescript::TypeScriptParser::for_extension(ext)?),
        "python" => Box::new(python::PythonParser::new()?),
        "go" => Box::new(go::GoParser::new()?),
        "rust" => Box::new(rust::RustParser::new()?),
        "java" => Box::new(java::JavaParser::new()?),
        "c" => Box::new(c::CParser::new(false)?),
        "cpp" => Box::new(c::CParser::new(true)?),
        _ => anyhow::bail!("no parser for language {language}"),
    })
}

pub type ProgressFn = dyn Fn(&IndexProgress) + Sync;

#[derive(Debug, Default)]
pub struct ExtractBatch {
    pub symbols: Vec<Symbol>,
    pub dependencies: Vec<DependencyEdge>,
    pub errors: Vec<IndexError>,
}

#[derive(Debug, Default)]
struct FileOutput {
    symbols: Vec<Symbol>,
    dependencies: Vec<DependencyEdge>,
    error: Option<IndexError>,
}

pub struct Extractor {
    batch_size: usize,
    pool: rayon::ThreadPool,
}

impl Extractor {
    pub fn new(config: &IndexerConfig) -> Result<Self> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.max_concurrency)
            .build()
            .context("build extraction thread pool")?;
        Ok(Self {
            batch_size: config.batch_size.max(1),
            pool,
        })
    }

    /// Processes files concurrently in submission-ordered batches and emits
    /// a progress signal after every batch.
    pub fn extract_batch(
        &self,
        files: &[super::scan::ScannedFile],
        progress: Option<&ProgressFn>,
    ) -> ExtractBatch {
        let total = files.len();
        let mut out = ExtractBatch::default();
        let mut seen_symbols: HashSet<String> = HashSet::new();
        let mut seen_edges: HashSet<(String, String, EdgeType)> = HashSet::new();
        let mut processed = 0usize;

        for chunk in files.chunks(self.batch_size) {
            let outputs: Vec<FileOutput> = self.pool.install(|| {
                chunk
                    .par_iter()
                    .map(|file| extract_one(&file.path, &file.abs_path))
                    .collect()
            });
            for output in outputs {
                if let Some(error) = output.error {
                    out.errors.push(error);
                }
                for symbol in output.symbols {
                    if seen_symbols.insert(symbol.id.clone()) {
                        out.symbols.push(symbol);
                    }
                }
                for edge in output.dependencies {
                    if seen_edges.insert(edge.dedup_key()) {
                        out.dependencies.push(edge);
                    }
                }
            }
            processed += chunk.len();
            if let Some(progress) = progress {
                progress(&IndexProgress {
                    files_processed: processed,
                    total_files: total,
                    symbols_found: out.symbols.len(),
                    dependencies_found: out.dependencies.len(),
                    errors: out.errors.len(),
                });
            }
        }
        out
    }

    /// Single-file variant used by the watcher.
    pub fn extract_file(&self, filepath: &str, abs_path: &Path) -> ExtractBatch {
        let output = extract_one(filepath, abs_path);
        ExtractBatch {
            symbols: output.symbols,
            dependencies: output.dependencies,
            errors: output.error.into_iter().collect(),
        }
    }
}

fn extract_one(filepath: &str, abs_path: &Path) -> FileOutput {
    let Some(language) = language_for_path(filepath) else {
        return FileOutput::default();
    };
    let source = match util::read_to_string(abs_path) {
        Ok(value) => value,
        Err(err) => {
            return FileOutput {
                error: Some(IndexError {
                    path: filepath.to_string(),
                    message: format!("parse failed: {err}"),
                }),
                ..Default::default()
            }
        }
    };
    let mut parser = match make_parser(filepath, language) {
        Ok(value) => value,
        Err(err) => {
            return FileOutput {
                error: Some(IndexError {
                    path: filepath.to_string(),
                    message: format!("parser init failed: {err}"),
                }),
                ..Default::default()
            }
        }
    };
    let parsed = parser.parse_file(&source);
    let (symbols, dependencies) = normalize_file(filepath, language, parsed);
    FileOutput {
        symbols,
        dependencies,
        error: None,
    }
}

/// Canonical ID: `<filepath>:<name>:<row>` with the 0-based start row.
pub fn symbol_id(filepath: &str, name: &str, start_line: i64) -> String {
    format!("{filepath}:{name}:{}", start_line - 1)
}

/// Two-pass normalisation of one file's walker output: assign IDs, then
/// resolve name-based parent pointers to the tightest enclosing candidate.
pub fn normalize_file(
    filepath: &str,
    language: &str,
    parsed: ParsedFile,
) -> (Vec<Symbol>, Vec<DependencyEdge>) {
    let mut symbols: Vec<Symbol> = parsed
        .symbols
        .iter()
        .map(|input| Symbol {
            id: symbol_id(filepath, &input.name, input.location.start.line),
            name: input.name.clone(),
            kind: input.kind,
            filepath: filepath.to_string(),
            location: input.location,
            signature: input.signature.clone(),
            docstring: input.docstring.clone(),
            parent: None,
            children: Vec::new(),
            exported: input.exported,
            language: language.to_string(),
            git: None,
            page_rank: None,
        })
        .collect();

    // Pass two: parent resolution by lexical containment.
    let spans: Vec<(String, String, Location)> = symbols
        .iter()
        .map(|s| (s.id.clone(), s.name.clone(), s.location))
        .collect();
    for (index, input) in parsed.symbols.iter().enumerate() {
        let Some(parent_name) = &input.parent else {
            continue;
        };
        let child_location = symbols[index].location;
        let child_id = symbols[index].id.clone();
        let mut best: Option<(usize, i64)> = None;
        for (j, (id, name, location)) in spans.iter().enumerate() {
            if j == index || name != parent_name || *id == child_id {
                continue;
            }
            if !location.contains(&child_location) {
                continue;
            }
            let span = location.line_span();
            if best.map(|(_, s)| span < s).unwrap_or(true) {
                best = Some((j, span));
            }
        }
        // Fall back to the first same-named symbol when containment fails
        // (one-line declarations share spans with their containers).
        let parent_index = best.map(|(j, _)| j).or_else(|| {
            spans
                .iter()
                .position(|(id, name, _)| name == parent_name && *id != child_id)
        });
        if let Some(parent_index) = parent_index {
            let parent_id = symbols[parent_index].id.clone();
            symbols[index].parent = Some(parent_id);
            let child = symbols[index].id.clone();
            symbols[parent_index].children.push(child);
        }
    }

    // Name lookup for edge endpoint rewriting, first declaration wins.
    let mut by_name: HashMap<&str, &str> = HashMap::new();
    for symbol in &symbols {
        by_name.entry(symbol.name.as_str()).or_insert(symbol.id.as_str());
    }

    let mut edges = Vec::new();
    for input in &parsed.edges {
        if input.edge_type == EdgeType::Imports {
            edges.push(DependencyEdge {
                from: filepath.to_string(),
                to: input.to.clone(),
                edge_type: EdgeType::Imports,
                location: input.location,
            });
            continue;
        }
        let from = match &input.from {
            Some(name) => by_name
                .get(name.as_str())
                .map(|id| id.to_string())
                .unwrap_or_else(|| format!("{filepath}:{name}:1")),
            None => continue,
        };
        let to = by_name
            .get(input.to.as_str())
            .map(|id| id.to_string())
            .unwrap_or_else(|| input.to.clone());
        if from == to {
            continue;
        }
        edges.push(DependencyEdge {
            from,
            to,
            edge_type: input.edge_type,
            location: input.location,
        });
    }

    (symbols, edges)
}
