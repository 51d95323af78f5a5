//! Dependency resolution: cross-file import edges, intra-file symbolic
//! edges recovered from signature text, and the transitive closure helpers
//! the query surface builds on.
//!
//! Textual matching is a deliberate, cheap approximation. Matching is
//! whole-word (token-set membership plus escaped word-boundary regexes) so
//! a name never matches inside a longer identifier.

use crate::indexer::extract::SOURCE_EXTENSIONS;
use crate::model::{DependencyEdge, EdgeType, Symbol};
use crate::store::Store;
use anyhow::Result;
use regex::Regex;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

/// Resolves a freshly extracted batch into the final edge set to persist.
///
/// Non-import edges whose target never resolves to a known symbol are
/// dropped quietly; unresolved imports are retained as file → specifier
/// edges. No edge with a fabricated symbol ID is ever produced.
pub fn resolve_batch(
    store: &Store,
    symbols: &[Symbol],
    edges: &[DependencyEdge],
) -> Result<Vec<DependencyEdge>> {
    let mut name_index: HashMap<&str, Vec<&Symbol>> = HashMap::new();
    let mut known_ids: HashSet<&str> = HashSet::new();
    let mut by_file: HashMap<&str, Vec<&Symbol>> = HashMap::new();
    for symbol in symbols {
        name_index.entry(symbol.name.as_str()).or_default().push(symbol);
        known_ids.insert(symbol.id.as_str());
        by_file.entry(symbol.filepath.as_str()).or_default().push(symbol);
    }

    let mut known_files: HashSet<String> = by_file.keys().map(|f| f.to_string()).collect();
    for file in store.indexed_files()? {
        known_files.insert(file);
    }

    let mut out: Vec<DependencyEdge> = Vec::new();
    let mut seen: HashSet<(String, String, EdgeType)> = HashSet::new();
    let mut push = |edge: DependencyEdge, out: &mut Vec<DependencyEdge>| {
        if edge.from != edge.to && seen.insert(edge.dedup_key()) {
            out.push(edge);
        }
    };

    for edge in edges {
        if edge.edge_type == EdgeType::Imports && !edge.from.contains(':') {
            // File-level import. The raw file → specifier edge is always
            // retained so a later incremental pass can re-resolve it after
            // the target file is reparsed.
            push(edge.clone(), &mut out);
            if let Some(resolved) = resolve_import_edges(store, edge, &by_file, &known_files)? {
                for symbol_edge in resolved {
                    push(symbol_edge, &mut out);
                }
            }
            continue;
        }
        // Both endpoints must resolve to existing symbols; the extractor
        // may have synthesised a `from` ID for an anonymous scope, and
        // such edges are dropped here rather than persisted dangling.
        let from_exists =
            known_ids.contains(edge.from.as_str()) || store.get_symbol(&edge.from)?.is_some();
        if !from_exists {
            continue;
        }
        // Bare-name targets (no ID separator) go through the name index.
        if edge.to.contains(':') {
            if known_ids.contains(edge.to.as_str())
                || store.get_symbol(&edge.to)?.is_some()
            {
                push(edge.clone(), &mut out);
            }
            continue;
        }
        let targets = lookup_name(store, &name_index, &edge.to)?;
        for target in targets {
            push(
                DependencyEdge {
                    from: edge.from.clone(),
                    to: target,
                    edge_type: edge.edge_type,
                    location: edge.location,
                },
                &mut out,
            );
        }
    }

    for edge in signature_edges(store, symbols, &name_index)? {
        push(edge, &mut out);
    }

    Ok(out)
}

/// Expands one raw import edge into symbol-level edges when the specifier
/// resolves to an indexed file. `None` means unresolved.
fn resolve_import_edges(
    store: &Store,
    edge: &DependencyEdge,
    by_file: &HashMap<&str, Vec<&Symbol>>,
    known_files: &HashSet<String>,
) -> Result<Option<Vec<DependencyEdge>>> {
    let Some(target_file) = resolve_specifier(&edge.from, &edge.to, known_files) else {
        return Ok(None);
    };
    let representative = match first_top_level(store, by_file, &edge.from)? {
        Some(symbol) => symbol,
        None => return Ok(None),
    };
    let targets = exported_top_level(store, by_file, &target_file)?;
    if targets.is_empty() {
        return Ok(None);
    }
    Ok(Some(
        targets
            .into_iter()
            .filter(|target| *target != representative)
            .map(|target| DependencyEdge {
                from: representative.clone(),
                to: target,
                edge_type: EdgeType::Imports,
                location: edge.location,
            })
            .collect(),
    ))
}

/// Module-specifier resolution: normalise relative specifiers against the
/// importing file, then probe the known source extensions and
/// `index.<ext>` inside a target directory.
pub fn resolve_specifier(
    importing_file: &str,
    specifier: &str,
    known_files: &HashSet<String>,
) -> Option<String> {
    let spec = specifier
        .split(|ch| ch == '?' || ch == '#')
        .next()
        .unwrap_or(specifier)
        .trim();
    if spec.is_empty() || spec.contains('*') {
        return None;
    }

    let base_dir = Path::new(importing_file)
        .parent()
        .unwrap_or_else(|| Path::new(""));
    let mut candidates: Vec<PathBuf> = Vec::new();
    if spec.starts_with("./") || spec.starts_with("../") {
        candidates.push(base_dir.join(spec));
    } else if spec.starts_with('/') {
        candidates.push(PathBuf::from(spec));
    } else {
        // Dotted module path (Python/Java style) tried beside the importer.
        let as_path = spec.replace('.', "/");
        candidates.push(base_dir.join(&as_path));
        candidates.push(base_dir.join(spec));
    }

    for candidate in candidates {
        let normalized = crate::util::normalize_path(&candidate);
        if Path::new(&normalized).extension().is_some() && known_files.contains(&normalized) {
            return Some(normalized);
        }
        for ext in SOURCE_EXTENSIONS {
            let with_ext = format!("{normalized}.{ext}");
            if known_files.contains(&with_ext) {
                return Some(with_ext);
            }
        }
        for ext in SOURCE_EXTENSIONS {
            let index = format!("{normalized}/index.{ext}");
            if known_files.contains(&index) {
                return Some(index);
            }
        }
    }
    None
}

fn first_top_level(
    store: &Store,
    by_file: &HashMap<&str, Vec<&Symbol>>,
    file: &str,
) -> Result<Option<String>> {
    if let Some(symbols) = by_file.get(file) {
        let mut top: Vec<&&Symbol> = symbols.iter().filter(|s| s.parent.is_none()).collect();
        top.sort_by_key(|s| (s.location.start.line, s.location.start.column));
        return Ok(top.first().map(|s| s.id.clone()));
    }
    let stored = store.symbols_by_file(file)?;
    Ok(stored
        .iter()
        .find(|s| s.parent.is_none())
        .map(|s| s.id.clone()))
}

fn exported_top_level(
    store: &Store,
    by_file: &HashMap<&str, Vec<&Symbol>>,
    file: &str,
) -> Result<Vec<String>> {
    if let Some(symbols) = by_file.get(file) {
        let mut out: Vec<&&Symbol> = symbols
            .iter()
            .filter(|s| s.parent.is_none() && s.exported)
            .collect();
        out.sort_by_key(|s| (s.location.start.line, s.location.start.column));
        return Ok(out.iter().map(|s| s.id.clone()).collect());
    }
    let stored = store.symbols_by_file(file)?;
    Ok(stored
        .iter()
        .filter(|s| s.parent.is_none() && s.exported)
        .map(|s| s.id.clone())
        .collect())
}

fn lookup_name(
    store: &Store,
    name_index: &HashMap<&str, Vec<&Symbol>>,
    name: &str,
) -> Result<Vec<String>> {
    if let Some(symbols) = name_index.get(name) {
        let mut ids: Vec<String> = symbols.iter().map(|s| s.id.clone()).collect();
        ids.sort();
        return Ok(ids);
    }
    store.symbol_ids_by_name(name)
}

// ----------------------------------------------------------------------
// Intra-file symbolic edges

/// Classifies every indexed name a signature mentions, most specific
/// first: `extends` > `implements` > `new Name(` > `Name(` > plain word
/// (`uses`).
fn signature_edges(
    store: &Store,
    symbols: &[Symbol],
    name_index: &HashMap<&str, Vec<&Symbol>>,
) -> Result<Vec<DependencyEdge>> {
    let mut edges = Vec::new();
    for symbol in symbols {
        let Some(signature) = &symbol.signature else {
            continue;
        };
        let words = word_set(signature);
        let extends_names = clause_names(signature, "extends");
        let implements_names = clause_names(signature, "implements");

        for word in &words {
            if *word == symbol.name {
                continue;
            }
            let targets = lookup_name(store, name_index, word)?;
            if targets.is_empty() {
                continue;
            }
            let edge_type = if extends_names.contains(word) {
                EdgeType::Extends
            } else if implements_names.contains(word) {
                EdgeType::Implements
            } else if instantiation_pattern(word).is_match(signature) {
                EdgeType::Instantiates
            } else if call_pattern(word).is_match(signature) {
                EdgeType::Calls
            } else {
                EdgeType::Uses
            };
            for target in targets {
                if target == symbol.id {
                    continue;
                }
                edges.push(DependencyEdge {
                    from: symbol.id.clone(),
                    to: target,
                    edge_type,
                    location: Some(symbol.location),
                });
            }
        }
    }
    Ok(edges)
}

fn word_set(text: &str) -> Vec<String> {
    let mut words: Vec<String> = Vec::new();
    let mut current = String::new();
    for ch in text.chars() {
        if ch.is_alphanumeric() || ch == '_' || ch == '$' {
            current.push(ch);
        } else if !current.is_empty() {
            if !words.contains(&current) {
                words.push(current.clone());
            }
            current.clear();
        }
    }
    if !current.is_empty() && !words.contains(&current) {
        words.push(current);
    }
    words
}

/// Names listed after a clause keyword, up to the next clause keyword.
fn clause_names(signature: &str, keyword: &str) -> Vec<String> {
    let Some(position) = signature.find(&format!("{keyword} ")) else {
        return Vec::new();
    };
    let rest = &signature[position + keyword.len() + 1..];
    let stop = ["extends", "implements"]
        .iter()
        .filter(|other| **other != keyword)
        .filter_map(|other| rest.find(&format!(" {other} ")))
        .min()
        .unwrap_or(rest.len());
    word_set(&rest[..stop])
}

fn instantiation_pattern(name: &str) -> Regex {
    Regex::new(&format!(r"\bnew\s+{}\s*\(", regex::escape(name)))
        .unwrap_or_else(|_| Regex::new(r"\bnever-matches\b").unwrap())
}

fn call_pattern(name: &str) -> Regex {
    Regex::new(&format!(r"\b{}\s*\(", regex::escape(name)))
        .unwrap_or_else(|_| Regex::new(r"\bnever-matches\b").unwrap())
}

// ----------------------------------------------------------------------
// Transitive helpers

/// Depth-first closure over `deps:from`, explicit stack.
pub fn compute_transitive_dependencies(store: &Store, id: &str) -> Result<Vec<String>> {
    transitive(store, id, Direction::Forward)
}

/// Depth-first closure over `deps:to`, explicit stack.
pub fn compute_transitive_dependents(store: &Store, id: &str) -> Result<Vec<String>> {
    transitive(store, id, Direction::Reverse)
}

#[derive(Clone, Copy)]
enum Direction {
    Forward,
    Reverse,
}

fn transitive(store: &Store, id: &str, direction: Direction) -> Result<Vec<String>> {
    let mut visited: HashSet<String> = HashSet::new();
    let mut out = Vec::new();
    let mut stack = vec![id.to_string()];
    visited.insert(id.to_string());
    while let Some(current) = stack.pop() {
        let neighbours = match direction {
            Direction::Forward => store.deps_from(&current)?,
            Direction::Reverse => store.deps_to(&current)?,
        };
        for next in neighbours {
            if visited.insert(next.clone()) {
                out.push(next.clone());
                stack.push(next);
            }
        }
    }
    out.sort();
    Ok(out)
}

#[derive(Debug, serde::Serialize)]
pub struct DependencyReport {
    pub direct: Vec<DependencyEdge>,
    pub transitive: Vec<String>,
    pub impact_count: usize,
}

/// Forward closure up to `depth`, honouring an optional edge-type filter.
pub fn get_dependencies(
    store: &Store,
    target: &str,
    depth: usize,
    types: Option<&[EdgeType]>,
) -> Result<DependencyReport> {
    bounded_closure(store, target, depth, types, Direction::Forward)
}

pub fn get_dependents(store: &Store, target: &str, depth: usize) -> Result<DependencyReport> {
    bounded_closure(store, target, depth, None, Direction::Reverse)
}

fn bounded_closure(
    store: &Store,
    target: &str,
    depth: usize,
    types: Option<&[EdgeType]>,
    direction: Direction,
) -> Result<DependencyReport> {
    let depth = depth.max(1);
    let mut direct = Vec::new();
    let mut transitive = Vec::new();
    let mut visited: HashSet<String> = HashSet::new();
    visited.insert(target.to_string());
    let mut frontier = vec![target.to_string()];

    for level in 1..=depth {
        let mut next_frontier = Vec::new();
        for node in &frontier {
            let edges = match direction {
                Direction::Forward => store.edges_from(node)?,
                Direction::Reverse => store.edges_to(node)?,
            };
            for edge in edges {
                if let Some(types) = types {
                    if !types.contains(&edge.edge_type) {
                        continue;
                    }
                }
                let neighbour = match direction {
                    Direction::Forward => edge.to.clone(),
                    Direction::Reverse => edge.from.clone(),
                };
                if !visited.insert(neighbour.clone()) {
                    continue;
                }
                if level == 1 {
                    direct.push(edge);
                } else {
                    transitive.push(neighbour.clone());
                }
                next_frontier.push(neighbour);
            }
        }
        frontier = next_frontier;
        if frontier.is_empty() {
            break;
        }
    }

    transitive.sort();
    let impact_count = direct.len() + transitive.len();
    Ok(DependencyReport {
        direct,
        transitive,
        impact_count,
    })
}
