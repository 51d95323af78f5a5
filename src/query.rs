//! Query surface exposed to external collaborators. Every function reads
//! through the store handle; nothing here mutates index state.

use crate::graph::{Graph, ImpactOptions, ImpactResult, SimilarSymbol};
use crate::indexer::gitmeta::{CommitInfo, GitProvider};
use crate::indexer::resolver::{self, DependencyReport};
use crate::model::{
    DependencyEdge, EdgeType, GitMetadata, ProjectMetadata, ProjectStats, RankedSymbol, Symbol,
    SymbolCompact, SymbolKind,
};
use crate::store::Store;
use crate::util;
use anyhow::Result;
use regex::Regex;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;

// ----------------------------------------------------------------------
// get_symbol

#[derive(Debug, Clone, Default)]
pub struct GetSymbolOptions {
    pub filepath: Option<String>,
    pub kind: Option<SymbolKind>,
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct RelatedSymbol {
    pub id: String,
    #[serde(rename = "type")]
    pub edge_type: EdgeType,
    pub direction: &'static str,
}

#[derive(Debug, Serialize)]
pub struct SymbolMatch {
    pub symbol: Symbol,
    pub score: f64,
    pub related: Vec<RelatedSymbol>,
}

/// Fuzzy name lookup: exact, case-insensitive, prefix, substring, then
/// edit-distance matches, ranked with PageRank as a tiebreaker.
pub fn get_symbol(store: &Store, name: &str, opts: &GetSymbolOptions) -> Result<Vec<SymbolMatch>> {
    let limit = opts.limit.unwrap_or(10).max(1);
    let mut scored: Vec<(f64, String)> = Vec::new();
    for candidate in store.symbol_names()? {
        let score = name_match_score(name, &candidate);
        if score > 0.0 {
            scored.push((score, candidate));
        }
    }

    let mut matches: Vec<SymbolMatch> = Vec::new();
    for (score, candidate) in scored {
        for id in store.symbol_ids_by_name(&candidate)? {
            let Some(symbol) = store.get_symbol(&id)? else {
                continue;
            };
            if let Some(filepath) = &opts.filepath {
                if &symbol.filepath != filepath {
                    continue;
                }
            }
            if let Some(kind) = opts.kind {
                if symbol.kind != kind {
                    continue;
                }
            }
            let related = related_symbols(store, &id)?;
            matches.push(SymbolMatch {
                symbol,
                score,
                related,
            });
        }
    }
    matches.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| {
                b.symbol
                    .page_rank
                    .unwrap_or(0.0)
                    .total_cmp(&a.symbol.page_rank.unwrap_or(0.0))
            })
            .then_with(|| a.symbol.id.cmp(&b.symbol.id))
    });
    matches.truncate(limit);
    Ok(matches)
}

fn name_match_score(query: &str, candidate: &str) -> f64 {
    if candidate == query {
        return 1.0;
    }
    if candidate.eq_ignore_ascii_case(query) {
        return 0.9;
    }
    let query_lc = query.to_lowercase();
    let candidate_lc = candidate.to_lowercase();
    if candidate_lc.starts_with(&query_lc) {
        return 0.8;
    }
    if candidate_lc.contains(&query_lc) {
        return 0.6;
    }
    let similarity = util::name_similarity(&query_lc, &candidate_lc);
    if similarity > 0.5 {
        return similarity * 0.5;
    }
    0.0
}

fn related_symbols(store: &Store, id: &str) -> Result<Vec<RelatedSymbol>> {
    let mut related = Vec::new();
    for edge in store.edges_from(id)? {
        related.push(RelatedSymbol {
            id: edge.to,
            edge_type: edge.edge_type,
            direction: "out",
        });
    }
    for edge in store.edges_to(id)? {
        related.push(RelatedSymbol {
            id: edge.from,
            edge_type: edge.edge_type,
            direction: "in",
        });
    }
    Ok(related)
}

// ----------------------------------------------------------------------
// search_symbols

#[derive(Debug, Clone, Default)]
pub struct SearchOptions {
    pub kind: Option<SymbolKind>,
    pub exported_only: bool,
    pub limit: Option<usize>,
}

/// Wildcard search (`*` and `?`). A pattern without wildcards matches as a
/// substring of the name, or failing that of the signature; name matches
/// always rank ahead of signature matches.
pub fn search_symbols(store: &Store, pattern: &str, opts: &SearchOptions) -> Result<Vec<Symbol>> {
    let limit = opts.limit.unwrap_or(20).max(1);
    let regex = wildcard_regex(pattern)?;

    let mut name_hits: Vec<Symbol> = Vec::new();
    let mut signature_hits: Vec<Symbol> = Vec::new();
    for symbol in store.all_symbols()? {
        if let Some(kind) = opts.kind {
            if symbol.kind != kind {
                continue;
            }
        }
        if opts.exported_only && !symbol.exported {
            continue;
        }
        if regex.is_match(&symbol.name) {
            name_hits.push(symbol);
        } else if symbol
            .signature
            .as_deref()
            .map(|sig| word_match(sig, pattern))
            .unwrap_or(false)
        {
            signature_hits.push(symbol);
        }
    }

    let by_rank = |a: &Symbol, b: &Symbol| {
        b.page_rank
            .unwrap_or(0.0)
            .total_cmp(&a.page_rank.unwrap_or(0.0))
            .then_with(|| a.id.cmp(&b.id))
    };
    name_hits.sort_by(by_rank);
    signature_hits.sort_by(by_rank);
    name_hits.extend(signature_hits);
    name_hits.truncate(limit);
    Ok(name_hits)
}

fn wildcard_regex(pattern: &str) -> Result<Regex> {
    let mut out = String::from("^");
    let anchored = pattern.contains('*') || pattern.contains('?');
    if !anchored {
        out.push_str(".*");
    }
    for ch in pattern.chars() {
        match ch {
            '*' => out.push_str(".*"),
            '?' => out.push('.'),
            _ => out.push_str(&regex::escape(&ch.to_string())),
        }
    }
    if !anchored {
        out.push_str(".*");
    }
    out.push('$');
    Ok(Regex::new(&format!("(?i){out}"))?)
}

fn word_match(text: &str, word: &str) -> bool {
    Regex::new(&format!(r"\b{}\b", regex::escape(word)))
        .map(|re| re.is_match(text))
        .unwrap_or(false)
}

// ----------------------------------------------------------------------
// get_file_structure

#[derive(Debug, Serialize)]
pub struct StructureNode {
    #[serde(flatten)]
    pub symbol: SymbolCompact,
    pub exported: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<StructureNode>,
}

#[derive(Debug, Serialize)]
pub struct FileStructure {
    pub path: String,
    pub symbols: Vec<StructureNode>,
}

/// Nested symbol tree of one file, parents first. With `include_private`
/// off, non-exported top-level symbols are dropped (their members with
/// them).
pub fn get_file_structure(store: &Store, path: &str, include_private: bool) -> Result<FileStructure> {
    let symbols = store.symbols_by_file(path)?;
    let roots: Vec<&Symbol> = symbols
        .iter()
        .filter(|s| s.parent.is_none())
        .filter(|s| include_private || s.exported)
        .collect();
    let nodes = roots
        .iter()
        .map(|root| build_node(root, &symbols))
        .collect();
    Ok(FileStructure {
        path: path.to_string(),
        symbols: nodes,
    })
}

fn build_node(symbol: &Symbol, all: &[Symbol]) -> StructureNode {
    let children = symbol
        .children
        .iter()
        .filter_map(|child_id| all.iter().find(|s| &s.id == child_id))
        .map(|child| build_node(child, all))
        .collect();
    StructureNode {
        symbol: SymbolCompact::from(symbol),
        exported: symbol.exported,
        signature: symbol.signature.clone(),
        children,
    }
}

// ----------------------------------------------------------------------
// get_project_overview

#[derive(Debug, Clone)]
pub struct OverviewOptions {
    pub top_n: usize,
    pub include_git: bool,
}

impl Default for OverviewOptions {
    fn default() -> Self {
        Self {
            top_n: 10,
            include_git: false,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ChurnEntry {
    pub path: String,
    pub churn_count: i64,
    pub stability_score: f64,
}

#[derive(Debug, Serialize)]
pub struct ProjectOverview {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<ProjectMetadata>,
    pub stats: ProjectStats,
    pub top_symbols: Vec<RankedSymbol>,
    pub languages: BTreeMap<String, i64>,
    pub kinds: BTreeMap<String, i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub most_churned: Option<Vec<ChurnEntry>>,
}

pub fn get_project_overview(store: &Store, opts: &OverviewOptions) -> Result<ProjectOverview> {
    let metadata = store.project_metadata()?;
    let stats = store.stats_counts()?;
    let top_symbols = Graph::new(store).get_top_symbols(opts.top_n)?;

    let mut languages: BTreeMap<String, i64> = BTreeMap::new();
    let mut kinds: BTreeMap<String, i64> = BTreeMap::new();
    let mut churn: BTreeMap<String, (i64, f64)> = BTreeMap::new();
    for symbol in store.all_symbols()? {
        *languages.entry(symbol.language.clone()).or_insert(0) += 1;
        *kinds.entry(symbol.kind.as_str().to_string()).or_insert(0) += 1;
        if opts.include_git {
            if let Some(git) = &symbol.git {
                if let Some(count) = git.churn_count {
                    churn
                        .entry(symbol.filepath.clone())
                        .or_insert((count, git.stability_score));
                }
            }
        }
    }

    let most_churned = if opts.include_git {
        let mut entries: Vec<ChurnEntry> = churn
            .into_iter()
            .map(|(path, (churn_count, stability_score))| ChurnEntry {
                path,
                churn_count,
                stability_score,
            })
            .collect();
        entries.sort_by(|a, b| {
            b.churn_count
                .cmp(&a.churn_count)
                .then_with(|| a.path.cmp(&b.path))
        });
        entries.truncate(opts.top_n);
        Some(entries)
    } else {
        None
    };

    Ok(ProjectOverview {
        metadata,
        stats,
        top_symbols,
        languages,
        kinds,
        most_churned,
    })
}

// ----------------------------------------------------------------------
// dependencies / dependents

pub fn get_dependencies(
    store: &Store,
    target: &str,
    depth: usize,
    types: Option<&[EdgeType]>,
) -> Result<DependencyReport> {
    resolver::get_dependencies(store, target, depth, types)
}

#[derive(Debug, Clone)]
pub struct DependentOptions {
    pub unstable_only: bool,
    pub stability_threshold: f64,
    pub include_git: bool,
}

impl Default for DependentOptions {
    fn default() -> Self {
        Self {
            unstable_only: false,
            stability_threshold: 0.5,
            include_git: false,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct DependentEntry {
    pub edge: DependencyEdge,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub symbol: Option<SymbolCompact>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub git: Option<GitMetadata>,
}

#[derive(Debug, Serialize)]
pub struct DependentsReport {
    pub direct: Vec<DependentEntry>,
    pub transitive: Vec<String>,
    pub impact_count: usize,
}

pub fn get_dependents(
    store: &Store,
    target: &str,
    depth: usize,
    opts: &DependentOptions,
) -> Result<DependentsReport> {
    let report = resolver::get_dependents(store, target, depth)?;
    let mut direct = Vec::new();
    for edge in report.direct {
        let symbol = store.get_symbol(&edge.from)?;
        let stability = symbol
            .as_ref()
            .and_then(|s| s.git.as_ref())
            .map(|git| git.stability_score);
        if opts.unstable_only {
            match stability {
                Some(score) if score < opts.stability_threshold => {}
                _ => continue,
            }
        }
        let git = if opts.include_git {
            symbol.as_ref().and_then(|s| s.git.clone())
        } else {
            None
        };
        direct.push(DependentEntry {
            edge,
            symbol: symbol.as_ref().map(SymbolCompact::from),
            git,
        });
    }
    let impact_count = direct.len() + report.transitive.len();
    Ok(DependentsReport {
        direct,
        transitive: report.transitive,
        impact_count,
    })
}

// ----------------------------------------------------------------------
// get_impact

#[derive(Debug, Clone, Default)]
pub struct ImpactQueryOptions {
    pub unstable_only: bool,
    pub stability_threshold: Option<f64>,
    pub include_git: bool,
    pub impact: ImpactOptions,
}

/// Impact of editing a set of files: seeds are every symbol those files
/// currently hold.
pub fn get_impact(store: &Store, files: &[String], opts: &ImpactQueryOptions) -> Result<ImpactResult> {
    let mut seeds = Vec::new();
    for file in files {
        seeds.extend(store.symbol_ids_by_file(file)?);
    }
    let mut result = Graph::new(store).analyze_impact(&seeds, &opts.impact)?;

    if opts.unstable_only {
        let threshold = opts.stability_threshold.unwrap_or(0.5);
        let keep = |compact: &SymbolCompact| -> bool {
            store
                .get_symbol(&compact.id)
                .ok()
                .flatten()
                .and_then(|s| s.git.map(|git| git.stability_score))
                .map(|score| score < threshold)
                .unwrap_or(false)
        };
        result.directly_affected.retain(|entry| keep(entry));
        result.transitively_affected.retain(|entry| keep(entry));
        result.high_risk.retain(|entry| keep(&entry.symbol));
    }
    Ok(result)
}

// ----------------------------------------------------------------------
// get_symbol_history

#[derive(Debug, Serialize)]
pub struct SymbolHistory {
    pub symbol: SymbolCompact,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<GitMetadata>,
    pub commits: Vec<CommitInfo>,
}

/// Commit history of the file declaring `target` (an ID or a name).
/// Results are cached in the store keyed by filepath; `refresh` bypasses
/// the cache.
pub fn get_symbol_history(
    store: &Store,
    git: &GitProvider,
    root: &Path,
    target: &str,
    refresh: bool,
) -> Result<Option<SymbolHistory>> {
    let symbol = match store.get_symbol(target)? {
        Some(symbol) => Some(symbol),
        None => {
            let ids = store.symbol_ids_by_name(target)?;
            match ids.first() {
                Some(id) => store.get_symbol(id)?,
                None => None,
            }
        }
    };
    let Some(symbol) = symbol else {
        return Ok(None);
    };

    let cache_key = format!("githist:{}", symbol.filepath);
    if !refresh {
        if let Some(cached) = store.kv_get(&cache_key)? {
            if let Ok(commits) = serde_json::from_str::<Vec<CommitInfo>>(&cached) {
                return Ok(Some(SymbolHistory {
                    symbol: SymbolCompact::from(&symbol),
                    metadata: symbol.git.clone(),
                    commits,
                }));
            }
        }
    }

    let rel = Path::new(&symbol.filepath)
        .strip_prefix(root)
        .map(util::normalize_path)
        .unwrap_or_else(|_| symbol.filepath.clone());
    let commits = git.file_history(root, &rel).unwrap_or_default();
    store.kv_set(&cache_key, &serde_json::to_string(&commits)?)?;
    Ok(Some(SymbolHistory {
        symbol: SymbolCompact::from(&symbol),
        metadata: symbol.git.clone(),
        commits,
    }))
}

// ----------------------------------------------------------------------
// find_similar

#[derive(Debug, Clone, Default)]
pub struct FindSimilarOptions {
    pub kind: Option<SymbolKind>,
    pub limit: Option<usize>,
}

/// Similarity by description: when the description names an indexed
/// symbol exactly, graph similarity around that symbol is used; otherwise
/// tokens of the description are scored against symbol names.
pub fn find_similar(
    store: &Store,
    description: &str,
    opts: &FindSimilarOptions,
) -> Result<Vec<SimilarSymbol>> {
    let limit = opts.limit.unwrap_or(10).max(1);
    let trimmed = description.trim();

    let exact_ids = store.symbol_ids_by_name(trimmed)?;
    if let Some(id) = exact_ids.first() {
        let mut similar = Graph::new(store).find_similar(id, limit * 2)?;
        if let Some(kind) = opts.kind {
            similar.retain(|entry| entry.symbol.kind == kind);
        }
        similar.truncate(limit);
        return Ok(similar);
    }

    let tokens: Vec<String> = trimmed
        .split(|ch: char| !ch.is_alphanumeric() && ch != '_')
        .filter(|token| token.len() > 1)
        .map(|token| token.to_lowercase())
        .collect();
    if tokens.is_empty() {
        return Ok(Vec::new());
    }

    let mut out: Vec<SimilarSymbol> = Vec::new();
    for symbol in store.all_symbols()? {
        if let Some(kind) = opts.kind {
            if symbol.kind != kind {
                continue;
            }
        }
        let name_lc = symbol.name.to_lowercase();
        let mut score: f64 = 0.0;
        let mut matched: Option<&str> = None;
        for token in &tokens {
            let token_score = if &name_lc == token {
                1.0
            } else if name_lc.contains(token.as_str()) {
                0.7
            } else {
                let sim = util::name_similarity(&name_lc, token);
                if sim > 0.5 { sim * 0.6 } else { 0.0 }
            };
            if token_score > score {
                score = token_score;
                matched = Some(token);
            }
        }
        if score > 0.3 {
            out.push(SimilarSymbol {
                symbol: SymbolCompact::from(&symbol),
                score,
                reason: format!(
                    "name matches '{}'",
                    matched.unwrap_or(tokens[0].as_str())
                ),
            });
        }
    }
    out.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| a.symbol.id.cmp(&b.symbol.id))
    });
    out.truncate(limit);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wildcard_translation() {
        let re = wildcard_regex("get*Symbol").unwrap();
        assert!(re.is_match("getTopSymbol"));
        assert!(!re.is_match("setTopSymbol"));

        let re = wildcard_regex("A").unwrap();
        assert!(re.is_match("A"));
        assert!(re.is_match("Animal"));
    }

    #[test]
    fn name_scores_rank_exact_first() {
        assert!(name_match_score("Foo", "Foo") > name_match_score("Foo", "foo"));
        assert!(name_match_score("Foo", "foo") > name_match_score("Foo", "FooBar"));
        assert!(name_match_score("Foo", "FooBar") > name_match_score("Foo", "BazFoo"));
        assert_eq!(name_match_score("Foo", "Quux"), 0.0);
    }
}
