//! Analytics over the stored dependency graph. Every operation reads the
//! store on demand and builds its adjacency snapshot fresh; nothing is
//! cached between calls.

use crate::config::PageRankConfig;
use crate::model::{DependencyEdge, EdgeType, RankedSymbol, Symbol};
use crate::store::Store;
use anyhow::Result;
use std::collections::HashMap;

pub mod analysis;
pub mod impact;
pub mod pagerank;
pub mod paths;

pub use analysis::{Bottleneck, SimilarSymbol};
pub use impact::{ImpactEntry, ImpactOptions, ImpactResult, ImpactThresholds, RiskLevel};
pub use paths::GraphPath;

/// In-memory view of the symbol graph for one analytics call. Edges whose
/// endpoints are not symbols (unresolved imports) are ignored.
pub struct GraphSnapshot {
    pub symbols: HashMap<String, Symbol>,
    pub edges: Vec<DependencyEdge>,
    pub outgoing: HashMap<String, Vec<(String, EdgeType)>>,
    pub incoming: HashMap<String, Vec<(String, EdgeType)>>,
}

impl GraphSnapshot {
    pub fn build(symbols: Vec<Symbol>, edges: Vec<DependencyEdge>) -> Self {
        let symbols: HashMap<String, Symbol> =
            symbols.into_iter().map(|s| (s.id.clone(), s)).collect();
        let edges: Vec<DependencyEdge> = edges
            .into_iter()
            .filter(|edge| symbols.contains_key(&edge.from) && symbols.contains_key(&edge.to))
            .collect();
        let mut outgoing: HashMap<String, Vec<(String, EdgeType)>> = HashMap::new();
        let mut incoming: HashMap<String, Vec<(String, EdgeType)>> = HashMap::new();
        for edge in &edges {
            outgoing
                .entry(edge.from.clone())
                .or_default()
                .push((edge.to.clone(), edge.edge_type));
            incoming
                .entry(edge.to.clone())
                .or_default()
                .push((edge.from.clone(), edge.edge_type));
        }
        // Deterministic neighbour ordering: edge-type priority, then ID.
        for neighbours in outgoing.values_mut().chain(incoming.values_mut()) {
            neighbours.sort_by(|a, b| a.1.priority().cmp(&b.1.priority()).then(a.0.cmp(&b.0)));
        }
        Self {
            symbols,
            edges,
            outgoing,
            incoming,
        }
    }

    pub fn out_degree(&self, id: &str) -> usize {
        self.outgoing.get(id).map(|n| n.len()).unwrap_or(0)
    }

    pub fn in_degree(&self, id: &str) -> usize {
        self.incoming.get(id).map(|n| n.len()).unwrap_or(0)
    }
}

pub struct Graph<'a> {
    store: &'a Store,
}

impl<'a> Graph<'a> {
    pub fn new(store: &'a Store) -> Self {
        Self { store }
    }

    pub fn snapshot(&self) -> Result<GraphSnapshot> {
        let symbols = self.store.all_symbols()?;
        let edges = self.store.all_edges()?;
        Ok(GraphSnapshot::build(symbols, edges))
    }

    /// Weighted PageRank over the current store contents. The caller
    /// persists the result via `Store::set_pageranks`.
    pub fn compute_pagerank(&self, config: &PageRankConfig) -> Result<HashMap<String, f64>> {
        let snapshot = self.snapshot()?;
        Ok(pagerank::compute(&snapshot, config))
    }

    pub fn find_path(&self, from: &str, to: &str) -> Result<Option<GraphPath>> {
        let snapshot = self.snapshot()?;
        Ok(paths::find_path(&snapshot, from, to))
    }

    pub fn find_shortest_paths(&self, from: &str) -> Result<HashMap<String, GraphPath>> {
        let snapshot = self.snapshot()?;
        Ok(paths::find_shortest_paths(&snapshot, from))
    }

    pub fn find_critical_path(&self, from: &str, to: &str) -> Result<Option<GraphPath>> {
        let snapshot = self.snapshot()?;
        let ranks = self.store.pagerank_all()?;
        Ok(paths::find_critical_path(&snapshot, &ranks, from, to))
    }

    pub fn connected_components(&self) -> Result<Vec<Vec<String>>> {
        let snapshot = self.snapshot()?;
        Ok(analysis::connected_components(&snapshot))
    }

    pub fn find_cycles(&self) -> Result<Vec<Vec<String>>> {
        let snapshot = self.snapshot()?;
        Ok(analysis::find_cycles(&snapshot))
    }

    pub fn find_bottlenecks(&self) -> Result<Vec<Bottleneck>> {
        let snapshot = self.snapshot()?;
        Ok(analysis::find_bottlenecks(&snapshot))
    }

    pub fn find_dead_code(&self) -> Result<Vec<Symbol>> {
        let snapshot = self.snapshot()?;
        let ranks = self.store.pagerank_all()?;
        Ok(analysis::find_dead_code(&snapshot, &ranks))
    }

    pub fn find_similar(&self, target: &str, limit: usize) -> Result<Vec<SimilarSymbol>> {
        let snapshot = self.snapshot()?;
        Ok(analysis::find_similar(&snapshot, target, limit))
    }

    pub fn analyze_impact(
        &self,
        seeds: &[String],
        options: &ImpactOptions,
    ) -> Result<ImpactResult> {
        let snapshot = self.snapshot()?;
        let ranks = self.store.pagerank_all()?;
        Ok(impact::analyze(&snapshot, &ranks, seeds, options))
    }

    /// Highest-ranked symbols joined with their records.
    pub fn get_top_symbols(&self, limit: usize) -> Result<Vec<RankedSymbol>> {
        let mut out = Vec::new();
        for (id, rank) in self.store.pagerank_top(limit)? {
            if let Some(symbol) = self.store.get_symbol(&id)? {
                out.push(RankedSymbol { symbol, rank });
            }
        }
        Ok(out)
    }
}
