//! Weighted PageRank. Initial mass is biased by export status, entry-point
//! files and symbol kind; the iteration itself is the standard damped
//! formulation and the final vector is normalised to sum to 1.

use crate::config::PageRankConfig;
use crate::graph::GraphSnapshot;
use crate::model::SymbolKind;
use crate::util;
use std::collections::HashMap;

const EXPORTED_MULTIPLIER: f64 = 1.5;
const ENTRY_POINT_MULTIPLIER: f64 = 2.0;
const TYPE_MULTIPLIER: f64 = 1.2;
const CALLABLE_MULTIPLIER: f64 = 1.1;

pub fn compute(snapshot: &GraphSnapshot, config: &PageRankConfig) -> HashMap<String, f64> {
    let n = snapshot.symbols.len();
    if n == 0 {
        return HashMap::new();
    }
    let base = 1.0 / n as f64;

    let mut ranks: HashMap<String, f64> = snapshot
        .symbols
        .values()
        .map(|symbol| {
            let mut multiplier = 1.0;
            if symbol.exported {
                multiplier *= EXPORTED_MULTIPLIER;
            }
            if util::is_entry_point(&symbol.filepath) {
                multiplier *= ENTRY_POINT_MULTIPLIER;
            }
            multiplier *= match symbol.kind {
                SymbolKind::Class | SymbolKind::Interface => TYPE_MULTIPLIER,
                SymbolKind::Function | SymbolKind::Method => CALLABLE_MULTIPLIER,
                _ => 1.0,
            };
            (symbol.id.clone(), base * multiplier)
        })
        .collect();

    let out_degree: HashMap<&str, usize> = snapshot
        .symbols
        .keys()
        .map(|id| (id.as_str(), snapshot.out_degree(id)))
        .collect();

    let restart = (1.0 - config.damping) / n as f64;
    for _ in 0..config.iterations {
        let mut next: HashMap<String, f64> = snapshot
            .symbols
            .keys()
            .map(|id| (id.clone(), restart))
            .collect();
        for (id, rank) in &ranks {
            let degree = out_degree.get(id.as_str()).copied().unwrap_or(0);
            if degree == 0 {
                continue;
            }
            let share = config.damping * rank / degree as f64;
            if let Some(neighbours) = snapshot.outgoing.get(id) {
                for (to, _) in neighbours {
                    if let Some(entry) = next.get_mut(to) {
                        *entry += share;
                    }
                }
            }
        }

        let mut delta: f64 = 0.0;
        for (id, value) in &next {
            let previous = ranks.get(id).copied().unwrap_or(0.0);
            delta = delta.max((value - previous).abs());
        }
        ranks = next;
        if delta < config.tolerance {
            break;
        }
    }

    let total: f64 = ranks.values().sum();
    if total > 0.0 {
        for value in ranks.values_mut() {
            *value /= total;
        }
    }
    ranks
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DependencyEdge, EdgeType, Location, Symbol};

    fn symbol(id: &str, exported: bool) -> Symbol {
        Symbol {
            id: id.to_string(),
            name: id.rsplit(':').nth(1).unwrap_or(id).to_string(),
            kind: SymbolKind::Class,
            filepath: "/p/lib.ts".to_string(),
            location: Location::new(1, 0, 2, 0),
            signature: None,
            docstring: None,
            parent: None,
            children: Vec::new(),
            exported,
            language: "ts".to_string(),
            git: None,
            page_rank: None,
        }
    }

    #[test]
    fn ranks_sum_to_one() {
        let symbols = vec![
            symbol("/p/lib.ts:A:0", true),
            symbol("/p/lib.ts:B:5", true),
            symbol("/p/lib.ts:C:9", false),
        ];
        let edges = vec![
            DependencyEdge::new("/p/lib.ts:B:5", "/p/lib.ts:A:0", EdgeType::Calls),
            DependencyEdge::new("/p/lib.ts:C:9", "/p/lib.ts:A:0", EdgeType::Calls),
        ];
        let snapshot = GraphSnapshot::build(symbols, edges);
        let ranks = compute(&snapshot, &PageRankConfig::default());
        let total: f64 = ranks.values().sum();
        assert!((total - 1.0).abs() < 1e-9);
        assert!(ranks["/p/lib.ts:A:0"] > ranks["/p/lib.ts:C:9"]);
    }

    #[test]
    fn empty_graph_yields_empty_ranks() {
        let snapshot = GraphSnapshot::build(Vec::new(), Vec::new());
        assert!(compute(&snapshot, &PageRankConfig::default()).is_empty());
    }
}
