//! Impact analysis: reverse traversal from an edited symbol set, risk
//! scoring with configurable thresholds, a Kahn suggested order, and a
//! file/path summary.

use crate::graph::GraphSnapshot;
use crate::model::SymbolCompact;
use crate::util;
use serde::Serialize;
use std::collections::{HashMap, HashSet, VecDeque};

#[derive(Debug, Clone, Copy)]
pub struct ImpactThresholds {
    pub critical: f64,
    pub high: f64,
    pub medium: f64,
}

impl Default for ImpactThresholds {
    fn default() -> Self {
        Self {
            critical: 100.0,
            high: 50.0,
            medium: 20.0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ImpactOptions {
    /// Reverse-traversal depth cap.
    pub max_depth: usize,
    pub thresholds: ImpactThresholds,
}

impl Default for ImpactOptions {
    fn default() -> Self {
        Self {
            max_depth: 20,
            thresholds: ImpactThresholds::default(),
        }
    }
}

#[derive(Debug, Serialize, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Critical,
    High,
    Medium,
    Low,
}

#[derive(Debug, Serialize, Clone)]
pub struct ImpactEntry {
    pub symbol: SymbolCompact,
    pub score: f64,
    pub level: RiskLevel,
    pub dependent_count: usize,
    pub path_count: usize,
}

#[derive(Debug, Serialize, Clone)]
pub struct ImpactPath {
    pub target: String,
    pub nodes: Vec<String>,
}

#[derive(Debug, Serialize, Clone)]
pub struct FileImpact {
    pub path: String,
    pub symbol_count: usize,
}

#[derive(Debug, Serialize, Clone, Copy, Default)]
pub struct RiskDistribution {
    pub critical: usize,
    pub high: usize,
    pub medium: usize,
    pub low: usize,
}

#[derive(Debug, Serialize)]
pub struct ImpactSummary {
    pub total_affected: usize,
    pub critical_paths: Vec<ImpactPath>,
    pub affected_files: Vec<FileImpact>,
    pub risk_distribution: RiskDistribution,
}

#[derive(Debug, Serialize)]
pub struct ImpactResult {
    pub directly_affected: Vec<SymbolCompact>,
    pub transitively_affected: Vec<SymbolCompact>,
    pub suggested_order: Vec<String>,
    pub high_risk: Vec<ImpactEntry>,
    pub impact_summary: ImpactSummary,
}

pub fn analyze(
    snapshot: &GraphSnapshot,
    ranks: &HashMap<String, f64>,
    seeds: &[String],
    options: &ImpactOptions,
) -> ImpactResult {
    let seed_set: HashSet<&str> = seeds
        .iter()
        .map(|s| s.as_str())
        .filter(|s| snapshot.symbols.contains_key(*s))
        .collect();

    // Reverse breadth-first over dependents, gathering distance, a
    // representative impact path, and a per-node path count.
    let mut distance: HashMap<String, usize> = HashMap::new();
    let mut paths: HashMap<String, Vec<String>> = HashMap::new();
    let mut path_count: HashMap<String, usize> = HashMap::new();
    let mut queue: VecDeque<String> = VecDeque::new();
    for seed in &seed_set {
        distance.insert(seed.to_string(), 0);
        paths.insert(seed.to_string(), vec![seed.to_string()]);
        queue.push_back(seed.to_string());
    }

    while let Some(current) = queue.pop_front() {
        let level = distance[&current];
        if level >= options.max_depth {
            continue;
        }
        let Some(dependents) = snapshot.incoming.get(&current) else {
            continue;
        };
        for (dependent, _) in dependents {
            *path_count.entry(dependent.clone()).or_insert(0) += 1;
            if distance.contains_key(dependent) {
                continue;
            }
            distance.insert(dependent.clone(), level + 1);
            let mut path = paths.get(&current).cloned().unwrap_or_default();
            path.push(dependent.clone());
            paths.insert(dependent.clone(), path);
            queue.push_back(dependent.clone());
        }
    }

    let affected: Vec<&String> = {
        let mut ids: Vec<&String> = distance
            .keys()
            .filter(|id| !seed_set.contains(id.as_str()))
            .collect();
        ids.sort();
        ids
    };

    let mut directly_affected = Vec::new();
    let mut transitively_affected = Vec::new();
    for id in &affected {
        let Some(symbol) = snapshot.symbols.get(*id) else {
            continue;
        };
        if distance[*id] == 1 {
            directly_affected.push(SymbolCompact::from(symbol));
        } else {
            transitively_affected.push(SymbolCompact::from(symbol));
        }
    }

    // Risk scoring over every affected symbol.
    let mut entries: Vec<ImpactEntry> = Vec::new();
    let mut risk_distribution = RiskDistribution::default();
    for id in &affected {
        let Some(symbol) = snapshot.symbols.get(*id) else {
            continue;
        };
        let rank = ranks.get(*id).copied().unwrap_or(0.0);
        let dependent_count = snapshot.in_degree(id);
        let count = path_count.get(*id).copied().unwrap_or(0);
        let mut score = rank * 100.0;
        if rank > 0.01 {
            score += rank * 200.0;
        }
        if util::is_entry_point(&symbol.filepath) {
            score += 50.0;
        }
        if symbol.exported {
            score += 30.0;
        }
        if dependent_count > 5 {
            score += 5.0 * dependent_count as f64;
        }
        if count > 10 {
            score += 2.0 * count as f64;
        }
        let level = if score > options.thresholds.critical {
            RiskLevel::Critical
        } else if score > options.thresholds.high {
            RiskLevel::High
        } else if score > options.thresholds.medium {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        };
        match level {
            RiskLevel::Critical => risk_distribution.critical += 1,
            RiskLevel::High => risk_distribution.high += 1,
            RiskLevel::Medium => risk_distribution.medium += 1,
            RiskLevel::Low => risk_distribution.low += 1,
        }
        entries.push(ImpactEntry {
            symbol: SymbolCompact::from(symbol),
            score,
            level,
            dependent_count,
            path_count: count,
        });
    }
    let mut high_risk: Vec<ImpactEntry> = entries
        .iter()
        .filter(|entry| matches!(entry.level, RiskLevel::Critical | RiskLevel::High))
        .cloned()
        .collect();
    high_risk.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| a.symbol.id.cmp(&b.symbol.id))
    });

    let suggested_order = topological_order(snapshot, &distance);

    // Longest recorded impact path per target, length > 3.
    let mut critical_paths: Vec<ImpactPath> = paths
        .iter()
        .filter(|(target, path)| !seed_set.contains(target.as_str()) && path.len() > 3)
        .map(|(target, path)| ImpactPath {
            target: target.clone(),
            nodes: path.clone(),
        })
        .collect();
    critical_paths.sort_by(|a, b| {
        b.nodes
            .len()
            .cmp(&a.nodes.len())
            .then_with(|| a.target.cmp(&b.target))
    });

    let mut by_file: HashMap<&str, usize> = HashMap::new();
    for id in &affected {
        if let Some(symbol) = snapshot.symbols.get(*id) {
            *by_file.entry(symbol.filepath.as_str()).or_insert(0) += 1;
        }
    }
    let mut affected_files: Vec<FileImpact> = by_file
        .into_iter()
        .map(|(path, symbol_count)| FileImpact {
            path: path.to_string(),
            symbol_count,
        })
        .collect();
    affected_files.sort_by(|a, b| {
        b.symbol_count
            .cmp(&a.symbol_count)
            .then_with(|| a.path.cmp(&b.path))
    });

    ImpactResult {
        directly_affected,
        transitively_affected,
        suggested_order,
        high_risk,
        impact_summary: ImpactSummary {
            total_affected: affected.len(),
            critical_paths,
            affected_files,
            risk_distribution,
        },
    }
}

/// Kahn topological sort over the affected set (seeds included),
/// restricted to internal edges, dependencies first: for an edge
/// `u depends on v`, `v` is emitted before `u`.
fn topological_order(
    snapshot: &GraphSnapshot,
    distance: &HashMap<String, usize>,
) -> Vec<String> {
    let members: HashSet<&str> = distance.keys().map(|id| id.as_str()).collect();
    let mut in_degree: HashMap<&str, usize> = members.iter().map(|id| (*id, 0)).collect();
    let mut dependents_of: HashMap<&str, Vec<&str>> = HashMap::new();
    for edge in &snapshot.edges {
        let (from, to) = (edge.from.as_str(), edge.to.as_str());
        if !members.contains(from) || !members.contains(to) || from == to {
            continue;
        }
        // from depends on to: to must come first.
        *in_degree.entry(from).or_insert(0) += 1;
        dependents_of.entry(to).or_default().push(from);
    }

    let mut ready: Vec<&str> = in_degree
        .iter()
        .filter(|(_, degree)| **degree == 0)
        .map(|(id, _)| *id)
        .collect();
    ready.sort();
    let mut queue: VecDeque<&str> = ready.into_iter().collect();
    let mut order: Vec<String> = Vec::new();
    let mut emitted: HashSet<&str> = HashSet::new();

    while let Some(current) = queue.pop_front() {
        if !emitted.insert(current) {
            continue;
        }
        order.push(current.to_string());
        let mut unblocked: Vec<&str> = Vec::new();
        if let Some(dependents) = dependents_of.get(current) {
            for dependent in dependents {
                if let Some(degree) = in_degree.get_mut(dependent) {
                    *degree = degree.saturating_sub(1);
                    if *degree == 0 {
                        unblocked.push(dependent);
                    }
                }
            }
        }
        unblocked.sort();
        for id in unblocked {
            queue.push_back(id);
        }
    }

    // Cycles keep some nodes blocked; append them deterministically.
    let mut remaining: Vec<&str> = members
        .iter()
        .filter(|id| !emitted.contains(*id))
        .copied()
        .collect();
    remaining.sort();
    order.extend(remaining.into_iter().map(|id| id.to_string()));
    order
}
