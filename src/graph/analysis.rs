//! Structural analyses: components, cycles, bottlenecks, dead code and
//! similarity ranking.

use crate::graph::GraphSnapshot;
use crate::model::{Symbol, SymbolCompact};
use crate::util;
use serde::Serialize;
use std::collections::{HashMap, HashSet, VecDeque};

const BOTTLENECK_THRESHOLD: f64 = 4.0;
const DEAD_CODE_RANK_CEILING: f64 = 1e-4;
const NAME_SIMILARITY_FLOOR: f64 = 0.5;
const SIMILARITY_KEEP_FLOOR: f64 = 0.3;

/// Undirected connected components, largest first.
pub fn connected_components(snapshot: &GraphSnapshot) -> Vec<Vec<String>> {
    let mut undirected: HashMap<&str, Vec<&str>> = HashMap::new();
    for edge in &snapshot.edges {
        undirected
            .entry(edge.from.as_str())
            .or_default()
            .push(edge.to.as_str());
        undirected
            .entry(edge.to.as_str())
            .or_default()
            .push(edge.from.as_str());
    }

    let mut ordered: Vec<&str> = snapshot.symbols.keys().map(|id| id.as_str()).collect();
    ordered.sort();

    let mut visited: HashSet<&str> = HashSet::new();
    let mut components = Vec::new();
    for start in ordered {
        if visited.contains(start) {
            continue;
        }
        let mut component = Vec::new();
        let mut queue = VecDeque::from([start]);
        visited.insert(start);
        while let Some(current) = queue.pop_front() {
            component.push(current.to_string());
            if let Some(neighbours) = undirected.get(current) {
                for next in neighbours {
                    if visited.insert(*next) {
                        queue.push_back(*next);
                    }
                }
            }
        }
        component.sort();
        components.push(component);
    }
    components.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
    components
}

#[derive(Clone, Copy, PartialEq)]
enum Colour {
    White,
    Grey,
    Black,
}

/// Cycle detection via iterative DFS with recursion-stack colouring. Each
/// cycle is the node sequence closing the back edge.
pub fn find_cycles(snapshot: &GraphSnapshot) -> Vec<Vec<String>> {
    let mut colour: HashMap<&str, Colour> = snapshot
        .symbols
        .keys()
        .map(|id| (id.as_str(), Colour::White))
        .collect();
    let mut ordered: Vec<&str> = snapshot.symbols.keys().map(|id| id.as_str()).collect();
    ordered.sort();

    let mut cycles: Vec<Vec<String>> = Vec::new();
    let mut seen_cycles: HashSet<Vec<String>> = HashSet::new();

    for root in ordered {
        if colour[root] != Colour::White {
            continue;
        }
        // Explicit stack: (node, next-neighbour-index).
        let mut stack: Vec<(&str, usize)> = vec![(root, 0)];
        let mut path: Vec<&str> = vec![root];
        colour.insert(root, Colour::Grey);

        loop {
            let Some(&(node, index)) = stack.last() else {
                break;
            };
            let neighbours = snapshot
                .outgoing
                .get(node)
                .map(|n| n.as_slice())
                .unwrap_or(&[]);
            if index >= neighbours.len() {
                colour.insert(node, Colour::Black);
                stack.pop();
                path.pop();
                continue;
            }
            if let Some(entry) = stack.last_mut() {
                entry.1 += 1;
            }
            let next = neighbours[index].0.as_str();
            match colour.get(next).copied().unwrap_or(Colour::White) {
                Colour::Grey => {
                    if let Some(start) = path.iter().position(|n| *n == next) {
                        let cycle: Vec<String> =
                            path[start..].iter().map(|n| n.to_string()).collect();
                        if seen_cycles.insert(normalise_cycle(&cycle)) {
                            cycles.push(cycle);
                        }
                    }
                }
                Colour::White => {
                    colour.insert(next, Colour::Grey);
                    path.push(next);
                    stack.push((next, 0));
                }
                Colour::Black => {}
            }
        }
    }
    cycles
}

/// Rotation-independent key so the same loop is reported once.
fn normalise_cycle(cycle: &[String]) -> Vec<String> {
    if cycle.is_empty() {
        return Vec::new();
    }
    let min_index = cycle
        .iter()
        .enumerate()
        .min_by(|a, b| a.1.cmp(b.1))
        .map(|(i, _)| i)
        .unwrap_or(0);
    let mut rotated = Vec::with_capacity(cycle.len());
    for offset in 0..cycle.len() {
        rotated.push(cycle[(min_index + offset) % cycle.len()].clone());
    }
    rotated
}

#[derive(Debug, Serialize, Clone)]
pub struct Bottleneck {
    pub symbol: SymbolCompact,
    pub score: f64,
    pub in_degree: usize,
    pub out_degree: usize,
}

/// `score = sqrt(indeg · outdeg)`, kept above the threshold, descending.
pub fn find_bottlenecks(snapshot: &GraphSnapshot) -> Vec<Bottleneck> {
    let mut out: Vec<Bottleneck> = snapshot
        .symbols
        .values()
        .filter_map(|symbol| {
            let in_degree = snapshot.in_degree(&symbol.id);
            let out_degree = snapshot.out_degree(&symbol.id);
            let score = ((in_degree * out_degree) as f64).sqrt();
            if score > BOTTLENECK_THRESHOLD {
                Some(Bottleneck {
                    symbol: SymbolCompact::from(symbol),
                    score,
                    in_degree,
                    out_degree,
                })
            } else {
                None
            }
        })
        .collect();
    out.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| a.symbol.id.cmp(&b.symbol.id))
    });
    out
}

/// Non-entry-point, non-exported symbols with a negligible rank and no
/// dependents.
pub fn find_dead_code(snapshot: &GraphSnapshot, ranks: &HashMap<String, f64>) -> Vec<Symbol> {
    let mut out: Vec<Symbol> = snapshot
        .symbols
        .values()
        .filter(|symbol| {
            !symbol.exported
                && !util::is_entry_point(&symbol.filepath)
                && ranks.get(&symbol.id).copied().unwrap_or(0.0) < DEAD_CODE_RANK_CEILING
                && snapshot.in_degree(&symbol.id) == 0
        })
        .cloned()
        .collect();
    out.sort_by(|a, b| a.id.cmp(&b.id));
    out
}

#[derive(Debug, Serialize, Clone)]
pub struct SimilarSymbol {
    pub symbol: SymbolCompact,
    pub score: f64,
    pub reason: String,
}

/// Scores every other symbol against the target: same kind, same language,
/// close name, same file. Only scores above the floor are kept.
pub fn find_similar(snapshot: &GraphSnapshot, target: &str, limit: usize) -> Vec<SimilarSymbol> {
    let Some(target_symbol) = snapshot.symbols.get(target) else {
        return Vec::new();
    };
    let mut out: Vec<SimilarSymbol> = Vec::new();
    for candidate in snapshot.symbols.values() {
        if candidate.id == target_symbol.id {
            continue;
        }
        let mut score = 0.0;
        let mut reasons: Vec<String> = Vec::new();
        if candidate.kind == target_symbol.kind {
            score += 0.3;
            reasons.push(format!("same kind ({})", candidate.kind));
        }
        if candidate.language == target_symbol.language {
            score += 0.2;
            reasons.push("same language".to_string());
        }
        let name_sim = util::name_similarity(&candidate.name, &target_symbol.name);
        if name_sim > NAME_SIMILARITY_FLOOR {
            score += name_sim * 0.3;
            reasons.push(format!("similar name ({:.0}%)", name_sim * 100.0));
        }
        if candidate.filepath == target_symbol.filepath {
            score += 0.2;
            reasons.push("same file".to_string());
        }
        if score > SIMILARITY_KEEP_FLOOR {
            out.push(SimilarSymbol {
                symbol: SymbolCompact::from(candidate),
                score,
                reason: reasons.join(", "),
            });
        }
    }
    out.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| a.symbol.id.cmp(&b.symbol.id))
    });
    out.truncate(limit);
    out
}
