//! Path search: breadth-first with edge-type priority ordering, and a
//! Dijkstra variant that prefers high-PageRank intermediates.

use crate::graph::GraphSnapshot;
use crate::model::SymbolCompact;
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap, VecDeque};

const COST_EPSILON: f64 = 1e-6;

#[derive(Debug, Serialize, Clone)]
pub struct GraphPath {
    pub nodes: Vec<SymbolCompact>,
    pub distance: usize,
}

/// Breadth-first search from `from` to `to`; neighbours expand in
/// edge-type priority order (imports first, uses last).
pub fn find_path(snapshot: &GraphSnapshot, from: &str, to: &str) -> Option<GraphPath> {
    if !snapshot.symbols.contains_key(from) || !snapshot.symbols.contains_key(to) {
        return None;
    }
    let mut previous: HashMap<&str, &str> = HashMap::new();
    let mut distance: HashMap<&str, usize> = HashMap::new();
    let mut queue: VecDeque<&str> = VecDeque::new();
    distance.insert(from, 0);
    queue.push_back(from);

    while let Some(current) = queue.pop_front() {
        if current == to {
            return Some(reconstruct(snapshot, &previous, from, to, distance[to]));
        }
        let Some(neighbours) = snapshot.outgoing.get(current) else {
            continue;
        };
        for (next, _) in neighbours {
            if distance.contains_key(next.as_str()) {
                continue;
            }
            distance.insert(next.as_str(), distance[current] + 1);
            previous.insert(next.as_str(), current);
            queue.push_back(next.as_str());
        }
    }
    None
}

/// Per-reachable-node shortest path from `from`.
pub fn find_shortest_paths(snapshot: &GraphSnapshot, from: &str) -> HashMap<String, GraphPath> {
    let mut out = HashMap::new();
    if !snapshot.symbols.contains_key(from) {
        return out;
    }
    let mut previous: HashMap<&str, &str> = HashMap::new();
    let mut distance: HashMap<&str, usize> = HashMap::new();
    let mut queue: VecDeque<&str> = VecDeque::new();
    distance.insert(from, 0);
    queue.push_back(from);

    while let Some(current) = queue.pop_front() {
        let Some(neighbours) = snapshot.outgoing.get(current) else {
            continue;
        };
        for (next, _) in neighbours {
            if distance.contains_key(next.as_str()) {
                continue;
            }
            distance.insert(next.as_str(), distance[current] + 1);
            previous.insert(next.as_str(), current);
            queue.push_back(next.as_str());
        }
    }

    for (node, dist) in &distance {
        if *node == from {
            continue;
        }
        out.insert(
            node.to_string(),
            reconstruct(snapshot, &previous, from, node, *dist),
        );
    }
    out
}

#[derive(PartialEq)]
struct HeapEntry {
    cost: f64,
    node: String,
}

impl Eq for HeapEntry {}

impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed: BinaryHeap is a max-heap, Dijkstra wants the minimum.
        other
            .cost
            .total_cmp(&self.cost)
            .then_with(|| other.node.cmp(&self.node))
    }
}

impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Dijkstra with edge cost `1 / (1000·PR(to) + ε)`: paths through
/// well-ranked symbols are cheap, so the critical chain surfaces.
pub fn find_critical_path(
    snapshot: &GraphSnapshot,
    ranks: &HashMap<String, f64>,
    from: &str,
    to: &str,
) -> Option<GraphPath> {
    if !snapshot.symbols.contains_key(from) || !snapshot.symbols.contains_key(to) {
        return None;
    }
    let mut previous: HashMap<String, String> = HashMap::new();
    let mut best: HashMap<String, f64> = HashMap::new();
    let mut heap = BinaryHeap::new();
    best.insert(from.to_string(), 0.0);
    heap.push(HeapEntry {
        cost: 0.0,
        node: from.to_string(),
    });

    while let Some(HeapEntry { cost, node }) = heap.pop() {
        if node == to {
            break;
        }
        if cost > best.get(&node).copied().unwrap_or(f64::INFINITY) {
            continue;
        }
        let Some(neighbours) = snapshot.outgoing.get(&node) else {
            continue;
        };
        for (next, _) in neighbours {
            let rank = ranks.get(next).copied().unwrap_or(0.0);
            let edge_cost = 1.0 / (1000.0 * rank + COST_EPSILON);
            let candidate = cost + edge_cost;
            if candidate < best.get(next.as_str()).copied().unwrap_or(f64::INFINITY) {
                best.insert(next.clone(), candidate);
                previous.insert(next.clone(), node.clone());
                heap.push(HeapEntry {
                    cost: candidate,
                    node: next.clone(),
                });
            }
        }
    }

    if !best.contains_key(to) {
        return None;
    }
    let mut chain = vec![to.to_string()];
    let mut current = to.to_string();
    while let Some(prev) = previous.get(&current) {
        chain.push(prev.clone());
        current = prev.clone();
    }
    chain.reverse();
    let distance = chain.len().saturating_sub(1);
    Some(GraphPath {
        nodes: chain
            .iter()
            .filter_map(|id| snapshot.symbols.get(id).map(SymbolCompact::from))
            .collect(),
        distance,
    })
}

fn reconstruct(
    snapshot: &GraphSnapshot,
    previous: &HashMap<&str, &str>,
    from: &str,
    to: &str,
    distance: usize,
) -> GraphPath {
    let mut chain = vec![to];
    let mut current = to;
    while current != from {
        match previous.get(current) {
            Some(prev) => {
                chain.push(*prev);
                current = prev;
            }
            None => break,
        }
    }
    chain.reverse();
    GraphPath {
        nodes: chain
            .iter()
            .filter_map(|id| snapshot.symbols.get(*id).map(SymbolCompact::from))
            .collect(),
        distance,
    }
}
