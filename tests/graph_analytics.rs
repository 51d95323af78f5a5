use std::collections::HashMap;
use std::path::Path;
use symdex::config::{PageRankConfig, StoreConfig};
use symdex::graph::Graph;
use symdex::model::{DependencyEdge, EdgeType, Location, Symbol, SymbolKind};
use symdex::store::Store;
use tempfile::TempDir;

fn open_store() -> (TempDir, Store) {
    let dir = TempDir::new().unwrap();
    let config = StoreConfig {
        path: dir.path().join("graph.sqlite"),
        key_prefix: "symdex".to_string(),
    };
    let store = Store::new(&config).unwrap();
    store.set_project_context(Path::new("/p"));
    (dir, store)
}

fn symbol(id: &str, name: &str, kind: SymbolKind, exported: bool) -> Symbol {
    Symbol {
        id: id.to_string(),
        name: name.to_string(),
        kind,
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
fn pagerank_ranks_referenced_core_above_leaf() {
    let (_dir, store) = open_store();
    let core = symbol("/p/lib.ts:Core:0", "Core", SymbolKind::Class, true);
    let leaf = symbol("/p/lib.ts:Leaf:2", "Leaf", SymbolKind::Class, true);
    let mut symbols = vec![core.clone(), leaf.clone()];
    let mut edges = Vec::new();
    for i in 0..20 {
        let user = symbol(
            &format!("/p/lib.ts:User{i}:{}", 10 + i),
            &format!("User{i}"),
            SymbolKind::Class,
            true,
        );
        edges.push(DependencyEdge::new(user.id.clone(), core.id.clone(), EdgeType::Uses));
        symbols.push(user);
    }
    store.put_symbols(&symbols).unwrap();
    store.add_edges(&edges).unwrap();

    let graph = Graph::new(&store);
    let ranks = graph.compute_pagerank(&PageRankConfig::default()).unwrap();
    store.set_pageranks(&ranks).unwrap();

    let core_rank = store.get_symbol(&core.id).unwrap().unwrap().page_rank.unwrap();
    let leaf_rank = store.get_symbol(&leaf.id).unwrap().unwrap().page_rank.unwrap();
    assert!(core_rank > leaf_rank);

    let top = graph.get_top_symbols(1).unwrap();
    assert_eq!(top[0].symbol.id, core.id);

    let total: f64 = ranks.values().sum();
    assert!((total - 1.0).abs() < 1e-9);
}

#[test]
fn pagerank_is_stable_across_recomputation() {
    let (_dir, store) = open_store();
    let a = symbol("/p/lib.ts:A:0", "A", SymbolKind::Class, true);
    let b = symbol("/p/lib.ts:B:2", "B", SymbolKind::Function, false);
    store.put_symbols(&[a.clone(), b.clone()]).unwrap();
    store
        .add_edge(&DependencyEdge::new(&b.id, &a.id, EdgeType::Calls))
        .unwrap();

    let graph = Graph::new(&store);
    let first = graph.compute_pagerank(&PageRankConfig::default()).unwrap();
    let second = graph.compute_pagerank(&PageRankConfig::default()).unwrap();
    for (id, rank) in &first {
        assert!((rank - second[id]).abs() < 1e-9);
    }
}

#[test]
fn bfs_path_and_shortest_paths() {
    let (_dir, store) = open_store();
    let a = symbol("/p/lib.ts:A:0", "A", SymbolKind::Class, true);
    let b = symbol("/p/lib.ts:B:2", "B", SymbolKind::Class, true);
    let c = symbol("/p/lib.ts:C:4", "C", SymbolKind::Class, true);
    store.put_symbols(&[a.clone(), b.clone(), c.clone()]).unwrap();
    store.add_edge(&DependencyEdge::new(&a.id, &b.id, EdgeType::Calls)).unwrap();
    store.add_edge(&DependencyEdge::new(&b.id, &c.id, EdgeType::Calls)).unwrap();

    let graph = Graph::new(&store);
    let path = graph.find_path(&a.id, &c.id).unwrap().unwrap();
    assert_eq!(path.distance, 2);
    let ids: Vec<&str> = path.nodes.iter().map(|n| n.id.as_str()).collect();
    assert_eq!(ids, vec![a.id.as_str(), b.id.as_str(), c.id.as_str()]);

    let all = graph.find_shortest_paths(&a.id).unwrap();
    assert_eq!(all.len(), 2);
    assert_eq!(all[&b.id].distance, 1);
    assert_eq!(all[&c.id].distance, 2);

    assert!(graph.find_path(&c.id, &a.id).unwrap().is_none());
}

#[test]
fn critical_path_prefers_ranked_intermediates() {
    let (_dir, store) = open_store();
    let start = symbol("/p/lib.ts:Start:0", "Start", SymbolKind::Function, true);
    let hub = symbol("/p/lib.ts:Hub:2", "Hub", SymbolKind::Class, true);
    let side = symbol("/p/lib.ts:Side:4", "Side", SymbolKind::Class, false);
    let end = symbol("/p/lib.ts:End:6", "End", SymbolKind::Function, true);
    store
        .put_symbols(&[start.clone(), hub.clone(), side.clone(), end.clone()])
        .unwrap();
    store.add_edge(&DependencyEdge::new(&start.id, &hub.id, EdgeType::Calls)).unwrap();
    store.add_edge(&DependencyEdge::new(&start.id, &side.id, EdgeType::Calls)).unwrap();
    store.add_edge(&DependencyEdge::new(&hub.id, &end.id, EdgeType::Calls)).unwrap();
    store.add_edge(&DependencyEdge::new(&side.id, &end.id, EdgeType::Calls)).unwrap();
    store
        .set_pageranks(&HashMap::from([
            (start.id.clone(), 0.1),
            (hub.id.clone(), 0.6),
            (side.id.clone(), 0.1),
            (end.id.clone(), 0.2),
        ]))
        .unwrap();

    let graph = Graph::new(&store);
    let path = graph.find_critical_path(&start.id, &end.id).unwrap().unwrap();
    let ids: Vec<&str> = path.nodes.iter().map(|n| n.id.as_str()).collect();
    assert_eq!(ids, vec![start.id.as_str(), hub.id.as_str(), end.id.as_str()]);
}

#[test]
fn components_group_connected_symbols() {
    let (_dir, store) = open_store();
    let a = symbol("/p/lib.ts:A:0", "A", SymbolKind::Class, true);
    let b = symbol("/p/lib.ts:B:2", "B", SymbolKind::Class, true);
    let lone = symbol("/p/lib.ts:Lone:4", "Lone", SymbolKind::Class, true);
    store.put_symbols(&[a.clone(), b.clone(), lone.clone()]).unwrap();
    store.add_edge(&DependencyEdge::new(&a.id, &b.id, EdgeType::Uses)).unwrap();

    let components = Graph::new(&store).connected_components().unwrap();
    assert_eq!(components.len(), 2);
    assert_eq!(components[0].len(), 2);
    assert_eq!(components[1], vec![lone.id.clone()]);
}

#[test]
fn two_node_cycle_is_detected() {
    let (_dir, store) = open_store();
    let even = symbol("/p/lib.ts:isEven:0", "isEven", SymbolKind::Function, true);
    let odd = symbol("/p/lib.ts:isOdd:4", "isOdd", SymbolKind::Function, true);
    store.put_symbols(&[even.clone(), odd.clone()]).unwrap();
    store.add_edge(&DependencyEdge::new(&even.id, &odd.id, EdgeType::Calls)).unwrap();
    store.add_edge(&DependencyEdge::new(&odd.id, &even.id, EdgeType::Calls)).unwrap();

    let cycles = Graph::new(&store).find_cycles().unwrap();
    assert_eq!(cycles.len(), 1);
    let cycle = &cycles[0];
    assert_eq!(cycle.len(), 2);
    assert!(cycle.contains(&even.id));
    assert!(cycle.contains(&odd.id));
}

#[test]
fn bottleneck_needs_high_fan_in_and_out() {
    let (_dir, store) = open_store();
    let hub = symbol("/p/lib.ts:Hub:0", "Hub", SymbolKind::Class, true);
    let mut symbols = vec![hub.clone()];
    let mut edges = Vec::new();
    for i in 0..5 {
        let source = symbol(
            &format!("/p/lib.ts:In{i}:{}", 10 + i),
            &format!("In{i}"),
            SymbolKind::Function,
            false,
        );
        let sink = symbol(
            &format!("/p/lib.ts:Out{i}:{}", 30 + i),
            &format!("Out{i}"),
            SymbolKind::Function,
            false,
        );
        edges.push(DependencyEdge::new(source.id.clone(), hub.id.clone(), EdgeType::Calls));
        edges.push(DependencyEdge::new(hub.id.clone(), sink.id.clone(), EdgeType::Calls));
        symbols.push(source);
        symbols.push(sink);
    }
    store.put_symbols(&symbols).unwrap();
    store.add_edges(&edges).unwrap();

    let bottlenecks = Graph::new(&store).find_bottlenecks().unwrap();
    assert_eq!(bottlenecks.len(), 1);
    assert_eq!(bottlenecks[0].symbol.id, hub.id);
    assert!((bottlenecks[0].score - 5.0).abs() < 1e-9);
}

#[test]
fn dead_code_requires_no_dependents_and_no_export() {
    let (_dir, store) = open_store();
    let dead = symbol("/p/lib.ts:unused:0", "unused", SymbolKind::Function, false);
    let live = symbol("/p/lib.ts:used:4", "used", SymbolKind::Function, false);
    let caller = symbol("/p/lib.ts:caller:8", "caller", SymbolKind::Function, true);
    store.put_symbols(&[dead.clone(), live.clone(), caller.clone()]).unwrap();
    store.add_edge(&DependencyEdge::new(&caller.id, &live.id, EdgeType::Calls)).unwrap();
    store
        .set_pageranks(&HashMap::from([
            (dead.id.clone(), 1e-6),
            (live.id.clone(), 0.4),
            (caller.id.clone(), 0.6),
        ]))
        .unwrap();

    let dead_code = Graph::new(&store).find_dead_code().unwrap();
    let ids: Vec<&str> = dead_code.iter().map(|s| s.id.as_str()).collect();
    assert_eq!(ids, vec![dead.id.as_str()]);
}

#[test]
fn similarity_ranks_kind_language_and_name() {
    let (_dir, store) = open_store();
    let target = symbol("/p/lib.ts:Parser:0", "Parser", SymbolKind::Class, true);
    let twin = symbol("/p/lib.ts:Parsers:4", "Parsers", SymbolKind::Class, true);
    let far = symbol("/p/lib.ts:Renderer:8", "Renderer", SymbolKind::Function, true);
    store.put_symbols(&[target.clone(), twin.clone(), far.clone()]).unwrap();

    let similar = Graph::new(&store).find_similar(&target.id, 5).unwrap();
    assert!(!similar.is_empty());
    assert_eq!(similar[0].symbol.id, twin.id);
    assert!(similar[0].score > 0.7);
    assert!(similar[0].reason.contains("similar name"));
}
