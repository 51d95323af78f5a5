use std::collections::HashMap;
use std::path::Path;
use symdex::config::StoreConfig;
use symdex::graph::{Graph, ImpactOptions, RiskLevel};
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

fn symbol(id: &str, name: &str, filepath: &str, exported: bool) -> Symbol {
    Symbol {
        id: id.to_string(),
        name: name.to_string(),
        kind: SymbolKind::Function,
        filepath: filepath.to_string(),
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

/// X calls Y, Y calls Z: editing the file suggests fixing Z, then Y, then X.
#[test]
fn suggested_order_puts_dependencies_first() {
    let (_dir, store) = open_store();
    let x = symbol("/p/f.ts:X:0", "X", "/p/f.ts", true);
    let y = symbol("/p/f.ts:Y:4", "Y", "/p/f.ts", true);
    let z = symbol("/p/f.ts:Z:8", "Z", "/p/f.ts", true);
    store.put_symbols(&[x.clone(), y.clone(), z.clone()]).unwrap();
    store.add_edge(&DependencyEdge::new(&x.id, &y.id, EdgeType::Calls)).unwrap();
    store.add_edge(&DependencyEdge::new(&y.id, &z.id, EdgeType::Calls)).unwrap();

    let seeds = vec![x.id.clone(), y.id.clone(), z.id.clone()];
    let result = Graph::new(&store)
        .analyze_impact(&seeds, &ImpactOptions::default())
        .unwrap();

    let order = &result.suggested_order;
    let position = |id: &str| order.iter().position(|entry| entry == id).unwrap();
    assert!(position(&z.id) < position(&y.id));
    assert!(position(&y.id) < position(&x.id));
}

#[test]
fn reverse_traversal_collects_dependents() {
    let (_dir, store) = open_store();
    let core = symbol("/p/core.ts:core:0", "core", "/p/core.ts", true);
    let direct = symbol("/p/a.ts:direct:0", "direct", "/p/a.ts", true);
    let indirect = symbol("/p/b.ts:indirect:0", "indirect", "/p/b.ts", false);
    store
        .put_symbols(&[core.clone(), direct.clone(), indirect.clone()])
        .unwrap();
    store.add_edge(&DependencyEdge::new(&direct.id, &core.id, EdgeType::Calls)).unwrap();
    store.add_edge(&DependencyEdge::new(&indirect.id, &direct.id, EdgeType::Calls)).unwrap();

    let result = Graph::new(&store)
        .analyze_impact(&[core.id.clone()], &ImpactOptions::default())
        .unwrap();

    let direct_ids: Vec<&str> = result
        .directly_affected
        .iter()
        .map(|s| s.id.as_str())
        .collect();
    let transitive_ids: Vec<&str> = result
        .transitively_affected
        .iter()
        .map(|s| s.id.as_str())
        .collect();
    assert_eq!(direct_ids, vec![direct.id.as_str()]);
    assert_eq!(transitive_ids, vec![indirect.id.as_str()]);
    assert_eq!(result.impact_summary.total_affected, 2);

    let files: Vec<&str> = result
        .impact_summary
        .affected_files
        .iter()
        .map(|f| f.path.as_str())
        .collect();
    assert!(files.contains(&"/p/a.ts"));
    assert!(files.contains(&"/p/b.ts"));
}

#[test]
fn risk_scores_follow_rank_and_visibility() {
    let (_dir, store) = open_store();
    let core = symbol("/p/core.ts:core:0", "core", "/p/core.ts", true);
    let hot = symbol("/p/src/main/hot.ts:hot:0", "hot", "/p/src/main/hot.ts", true);
    let cold = symbol("/p/cold.ts:cold:0", "cold", "/p/cold.ts", false);
    store.put_symbols(&[core.clone(), hot.clone(), cold.clone()]).unwrap();
    store.add_edge(&DependencyEdge::new(&hot.id, &core.id, EdgeType::Calls)).unwrap();
    store.add_edge(&DependencyEdge::new(&cold.id, &core.id, EdgeType::Calls)).unwrap();
    store
        .set_pageranks(&HashMap::from([
            (core.id.clone(), 0.5),
            (hot.id.clone(), 0.4),
            (cold.id.clone(), 0.1),
        ]))
        .unwrap();

    let result = Graph::new(&store)
        .analyze_impact(&[core.id.clone()], &ImpactOptions::default())
        .unwrap();

    // hot: 0.4·100 + 0.4·200 + 50 (entry path) + 30 (exported) = 200 → critical.
    let hot_entry = result
        .high_risk
        .iter()
        .find(|entry| entry.symbol.id == hot.id)
        .unwrap();
    assert_eq!(hot_entry.level, RiskLevel::Critical);
    // cold: 0.1·100 + 0.1·200 = 30 → below the high bucket.
    assert!(!result.high_risk.iter().any(|entry| entry.symbol.id == cold.id));
    assert_eq!(result.impact_summary.risk_distribution.critical, 1);
    assert_eq!(result.impact_summary.risk_distribution.medium, 1);
}

#[test]
fn long_chains_become_critical_paths() {
    let (_dir, store) = open_store();
    let mut symbols = Vec::new();
    let mut edges = Vec::new();
    for i in 0..5 {
        symbols.push(symbol(
            &format!("/p/chain.ts:n{i}:{}", i * 4),
            &format!("n{i}"),
            "/p/chain.ts",
            false,
        ));
    }
    for i in 1..5 {
        // n1 depends on n0, n2 on n1, and so on.
        edges.push(DependencyEdge::new(
            symbols[i].id.clone(),
            symbols[i - 1].id.clone(),
            EdgeType::Calls,
        ));
    }
    store.put_symbols(&symbols).unwrap();
    store.add_edges(&edges).unwrap();

    let result = Graph::new(&store)
        .analyze_impact(&[symbols[0].id.clone()], &ImpactOptions::default())
        .unwrap();

    assert!(!result.impact_summary.critical_paths.is_empty());
    let longest = &result.impact_summary.critical_paths[0];
    assert_eq!(longest.target, symbols[4].id);
    assert!(longest.nodes.len() > 3);
}
