use std::fs;
use std::sync::Arc;
use symdex::config::Config;
use symdex::indexer::{IndexOptions, Indexer};
use symdex::model::EdgeType;
use symdex::query;
use symdex::store::Store;
use tempfile::TempDir;

/// Scratch project plus a store backed by a sibling temp directory; git
/// mining is off so runs do not depend on the ambient repository.
fn setup() -> (TempDir, TempDir, Config) {
    let project = TempDir::new().unwrap();
    let state = TempDir::new().unwrap();
    let mut config = Config::default();
    config.store.path = state.path().join("graph.sqlite");
    config.git.enabled = false;
    (project, state, config)
}

fn indexer(config: &Config) -> (Arc<Store>, Indexer) {
    let store = Arc::new(Store::new(&config.store).unwrap());
    let indexer = Indexer::new(config.clone(), store.clone()).unwrap();
    (store, indexer)
}

fn abs(project: &TempDir, rel: &str) -> String {
    let root = fs::canonicalize(project.path()).unwrap();
    symdex::util::normalize_path(&root.join(rel))
}

#[test]
fn empty_project_yields_zero_stats() {
    let (project, _state, config) = setup();
    fs::write(project.path().join("README.md"), "# notes\n").unwrap();
    fs::create_dir_all(project.path().join("node_modules/dep")).unwrap();
    fs::write(project.path().join("node_modules/dep/index.js"), "x()\n").unwrap();

    let (store, indexer) = indexer(&config);
    let stats = indexer
        .index_project(project.path(), &IndexOptions::default())
        .unwrap();

    assert_eq!(stats.files_indexed, 0);
    assert_eq!(stats.symbols_found, 0);
    assert_eq!(stats.dependencies_found, 0);
    assert!(stats.errors.is_empty());

    let overview =
        query::get_project_overview(&store, &query::OverviewOptions::default()).unwrap();
    assert_eq!(overview.stats.files, 0);
    assert_eq!(overview.stats.symbols, 0);
    assert_eq!(overview.stats.edges, 0);
}

#[test]
fn two_file_typescript_dependency() {
    let (project, _state, config) = setup();
    fs::write(project.path().join("a.ts"), "export class A {}\n").unwrap();
    fs::write(
        project.path().join("b.ts"),
        "import { A } from \"./a\";\nclass B extends A {}\n",
    )
    .unwrap();

    let (store, indexer) = indexer(&config);
    let stats = indexer
        .index_project(project.path(), &IndexOptions::default())
        .unwrap();
    assert_eq!(stats.files_indexed, 2);
    assert!(stats.errors.is_empty());

    let a_id = format!("{}:A:0", abs(&project, "a.ts"));

    // A ranks before B: name match plus the dependent boosts its rank.
    let results =
        query::search_symbols(&store, "A", &query::SearchOptions::default()).unwrap();
    assert!(!results.is_empty());
    assert_eq!(results[0].name, "A");
    let position_b = results.iter().position(|s| s.name == "B");
    assert!(position_b.map(|p| p > 0).unwrap_or(true));

    let dependents =
        query::get_dependents(&store, &a_id, 1, &query::DependentOptions::default()).unwrap();
    assert!(dependents
        .direct
        .iter()
        .any(|entry| entry.edge.edge_type == EdgeType::Extends
            && entry.symbol.as_ref().map(|s| s.name.as_str()) == Some("B")));
}

#[test]
fn impact_ordering_within_one_file() {
    let (project, _state, config) = setup();
    fs::write(
        project.path().join("f.ts"),
        "function x() { y(); }\nfunction y() { z(); }\nfunction z() {}\n",
    )
    .unwrap();

    let (store, indexer) = indexer(&config);
    indexer
        .index_project(project.path(), &IndexOptions::default())
        .unwrap();

    let file = abs(&project, "f.ts");
    let result =
        query::get_impact(&store, &[file.clone()], &query::ImpactQueryOptions::default())
            .unwrap();

    let position = |name: &str| {
        result
            .suggested_order
            .iter()
            .position(|id| id.contains(&format!(":{name}:")))
            .unwrap()
    };
    assert!(position("z") < position("y"));
    assert!(position("y") < position("x"));
}

#[test]
fn textual_cycle_is_reported() {
    let (project, _state, config) = setup();
    fs::write(
        project.path().join("cycle.ts"),
        "function ping() { pong(); }\nfunction pong() { ping(); }\n",
    )
    .unwrap();

    let (store, indexer) = indexer(&config);
    indexer
        .index_project(project.path(), &IndexOptions::default())
        .unwrap();

    let cycles = symdex::graph::Graph::new(&store).find_cycles().unwrap();
    assert_eq!(cycles.len(), 1);
    assert_eq!(cycles[0].len(), 2);
    assert!(cycles[0].iter().any(|id| id.contains(":ping:")));
    assert!(cycles[0].iter().any(|id| id.contains(":pong:")));
}

#[test]
fn deletion_removes_symbols_and_edges() {
    let (project, _state, config) = setup();
    fs::write(project.path().join("a.ts"), "export class A {}\n").unwrap();
    fs::write(
        project.path().join("b.ts"),
        "import { A } from \"./a\";\nclass B extends A {}\n",
    )
    .unwrap();

    let (store, indexer) = indexer(&config);
    indexer
        .index_project(project.path(), &IndexOptions::default())
        .unwrap();

    let a_file = abs(&project, "a.ts");
    let a_id = format!("{a_file}:A:0");
    assert!(!store.symbols_by_file(&a_file).unwrap().is_empty());

    fs::remove_file(project.path().join("a.ts")).unwrap();
    indexer
        .index_project(
            project.path(),
            &IndexOptions {
                incremental: true,
                force: false,
            },
        )
        .unwrap();

    assert!(store.symbols_by_file(&a_file).unwrap().is_empty());
    // No edge endpoint references the deleted IDs anywhere.
    for edge in store.all_edges().unwrap() {
        assert_ne!(edge.from, a_id);
        assert_ne!(edge.to, a_id);
    }
    assert!(store.get_file_tracking(&a_file).unwrap().is_none());
}

#[test]
fn reindex_without_changes_is_idempotent() {
    let (project, _state, config) = setup();
    fs::write(
        project.path().join("lib.ts"),
        "export class Core {}\nexport function use() { return new Core(); }\n",
    )
    .unwrap();

    let (store, indexer) = indexer(&config);
    indexer
        .index_project(project.path(), &IndexOptions::default())
        .unwrap();
    let symbols_before = store.all_symbol_ids().unwrap();
    let edges_before = store.all_edges().unwrap();
    let ranks_before = store.pagerank_all().unwrap();

    indexer
        .index_project(project.path(), &IndexOptions::default())
        .unwrap();
    assert_eq!(store.all_symbol_ids().unwrap(), symbols_before);
    assert_eq!(store.all_edges().unwrap(), edges_before);
    let ranks_after = store.pagerank_all().unwrap();
    for (id, rank) in &ranks_before {
        assert!((rank - ranks_after[id]).abs() < 1e-9);
    }
}

#[test]
fn incremental_matches_full_after_edit() {
    let (project, _state, config) = setup();
    fs::write(project.path().join("a.ts"), "export class A {}\n").unwrap();
    fs::write(
        project.path().join("b.ts"),
        "import { A } from \"./a\";\nclass B extends A {}\n",
    )
    .unwrap();

    // Incremental run after editing a.ts.
    let (store_inc, indexer_inc) = indexer(&config);
    indexer_inc
        .index_project(project.path(), &IndexOptions::default())
        .unwrap();
    fs::write(
        project.path().join("a.ts"),
        "// moved\nexport class A {}\n",
    )
    .unwrap();
    // mtime granularity is one second on some filesystems.
    let later = std::time::SystemTime::now() + std::time::Duration::from_secs(2);
    let file = fs::File::options()
        .write(true)
        .open(project.path().join("a.ts"))
        .unwrap();
    file.set_modified(later).unwrap();
    drop(file);
    indexer_inc
        .index_project(
            project.path(),
            &IndexOptions {
                incremental: true,
                force: false,
            },
        )
        .unwrap();

    // Fresh full run over the same final tree.
    let state2 = TempDir::new().unwrap();
    let mut config2 = config.clone();
    config2.store.path = state2.path().join("graph.sqlite");
    let (store_full, indexer_full) = {
        let store = Arc::new(Store::new(&config2.store).unwrap());
        let indexer = Indexer::new(config2.clone(), store.clone()).unwrap();
        (store, indexer)
    };
    indexer_full
        .index_project(project.path(), &IndexOptions::default())
        .unwrap();

    assert_eq!(
        store_inc.all_symbol_ids().unwrap(),
        store_full.all_symbol_ids().unwrap()
    );
    let mut inc_edges = store_inc.all_edges().unwrap();
    let mut full_edges = store_full.all_edges().unwrap();
    let key = |e: &symdex::model::DependencyEdge| (e.from.clone(), e.to.clone(), e.edge_type);
    inc_edges.sort_by_key(key);
    full_edges.sort_by_key(key);
    assert_eq!(
        inc_edges.iter().map(key).collect::<Vec<_>>(),
        full_edges.iter().map(key).collect::<Vec<_>>()
    );
}

#[test]
fn oversize_and_unknown_files_are_skipped() {
    let (project, _state, mut config) = setup();
    config.indexer.max_file_size = 64;
    fs::write(project.path().join("small.ts"), "export class Small {}\n").unwrap();
    fs::write(
        project.path().join("big.ts"),
        format!("// {}\nexport class Big {{}}\n", "x".repeat(200)),
    )
    .unwrap();
    fs::write(project.path().join("notes.txt"), "not source\n").unwrap();

    let (store, indexer) = indexer(&config);
    let stats = indexer
        .index_project(project.path(), &IndexOptions::default())
        .unwrap();
    assert_eq!(stats.files_indexed, 1);
    let files = store.indexed_files().unwrap();
    assert_eq!(files.len(), 1);
    assert!(files[0].ends_with("small.ts"));
}

#[test]
fn held_lock_refuses_second_writer() {
    let (project, _state, config) = setup();
    fs::write(project.path().join("a.ts"), "export class A {}\n").unwrap();

    let (store, indexer) = indexer(&config);
    let root = fs::canonicalize(project.path()).unwrap();
    store.set_project_context(&root);
    assert!(store.acquire_lock("indexing", 60_000).unwrap());

    let err = indexer
        .index_project(project.path(), &IndexOptions::default())
        .unwrap_err();
    assert!(err.to_string().contains("indexing"));
    store.release_lock("indexing").unwrap();

    // After release the same run succeeds and releases on completion.
    indexer
        .index_project(project.path(), &IndexOptions::default())
        .unwrap();
    assert!(store.acquire_lock("indexing", 60_000).unwrap());
    store.release_lock("indexing").unwrap();
}

#[test]
fn file_structure_nests_members() {
    let (project, _state, config) = setup();
    fs::write(
        project.path().join("shape.ts"),
        "export class Shape {\n  area(): number { return 0; }\n}\nclass Hidden {}\n",
    )
    .unwrap();

    let (store, indexer) = indexer(&config);
    indexer
        .index_project(project.path(), &IndexOptions::default())
        .unwrap();

    let path = abs(&project, "shape.ts");
    let public = query::get_file_structure(&store, &path, false).unwrap();
    assert_eq!(public.symbols.len(), 1);
    assert_eq!(public.symbols[0].symbol.name, "Shape");
    assert_eq!(public.symbols[0].children.len(), 1);
    assert_eq!(public.symbols[0].children[0].symbol.name, "area");

    let all = query::get_file_structure(&store, &path, true).unwrap();
    assert_eq!(all.symbols.len(), 2);
}

#[test]
fn get_symbol_is_fuzzy_and_ranked() {
    let (project, _state, config) = setup();
    fs::write(
        project.path().join("api.ts"),
        "export class Indexer {}\nexport class IndexerPool {}\n",
    )
    .unwrap();

    let (store, indexer) = indexer(&config);
    indexer
        .index_project(project.path(), &IndexOptions::default())
        .unwrap();

    let matches =
        query::get_symbol(&store, "Indexer", &query::GetSymbolOptions::default()).unwrap();
    assert!(matches.len() >= 2);
    assert_eq!(matches[0].symbol.name, "Indexer");
    assert!(matches[0].score > matches[1].score);

    let fuzzy =
        query::get_symbol(&store, "indexer", &query::GetSymbolOptions::default()).unwrap();
    assert_eq!(fuzzy[0].symbol.name, "Indexer");
}
