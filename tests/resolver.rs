use std::collections::HashSet;
use std::path::Path;
use symdex::config::StoreConfig;
use symdex::indexer::resolver::{
    self, compute_transitive_dependencies, compute_transitive_dependents, resolve_specifier,
};
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

fn symbol(
    id: &str,
    name: &str,
    filepath: &str,
    line: i64,
    signature: &str,
    exported: bool,
) -> Symbol {
    Symbol {
        id: id.to_string(),
        name: name.to_string(),
        kind: SymbolKind::Class,
        filepath: filepath.to_string(),
        location: Location::new(line, 0, line + 2, 1),
        signature: Some(signature.to_string()),
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
fn specifier_resolution_probes_extensions_and_index() {
    let files: HashSet<String> = [
        "/p/src/a.ts",
        "/p/src/lib/index.ts",
        "/p/src/util.py",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();

    assert_eq!(
        resolve_specifier("/p/src/b.ts", "./a", &files),
        Some("/p/src/a.ts".to_string())
    );
    assert_eq!(
        resolve_specifier("/p/src/b.ts", "./lib", &files),
        Some("/p/src/lib/index.ts".to_string())
    );
    assert_eq!(
        resolve_specifier("/p/src/deep/c.ts", "../a", &files),
        Some("/p/src/a.ts".to_string())
    );
    // Python-style module specifier resolved beside the importer.
    assert_eq!(
        resolve_specifier("/p/src/main.py", "util", &files),
        Some("/p/src/util.py".to_string())
    );
    assert_eq!(resolve_specifier("/p/src/b.ts", "left-pad", &files), None);
}

#[test]
fn import_edges_link_representative_to_exports() {
    let (_dir, store) = open_store();
    let a = symbol("/p/a.ts:A:0", "A", "/p/a.ts", 1, "class A", true);
    let hidden = symbol("/p/a.ts:Hidden:4", "Hidden", "/p/a.ts", 5, "class Hidden", false);
    let b = symbol("/p/b.ts:B:1", "B", "/p/b.ts", 2, "class B", true);
    let raw = DependencyEdge::new("/p/b.ts", "./a", EdgeType::Imports);

    let edges = resolver::resolve_batch(
        &store,
        &[a.clone(), hidden.clone(), b.clone()],
        &[raw.clone()],
    )
    .unwrap();

    // The raw file edge is retained and the symbol-level link added.
    assert!(edges.iter().any(|e| e.from == "/p/b.ts" && e.to == "./a"));
    assert!(edges
        .iter()
        .any(|e| e.edge_type == EdgeType::Imports && e.from == b.id && e.to == a.id));
    // Non-exported symbols never become import targets.
    assert!(!edges.iter().any(|e| e.to == hidden.id));
}

#[test]
fn unresolved_import_is_retained_as_file_edge() {
    let (_dir, store) = open_store();
    let b = symbol("/p/b.ts:B:1", "B", "/p/b.ts", 2, "class B", true);
    let raw = DependencyEdge::new("/p/b.ts", "node:fs", EdgeType::Imports);
    let edges = resolver::resolve_batch(&store, &[b], &[raw]).unwrap();
    assert_eq!(edges.len(), 1);
    assert_eq!(edges[0].from, "/p/b.ts");
    assert_eq!(edges[0].to, "node:fs");
}

#[test]
fn signature_matching_classifies_edge_kinds() {
    let (_dir, store) = open_store();
    let base = symbol("/p/x.ts:Base:0", "Base", "/p/x.ts", 1, "class Base", true);
    let iface = symbol("/p/x.ts:Api:4", "Api", "/p/x.ts", 5, "interface Api", true);
    let widget = symbol("/p/x.ts:Widget:8", "Widget", "/p/x.ts", 9, "class Widget", true);
    let helper = symbol("/p/x.ts:helper:12", "helper", "/p/x.ts", 13, "function helper()", true);
    let child = symbol(
        "/p/x.ts:Child:16",
        "Child",
        "/p/x.ts",
        17,
        "class Child extends Base implements Api",
        true,
    );
    let factory = symbol(
        "/p/x.ts:factory:22",
        "factory",
        "/p/x.ts",
        23,
        "const factory = () => new Widget(helper())",
        true,
    );
    let noter = symbol(
        "/p/x.ts:noter:26",
        "noter",
        "/p/x.ts",
        27,
        "const noter: Base",
        true,
    );

    let symbols = vec![base.clone(), iface.clone(), widget.clone(), helper.clone(), child.clone(), factory.clone(), noter.clone()];
    let edges = resolver::resolve_batch(&store, &symbols, &[]).unwrap();

    let has = |from: &str, to: &str, kind: EdgeType| {
        edges
            .iter()
            .any(|e| e.from == from && e.to == to && e.edge_type == kind)
    };
    assert!(has(&child.id, &base.id, EdgeType::Extends));
    assert!(has(&child.id, &iface.id, EdgeType::Implements));
    assert!(has(&factory.id, &widget.id, EdgeType::Instantiates));
    assert!(has(&factory.id, &helper.id, EdgeType::Calls));
    assert!(has(&noter.id, &base.id, EdgeType::Uses));
}

#[test]
fn whole_word_matching_avoids_prefix_false_positives() {
    let (_dir, store) = open_store();
    let parse = symbol("/p/x.ts:Parse:0", "Parse", "/p/x.ts", 1, "class Parse", true);
    let error = symbol(
        "/p/x.ts:ParseError:4",
        "ParseError",
        "/p/x.ts",
        5,
        "class ParseError extends Failure",
        true,
    );
    let edges = resolver::resolve_batch(&store, &[parse.clone(), error.clone()], &[]).unwrap();
    // "ParseError" must not register a reference to "Parse".
    assert!(!edges.iter().any(|e| e.from == error.id && e.to == parse.id));
}

#[test]
fn bare_name_edges_resolve_through_the_name_index() {
    let (_dir, store) = open_store();
    let a = symbol("/p/a.ts:Target:0", "Target", "/p/a.ts", 1, "class Target", true);
    let b = symbol("/p/b.ts:Caller:0", "Caller", "/p/b.ts", 1, "class Caller", true);
    let structural = DependencyEdge::new(b.id.clone(), "Target", EdgeType::Calls);
    let dangling = DependencyEdge::new(b.id.clone(), "Nowhere", EdgeType::Calls);

    let edges =
        resolver::resolve_batch(&store, &[a.clone(), b.clone()], &[structural, dangling]).unwrap();
    assert!(edges
        .iter()
        .any(|e| e.from == b.id && e.to == a.id && e.edge_type == EdgeType::Calls));
    // Unresolvable bare names are dropped quietly.
    assert!(!edges.iter().any(|e| e.to == "Nowhere"));
}

#[test]
fn transitive_closures_follow_both_directions() {
    let (_dir, store) = open_store();
    let a = symbol("/p/x.ts:A:0", "A", "/p/x.ts", 1, "class A", true);
    let b = symbol("/p/x.ts:B:4", "B", "/p/x.ts", 5, "class B", true);
    let c = symbol("/p/x.ts:C:8", "C", "/p/x.ts", 9, "class C", true);
    store.put_symbols(&[a.clone(), b.clone(), c.clone()]).unwrap();
    store.add_edge(&DependencyEdge::new(&a.id, &b.id, EdgeType::Calls)).unwrap();
    store.add_edge(&DependencyEdge::new(&b.id, &c.id, EdgeType::Calls)).unwrap();

    let deps = compute_transitive_dependencies(&store, &a.id).unwrap();
    assert_eq!(deps, vec![b.id.clone(), c.id.clone()]);

    let dependents = compute_transitive_dependents(&store, &c.id).unwrap();
    assert_eq!(dependents, vec![a.id.clone(), b.id.clone()]);
}

#[test]
fn bounded_reports_honour_depth_and_types() {
    let (_dir, store) = open_store();
    let a = symbol("/p/x.ts:A:0", "A", "/p/x.ts", 1, "class A", true);
    let b = symbol("/p/x.ts:B:4", "B", "/p/x.ts", 5, "class B", true);
    let c = symbol("/p/x.ts:C:8", "C", "/p/x.ts", 9, "class C", true);
    store.put_symbols(&[a.clone(), b.clone(), c.clone()]).unwrap();
    store.add_edge(&DependencyEdge::new(&a.id, &b.id, EdgeType::Calls)).unwrap();
    store.add_edge(&DependencyEdge::new(&a.id, &c.id, EdgeType::Uses)).unwrap();
    store.add_edge(&DependencyEdge::new(&b.id, &c.id, EdgeType::Calls)).unwrap();

    let report = resolver::get_dependencies(&store, &a.id, 1, None).unwrap();
    assert_eq!(report.direct.len(), 2);
    assert!(report.transitive.is_empty());

    let calls_only =
        resolver::get_dependencies(&store, &a.id, 2, Some(&[EdgeType::Calls])).unwrap();
    assert_eq!(calls_only.direct.len(), 1);
    assert_eq!(calls_only.transitive, vec![c.id.clone()]);
    assert_eq!(calls_only.impact_count, 2);

    let dependents = resolver::get_dependents(&store, &c.id, 2).unwrap();
    assert_eq!(dependents.direct.len(), 2);
    assert_eq!(dependents.impact_count, 2);
}
