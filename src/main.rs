use anyhow::{bail, Context, Result};
use clap::Parser;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::sync::{mpsc, Arc};
use std::time::Duration;
use symdex::config::Config;
use symdex::indexer::{IndexOptions, Indexer};
use symdex::model::{EdgeType, SymbolKind};
use symdex::store::Store;
use symdex::{cli, query, watch};

fn main() -> Result<()> {
    let args = cli::Args::parse();
    let config = Config::load(&args.config)?;

    match args.command {
        cli::Command::Index {
            root,
            force,
            incremental,
        } => {
            let store = Arc::new(Store::new(&config.store)?);
            let watcher_enabled = config.watcher.enabled;
            let debounce = Duration::from_millis(config.watcher.debounce_ms);
            let indexer = Arc::new(Indexer::new(config, store)?);
            let opts = IndexOptions { force, incremental };
            let stats = indexer.index_project_with_progress(
                &root,
                &opts,
                Some(&|progress| {
                    eprintln!(
                        "symdex: {}/{} files, {} symbols, {} edges, {} errors",
                        progress.files_processed,
                        progress.total_files,
                        progress.symbols_found,
                        progress.dependencies_found,
                        progress.errors
                    );
                }),
            )?;
            println!("{}", serde_json::to_string_pretty(&stats)?);

            // The watcher starts only for non-incremental invocations.
            if watcher_enabled && !incremental {
                let root = canonical(&root);
                eprintln!("symdex: watching {} (interrupt to stop)", root.display());
                let handle = watch::start(indexer, root, debounce, None)?;
                park_forever();
                handle.stop();
            }
            Ok(())
        }
        cli::Command::Watch { root } => {
            let store = Arc::new(Store::new(&config.store)?);
            let debounce = Duration::from_millis(config.watcher.debounce_ms);
            let indexer = Arc::new(Indexer::new(config, store)?);
            let stats = indexer.index_project(&root, &IndexOptions::default())?;
            println!("{}", serde_json::to_string_pretty(&stats)?);

            let root = canonical(&root);
            let (batch_tx, batch_rx) = mpsc::channel();
            eprintln!("symdex: watching {} (interrupt to stop)", root.display());
            let handle = watch::start(indexer, root, debounce, Some(batch_tx))?;
            while let Ok(batch) = batch_rx.recv() {
                eprintln!("symdex: applied {} change(s)", batch.events.len());
            }
            handle.stop();
            Ok(())
        }
        cli::Command::Overview { root, top, git } => {
            let store = open_store(&config, &root)?;
            let overview = query::get_project_overview(
                &store,
                &query::OverviewOptions {
                    top_n: top,
                    include_git: git,
                },
            )?;
            println!("{}", serde_json::to_string_pretty(&overview)?);
            Ok(())
        }
        cli::Command::Changed { root } => {
            let store = open_store(&config, &root)?;
            let scanner = symdex::indexer::scan::Scanner::new(&config.indexer)?;
            let tracked = store.file_tracking()?;
            let result = scanner.scan(&canonical(&root), Some(&tracked))?;
            let changed: Vec<&String> = result.changed.iter().map(|f| &f.path).collect();
            println!(
                "{}",
                serde_json::to_string_pretty(&json!({
                    "changed": changed,
                    "deleted": result.deleted,
                    "total": result.files.len(),
                }))?
            );
            Ok(())
        }
        cli::Command::Query {
            root,
            method,
            params,
        } => {
            let params: Value = serde_json::from_str(&params).context("parse --params JSON")?;
            let store = open_store(&config, &root)?;
            let result = dispatch(&config, &store, &canonical(&root), &method, &params)?;
            println!("{}", serde_json::to_string_pretty(&result)?);
            Ok(())
        }
    }
}

fn canonical(root: &Path) -> PathBuf {
    std::fs::canonicalize(root).unwrap_or_else(|_| root.to_path_buf())
}

fn open_store(config: &Config, root: &Path) -> Result<Store> {
    let store = Store::new(&config.store)?;
    store.set_project_context(&canonical(root));
    Ok(store)
}

fn park_forever() {
    loop {
        std::thread::sleep(Duration::from_secs(3600));
    }
}

fn dispatch(
    config: &Config,
    store: &Store,
    root: &Path,
    method: &str,
    params: &Value,
) -> Result<Value> {
    match method {
        "get_symbol" => {
            let name = required_str(params, "name")?;
            let opts = query::GetSymbolOptions {
                filepath: opt_str(params, "filepath"),
                kind: opt_kind(params)?,
                limit: opt_usize(params, "limit"),
            };
            Ok(serde_json::to_value(query::get_symbol(store, &name, &opts)?)?)
        }
        "search_symbols" => {
            let pattern = required_str(params, "pattern")?;
            let opts = query::SearchOptions {
                kind: opt_kind(params)?,
                exported_only: opt_bool(params, "exported_only"),
                limit: opt_usize(params, "limit"),
            };
            Ok(serde_json::to_value(query::search_symbols(
                store, &pattern, &opts,
            )?)?)
        }
        "get_file_structure" => {
            let path = required_str(params, "path")?;
            let include_private = params
                .get("include_private")
                .and_then(Value::as_bool)
                .unwrap_or(true);
            Ok(serde_json::to_value(query::get_file_structure(
                store,
                &path,
                include_private,
            )?)?)
        }
        "get_project_overview" => {
            let opts = query::OverviewOptions {
                top_n: opt_usize(params, "top_n").unwrap_or(10),
                include_git: opt_bool(params, "include_git"),
            };
            Ok(serde_json::to_value(query::get_project_overview(store, &opts)?)?)
        }
        "get_dependencies" => {
            let target = required_str(params, "target")?;
            let depth = opt_usize(params, "depth").unwrap_or(1);
            let types = match params.get("types").and_then(Value::as_array) {
                Some(raw) => {
                    let mut types = Vec::new();
                    for entry in raw {
                        let text = entry.as_str().unwrap_or_default();
                        match EdgeType::parse(text) {
                            Some(edge_type) => types.push(edge_type),
                            None => bail!("unknown edge type '{text}'"),
                        }
                    }
                    Some(types)
                }
                None => None,
            };
            Ok(serde_json::to_value(query::get_dependencies(
                store,
                &target,
                depth,
                types.as_deref(),
            )?)?)
        }
        "get_dependents" => {
            let target = required_str(params, "target")?;
            let depth = opt_usize(params, "depth").unwrap_or(1);
            let opts = query::DependentOptions {
                unstable_only: opt_bool(params, "unstable_only"),
                stability_threshold: params
                    .get("stability_threshold")
                    .and_then(Value::as_f64)
                    .unwrap_or(0.5),
                include_git: opt_bool(params, "include_git"),
            };
            Ok(serde_json::to_value(query::get_dependents(
                store, &target, depth, &opts,
            )?)?)
        }
        "get_impact" => {
            let files: Vec<String> = params
                .get("files")
                .and_then(Value::as_array)
                .map(|raw| {
                    raw.iter()
                        .filter_map(|v| v.as_str().map(|s| s.to_string()))
                        .collect()
                })
                .unwrap_or_default();
            if files.is_empty() {
                bail!("get_impact requires a non-empty 'files' array");
            }
            let opts = query::ImpactQueryOptions {
                unstable_only: opt_bool(params, "unstable_only"),
                stability_threshold: params.get("stability_threshold").and_then(Value::as_f64),
                include_git: opt_bool(params, "include_git"),
                impact: Default::default(),
            };
            Ok(serde_json::to_value(query::get_impact(store, &files, &opts)?)?)
        }
        "get_symbol_history" => {
            let target = required_str(params, "target")?;
            let refresh = opt_bool(params, "refresh");
            let git = symdex::indexer::gitmeta::GitProvider::new(config.git.clone());
            Ok(serde_json::to_value(query::get_symbol_history(
                store, &git, root, &target, refresh,
            )?)?)
        }
        "find_similar" => {
            let description = required_str(params, "description")?;
            let opts = query::FindSimilarOptions {
                kind: opt_kind(params)?,
                limit: opt_usize(params, "limit"),
            };
            Ok(serde_json::to_value(query::find_similar(
                store,
                &description,
                &opts,
            )?)?)
        }
        other => bail!("unknown query method '{other}'"),
    }
}

fn required_str(params: &Value, field: &str) -> Result<String> {
    params
        .get(field)
        .and_then(Value::as_str)
        .map(|s| s.to_string())
        .with_context(|| format!("missing required parameter '{field}'"))
}

fn opt_str(params: &Value, field: &str) -> Option<String> {
    params
        .get(field)
        .and_then(Value::as_str)
        .map(|s| s.to_string())
}

fn opt_bool(params: &Value, field: &str) -> bool {
    params.get(field).and_then(Value::as_bool).unwrap_or(false)
}

fn opt_usize(params: &Value, field: &str) -> Option<usize> {
    params.get(field).and_then(Value::as_u64).map(|v| v as usize)
}

fn opt_kind(params: &Value) -> Result<Option<SymbolKind>> {
    match params.get("kind").and_then(Value::as_str) {
        Some(raw) => match SymbolKind::parse(raw) {
            Some(kind) => Ok(Some(kind)),
            None => bail!("unknown symbol kind '{raw}'"),
        },
        None => Ok(None),
    }
}
