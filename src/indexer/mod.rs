//! Top-level indexing pipeline: scan → extract → persist → resolve →
//! PageRank → metadata, under a single-writer project lock.

use crate::config::Config;
use crate::graph::Graph;
use crate::model::{FileTracking, IndexStats, ProjectMetadata};
use crate::store::{LockGuard, Store};
use crate::util;
use anyhow::{bail, Context, Result};
use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

pub mod c;
pub mod extract;
pub mod gitmeta;
pub mod go;
pub mod java;
pub mod python;
pub mod resolver;
pub mod rust;
pub mod scan;
pub mod typescript;

use self::extract::{ExtractBatch, Extractor, ProgressFn};
use self::gitmeta::GitProvider;
use self::scan::{ScannedFile, Scanner};

const INDEX_LOCK: &str = "indexing";
const INDEX_LOCK_TTL_MS: i64 = 10 * 60 * 1000;

#[derive(Debug, Clone, Copy, Default)]
pub struct IndexOptions {
    pub force: bool,
    pub incremental: bool,
}

pub struct Indexer {
    config: Config,
    store: Arc<Store>,
    scanner: Scanner,
    extractor: Extractor,
    git: GitProvider,
}

impl Indexer {
    pub fn new(config: Config, store: Arc<Store>) -> Result<Self> {
        let scanner = Scanner::new(&config.indexer)?;
        let extractor = Extractor::new(&config.indexer)?;
        let git = GitProvider::new(config.git.clone());
        Ok(Self {
            config,
            store,
            scanner,
            extractor,
            git,
        })
    }

    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }

    pub fn git(&self) -> &GitProvider {
        &self.git
    }

    pub fn index_project(&self, root: &Path, opts: &IndexOptions) -> Result<IndexStats> {
        self.index_project_with_progress(root, opts, None)
    }

    pub fn index_project_with_progress(
        &self,
        root: &Path,
        opts: &IndexOptions,
        progress: Option<&ProgressFn>,
    ) -> Result<IndexStats> {
        let started = Instant::now();
        let root = std::fs::canonicalize(root).unwrap_or_else(|_| root.to_path_buf());
        self.store.set_project_context(&root);

        let Some(_lock) = LockGuard::acquire(&self.store, INDEX_LOCK, INDEX_LOCK_TTL_MS)? else {
            bail!(
                "another indexing run holds the '{INDEX_LOCK}' lock for {}; retry later",
                root.display()
            );
        };

        let tracked = self.store.file_tracking()?;
        let incremental = opts.incremental && !opts.force && !tracked.is_empty();

        let scanned = self
            .scanner
            .scan(&root, if tracked.is_empty() { None } else { Some(&tracked) })
            .with_context(|| format!("scan {}", root.display()))?;

        let mut files_to_process: Vec<ScannedFile> = if incremental {
            scanned.changed.clone()
        } else {
            scanned.files.clone()
        };

        // Dependent expansion reads the pre-deletion store state, so files
        // referencing a deleted or changed file are reparsed as well.
        if incremental {
            self.expand_with_dependents(&scanned, &mut files_to_process)?;
        }

        for deleted in &scanned.deleted {
            self.store.remove_file_symbols(deleted)?;
            self.store.remove_file_tracking(deleted)?;
        }

        let mut batch = self.extractor.extract_batch(&files_to_process, progress);
        self.attach_git_metadata(&root, &files_to_process, &mut batch);

        // Wholesale replacement: old symbols of every reprocessed file go
        // first, then the fresh ones land.
        let reprocessed: BTreeSet<&str> =
            files_to_process.iter().map(|f| f.path.as_str()).collect();
        for file in &reprocessed {
            self.store.remove_file_symbols(file)?;
        }
        self.store.put_symbols(&batch.symbols)?;

        let edges = if incremental {
            // Re-resolve over the whole store so cross-file edges into the
            // reparsed files are regenerated, not just the batch's own.
            let mut symbols = self.store.all_symbols()?;
            symbols.extend(batch.symbols.iter().cloned());
            symbols.sort_by(|a, b| a.id.cmp(&b.id));
            symbols.dedup_by(|a, b| a.id == b.id);
            let mut candidate_edges = self.store.all_edges()?;
            candidate_edges.extend(batch.dependencies.iter().cloned());
            resolver::resolve_batch(&self.store, &symbols, &candidate_edges)?
        } else {
            resolver::resolve_batch(&self.store, &batch.symbols, &batch.dependencies)?
        };
        self.store.add_edges(&edges)?;

        for file in &files_to_process {
            let hash = match &file.hash {
                Some(hash) => hash.clone(),
                None => scan::hash_file(&file.abs_path)
                    .with_context(|| format!("hash {}", file.path))?,
            };
            self.store.set_file_tracking(
                &file.path,
                &FileTracking {
                    mtime: file.mtime,
                    hash,
                },
            )?;
        }

        // Correct but O(edges); recomputed over the full store each run.
        let ranks = Graph::new(&self.store).compute_pagerank(&self.config.pagerank)?;
        self.store.set_pageranks(&ranks)?;

        let stats = self.store.stats_counts()?;
        self.store.set_project_metadata(&ProjectMetadata {
            root: root.to_string_lossy().to_string(),
            indexed_at: util::now_unix_secs(),
            stats,
        })?;

        Ok(IndexStats {
            files_indexed: files_to_process.len(),
            symbols_found: batch.symbols.len(),
            dependencies_found: edges.len(),
            errors: batch.errors,
            duration_ms: started.elapsed().as_millis() as u64,
        })
    }

    /// Single-file resync used by the watcher: replace the file's symbols,
    /// re-resolve against the store, update tracking.
    pub fn sync_file(&self, root: &Path, abs_path: &Path) -> Result<()> {
        let filepath = util::normalize_path(abs_path);
        if !abs_path.exists() {
            self.store.remove_file_symbols(&filepath)?;
            self.store.remove_file_tracking(&filepath)?;
            return Ok(());
        }
        let rel = util::normalize_rel_path(root, abs_path)?;
        if !self.scanner.matches(&rel) {
            return Ok(());
        }
        let hash = scan::hash_file(abs_path)?;
        if let Some(tracked) = self.store.get_file_tracking(&filepath)? {
            if tracked.hash == hash {
                return Ok(());
            }
        }

        let mut batch = self.extractor.extract_file(&filepath, abs_path);
        self.attach_git_single(&root.to_path_buf(), &filepath, Some(&hash), &mut batch);
        self.store.remove_file_symbols(&filepath)?;
        self.store.put_symbols(&batch.symbols)?;

        let mut symbols = self.store.all_symbols()?;
        symbols.extend(batch.symbols.iter().cloned());
        symbols.sort_by(|a, b| a.id.cmp(&b.id));
        symbols.dedup_by(|a, b| a.id == b.id);
        let mut candidate_edges = self.store.all_edges()?;
        candidate_edges.extend(batch.dependencies.iter().cloned());
        let edges = resolver::resolve_batch(&self.store, &symbols, &candidate_edges)?;
        self.store.add_edges(&edges)?;

        let mtime = std::fs::metadata(abs_path)
            .ok()
            .and_then(|m| m.modified().ok())
            .and_then(|m| m.duration_since(std::time::UNIX_EPOCH).ok())
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0);
        self.store
            .set_file_tracking(&filepath, &FileTracking { mtime, hash })?;
        Ok(())
    }

    /// Incremental ripple: files whose symbols depend on a changed or
    /// deleted file are reparsed too, so cross-file edges regenerate
    /// against the fresh symbol IDs.
    fn expand_with_dependents(
        &self,
        scanned: &scan::ScanResult,
        files_to_process: &mut Vec<ScannedFile>,
    ) -> Result<()> {
        let mut touched: BTreeSet<String> = files_to_process
            .iter()
            .map(|f| f.path.clone())
            .collect();
        let mut referencing: BTreeSet<String> = BTreeSet::new();
        let mut roots: Vec<String> = touched.iter().cloned().collect();
        roots.extend(scanned.deleted.iter().cloned());

        for file in &roots {
            for id in self.store.symbol_ids_by_file(file)? {
                for dependent in self.store.deps_to(&id)? {
                    let dependent_file = util::filepath_of_id(&dependent).to_string();
                    if !touched.contains(&dependent_file) {
                        referencing.insert(dependent_file);
                    }
                }
            }
        }

        for file in scanned.files.iter() {
            if referencing.contains(&file.path) && !touched.contains(&file.path) {
                let mut entry = file.clone();
                if entry.hash.is_none() {
                    entry.hash = Some(scan::hash_file(&entry.abs_path)?);
                }
                touched.insert(entry.path.clone());
                files_to_process.push(entry);
            }
        }
        files_to_process.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(())
    }

    /// Copies one git record onto every symbol of its file.
    fn attach_git_metadata(
        &self,
        root: &PathBuf,
        files: &[ScannedFile],
        batch: &mut ExtractBatch,
    ) {
        if !self.git.enabled() {
            return;
        }
        let hashes: HashMap<&str, Option<&str>> = files
            .iter()
            .map(|f| (f.path.as_str(), f.hash.as_deref()))
            .collect();
        let mut by_file: HashMap<String, Option<crate::model::GitMetadata>> = HashMap::new();
        for symbol in &batch.symbols {
            if !by_file.contains_key(&symbol.filepath) {
                let hash = hashes.get(symbol.filepath.as_str()).copied().flatten();
                let rel = Path::new(&symbol.filepath)
                    .strip_prefix(root)
                    .map(util::normalize_path)
                    .unwrap_or_else(|_| symbol.filepath.clone());
                let metadata = self.git.get_metadata(root, &rel, hash);
                by_file.insert(symbol.filepath.clone(), metadata);
            }
        }
        for symbol in &mut batch.symbols {
            symbol.git = by_file.get(&symbol.filepath).cloned().flatten();
        }
    }

    fn attach_git_single(
        &self,
        root: &PathBuf,
        filepath: &str,
        hash: Option<&str>,
        batch: &mut ExtractBatch,
    ) {
        if !self.git.enabled() {
            return;
        }
        let rel = Path::new(filepath)
            .strip_prefix(root)
            .map(util::normalize_path)
            .unwrap_or_else(|_| filepath.to_string());
        let metadata = self.git.get_metadata(root, &rel, hash);
        for symbol in &mut batch.symbols {
            symbol.git = metadata.clone();
        }
    }
}
