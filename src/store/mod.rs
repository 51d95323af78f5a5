//! Namespaced persistent graph store.
//!
//! Every key is prefixed `<key_prefix>:<project>:` where `project` is the
//! sanitised absolute project root. Symbols and edge metadata live in hash
//! containers, memberships in sets, PageRank in a sorted set, tracking and
//! metadata in scoped key/value entries. The compound mutations (`add_edge`,
//! `remove_symbol`) run as single transactions on the write connection so
//! concurrent readers never observe torn edges or half-removed symbols.

use crate::config::StoreConfig;
use crate::model::{
    DependencyEdge, EdgeType, FileTracking, Location, ProjectMetadata, ProjectStats, Symbol,
    SymbolKind,
};
use crate::util;
use anyhow::{Context, Result};
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, Connection, OptionalExtension, Transaction};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

mod migrations;

const POOL_SIZE: u32 = 8;
const PAGERANK_BATCH: usize = 500;

#[derive(Debug)]
struct ConnectionCustomizer;

impl r2d2::CustomizeConnection<Connection, rusqlite::Error> for ConnectionCustomizer {
    fn on_acquire(&self, conn: &mut Connection) -> Result<(), rusqlite::Error> {
        conn.busy_timeout(Duration::from_secs(30))?;
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            ",
        )?;
        Ok(())
    }

    fn on_release(&self, _conn: Connection) {}
}

pub struct Store {
    prefix: String,
    project: Mutex<String>,
    write_conn: Arc<Mutex<Connection>>,
    read_pool: Pool<SqliteConnectionManager>,
}

impl Store {
    /// Opens the backing database, runs migrations and pings the backend.
    /// Fails fast when the backend cannot complete a round-trip.
    pub fn new(config: &StoreConfig) -> Result<Self> {
        if let Some(parent) = config.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("create store directory {}", parent.display()))?;
            }
        }

        let write_conn = Connection::open(&config.path).with_context(|| {
            format!(
                "storage backend unreachable at {} (check the path is writable; \
                 on Linux/macOS ensure the parent directory exists)",
                config.path.display()
            )
        })?;
        write_conn.busy_timeout(Duration::from_secs(30))?;
        write_conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            ",
        )?;
        migrations::migrate(&write_conn)?;

        // Round-trip ping before handing the store out.
        write_conn
            .query_row("SELECT 1", [], |row| row.get::<_, i64>(0))
            .with_context(|| format!("ping storage backend at {}", config.path.display()))?;

        let manager = SqliteConnectionManager::file(&config.path);
        let read_pool = Pool::builder()
            .max_size(POOL_SIZE)
            .connection_timeout(Duration::from_secs(30))
            .connection_customizer(Box::new(ConnectionCustomizer))
            .build(manager)
            .context("create read connection pool")?;

        Ok(Self {
            prefix: config.key_prefix.clone(),
            project: Mutex::new("default".to_string()),
            write_conn: Arc::new(Mutex::new(write_conn)),
            read_pool,
        })
    }

    /// Switches the active project namespace. Serialised through the
    /// internal mutex so a switch never interleaves with key construction
    /// of an in-flight operation.
    pub fn set_project_context(&self, root: &Path) {
        let name = util::sanitize_project_name(root);
        *self.project.lock().unwrap() = name;
    }

    pub fn project_namespace(&self) -> String {
        format!("{}:{}", self.prefix, self.project.lock().unwrap())
    }

    fn key(&self, suffix: &str) -> String {
        format!("{}:{}", self.project_namespace(), suffix)
    }

    fn conn(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.write_conn.lock().unwrap()
    }

    fn read_conn(&self) -> Result<r2d2::PooledConnection<SqliteConnectionManager>> {
        self.read_pool.get().context("get read connection from pool")
    }

    // ------------------------------------------------------------------
    // Advisory locks

    /// Set-if-absent with TTL. Returns whether this caller now holds the
    /// lock; an unexpired holder wins.
    pub fn acquire_lock(&self, name: &str, ttl_ms: i64) -> Result<bool> {
        let key = self.key(&format!("lock:{name}"));
        let now = util::now_unix_millis();
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        tx.execute(
            "DELETE FROM kv WHERE key = ?1 AND expires_at IS NOT NULL AND expires_at <= ?2",
            params![key, now],
        )?;
        let inserted = tx.execute(
            "INSERT OR IGNORE INTO kv (key, value, expires_at) VALUES (?1, 'locked', ?2)",
            params![key, now + ttl_ms],
        )?;
        tx.commit()?;
        Ok(inserted > 0)
    }

    pub fn release_lock(&self, name: &str) -> Result<()> {
        let key = self.key(&format!("lock:{name}"));
        self.conn().execute("DELETE FROM kv WHERE key = ?1", params![key])?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Scoped key/value

    pub fn kv_set(&self, suffix: &str, value: &str) -> Result<()> {
        let key = self.key(suffix);
        self.conn().execute(
            "INSERT INTO kv (key, value, expires_at) VALUES (?1, ?2, NULL)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, expires_at = NULL",
            params![key, value],
        )?;
        Ok(())
    }

    pub fn kv_get(&self, suffix: &str) -> Result<Option<String>> {
        let key = self.key(suffix);
        let conn = self.read_conn()?;
        let value = conn
            .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(value)
    }

    pub fn kv_delete(&self, suffix: &str) -> Result<()> {
        let key = self.key(suffix);
        self.conn().execute("DELETE FROM kv WHERE key = ?1", params![key])?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Sets

    pub fn set_members(&self, suffix: &str) -> Result<Vec<String>> {
        let key = self.key(suffix);
        let conn = self.read_conn()?;
        let mut stmt =
            conn.prepare("SELECT member FROM sets WHERE key = ?1 ORDER BY member")?;
        let rows = stmt.query_map(params![key], |row| row.get(0))?;
        let mut members = Vec::new();
        for row in rows {
            members.push(row?);
        }
        Ok(members)
    }

    // ------------------------------------------------------------------
    // Symbols

    pub fn put_symbol(&self, symbol: &Symbol) -> Result<()> {
        self.put_symbols(std::slice::from_ref(symbol))
    }

    pub fn put_symbols(&self, symbols: &[Symbol]) -> Result<()> {
        if symbols.is_empty() {
            return Ok(());
        }
        let ns = self.project_namespace();
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        for symbol in symbols {
            put_symbol_tx(&tx, &ns, symbol)?;
        }
        tx.commit()?;
        Ok(())
    }

    pub fn get_symbol(&self, id: &str) -> Result<Option<Symbol>> {
        let key = self.key(&format!("symbol:{id}"));
        let conn = self.read_conn()?;
        let fields = hash_get_all(&conn, &key)?;
        Ok(symbol_from_fields(id, &fields))
    }

    /// Deletes the symbol record, its index memberships, every incident
    /// edge in both directions, and its PageRank entry, atomically.
    pub fn remove_symbol(&self, id: &str) -> Result<()> {
        let symbol = self.get_symbol(id)?;
        let ns = self.project_namespace();
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        remove_symbol_tx(&tx, &ns, id, symbol.as_ref())?;
        tx.commit()?;
        Ok(())
    }

    /// Removes every symbol of a file plus the file's own import edges,
    /// in one transaction. Returns the number of symbols removed.
    pub fn remove_file_symbols(&self, filepath: &str) -> Result<usize> {
        let ids = self.symbol_ids_by_file(filepath)?;
        let mut symbols = Vec::new();
        for id in &ids {
            symbols.push((id.clone(), self.get_symbol(id)?));
        }
        let ns = self.project_namespace();
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        for (id, symbol) in &symbols {
            remove_symbol_tx(&tx, &ns, id, symbol.as_ref())?;
        }
        // Import edges hang off the filepath itself.
        remove_node_edges_tx(&tx, &ns, filepath)?;
        tx.execute(
            "DELETE FROM sets WHERE key = ?1",
            params![format!("{ns}:idx:file:{filepath}")],
        )?;
        tx.commit()?;
        Ok(ids.len())
    }

    pub fn symbol_ids_by_file(&self, filepath: &str) -> Result<Vec<String>> {
        self.set_members(&format!("idx:file:{filepath}"))
    }

    pub fn symbols_by_file(&self, filepath: &str) -> Result<Vec<Symbol>> {
        let ids = self.symbol_ids_by_file(filepath)?;
        let mut symbols = Vec::new();
        for id in ids {
            if let Some(symbol) = self.get_symbol(&id)? {
                symbols.push(symbol);
            }
        }
        symbols.sort_by_key(|s| (s.location.start.line, s.location.start.column));
        Ok(symbols)
    }

    pub fn symbol_ids_by_name(&self, name: &str) -> Result<Vec<String>> {
        self.set_members(&format!("idx:name:{name}"))
    }

    pub fn symbol_ids_by_kind(&self, kind: SymbolKind) -> Result<Vec<String>> {
        self.set_members(&format!("idx:kind:{}", kind.as_str()))
    }

    /// Every distinct symbol name present in the name index.
    pub fn symbol_names(&self) -> Result<Vec<String>> {
        let prefix = self.key("idx:name:");
        let conn = self.read_conn()?;
        let mut stmt = conn.prepare(
            "SELECT DISTINCT key FROM sets WHERE key LIKE ?1 ESCAPE '\\' ORDER BY key",
        )?;
        let rows = stmt.query_map(params![like_prefix(&prefix)], |row| {
            row.get::<_, String>(0)
        })?;
        let mut names = Vec::new();
        for row in rows {
            let key = row?;
            names.push(key[prefix.len()..].to_string());
        }
        Ok(names)
    }

    /// Every filepath that currently has symbols in the store.
    pub fn indexed_files(&self) -> Result<Vec<String>> {
        let prefix = self.key("idx:file:");
        let conn = self.read_conn()?;
        let mut stmt = conn.prepare(
            "SELECT DISTINCT key FROM sets WHERE key LIKE ?1 ESCAPE '\\' ORDER BY key",
        )?;
        let rows = stmt.query_map(params![like_prefix(&prefix)], |row| {
            row.get::<_, String>(0)
        })?;
        let mut files = Vec::new();
        for row in rows {
            let key = row?;
            files.push(key[prefix.len()..].to_string());
        }
        Ok(files)
    }

    pub fn all_symbol_ids(&self) -> Result<Vec<String>> {
        let prefix = self.key("symbol:");
        let conn = self.read_conn()?;
        let mut stmt = conn.prepare(
            "SELECT DISTINCT key FROM hashes WHERE key LIKE ?1 ESCAPE '\\' ORDER BY key",
        )?;
        let rows = stmt.query_map(params![like_prefix(&prefix)], |row| {
            row.get::<_, String>(0)
        })?;
        let mut ids = Vec::new();
        for row in rows {
            let key = row?;
            ids.push(key[prefix.len()..].to_string());
        }
        Ok(ids)
    }

    pub fn all_symbols(&self) -> Result<Vec<Symbol>> {
        let prefix = self.key("symbol:");
        let conn = self.read_conn()?;
        let mut stmt = conn.prepare(
            "SELECT key, field, value FROM hashes WHERE key LIKE ?1 ESCAPE '\\' ORDER BY key",
        )?;
        let rows = stmt.query_map(params![like_prefix(&prefix)], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
            ))
        })?;
        let mut grouped: HashMap<String, HashMap<String, String>> = HashMap::new();
        for row in rows {
            let (key, field, value) = row?;
            grouped.entry(key).or_default().insert(field, value);
        }
        let mut symbols = Vec::new();
        for (key, fields) in grouped {
            let id = &key[prefix.len()..];
            if let Some(symbol) = symbol_from_fields(id, &fields) {
                symbols.push(symbol);
            }
        }
        symbols.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(symbols)
    }

    // ------------------------------------------------------------------
    // Edges

    /// Compound mutation: writes the edge record and both membership sets
    /// atomically.
    pub fn add_edge(&self, edge: &DependencyEdge) -> Result<()> {
        self.add_edges(std::slice::from_ref(edge))
    }

    pub fn add_edges(&self, edges: &[DependencyEdge]) -> Result<()> {
        if edges.is_empty() {
            return Ok(());
        }
        let ns = self.project_namespace();
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        for edge in edges {
            add_edge_tx(&tx, &ns, edge)?;
        }
        tx.commit()?;
        Ok(())
    }

    pub fn get_edge(&self, from: &str, to: &str) -> Result<Option<DependencyEdge>> {
        let key = self.key(&format!("edge:from:{from}:to:{to}"));
        let conn = self.read_conn()?;
        let fields = hash_get_all(&conn, &key)?;
        Ok(edge_from_fields(&fields))
    }

    pub fn deps_from(&self, id: &str) -> Result<Vec<String>> {
        self.set_members(&format!("deps:from:{id}"))
    }

    pub fn deps_to(&self, id: &str) -> Result<Vec<String>> {
        self.set_members(&format!("deps:to:{id}"))
    }

    pub fn edges_from(&self, id: &str) -> Result<Vec<DependencyEdge>> {
        let mut edges = Vec::new();
        for to in self.deps_from(id)? {
            if let Some(edge) = self.get_edge(id, &to)? {
                edges.push(edge);
            }
        }
        Ok(edges)
    }

    pub fn edges_to(&self, id: &str) -> Result<Vec<DependencyEdge>> {
        let mut edges = Vec::new();
        for from in self.deps_to(id)? {
            if let Some(edge) = self.get_edge(&from, id)? {
                edges.push(edge);
            }
        }
        Ok(edges)
    }

    pub fn all_edges(&self) -> Result<Vec<DependencyEdge>> {
        let prefix = self.key("edge:from:");
        let conn = self.read_conn()?;
        let mut stmt = conn.prepare(
            "SELECT key, field, value FROM hashes WHERE key LIKE ?1 ESCAPE '\\' ORDER BY key",
        )?;
        let rows = stmt.query_map(params![like_prefix(&prefix)], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
            ))
        })?;
        let mut grouped: HashMap<String, HashMap<String, String>> = HashMap::new();
        for row in rows {
            let (key, field, value) = row?;
            grouped.entry(key).or_default().insert(field, value);
        }
        let mut edges = Vec::new();
        for fields in grouped.values() {
            if let Some(edge) = edge_from_fields(fields) {
                edges.push(edge);
            }
        }
        edges.sort_by(|a, b| (a.from.as_str(), a.to.as_str()).cmp(&(b.from.as_str(), b.to.as_str())));
        Ok(edges)
    }

    // ------------------------------------------------------------------
    // PageRank

    /// Clears and rewrites the sorted set in bounded batches and mirrors
    /// every score into the symbol hash. A failed batch leaves an error for
    /// the caller to retry the whole map.
    pub fn set_pageranks(&self, ranks: &HashMap<String, f64>) -> Result<()> {
        let ns = self.project_namespace();
        let zkey = format!("{ns}:pagerank");
        let entries: Vec<(&String, &f64)> = {
            let mut entries: Vec<_> = ranks.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            entries
        };

        {
            let mut conn = self.conn();
            let tx = conn.transaction()?;
            tx.execute("DELETE FROM zsets WHERE key = ?1", params![zkey])?;
            tx.commit()?;
        }

        for chunk in entries.chunks(PAGERANK_BATCH) {
            let mut conn = self.conn();
            let tx = conn.transaction()?;
            for (id, score) in chunk {
                tx.execute(
                    "INSERT OR REPLACE INTO zsets (key, member, score) VALUES (?1, ?2, ?3)",
                    params![zkey, id, **score],
                )?;
                let skey = format!("{ns}:symbol:{id}");
                tx.execute(
                    "INSERT OR REPLACE INTO hashes (key, field, value)
                     SELECT ?1, 'pageRank', ?2
                     WHERE EXISTS (SELECT 1 FROM hashes WHERE key = ?1)",
                    params![skey, score.to_string()],
                )?;
            }
            tx.commit()
                .with_context(|| format!("persist pagerank batch of {}", chunk.len()))?;
        }
        Ok(())
    }

    pub fn pagerank_top(&self, limit: usize) -> Result<Vec<(String, f64)>> {
        let key = self.key("pagerank");
        let conn = self.read_conn()?;
        let mut stmt = conn.prepare(
            "SELECT member, score FROM zsets WHERE key = ?1
             ORDER BY score DESC, member ASC LIMIT ?2",
        )?;
        let rows = stmt.query_map(params![key, limit as i64], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, f64>(1)?))
        })?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    pub fn pagerank_of(&self, id: &str) -> Result<Option<f64>> {
        let key = self.key("pagerank");
        let conn = self.read_conn()?;
        let score = conn
            .query_row(
                "SELECT score FROM zsets WHERE key = ?1 AND member = ?2",
                params![key, id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(score)
    }

    pub fn pagerank_all(&self) -> Result<HashMap<String, f64>> {
        let key = self.key("pagerank");
        let conn = self.read_conn()?;
        let mut stmt = conn.prepare("SELECT member, score FROM zsets WHERE key = ?1")?;
        let rows = stmt.query_map(params![key], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, f64>(1)?))
        })?;
        let mut out = HashMap::new();
        for row in rows {
            let (member, score) = row?;
            out.insert(member, score);
        }
        Ok(out)
    }

    // ------------------------------------------------------------------
    // File tracking

    pub fn file_tracking(&self) -> Result<HashMap<String, FileTracking>> {
        let prefix = self.key("file:");
        let conn = self.read_conn()?;
        let mut stmt =
            conn.prepare("SELECT key, value FROM kv WHERE key LIKE ?1 ESCAPE '\\'")?;
        let rows = stmt.query_map(params![like_prefix(&prefix)], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;
        let mut out = HashMap::new();
        for row in rows {
            let (key, value) = row?;
            let path = key[prefix.len()..].to_string();
            if let Ok(tracking) = serde_json::from_str::<FileTracking>(&value) {
                out.insert(path, tracking);
            }
        }
        Ok(out)
    }

    pub fn get_file_tracking(&self, path: &str) -> Result<Option<FileTracking>> {
        let value = self.kv_get(&format!("file:{path}"))?;
        Ok(value.and_then(|raw| serde_json::from_str(&raw).ok()))
    }

    pub fn set_file_tracking(&self, path: &str, tracking: &FileTracking) -> Result<()> {
        self.kv_set(&format!("file:{path}"), &serde_json::to_string(tracking)?)
    }

    pub fn remove_file_tracking(&self, path: &str) -> Result<()> {
        self.kv_delete(&format!("file:{path}"))
    }

    // ------------------------------------------------------------------
    // Project metadata

    pub fn set_project_metadata(&self, metadata: &ProjectMetadata) -> Result<()> {
        self.kv_set("root", &metadata.root)?;
        self.kv_set("indexed_at", &metadata.indexed_at.to_string())?;
        self.kv_set("stats", &serde_json::to_string(&metadata.stats)?)?;
        Ok(())
    }

    pub fn project_metadata(&self) -> Result<Option<ProjectMetadata>> {
        let Some(root) = self.kv_get("root")? else {
            return Ok(None);
        };
        let indexed_at = self
            .kv_get("indexed_at")?
            .and_then(|raw| raw.parse::<i64>().ok())
            .unwrap_or(0);
        let stats = self
            .kv_get("stats")?
            .and_then(|raw| serde_json::from_str(&raw).ok())
            .unwrap_or_default();
        Ok(Some(ProjectMetadata {
            root,
            indexed_at,
            stats,
        }))
    }

    /// Live counts derived from the index containers.
    pub fn stats_counts(&self) -> Result<ProjectStats> {
        let conn = self.read_conn()?;
        let files: i64 = conn.query_row(
            "SELECT COUNT(DISTINCT key) FROM sets WHERE key LIKE ?1 ESCAPE '\\'",
            params![like_prefix(&self.key("idx:file:"))],
            |row| row.get(0),
        )?;
        let symbols: i64 = conn.query_row(
            "SELECT COUNT(DISTINCT key) FROM hashes WHERE key LIKE ?1 ESCAPE '\\'",
            params![like_prefix(&self.key("symbol:"))],
            |row| row.get(0),
        )?;
        let edges: i64 = conn.query_row(
            "SELECT COUNT(DISTINCT key) FROM hashes WHERE key LIKE ?1 ESCAPE '\\'",
            params![like_prefix(&self.key("edge:from:"))],
            |row| row.get(0),
        )?;
        Ok(ProjectStats {
            files,
            symbols,
            edges,
        })
    }
}

// ----------------------------------------------------------------------
// Transaction bodies

fn put_symbol_tx(tx: &Transaction<'_>, ns: &str, symbol: &Symbol) -> Result<()> {
    let key = format!("{ns}:symbol:{}", symbol.id);
    tx.execute("DELETE FROM hashes WHERE key = ?1", params![key])?;
    for (field, value) in symbol_fields(symbol)? {
        tx.execute(
            "INSERT OR REPLACE INTO hashes (key, field, value) VALUES (?1, ?2, ?3)",
            params![key, field, value],
        )?;
    }
    for set_key in [
        format!("{ns}:idx:file:{}", symbol.filepath),
        format!("{ns}:idx:name:{}", symbol.name),
        format!("{ns}:idx:kind:{}", symbol.kind.as_str()),
    ] {
        tx.execute(
            "INSERT OR IGNORE INTO sets (key, member) VALUES (?1, ?2)",
            params![set_key, symbol.id],
        )?;
    }
    Ok(())
}

fn add_edge_tx(tx: &Transaction<'_>, ns: &str, edge: &DependencyEdge) -> Result<()> {
    let key = format!("{ns}:edge:from:{}:to:{}", edge.from, edge.to);
    tx.execute(
        "INSERT OR REPLACE INTO hashes (key, field, value) VALUES (?1, 'from', ?2)",
        params![key, edge.from],
    )?;
    tx.execute(
        "INSERT OR REPLACE INTO hashes (key, field, value) VALUES (?1, 'to', ?2)",
        params![key, edge.to],
    )?;
    tx.execute(
        "INSERT OR REPLACE INTO hashes (key, field, value) VALUES (?1, 'type', ?2)",
        params![key, edge.edge_type.as_str()],
    )?;
    if let Some(location) = &edge.location {
        tx.execute(
            "INSERT OR REPLACE INTO hashes (key, field, value) VALUES (?1, 'location', ?2)",
            params![key, serde_json::to_string(location)?],
        )?;
    }
    tx.execute(
        "INSERT OR IGNORE INTO sets (key, member) VALUES (?1, ?2)",
        params![format!("{ns}:deps:from:{}", edge.from), edge.to],
    )?;
    tx.execute(
        "INSERT OR IGNORE INTO sets (key, member) VALUES (?1, ?2)",
        params![format!("{ns}:deps:to:{}", edge.to), edge.from],
    )?;
    Ok(())
}

fn remove_symbol_tx(
    tx: &Transaction<'_>,
    ns: &str,
    id: &str,
    symbol: Option<&Symbol>,
) -> Result<()> {
    tx.execute(
        "DELETE FROM hashes WHERE key = ?1",
        params![format!("{ns}:symbol:{id}")],
    )?;
    if let Some(symbol) = symbol {
        for set_key in [
            format!("{ns}:idx:file:{}", symbol.filepath),
            format!("{ns}:idx:name:{}", symbol.name),
            format!("{ns}:idx:kind:{}", symbol.kind.as_str()),
        ] {
            tx.execute(
                "DELETE FROM sets WHERE key = ?1 AND member = ?2",
                params![set_key, id],
            )?;
        }
    }
    remove_node_edges_tx(tx, ns, id)?;
    tx.execute(
        "DELETE FROM zsets WHERE key = ?1 AND member = ?2",
        params![format!("{ns}:pagerank"), id],
    )?;
    Ok(())
}

/// Removes every incident edge of a node (symbol ID or filepath): the edge
/// records, the reverse memberships, and both dependency sets.
fn remove_node_edges_tx(tx: &Transaction<'_>, ns: &str, node: &str) -> Result<()> {
    let outgoing = set_members_tx(tx, &format!("{ns}:deps:from:{node}"))?;
    for to in &outgoing {
        tx.execute(
            "DELETE FROM hashes WHERE key = ?1",
            params![format!("{ns}:edge:from:{node}:to:{to}")],
        )?;
        tx.execute(
            "DELETE FROM sets WHERE key = ?1 AND member = ?2",
            params![format!("{ns}:deps:to:{to}"), node],
        )?;
    }
    let incoming = set_members_tx(tx, &format!("{ns}:deps:to:{node}"))?;
    for from in &incoming {
        tx.execute(
            "DELETE FROM hashes WHERE key = ?1",
            params![format!("{ns}:edge:from:{from}:to:{node}")],
        )?;
        tx.execute(
            "DELETE FROM sets WHERE key = ?1 AND member = ?2",
            params![format!("{ns}:deps:from:{from}"), node],
        )?;
    }
    tx.execute(
        "DELETE FROM sets WHERE key = ?1",
        params![format!("{ns}:deps:from:{node}")],
    )?;
    tx.execute(
        "DELETE FROM sets WHERE key = ?1",
        params![format!("{ns}:deps:to:{node}")],
    )?;
    Ok(())
}

fn set_members_tx(tx: &Transaction<'_>, key: &str) -> Result<Vec<String>> {
    let mut stmt = tx.prepare("SELECT member FROM sets WHERE key = ?1")?;
    let rows = stmt.query_map(params![key], |row| row.get(0))?;
    let mut members = Vec::new();
    for row in rows {
        members.push(row?);
    }
    Ok(members)
}

// ----------------------------------------------------------------------
// Record encoding

fn symbol_fields(symbol: &Symbol) -> Result<Vec<(String, String)>> {
    let mut fields = vec![
        ("name".to_string(), symbol.name.clone()),
        ("kind".to_string(), symbol.kind.as_str().to_string()),
        ("filepath".to_string(), symbol.filepath.clone()),
        (
            "location".to_string(),
            serde_json::to_string(&symbol.location)?,
        ),
        (
            "exported".to_string(),
            if symbol.exported { "1" } else { "0" }.to_string(),
        ),
        ("language".to_string(), symbol.language.clone()),
        (
            "children".to_string(),
            serde_json::to_string(&symbol.children)?,
        ),
    ];
    if let Some(signature) = &symbol.signature {
        fields.push(("signature".to_string(), signature.clone()));
    }
    if let Some(docstring) = &symbol.docstring {
        fields.push(("docstring".to_string(), docstring.clone()));
    }
    if let Some(parent) = &symbol.parent {
        fields.push(("parent".to_string(), parent.clone()));
    }
    if let Some(git) = &symbol.git {
        fields.push(("git".to_string(), serde_json::to_string(git)?));
    }
    if let Some(rank) = symbol.page_rank {
        fields.push(("pageRank".to_string(), rank.to_string()));
    }
    Ok(fields)
}

fn symbol_from_fields(id: &str, fields: &HashMap<String, String>) -> Option<Symbol> {
    let name = fields.get("name")?.clone();
    let kind = SymbolKind::parse(fields.get("kind")?)?;
    let filepath = fields.get("filepath")?.clone();
    let location: Location = serde_json::from_str(fields.get("location")?).ok()?;
    let children: Vec<String> = fields
        .get("children")
        .and_then(|raw| serde_json::from_str(raw).ok())
        .unwrap_or_default();
    Some(Symbol {
        id: id.to_string(),
        name,
        kind,
        filepath,
        location,
        signature: fields.get("signature").cloned(),
        docstring: fields.get("docstring").cloned(),
        parent: fields.get("parent").cloned(),
        children,
        exported: fields.get("exported").map(|v| v == "1").unwrap_or(false),
        language: fields.get("language").cloned().unwrap_or_default(),
        git: fields
            .get("git")
            .and_then(|raw| serde_json::from_str(raw).ok()),
        page_rank: fields.get("pageRank").and_then(|raw| raw.parse().ok()),
    })
}

fn edge_from_fields(fields: &HashMap<String, String>) -> Option<DependencyEdge> {
    let from = fields.get("from")?.clone();
    let to = fields.get("to")?.clone();
    let edge_type = EdgeType::parse(fields.get("type")?)?;
    let location = fields
        .get("location")
        .and_then(|raw| serde_json::from_str(raw).ok());
    Some(DependencyEdge {
        from,
        to,
        edge_type,
        location,
    })
}

fn hash_get_all(conn: &Connection, key: &str) -> Result<HashMap<String, String>> {
    let mut stmt = conn.prepare("SELECT field, value FROM hashes WHERE key = ?1")?;
    let rows = stmt.query_map(params![key], |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
    })?;
    let mut fields = HashMap::new();
    for row in rows {
        let (field, value) = row?;
        fields.insert(field, value);
    }
    Ok(fields)
}

/// LIKE pattern matching every key starting with `prefix`, with the
/// wildcard bytes escaped (sanitised project names are full of `_`).
fn like_prefix(prefix: &str) -> String {
    let mut out = String::with_capacity(prefix.len() + 8);
    for ch in prefix.chars() {
        if ch == '%' || ch == '_' || ch == '\\' {
            out.push('\\');
        }
        out.push(ch);
    }
    out.push('%');
    out
}

/// Guard that releases a named project lock when dropped, so the lock is
/// returned on every exit path including panics.
pub struct LockGuard<'a> {
    store: &'a Store,
    name: String,
}

impl<'a> LockGuard<'a> {
    /// Attempts acquisition; `None` when another writer holds the lock.
    pub fn acquire(store: &'a Store, name: &str, ttl_ms: i64) -> Result<Option<Self>> {
        if store.acquire_lock(name, ttl_ms)? {
            Ok(Some(Self {
                store,
                name: name.to_string(),
            }))
        } else {
            Ok(None)
        }
    }
}

impl Drop for LockGuard<'_> {
    fn drop(&mut self) {
        if let Err(err) = self.store.release_lock(&self.name) {
            eprintln!("symdex: release lock {} failed: {err}", self.name);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn like_prefix_escapes_wildcards() {
        assert_eq!(like_prefix("a_b%c"), "a\\_b\\%c%");
        assert_eq!(like_prefix("plain"), "plain%");
    }
}
