use crate::config::IndexerConfig;
use crate::model::FileTracking;
use crate::util;
use anyhow::{Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use ignore::WalkBuilder;
use sha2::{Digest, Sha256};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

/// Files at or below this size are hashed by content; larger files get a
/// constant-time metadata digest.
pub const HASH_CONTENT_THRESHOLD: u64 = 1024 * 1024;

#[derive(Debug, Clone)]
pub struct ScannedFile {
    /// Normalised absolute path; doubles as the symbol `filepath`.
    pub path: String,
    pub abs_path: PathBuf,
    pub size: u64,
    pub mtime: i64,
    /// Computed lazily: present for changed files only.
    pub hash: Option<String>,
}

#[derive(Debug, Default)]
pub struct ScanResult {
    pub files: Vec<ScannedFile>,
    pub changed: Vec<ScannedFile>,
    pub deleted: Vec<String>,
}

pub struct Scanner {
    include: GlobSet,
    exclude: GlobSet,
    max_file_size: u64,
}

impl Scanner {
    pub fn new(config: &IndexerConfig) -> Result<Self> {
        Ok(Self {
            include: build_glob_set(&config.include).context("build include globs")?,
            exclude: build_glob_set(&config.exclude).context("build exclude globs")?,
            max_file_size: config.max_file_size,
        })
    }

    pub fn matches(&self, rel_path: &str) -> bool {
        self.include.is_match(rel_path) && !self.exclude.is_match(rel_path)
    }

    /// Enumerates candidate files and, when a tracking map is given, splits
    /// out `{changed, deleted}` against it. Hashes are computed lazily for
    /// the changed set only.
    pub fn scan(
        &self,
        root: &Path,
        tracked: Option<&HashMap<String, FileTracking>>,
    ) -> Result<ScanResult> {
        let mut result = ScanResult::default();
        let mut seen: HashSet<String> = HashSet::new();

        let walker = WalkBuilder::new(root)
            .hidden(false)
            .require_git(false)
            .build();
        for entry in walker {
            let entry = match entry {
                Ok(value) => value,
                Err(err) => {
                    eprintln!("symdex: walk error: {err}");
                    continue;
                }
            };
            if !entry.file_type().map(|ft| ft.is_file()).unwrap_or(false) {
                continue;
            }
            let path = entry.path();
            let rel_path = match util::normalize_rel_path(root, path) {
                Ok(value) => value,
                Err(_) => continue,
            };
            if !self.matches(&rel_path) {
                continue;
            }
            let metadata = match fs::metadata(path) {
                Ok(value) => value,
                Err(err) => {
                    eprintln!("symdex: stat error {}: {err}", path.display());
                    continue;
                }
            };
            let size = metadata.len();
            if size > self.max_file_size {
                continue;
            }
            let mtime = metadata
                .modified()
                .ok()
                .and_then(|m| m.duration_since(std::time::UNIX_EPOCH).ok())
                .map(|d| d.as_secs() as i64)
                .unwrap_or(0);
            let abs = util::normalize_path(path);
            seen.insert(abs.clone());
            let mut file = ScannedFile {
                path: abs,
                abs_path: path.to_path_buf(),
                size,
                mtime,
                hash: None,
            };

            let is_changed = match tracked {
                Some(tracked) => tracked
                    .get(&file.path)
                    .map(|entry| entry.mtime != mtime)
                    .unwrap_or(true),
                None => true,
            };
            if is_changed {
                file.hash = Some(hash_file(path).with_context(|| format!("hash {}", file.path))?);
                result.changed.push(file.clone());
            }
            result.files.push(file);
        }

        if let Some(tracked) = tracked {
            result.deleted = tracked
                .keys()
                .filter(|path| !seen.contains(*path))
                .cloned()
                .collect();
            result.deleted.sort();
        }
        result.files.sort_by(|a, b| a.path.cmp(&b.path));
        result.changed.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(result)
    }
}

fn build_glob_set(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern).with_context(|| format!("glob pattern {pattern}"))?);
    }
    Ok(builder.build()?)
}

/// Stable change-detection digest: SHA-256 of content below the threshold,
/// otherwise SHA-256 over `path|mtime|size`.
pub fn hash_file(path: &Path) -> Result<String> {
    let metadata = fs::metadata(path).with_context(|| format!("stat {}", path.display()))?;
    if metadata.len() <= HASH_CONTENT_THRESHOLD {
        let data = fs::read(path).with_context(|| format!("read {}", path.display()))?;
        let mut hasher = Sha256::new();
        hasher.update(&data);
        return Ok(format!("{:x}", hasher.finalize()));
    }
    let mtime = metadata
        .modified()
        .ok()
        .and_then(|m| m.duration_since(std::time::UNIX_EPOCH).ok())
        .map(|d| d.as_secs())
        .unwrap_or(0);
    let mut hasher = Sha256::new();
    hasher.update(path.to_string_lossy().as_bytes());
    hasher.update(b"|");
    hasher.update(mtime.to_string().as_bytes());
    hasher.update(b"|");
    hasher.update(metadata.len().to_string().as_bytes());
    Ok(format!("meta-{:x}", hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::IndexerConfig;

    #[test]
    fn include_exclude_matching() {
        let scanner = Scanner::new(&IndexerConfig::default()).unwrap();
        assert!(scanner.matches("src/app.ts"));
        assert!(scanner.matches("lib/deep/mod.rs"));
        assert!(!scanner.matches("node_modules/left-pad/index.js"));
        assert!(!scanner.matches("README.md"));
    }

    #[test]
    fn content_hash_is_stable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.ts");
        std::fs::write(&path, "export const a = 1;\n").unwrap();
        let first = hash_file(&path).unwrap();
        let second = hash_file(&path).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.len(), 64);
    }
}
