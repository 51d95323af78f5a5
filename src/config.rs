// Configuration is read from a YAML file; a missing or unparsable file is
// fatal at startup. Every section carries defaults so a minimal file such as
// `{}` is valid.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_FILE: &str = "symdex.yaml";

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub store: StoreConfig,
    pub indexer: IndexerConfig,
    pub pagerank: PageRankConfig,
    pub watcher: WatcherConfig,
    pub git: GitConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Path of the backing database file.
    pub path: PathBuf,
    /// Leading component of every key; the sanitised project name follows.
    pub key_prefix: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(".symdex/graph.sqlite"),
            key_prefix: "symdex".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct IndexerConfig {
    pub include: Vec<String>,
    pub exclude: Vec<String>,
    /// Files larger than this are not indexed at all.
    pub max_file_size: u64,
    pub batch_size: usize,
    pub max_concurrency: usize,
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            include: vec![
                "**/*.ts".into(),
                "**/*.tsx".into(),
                "**/*.js".into(),
                "**/*.jsx".into(),
                "**/*.mjs".into(),
                "**/*.cjs".into(),
                "**/*.py".into(),
                "**/*.go".into(),
                "**/*.rs".into(),
                "**/*.java".into(),
                "**/*.c".into(),
                "**/*.h".into(),
                "**/*.cpp".into(),
                "**/*.cc".into(),
                "**/*.cxx".into(),
                "**/*.hpp".into(),
                "**/*.hxx".into(),
            ],
            exclude: vec![
                "**/node_modules/**".into(),
                "**/.git/**".into(),
                "**/target/**".into(),
                "**/dist/**".into(),
                "**/build/**".into(),
                "**/__pycache__/**".into(),
                "**/.venv/**".into(),
                "**/vendor/**".into(),
            ],
            max_file_size: 1024 * 1024,
            batch_size: 50,
            max_concurrency: 8,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct PageRankConfig {
    pub damping: f64,
    pub iterations: usize,
    pub tolerance: f64,
}

impl Default for PageRankConfig {
    fn default() -> Self {
        Self {
            damping: 0.85,
            iterations: 30,
            tolerance: 1e-6,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct WatcherConfig {
    pub enabled: bool,
    pub debounce_ms: u64,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            debounce_ms: 300,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GitConfig {
    pub enabled: bool,
    /// Commits inspected per file when mining metadata.
    pub history_depth: usize,
    pub sample_window_days: u32,
    pub git_binary: String,
}

impl Default for GitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            history_depth: 50,
            sample_window_days: 180,
            git_binary: "git".to_string(),
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("read config file {}", path.display()))?;
        let config: Config = serde_yaml_ng::from_str(&raw)
            .with_context(|| format!("parse config file {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !(0.0..1.0).contains(&self.pagerank.damping) {
            bail!(
                "invalid config: pagerank.damping {} must be in (0, 1)",
                self.pagerank.damping
            );
        }
        if self.pagerank.iterations == 0 {
            bail!("invalid config: pagerank.iterations must be positive");
        }
        if self.pagerank.tolerance <= 0.0 {
            bail!("invalid config: pagerank.tolerance must be positive");
        }
        if self.indexer.batch_size == 0 {
            bail!("invalid config: indexer.batch_size must be positive");
        }
        if self.indexer.max_concurrency == 0 {
            bail!("invalid config: indexer.max_concurrency must be positive");
        }
        if self.indexer.max_file_size == 0 {
            bail!("invalid config: indexer.max_file_size must be positive");
        }
        if self.store.key_prefix.is_empty() {
            bail!("invalid config: store.key_prefix must not be empty");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.pagerank.damping, 0.85);
        assert_eq!(config.pagerank.iterations, 30);
        assert_eq!(config.watcher.debounce_ms, 300);
        assert_eq!(config.indexer.max_file_size, 1024 * 1024);
    }

    #[test]
    fn minimal_yaml_parses_with_defaults() {
        let config: Config = serde_yaml_ng::from_str("store:\n  key_prefix: kg\n").unwrap();
        assert_eq!(config.store.key_prefix, "kg");
        assert_eq!(config.pagerank.iterations, 30);
    }

    #[test]
    fn bad_damping_rejected() {
        let config: Config = serde_yaml_ng::from_str("pagerank:\n  damping: 1.5\n").unwrap();
        assert!(config.validate().is_err());
    }
}
