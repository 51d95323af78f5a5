//! Per-file metadata mined from git history. Everything here degrades
//! silently: a missing binary, a non-repo root, or a slow subprocess all
//! yield "no metadata" rather than an error.

use crate::config::GitConfig;
use crate::model::GitMetadata;
use crate::util;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::Mutex;
use std::time::{Duration, Instant};

const GIT_TIMEOUT: Duration = Duration::from_secs(3);
const TOP_CONTRIBUTORS: usize = 3;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitInfo {
    pub sha: String,
    pub author: String,
    pub timestamp: i64,
    pub message: String,
}

pub struct GitProvider {
    config: GitConfig,
    head_cache: Mutex<HashMap<PathBuf, Option<String>>>,
    cache: Mutex<HashMap<(String, String, String), Option<GitMetadata>>>,
}

impl GitProvider {
    pub fn new(config: GitConfig) -> Self {
        Self {
            config,
            head_cache: Mutex::new(HashMap::new()),
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn enabled(&self) -> bool {
        self.config.enabled
    }

    /// Metadata for one file, cached by `(path, file_hash, head_sha)`.
    pub fn get_metadata(
        &self,
        root: &Path,
        filepath: &str,
        file_hash: Option<&str>,
    ) -> Option<GitMetadata> {
        if !self.config.enabled {
            return None;
        }
        let head = self.head_sha(root)?;
        let cache_key = (
            filepath.to_string(),
            file_hash.unwrap_or_default().to_string(),
            head,
        );
        if let Some(cached) = self.cache.lock().unwrap().get(&cache_key) {
            return cached.clone();
        }
        let metadata = self.mine_metadata(root, filepath);
        self.cache
            .lock()
            .unwrap()
            .insert(cache_key, metadata.clone());
        metadata
    }

    /// Recent commit history of one file, newest first.
    pub fn file_history(&self, root: &Path, filepath: &str) -> Option<Vec<CommitInfo>> {
        if !self.config.enabled {
            return None;
        }
        let output = self.run_git(
            root,
            &[
                "log",
                &format!("-n{}", self.config.history_depth),
                "--format=%H\u{1f}%at\u{1f}%an\u{1f}%s",
                "--",
                filepath,
            ],
        )?;
        let commits: Vec<CommitInfo> = output.lines().filter_map(parse_commit_line).collect();
        if commits.is_empty() {
            None
        } else {
            Some(commits)
        }
    }

    fn mine_metadata(&self, root: &Path, filepath: &str) -> Option<GitMetadata> {
        let since = format!("--since={} days ago", self.config.sample_window_days);
        let output = self.run_git(
            root,
            &[
                "log",
                &format!("-n{}", self.config.history_depth),
                &since,
                "--format=%H\u{1f}%at\u{1f}%an\u{1f}%s",
                "--",
                filepath,
            ],
        )?;
        let commits: Vec<CommitInfo> = output.lines().filter_map(parse_commit_line).collect();
        if commits.is_empty() {
            return None;
        }

        let churn = commits.len() as i64;
        let last = &commits[0];
        let mut by_author: HashMap<&str, usize> = HashMap::new();
        for commit in &commits {
            *by_author.entry(commit.author.as_str()).or_insert(0) += 1;
        }
        let mut ranked: Vec<(&str, usize)> = by_author.into_iter().collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(b.0)));
        let top_contributors: Vec<String> = ranked
            .iter()
            .take(TOP_CONTRIBUTORS)
            .map(|(author, _)| author.to_string())
            .collect();
        let ownership_confidence = ranked
            .first()
            .map(|(_, count)| *count as f64 / commits.len() as f64)
            .unwrap_or(0.0);
        let freshness_days = (util::now_unix_secs() - last.timestamp).max(0) / 86_400;

        Some(GitMetadata {
            last_commit_sha: Some(last.sha.clone()),
            last_commit_at: Some(last.timestamp),
            churn_count: Some(churn),
            top_contributors,
            stability_score: 1.0 / (1.0 + churn as f64),
            freshness_days: Some(freshness_days),
            ownership_confidence,
        })
    }

    fn head_sha(&self, root: &Path) -> Option<String> {
        let mut cache = self.head_cache.lock().unwrap();
        if let Some(cached) = cache.get(root) {
            return cached.clone();
        }
        let head = self
            .run_git(root, &["rev-parse", "HEAD"])
            .map(|raw| raw.trim().to_string())
            .filter(|sha| !sha.is_empty());
        cache.insert(root.to_path_buf(), head.clone());
        head
    }

    /// Runs git with a hard per-call timeout; any failure is `None`.
    fn run_git(&self, root: &Path, args: &[&str]) -> Option<String> {
        let mut child = Command::new(&self.config.git_binary)
            .arg("-C")
            .arg(root)
            .args(args)
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .stdin(Stdio::null())
            .spawn()
            .ok()?;

        let started = Instant::now();
        loop {
            match child.try_wait() {
                Ok(Some(status)) => {
                    if !status.success() {
                        return None;
                    }
                    break;
                }
                Ok(None) => {
                    if started.elapsed() > GIT_TIMEOUT {
                        let _ = child.kill();
                        let _ = child.wait();
                        return None;
                    }
                    std::thread::sleep(Duration::from_millis(10));
                }
                Err(_) => return None,
            }
        }

        let mut output = String::new();
        child.stdout.take()?.read_to_string(&mut output).ok()?;
        Some(output)
    }
}

fn parse_commit_line(line: &str) -> Option<CommitInfo> {
    let mut parts = line.splitn(4, '\u{1f}');
    let sha = parts.next()?.trim();
    let timestamp = parts.next()?.trim().parse::<i64>().ok()?;
    let author = parts.next()?.trim();
    let message = parts.next().unwrap_or_default().trim();
    if sha.is_empty() {
        return None;
    }
    Some(CommitInfo {
        sha: sha.to_string(),
        author: author.to_string(),
        timestamp,
        message: message.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_commit_line_splits_fields() {
        let line = "abc123\u{1f}1700000000\u{1f}Ada\u{1f}fix: tighten lock ttl";
        let commit = parse_commit_line(line).unwrap();
        assert_eq!(commit.sha, "abc123");
        assert_eq!(commit.timestamp, 1_700_000_000);
        assert_eq!(commit.author, "Ada");
        assert_eq!(commit.message, "fix: tighten lock ttl");
    }

    #[test]
    fn stability_score_follows_churn() {
        assert_eq!(1.0_f64 / (1.0 + 0.0), 1.0);
        assert!((1.0_f64 / (1.0 + 4.0) - 0.2).abs() < 1e-12);
    }
}
