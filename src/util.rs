use anyhow::{Context, Result};
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

pub fn read_to_string(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("read {}", path.display()))
}

pub fn normalize_path(path: &Path) -> String {
    let mut parts = Vec::new();
    let absolute = path.is_absolute();
    for comp in path.components() {
        match comp {
            Component::Normal(os) => parts.push(os.to_string_lossy().to_string()),
            Component::ParentDir => {
                if parts.last().map(|p: &String| p != "..").unwrap_or(false) {
                    parts.pop();
                } else {
                    parts.push("..".to_string());
                }
            }
            Component::CurDir => {}
            _ => {}
        }
    }
    let joined = parts.join("/");
    if absolute {
        format!("/{joined}")
    } else if joined.is_empty() {
        ".".to_string()
    } else {
        joined
    }
}

pub fn normalize_rel_path(root: &Path, path: &Path) -> Result<String> {
    let rel = path
        .strip_prefix(root)
        .with_context(|| format!("strip prefix {} from {}", root.display(), path.display()))?;
    Ok(normalize_path(rel))
}

pub fn to_abs_path(root: &Path, rel: &str) -> PathBuf {
    root.join(rel)
}

/// Deterministic namespace component for a project root: every
/// non-alphanumeric byte becomes an underscore.
pub fn sanitize_project_name(root: &Path) -> String {
    let raw = root.to_string_lossy();
    raw.chars()
        .map(|ch| if ch.is_ascii_alphanumeric() { ch } else { '_' })
        .collect()
}

const ENTRY_BASENAMES: &[&str] = &[
    "index.ts", "index.js", "index.py", "main.ts", "main.js", "main.py",
];

/// Conventional program entry points: `index.*`/`main.*` basenames for the
/// scripting languages, or a `/bin/` / `/src/main/` path segment.
pub fn is_entry_point(filepath: &str) -> bool {
    let basename = filepath.rsplit('/').next().unwrap_or(filepath);
    if ENTRY_BASENAMES.iter().any(|name| *name == basename) {
        return true;
    }
    filepath.contains("/bin/") || filepath.contains("/src/main/")
}

/// Filepath component of a canonical `<filepath>:<name>:<row>` symbol ID.
pub fn filepath_of_id(id: &str) -> &str {
    id.rsplitn(3, ':').last().unwrap_or(id)
}

pub fn now_unix_secs() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}

pub fn now_unix_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}

pub fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }
    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0usize; b.len() + 1];
    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = if ca == cb { 0 } else { 1 };
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}

/// Normalised name similarity: `1 - distance / max_len`, in `[0, 1]`.
pub fn name_similarity(a: &str, b: &str) -> f64 {
    let max_len = a.chars().count().max(b.chars().count());
    if max_len == 0 {
        return 1.0;
    }
    1.0 - levenshtein(a, b) as f64 / max_len as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_replaces_non_alphanumerics() {
        assert_eq!(
            sanitize_project_name(Path::new("/home/dev/my-app")),
            "_home_dev_my_app"
        );
    }

    #[test]
    fn entry_point_detection() {
        assert!(is_entry_point("/p/src/index.ts"));
        assert!(is_entry_point("/p/main.py"));
        assert!(is_entry_point("/p/src/bin/tool.rs"));
        assert!(is_entry_point("/p/src/main/java/App.java"));
        assert!(!is_entry_point("/p/src/util.ts"));
    }

    #[test]
    fn filepath_recovered_from_id() {
        assert_eq!(filepath_of_id("/p/src/a.ts:Foo:12"), "/p/src/a.ts");
        assert_eq!(filepath_of_id("plain"), "plain");
    }

    #[test]
    fn levenshtein_basics() {
        assert_eq!(levenshtein("kitten", "sitting"), 3);
        assert_eq!(levenshtein("", "abc"), 3);
        assert_eq!(levenshtein("abc", "abc"), 0);
    }

    #[test]
    fn similarity_is_normalised() {
        assert!(name_similarity("Parser", "Parser") > 0.99);
        assert!(name_similarity("Parser", "Parsers") > 0.8);
        assert!(name_similarity("Parser", "Renderer") < 0.5);
    }
}
