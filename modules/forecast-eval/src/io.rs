//! JSON persistence for record batches and summaries.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{EvalError, EvalResult};

pub fn load_json<T: DeserializeOwned>(path: &Path) -> EvalResult<T> {
    let content = fs::read_to_string(path).map_err(|source| EvalError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&content).map_err(|source| EvalError::Json {
        path: path.to_path_buf(),
        source,
    })
}

/// One JSON value per non-blank line.
pub fn load_jsonl<T: DeserializeOwned>(path: &Path) -> EvalResult<Vec<T>> {
    let content = fs::read_to_string(path).map_err(|source| EvalError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    content
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| {
            serde_json::from_str(line).map_err(|source| EvalError::Json {
                path: path.to_path_buf(),
                source,
            })
        })
        .collect()
}

/// Load a record batch as a JSON array, or as JSON Lines for `.jsonl` files.
pub fn load_records<T: DeserializeOwned>(path: &Path) -> EvalResult<Vec<T>> {
    if path.extension().is_some_and(|ext| ext == "jsonl") {
        load_jsonl(path)
    } else {
        load_json(path)
    }
}

/// Write pretty-printed JSON. Existing files are never overwritten; missing
/// parent directories are created.
pub fn save_json<T: Serialize + ?Sized>(value: &T, path: &Path) -> EvalResult<PathBuf> {
    prepare_output(path)?;
    let body = serde_json::to_string_pretty(value).map_err(|source| EvalError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    write_new(path, body)
}

pub fn save_jsonl<T: Serialize>(values: &[T], path: &Path) -> EvalResult<PathBuf> {
    prepare_output(path)?;
    let mut body = String::new();
    for value in values {
        let line = serde_json::to_string(value).map_err(|source| EvalError::Json {
            path: path.to_path_buf(),
            source,
        })?;
        body.push_str(&line);
        body.push('\n');
    }
    write_new(path, body)
}

fn prepare_output(path: &Path) -> EvalResult<()> {
    if path.exists() {
        return Err(EvalError::OutputExists(path.to_path_buf()));
    }
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|source| EvalError::Io {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    Ok(())
}

fn write_new(path: &Path, body: String) -> EvalResult<PathBuf> {
    // A file created after the exists() check is still refused.
    let io_err = |source| EvalError::Io {
        path: path.to_path_buf(),
        source,
    };
    let mut file = fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .map_err(|e| match e.kind() {
            std::io::ErrorKind::AlreadyExists => EvalError::OutputExists(path.to_path_buf()),
            _ => io_err(e),
        })?;
    std::io::Write::write_all(&mut file, body.as_bytes()).map_err(io_err)?;
    Ok(path.to_path_buf())
}

/// `YYYYmmddHHMMSS` in local time.
pub fn timestamp(now: DateTime<Local>) -> String {
    now.format("%Y%m%d%H%M%S").to_string()
}

/// Result and summary paths for one scoring run:
/// `<folder>/<task>_scoring_result_<ts>.json` and its `_summary.json` sibling.
pub fn timestamped_result_paths(
    result_folder: &Path,
    task: &str,
    now: DateTime<Local>,
) -> (PathBuf, PathBuf) {
    let stem = format!("{task}_scoring_result_{}", timestamp(now));
    (
        result_folder.join(format!("{stem}.json")),
        result_folder.join(format!("{stem}_summary.json")),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::{json, Value};

    #[test]
    fn save_creates_parents_and_refuses_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/out.json");

        save_json(&json!({"a": 1}), &path).unwrap();
        let back: Value = load_json(&path).unwrap();
        assert_eq!(back, json!({"a": 1}));

        let err = save_json(&json!({"a": 2}), &path).unwrap_err();
        assert!(matches!(err, EvalError::OutputExists(_)));
        let back: Value = load_json(&path).unwrap();
        assert_eq!(back, json!({"a": 1}));
    }

    #[test]
    fn jsonl_skips_blank_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("batch.jsonl");
        save_jsonl(&[json!({"qid": 1}), json!({"qid": 2})], &path).unwrap();
        std::fs::write(&path, std::fs::read_to_string(&path).unwrap() + "\n\n").unwrap();

        let records: Vec<Value> = load_records(&path).unwrap();
        assert_eq!(records.len(), 2);
    }

    #[test]
    fn invalid_json_names_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, "{not json").unwrap();
        let err = load_json::<Value>(&path).unwrap_err();
        assert!(err.to_string().contains("bad.json"));
    }

    #[test]
    fn result_paths_share_a_timestamp() {
        let now = Local.with_ymd_and_hms(2024, 7, 1, 9, 5, 3).unwrap();
        let (result, summary) = timestamped_result_paths(Path::new("out"), "task4", now);
        assert_eq!(result, Path::new("out/task4_scoring_result_20240701090503.json"));
        assert_eq!(summary, Path::new("out/task4_scoring_result_20240701090503_summary.json"));
    }
}
