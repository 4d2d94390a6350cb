use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::runner::DEFAULT_MAX_WORKERS;

/// TOML-backed configuration loaded from disk.
/// Secrets (API key, endpoint) stay as env vars. Every section has defaults,
/// so an empty file is a valid config.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct FileConfig {
    pub models: ModelsConfig,
    pub runner: RunnerConfig,
    pub retry: RetryConfig,
    pub data: DataConfig,
    pub prompts: PromptsConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct ModelsConfig {
    pub extraction: String,
    pub geo_standardize: String,
    pub temperature: f32,
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            extraction: "deepseek-ai/DeepSeek-V3".to_string(),
            geo_standardize: "deepseek-ai/DeepSeek-V3".to_string(),
            temperature: 1.0,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct RunnerConfig {
    pub max_workers: usize,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            max_workers: DEFAULT_MAX_WORKERS,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct RetryConfig {
    /// Model calls per record (extraction) or resolution rounds (geo)
    pub max_attempts: u32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self { max_attempts: 5 }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct DataConfig {
    /// Station id → region classification table
    pub geo_division: PathBuf,
    /// Folder holding one station CSV per labeled sample
    pub station_csv_folder: PathBuf,
    /// Labeled dataset (JSON array of label records)
    pub labels: PathBuf,
    /// Where timestamped result files go
    pub result_folder: PathBuf,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            geo_division: PathBuf::from("data/geo_division.csv"),
            station_csv_folder: PathBuf::from("data/tmax"),
            labels: PathBuf::from("data/labels.json"),
            result_folder: PathBuf::from("result/evaluation"),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct PromptsConfig {
    pub extraction: Option<PathBuf>,
    pub geo_standardize: Option<PathBuf>,
}

impl DataConfig {
    /// Resolve relative paths against the directory the config file lives in.
    pub fn resolved(&self, config_dir: &Path) -> Self {
        Self {
            geo_division: config_dir.join(&self.geo_division),
            station_csv_folder: config_dir.join(&self.station_csv_folder),
            labels: config_dir.join(&self.labels),
            result_folder: config_dir.join(&self.result_folder),
        }
    }
}

/// Load and parse a TOML config file.
pub fn load_config(path: &Path) -> Result<FileConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    let config: FileConfig = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_uses_defaults() {
        let config: FileConfig = toml::from_str("").unwrap();
        assert_eq!(config.runner.max_workers, 5);
        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.models.temperature, 1.0);
        assert!(config.prompts.extraction.is_none());
    }

    #[test]
    fn partial_sections_merge_with_defaults() {
        let config: FileConfig = toml::from_str(
            r#"
            [models]
            extraction = "qwen-max"

            [data]
            labels = "labels/task4.json"
            "#,
        )
        .unwrap();
        assert_eq!(config.models.extraction, "qwen-max");
        assert_eq!(config.models.geo_standardize, "deepseek-ai/DeepSeek-V3");
        assert_eq!(config.data.labels, PathBuf::from("labels/task4.json"));
        assert_eq!(config.data.result_folder, PathBuf::from("result/evaluation"));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let result: std::result::Result<FileConfig, _> = toml::from_str("[runner]\nthreads = 3\n");
        assert!(result.is_err());
    }

    #[test]
    fn data_paths_resolve_against_config_dir() {
        let data = DataConfig::default().resolved(Path::new("/srv/eval"));
        assert_eq!(data.labels, PathBuf::from("/srv/eval/data/labels.json"));
    }
}
