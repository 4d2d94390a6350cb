use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};

use crate::file_config::PromptsConfig;
use crate::template::{render, validate};

const DEFAULT_EXTRACTION: &str = include_str!("../prompts/extract_info.md");
const DEFAULT_GEO_STANDARDIZE: &str = include_str!("../prompts/geo_standardize.md");

/// Runtime variables per prompt type.
const EXTRACTION_VARS: &[&str] = &["original_text", "schema"];
const GEO_STANDARDIZE_VARS: &[&str] = &["geo_list", "std_geo_list", "error_marker"];
const GEO_STANDARDIZE_REQUIRED: &[&str] = &["geo_list", "std_geo_list"];

/// Validated prompt templates, shared read-only by every worker.
#[derive(Debug, Clone)]
pub struct PromptRegistry {
    extraction: String,
    geo_standardize: String,
}

impl PromptRegistry {
    /// Built-in templates.
    pub fn builtin() -> Self {
        Self {
            extraction: DEFAULT_EXTRACTION.to_string(),
            geo_standardize: DEFAULT_GEO_STANDARDIZE.to_string(),
        }
    }

    /// Built-in templates, replaced by any override files the config names.
    pub fn load(config: &PromptsConfig, config_dir: &Path) -> Result<Self> {
        let mut registry = Self::builtin();

        if let Some(ref path) = config.extraction {
            registry.extraction = load_template(&config_dir.join(path), "extraction")?;
        }
        if let Some(ref path) = config.geo_standardize {
            registry.geo_standardize =
                load_template(&config_dir.join(path), "geo_standardize")?;
        }

        registry.validate()?;
        Ok(registry)
    }

    /// Templates given inline, e.g. by tests.
    pub fn from_templates(
        extraction: impl Into<String>,
        geo_standardize: impl Into<String>,
    ) -> Result<Self> {
        let registry = Self {
            extraction: extraction.into(),
            geo_standardize: geo_standardize.into(),
        };
        registry.validate()?;
        Ok(registry)
    }

    fn validate(&self) -> Result<()> {
        validate(&self.extraction, EXTRACTION_VARS, &["original_text"])
            .context("extraction prompt")?;
        validate(
            &self.geo_standardize,
            GEO_STANDARDIZE_VARS,
            GEO_STANDARDIZE_REQUIRED,
        )
        .context("geo_standardize prompt")?;
        Ok(())
    }

    pub fn extraction_prompt(&self, original_text: &str, schema: &str) -> String {
        render(
            &self.extraction,
            &HashMap::from([("original_text", original_text), ("schema", schema)]),
        )
    }

    pub fn geo_standardize_prompt(
        &self,
        geo_list: &str,
        std_geo_list: &str,
        error_marker: &str,
    ) -> String {
        render(
            &self.geo_standardize,
            &HashMap::from([
                ("geo_list", geo_list),
                ("std_geo_list", std_geo_list),
                ("error_marker", error_marker),
            ]),
        )
    }
}

impl Default for PromptRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

fn load_template(path: &Path, name: &str) -> Result<String> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {} prompt file: {}", name, path.display()))?;

    if content.trim().is_empty() {
        anyhow::bail!("Prompt file is empty: {} ({})", path.display(), name);
    }

    Ok(content)
}
