//! Two-stage evaluation: (1) extraction then geo standardization,
//! (2) scoring then aggregation.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use ai_client::TextGenerator;
use anyhow::{Context, Result};
use chrono::Local;
use tracing::info;

use crate::aggregate::{summarize, EvaluationSummary};
use crate::extraction::Extractor;
use crate::file_config::{DataConfig, FileConfig};
use crate::geo::{GeoReference, GeoStandardizer};
use crate::io::{load_records, save_json, timestamped_result_paths};
use crate::prompts::PromptRegistry;
use crate::runner::TaskRunner;
use crate::scoring::{LabelIndex, SampleScorer};
use crate::types::EvalRecord;

/// Paths written by one full run.
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub result_path: PathBuf,
    pub summary_path: PathBuf,
    pub summary: EvaluationSummary,
}

pub struct EvaluationPipeline {
    task: String,
    config: FileConfig,
    data: DataConfig,
    runner: TaskRunner,
    reference: Arc<GeoReference>,
    prompts: Arc<PromptRegistry>,
    extractor: Option<Arc<Extractor>>,
    standardizer: Option<Arc<GeoStandardizer>>,
    scorer: Option<SampleScorer>,
}

impl EvaluationPipeline {
    /// Load shared reference data. Stages are attached separately so a
    /// scoring-only run never needs model credentials.
    pub fn from_config(config: FileConfig, config_dir: &Path, task: impl Into<String>) -> Result<Self> {
        let data = config.data.resolved(config_dir);
        let runner = TaskRunner::new(config.runner.max_workers)?;
        let reference = GeoReference::from_csv_path(&data.geo_division)
            .context("Failed to load geo division table")?;
        let prompts = PromptRegistry::load(&config.prompts, config_dir)?;

        Ok(Self {
            task: task.into(),
            config,
            data,
            runner,
            reference: Arc::new(reference),
            prompts: Arc::new(prompts),
            extractor: None,
            standardizer: None,
            scorer: None,
        })
    }

    /// Attach extraction and standardization backed by `generator`.
    pub fn with_generator(mut self, generator: Arc<dyn TextGenerator>) -> Self {
        let models = &self.config.models;
        let max_attempts = self.config.retry.max_attempts;

        self.extractor = Some(Arc::new(
            Extractor::new(generator.clone(), self.prompts.clone(), &models.extraction)
                .with_temperature(models.temperature)
                .with_max_attempts(max_attempts),
        ));
        self.standardizer = Some(Arc::new(
            GeoStandardizer::new(
                generator,
                self.reference.clone(),
                self.prompts.clone(),
                &models.geo_standardize,
            )
            .with_temperature(models.temperature)
            .with_max_rounds(max_attempts),
        ));
        self
    }

    /// Attach scoring; loads the labeled dataset.
    pub fn with_scoring(mut self) -> Result<Self> {
        let labels = LabelIndex::load(&self.data.labels).context("Failed to load labels")?;
        self.scorer = Some(SampleScorer::new(
            self.reference.clone(),
            Arc::new(labels),
            self.data.station_csv_folder.clone(),
        ));
        Ok(self)
    }

    pub fn reference(&self) -> &GeoReference {
        &self.reference
    }

    pub async fn extract(&self, records: &[EvalRecord]) -> Result<Vec<EvalRecord>> {
        let extractor = self
            .extractor
            .as_ref()
            .context("extraction needs a model client")?;
        Ok(extractor.extract_batch(&self.runner, records).await)
    }

    pub async fn standardize(&self, records: &[EvalRecord]) -> Result<Vec<EvalRecord>> {
        let standardizer = self
            .standardizer
            .as_ref()
            .context("standardization needs a model client")?;
        Ok(standardizer.standardize_batch(&self.runner, records).await)
    }

    /// Stage 1: extraction then standardization.
    pub async fn info_extract(&self, records: &[EvalRecord]) -> Result<Vec<EvalRecord>> {
        let extracted = self.extract(records).await?;
        self.standardize(&extracted).await
    }

    /// Stage 2: scoring then aggregation.
    pub fn info_scoring(&self, records: &[EvalRecord]) -> Result<(Vec<EvalRecord>, EvaluationSummary)> {
        let scorer = self
            .scorer
            .as_ref()
            .context("scoring is not enabled for this pipeline")?;
        let scored = scorer.score_batch(records);
        let summary = summarize(&scored);
        Ok((scored, summary))
    }

    /// Run both stages over a record file and write timestamped results.
    pub async fn score_file(&self, input: &Path) -> Result<PipelineOutput> {
        let records: Vec<EvalRecord> = load_records(input)?;
        info!(path = %input.display(), records = records.len(), task = %self.task, "Loaded model results");

        let standardized = self.info_extract(&records).await?;
        self.finish(&standardized)
    }

    /// Stage 2 only, for records that already carry standardized extractions.
    pub fn score_extracted_file(&self, input: &Path) -> Result<PipelineOutput> {
        let records: Vec<EvalRecord> = load_records(input)?;
        self.finish(&records)
    }

    fn finish(&self, records: &[EvalRecord]) -> Result<PipelineOutput> {
        let (scored, summary) = self.info_scoring(records)?;
        let (result_path, summary_path) =
            timestamped_result_paths(&self.data.result_folder, &self.task, Local::now());

        save_json(&scored, &result_path)?;
        save_json(&summary, &summary_path)?;
        info!(
            results = %result_path.display(),
            summary = %summary_path.display(),
            "Saved scoring results"
        );

        Ok(PipelineOutput {
            result_path,
            summary_path,
            summary,
        })
    }
}
