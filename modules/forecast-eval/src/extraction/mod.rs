//! Model-driven extraction of structured forecasts from free text.
//!
//! Each record runs a bounded state machine: a pending attempt issues one
//! model call, the reply is parsed and validated, and any rejection sends the
//! record back to pending until the attempt budget runs out. Exhaustion is
//! recorded as `ExtractedInfo::Failed` carrying the last rejected payload.

pub mod validate;

use std::sync::Arc;

use ai_client::{GenerateOptions, TextGenerator};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::AttemptError;
use crate::prompts::PromptRegistry;
use crate::runner::TaskRunner;
use crate::types::{EvalRecord, ExtractedInfo, StructuredForecast};

pub use validate::{parse_model_json, validate_extracted_info};

/// Attempts per record before it is finalized as failed.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Where one attempt currently stands.
enum AttemptState {
    Pending,
    Parsed(Value),
    Accepted(StructuredForecast),
    Rejected(AttemptError),
}

/// Final state of one record plus how many model calls it took.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractionOutcome {
    pub info: ExtractedInfo,
    pub attempts: u32,
}

pub struct Extractor {
    generator: Arc<dyn TextGenerator>,
    prompts: Arc<PromptRegistry>,
    model: String,
    options: GenerateOptions,
    max_attempts: u32,
    schema: String,
}

impl Extractor {
    pub fn new(
        generator: Arc<dyn TextGenerator>,
        prompts: Arc<PromptRegistry>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            generator,
            prompts,
            model: model.into(),
            options: GenerateOptions::json_object().temperature(1.0),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            schema: forecast_schema(),
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.options = self.options.temperature(temperature);
        self
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// Drive one text through the attempt loop.
    pub async fn extract(&self, original_text: &str) -> ExtractionOutcome {
        let prompt = self.prompts.extraction_prompt(original_text, &self.schema);
        let mut last_failure = None;

        for attempt in 1..=self.max_attempts {
            let mut state = AttemptState::Pending;
            loop {
                state = match state {
                    AttemptState::Pending => {
                        match self.generator.generate(&self.model, &prompt, &self.options).await {
                            Ok(raw) => match parse_model_json(&raw) {
                                Ok(value) => AttemptState::Parsed(value),
                                Err(e) => AttemptState::Rejected(e),
                            },
                            Err(e) => {
                                debug!(attempt, transient = e.is_transient(), "Model call failed");
                                AttemptState::Rejected(AttemptError::TransportFailure(e.to_string()))
                            }
                        }
                    }
                    AttemptState::Parsed(value) => match validate_extracted_info(&value) {
                        Ok(forecast) => AttemptState::Accepted(forecast),
                        Err(e) => AttemptState::Rejected(e),
                    },
                    AttemptState::Accepted(forecast) => {
                        debug!(attempt, "Extraction accepted");
                        return ExtractionOutcome {
                            info: ExtractedInfo::Valid(forecast),
                            attempts: attempt,
                        };
                    }
                    AttemptState::Rejected(e) => {
                        warn!(attempt, max_attempts = self.max_attempts, error = %e, "Extraction attempt rejected");
                        last_failure = Some(e);
                        break;
                    }
                };
            }
        }

        ExtractionOutcome {
            info: ExtractedInfo::Failed {
                error_res: last_failure.map(AttemptError::into_payload).unwrap_or(Value::Null),
            },
            attempts: self.max_attempts,
        }
    }

    /// Extract a copy of `record`; the input is never touched.
    pub async fn extract_record(&self, record: &EvalRecord) -> EvalRecord {
        let outcome = self.extract(&record.model_output).await;
        if outcome.info.is_failed() {
            warn!(qid = %record.qid, attempts = outcome.attempts, "Extraction exhausted retries");
        }
        let mut out = record.clone();
        out.extracted_info = Some(outcome.info);
        out
    }

    /// Extract every record through the runner. The output has one record per
    /// input, in input order.
    pub async fn extract_batch(
        self: &Arc<Self>,
        runner: &TaskRunner,
        records: &[EvalRecord],
    ) -> Vec<EvalRecord> {
        info!(records = records.len(), model = %self.model, "Starting extraction");

        let outcomes = runner
            .run(records.to_vec(), |record| {
                let extractor = Arc::clone(self);
                async move { Ok(extractor.extract_record(&record).await) }
            })
            .await;

        let extracted: Vec<EvalRecord> = outcomes
            .into_iter()
            .zip(records)
            .map(|(outcome, original)| match outcome {
                Ok(record) => record,
                Err(failure) => {
                    let mut record = original.clone();
                    record.extracted_info = Some(ExtractedInfo::Failed {
                        error_res: Value::String(failure.to_string()),
                    });
                    record
                }
            })
            .collect();

        let failed = extracted
            .iter()
            .filter(|r| r.extracted_info.as_ref().is_some_and(ExtractedInfo::is_failed))
            .count();
        info!(records = extracted.len(), failed, "Extraction complete");
        extracted
    }
}

/// JSON Schema of the structure the model is asked to produce.
pub fn forecast_schema() -> String {
    let schema = schemars::schema_for!(StructuredForecast);
    serde_json::to_string_pretty(&schema).unwrap_or_default()
}
