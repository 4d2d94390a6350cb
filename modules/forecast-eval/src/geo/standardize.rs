use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use ai_client::{GenerateOptions, TextGenerator};
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use super::reference::GeoReference;
use crate::extraction::parse_model_json;
use crate::prompts::PromptRegistry;
use crate::runner::TaskRunner;
use crate::types::{EvalRecord, ExtractedInfo, StructuredForecast};

/// Suggestion meaning the model judged the mention not to be a real place.
pub const REGION_ERROR_MARKER: &str = "region error";

/// Resolution rounds before leftover names become `error_<name>`.
pub const DEFAULT_MAX_ROUNDS: u32 = 5;

/// Canonical form of a name that never resolved.
pub fn unresolved_marker(name: &str) -> String {
    format!("error_{name}")
}

pub struct GeoStandardizer {
    generator: Arc<dyn TextGenerator>,
    reference: Arc<GeoReference>,
    prompts: Arc<PromptRegistry>,
    model: String,
    options: GenerateOptions,
    max_rounds: u32,
    /// Canonical names as a JSON array, embedded in every prompt
    std_geo_list: String,
}

impl GeoStandardizer {
    pub fn new(
        generator: Arc<dyn TextGenerator>,
        reference: Arc<GeoReference>,
        prompts: Arc<PromptRegistry>,
        model: impl Into<String>,
    ) -> Self {
        let std_geo_list = Value::from(reference.canonical_names().to_vec()).to_string();
        Self {
            generator,
            reference,
            prompts,
            model: model.into(),
            options: GenerateOptions::json_object().temperature(1.0),
            max_rounds: DEFAULT_MAX_ROUNDS,
            std_geo_list,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.options = self.options.temperature(temperature);
        self
    }

    pub fn with_max_rounds(mut self, max_rounds: u32) -> Self {
        self.max_rounds = max_rounds.max(1);
        self
    }

    /// Map raw mentions to canonical names, position for position.
    ///
    /// Canonical names pass through; the rest are deduplicated and resolved
    /// together, so a list that is already canonical never reaches the model.
    pub async fn standardize(&self, names: &[String]) -> Vec<String> {
        let stripped: Vec<&str> = names.iter().map(|n| n.trim()).collect();

        let mut seen = HashSet::new();
        let pending: Vec<String> = stripped
            .iter()
            .filter(|n| !self.reference.is_canonical(n) && seen.insert(**n))
            .map(|n| n.to_string())
            .collect();

        let resolved = if pending.is_empty() {
            HashMap::new()
        } else {
            self.resolve(pending).await
        };

        stripped
            .into_iter()
            .map(|name| {
                if self.reference.is_canonical(name) {
                    name.to_string()
                } else {
                    resolved
                        .get(name)
                        .cloned()
                        .unwrap_or_else(|| unresolved_marker(name))
                }
            })
            .collect()
    }

    /// Bounded resolution loop: each round sends every still-pending name in
    /// one request and keeps only acceptable suggestions.
    async fn resolve(&self, mut pending: Vec<String>) -> HashMap<String, String> {
        let mut resolved = HashMap::new();

        for round in 1..=self.max_rounds {
            if pending.is_empty() {
                break;
            }
            let geo_list = json!({ "ori_geo": pending }).to_string();
            let prompt =
                self.prompts
                    .geo_standardize_prompt(&geo_list, &self.std_geo_list, REGION_ERROR_MARKER);

            let suggestions = match self.request(&prompt).await {
                Ok(suggestions) => suggestions,
                Err(reason) => {
                    warn!(round, pending = pending.len(), %reason, "Geo standardization round failed");
                    continue;
                }
            };

            let mut still_pending = Vec::new();
            for (idx, name) in pending.into_iter().enumerate() {
                match suggestions.get(idx).and_then(Option::as_deref) {
                    Some(s) if s == REGION_ERROR_MARKER || self.reference.is_canonical(s) => {
                        resolved.insert(name, s.to_string());
                    }
                    _ => still_pending.push(name),
                }
            }
            debug!(
                round,
                resolved = resolved.len(),
                pending = still_pending.len(),
                "Geo standardization round"
            );
            pending = still_pending;
        }

        if !pending.is_empty() {
            warn!(unresolved = ?pending, "Geo names left unresolved");
        }
        resolved
    }

    async fn request(&self, prompt: &str) -> Result<Vec<Option<String>>, String> {
        let raw = self
            .generator
            .generate(&self.model, prompt, &self.options)
            .await
            .map_err(|e| e.to_string())?;
        let value = parse_model_json(&raw).map_err(|e| e.to_string())?;
        let entries = value
            .get("std_geo")
            .and_then(Value::as_array)
            .ok_or("response has no `std_geo` list")?;
        Ok(entries
            .iter()
            .map(|v| v.as_str().map(|s| s.trim().to_string()))
            .collect())
    }

    /// Copy of `forecast` with `std_geo` filled for every region and the max
    /// temperature claim.
    pub async fn standardize_forecast(&self, forecast: &StructuredForecast) -> StructuredForecast {
        let mentions = forecast.unique_geo_mentions();
        let canonical = self.standardize(&mentions).await;
        apply_mapping(forecast, mentions.into_iter().zip(canonical).collect())
    }

    /// Records whose extraction failed pass through unchanged.
    pub async fn standardize_record(&self, record: &EvalRecord) -> EvalRecord {
        let mut out = record.clone();
        if let Some(forecast) = record.forecast() {
            out.extracted_info = Some(ExtractedInfo::Valid(
                self.standardize_forecast(forecast).await,
            ));
        }
        out
    }

    /// Same as the model-backed path with nothing resolved: canonical names
    /// pass, everything else is marked unresolved.
    fn fallback_record(&self, record: &EvalRecord) -> EvalRecord {
        let mut out = record.clone();
        if let Some(forecast) = record.forecast() {
            let mapping = forecast
                .unique_geo_mentions()
                .into_iter()
                .map(|m| {
                    let name = m.trim();
                    let canonical = if self.reference.is_canonical(name) {
                        name.to_string()
                    } else {
                        unresolved_marker(name)
                    };
                    (m, canonical)
                })
                .collect();
            out.extracted_info = Some(ExtractedInfo::Valid(apply_mapping(forecast, mapping)));
        }
        out
    }

    pub async fn standardize_batch(
        self: &Arc<Self>,
        runner: &TaskRunner,
        records: &[EvalRecord],
    ) -> Vec<EvalRecord> {
        info!(records = records.len(), model = %self.model, "Starting geo standardization");

        let outcomes = runner
            .run(records.to_vec(), |record| {
                let standardizer = Arc::clone(self);
                async move { Ok(standardizer.standardize_record(&record).await) }
            })
            .await;

        outcomes
            .into_iter()
            .zip(records)
            .map(|(outcome, original)| match outcome {
                Ok(record) => record,
                Err(failure) => {
                    warn!(qid = %original.qid, %failure, "Standardization task failed, marking names unresolved");
                    self.fallback_record(original)
                }
            })
            .collect()
    }
}

fn apply_mapping(
    forecast: &StructuredForecast,
    mapping: HashMap<String, String>,
) -> StructuredForecast {
    let lookup = |geo: &[String]| -> Vec<String> {
        geo.iter()
            .map(|g| {
                mapping
                    .get(g)
                    .cloned()
                    .unwrap_or_else(|| unresolved_marker(g.trim()))
            })
            .collect()
    };

    let mut out = forecast.clone();
    for region in &mut out.specific_regions {
        region.std_geo = lookup(&region.geo);
    }
    if let Some(ref mut max_temp) = out.max_temp {
        max_temp.std_geo = lookup(&max_temp.geo);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{forecast, max_temp, region, ScriptedGenerator};
    use std::path::Path;

    const TABLE: &str = "\
station_id,province,city
59287,广东,广州
59493,广东,深圳
57996,广东,韶关
";

    fn standardizer(generator: Arc<ScriptedGenerator>) -> GeoStandardizer {
        let reference = GeoReference::from_reader(TABLE.as_bytes(), Path::new("t.csv")).unwrap();
        GeoStandardizer::new(
            generator,
            Arc::new(reference),
            Arc::new(PromptRegistry::builtin()),
            "test-model",
        )
    }

    fn names(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn canonical_names_skip_the_model() {
        let generator = Arc::new(ScriptedGenerator::new());
        let out = standardizer(generator.clone())
            .standardize(&names(&[" 广州", "深圳", "广州"]))
            .await;
        assert_eq!(out, names(&["广州", "深圳", "广州"]));
        assert_eq!(generator.call_count(), 0);
    }

    #[tokio::test]
    async fn resolves_aliases_in_one_request_and_keeps_duplicates() {
        let generator = Arc::new(
            ScriptedGenerator::new().reply(r#"{"std_geo": ["广州", "region error"]}"#),
        );
        let out = standardizer(generator.clone())
            .standardize(&names(&["羊城", "深圳", "火星", "羊城"]))
            .await;
        assert_eq!(out, names(&["广州", "深圳", "region error", "广州"]));
        assert_eq!(generator.call_count(), 1);
        assert!(generator.prompts()[0].contains(r#"{"ori_geo":["羊城","火星"]}"#));
    }

    #[tokio::test]
    async fn retries_only_rejected_names() {
        let generator = Arc::new(
            ScriptedGenerator::new()
                .reply(r#"{"std_geo": ["广州", "粤北"]}"#)
                .reply(r#"{"std_geo": ["韶关"]}"#),
        );
        let out = standardizer(generator.clone())
            .standardize(&names(&["羊城", "粤北山区"]))
            .await;
        assert_eq!(out, names(&["广州", "韶关"]));
        assert_eq!(generator.call_count(), 2);
        assert!(generator.prompts()[1].contains(r#"{"ori_geo":["粤北山区"]}"#));
    }

    #[tokio::test]
    async fn unresolved_after_max_rounds_gets_error_marker() {
        let generator = Arc::new(ScriptedGenerator::new().always(r#"{"std_geo": ["珠三角"]}"#));
        let out = standardizer(generator.clone())
            .standardize(&names(&["珠三角"]))
            .await;
        assert_eq!(out, names(&["error_珠三角"]));
        assert_eq!(generator.call_count(), 5);
    }

    #[tokio::test]
    async fn forecast_std_geo_mirrors_geo() {
        let generator = Arc::new(ScriptedGenerator::new().reply(r#"{"std_geo": ["广州"]}"#));
        let input = forecast(
            vec![region(&["羊城", "深圳"], Some(33.0), Some(35.0))],
            None,
            Some(crate::types::MaxTempClaim {
                std_geo: Vec::new(),
                ..max_temp(&["羊城"], Some(36.0))
            }),
        );
        let out = standardizer(generator.clone()).standardize_forecast(&input).await;

        assert_eq!(out.specific_regions[0].std_geo, names(&["广州", "深圳"]));
        assert_eq!(out.max_temp_std_geo(), &["广州".to_string()]);
        assert!(input.specific_regions[0].std_geo.is_empty());
        assert_eq!(generator.call_count(), 1);
    }

    #[tokio::test]
    async fn failed_extraction_passes_through() {
        let generator = Arc::new(ScriptedGenerator::new());
        let mut record = EvalRecord::new("7", "text");
        record.extracted_info = Some(ExtractedInfo::Failed {
            error_res: Value::String("timeout".into()),
        });
        let out = standardizer(generator.clone()).standardize_record(&record).await;
        assert_eq!(out, record);
        assert_eq!(generator.call_count(), 0);
    }
}
