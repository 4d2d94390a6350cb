use std::path::PathBuf;

use schemars::JsonSchema;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

// =============================================================================
// Structured forecast
// =============================================================================

/// One sample's forecast, parsed into regions and temperatures.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct StructuredForecast {
    /// Regions the forecast names explicitly, each with its own range
    pub specific_regions: Vec<Region>,
    /// Range claimed for every region not named above
    pub other_regions: Option<TempRange>,
    /// Single highest temperature claim and where it occurs
    pub max_temp: Option<MaxTempClaim>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Region {
    /// Place names exactly as written in the forecast
    #[serde(default)]
    pub geo: Vec<String>,
    pub tmax_min: Option<f64>,
    pub tmax_max: Option<f64>,
    #[serde(default)]
    #[schemars(skip)]
    pub std_geo: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct MaxTempClaim {
    #[serde(default)]
    pub geo: Vec<String>,
    pub tmax: Option<f64>,
    #[serde(default)]
    #[schemars(skip)]
    pub std_geo: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TempRange {
    pub tmax_min: Option<f64>,
    pub tmax_max: Option<f64>,
}

impl StructuredForecast {
    /// Every raw geo mention in first-seen order, without duplicates.
    pub fn unique_geo_mentions(&self) -> Vec<String> {
        let mut seen = std::collections::HashSet::new();
        self.specific_regions
            .iter()
            .flat_map(|r| r.geo.iter())
            .chain(self.max_temp.iter().flat_map(|m| m.geo.iter()))
            .filter(|g| seen.insert(g.as_str()))
            .cloned()
            .collect()
    }

    /// Canonical name lists of each specific region, in order.
    pub fn specific_std_geo(&self) -> Vec<Vec<String>> {
        self.specific_regions
            .iter()
            .map(|r| r.std_geo.clone())
            .collect()
    }

    pub fn max_temp_std_geo(&self) -> &[String] {
        self.max_temp
            .as_ref()
            .map(|m| m.std_geo.as_slice())
            .unwrap_or(&[])
    }
}

// =============================================================================
// Extraction result
// =============================================================================

/// Outcome of extraction for one record.
///
/// Serialized either as the forecast object itself or as
/// `{"error_res": <payload>}` once every attempt was rejected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ExtractedInfo {
    Failed { error_res: Value },
    Valid(StructuredForecast),
}

impl ExtractedInfo {
    pub fn forecast(&self) -> Option<&StructuredForecast> {
        match self {
            ExtractedInfo::Valid(forecast) => Some(forecast),
            ExtractedInfo::Failed { .. } => None,
        }
    }

    pub fn forecast_mut(&mut self) -> Option<&mut StructuredForecast> {
        match self {
            ExtractedInfo::Valid(forecast) => Some(forecast),
            ExtractedInfo::Failed { .. } => None,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, ExtractedInfo::Failed { .. })
    }
}

// =============================================================================
// Scores
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchedPair {
    pub prediction_index: usize,
    pub label_index: usize,
    pub iou: f64,
}

/// Optimal pairing of predicted and labeled region lists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    pub matched_pairs: Vec<MatchedPair>,
    pub unmatched_prediction_indices: Vec<usize>,
    pub unmatched_label_indices: Vec<usize>,
    /// Sum of matched IoU divided by `max(pred_count, label_count)`
    pub avg_iou: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoAccuracy {
    pub max_temp_geo_iou: f64,
    pub other_regions_geo_iou: f64,
    pub specific_regions_geo_iou: MatchResult,
}

/// Predicted interval scored against the interval observed at stations.
/// `None` everywhere means no station resolved.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RangeScore {
    pub actual_tmax_min: Option<f64>,
    pub actual_tmax_max: Option<f64>,
    pub range_score: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TempAccuracy {
    pub max_temp_score: Option<f64>,
    pub other_regions_temp_score: RangeScore,
    pub specific_regions_temp_scores: Vec<RangeScore>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringResult {
    pub geo_accuracy: GeoAccuracy,
    pub temp_accuracy: TempAccuracy,
}

// =============================================================================
// Records
// =============================================================================

/// One model answer moving through the pipeline. Fields the pipeline does not
/// know about are carried through untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvalRecord {
    #[serde(deserialize_with = "string_or_number")]
    pub qid: String,
    pub model_output: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extracted_info: Option<ExtractedInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accuracy_score: Option<ScoringResult>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl EvalRecord {
    pub fn new(qid: impl Into<String>, model_output: impl Into<String>) -> Self {
        Self {
            qid: qid.into(),
            model_output: model_output.into(),
            extracted_info: None,
            accuracy_score: None,
            extra: Map::new(),
        }
    }

    pub fn forecast(&self) -> Option<&StructuredForecast> {
        self.extracted_info.as_ref().and_then(ExtractedInfo::forecast)
    }
}

/// Ground-truth sample: the labeled forecast plus where its station readings live.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelRecord {
    #[serde(deserialize_with = "string_or_number")]
    pub qid: String,
    pub extracted_info: StructuredForecast,
    pub input: LabelInput,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelInput {
    /// Station CSV, relative to the configured station folder
    pub csv_data_path: PathBuf,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Sample ids arrive as strings or bare integers; both become strings.
fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number, got {other}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn failed_extraction_round_trips_as_error_res() {
        let info = ExtractedInfo::Failed {
            error_res: json!("timeout"),
        };
        let value = serde_json::to_value(&info).unwrap();
        assert_eq!(value, json!({"error_res": "timeout"}));
        let back: ExtractedInfo = serde_json::from_value(value).unwrap();
        assert!(back.is_failed());
    }

    #[test]
    fn valid_extraction_deserializes_as_forecast() {
        let value = json!({
            "specific_regions": [{"geo": ["广州"], "tmax_min": 33, "tmax_max": 35}],
            "other_regions": null,
            "max_temp": null
        });
        let info: ExtractedInfo = serde_json::from_value(value).unwrap();
        let forecast = info.forecast().unwrap();
        assert_eq!(forecast.specific_regions[0].tmax_max, Some(35.0));
        assert!(forecast.specific_regions[0].std_geo.is_empty());
    }

    #[test]
    fn record_keeps_unknown_fields_and_numeric_qid() {
        let value = json!({"qid": 42, "model_output": "hot", "model": "qwen"});
        let record: EvalRecord = serde_json::from_value(value).unwrap();
        assert_eq!(record.qid, "42");
        assert_eq!(record.extra["model"], "qwen");

        let out = serde_json::to_value(&record).unwrap();
        assert_eq!(out["model"], "qwen");
        assert!(out.get("extracted_info").is_none());
    }

    #[test]
    fn unique_geo_mentions_dedupes_across_regions_and_max_temp() {
        let forecast = StructuredForecast {
            specific_regions: vec![
                Region {
                    geo: vec!["a".into(), "b".into()],
                    ..Default::default()
                },
                Region {
                    geo: vec!["b".into(), "c".into()],
                    ..Default::default()
                },
            ],
            other_regions: None,
            max_temp: Some(MaxTempClaim {
                geo: vec!["a".into(), "d".into()],
                ..Default::default()
            }),
        };
        assert_eq!(forecast.unique_geo_mentions(), vec!["a", "b", "c", "d"]);
    }
}
