use serde::{Deserialize, Serialize};

use crate::types::{EvalRecord, ScoringResult};

/// Dataset-level means. Each field averages only the samples where that
/// score could be determined; `None` means no sample had one.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EvaluationSummary {
    pub total_samples: usize,
    pub scored_samples: usize,
    pub geo_accuracy: GeoSummary,
    pub temp_accuracy: TempSummary,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GeoSummary {
    pub max_temp_geo_iou: Option<f64>,
    pub other_regions_geo_iou: Option<f64>,
    pub specific_regions_geo_avg_iou: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TempSummary {
    pub max_temp_score: Option<f64>,
    pub other_regions_range_score: Option<f64>,
    /// Flattened over every predicted region of every sample
    pub specific_regions_range_score: Option<f64>,
}

/// Running sum and count of the values that were present.
#[derive(Debug, Default, Clone, Copy)]
struct Mean {
    sum: f64,
    count: usize,
}

impl Mean {
    fn push(&mut self, value: Option<f64>) {
        if let Some(v) = value {
            self.sum += v;
            self.count += 1;
        }
    }

    fn value(self) -> Option<f64> {
        (self.count > 0).then(|| self.sum / self.count as f64)
    }
}

/// Average the scores of `records`; unscored records count toward
/// `total_samples` only.
pub fn summarize(records: &[EvalRecord]) -> EvaluationSummary {
    let scores: Vec<&ScoringResult> = records
        .iter()
        .filter_map(|r| r.accuracy_score.as_ref())
        .collect();

    let mut summary = summarize_scores(scores.iter().copied());
    summary.total_samples = records.len();
    summary
}

pub fn summarize_scores<'a, I>(scores: I) -> EvaluationSummary
where
    I: IntoIterator<Item = &'a ScoringResult>,
{
    let mut max_temp_geo = Mean::default();
    let mut other_geo = Mean::default();
    let mut specific_geo = Mean::default();
    let mut max_temp = Mean::default();
    let mut other_range = Mean::default();
    let mut specific_range = Mean::default();
    let mut scored = 0;

    for score in scores {
        scored += 1;
        let geo = &score.geo_accuracy;
        max_temp_geo.push(Some(geo.max_temp_geo_iou));
        other_geo.push(Some(geo.other_regions_geo_iou));
        specific_geo.push(Some(geo.specific_regions_geo_iou.avg_iou));

        let temp = &score.temp_accuracy;
        max_temp.push(temp.max_temp_score);
        other_range.push(temp.other_regions_temp_score.range_score);
        for region in &temp.specific_regions_temp_scores {
            specific_range.push(region.range_score);
        }
    }

    EvaluationSummary {
        total_samples: scored,
        scored_samples: scored,
        geo_accuracy: GeoSummary {
            max_temp_geo_iou: max_temp_geo.value(),
            other_regions_geo_iou: other_geo.value(),
            specific_regions_geo_avg_iou: specific_geo.value(),
        },
        temp_accuracy: TempSummary {
            max_temp_score: max_temp.value(),
            other_regions_range_score: other_range.value(),
            specific_regions_range_score: specific_range.value(),
        },
    }
}

impl std::fmt::Display for EvaluationSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        fn show(v: Option<f64>) -> String {
            v.map(|x| format!("{x:.4}")).unwrap_or_else(|| "n/a".to_string())
        }

        writeln!(f, "=== Evaluation Summary ===")?;
        writeln!(f, "Samples:            {} ({} scored)", self.total_samples, self.scored_samples)?;
        writeln!(f, "Geo accuracy")?;
        writeln!(f, "  max_temp:         {}", show(self.geo_accuracy.max_temp_geo_iou))?;
        writeln!(f, "  other_regions:    {}", show(self.geo_accuracy.other_regions_geo_iou))?;
        writeln!(f, "  specific_regions: {}", show(self.geo_accuracy.specific_regions_geo_avg_iou))?;
        writeln!(f, "Temp accuracy")?;
        writeln!(f, "  max_temp:         {}", show(self.temp_accuracy.max_temp_score))?;
        writeln!(f, "  other_regions:    {}", show(self.temp_accuracy.other_regions_range_score))?;
        write!(f, "  specific_regions: {}", show(self.temp_accuracy.specific_regions_range_score))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{GeoAccuracy, MatchResult, RangeScore, TempAccuracy};

    fn score(max_temp_score: Option<f64>, region_scores: &[Option<f64>]) -> ScoringResult {
        ScoringResult {
            geo_accuracy: GeoAccuracy {
                max_temp_geo_iou: 1.0,
                other_regions_geo_iou: 0.5,
                specific_regions_geo_iou: MatchResult {
                    matched_pairs: Vec::new(),
                    unmatched_prediction_indices: Vec::new(),
                    unmatched_label_indices: Vec::new(),
                    avg_iou: 0.25,
                },
            },
            temp_accuracy: TempAccuracy {
                max_temp_score,
                other_regions_temp_score: RangeScore::default(),
                specific_regions_temp_scores: region_scores
                    .iter()
                    .map(|s| RangeScore {
                        range_score: *s,
                        ..Default::default()
                    })
                    .collect(),
            },
        }
    }

    #[test]
    fn nulls_are_excluded_not_zeroed() {
        let scores = [score(None, &[]), score(Some(1.0), &[])];
        let summary = summarize_scores(&scores);
        assert_eq!(summary.temp_accuracy.max_temp_score, Some(1.0));
        assert_eq!(summary.temp_accuracy.other_regions_range_score, None);
    }

    #[test]
    fn region_scores_are_flattened() {
        let scores = [score(None, &[Some(1.0), None]), score(None, &[Some(0.0), Some(0.5)])];
        let summary = summarize_scores(&scores);
        assert_eq!(summary.temp_accuracy.specific_regions_range_score, Some(0.5));
        assert_eq!(summary.geo_accuracy.specific_regions_geo_avg_iou, Some(0.25));
    }

    #[test]
    fn unscored_records_only_count_toward_total() {
        let mut scored = EvalRecord::new("1", "a");
        scored.accuracy_score = Some(score(Some(0.5), &[]));
        let unscored = EvalRecord::new("2", "b");

        let summary = summarize(&[scored, unscored]);
        assert_eq!(summary.total_samples, 2);
        assert_eq!(summary.scored_samples, 1);
        assert_eq!(summary.temp_accuracy.max_temp_score, Some(0.5));
    }

    #[test]
    fn empty_input_has_no_means() {
        let summary = summarize(&[]);
        assert_eq!(summary.total_samples, 0);
        assert_eq!(summary.geo_accuracy.max_temp_geo_iou, None);
        assert!(summary.to_string().contains("n/a"));
    }
}
