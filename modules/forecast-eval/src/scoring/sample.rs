use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::{info, warn};

use super::labels::LabelIndex;
use super::metric::{
    geo_list_iou, geo_list_match_and_iou, number_precise_scoring, number_range_scoring, set_iou,
};
use super::stations::{actual_range, StationTable};
use crate::geo::GeoReference;
use crate::types::{
    EvalRecord, GeoAccuracy, RangeScore, ScoringResult, StructuredForecast, TempAccuracy,
    TempRange,
};

/// Stations not claimed by any specific region or the max temperature claim.
pub fn other_station_ids(reference: &GeoReference, forecast: &StructuredForecast) -> HashSet<String> {
    let mut claimed = HashSet::new();
    for region in &forecast.specific_regions {
        claimed.extend(reference.geo_list_to_station_ids(&region.std_geo));
    }
    claimed.extend(reference.geo_list_to_station_ids(forecast.max_temp_std_geo()));

    reference
        .station_universe()
        .difference(&claimed)
        .cloned()
        .collect()
}

/// Score a predicted interval against the readings observed at `stations`.
pub fn range_score<'a, I>(
    table: &StationTable,
    stations: I,
    predicted: TempRange,
    qid: &str,
) -> RangeScore
where
    I: IntoIterator<Item = &'a String>,
{
    let readings = table.readings_for(stations, qid);
    let (actual_tmax_min, actual_tmax_max) = actual_range(&readings);
    RangeScore {
        actual_tmax_min,
        actual_tmax_max,
        range_score: number_range_scoring(
            (predicted.tmax_min, predicted.tmax_max),
            (actual_tmax_min, actual_tmax_max),
        ),
    }
}

/// Compare one prediction with its label and the sample's station readings.
pub fn score_sample(
    reference: &GeoReference,
    pred: &StructuredForecast,
    label: &StructuredForecast,
    table: &StationTable,
    qid: &str,
) -> ScoringResult {
    let pred_other = other_station_ids(reference, pred);
    let label_other = other_station_ids(reference, label);

    let geo_accuracy = GeoAccuracy {
        max_temp_geo_iou: geo_list_iou(reference, pred.max_temp_std_geo(), label.max_temp_std_geo()),
        other_regions_geo_iou: set_iou(&label_other, &pred_other),
        specific_regions_geo_iou: geo_list_match_and_iou(
            reference,
            &pred.specific_std_geo(),
            &label.specific_std_geo(),
        ),
    };

    let pred_tmax = pred.max_temp.as_ref().and_then(|m| m.tmax);
    let label_tmax = label.max_temp.as_ref().and_then(|m| m.tmax);
    let max_temp_score = match (pred_tmax, label_tmax) {
        (Some(p), Some(l)) => Some(number_precise_scoring(p, l)),
        _ => None,
    };

    let other_regions_temp_score = range_score(
        table,
        &pred_other,
        pred.other_regions.unwrap_or_default(),
        qid,
    );

    let specific_regions_temp_scores = pred
        .specific_regions
        .iter()
        .map(|region| {
            range_score(
                table,
                &reference.geo_list_to_station_ids(&region.std_geo),
                TempRange {
                    tmax_min: region.tmax_min,
                    tmax_max: region.tmax_max,
                },
                qid,
            )
        })
        .collect();

    ScoringResult {
        geo_accuracy,
        temp_accuracy: TempAccuracy {
            max_temp_score,
            other_regions_temp_score,
            specific_regions_temp_scores,
        },
    }
}

/// Scores records against the label set. Reference data is loaded once and
/// shared; each record's station CSV is read when that record is scored.
pub struct SampleScorer {
    reference: Arc<GeoReference>,
    labels: Arc<LabelIndex>,
    station_folder: PathBuf,
}

impl SampleScorer {
    pub fn new(
        reference: Arc<GeoReference>,
        labels: Arc<LabelIndex>,
        station_folder: impl Into<PathBuf>,
    ) -> Self {
        Self {
            reference,
            labels,
            station_folder: station_folder.into(),
        }
    }

    /// Copy of `record` with `accuracy_score` set. Records without a usable
    /// extraction, without a label, or whose station CSV cannot be read are
    /// left unscored.
    pub fn score_record(&self, record: &EvalRecord) -> EvalRecord {
        let mut out = record.clone();
        out.accuracy_score = None;

        let Some(pred) = record.forecast() else {
            warn!(qid = %record.qid, "No valid extraction, skipping scoring");
            return out;
        };
        let Some(label) = self.labels.get(&record.qid) else {
            warn!(qid = %record.qid, "No label for sample, skipping scoring");
            return out;
        };

        let csv_path = self.station_folder.join(&label.input.csv_data_path);
        let table = match StationTable::from_csv_path(&csv_path) {
            Ok(table) => table,
            Err(e) => {
                warn!(qid = %record.qid, error = %e, "Station CSV unusable, skipping scoring");
                return out;
            }
        };
        out.accuracy_score = Some(score_sample(
            &self.reference,
            pred,
            &label.extracted_info,
            &table,
            &record.qid,
        ));
        out
    }

    /// One output record per input, in input order.
    pub fn score_batch(&self, records: &[EvalRecord]) -> Vec<EvalRecord> {
        info!(records = records.len(), "Scoring");
        let scored: Vec<EvalRecord> = records.iter().map(|r| self.score_record(r)).collect();
        let unscored = scored.iter().filter(|r| r.accuracy_score.is_none()).count();
        info!(records = scored.len(), unscored, "Scoring complete");
        scored
    }
}
