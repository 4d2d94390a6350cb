//! Pure comparison primitives. No I/O; geography goes through a
//! [`GeoReference`] passed in by the caller.

use std::collections::HashSet;
use std::hash::Hash;

use super::assignment;
use crate::geo::GeoReference;
use crate::types::{MatchResult, MatchedPair};

/// `|A ∩ B| / |A ∪ B|`, with two empty sets counting as full agreement.
pub fn set_iou<T: Eq + Hash>(pred: &HashSet<T>, label: &HashSet<T>) -> f64 {
    if pred.is_empty() && label.is_empty() {
        return 1.0;
    }
    let intersection = pred.intersection(label).count();
    let union = pred.union(label).count();
    if union == 0 {
        return 0.0;
    }
    intersection as f64 / union as f64
}

/// IoU of the station sets two canonical name lists cover.
pub fn geo_list_iou<S: AsRef<str>>(reference: &GeoReference, pred: &[S], label: &[S]) -> f64 {
    set_iou(
        &reference.geo_list_to_station_ids(pred),
        &reference.geo_list_to_station_ids(label),
    )
}

/// Banded agreement of two point temperatures.
pub fn number_precise_scoring(predicted: f64, actual: f64) -> f64 {
    let diff = (actual - predicted).abs();
    if diff < 0.09 {
        1.0
    } else if diff < 0.5 {
        0.5
    } else if diff < 1.0 {
        0.1
    } else {
        0.0
    }
}

/// Agreement of a predicted `[min, max]` interval with the observed one.
///
/// The score is the better of two views: interval IoU (overlap length over
/// hull length) and the mean banded agreement of the two endpoints. A single
/// known bound is treated as a point. `None` when either side has no bound
/// at all, which callers report as undeterminable rather than zero.
pub fn number_range_scoring(
    predicted: (Option<f64>, Option<f64>),
    actual: (Option<f64>, Option<f64>),
) -> Option<f64> {
    let (p_lo, p_hi) = normalize_interval(predicted)?;
    let (a_lo, a_hi) = normalize_interval(actual)?;

    let overlap = (p_hi.min(a_hi) - p_lo.max(a_lo)).max(0.0);
    let hull = p_hi.max(a_hi) - p_lo.min(a_lo);
    let iou = if hull == 0.0 { 1.0 } else { overlap / hull };

    let endpoints = (number_precise_scoring(p_lo, a_lo) + number_precise_scoring(p_hi, a_hi)) / 2.0;

    Some(iou.max(endpoints))
}

fn normalize_interval(bounds: (Option<f64>, Option<f64>)) -> Option<(f64, f64)> {
    match bounds {
        (Some(a), Some(b)) => Some((a.min(b), a.max(b))),
        (Some(a), None) | (None, Some(a)) => Some((a, a)),
        (None, None) => None,
    }
}

/// Pair predicted regions with labeled regions to maximize total geographic
/// overlap, then average the matched IoU over the larger of the two counts.
pub fn geo_list_match_and_iou<S: AsRef<str>>(
    reference: &GeoReference,
    pred: &[Vec<S>],
    label: &[Vec<S>],
) -> MatchResult {
    let pred_count = pred.len();
    let label_count = label.len();
    if pred_count == 0 && label_count == 0 {
        return MatchResult {
            matched_pairs: Vec::new(),
            unmatched_prediction_indices: Vec::new(),
            unmatched_label_indices: Vec::new(),
            avg_iou: 1.0,
        };
    }

    let iou_matrix: Vec<Vec<f64>> = pred
        .iter()
        .map(|p| label.iter().map(|l| geo_list_iou(reference, p, l)).collect())
        .collect();
    let cost: Vec<Vec<f64>> = iou_matrix
        .iter()
        .map(|row| row.iter().map(|iou| 1.0 - iou).collect())
        .collect();

    let matched_pairs: Vec<MatchedPair> = if label_count > 0 {
        assignment::solve(&cost)
            .into_iter()
            .filter(|&(p, l)| p < pred_count && l < label_count)
            .map(|(p, l)| MatchedPair {
                prediction_index: p,
                label_index: l,
                iou: iou_matrix[p][l],
            })
            .collect()
    } else {
        Vec::new()
    };

    let matched_preds: HashSet<usize> = matched_pairs.iter().map(|m| m.prediction_index).collect();
    let matched_labels: HashSet<usize> = matched_pairs.iter().map(|m| m.label_index).collect();

    let total_iou: f64 = matched_pairs.iter().map(|m| m.iou).sum();
    let avg_iou = total_iou / pred_count.max(label_count) as f64;

    MatchResult {
        unmatched_prediction_indices: (0..pred_count)
            .filter(|i| !matched_preds.contains(i))
            .collect(),
        unmatched_label_indices: (0..label_count)
            .filter(|i| !matched_labels.contains(i))
            .collect(),
        matched_pairs,
        avg_iou,
    }
}
