//! Comparison of predicted forecasts with labels and station observations.

pub mod assignment;
pub mod labels;
pub mod metric;
pub mod sample;
pub mod stations;

pub use labels::LabelIndex;
pub use metric::{
    geo_list_iou, geo_list_match_and_iou, number_precise_scoring, number_range_scoring, set_iou,
};
pub use sample::{other_station_ids, score_sample, SampleScorer};
pub use stations::{actual_range, remove_outliers, StationTable};
