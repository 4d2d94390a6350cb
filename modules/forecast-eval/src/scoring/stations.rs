use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

use tracing::warn;

use crate::error::{EvalError, EvalResult};

const STATION_COLUMNS: [&str; 2] = ["station_id", "stationid"];
const TMAX_COLUMN: &str = "tmax";

/// One sample's observed daily maximum temperature per station.
#[derive(Debug, Clone, Default)]
pub struct StationTable {
    tmax: HashMap<String, f64>,
}

impl StationTable {
    pub fn from_csv_path(path: &Path) -> EvalResult<Self> {
        let file = std::fs::File::open(path).map_err(|source| EvalError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_reader(file, path)
    }

    /// Station ids are always read as strings; rows with an empty, non-numeric
    /// or non-finite `tmax` are skipped, and the first row wins for repeated ids.
    pub fn from_reader<R: Read>(reader: R, origin: &Path) -> EvalResult<Self> {
        let csv_err = |source| EvalError::Csv {
            path: origin.to_path_buf(),
            source,
        };

        let mut rdr = csv::ReaderBuilder::new().flexible(true).from_reader(reader);
        let headers = rdr.headers().map_err(csv_err)?.clone();
        let column = |wanted: &[&str]| {
            headers
                .iter()
                .position(|h| wanted.contains(&h.trim().to_lowercase().as_str()))
        };
        let (Some(station_col), Some(tmax_col)) =
            (column(&STATION_COLUMNS[..]), column(&[TMAX_COLUMN][..]))
        else {
            return Err(EvalError::Reference(format!(
                "{}: station CSV needs `station_id` (or `stationid`) and `tmax` columns",
                origin.display()
            )));
        };

        let mut tmax = HashMap::new();
        for record in rdr.records() {
            let record = record.map_err(csv_err)?;
            let Some(station) = record.get(station_col).map(str::trim).filter(|s| !s.is_empty())
            else {
                continue;
            };
            let Some(raw) = record.get(tmax_col).map(str::trim).filter(|s| !s.is_empty()) else {
                continue;
            };
            match raw.parse::<f64>() {
                Ok(value) if value.is_finite() => {
                    tmax.entry(station.to_string()).or_insert(value);
                }
                Ok(_) => {
                    warn!(path = %origin.display(), station, value = raw, "Non-finite tmax, skipping")
                }
                Err(_) => {
                    warn!(path = %origin.display(), station, value = raw, "Unparseable tmax, skipping")
                }
            }
        }

        Ok(Self { tmax })
    }

    pub fn len(&self) -> usize {
        self.tmax.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tmax.is_empty()
    }

    pub fn tmax(&self, station: &str) -> Option<f64> {
        self.tmax.get(station).copied()
    }

    /// Readings for `stations`. Stations without a row are logged and left out.
    pub fn readings_for<'a, I>(&self, stations: I, qid: &str) -> Vec<f64>
    where
        I: IntoIterator<Item = &'a String>,
    {
        let mut readings = Vec::new();
        for station in stations {
            match self.tmax.get(station) {
                Some(value) => readings.push(*value),
                None => warn!(qid, station = %station, "Station not found in CSV"),
            }
        }
        readings
    }
}

impl FromIterator<(String, f64)> for StationTable {
    fn from_iter<T: IntoIterator<Item = (String, f64)>>(iter: T) -> Self {
        let mut tmax = HashMap::new();
        for (station, value) in iter {
            tmax.entry(station).or_insert(value);
        }
        Self { tmax }
    }
}

/// Drop readings more than two population standard deviations from the
/// median of the sample.
///
/// The window is centred on the median on purpose, not on the mean. A single
/// gross outlier drags the mean toward itself far enough to stay inside a
/// mean-centred window in small samples (`[20, 21, 19, 100]` keeps `100`).
/// On samples without such skew both centres keep the same readings.
pub fn remove_outliers(values: &[f64]) -> Vec<f64> {
    if values.is_empty() {
        return Vec::new();
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let std_dev = (values.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n).sqrt();
    let center = median(values);
    let threshold = 2.0 * std_dev;

    values
        .iter()
        .copied()
        .filter(|x| (x - center).abs() <= threshold)
        .collect()
}

fn median(values: &[f64]) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

/// `[min, max]` of the readings left after outlier rejection, or
/// `(None, None)` when nothing is left.
pub fn actual_range(readings: &[f64]) -> (Option<f64>, Option<f64>) {
    let kept = remove_outliers(readings);
    let min = kept.iter().copied().reduce(f64::min);
    let max = kept.iter().copied().reduce(f64::max);
    (min, max)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_single_gross_outlier() {
        assert_eq!(remove_outliers(&[20.0, 21.0, 19.0, 100.0]), vec![20.0, 21.0, 19.0]);
        assert_eq!(actual_range(&[20.0, 21.0, 19.0, 100.0]), (Some(19.0), Some(21.0)));
    }

    /// Reference mean-centred filter.
    fn mean_centred(values: &[f64]) -> Vec<f64> {
        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let std_dev = (values.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n).sqrt();
        values
            .iter()
            .copied()
            .filter(|x| (x - mean).abs() <= 2.0 * std_dev)
            .collect()
    }

    #[test]
    fn agrees_with_mean_centred_window_on_unskewed_samples() {
        let samples: [&[f64]; 3] = [
            &[33.1, 34.2, 35.0, 35.8, 36.9],
            &[30.0, 31.0, 31.0, 32.0, 32.0, 32.0, 33.0, 33.0, 34.0, 39.5],
            &[28.0, 29.0, 30.0, 31.0, 32.0, 33.0, 34.0, 45.0],
        ];
        for sample in samples {
            assert_eq!(remove_outliers(sample), mean_centred(sample), "{sample:?}");
        }
        // Both drop the warm straggler here.
        assert_eq!(remove_outliers(samples[1]).len(), 9);
    }

    #[test]
    fn median_window_rejects_what_the_mean_window_keeps() {
        let sample = [20.0, 21.0, 19.0, 100.0];
        assert!(mean_centred(&sample).contains(&100.0));
        assert!(!remove_outliers(&sample).contains(&100.0));
    }

    #[test]
    fn non_finite_readings_are_skipped() {
        let csv = "station_id,tmax\n1,NaN\n2,inf\n3,34\n4,-Infinity\n5,35\n";
        let table = StationTable::from_reader(csv.as_bytes(), Path::new("d.csv")).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.tmax("1"), None);

        let wanted: Vec<String> = ["1", "2", "3", "4", "5"].iter().map(|s| s.to_string()).collect();
        let readings = table.readings_for(&wanted, "q1");
        assert_eq!(actual_range(&readings), (Some(34.0), Some(35.0)));
    }

    #[test]
    fn keeps_tight_readings() {
        assert_eq!(remove_outliers(&[30.0, 30.0, 30.0]), vec![30.0, 30.0, 30.0]);
        assert_eq!(actual_range(&[33.5]), (Some(33.5), Some(33.5)));
    }

    #[test]
    fn empty_readings_are_undeterminable() {
        assert!(remove_outliers(&[]).is_empty());
        assert_eq!(actual_range(&[]), (None, None));
    }

    #[test]
    fn parses_either_station_header() {
        let csv = "stationid,tmax\n59287,35.1\n59288,\n59287,99\n";
        let table = StationTable::from_reader(csv.as_bytes(), Path::new("a.csv")).unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(table.tmax("59287"), Some(35.1));
        assert_eq!(table.tmax("59288"), None);

        let csv = "date,station_id,tmax\n2024-07-01,00123,36\n";
        let table = StationTable::from_reader(csv.as_bytes(), Path::new("b.csv")).unwrap();
        assert_eq!(table.tmax("00123"), Some(36.0));
    }

    #[test]
    fn missing_columns_are_a_reference_error() {
        let result = StationTable::from_reader("id,temp\n1,2\n".as_bytes(), Path::new("c.csv"));
        assert!(matches!(result, Err(EvalError::Reference(_))));
    }

    #[test]
    fn readings_skip_unknown_stations() {
        let table: StationTable = [("1".to_string(), 30.0), ("2".to_string(), 31.0)]
            .into_iter()
            .collect();
        let wanted = vec!["1".to_string(), "3".to_string()];
        assert_eq!(table.readings_for(&wanted, "q1"), vec![30.0]);
    }
}
