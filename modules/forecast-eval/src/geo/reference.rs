use std::collections::{HashMap, HashSet};
use std::io::Read;
use std::path::Path;

use tracing::info;

use crate::error::{EvalError, EvalResult};

/// Canonical region names and the stations each one covers.
///
/// Built once from the geo-division table: the first column holds station
/// ids, every further column is one classification level (province, city,
/// district, ...) whose non-empty cells are canonical names. Immutable after
/// construction and shared behind an `Arc`.
#[derive(Debug, Clone, Default)]
pub struct GeoReference {
    stations_by_name: HashMap<String, HashSet<String>>,
    /// Canonical names in table order (column by column, first-seen)
    canonical_names: Vec<String>,
    station_universe: HashSet<String>,
}

impl GeoReference {
    pub fn from_csv_path(path: &Path) -> EvalResult<Self> {
        let file = std::fs::File::open(path).map_err(|source| EvalError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let reference = Self::from_reader(file, path)?;
        info!(
            path = %path.display(),
            names = reference.canonical_names.len(),
            stations = reference.station_universe.len(),
            "Loaded geo reference"
        );
        Ok(reference)
    }

    /// Parse a geo-division table. `origin` only labels errors.
    pub fn from_reader<R: Read>(reader: R, origin: &Path) -> EvalResult<Self> {
        let csv_err = |source| EvalError::Csv {
            path: origin.to_path_buf(),
            source,
        };

        let mut rdr = csv::ReaderBuilder::new().flexible(true).from_reader(reader);
        let columns = rdr.headers().map_err(csv_err)?.len();
        if columns < 2 {
            return Err(EvalError::Reference(format!(
                "{}: expected a station id column plus at least one region column, found {columns}",
                origin.display()
            )));
        }

        let mut rows: Vec<Vec<String>> = Vec::new();
        for record in rdr.records() {
            let record = record.map_err(csv_err)?;
            rows.push(record.iter().map(|cell| cell.trim().to_string()).collect());
        }

        let reference = Self::from_rows(columns, &rows);
        if reference.station_universe.is_empty() {
            return Err(EvalError::Reference(format!(
                "{}: no station rows",
                origin.display()
            )));
        }
        Ok(reference)
    }

    fn from_rows(columns: usize, rows: &[Vec<String>]) -> Self {
        let mut reference = Self::default();

        for row in rows {
            if let Some(station) = row.first().filter(|s| !s.is_empty()) {
                reference.station_universe.insert(station.clone());
            }
        }

        // Column-major walk so the canonical list groups names by level.
        for column in 1..columns {
            for row in rows {
                let (Some(station), Some(name)) = (row.first(), row.get(column)) else {
                    continue;
                };
                if station.is_empty() || name.is_empty() {
                    continue;
                }
                let stations = reference
                    .stations_by_name
                    .entry(name.clone())
                    .or_insert_with(|| {
                        reference.canonical_names.push(name.clone());
                        HashSet::new()
                    });
                stations.insert(station.clone());
            }
        }

        reference
    }

    pub fn is_canonical(&self, name: &str) -> bool {
        self.stations_by_name.contains_key(name)
    }

    pub fn canonical_names(&self) -> &[String] {
        &self.canonical_names
    }

    pub fn stations_for(&self, name: &str) -> Option<&HashSet<String>> {
        self.stations_by_name.get(name)
    }

    /// Every station id in the table.
    pub fn station_universe(&self) -> &HashSet<String> {
        &self.station_universe
    }

    /// Union of the stations covered by `names`. Non-canonical names
    /// (including `error_` markers) cover nothing.
    pub fn geo_list_to_station_ids<S: AsRef<str>>(&self, names: &[S]) -> HashSet<String> {
        names
            .iter()
            .filter_map(|name| self.stations_by_name.get(name.as_ref()))
            .flatten()
            .cloned()
            .collect()
    }
}
