//! `MeasurementStore` implementations.
//!
//! `MemoryStore` keeps the newest rows per sensor in process; `CsvStore` appends one flat file
//! per sensor (`<dir>/<sensor>.csv`) with a `value,timestamp_measured,timestamp_logged`
//! header and RFC 3339 timestamps.
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use spc_traits::{BoxError, Measurement, MeasurementStore};
use std::collections::{HashMap, VecDeque};
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};

use crate::error::SpcError;

fn window_of(
    rows: impl IntoIterator<Item = Measurement>,
    since: DateTime<Utc>,
) -> Vec<Measurement> {
    let mut out: Vec<Measurement> = rows
        .into_iter()
        .filter(|m| m.measured_at >= since)
        .collect();
    out.sort_by_key(|m| m.measured_at);
    out
}

/// Bounded in-process store. Once a sensor holds `rows_per_sensor` rows, each
/// append evicts that sensor's oldest row.
#[derive(Debug)]
pub struct MemoryStore {
    rows: Mutex<HashMap<String, VecDeque<Measurement>>>,
    rows_per_sensor: usize,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::with_rows_per_sensor(Self::DEFAULT_ROWS_PER_SENSOR)
    }
}

impl MemoryStore {
    /// One day at the default 1 s sampling period.
    pub const DEFAULT_ROWS_PER_SENSOR: usize = 86_400;

    pub fn new() -> Self {
        Self::default()
    }

    /// A capacity of 0 is treated as 1.
    pub fn with_rows_per_sensor(rows_per_sensor: usize) -> Self {
        Self {
            rows: Mutex::new(HashMap::new()),
            rows_per_sensor: rows_per_sensor.max(1),
        }
    }

    pub fn rows_per_sensor(&self) -> usize {
        self.rows_per_sensor
    }

    /// Total rows across all sensors.
    pub fn len(&self) -> usize {
        self.rows.lock().values().map(VecDeque::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl MeasurementStore for MemoryStore {
    fn append(&self, sensor: &str, m: &Measurement) -> Result<(), BoxError> {
        let mut rows = self.rows.lock();
        let q = rows.entry(sensor.to_owned()).or_default();
        if q.len() >= self.rows_per_sensor {
            q.pop_front();
        }
        q.push_back(*m);
        Ok(())
    }

    fn query_window(
        &self,
        sensor: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<Measurement>, BoxError> {
        let rows = self.rows.lock();
        Ok(rows
            .get(sensor)
            .map(|q| window_of(q.iter().copied(), since))
            .unwrap_or_default())
    }
}

#[derive(Debug)]
pub struct CsvStore {
    dir: PathBuf,
    // Serializes appends so concurrent writers never interleave a row.
    write_lock: Mutex<()>,
}

impl CsvStore {
    /// Create the directory if needed.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, SpcError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .map_err(|e| SpcError::Storage(format!("{}: {e}", dir.display())))?;
        Ok(Self {
            dir,
            write_lock: Mutex::new(()),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, sensor: &str) -> Result<PathBuf, SpcError> {
        if !spc_config::is_valid_sensor_name(sensor) {
            return Err(SpcError::InvalidName(sensor.to_owned()));
        }
        Ok(self.dir.join(format!("{sensor}.csv")))
    }
}

fn storage_err(path: &Path, e: impl std::fmt::Display) -> SpcError {
    SpcError::Storage(format!("{}: {e}", path.display()))
}

impl MeasurementStore for CsvStore {
    fn append(&self, sensor: &str, m: &Measurement) -> Result<(), BoxError> {
        let path = self.path_for(sensor)?;
        let _guard = self.write_lock.lock();
        let fresh = fs::metadata(&path).map(|md| md.len() == 0).unwrap_or(true);
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| storage_err(&path, e))?;
        let mut w = csv::WriterBuilder::new()
            .has_headers(fresh)
            .from_writer(file);
        w.serialize(m).map_err(|e| storage_err(&path, e))?;
        w.flush().map_err(|e| storage_err(&path, e))?;
        Ok(())
    }

    fn query_window(
        &self,
        sensor: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<Measurement>, BoxError> {
        let path = self.path_for(sensor)?;
        if !path.exists() {
            return Ok(Vec::new());
        }
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(true)
            .from_path(&path)
            .map_err(|e| storage_err(&path, e))?;
        let mut rows = Vec::new();
        for rec in rdr.deserialize::<Measurement>() {
            let m: Measurement = rec.map_err(|e| storage_err(&path, e))?;
            if m.measured_at >= since {
                rows.push(m);
            }
        }
        Ok(window_of(rows, since))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(sec: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, sec).unwrap()
    }

    fn m(value: f64, sec: u32) -> Measurement {
        Measurement {
            value,
            measured_at: at(sec),
            logged_at: at(sec + 1),
        }
    }

    #[test]
    fn memory_store_filters_and_sorts() {
        let s = MemoryStore::new();
        s.append("a", &m(3.0, 30)).unwrap();
        s.append("a", &m(1.0, 10)).unwrap();
        s.append("a", &m(2.0, 20)).unwrap();
        s.append("b", &m(9.0, 20)).unwrap();

        let got: Vec<f64> = s
            .query_window("a", at(20))
            .unwrap()
            .iter()
            .map(|m| m.value)
            .collect();
        assert_eq!(got, [2.0, 3.0]);
        assert!(s.query_window("missing", at(0)).unwrap().is_empty());
        assert_eq!(s.len(), 4);
    }

    #[test]
    fn memory_store_keeps_only_the_newest_rows_per_sensor() {
        let s = MemoryStore::with_rows_per_sensor(3);
        for sec in 0..10 {
            s.append("a", &m(f64::from(sec), sec)).unwrap();
        }
        s.append("b", &m(99.0, 0)).unwrap();

        let got: Vec<f64> = s
            .query_window("a", at(0))
            .unwrap()
            .iter()
            .map(|m| m.value)
            .collect();
        assert_eq!(got, [7.0, 8.0, 9.0]);
        assert_eq!(s.len(), 4);
        assert_eq!(MemoryStore::with_rows_per_sensor(0).rows_per_sensor(), 1);
    }

    #[test]
    fn csv_store_rejects_path_like_names() {
        let dir = tempfile::tempdir().unwrap();
        let s = CsvStore::open(dir.path()).unwrap();
        let err = s.append("../escape", &m(1.0, 0)).unwrap_err();
        assert!(err.to_string().contains("invalid sensor name"));
    }

    #[test]
    fn csv_store_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let s = CsvStore::open(dir.path()).unwrap();
        assert!(s.query_window("radiation_sensor", at(0)).unwrap().is_empty());
    }
}
