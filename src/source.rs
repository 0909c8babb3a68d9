//! Location history sources.
//!
//! A [`HistorySource`] yields every recorded coordinate inside a time window.
//! Records arrive in the JSON shape of the upstream location API:
//!
//! ```json
//! {"data": {"items": [
//!     {"latitude": 40.71, "longitude": -74.0, "timestampMs": "1300000000000"}
//! ]}}
//! ```

use std::path::Path;

use chrono::{DateTime, Utc};
use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::{Coordinate, History};

/// Supplies the location history for a time window.
pub trait HistorySource: Send + Sync {
    /// All coordinates recorded between `start` and `end`, inclusive.
    fn fetch_range(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<History>;
}

/// A single upstream location record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationRecord {
    pub latitude: f64,
    pub longitude: f64,
    /// Unix milliseconds as a decimal string
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp_ms: Option<String>,
}

impl LocationRecord {
    pub fn new(latitude: f64, longitude: f64, timestamp_ms: Option<i64>) -> Self {
        Self {
            latitude,
            longitude,
            timestamp_ms: timestamp_ms.map(|ts| ts.to_string()),
        }
    }

    pub fn coordinate(&self) -> Coordinate {
        Coordinate::new(self.latitude, self.longitude)
    }

    /// Parsed timestamp; `Ok(None)` when the record carries none.
    pub fn timestamp_millis(&self) -> Result<Option<i64>> {
        match self.timestamp_ms.as_deref() {
            None | Some("") => Ok(None),
            Some(raw) => raw
                .parse()
                .map(Some)
                .map_err(|_| Error::HistoryFetch(format!("bad timestamp {:?}", raw))),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct RecordsRoot {
    data: RecordsData,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct RecordsData {
    #[serde(default)]
    items: Vec<LocationRecord>,
}

/// Parse a `{"data": {"items": [...]}}` document.
pub fn parse_records(bytes: &[u8]) -> Result<Vec<LocationRecord>> {
    let root: RecordsRoot = serde_json::from_slice(bytes)?;
    Ok(root.data.items)
}

/// Serialize records into the `{"data": {"items": [...]}}` shape.
pub fn records_to_json(records: &[LocationRecord]) -> Result<String> {
    let root = RecordsRoot {
        data: RecordsData {
            items: records.to_vec(),
        },
    };
    Ok(serde_json::to_string(&root)?)
}

/// Append every record to `out` and return the oldest timestamp seen.
///
/// Records without a timestamp are still appended but logged as malformed.
pub(crate) fn append_records(records: &[LocationRecord], out: &mut History) -> Result<Option<i64>> {
    let mut oldest: Option<i64> = None;
    for record in records {
        out.push(record.coordinate());
        match record.timestamp_millis()? {
            Some(ts) => oldest = Some(oldest.map_or(ts, |o| o.min(ts))),
            None => warn!("[HistorySource] Bad history item (no timestamp): {:?}", record),
        }
    }
    Ok(oldest)
}

/// History source backed by records held in memory.
#[derive(Debug, Clone, Default)]
pub struct RecordHistorySource {
    records: Vec<LocationRecord>,
}

impl RecordHistorySource {
    pub fn new(records: Vec<LocationRecord>) -> Self {
        Self { records }
    }

    pub fn from_json_slice(bytes: &[u8]) -> Result<Self> {
        Ok(Self::new(parse_records(bytes)?))
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        Self::from_json_slice(&bytes)
    }

    pub fn records(&self) -> &[LocationRecord] {
        &self.records
    }
}

impl HistorySource for RecordHistorySource {
    fn fetch_range(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<History> {
        let (start_ms, end_ms) = (start.timestamp_millis(), end.timestamp_millis());

        let mut in_range = Vec::new();
        for record in &self.records {
            match record.timestamp_millis()? {
                Some(ts) if ts < start_ms || ts > end_ms => {}
                _ => in_range.push(record.clone()),
            }
        }

        let mut history = History::with_capacity(in_range.len());
        append_records(&in_range, &mut history)?;

        debug!(
            "[RecordHistorySource] {} of {} records in {} .. {}",
            history.len(),
            self.records.len(),
            start,
            end
        );
        Ok(history)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(secs, 0).unwrap()
    }

    #[test]
    fn test_parse_upstream_shape() {
        let json = br#"{"data": {"kind": "latitude#locationFeed", "items": [
            {"kind": "latitude#location", "latitude": 40.5, "longitude": -74.25, "timestampMs": "1300000000000"},
            {"latitude": 41.0, "longitude": -73.0}
        ]}}"#;

        let records = parse_records(json).unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].coordinate(), Coordinate::new(40.5, -74.25));
        assert_eq!(records[0].timestamp_millis().unwrap(), Some(1_300_000_000_000));
        assert_eq!(records[1].timestamp_millis().unwrap(), None);
    }

    #[test]
    fn test_empty_feed_has_no_items() {
        assert!(parse_records(br#"{"data": {}}"#).unwrap().is_empty());
    }

    #[test]
    fn test_json_round_trip() {
        let records = vec![LocationRecord::new(1.0, 2.0, Some(5)), LocationRecord::new(3.0, 4.0, None)];
        let json = records_to_json(&records).unwrap();
        assert_eq!(parse_records(json.as_bytes()).unwrap(), records);
    }

    #[test]
    fn test_fetch_range_filters_by_time() {
        let source = RecordHistorySource::new(vec![
            LocationRecord::new(1.0, 1.0, Some(999_000)),
            LocationRecord::new(2.0, 2.0, Some(1_000_000)),
            LocationRecord::new(3.0, 3.0, Some(1_500_000)),
            LocationRecord::new(4.0, 4.0, Some(2_000_001)),
        ]);

        let history = source.fetch_range(at(1_000), at(2_000)).unwrap();

        assert_eq!(history.len(), 2);
        assert_eq!(history.at(0), Coordinate::new(2.0, 2.0));
        assert_eq!(history.at(1), Coordinate::new(3.0, 3.0));
    }

    #[test]
    fn test_records_without_timestamp_are_kept() {
        let source = RecordHistorySource::new(vec![LocationRecord::new(1.0, 1.0, None)]);
        assert_eq!(source.fetch_range(at(0), at(1)).unwrap().len(), 1);
    }

    #[test]
    fn test_bad_timestamp_fails_fetch() {
        let source = RecordHistorySource::new(vec![LocationRecord {
            latitude: 1.0,
            longitude: 1.0,
            timestamp_ms: Some("noon".to_string()),
        }]);

        assert!(matches!(
            source.fetch_range(at(0), at(1)),
            Err(Error::HistoryFetch(_))
        ));
    }

    #[test]
    fn test_append_records_reports_oldest() {
        let mut history = History::new();
        let oldest = append_records(
            &[
                LocationRecord::new(1.0, 1.0, Some(30)),
                LocationRecord::new(1.0, 1.0, Some(10)),
                LocationRecord::new(1.0, 1.0, None),
            ],
            &mut history,
        )
        .unwrap();

        assert_eq!(oldest, Some(10));
        assert_eq!(history.len(), 3);
    }

    #[test]
    fn test_from_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.json");
        std::fs::write(&path, records_to_json(&[LocationRecord::new(1.0, 2.0, Some(0))]).unwrap()).unwrap();

        let source = RecordHistorySource::from_json_file(&path).unwrap();
        assert_eq!(source.records().len(), 1);
    }
}
