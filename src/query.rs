//! ==============================================================================
//! query.rs - bounded-window reads over the sensor log
//! ==============================================================================
//!
//! purpose:
//!     answers "what are the recent rows, and what is the latest value of
//!     each sensor?" for the dashboard and the json api.
//!
//! over-fetch:
//!     the dashboard wants ~`limit` rows per sensor but the log is one table
//!     ordered by time, so we pull `limit * K` rows with K at least the number
//!     of tracked sensors. sensors writing at uneven rates still tend to show
//!     up. a sensor silent for longer than the window simply is not there.
//!
//! failure policy:
//!     reads never fail. a missing table (nobody has written yet) is an empty
//!     window; any other storage error is an empty window plus a warning.
//!
//! tie-break:
//!     two rows of one sensor with the same timestamp: which one becomes
//!     "latest" is undefined. do not rely on it.
//!
//! ==============================================================================

use crate::display;
use crate::domain::StoredReading;
use crate::error::StoreError;
use crate::store::LogStore;

use chrono::FixedOffset;
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// a row as the presentation layer sees it
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WindowRow {
    #[serde(flatten)]
    pub stored: StoredReading,
    /// timestamp in the display offset, or "invalid timestamp"
    pub local_time: String,
}

impl WindowRow {
    pub fn sensor_id(&self) -> &str {
        &self.stored.reading.sensor_id
    }

    pub fn value(&self) -> f64 {
        self.stored.reading.value
    }

    pub fn timestamp(&self) -> &str {
        &self.stored.reading.timestamp
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Window {
    /// newest first
    pub rows: Vec<WindowRow>,
    pub latest_by_sensor: BTreeMap<String, WindowRow>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

#[derive(Clone, Debug)]
pub struct QueryService {
    store: LogStore,
    over_fetch: usize,
    offset: FixedOffset,
}

impl QueryService {
    /// `over_fetch` is the K multiplier; it is raised to at least 1
    pub fn new(store: LogStore, over_fetch: usize, offset: FixedOffset) -> Self {
        Self { store, over_fetch: over_fetch.max(1), offset }
    }

    pub fn over_fetch(&self) -> usize {
        self.over_fetch
    }

    /// blocking read of the most recent `limit * K` rows
    pub fn window(&self, limit: usize) -> Window {
        let fetch = limit.saturating_mul(self.over_fetch);
        match self.store.recent(fetch) {
            Ok(rows) => self.build(rows),
            Err(StoreError::SchemaMissing) => {
                tracing::warn!(
                    path = %self.store.path().display(),
                    "sensor_data table not found; start the ingestion server or generator first"
                );
                Window {
                    warning: Some("sensor_data table not found; no readings yet".to_string()),
                    ..Window::default()
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to read sensor log");
                Window { warning: Some(e.to_string()), ..Window::default() }
            }
        }
    }

    /// `window` on the blocking pool, for async callers
    pub async fn window_async(&self, limit: usize) -> Window {
        let svc = self.clone();
        match tokio::task::spawn_blocking(move || svc.window(limit)).await {
            Ok(w) => w,
            Err(e) => {
                tracing::warn!(error = %e, "window query task failed");
                Window { warning: Some(format!("task join error: {}", e)), ..Window::default() }
            }
        }
    }

    fn build(&self, rows: Vec<StoredReading>) -> Window {
        let rows: Vec<WindowRow> = rows
            .into_iter()
            .map(|stored| {
                let local_time = display::to_local(&stored.reading.timestamp, &self.offset);
                WindowRow { stored, local_time }
            })
            .collect();

        let latest_by_sensor = latest_per_sensor(&rows);
        Window { rows, latest_by_sensor, warning: None }
    }
}

/// keep the max-timestamp row of each sensor
pub fn latest_per_sensor(rows: &[WindowRow]) -> BTreeMap<String, WindowRow> {
    let mut latest: BTreeMap<String, WindowRow> = BTreeMap::new();
    for row in rows {
        let newer = latest.get(row.sensor_id()).map_or(true, |current| {
            compare_timestamps(row.timestamp(), current.timestamp()) == Ordering::Greater
        });
        if newer {
            latest.insert(row.sensor_id().to_string(), row.clone());
        }
    }
    latest
}

/// parsed instants compare chronologically; a parseable timestamp beats an
/// unparseable one; two unparseable ones compare as text
fn compare_timestamps(a: &str, b: &str) -> Ordering {
    match (display::parse_timestamp(a), display::parse_timestamp(b)) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => Ordering::Greater,
        (None, Some(_)) => Ordering::Less,
        (None, None) => a.cmp(b),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse_offset;
    use crate::domain::{Reading, ReadingPayload};
    use std::time::Duration;
    use tempfile::TempDir;

    fn setup(schema: bool) -> (TempDir, LogStore, QueryService) {
        let dir = TempDir::new().unwrap();
        let store = LogStore::new(dir.path().join("query.db"), Duration::from_millis(500));
        if schema {
            store.ensure_schema().unwrap();
        }
        let svc = QueryService::new(store.clone(), 4, parse_offset("Z").unwrap());
        (dir, store, svc)
    }

    fn put(store: &LogStore, id: &str, value: f64, ts: &str) {
        let r: ReadingPayload = Reading {
            sensor_id: id.into(),
            kind: None,
            value,
            timestamp: ts.into(),
        }
        .into();
        store.append(&r).unwrap();
    }

    #[test]
    fn missing_file_gives_empty_window() {
        let (_dir, _store, svc) = setup(false);
        let w = svc.window(20);
        assert!(w.rows.is_empty());
        assert!(w.latest_by_sensor.is_empty());
        assert!(w.warning.is_some());
    }

    #[test]
    fn empty_table_gives_empty_window_without_warning() {
        let (_dir, _store, svc) = setup(true);
        let w = svc.window(20);
        assert!(w.rows.is_empty());
        assert!(w.latest_by_sensor.is_empty());
        assert_eq!(w.warning, None);
    }

    #[test]
    fn latest_is_max_timestamp_regardless_of_insert_order() {
        let (_dir, store, svc) = setup(true);
        put(&store, "T010", 3.0, "2025-01-18T14:00:03Z");
        put(&store, "T010", 1.0, "2025-01-18T14:00:01Z");
        put(&store, "T010", 2.0, "2025-01-18T14:00:02Z");

        let w = svc.window(10);
        assert_eq!(w.rows.len(), 3);
        assert_eq!(w.latest_by_sensor["T010"].value(), 3.0);
    }

    #[test]
    fn latest_compares_instants_not_text() {
        // same instant ordering differs from text ordering across offsets
        let rows: Vec<WindowRow> = [
            (1, 1.0, "2025-01-18T12:00:00-03:00"), // 15:00Z
            (2, 2.0, "2025-01-18T14:00:00Z"),
        ]
        .into_iter()
        .map(|(id, value, ts)| WindowRow {
            stored: StoredReading {
                id,
                reading: Reading { sensor_id: "T010".into(), kind: None, value, timestamp: ts.into() },
            },
            local_time: String::new(),
        })
        .collect();

        assert_eq!(latest_per_sensor(&rows)["T010"].value(), 1.0);
    }

    #[test]
    fn malformed_timestamp_does_not_break_the_window() {
        let (_dir, store, svc) = setup(true);
        put(&store, "H020", 50.0, "not a time");
        put(&store, "H020", 60.0, "2025-01-18T14:00:00Z");

        let w = svc.window(10);
        assert_eq!(w.rows.len(), 2);
        assert!(w.rows.iter().any(|r| r.local_time == display::INVALID_TIMESTAMP));
        assert_eq!(w.latest_by_sensor["H020"].value(), 60.0);
    }

    #[test]
    fn text_value_row_leaves_a_partial_window() {
        let (_dir, store, svc) = setup(true);
        for i in 0..5 {
            put(&store, "T010", 20.0 + i as f64, &format!("2025-01-18T14:00:{:02}Z", i));
        }
        rusqlite::Connection::open(store.path())
            .unwrap()
            .execute(
                "INSERT INTO sensor_data (sensorId, type, value, timestamp)
                 VALUES ('T010', 'temperature', 'n/a', '2025-01-18T14:00:09Z')",
                [],
            )
            .unwrap();

        let w = svc.window(20);
        assert_eq!(w.rows.len(), 5);
        assert_eq!(w.latest_by_sensor["T010"].value(), 24.0);
        assert_eq!(w.warning, None);
    }

    #[test]
    fn over_fetch_keeps_every_sensor() {
        let (_dir, store, svc) = setup(true);
        let ids = ["M040", "T010", "H020", "L030"];
        for cycle in 0..30 {
            for (n, id) in ids.iter().enumerate() {
                let ts = format!("2025-01-18T14:{:02}:{:02}Z", cycle, n * 10);
                put(&store, id, cycle as f64, &ts);
            }
        }

        let w = svc.window(20);
        assert_eq!(w.rows.len(), 80);
        assert_eq!(w.latest_by_sensor.len(), 4);
        for id in ids {
            assert_eq!(w.latest_by_sensor[id].value(), 29.0);
        }
    }

    #[test]
    fn chatty_sensor_does_not_crowd_out_the_rest() {
        let (_dir, store, svc) = setup(true);
        // T010 writes three times per cycle, the others once
        for cycle in 0..40 {
            for k in 0..3 {
                let ts = format!("2025-01-18T14:{:02}:{:02}Z", cycle, k);
                put(&store, "T010", k as f64, &ts);
            }
            for (n, id) in ["M040", "H020", "L030"].iter().enumerate() {
                let ts = format!("2025-01-18T14:{:02}:{:02}Z", cycle, 10 + n);
                put(&store, id, cycle as f64, &ts);
            }
        }

        let w = svc.window(20);
        assert_eq!(w.latest_by_sensor.len(), 4);
    }

    #[test]
    fn window_is_serialized_for_the_dashboard() {
        let (_dir, store, svc) = setup(true);
        put(&store, "L030", 420.0, "2025-01-18T14:00:00Z");
        let v = serde_json::to_value(svc.window(5)).unwrap();

        assert_eq!(v["rows"][0]["sensorId"], "L030");
        assert_eq!(v["rows"][0]["localTime"], "2025-01-18T14:00:00+00:00");
        assert_eq!(v["latestBySensor"]["L030"]["value"], 420.0);
        assert!(v.get("warning").is_none());
    }
}
