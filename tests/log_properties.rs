//! the append / window contract of the sensor log, through the public api

use sensor_hub::config::{parse_offset, HostConfig};
use sensor_hub::display::format_value;
use sensor_hub::domain::{Reading, ReadingPayload};
use sensor_hub::ingest::IngestGateway;
use sensor_hub::query::QueryService;
use sensor_hub::store::LogStore;

use std::time::Duration;
use tempfile::TempDir;

fn setup() -> (TempDir, LogStore, QueryService) {
    let dir = TempDir::new().unwrap();
    let store = LogStore::new(dir.path().join("props.db"), Duration::from_millis(500));
    let query = QueryService::new(store.clone(), 4, parse_offset("Z").unwrap());
    (dir, store, query)
}

fn reading(sensor: &str, value: f64, ts: &str) -> Reading {
    Reading {
        sensor_id: sensor.into(),
        kind: Some("temperature".into()),
        value,
        timestamp: ts.into(),
    }
}

#[test]
fn appended_reading_comes_back_in_the_window() {
    let (_dir, store, query) = setup();
    store.ensure_schema().unwrap();
    let r = reading("T010", 21.25, "2025-01-18T14:00:00Z");
    store.append(&ReadingPayload::from(r.clone())).unwrap();

    let w = query.window(1);
    assert!(w.rows.iter().any(|row| row.stored.reading == r));
    assert_eq!(w.latest_by_sensor["T010"].stored.reading, r);
}

#[test]
fn schema_calls_interleaved_with_appends_keep_every_row() {
    let (_dir, store, query) = setup();
    for i in 0..10 {
        store.ensure_schema().unwrap();
        let ts = format!("2025-01-18T14:00:{:02}Z", i);
        store.append(&ReadingPayload::from(reading("T010", i as f64, &ts))).unwrap();
    }
    store.ensure_schema().unwrap();

    assert_eq!(store.count().unwrap(), 10);
    let mut ids: Vec<i64> = query.window(100).rows.iter().map(|r| r.stored.id).collect();
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), 10);
}

#[test]
fn never_written_store_reads_empty() {
    let (_dir, _store, query) = setup();
    let w = query.window(50);
    assert!(w.rows.is_empty());
    assert!(w.latest_by_sensor.is_empty());
}

#[tokio::test]
async fn rejected_payloads_leave_the_log_untouched() {
    let (_dir, store, _query) = setup();
    store.ensure_schema().unwrap();
    let gateway = IngestGateway::new(store.clone(), false);

    assert!(gateway.receive(None).await.is_err());
    assert!(gateway.receive(Some(ReadingPayload::default())).await.is_err());
    assert_eq!(store.count().unwrap(), 0);
}

#[test]
fn catalogue_formatting() {
    let config = HostConfig::default();
    assert_eq!(format_value(1.0, config.sensor("M040")), "Detectado");
    assert_eq!(format_value(0.0, config.sensor("M040")), "Ausente");
    assert_eq!(format_value(23.456, config.sensor("T010")), "23.5");
}
