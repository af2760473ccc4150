//! ==============================================================================
//! ingest.rs - ingestion gateway
//! ==============================================================================
//!
//! purpose:
//!     the single entry point for new readings, whatever produced them
//!     (http push or the in-process generator).
//!
//! flow:
//!
//! ```text
//!     body bytes ──> parse_body ──> Option<ReadingPayload>
//!                                        │
//!                                   receive()
//!                                        │ empty?      -> EmptyPayload (400)
//!                                        │ strict and
//!                                        │ incomplete? -> MissingField (400)
//!                                        ▼
//!                                  LogStore::append  (spawn_blocking)
//!                                        │ error?      -> StoreFailure (500)
//!                                        ▼
//!                                   Ack "Data saved" (201)
//! ```
//!
//! strict vs lax:
//!     strict (default) checks sensorId/value/timestamp here.
//!     lax hands incomplete payloads to the store and lets the table's
//!     NOT NULL constraints reject them. `type` is optional either way.
//!
//! ==============================================================================

use crate::domain::{Reading, ReadingPayload};
use crate::error::{IngestError, StoreError};
use crate::store::{LogStore, RowId};

use serde::Serialize;

/// acknowledgement returned for a stored reading
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Ack {
    pub status: &'static str,
    pub message: &'static str,
    pub id: RowId,
}

impl Ack {
    fn saved(id: RowId) -> Self {
        Self { status: "success", message: "Data saved", id }
    }
}

#[derive(Clone, Debug)]
pub struct IngestGateway {
    store: LogStore,
    strict: bool,
}

impl IngestGateway {
    pub fn new(store: LogStore, strict: bool) -> Self {
        Self { store, strict }
    }

    pub fn store(&self) -> &LogStore {
        &self.store
    }

    /// validate and append one reading
    pub async fn receive(&self, payload: Option<ReadingPayload>) -> Result<Ack, IngestError> {
        let payload = match payload {
            Some(p) if !p.is_empty() => p,
            _ => return Err(IngestError::EmptyPayload),
        };
        let payload = if self.strict { validate(payload)?.into() } else { payload };

        let store = self.store.clone();
        let row = payload.clone();
        let id = tokio::task::spawn_blocking(move || store.append(&row))
            .await
            .map_err(|e| StoreError::Sqlite(format!("task join error: {}", e)))??;

        tracing::info!(
            sensor_id = payload.sensor_id.as_deref().unwrap_or("-"),
            kind = payload.kind.as_deref().unwrap_or("-"),
            value = payload.value,
            id,
            "reading received"
        );
        Ok(Ack::saved(id))
    }
}

/// turn a payload into a complete reading or name the first missing field
pub fn validate(payload: ReadingPayload) -> Result<Reading, IngestError> {
    let sensor_id = payload
        .sensor_id
        .filter(|s| !s.trim().is_empty())
        .ok_or(IngestError::MissingField("sensorId"))?;
    let value = payload.value.ok_or(IngestError::MissingField("value"))?;
    let timestamp = payload
        .timestamp
        .filter(|s| !s.trim().is_empty())
        .ok_or(IngestError::MissingField("timestamp"))?;

    Ok(Reading { sensor_id, kind: payload.kind, value, timestamp })
}

/// decode an http body
///
/// an empty body or a json `null` is "no payload"; anything that is not a
/// json object with the expected field types is malformed.
pub fn parse_body(body: &[u8]) -> Result<Option<ReadingPayload>, IngestError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }
    let value: serde_json::Value =
        serde_json::from_slice(body).map_err(|e| IngestError::MalformedPayload(e.to_string()))?;
    match value {
        serde_json::Value::Null => Ok(None),
        serde_json::Value::Object(_) => serde_json::from_value(value)
            .map(Some)
            .map_err(|e| IngestError::MalformedPayload(e.to_string())),
        other => Err(IngestError::MalformedPayload(format!(
            "expected a json object, got {}",
            other
        ))),
    }
}
