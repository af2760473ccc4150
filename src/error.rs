//! error types for the write and read paths

/// failures raised by the sqlite log
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// database unreachable, busy or locked; the caller may retry with a fresh connection
    #[error("storage unavailable: {0}")]
    ConnectionFailed(String),

    /// a NOT NULL column was given no value
    #[error("constraint violation: {0}")]
    ConstraintViolation(String),

    /// the sensor_data table has not been created yet
    #[error("sensor_data table does not exist")]
    SchemaMissing,

    #[error("sqlite error: {0}")]
    Sqlite(String),
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        use rusqlite::ErrorCode;

        match e.sqlite_error_code() {
            Some(ErrorCode::ConstraintViolation) => StoreError::ConstraintViolation(e.to_string()),
            Some(
                ErrorCode::DatabaseBusy
                | ErrorCode::DatabaseLocked
                | ErrorCode::CannotOpen
                | ErrorCode::PermissionDenied
                | ErrorCode::ReadOnly,
            ) => StoreError::ConnectionFailed(e.to_string()),
            _ if is_missing_table(&e) => StoreError::SchemaMissing,
            _ => StoreError::Sqlite(e.to_string()),
        }
    }
}

/// sqlite reports a missing table as a generic SQLITE_ERROR; only the
/// message tells it apart, so the check is limited to that one failure shape
fn is_missing_table(e: &rusqlite::Error) -> bool {
    match e {
        rusqlite::Error::SqliteFailure(err, Some(msg)) => {
            err.code == rusqlite::ErrorCode::Unknown && msg.starts_with("no such table")
        }
        _ => false,
    }
}

/// failures raised by the ingestion gateway
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("No data provided")]
    EmptyPayload,

    /// body was present but was not a json reading
    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    #[error("missing required field '{0}'")]
    MissingField(&'static str),

    #[error(transparent)]
    StoreFailure(#[from] StoreError),
}

impl IngestError {
    /// the http status this error is reported with
    pub fn status_code(&self) -> u16 {
        match self {
            IngestError::EmptyPayload
            | IngestError::MalformedPayload(_)
            | IngestError::MissingField(_) => 400,
            IngestError::StoreFailure(_) => 500,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes() {
        assert_eq!(IngestError::EmptyPayload.status_code(), 400);
        assert_eq!(IngestError::MissingField("sensorId").status_code(), 400);
        assert_eq!(
            IngestError::StoreFailure(StoreError::ConstraintViolation("x".into())).status_code(),
            500
        );
    }

    #[test]
    fn missing_table_maps_to_schema_missing() {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        let err = conn
            .prepare("SELECT id FROM sensor_data")
            .map(|_| ())
            .unwrap_err();
        assert!(matches!(StoreError::from(err), StoreError::SchemaMissing));
    }

    #[test]
    fn other_errors_mentioning_the_text_are_not_schema_missing() {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        let err = conn.prepare("SELEC 'no such table'").map(|_| ()).unwrap_err();
        assert!(matches!(StoreError::from(err), StoreError::Sqlite(_)));

        let err = rusqlite::Error::InvalidColumnName("no such table".into());
        assert!(matches!(StoreError::from(err), StoreError::Sqlite(_)));
    }
}
