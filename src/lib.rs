//! ==============================================================================
//! sensor-hub - ingestion and query over an append-only sensor log
//! ==============================================================================
//!
//! data flow:
//!
//! ```text
//!     producer (http push / generator)
//!            │
//!            ▼
//!     ingest::IngestGateway ──append──> store::LogStore (sqlite, sensor_data)
//!                                              ▲
//!                                              │ recent(limit * K)
//!     dashboard / json api <──window── query::QueryService
//! ```
//!
//! ==============================================================================

pub mod config;
pub mod dashboard;
pub mod display;
pub mod domain;
pub mod error;
pub mod generator;
pub mod ingest;
pub mod query;
pub mod server;
pub mod shutdown;
pub mod store;
