//! Core types and query execution for SQL Reporter.
//!
//! This crate holds the report-execution half of the pipeline: immutable
//! [`ReportDefinition`]s, the shared [`ReportConnection`], feature-gated
//! database clients, and the [`ReportRunner`] that materializes a
//! [`ReportResultSet`] — column metadata plus fully buffered, typed rows.
//! Rendering and delivery live in the companion `sqlreporter-export`
//! crate.
//!
//! # Architecture
//! - Explicitly-owned connection and notifier objects threaded through
//!   calls; no ambient static state
//! - Object-safe client trait with a factory dispatching on URL scheme
//! - Async-first operations with blocking twins of identical semantics
//!
//! Data flows one way: definition → runner → result set → exporters or
//! notifier. Each run is a single pass with no retries; failures are
//! logged with context and re-raised to the caller.

pub mod clients;
pub mod connection;
pub mod error;
pub mod executor;
pub mod logging;
pub mod models;
pub mod runtime;

// Re-export commonly used types
pub use clients::{DatabaseClient, DatabaseKind, create_client, detect_database_kind};
pub use connection::{ConnectionSettings, ReportConnection};
pub use error::{ReportError, Result, redact_database_url};
pub use executor::{NotifierStatus, ReportRunner};
pub use models::{
    CellValue, ColumnDescriptor, ReportDefinition, ReportFormat, ReportParameter,
    ReportResultSet, ReportSource, ResultRow, SqlValue, SqlValueKind, format_parameters,
};
