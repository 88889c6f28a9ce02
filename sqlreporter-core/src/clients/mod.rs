//! Database client trait and factory for unified query execution.
//!
//! Each supported engine gets a thin, feature-gated client module that
//! knows how to build the report's command, probe its column schema, bind
//! parameters, and decode cells into [`SqlValue`]s. The trait is
//! object-safe so [`crate::ReportConnection`] can hold any driver behind
//! `Box<dyn DatabaseClient>`.

use async_trait::async_trait;

use crate::connection::ConnectionSettings;
use crate::error::{ReportError, Result};
use crate::models::{ColumnDescriptor, ReportDefinition, ResultRow};

#[cfg(feature = "mysql")]
pub mod mysql;
#[cfg(feature = "postgresql")]
pub mod postgres;
#[cfg(feature = "sqlite")]
pub mod sqlite;

/// Supported database engines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DatabaseKind {
    /// PostgreSQL
    PostgreSql,
    /// MySQL / MariaDB
    MySql,
    /// SQLite
    Sqlite,
}

impl std::fmt::Display for DatabaseKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DatabaseKind::PostgreSql => write!(f, "PostgreSQL"),
            DatabaseKind::MySql => write!(f, "MySQL"),
            DatabaseKind::Sqlite => write!(f, "SQLite"),
        }
    }
}

/// Object-safe driver interface the report runner executes against.
///
/// The two execution methods are deliberately separate: `describe` is a
/// metadata-only round-trip that must complete before any row storage is
/// allocated, and `fetch_rows` materializes the full result in cursor
/// order.
#[async_trait]
pub trait DatabaseClient: Send + Sync {
    /// Cheap liveness check against the open pool.
    async fn ping(&self) -> Result<()>;

    /// Probes the report's command for column names and declared types
    /// without materializing rows.
    async fn describe(&self, report: &ReportDefinition) -> Result<Vec<ColumnDescriptor>>;

    /// Executes the report's command and buffers every row, decoding each
    /// cell in column-ordinal order.
    async fn fetch_rows(&self, report: &ReportDefinition) -> Result<Vec<ResultRow>>;

    /// Which engine this client talks to.
    fn kind(&self) -> DatabaseKind;

    /// Closes the underlying pool gracefully.
    async fn close(&self);
}

/// Determines the database kind from a connection URL scheme.
pub fn detect_database_kind(url: &str) -> Result<DatabaseKind> {
    let lowered = url.trim().to_lowercase();

    if lowered.starts_with("postgres://") || lowered.starts_with("postgresql://") {
        Ok(DatabaseKind::PostgreSql)
    } else if lowered.starts_with("mysql://") || lowered.starts_with("mariadb://") {
        Ok(DatabaseKind::MySql)
    } else if lowered.starts_with("sqlite:")
        || lowered == ":memory:"
        || lowered.ends_with(".db")
        || lowered.ends_with(".sqlite")
        || lowered.ends_with(".sqlite3")
    {
        Ok(DatabaseKind::Sqlite)
    } else {
        Err(ReportError::configuration(format!(
            "Unrecognized database URL scheme (expected postgres://, mysql://, or sqlite:): {}",
            crate::error::redact_database_url(url)
        )))
    }
}

/// Opens a client for the engine named by the URL scheme.
///
/// # Errors
/// Returns a configuration error for unknown schemes or schemes whose
/// driver feature is not compiled in, and a database error if the open
/// itself fails.
pub async fn create_client(
    url: &str,
    settings: &ConnectionSettings,
) -> Result<Box<dyn DatabaseClient>> {
    settings.validate()?;

    match detect_database_kind(url)? {
        DatabaseKind::PostgreSql => {
            #[cfg(feature = "postgresql")]
            {
                Ok(Box::new(postgres::PostgresClient::connect(url, settings).await?))
            }
            #[cfg(not(feature = "postgresql"))]
            {
                Err(ReportError::configuration(
                    "PostgreSQL support not compiled in. Enable the 'postgresql' feature",
                ))
            }
        }
        DatabaseKind::MySql => {
            #[cfg(feature = "mysql")]
            {
                Ok(Box::new(mysql::MySqlClient::connect(url, settings).await?))
            }
            #[cfg(not(feature = "mysql"))]
            {
                Err(ReportError::configuration(
                    "MySQL support not compiled in. Enable the 'mysql' feature",
                ))
            }
        }
        DatabaseKind::Sqlite => {
            #[cfg(feature = "sqlite")]
            {
                Ok(Box::new(sqlite::SqliteClient::connect(url, settings).await?))
            }
            #[cfg(not(feature = "sqlite"))]
            {
                Err(ReportError::configuration(
                    "SQLite support not compiled in. Enable the 'sqlite' feature",
                ))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_database_kind() {
        assert_eq!(
            detect_database_kind("postgres://localhost/db").ok(),
            Some(DatabaseKind::PostgreSql)
        );
        assert_eq!(
            detect_database_kind("postgresql://localhost/db").ok(),
            Some(DatabaseKind::PostgreSql)
        );
        assert_eq!(
            detect_database_kind("mysql://localhost/db").ok(),
            Some(DatabaseKind::MySql)
        );
        assert_eq!(
            detect_database_kind("sqlite::memory:").ok(),
            Some(DatabaseKind::Sqlite)
        );
        assert_eq!(
            detect_database_kind("sqlite:///tmp/reports.db").ok(),
            Some(DatabaseKind::Sqlite)
        );
        assert_eq!(
            detect_database_kind("./reports.db").ok(),
            Some(DatabaseKind::Sqlite)
        );
    }

    #[test]
    fn test_detect_database_kind_unknown_scheme() {
        assert!(detect_database_kind("redis://localhost").is_err());
        assert!(detect_database_kind("").is_err());
    }

    #[tokio::test]
    async fn test_create_client_rejects_invalid_settings() {
        let settings = ConnectionSettings::default().with_max_connections(0);
        let result = create_client("sqlite::memory:", &settings).await;
        assert!(result.is_err());
    }
}
