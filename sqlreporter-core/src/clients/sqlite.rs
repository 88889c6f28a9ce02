//! SQLite client.
//!
//! SQLite is dynamically typed, so cells are decoded by trying types in a
//! fixed order of likelihood rather than by the declared column type.
//! Stored procedures do not exist in SQLite; procedure reports fail with an
//! unsupported-operation error. `query_timeout` has no server-side
//! equivalent here and is not enforced.

use async_trait::async_trait;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{Column as _, Executor as _, Row as _, TypeInfo as _};
use tracing::debug;

use super::{DatabaseClient, DatabaseKind};
use crate::connection::ConnectionSettings;
use crate::error::{ReportError, Result};
use crate::models::{
    CellValue, ColumnDescriptor, ReportDefinition, ReportSource, ResultRow, SqlValue,
};

/// Pooled SQLite client.
pub struct SqliteClient {
    pool: SqlitePool,
}

impl SqliteClient {
    /// Opens a pooled connection to a SQLite database.
    ///
    /// Accepts `sqlite:` URLs (`sqlite::memory:`, `sqlite://path/to.db`)
    /// as well as bare file paths.
    ///
    /// # Errors
    /// Returns a database error if the file cannot be opened.
    pub async fn connect(url: &str, settings: &ConnectionSettings) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(settings.max_connections.min(100))
            .acquire_timeout(settings.connect_timeout)
            .connect(url)
            .await
            .map_err(|e| ReportError::database("Failed to open SQLite database", e))?;

        Ok(Self { pool })
    }
}

#[async_trait]
impl DatabaseClient for SqliteClient {
    async fn ping(&self) -> Result<()> {
        sqlx::query_scalar::<_, i32>("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .map(|_| ())
            .map_err(|e| ReportError::database("SQLite ping failed", e))
    }

    async fn describe(&self, report: &ReportDefinition) -> Result<Vec<ColumnDescriptor>> {
        let sql = command_text(report)?;

        let statement = self.pool.describe(&sql).await.map_err(|e| {
            ReportError::database(
                format!("Failed to probe schema for {}", report.description()),
                e,
            )
        })?;

        Ok(statement
            .columns()
            .iter()
            .enumerate()
            .map(|(index, column)| ColumnDescriptor {
                index,
                name: column.name().to_string(),
                type_name: column.type_info().name().to_string(),
            })
            .collect())
    }

    async fn fetch_rows(&self, report: &ReportDefinition) -> Result<Vec<ResultRow>> {
        let sql = command_text(report)?;

        let mut query = sqlx::query(&sql);
        for parameter in &report.parameters {
            query = bind_value(query, &parameter.value);
        }

        let rows = query.fetch_all(&self.pool).await.map_err(|e| {
            ReportError::database(format!("Failed to execute {}", report.description()), e)
        })?;

        Ok(rows
            .iter()
            .enumerate()
            .map(|(index, row)| decode_row(row, index))
            .collect())
    }

    fn kind(&self) -> DatabaseKind {
        DatabaseKind::Sqlite
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}

/// Builds the SQL text for a report's command.
fn command_text(report: &ReportDefinition) -> Result<String> {
    match &report.source {
        ReportSource::Query(sql) => Ok(sql.clone()),
        ReportSource::Procedure(_) => {
            Err(ReportError::unsupported("stored procedures", "SQLite"))
        }
    }
}

type SqliteQuery<'q> = sqlx::query::Query<'q, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'q>>;

fn bind_value<'q>(query: SqliteQuery<'q>, value: &SqlValue) -> SqliteQuery<'q> {
    match value {
        SqlValue::Null => query.bind(None::<String>),
        SqlValue::Bool(v) => query.bind(*v),
        SqlValue::Int(v) => query.bind(*v),
        SqlValue::Float(v) => query.bind(*v),
        SqlValue::Decimal(v) | SqlValue::Text(v) => query.bind(v.clone()),
        SqlValue::Bytes(v) => query.bind(v.clone()),
        SqlValue::Date(v) => query.bind(*v),
        SqlValue::Time(v) => query.bind(*v),
        SqlValue::DateTime(v) => query.bind(*v),
        SqlValue::DateTimeUtc(v) => query.bind(*v),
        // SQLite has no native UUID or JSON storage classes
        SqlValue::Uuid(v) => query.bind(v.to_string()),
        SqlValue::Json(v) => query.bind(v.to_string()),
    }
}

fn decode_row(row: &SqliteRow, index: usize) -> ResultRow {
    let values = (0..row.len())
        .map(|column| CellValue {
            row: index,
            column,
            value: decode_value(row, column),
        })
        .collect();

    ResultRow { index, values }
}

/// Decodes a cell by trying types in order of likelihood.
fn decode_value(row: &SqliteRow, index: usize) -> SqlValue {
    if let Ok(v) = row.try_get::<Option<String>, _>(index) {
        return v.map_or(SqlValue::Null, SqlValue::Text);
    }
    if let Ok(v) = row.try_get::<Option<i64>, _>(index) {
        return v.map_or(SqlValue::Null, SqlValue::Int);
    }
    if let Ok(v) = row.try_get::<Option<f64>, _>(index) {
        return v.map_or(SqlValue::Null, SqlValue::Float);
    }
    if let Ok(v) = row.try_get::<Option<bool>, _>(index) {
        return v.map_or(SqlValue::Null, SqlValue::Bool);
    }
    if let Ok(v) = row.try_get::<Option<Vec<u8>>, _>(index) {
        return v.map_or(SqlValue::Null, SqlValue::Bytes);
    }

    debug!(column = index, "Undecodable SQLite value, capturing NULL");
    SqlValue::Null
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_text_passes_query_through() {
        let report = ReportDefinition::query("SELECT id FROM people");
        assert_eq!(
            command_text(&report).ok().as_deref(),
            Some("SELECT id FROM people")
        );
    }

    #[test]
    fn test_command_text_rejects_procedures() {
        let report = ReportDefinition::procedure("monthly_totals");
        assert!(matches!(
            command_text(&report),
            Err(ReportError::Unsupported { .. })
        ));
    }
}
