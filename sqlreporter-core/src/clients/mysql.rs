//! MySQL / MariaDB client.
//!
//! Cells are decoded by the declared type name from the schema probe.
//! Stored-procedure reports are issued as ``CALL `name`(...)``. The
//! configured query timeout is applied as `max_execution_time` (which
//! MySQL enforces for SELECT statements) on every new connection.

use async_trait::async_trait;
use sqlx::mysql::{MySqlPool, MySqlPoolOptions, MySqlRow};
use sqlx::{Column as _, Executor as _, Row as _, TypeInfo as _};
use tracing::debug;

use super::{DatabaseClient, DatabaseKind};
use crate::connection::ConnectionSettings;
use crate::error::{ReportError, Result};
use crate::models::{
    CellValue, ColumnDescriptor, ReportDefinition, ReportSource, ResultRow, SqlValue,
};

/// Pooled MySQL client.
pub struct MySqlClient {
    pool: MySqlPool,
}

impl MySqlClient {
    /// Opens a connection pool from a `mysql://` URL.
    ///
    /// # Errors
    /// Returns a database error if the pool cannot be established.
    pub async fn connect(url: &str, settings: &ConnectionSettings) -> Result<Self> {
        let query_timeout_ms = settings.query_timeout.as_millis();

        let pool = MySqlPoolOptions::new()
            .max_connections(settings.max_connections.min(100))
            .acquire_timeout(settings.connect_timeout)
            .after_connect(move |conn, _meta| {
                Box::pin(async move {
                    conn.execute(
                        format!("SET SESSION max_execution_time = {}", query_timeout_ms).as_str(),
                    )
                    .await?;
                    Ok(())
                })
            })
            .connect(url)
            .await
            .map_err(|e| ReportError::database("Failed to open MySQL connection", e))?;

        Ok(Self { pool })
    }
}

#[async_trait]
impl DatabaseClient for MySqlClient {
    async fn ping(&self) -> Result<()> {
        sqlx::query_scalar::<_, i32>("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .map(|_| ())
            .map_err(|e| ReportError::database("MySQL ping failed", e))
    }

    async fn describe(&self, report: &ReportDefinition) -> Result<Vec<ColumnDescriptor>> {
        let sql = command_text(report);

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
        let sql = command_text(report);

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
        DatabaseKind::MySql
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}

/// Builds the SQL text for a report's command.
fn command_text(report: &ReportDefinition) -> String {
    match &report.source {
        ReportSource::Query(sql) => sql.clone(),
        ReportSource::Procedure(name) => {
            let ident = name.replace('`', "``");
            let placeholders = std::iter::repeat_n("?", report.parameters.len())
                .collect::<Vec<_>>()
                .join(", ");
            format!("CALL `{}`({})", ident, placeholders)
        }
    }
}

type MySqlQuery<'q> = sqlx::query::Query<'q, sqlx::MySql, sqlx::mysql::MySqlArguments>;

fn bind_value<'q>(query: MySqlQuery<'q>, value: &SqlValue) -> MySqlQuery<'q> {
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
        SqlValue::Uuid(v) => query.bind(v.to_string()),
        SqlValue::Json(v) => query.bind(v.to_string()),
    }
}

fn decode_row(row: &MySqlRow, index: usize) -> ResultRow {
    let values = row
        .columns()
        .iter()
        .enumerate()
        .map(|(column, meta)| CellValue {
            row: index,
            column,
            value: decode_value(row, column, meta.type_info().name()),
        })
        .collect();

    ResultRow { index, values }
}

/// Decodes a cell according to its declared type name.
fn decode_value(row: &MySqlRow, index: usize, type_name: &str) -> SqlValue {
    let decoded = match type_name {
        "BOOLEAN" => row
            .try_get::<Option<bool>, _>(index)
            .map(|v| v.map(SqlValue::Bool)),
        "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "BIGINT" => row
            .try_get::<Option<i64>, _>(index)
            .map(|v| v.map(SqlValue::Int)),
        "TINYINT UNSIGNED" | "SMALLINT UNSIGNED" | "MEDIUMINT UNSIGNED" | "INT UNSIGNED"
        | "BIGINT UNSIGNED" => row.try_get::<Option<u64>, _>(index).map(|v| {
            v.map(|n| match i64::try_from(n) {
                Ok(signed) => SqlValue::Int(signed),
                // Values above i64::MAX keep their exact text form
                Err(_) => SqlValue::Decimal(n.to_string()),
            })
        }),
        "FLOAT" => row
            .try_get::<Option<f32>, _>(index)
            .map(|v| v.map(|n| SqlValue::Float(n.into()))),
        "DOUBLE" => row
            .try_get::<Option<f64>, _>(index)
            .map(|v| v.map(SqlValue::Float)),
        "DECIMAL" => row
            .try_get::<Option<sqlx::types::BigDecimal>, _>(index)
            .map(|v| v.map(|n| SqlValue::Decimal(n.to_string()))),
        "DATE" => row
            .try_get::<Option<chrono::NaiveDate>, _>(index)
            .map(|v| v.map(SqlValue::Date)),
        "TIME" => row
            .try_get::<Option<chrono::NaiveTime>, _>(index)
            .map(|v| v.map(SqlValue::Time)),
        "DATETIME" => row
            .try_get::<Option<chrono::NaiveDateTime>, _>(index)
            .map(|v| v.map(SqlValue::DateTime)),
        "TIMESTAMP" => row
            .try_get::<Option<chrono::DateTime<chrono::Utc>>, _>(index)
            .map(|v| v.map(SqlValue::DateTimeUtc)),
        "BINARY" | "VARBINARY" | "TINYBLOB" | "BLOB" | "MEDIUMBLOB" | "LONGBLOB" => row
            .try_get::<Option<Vec<u8>>, _>(index)
            .map(|v| v.map(SqlValue::Bytes)),
        "JSON" => row
            .try_get::<Option<serde_json::Value>, _>(index)
            .map(|v| v.map(SqlValue::Json)),
        // CHAR, VARCHAR, TEXT variants, ENUM, SET, and anything else that
        // decodes as text
        _ => row
            .try_get::<Option<String>, _>(index)
            .map(|v| v.map(SqlValue::Text)),
    };

    match decoded {
        Ok(Some(value)) => value,
        Ok(None) => SqlValue::Null,
        Err(e) => {
            debug!(
                column = index,
                type_name,
                error = %e,
                "Undecodable MySQL value, capturing NULL"
            );
            SqlValue::Null
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_text_passes_query_through() {
        let report = ReportDefinition::query("SELECT 1");
        assert_eq!(command_text(&report), "SELECT 1");
    }

    #[test]
    fn test_command_text_builds_procedure_invocation() {
        let report = ReportDefinition::procedure("monthly_totals")
            .with_parameter("year", SqlValue::Int(2024));
        assert_eq!(command_text(&report), "CALL `monthly_totals`(?)");
    }

    #[test]
    fn test_command_text_escapes_backticks() {
        let report = ReportDefinition::procedure("weird`name");
        assert_eq!(command_text(&report), "CALL `weird``name`()");
    }
}
