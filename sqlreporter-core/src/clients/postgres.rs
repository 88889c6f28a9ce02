//! PostgreSQL client.
//!
//! Cells are decoded by the declared type name from the schema probe.
//! Stored-procedure reports are issued as `SELECT * FROM "name"(...)`,
//! PostgreSQL's shape for set-returning routines. The configured query
//! timeout is applied as `statement_timeout` on every new connection.

use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::{Column as _, Executor as _, Row as _, TypeInfo as _};
use tracing::debug;

use super::{DatabaseClient, DatabaseKind};
use crate::connection::ConnectionSettings;
use crate::error::{ReportError, Result};
use crate::models::{
    CellValue, ColumnDescriptor, ReportDefinition, ReportSource, ResultRow, SqlValue,
};

/// Pooled PostgreSQL client.
pub struct PostgresClient {
    pool: PgPool,
}

impl PostgresClient {
    /// Opens a connection pool from a `postgres://` URL.
    ///
    /// # Errors
    /// Returns a database error if the pool cannot be established.
    pub async fn connect(url: &str, settings: &ConnectionSettings) -> Result<Self> {
        let query_timeout_ms = settings.query_timeout.as_millis();

        let pool = PgPoolOptions::new()
            .max_connections(settings.max_connections.min(100))
            .acquire_timeout(settings.connect_timeout)
            .after_connect(move |conn, _meta| {
                Box::pin(async move {
                    conn.execute(
                        format!("SET statement_timeout = '{}ms'", query_timeout_ms).as_str(),
                    )
                    .await?;
                    Ok(())
                })
            })
            .connect(url)
            .await
            .map_err(|e| ReportError::database("Failed to open PostgreSQL connection", e))?;

        Ok(Self { pool })
    }
}

#[async_trait]
impl DatabaseClient for PostgresClient {
    async fn ping(&self) -> Result<()> {
        sqlx::query_scalar::<_, i32>("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .map(|_| ())
            .map_err(|e| ReportError::database("PostgreSQL ping failed", e))
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
        DatabaseKind::PostgreSql
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
            let ident = name.replace('"', "\"\"");
            let placeholders = (1..=report.parameters.len())
                .map(|i| format!("${}", i))
                .collect::<Vec<_>>()
                .join(", ");
            format!("SELECT * FROM \"{}\"({})", ident, placeholders)
        }
    }
}

type PgQuery<'q> = sqlx::query::Query<'q, sqlx::Postgres, sqlx::postgres::PgArguments>;

fn bind_value<'q>(query: PgQuery<'q>, value: &SqlValue) -> PgQuery<'q> {
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
        SqlValue::Uuid(v) => query.bind(*v),
        SqlValue::Json(v) => query.bind(v.to_string()),
    }
}

fn decode_row(row: &PgRow, index: usize) -> ResultRow {
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
fn decode_value(row: &PgRow, index: usize, type_name: &str) -> SqlValue {
    let decoded = match type_name {
        "BOOL" => row
            .try_get::<Option<bool>, _>(index)
            .map(|v| v.map(SqlValue::Bool)),
        "INT2" => row
            .try_get::<Option<i16>, _>(index)
            .map(|v| v.map(|n| SqlValue::Int(n.into()))),
        "INT4" => row
            .try_get::<Option<i32>, _>(index)
            .map(|v| v.map(|n| SqlValue::Int(n.into()))),
        "INT8" => row
            .try_get::<Option<i64>, _>(index)
            .map(|v| v.map(SqlValue::Int)),
        "FLOAT4" => row
            .try_get::<Option<f32>, _>(index)
            .map(|v| v.map(|n| SqlValue::Float(n.into()))),
        "FLOAT8" => row
            .try_get::<Option<f64>, _>(index)
            .map(|v| v.map(SqlValue::Float)),
        "NUMERIC" => row
            .try_get::<Option<sqlx::types::BigDecimal>, _>(index)
            .map(|v| v.map(|n| SqlValue::Decimal(n.to_string()))),
        "BYTEA" => row
            .try_get::<Option<Vec<u8>>, _>(index)
            .map(|v| v.map(SqlValue::Bytes)),
        "DATE" => row
            .try_get::<Option<chrono::NaiveDate>, _>(index)
            .map(|v| v.map(SqlValue::Date)),
        "TIME" => row
            .try_get::<Option<chrono::NaiveTime>, _>(index)
            .map(|v| v.map(SqlValue::Time)),
        "TIMESTAMP" => row
            .try_get::<Option<chrono::NaiveDateTime>, _>(index)
            .map(|v| v.map(SqlValue::DateTime)),
        "TIMESTAMPTZ" => row
            .try_get::<Option<chrono::DateTime<chrono::Utc>>, _>(index)
            .map(|v| v.map(SqlValue::DateTimeUtc)),
        "UUID" => row
            .try_get::<Option<uuid::Uuid>, _>(index)
            .map(|v| v.map(SqlValue::Uuid)),
        "JSON" | "JSONB" => row
            .try_get::<Option<serde_json::Value>, _>(index)
            .map(|v| v.map(SqlValue::Json)),
        // Text-ish names (VARCHAR, TEXT, BPCHAR, NAME, ...) and anything
        // else that decodes as text
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
                "Undecodable PostgreSQL value, capturing NULL"
            );
            SqlValue::Null
        }
    }
}
