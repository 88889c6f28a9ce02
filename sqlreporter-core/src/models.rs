//! Core data model for report definitions and result sets.
//!
//! A [`ReportDefinition`] describes what to run — a free-form query or a
//! stored procedure — plus output and delivery preferences. Running one
//! produces a [`ReportResultSet`]: column metadata followed by fully
//! buffered rows of typed [`SqlValue`]s. Definitions are constructed once
//! and treated as immutable; the result set is owned by the caller and
//! borrowed read-only by exporters and the notifier.

use base64::Engine as _;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{ReportError, Result};

/// Available report output formats.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReportFormat {
    /// Not set; running a delivery with this format is an error
    #[default]
    Unset,
    /// Plain HTML5 + CSS table
    Html,
    /// Excel workbook (`.xlsx`)
    Xlsx,
    /// Comma (or caller-delimited) separated values
    Csv,
    /// PDF rendering of the workbook
    Pdf,
}

impl ReportFormat {
    /// File extension for the format, without the leading dot.
    pub fn extension(self) -> Option<&'static str> {
        match self {
            ReportFormat::Unset => None,
            ReportFormat::Html => Some("html"),
            ReportFormat::Xlsx => Some("xlsx"),
            ReportFormat::Csv => Some("csv"),
            ReportFormat::Pdf => Some("pdf"),
        }
    }
}

impl std::fmt::Display for ReportFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReportFormat::Unset => write!(f, "Unset"),
            ReportFormat::Html => write!(f, "Html"),
            ReportFormat::Xlsx => write!(f, "Xlsx"),
            ReportFormat::Csv => write!(f, "Csv"),
            ReportFormat::Pdf => write!(f, "Pdf"),
        }
    }
}

/// Runtime type tag for a [`SqlValue`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SqlValueKind {
    /// SQL NULL
    Null,
    /// Boolean
    Boolean,
    /// Signed integer
    Integer,
    /// Floating point
    Float,
    /// Exact decimal, carried as text for precision
    Decimal,
    /// UTF-8 text
    Text,
    /// Raw bytes
    Binary,
    /// Calendar date
    Date,
    /// Time of day
    Time,
    /// Date and time, with or without timezone
    DateTime,
    /// UUID
    Uuid,
    /// JSON document
    Json,
}

impl std::fmt::Display for SqlValueKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SqlValueKind::Null => "Null",
            SqlValueKind::Boolean => "Boolean",
            SqlValueKind::Integer => "Integer",
            SqlValueKind::Float => "Float",
            SqlValueKind::Decimal => "Decimal",
            SqlValueKind::Text => "Text",
            SqlValueKind::Binary => "Binary",
            SqlValueKind::Date => "Date",
            SqlValueKind::Time => "Time",
            SqlValueKind::DateTime => "DateTime",
            SqlValueKind::Uuid => "Uuid",
            SqlValueKind::Json => "Json",
        };
        write!(f, "{}", name)
    }
}

/// A database value over the closed set of primitives the drivers produce.
///
/// The variant itself is the runtime type tag; [`SqlValue::kind`] exposes
/// it for exporters that need round-trip fidelity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SqlValue {
    /// SQL NULL
    Null,
    /// Boolean
    Bool(bool),
    /// Signed 64-bit integer (narrower driver types widen into this)
    Int(i64),
    /// 64-bit floating point
    Float(f64),
    /// Exact decimal, kept as text to avoid precision loss
    Decimal(String),
    /// UTF-8 string
    Text(String),
    /// Binary data
    Bytes(Vec<u8>),
    /// Date without time
    Date(NaiveDate),
    /// Time without date
    Time(NaiveTime),
    /// Date and time without timezone
    DateTime(NaiveDateTime),
    /// Date and time in UTC
    DateTimeUtc(DateTime<Utc>),
    /// UUID
    Uuid(uuid::Uuid),
    /// JSON document
    Json(serde_json::Value),
}

impl SqlValue {
    /// Returns the runtime type tag for this value.
    pub fn kind(&self) -> SqlValueKind {
        match self {
            SqlValue::Null => SqlValueKind::Null,
            SqlValue::Bool(_) => SqlValueKind::Boolean,
            SqlValue::Int(_) => SqlValueKind::Integer,
            SqlValue::Float(_) => SqlValueKind::Float,
            SqlValue::Decimal(_) => SqlValueKind::Decimal,
            SqlValue::Text(_) => SqlValueKind::Text,
            SqlValue::Bytes(_) => SqlValueKind::Binary,
            SqlValue::Date(_) => SqlValueKind::Date,
            SqlValue::Time(_) => SqlValueKind::Time,
            SqlValue::DateTime(_) | SqlValue::DateTimeUtc(_) => SqlValueKind::DateTime,
            SqlValue::Uuid(_) => SqlValueKind::Uuid,
            SqlValue::Json(_) => SqlValueKind::Json,
        }
    }

    /// Check if the value is NULL
    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null)
    }
}

/// Default string representation used by the exporters.
///
/// NULL renders as an empty string (a blank cell); binary data is
/// base64-encoded.
impl std::fmt::Display for SqlValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SqlValue::Null => Ok(()),
            SqlValue::Bool(v) => write!(f, "{}", v),
            SqlValue::Int(v) => write!(f, "{}", v),
            SqlValue::Float(v) => write!(f, "{}", v),
            SqlValue::Decimal(v) => write!(f, "{}", v),
            SqlValue::Text(v) => write!(f, "{}", v),
            SqlValue::Bytes(v) => {
                let encoded = base64::engine::general_purpose::STANDARD.encode(v);
                write!(f, "base64:{}", encoded)
            }
            SqlValue::Date(v) => write!(f, "{}", v),
            SqlValue::Time(v) => write!(f, "{}", v),
            SqlValue::DateTime(v) => write!(f, "{}", v),
            SqlValue::DateTimeUtc(v) => write!(f, "{}", v),
            SqlValue::Uuid(v) => write!(f, "{}", v),
            SqlValue::Json(v) => write!(f, "{}", v),
        }
    }
}

/// Named parameter binding for a query or stored procedure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportParameter {
    /// Parameter name, e.g. `account_number`
    pub name: String,
    /// Bound value; its variant is the declared type
    pub value: SqlValue,
}

impl ReportParameter {
    /// Creates a named parameter.
    pub fn new(name: impl Into<String>, value: SqlValue) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }
}

impl std::fmt::Display for ReportParameter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Name: {}. Type: {}. Value: {}",
            self.name,
            self.value.kind(),
            self.value
        )
    }
}

/// Formats a parameter list into the multi-line diagnostic block logged
/// before execution. Empty input yields an empty string.
pub fn format_parameters(parameters: &[ReportParameter]) -> String {
    if parameters.is_empty() {
        return String::new();
    }

    let mut msg = format!("{} Parameters:\n-----\n", parameters.len());
    for parameter in parameters {
        msg.push_str(&parameter.to_string());
        msg.push('\n');
    }
    msg.push_str("-----");
    msg
}

/// What a report executes: a raw query or a stored procedure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReportSource {
    /// Free-form SQL text, run verbatim
    Query(String),
    /// Stored procedure, invoked with the definition's parameters
    Procedure(String),
}

impl ReportSource {
    /// The query text or procedure name.
    pub fn identifier(&self) -> &str {
        match self {
            ReportSource::Query(sql) => sql,
            ReportSource::Procedure(name) => name,
        }
    }

    /// Short description for log lines.
    pub fn description(&self) -> String {
        match self {
            ReportSource::Query(_) => "query report".to_string(),
            ReportSource::Procedure(name) => format!("stored procedure report '{}'", name),
        }
    }
}

/// Immutable description of a report: what to run, how to render it, and
/// who receives it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportDefinition {
    /// Query text or stored procedure name
    pub source: ReportSource,
    /// Desired output format
    pub format: ReportFormat,
    /// Parameter bindings, applied in declaration order
    pub parameters: Vec<ReportParameter>,
    /// Email addresses that receive the rendered report
    pub recipients: Vec<String>,
    /// Keep the rendered file on disk after emailing
    pub save_to_disk: bool,
}

impl ReportDefinition {
    /// Creates a query report with no recipients and format unset.
    pub fn query(sql: impl Into<String>) -> Self {
        Self {
            source: ReportSource::Query(sql.into()),
            format: ReportFormat::default(),
            parameters: Vec::new(),
            recipients: Vec::new(),
            save_to_disk: false,
        }
    }

    /// Creates a stored-procedure report with no recipients and format unset.
    pub fn procedure(name: impl Into<String>) -> Self {
        Self {
            source: ReportSource::Procedure(name.into()),
            format: ReportFormat::default(),
            parameters: Vec::new(),
            recipients: Vec::new(),
            save_to_disk: false,
        }
    }

    /// Sets the output format.
    #[must_use]
    pub fn with_format(mut self, format: ReportFormat) -> Self {
        self.format = format;
        self
    }

    /// Replaces the recipient list.
    #[must_use]
    pub fn with_recipients(mut self, recipients: Vec<String>) -> Self {
        self.recipients = recipients;
        self
    }

    /// Appends a named parameter binding.
    #[must_use]
    pub fn with_parameter(mut self, name: impl Into<String>, value: SqlValue) -> Self {
        self.parameters.push(ReportParameter::new(name, value));
        self
    }

    /// Keeps the rendered file on disk after a successful send.
    #[must_use]
    pub fn with_save_to_disk(mut self, save: bool) -> Self {
        self.save_to_disk = save;
        self
    }

    /// Whether the definition is well-formed enough to run.
    ///
    /// Valid iff the query/procedure identifier is non-blank AND the
    /// recipient list is empty or the notifier reports itself configured.
    /// Checked once per run; never cached on the definition, so toggling
    /// notifier configuration changes the outcome of the next check.
    pub fn is_valid(&self, notifier_configured: bool) -> bool {
        !self.source.identifier().trim().is_empty()
            && (self.recipients.is_empty() || notifier_configured)
    }

    /// [`Self::is_valid`] as a fail-fast check with a reason.
    pub fn validate(&self, notifier_configured: bool) -> Result<()> {
        if self.source.identifier().trim().is_empty() {
            return Err(ReportError::invalid_report(match self.source {
                ReportSource::Query(_) => "query text was blank",
                ReportSource::Procedure(_) => "stored procedure name was blank",
            }));
        }

        if !self.recipients.is_empty() && !notifier_configured {
            return Err(ReportError::invalid_report(
                "recipients are set but the email notifier is not configured",
            ));
        }

        Ok(())
    }

    /// Short description for log lines.
    pub fn description(&self) -> String {
        self.source.description()
    }

    /// Recipients joined with a delimiter, for logging.
    pub fn recipients_display(&self, delimiter: char) -> String {
        self.recipients
            .iter()
            .map(|r| r.trim())
            .filter(|r| !r.is_empty())
            .collect::<Vec<_>>()
            .join(&format!("{} ", delimiter))
    }
}

/// Metadata for one projected column, produced by the schema probe before
/// any row is read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDescriptor {
    /// Zero-based ordinal; unique within the result set
    pub index: usize,
    /// Raw column name from the database schema (duplicates allowed)
    pub name: String,
    /// Declared database type name, e.g. `TEXT` or `INT8`
    pub type_name: String,
}

/// One captured cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CellValue {
    /// Zero-based row index
    pub row: usize,
    /// Zero-based column index, matching the cell's position in its row
    pub column: usize,
    /// The captured value
    pub value: SqlValue,
}

impl CellValue {
    /// Runtime type tag of the captured value.
    pub fn kind(&self) -> SqlValueKind {
        self.value.kind()
    }
}

/// One result row: every row carries exactly one cell per column, in
/// column-ordinal order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRow {
    /// Zero-based row index
    pub index: usize,
    /// Cells in column order
    pub values: Vec<CellValue>,
}

/// In-memory tabular snapshot of a single report execution.
///
/// Populated monotonically — columns first, then rows — during one runner
/// invocation, with elapsed time attached once execution completes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportResultSet {
    /// The definition that produced this result
    pub report: ReportDefinition,
    /// Column metadata in projection order
    pub columns: Vec<ColumnDescriptor>,
    /// Buffered rows in cursor order
    pub rows: Vec<ResultRow>,
    /// Wall-clock execution time in milliseconds
    pub elapsed_ms: u64,
}

impl ReportResultSet {
    /// Number of columns.
    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Number of rows.
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }
}
