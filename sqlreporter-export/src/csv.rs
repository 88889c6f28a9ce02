//! CSV exporter.
//!
//! Joins cell values with the configured delimiter, one line per row, each
//! line terminated by the platform line separator with no trailing
//! delimiter.
//!
//! Known limitation: values are NOT quoted or escaped. A cell containing
//! the delimiter or a line break produces a malformed file. Callers that
//! need RFC 4180 output should post-process or pick a delimiter that
//! cannot occur in the data.

use std::path::PathBuf;

use sqlreporter_core::{ReportResultSet, Result};
use tracing::info;

use crate::LINE_ENDING;
use crate::output::{self, OutputDirectory};

/// Options for [`export_csv`].
#[derive(Debug, Clone)]
pub struct CsvOptions {
    /// Emit a header line of column names first
    pub include_columns: bool,
    /// Delete an existing file at the target path first
    pub overwrite: bool,
    /// Explicit file name; a generated `{uuid}.csv` when `None`
    pub file_name: Option<String>,
    /// Value separator
    pub delimiter: char,
}

impl Default for CsvOptions {
    /// No header line, overwrite on, generated file name, comma separator.
    fn default() -> Self {
        Self {
            include_columns: false,
            overwrite: true,
            file_name: None,
            delimiter: ',',
        }
    }
}

/// Exports the result set as a delimited text file and returns the path.
///
/// # Errors
/// Returns an I/O error if the output file cannot be created or written.
pub fn export_csv(
    result: &ReportResultSet,
    dir: &OutputDirectory,
    options: &CsvOptions,
) -> Result<PathBuf> {
    let content = render_csv(result, options);

    let target = dir.resolve_target(options.file_name.as_deref(), "csv", options.overwrite)?;
    output::write_new(&target, content.as_bytes())?;

    info!(path = %target.display(), rows = result.row_count(), "CSV report written");
    Ok(target)
}

/// Generates the delimited content.
fn render_csv(result: &ReportResultSet, options: &CsvOptions) -> String {
    let delimiter = options.delimiter.to_string();
    let mut content = String::new();

    if options.include_columns {
        let header = result
            .columns
            .iter()
            .map(|column| column.name.as_str())
            .collect::<Vec<_>>()
            .join(&delimiter);
        content.push_str(&header);
        content.push_str(LINE_ENDING);
    }

    for row in &result.rows {
        let line = row
            .values
            .iter()
            .map(|cell| cell.value.to_string())
            .collect::<Vec<_>>()
            .join(&delimiter);
        content.push_str(&line);
        content.push_str(LINE_ENDING);
    }

    content
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlreporter_core::{
        CellValue, ColumnDescriptor, ReportDefinition, ResultRow, SqlValue,
    };

    fn sample_result() -> ReportResultSet {
        let columns = vec![
            ColumnDescriptor {
                index: 0,
                name: "Id".to_string(),
                type_name: "INTEGER".to_string(),
            },
            ColumnDescriptor {
                index: 1,
                name: "Name".to_string(),
                type_name: "TEXT".to_string(),
            },
        ];
        let rows = vec![
            ResultRow {
                index: 0,
                values: vec![
                    CellValue {
                        row: 0,
                        column: 0,
                        value: SqlValue::Int(1),
                    },
                    CellValue {
                        row: 0,
                        column: 1,
                        value: SqlValue::Text("A".to_string()),
                    },
                ],
            },
            ResultRow {
                index: 1,
                values: vec![
                    CellValue {
                        row: 1,
                        column: 0,
                        value: SqlValue::Int(2),
                    },
                    CellValue {
                        row: 1,
                        column: 1,
                        value: SqlValue::Text("B".to_string()),
                    },
                ],
            },
        ];

        ReportResultSet {
            report: ReportDefinition::query("SELECT Id, Name FROM people"),
            columns,
            rows,
            elapsed_ms: 3,
        }
    }

    #[test]
    fn test_render_with_header_line() {
        let options = CsvOptions {
            include_columns: true,
            ..CsvOptions::default()
        };
        let content = render_csv(&sample_result(), &options);

        let expected = format!("Id,Name{0}1,A{0}2,B{0}", LINE_ENDING);
        assert_eq!(content, expected);
    }

    #[test]
    fn test_render_without_header_by_default() {
        let content = render_csv(&sample_result(), &CsvOptions::default());
        let expected = format!("1,A{0}2,B{0}", LINE_ENDING);
        assert_eq!(content, expected);
    }

    #[test]
    fn test_render_custom_delimiter_has_no_trailing_separator() {
        let options = CsvOptions {
            include_columns: true,
            delimiter: ';',
            ..CsvOptions::default()
        };
        let content = render_csv(&sample_result(), &options);

        for line in content.lines() {
            assert!(!line.ends_with(';'));
        }
        assert!(content.contains("Id;Name"));
    }

    #[test]
    fn test_delimiter_inside_value_is_not_escaped() {
        // Documented limitation: embedded delimiters are written verbatim.
        let mut result = sample_result();
        result.rows[0].values[1].value = SqlValue::Text("A,B".to_string());

        let content = render_csv(&result, &CsvOptions::default());
        assert!(content.starts_with(&format!("1,A,B{}", LINE_ENDING)));
    }
}
