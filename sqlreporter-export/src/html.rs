//! HTML exporter.
//!
//! Renders a result set into an HTML table by substituting placeholders in
//! a template: `[COLCOUNT]`, `[ROWCOUNT]`, `[HEADERS]`, and `[RECORDS]`,
//! with per-cell `[COL]`/`[VAL]` tokens inside the generated fragments.
//! The bundled template styles cells with the `tg-hmp3`/`tg-0lax` classes;
//! when a caller supplies their own template those class attributes are
//! stripped from the generated cells so the template's styling wins.

use std::path::{Path, PathBuf};

use sqlreporter_core::{ReportError, ReportResultSet, Result};
use tracing::info;

use crate::LINE_ENDING;
use crate::output::{self, OutputDirectory};

/// Template bundled with the crate, used when no template path is given.
const DEFAULT_TEMPLATE: &str = include_str!("../templates/report.html");

/// Options for [`export_html`].
#[derive(Debug, Clone)]
pub struct HtmlOptions {
    /// Caller-supplied template file; bundled default when `None`
    pub template_path: Option<PathBuf>,
    /// Delete an existing file at the target path first
    pub overwrite: bool,
    /// Explicit file name; a generated `{uuid}.html` when `None`
    pub file_name: Option<String>,
}

impl Default for HtmlOptions {
    /// Bundled template, overwrite on, generated file name.
    fn default() -> Self {
        Self {
            template_path: None,
            overwrite: true,
            file_name: None,
        }
    }
}

/// Exports the result set as an HTML document and returns the file path.
///
/// # Errors
/// - `MissingTemplate` if the resolved template content is blank
/// - `Io` for template read or output write failures
pub fn export_html(
    result: &ReportResultSet,
    dir: &OutputDirectory,
    options: &HtmlOptions,
) -> Result<PathBuf> {
    // Render before touching the target so template errors never clobber
    // an existing file.
    let html = render_html(result, options.template_path.as_deref())?;

    let target = dir.resolve_target(options.file_name.as_deref(), "html", options.overwrite)?;
    output::write_new(&target, html.as_bytes())?;

    info!(path = %target.display(), rows = result.row_count(), "HTML report written");
    Ok(target)
}

/// Generates the HTML document content.
fn render_html(result: &ReportResultSet, template_path: Option<&Path>) -> Result<String> {
    let using_template = template_path.is_some();

    let base = match template_path {
        Some(path) => std::fs::read_to_string(path).map_err(|e| {
            ReportError::io(format!("Failed to read template {}", path.display()), e)
        })?,
        None => DEFAULT_TEMPLATE.to_string(),
    };

    if base.trim().is_empty() {
        return Err(ReportError::missing_template(match template_path {
            Some(path) => format!("template file {}", path.display()),
            None => "bundled HTML template".to_string(),
        }));
    }

    let mut html = base
        .replace("[COLCOUNT]", &result.column_count().to_string())
        .replace("[ROWCOUNT]", &result.row_count().to_string());

    let mut header_cell = format!("\t<td class=\"tg-hmp3\">[COL]</td>{}", LINE_ENDING);
    let mut body_cell = format!("\t<td class=\"tg-0lax\">[VAL]</td>{}", LINE_ENDING);
    if using_template {
        header_cell = header_cell.replace(" class=\"tg-hmp3\"", "");
        body_cell = body_cell.replace(" class=\"tg-0lax\"", "");
    }

    let mut headers = String::new();
    for column in &result.columns {
        headers.push_str(&header_cell.replace("[COL]", &column.name));
    }

    let mut records = String::new();
    for row in &result.rows {
        let mut cells = String::new();
        for cell in &row.values {
            cells.push_str(&body_cell.replace("[VAL]", &cell.value.to_string()));
        }
        records.push_str("<tr>");
        records.push_str(&cells);
        records.push_str("</tr>");
    }

    html = html.replace("[HEADERS]", &headers);
    html = html.replace("[RECORDS]", &records);

    Ok(html)
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;
    use sqlreporter_core::{
        CellValue, ColumnDescriptor, ReportDefinition, ResultRow, SqlValue,
    };

    fn sample_result() -> ReportResultSet {
        ReportResultSet {
            report: ReportDefinition::query("SELECT id, name FROM people"),
            columns: vec![
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
            ],
            rows: vec![
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
            ],
            elapsed_ms: 5,
        }
    }

    #[test]
    fn test_render_counts_and_cells() {
        let result = sample_result();
        let html = render_html(&result, None).expect("render should succeed");

        assert!(html.contains("with 2 columns and 2 rows"));
        assert_eq!(html.matches("<td class=\"tg-hmp3\">").count(), 2);
        assert_eq!(html.matches("<td class=\"tg-0lax\">").count(), 4);
        // One header row from the template plus one element per data row
        assert_eq!(html.matches("<tr>").count(), 3);
        assert!(html.contains(">A</td>"));
        assert!(!html.contains("[HEADERS]"));
        assert!(!html.contains("[RECORDS]"));
    }

    #[test]
    fn test_custom_template_strips_builtin_classes() {
        let result = sample_result();
        let dir = tempfile::tempdir().expect("tempdir");
        let template = dir.path().join("custom.html");
        std::fs::write(
            &template,
            "<table>[COLCOUNT]/[ROWCOUNT]<tr>[HEADERS]</tr>[RECORDS]</table>",
        )
        .expect("write template");

        let html = render_html(&result, Some(&template)).expect("render should succeed");

        assert!(html.contains("2/2"));
        assert!(!html.contains("tg-hmp3"));
        assert!(!html.contains("tg-0lax"));
        assert_eq!(html.matches("<td>").count(), 6);
    }

    #[test]
    fn test_blank_template_is_missing() {
        let result = sample_result();
        let dir = tempfile::tempdir().expect("tempdir");
        let template = dir.path().join("empty.html");
        std::fs::write(&template, "   \n").expect("write template");

        let rendered = render_html(&result, Some(&template));
        assert!(matches!(
            rendered,
            Err(ReportError::MissingTemplate { .. })
        ));
    }
}
