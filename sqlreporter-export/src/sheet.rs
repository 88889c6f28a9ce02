//! Spreadsheet and PDF export through the document-engine seam.
//!
//! The engine is the one place this workspace leans on a third-party
//! rendering stack, so it stays behind the narrow [`DocumentEngine`]
//! contract: build an in-memory document from a result set and a template,
//! then save it as a native workbook or render it to PDF. The default
//! [`SpreadsheetEngine`] builds workbooks with `umya-spreadsheet` and
//! renders PDF pages with `printpdf`.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sqlreporter_core::{ReportError, ReportResultSet, Result, SqlValue};
use tracing::info;

use crate::output::{self, OutputDirectory};
use crate::pdf;

/// Cell placement inside the target sheet.
///
/// The defaults (sheet 0, header row 1, first data row 2, first column 1)
/// are a stable contract; existing template workbooks depend on them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SheetPlacement {
    /// Zero-based index of the target sheet
    pub sheet_index: usize,
    /// One-based row that receives the column headers
    pub header_row: u32,
    /// One-based row of the first data row
    pub first_row: u32,
    /// One-based column of the first header/data cell
    pub first_col: u32,
    /// Widen columns to fit their longest rendered value
    pub autofit_columns: bool,
}

impl Default for SheetPlacement {
    fn default() -> Self {
        Self {
            sheet_index: 0,
            header_row: 1,
            first_row: 2,
            first_col: 1,
            autofit_columns: true,
        }
    }
}

/// Options for [`export_xlsx`] and [`export_pdf`].
#[derive(Debug, Clone)]
pub struct SheetOptions {
    /// Caller-supplied template workbook; a blank workbook when `None`
    pub template_path: Option<PathBuf>,
    /// Delete an existing file at the target path first
    pub overwrite: bool,
    /// Explicit file name; a generated `{uuid}.{ext}` when `None`
    pub file_name: Option<String>,
    /// Where headers and data land in the sheet
    pub placement: SheetPlacement,
}

impl Default for SheetOptions {
    /// Blank workbook, overwrite on, generated file name, default placement.
    fn default() -> Self {
        Self {
            template_path: None,
            overwrite: true,
            file_name: None,
            placement: SheetPlacement::default(),
        }
    }
}

/// Target formats the engine can save.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    /// Native spreadsheet file
    Xlsx,
    /// PDF rendering of the document grid
    Pdf,
}

/// An in-memory report document: the workbook plus the rendered grid the
/// PDF path draws from.
pub struct ReportDocument {
    book: umya_spreadsheet::Spreadsheet,
    grid: Vec<Vec<String>>,
}

impl ReportDocument {
    /// Header plus data rows as display strings, in sheet order.
    pub fn grid(&self) -> &[Vec<String>] {
        &self.grid
    }
}

/// Narrow contract over the external document-rendering stack.
pub trait DocumentEngine {
    /// Builds an in-memory document from a result set, an optional
    /// template workbook, and cell placement.
    fn build_document(
        &self,
        result: &ReportResultSet,
        template_path: Option<&Path>,
        placement: &SheetPlacement,
    ) -> Result<ReportDocument>;

    /// Saves a built document at `path` in the requested format.
    fn save_as(
        &self,
        document: &ReportDocument,
        path: &Path,
        format: DocumentFormat,
    ) -> Result<()>;
}

/// Default engine backed by `umya-spreadsheet` and `printpdf`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SpreadsheetEngine;

impl DocumentEngine for SpreadsheetEngine {
    fn build_document(
        &self,
        result: &ReportResultSet,
        template_path: Option<&Path>,
        placement: &SheetPlacement,
    ) -> Result<ReportDocument> {
        let mut book = match template_path {
            Some(path) => umya_spreadsheet::reader::xlsx::read(path).map_err(|e| {
                ReportError::document(
                    format!("Failed to load template workbook {}", path.display()),
                    e,
                )
            })?,
            None => umya_spreadsheet::new_file(),
        };

        let sheet = book.get_sheet_mut(&placement.sheet_index).ok_or_else(|| {
            ReportError::configuration(format!(
                "Workbook has no sheet at index {}",
                placement.sheet_index
            ))
        })?;

        for (i, column) in result.columns.iter().enumerate() {
            let col = offset(placement.first_col, i);
            sheet
                .get_cell_mut((col, placement.header_row))
                .set_value(column.name.clone());
        }

        for row in &result.rows {
            let r = offset(placement.first_row, row.index);
            for cell in &row.values {
                let c = offset(placement.first_col, cell.column);
                let target = sheet.get_cell_mut((c, r));
                match &cell.value {
                    SqlValue::Int(v) => {
                        target.set_value_number(*v as f64);
                    }
                    SqlValue::Float(v) => {
                        target.set_value_number(*v);
                    }
                    SqlValue::Bool(v) => {
                        target.set_value_bool(*v);
                    }
                    other => {
                        target.set_value(other.to_string());
                    }
                }
            }
        }

        if placement.autofit_columns {
            for (i, column) in result.columns.iter().enumerate() {
                let mut chars = column.name.chars().count();
                for row in &result.rows {
                    if let Some(cell) = row.values.get(i) {
                        chars = chars.max(cell.value.to_string().chars().count());
                    }
                }
                let letter = column_letter(offset(placement.first_col, i));
                #[allow(clippy::cast_precision_loss)]
                let width = (chars as f64 * 1.2).clamp(8.0, 80.0);
                sheet.get_column_dimension_mut(&letter).set_width(width);
            }
        }

        Ok(ReportDocument {
            grid: build_grid(result),
            book,
        })
    }

    fn save_as(
        &self,
        document: &ReportDocument,
        path: &Path,
        format: DocumentFormat,
    ) -> Result<()> {
        match format {
            DocumentFormat::Xlsx => {
                let mut file = output::create_new_file(path)?;
                umya_spreadsheet::writer::xlsx::write_writer(&document.book, &mut file).map_err(
                    |e| {
                        ReportError::document(
                            format!("Failed to write workbook {}", path.display()),
                            e,
                        )
                    },
                )?;
            }
            DocumentFormat::Pdf => {
                pdf::render_grid(&document.grid, path)?;
            }
        }
        Ok(())
    }
}

/// Exports the result set as an `.xlsx` workbook and returns the path.
///
/// # Errors
/// Returns a document error for template or save failures, and an I/O
/// error if the target file cannot be created.
pub fn export_xlsx(
    result: &ReportResultSet,
    dir: &OutputDirectory,
    options: &SheetOptions,
) -> Result<PathBuf> {
    export_with_engine(&SpreadsheetEngine, result, dir, options, DocumentFormat::Xlsx)
}

/// Exports the result set rendered to PDF and returns the path.
///
/// # Errors
/// Same failure modes as [`export_xlsx`].
pub fn export_pdf(
    result: &ReportResultSet,
    dir: &OutputDirectory,
    options: &SheetOptions,
) -> Result<PathBuf> {
    export_with_engine(&SpreadsheetEngine, result, dir, options, DocumentFormat::Pdf)
}

/// Exports through a caller-supplied engine implementation.
pub fn export_with_engine(
    engine: &dyn DocumentEngine,
    result: &ReportResultSet,
    dir: &OutputDirectory,
    options: &SheetOptions,
    format: DocumentFormat,
) -> Result<PathBuf> {
    let document = engine.build_document(
        result,
        options.template_path.as_deref(),
        &options.placement,
    )?;

    let extension = match format {
        DocumentFormat::Xlsx => "xlsx",
        DocumentFormat::Pdf => "pdf",
    };
    let target = dir.resolve_target(options.file_name.as_deref(), extension, options.overwrite)?;

    engine.save_as(&document, &target, format)?;

    info!(path = %target.display(), rows = result.row_count(), "Document report written");
    Ok(target)
}

/// Captures header and data rows as display strings for the PDF renderer.
fn build_grid(result: &ReportResultSet) -> Vec<Vec<String>> {
    let mut grid = Vec::with_capacity(result.row_count().saturating_add(1));
    grid.push(
        result
            .columns
            .iter()
            .map(|column| column.name.clone())
            .collect(),
    );
    for row in &result.rows {
        grid.push(row.values.iter().map(|cell| cell.value.to_string()).collect());
    }
    grid
}

fn offset(base: u32, index: usize) -> u32 {
    base.saturating_add(u32::try_from(index).unwrap_or(u32::MAX))
}

/// 1-based column index to spreadsheet letters (1 -> A, 27 -> AA).
fn column_letter(mut column: u32) -> String {
    let mut letters = Vec::new();
    while column > 0 {
        let remainder = (column - 1) % 26;
        letters.push(char::from(b'A' + u8::try_from(remainder).unwrap_or(0)));
        column = (column - 1) / 26;
    }
    letters.iter().rev().collect()
}
