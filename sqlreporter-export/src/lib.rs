//! Exporters and email delivery for SQL Reporter.
//!
//! This crate is the rendering half of the pipeline: pure transformations
//! from a [`sqlreporter_core::ReportResultSet`] to a file on disk (HTML,
//! CSV, spreadsheet, PDF), plus the [`EmailNotifier`] that mails a
//! rendered report to its definition's recipients.
//!
//! Every exporter shares the same surface: an [`OutputDirectory`] created
//! on demand, a generated `{uuid}.{ext}` name unless the caller picks one,
//! and an overwrite flag that deletes a pre-existing target first — or,
//! when off, leaves it alone and lets the create fail at the file-system
//! layer.

pub mod csv;
pub mod html;
pub mod notifier;
pub mod output;
mod pdf;
pub mod sheet;

pub use csv::{CsvOptions, export_csv};
pub use html::{HtmlOptions, export_html};
pub use notifier::{
    EmailNotifier, MessageOptions, SmtpCredentials, parse_address, valid_recipients,
};
pub use output::OutputDirectory;
pub use sheet::{
    DocumentEngine, DocumentFormat, ReportDocument, SheetOptions, SheetPlacement,
    SpreadsheetEngine, export_pdf, export_with_engine, export_xlsx,
};

/// Platform line separator used by the text exporters.
#[cfg(windows)]
pub(crate) const LINE_ENDING: &str = "\r\n";
/// Platform line separator used by the text exporters.
#[cfg(not(windows))]
pub(crate) const LINE_ENDING: &str = "\n";
