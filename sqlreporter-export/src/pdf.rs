//! PDF rendering for the document engine.
//!
//! Draws the document grid as a fixed-pitch table on landscape A4 pages
//! with a builtin font, paginating when a page fills up. Long values are
//! clipped to their column; this is a report snapshot, not a typesetting
//! engine.

use std::io::BufWriter;
use std::path::Path;

use printpdf::{BuiltinFont, Mm, PdfDocument};
use sqlreporter_core::{ReportError, Result};

use crate::output;

const PAGE_WIDTH_MM: f64 = 297.0;
const PAGE_HEIGHT_MM: f64 = 210.0;
const MARGIN_MM: f64 = 10.0;
const ROW_HEIGHT_MM: f64 = 6.0;

/// Renders the grid (header row first) into a new PDF file at `path`.
pub(crate) fn render_grid(grid: &[Vec<String>], path: &Path) -> Result<()> {
    let (doc, first_page, first_layer) = PdfDocument::new(
        "SQL Report",
        Mm(PAGE_WIDTH_MM as f32),
        Mm(PAGE_HEIGHT_MM as f32),
        "Layer 1",
    );

    let font = doc
        .add_builtin_font(BuiltinFont::Helvetica)
        .map_err(|e| ReportError::document("Failed to load builtin font", e))?;
    let header_font = doc
        .add_builtin_font(BuiltinFont::HelveticaBold)
        .map_err(|e| ReportError::document("Failed to load builtin bold font", e))?;

    let column_count = grid.first().map_or(0, Vec::len);

    if column_count > 0 {
        #[allow(clippy::cast_precision_loss)]
        let column_width = (PAGE_WIDTH_MM - 2.0 * MARGIN_MM) / column_count as f64;
        // Rough character budget for 9pt Helvetica at this column width
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let max_chars = (column_width / 1.8).max(4.0) as usize;

        let mut layer = doc.get_page(first_page).get_layer(first_layer);
        let mut y = PAGE_HEIGHT_MM - MARGIN_MM - ROW_HEIGHT_MM;

        for (row_index, row) in grid.iter().enumerate() {
            if y < MARGIN_MM {
                let (page, new_layer) =
                    doc.add_page(Mm(PAGE_WIDTH_MM as f32), Mm(PAGE_HEIGHT_MM as f32), "Layer 1");
                layer = doc.get_page(page).get_layer(new_layer);
                y = PAGE_HEIGHT_MM - MARGIN_MM - ROW_HEIGHT_MM;
            }

            let row_font = if row_index == 0 { &header_font } else { &font };

            for (column, text) in row.iter().enumerate() {
                #[allow(clippy::cast_precision_loss)]
                let x = MARGIN_MM + column as f64 * column_width;
                let clipped: String = text.chars().take(max_chars).collect();
                layer.use_text(clipped, 9.0, Mm(x as f32), Mm(y as f32), row_font);
            }

            y -= ROW_HEIGHT_MM;
        }
    }

    let file = output::create_new_file(path)?;
    doc.save(&mut BufWriter::new(file))
        .map_err(|e| ReportError::document(format!("Failed to save PDF {}", path.display()), e))?;

    Ok(())
}
