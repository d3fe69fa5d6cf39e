// Exporters - spreadsheet (CSV) and paginated text document
//
// The document layout mirrors a letter-size page in points: title at y=750,
// column headers at y=730, rows every 20pt from y=710 down to the bottom
// margin. Cells are left-aligned at fixed x coordinates and rendered to text
// at 8pt per character.

use crate::error::Result;
use crate::report::Table;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Spreadsheet,
    Document,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Spreadsheet => "csv",
            ExportFormat::Document => "txt",
        }
    }

    pub fn parse(text: &str) -> Option<Vec<ExportFormat>> {
        match text {
            "csv" | "spreadsheet" => Some(vec![ExportFormat::Spreadsheet]),
            "doc" | "document" | "txt" => Some(vec![ExportFormat::Document]),
            "both" | "all" => Some(vec![ExportFormat::Spreadsheet, ExportFormat::Document]),
            _ => None,
        }
    }
}

// ============================================================================
// SPREADSHEET
// ============================================================================

/// Header row followed by one record per table row
pub fn write_csv(table: &Table, path: &Path) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(&table.columns)?;
    for row in &table.rows {
        writer.write_record(row)?;
    }
    writer.flush()?;
    Ok(())
}

// ============================================================================
// DOCUMENT
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct PageLayout {
    pub title_y: u32,
    pub header_y: u32,
    pub first_row_y: u32,
    pub line_height: u32,
    pub bottom_margin: u32,
    pub left_x: u32,
    /// Horizontal space shared by all columns
    pub content_width: u32,
    /// Narrowest column pitch, so 4 columns land at 100/200/300/400
    pub min_column_pitch: u32,
    pub points_per_char: u32,
}

impl Default for PageLayout {
    fn default() -> Self {
        PageLayout {
            title_y: 750,
            header_y: 730,
            first_row_y: 710,
            line_height: 20,
            bottom_margin: 50,
            left_x: 100,
            content_width: 400,
            min_column_pitch: 100,
            points_per_char: 8,
        }
    }
}

impl PageLayout {
    /// x coordinate of each column (2 columns -> 100, 300)
    pub fn column_positions(&self, columns: usize) -> Vec<u32> {
        if columns == 0 {
            return Vec::new();
        }
        let pitch = (self.content_width / columns as u32).max(self.min_column_pitch);
        (0..columns as u32).map(|i| self.left_x + i * pitch).collect()
    }

    pub fn rows_per_page(&self) -> usize {
        if self.first_row_y < self.bottom_margin || self.line_height == 0 {
            return 1;
        }
        ((self.first_row_y - self.bottom_margin) / self.line_height + 1) as usize
    }
}

/// A piece of text anchored at its left edge
#[derive(Debug, Clone, PartialEq)]
pub struct PlacedText {
    pub x: u32,
    pub y: u32,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    pub number: usize,
    pub items: Vec<PlacedText>,
}

impl Page {
    /// Lines top to bottom, each cell padded out to its x coordinate.
    /// Cells are cut short one character before the next cell starts.
    pub fn to_text(&self, layout: &PageLayout) -> String {
        let mut ys: Vec<u32> = self.items.iter().map(|item| item.y).collect();
        ys.sort_unstable_by(|a, b| b.cmp(a));
        ys.dedup();

        let per_char = layout.points_per_char.max(1);
        let mut lines = Vec::with_capacity(ys.len());
        for y in ys {
            let mut cells: Vec<&PlacedText> = self.items.iter().filter(|i| i.y == y).collect();
            cells.sort_by_key(|cell| cell.x);

            let mut line = String::new();
            for (idx, cell) in cells.iter().enumerate() {
                let start = (cell.x / per_char) as usize;
                let width = cells
                    .get(idx + 1)
                    .map(|next| ((next.x / per_char) as usize).saturating_sub(start + 1));

                let used = line.chars().count();
                if used < start {
                    line.push_str(&" ".repeat(start - used));
                }
                match width {
                    Some(width) => line.extend(cell.text.chars().take(width)),
                    None => line.push_str(&cell.text),
                }
            }
            lines.push(line.trim_end().to_string());
        }

        lines.join("\n")
    }
}

/// Lay the table out over as many pages as needed.
///
/// Every page repeats the title and the column headers. An empty table still
/// yields one page.
pub fn render_document(table: &Table, layout: &PageLayout) -> Vec<Page> {
    let positions = layout.column_positions(table.columns.len());
    let per_page = layout.rows_per_page().max(1);

    let header = |number: usize| {
        let mut items = vec![PlacedText {
            x: layout.left_x,
            y: layout.title_y,
            text: table.title.clone(),
        }];
        for (x, column) in positions.iter().zip(&table.columns) {
            items.push(PlacedText {
                x: *x,
                y: layout.header_y,
                text: column.clone(),
            });
        }
        Page { number, items }
    };

    if table.rows.is_empty() {
        return vec![header(1)];
    }

    table
        .rows
        .chunks(per_page)
        .enumerate()
        .map(|(idx, rows)| {
            let mut page = header(idx + 1);
            for (line, row) in rows.iter().enumerate() {
                let y = layout.first_row_y - line as u32 * layout.line_height;
                for (x, cell) in positions.iter().zip(row) {
                    page.items.push(PlacedText {
                        x: *x,
                        y,
                        text: cell.clone(),
                    });
                }
            }
            page
        })
        .collect()
}

/// Pages separated by form feeds
pub fn write_document(table: &Table, path: &Path) -> Result<()> {
    let layout = PageLayout::default();
    let pages = render_document(table, &layout);

    let text = pages
        .iter()
        .map(|page| page.to_text(&layout))
        .collect::<Vec<_>>()
        .join("\n\u{000C}\n");

    fs::write(path, text + "\n")?;
    Ok(())
}

/// Write `table` to `<dir>/<stem>.<ext>` in each requested format.
/// Existing files with the same name are overwritten.
pub fn export_table(
    table: &Table,
    dir: &Path,
    stem: &str,
    formats: &[ExportFormat],
) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(dir)?;

    let mut written = Vec::with_capacity(formats.len());
    for format in formats {
        let path = dir.join(format!("{}.{}", stem, format.extension()));
        match format {
            ExportFormat::Spreadsheet => write_csv(table, &path)?,
            ExportFormat::Document => write_document(table, &path)?,
        }
        info!(path = %path.display(), rows = table.len(), "report exported");
        written.push(path);
    }

    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample(rows: usize) -> Table {
        let mut table = Table::new("Daily Entries Report", &["Date", "Customer", "Product", "Quantity"]);
        for i in 0..rows {
            table.push_row(vec![
                "2024-06-01".to_string(),
                format!("Customer {}", i),
                "Milk Type 1".to_string(),
                "2".to_string(),
            ]);
        }
        table
    }

    #[test]
    fn test_column_positions_match_page_grid() {
        let layout = PageLayout::default();
        assert_eq!(layout.column_positions(4), vec![100, 200, 300, 400]);
        assert_eq!(layout.column_positions(2), vec![100, 300]);
        assert!(layout.column_positions(0).is_empty());
        assert_eq!(layout.rows_per_page(), 34);
    }

    #[test]
    fn test_document_paginates_and_repeats_headers() {
        let layout = PageLayout::default();
        let pages = render_document(&sample(40), &layout);

        assert_eq!(pages.len(), 2);
        assert_eq!(pages[1].number, 2);
        for page in &pages {
            assert!(page.items.iter().any(|i| i.y == layout.title_y));
            assert_eq!(page.items.iter().filter(|i| i.y == layout.header_y).count(), 4);
        }
        let second_rows = pages[1].items.iter().filter(|i| i.y <= layout.first_row_y).count();
        assert_eq!(second_rows, 6 * 4);
    }

    #[test]
    fn test_page_text_is_left_aligned_at_columns() {
        let layout = PageLayout::default();
        let pages = render_document(&sample(1), &layout);
        let text = pages[0].to_text(&layout);
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines[0].trim_start(), "Daily Entries Report");
        assert_eq!(lines[1].find("Date"), Some(12));
        assert_eq!(lines[1].find("Customer"), Some(25));
        assert_eq!(lines[1].find("Product"), Some(37));
        assert_eq!(lines[1].find("Quantity"), Some(50));
        assert_eq!(lines[2].find("2024-06-01"), Some(12));
        assert_eq!(lines[2].find("Milk Type 1"), Some(37));
        assert!(lines[2].ends_with(" 2"));
    }

    #[test]
    fn test_empty_table_still_produces_document_and_csv() {
        let dir = TempDir::new().unwrap();
        let table = Table::new("Billing Summary for 2024-06", &["Customer", "Total"]);

        let written = export_table(
            &table,
            dir.path(),
            "billing_summary_2024-06",
            &[ExportFormat::Spreadsheet, ExportFormat::Document],
        )
        .unwrap();
        assert_eq!(written.len(), 2);

        let csv_text = fs::read_to_string(&written[0]).unwrap();
        assert_eq!(csv_text, "Customer,Total\n");

        let doc_text = fs::read_to_string(&written[1]).unwrap();
        assert!(doc_text.contains("Billing Summary for 2024-06"));
        assert!(doc_text.contains("Customer"));
    }

    #[test]
    fn test_export_overwrites_same_stem() {
        let dir = TempDir::new().unwrap();

        export_table(&sample(3), dir.path(), "daily_entries", &[ExportFormat::Spreadsheet]).unwrap();
        let written =
            export_table(&sample(1), dir.path(), "daily_entries", &[ExportFormat::Spreadsheet]).unwrap();

        let mut reader = csv::Reader::from_path(&written[0]).unwrap();
        assert_eq!(reader.records().count(), 1);
    }

    #[test]
    fn test_format_names() {
        assert_eq!(ExportFormat::parse("csv"), Some(vec![ExportFormat::Spreadsheet]));
        assert_eq!(ExportFormat::parse("both").unwrap().len(), 2);
        assert_eq!(ExportFormat::parse("xlsx"), None);
    }
}
