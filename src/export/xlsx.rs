use rust_xlsxwriter::{DocProperties, ExcelDateTime, Format, Workbook};

use crate::error::AppError;
use crate::report::{Cell, DateRange, ReportRows};

/// Fixed creation date written into the workbook metadata so identical
/// rows give identical bytes.
const PINNED_CREATION_DATE: (u16, u8, u8) = (2024, 1, 1);

const MIN_COLUMN_WIDTH: usize = 10;
const MAX_COLUMN_WIDTH: usize = 50;

/// Sheet content: the header row followed by one row per report row.
pub fn sheet_layout(rows: &ReportRows) -> Vec<Vec<Cell>> {
    let header = rows
        .columns()
        .iter()
        .map(|label| Cell::Text((*label).to_string()))
        .collect();

    std::iter::once(header).chain(rows.cells()).collect()
}

#[tracing::instrument(
    name = "render spreadsheet",
    skip(rows, range),
    fields(report.kind = %rows.kind(), report.rows = rows.len())
)]
pub fn render_spreadsheet(
    rows: &ReportRows,
    range: Option<&DateRange>,
) -> Result<Vec<u8>, AppError> {
    let kind = rows.kind();
    let layout = sheet_layout(rows);

    let mut workbook = Workbook::new();
    let (year, month, day) = PINNED_CREATION_DATE;
    let mut properties = DocProperties::new()
        .set_title(kind.title())
        .set_creation_datetime(&ExcelDateTime::from_ymd(year, month, day)?);
    if let Some(range) = range {
        properties = properties.set_subject(format!("Période : {}", range.period_label()));
    }
    workbook.set_properties(&properties);

    let header_format = Format::new().set_bold();
    let worksheet = workbook.add_worksheet();
    worksheet.set_name(kind.sheet_name())?;

    for (r, line) in layout.iter().enumerate() {
        let row = r as u32;
        for (c, cell) in line.iter().enumerate() {
            let col = c as u16;
            match cell {
                Cell::Text(text) if r == 0 => {
                    worksheet.write_string_with_format(row, col, text, &header_format)?;
                }
                Cell::Text(text) => {
                    worksheet.write_string(row, col, text)?;
                }
                Cell::Number(n) => {
                    worksheet.write_number(row, col, *n)?;
                }
                Cell::Position(p) => {
                    worksheet.write_number(row, col, *p as f64)?;
                }
            }
        }
    }

    for (c, width) in column_widths(&layout).into_iter().enumerate() {
        worksheet.set_column_width(c as u16, width as f64)?;
    }
    worksheet.set_freeze_panes(1, 0)?;

    Ok(workbook.save_to_buffer()?)
}

fn column_widths(layout: &[Vec<Cell>]) -> Vec<usize> {
    let columns = layout.first().map_or(0, Vec::len);
    (0..columns)
        .map(|c| {
            layout
                .iter()
                .filter_map(|line| line.get(c))
                .map(|cell| match cell {
                    Cell::Text(text) => text.chars().count(),
                    Cell::Number(n) => n.to_string().len(),
                    Cell::Position(p) => p.to_string().len(),
                })
                .max()
                .unwrap_or(0)
                .saturating_add(2)
                .clamp(MIN_COLUMN_WIDTH, MAX_COLUMN_WIDTH)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::ReportKind;
    use crate::report::rows::fixtures::{consumption, cost};

    #[test]
    fn test_layout_has_header_then_rows_in_order() {
        let rows = ReportRows::VehicleCost(vec![
            cost("5678 TBB", 80_000.0, 20_000.0),
            cost("1234 TBA", 1_250_000.0, 300_000.0),
        ]);
        let layout = sheet_layout(&rows);

        assert_eq!(layout.len(), 3);
        assert_eq!(layout[0][0], Cell::Text("Immatriculation".to_string()));
        assert_eq!(layout[1][0], Cell::Text("5678 TBB".to_string()));
        assert_eq!(layout[2][0], Cell::Text("1234 TBA".to_string()));
        // Raw values, not display strings.
        assert_eq!(layout[2][3], Cell::Number(1_250_000.0));
        assert_eq!(layout[2][5], Cell::Number(1_550_000.0));
    }

    #[test]
    fn test_layout_of_empty_rows_is_header_only() {
        let layout = sheet_layout(&ReportRows::empty(ReportKind::FuelConsumption));
        assert_eq!(layout.len(), 1);
        assert_eq!(layout[0].len(), 7);
        assert_eq!(layout[0][0], Cell::Text("#".to_string()));
    }

    #[test]
    fn test_render_is_deterministic() {
        let rows = ReportRows::FuelConsumption(vec![
            consumption("1234 TBA", 42.5, 5200.0),
            consumption("5678 TBB", 10.0, 5300.0),
        ]);
        let range = DateRange::new(
            chrono::NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            chrono::NaiveDate::from_ymd_opt(2024, 1, 31).unwrap(),
        );

        let first = render_spreadsheet(&rows, Some(&range)).unwrap();
        let second = render_spreadsheet(&rows, Some(&range)).unwrap();

        assert!(first.starts_with(b"PK"));
        assert_eq!(first, second);
    }

    #[test]
    fn test_render_empty_rows() {
        let bytes = render_spreadsheet(&ReportRows::empty(ReportKind::TopMaintenance), None).unwrap();
        assert!(bytes.starts_with(b"PK"));
    }

    #[test]
    fn test_column_widths_are_clamped() {
        let layout = vec![vec![
            Cell::Text("#".to_string()),
            Cell::Text("x".repeat(80)),
        ]];
        assert_eq!(column_widths(&layout), vec![MIN_COLUMN_WIDTH, MAX_COLUMN_WIDTH]);
    }
}
