use serde::Serialize;

use super::format::display_cell;
use super::rows::ReportRows;

pub const NO_DATA_PLACEHOLDER: &str = "Aucun résultat";

/// On-screen table for a row set.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Presentation {
    pub columns: Vec<&'static str>,
    pub rows: Vec<DisplayRow>,
    pub empty: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DisplayRow {
    Data { cells: Vec<String> },
    Placeholder { text: &'static str, colspan: usize },
}

#[tracing::instrument(
    name = "pipeline_stage present",
    skip(rows),
    fields(pipeline.stage = "present", report.kind = %rows.kind(), report.rows = rows.len())
)]
pub fn present(rows: &ReportRows) -> Presentation {
    let columns = rows.columns().to_vec();

    if rows.is_empty() {
        return Presentation {
            rows: vec![DisplayRow::Placeholder {
                text: NO_DATA_PLACEHOLDER,
                colspan: columns.len(),
            }],
            columns,
            empty: true,
        };
    }

    let display = rows
        .cells()
        .iter()
        .map(|row| DisplayRow::Data {
            cells: row.iter().map(display_cell).collect(),
        })
        .collect();

    Presentation {
        columns,
        rows: display,
        empty: false,
    }
}
