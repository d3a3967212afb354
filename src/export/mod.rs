pub mod pdf;
pub mod xlsx;

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use opentelemetry::KeyValue;

use crate::error::AppError;
use crate::report::{DateRange, ReportRows};
use crate::telemetry::metrics::{EXPORTS_RENDERED, EXPORT_SIZE};

pub use pdf::render_document;
pub use xlsx::render_spreadsheet;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Pdf,
    Xlsx,
}

impl ExportFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Pdf => "pdf",
            ExportFormat::Xlsx => "xlsx",
        }
    }

    pub fn content_type(self) -> &'static str {
        match self {
            ExportFormat::Pdf => "application/pdf",
            ExportFormat::Xlsx => {
                "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
            }
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for ExportFormat {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pdf" => Ok(ExportFormat::Pdf),
            "xlsx" | "excel" => Ok(ExportFormat::Xlsx),
            other => Err(AppError::NotFound(format!("Format d'export inconnu : {other}"))),
        }
    }
}

/// A rendered export, ready to be sent as a download.
#[derive(Debug, Clone)]
pub struct ExportDocument {
    pub filename: String,
    pub content_type: &'static str,
    pub bytes: Vec<u8>,
}

/// Renders `rows` in `format`. Never refetches; the rows are the ones
/// already held by the view.
#[tracing::instrument(
    name = "pipeline_stage export",
    skip(rows, range, generated_at),
    fields(
        pipeline.stage = "export",
        report.kind = %rows.kind(),
        report.rows = rows.len(),
        export.format = %format,
        export.bytes,
    )
)]
pub fn render(
    format: ExportFormat,
    rows: &ReportRows,
    range: Option<&DateRange>,
    generated_at: DateTime<Utc>,
) -> Result<ExportDocument, AppError> {
    let bytes = match format {
        ExportFormat::Pdf => render_document(rows, range, generated_at)?,
        ExportFormat::Xlsx => render_spreadsheet(rows, range)?,
    };

    let attrs = [
        KeyValue::new("report.kind", rows.kind().slug()),
        KeyValue::new("export.format", format.extension()),
    ];
    EXPORTS_RENDERED.add(1, &attrs);
    EXPORT_SIZE.record(bytes.len() as f64, &attrs);
    tracing::Span::current().record("export.bytes", bytes.len());

    Ok(ExportDocument {
        filename: format!("{}.{}", rows.kind().file_stem(), format.extension()),
        content_type: format.content_type(),
        bytes,
    })
}
