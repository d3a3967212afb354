use std::time::Instant;

use opentelemetry::KeyValue;

use super::{DateRange, DateRangeInput, ReportKind, ReportRows};
use crate::error::AppError;
use crate::gateway::ReportSource;
use crate::telemetry::metrics::{REPORT_QUERY_DURATION, REPORT_ROWS};

/// Rows of one successful query together with the range they cover.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportOutcome {
    pub rows: ReportRows,
    pub range: Option<DateRange>,
}

/// Validates the input, then issues exactly one backend request for `kind`.
///
/// Nothing is sent when validation fails. Rows come back in the order the
/// backend returned them; only the top-maintenance list is cut to
/// `top_limit` entries.
#[tracing::instrument(
    name = "pipeline report",
    skip(source, input, bearer),
    fields(report.kind = %kind, report.rows, report.duration_ms)
)]
pub async fn run_report(
    source: &dyn ReportSource,
    kind: ReportKind,
    input: &DateRangeInput,
    bearer: Option<&str>,
    top_limit: usize,
) -> Result<ReportOutcome, AppError> {
    let range = if kind.requires_range() {
        let range = input.validate()?;
        if range.is_inverted() {
            tracing::warn!(period = %range, "Inverted date range forwarded to the backend");
        }
        Some(range)
    } else {
        None
    };

    let start = Instant::now();
    let mut rows = source.fetch_report(kind, range.as_ref(), bearer).await?;
    let duration = start.elapsed();

    if kind == ReportKind::TopMaintenance {
        rows.truncate(top_limit);
    }

    let attrs = [KeyValue::new("report.kind", kind.slug())];
    REPORT_QUERY_DURATION.record(duration.as_secs_f64(), &attrs);
    REPORT_ROWS.record(rows.len() as f64, &attrs);

    let span = tracing::Span::current();
    span.record("report.rows", rows.len());
    span.record("report.duration_ms", duration.as_millis() as u64);

    tracing::info!(rows = rows.len(), "Report rows received");

    Ok(ReportOutcome { rows, range })
}


#[cfg(test)]
mod tests {
    use super::stub::StubSource;
    use super::*;
    use crate::report::rows::fixtures::{cost, cost_rows};
    use crate::report::rows::{MaintenanceRow, ReportRows};

    #[tokio::test]
    async fn test_valid_range_issues_one_request_with_both_dates() {
        let source = StubSource::returning(Ok(ReportRows::VehicleCost(vec![
            cost("1234 TBA", 10.0, 5.0),
            cost("5678 TBB", 20.0, 5.0),
        ])));
        let input = DateRangeInput::new("2024-01-01", "2024-01-31");

        let outcome = run_report(&source, ReportKind::VehicleCost, &input, Some("tok"), 5)
            .await
            .unwrap();

        assert_eq!(outcome.rows.len(), 2);
        let calls = source.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        let (kind, range, bearer) = &calls[0];
        assert_eq!(*kind, ReportKind::VehicleCost);
        assert_eq!(
            range.map(|r| r.period_label()).as_deref(),
            Some("du 2024-01-01 au 2024-01-31")
        );
        assert_eq!(bearer.as_deref(), Some("tok"));
        assert_eq!(outcome.range, *range);
    }

    #[tokio::test]
    async fn test_missing_date_sends_nothing() {
        let source = StubSource::returning(Ok(cost_rows(1)));
        let input = DateRangeInput {
            date_debut: Some("2024-01-01".to_string()),
            date_fin: None,
        };

        let err = run_report(&source, ReportKind::FuelConsumption, &input, None, 5)
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Validation(_)));
        assert_eq!(source.call_count(), 0);
    }

    #[tokio::test]
    async fn test_inverted_range_is_still_sent() {
        let source = StubSource::returning(Ok(ReportRows::empty(ReportKind::VehicleCost)));
        let input = DateRangeInput::new("2024-02-01", "2024-01-01");

        let outcome = run_report(&source, ReportKind::VehicleCost, &input, None, 5)
            .await
            .unwrap();

        assert!(outcome.rows.is_empty());
        assert_eq!(source.call_count(), 1);
    }

    #[tokio::test]
    async fn test_network_failure_propagates() {
        let source = StubSource::returning(Err(AppError::network(Some(500), None)));
        let input = DateRangeInput::new("2024-01-01", "2024-01-31");

        let err = run_report(&source, ReportKind::VehicleCost, &input, None, 5)
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Network { status: Some(500), .. }));
        assert_eq!(source.call_count(), 1);
    }

    #[tokio::test]
    async fn test_top_maintenance_ignores_dates_and_truncates() {
        let rows: Vec<MaintenanceRow> = (0..8)
            .map(|i| MaintenanceRow {
                vehicule: None,
                garage: None,
                description: Some(format!("entretien {i}")),
                date_entretien: Some("2024-03-01".to_string()),
                cout: 1000.0 * (8 - i) as f64,
            })
            .collect();
        let source = StubSource::returning(Ok(ReportRows::TopMaintenance(rows)));

        let outcome = run_report(
            &source,
            ReportKind::TopMaintenance,
            &DateRangeInput::default(),
            None,
            5,
        )
        .await
        .unwrap();

        assert_eq!(outcome.rows.len(), 5);
        assert_eq!(outcome.range, None);
        match outcome.rows {
            ReportRows::TopMaintenance(r) => {
                assert_eq!(r[0].description.as_deref(), Some("entretien 0"));
                assert_eq!(r[4].description.as_deref(), Some("entretien 4"));
            }
            other => panic!("unexpected rows: {other:?}"),
        }
    }
}
