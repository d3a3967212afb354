use axum::{
    Json,
    extract::{Path, State},
    http::header::{CONTENT_DISPOSITION, CONTENT_TYPE},
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::AppState;
use crate::error::{AppError, AppResult};
use crate::export::{self, ExportFormat};
use crate::middleware::{VIEW_ID_HEADER, ViewOwner};
use crate::report::{DateRangeInput, Presentation, ReportKind, Snapshot, present, run_report};

#[derive(Debug, Serialize)]
pub struct ReportResponse {
    pub kind: ReportKind,
    pub title: &'static str,
    pub period: Option<String>,
    pub generation: u64,
    pub fetched_at: DateTime<Utc>,
    pub exportable: bool,
    #[serde(flatten)]
    pub presentation: Presentation,
}

impl From<&Snapshot> for ReportResponse {
    fn from(snapshot: &Snapshot) -> Self {
        let kind = snapshot.rows.kind();
        Self {
            kind,
            title: kind.title(),
            period: snapshot.range.map(|range| range.period_label()),
            generation: snapshot.generation,
            fetched_at: snapshot.fetched_at,
            exportable: !snapshot.rows.is_empty(),
            presentation: present(&snapshot.rows),
        }
    }
}

/// Runs a report query and makes its rows the caller's current view.
pub async fn run(
    State(state): State<AppState>,
    Path(kind): Path<String>,
    owner: ViewOwner,
    Json(input): Json<DateRangeInput>,
) -> AppResult<Response> {
    let kind: ReportKind = kind.parse()?;

    // Tickets are only issued for queries that will reach the backend.
    if kind.requires_range() {
        input.validate()?;
    }
    let ticket = state.views.begin(&owner.key(), kind);

    let outcome = match run_report(
        state.reports.as_ref(),
        kind,
        &input,
        owner.token(),
        state.config.top_maintenance_limit,
    )
    .await
    {
        Ok(outcome) => outcome,
        Err(err) => {
            state.views.abandon(&ticket);
            return Err(err);
        }
    };

    let snapshot = state
        .views
        .commit(ticket, outcome.rows, outcome.range, Utc::now())
        .ok_or(AppError::Superseded)?;

    let body = Json(ReportResponse::from(snapshot.as_ref()));
    Ok(match owner.view_id() {
        Some(view_id) => ([(VIEW_ID_HEADER, view_id.to_string())], body).into_response(),
        None => body.into_response(),
    })
}

pub async fn current(
    State(state): State<AppState>,
    Path(kind): Path<String>,
    owner: ViewOwner,
) -> AppResult<Json<ReportResponse>> {
    let kind: ReportKind = kind.parse()?;
    let snapshot = state
        .views
        .current(&owner.key(), kind)
        .ok_or_else(|| not_loaded(kind))?;

    Ok(Json(ReportResponse::from(snapshot.as_ref())))
}

/// Renders the current view; the backend is not called again.
pub async fn export(
    State(state): State<AppState>,
    Path((kind, format)): Path<(String, String)>,
    owner: ViewOwner,
) -> AppResult<Response> {
    let kind: ReportKind = kind.parse()?;
    let format: ExportFormat = format.parse()?;
    let snapshot = state
        .views
        .current(&owner.key(), kind)
        .ok_or_else(|| not_loaded(kind))?;

    let document = export::render(format, &snapshot.rows, snapshot.range.as_ref(), Utc::now())?;

    Ok((
        [
            (CONTENT_TYPE, document.content_type.to_string()),
            (
                CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", document.filename),
            ),
        ],
        document.bytes,
    )
        .into_response())
}

fn not_loaded(kind: ReportKind) -> AppError {
    AppError::NotFound(format!("Aucun rapport chargé pour {kind}"))
}
