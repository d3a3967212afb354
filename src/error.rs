use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use opentelemetry::trace::TraceContextExt;
use serde_json::json;
use thiserror::Error;
use tracing::Span;
use tracing_opentelemetry::OpenTelemetrySpanExt;

/// Notice shown when the backend rejects a report query without a message.
pub const NETWORK_FALLBACK_MESSAGE: &str =
    "Impossible de charger les données ! Vérifiez les dates.";

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Network error: {message}")]
    Network {
        status: Option<u16>,
        message: String,
    },

    #[error("Render error: {0}")]
    Render(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Superseded by a newer query")]
    Superseded,

    #[error("Authentication required")]
    Unauthorized,
}

impl AppError {
    /// Builds a network error, preferring the backend-supplied message.
    pub fn network(status: Option<u16>, backend_message: Option<String>) -> Self {
        let message = backend_message
            .map(|m| m.trim().to_string())
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| NETWORK_FALLBACK_MESSAGE.to_string());
        AppError::Network { status, message }
    }

    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Network { .. } => StatusCode::BAD_GATEWAY,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Superseded => StatusCode::CONFLICT,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::Render(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<rust_xlsxwriter::XlsxError> for AppError {
    fn from(err: rust_xlsxwriter::XlsxError) -> Self {
        AppError::Render(format!("spreadsheet: {err}"))
    }
}

impl From<lopdf::Error> for AppError {
    fn from(err: lopdf::Error) -> Self {
        AppError::Render(format!("document: {err}"))
    }
}

fn get_trace_id() -> Option<String> {
    let span = Span::current();
    let context = span.context();
    let span_ref = context.span();
    let span_context = span_ref.span_context();

    if span_context.is_valid() {
        Some(span_context.trace_id().to_string())
    } else {
        None
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let mut upstream_status = None;

        let error_message = match &self {
            AppError::Validation(msg) | AppError::NotFound(msg) => msg.clone(),
            AppError::Network {
                status: backend_status,
                message,
            } => {
                tracing::warn!(
                    upstream_status = backend_status.map(i64::from),
                    error = %message,
                    "Fleet backend call failed"
                );
                upstream_status = *backend_status;
                message.clone()
            }
            AppError::Superseded => {
                "Requête remplacée par une demande plus récente".to_string()
            }
            AppError::Unauthorized => self.to_string(),
            AppError::Render(msg) => {
                tracing::error!(error = %msg, "Export rendering failed");
                "Internal server error".to_string()
            }
        };

        let mut body = json!({
            "error": error_message,
            "status": status.as_u16(),
        });
        if let Some(upstream) = upstream_status {
            body["upstream_status"] = json!(upstream);
        }
        if let Some(trace_id) = get_trace_id() {
            body["trace_id"] = json!(trace_id);
        }

        (status, Json(body)).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
