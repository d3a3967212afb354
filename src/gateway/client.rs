use std::time::Instant;

use anyhow::Context;
use opentelemetry::KeyValue;
use reqwest::{Method, Url, header::ACCEPT};
use serde::Serialize;
use serde_json::Value;
use tracing::Instrument;

use super::{Entity, ReportSource};
use crate::config::Config;
use crate::error::AppError;
use crate::report::{DateRange, ReportKind, ReportRows};
use crate::session::{LoginResponse, Role, SessionContext};
use crate::telemetry::metrics::{GATEWAY_DURATION, GATEWAY_ERRORS, GATEWAY_REQUESTS};

pub const INVALID_RESPONSE_MESSAGE: &str = "Réponse inattendue du serveur.";

/// HTTP client for the fleet REST backend.
#[derive(Clone)]
pub struct BackendClient {
    http: reqwest::Client,
    base_url: String,
    server_address: String,
    server_port: i64,
}

struct Failure {
    error: AppError,
    error_type: &'static str,
}

impl Failure {
    fn new(error: AppError, error_type: &'static str) -> Self {
        Self { error, error_type }
    }
}

impl BackendClient {
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        let url = Url::parse(&config.fleet_api_base_url)
            .with_context(|| format!("invalid FLEET_API_BASE_URL {:?}", config.fleet_api_base_url))?;

        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.fleet_api_timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            http: builder.build()?,
            base_url: config.fleet_api_base_url.trim_end_matches('/').to_string(),
            server_address: url.host_str().unwrap_or("unknown").to_string(),
            server_port: url.port_or_known_default().map(i64::from).unwrap_or(80),
        })
    }

    async fn send<B>(
        &self,
        operation: &'static str,
        method: Method,
        path: &str,
        body: Option<&B>,
        bearer: Option<&str>,
    ) -> Result<Value, AppError>
    where
        B: Serialize + ?Sized,
    {
        let span = tracing::info_span!(
            "fleet.gateway",
            otel.name = %format!("{} {}", method, path),
            fleet.operation = operation,
            http.request.method = %method,
            url.path = %path,
            server.address = %self.server_address,
            server.port = self.server_port,
            http.response.status_code = tracing::field::Empty,
            otel.status_code = tracing::field::Empty,
            error.type = tracing::field::Empty,
        );

        let start = Instant::now();
        let result = self
            .execute(method.clone(), path, body, bearer)
            .instrument(span.clone())
            .await;
        let duration = start.elapsed().as_secs_f64();

        let attrs = [
            KeyValue::new("fleet.operation", operation),
            KeyValue::new("http.request.method", method.to_string()),
        ];
        GATEWAY_REQUESTS.add(1, &attrs);
        GATEWAY_DURATION.record(duration, &attrs);

        match result {
            Ok(value) => {
                span.record("otel.status_code", "OK");
                Ok(value)
            }
            Err(failure) => {
                span.record("otel.status_code", "ERROR");
                span.record("error.type", failure.error_type);
                GATEWAY_ERRORS.add(
                    1,
                    &[
                        KeyValue::new("fleet.operation", operation),
                        KeyValue::new("error.type", failure.error_type),
                    ],
                );
                Err(failure.error)
            }
        }
    }

    async fn execute<B>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
        bearer: Option<&str>,
    ) -> Result<Value, Failure>
    where
        B: Serialize + ?Sized,
    {
        let url = format!("{}{}", self.base_url, path);
        let mut request = self
            .http
            .request(method, &url)
            .header(ACCEPT, "application/json");
        if let Some(token) = bearer {
            request = request.bearer_auth(token);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(transport_failure)?;
        let status = response.status();
        tracing::Span::current().record("http.response.status_code", i64::from(status.as_u16()));

        let bytes = response.bytes().await.map_err(transport_failure)?;

        if !status.is_success() {
            let error_type = match status.as_u16() {
                401 | 403 => "auth_error",
                400..=499 => "client_error",
                _ => "server_error",
            };
            return Err(Failure::new(
                AppError::network(Some(status.as_u16()), backend_message(&bytes)),
                error_type,
            ));
        }

        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Value::Null);
        }

        serde_json::from_slice(&bytes).map_err(|err| {
            tracing::warn!(error = %err, "Fleet backend returned a non-JSON body");
            Failure::new(invalid_response(status.as_u16()), "invalid_response")
        })
    }

    #[tracing::instrument(name = "gateway list", skip_all, fields(entity = %entity))]
    pub async fn list(&self, entity: Entity, bearer: Option<&str>) -> Result<Vec<Value>, AppError> {
        let value = self
            .send::<Value>("list", Method::GET, &entity.collection_path(), None, bearer)
            .await?;
        match value {
            Value::Array(items) => Ok(items),
            _ => Err(invalid_response(200)),
        }
    }

    pub async fn count(&self, entity: Entity, bearer: Option<&str>) -> Result<usize, AppError> {
        Ok(self.list(entity, bearer).await?.len())
    }

    #[tracing::instrument(name = "gateway create", skip_all, fields(entity = %entity))]
    pub async fn create(
        &self,
        entity: Entity,
        body: &Value,
        bearer: Option<&str>,
    ) -> Result<Value, AppError> {
        self.send("create", Method::POST, &entity.collection_path(), Some(body), bearer)
            .await
    }

    #[tracing::instrument(name = "gateway update", skip_all, fields(entity = %entity))]
    pub async fn update(
        &self,
        entity: Entity,
        id: &str,
        body: &Value,
        bearer: Option<&str>,
    ) -> Result<Value, AppError> {
        self.send("update", Method::PUT, &entity.item_path(id), Some(body), bearer)
            .await
    }

    /// Partial update; the dashboard only ever toggles a driver's status.
    #[tracing::instrument(name = "gateway patch_status", skip_all, fields(entity = %entity))]
    pub async fn patch_status(
        &self,
        entity: Entity,
        id: &str,
        statut: bool,
        bearer: Option<&str>,
    ) -> Result<Value, AppError> {
        let body = serde_json::json!({ "statut": statut });
        self.send("patch", Method::PATCH, &entity.item_path(id), Some(&body), bearer)
            .await
    }

    #[tracing::instrument(name = "gateway delete", skip_all, fields(entity = %entity))]
    pub async fn delete(&self, entity: Entity, id: &str, bearer: Option<&str>) -> Result<(), AppError> {
        self.send::<Value>("delete", Method::DELETE, &entity.item_path(id), None, bearer)
            .await?;
        Ok(())
    }

    #[tracing::instrument(name = "gateway login", skip_all, fields(role = %role))]
    pub async fn login(
        &self,
        role: Role,
        email: &str,
        password: &str,
    ) -> Result<SessionContext, AppError> {
        let body = role.login_body(email, password);
        let value = self
            .send("login", Method::POST, role.login_path(), Some(&body), None)
            .await?;
        let response: LoginResponse =
            serde_json::from_value(value).map_err(|_| invalid_response(200))?;

        Ok(SessionContext::from_login(role, response, chrono::Utc::now()))
    }

    /// Best-effort: the caller drops its session whatever happens here.
    #[tracing::instrument(name = "gateway logout", skip_all, fields(role = %session.role))]
    pub async fn logout(&self, session: &SessionContext) {
        let Some(path) = session.role.logout_path() else {
            return;
        };
        let body = serde_json::json!({});
        if let Err(err) = self
            .send("logout", Method::POST, path, Some(&body), Some(&session.token))
            .await
        {
            tracing::warn!(error = %err, "Logout notification failed, session dropped anyway");
        }
    }
}

#[async_trait::async_trait]
impl ReportSource for BackendClient {
    async fn fetch_report(
        &self,
        kind: ReportKind,
        range: Option<&DateRange>,
        bearer: Option<&str>,
    ) -> Result<ReportRows, AppError> {
        let path = kind.backend_path();
        let value = if kind.requires_range() {
            let range = range.ok_or_else(|| {
                AppError::Validation(crate::report::range::MISSING_DATES_MESSAGE.to_string())
            })?;
            self.send("report", kind.method(), &path, Some(range), bearer)
                .await?
        } else {
            self.send::<Value>("report", kind.method(), &path, None, bearer)
                .await?
        };

        ReportRows::decode(kind, value).map_err(|err| {
            tracing::warn!(report.kind = %kind, error = %err, "Report rows do not match the expected schema");
            invalid_response(200)
        })
    }
}

fn transport_failure(err: reqwest::Error) -> Failure {
    let error_type = if err.is_timeout() {
        "timeout"
    } else if err.is_connect() {
        "network_error"
    } else if err.is_decode() || err.is_body() {
        "invalid_response"
    } else {
        "unknown_error"
    };
    tracing::warn!(error = %err, error.type = error_type, "Fleet backend unreachable");
    Failure::new(AppError::network(None, None), error_type)
}

fn invalid_response(status: u16) -> AppError {
    AppError::network(Some(status), Some(INVALID_RESPONSE_MESSAGE.to_string()))
}

/// Extracts the `message` field of an error body, if any.
fn backend_message(body: &[u8]) -> Option<String> {
    let value: Value = serde_json::from_slice(body).ok()?;
    value
        .get("message")
        .or_else(|| value.get("error"))
        .and_then(Value::as_str)
        .map(str::to_string)
}
