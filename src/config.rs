use std::env;
use std::str::FromStr;
use std::time::Duration;

use anyhow::Context;

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub environment: String,
    pub fleet_api_base_url: String,
    pub fleet_api_timeout: Option<Duration>,
    pub top_maintenance_limit: usize,
    pub request_timeout: Duration,
    pub view_idle_ttl: Duration,
    pub log_filter: String,
    pub otel_service_name: String,
    pub otel_service_namespace: String,
    pub otel_exporter_endpoint: String,
    pub otel_export_timeout: Duration,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        Ok(Self {
            port: parse_var("APP_PORT", 8080)?,
            environment: env::var("APP_ENVIRONMENT")
                .unwrap_or_else(|_| "development".to_string()),
            fleet_api_base_url: env::var("FLEET_API_BASE_URL")
                .unwrap_or_else(|_| "http://127.0.0.1:8000".to_string())
                .trim_end_matches('/')
                .to_string(),
            fleet_api_timeout: match env::var("FLEET_API_TIMEOUT_SECS") {
                Ok(raw) => Some(Duration::from_secs(
                    raw.parse()
                        .with_context(|| format!("FLEET_API_TIMEOUT_SECS must be a number, got {raw:?}"))?,
                )),
                Err(_) => None,
            },
            top_maintenance_limit: parse_var("TOP_MAINTENANCE_LIMIT", 5)?,
            request_timeout: Duration::from_secs(parse_var("APP_REQUEST_TIMEOUT_SECS", 60)?),
            view_idle_ttl: Duration::from_secs(parse_var("REPORT_VIEW_IDLE_SECS", 3600)?),
            log_filter: env::var("RUST_LOG")
                .unwrap_or_else(|_| "info,reqwest=warn,tower_http=debug".to_string()),
            otel_service_name: env::var("OTEL_SERVICE_NAME")
                .unwrap_or_else(|_| "fleet-reports".to_string()),
            otel_service_namespace: env::var("OTEL_SERVICE_NAMESPACE")
                .unwrap_or_else(|_| "fleet".to_string()),
            otel_exporter_endpoint: env::var("OTEL_EXPORTER_OTLP_ENDPOINT")
                .unwrap_or_else(|_| "http://localhost:4317".to_string()),
            otel_export_timeout: Duration::from_secs(parse_var(
                "OTEL_EXPORTER_OTLP_TIMEOUT_SECS",
                10,
            )?),
        })
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}

fn parse_var<T>(name: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(raw) => raw
            .parse()
            .with_context(|| format!("{name} must be a number, got {raw:?}")),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
impl Config {
    /// Configuration pointing at a test backend.
    pub fn for_backend(base_url: &str) -> Self {
        Self {
            port: 0,
            environment: "test".to_string(),
            fleet_api_base_url: base_url.trim_end_matches('/').to_string(),
            fleet_api_timeout: Some(Duration::from_secs(5)),
            top_maintenance_limit: 5,
            request_timeout: Duration::from_secs(60),
            view_idle_ttl: Duration::from_secs(3600),
            log_filter: "info".to_string(),
            otel_service_name: "fleet-reports-test".to_string(),
            otel_service_namespace: "fleet".to_string(),
            otel_exporter_endpoint: "http://localhost:4317".to_string(),
            otel_export_timeout: Duration::from_secs(10),
        }
    }
}
