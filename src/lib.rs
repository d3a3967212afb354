pub mod config;
pub mod error;
pub mod export;
pub mod gateway;
pub mod middleware;
pub mod report;
pub mod routes;
pub mod session;
pub mod telemetry;

use std::sync::Arc;

pub use config::Config;

use gateway::{BackendClient, ReportSource};
use report::ViewRegistry;

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub backend: Arc<BackendClient>,
    pub reports: Arc<dyn ReportSource>,
    pub views: Arc<ViewRegistry>,
}

impl AppState {
    pub fn new(config: Config) -> anyhow::Result<Self> {
        let backend = Arc::new(BackendClient::new(&config)?);
        let views = Arc::new(ViewRegistry::new(config.view_idle_ttl));

        Ok(Self {
            config,
            reports: backend.clone(),
            backend,
            views,
        })
    }

    /// Replaces where report rows are fetched from; entity and session
    /// calls still go to the backend client.
    pub fn with_report_source(mut self, source: Arc<dyn ReportSource>) -> Self {
        self.reports = source;
        self
    }
}
