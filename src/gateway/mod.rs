pub mod client;

use std::fmt;

use serde::Serialize;

pub use client::BackendClient;

use crate::error::AppError;
use crate::report::{DateRange, ReportKind, ReportRows};

/// CRUD resources exposed by the fleet backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Entity {
    Vehicules,
    Chauffeurs,
    Missions,
    Entretiens,
    Carburants,
}

impl Entity {
    pub fn slug(self) -> &'static str {
        match self {
            Entity::Vehicules => "vehicules",
            Entity::Chauffeurs => "chauffeurs",
            Entity::Missions => "missions",
            Entity::Entretiens => "entretiens",
            Entity::Carburants => "carburants",
        }
    }

    pub fn collection_path(self) -> String {
        format!("/api/{}", self.slug())
    }

    pub fn item_path(self, id: impl fmt::Display) -> String {
        format!("/api/{}/{}", self.slug(), id)
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

/// Where report rows come from. The HTTP client is the production source;
/// tests substitute their own.
#[async_trait::async_trait]
pub trait ReportSource: Send + Sync {
    /// Issues exactly one aggregation request for `kind`.
    async fn fetch_report(
        &self,
        kind: ReportKind,
        range: Option<&DateRange>,
        bearer: Option<&str>,
    ) -> Result<ReportRows, AppError>;
}
