use std::fmt;
use std::str::FromStr;

use reqwest::Method;
use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// The three aggregate reports the fleet backend can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReportKind {
    #[serde(rename = "consommation-carburant")]
    FuelConsumption,
    #[serde(rename = "cout-par-vehicule")]
    VehicleCost,
    #[serde(rename = "top-entretiens")]
    TopMaintenance,
}

impl ReportKind {
    pub const ALL: [ReportKind; 3] = [
        ReportKind::FuelConsumption,
        ReportKind::VehicleCost,
        ReportKind::TopMaintenance,
    ];

    /// Path segment used both by the backend and by our own routes.
    pub fn slug(self) -> &'static str {
        match self {
            ReportKind::FuelConsumption => "consommation-carburant",
            ReportKind::VehicleCost => "cout-par-vehicule",
            ReportKind::TopMaintenance => "top-entretiens",
        }
    }

    pub fn backend_path(self) -> String {
        format!("/api/rapport/{}", self.slug())
    }

    pub fn method(self) -> Method {
        if self.requires_range() {
            Method::POST
        } else {
            Method::GET
        }
    }

    pub fn requires_range(self) -> bool {
        !matches!(self, ReportKind::TopMaintenance)
    }

    pub fn title(self) -> &'static str {
        match self {
            ReportKind::FuelConsumption => "Rapport de Consommation Carburant",
            ReportKind::VehicleCost => "Rapport des Coûts par Véhicule",
            ReportKind::TopMaintenance => "Top 5 des entretiens les plus coûteux",
        }
    }

    pub fn sheet_name(self) -> &'static str {
        match self {
            ReportKind::FuelConsumption => "Consommation Carburant",
            ReportKind::VehicleCost => "Rapport",
            ReportKind::TopMaintenance => "Top Entretiens",
        }
    }

    pub fn file_stem(self) -> &'static str {
        match self {
            ReportKind::FuelConsumption => "rapport_consommation",
            ReportKind::VehicleCost => "rapport_cout_par_vehicule",
            ReportKind::TopMaintenance => "Top_5_Entretiens",
        }
    }

    /// Column labels shared by the on-screen table and both exports.
    pub fn columns(self) -> &'static [&'static str] {
        match self {
            ReportKind::FuelConsumption => &[
                "#",
                "Véhicule",
                "Marque",
                "Modèle",
                "Quantité (L)",
                "Prix unitaire (Ar)",
                "Coût total (Ar)",
            ],
            ReportKind::VehicleCost => &[
                "Immatriculation",
                "Marque",
                "Modèle",
                "Total Carburant (Ar)",
                "Total Entretien (Ar)",
                "Total Général (Ar)",
            ],
            ReportKind::TopMaintenance => &[
                "#",
                "Véhicule",
                "Garage",
                "Description",
                "Date entretien",
                "Coût (Ar)",
            ],
        }
    }

    /// Relative column widths for the paged document, summing to 1.
    pub fn column_weights(self) -> &'static [f32] {
        match self {
            ReportKind::FuelConsumption => &[0.05, 0.17, 0.14, 0.14, 0.14, 0.18, 0.18],
            ReportKind::VehicleCost => &[0.17, 0.14, 0.14, 0.19, 0.18, 0.18],
            ReportKind::TopMaintenance => &[0.05, 0.27, 0.14, 0.26, 0.13, 0.15],
        }
    }
}

impl fmt::Display for ReportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

impl FromStr for ReportKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ReportKind::ALL
            .into_iter()
            .find(|kind| kind.slug() == s)
            .ok_or_else(|| AppError::NotFound(format!("Rapport inconnu : {s}")))
    }
}
