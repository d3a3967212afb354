use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use super::kind::ReportKind;

/// One cell of the neutral table model shared by the on-screen table and
/// both export renderers.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    /// 1-based position of the row in the received order.
    Position(usize),
    Text(String),
    Number(f64),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsumptionRow {
    pub vehicule: String,
    pub marque: String,
    pub modele: String,
    #[serde(deserialize_with = "amount")]
    pub total_quantite: f64,
    #[serde(deserialize_with = "amount")]
    pub prix_unitaire: f64,
    #[serde(deserialize_with = "amount")]
    pub total_carburant: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostRow {
    pub vehicule: String,
    pub marque: String,
    pub modele: String,
    #[serde(deserialize_with = "amount")]
    pub total_carburant: f64,
    #[serde(deserialize_with = "amount")]
    pub total_entretien: f64,
    #[serde(deserialize_with = "amount")]
    pub total_general: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VehicleRef {
    #[serde(default)]
    pub marque: Option<String>,
    #[serde(default)]
    pub modele: Option<String>,
    #[serde(default)]
    pub immatriculation: Option<String>,
}

impl VehicleRef {
    /// `marque modele (immatriculation)`, skipping whatever the backend left
    /// out.
    pub fn label(&self) -> Option<String> {
        let present = |field: &Option<String>| {
            field
                .as_deref()
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .map(str::to_string)
        };

        let name = [present(&self.marque), present(&self.modele)]
            .into_iter()
            .flatten()
            .collect::<Vec<_>>()
            .join(" ");
        let label = match present(&self.immatriculation) {
            Some(plate) if name.is_empty() => format!("({plate})"),
            Some(plate) => format!("{name} ({plate})"),
            None => name,
        };

        (!label.is_empty()).then_some(label)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaintenanceRow {
    #[serde(default)]
    pub vehicule: Option<VehicleRef>,
    #[serde(default)]
    pub garage: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub date_entretien: Option<String>,
    #[serde(deserialize_with = "amount")]
    pub cout: f64,
}

const UNDEFINED_VEHICLE: &str = "Non défini";

impl MaintenanceRow {
    pub fn vehicle_label(&self) -> String {
        self.vehicule
            .as_ref()
            .and_then(VehicleRef::label)
            .unwrap_or_else(|| UNDEFINED_VEHICLE.to_string())
    }
}

/// Aggregated sums come back either as JSON numbers or as decimal strings.
fn amount<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(f64),
        Text(String),
    }

    let value = match Raw::deserialize(deserializer)? {
        Raw::Number(n) => n,
        Raw::Text(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| serde::de::Error::custom(format!("invalid amount {s:?}")))?,
    };

    if value.is_finite() {
        Ok(value)
    } else {
        Err(serde::de::Error::custom("amount is not a finite number"))
    }
}

/// The row set of one report, typed by the kind that was requested.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "rows")]
pub enum ReportRows {
    #[serde(rename = "consommation-carburant")]
    FuelConsumption(Vec<ConsumptionRow>),
    #[serde(rename = "cout-par-vehicule")]
    VehicleCost(Vec<CostRow>),
    #[serde(rename = "top-entretiens")]
    TopMaintenance(Vec<MaintenanceRow>),
}

impl ReportRows {
    /// Decodes a backend body with the schema of `kind`.
    pub fn decode(kind: ReportKind, body: Value) -> Result<Self, serde_json::Error> {
        Ok(match kind {
            ReportKind::FuelConsumption => ReportRows::FuelConsumption(serde_json::from_value(body)?),
            ReportKind::VehicleCost => ReportRows::VehicleCost(serde_json::from_value(body)?),
            ReportKind::TopMaintenance => ReportRows::TopMaintenance(serde_json::from_value(body)?),
        })
    }

    pub fn empty(kind: ReportKind) -> Self {
        match kind {
            ReportKind::FuelConsumption => ReportRows::FuelConsumption(Vec::new()),
            ReportKind::VehicleCost => ReportRows::VehicleCost(Vec::new()),
            ReportKind::TopMaintenance => ReportRows::TopMaintenance(Vec::new()),
        }
    }

    pub fn kind(&self) -> ReportKind {
        match self {
            ReportRows::FuelConsumption(_) => ReportKind::FuelConsumption,
            ReportRows::VehicleCost(_) => ReportKind::VehicleCost,
            ReportRows::TopMaintenance(_) => ReportKind::TopMaintenance,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            ReportRows::FuelConsumption(rows) => rows.len(),
            ReportRows::VehicleCost(rows) => rows.len(),
            ReportRows::TopMaintenance(rows) => rows.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Keeps the first `limit` rows, in received order.
    pub fn truncate(&mut self, limit: usize) {
        match self {
            ReportRows::FuelConsumption(rows) => rows.truncate(limit),
            ReportRows::VehicleCost(rows) => rows.truncate(limit),
            ReportRows::TopMaintenance(rows) => rows.truncate(limit),
        }
    }

    pub fn columns(&self) -> &'static [&'static str] {
        self.kind().columns()
    }

    /// Cell matrix in received order, one entry per row, laid out like
    /// [`ReportKind::columns`].
    pub fn cells(&self) -> Vec<Vec<Cell>> {
        match self {
            ReportRows::FuelConsumption(rows) => rows
                .iter()
                .enumerate()
                .map(|(i, r)| {
                    vec![
                        Cell::Position(i + 1),
                        Cell::Text(r.vehicule.clone()),
                        Cell::Text(r.marque.clone()),
                        Cell::Text(r.modele.clone()),
                        Cell::Number(r.total_quantite),
                        Cell::Number(r.prix_unitaire),
                        Cell::Number(r.total_carburant),
                    ]
                })
                .collect(),
            ReportRows::VehicleCost(rows) => rows
                .iter()
                .map(|r| {
                    vec![
                        Cell::Text(r.vehicule.clone()),
                        Cell::Text(r.marque.clone()),
                        Cell::Text(r.modele.clone()),
                        Cell::Number(r.total_carburant),
                        Cell::Number(r.total_entretien),
                        Cell::Number(r.total_general),
                    ]
                })
                .collect(),
            ReportRows::TopMaintenance(rows) => rows
                .iter()
                .enumerate()
                .map(|(i, r)| {
                    vec![
                        Cell::Position(i + 1),
                        Cell::Text(r.vehicle_label()),
                        Cell::Text(r.garage.clone().unwrap_or_default()),
                        Cell::Text(r.description.clone().unwrap_or_default()),
                        Cell::Text(r.date_entretien.clone().unwrap_or_default()),
                        Cell::Number(r.cout),
                    ]
                })
                .collect(),
        }
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub fn consumption(vehicule: &str, quantite: f64, prix: f64) -> ConsumptionRow {
        ConsumptionRow {
            vehicule: vehicule.to_string(),
            marque: "Toyota".to_string(),
            modele: "Hilux".to_string(),
            total_quantite: quantite,
            prix_unitaire: prix,
            total_carburant: quantite * prix,
        }
    }

    pub fn cost(vehicule: &str, carburant: f64, entretien: f64) -> CostRow {
        CostRow {
            vehicule: vehicule.to_string(),
            marque: "Nissan".to_string(),
            modele: "Navara".to_string(),
            total_carburant: carburant,
            total_entretien: entretien,
            total_general: carburant + entretien,
        }
    }

    pub fn cost_rows(n: usize) -> ReportRows {
        ReportRows::VehicleCost(
            (0..n)
                .map(|i| cost(&format!("{:04} TBA", 1000 + i), 100_000.0 + i as f64, 50_000.0))
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_uses_requested_schema() {
        let body = json!([{
            "vehicule": "1234 TBA",
            "marque": "Toyota",
            "modele": "Hilux",
            "total_quantite": 120.5,
            "prix_unitaire": "5200.00",
            "total_carburant": 626600
        }]);

        let rows = ReportRows::decode(ReportKind::FuelConsumption, body.clone()).unwrap();
        assert_eq!(rows.kind(), ReportKind::FuelConsumption);
        assert_eq!(rows.len(), 1);
        match &rows {
            ReportRows::FuelConsumption(r) => assert_eq!(r[0].prix_unitaire, 5200.0),
            other => panic!("unexpected rows: {other:?}"),
        }

        // Same body does not satisfy the cost schema.
        assert!(ReportRows::decode(ReportKind::VehicleCost, body).is_err());
    }

    #[test]
    fn test_decode_rejects_non_numeric_amount() {
        let body = json!([{
            "vehicule": "1234 TBA",
            "marque": "Toyota",
            "modele": "Hilux",
            "total_carburant": "beaucoup",
            "total_entretien": 0,
            "total_general": 0
        }]);
        assert!(ReportRows::decode(ReportKind::VehicleCost, body).is_err());
    }

    #[test]
    fn test_maintenance_vehicle_label() {
        let body = json!([
            {
                "vehicule": {"marque": "Isuzu", "modele": "D-Max", "immatriculation": "5678 TBB"},
                "garage": "Garage Central",
                "description": "Vidange",
                "date_entretien": "2024-03-02",
                "cout": 450000
            },
            {
                "vehicule": null,
                "garage": null,
                "date_entretien": "2024-03-05",
                "cout": "125000.50"
            }
        ]);
        let rows = ReportRows::decode(ReportKind::TopMaintenance, body).unwrap();
        let cells = rows.cells();
        assert_eq!(cells[0][1], Cell::Text("Isuzu D-Max (5678 TBB)".to_string()));
        assert_eq!(cells[1][1], Cell::Text("Non défini".to_string()));
        assert_eq!(cells[1][2], Cell::Text(String::new()));
        assert_eq!(cells[1][5], Cell::Number(125_000.5));
    }

    #[test]
    fn test_maintenance_row_with_null_fields_still_renders() {
        let body = json!([
            {
                "vehicule": {"marque": "Toyota", "modele": null, "immatriculation": "1234 TBA"},
                "garage": "Garage Central",
                "description": "Pneus",
                "date_entretien": null,
                "cout": 90000
            },
            {
                "vehicule": {"marque": null, "modele": null, "immatriculation": null},
                "cout": 1000
            },
            {
                "vehicule": {"immatriculation": "9999 TBC"},
                "date_entretien": "2024-04-01",
                "cout": 500
            }
        ]);
        let rows = ReportRows::decode(ReportKind::TopMaintenance, body).unwrap();
        assert_eq!(rows.len(), 3);

        let cells = rows.cells();
        assert_eq!(cells[0][1], Cell::Text("Toyota (1234 TBA)".to_string()));
        assert_eq!(cells[0][4], Cell::Text(String::new()));
        assert_eq!(cells[1][1], Cell::Text("Non défini".to_string()));
        assert_eq!(cells[2][1], Cell::Text("(9999 TBC)".to_string()));
        assert_eq!(cells[2][4], Cell::Text("2024-04-01".to_string()));
    }

    #[test]
    fn test_cells_keep_received_order_and_positions() {
        let rows = ReportRows::FuelConsumption(vec![
            consumption("B", 10.0, 5000.0),
            consumption("A", 20.0, 5000.0),
        ]);
        let cells = rows.cells();
        assert_eq!(cells.len(), 2);
        assert_eq!(cells[0][0], Cell::Position(1));
        assert_eq!(cells[0][1], Cell::Text("B".to_string()));
        assert_eq!(cells[1][0], Cell::Position(2));
        assert_eq!(cells[1][1], Cell::Text("A".to_string()));
        assert!(cells.iter().all(|row| row.len() == rows.columns().len()));
    }

    #[test]
    fn test_truncate_keeps_head() {
        let mut rows = cost_rows(8);
        rows.truncate(5);
        assert_eq!(rows.len(), 5);
        match rows {
            ReportRows::VehicleCost(r) => assert_eq!(r[4].vehicule, "1004 TBA"),
            other => panic!("unexpected rows: {other:?}"),
        }
    }
}
