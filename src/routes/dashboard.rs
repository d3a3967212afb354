use axum::{Json, extract::State};
use serde::Serialize;

use crate::AppState;
use crate::error::AppResult;
use crate::gateway::Entity;
use crate::middleware::Bearer;

/// Entity totals shown on the landing page.
#[derive(Debug, Serialize)]
pub struct DashboardCounts {
    pub vehicules: usize,
    pub chauffeurs: usize,
    pub missions: usize,
    pub entretiens: usize,
    pub carburants: usize,
}

#[tracing::instrument(name = "dashboard counts", skip(state, bearer))]
pub async fn dashboard(
    State(state): State<AppState>,
    bearer: Bearer,
) -> AppResult<Json<DashboardCounts>> {
    let backend = &state.backend;
    let token = bearer.token();

    let (vehicules, chauffeurs, missions, entretiens, carburants) = tokio::try_join!(
        backend.count(Entity::Vehicules, token),
        backend.count(Entity::Chauffeurs, token),
        backend.count(Entity::Missions, token),
        backend.count(Entity::Entretiens, token),
        backend.count(Entity::Carburants, token),
    )?;

    Ok(Json(DashboardCounts {
        vehicules,
        chauffeurs,
        missions,
        entretiens,
        carburants,
    }))
}
