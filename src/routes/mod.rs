pub mod dashboard;
pub mod health;
pub mod reports;
pub mod session;

use axum::{
    Router,
    routing::{get, post},
};

use crate::AppState;

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health::health))
        .route("/api/login", post(session::login))
        .route("/api/logout", post(session::logout))
        .route("/api/admin/login", post(session::admin_login))
        .route("/api/admin/logout", post(session::admin_logout))
        .route("/api/tableau-de-bord", get(dashboard::dashboard))
        .route(
            "/api/rapports/{kind}",
            post(reports::run).get(reports::current),
        )
        .route(
            "/api/rapports/{kind}/export/{format}",
            get(reports::export),
        )
        .with_state(state)
}
