use axum::{Json, extract::State};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{Value, json};

use crate::AppState;
use crate::error::{AppError, AppResult};
use crate::middleware::{Bearer, ViewOwner};
use crate::session::{Role, SessionContext};

#[derive(Debug, Deserialize)]
pub struct LoginInput {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

impl LoginInput {
    fn validate(&self) -> Result<(), AppError> {
        if self.email.trim().is_empty() || self.password.is_empty() {
            return Err(AppError::Validation(
                "Veuillez saisir l'email et le mot de passe.".to_string(),
            ));
        }
        Ok(())
    }
}

async fn login_as(state: &AppState, role: Role, input: LoginInput) -> AppResult<Json<SessionContext>> {
    input.validate()?;
    let session = state
        .backend
        .login(role, input.email.trim(), &input.password)
        .await?;

    tracing::info!(role = %role, "Session opened");
    Ok(Json(session))
}

pub async fn login(
    State(state): State<AppState>,
    Json(input): Json<LoginInput>,
) -> AppResult<Json<SessionContext>> {
    login_as(&state, Role::User, input).await
}

pub async fn admin_login(
    State(state): State<AppState>,
    Json(input): Json<LoginInput>,
) -> AppResult<Json<SessionContext>> {
    login_as(&state, Role::Admin, input).await
}

/// Always succeeds: the caller's report views are dropped, the backend is
/// told when the role has a logout endpoint.
async fn logout_as(
    state: &AppState,
    role: Role,
    bearer: Result<Bearer, AppError>,
) -> Json<Value> {
    if let Some(token) = bearer.ok().and_then(|bearer| bearer.0) {
        let cleared = state.views.clear_owner(&ViewOwner::session_key(&token));
        tracing::info!(role = %role, views = cleared, "Session closed");

        let session = SessionContext::from_token(role, token, Utc::now());
        state.backend.logout(&session).await;
    }

    Json(json!({ "message": "Déconnexion réussie" }))
}

pub async fn logout(
    State(state): State<AppState>,
    bearer: Result<Bearer, AppError>,
) -> Json<Value> {
    logout_as(&state, Role::User, bearer).await
}

pub async fn admin_logout(
    State(state): State<AppState>,
    bearer: Result<Bearer, AppError>,
) -> Json<Value> {
    logout_as(&state, Role::Admin, bearer).await
}
