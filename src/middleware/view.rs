use axum::{
    extract::FromRequestParts,
    http::{HeaderValue, request::Parts},
};
use uuid::Uuid;

use super::Bearer;
use crate::error::AppError;

pub const VIEW_ID_HEADER: &str = "x-view-id";

/// Whose report views a request reads and writes.
///
/// A signed-in caller owns the views of its token. An anonymous caller owns
/// the views of the `X-View-Id` it presents, and gets a fresh id when it
/// presents none.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewOwner {
    Session(String),
    Anonymous { view_id: Uuid, issued: bool },
}

impl ViewOwner {
    pub fn session_key(token: &str) -> String {
        format!("session:{token}")
    }

    pub fn key(&self) -> String {
        match self {
            ViewOwner::Session(token) => Self::session_key(token),
            ViewOwner::Anonymous { view_id, .. } => format!("view:{view_id}"),
        }
    }

    pub fn token(&self) -> Option<&str> {
        match self {
            ViewOwner::Session(token) => Some(token),
            ViewOwner::Anonymous { .. } => None,
        }
    }

    /// Id an anonymous caller must send back to reach its views again.
    pub fn view_id(&self) -> Option<Uuid> {
        match self {
            ViewOwner::Session(_) => None,
            ViewOwner::Anonymous { view_id, .. } => Some(*view_id),
        }
    }
}

impl<S> FromRequestParts<S> for ViewOwner
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        if let Bearer(Some(token)) = Bearer::from_request_parts(parts, state).await? {
            return Ok(ViewOwner::Session(token));
        }

        match parts.headers.get(VIEW_ID_HEADER) {
            Some(value) => Ok(ViewOwner::Anonymous {
                view_id: parse_view_id(value)?,
                issued: false,
            }),
            None => Ok(ViewOwner::Anonymous {
                view_id: Uuid::new_v4(),
                issued: true,
            }),
        }
    }
}

fn parse_view_id(value: &HeaderValue) -> Result<Uuid, AppError> {
    value
        .to_str()
        .ok()
        .and_then(|raw| Uuid::parse_str(raw.trim()).ok())
        .ok_or_else(|| AppError::Validation("Identifiant de vue invalide.".to_string()))
}
