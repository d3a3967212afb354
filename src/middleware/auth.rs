use axum::{
    extract::FromRequestParts,
    http::{HeaderValue, header::AUTHORIZATION, request::Parts},
};

use crate::error::AppError;

/// Optional bearer token of the caller, forwarded as-is to the backend.
///
/// A missing header is fine; a header that is not `Bearer <token>` is
/// rejected.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Bearer(pub Option<String>);

impl Bearer {
    pub fn token(&self) -> Option<&str> {
        self.0.as_deref()
    }
}

impl<S> FromRequestParts<S> for Bearer
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        match parts.headers.get(AUTHORIZATION) {
            None => Ok(Bearer(None)),
            Some(value) => extract_token(value).map(|token| Bearer(Some(token))),
        }
    }
}

fn extract_token(value: &HeaderValue) -> Result<String, AppError> {
    let auth_header = value.to_str().map_err(|_| AppError::Unauthorized)?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or(AppError::Unauthorized)?;

    Ok(token.to_string())
}
