//! Request extractors that turn a bearer token into a policy principal.

use crate::{access::Principal, errors::AppError, state::AppState};
use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts},
};
use uuid::Uuid;

/// An authenticated end user. Rejects the request with 401 otherwise.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub access_token: String,
}

impl AuthUser {
    pub fn principal(&self) -> Principal {
        Principal::User(self.user_id)
    }
}

/// Whoever is calling: a verified user, or anonymous when no token is sent.
///
/// A token that is present but invalid is still rejected.
#[derive(Debug, Clone, Copy)]
pub struct Caller(pub Principal);

fn bearer_token(parts: &Parts) -> Result<Option<String>, AppError> {
    let Some(value) = parts.headers.get(header::AUTHORIZATION) else {
        return Ok(None);
    };
    let value = value
        .to_str()
        .map_err(|_| AppError::unauthorized("malformed authorization header"))?;
    match value.split_once(' ') {
        Some((scheme, token)) if scheme.eq_ignore_ascii_case("bearer") && !token.trim().is_empty() => {
            Ok(Some(token.trim().to_string()))
        }
        _ => Err(AppError::unauthorized("expected a bearer token")),
    }
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)?.ok_or_else(|| AppError::unauthorized("missing access token"))?;
        let ctx = state.identity.authenticate(&token).await?;
        Ok(AuthUser {
            user_id: ctx.user_id,
            access_token: token,
        })
    }
}

impl FromRequestParts<AppState> for Caller {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        match bearer_token(parts)? {
            Some(token) => {
                let ctx = state.identity.authenticate(&token).await?;
                Ok(Caller(ctx.principal()))
            }
            None => Ok(Caller(Principal::Anonymous)),
        }
    }
}
