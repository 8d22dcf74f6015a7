//! Sign-up, sign-in, sign-out and session lookup.

use crate::{
    errors::AppError,
    extract::AuthUser,
    models::user::{Credentials, Session},
    state::AppState,
};
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};

/// `POST /auth/signup`
pub async fn sign_up(
    State(state): State<AppState>,
    Json(creds): Json<Credentials>,
) -> Result<impl IntoResponse, AppError> {
    let session = state.identity.sign_up(&creds).await?;
    Ok((StatusCode::CREATED, Json(session)))
}

/// `POST /auth/signin`
pub async fn sign_in(
    State(state): State<AppState>,
    Json(creds): Json<Credentials>,
) -> Result<Json<Session>, AppError> {
    Ok(Json(state.identity.sign_in(&creds).await?))
}

/// `POST /auth/signout`
pub async fn sign_out(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<StatusCode, AppError> {
    state.identity.sign_out(&user.access_token).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `GET /auth/session`
pub async fn get_session(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<Session>, AppError> {
    Ok(Json(state.identity.get_session(&user.access_token).await?))
}

/// `DELETE /auth/user`: delete the caller's account.
pub async fn delete_account(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<StatusCode, AppError> {
    state.identity.delete_user(&user.access_token).await?;
    Ok(StatusCode::NO_CONTENT)
}
