//! Photo metadata endpoints.

use crate::{
    errors::AppError,
    extract::AuthUser,
    models::photo::{NewPhoto, Photo},
    state::AppState,
};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct ListPhotosQuery {
    /// Defaults to the caller.
    pub owner: Option<Uuid>,
}

/// `GET /photos`: newest first.
pub async fn list_photos(
    State(state): State<AppState>,
    user: AuthUser,
    Query(q): Query<ListPhotosQuery>,
) -> Result<Json<Vec<Photo>>, AppError> {
    let owner = q.owner.unwrap_or(user.user_id);
    let photos = state.photos.list_photos(user.principal(), owner).await?;
    Ok(Json(photos))
}

/// `POST /photos`
pub async fn create_photo(
    State(state): State<AppState>,
    user: AuthUser,
    Json(record): Json<NewPhoto>,
) -> Result<impl IntoResponse, AppError> {
    let photo = state.photos.insert_photo(user.principal(), record).await?;
    Ok((StatusCode::CREATED, Json(photo)))
}

/// `DELETE /photos/{id}`: removes the row only, never the stored object.
pub async fn delete_photo(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Photo>, AppError> {
    let photo = state.photos.delete_photo(user.principal(), id).await?;
    Ok(Json(photo))
}
