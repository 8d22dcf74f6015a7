use crate::{
    errors::AppError,
    extract::AuthUser,
    models::profile::{Profile, ProfileUpdate},
    state::AppState,
};
use axum::{Json, extract::State};

/// `GET /profile`
pub async fn get_profile(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<Profile>, AppError> {
    let profile = state
        .profiles
        .get_profile(user.principal(), user.user_id)
        .await?;
    Ok(Json(profile))
}

/// `PATCH /profile`
pub async fn update_profile(
    State(state): State<AppState>,
    user: AuthUser,
    Json(update): Json<ProfileUpdate>,
) -> Result<Json<Profile>, AppError> {
    let profile = state
        .profiles
        .update_profile(user.principal(), user.user_id, update)
        .await?;
    Ok(Json(profile))
}
