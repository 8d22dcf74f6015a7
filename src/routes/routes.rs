//! Defines routes for every client-facing operation.
//!
//! ## Structure
//! - **Auth**
//!   - `POST   /auth/signup`, `POST /auth/signin`, `POST /auth/signout`
//!   - `GET    /auth/session`, `DELETE /auth/user`
//! - **Profile**
//!   - `GET    /profile`, `PATCH /profile`
//! - **Photo metadata**
//!   - `GET    /photos`: list (newest first, `?owner=` optional)
//!   - `POST   /photos`: insert a record
//!   - `DELETE /photos/{id}`
//! - **Storage**
//!   - `PUT    /storage/{bucket}/{*key}`: upload
//!   - `GET    /storage/{bucket}/{*key}`: download (public buckets need no token)
//!   - `HEAD   /storage/{bucket}/{*key}`
//!   - `DELETE /storage/{bucket}/{*key}`
//!
//! The wildcard `*key` allows nested keys like `{user_id}/1700000000.png`.

use crate::{
    handlers::{
        auth_handlers::{delete_account, get_session, sign_in, sign_out, sign_up},
        health_handlers::{healthz, readyz},
        object_handlers::{delete_object, get_object, head_object, upload_object},
        photo_handlers::{create_photo, delete_photo, list_photos},
        profile_handlers::{get_profile, update_profile},
    },
    state::AppState,
};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{delete, get, post, put},
};
use tower_http::trace::TraceLayer;

/// Build the router. The caller attaches the `AppState`.
pub fn routes() -> Router<AppState> {
    Router::new()
        // health endpoints (mounted at root)
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        // identity
        .route("/auth/signup", post(sign_up))
        .route("/auth/signin", post(sign_in))
        .route("/auth/signout", post(sign_out))
        .route("/auth/session", get(get_session))
        .route("/auth/user", delete(delete_account))
        // data layer
        .route("/profile", get(get_profile).patch(update_profile))
        .route("/photos", get(list_photos).post(create_photo))
        .route("/photos/{id}", delete(delete_photo))
        // storage; uploads stream, so the default body limit does not apply
        .route(
            "/storage/{bucket}/{*key}",
            put(upload_object)
                .get(get_object)
                .head(head_object)
                .delete(delete_object)
                .layer(DefaultBodyLimit::disable()),
        )
        .layer(TraceLayer::new_for_http())
}
