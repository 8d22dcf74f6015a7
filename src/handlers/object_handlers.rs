//! HTTP handlers for stored objects.
//! Streams object bodies to avoid buffering in memory and delegates storage
//! and policy concerns to `StorageService`.

use crate::{
    errors::AppError,
    extract::{AuthUser, Caller},
    models::object::StoredObject,
    state::AppState,
};
use axum::{
    Json,
    body::Body,
    extract::{Path, State},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use futures::StreamExt;
use serde::Serialize;
use std::io;
use tokio_util::io::ReaderStream;

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    #[serde(flatten)]
    pub object: StoredObject,
    pub public_url: String,
}

/// PUT `/storage/{bucket}/{*key}`: upload a new object.
///
/// The declared content type is recorded as-is; it is not checked against
/// the payload.
pub async fn upload_object(
    State(state): State<AppState>,
    user: AuthUser,
    Path((bucket, key)): Path<(String, String)>,
    headers: HeaderMap,
    body: Body,
) -> Result<impl IntoResponse, AppError> {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.to_string());

    let stream = body
        .into_data_stream()
        .map(|chunk| chunk.map_err(io::Error::other));

    let object = state
        .storage
        .upload_object_stream(user.principal(), &bucket, &key, content_type, stream)
        .await?;

    let mut resp_headers = HeaderMap::new();
    if let Some(etag) = object.etag.as_ref() {
        if let Ok(value) = HeaderValue::from_str(&format!("\"{}\"", etag)) {
            resp_headers.insert(header::ETAG, value);
        }
    }

    let public_url = state.storage.public_url(&bucket, &key);
    Ok((
        StatusCode::CREATED,
        resp_headers,
        Json(UploadResponse { object, public_url }),
    ))
}

/// GET `/storage/{bucket}/{*key}` as a streaming response.
pub async fn get_object(
    State(state): State<AppState>,
    Caller(principal): Caller,
    Path((bucket, key)): Path<(String, String)>,
) -> Result<Response, AppError> {
    let (meta, file) = state
        .storage
        .get_object_reader(principal, &bucket, &key)
        .await?;
    let body = Body::from_stream(ReaderStream::new(file));

    let mut response = Response::new(body);
    *response.status_mut() = StatusCode::OK;
    set_object_headers(response.headers_mut(), &meta);
    Ok(response)
}

/// HEAD `/storage/{bucket}/{*key}`: same headers as GET but no body.
pub async fn head_object(
    State(state): State<AppState>,
    Caller(principal): Caller,
    Path((bucket, key)): Path<(String, String)>,
) -> Result<Response, AppError> {
    let meta = state
        .storage
        .get_object_metadata(principal, &bucket, &key)
        .await?;
    let mut response = Response::new(Body::empty());
    *response.status_mut() = StatusCode::OK;
    set_object_headers(response.headers_mut(), &meta);
    Ok(response)
}

/// DELETE `/storage/{bucket}/{*key}`
pub async fn delete_object(
    State(state): State<AppState>,
    user: AuthUser,
    Path((bucket, key)): Path<(String, String)>,
) -> Result<StatusCode, AppError> {
    state
        .storage
        .remove_object(user.principal(), &bucket, &key)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

fn set_object_headers(headers: &mut HeaderMap, meta: &StoredObject) {
    let content_type = meta
        .content_type
        .clone()
        .unwrap_or_else(|| "application/octet-stream".into());
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_str(&content_type)
            .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream")),
    );

    headers.insert(
        header::CONTENT_LENGTH,
        HeaderValue::from(meta.size_bytes.max(0) as u64),
    );

    if let Some(etag) = meta.etag.as_ref() {
        if let Ok(value) = HeaderValue::from_str(&format!("\"{}\"", etag)) {
            headers.insert(header::ETAG, value);
        }
    }

    if let Ok(value) = HeaderValue::from_str(&meta.created_at.to_rfc2822()) {
        headers.insert(header::LAST_MODIFIED, value);
    }
}
