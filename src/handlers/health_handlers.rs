//! Probe endpoints.
//!
//! `/healthz` answers as long as the process is serving. `/readyz` also
//! needs the migrated schema and a writable storage root.

use crate::{models::bucket::PHOTOS_BUCKET, state::AppState};
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use std::collections::HashMap;
use tokio::fs;
use uuid::Uuid;

/// `GET /healthz`
pub async fn healthz() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// `GET /readyz`
///
/// Readiness probe that:
/// 1. Checks the migrated schema by looking up the photos bucket.
/// 2. Performs a write/read/delete against the storage root.
///
/// HTTP 200 when all checks pass, HTTP 503 when any check fails.
pub async fn readyz(State(state): State<AppState>) -> impl IntoResponse {
    let sqlite_check = match sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM buckets WHERE name = ?",
    )
    .bind(PHOTOS_BUCKET)
    .fetch_one(&*state.db)
    .await
    {
        Ok(1) => (true, None::<String>),
        Ok(_) => (false, Some("photos bucket missing, run --migrate".to_string())),
        Err(e) => (false, Some(format!("error: {}", e))),
    };

    let tmp_path = state
        .storage
        .base_path
        .join(format!(".readyz-{}", Uuid::new_v4()));
    let disk_check = match fs::write(&tmp_path, b"readyz").await {
        Ok(_) => {
            let read_back = fs::read(&tmp_path).await;
            let _ = fs::remove_file(&tmp_path).await;
            match read_back {
                Ok(bytes) if bytes == b"readyz" => (true, None::<String>),
                Ok(_) => (false, Some("file content mismatch".to_string())),
                Err(e) => (false, Some(format!("could not read tmp file: {}", e))),
            }
        }
        Err(e) => (false, Some(format!("could not write tmp file: {}", e))),
    };

    let overall_ok = sqlite_check.0 && disk_check.0;

    let mut checks = HashMap::new();
    checks.insert(
        "sqlite",
        CheckStatus {
            ok: sqlite_check.0,
            error: sqlite_check.1,
        },
    );
    checks.insert(
        "disk",
        CheckStatus {
            ok: disk_check.0,
            error: disk_check.1,
        },
    );

    let body = ReadyResponse {
        status: if overall_ok { "ok" } else { "error" }.into(),
        checks,
    };
    let status = if overall_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(body))
}

#[derive(Serialize)]
pub struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

#[derive(Serialize)]
struct ReadyResponse {
    status: String,
    checks: HashMap<&'static str, CheckStatus>,
}

#[derive(Serialize)]
struct CheckStatus {
    ok: bool,
    error: Option<String>,
}
