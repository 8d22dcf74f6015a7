//! Shared application state handed to every handler.

use crate::services::{
    identity_service::IdentityService, photo_service::PhotoService,
    profile_service::ProfileService, storage_service::StorageService,
};
use sqlx::SqlitePool;
use std::{path::PathBuf, sync::Arc};

#[derive(Clone)]
pub struct AppState {
    pub db: Arc<SqlitePool>,
    pub identity: IdentityService,
    pub profiles: ProfileService,
    pub photos: PhotoService,
    pub storage: StorageService,
}

/// Settings the services need beyond the database pool.
#[derive(Clone, Debug)]
pub struct ServiceSettings {
    pub storage_dir: PathBuf,
    pub public_base_url: String,
    pub jwt_secret: Vec<u8>,
    pub token_ttl_secs: i64,
}

impl AppState {
    pub fn new(db: Arc<SqlitePool>, settings: ServiceSettings) -> Self {
        Self {
            identity: IdentityService::new(
                db.clone(),
                &settings.jwt_secret,
                settings.token_ttl_secs,
            ),
            profiles: ProfileService::new(db.clone()),
            photos: PhotoService::new(db.clone()),
            storage: StorageService::new(
                db.clone(),
                settings.storage_dir,
                settings.public_base_url,
            ),
            db,
        }
    }
}
