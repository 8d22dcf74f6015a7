//! PhotoService: photo metadata rows.
//!
//! Rows are filtered through the photo policy after they are read, the same
//! way a row-level policy hides rows from a query. Callers never learn
//! whether a row they cannot see exists.

use super::{DataError, DataResult};
use crate::{
    access::{Action, Principal, Target, authorize, is_allowed, owns_key},
    models::photo::{NewPhoto, Photo},
};
use chrono::Utc;
use sqlx::SqlitePool;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

const PHOTO_COLUMNS: &str = "id, user_id, file_name, file_path, file_size, created_at";

#[derive(Clone)]
pub struct PhotoService {
    db: Arc<SqlitePool>,
}

impl PhotoService {
    pub fn new(db: Arc<SqlitePool>) -> Self {
        Self { db }
    }

    /// Photos owned by `owner` that `principal` may see, newest first.
    pub async fn list_photos(&self, principal: Principal, owner: Uuid) -> DataResult<Vec<Photo>> {
        let rows = sqlx::query_as::<_, Photo>(&format!(
            "SELECT {PHOTO_COLUMNS} FROM photos WHERE user_id = ?
             ORDER BY created_at DESC, rowid DESC"
        ))
        .bind(owner)
        .fetch_all(&*self.db)
        .await?;

        Ok(rows
            .into_iter()
            .filter(|p| is_allowed(principal, Action::Read, Target::Photo { owner: p.user_id }))
            .collect())
    }

    pub async fn get_photo(&self, principal: Principal, id: Uuid) -> DataResult<Photo> {
        self.fetch_visible(principal, id, Action::Read).await
    }

    /// Insert one metadata record.
    ///
    /// The record must name the caller as owner, and its `file_path` must sit
    /// under the caller's own storage prefix.
    pub async fn insert_photo(&self, principal: Principal, new: NewPhoto) -> DataResult<Photo> {
        authorize(principal, Action::Create, Target::Photo { owner: new.user_id })?;

        if new.file_name.trim().is_empty() {
            return Err(DataError::Invalid {
                field: "file_name",
                reason: "must not be empty".into(),
            });
        }
        if !owns_key(principal, &new.file_path) {
            return Err(DataError::Invalid {
                field: "file_path",
                reason: "must start with the owner's id".into(),
            });
        }
        if matches!(new.file_size, Some(size) if size < 0) {
            return Err(DataError::Invalid {
                field: "file_size",
                reason: "must not be negative".into(),
            });
        }

        let photo = sqlx::query_as::<_, Photo>(&format!(
            "INSERT INTO photos (id, user_id, file_name, file_path, file_size, created_at)
             VALUES (?, ?, ?, ?, ?, ?)
             RETURNING {PHOTO_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(new.user_id)
        .bind(&new.file_name)
        .bind(&new.file_path)
        .bind(new.file_size)
        .bind(Utc::now())
        .fetch_one(&*self.db)
        .await?;

        debug!(photo_id = %photo.id, path = %photo.file_path, "photo metadata inserted");
        Ok(photo)
    }

    /// Delete one metadata record. The stored object is not touched.
    pub async fn delete_photo(&self, principal: Principal, id: Uuid) -> DataResult<Photo> {
        let photo = self.fetch_visible(principal, id, Action::Delete).await?;

        let result = sqlx::query("DELETE FROM photos WHERE id = ? AND user_id = ?")
            .bind(photo.id)
            .bind(photo.user_id)
            .execute(&*self.db)
            .await?;
        if result.rows_affected() == 0 {
            return Err(DataError::NotFound("photo"));
        }

        debug!(photo_id = %photo.id, "photo metadata deleted");
        Ok(photo)
    }

    async fn fetch_visible(&self, principal: Principal, id: Uuid, action: Action) -> DataResult<Photo> {
        let photo = sqlx::query_as::<_, Photo>(&format!(
            "SELECT {PHOTO_COLUMNS} FROM photos WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&*self.db)
        .await?;

        photo
            .filter(|p| is_allowed(principal, action, Target::Photo { owner: p.user_id }))
            .ok_or(DataError::NotFound("photo"))
    }
}
