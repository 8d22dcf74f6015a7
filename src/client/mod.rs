//! Gallery client.
//!
//! [`PhotoClient`] turns user actions into backend calls. The session is
//! passed into every call; the client keeps no "current user". Its checks on
//! file type and size only spare the user a pointless round trip: the
//! backend's policies are the authority and the checks are trivially
//! bypassed by calling the backend directly.
//!
//! Upload and delete are two-step and not transactional. When the second
//! step fails the first is left as is and the error says so:
//! [`ClientError::OrphanedObject`] for an upload whose record was never
//! written, [`ClientError::DanglingRecord`] for a record whose file is
//! already gone.

pub mod backend;

pub use backend::{Backend, BackendError, BackendResult, LocalBackend};

use crate::{
    models::{
        photo::{NewPhoto, Photo},
        user::{Credentials, Session},
    },
    services::storage_service::StorageError,
};
use bytes::Bytes;
use chrono::Utc;
use futures::future::join_all;
use serde::Serialize;
use std::{
    path::Path,
    sync::atomic::{AtomicI64, Ordering},
};
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Largest file the client will try to upload.
pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// A file picked by the user.
#[derive(Debug, Clone)]
pub struct ImageFile {
    pub name: String,
    pub content_type: String,
    pub bytes: Bytes,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("`{name}` is not an image ({content_type})")]
    NotAnImage { name: String, content_type: String },
    #[error("`{name}` is {size} bytes, the limit is {limit}")]
    TooLarge { name: String, size: usize, limit: usize },
}

#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Backend(#[from] BackendError),
    #[error("uploaded `{path}` but could not record it: {source}")]
    OrphanedObject {
        path: String,
        #[source]
        source: BackendError,
    },
    #[error("removed `{path}` but could not delete photo {id}: {source}")]
    DanglingRecord {
        id: Uuid,
        path: String,
        #[source]
        source: BackendError,
    },
}

impl ClientError {
    /// Short text suitable for a transient notification.
    pub fn user_message(&self) -> String {
        match self {
            ClientError::Validation(err) => err.to_string(),
            ClientError::Backend(BackendError::Auth(err)) => err.to_string(),
            ClientError::Backend(_) => "Something went wrong, please try again.".into(),
            ClientError::OrphanedObject { .. } => "Upload failed.".into(),
            ClientError::DanglingRecord { .. } => "Delete failed.".into(),
        }
    }
}

pub type ClientResult<T> = Result<T, ClientError>;

/// A photo together with the URL it can be displayed from.
#[derive(Debug, Clone, Serialize)]
pub struct GalleryItem {
    pub photo: Photo,
    pub url: String,
}

pub struct PhotoClient<B> {
    backend: B,
    max_upload_bytes: usize,
    // Last timestamp handed out for a storage path.
    last_stamp: AtomicI64,
}

impl<B: Backend> PhotoClient<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            max_upload_bytes: MAX_UPLOAD_BYTES,
            last_stamp: AtomicI64::new(0),
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub async fn sign_up(&self, email: &str, password: &str) -> ClientResult<Session> {
        Ok(self.backend.sign_up(&credentials(email, password)).await?)
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> ClientResult<Session> {
        Ok(self.backend.sign_in(&credentials(email, password)).await?)
    }

    pub async fn sign_out(&self, session: &Session) -> ClientResult<()> {
        Ok(self.backend.sign_out(session).await?)
    }

    /// Resume a session from a stored access token.
    pub async fn restore_session(&self, access_token: &str) -> ClientResult<Session> {
        Ok(self.backend.get_session(access_token).await?)
    }

    /// Reject files the backend would store but the gallery cannot show.
    pub fn validate(&self, file: &ImageFile) -> Result<(), ValidationError> {
        if !file.content_type.starts_with("image/") {
            return Err(ValidationError::NotAnImage {
                name: file.name.clone(),
                content_type: file.content_type.clone(),
            });
        }
        if file.bytes.len() > self.max_upload_bytes {
            return Err(ValidationError::TooLarge {
                name: file.name.clone(),
                size: file.bytes.len(),
                limit: self.max_upload_bytes,
            });
        }
        Ok(())
    }

    /// Upload one image and record it.
    pub async fn upload(&self, session: &Session, file: ImageFile) -> ClientResult<Photo> {
        self.validate(&file)?;

        let owner = session.user.id;
        let path = storage_path(owner, self.next_stamp(), &file.name, &file.content_type);
        let size = file.bytes.len() as i64;

        self.backend
            .upload_file(session, &path, file.bytes, &file.content_type)
            .await?;

        let record = NewPhoto {
            user_id: owner,
            file_name: file.name,
            file_path: path.clone(),
            file_size: Some(size),
        };
        match self.backend.insert_photo_metadata(session, record).await {
            Ok(photo) => {
                info!(photo_id = %photo.id, %path, "photo uploaded");
                Ok(photo)
            }
            Err(source) => {
                warn!(%path, "upload stored but metadata insert failed: {}", source);
                Err(ClientError::OrphanedObject { path, source })
            }
        }
    }

    /// Upload several images at once. Each upload is independent; results
    /// come back in input order.
    pub async fn upload_many(
        &self,
        session: &Session,
        files: Vec<ImageFile>,
    ) -> Vec<ClientResult<Photo>> {
        join_all(files.into_iter().map(|file| self.upload(session, file))).await
    }

    /// Remove the stored file, then its record.
    ///
    /// A file that is already gone counts as removed, so a delete that left a
    /// [`ClientError::DanglingRecord`] can be retried.
    pub async fn delete(&self, session: &Session, photo: &Photo) -> ClientResult<()> {
        let removed = match self.backend.remove_file(session, &photo.file_path).await {
            Ok(()) => true,
            Err(BackendError::Storage(StorageError::ObjectNotFound { .. })) => {
                debug!(photo_id = %photo.id, "file already gone, removing record only");
                false
            }
            Err(err) => return Err(err.into()),
        };

        if let Err(source) = self.backend.delete_photo_metadata(session, photo.id).await {
            if !removed {
                return Err(source.into());
            }
            warn!(photo_id = %photo.id, "file removed but metadata delete failed: {}", source);
            return Err(ClientError::DanglingRecord {
                id: photo.id,
                path: photo.file_path.clone(),
                source,
            });
        }
        info!(photo_id = %photo.id, "photo deleted");
        Ok(())
    }

    /// The signed-in user's photos, newest first, with display URLs.
    pub async fn gallery(&self, session: &Session) -> ClientResult<Vec<GalleryItem>> {
        let photos = self.backend.list_photos(session, session.user.id).await?;
        Ok(photos
            .into_iter()
            .map(|photo| GalleryItem {
                url: self.backend.public_url(&photo.file_path),
                photo,
            })
            .collect())
    }
}

impl<B> PhotoClient<B> {
    /// Microseconds since the epoch, strictly increasing per client so that
    /// uploads started together still get distinct paths.
    fn next_stamp(&self) -> i64 {
        let now = Utc::now().timestamp_micros();
        let prev = self
            .last_stamp
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
                Some(now.max(last + 1))
            })
            .unwrap_or(now);
        now.max(prev + 1)
    }
}

fn credentials(email: &str, password: &str) -> Credentials {
    Credentials {
        email: email.to_string(),
        password: password.to_string(),
    }
}

/// `{owner}/{timestamp}.{ext}`.
pub fn storage_path(owner: Uuid, stamp: i64, file_name: &str, content_type: &str) -> String {
    format!(
        "{}/{}.{}",
        owner,
        stamp,
        extension_for(file_name, content_type)
    )
}

/// Extension of the original file name, else the content-type subtype.
fn extension_for(file_name: &str, content_type: &str) -> String {
    let usable = |ext: &&str| {
        !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric() || c == '+')
    };
    let from_name = Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .filter(usable);
    let from_type = content_type
        .split_once('/')
        .and_then(|(_, sub)| sub.split(';').next())
        .map(str::trim)
        .filter(usable);

    from_name
        .or(from_type)
        .map(str::to_ascii_lowercase)
        .unwrap_or_else(|| "bin".to_string())
}

#[cfg(test)]
mod tests;
